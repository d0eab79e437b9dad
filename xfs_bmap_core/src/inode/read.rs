//! Inode 读取和验证

use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    crc::xfs_verify_cksum,
    error::{Error, ErrorKind, Result},
    fork::{ForkSource, WhichFork},
    types::{xfs_dinode, DinodeFlags},
};
use alloc::{vec, vec::Vec};
use log::{debug, warn};

/// 从块设备读取 inode 的原始字节
///
/// # 参数
///
/// * `bdev` - 块设备引用（需要已设置几何信息）
/// * `ino` - inode 编号
///
/// # 返回
///
/// 成功返回 `inode_size` 字节的缓冲区
pub fn read_dinode<D: BlockDevice>(bdev: &mut BlockDev<D>, ino: u64) -> Result<Vec<u8>> {
    let geo = bdev
        .geometry()
        .copied()
        .ok_or(Error::new(ErrorKind::InvalidInput, "filesystem geometry not set"))?;

    if !geo.verify_ino(ino) {
        return Err(Error::new(ErrorKind::NotFound, "inode number outside filesystem"));
    }

    // inode 所在块的字节偏移 + 块内偏移
    let offset = geo.fsb_to_byte(geo.ino_to_fsb(ino)) + geo.ino_to_offset(ino) as u64;
    debug!("read_dinode: ino={} offset={}", ino, offset);

    let mut buf = vec![0u8; geo.inode_size as usize];
    bdev.read_bytes(offset, &mut buf)?;
    Ok(buf)
}

/// Inode 包装器
///
/// 持有整个磁盘 inode，按 `di_forkoff` 切分出数据 fork 和属性 fork。
pub struct Inode {
    ino: u64,
    raw: Vec<u8>,
    core: xfs_dinode,
}

impl Inode {
    /// 从块设备加载 inode
    pub fn load<D: BlockDevice>(bdev: &mut BlockDev<D>, ino: u64) -> Result<Self> {
        let raw = read_dinode(bdev, ino)?;
        Self::from_bytes(ino, raw)
    }

    /// 从原始字节构造，检查魔数、版本、CRC、inode 编号和 fork 偏移
    pub fn from_bytes(ino: u64, raw: Vec<u8>) -> Result<Self> {
        let core = xfs_dinode::from_bytes(&raw)?;
        if !core.is_valid() {
            warn!("inode {}: bad magic {:#x} or version {}", ino, core.di_magic, core.di_version);
            return Err(Error::new(ErrorKind::Corrupted, "Invalid inode magic or version"));
        }

        if core.di_version >= 3 {
            if cfg!(feature = "verify-crc") && !xfs_verify_cksum(&raw, XFS_DINODE_CRC_OFF) {
                warn!("inode {}: CRC mismatch", ino);
                return Err(Error::new(ErrorKind::Corrupted, "inode CRC mismatch"));
            }
            if core.di_ino != ino {
                warn!("inode {}: records inode number {}", ino, core.di_ino);
                return Err(Error::new(ErrorKind::Corrupted, "inode number mismatch"));
            }
        }

        let literal = raw.len().saturating_sub(core.core_size());
        let forkoff = core.di_forkoff as usize * XFS_DINODE_FORKOFF_UNIT;
        if forkoff != 0 && forkoff >= literal {
            warn!("inode {}: fork offset {} past literal area", ino, core.di_forkoff);
            return Err(Error::new(ErrorKind::Corrupted, "inode fork offset out of range"));
        }

        Ok(Self { ino, raw, core })
    }

    /// 获取 inode 编号
    pub fn ino(&self) -> u64 {
        self.ino
    }

    /// 获取 inode core 的引用
    pub fn core(&self) -> &xfs_dinode {
        &self.core
    }

    /// 获取文件大小
    pub fn file_size(&self) -> u64 {
        self.core.di_size
    }

    /// 获取文件模式
    pub fn mode(&self) -> u16 {
        self.core.di_mode
    }

    /// 获取标志
    pub fn flags(&self) -> DinodeFlags {
        self.core.flags()
    }

    /// 是否有属性 fork
    ///
    /// 对应 `XFS_DFORK_Q()`
    pub fn has_attr_fork(&self) -> bool {
        self.core.di_forkoff != 0
    }

    /// 数据 fork 在 raw 中的范围
    fn data_range(&self) -> (usize, usize) {
        let start = self.core.core_size();
        let end = if self.has_attr_fork() {
            start + self.core.di_forkoff as usize * XFS_DINODE_FORKOFF_UNIT
        } else {
            self.raw.len()
        };
        (start, end)
    }
}

impl ForkSource for Inode {
    fn ino(&self) -> u64 {
        self.ino
    }

    fn fork_format(&self, which: WhichFork) -> u8 {
        match which {
            WhichFork::Data => self.core.di_format,
            WhichFork::Attr => self.core.di_aformat,
        }
    }

    fn fork_raw_bytes(&self, which: WhichFork) -> &[u8] {
        let (start, end) = self.data_range();
        match which {
            WhichFork::Data => &self.raw[start..end],
            WhichFork::Attr if self.has_attr_fork() => &self.raw[end..],
            WhichFork::Attr => &[],
        }
    }

    fn extent_count(&self, which: WhichFork) -> u64 {
        match which {
            WhichFork::Data => self.core.di_nextents,
            WhichFork::Attr => self.core.di_anextents as u64,
        }
    }

    fn is_realtime(&self) -> bool {
        self.flags().contains(DinodeFlags::REALTIME)
    }
}
