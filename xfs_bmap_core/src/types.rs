//! XFS 磁盘数据结构
//!
//! 设计原则：
//! 1. 结构体名、字段名遵循 C 定义（xfs_format.h），便于对照
//! 2. 解析全部基于带边界检查的字节切片，不做裸指针转换
//! 3. 磁盘上为大端序，CRC 字段为小端序

// 允许C风格命名（这是有意为之，便于对照C代码实现）
#![allow(non_camel_case_types)]

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
};
use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

bitflags! {
    /// Inode 标志（di_flags）
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DinodeFlags: u16 {
        const REALTIME = 0x0001;
        const PREALLOC = 0x0002;
        const NEWRTBM = 0x0004;
        const IMMUTABLE = 0x0008;
        const APPEND = 0x0010;
        const SYNC = 0x0020;
        const NOATIME = 0x0040;
        const NODUMP = 0x0080;
        const RTINHERIT = 0x0100;
        const PROJINHERIT = 0x0200;
        const NOSYMLINKS = 0x0400;
        const EXTSIZE = 0x0800;
        const EXTSZINHERIT = 0x1000;
        const NODEFRAG = 0x2000;
        const FILESTREAM = 0x4000;
    }
}

bitflags! {
    /// Inode 扩展标志（di_flags2，仅 v3）
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DinodeFlags2: u64 {
        const DAX = 1 << 0;
        const REFLINK = 1 << 1;
        const COWEXTSIZE = 1 << 2;
        const BIGTIME = 1 << 3;
        /// 64 位 extent 计数器
        const NREXT64 = 1 << 4;
        const METADATA = 1 << 5;
    }
}

bitflags! {
    /// Superblock 不兼容特性（sb_features_incompat，仅 v5）
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SbFeatIncompat: u32 {
        const FTYPE = 1 << 0;
        const SPINODES = 1 << 1;
        const META_UUID = 1 << 2;
        const BIGTIME = 1 << 3;
        const NEEDSREPAIR = 1 << 4;
        const NREXT64 = 1 << 5;
        const EXCHRANGE = 1 << 6;
        const PARENT = 1 << 7;
        const METADIR = 1 << 8;
        const ZONED = 1 << 9;
    }
}

/// 检查缓冲区长度
fn need(buf: &[u8], len: usize, what: &'static str) -> Result<()> {
    if buf.len() < len {
        return Err(Error::new(ErrorKind::Corrupted, what));
    }
    Ok(())
}

/// 打包的 extent 记录
///
/// 对应C定义: struct xfs_bmbt_rec (xfs_format.h)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct xfs_bmbt_rec {
    pub l0: u64, // 0: flag(1) | startoff(54) | startblock 高 9 位
    pub l1: u64, // 8: startblock 低 43 位 | blockcount(21)
}

impl xfs_bmbt_rec {
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < XFS_BMBT_REC_SIZE {
            return Err(Error::new(
                ErrorKind::MalformedRecord,
                "extent record truncated",
            ));
        }
        Ok(Self {
            l0: BigEndian::read_u64(&buf[0..8]),
            l1: BigEndian::read_u64(&buf[8..16]),
        })
    }

    pub fn to_bytes(&self) -> [u8; XFS_BMBT_REC_SIZE] {
        let mut buf = [0u8; XFS_BMBT_REC_SIZE];
        BigEndian::write_u64(&mut buf[0..8], self.l0);
        BigEndian::write_u64(&mut buf[8..16], self.l1);
        buf
    }
}

/// inode 内的 bmap btree 根节点头
///
/// 对应C定义: struct xfs_bmdr_block (xfs_format.h)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct xfs_bmdr_block {
    pub bb_level: u16,   // 0: 层级（根节点必定 >= 1）
    pub bb_numrecs: u16, // 2: 键/指针对数量
}

impl xfs_bmdr_block {
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        need(buf, XFS_BMDR_BLOCK_LEN, "bmdr root truncated")?;
        Ok(Self {
            bb_level: BigEndian::read_u16(&buf[0..2]),
            bb_numrecs: BigEndian::read_u16(&buf[2..4]),
        })
    }

    pub fn write_to(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < XFS_BMDR_BLOCK_LEN {
            return Err(Error::new(ErrorKind::InvalidInput, "buffer too small for bmdr header"));
        }
        BigEndian::write_u16(&mut buf[0..2], self.bb_level);
        BigEndian::write_u16(&mut buf[2..4], self.bb_numrecs);
        Ok(())
    }

    /// fork 大小对应的最大键/指针对数
    ///
    /// 对应 `xfs_bmdr_maxrecs(blocklen, leaf = 0)`
    pub fn maxrecs(fork_size: usize) -> usize {
        fork_size.saturating_sub(XFS_BMDR_BLOCK_LEN) / (XFS_BMBT_KEY_SIZE + XFS_BMBT_PTR_SIZE)
    }
}

/// 长格式 btree 块头
///
/// 对应C定义: struct xfs_btree_block + xfs_btree_block_lhdr (xfs_format.h)
/// v5 (BMA3) 才有 blkno 之后的字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct xfs_btree_lblock {
    pub bb_magic: u32,      // 0: 魔数
    pub bb_level: u16,      // 4: 层级（0 为叶子）
    pub bb_numrecs: u16,    // 6: 记录数
    pub bb_leftsib: u64,    // 8: 左兄弟
    pub bb_rightsib: u64,   // 16: 右兄弟
    pub bb_blkno: u64,      // 24: 本块磁盘地址（v5）
    pub bb_lsn: u64,        // 32: 最后写入的 LSN（v5）
    pub bb_uuid: [u8; 16],  // 40: 文件系统 UUID（v5）
    pub bb_owner: u64,      // 56: 所属 inode（v5）
    pub bb_crc: u32,        // 64: CRC32C（v5，小端）
}

impl xfs_btree_lblock {
    /// 是否为 v5 带 CRC 的块
    pub fn is_crc(&self) -> bool {
        self.bb_magic == XFS_BMAP_CRC_MAGIC
    }

    pub fn is_valid_magic(&self) -> bool {
        self.bb_magic == XFS_BMAP_MAGIC || self.bb_magic == XFS_BMAP_CRC_MAGIC
    }

    /// 块头长度
    pub fn header_len(&self) -> usize {
        if self.is_crc() {
            XFS_BTREE_LBLOCK_CRC_LEN
        } else {
            XFS_BTREE_LBLOCK_LEN
        }
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        need(buf, XFS_BTREE_LBLOCK_LEN, "btree block truncated")?;
        let mut block = Self {
            bb_magic: BigEndian::read_u32(&buf[0..4]),
            bb_level: BigEndian::read_u16(&buf[4..6]),
            bb_numrecs: BigEndian::read_u16(&buf[6..8]),
            bb_leftsib: BigEndian::read_u64(&buf[8..16]),
            bb_rightsib: BigEndian::read_u64(&buf[16..24]),
            ..Self::default()
        };
        if block.is_crc() {
            need(buf, XFS_BTREE_LBLOCK_CRC_LEN, "btree block truncated")?;
            block.bb_blkno = BigEndian::read_u64(&buf[24..32]);
            block.bb_lsn = BigEndian::read_u64(&buf[32..40]);
            block.bb_uuid.copy_from_slice(&buf[40..56]);
            block.bb_owner = BigEndian::read_u64(&buf[56..64]);
            block.bb_crc = LittleEndian::read_u32(&buf[64..68]);
        }
        Ok(block)
    }

    /// 写入块头（不计算 CRC）
    pub fn write_to(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < self.header_len() {
            return Err(Error::new(ErrorKind::InvalidInput, "buffer too small for btree header"));
        }
        BigEndian::write_u32(&mut buf[0..4], self.bb_magic);
        BigEndian::write_u16(&mut buf[4..6], self.bb_level);
        BigEndian::write_u16(&mut buf[6..8], self.bb_numrecs);
        BigEndian::write_u64(&mut buf[8..16], self.bb_leftsib);
        BigEndian::write_u64(&mut buf[16..24], self.bb_rightsib);
        if self.is_crc() {
            BigEndian::write_u64(&mut buf[24..32], self.bb_blkno);
            BigEndian::write_u64(&mut buf[32..40], self.bb_lsn);
            buf[40..56].copy_from_slice(&self.bb_uuid);
            BigEndian::write_u64(&mut buf[56..64], self.bb_owner);
            LittleEndian::write_u32(&mut buf[64..68], self.bb_crc);
            buf[68..72].fill(0);
        }
        Ok(())
    }

    /// 块大小对应的最大记录数（叶子与内部节点相同，都是 16 字节一项）
    ///
    /// 对应 `xfs_bmbt_maxrecs(mp, blocklen, leaf)`
    pub fn maxrecs(&self, block_size: usize) -> usize {
        block_size.saturating_sub(self.header_len()) / XFS_BMBT_REC_SIZE
    }
}

/// Inode core（只解析 bmap 需要的字段）
///
/// 对应C定义: struct xfs_dinode (xfs_format.h)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct xfs_dinode {
    pub di_magic: u16,       // 0: 魔数 (0x494e)
    pub di_mode: u16,        // 2: 文件模式
    pub di_version: u8,      // 4: inode 版本
    pub di_format: u8,       // 5: 数据 fork 格式
    pub di_size: u64,        // 56: 文件大小
    pub di_nblocks: u64,     // 64: 占用块数
    pub di_nextents: u64,    // 76 或 24: 数据 fork extent 数
    pub di_anextents: u32,   // 80 或 76: 属性 fork extent 数
    pub di_forkoff: u8,      // 82: 属性 fork 偏移（8 字节为单位）
    pub di_aformat: u8,      // 83: 属性 fork 格式
    pub di_flags: u16,       // 90: 标志
    pub di_flags2: u64,      // 120: 扩展标志（v3）
    pub di_crc: u32,         // 100: CRC32C（v3，小端）
    pub di_ino: u64,         // 152: inode 编号（v3）
}

impl xfs_dinode {
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        need(buf, XFS_DINODE_CORE_SIZE_V2, "inode core truncated")?;
        let mut dip = Self {
            di_magic: BigEndian::read_u16(&buf[0..2]),
            di_mode: BigEndian::read_u16(&buf[2..4]),
            di_version: buf[4],
            di_format: buf[5],
            di_size: BigEndian::read_u64(&buf[56..64]),
            di_nblocks: BigEndian::read_u64(&buf[64..72]),
            di_forkoff: buf[82],
            di_aformat: buf[83],
            di_flags: BigEndian::read_u16(&buf[90..92]),
            ..Self::default()
        };
        if dip.di_version >= 3 {
            need(buf, XFS_DINODE_CORE_SIZE_V3, "inode core truncated")?;
            dip.di_crc = LittleEndian::read_u32(&buf[100..104]);
            dip.di_flags2 = BigEndian::read_u64(&buf[120..128]);
            dip.di_ino = BigEndian::read_u64(&buf[152..160]);
        }
        if dip.flags2().contains(DinodeFlags2::NREXT64) {
            dip.di_nextents = BigEndian::read_u64(&buf[24..32]);
            dip.di_anextents = BigEndian::read_u32(&buf[76..80]);
        } else {
            dip.di_nextents = BigEndian::read_u32(&buf[76..80]) as u64;
            dip.di_anextents = BigEndian::read_u16(&buf[80..82]) as u32;
        }
        Ok(dip)
    }

    pub fn is_valid(&self) -> bool {
        self.di_magic == XFS_DINODE_MAGIC && (1..=3).contains(&self.di_version)
    }

    pub fn flags(&self) -> DinodeFlags {
        DinodeFlags::from_bits_truncate(self.di_flags)
    }

    pub fn flags2(&self) -> DinodeFlags2 {
        DinodeFlags2::from_bits_truncate(self.di_flags2)
    }

    /// inode core 大小
    ///
    /// 对应 `xfs_dinode_size(version)`
    pub fn core_size(&self) -> usize {
        if self.di_version >= 3 {
            XFS_DINODE_CORE_SIZE_V3
        } else {
            XFS_DINODE_CORE_SIZE_V2
        }
    }
}

/// Superblock（只解析 bmap 需要的字段）
///
/// 对应C定义: struct xfs_dsb (xfs_format.h)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct xfs_dsb {
    pub sb_magicnum: u32,          // 0: 魔数 ("XFSB")
    pub sb_blocksize: u32,         // 4: 块大小
    pub sb_dblocks: u64,           // 8: 数据块总数
    pub sb_rblocks: u64,           // 16: 实时块总数
    pub sb_uuid: [u8; 16],         // 32: 文件系统 UUID
    pub sb_rootino: u64,           // 56: 根目录 inode
    pub sb_agblocks: u32,          // 84: 每个 AG 的块数
    pub sb_agcount: u32,           // 88: AG 数量
    pub sb_versionnum: u16,        // 100: 版本号与特性位
    pub sb_sectsize: u16,          // 102: 扇区大小
    pub sb_inodesize: u16,         // 104: inode 大小
    pub sb_inopblock: u16,         // 106: 每块 inode 数
    pub sb_blocklog: u8,           // 120: log2(blocksize)
    pub sb_sectlog: u8,            // 121: log2(sectsize)
    pub sb_inodelog: u8,           // 122: log2(inodesize)
    pub sb_inopblog: u8,           // 123: log2(inopblock)
    pub sb_agblklog: u8,           // 124: log2(agblocks) 向上取整
    pub sb_features_incompat: u32, // 216: 不兼容特性（v5）
    pub sb_crc: u32,               // 224: CRC32C（v5，小端）
}

impl xfs_dsb {
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        need(buf, XFS_SB_SIZE, "superblock truncated")?;
        let mut sb = Self {
            sb_magicnum: BigEndian::read_u32(&buf[0..4]),
            sb_blocksize: BigEndian::read_u32(&buf[4..8]),
            sb_dblocks: BigEndian::read_u64(&buf[8..16]),
            sb_rblocks: BigEndian::read_u64(&buf[16..24]),
            sb_rootino: BigEndian::read_u64(&buf[56..64]),
            sb_agblocks: BigEndian::read_u32(&buf[84..88]),
            sb_agcount: BigEndian::read_u32(&buf[88..92]),
            sb_versionnum: BigEndian::read_u16(&buf[100..102]),
            sb_sectsize: BigEndian::read_u16(&buf[102..104]),
            sb_inodesize: BigEndian::read_u16(&buf[104..106]),
            sb_inopblock: BigEndian::read_u16(&buf[106..108]),
            sb_blocklog: buf[120],
            sb_sectlog: buf[121],
            sb_inodelog: buf[122],
            sb_inopblog: buf[123],
            sb_agblklog: buf[124],
            sb_features_incompat: BigEndian::read_u32(&buf[216..220]),
            sb_crc: LittleEndian::read_u32(&buf[224..228]),
            ..Self::default()
        };
        sb.sb_uuid.copy_from_slice(&buf[32..48]);
        Ok(sb)
    }

    pub fn is_valid(&self) -> bool {
        self.sb_magicnum == XFS_SB_MAGIC
    }

    /// 是否为 v5（带 CRC）文件系统
    pub fn has_crc(&self) -> bool {
        self.sb_versionnum & XFS_SB_VERSION_NUMBITS == XFS_SB_VERSION_5
    }

    pub fn features_incompat(&self) -> SbFeatIncompat {
        SbFeatIncompat::from_bits_truncate(self.sb_features_incompat)
    }
}
