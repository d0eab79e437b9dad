//! Superblock 读取和验证

use super::Geometry;
use crate::{
    block::{BlockDev, BlockDevice},
    consts::*,
    crc::xfs_verify_cksum,
    error::{Error, ErrorKind, Result},
    types::{xfs_dsb, SbFeatIncompat},
};
use alloc::vec;
use log::{debug, warn};

/// 从块设备读取主 superblock
///
/// # 参数
///
/// * `bdev` - 块设备引用
///
/// # 返回
///
/// 成功返回 superblock 结构
pub fn read_superblock<D: BlockDevice>(bdev: &mut BlockDev<D>) -> Result<xfs_dsb> {
    let mut sb_buf = vec![0u8; BBSIZE];
    bdev.read_bytes(XFS_SB_OFFSET, &mut sb_buf)?;

    let sb = xfs_dsb::from_bytes(&sb_buf)?;
    if !sb.is_valid() {
        return Err(Error::new(
            ErrorKind::Corrupted,
            "Invalid XFS superblock magic number",
        ));
    }

    // CRC 覆盖整个扇区
    if cfg!(feature = "verify-crc") && sb.has_crc() {
        let sect_size = sb.sb_sectsize as usize;
        if sect_size > sb_buf.len() {
            sb_buf = vec![0u8; sect_size];
            bdev.read_bytes(XFS_SB_OFFSET, &mut sb_buf)?;
        }
        if !xfs_verify_cksum(&sb_buf[..sect_size], XFS_SB_CRC_OFF) {
            warn!("superblock CRC mismatch");
            return Err(Error::new(ErrorKind::Corrupted, "superblock CRC mismatch"));
        }
    }

    Ok(sb)
}

/// Superblock 包装器，提供高级操作
pub struct Superblock {
    inner: xfs_dsb,
    geometry: Geometry,
}

impl Superblock {
    /// 从块设备加载 superblock
    pub fn load<D: BlockDevice>(bdev: &mut BlockDev<D>) -> Result<Self> {
        let inner = read_superblock(bdev)?;
        Self::from_raw(inner)
    }

    /// 从已解析的 superblock 构造，并检查几何字段的一致性
    pub fn from_raw(inner: xfs_dsb) -> Result<Self> {
        let geometry = check_geometry(&inner)?;
        let feat = inner.features_incompat();
        if inner.has_crc() && feat.contains(SbFeatIncompat::NEEDSREPAIR) {
            warn!("filesystem is flagged as needing repair");
        }
        debug!(
            "superblock: blocksize={} agblocks={} agcount={} v5={}",
            geometry.block_size, geometry.ag_blocks, geometry.ag_count, geometry.has_crc
        );
        Ok(Self { inner, geometry })
    }

    /// 获取内部 superblock 结构的引用
    pub fn inner(&self) -> &xfs_dsb {
        &self.inner
    }

    /// 获取几何信息
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// 获取块大小
    pub fn block_size(&self) -> u32 {
        self.geometry.block_size
    }

    /// 获取 inode 大小
    pub fn inode_size(&self) -> u16 {
        self.geometry.inode_size
    }

    /// 获取数据块总数
    pub fn blocks_count(&self) -> u64 {
        self.inner.sb_dblocks
    }

    /// 获取 AG 数量
    pub fn ag_count(&self) -> u32 {
        self.geometry.ag_count
    }

    /// 获取根目录 inode
    pub fn root_ino(&self) -> u64 {
        self.inner.sb_rootino
    }

    /// 是否为 v5 文件系统
    pub fn has_crc(&self) -> bool {
        self.inner.has_crc()
    }

    /// 获取不兼容特性
    pub fn features_incompat(&self) -> SbFeatIncompat {
        if self.has_crc() {
            self.inner.features_incompat()
        } else {
            SbFeatIncompat::empty()
        }
    }
}

fn check_geometry(sb: &xfs_dsb) -> Result<Geometry> {
    let corrupt = |msg| Err(Error::new(ErrorKind::Corrupted, msg));

    if !(9..=16).contains(&sb.sb_blocklog) || sb.sb_blocksize != 1u32 << sb.sb_blocklog {
        return corrupt("superblock block size is invalid");
    }
    if !(9..=15).contains(&sb.sb_sectlog) || sb.sb_sectsize as u32 != 1u32 << sb.sb_sectlog {
        return corrupt("superblock sector size is invalid");
    }
    if !(8..=11).contains(&sb.sb_inodelog)
        || sb.sb_inodesize as u32 != 1u32 << sb.sb_inodelog
        || sb.sb_inodelog > sb.sb_blocklog
        || sb.sb_inopblog != sb.sb_blocklog - sb.sb_inodelog
        || sb.sb_inopblock as u32 != 1u32 << sb.sb_inopblog
    {
        return corrupt("superblock inode geometry is invalid");
    }
    if sb.sb_agcount == 0
        || sb.sb_agblocks == 0
        || sb.sb_agblklog >= 32
        || sb.sb_agblocks as u64 > 1u64 << sb.sb_agblklog
    {
        return corrupt("superblock AG geometry is invalid");
    }

    Ok(Geometry {
        block_size: sb.sb_blocksize,
        block_log: sb.sb_blocklog,
        sect_size: sb.sb_sectsize,
        ag_blocks: sb.sb_agblocks,
        ag_count: sb.sb_agcount,
        ag_blk_log: sb.sb_agblklog,
        inode_size: sb.sb_inodesize,
        inop_blog: sb.sb_inopblog,
        has_crc: sb.has_crc(),
    })
}
