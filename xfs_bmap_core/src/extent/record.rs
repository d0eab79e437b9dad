//! 打包 extent 记录编解码
//!
//! 一条记录是两个大端 u64：
//!
//! ```text
//! l0: [63] unwritten | [62..9] startoff (54) | [8..0] startblock 高 9 位
//! l1: [63..21] startblock 低 43 位 | [20..0] blockcount (21)
//! ```

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
    fork::{Fork, WhichFork},
    superblock::Geometry,
    types::xfs_bmbt_rec,
};

/// startblock 在 l1 中的位数
const STARTBLOCK_LO_BITS: u32 = 64 - BMBT_BLOCKCOUNT_BITLEN;
const STARTBLOCK_LO_MASK: u64 = (1 << STARTBLOCK_LO_BITS) - 1;
/// startoff 在 l0 中的位移
const STARTOFF_SHIFT: u32 = BMBT_STARTBLOCK_BITLEN - STARTBLOCK_LO_BITS;

/// 解码后的 extent
///
/// 对应 `struct xfs_bmbt_irec`，所有数值均为无符号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    /// 文件内起始逻辑块
    pub file_offset: u64,
    /// 起始物理块（fsbno，实时文件则为 rtblock）
    pub physical_block: u64,
    /// 块数（>= 1）
    pub block_count: u64,
    /// 已分配但未写入（预分配）
    pub is_unwritten: bool,
}

impl Extent {
    pub fn new(file_offset: u64, physical_block: u64, block_count: u64, is_unwritten: bool) -> Self {
        Self {
            file_offset,
            physical_block,
            block_count,
            is_unwritten,
        }
    }

    /// 结束逻辑块（不含）
    ///
    /// 解码得到的 extent 满足 `end() <= XFS_MAX_FILEOFF`；`new` 不做检查，
    /// 越界时饱和到 `u64::MAX`。
    pub fn end(&self) -> u64 {
        self.file_offset.saturating_add(self.block_count)
    }

    /// 最后一个逻辑块
    ///
    /// 空 extent（`block_count == 0`）没有最后一块，返回 `file_offset`。
    pub fn last(&self) -> u64 {
        self.end().saturating_sub(1).max(self.file_offset)
    }

    /// 打印用的状态标志
    pub fn flag(&self) -> u8 {
        self.is_unwritten as u8
    }

    /// 解码一条磁盘记录
    ///
    /// 对应 `xfs_bmbt_disk_get_all()`，另外拒绝长度为 0 或越过偏移域的记录。
    pub fn decode(rec: &xfs_bmbt_rec) -> Result<Self> {
        let is_unwritten = rec.l0 >> 63 != 0;
        let file_offset = (rec.l0 >> STARTOFF_SHIFT) & BMBT_STARTOFF_MASK;
        let physical_block = ((rec.l0 & ((1 << STARTOFF_SHIFT) - 1)) << STARTBLOCK_LO_BITS)
            | (rec.l1 >> BMBT_BLOCKCOUNT_BITLEN);
        let block_count = rec.l1 & BMBT_BLOCKCOUNT_MASK;

        if block_count == 0 {
            return Err(Error::new(
                ErrorKind::MalformedRecord,
                "extent record has zero length",
            ));
        }
        if file_offset + block_count > XFS_MAX_FILEOFF {
            return Err(Error::new(
                ErrorKind::MalformedRecord,
                "extent record runs past the maximum file offset",
            ));
        }

        Ok(Self {
            file_offset,
            physical_block,
            block_count,
            is_unwritten,
        })
    }

    /// 从字节切片解码
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        Self::decode(&xfs_bmbt_rec::from_bytes(buf)?)
    }

    /// 编码为磁盘记录
    ///
    /// 对应 `xfs_bmbt_disk_set_all()`，字段超出位宽时返回错误而不是截断。
    pub fn encode(&self) -> Result<xfs_bmbt_rec> {
        if self.block_count == 0 || self.block_count > BMBT_BLOCKCOUNT_MASK {
            return Err(Error::new(ErrorKind::InvalidInput, "block count out of range"));
        }
        if self.physical_block > BMBT_STARTBLOCK_MASK {
            return Err(Error::new(ErrorKind::InvalidInput, "start block out of range"));
        }
        if self.file_offset > BMBT_STARTOFF_MASK
            || self.file_offset + self.block_count > XFS_MAX_FILEOFF
        {
            return Err(Error::new(ErrorKind::InvalidInput, "file offset out of range"));
        }

        let l0 = ((self.is_unwritten as u64) << 63)
            | (self.file_offset << STARTOFF_SHIFT)
            | (self.physical_block >> STARTBLOCK_LO_BITS);
        let l1 = ((self.physical_block & STARTBLOCK_LO_MASK) << BMBT_BLOCKCOUNT_BITLEN)
            | self.block_count;
        Ok(xfs_bmbt_rec { l0, l1 })
    }

    /// 检查 extent 是否适合所在的 fork
    ///
    /// 对应 `xfs_bmap_validate_extent_raw()`：属性 fork 不允许未写入 extent；
    /// 已知几何信息时，非实时的物理范围必须落在单个 AG 内。
    pub fn validate(&self, fork: &Fork<'_>, geometry: Option<&Geometry>) -> Result<()> {
        if self.is_unwritten && fork.which != WhichFork::Data {
            return Err(Error::new(
                ErrorKind::MalformedRecord,
                "unwritten extent in attribute fork",
            ));
        }
        if let Some(geo) = geometry {
            if !fork.is_rt_data() && !geo.verify_fsbext(self.physical_block, self.block_count) {
                return Err(Error::new(
                    ErrorKind::MalformedRecord,
                    "extent maps blocks outside its allocation group",
                ));
            }
        }
        Ok(())
    }
}
