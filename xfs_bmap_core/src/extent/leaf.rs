//! 叶子记录扫描
//!
//! 对 extent 数组或 btree 叶子链按文件偏移顺序逐条检查记录，
//! 将与请求范围相交的部分裁剪后收集起来。

use super::{Extent, LeafNode};
use crate::{
    block::BlockFetch,
    consts::*,
    error::{Error, ErrorKind, Result},
    fork::Fork,
    superblock::Geometry,
};
use alloc::vec::Vec;
use log::{trace, warn};

/// 叶子记录读取器
///
/// 持有请求范围 `[offset, eoffset]` 和游标 `curoffset`。每条记录按以下规则处理：
///
/// 1. 整条记录在游标之前：跳过
/// 2. 记录起点超过 `eoffset`：停止
/// 3. 否则裁掉游标之前和 `eoffset` 之后的部分，输出，并把游标移到输出之后
pub struct LeafReader {
    curoffset: u64,
    eoffset: u64,
    max_extents: usize,
    extents: Vec<Extent>,
    /// 上一条原始记录的结束位置，用于检查记录顺序
    prev_end: Option<u64>,
}

impl LeafReader {
    /// 创建读取器
    ///
    /// # 参数
    ///
    /// * `offset` - 起始逻辑块
    /// * `length` - 块数（>= 1）
    /// * `max_extents` - 最多输出的 extent 数（>= 1）
    pub fn new(offset: u64, length: u64, max_extents: usize) -> Result<Self> {
        if length == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "bmap length must be at least 1"));
        }
        if max_extents == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "bmap needs room for one extent"));
        }
        let eoffset = offset
            .checked_add(length - 1)
            .ok_or(Error::new(ErrorKind::InvalidInput, "bmap range overflows"))?;

        Ok(Self {
            curoffset: offset,
            eoffset,
            max_extents,
            extents: Vec::new(),
            prev_end: None,
        })
    }

    /// 当前游标
    pub fn cursor(&self) -> u64 {
        self.curoffset
    }

    /// 已收集的 extent
    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    pub fn into_extents(self) -> Vec<Extent> {
        self.extents
    }

    pub fn is_full(&self) -> bool {
        self.extents.len() >= self.max_extents
    }

    /// 处理一条记录，返回是否还需要后续记录
    ///
    /// 已收满或游标越过 `eoffset` 时返回 false，调用者不必再读取兄弟叶子。
    ///
    /// 对应 `bmap_one_extent()`
    pub fn offer(&mut self, ext: Extent) -> bool {
        if ext.end() <= self.curoffset {
            return true;
        }
        if ext.file_offset > self.eoffset {
            return false;
        }

        let mut out = ext;
        if out.file_offset < self.curoffset {
            let delta = self.curoffset - out.file_offset;
            out.block_count -= delta;
            out.physical_block += delta;
            out.file_offset = self.curoffset;
        }
        if out.last() > self.eoffset {
            out.block_count -= out.last() - self.eoffset;
        }

        trace!(
            "bmap: emit offset={} block={} count={} flag={}",
            out.file_offset,
            out.physical_block,
            out.block_count,
            out.flag()
        );
        self.curoffset = out.end();
        self.extents.push(out);
        !self.is_full() && self.curoffset <= self.eoffset
    }

    fn check_order(&mut self, ext: &Extent, kind: ErrorKind) -> Result<()> {
        if self.prev_end.is_some_and(|end| ext.file_offset < end) {
            warn!(
                "bmap: record at offset {} overlaps previous record ending at {:?}",
                ext.file_offset, self.prev_end
            );
            return Err(Error::new(kind, "extent records overlap or are out of order"));
        }
        self.prev_end = Some(ext.end());
        Ok(())
    }

    /// 扫描 inode 内的 extent 数组
    pub fn scan_array(&mut self, fork: &Fork<'_>, geometry: Option<&Geometry>) -> Result<()> {
        let count = usize::try_from(fork.nextents)
            .ok()
            .filter(|n| {
                n.checked_mul(XFS_BMBT_REC_SIZE)
                    .is_some_and(|bytes| bytes <= fork.size())
            })
            .ok_or(Error::new(
                ErrorKind::Corrupted,
                "extent count does not fit in the fork",
            ))?;

        for rec in fork.data.chunks_exact(XFS_BMBT_REC_SIZE).take(count) {
            let ext = Extent::from_bytes(rec)?;
            ext.validate(fork, geometry)?;
            self.check_order(&ext, ErrorKind::Corrupted)?;
            if !self.offer(ext) {
                break;
            }
        }
        Ok(())
    }

    /// 从 `leaf` 开始扫描叶子链
    ///
    /// 当前叶子读完后先释放，再读取右兄弟；请求已满足或没有兄弟时停止。
    pub fn scan_chain<F: BlockFetch + ?Sized>(
        &mut self,
        fetch: &mut F,
        fork: &Fork<'_>,
        leaf: LeafNode,
    ) -> Result<()> {
        let geometry = fetch.geometry().copied();
        let mut leaf = leaf;

        loop {
            for i in 0..leaf.numrecs() {
                let ext = leaf.extent(i)?;
                ext.validate(fork, geometry.as_ref())?;
                self.check_order(&ext, ErrorKind::CorruptTree)?;
                if !self.offer(ext) {
                    return Ok(());
                }
            }

            let Some(next) = leaf.right_sibling() else {
                return Ok(());
            };
            trace!("bmap: leaf {} exhausted, moving to {}", leaf.fsbno(), next);
            drop(leaf);
            leaf = LeafNode::fetch(fetch, next, fork.ino)?;
        }
    }
}
