//! 按文件系统块号取块

use crate::{error::Result, superblock::Geometry};
use alloc::vec::Vec;
use log::trace;

/// 已取出的文件系统块
///
/// 持有块数据的所有权，drop 时即视为释放。
#[derive(Debug)]
pub struct Block {
    fsbno: u64,
    data: Vec<u8>,
}

impl Block {
    pub fn new(fsbno: u64, data: Vec<u8>) -> Self {
        Self { fsbno, data }
    }

    /// 块号
    pub fn fsbno(&self) -> u64 {
        self.fsbno
    }

    /// 块数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        trace!("release block {}", self.fsbno);
    }
}

/// 取块接口
///
/// 解析器通过它按文件系统块号读取 btree 节点。实现者负责缓存与重试，
/// 地址无效时返回 `ErrorKind::NotFound`，读取失败时返回 `ErrorKind::Io`。
pub trait BlockFetch {
    /// 读取一个文件系统块
    fn fetch(&mut self, fsbno: u64) -> Result<Block>;

    /// 文件系统几何信息（用于校验 extent 的物理范围）
    fn geometry(&self) -> Option<&Geometry> {
        None
    }
}

impl<T: BlockFetch + ?Sized> BlockFetch for &mut T {
    fn fetch(&mut self, fsbno: u64) -> Result<Block> {
        (**self).fetch(fsbno)
    }

    fn geometry(&self) -> Option<&Geometry> {
        (**self).geometry()
    }
}
