//! 文件逻辑块到物理块的映射
//!
//! 根据 fork 格式分派：local 没有块映射，extents 直接扫描 inode 内的数组，
//! btree 先从 inode 内的根下降到叶子，再沿叶子链向右扫描。

use crate::{
    block::BlockFetch,
    error::{Error, ErrorKind, Result},
    extent::{descend, Extent, LeafReader},
    fork::{Fork, ForkFormat, ForkSource, WhichFork},
    superblock::Geometry,
};
use alloc::vec::Vec;
use core::fmt;
use log::debug;

/// 一次映射请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmapRequest {
    /// 起始逻辑块
    pub offset: u64,
    /// 块数（>= 1）
    pub length: u64,
    /// 最多返回的 extent 数（>= 1）
    pub max_extents: usize,
}

impl BmapRequest {
    pub fn new(offset: u64, length: u64, max_extents: usize) -> Self {
        Self {
            offset,
            length,
            max_extents,
        }
    }

    /// 从 `offset` 一直到 fork 末尾
    pub fn to_end(offset: u64, max_extents: usize) -> Self {
        Self::new(offset, (u64::MAX - offset).max(1), max_extents)
    }
}

/// 解析一个 fork
///
/// 出错时不返回任何部分结果。
pub fn resolve_fork<F: BlockFetch + ?Sized>(
    fetch: &mut F,
    fork: &Fork<'_>,
    req: &BmapRequest,
) -> Result<Vec<Extent>> {
    let mut reader = LeafReader::new(req.offset, req.length, req.max_extents)?;

    match fork.format {
        ForkFormat::Local => {}
        ForkFormat::Extents => reader.scan_array(fork, fetch.geometry())?,
        ForkFormat::Btree => {
            let leaf = descend(fetch, fork, req.offset)?;
            reader.scan_chain(fetch, fork, leaf)?;
        }
    }

    debug!(
        "bmap: inode {} {} fork offset={} length={} -> {} extents",
        fork.ino,
        fork.which,
        req.offset,
        req.length,
        reader.extents().len()
    );
    Ok(reader.into_extents())
}

/// 解析 inode 某个 fork 在 `[offset, offset + length)` 内的映射
///
/// # 参数
///
/// * `fetch` - 取块接口
/// * `inode` - inode 元数据
/// * `which` - 数据 fork 或属性 fork
/// * `req` - 请求范围
///
/// # 返回
///
/// 按文件偏移升序排列、已裁剪到请求范围内的 extent；落在空洞中时为空
pub fn resolve<F, S>(fetch: &mut F, inode: &S, which: WhichFork, req: &BmapRequest) -> Result<Vec<Extent>>
where
    F: BlockFetch + ?Sized,
    S: ForkSource + ?Sized,
{
    let fork = Fork::from_source(inode, which)?;
    resolve_fork(fetch, &fork, req)
}

/// 同 [`resolve`]，结果写入调用者提供的切片
///
/// 返回写入的个数，不超过 `min(max_extents, out.len())`。出错时切片保持不变。
pub fn resolve_into<F, S>(
    fetch: &mut F,
    inode: &S,
    which: WhichFork,
    req: &BmapRequest,
    out: &mut [Extent],
) -> Result<usize>
where
    F: BlockFetch + ?Sized,
    S: ForkSource + ?Sized,
{
    let req = BmapRequest {
        max_extents: req.max_extents.min(out.len()),
        ..*req
    };
    let extents = resolve(fetch, inode, which, &req)?;
    out[..extents.len()].copy_from_slice(&extents);
    Ok(extents.len())
}

/// 有 extent 的 fork
///
/// 对应 `bmap` 命令未指定 `-a` / `-d` 时的默认选择。
pub fn forks_with_extents<S: ForkSource + ?Sized>(inode: &S) -> Vec<WhichFork> {
    [WhichFork::Data, WhichFork::Attr]
        .into_iter()
        .filter(|&which| inode.extent_count(which) != 0)
        .collect()
}

/// 逐个 extent 遍历 fork
///
/// 每次请求一个 extent，然后把游标移到它之后，直到没有更多映射。
/// 出错后迭代结束。
pub struct ExtentWalker<'a, F: ?Sized, S: ?Sized> {
    fetch: &'a mut F,
    inode: &'a S,
    which: WhichFork,
    cursor: u64,
    end: u64,
    done: bool,
}

impl<'a, F, S> ExtentWalker<'a, F, S>
where
    F: BlockFetch + ?Sized,
    S: ForkSource + ?Sized,
{
    /// 遍历整个 fork
    pub fn new(fetch: &'a mut F, inode: &'a S, which: WhichFork) -> Self {
        Self {
            fetch,
            inode,
            which,
            cursor: 0,
            end: u64::MAX,
            done: false,
        }
    }

    /// 只遍历 `[offset, offset + length)`
    pub fn with_range(mut self, offset: u64, length: u64) -> Self {
        self.cursor = offset;
        self.end = offset.saturating_add(length);
        self
    }

    pub fn which(&self) -> WhichFork {
        self.which
    }
}

impl<F, S> Iterator for ExtentWalker<'_, F, S>
where
    F: BlockFetch + ?Sized,
    S: ForkSource + ?Sized,
{
    type Item = Result<Extent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor >= self.end {
            return None;
        }

        let req = BmapRequest::new(self.cursor, self.end - self.cursor, 1);
        match resolve(&mut *self.fetch, self.inode, self.which, &req) {
            Ok(extents) => match extents.first() {
                Some(ext) => {
                    self.cursor = ext.end();
                    Some(Ok(*ext))
                }
                None => {
                    self.done = true;
                    None
                }
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// 一行 bmap 输出
///
/// 有几何信息时同时给出 `(agno/agbno)`；实时设备文件和没有几何信息时只给出线性块号。
#[derive(Debug, Clone, Copy)]
pub struct BmapEntry {
    pub which: WhichFork,
    pub extent: Extent,
    geometry: Option<Geometry>,
    realtime: bool,
}

impl BmapEntry {
    pub fn new(which: WhichFork, extent: Extent, geometry: Option<&Geometry>, realtime: bool) -> Self {
        Self {
            which,
            extent,
            geometry: geometry.copied(),
            realtime,
        }
    }
}

impl fmt::Display for BmapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = &self.extent;
        match self.geometry {
            Some(geo) if !(self.realtime && self.which == WhichFork::Data) => write!(
                f,
                "{} offset {} startblock {} ({}/{}) count {} flag {}",
                self.which,
                e.file_offset,
                e.physical_block,
                geo.fsb_to_agno(e.physical_block),
                geo.fsb_to_agbno(e.physical_block),
                e.block_count,
                e.flag()
            ),
            _ => write!(
                f,
                "{} offset {} startblock {} count {} flag {}",
                self.which,
                e.file_offset,
                e.physical_block,
                e.block_count,
                e.flag()
            ),
        }
    }
}

/// 以基本块（512 字节）表示的一段磁盘区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BbMapping {
    /// 磁盘地址
    pub daddr: u64,
    /// 基本块数
    pub len: u64,
}

/// 把 extent 转换为磁盘地址区间
///
/// 对应 `make_bbmap()`。实时设备上的块号不能按 AG 换算，直接拒绝。
pub fn make_bbmap(geometry: &Geometry, fork: WhichFork, realtime: bool, extents: &[Extent]) -> Result<Vec<BbMapping>> {
    if realtime && fork == WhichFork::Data {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "realtime extents have no data device address",
        ));
    }
    Ok(extents
        .iter()
        .map(|e| BbMapping {
            daddr: geometry.fsb_to_daddr(e.physical_block),
            len: geometry.fsb_to_bb(e.block_count),
        })
        .collect())
}
