//! 单元测试用的内存取块器和节点构造函数

use crate::{
    block::{Block, BlockFetch},
    consts::*,
    error::{Error, ErrorKind, Result},
    extent::{encode_extent_array, encode_leaf, encode_node, encode_root, Extent},
    fork::{Fork, ForkFormat, ForkSource, WhichFork},
    superblock::Geometry,
    types::xfs_btree_lblock,
};
use alloc::{collections::BTreeMap, vec::Vec};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Crc {
    Yes,
    No,
}

/// 已写入的 extent
pub fn ext(file_offset: u64, physical_block: u64, block_count: u64) -> Extent {
    Extent::new(file_offset, physical_block, block_count, false)
}

/// 内存取块器，记录取块顺序
pub struct MemFetch {
    block_size: usize,
    blocks: BTreeMap<u64, Vec<u8>>,
    fetched: Vec<u64>,
    geometry: Option<Geometry>,
}

impl MemFetch {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            blocks: BTreeMap::new(),
            fetched: Vec::new(),
            geometry: None,
        }
    }

    pub fn insert(&mut self, fsbno: u64, data: Vec<u8>) {
        assert_eq!(data.len(), self.block_size);
        self.blocks.insert(fsbno, data);
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = Some(geometry);
    }

    pub fn fetched(&self) -> &[u64] {
        &self.fetched
    }
}

impl BlockFetch for MemFetch {
    fn fetch(&mut self, fsbno: u64) -> Result<Block> {
        self.fetched.push(fsbno);
        self.blocks
            .get(&fsbno)
            .map(|data| Block::new(fsbno, data.clone()))
            .ok_or(Error::new(ErrorKind::NotFound, "no such block"))
    }

    fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }
}

/// 长格式块头；v5 块的 `bb_blkno` 留给调用者填写
pub fn lblock(crc: Crc, owner: u64, level: u16, rightsib: u64) -> xfs_btree_lblock {
    xfs_btree_lblock {
        bb_magic: if crc == Crc::Yes { XFS_BMAP_CRC_MAGIC } else { XFS_BMAP_MAGIC },
        bb_level: level,
        bb_leftsib: NULLFSBLOCK,
        bb_rightsib: rightsib,
        bb_owner: owner,
        ..Default::default()
    }
}

/// 构造叶子块
pub fn leaf_block(block_size: usize, crc: Crc, owner: u64, rightsib: u64, recs: &[Extent]) -> Vec<u8> {
    encode_leaf(block_size, &lblock(crc, owner, 0, rightsib), recs).unwrap()
}

/// 构造内部节点块
pub fn node_block(
    block_size: usize,
    crc: Crc,
    owner: u64,
    level: u16,
    rightsib: u64,
    keyptrs: &[(u64, u64)],
) -> Vec<u8> {
    encode_node(block_size, &lblock(crc, owner, level, rightsib), keyptrs).unwrap()
}

/// 构造 inode 内的根节点（整个 fork）
pub fn bmdr_root(fork_size: usize, level: u16, keyptrs: &[(u64, u64)]) -> Vec<u8> {
    encode_root(fork_size, level, keyptrs).unwrap()
}

/// 构造 extent 数组 fork
pub fn extent_array(fork_size: usize, recs: &[Extent]) -> Vec<u8> {
    encode_extent_array(fork_size, recs).unwrap()
}

/// 512 字节块、单个 AG 的几何信息（块号与扇区号相同）
pub fn small_geometry(crc: Crc) -> Geometry {
    Geometry {
        block_size: 512,
        block_log: 9,
        sect_size: 512,
        ag_blocks: 1000,
        ag_count: 1,
        ag_blk_log: 10,
        inode_size: 256,
        inop_blog: 1,
        has_crc: crc == Crc::Yes,
    }
}

pub fn btree_fork(ino: u64, data: &[u8]) -> Fork<'_> {
    Fork {
        ino,
        which: WhichFork::Data,
        format: ForkFormat::Btree,
        nextents: 0,
        data,
        realtime: false,
    }
}

pub fn array_fork(ino: u64, data: &[u8], nextents: u64) -> Fork<'_> {
    Fork {
        ino,
        which: WhichFork::Data,
        format: ForkFormat::Extents,
        nextents,
        data,
        realtime: false,
    }
}

/// 只有数据 fork 的测试 inode
pub struct FakeInode {
    pub ino: u64,
    pub format: u8,
    pub data: Vec<u8>,
    pub nextents: u64,
    pub attr_format: u8,
    pub attr: Vec<u8>,
    pub anextents: u64,
}

impl FakeInode {
    pub fn new(ino: u64, format: u8, data: Vec<u8>, nextents: u64) -> Self {
        Self {
            ino,
            format,
            data,
            nextents,
            attr_format: XFS_DINODE_FMT_EXTENTS,
            attr: Vec::new(),
            anextents: 0,
        }
    }
}

impl ForkSource for FakeInode {
    fn ino(&self) -> u64 {
        self.ino
    }

    fn fork_format(&self, which: WhichFork) -> u8 {
        match which {
            WhichFork::Data => self.format,
            WhichFork::Attr => self.attr_format,
        }
    }

    fn fork_raw_bytes(&self, which: WhichFork) -> &[u8] {
        match which {
            WhichFork::Data => &self.data,
            WhichFork::Attr => &self.attr,
        }
    }

    fn extent_count(&self, which: WhichFork) -> u64 {
        match which {
            WhichFork::Data => self.nextents,
            WhichFork::Attr => self.anextents,
        }
    }
}
