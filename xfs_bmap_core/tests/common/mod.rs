//! 集成测试公共工具：内存块设备和 XFS 镜像构造

#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder};
use std::collections::BTreeMap;
use xfs_bmap_core::{
    crc::xfs_update_cksum,
    extent::{encode_extent_array, encode_leaf, encode_node, encode_root},
    types::xfs_btree_lblock,
    Block, BlockDev, BlockDevice, BlockFetch, Error, ErrorKind, Extent, Geometry, Result,
    Superblock, NULLFSBLOCK, XFS_BMAP_CRC_MAGIC, XFS_BMAP_MAGIC, XFS_DINODE_CRC_OFF,
    XFS_DINODE_MAGIC, XFS_SB_CRC_OFF, XFS_SB_MAGIC,
};

/// 扇区大小
pub const SECTOR_SIZE: usize = 512;
/// 文件系统块大小
pub const BLOCK_SIZE: usize = 1024;
/// inode 大小
pub const INODE_SIZE: usize = 512;
/// 每个 AG 的块数
pub const AG_BLOCKS: u32 = 64;
pub const AG_BLK_LOG: u8 = 6;
pub const AG_COUNT: u32 = 2;

/// 测试镜像的几何信息
pub fn geometry(crc: bool) -> Geometry {
    Geometry {
        block_size: BLOCK_SIZE as u32,
        block_log: 10,
        sect_size: SECTOR_SIZE as u16,
        ag_blocks: AG_BLOCKS,
        ag_count: AG_COUNT,
        ag_blk_log: AG_BLK_LOG,
        inode_size: INODE_SIZE as u16,
        inop_blog: 1,
        has_crc: crc,
    }
}

/// 用于测试的内存块设备
pub struct MemDevice {
    data: Vec<u8>,
}

impl BlockDevice for MemDevice {
    fn sector_size(&self) -> u32 {
        SECTOR_SIZE as u32
    }

    fn total_sectors(&self) -> u64 {
        (self.data.len() / SECTOR_SIZE) as u64
    }

    fn read_sectors(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let start = lba as usize * SECTOR_SIZE;
        let len = count as usize * SECTOR_SIZE;
        if start + len > self.data.len() {
            return Err(Error::new(ErrorKind::Io, "read past end of memory device"));
        }
        buf[..len].copy_from_slice(&self.data[start..start + len]);
        Ok(len)
    }
}

/// 内存 XFS 镜像构造器
pub struct ImageBuilder {
    crc: bool,
    geo: Geometry,
    data: Vec<u8>,
}

impl ImageBuilder {
    pub fn new(crc: bool) -> Self {
        let geo = geometry(crc);
        let size = (AG_BLOCKS * AG_COUNT) as usize * BLOCK_SIZE;
        let mut builder = Self {
            crc,
            geo,
            data: vec![0u8; size],
        };
        builder.write_superblock();
        builder
    }

    pub fn crc(&self) -> bool {
        self.crc
    }

    fn write_superblock(&mut self) {
        let sb = &mut self.data[..SECTOR_SIZE];
        BigEndian::write_u32(&mut sb[0..4], XFS_SB_MAGIC);
        BigEndian::write_u32(&mut sb[4..8], BLOCK_SIZE as u32);
        BigEndian::write_u64(&mut sb[8..16], (AG_BLOCKS * AG_COUNT) as u64);
        BigEndian::write_u64(&mut sb[56..64], 16);
        BigEndian::write_u32(&mut sb[84..88], AG_BLOCKS);
        BigEndian::write_u32(&mut sb[88..92], AG_COUNT);
        BigEndian::write_u16(&mut sb[100..102], if self.crc { 0xb4a5 } else { 0x34a4 });
        BigEndian::write_u16(&mut sb[102..104], SECTOR_SIZE as u16);
        BigEndian::write_u16(&mut sb[104..106], INODE_SIZE as u16);
        BigEndian::write_u16(&mut sb[106..108], 2);
        sb[120] = 10;
        sb[121] = 9;
        sb[122] = 9;
        sb[123] = 1;
        sb[124] = AG_BLK_LOG;
        if self.crc {
            xfs_update_cksum(sb, XFS_SB_CRC_OFF);
        }
    }

    /// 写入一个文件系统块
    pub fn put_block(&mut self, fsbno: u64, block: &[u8]) {
        assert!(self.geo.verify_fsbno(fsbno));
        let off = self.geo.fsb_to_byte(fsbno) as usize;
        self.data[off..off + block.len()].copy_from_slice(block);
    }

    /// 写入一个 inode
    pub fn put_inode(&mut self, ino: u64, raw: &[u8]) {
        assert!(self.geo.verify_ino(ino));
        let off = self.geo.fsb_to_byte(self.geo.ino_to_fsb(ino)) as usize + self.geo.ino_to_offset(ino);
        self.data[off..off + raw.len()].copy_from_slice(raw);
    }

    /// 直接修改镜像字节（用于构造损坏）
    pub fn corrupt_byte(&mut self, fsbno: u64, offset: usize) {
        let off = self.geo.fsb_to_byte(fsbno) as usize + offset;
        self.data[off] ^= 0xff;
    }

    /// 生成未设置几何信息的块设备
    pub fn into_device(self) -> BlockDev<MemDevice> {
        BlockDev::new(MemDevice { data: self.data })
    }

    /// 生成块设备，并按 superblock 设置几何信息
    pub fn open(self) -> BlockDev<MemDevice> {
        let mut bdev = self.into_device();
        let sb = Superblock::load(&mut bdev).unwrap();
        bdev.set_geometry(sb.geometry());
        bdev
    }
}

/// 只保存若干块的取块器（没有几何信息）
#[derive(Default)]
pub struct MapFetch {
    blocks: BTreeMap<u64, Vec<u8>>,
    pub reads: usize,
}

impl MapFetch {
    pub fn insert(&mut self, fsbno: u64, block: Vec<u8>) {
        self.blocks.insert(fsbno, block);
    }
}

impl BlockFetch for MapFetch {
    fn fetch(&mut self, fsbno: u64) -> Result<Block> {
        self.reads += 1;
        self.blocks
            .get(&fsbno)
            .map(|data| Block::new(fsbno, data.clone()))
            .ok_or(Error::new(ErrorKind::NotFound, "no such block"))
    }
}

pub fn ext(file_offset: u64, physical_block: u64, block_count: u64) -> Extent {
    Extent::new(file_offset, physical_block, block_count, false)
}

/// 长格式块头；v5 块记录自身地址 `fsbno` 对应的扇区号
pub fn lblock(fsbno: u64, crc: bool, owner: u64, level: u16, rightsib: u64) -> xfs_btree_lblock {
    xfs_btree_lblock {
        bb_magic: if crc { XFS_BMAP_CRC_MAGIC } else { XFS_BMAP_MAGIC },
        bb_level: level,
        bb_leftsib: NULLFSBLOCK,
        bb_rightsib: rightsib,
        bb_blkno: geometry(crc).fsb_to_daddr(fsbno),
        bb_owner: owner,
        ..Default::default()
    }
}

/// 放在 `fsbno` 的 btree 叶子块
pub fn leaf_block(fsbno: u64, crc: bool, owner: u64, rightsib: u64, recs: &[Extent]) -> Vec<u8> {
    encode_leaf(BLOCK_SIZE, &lblock(fsbno, crc, owner, 0, rightsib), recs).unwrap()
}

/// 放在 `fsbno` 的 btree 内部节点块
pub fn node_block(
    fsbno: u64,
    crc: bool,
    owner: u64,
    level: u16,
    rightsib: u64,
    keyptrs: &[(u64, u64)],
) -> Vec<u8> {
    encode_node(BLOCK_SIZE, &lblock(fsbno, crc, owner, level, rightsib), keyptrs).unwrap()
}

/// inode 内的 btree 根
pub fn bmdr_root(fork_size: usize, level: u16, keyptrs: &[(u64, u64)]) -> Vec<u8> {
    encode_root(fork_size, level, keyptrs).unwrap()
}

/// inode 内的 extent 数组
pub fn extent_array(fork_size: usize, recs: &[Extent]) -> Vec<u8> {
    encode_extent_array(fork_size, recs).unwrap()
}

/// 磁盘 inode 构造器
pub struct DinodeBuilder {
    crc: bool,
    ino: u64,
    format: u8,
    data: Vec<u8>,
    nextents: u32,
    flags: u16,
    attr: Option<(u8, u8, Vec<u8>, u16)>,
}

impl DinodeBuilder {
    pub fn new(crc: bool, ino: u64, format: u8, data: Vec<u8>, nextents: u32) -> Self {
        Self {
            crc,
            ino,
            format,
            data,
            nextents,
            flags: 0,
            attr: None,
        }
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// 属性 fork：`forkoff` 以 8 字节为单位
    pub fn attr(mut self, forkoff: u8, format: u8, data: Vec<u8>, anextents: u16) -> Self {
        self.attr = Some((forkoff, format, data, anextents));
        self
    }

    /// 数据 fork 可用的字节数
    pub fn core_size(crc: bool) -> usize {
        if crc {
            176
        } else {
            100
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = vec![0u8; INODE_SIZE];
        BigEndian::write_u16(&mut buf[0..2], XFS_DINODE_MAGIC);
        BigEndian::write_u16(&mut buf[2..4], 0o100644);
        buf[4] = if self.crc { 3 } else { 2 };
        buf[5] = self.format;
        BigEndian::write_u32(&mut buf[76..80], self.nextents);
        BigEndian::write_u16(&mut buf[90..92], self.flags);

        let core = Self::core_size(self.crc);
        buf[core..core + self.data.len()].copy_from_slice(&self.data);

        match &self.attr {
            Some((forkoff, format, data, anextents)) => {
                BigEndian::write_u16(&mut buf[80..82], *anextents);
                buf[82] = *forkoff;
                buf[83] = *format;
                let off = core + *forkoff as usize * 8;
                buf[off..off + data.len()].copy_from_slice(data);
            }
            None => buf[83] = 2,
        }

        if self.crc {
            BigEndian::write_u64(&mut buf[152..160], self.ino);
            xfs_update_cksum(&mut buf, XFS_DINODE_CRC_OFF);
        }
        buf
    }
}
