//! 文件系统几何信息与地址换算

use crate::consts::*;

/// 文件系统几何信息
///
/// XFS 的文件系统块号（fsbno）是 AG 号与 AG 内块号的拼接：
/// `fsbno = (agno << ag_blk_log) | agbno`。由于 `ag_blocks` 不必是 2 的幂，
/// fsbno 并不等于线性块号，读盘前需要先换算为磁盘地址。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// 块大小（字节）
    pub block_size: u32,
    /// log2(block_size)
    pub block_log: u8,
    /// 扇区大小（字节）
    pub sect_size: u16,
    /// 每个 AG 的块数
    pub ag_blocks: u32,
    /// AG 数量
    pub ag_count: u32,
    /// log2(ag_blocks) 向上取整
    pub ag_blk_log: u8,
    /// inode 大小（字节）
    pub inode_size: u16,
    /// log2(每块 inode 数)
    pub inop_blog: u8,
    /// 是否为 v5 文件系统
    pub has_crc: bool,
}

impl Geometry {
    /// 对应 `XFS_FSB_TO_AGNO()`
    pub fn fsb_to_agno(&self, fsbno: u64) -> u64 {
        fsbno >> self.ag_blk_log
    }

    /// 对应 `XFS_FSB_TO_AGBNO()`
    pub fn fsb_to_agbno(&self, fsbno: u64) -> u64 {
        fsbno & ((1u64 << self.ag_blk_log) - 1)
    }

    /// 对应 `XFS_AGB_TO_FSB()`
    pub fn agb_to_fsb(&self, agno: u32, agbno: u32) -> u64 {
        ((agno as u64) << self.ag_blk_log) | agbno as u64
    }

    /// 文件系统块数换算为基本块数
    ///
    /// 对应 `XFS_FSB_TO_BB()`
    pub fn fsb_to_bb(&self, count: u64) -> u64 {
        count << (self.block_log as u32 - BBSHIFT)
    }

    /// 文件系统块号换算为磁盘地址（基本块）
    ///
    /// 对应 `XFS_FSB_TO_DADDR()`
    pub fn fsb_to_daddr(&self, fsbno: u64) -> u64 {
        let linear = self.fsb_to_agno(fsbno) * self.ag_blocks as u64 + self.fsb_to_agbno(fsbno);
        self.fsb_to_bb(linear)
    }

    /// 文件系统块号换算为字节偏移
    pub fn fsb_to_byte(&self, fsbno: u64) -> u64 {
        self.fsb_to_daddr(fsbno) << BBSHIFT
    }

    /// 块号是否落在某个 AG 内
    ///
    /// 对应 `xfs_verify_fsbno()`
    pub fn verify_fsbno(&self, fsbno: u64) -> bool {
        self.fsb_to_agno(fsbno) < self.ag_count as u64
            && self.fsb_to_agbno(fsbno) < self.ag_blocks as u64
    }

    /// 一段物理块是否完整落在同一个 AG 内
    ///
    /// 对应 `xfs_verify_fsbext()`
    pub fn verify_fsbext(&self, fsbno: u64, len: u64) -> bool {
        if len == 0 || !self.verify_fsbno(fsbno) {
            return false;
        }
        match self.fsb_to_agbno(fsbno).checked_add(len) {
            Some(end) => end <= self.ag_blocks as u64,
            None => false,
        }
    }

    /// inode 编号中 AG 内部分的位数
    fn ino_agino_log(&self) -> u32 {
        self.inop_blog as u32 + self.ag_blk_log as u32
    }

    /// 对应 `XFS_INO_TO_AGNO()`
    pub fn ino_to_agno(&self, ino: u64) -> u64 {
        ino >> self.ino_agino_log()
    }

    /// inode 所在的文件系统块号
    ///
    /// 对应 `XFS_INO_TO_FSB()`
    pub fn ino_to_fsb(&self, ino: u64) -> u64 {
        let agino = ino & ((1u64 << self.ino_agino_log()) - 1);
        let agbno = agino >> self.inop_blog;
        (self.ino_to_agno(ino) << self.ag_blk_log) | agbno
    }

    /// inode 在所在块内的字节偏移
    ///
    /// 对应 `XFS_INO_TO_OFFSET() * inodesize`
    pub fn ino_to_offset(&self, ino: u64) -> usize {
        (ino & ((1u64 << self.inop_blog) - 1)) as usize * self.inode_size as usize
    }

    /// inode 编号是否落在文件系统内
    pub fn verify_ino(&self, ino: u64) -> bool {
        ino != 0
            && self.ino_to_agno(ino) < self.ag_count as u64
            && self.verify_fsbno(self.ino_to_fsb(ino))
    }
}
