//! 块 I/O 操作实现

use super::{Block, BlockDev, BlockDevice, BlockFetch};
use crate::{
    error::{Error, ErrorKind, Result},
    superblock::Geometry,
};
use alloc::vec;
use log::debug;

impl<D: BlockDevice> BlockDev<D> {
    /// 读取字节
    ///
    /// 从任意字节偏移读取，自动处理跨扇区情况。
    ///
    /// # 参数
    ///
    /// * `offset` - 字节偏移量（相对分区起点）
    /// * `buf` - 目标缓冲区
    ///
    /// # 返回
    ///
    /// 成功返回读取的字节数
    pub fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = buf.len();
        if len == 0 {
            return Ok(0);
        }
        let sector_size = self.sector_size() as u64;
        if sector_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "device sector size is zero"));
        }

        let abs = offset
            .checked_add(self.partition_offset())
            .ok_or(Error::new(ErrorKind::NotFound, "byte offset overflows"))?;
        let end = abs
            .checked_add(len as u64)
            .ok_or(Error::new(ErrorKind::NotFound, "byte range overflows"))?;
        if end > self.total_bytes() {
            return Err(Error::new(ErrorKind::NotFound, "read beyond end of device"));
        }

        // 计算起始扇区和扇区内偏移
        let start_sector = abs / sector_size;
        let sector_offset = (abs % sector_size) as usize;
        let sector_count = (sector_offset as u64 + len as u64).div_ceil(sector_size);
        let count = u32::try_from(sector_count)
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "read too large"))?;

        let mut temp = vec![0u8; sector_count as usize * sector_size as usize];
        self.inc_read_count();
        let n = self.device_mut().read_sectors(start_sector, count, &mut temp)?;
        if n < sector_offset + len {
            return Err(Error::new(ErrorKind::Io, "short read from device"));
        }

        // 复制所需字节
        buf.copy_from_slice(&temp[sector_offset..sector_offset + len]);

        Ok(len)
    }

    /// 读取单个文件系统块
    ///
    /// 块号为 XFS 的 fsbno（AG 号与 AG 内块号拼接），需要先设置几何信息。
    ///
    /// # 参数
    ///
    /// * `fsbno` - 文件系统块号
    /// * `buf` - 目标缓冲区（大小至少为 block_size）
    pub fn read_fsblock(&mut self, fsbno: u64, buf: &mut [u8]) -> Result<usize> {
        let geo = self.geometry_or_err()?;
        let block_size = geo.block_size as usize;

        if buf.len() < block_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer too small for block",
            ));
        }
        if !geo.verify_fsbno(fsbno) {
            return Err(Error::new(ErrorKind::NotFound, "block number outside filesystem"));
        }

        let offset = geo.fsb_to_byte(fsbno);
        debug!("read_fsblock: fsbno={} offset={}", fsbno, offset);
        self.read_bytes(offset, &mut buf[..block_size])
    }

    fn geometry_or_err(&self) -> Result<Geometry> {
        self.geometry()
            .copied()
            .ok_or(Error::new(ErrorKind::InvalidInput, "filesystem geometry not set"))
    }
}

impl<D: BlockDevice> BlockFetch for BlockDev<D> {
    fn fetch(&mut self, fsbno: u64) -> Result<Block> {
        let geo = self.geometry_or_err()?;
        let mut data = vec![0u8; geo.block_size as usize];
        self.read_fsblock(fsbno, &mut data)?;
        Ok(Block::new(fsbno, data))
    }

    fn geometry(&self) -> Option<&Geometry> {
        BlockDev::geometry(self)
    }
}
