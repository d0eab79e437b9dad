//! 块设备核心类型

use crate::{error::Result, superblock::Geometry};

/// 块设备接口
///
/// 实现此 trait 以提供底层设备访问。XFS 的磁盘地址以 512 字节的
/// 基本块为单位，这里的 `lba` 以设备扇区为单位。
///
/// # 示例
///
/// ```rust,ignore
/// use xfs_bmap_core::{BlockDevice, Result};
///
/// struct MyDevice {
///     // ...
/// }
///
/// impl BlockDevice for MyDevice {
///     fn sector_size(&self) -> u32 {
///         512
///     }
///
///     fn total_sectors(&self) -> u64 {
///         1000000
///     }
///
///     fn read_sectors(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
///         // 实现扇区读取
///         Ok(count as usize * self.sector_size() as usize)
///     }
/// }
/// ```
pub trait BlockDevice {
    /// 物理扇区大小（通常 512）
    fn sector_size(&self) -> u32;

    /// 总扇区数
    fn total_sectors(&self) -> u64;

    /// 读取扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 起始扇区号
    /// * `count` - 要读取的扇区数
    /// * `buf` - 目标缓冲区（大小至少为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际读取的字节数
    fn read_sectors(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize>;
}

/// 块设备包装器
///
/// 在扇区设备之上提供字节读取和按文件系统块号读取，包含统计信息。
pub struct BlockDev<D> {
    /// 底层设备
    device: D,
    /// 分区偏移（字节）
    partition_offset: u64,
    /// 文件系统几何信息（加载 superblock 后设置）
    geometry: Option<Geometry>,
    /// 读取次数
    read_count: u64,
}

impl<D: BlockDevice> BlockDev<D> {
    /// 创建新的块设备包装器
    pub fn new(device: D) -> Self {
        Self {
            device,
            partition_offset: 0,
            geometry: None,
            read_count: 0,
        }
    }

    /// 获取底层设备的引用
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 获取底层设备的可变引用
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// 获取物理扇区大小
    pub fn sector_size(&self) -> u32 {
        self.device.sector_size()
    }

    /// 设备总字节数
    pub fn total_bytes(&self) -> u64 {
        self.device.total_sectors() * self.device.sector_size() as u64
    }

    /// 获取读取次数
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// 设置分区偏移（字节）
    pub fn set_partition_offset(&mut self, offset: u64) {
        self.partition_offset = offset;
    }

    /// 获取分区偏移
    pub fn partition_offset(&self) -> u64 {
        self.partition_offset
    }

    /// 设置文件系统几何信息
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = Some(geometry);
    }

    /// 获取文件系统几何信息
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// 增加读计数
    pub(super) fn inc_read_count(&mut self) {
        self.read_count += 1;
    }
}
