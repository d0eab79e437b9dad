//! 块设备抽象
//!
//! 提供扇区级块设备接口、带几何信息的块设备包装器，
//! 以及 bmap 解析器使用的按文件系统块号取块接口。

mod device;
mod fetch;
mod io;

pub use device::{BlockDevice, BlockDev};
pub use fetch::{Block, BlockFetch};
