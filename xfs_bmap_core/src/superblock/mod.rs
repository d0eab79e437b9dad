//! Superblock 操作模块
//!
//! 这个模块提供 XFS 主 superblock 的读取、验证，以及由此得出的
//! 文件系统几何信息（块号与 AG 地址、磁盘地址之间的换算）。

mod geometry;
mod read;

pub use geometry::Geometry;
pub use read::*;
