//! Inode 操作模块
//!
//! 这个模块按 inode 编号定位并读取磁盘 inode，验证后通过 `ForkSource`
//! 暴露数据 fork 和属性 fork。

mod read;

pub use read::*;
