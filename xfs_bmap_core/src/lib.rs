//! xfs_bmap_core: XFS 文件块映射的纯 Rust 只读实现
//!
//! 给定 inode 的某个 fork 和一段逻辑块范围，解析出覆盖该范围的物理 extent。
//! 支持 inode 内的 extent 数组和 bmap btree（v4 `BMAP` / v5 `BMA3` 块）。

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

// 公共模块
pub mod consts;
pub mod types;
pub mod error;
pub mod crc;
pub mod block;
pub mod superblock;
pub mod inode;
pub mod fork;
pub mod extent;
pub mod bmap;

#[cfg(test)]
mod testutil;

// 重新导出常用类型
pub use consts::*;
pub use error::{Error, ErrorKind, Result};

// 重新导出核心API
pub use block::{Block, BlockDev, BlockDevice, BlockFetch};
pub use bmap::{
    forks_with_extents, make_bbmap, resolve, resolve_fork, resolve_into, BbMapping, BmapEntry,
    BmapRequest, ExtentWalker,
};
pub use extent::Extent;
pub use fork::{Fork, ForkFormat, ForkSource, WhichFork};
pub use inode::Inode;
pub use superblock::{Geometry, Superblock};
