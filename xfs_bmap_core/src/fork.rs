//! Inode fork 描述
//!
//! 每个 inode 有数据 fork 和（可选的）属性 fork，各自独立地以
//! local / extents / btree 三种格式之一存放块映射信息。

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
};
use core::fmt;
use log::debug;

/// fork 选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhichFork {
    Data,
    Attr,
}

impl WhichFork {
    pub fn name(&self) -> &'static str {
        match self {
            WhichFork::Data => "data",
            WhichFork::Attr => "attr",
        }
    }
}

impl fmt::Display for WhichFork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 可建立块映射的 fork 格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkFormat {
    /// 数据内联在 inode 中，没有块映射
    Local,
    /// inode 内的 extent 数组
    Extents,
    /// inode 内存放 btree 根
    Btree,
}

impl TryFrom<u8> for ForkFormat {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            XFS_DINODE_FMT_LOCAL => Ok(ForkFormat::Local),
            XFS_DINODE_FMT_EXTENTS => Ok(ForkFormat::Extents),
            XFS_DINODE_FMT_BTREE => Ok(ForkFormat::Btree),
            _ => Err(Error::new(
                ErrorKind::UnsupportedForkFormat(tag),
                "fork format does not support indexable blocks",
            )),
        }
    }
}

/// Inode / fork 访问接口
///
/// bmap 解析器只通过这个接口读取 inode 元数据，不关心 inode 的来源。
pub trait ForkSource {
    /// inode 编号（v5 下用于核对 btree 块的 owner）
    fn ino(&self) -> u64;

    /// fork 格式原始标签
    fn fork_format(&self, which: WhichFork) -> u8;

    /// fork 原始字节，长度即 fork 大小；不存在的 fork 返回空切片
    fn fork_raw_bytes(&self, which: WhichFork) -> &[u8];

    /// fork 中的 extent 数
    fn extent_count(&self, which: WhichFork) -> u64;

    /// 是否为实时设备文件
    fn is_realtime(&self) -> bool {
        false
    }
}

/// 一次解析所用的 fork 快照
#[derive(Debug, Clone, Copy)]
pub struct Fork<'a> {
    pub ino: u64,
    pub which: WhichFork,
    pub format: ForkFormat,
    pub nextents: u64,
    pub data: &'a [u8],
    pub realtime: bool,
}

impl<'a> Fork<'a> {
    /// 从 inode 读取 fork 描述
    ///
    /// 未知格式返回 `ErrorKind::UnsupportedForkFormat`，携带原始标签。
    pub fn from_source<S: ForkSource + ?Sized>(src: &'a S, which: WhichFork) -> Result<Self> {
        let tag = src.fork_format(which);
        let format = ForkFormat::try_from(tag).inspect_err(|_| {
            debug!("inode {} {} fork format {} not indexable", src.ino(), which, tag);
        })?;
        Ok(Self {
            ino: src.ino(),
            which,
            format,
            nextents: src.extent_count(which),
            data: src.fork_raw_bytes(which),
            realtime: src.is_realtime(),
        })
    }

    /// fork 大小（字节）
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 物理块号是否位于实时设备
    pub fn is_rt_data(&self) -> bool {
        self.realtime && self.which == WhichFork::Data
    }
}
