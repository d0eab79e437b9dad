//! Extent 解析模块
//!
//! 这个模块提供 bmap btree 的只读遍历：
//!
//! - `record` - 打包 extent 记录的编解码
//! - `tree` - 从 inode 内的根节点下降到叶子
//! - `leaf` - 扫描叶子（或 extent 数组），按请求范围裁剪，沿右兄弟链前进
//! - `build` - 反方向：把 extent 编码成叶子块、内部节点和根节点

mod build;
mod leaf;
mod record;
mod tree;

pub use build::{encode_extent_array, encode_leaf, encode_node, encode_root};
pub use leaf::LeafReader;
pub use record::Extent;
pub use tree::{descend, select_child, BmdrRoot, BtreeNode, KeyPtrNode, LeafNode};
