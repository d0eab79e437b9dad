//! bmap btree 节点解析与下降
//!
//! 根节点位于 inode 的 fork 中（`xfs_bmdr_block`），其余节点是长格式
//! btree 块。内部节点先存放 `numrecs` 个键，再在 `maxrecs` 处开始存放
//! 同样数量的子节点指针。

use super::Extent;
use crate::{
    block::{Block, BlockFetch},
    consts::*,
    crc::xfs_verify_cksum,
    error::{Error, ErrorKind, Result},
    fork::Fork,
    superblock::Geometry,
    types::{xfs_bmbt_rec, xfs_bmdr_block, xfs_btree_lblock},
};
use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace, warn};

fn corrupt(message: &'static str) -> Error {
    warn!("bmap btree corrupt: {}", message);
    Error::new(ErrorKind::CorruptTree, message)
}

fn read_be64(buf: &[u8], offset: usize) -> Result<u64> {
    buf.get(offset..offset + 8)
        .map(BigEndian::read_u64)
        .ok_or_else(|| corrupt("btree node truncated"))
}

/// 带键/指针数组的节点
///
/// inode 内的根节点和磁盘上的内部节点布局不同，选择子节点的逻辑相同。
pub trait KeyPtrNode {
    /// 层级（0 为叶子）
    fn level(&self) -> u16;

    /// 键/指针对数量
    fn numrecs(&self) -> usize;

    /// 第 `index` 个键（子树的最小逻辑块）
    fn key(&self, index: usize) -> Result<u64>;

    /// 第 `index` 个子节点指针
    fn ptr(&self, index: usize) -> Result<u64>;
}

/// inode 内的 btree 根节点
pub struct BmdrRoot<'a> {
    hdr: xfs_bmdr_block,
    data: &'a [u8],
    maxrecs: usize,
}

impl<'a> BmdrRoot<'a> {
    /// 解析 fork 中的根节点
    ///
    /// 指针数组的位置由 fork 大小决定，因此 `data` 必须是完整的 fork。
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let hdr = xfs_bmdr_block::from_bytes(data).map_err(|_| corrupt("btree root truncated"))?;
        let maxrecs = xfs_bmdr_block::maxrecs(data.len());

        if hdr.bb_level == 0 || hdr.bb_level > XFS_BM_MAXLEVELS {
            return Err(corrupt("btree root level out of range"));
        }
        if hdr.bb_numrecs == 0 || hdr.bb_numrecs as usize > maxrecs {
            return Err(corrupt("btree root record count exceeds capacity"));
        }

        Ok(Self { hdr, data, maxrecs })
    }
}

impl KeyPtrNode for BmdrRoot<'_> {
    fn level(&self) -> u16 {
        self.hdr.bb_level
    }

    fn numrecs(&self) -> usize {
        self.hdr.bb_numrecs as usize
    }

    fn key(&self, index: usize) -> Result<u64> {
        read_be64(self.data, XFS_BMDR_BLOCK_LEN + index * XFS_BMBT_KEY_SIZE)
    }

    fn ptr(&self, index: usize) -> Result<u64> {
        read_be64(
            self.data,
            XFS_BMDR_BLOCK_LEN + self.maxrecs * XFS_BMBT_KEY_SIZE + index * XFS_BMBT_PTR_SIZE,
        )
    }
}

/// 从磁盘读取的 btree 节点
pub struct BtreeNode {
    hdr: xfs_btree_lblock,
    block: Block,
    maxrecs: usize,
}

impl BtreeNode {
    /// 解析并校验一个 btree 块
    ///
    /// # 参数
    ///
    /// * `block` - 取得的块
    /// * `owner` - 正在解析的 inode 编号（v5 块必须属于它）
    /// * `geometry` - 文件系统几何信息；给出时魔数必须与文件系统版本一致，
    ///   v5 块记录的磁盘地址必须等于块本身的地址
    pub fn parse(block: Block, owner: u64, geometry: Option<&Geometry>) -> Result<Self> {
        let hdr = xfs_btree_lblock::from_bytes(block.data())
            .map_err(|_| corrupt("btree block truncated"))?;

        if !hdr.is_valid_magic() {
            return Err(corrupt("bad btree block magic"));
        }
        if geometry.is_some_and(|geo| geo.has_crc != hdr.is_crc()) {
            return Err(corrupt("btree block magic does not match filesystem version"));
        }
        if hdr.is_crc() {
            if cfg!(feature = "verify-crc")
                && !xfs_verify_cksum(block.data(), XFS_BTREE_LBLOCK_CRC_OFF)
            {
                return Err(corrupt("btree block CRC mismatch"));
            }
            if hdr.bb_owner != owner {
                return Err(corrupt("btree block belongs to another inode"));
            }
            if geometry.is_some_and(|geo| geo.fsb_to_daddr(block.fsbno()) != hdr.bb_blkno) {
                return Err(corrupt("btree block written at another address"));
            }
        }

        let maxrecs = hdr.maxrecs(block.len());
        if hdr.bb_numrecs as usize > maxrecs {
            return Err(corrupt("btree block record count exceeds capacity"));
        }

        Ok(Self { hdr, block, maxrecs })
    }

    /// 块号
    pub fn fsbno(&self) -> u64 {
        self.block.fsbno()
    }

    /// 右兄弟，`NULLFSBLOCK` 表示没有
    pub fn right_sibling(&self) -> Option<u64> {
        match self.hdr.bb_rightsib {
            NULLFSBLOCK => None,
            bno => Some(bno),
        }
    }

    /// 读取叶子中的第 `index` 条原始记录
    pub fn record(&self, index: usize) -> Result<xfs_bmbt_rec> {
        if index >= self.numrecs() {
            return Err(Error::new(ErrorKind::InvalidInput, "record index out of range"));
        }
        let offset = self.hdr.header_len() + index * XFS_BMBT_REC_SIZE;
        let buf = self
            .block
            .data()
            .get(offset..offset + XFS_BMBT_REC_SIZE)
            .ok_or_else(|| corrupt("btree leaf truncated"))?;
        xfs_bmbt_rec::from_bytes(buf)
    }
}

impl KeyPtrNode for BtreeNode {
    fn level(&self) -> u16 {
        self.hdr.bb_level
    }

    fn numrecs(&self) -> usize {
        self.hdr.bb_numrecs as usize
    }

    fn key(&self, index: usize) -> Result<u64> {
        read_be64(
            self.block.data(),
            self.hdr.header_len() + index * XFS_BMBT_KEY_SIZE,
        )
    }

    fn ptr(&self, index: usize) -> Result<u64> {
        read_be64(
            self.block.data(),
            self.hdr.header_len() + self.maxrecs * XFS_BMBT_KEY_SIZE + index * XFS_BMBT_PTR_SIZE,
        )
    }
}

/// 叶子节点
///
/// 下降的结果，也是沿兄弟链前进时的当前位置。只在读取记录期间持有，
/// drop 即释放底层块。
pub struct LeafNode {
    node: BtreeNode,
}

impl LeafNode {
    /// 确认节点是非空叶子
    pub fn new(node: BtreeNode) -> Result<Self> {
        if node.level() != 0 {
            return Err(corrupt("expected a leaf block"));
        }
        if node.numrecs() == 0 {
            return Err(corrupt("btree leaf has no records"));
        }
        Ok(Self { node })
    }

    /// 读取并校验一个叶子块（用于兄弟链）
    pub fn fetch<F: BlockFetch + ?Sized>(fetch: &mut F, fsbno: u64, owner: u64) -> Result<Self> {
        trace!("fetch leaf {}", fsbno);
        let geometry = fetch.geometry().copied();
        let block = fetch.fetch(fsbno)?;
        Self::new(BtreeNode::parse(block, owner, geometry.as_ref())?)
    }

    pub fn fsbno(&self) -> u64 {
        self.node.fsbno()
    }

    pub fn numrecs(&self) -> usize {
        self.node.numrecs()
    }

    pub fn right_sibling(&self) -> Option<u64> {
        self.node.right_sibling()
    }

    /// 解码第 `index` 条 extent
    pub fn extent(&self, index: usize) -> Result<Extent> {
        Extent::decode(&self.node.record(index)?)
    }
}

/// 选择子节点
///
/// 取键不大于 `target` 的最后一个子节点；`target` 小于所有键时取第一个。
/// 键必须严格递增，指针不能为空。
///
/// # 返回
///
/// `(index, child_fsbno)`
pub fn select_child<N: KeyPtrNode + ?Sized>(node: &N, target: u64) -> Result<(usize, u64)> {
    let nrecs = node.numrecs();
    if nrecs == 0 {
        return Err(corrupt("btree node has no keys"));
    }

    let mut chosen = 0;
    let mut prev: Option<u64> = None;
    for i in 0..nrecs {
        let key = node.key(i)?;
        if prev.is_some_and(|p| key <= p) {
            return Err(corrupt("btree keys out of order"));
        }
        prev = Some(key);
        if key <= target {
            chosen = i;
        }
    }

    let ptr = node.ptr(chosen)?;
    if ptr == 0 || ptr == NULLFSBLOCK {
        return Err(corrupt("btree child pointer is null"));
    }
    Ok((chosen, ptr))
}

/// 从 fork 内的根节点下降到覆盖 `target` 的叶子
///
/// 只走一条路径，不回溯。每个内部节点在选出子节点后立即释放。
pub fn descend<F: BlockFetch + ?Sized>(
    fetch: &mut F,
    fork: &Fork<'_>,
    target: u64,
) -> Result<LeafNode> {
    let geometry = fetch.geometry().copied();
    let root = BmdrRoot::parse(fork.data)?;
    let mut level = root.level();
    let (index, mut bno) = select_child(&root, target)?;
    debug!(
        "descend: ino={} {} fork target={} root level={} child={} -> {}",
        fork.ino, fork.which, target, level, index, bno
    );

    loop {
        let node = BtreeNode::parse(fetch.fetch(bno)?, fork.ino, geometry.as_ref())?;
        if level.checked_sub(1) != Some(node.level()) {
            return Err(corrupt("btree level does not decrease by one"));
        }
        if node.level() == 0 {
            return LeafNode::new(node);
        }

        level = node.level();
        let (index, child) = select_child(&node, target)?;
        trace!("descend: level={} block={} child={} -> {}", level, bno, index, child);
        bno = child;
    }
}
