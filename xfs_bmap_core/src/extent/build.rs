//! bmap btree 块的编码
//!
//! 解析的逆过程：把 extent 和键/指针写成磁盘格式的叶子块、内部节点块、
//! inode 内的根节点或 extent 数组。用于构造镜像和修复工具。

use super::Extent;
use crate::{
    consts::*,
    crc::xfs_update_cksum,
    error::{Error, ErrorKind, Result},
    types::{xfs_bmdr_block, xfs_btree_lblock},
};
use alloc::{vec, vec::Vec};
use byteorder::{BigEndian, ByteOrder};

fn too_many(what: &'static str) -> Error {
    Error::new(ErrorKind::InvalidInput, what)
}

/// 从 `offset` 开始连续写入记录
fn write_records(buf: &mut [u8], offset: usize, recs: &[Extent]) -> Result<()> {
    for (i, rec) in recs.iter().enumerate() {
        let off = offset + i * XFS_BMBT_REC_SIZE;
        let slot = buf
            .get_mut(off..off + XFS_BMBT_REC_SIZE)
            .ok_or_else(|| too_many("too many records for buffer"))?;
        slot.copy_from_slice(&rec.encode()?.to_bytes());
    }
    Ok(())
}

/// 写入键数组和指针数组
///
/// 指针区从 `hdr_len + maxrecs * 8` 开始，与解析时相同。
fn write_keyptrs(buf: &mut [u8], hdr_len: usize, maxrecs: usize, keyptrs: &[(u64, u64)]) -> Result<()> {
    if keyptrs.len() > maxrecs {
        return Err(too_many("too many keys for node"));
    }
    for (i, &(key, ptr)) in keyptrs.iter().enumerate() {
        let koff = hdr_len + i * XFS_BMBT_KEY_SIZE;
        let poff = hdr_len + maxrecs * XFS_BMBT_KEY_SIZE + i * XFS_BMBT_PTR_SIZE;
        BigEndian::write_u64(&mut buf[koff..koff + 8], key);
        BigEndian::write_u64(&mut buf[poff..poff + 8], ptr);
    }
    Ok(())
}

/// 写块头，v5 块最后补上 CRC
fn finish_lblock(
    block_size: usize,
    hdr: &xfs_btree_lblock,
    body: impl FnOnce(&mut [u8], usize) -> Result<()>,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; block_size];
    hdr.write_to(&mut buf)?;
    body(&mut buf, hdr.header_len())?;
    if hdr.is_crc() {
        xfs_update_cksum(&mut buf, XFS_BTREE_LBLOCK_CRC_OFF);
    }
    Ok(buf)
}

/// 编码叶子块
///
/// `hdr` 的魔数决定 v4/v5 格式；层级和记录数由本函数填写。
/// v5 块的 `bb_blkno` 和 `bb_owner` 由调用者给出。
pub fn encode_leaf(block_size: usize, hdr: &xfs_btree_lblock, recs: &[Extent]) -> Result<Vec<u8>> {
    let hdr = xfs_btree_lblock {
        bb_level: 0,
        bb_numrecs: u16::try_from(recs.len()).map_err(|_| too_many("too many records"))?,
        ..*hdr
    };
    if recs.len() > hdr.maxrecs(block_size) {
        return Err(too_many("too many records for block"));
    }
    finish_lblock(block_size, &hdr, |buf, hdr_len| write_records(buf, hdr_len, recs))
}

/// 编码内部节点块
pub fn encode_node(block_size: usize, hdr: &xfs_btree_lblock, keyptrs: &[(u64, u64)]) -> Result<Vec<u8>> {
    if hdr.bb_level == 0 {
        return Err(Error::new(ErrorKind::InvalidInput, "node level must be above zero"));
    }
    let hdr = xfs_btree_lblock {
        bb_numrecs: u16::try_from(keyptrs.len()).map_err(|_| too_many("too many keys"))?,
        ..*hdr
    };
    let maxrecs = hdr.maxrecs(block_size);
    finish_lblock(block_size, &hdr, |buf, hdr_len| {
        write_keyptrs(buf, hdr_len, maxrecs, keyptrs)
    })
}

/// 编码 inode 内的根节点，返回整个 fork
pub fn encode_root(fork_size: usize, level: u16, keyptrs: &[(u64, u64)]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; fork_size];
    xfs_bmdr_block {
        bb_level: level,
        bb_numrecs: u16::try_from(keyptrs.len()).map_err(|_| too_many("too many keys"))?,
    }
    .write_to(&mut buf)?;
    write_keyptrs(&mut buf, XFS_BMDR_BLOCK_LEN, xfs_bmdr_block::maxrecs(fork_size), keyptrs)?;
    Ok(buf)
}

/// 编码 inode 内的 extent 数组，返回整个 fork
pub fn encode_extent_array(fork_size: usize, recs: &[Extent]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; fork_size];
    write_records(&mut buf, 0, recs)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block::Block,
        extent::{BmdrRoot, BtreeNode, KeyPtrNode, LeafNode},
    };

    fn v5_header(owner: u64, blkno: u64) -> xfs_btree_lblock {
        xfs_btree_lblock {
            bb_magic: XFS_BMAP_CRC_MAGIC,
            bb_leftsib: NULLFSBLOCK,
            bb_rightsib: NULLFSBLOCK,
            bb_blkno: blkno,
            bb_owner: owner,
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_leaf_parses_back() {
        let recs = [Extent::new(0, 100, 4, false), Extent::new(8, 200, 2, true)];
        let buf = encode_leaf(512, &v5_header(7, 64), &recs).unwrap();

        let leaf = LeafNode::new(BtreeNode::parse(Block::new(8, buf), 7, None).unwrap()).unwrap();
        assert_eq!(leaf.numrecs(), 2);
        assert_eq!(leaf.extent(1).unwrap(), recs[1]);
    }

    #[test]
    fn test_encode_rejects_overfull() {
        // v5 512 字节块最多 (512 - 72) / 16 = 27 条记录
        let recs = [Extent::new(0, 100, 1, false); 28];
        let err = encode_leaf(512, &v5_header(7, 0), &recs).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        // 64 字节 fork 只能放 4 条记录
        assert!(encode_extent_array(64, &recs[..5]).is_err());
        // 36 字节 fork 的根只能放 2 对键/指针
        assert!(encode_root(36, 1, &[(0, 1), (1, 2), (2, 3)]).is_err());
    }

    #[test]
    fn test_encode_node_and_root() {
        let hdr = xfs_btree_lblock {
            bb_magic: XFS_BMAP_MAGIC,
            bb_level: 1,
            bb_rightsib: NULLFSBLOCK,
            ..Default::default()
        };
        let buf = encode_node(512, &hdr, &[(0, 10), (64, 11)]).unwrap();
        let node = BtreeNode::parse(Block::new(3, buf), 0, None).unwrap();
        assert_eq!(node.level(), 1);
        assert_eq!(node.ptr(1).unwrap(), 11);

        assert!(encode_node(512, &xfs_btree_lblock { bb_level: 0, ..hdr }, &[(0, 10)]).is_err());

        let root = encode_root(72, 2, &[(0, 10), (200, 11)]).unwrap();
        let root = BmdrRoot::parse(&root).unwrap();
        assert_eq!(root.key(1).unwrap(), 200);
        assert_eq!(root.ptr(1).unwrap(), 11);
    }
}
