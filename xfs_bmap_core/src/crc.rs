//! 元数据 CRC32C 校验
//!
//! XFS v5 元数据在结构内嵌一个小端 CRC32C 字段，计算时该字段视为 0。

use byteorder::{ByteOrder, LittleEndian};

/// 计算缓冲区的 CRC（`cksum_offset` 处 4 字节按 0 参与计算）
///
/// 对应 `xfs_start_cksum_safe()` + `xfs_end_cksum()`
pub fn xfs_cksum(buf: &[u8], cksum_offset: usize) -> u32 {
    let crc = crc32c::crc32c(&buf[..cksum_offset]);
    let crc = crc32c::crc32c_append(crc, &[0u8; 4]);
    crc32c::crc32c_append(crc, &buf[cksum_offset + 4..])
}

/// 校验缓冲区中存储的 CRC
///
/// 对应 `xfs_verify_cksum()`
pub fn xfs_verify_cksum(buf: &[u8], cksum_offset: usize) -> bool {
    if buf.len() < cksum_offset + 4 {
        return false;
    }
    LittleEndian::read_u32(&buf[cksum_offset..cksum_offset + 4]) == xfs_cksum(buf, cksum_offset)
}

/// 重新计算并写入 CRC
///
/// 对应 `xfs_update_cksum()`
pub fn xfs_update_cksum(buf: &mut [u8], cksum_offset: usize) {
    let crc = xfs_cksum(buf, cksum_offset);
    LittleEndian::write_u32(&mut buf[cksum_offset..cksum_offset + 4], crc);
}
