//! XFS 常量定义

/// 基本块（basic block）大小，磁盘地址以此为单位
pub const BBSIZE: usize = 512;

/// 基本块大小的 log2
pub const BBSHIFT: u32 = 9;

/// Superblock 魔数 ("XFSB")
pub const XFS_SB_MAGIC: u32 = 0x5846_5342;

/// Superblock 在设备上的偏移（字节）
pub const XFS_SB_OFFSET: u64 = 0;

/// 解析 superblock 需要读取的字节数
pub const XFS_SB_SIZE: usize = 264;

/// Superblock 版本号掩码及 v5 版本值
pub const XFS_SB_VERSION_NUMBITS: u16 = 0x000f;
pub const XFS_SB_VERSION_5: u16 = 5;

/// Superblock CRC 字段偏移
pub const XFS_SB_CRC_OFF: usize = 224;

/// Inode 魔数 ("IN")
pub const XFS_DINODE_MAGIC: u16 = 0x494e;

/// Inode core 大小（v1/v2 与 v3）
pub const XFS_DINODE_CORE_SIZE_V2: usize = 100;
pub const XFS_DINODE_CORE_SIZE_V3: usize = 176;

/// Inode CRC 字段偏移（仅 v3）
pub const XFS_DINODE_CRC_OFF: usize = 100;

/// di_forkoff 的单位（字节）
pub const XFS_DINODE_FORKOFF_UNIT: usize = 8;

/// Fork 格式原始标签（对应 enum xfs_dinode_fmt）
pub const XFS_DINODE_FMT_DEV: u8 = 0;
pub const XFS_DINODE_FMT_LOCAL: u8 = 1;
pub const XFS_DINODE_FMT_EXTENTS: u8 = 2;
pub const XFS_DINODE_FMT_BTREE: u8 = 3;
pub const XFS_DINODE_FMT_UUID: u8 = 4;
pub const XFS_DINODE_FMT_META_BTREE: u8 = 5;

/// bmap btree 块魔数：v4 ("BMAP") 与 v5 ("BMA3")
pub const XFS_BMAP_MAGIC: u32 = 0x424d_4150;
pub const XFS_BMAP_CRC_MAGIC: u32 = 0x424d_4133;

/// 长格式 btree 块头大小（v4 / v5）
pub const XFS_BTREE_LBLOCK_LEN: usize = 24;
pub const XFS_BTREE_LBLOCK_CRC_LEN: usize = 72;

/// 长格式 btree 块 CRC 字段偏移
pub const XFS_BTREE_LBLOCK_CRC_OFF: usize = 64;

/// inode 内 btree 根（xfs_bmdr_block）头大小
pub const XFS_BMDR_BLOCK_LEN: usize = 4;

/// bmap btree 键、指针、记录大小
pub const XFS_BMBT_KEY_SIZE: usize = 8;
pub const XFS_BMBT_PTR_SIZE: usize = 8;
pub const XFS_BMBT_REC_SIZE: usize = 16;

/// 空块号（无兄弟节点）
pub const NULLFSBLOCK: u64 = u64::MAX;

/// extent 记录各字段位宽
pub const BMBT_EXNTFLAG_BITLEN: u32 = 1;
pub const BMBT_STARTOFF_BITLEN: u32 = 54;
pub const BMBT_STARTBLOCK_BITLEN: u32 = 52;
pub const BMBT_BLOCKCOUNT_BITLEN: u32 = 21;

pub const BMBT_STARTOFF_MASK: u64 = (1 << BMBT_STARTOFF_BITLEN) - 1;
pub const BMBT_STARTBLOCK_MASK: u64 = (1 << BMBT_STARTBLOCK_BITLEN) - 1;
pub const BMBT_BLOCKCOUNT_MASK: u64 = (1 << BMBT_BLOCKCOUNT_BITLEN) - 1;

/// 文件内最大逻辑块号（偏移域上界）
pub const XFS_MAX_FILEOFF: u64 = BMBT_STARTOFF_MASK;

/// bmap btree 最大层数
pub const XFS_BM_MAXLEVELS: u16 = 9;

/// 错误码（兼容 Linux errno）
pub const ENOENT: i32 = 2;
pub const EIO: i32 = 5;
pub const EINVAL: i32 = 22;
pub const EOPNOTSUPP: i32 = 95;
pub const EUCLEAN: i32 = 117;

/// XFS 用 EUCLEAN 表示元数据损坏
pub const EFSCORRUPTED: i32 = EUCLEAN;
