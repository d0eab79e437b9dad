//! 错误处理模块

use core::fmt;
use crate::consts::*;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 参数无效（如长度为 0、缓冲区过小）
    InvalidInput,
    /// extent 记录的位模式非法
    MalformedRecord,
    /// 不支持的 fork 格式，携带原始标签值
    UnsupportedForkFormat(u8),
    /// btree 结构不变量被破坏
    CorruptTree,
    /// 其他元数据损坏（superblock、inode、extent 数组）
    Corrupted,
    /// I/O 错误
    Io,
    /// 地址无效或对象不存在
    NotFound,
}

impl ErrorKind {
    /// 对应的 errno
    pub fn errno(&self) -> i32 {
        match self {
            ErrorKind::InvalidInput => EINVAL,
            ErrorKind::MalformedRecord => EFSCORRUPTED,
            ErrorKind::UnsupportedForkFormat(_) => EOPNOTSUPP,
            ErrorKind::CorruptTree => EFSCORRUPTED,
            ErrorKind::Corrupted => EFSCORRUPTED,
            ErrorKind::Io => EIO,
            ErrorKind::NotFound => ENOENT,
        }
    }
}

/// 错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

impl Error {
    pub fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &'static str {
        self.message
    }

    /// 兼容 C 接口的错误码
    pub fn code(&self) -> i32 {
        self.kind.errno()
    }

    /// 该错误是否只影响当前 fork（调用者可以跳过后继续）
    pub fn is_skippable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UnsupportedForkFormat(_) | ErrorKind::MalformedRecord
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::UnsupportedForkFormat(tag) => write!(
                f,
                "Error(code={}, fork format {}: {})",
                self.code(),
                tag,
                self.message
            ),
            _ => write!(f, "Error(code={}, {:?}: {})", self.code(), self.kind, self.message),
        }
    }
}

impl core::error::Error for Error {}

/// 在 std 环境下转换为带 errno 的 `io::Error`
#[cfg(feature = "std")]
impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        std::io::Error::from_raw_os_error(err.code())
    }
}

/// Result 类型
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(Error::new(ErrorKind::CorruptTree, "x").code(), EFSCORRUPTED);
        assert_eq!(Error::new(ErrorKind::NotFound, "x").code(), ENOENT);
        assert_eq!(
            Error::new(ErrorKind::UnsupportedForkFormat(4), "x").code(),
            EOPNOTSUPP
        );
    }

    #[test]
    fn test_display_carries_fork_tag() {
        let err = Error::new(ErrorKind::UnsupportedForkFormat(4), "no indexable blocks");
        let text = err.to_string();
        assert!(text.contains("fork format 4"));
        assert!(err.is_skippable());
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_into_io_error() {
        let io: std::io::Error = Error::new(ErrorKind::Io, "short read").into();
        assert_eq!(io.raw_os_error(), Some(EIO));
    }
}
