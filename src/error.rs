use thiserror::Error;

pub type Result<T> = std::result::Result<T, FirmwareError>;

#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("only Insta360 GO 2 and Insta360 GO 3 cameras are supported")]
    UnsupportedVariant,

    #[error("invalid {0} magic number")]
    BadMagic(&'static str),

    #[error("invalid file size: firmware parts add up to {expected} bytes, file is {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("invalid CRC32 for {0}")]
    CrcMismatch(String),

    #[error("invalid {0} MD5")]
    Md5Mismatch(&'static str),

    #[error("firmware header {0} field carries non-zero bytes")]
    ZeroFieldNonZero(&'static str),

    #[error("too much files. Max file count is 538, got {0}")]
    TooManyRomFsFiles(usize),

    #[error("file name {0} too long. Max file name length is 64")]
    NameTooLong(String),

    #[error("read of {len} bytes at offset {offset} is past the end of a {size} byte buffer")]
    OutOfRange {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("device-tree-compiler is not installed")]
    ExternalToolMissing,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
