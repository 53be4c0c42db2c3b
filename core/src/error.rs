use thiserror::Error;

pub type FatpackResult<T> = Result<T, FatpackError>;

#[derive(Debug, Error)]
pub enum FatpackError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Disk image not found: {0}")]
    ImageNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Subdirectory not found: {0}")]
    SubdirectoryNotFound(String),

    #[error("File already exists in the image: {0}")]
    AlreadyExists(String),

    #[error("Not enough free clusters: need {required}, have {available}")]
    InsufficientSpace { required: u32, available: u32 },

    #[error("No free entry available in the root directory")]
    DirectoryFull,

    #[error("Ran out of free clusters while linking the cluster chain")]
    OutOfFreeClusters,

    #[error("Invalid 8.3 file name: {0}")]
    InvalidFileName(String),

    #[error("Corrupt image: {0}")]
    CorruptImage(String),

    #[error("Usage accounting exceeds the data area: {used} of {data_area} bytes")]
    UsageInconsistency { used: u64, data_area: u64 },
}
