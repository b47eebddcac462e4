use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("busy: write queue over high-water mark")]
    Busy,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for triplex_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Busy => triplex_core::Error::Busy,
            other => triplex_core::Error::StorageError(other.to_string()),
        }
    }
}
