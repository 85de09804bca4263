use hostwatch_directory::DirectoryError;
use hostwatch_storage::StorageError;
use thiserror::Error;

/// 摄取错误
///
/// 只有存储和目录后端故障会返回给调用方，单个指标的问题在结果中体现。
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
