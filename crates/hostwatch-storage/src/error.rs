use sea_orm::DbErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// 库中的数据无法还原为采样
    #[error("Corrupt sample row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
