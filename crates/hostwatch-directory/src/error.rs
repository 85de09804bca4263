use hostwatch_types::ServerId;
use thiserror::Error;

/// 服务器目录错误类型
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// 服务器未找到
    #[error("Server not found: {0}")]
    NotFound(ServerId),

    /// IP 或 ID 已被占用
    #[error("Server already exists: {0}")]
    AlreadyExists(String),

    /// 后端存储错误
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
