// ==========================================
// 生产批次追踪系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/引擎错误为用户友好的错误消息
// 约定: 每个错误都带显式原因，kind() 提供稳定的错误码供调用方分支
// ==========================================

use crate::engine::error::MovementError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("重复动作: {0}")]
    DuplicateAction(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 一致性错误（并发缺陷或谱系损坏，需人工排查）
    // ==========================================
    #[error("一致性错误: {0}")]
    ConsistencyError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::DuplicateAction(_) => "DUPLICATE_ACTION",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::ConsistencyError(_) => "CONSISTENCY_ERROR",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => ApiError::NotFound(format!("{}(id={})不存在", entity, id)),
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => ApiError::DatabaseTransactionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::ConsistencyError(format!("检查约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 MovementError 转换
// ==========================================
impl From<MovementError> for ApiError {
    fn from(err: MovementError) -> Self {
        match err {
            MovementError::Validation(msg) => ApiError::ValidationError(msg),
            e @ MovementError::InvalidTransition { .. } => ApiError::ValidationError(e.to_string()),
            e @ MovementError::DuplicateAction { .. } => ApiError::DuplicateAction(e.to_string()),
            MovementError::Consistency(msg) => ApiError::ConsistencyError(msg),
            MovementError::Repository(repo) => repo.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
