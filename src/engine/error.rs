// ==========================================
// 生产批次追踪系统 - 引擎层错误类型
// ==========================================
// 分类:
// - Validation / InvalidTransition: 操作员输入问题，保证无任何写入
// - DuplicateAction: 同一谱系重复登记，保证无任何写入
// - Consistency: 并发缺陷或谱系数据损坏，整笔事务中止并记录 error 日志
// ==========================================

use crate::domain::types::{CheckpointKind, MovementAction, Phase};
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MovementError {
    #[error("校验失败: {0}")]
    Validation(String),

    #[error("无效的状态转换: checkpoint_kind={kind}, action={action}")]
    InvalidTransition {
        kind: CheckpointKind,
        action: MovementAction,
    },

    #[error("重复动作: lineage_root={root_lot_id}, checkpoint={checkpoint_id}, action={action}, phase={phase}")]
    DuplicateAction {
        root_lot_id: i64,
        checkpoint_id: String,
        action: MovementAction,
        phase: Phase,
    },

    #[error("一致性错误: {0}")]
    Consistency(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<rusqlite::Error> for MovementError {
    fn from(err: rusqlite::Error) -> Self {
        MovementError::Repository(err.into())
    }
}

impl MovementError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MovementError::Validation(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        MovementError::Consistency(msg.into())
    }

    /// 属于校验类错误（含无效状态转换）
    pub fn is_validation(&self) -> bool {
        matches!(self, MovementError::Validation(_) | MovementError::InvalidTransition { .. })
    }

    /// 该错误保证未产生任何写入
    pub fn is_mutation_free(&self) -> bool {
        self.is_validation() || matches!(self, MovementError::DuplicateAction { .. })
    }
}

/// Result 类型别名
pub type MovementResult<T> = Result<T, MovementError>;
