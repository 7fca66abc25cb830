// ==========================================
// 生产批次追踪系统 - 重复动作防护
// ==========================================
// 规则: 同一谱系根 + 检查点 + 动作 + 面别 至多登记一次
// 约束: 检查必须在流转事务内执行（与写入同一事务，避免检查后写入前的竞态）
// 兜底: movement 表唯一索引 (lineage_root_id, checkpoint_id, action, phase)
// ==========================================

use crate::domain::types::{MovementAction, Phase};
use crate::engine::error::{MovementError, MovementResult};
use crate::engine::lineage::{LineageResolution, LineageResolver};
use crate::repository::movement_repo::MovementRepository;
use rusqlite::Transaction;

#[derive(Debug, Clone, Copy)]
pub struct DuplicateActionGuard {
    resolver: LineageResolver,
}

impl DuplicateActionGuard {
    pub fn new(resolver: LineageResolver) -> Self {
        Self { resolver }
    }

    /// 检查重复动作，命中时返回 DuplicateAction 错误
    ///
    /// # 返回
    /// 谱系解析结果（供写入 lineage_root_id 使用）
    pub fn check_and_reject(
        &self,
        tx: &Transaction<'_>,
        lot_id: i64,
        checkpoint_id: &str,
        action: MovementAction,
        phase: Phase,
    ) -> MovementResult<LineageResolution> {
        let lineage = self.resolver.resolve_root(tx, lot_id)?;

        let existing = MovementRepository::find_lineage_action_tx(tx, lineage.root_lot_id, checkpoint_id, action, phase)?;

        if let Some(movement_id) = existing {
            tracing::info!(
                lot_id,
                root_lot_id = lineage.root_lot_id,
                checkpoint_id,
                action = %action,
                phase = %phase,
                existing_movement_id = movement_id,
                "重复动作被拒绝"
            );
            return Err(MovementError::DuplicateAction {
                root_lot_id: lineage.root_lot_id,
                checkpoint_id: checkpoint_id.to_string(),
                action,
                phase,
            });
        }

        Ok(lineage)
    }
}
