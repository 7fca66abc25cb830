// ==========================================
// 生产批次追踪系统 - 流转编排器（状态机）
// ==========================================
// 状态机: AGUARDANDO → DISPONIVEL → [PENDENTE_CQ → CQ_APROVOU] → EXPEDIDO
// 流程（单个 IMMEDIATE 事务）:
// 1. 加载批次与订单，校验转换与面别
// 2. 重复动作防护
// 3. 台账拆分
// 4. 写入流转记录与订单历史
// 5. 从审计记录重算累计产量
// 6. 告警评估
// 7. 提交；提交后分发告警
// 任一步失败整体回滚（事务未提交即丢弃）
// ==========================================

use crate::config::config_manager::EngineConfig;
use crate::domain::alert::AlertEvent;
use crate::domain::lot::Lot;
use crate::domain::movement::{MovementRecord, NewMovementRecord};
use crate::domain::types::{CheckpointKind, LotState, MovementAction};
use crate::engine::alert_monitor::AlertMonitor;
use crate::engine::duplicate_guard::DuplicateActionGuard;
use crate::engine::error::{MovementError, MovementResult};
use crate::engine::events::{AlertDispatcher, DispatchReport};
use crate::engine::ledger::LotLedger;
use crate::engine::lineage::LineageResolver;
use crate::engine::phase_policy::{PhaseMarks, PhasePolicy};
use crate::engine::routing::RoutingTable;
use crate::repository::error::RepositoryError;
use crate::repository::history_repo::OrderHistoryRepository;
use crate::repository::lot_repo::LotRepository;
use crate::repository::movement_repo::MovementRepository;
use crate::repository::order_repo::ProductionOrderRepository;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;

// ==========================================
// 请求与结果
// ==========================================

#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub lot_id: i64,
    pub checkpoint_id: String,
    pub action: MovementAction,
    /// None 表示按料盒容量转移
    pub quantity: Option<i64>,
    pub marks: PhaseMarks,
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MovementOutcome {
    pub source_lot: Lot,
    pub child_lot: Lot,
    pub records: Vec<MovementRecord>,
    pub lineage_root_id: i64,
    pub produced_total: i64,
    pub alerts: Vec<AlertEvent>,
    #[serde(skip)]
    pub dispatch: DispatchReport,
}

/// 状态转换表
pub fn next_state(kind: CheckpointKind, action: MovementAction) -> MovementResult<LotState> {
    use CheckpointKind::*;
    use MovementAction::*;

    match (kind, action) {
        (Gate, Producao) => Ok(LotState::Disponivel),
        (Gate, Recebimento) => Ok(LotState::Aguardando),
        (Quality, Recebimento) => Ok(LotState::PendenteCq),
        (Quality, Cq) | (Quality, Liberado) => Ok(LotState::CqAprovou),
        (Quality, Producao) => Ok(LotState::Disponivel),
        (Quality, Retrabalho) => Ok(LotState::Aguardando),
        (Shipping, Producao) => Ok(LotState::Expedido),
        (Shipping, Recebimento) => Ok(LotState::Aguardando),
        (kind, action) => Err(MovementError::InvalidTransition { kind, action }),
    }
}

// ==========================================
// MovementOrchestrator
// ==========================================
pub struct MovementOrchestrator {
    conn: Arc<Mutex<Connection>>,
    routing: RoutingTable,
    phase_policy: PhasePolicy,
    guard: DuplicateActionGuard,
    ledger: LotLedger,
    monitor: AlertMonitor,
    dispatcher: Arc<AlertDispatcher>,
    default_actor: String,
}

impl MovementOrchestrator {
    pub fn new(conn: Arc<Mutex<Connection>>, config: &EngineConfig, dispatcher: Arc<AlertDispatcher>) -> Self {
        let resolver = LineageResolver::new(config.max_hops);
        let max_depth = config.enforce_lineage_depth.then_some(i64::from(config.max_hops));

        Self {
            conn,
            routing: config.routing.clone(),
            phase_policy: PhasePolicy::new(config.phase_conflict_policy),
            guard: DuplicateActionGuard::new(resolver),
            ledger: LotLedger::new(max_depth),
            monitor: AlertMonitor::new(),
            dispatcher,
            default_actor: config.default_actor.clone(),
        }
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// 执行一次流转
    pub fn execute(&self, request: &MovementRequest) -> MovementResult<MovementOutcome> {
        let start = Instant::now();

        let result = {
            let mut conn = self
                .conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

            match self.execute_in_tx(&tx, request) {
                Ok(outcome) => {
                    tx.commit()
                        .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
                    Ok(outcome)
                }
                // tx 在此处被丢弃，自动回滚
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(mut outcome) => {
                if !outcome.alerts.is_empty() {
                    outcome.dispatch = self.dispatcher.dispatch(&outcome.alerts);
                }
                tracing::info!(
                    lot_id = request.lot_id,
                    child_lot_id = outcome.child_lot.lot_id,
                    checkpoint_id = %request.checkpoint_id,
                    action = %request.action,
                    quantity = outcome.child_lot.total_at_creation,
                    to_sector = %outcome.child_lot.sector,
                    alerts = outcome.alerts.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "流转完成"
                );
                Ok(outcome)
            }
            Err(e) => {
                match &e {
                    MovementError::Consistency(_) => tracing::error!(
                        lot_id = request.lot_id,
                        checkpoint_id = %request.checkpoint_id,
                        action = %request.action,
                        error = %e,
                        "流转一致性错误，事务已回滚"
                    ),
                    err if err.is_mutation_free() => tracing::info!(
                        lot_id = request.lot_id,
                        checkpoint_id = %request.checkpoint_id,
                        action = %request.action,
                        error = %e,
                        "流转被拒绝"
                    ),
                    _ => tracing::warn!(
                        lot_id = request.lot_id,
                        checkpoint_id = %request.checkpoint_id,
                        action = %request.action,
                        error = %e,
                        "流转失败，事务已回滚"
                    ),
                }
                Err(e)
            }
        }
    }

    /// 在调用方事务中执行流转（不提交、不分发）
    pub fn execute_in_tx(&self, tx: &Transaction<'_>, request: &MovementRequest) -> MovementResult<MovementOutcome> {
        // ===== 1. 加载与校验 =====
        let lot = LotRepository::find_by_id_tx(tx, request.lot_id)?
            .ok_or_else(|| MovementError::validation(format!("批次不存在: lot_id={}", request.lot_id)))?;
        if lot.state.is_terminal() {
            return Err(MovementError::validation(format!(
                "批次 {} 已发货，不能继续流转",
                lot.lot_code
            )));
        }

        let order = ProductionOrderRepository::find_by_id_tx(tx, lot.order_id)?
            .ok_or_else(|| MovementError::validation(format!("订单不存在: order_id={}", lot.order_id)))?;

        let rule = self.routing.require_checkpoint(&request.checkpoint_id)?;
        let new_state = next_state(rule.kind, request.action)?;
        let phase = self.phase_policy.resolve(order.phase_config, request.marks)?;

        // ===== 2. 重复动作防护 =====
        let lineage = self
            .guard
            .check_and_reject(tx, lot.lot_id, &request.checkpoint_id, request.action, phase)?;

        // ===== 3. 台账拆分 =====
        // 未指定数量时按料盒容量转移
        let quantity = request.quantity.unwrap_or(lot.capacity);
        if quantity <= 0 || quantity > lot.remaining {
            return Err(MovementError::validation(format!(
                "转移数量 {} 超出范围: 批次 {} 剩余 {}",
                quantity, lot.lot_code, lot.remaining
            )));
        }
        let destination = self.routing.resolve_destination(
            &request.checkpoint_id,
            request.action,
            &lot.sector,
            order.sector.as_deref(),
        )?;
        let reset = rule.reentry_boundary && request.action == MovementAction::Recebimento;
        let counters = PhasePolicy::child_counters(&lot, phase, quantity, reset)?;

        let split = self.ledger.split(tx, &lot, quantity, &destination, new_state, counters)?;

        // ===== 4. 流转记录与历史 =====
        let actor = request
            .actor
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.default_actor)
            .to_string();

        let new_record = NewMovementRecord {
            order_id: order.order_id,
            source_lot_id: lot.lot_id,
            result_lot_id: split.child.lot_id,
            lineage_root_id: lineage.root_lot_id,
            checkpoint_id: request.checkpoint_id.clone(),
            action: request.action,
            quantity,
            from_sector: lot.sector.clone(),
            to_sector: destination.clone(),
            phase,
            actor: actor.clone(),
        };
        let record = self.insert_record(tx, &new_record)?;
        OrderHistoryRepository::insert_tx(tx, order.order_id, &actor, &new_record.describe())?;

        // ===== 5. 累计产量 =====
        let produced_total = self.monitor.produced_total(tx, order.order_id, &destination, phase)?;

        // ===== 6. 告警评估 =====
        let alerts = self.monitor.evaluate(
            tx,
            order.order_id,
            &destination,
            phase,
            produced_total,
            Some(record.movement_id),
        )?;

        Ok(MovementOutcome {
            source_lot: split.source_after,
            child_lot: split.child,
            records: vec![record],
            lineage_root_id: lineage.root_lot_id,
            produced_total,
            alerts,
            dispatch: DispatchReport::default(),
        })
    }

    /// 写入流转记录；唯一索引冲突视为重复动作
    fn insert_record(&self, tx: &Transaction<'_>, record: &NewMovementRecord) -> MovementResult<MovementRecord> {
        match MovementRepository::insert_tx(tx, record) {
            Ok(inserted) => Ok(inserted),
            Err(RepositoryError::UniqueConstraintViolation(_)) => Err(MovementError::DuplicateAction {
                root_lot_id: record.lineage_root_id,
                checkpoint_id: record.checkpoint_id.clone(),
                action: record.action,
                phase: record.phase,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(next_state(CheckpointKind::Gate, MovementAction::Producao).unwrap(), LotState::Disponivel);
        assert_eq!(next_state(CheckpointKind::Gate, MovementAction::Recebimento).unwrap(), LotState::Aguardando);
        assert_eq!(next_state(CheckpointKind::Quality, MovementAction::Recebimento).unwrap(), LotState::PendenteCq);
        assert_eq!(next_state(CheckpointKind::Quality, MovementAction::Cq).unwrap(), LotState::CqAprovou);
        assert_eq!(next_state(CheckpointKind::Shipping, MovementAction::Producao).unwrap(), LotState::Expedido);
    }

    #[test]
    fn test_invalid_transition() {
        let err = next_state(CheckpointKind::Gate, MovementAction::Cq).unwrap_err();
        assert!(matches!(err, MovementError::InvalidTransition { .. }));
        assert!(err.is_validation());
        assert!(next_state(CheckpointKind::Shipping, MovementAction::Retrabalho).is_err());
    }
}
