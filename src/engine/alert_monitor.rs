// ==========================================
// 生产批次追踪系统 - 产量汇总与告警监控
// ==========================================
// 产量: 由流转审计记录实时汇总，不冗余存储
// 触发: 规则 active 且未触发、target ≤ 累计产量时原子置位 fired
// 保证: 每条规则至多触发一次（允许延迟，不允许重复）
// ==========================================

use crate::domain::alert::AlertEvent;
use crate::domain::types::Phase;
use crate::engine::error::MovementResult;
use crate::repository::alert_repo::AlertRuleRepository;
use crate::repository::movement_repo::MovementRepository;
use chrono::Utc;
use rusqlite::{Connection, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct AlertMonitor;

impl AlertMonitor {
    pub fn new() -> Self {
        Self
    }

    /// 累计产量（订单 + 车间 + 面别 的 PRODUCAO 数量之和）
    pub fn produced_total(&self, conn: &Connection, order_id: i64, sector: &str, phase: Phase) -> MovementResult<i64> {
        Ok(MovementRepository::produced_total_tx(conn, order_id, sector, phase)?)
    }

    /// 评估告警规则
    ///
    /// 必须与累计产量读取处于同一事务；返回本次置位成功的事件（已写入 alert_event）
    pub fn evaluate(
        &self,
        tx: &Transaction<'_>,
        order_id: i64,
        sector: &str,
        phase: Phase,
        cumulative_qty: i64,
        movement_id: Option<i64>,
    ) -> MovementResult<Vec<AlertEvent>> {
        let due = AlertRuleRepository::find_due_rules_tx(tx, order_id, sector, phase, cumulative_qty)?;

        let mut events = Vec::new();
        for rule in due {
            let fired_at = Utc::now();
            if !AlertRuleRepository::mark_fired_tx(tx, rule.rule_id, fired_at)? {
                continue;
            }

            let event = AlertEvent {
                event_id: Uuid::new_v4().to_string(),
                rule_id: rule.rule_id,
                order_id,
                sector: sector.to_string(),
                phase,
                target_qty: rule.target_qty,
                cumulative_qty,
                movement_id,
                fired_at,
            };
            AlertRuleRepository::insert_event_tx(tx, &event)?;

            tracing::info!(
                rule_id = rule.rule_id,
                order_id,
                sector,
                phase = %phase,
                target_qty = rule.target_qty,
                cumulative_qty,
                "产量告警触发"
            );
            events.push(event);
        }

        Ok(events)
    }
}
