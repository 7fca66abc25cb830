// ==========================================
// 生产批次追踪系统 - 告警规则与事件仓储
// ==========================================
// 不变量兜底: uq_alert_rule_open 部分唯一索引
// 触发置位: UPDATE ... WHERE fired = 0（test-and-set）
// ==========================================

use crate::domain::alert::{AlertEvent, AlertRule};
use crate::domain::types::Phase;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const RULE_COLUMNS: &str =
    "rule_id, order_id, sector, phase, target_qty, active, fired, fired_at, created_at";

const EVENT_COLUMNS: &str = "event_id, rule_id, order_id, sector, phase, target_qty, \
                             cumulative_qty, movement_id, fired_at";

// ==========================================
// AlertRuleRepository - 告警规则仓储
// ==========================================
pub struct AlertRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AlertRuleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 规则维护
    // ==========================================

    /// 新建规则
    ///
    /// 同一 (order, sector, phase) 已有未触发的激活规则时返回 UniqueConstraintViolation
    pub fn insert(&self, order_id: i64, sector: &str, phase: Phase, target_qty: i64) -> RepositoryResult<AlertRule> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO alert_rule (order_id, sector, phase, target_qty, active, fired, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, 0, ?5)
            "#,
            params![order_id, sector, phase.to_db_str(), target_qty, Utc::now()],
        )?;

        let rule_id = conn.last_insert_rowid();
        Self::find_by_id_tx(&conn, rule_id)?.ok_or_else(|| RepositoryError::not_found("AlertRule", rule_id))
    }

    /// 停用规则（已触发的规则保留 fired 标记）
    pub fn deactivate(&self, rule_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute("UPDATE alert_rule SET active = 0 WHERE rule_id = ?1", params![rule_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AlertRule", rule_id));
        }
        Ok(())
    }

    pub fn find_by_id(&self, rule_id: i64) -> RepositoryResult<Option<AlertRule>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, rule_id)
    }

    fn find_by_id_tx(conn: &Connection, rule_id: i64) -> RepositoryResult<Option<AlertRule>> {
        let sql = format!("SELECT {} FROM alert_rule WHERE rule_id = ?1", RULE_COLUMNS);
        let rule = conn.query_row(&sql, params![rule_id], Self::map_rule).optional()?;
        Ok(rule)
    }

    pub fn list_by_order(&self, order_id: i64) -> RepositoryResult<Vec<AlertRule>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM alert_rule WHERE order_id = ?1 ORDER BY rule_id", RULE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rules = stmt
            .query_map(params![order_id], Self::map_rule)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    // ==========================================
    // 事务内操作（告警监控使用）
    // ==========================================

    /// 查询已达阈值、激活且未触发的规则
    pub fn find_due_rules_tx(
        conn: &Connection,
        order_id: i64,
        sector: &str,
        phase: Phase,
        cumulative_qty: i64,
    ) -> RepositoryResult<Vec<AlertRule>> {
        let sql = format!(
            "SELECT {} FROM alert_rule \
             WHERE order_id = ?1 AND sector = ?2 AND phase = ?3 \
               AND active = 1 AND fired = 0 AND target_qty <= ?4 \
             ORDER BY rule_id",
            RULE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rules = stmt
            .query_map(params![order_id, sector, phase.to_db_str(), cumulative_qty], Self::map_rule)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// 原子置位 fired
    ///
    /// 返回 true 表示本次调用完成置位；false 表示规则已被触发或已停用
    pub fn mark_fired_tx(conn: &Connection, rule_id: i64, fired_at: DateTime<Utc>) -> RepositoryResult<bool> {
        let rows = conn.execute(
            "UPDATE alert_rule SET fired = 1, fired_at = ?1 WHERE rule_id = ?2 AND fired = 0 AND active = 1",
            params![fired_at, rule_id],
        )?;
        Ok(rows == 1)
    }

    // ==========================================
    // 告警事件
    // ==========================================

    pub fn insert_event_tx(conn: &Connection, event: &AlertEvent) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO alert_event (
                event_id, rule_id, order_id, sector, phase, target_qty,
                cumulative_qty, movement_id, fired_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                event.event_id,
                event.rule_id,
                event.order_id,
                event.sector,
                event.phase.to_db_str(),
                event.target_qty,
                event.cumulative_qty,
                event.movement_id,
                event.fired_at,
            ],
        )?;
        Ok(())
    }

    pub fn list_events_by_order(&self, order_id: i64) -> RepositoryResult<Vec<AlertEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM alert_event WHERE order_id = ?1 ORDER BY fired_at, event_id",
            EVENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![order_id], Self::map_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn map_rule(row: &rusqlite::Row) -> rusqlite::Result<AlertRule> {
        let phase_raw: String = row.get(3)?;
        let phase = Phase::from_str(&phase_raw)
            .ok_or_else(|| RepositoryError::invalid_column("phase", &phase_raw))?;

        Ok(AlertRule {
            rule_id: row.get(0)?,
            order_id: row.get(1)?,
            sector: row.get(2)?,
            phase,
            target_qty: row.get(4)?,
            active: row.get::<_, i64>(5)? != 0,
            fired: row.get::<_, i64>(6)? != 0,
            fired_at: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn map_event(row: &rusqlite::Row) -> rusqlite::Result<AlertEvent> {
        let phase_raw: String = row.get(4)?;
        let phase = Phase::from_str(&phase_raw)
            .ok_or_else(|| RepositoryError::invalid_column("phase", &phase_raw))?;

        Ok(AlertEvent {
            event_id: row.get(0)?,
            rule_id: row.get(1)?,
            order_id: row.get(2)?,
            sector: row.get(3)?,
            phase,
            target_qty: row.get(5)?,
            cumulative_qty: row.get(6)?,
            movement_id: row.get(7)?,
            fired_at: row.get(8)?,
        })
    }
}
