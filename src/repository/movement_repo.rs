// ==========================================
// 生产批次追踪系统 - 流转审计数据仓储
// ==========================================
// 红线: 审计记录只增不改
// 说明: 产量汇总由审计记录实时推导，不冗余存储
// ==========================================

use crate::domain::movement::{MovementRecord, NewMovementRecord};
use crate::domain::types::{MovementAction, Phase};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

const MOVEMENT_COLUMNS: &str = "movement_id, order_id, source_lot_id, result_lot_id, lineage_root_id, \
                                checkpoint_id, action, quantity, from_sector, to_sector, phase, \
                                created_at, actor";

/// 车间 + 面别维度的产量汇总行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorPhaseProducedRow {
    pub sector: String,
    pub phase: Phase,
    pub produced: i64,
}

// ==========================================
// MovementRepository - 流转记录仓储
// ==========================================
pub struct MovementRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MovementRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    /// 写入流转记录
    ///
    /// (lineage_root_id, checkpoint_id, action, phase) 重复时返回 UniqueConstraintViolation
    pub fn insert_tx(conn: &Connection, record: &NewMovementRecord) -> RepositoryResult<MovementRecord> {
        conn.execute(
            r#"
            INSERT INTO movement (
                order_id, source_lot_id, result_lot_id, lineage_root_id,
                checkpoint_id, action, quantity, from_sector, to_sector,
                phase, created_at, actor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                record.order_id,
                record.source_lot_id,
                record.result_lot_id,
                record.lineage_root_id,
                record.checkpoint_id,
                record.action.to_db_str(),
                record.quantity,
                record.from_sector,
                record.to_sector,
                record.phase.to_db_str(),
                Utc::now(),
                record.actor,
            ],
        )?;

        let movement_id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM movement WHERE movement_id = ?1", MOVEMENT_COLUMNS);
        let inserted = conn.query_row(&sql, params![movement_id], Self::map_row)?;
        Ok(inserted)
    }

    /// 查找谱系内已登记的同一动作
    ///
    /// 谱系根作为 lineage_root / 来源批次 / 结果批次任一出现即视为命中，
    /// 动作按大写归一化比较
    pub fn find_lineage_action_tx(
        conn: &Connection,
        root_lot_id: i64,
        checkpoint_id: &str,
        action: MovementAction,
        phase: Phase,
    ) -> RepositoryResult<Option<i64>> {
        let found = conn
            .query_row(
                r#"
                SELECT movement_id
                FROM movement
                WHERE (lineage_root_id = ?1 OR source_lot_id = ?1 OR result_lot_id = ?1)
                  AND checkpoint_id = ?2
                  AND UPPER(action) = ?3
                  AND phase = ?4
                ORDER BY movement_id
                LIMIT 1
                "#,
                params![root_lot_id, checkpoint_id, action.to_db_str(), phase.to_db_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found)
    }

    /// 累计产量: (订单, 目标车间, 面别) 下 PRODUCAO 流转数量之和
    pub fn produced_total_tx(
        conn: &Connection,
        order_id: i64,
        sector: &str,
        phase: Phase,
    ) -> RepositoryResult<i64> {
        let total: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM movement
            WHERE order_id = ?1 AND to_sector = ?2 AND phase = ?3 AND action = ?4
            "#,
            params![order_id, sector, phase.to_db_str(), MovementAction::Producao.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn produced_total(&self, order_id: i64, sector: &str, phase: Phase) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::produced_total_tx(&conn, order_id, sector, phase)
    }

    /// 订单最近的流转记录（倒序）
    pub fn list_by_order(&self, order_id: i64, limit: usize) -> RepositoryResult<Vec<MovementRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM movement WHERE order_id = ?1 ORDER BY created_at DESC, movement_id DESC LIMIT ?2",
            MOVEMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![order_id, limit as i64], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// 与批次相关的流转（作为来源或结果）
    pub fn list_by_lot(&self, lot_id: i64) -> RepositoryResult<Vec<MovementRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM movement WHERE source_lot_id = ?1 OR result_lot_id = ?1 ORDER BY movement_id",
            MOVEMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![lot_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// 按谱系根列出流转
    pub fn list_by_lineage(&self, root_lot_id: i64) -> RepositoryResult<Vec<MovementRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM movement WHERE lineage_root_id = ?1 ORDER BY movement_id",
            MOVEMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![root_lot_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// 订单按 (车间, 面别) 汇总的产量
    pub fn produced_by_sector_phase(&self, order_id: i64) -> RepositoryResult<Vec<SectorPhaseProducedRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT to_sector, phase, COALESCE(SUM(quantity), 0)
            FROM movement
            WHERE order_id = ?1 AND action = ?2
            GROUP BY to_sector, phase
            ORDER BY to_sector, phase
            "#,
        )?;
        let rows = stmt
            .query_map(params![order_id, MovementAction::Producao.to_db_str()], |row| {
                let phase_raw: String = row.get(1)?;
                let phase = Phase::from_str(&phase_raw)
                    .ok_or_else(|| RepositoryError::invalid_column("phase", &phase_raw))?;
                Ok(SectorPhaseProducedRow {
                    sector: row.get(0)?,
                    phase,
                    produced: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<MovementRecord> {
        let action_raw: String = row.get(6)?;
        let action = MovementAction::from_str(&action_raw)
            .ok_or_else(|| RepositoryError::invalid_column("action", &action_raw))?;
        let phase_raw: String = row.get(10)?;
        let phase = Phase::from_str(&phase_raw)
            .ok_or_else(|| RepositoryError::invalid_column("phase", &phase_raw))?;

        Ok(MovementRecord {
            movement_id: row.get(0)?,
            order_id: row.get(1)?,
            source_lot_id: row.get(2)?,
            result_lot_id: row.get(3)?,
            lineage_root_id: row.get(4)?,
            checkpoint_id: row.get(5)?,
            action,
            quantity: row.get(7)?,
            from_sector: row.get(8)?,
            to_sector: row.get(9)?,
            phase,
            created_at: row.get(11)?,
            actor: row.get(12)?,
        })
    }
}
