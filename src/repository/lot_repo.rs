// ==========================================
// 生产批次追踪系统 - 批次数据仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 说明: *_tx 方法在调用方事务中执行（流转编排器使用）
// ==========================================

use crate::domain::lot::{compact_lot_code, Lot, NewLot};
use crate::domain::types::LotState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

const LOT_COLUMNS: &str = "lot_id, order_id, lot_code, total_at_creation, capacity, remaining, \
                           parent_lot_id, depth, sector, state, top_done, bottom_done, \
                           created_at, updated_at";

/// 车间/状态余量汇总行（驾驶舱）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorStateBalanceRow {
    pub sector: String,
    pub state: String,
    pub remaining: i64,
}

/// 车间面别完成计数汇总行（驾驶舱）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorPhaseCountRow {
    pub sector: String,
    pub top_done: i64,
    pub bottom_done: i64,
}

// ==========================================
// LotRepository - 批次仓储
// ==========================================
pub struct LotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LotRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, lot_id: i64) -> RepositoryResult<Option<Lot>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, lot_id)
    }

    pub fn find_by_id_tx(conn: &Connection, lot_id: i64) -> RepositoryResult<Option<Lot>> {
        let sql = format!("SELECT {} FROM lot WHERE lot_id = ?1", LOT_COLUMNS);
        let lot = conn.query_row(&sql, params![lot_id], Self::map_row).optional()?;
        Ok(lot)
    }

    /// 仅读取父批次 ID（谱系遍历用）
    ///
    /// # 返回
    /// - Ok(None): 批次不存在
    /// - Ok(Some(None)): 批次为谱系根
    /// - Ok(Some(Some(parent))): 父批次 ID
    pub fn find_parent_id_tx(conn: &Connection, lot_id: i64) -> RepositoryResult<Option<Option<i64>>> {
        let parent = conn
            .query_row(
                "SELECT parent_lot_id FROM lot WHERE lot_id = ?1",
                params![lot_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(parent)
    }

    /// 按批号定位当前持有数量的批次
    ///
    /// 同一批号下可能有多条记录（拆分子批次沿用父批号）：
    /// 1. 先精确匹配，再按去空白匹配
    /// 2. 在匹配集中优先取 remaining > 0 的最新批次，否则取最新批次
    pub fn find_active_by_code(&self, order_id: i64, lot_code: &str) -> RepositoryResult<Option<Lot>> {
        let conn = self.get_conn()?;

        let exact_sql = format!(
            "SELECT {} FROM lot WHERE order_id = ?1 AND lot_code = ?2 \
             ORDER BY (remaining > 0) DESC, lot_id DESC LIMIT 1",
            LOT_COLUMNS
        );
        let exact = conn
            .query_row(&exact_sql, params![order_id, lot_code.trim()], Self::map_row)
            .optional()?;
        if exact.is_some() {
            return Ok(exact);
        }

        let compact_sql = format!(
            "SELECT {} FROM lot WHERE order_id = ?1 AND REPLACE(lot_code, ' ', '') = ?2 \
             ORDER BY (remaining > 0) DESC, lot_id DESC LIMIT 1",
            LOT_COLUMNS
        );
        let compact = conn
            .query_row(&compact_sql, params![order_id, compact_lot_code(lot_code)], Self::map_row)
            .optional()?;
        Ok(compact)
    }

    /// 按创建时间倒序列出订单下全部批次
    pub fn list_by_order(&self, order_id: i64) -> RepositoryResult<Vec<Lot>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM lot WHERE order_id = ?1 ORDER BY created_at DESC, lot_id DESC",
            LOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let lots = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lots)
    }

    /// 列出直接子批次
    pub fn list_children(&self, parent_lot_id: i64) -> RepositoryResult<Vec<Lot>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM lot WHERE parent_lot_id = ?1 ORDER BY lot_id", LOT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let lots = stmt
            .query_map(params![parent_lot_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lots)
    }

    /// 车间 + 状态维度的余量汇总
    pub fn sector_state_balances(&self, order_id: i64) -> RepositoryResult<Vec<SectorStateBalanceRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT sector, state, COALESCE(SUM(remaining), 0)
            FROM lot
            WHERE order_id = ?1
            GROUP BY sector, state
            ORDER BY sector, state
            "#,
        )?;
        let rows = stmt
            .query_map(params![order_id], |row| {
                Ok(SectorStateBalanceRow {
                    sector: row.get(0)?,
                    state: row.get(1)?,
                    remaining: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 车间维度的面别完成计数（仅统计仍有余量的批次）
    pub fn sector_phase_counts(&self, order_id: i64) -> RepositoryResult<Vec<SectorPhaseCountRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT sector, COALESCE(SUM(top_done), 0), COALESCE(SUM(bottom_done), 0)
            FROM lot
            WHERE order_id = ?1 AND remaining > 0
            GROUP BY sector
            ORDER BY sector
            "#,
        )?;
        let rows = stmt
            .query_map(params![order_id], |row| {
                Ok(SectorPhaseCountRow {
                    sector: row.get(0)?,
                    top_done: row.get(1)?,
                    bottom_done: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ==========================================
    // 写入操作（仅在事务中调用）
    // ==========================================

    /// 插入批次并返回完整记录
    pub fn insert_tx(conn: &Connection, lot: &NewLot) -> RepositoryResult<Lot> {
        let now = Utc::now();
        conn.execute(
            r#"
            INSERT INTO lot (
                order_id, lot_code, total_at_creation, capacity, remaining,
                parent_lot_id, depth, sector, state, top_done, bottom_done,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                lot.order_id,
                lot.lot_code,
                lot.quantity,
                lot.capacity,
                lot.quantity,
                lot.parent_lot_id,
                lot.depth,
                lot.sector,
                lot.state.to_db_str(),
                lot.top_done,
                lot.bottom_done,
                now,
                now,
            ],
        )?;

        let lot_id = conn.last_insert_rowid();
        Self::find_by_id_tx(conn, lot_id)?.ok_or_else(|| RepositoryError::not_found("Lot", lot_id))
    }

    /// 条件扣减余量
    ///
    /// 仅当 remaining >= quantity 时扣减，返回受影响行数（0 表示余量不足或批次不存在）
    pub fn decrement_remaining_tx(conn: &Connection, lot_id: i64, quantity: i64) -> RepositoryResult<usize> {
        let rows = conn.execute(
            r#"
            UPDATE lot
            SET remaining = remaining - ?1, updated_at = ?2
            WHERE lot_id = ?3 AND remaining >= ?1
            "#,
            params![quantity, Utc::now(), lot_id],
        )?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Lot> {
        let state_raw: String = row.get(9)?;
        let state = LotState::from_str(&state_raw)
            .ok_or_else(|| RepositoryError::invalid_column("state", &state_raw))?;

        Ok(Lot {
            lot_id: row.get(0)?,
            order_id: row.get(1)?,
            lot_code: row.get(2)?,
            total_at_creation: row.get(3)?,
            capacity: row.get(4)?,
            remaining: row.get(5)?,
            parent_lot_id: row.get(6)?,
            depth: row.get(7)?,
            sector: row.get(8)?,
            state,
            top_done: row.get(10)?,
            bottom_done: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}
