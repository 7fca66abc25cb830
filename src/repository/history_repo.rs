// ==========================================
// 生产批次追踪系统 - 订单变更历史仓储
// ==========================================

use crate::domain::movement::HistoryEntry;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub struct OrderHistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderHistoryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在调用方事务中写入历史
    pub fn insert_tx(conn: &Connection, order_id: i64, changed_by: &str, change_text: &str) -> RepositoryResult<i64> {
        conn.execute(
            "INSERT INTO order_history (order_id, changed_at, changed_by, change_text) VALUES (?1, ?2, ?3, ?4)",
            params![order_id, Utc::now(), changed_by, change_text],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert(&self, order_id: i64, changed_by: &str, change_text: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, order_id, changed_by, change_text)
    }

    /// 最近 limit 条历史（倒序）
    pub fn list_by_order(&self, order_id: i64, limit: usize) -> RepositoryResult<Vec<HistoryEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT history_id, order_id, changed_at, changed_by, change_text
            FROM order_history
            WHERE order_id = ?1
            ORDER BY changed_at DESC, history_id DESC
            LIMIT ?2
            "#,
        )?;
        let entries = stmt
            .query_map(params![order_id, limit as i64], |row| {
                Ok(HistoryEntry {
                    history_id: row.get(0)?,
                    order_id: row.get(1)?,
                    changed_at: row.get(2)?,
                    changed_by: row.get(3)?,
                    change_text: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
