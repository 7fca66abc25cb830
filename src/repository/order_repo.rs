// ==========================================
// 生产批次追踪系统 - 生产订单数据仓储
// ==========================================
// 说明: 订单 CRUD 由外部协作方驱动，核心只通过 find_* 读取
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

use crate::domain::order::{NewProductionOrder, ProductionOrder};
use crate::domain::types::PhaseConfig;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const ORDER_COLUMNS: &str = "order_id, code, model_name, client, line, shift, phase_config, \
                             sector, lot_pattern, created_at, updated_at";

// ==========================================
// ProductionOrderRepository - 生产订单仓储
// ==========================================
pub struct ProductionOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作（外部 CRUD 协作方）
    // ==========================================

    /// 新建订单，返回 order_id
    ///
    /// 代码统一去空白并转大写存储，重复代码返回 UniqueConstraintViolation
    pub fn insert(&self, order: &NewProductionOrder) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let now = Utc::now();

        conn.execute(
            r#"
            INSERT INTO production_order (
                code, model_name, client, line, shift, phase_config,
                sector, lot_pattern, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                order.code.trim().to_uppercase(),
                order.model_name,
                order.client,
                order.line,
                order.shift,
                order.phase_config.to_db_str(),
                order.sector,
                order.lot_pattern,
                now,
                now,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// 更新订单元数据
    pub fn update(&self, order: &ProductionOrder) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            r#"
            UPDATE production_order
            SET code = ?1, model_name = ?2, client = ?3, line = ?4, shift = ?5,
                phase_config = ?6, sector = ?7, lot_pattern = ?8, updated_at = ?9
            WHERE order_id = ?10
            "#,
            params![
                order.code.trim().to_uppercase(),
                order.model_name,
                order.client,
                order.line,
                order.shift,
                order.phase_config.to_db_str(),
                order.sector,
                order.lot_pattern,
                Utc::now(),
                order.order_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::not_found("ProductionOrder", order.order_id));
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, order_id: i64) -> RepositoryResult<Option<ProductionOrder>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, order_id)
    }

    /// 在调用方事务中按 ID 查询
    pub fn find_by_id_tx(conn: &Connection, order_id: i64) -> RepositoryResult<Option<ProductionOrder>> {
        let sql = format!("SELECT {} FROM production_order WHERE order_id = ?1", ORDER_COLUMNS);
        let order = conn
            .query_row(&sql, params![order_id], Self::map_row)
            .optional()?;
        Ok(order)
    }

    /// 按代码查询（大小写不敏感）
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<ProductionOrder>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM production_order WHERE code = ?1", ORDER_COLUMNS);
        let order = conn
            .query_row(&sql, params![code.trim().to_uppercase()], Self::map_row)
            .optional()?;
        Ok(order)
    }

    /// 按名称排序列出全部订单
    pub fn list_all(&self) -> RepositoryResult<Vec<ProductionOrder>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM production_order ORDER BY model_name, order_id", ORDER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ProductionOrder> {
        let phase_raw: String = row.get(6)?;
        let phase_config = PhaseConfig::from_str(&phase_raw)
            .ok_or_else(|| RepositoryError::invalid_column("phase_config", &phase_raw))?;

        Ok(ProductionOrder {
            order_id: row.get(0)?,
            code: row.get(1)?,
            model_name: row.get(2)?,
            client: row.get(3)?,
            line: row.get(4)?,
            shift: row.get(5)?,
            phase_config,
            sector: row.get(7)?,
            lot_pattern: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ProductionOrderRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::run_migrations(&conn).unwrap();
        ProductionOrderRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn new_order(code: &str) -> NewProductionOrder {
        NewProductionOrder {
            code: code.to_string(),
            model_name: "Placa Controle".to_string(),
            client: Some("ACME".to_string()),
            line: Some("L1".to_string()),
            shift: None,
            phase_config: PhaseConfig::TopBottom,
            sector: Some("SMT".to_string()),
            lot_pattern: "08 / 504".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find_by_code_case_insensitive() {
        let repo = setup();
        let id = repo.insert(&new_order(" abc123 ")).unwrap();

        let found = repo.find_by_code("ABC123").unwrap().unwrap();
        assert_eq!(found.order_id, id);
        assert_eq!(found.code, "ABC123");
        assert_eq!(found.phase_config, PhaseConfig::TopBottom);

        assert!(repo.find_by_code("abc123").unwrap().is_some());
        assert!(repo.find_by_code("XYZ").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let repo = setup();
        repo.insert(&new_order("ABC")).unwrap();

        let err = repo.insert(&new_order("abc")).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_update_missing_order() {
        let repo = setup();
        let id = repo.insert(&new_order("ABC")).unwrap();
        let mut order = repo.find_by_id(id).unwrap().unwrap();

        order.phase_config = PhaseConfig::TopOnly;
        repo.update(&order).unwrap();
        assert_eq!(repo.find_by_id(id).unwrap().unwrap().phase_config, PhaseConfig::TopOnly);

        order.order_id = 999;
        assert!(matches!(repo.update(&order), Err(RepositoryError::NotFound { .. })));
    }
}
