// ==========================================
// 生产批次追踪系统 - 标签（初始批次）API
// ==========================================
// 职责: 按生产总数与料盒容量为订单生成初始批次
// 说明: 标签打印与二维码生成不在本系统范围内，这里只落库批次
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, TransactionBehavior};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::lot::Lot;
use crate::engine::ledger::LotLedger;
use crate::repository::error::RepositoryError;
use crate::repository::history_repo::OrderHistoryRepository;
use crate::repository::order_repo::ProductionOrderRepository;

pub struct LabelApi {
    conn: Arc<Mutex<Connection>>,
    ledger: LotLedger,
    default_sector: String,
    default_actor: String,
}

impl LabelApi {
    pub fn new(conn: Arc<Mutex<Connection>>, default_sector: &str, default_actor: &str) -> Self {
        Self {
            conn,
            ledger: LotLedger::unbounded(),
            default_sector: default_sector.to_string(),
            default_actor: default_actor.to_string(),
        }
    }

    /// 为订单生成初始批次
    ///
    /// # 参数
    /// - order_id: 订单ID
    /// - production_total: 生产总数（> 0）
    /// - capacity: 料盒容量（≤ 0 按 1 处理）
    pub fn create_lots(&self, order_id: i64, production_total: i64, capacity: i64) -> ApiResult<Vec<Lot>> {
        if production_total <= 0 {
            return Err(ApiError::InvalidInput(format!("生产总数必须大于 0: {}", production_total)));
        }

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let order = ProductionOrderRepository::find_by_id_tx(&tx, order_id)?
            .ok_or_else(|| ApiError::ValidationError(format!("订单不存在: order_id={}", order_id)))?;

        let lots = self
            .ledger
            .create_lots(&tx, &order, production_total, capacity, &self.default_sector)?;

        let summary = format!(
            "Lotes gerados: {} (total: {}, capacidade: {})",
            lots.len(),
            production_total,
            capacity.max(1)
        );
        OrderHistoryRepository::insert_tx(&tx, order_id, &self.default_actor, &summary)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(lots)
    }
}
