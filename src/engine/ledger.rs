// ==========================================
// 生产批次追踪系统 - 批次台账
// ==========================================
// 守恒: parent.remaining_after + child.total_at_creation == parent.remaining_before
// 非负: 条件扣减 WHERE remaining >= q，0 行受影响视为并发超扣（一致性错误）
// 深度: 子批次 depth = 父 depth + 1，启用深度约束时不超过谱系跳数上限
// ==========================================

use crate::domain::lot::{Lot, NewLot};
use crate::domain::order::ProductionOrder;
use crate::domain::types::LotState;
use crate::engine::error::{MovementError, MovementResult};
use crate::engine::phase_policy::PhaseCounters;
use crate::repository::error::RepositoryError;
use crate::repository::lot_repo::LotRepository;
use rusqlite::Transaction;

/// 拆分结果
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub source_after: Lot,
    pub child: Lot,
}

/// 初始批次规划（未落库）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLot {
    pub lot_code: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct LotLedger {
    /// None 表示不限制谱系深度
    max_depth: Option<i64>,
}

impl LotLedger {
    pub fn new(max_depth: Option<i64>) -> Self {
        Self { max_depth }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    // ==========================================
    // 拆分
    // ==========================================

    /// 从来源批次拆出 transfer_qty 生成子批次
    ///
    /// 校验失败时无任何写入
    pub fn split(
        &self,
        tx: &Transaction<'_>,
        source: &Lot,
        transfer_qty: i64,
        destination_sector: &str,
        state: LotState,
        counters: PhaseCounters,
    ) -> MovementResult<SplitOutcome> {
        if transfer_qty <= 0 {
            return Err(MovementError::validation(format!("数量必须大于 0: {}", transfer_qty)));
        }
        if transfer_qty > source.remaining {
            return Err(MovementError::validation(format!(
                "数量 {} 超过批次 {} 剩余 {}",
                transfer_qty, source.lot_code, source.remaining
            )));
        }

        let child_depth = source.depth + 1;
        if let Some(max_depth) = self.max_depth {
            if child_depth > max_depth {
                return Err(MovementError::validation(format!(
                    "谱系深度 {} 超过上限 {}: lot_id={}",
                    child_depth, max_depth, source.lot_id
                )));
            }
        }

        let remaining_before = source.remaining;

        let updated = LotRepository::decrement_remaining_tx(tx, source.lot_id, transfer_qty)?;
        if updated == 0 {
            return Err(MovementError::consistency(format!(
                "并发超扣: lot_id={} 剩余不足 {}",
                source.lot_id, transfer_qty
            )));
        }

        let child = LotRepository::insert_tx(
            tx,
            &NewLot {
                order_id: source.order_id,
                lot_code: source.lot_code.clone(),
                quantity: transfer_qty,
                capacity: transfer_qty,
                parent_lot_id: Some(source.lot_id),
                depth: child_depth,
                sector: destination_sector.to_string(),
                state,
                top_done: counters.top_done,
                bottom_done: counters.bottom_done,
            },
        )?;

        let source_after = LotRepository::find_by_id_tx(tx, source.lot_id)?
            .ok_or_else(|| RepositoryError::not_found("Lot", source.lot_id))?;

        if source_after.remaining + child.total_at_creation != remaining_before {
            return Err(MovementError::consistency(format!(
                "数量守恒校验失败: lot_id={}, before={}, after={}, child={}",
                source.lot_id, remaining_before, source_after.remaining, child.total_at_creation
            )));
        }

        tracing::debug!(
            source_lot_id = source.lot_id,
            child_lot_id = child.lot_id,
            quantity = transfer_qty,
            destination_sector,
            "批次拆分完成"
        );

        Ok(SplitOutcome { source_after, child })
    }

    // ==========================================
    // 初始批次生成
    // ==========================================

    /// 按料盒容量规划初始批次
    ///
    /// - 批次数 = ceil(total / capacity)，capacity ≤ 0 按 1 处理
    /// - 批号 "{起始序号+i:02} / {模式}"
    /// - 每批数量 min(capacity, 剩余)
    pub fn plan_lots(order: &ProductionOrder, production_total: i64, capacity: i64) -> Vec<PlannedLot> {
        let capacity = capacity.max(1);
        let (start, pattern) = order.lot_numbering();

        let mut planned = Vec::new();
        let mut leftover = production_total.max(0);
        let mut index: u32 = 0;
        while leftover > 0 {
            let quantity = capacity.min(leftover);
            planned.push(PlannedLot {
                lot_code: format!("{:02} / {}", start + index, pattern),
                quantity,
            });
            leftover -= quantity;
            index += 1;
        }
        planned
    }

    /// 为订单生成初始批次（同一事务内全部写入）
    pub fn create_lots(
        &self,
        tx: &Transaction<'_>,
        order: &ProductionOrder,
        production_total: i64,
        capacity: i64,
        default_sector: &str,
    ) -> MovementResult<Vec<Lot>> {
        if production_total <= 0 {
            return Err(MovementError::validation(format!(
                "生产总数必须大于 0: {}",
                production_total
            )));
        }

        let capacity = capacity.max(1);
        let sector = order
            .sector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default_sector);

        let mut lots = Vec::new();
        for planned in Self::plan_lots(order, production_total, capacity) {
            let lot = LotRepository::insert_tx(
                tx,
                &NewLot {
                    order_id: order.order_id,
                    lot_code: planned.lot_code,
                    quantity: planned.quantity,
                    capacity,
                    parent_lot_id: None,
                    depth: 0,
                    sector: sector.to_string(),
                    state: LotState::Aguardando,
                    top_done: 0,
                    bottom_done: 0,
                },
            )?;
            lots.push(lot);
        }

        tracing::info!(
            order_id = order.order_id,
            production_total,
            capacity,
            lot_count = lots.len(),
            sector,
            "初始批次生成完成"
        );
        Ok(lots)
    }
}
