// ==========================================
// 生产批次追踪系统 - 驾驶舱与历史查询 API
// ==========================================
// 职责: 为驾驶舱协作方提供车间余量、产量、面别完成汇总；
//       为历史/审计查看器提供流转记录、批次快照与订单历史
// 说明: 产量全部由流转审计记录实时汇总
// ==========================================

use std::sync::Arc;

use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::lot::Lot;
use crate::domain::movement::{HistoryEntry, MovementRecord};
use crate::domain::order::ProductionOrder;
use crate::domain::types::{LotState, Phase};
use crate::engine::error::MovementError;
use crate::engine::lineage::{LineageResolution, LineageResolver};
use crate::repository::history_repo::OrderHistoryRepository;
use crate::repository::lot_repo::LotRepository;
use crate::repository::movement_repo::MovementRepository;
use crate::repository::order_repo::ProductionOrderRepository;

/// 历史查看器默认条数
pub const HISTORY_MOVEMENT_LIMIT: usize = 50;
pub const HISTORY_ENTRY_LIMIT: usize = 10;

// ==========================================
// 驾驶舱行类型
// ==========================================

/// 车间余量
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorBalance {
    pub sector: String,
    pub state: LotState,
    pub remaining: i64,
    /// AGUARDANDO 状态或余量为 0 时显示 AGUARDANDO，否则 DISPONIVEL
    pub status: LotState,
}

/// 车间 + 面别累计产量
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseProduction {
    pub sector: String,
    pub phase: Phase,
    pub produced: i64,
}

/// 车间面别完成计数
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseCompletion {
    pub sector: String,
    pub top_done: i64,
    pub bottom_done: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderOverview {
    pub order: ProductionOrder,
    pub balances: Vec<SectorBalance>,
    pub production: Vec<PhaseProduction>,
    pub completion: Vec<PhaseCompletion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderHistoryView {
    pub order: ProductionOrder,
    pub movements: Vec<MovementRecord>,
    pub lots: Vec<Lot>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LotTrace {
    pub lot: Lot,
    pub lineage: LineageResolution,
    pub children: Vec<Lot>,
    pub movements: Vec<MovementRecord>,
}

/// 余量状态显示规则
fn balance_status(state: LotState, remaining: i64) -> LotState {
    if state != LotState::Aguardando && remaining > 0 {
        LotState::Disponivel
    } else {
        LotState::Aguardando
    }
}

// ==========================================
// DashboardApi
// ==========================================
pub struct DashboardApi {
    order_repo: Arc<ProductionOrderRepository>,
    lot_repo: Arc<LotRepository>,
    movement_repo: Arc<MovementRepository>,
    history_repo: Arc<OrderHistoryRepository>,
    resolver: LineageResolver,
}

impl DashboardApi {
    pub fn new(
        order_repo: Arc<ProductionOrderRepository>,
        lot_repo: Arc<LotRepository>,
        movement_repo: Arc<MovementRepository>,
        history_repo: Arc<OrderHistoryRepository>,
        resolver: LineageResolver,
    ) -> Self {
        Self {
            order_repo,
            lot_repo,
            movement_repo,
            history_repo,
            resolver,
        }
    }

    fn require_order(&self, order_id: i64) -> ApiResult<ProductionOrder> {
        self.order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))
    }

    // ==========================================
    // 驾驶舱
    // ==========================================

    /// 单个订单的汇总视图
    pub fn order_overview(&self, order_id: i64) -> ApiResult<OrderOverview> {
        let order = self.require_order(order_id)?;

        let mut balances = Vec::new();
        for row in self.lot_repo.sector_state_balances(order_id)? {
            let state = LotState::from_str(&row.state)
                .ok_or_else(|| ApiError::InternalError(format!("未知批次状态: {}", row.state)))?;
            balances.push(SectorBalance {
                status: balance_status(state, row.remaining),
                sector: row.sector,
                state,
                remaining: row.remaining,
            });
        }

        let production = self
            .movement_repo
            .produced_by_sector_phase(order_id)?
            .into_iter()
            .map(|row| PhaseProduction {
                sector: row.sector,
                phase: row.phase,
                produced: row.produced,
            })
            .collect();

        let completion = self
            .lot_repo
            .sector_phase_counts(order_id)?
            .into_iter()
            .map(|row| PhaseCompletion {
                sector: row.sector,
                top_done: row.top_done,
                bottom_done: row.bottom_done,
            })
            .collect();

        Ok(OrderOverview {
            order,
            balances,
            production,
            completion,
        })
    }

    /// 全部订单的汇总视图
    pub fn overview_all(&self) -> ApiResult<Vec<OrderOverview>> {
        self.order_repo
            .list_all()?
            .into_iter()
            .map(|order| self.order_overview(order.order_id))
            .collect()
    }

    // ==========================================
    // 历史查看器
    // ==========================================

    /// 订单历史: 最近 50 条流转、全部批次、最近 10 条历史
    pub fn order_history(&self, order_id: i64) -> ApiResult<OrderHistoryView> {
        let order = self.require_order(order_id)?;
        Ok(OrderHistoryView {
            movements: self.movement_repo.list_by_order(order_id, HISTORY_MOVEMENT_LIMIT)?,
            lots: self.lot_repo.list_by_order(order_id)?,
            history: self.history_repo.list_by_order(order_id, HISTORY_ENTRY_LIMIT)?,
            order,
        })
    }

    /// 批次追溯: 谱系根、直接子批次、相关流转
    pub fn lot_trace(&self, lot_id: i64) -> ApiResult<LotTrace> {
        let lot = self
            .lot_repo
            .find_by_id(lot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("批次(id={})不存在", lot_id)))?;

        let lineage = self.resolver.resolve_with(lot_id, |id| {
            let found = self.lot_repo.find_by_id(id).map_err(MovementError::from)?;
            Ok(found.map(|l| l.parent_lot_id))
        })?;

        Ok(LotTrace {
            children: self.lot_repo.list_children(lot_id)?,
            movements: self.movement_repo.list_by_lot(lot_id)?,
            lot,
            lineage,
        })
    }
}
