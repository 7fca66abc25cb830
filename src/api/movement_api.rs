// ==========================================
// 生产批次追踪系统 - 扫描流转 API
// ==========================================
// 职责: 接收归一化后的检查点扫描事件，定位订单与批次，交由编排器执行
// 说明: 原始扫码文本的清洗由外部协作方完成，这里只做字段级校验
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::scan::CheckpointScan;
use crate::domain::types::MovementAction;
use crate::engine::movement::{MovementOrchestrator, MovementOutcome, MovementRequest};
use crate::engine::phase_policy::PhaseMarks;
use crate::repository::lot_repo::LotRepository;
use crate::repository::order_repo::ProductionOrderRepository;

// ==========================================
// MovementApi - 流转 API
// ==========================================
pub struct MovementApi {
    order_repo: Arc<ProductionOrderRepository>,
    lot_repo: Arc<LotRepository>,
    orchestrator: Arc<MovementOrchestrator>,
}

impl MovementApi {
    pub fn new(
        order_repo: Arc<ProductionOrderRepository>,
        lot_repo: Arc<LotRepository>,
        orchestrator: Arc<MovementOrchestrator>,
    ) -> Self {
        Self {
            order_repo,
            lot_repo,
            orchestrator,
        }
    }

    /// 提交一次检查点扫描
    ///
    /// # 返回
    /// - Ok(MovementOutcome): 来源批次快照、新子批次、流转记录、触发的告警
    /// - Err(ApiError::ValidationError): 订单/批次未知、数量或面别非法
    /// - Err(ApiError::DuplicateAction): 同一谱系已登记过该动作
    pub fn submit_scan(&self, scan: &CheckpointScan) -> ApiResult<MovementOutcome> {
        let model_code = scan.model_code.trim();
        let lot_code = scan.lot_code.trim();
        let checkpoint_id = scan.checkpoint_id.trim();

        if model_code.is_empty() {
            return Err(ApiError::InvalidInput("机型代码不能为空".to_string()));
        }
        if lot_code.is_empty() {
            return Err(ApiError::InvalidInput("批号不能为空".to_string()));
        }
        if checkpoint_id.is_empty() {
            return Err(ApiError::InvalidInput("检查点不能为空".to_string()));
        }

        let action = MovementAction::from_str(&scan.action)
            .ok_or_else(|| ApiError::ValidationError(format!("未知动作: {}", scan.action)))?;

        let order = self
            .order_repo
            .find_by_code(model_code)?
            .ok_or_else(|| ApiError::ValidationError(format!("未知机型: {}", model_code)))?;

        let lot = self
            .lot_repo
            .find_active_by_code(order.order_id, lot_code)?
            .ok_or_else(|| ApiError::ValidationError(format!("机型 {} 下未找到批号 {}", order.code, lot_code)))?;

        let request = MovementRequest {
            lot_id: lot.lot_id,
            checkpoint_id: checkpoint_id.to_string(),
            action,
            quantity: scan.quantity,
            marks: PhaseMarks::new(scan.top_mark, scan.bottom_mark),
            actor: scan.actor.clone(),
        };

        self.submit(&request)
    }

    /// 按批次 ID 直接提交流转
    pub fn submit(&self, request: &MovementRequest) -> ApiResult<MovementOutcome> {
        Ok(self.orchestrator.execute(request)?)
    }
}
