// ==========================================
// 生产批次追踪系统 - 产量告警规则 API
// ==========================================
// 约束: 每个 (订单, 车间, 面别) 至多一条激活且未触发的规则
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::alert::{AlertEvent, AlertRule};
use crate::domain::types::Phase;
use crate::repository::alert_repo::AlertRuleRepository;
use crate::repository::error::RepositoryError;
use crate::repository::order_repo::ProductionOrderRepository;

pub struct AlertApi {
    rule_repo: Arc<AlertRuleRepository>,
    order_repo: Arc<ProductionOrderRepository>,
}

impl AlertApi {
    pub fn new(rule_repo: Arc<AlertRuleRepository>, order_repo: Arc<ProductionOrderRepository>) -> Self {
        Self { rule_repo, order_repo }
    }

    /// 新建产量告警规则
    pub fn create_rule(&self, order_id: i64, sector: &str, phase: Phase, target_qty: i64) -> ApiResult<AlertRule> {
        let sector = sector.trim();
        if sector.is_empty() {
            return Err(ApiError::InvalidInput("车间不能为空".to_string()));
        }
        if target_qty <= 0 {
            return Err(ApiError::InvalidInput(format!("目标数量必须大于 0: {}", target_qty)));
        }
        if self.order_repo.find_by_id(order_id)?.is_none() {
            return Err(ApiError::ValidationError(format!("订单不存在: order_id={}", order_id)));
        }

        match self.rule_repo.insert(order_id, sector, phase, target_qty) {
            Ok(rule) => {
                tracing::info!(rule_id = rule.rule_id, order_id, sector, phase = %phase, target_qty, "告警规则已创建");
                Ok(rule)
            }
            Err(RepositoryError::UniqueConstraintViolation(_)) => Err(ApiError::BusinessRuleViolation(format!(
                "订单 {} 在 {}/{} 已有未触发的激活规则",
                order_id, sector, phase
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub fn deactivate_rule(&self, rule_id: i64) -> ApiResult<()> {
        self.rule_repo.deactivate(rule_id)?;
        tracing::info!(rule_id, "告警规则已停用");
        Ok(())
    }

    pub fn list_rules(&self, order_id: i64) -> ApiResult<Vec<AlertRule>> {
        Ok(self.rule_repo.list_by_order(order_id)?)
    }

    /// 已触发的告警事件（持久化的分发记录）
    pub fn list_events(&self, order_id: i64) -> ApiResult<Vec<AlertEvent>> {
        Ok(self.rule_repo.list_events_by_order(order_id)?)
    }
}
