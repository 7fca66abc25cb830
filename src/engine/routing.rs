// ==========================================
// 生产批次追踪系统 - 检查点路由表
// ==========================================
// 规则:
// - 发货检查点: PRODUCAO 一律路由到发货车间
// - 质检检查点: 保持批次当前车间（只标记就绪，不搬移）
// - 工序门检查点: 路由到检查点所属车间
// - 复合车间 IM/PA: 订单归属 IM 或 PA 时取订单车间，否则取 IM
// 说明: 路由表启动时加载一次，只读，显式注入编排器
// ==========================================

use crate::domain::types::{CheckpointKind, MovementAction};
use crate::engine::error::{MovementError, MovementResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 默认发货车间
pub const DEFAULT_SHIPPING_SECTOR: &str = "EXPEDICAO";

/// 复合车间标识
pub const COMPOSITE_SECTOR_IM_PA: &str = "IM/PA";

/// 单个检查点规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRule {
    pub sector: String,
    pub kind: CheckpointKind,
    /// 在此检查点 RECEBIMENTO 时面别计数清零（质检站接收）
    #[serde(default)]
    pub reentry_boundary: bool,
}

impl CheckpointRule {
    pub fn gate(sector: &str) -> Self {
        Self {
            sector: sector.to_string(),
            kind: CheckpointKind::Gate,
            reentry_boundary: false,
        }
    }

    pub fn quality(sector: &str) -> Self {
        Self {
            sector: sector.to_string(),
            kind: CheckpointKind::Quality,
            reentry_boundary: true,
        }
    }

    pub fn shipping(sector: &str) -> Self {
        Self {
            sector: sector.to_string(),
            kind: CheckpointKind::Shipping,
            reentry_boundary: false,
        }
    }
}

fn default_shipping_sector() -> String {
    DEFAULT_SHIPPING_SECTOR.to_string()
}

// ==========================================
// RoutingTable - 路由表
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTable {
    #[serde(default = "default_shipping_sector")]
    shipping_sector: String,
    checkpoints: BTreeMap<String, CheckpointRule>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::factory_default()
    }
}

impl RoutingTable {
    /// 空路由表
    pub fn empty() -> Self {
        Self {
            shipping_sector: default_shipping_sector(),
            checkpoints: BTreeMap::new(),
        }
    }

    /// 车间默认布局（Ponto-01 ~ Ponto-07）
    pub fn factory_default() -> Self {
        Self::empty()
            .with_checkpoint("Ponto-01", CheckpointRule::gate("PTH"))
            .with_checkpoint("Ponto-02", CheckpointRule::gate("SMT"))
            .with_checkpoint("Ponto-03", CheckpointRule::quality("SMT"))
            .with_checkpoint("Ponto-04", CheckpointRule::gate(COMPOSITE_SECTOR_IM_PA))
            .with_checkpoint("Ponto-05", CheckpointRule::quality(COMPOSITE_SECTOR_IM_PA))
            .with_checkpoint("Ponto-06", CheckpointRule::quality(COMPOSITE_SECTOR_IM_PA))
            .with_checkpoint("Ponto-07", CheckpointRule::shipping("ESTOQUE"))
    }

    /// 从 JSON 解析（config_kv.routing_table）
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn with_checkpoint(mut self, checkpoint_id: &str, rule: CheckpointRule) -> Self {
        self.checkpoints.insert(checkpoint_id.to_string(), rule);
        self
    }

    pub fn with_shipping_sector(mut self, sector: &str) -> Self {
        self.shipping_sector = sector.to_string();
        self
    }

    pub fn shipping_sector(&self) -> &str {
        &self.shipping_sector
    }

    pub fn checkpoint(&self, checkpoint_id: &str) -> Option<&CheckpointRule> {
        self.checkpoints.get(checkpoint_id)
    }

    pub fn checkpoint_ids(&self) -> impl Iterator<Item = &str> {
        self.checkpoints.keys().map(String::as_str)
    }

    /// 查找检查点规则，不存在时返回校验错误
    pub fn require_checkpoint(&self, checkpoint_id: &str) -> MovementResult<&CheckpointRule> {
        self.checkpoint(checkpoint_id)
            .ok_or_else(|| MovementError::validation(format!("未知检查点: {}", checkpoint_id)))
    }

    /// 计算目标车间
    ///
    /// # 参数
    /// - `current_sector`: 批次当前车间
    /// - `order_sector`: 订单归属车间（用于 IM/PA 归一化）
    pub fn resolve_destination(
        &self,
        checkpoint_id: &str,
        action: MovementAction,
        current_sector: &str,
        order_sector: Option<&str>,
    ) -> MovementResult<String> {
        let rule = self.require_checkpoint(checkpoint_id)?;

        let sector = match rule.kind {
            CheckpointKind::Shipping if action == MovementAction::Producao => self.shipping_sector.clone(),
            CheckpointKind::Quality => current_sector.to_string(),
            CheckpointKind::Gate | CheckpointKind::Shipping => rule.sector.clone(),
        };

        Ok(normalize_composite_sector(&sector, order_sector))
    }
}

/// IM/PA 归一化
fn normalize_composite_sector(sector: &str, order_sector: Option<&str>) -> String {
    if sector != COMPOSITE_SECTOR_IM_PA {
        return sector.to_string();
    }

    match order_sector.map(str::trim) {
        Some("IM") => "IM".to_string(),
        Some("PA") => "PA".to_string(),
        _ => "IM".to_string(),
    }
}
