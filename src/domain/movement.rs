// ==========================================
// 生产批次追踪系统 - 流转审计记录
// ==========================================
// 红线: 记录写入后不可修改
// 唯一键: (lineage_root_id, checkpoint_id, action, phase)
// ==========================================

use crate::domain::types::{MovementAction, Phase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// MovementRecord - 流转记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub movement_id: i64,
    pub order_id: i64,
    pub source_lot_id: i64,
    pub result_lot_id: i64,
    pub lineage_root_id: i64,
    pub checkpoint_id: String,
    pub action: MovementAction,
    pub quantity: i64,
    pub from_sector: String,
    pub to_sector: String,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
    pub actor: String,
}

/// 待写入的流转记录（ID 由数据库分配）
#[derive(Debug, Clone)]
pub struct NewMovementRecord {
    pub order_id: i64,
    pub source_lot_id: i64,
    pub result_lot_id: i64,
    pub lineage_root_id: i64,
    pub checkpoint_id: String,
    pub action: MovementAction,
    pub quantity: i64,
    pub from_sector: String,
    pub to_sector: String,
    pub phase: Phase,
    pub actor: String,
}

// ==========================================
// HistoryEntry - 订单变更历史
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub history_id: i64,
    pub order_id: i64,
    pub changed_at: DateTime<Utc>,
    pub changed_by: String,
    pub change_text: String,
}

impl NewMovementRecord {
    /// 生成订单历史描述
    pub fn describe(&self) -> String {
        format!(
            "{} em {} (origem: {} → destino: {}) - qtd: {}",
            self.action, self.checkpoint_id, self.from_sector, self.to_sector, self.quantity
        )
    }
}
