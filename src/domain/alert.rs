// ==========================================
// 生产批次追踪系统 - 产量告警规则与事件
// ==========================================
// 不变量: 每个 (order, sector, phase) 至多一条 active 且未触发的规则
// 规则只触发一次（fired 一经置位不再复位）
// ==========================================

use crate::domain::types::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// AlertRule - 告警规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub rule_id: i64,
    pub order_id: i64,
    pub sector: String,
    pub phase: Phase,
    pub target_qty: i64,
    pub active: bool,
    pub fired: bool,
    pub fired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// AlertEvent - 告警触发事件
// ==========================================
// 与 fired 置位同事务写入，提交后分发给订阅方
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub event_id: String,
    pub rule_id: i64,
    pub order_id: i64,
    pub sector: String,
    pub phase: Phase,
    pub target_qty: i64,
    pub cumulative_qty: i64,
    pub movement_id: Option<i64>,
    pub fired_at: DateTime<Utc>,
}
