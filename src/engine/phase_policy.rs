// ==========================================
// 生产批次追踪系统 - 面别策略
// ==========================================
// 规则:
// - 双面标记: PREFER_TOP 折叠为 TOP（记录 warn），REJECT 返回校验错误
// - 无标记: 校验错误（每次流转必须且只能登记一个面别）
// - 订单面别配置不允许的面别（含折叠后的 TOP）: 校验错误
// - 子批次计数: 标记面别 = 父计数 + 数量，另一面沿用父计数；
//   质检站 RECEBIMENTO（重入边界）两面清零
// ==========================================

use crate::domain::lot::Lot;
use crate::domain::types::{Phase, PhaseConfig};
use crate::engine::error::{MovementError, MovementResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 双面冲突策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseConflictPolicy {
    #[default]
    PreferTop,
    Reject,
}

impl PhaseConflictPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PREFER_TOP" => Some(PhaseConflictPolicy::PreferTop),
            "REJECT" => Some(PhaseConflictPolicy::Reject),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            PhaseConflictPolicy::PreferTop => "PREFER_TOP",
            PhaseConflictPolicy::Reject => "REJECT",
        }
    }
}

impl fmt::Display for PhaseConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

/// 扫描携带的面别标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMarks {
    #[serde(default)]
    pub top: bool,
    #[serde(default)]
    pub bottom: bool,
}

impl PhaseMarks {
    pub fn new(top: bool, bottom: bool) -> Self {
        Self { top, bottom }
    }

    pub fn top() -> Self {
        Self::new(true, false)
    }

    pub fn bottom() -> Self {
        Self::new(false, true)
    }

    pub fn none() -> Self {
        Self::new(false, false)
    }
}

/// 子批次的面别完成计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCounters {
    pub top_done: i64,
    pub bottom_done: i64,
}

// ==========================================
// PhasePolicy
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct PhasePolicy {
    conflict: PhaseConflictPolicy,
}

impl PhasePolicy {
    pub fn new(conflict: PhaseConflictPolicy) -> Self {
        Self { conflict }
    }

    /// 解析本次流转登记的面别
    pub fn resolve(&self, phase_config: PhaseConfig, marks: PhaseMarks) -> MovementResult<Phase> {
        let phase = match (marks.top, marks.bottom) {
            (true, false) => Phase::Top,
            (false, true) => Phase::Bottom,
            (false, false) => {
                return Err(MovementError::validation("必须标记 TOP 或 BOTTOM 之一"));
            }
            (true, true) => match self.conflict {
                PhaseConflictPolicy::Reject => {
                    return Err(MovementError::validation("不能同时标记 TOP 与 BOTTOM"));
                }
                PhaseConflictPolicy::PreferTop => {
                    tracing::warn!(phase_config = %phase_config, "TOP 与 BOTTOM 同时标记，按 TOP 登记");
                    Phase::Top
                }
            },
        };

        if !phase_config.allows(phase) {
            return Err(MovementError::validation(format!(
                "面别配置 {} 不允许登记 {}",
                phase_config, phase
            )));
        }

        Ok(phase)
    }

    /// 计算子批次的面别计数
    ///
    /// 调用方须先校验 0 < quantity <= 父批次剩余；计数溢出视为数据不一致
    pub fn child_counters(parent: &Lot, phase: Phase, quantity: i64, reset: bool) -> MovementResult<PhaseCounters> {
        if reset {
            return Ok(PhaseCounters::default());
        }

        let add = |done: i64| {
            done.checked_add(quantity).ok_or_else(|| {
                MovementError::consistency(format!(
                    "批次 {} 面别计数溢出: {} + {}",
                    parent.lot_id, done, quantity
                ))
            })
        };

        match phase {
            Phase::Top => Ok(PhaseCounters {
                top_done: add(parent.top_done)?,
                bottom_done: parent.bottom_done,
            }),
            Phase::Bottom => Ok(PhaseCounters {
                top_done: parent.top_done,
                bottom_done: add(parent.bottom_done)?,
            }),
        }
    }
}
