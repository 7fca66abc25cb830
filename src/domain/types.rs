// ==========================================
// 生产批次追踪系统 - 领域类型定义
// ==========================================
// 职责: 批次状态、面别、面别配置、流转动作、检查点类型
// 约定: 数据库统一存储 SCREAMING_SNAKE_CASE 字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 批次状态 (Lot State)
// ==========================================
// 状态机: AGUARDANDO → DISPONIVEL → [PENDENTE_CQ → CQ_APROVOU] → EXPEDIDO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotState {
    Aguardando, // 等待中
    Disponivel, // 可用
    PendenteCq, // 待质检
    CqAprovou,  // 质检通过
    Expedido,   // 已发货
}

impl fmt::Display for LotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl LotState {
    /// 从字符串解析状态（大小写不敏感）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "AGUARDANDO" => Some(LotState::Aguardando),
            "DISPONIVEL" => Some(LotState::Disponivel),
            "PENDENTE_CQ" => Some(LotState::PendenteCq),
            "CQ_APROVOU" => Some(LotState::CqAprovou),
            "EXPEDIDO" => Some(LotState::Expedido),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            LotState::Aguardando => "AGUARDANDO",
            LotState::Disponivel => "DISPONIVEL",
            LotState::PendenteCq => "PENDENTE_CQ",
            LotState::CqAprovou => "CQ_APROVOU",
            LotState::Expedido => "EXPEDIDO",
        }
    }

    /// 终态批次不再接受任何流转
    pub fn is_terminal(&self) -> bool {
        matches!(self, LotState::Expedido)
    }
}

// ==========================================
// 面别 (Phase Marker)
// ==========================================
// 双面组装的哪一面完成了本工序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Top,
    Bottom,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl Phase {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TOP" => Some(Phase::Top),
            "BOTTOM" => Some(Phase::Bottom),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Phase::Top => "TOP",
            Phase::Bottom => "BOTTOM",
        }
    }
}

// ==========================================
// 面别配置 (Phase Configuration)
// ==========================================
// 生产订单必填字段，决定允许登记哪些面别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseConfig {
    TopOnly,    // 仅 TOP
    BottomOnly, // 仅 BOTTOM
    TopBottom,  // 双面
}

impl fmt::Display for PhaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl PhaseConfig {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TOP_ONLY" => Some(PhaseConfig::TopOnly),
            "BOTTOM_ONLY" => Some(PhaseConfig::BottomOnly),
            "TOP_BOTTOM" => Some(PhaseConfig::TopBottom),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            PhaseConfig::TopOnly => "TOP_ONLY",
            PhaseConfig::BottomOnly => "BOTTOM_ONLY",
            PhaseConfig::TopBottom => "TOP_BOTTOM",
        }
    }

    /// 该配置是否允许登记指定面别
    pub fn allows(&self, phase: Phase) -> bool {
        match self {
            PhaseConfig::TopOnly => phase == Phase::Top,
            PhaseConfig::BottomOnly => phase == Phase::Bottom,
            PhaseConfig::TopBottom => true,
        }
    }
}

// ==========================================
// 流转动作 (Movement Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementAction {
    Recebimento, // 接收
    Producao,    // 生产完成
    Cq,          // 质检判定
    Retrabalho,  // 返工
    Liberado,    // 放行
}

impl fmt::Display for MovementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl MovementAction {
    /// 解析动作（去空白 + 大写归一化）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "RECEBIMENTO" => Some(MovementAction::Recebimento),
            "PRODUCAO" => Some(MovementAction::Producao),
            "CQ" => Some(MovementAction::Cq),
            "RETRABALHO" => Some(MovementAction::Retrabalho),
            "LIBERADO" => Some(MovementAction::Liberado),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            MovementAction::Recebimento => "RECEBIMENTO",
            MovementAction::Producao => "PRODUCAO",
            MovementAction::Cq => "CQ",
            MovementAction::Retrabalho => "RETRABALHO",
            MovementAction::Liberado => "LIBERADO",
        }
    }
}

// ==========================================
// 检查点类型 (Checkpoint Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointKind {
    Gate,     // 工序门
    Quality,  // 质检站
    Shipping, // 发货
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointKind::Gate => write!(f, "gate"),
            CheckpointKind::Quality => write!(f, "quality"),
            CheckpointKind::Shipping => write!(f, "shipping"),
        }
    }
}
