// ==========================================
// 生产批次追踪系统 - 生产订单领域模型
// ==========================================
// 说明: 订单由外部 CRUD 协作方维护，核心只读
// ==========================================

use crate::domain::types::PhaseConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 默认批号起始序号（订单批号格式无法解析时使用）
pub const DEFAULT_LOT_START: u32 = 1;

/// 默认批号模式
pub const DEFAULT_LOT_PATTERN: &str = "900";

// ==========================================
// ProductionOrder - 生产订单（机型）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub order_id: i64,
    pub code: String,               // 机型代码（唯一，大写存储）
    pub model_name: String,         // 显示名称
    pub client: Option<String>,     // 客户
    pub line: Option<String>,       // 产线
    pub shift: Option<String>,      // 班次
    pub phase_config: PhaseConfig,  // 面别配置（必填）
    pub sector: Option<String>,     // 当前/归属车间
    pub lot_pattern: String,        // 批号格式 "NN / PPP"
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新建订单参数（外部 CRUD 协作方使用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProductionOrder {
    pub code: String,
    pub model_name: String,
    pub client: Option<String>,
    pub line: Option<String>,
    pub shift: Option<String>,
    pub phase_config: PhaseConfig,
    pub sector: Option<String>,
    pub lot_pattern: String,
}

impl ProductionOrder {
    /// 解析批号格式，返回 (起始序号, 模式)
    ///
    /// "08 / 504" → (8, "504")；无法解析时退回 (1, "900")
    pub fn lot_numbering(&self) -> (u32, String) {
        parse_lot_pattern(&self.lot_pattern)
    }
}

/// 解析 "NN / PPP" 形式的批号格式
pub fn parse_lot_pattern(raw: &str) -> (u32, String) {
    let mut parts = raw.split('/').map(str::trim);
    let start = parts.next().and_then(|s| s.parse::<u32>().ok());
    let pattern = parts.next().filter(|s| !s.is_empty());

    match (start, pattern) {
        (Some(start), Some(pattern)) => (start, pattern.to_string()),
        _ => (DEFAULT_LOT_START, DEFAULT_LOT_PATTERN.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lot_pattern() {
        assert_eq!(parse_lot_pattern("08 / 504"), (8, "504".to_string()));
        assert_eq!(parse_lot_pattern("12/77"), (12, "77".to_string()));
    }

    #[test]
    fn test_parse_lot_pattern_fallback() {
        assert_eq!(parse_lot_pattern(""), (1, "900".to_string()));
        assert_eq!(parse_lot_pattern("AB / 504"), (1, "900".to_string()));
        assert_eq!(parse_lot_pattern("08 / "), (1, "900".to_string()));
    }
}
