// ==========================================
// 生产批次追踪系统 - 批次（标签）领域模型
// ==========================================
// 不变量:
// - 0 ≤ remaining ≤ total_at_creation
// - 拆分: parent.remaining_after + child.total_at_creation == parent.remaining_before
// - parent_lot_id 构成树，depth = 父批次 depth + 1
// ==========================================

use crate::domain::types::LotState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub lot_id: i64,
    pub order_id: i64,
    pub lot_code: String,          // 批号 "NN / PPP"
    pub total_at_creation: i64,    // 创建时数量
    pub capacity: i64,             // 料盒容量
    pub remaining: i64,            // 剩余数量（唯一可变的数量字段）
    pub parent_lot_id: Option<i64>, // None 表示谱系根
    pub depth: i64,                // 谱系深度（根为 0）
    pub sector: String,            // 当前车间
    pub state: LotState,
    pub top_done: i64,
    pub bottom_done: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lot {
    pub fn is_root(&self) -> bool {
        self.parent_lot_id.is_none()
    }

    /// 检查数量不变量
    pub fn quantity_invariant_holds(&self) -> bool {
        self.remaining >= 0 && self.remaining <= self.total_at_creation
    }
}

/// 新批次参数（由台账写入）
#[derive(Debug, Clone)]
pub struct NewLot {
    pub order_id: i64,
    pub lot_code: String,
    pub quantity: i64,
    pub capacity: i64,
    pub parent_lot_id: Option<i64>,
    pub depth: i64,
    pub sector: String,
    pub state: LotState,
    pub top_done: i64,
    pub bottom_done: i64,
}

/// 按空白无关方式比较批号（"08 / 504" 与 "08/504" 视为相同）
pub fn compact_lot_code(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_lot_code() {
        assert_eq!(compact_lot_code("08 / 504"), "08/504");
        assert_eq!(compact_lot_code(" 08/504 "), "08/504");
    }
}
