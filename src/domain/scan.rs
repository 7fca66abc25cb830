// ==========================================
// 生产批次追踪系统 - 检查点扫描事件
// ==========================================
// 来源: 外部条码归一化协作方
// 说明: 核心不解析原始扫描文本，只接收归一化后的字段
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointScan {
    pub model_code: String,
    pub lot_code: String,
    pub checkpoint_id: String,
    pub action: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub top_mark: bool,
    #[serde(default)]
    pub bottom_mark: bool,
    #[serde(default)]
    pub actor: Option<String>,
}
