// ==========================================
// 生产批次追踪系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体与类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod alert;
pub mod lot;
pub mod movement;
pub mod order;
pub mod scan;
pub mod types;

// 重导出核心类型
pub use alert::{AlertEvent, AlertRule};
pub use lot::{Lot, NewLot};
pub use movement::{HistoryEntry, MovementRecord, NewMovementRecord};
pub use order::{NewProductionOrder, ProductionOrder};
pub use scan::CheckpointScan;
pub use types::{CheckpointKind, LotState, MovementAction, Phase, PhaseConfig};
