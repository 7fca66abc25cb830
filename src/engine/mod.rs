// ==========================================
// 生产批次追踪系统 - 引擎层
// ==========================================
// 职责: 批次台账、流转状态机、谱系防重、产量告警
// 红线: Engine 不拼 SQL，数据访问全部经由 Repository
// 约定: 路由表与面别策略启动时加载，显式注入，无全局状态
// ==========================================

pub mod alert_monitor;
pub mod duplicate_guard;
pub mod error;
pub mod events;
pub mod ledger;
pub mod lineage;
pub mod movement;
pub mod phase_policy;
pub mod routing;

// 重导出核心引擎
pub use alert_monitor::AlertMonitor;
pub use duplicate_guard::DuplicateActionGuard;
pub use error::{MovementError, MovementResult};
pub use events::{AlertDispatcher, AlertSubscriber, ChannelAlertSubscriber, DispatchReport, NoOpAlertSubscriber};
pub use ledger::{LotLedger, PlannedLot, SplitOutcome};
pub use lineage::{LineageResolution, LineageResolver};
pub use movement::{next_state, MovementOrchestrator, MovementOutcome, MovementRequest};
pub use phase_policy::{PhaseConflictPolicy, PhaseCounters, PhaseMarks, PhasePolicy};
pub use routing::{CheckpointRule, RoutingTable};
