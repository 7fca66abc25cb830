// ==========================================
// 生产批次追踪系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 批次台账与流转状态机（数量守恒、谱系防重、产量告警）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/迁移）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CheckpointKind, LotState, MovementAction, Phase, PhaseConfig};

// 领域实体
pub use domain::{
    AlertEvent, AlertRule, CheckpointScan, HistoryEntry, Lot, MovementRecord, NewProductionOrder, ProductionOrder,
};

// 引擎
pub use engine::{
    AlertDispatcher, AlertMonitor, AlertSubscriber, DuplicateActionGuard, LineageResolver, LotLedger, MovementError,
    MovementOrchestrator, MovementOutcome, MovementRequest, PhaseConflictPolicy, PhaseMarks, PhasePolicy, RoutingTable,
};

// API
pub use api::{AlertApi, ApiError, ApiResult, DashboardApi, LabelApi, MovementApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产批次追踪系统";

// 数据库版本
pub const DB_VERSION: &str = "v1";
