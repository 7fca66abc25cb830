// ==========================================
// 生产批次追踪系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供扫码终端、驾驶舱与外部协作方调用
// ==========================================

pub mod alert_api;
pub mod dashboard_api;
pub mod error;
pub mod label_api;
pub mod movement_api;

// 重导出核心类型
pub use alert_api::AlertApi;
pub use dashboard_api::{
    DashboardApi, LotTrace, OrderHistoryView, OrderOverview, PhaseCompletion, PhaseProduction, SectorBalance,
};
pub use error::{ApiError, ApiResult};
pub use label_api::LabelApi;
pub use movement_api::MovementApi;
