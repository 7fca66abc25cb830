// ==========================================
// 生产批次追踪系统 - 应用层
// ==========================================
// 职责: 组装仓储、引擎与 API，供终端入口使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
