// ==========================================
// 生产批次追踪系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: *_tx 关联函数在调用方事务中执行，不自行加锁
// ==========================================

pub mod alert_repo;
pub mod error;
pub mod history_repo;
pub mod lot_repo;
pub mod movement_repo;
pub mod order_repo;

// 重导出核心仓储
pub use alert_repo::AlertRuleRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use history_repo::OrderHistoryRepository;
pub use lot_repo::{LotRepository, SectorPhaseCountRow, SectorStateBalanceRow};
pub use movement_repo::{MovementRepository, SectorPhaseProducedRow};
pub use order_repo::ProductionOrderRepository;
