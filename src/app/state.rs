// ==========================================
// 生产批次追踪系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 单个共享数据库连接；引擎配置启动时加载一次
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{AlertApi, DashboardApi, LabelApi, MovementApi};
use crate::config::config_manager::{ConfigManager, EngineConfig};
use crate::engine::events::{AlertDispatcher, AlertSubscriber};
use crate::engine::lineage::LineageResolver;
use crate::engine::movement::MovementOrchestrator;
use crate::repository::{
    AlertRuleRepository, LotRepository, MovementRepository, OrderHistoryRepository, ProductionOrderRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 引擎配置快照
    pub engine_config: EngineConfig,

    /// 扫描流转API
    pub movement_api: Arc<MovementApi>,

    /// 标签（初始批次）API
    pub label_api: Arc<LabelApi>,

    /// 告警规则API
    pub alert_api: Arc<AlertApi>,

    /// 驾驶舱与历史查询API
    pub dashboard_api: Arc<DashboardApi>,

    /// 订单仓储（供外部订单维护协作方使用）
    pub order_repo: Arc<ProductionOrderRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例（不挂载告警订阅方）
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_subscribers(db_path, Vec::new())
    }

    /// 创建AppState并挂载告警订阅方
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并执行迁移
    /// 2. 加载引擎配置
    /// 3. 初始化所有Repository、Engine与API
    pub fn with_subscribers(db_path: String, subscribers: Vec<Arc<dyn AlertSubscriber>>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_and_migrate(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone()).map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let engine_config = config_manager
            .load_engine_config()
            .map_err(|e| format!("无法加载引擎配置: {}", e))?;

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let order_repo = Arc::new(ProductionOrderRepository::new(conn.clone()));
        let lot_repo = Arc::new(LotRepository::new(conn.clone()));
        let movement_repo = Arc::new(MovementRepository::new(conn.clone()));
        let history_repo = Arc::new(OrderHistoryRepository::new(conn.clone()));
        let alert_repo = Arc::new(AlertRuleRepository::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let dispatcher = subscribers
            .into_iter()
            .fold(AlertDispatcher::new(), |d, s| d.with_subscriber(s));
        tracing::info!("告警订阅方数量: {}", dispatcher.subscriber_count());

        let orchestrator = Arc::new(MovementOrchestrator::new(
            conn.clone(),
            &engine_config,
            Arc::new(dispatcher),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let movement_api = Arc::new(MovementApi::new(order_repo.clone(), lot_repo.clone(), orchestrator));
        let label_api = Arc::new(LabelApi::new(
            conn.clone(),
            &engine_config.default_sector,
            &engine_config.default_actor,
        ));
        let alert_api = Arc::new(AlertApi::new(alert_repo, order_repo.clone()));
        let dashboard_api = Arc::new(DashboardApi::new(
            order_repo.clone(),
            lot_repo,
            movement_repo,
            history_repo,
            LineageResolver::new(engine_config.max_hops),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            engine_config,
            movement_api,
            label_api,
            alert_api,
            dashboard_api,
            order_repo,
            config_manager,
        })
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 LOT_TRACE_DB_PATH（若设置）
/// - 开发环境: 用户数据目录/lot-trace-dev/lot_trace.db
/// - 生产环境: 用户数据目录/lot-trace/lot_trace.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("LOT_TRACE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./lot_trace.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("lot-trace-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("lot-trace");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("lot_trace.db");
    }

    path.to_string_lossy().to_string()
}
