// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================
#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

use lot_trace::app::AppState;
use lot_trace::config::config_manager::config_keys;
use lot_trace::config::ConfigManager;
use lot_trace::domain::lot::Lot;
use lot_trace::domain::order::NewProductionOrder;
use lot_trace::domain::types::{MovementAction, PhaseConfig};
use lot_trace::engine::events::AlertSubscriber;
use lot_trace::engine::movement::MovementRequest;
use lot_trace::engine::phase_policy::PhaseMarks;
use lot_trace::engine::routing::{CheckpointRule, RoutingTable};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并执行迁移
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    lot_trace::db::open_and_migrate(&db_path)?;

    Ok((temp_file, db_path))
}

/// 测试路由表: 默认布局 + 测试检查点
pub fn test_routing_table() -> RoutingTable {
    RoutingTable::factory_default()
        .with_checkpoint("gate-1", CheckpointRule::gate("SMT"))
        .with_checkpoint("gate-2", CheckpointRule::gate("IM"))
        .with_checkpoint("cq-1", CheckpointRule::quality("SMT"))
        .with_checkpoint("ship-1", CheckpointRule::shipping("ESTOQUE"))
}

/// 写入配置项（在 AppState 创建之前调用）
pub fn write_config(db_path: &str, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
    ConfigManager::new(db_path)?.set_config_value(key, value)
}

/// 写入路由表配置
pub fn write_routing(db_path: &str, table: &RoutingTable) -> Result<(), Box<dyn Error>> {
    write_config(db_path, config_keys::ROUTING_TABLE, &serde_json::to_string(table)?)
}

/// 创建带测试路由表的应用状态
pub fn setup_state() -> (NamedTempFile, String, AppState) {
    setup_state_with(Vec::new())
}

pub fn setup_state_with(subscribers: Vec<Arc<dyn AlertSubscriber>>) -> (NamedTempFile, String, AppState) {
    lot_trace::logging::init_test();
    let (temp_file, db_path) = create_test_db().unwrap();
    write_routing(&db_path, &test_routing_table()).unwrap();
    let state = AppState::with_subscribers(db_path.clone(), subscribers).unwrap();
    (temp_file, db_path, state)
}

/// 新建订单
pub fn create_order(state: &AppState, code: &str, phase_config: PhaseConfig, sector: Option<&str>) -> i64 {
    state
        .order_repo
        .insert(&NewProductionOrder {
            code: code.to_string(),
            model_name: format!("Modelo {}", code),
            client: Some("Cliente".to_string()),
            line: Some("L1".to_string()),
            shift: None,
            phase_config,
            sector: sector.map(str::to_string),
            lot_pattern: "01 / 900".to_string(),
        })
        .unwrap()
}

/// 生成单个初始批次
pub fn create_lot(state: &AppState, order_id: i64, quantity: i64) -> Lot {
    let mut lots = state.label_api.create_lots(order_id, quantity, quantity).unwrap();
    assert_eq!(lots.len(), 1);
    lots.remove(0)
}

/// 构造流转请求
pub fn request(lot_id: i64, checkpoint_id: &str, action: MovementAction, quantity: Option<i64>, marks: PhaseMarks) -> MovementRequest {
    MovementRequest {
        lot_id,
        checkpoint_id: checkpoint_id.to_string(),
        action,
        quantity,
        marks,
        actor: Some("tester".to_string()),
    }
}

/// 读取批次当前快照
pub fn reload_lot(db_path: &str, lot_id: i64) -> Lot {
    let conn = lot_trace::db::open_sqlite_connection(db_path).unwrap();
    lot_trace::repository::LotRepository::find_by_id_tx(&conn, lot_id)
        .unwrap()
        .unwrap()
}

/// 表行数
pub fn count_rows(db_path: &str, table: &str) -> i64 {
    let conn = lot_trace::db::open_sqlite_connection(db_path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}
