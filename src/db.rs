// ==========================================
// 生产批次追踪系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 建表幂等，schema_version 记录当前版本
// - 约束兜底: remaining 范围 CHECK、流转去重唯一键、告警规则部分唯一索引
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
///
/// 多终端并发提交流转时，IMMEDIATE 事务会在此时间内等待写锁
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接并确保 schema 就绪
pub fn open_and_migrate(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 执行建表（幂等）
///
/// 说明：schema 演进由外部版本化迁移负责；这里只保证当前版本的表存在，
/// 并在发现更高版本时告警（不降级）。
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_V1)?;

    match read_schema_version(conn)? {
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            tracing::warn!(
                db_version = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema_version 高于当前代码版本"
            );
        }
        Some(v) if v == CURRENT_SCHEMA_VERSION => {}
        _ => {
            conn.execute(
                "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
                [CURRENT_SCHEMA_VERSION],
            )?;
            tracing::info!(version = CURRENT_SCHEMA_VERSION, "schema 初始化完成");
        }
    }

    Ok(())
}

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS production_order (
    order_id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    model_name TEXT NOT NULL,
    client TEXT,
    line TEXT,
    shift TEXT,
    phase_config TEXT NOT NULL
        CHECK (phase_config IN ('TOP_ONLY', 'BOTTOM_ONLY', 'TOP_BOTTOM')),
    sector TEXT,
    lot_pattern TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lot (
    lot_id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id INTEGER NOT NULL REFERENCES production_order(order_id),
    lot_code TEXT NOT NULL,
    total_at_creation INTEGER NOT NULL CHECK (total_at_creation > 0),
    capacity INTEGER NOT NULL CHECK (capacity > 0),
    remaining INTEGER NOT NULL
        CHECK (remaining >= 0 AND remaining <= total_at_creation),
    parent_lot_id INTEGER REFERENCES lot(lot_id),
    depth INTEGER NOT NULL DEFAULT 0 CHECK (depth >= 0),
    sector TEXT NOT NULL,
    state TEXT NOT NULL,
    top_done INTEGER NOT NULL DEFAULT 0,
    bottom_done INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_lot_order_code ON lot(order_id, lot_code);
CREATE INDEX IF NOT EXISTS idx_lot_parent ON lot(parent_lot_id);

CREATE TABLE IF NOT EXISTS movement (
    movement_id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id INTEGER NOT NULL REFERENCES production_order(order_id),
    source_lot_id INTEGER NOT NULL REFERENCES lot(lot_id),
    result_lot_id INTEGER NOT NULL REFERENCES lot(lot_id),
    lineage_root_id INTEGER NOT NULL REFERENCES lot(lot_id),
    checkpoint_id TEXT NOT NULL,
    action TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    from_sector TEXT NOT NULL,
    to_sector TEXT NOT NULL,
    phase TEXT NOT NULL CHECK (phase IN ('TOP', 'BOTTOM')),
    created_at TEXT NOT NULL,
    actor TEXT NOT NULL,
    UNIQUE (lineage_root_id, checkpoint_id, action, phase)
);

CREATE INDEX IF NOT EXISTS idx_movement_source ON movement(source_lot_id);
CREATE INDEX IF NOT EXISTS idx_movement_result ON movement(result_lot_id);
CREATE INDEX IF NOT EXISTS idx_movement_aggregate
    ON movement(order_id, to_sector, phase, action);

CREATE TABLE IF NOT EXISTS order_history (
    history_id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id INTEGER NOT NULL REFERENCES production_order(order_id),
    changed_at TEXT NOT NULL,
    changed_by TEXT NOT NULL,
    change_text TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_order_history_order ON order_history(order_id, changed_at);

CREATE TABLE IF NOT EXISTS alert_rule (
    rule_id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id INTEGER NOT NULL REFERENCES production_order(order_id),
    sector TEXT NOT NULL,
    phase TEXT NOT NULL CHECK (phase IN ('TOP', 'BOTTOM')),
    target_qty INTEGER NOT NULL CHECK (target_qty > 0),
    active INTEGER NOT NULL DEFAULT 1,
    fired INTEGER NOT NULL DEFAULT 0,
    fired_at TEXT,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_alert_rule_open
    ON alert_rule(order_id, sector, phase)
    WHERE active = 1 AND fired = 0;

CREATE TABLE IF NOT EXISTS alert_event (
    event_id TEXT PRIMARY KEY,
    rule_id INTEGER NOT NULL REFERENCES alert_rule(rule_id),
    order_id INTEGER NOT NULL REFERENCES production_order(order_id),
    sector TEXT NOT NULL,
    phase TEXT NOT NULL,
    target_qty INTEGER NOT NULL,
    cumulative_qty INTEGER NOT NULL,
    movement_id INTEGER REFERENCES movement(movement_id),
    fired_at TEXT NOT NULL
);
"#;
