// ==========================================
// 生产批次追踪系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 说明: 引擎配置启动时加载一次，之后只读
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::phase_policy::PhaseConflictPolicy;
use crate::engine::routing::{RoutingTable, DEFAULT_SHIPPING_SECTOR};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 谱系遍历默认跳数上限
pub const DEFAULT_LINEAGE_MAX_HOPS: u32 = 32;

/// 默认初始车间
pub const DEFAULT_SECTOR: &str = "PTH";

/// 默认操作人
pub const DEFAULT_ACTOR: &str = "terminal_movimentacao";

// ==========================================
// EngineConfig - 引擎运行配置（只读快照）
// ==========================================
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_hops: u32,
    pub enforce_lineage_depth: bool,
    pub phase_conflict_policy: PhaseConflictPolicy,
    pub routing: RoutingTable,
    pub default_sector: String,
    pub default_actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_LINEAGE_MAX_HOPS,
            enforce_lineage_depth: true,
            phase_conflict_policy: PhaseConflictPolicy::default(),
            routing: RoutingTable::factory_default(),
            default_sector: DEFAULT_SECTOR.to_string(),
            default_actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, "配置已更新");
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 谱系配置 =====

    pub fn get_lineage_max_hops(&self) -> Result<u32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::LINEAGE_MAX_HOPS, "32")?;
        match value.trim().parse::<u32>() {
            Ok(v) if v > 0 => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = config_keys::LINEAGE_MAX_HOPS,
                    raw = %value,
                    "配置值无效，使用默认值 {}",
                    DEFAULT_LINEAGE_MAX_HOPS
                );
                Ok(DEFAULT_LINEAGE_MAX_HOPS)
            }
        }
    }

    pub fn get_enforce_lineage_depth(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::ENFORCE_LINEAGE_DEPTH, "true")?;
        Ok(!matches!(value.trim().to_lowercase().as_str(), "false" | "0" | "no"))
    }

    // ===== 面别配置 =====

    pub fn get_phase_conflict_policy(&self) -> Result<PhaseConflictPolicy, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::PHASE_CONFLICT_POLICY, "PREFER_TOP")?;
        match PhaseConflictPolicy::from_str(&value) {
            Some(policy) => Ok(policy),
            None => {
                tracing::warn!(
                    config_key = config_keys::PHASE_CONFLICT_POLICY,
                    raw = %value,
                    "未知的面别冲突策略，使用 PREFER_TOP"
                );
                Ok(PhaseConflictPolicy::PreferTop)
            }
        }
    }

    // ===== 路由配置 =====

    /// 读取路由表
    ///
    /// 未配置时返回默认布局；shipping_sector 单独配置时覆盖路由表中的值。
    /// JSON 格式错误视为配置错误直接返回（不静默退回默认布局）。
    pub fn get_routing_table(&self) -> Result<RoutingTable, Box<dyn Error>> {
        let table = match self.get_config_value(config_keys::ROUTING_TABLE)? {
            Some(raw) => RoutingTable::from_json(&raw)?,
            None => RoutingTable::factory_default(),
        };

        match self.get_config_value(config_keys::SHIPPING_SECTOR)? {
            Some(sector) if !sector.trim().is_empty() => Ok(table.with_shipping_sector(sector.trim())),
            _ => Ok(table),
        }
    }

    pub fn get_default_sector(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::DEFAULT_SECTOR, DEFAULT_SECTOR)
    }

    pub fn get_shipping_sector(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::SHIPPING_SECTOR, DEFAULT_SHIPPING_SECTOR)
    }

    pub fn get_default_actor(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::DEFAULT_ACTOR, DEFAULT_ACTOR)
    }

    /// 加载引擎配置快照
    pub fn load_engine_config(&self) -> Result<EngineConfig, Box<dyn Error>> {
        let config = EngineConfig {
            max_hops: self.get_lineage_max_hops()?,
            enforce_lineage_depth: self.get_enforce_lineage_depth()?,
            phase_conflict_policy: self.get_phase_conflict_policy()?,
            routing: self.get_routing_table()?,
            default_sector: self.get_default_sector()?,
            default_actor: self.get_default_actor()?,
        };

        tracing::info!(
            max_hops = config.max_hops,
            enforce_lineage_depth = config.enforce_lineage_depth,
            phase_conflict_policy = %config.phase_conflict_policy,
            shipping_sector = config.routing.shipping_sector(),
            "引擎配置加载完成"
        );
        Ok(config)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 谱系
    pub const LINEAGE_MAX_HOPS: &str = "lineage_max_hops";
    pub const ENFORCE_LINEAGE_DEPTH: &str = "enforce_lineage_depth";

    // 面别
    pub const PHASE_CONFLICT_POLICY: &str = "phase_conflict_policy";

    // 路由
    pub const ROUTING_TABLE: &str = "routing_table"; // 路由表 (JSON)
    pub const DEFAULT_SECTOR: &str = "default_sector";
    pub const SHIPPING_SECTOR: &str = "shipping_sector";

    // 审计
    pub const DEFAULT_ACTOR: &str = "default_actor";
}
