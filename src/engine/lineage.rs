// ==========================================
// 生产批次追踪系统 - 谱系根解析
// ==========================================
// 算法: 沿 parent_lot_id 迭代上溯
// - 达到跳数上限: 返回当前批次并标记 truncated（warn 日志）
// - 重复访问同一批次: 环路，一致性错误
// - 起始批次不存在: 校验错误
// ==========================================

use crate::engine::error::{MovementError, MovementResult};
use crate::repository::lot_repo::LotRepository;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 谱系解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageResolution {
    pub root_lot_id: i64,
    pub hops: u32,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct LineageResolver {
    max_hops: u32,
}

impl LineageResolver {
    pub fn new(max_hops: u32) -> Self {
        Self { max_hops }
    }

    pub fn max_hops(&self) -> u32 {
        self.max_hops
    }

    /// 在给定连接（通常是流转事务）上解析谱系根
    pub fn resolve_root(&self, conn: &Connection, lot_id: i64) -> MovementResult<LineageResolution> {
        self.resolve_with(lot_id, |id| {
            LotRepository::find_parent_id_tx(conn, id).map_err(MovementError::from)
        })
    }

    /// 以任意父指针查找函数解析谱系根
    ///
    /// `parent_of(id)` 返回:
    /// - Ok(None): 批次不存在
    /// - Ok(Some(None)): 批次为根
    /// - Ok(Some(Some(parent))): 父批次
    pub fn resolve_with<F>(&self, lot_id: i64, mut parent_of: F) -> MovementResult<LineageResolution>
    where
        F: FnMut(i64) -> MovementResult<Option<Option<i64>>>,
    {
        let mut current = lot_id;
        let mut hops: u32 = 0;
        let mut visited = HashSet::new();
        visited.insert(current);

        loop {
            let parent = match parent_of(current)? {
                Some(parent) => parent,
                None if current == lot_id => {
                    return Err(MovementError::validation(format!("批次不存在: lot_id={}", lot_id)));
                }
                None => {
                    return Err(MovementError::consistency(format!(
                        "谱系断裂: lot_id={} 的祖先 {} 不存在",
                        lot_id, current
                    )));
                }
            };

            let Some(parent_id) = parent else {
                return Ok(LineageResolution {
                    root_lot_id: current,
                    hops,
                    truncated: false,
                });
            };

            if hops >= self.max_hops {
                tracing::warn!(
                    lot_id,
                    reached = current,
                    max_hops = self.max_hops,
                    "谱系遍历达到跳数上限，按当前批次作为根"
                );
                return Ok(LineageResolution {
                    root_lot_id: current,
                    hops,
                    truncated: true,
                });
            }

            if !visited.insert(parent_id) {
                return Err(MovementError::consistency(format!(
                    "谱系存在环路: lot_id={}, 重复访问 {}",
                    lot_id, parent_id
                )));
            }

            current = parent_id;
            hops += 1;
        }
    }
}

impl Default for LineageResolver {
    fn default() -> Self {
        Self::new(crate::config::config_manager::DEFAULT_LINEAGE_MAX_HOPS)
    }
}
