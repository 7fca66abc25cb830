// ==========================================
// 生产批次追踪系统 - 终端入口
// ==========================================
// 输入: 标准输入，每行一个归一化后的扫描事件（JSON）
// 输出: 标准输出，每行一个处理结果（JSON）
// 日志: 标准错误（LOT_TRACE_LOG_FORMAT=json 时输出 JSON）
// ==========================================

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use lot_trace::app::{get_default_db_path, AppState};
use lot_trace::domain::scan::CheckpointScan;
use lot_trace::engine::events::{AlertSubscriber, ChannelAlertSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lot_trace::logging::init_with(lot_trace::logging::LogFormat::from_env());

    tracing::info!("==================================================");
    tracing::info!("{}", lot_trace::APP_NAME);
    tracing::info!("系统版本: {}", lot_trace::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    // 告警通道: 由独立任务消费，输出到日志
    let (subscriber, mut alerts) = ChannelAlertSubscriber::channel();
    let subscribers: Vec<Arc<dyn AlertSubscriber>> = vec![Arc::new(subscriber)];
    let alert_task = tokio::spawn(async move {
        while let Some(event) = alerts.recv().await {
            tracing::warn!(
                event_id = %event.event_id,
                order_id = event.order_id,
                sector = %event.sector,
                phase = %event.phase,
                target_qty = event.target_qty,
                cumulative_qty = event.cumulative_qty,
                "产量告警"
            );
        }
    });

    let state = Arc::new(
        AppState::with_subscribers(db_path, subscribers)
            .map_err(anyhow::Error::msg)
            .context("无法初始化AppState")?,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut processed: u64 = 0;

    while let Some(line) = lines.next_line().await.context("读取标准输入失败")? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<CheckpointScan>(&line) {
            Ok(scan) => {
                let state = state.clone();
                let result = tokio::task::spawn_blocking(move || state.movement_api.submit_scan(&scan))
                    .await
                    .context("流转任务异常退出")?;
                match result {
                    Ok(outcome) => json!({ "ok": true, "outcome": outcome }),
                    Err(e) => json!({ "ok": false, "kind": e.kind(), "error": e.to_string() }),
                }
            }
            Err(e) => json!({ "ok": false, "kind": "INVALID_INPUT", "error": format!("无法解析扫描事件: {}", e) }),
        };

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", response).context("写入标准输出失败")?;
        stdout.flush().context("写入标准输出失败")?;
        processed += 1;
    }

    tracing::info!(processed, "输入结束，退出");

    // 释放订阅方发送端后等待告警任务结束
    drop(state);
    alert_task.await.context("告警任务异常退出")?;
    Ok(())
}
