// ==========================================
// 生产批次追踪系统 - 日志
// ==========================================
// 输出: 标准错误（标准输出留给流转结果）
// 级别: RUST_LOG，缺省 info
// 格式: LOT_TRACE_LOG_FORMAT=json 时输出 JSON，便于车间终端日志汇总
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量
pub const LOG_FORMAT_ENV: &str = "LOT_TRACE_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    /// 从环境变量读取，未设置时为文本格式
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| Self::from_str(&v))
            .unwrap_or_default()
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 按指定格式初始化日志
///
/// ```no_run
/// use lot_trace::logging::{self, LogFormat};
/// logging::init_with(LogFormat::from_env());
/// ```
pub fn init_with(format: LogFormat) {
    match format {
        LogFormat::Text => fmt()
            .with_env_filter(env_filter())
            .with_target(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(env_filter())
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}

/// 测试用: debug 级别，写入测试输出，可重复调用
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
