// ==========================================
// 生产批次追踪系统 - 告警事件分发
// ==========================================
// 职责: 定义告警订阅 trait，实现依赖倒置
// 说明: Engine 层定义 trait，推送/通知协作方实现适配器
// 约束: 提交后分发；订阅方之间相互隔离，失败只记录日志，不影响流转
// ==========================================

use crate::domain::alert::AlertEvent;
use std::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

// ==========================================
// 告警订阅 Trait
// ==========================================

/// 告警订阅方
///
/// # 实现说明
/// - notify 应快速返回（fire-and-forget），投递细节由实现方负责
/// - 返回 Err 或 panic 都只会被记录，不会传播给流转调用方
pub trait AlertSubscriber: Send + Sync {
    /// 订阅方名称（日志用）
    fn name(&self) -> &str;

    fn notify(&self, event: &AlertEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作订阅方
///
/// 用于不需要通知的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpAlertSubscriber;

impl AlertSubscriber for NoOpAlertSubscriber {
    fn name(&self) -> &str {
        "noop"
    }

    fn notify(&self, event: &AlertEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpAlertSubscriber: 跳过告警通知 - rule_id={}, event_id={}",
            event.rule_id,
            event.event_id
        );
        Ok(())
    }
}

/// 通道订阅方
///
/// 通过 tokio 无界通道转发事件，由异步任务消费
pub struct ChannelAlertSubscriber {
    sender: UnboundedSender<AlertEvent>,
}

impl ChannelAlertSubscriber {
    /// 创建订阅方及对应的接收端
    pub fn channel() -> (Self, UnboundedReceiver<AlertEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl AlertSubscriber for ChannelAlertSubscriber {
    fn name(&self) -> &str {
        "channel"
    }

    fn notify(&self, event: &AlertEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sender
            .send(event.clone())
            .map_err(|e| format!("告警通道已关闭: {}", e).into())
    }
}

// ==========================================
// AlertDispatcher - 告警分发器
// ==========================================

/// 分发结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct AlertDispatcher {
    subscribers: Vec<Arc<dyn AlertSubscriber>>,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn AlertSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// 向所有订阅方分发事件
    pub fn dispatch(&self, events: &[AlertEvent]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for event in events {
            for subscriber in &self.subscribers {
                let result = catch_unwind(AssertUnwindSafe(|| subscriber.notify(event)));
                match result {
                    Ok(Ok(())) => report.delivered += 1,
                    Ok(Err(e)) => {
                        report.failed += 1;
                        tracing::warn!(
                            subscriber = subscriber.name(),
                            event_id = %event.event_id,
                            rule_id = event.rule_id,
                            error = %e,
                            "告警通知失败"
                        );
                    }
                    Err(_) => {
                        report.failed += 1;
                        tracing::warn!(
                            subscriber = subscriber.name(),
                            event_id = %event.event_id,
                            rule_id = event.rule_id,
                            "告警订阅方 panic"
                        );
                    }
                }
            }
        }

        report
    }
}
