// 扫描进度事件定义

use chrono::{DateTime, Local};
use tokio::sync::mpsc;

use super::error::FailureKind;

/// 单次尝试所处的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttemptStage {
    /// 连接代理（如果配置了代理）
    ConnectingProxy = 0,
    /// TCP 连接目标主机
    ConnectingHost = 1,
    /// SSH 握手（密钥交换）
    Handshaking = 2,
    /// 关闭传输层和套接字
    Closing = 3,
}

impl AttemptStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConnectingProxy => "Connecting to proxy",
            Self::ConnectingHost => "Connecting to host",
            Self::Handshaking => "SSH handshake",
            Self::Closing => "Closing",
        }
    }
}

/// 事件内容
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanEventKind {
    /// 尝试开始
    Started,
    /// 阶段变化
    Stage(AttemptStage),
    /// 拿到主机密钥
    KeyReceived { fingerprint: String },
    /// 尝试失败
    Failed { kind: FailureKind, reason: String },
}

/// 扫描事件（用于实时显示进度）
#[derive(Clone, Debug)]
pub struct ScanEvent {
    /// 时间戳
    pub timestamp: DateTime<Local>,
    /// 所属算法
    pub algorithm: String,
    pub kind: ScanEventKind,
}

impl ScanEvent {
    pub fn new(algorithm: impl Into<String>, kind: ScanEventKind) -> Self {
        Self {
            timestamp: Local::now(),
            algorithm: algorithm.into(),
            kind,
        }
    }
}

/// 事件发送器
///
/// 未设置接收端时所有事件直接丢弃
#[derive(Clone, Debug, Default)]
pub struct ScanReporter {
    sender: Option<mpsc::UnboundedSender<ScanEvent>>,
}

impl ScanReporter {
    pub fn new(sender: mpsc::UnboundedSender<ScanEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// 创建事件通道
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, algorithm: &str, kind: ScanEventKind) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(ScanEvent::new(algorithm, kind));
        }
    }

    /// 发送阶段变化事件
    pub fn stage(&self, algorithm: &str, stage: AttemptStage) {
        self.emit(algorithm, ScanEventKind::Stage(stage));
    }
}
