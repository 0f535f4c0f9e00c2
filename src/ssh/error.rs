// 扫描错误类型定义

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// 扫描错误类型（会中止整个调用）
#[derive(Debug, Error)]
pub enum ScanError {
    /// 配置错误，在任何网络活动之前报告
    #[error("Configuration error: {0}")]
    Config(String),

    /// 设置文件错误
    #[error("Settings error: {0}")]
    Settings(String),
}

/// 单个算法尝试的失败类别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// DNS 解析失败、连接被拒绝、TCP 连接超时、代理失败
    Connection,
    /// 对端不支持该算法，或握手在拿到主机密钥之前失败
    Negotiation,
    /// 其它错误（密钥数据异常、库内部错误）
    Unexpected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Negotiation => "negotiation",
            Self::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个算法尝试的错误，只记录为警告，不会中止扫描
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct AttemptError {
    pub kind: FailureKind,
    pub detail: String,
}

impl AttemptError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn connection(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Connection, detail)
    }

    pub fn negotiation(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Negotiation, detail)
    }

    pub fn unexpected(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Unexpected, detail)
    }
}

/// TCP 已建立之后的 russh 错误都算握手失败，密钥解析错误除外
impl From<russh::Error> for AttemptError {
    fn from(e: russh::Error) -> Self {
        match e {
            russh::Error::Keys(e) => AttemptError::from(e),
            other => AttemptError::negotiation(other.to_string()),
        }
    }
}

impl From<russh::keys::Error> for AttemptError {
    fn from(e: russh::keys::Error) -> Self {
        AttemptError::unexpected(format!("key error: {}", e))
    }
}
