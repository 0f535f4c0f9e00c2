// Settings 配置数据结构

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ssh::algorithm::KeyAlgorithm;
use crate::ssh::config::{ProxyConfig, ScanConfig, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS};
use crate::ssh::error::ScanError;

/// 扫描设置（持久化用）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSettings {
    /// 默认扫描的算法，按顺序尝试
    pub algorithms: Vec<KeyAlgorithm>,
    /// 单次连接尝试超时（秒）
    pub timeout_secs: u64,
    /// 同时进行的尝试数
    pub concurrency: usize,
    /// 代理 URL，例如 socks5://127.0.0.1:1080
    pub proxy: Option<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            algorithms: KeyAlgorithm::defaults(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            proxy: None,
        }
    }
}

impl ScanSettings {
    /// 转换为运行时扫描配置
    pub fn to_scan_config(&self) -> Result<ScanConfig, ScanError> {
        if self.timeout_secs == 0 {
            return Err(ScanError::Settings(
                "timeout_secs must be positive".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ScanError::Settings(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let proxy = self
            .proxy
            .as_deref()
            .map(ProxyConfig::from_url)
            .transpose()?;

        Ok(ScanConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            concurrency: self.concurrency,
            proxy,
        })
    }
}
