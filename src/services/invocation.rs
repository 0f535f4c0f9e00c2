// 调用接口
// 校验 {host, port, algorithms?} 输入，执行扫描，生成输出

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{ScanResult, ScanTarget};
use crate::ssh::{HostKeyScanner, HostKeyTransport, KeyAlgorithm, ScanError};

/// 调用输入
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvocationInput {
    /// 目标主机名或 IP
    pub host: String,
    /// SSH 端口
    pub port: u16,
    /// 要尝试的算法，缺省使用设置中的列表
    #[serde(default)]
    pub algorithms: Option<Vec<String>>,
}

impl InvocationInput {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            algorithms: None,
        }
    }

    /// 解析 JSON 输入，缺字段或类型错误都是配置错误
    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        serde_json::from_str(json)
            .map_err(|e| ScanError::Config(format!("Invalid invocation arguments: {}", e)))
    }

    /// 校验输入，得到扫描目标和算法列表
    pub fn resolve(
        &self,
        default_algorithms: &[KeyAlgorithm],
    ) -> Result<(ScanTarget, Vec<KeyAlgorithm>), ScanError> {
        let target = ScanTarget::new(self.host.as_str(), self.port)?;
        let algorithms = match &self.algorithms {
            Some(names) => KeyAlgorithm::parse_list(names.as_slice())?,
            None => default_algorithms.to_vec(),
        };
        Ok((target, algorithms))
    }
}

/// 调用输出
///
/// changed 来自 ScanResult::CHANGES_TARGET，扫描是只读操作
#[derive(Clone, Debug, Serialize)]
pub struct InvocationOutput {
    changed: bool,
    #[serde(flatten)]
    result: ScanResult,
}

impl InvocationOutput {
    pub fn new(result: ScanResult) -> Self {
        Self {
            changed: ScanResult::CHANGES_TARGET,
            result,
        }
    }

    pub fn result(&self) -> &ScanResult {
        &self.result
    }

    pub fn into_result(self) -> ScanResult {
        self.result
    }
}

/// 执行一次调用
///
/// 配置错误在任何网络活动之前返回；算法失败只出现在 warnings 中
pub async fn invoke<T: HostKeyTransport>(
    scanner: &HostKeyScanner<T>,
    input: &InvocationInput,
    default_algorithms: &[KeyAlgorithm],
    timeout: Duration,
) -> Result<InvocationOutput, ScanError> {
    let (target, algorithms) = input.resolve(default_algorithms)?;
    debug!(
        "[SCAN] Invocation for {}:{} with {:?}",
        target.host(),
        target.port(),
        algorithms.iter().map(KeyAlgorithm::as_str).collect::<Vec<_>>()
    );

    let result = scanner.scan(&target, &algorithms, timeout).await?;
    Ok(InvocationOutput::new(result))
}
