// 主机密钥扫描器
// 每个算法一次独立的连接尝试，结果按请求顺序汇总

use std::collections::HashSet;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::models::{HostKeyRecord, ScanResult, ScanTarget};

use super::algorithm::KeyAlgorithm;
use super::config::DEFAULT_CONCURRENCY;
use super::error::{AttemptError, ScanError};
use super::event::{ScanEventKind, ScanReporter};
use super::transport::HostKeyTransport;

/// 主机密钥扫描器
pub struct HostKeyScanner<T> {
    /// 传输层（负责单次尝试）
    transport: T,
    /// 同时进行的尝试数
    concurrency: usize,
    /// 进度事件
    reporter: ScanReporter,
}

impl<T: HostKeyTransport> HostKeyScanner<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            concurrency: DEFAULT_CONCURRENCY,
            reporter: ScanReporter::default(),
        }
    }

    /// 设置并发数，最小为 1（按顺序扫描）
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 设置进度事件发送器
    pub fn with_reporter(mut self, reporter: ScanReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 扫描目标的主机密钥
    ///
    /// 只有配置错误会返回 Err，且在任何连接之前返回；
    /// 单个算法的失败都记录在结果的 warnings 中
    pub async fn scan(
        &self,
        target: &ScanTarget,
        algorithms: &[KeyAlgorithm],
        timeout: Duration,
    ) -> Result<ScanResult, ScanError> {
        validate_algorithms(algorithms)?;
        if timeout.is_zero() {
            return Err(ScanError::Config("timeout must be positive".to_string()));
        }

        let start_time = Instant::now();
        info!(
            "[SCAN] Scanning {}:{} for {} algorithm(s), concurrency {}",
            target.host(),
            target.port(),
            algorithms.len(),
            self.concurrency
        );

        // buffered 保持输入顺序，与完成顺序无关
        let outcomes: Vec<(KeyAlgorithm, Result<String, AttemptError>)> =
            stream::iter(algorithms.iter().cloned())
                .map(|algorithm| async move {
                    let outcome = self.attempt(target, &algorithm, timeout).await;
                    (algorithm, outcome)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut result = ScanResult::new(target.clone());
        for (algorithm, outcome) in outcomes {
            result.record(algorithm, outcome);
        }

        info!(
            "[SCAN] {}:{} done in {:.2}s: {} key(s), {} warning(s)",
            target.host(),
            target.port(),
            start_time.elapsed().as_secs_f64(),
            result.keys().len(),
            result.warnings().len()
        );

        Ok(result)
    }

    /// 单次尝试，失败只记录日志和事件
    async fn attempt(
        &self,
        target: &ScanTarget,
        algorithm: &KeyAlgorithm,
        timeout: Duration,
    ) -> Result<String, AttemptError> {
        debug!("[SCAN] {} attempt started", algorithm);
        self.reporter.emit(algorithm.as_str(), ScanEventKind::Started);

        let outcome = self
            .transport
            .fetch_host_key(target, algorithm, timeout, &self.reporter)
            .await;

        match &outcome {
            Ok(encoded) => {
                let fingerprint = HostKeyRecord::new(algorithm.clone(), encoded.as_str())
                    .fingerprint()
                    .unwrap_or_default();
                info!("[SCAN] {} key received: {}", algorithm, fingerprint);
                self.reporter
                    .emit(algorithm.as_str(), ScanEventKind::KeyReceived { fingerprint });
            }
            Err(e) => {
                warn!("[SCAN] {} failed: {}", algorithm, e);
                self.reporter.emit(
                    algorithm.as_str(),
                    ScanEventKind::Failed {
                        kind: e.kind,
                        reason: e.detail.clone(),
                    },
                );
            }
        }

        outcome
    }
}

/// 算法列表不能为空，也不能重复
fn validate_algorithms(algorithms: &[KeyAlgorithm]) -> Result<(), ScanError> {
    if algorithms.is_empty() {
        return Err(ScanError::Config(
            "algorithm list must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for algorithm in algorithms {
        if !seen.insert(algorithm.as_str()) {
            return Err(ScanError::Config(format!(
                "algorithm '{}' listed more than once",
                algorithm
            )));
        }
    }
    Ok(())
}
