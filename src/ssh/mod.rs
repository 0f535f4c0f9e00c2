// SSH 主机密钥扫描模块
//
// 模块结构:
// - algorithm: 主机密钥算法 (KeyAlgorithm)
// - config: 扫描配置 (ScanConfig, ProxyConfig) 和 russh 配置构建
// - error: 错误类型 (ScanError, AttemptError, FailureKind)
// - event: 进度事件 (ScanEvent, AttemptStage, ScanReporter)
// - handler: russh Handler 实现，捕获服务器公钥
// - proxy: 代理连接
// - transport: 单次尝试的传输层 (HostKeyTransport, RusshTransport)
// - scanner: 扫描器 (HostKeyScanner)

pub mod algorithm;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod proxy;
pub mod scanner;
pub mod transport;

// 公开导出
pub use algorithm::{KeyAlgorithm, DEFAULT_ALGORITHMS, SUPPORTED_ALGORITHMS};
pub use config::{ProxyConfig, ProxyType, ScanConfig, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS};
pub use error::{AttemptError, FailureKind, ScanError};
pub use event::{AttemptStage, ScanEvent, ScanEventKind, ScanReporter};
pub use scanner::HostKeyScanner;
pub use transport::{HostKeyTransport, RusshTransport};
