// ssh-keyscan - SSH 主机密钥扫描
// 对每个算法单独握手，收集服务器提供的主机公钥

pub mod models;
pub mod services;
pub mod ssh;

pub use models::{HostKeyRecord, ScanResult, ScanTarget, ScanWarning};
pub use ssh::{HostKeyScanner, KeyAlgorithm, RusshTransport, ScanError};
