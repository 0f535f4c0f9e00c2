// 主机密钥捕获 Handler
// 实现 russh::client::Handler trait

use std::future::Future;

use russh::keys::PublicKey;
use tokio::sync::oneshot;
use tracing::debug;

/// 主机密钥捕获 Handler
///
/// 在 check_server_key 回调中取得服务器公钥并拒绝继续连接，
/// 扫描从不进入认证阶段
pub struct HostKeyCaptureHandler {
    /// 当前尝试的算法（用于日志）
    algorithm: String,
    /// 公钥发送端，只发送一次
    key_sender: Option<oneshot::Sender<PublicKey>>,
}

impl HostKeyCaptureHandler {
    pub fn new(algorithm: impl Into<String>, key_sender: oneshot::Sender<PublicKey>) -> Self {
        Self {
            algorithm: algorithm.into(),
            key_sender: Some(key_sender),
        }
    }
}

impl russh::client::Handler for HostKeyCaptureHandler {
    type Error = russh::Error;

    /// 记录服务器公钥后返回 false，russh 随即中止握手
    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        debug!(
            "[SCAN] {} offered {} key {}",
            self.algorithm,
            server_public_key.algorithm(),
            server_public_key.fingerprint(russh::keys::HashAlg::Sha256)
        );

        if let Some(sender) = self.key_sender.take() {
            let _ = sender.send(server_public_key.clone());
        }

        async { Ok(false) }
    }
}
