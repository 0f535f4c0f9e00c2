// SSH 传输层
// 单次尝试：建立 TCP 连接，强制协商单一主机密钥算法，取得服务器公钥后关闭

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::keys::{PublicKey, PublicKeyBase64};
use russh::Disconnect;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;

use crate::models::ScanTarget;

use super::algorithm::KeyAlgorithm;
use super::config::{russh_config, ProxyConfig};
use super::error::AttemptError;
use super::event::{AttemptStage, ScanReporter};
use super::handler::HostKeyCaptureHandler;
use super::proxy::connect_via_proxy;

/// 主机密钥获取能力
///
/// 每次调用都是一次独立的连接，调用之间不共享套接字或传输会话
#[async_trait]
pub trait HostKeyTransport: Send + Sync {
    /// 获取服务器在给定算法下提供的主机密钥，返回 base64 编码
    async fn fetch_host_key(
        &self,
        target: &ScanTarget,
        algorithm: &KeyAlgorithm,
        timeout: Duration,
        reporter: &ScanReporter,
    ) -> Result<String, AttemptError>;
}

/// 基于 russh 的传输实现
#[derive(Clone, Debug, Default)]
pub struct RusshTransport {
    /// 代理配置
    proxy: Option<ProxyConfig>,
}

impl RusshTransport {
    pub fn new(proxy: Option<ProxyConfig>) -> Self {
        Self { proxy }
    }

    /// 建立 TCP 连接（直连或经代理）
    async fn open_stream(
        &self,
        target: &ScanTarget,
        algorithm: &KeyAlgorithm,
        connect_timeout: Duration,
        reporter: &ScanReporter,
    ) -> Result<TcpStream, AttemptError> {
        if let Some(proxy) = &self.proxy {
            reporter.stage(algorithm.as_str(), AttemptStage::ConnectingProxy);
            debug!(
                "[SCAN] {} connecting to {}:{} via proxy {}:{}",
                algorithm,
                target.host(),
                target.port(),
                proxy.host,
                proxy.port
            );
            return connect_via_proxy(proxy, target.host(), target.port(), connect_timeout).await;
        }

        reporter.stage(algorithm.as_str(), AttemptStage::ConnectingHost);
        debug!(
            "[SCAN] {} connecting to {}:{}",
            algorithm,
            target.host(),
            target.port()
        );

        timeout(
            connect_timeout,
            TcpStream::connect((target.host(), target.port())),
        )
        .await
        .map_err(|_| {
            AttemptError::connection(format!("connection timed out after {:?}", connect_timeout))
        })?
        .map_err(|e| AttemptError::connection(e.to_string()))
    }

    /// 运行握手直到服务器提供主机密钥
    ///
    /// stream 移交给 russh 会话，任何返回路径上都会随会话一起释放
    async fn handshake(
        &self,
        stream: TcpStream,
        algorithm: &KeyAlgorithm,
        handshake_timeout: Duration,
        reporter: &ScanReporter,
    ) -> Result<PublicKey, AttemptError> {
        reporter.stage(algorithm.as_str(), AttemptStage::Handshaking);

        let (key_tx, mut key_rx) = oneshot::channel();
        let handler = HostKeyCaptureHandler::new(algorithm.as_str(), key_tx);
        let config = Arc::new(russh_config(algorithm, handshake_timeout));

        let timed_out = || {
            AttemptError::negotiation(format!(
                "handshake timed out after {:?}",
                handshake_timeout
            ))
        };

        let session = timeout(
            handshake_timeout,
            russh::client::connect_stream(config, stream, handler),
        )
        .await;

        // 会话 future 已结束或被丢弃，套接字随之关闭
        reporter.stage(algorithm.as_str(), AttemptStage::Closing);

        match session {
            // 拒绝公钥后 russh 以错误结束，公钥已在通道中
            Ok(Err(e)) => key_rx.try_recv().map_err(|_| AttemptError::from(e)),
            Err(_) => key_rx.try_recv().map_err(|_| timed_out()),
            // check_server_key 总是返回 false，不会走到这里
            Ok(Ok(handle)) => {
                let _ = handle
                    .disconnect(Disconnect::ByApplication, "", "en")
                    .await;
                key_rx.try_recv().map_err(|_| {
                    AttemptError::negotiation("session ended before the server offered a host key")
                })
            }
        }
    }
}

#[async_trait]
impl HostKeyTransport for RusshTransport {
    async fn fetch_host_key(
        &self,
        target: &ScanTarget,
        algorithm: &KeyAlgorithm,
        timeout: Duration,
        reporter: &ScanReporter,
    ) -> Result<String, AttemptError> {
        let stream = self.open_stream(target, algorithm, timeout, reporter).await?;
        let key = self.handshake(stream, algorithm, timeout, reporter).await?;
        encode_host_key(&key, algorithm)
    }
}

/// 编码主机密钥，并确认公钥类型与强制协商的算法一致
pub fn encode_host_key(key: &PublicKey, algorithm: &KeyAlgorithm) -> Result<String, AttemptError> {
    let offered = key.algorithm();
    if offered.as_str() != algorithm.key_type() {
        return Err(AttemptError::unexpected(format!(
            "server offered a {} key while negotiating {}",
            offered.as_str(),
            algorithm
        )));
    }
    Ok(key.public_key_base64())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::error::FailureKind;
    use crate::ssh::event::ScanEventKind;

    const ED25519_KEY: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIE0CFvJGs9a24WeGkYH6OO/COtBIc79CHfjFbWtKO8i9";

    #[test]
    fn test_encode_host_key_roundtrips_wire_blob() {
        let key = russh::keys::parse_public_key_base64(ED25519_KEY).unwrap();
        let algorithm = KeyAlgorithm::parse("ssh-ed25519").unwrap();
        assert_eq!(encode_host_key(&key, &algorithm).unwrap(), ED25519_KEY);
    }

    #[test]
    fn test_encode_host_key_rejects_mismatched_type() {
        let key = russh::keys::parse_public_key_base64(ED25519_KEY).unwrap();
        let algorithm = KeyAlgorithm::parse("rsa-sha2-256").unwrap();
        let err = encode_host_key(&key, &algorithm).unwrap_err();
        assert_eq!(err.kind, FailureKind::Unexpected);
    }

    #[tokio::test]
    async fn test_refused_port_is_connection_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = ScanTarget::new("127.0.0.1", port).unwrap();
        let algorithm = KeyAlgorithm::parse("ssh-ed25519").unwrap();
        let err = RusshTransport::default()
            .fetch_host_key(
                &target,
                &algorithm,
                Duration::from_secs(2),
                &ScanReporter::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Connection);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out_in_handshake() {
        // 只接受连接、不发送 SSH 版本串
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let target = ScanTarget::new("127.0.0.1", port).unwrap();
        let algorithm = KeyAlgorithm::parse("ssh-ed25519").unwrap();
        let (reporter, mut events) = ScanReporter::channel();
        let err = RusshTransport::default()
            .fetch_host_key(&target, &algorithm, Duration::from_millis(300), &reporter)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Negotiation);

        let mut stages = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ScanEventKind::Stage(stage) = event.kind {
                stages.push(stage);
            }
        }
        assert_eq!(
            stages,
            vec![
                AttemptStage::ConnectingHost,
                AttemptStage::Handshaking,
                AttemptStage::Closing
            ]
        );

        server.abort();
    }
}
