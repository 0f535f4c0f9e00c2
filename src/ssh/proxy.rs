// 代理隧道
// 经 SOCKS5 或 HTTP CONNECT 到达目标，代理一侧的失败都记为连接错误

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::config::{ProxyConfig, ProxyType};
use super::error::AttemptError;

impl ProxyType {
    fn label(&self) -> &'static str {
        match self {
            ProxyType::Http => "HTTP",
            ProxyType::Socks5 => "SOCKS5",
        }
    }
}

/// 通过代理建立到目标的隧道
///
/// connect_timeout 覆盖代理地址解析、连接代理和隧道协商全过程
pub async fn connect_via_proxy(
    proxy: &ProxyConfig,
    target_host: &str,
    target_port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, AttemptError> {
    let tunnel = async {
        let proxy_addr = resolve_proxy(proxy).await?;
        debug!(
            "[SCAN] {} proxy {} resolved, tunnelling to {}:{}",
            proxy.proxy_type.label(),
            proxy_addr,
            target_host,
            target_port
        );
        match proxy.proxy_type {
            ProxyType::Socks5 => socks5_tunnel(proxy_addr, proxy, target_host, target_port).await,
            ProxyType::Http => http_tunnel(proxy_addr, proxy, target_host, target_port).await,
        }
    };

    timeout(connect_timeout, tunnel).await.map_err(|_| {
        AttemptError::connection(format!(
            "{} proxy {}:{} timed out after {:?}",
            proxy.proxy_type.label(),
            proxy.host,
            proxy.port,
            connect_timeout
        ))
    })?
}

async fn resolve_proxy(proxy: &ProxyConfig) -> Result<SocketAddr, AttemptError> {
    let unresolved = |reason: String| {
        AttemptError::connection(format!(
            "cannot resolve proxy {}:{}: {}",
            proxy.host, proxy.port, reason
        ))
    };

    tokio::net::lookup_host((proxy.host.as_str(), proxy.port))
        .await
        .map_err(|e| unresolved(e.to_string()))?
        .next()
        .ok_or_else(|| unresolved("no address".to_string()))
}

async fn socks5_tunnel(
    proxy_addr: SocketAddr,
    proxy: &ProxyConfig,
    target_host: &str,
    target_port: u16,
) -> Result<TcpStream, AttemptError> {
    use tokio_socks::tcp::Socks5Stream;

    let target = (target_host, target_port);
    let stream = match &proxy.auth {
        Some((username, password)) => {
            Socks5Stream::connect_with_password(proxy_addr, target, username, password).await
        }
        None => Socks5Stream::connect(proxy_addr, target).await,
    };

    stream.map(Socks5Stream::into_inner).map_err(|e| {
        AttemptError::connection(format!("SOCKS5 proxy {}: {}", proxy_addr, e))
    })
}

async fn http_tunnel(
    proxy_addr: SocketAddr,
    proxy: &ProxyConfig,
    target_host: &str,
    target_port: u16,
) -> Result<TcpStream, AttemptError> {
    use async_http_proxy::{http_connect_tokio, http_connect_tokio_with_basic_auth};

    let mut stream = TcpStream::connect(proxy_addr)
        .await
        .map_err(|e| AttemptError::connection(format!("HTTP proxy {}: {}", proxy_addr, e)))?;

    let established = match &proxy.auth {
        Some((username, password)) => {
            http_connect_tokio_with_basic_auth(
                &mut stream,
                target_host,
                target_port,
                username,
                password,
            )
            .await
        }
        None => http_connect_tokio(&mut stream, target_host, target_port).await,
    };

    established.map_err(|e| {
        AttemptError::connection(format!(
            "HTTP proxy {} refused CONNECT {}:{}: {}",
            proxy_addr, target_host, target_port, e
        ))
    })?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::error::FailureKind;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn proxy(url: &str) -> ProxyConfig {
        ProxyConfig::from_url(url).unwrap()
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_connection_failure() {
        let port = closed_port().await;
        for url in [
            format!("socks5://127.0.0.1:{}", port),
            format!("http://127.0.0.1:{}", port),
        ] {
            let err = connect_via_proxy(&proxy(&url), "example.com", 22, Duration::from_secs(2))
                .await
                .unwrap_err();
            assert_eq!(err.kind, FailureKind::Connection, "{}", url);
        }
    }

    #[tokio::test]
    async fn test_silent_proxy_is_bounded_by_timeout() {
        // 接受连接但从不应答
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let started = Instant::now();
        let err = connect_via_proxy(
            &proxy(&format!("http://127.0.0.1:{}", port)),
            "example.com",
            22,
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, FailureKind::Connection);
        assert!(err.detail.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(2));
        server.abort();
    }

    #[tokio::test]
    async fn test_http_proxy_rejection_is_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await
                .unwrap();
        });

        let err = connect_via_proxy(
            &proxy(&format!("http://127.0.0.1:{}", port)),
            "example.com",
            22,
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, FailureKind::Connection);
        let _ = server.await;
    }
}
