// 扫描配置

use std::borrow::Cow;
use std::time::Duration;

use russh::Preferred;

use super::algorithm::KeyAlgorithm;
use super::error::ScanError;

/// 单次连接尝试的默认超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
/// 默认并发尝试数
pub const DEFAULT_CONCURRENCY: usize = 4;

/// 扫描配置
#[derive(Clone, Debug)]
pub struct ScanConfig {
    /// 每次连接尝试的超时（TCP 连接和握手各自受此限制）
    pub timeout: Duration,
    /// 同时进行的尝试数，1 即按顺序逐个扫描
    pub concurrency: usize,
    /// 代理配置
    pub proxy: Option<ProxyConfig>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            proxy: None,
        }
    }
}

/// 构建 russh 配置，主机密钥协商只允许给定的一个算法
pub fn russh_config(algorithm: &KeyAlgorithm, timeout: Duration) -> russh::client::Config {
    let mut config = russh::client::Config::default();
    config.inactivity_timeout = Some(timeout);
    config.preferred = Preferred {
        key: Cow::Owned(vec![algorithm.to_russh()]),
        ..Preferred::default()
    };
    config
}

/// 代理类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ProxyType {
    #[default]
    Http,
    Socks5,
}

/// 代理配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    /// 代理类型
    pub proxy_type: ProxyType,
    /// 代理主机
    pub host: String,
    /// 代理端口
    pub port: u16,
    /// 认证信息（用户名, 密码）
    pub auth: Option<(String, String)>,
}

impl ProxyConfig {
    /// 解析代理 URL
    ///
    /// 格式: `socks5://[user:pass@]host:port` 或 `http://[user:pass@]host:port`
    pub fn from_url(url: &str) -> Result<Self, ScanError> {
        let invalid = |reason: &str| ScanError::Config(format!("Invalid proxy '{}': {}", url, reason));

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        let proxy_type = match scheme.to_ascii_lowercase().as_str() {
            "socks5" | "socks5h" => ProxyType::Socks5,
            "http" => ProxyType::Http,
            _ => return Err(invalid("scheme must be socks5 or http")),
        };

        let rest = rest.trim_end_matches('/');
        let (auth, address) = match rest.rsplit_once('@') {
            Some((credentials, address)) => {
                let (user, pass) = credentials
                    .split_once(':')
                    .ok_or_else(|| invalid("credentials must be user:password"))?;
                (Some((user.to_string(), pass.to_string())), address)
            }
            None => (None, rest),
        };

        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| invalid("port must be 1-65535"))?;

        Ok(Self {
            proxy_type,
            host: host.to_string(),
            port,
            auth,
        })
    }
}
