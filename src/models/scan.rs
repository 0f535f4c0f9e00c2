// 扫描数据模型
// 目标、主机密钥记录、扫描结果

use russh::keys::HashAlg;
use serde::{Serialize, Serializer};

use crate::ssh::algorithm::KeyAlgorithm;
use crate::ssh::error::{AttemptError, FailureKind, ScanError};

/// 扫描目标
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanTarget {
    host: String,
    port: u16,
}

impl ScanTarget {
    /// 创建扫描目标，主机不能为空，端口范围 1-65535
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ScanError> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(ScanError::Config("host must not be empty".to_string()));
        }
        if port == 0 {
            return Err(ScanError::Config(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// known_hosts 中的主机字段，非 22 端口写成 [host]:port
    pub fn known_hosts_name(&self) -> String {
        if self.port == 22 {
            self.host.clone()
        } else {
            format!("[{}]:{}", self.host, self.port)
        }
    }
}

/// 主机密钥记录
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostKeyRecord {
    pub algorithm: KeyAlgorithm,
    /// base64 编码的公钥（SSH wire 格式）
    pub encoded_key: String,
}

impl HostKeyRecord {
    pub fn new(algorithm: KeyAlgorithm, encoded_key: impl Into<String>) -> Self {
        Self {
            algorithm,
            encoded_key: encoded_key.into(),
        }
    }

    /// 公钥自身的类型名，rsa-sha2-* 对应 ssh-rsa
    pub fn key_type(&self) -> &str {
        self.algorithm.key_type()
    }

    /// SHA256 指纹，密钥无法解析时返回 None
    pub fn fingerprint(&self) -> Option<String> {
        russh::keys::parse_public_key_base64(&self.encoded_key)
            .ok()
            .map(|key| key.fingerprint(HashAlg::Sha256).to_string())
    }

    /// known_hosts 格式的一行
    pub fn known_hosts_line(&self, target: &ScanTarget) -> String {
        format!(
            "{} {} {}",
            target.known_hosts_name(),
            self.key_type(),
            self.encoded_key
        )
    }
}

/// 失败算法的警告
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanWarning {
    pub algorithm: KeyAlgorithm,
    pub kind: FailureKind,
    pub reason: String,
}

impl ScanWarning {
    /// 人类可读的警告消息
    pub fn message(&self) -> String {
        format!("{} failed: {}: {}", self.algorithm, self.kind, self.reason)
    }
}

/// 扫描结果
///
/// 每个请求的算法只会出现在 keys 或 warnings 其中之一，顺序与请求顺序一致
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    #[serde(flatten)]
    target: ScanTarget,
    #[serde(serialize_with = "serialize_keys")]
    keys: Vec<HostKeyRecord>,
    warnings: Vec<ScanWarning>,
}

impl ScanResult {
    /// 扫描只读取目标的公钥，从不修改目标
    pub const CHANGES_TARGET: bool = false;

    pub(crate) fn new(target: ScanTarget) -> Self {
        Self {
            target,
            keys: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// 记录一次尝试的结果
    pub(crate) fn record(&mut self, algorithm: KeyAlgorithm, outcome: Result<String, AttemptError>) {
        match outcome {
            Ok(encoded_key) => self.keys.push(HostKeyRecord::new(algorithm, encoded_key)),
            Err(e) => self.warnings.push(ScanWarning {
                algorithm,
                kind: e.kind,
                reason: e.detail,
            }),
        }
    }

    pub fn target(&self) -> &ScanTarget {
        &self.target
    }

    pub fn keys(&self) -> &[HostKeyRecord] {
        &self.keys
    }

    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    /// 按算法名称查询公钥
    pub fn key(&self, algorithm: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|record| record.algorithm.as_str() == algorithm)
            .map(|record| record.encoded_key.as_str())
    }

    /// 按算法名称查询警告
    pub fn warning(&self, algorithm: &str) -> Option<&ScanWarning> {
        self.warnings
            .iter()
            .find(|warning| warning.algorithm.as_str() == algorithm)
    }

    /// 是否至少有一次尝试越过了 TCP 连接阶段
    ///
    /// 用于区分"目标完全不可达"和"可达但不支持任何请求的算法"
    pub fn reached_target(&self) -> bool {
        !self.keys.is_empty()
            || self
                .warnings
                .iter()
                .any(|warning| warning.kind != FailureKind::Connection)
    }

    /// known_hosts 格式输出
    pub fn known_hosts_lines(&self) -> Vec<String> {
        self.keys
            .iter()
            .map(|record| record.known_hosts_line(&self.target))
            .collect()
    }
}

/// keys 序列化成 {算法: base64}，保持请求顺序
fn serialize_keys<S: Serializer>(keys: &[HostKeyRecord], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
        keys.iter()
            .map(|record| (record.algorithm.as_str(), record.encoded_key.as_str())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ED25519_KEY: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIE0CFvJGs9a24WeGkYH6OO/COtBIc79CHfjFbWtKO8i9";

    fn algorithm(name: &str) -> KeyAlgorithm {
        KeyAlgorithm::parse(name).unwrap()
    }

    #[test]
    fn test_target_validation() {
        assert!(ScanTarget::new("example.com", 22).is_ok());
        assert!(matches!(
            ScanTarget::new("  ", 22),
            Err(ScanError::Config(_))
        ));
        assert!(matches!(
            ScanTarget::new("example.com", 0),
            Err(ScanError::Config(_))
        ));
        assert_eq!(ScanTarget::new(" example.com ", 22).unwrap().host(), "example.com");
    }

    #[test]
    fn test_known_hosts_line() {
        let record = HostKeyRecord::new(algorithm("rsa-sha2-256"), "AAAAB3NzaC1yc2E");
        let default_port = ScanTarget::new("pihole.local", 22).unwrap();
        let custom_port = ScanTarget::new("pihole.local", 2222).unwrap();

        assert_eq!(record.key_type(), "ssh-rsa");
        assert_eq!(
            record.known_hosts_line(&default_port),
            "pihole.local ssh-rsa AAAAB3NzaC1yc2E"
        );
        assert_eq!(
            record.known_hosts_line(&custom_port),
            "[pihole.local]:2222 ssh-rsa AAAAB3NzaC1yc2E"
        );
    }

    #[test]
    fn test_fingerprint() {
        let record = HostKeyRecord::new(algorithm("ssh-ed25519"), ED25519_KEY);
        assert_eq!(
            record.fingerprint().as_deref(),
            Some("SHA256:sPTEvPwo8N2kg/WXtihQOZOxj3Lv6+pcOq8qT4ygYyM")
        );

        let broken = HostKeyRecord::new(algorithm("ssh-ed25519"), "not base64!");
        assert_eq!(broken.fingerprint(), None);
    }

    #[test]
    fn test_record_splits_keys_and_warnings() {
        let mut result = ScanResult::new(ScanTarget::new("testhost", 22).unwrap());
        result.record(algorithm("ssh-ed25519"), Ok(ED25519_KEY.to_string()));
        result.record(
            algorithm("ecdsa-sha2-nistp256"),
            Err(AttemptError::negotiation("No common key algorithm")),
        );

        assert_eq!(result.key("ssh-ed25519"), Some(ED25519_KEY));
        assert_eq!(result.key("ecdsa-sha2-nistp256"), None);
        let warning = result.warning("ecdsa-sha2-nistp256").unwrap();
        assert_eq!(warning.kind, FailureKind::Negotiation);
        assert_eq!(
            warning.message(),
            "ecdsa-sha2-nistp256 failed: negotiation: No common key algorithm"
        );
        assert!(result.reached_target());
    }

    #[test]
    fn test_reached_target_only_connection_failures() {
        let mut result = ScanResult::new(ScanTarget::new("10.255.255.1", 22).unwrap());
        result.record(
            algorithm("ssh-ed25519"),
            Err(AttemptError::connection("connection timed out")),
        );
        assert!(!result.reached_target());
    }

    #[test]
    fn test_serialize_keeps_algorithm_order() {
        let mut result = ScanResult::new(ScanTarget::new("testhost", 2222).unwrap());
        result.record(algorithm("ssh-rsa"), Ok("BBBB".to_string()));
        result.record(algorithm("ssh-ed25519"), Ok("AAAA".to_string()));
        result.record(
            algorithm("rsa-sha2-512"),
            Err(AttemptError::connection("refused")),
        );

        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"host":"testhost","port":2222,"keys":{"ssh-rsa":"BBBB","ssh-ed25519":"AAAA"},"warnings":[{"algorithm":"rsa-sha2-512","kind":"connection","reason":"refused"}]}"#
        );
    }
}
