// 主机密钥算法定义
// 算法列表是扫描策略（配置数据），不在扫描逻辑中写死

use std::fmt;

use russh::keys::Algorithm;
use serde::{Deserialize, Serialize};

use super::error::ScanError;

/// 支持强制协商的主机密钥算法
pub const SUPPORTED_ALGORITHMS: &[&str] = &[
    "ssh-ed25519",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
    "rsa-sha2-256",
    "rsa-sha2-512",
    "ssh-rsa",
];

/// 默认扫描顺序
pub const DEFAULT_ALGORITHMS: &[&str] = &[
    "ssh-ed25519",
    "ecdsa-sha2-nistp256",
    "rsa-sha2-256",
    "rsa-sha2-512",
];

/// SSH 公钥算法
///
/// 保存用户给出的名称以及对应的 russh 算法，名称即结果中的 key
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyAlgorithm {
    name: String,
    algorithm: Algorithm,
}

impl KeyAlgorithm {
    /// 解析算法名称
    pub fn parse(name: &str) -> Result<Self, ScanError> {
        let name = name.trim();
        if !SUPPORTED_ALGORITHMS.contains(&name) {
            return Err(ScanError::Config(format!(
                "Unsupported key algorithm '{}' (supported: {})",
                name,
                SUPPORTED_ALGORITHMS.join(", ")
            )));
        }

        let algorithm = Algorithm::new(name)
            .map_err(|e| ScanError::Config(format!("Invalid key algorithm '{}': {}", name, e)))?;

        Ok(Self {
            name: name.to_string(),
            algorithm,
        })
    }

    /// 解析算法列表，保持顺序
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>, ScanError> {
        names.iter().map(|name| Self::parse(name.as_ref())).collect()
    }

    /// 默认算法列表
    pub fn defaults() -> Vec<Self> {
        DEFAULT_ALGORITHMS
            .iter()
            .filter_map(|name| Self::parse(name).ok())
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// 用于 russh 协商的算法
    pub fn to_russh(&self) -> Algorithm {
        self.algorithm.clone()
    }

    /// 服务器返回的公钥本身的类型
    ///
    /// rsa-sha2-* 只是签名算法，公钥类型仍是 ssh-rsa
    pub fn key_type(&self) -> &str {
        match &self.algorithm {
            Algorithm::Rsa { .. } => "ssh-rsa",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl TryFrom<String> for KeyAlgorithm {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<KeyAlgorithm> for String {
    fn from(value: KeyAlgorithm) -> Self {
        value.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::keys::{EcdsaCurve, HashAlg};

    #[test]
    fn test_parse_known_algorithms() {
        let ed = KeyAlgorithm::parse("ssh-ed25519").unwrap();
        assert_eq!(ed.as_str(), "ssh-ed25519");
        assert_eq!(ed.to_russh(), Algorithm::Ed25519);

        let ecdsa = KeyAlgorithm::parse("ecdsa-sha2-nistp256").unwrap();
        assert_eq!(
            ecdsa.to_russh(),
            Algorithm::Ecdsa {
                curve: EcdsaCurve::NistP256
            }
        );

        let rsa = KeyAlgorithm::parse(" rsa-sha2-512 ").unwrap();
        assert_eq!(rsa.as_str(), "rsa-sha2-512");
        assert_eq!(
            rsa.to_russh(),
            Algorithm::Rsa {
                hash: Some(HashAlg::Sha512)
            }
        );
    }

    #[test]
    fn test_rsa_variants_share_key_type() {
        for name in ["ssh-rsa", "rsa-sha2-256", "rsa-sha2-512"] {
            assert_eq!(KeyAlgorithm::parse(name).unwrap().key_type(), "ssh-rsa");
        }
        assert_eq!(
            KeyAlgorithm::parse("ssh-ed25519").unwrap().key_type(),
            "ssh-ed25519"
        );
    }

    #[test]
    fn test_unknown_algorithm_is_config_error() {
        let err = KeyAlgorithm::parse("ssh-dss").unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
        assert!(KeyAlgorithm::parse("").is_err());
    }

    #[test]
    fn test_defaults_keep_order() {
        let names: Vec<String> = KeyAlgorithm::defaults()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, DEFAULT_ALGORITHMS);
    }

    #[test]
    fn test_serde_uses_plain_names() {
        let list: Vec<KeyAlgorithm> =
            serde_json::from_str(r#"["ssh-rsa","ssh-ed25519"]"#).unwrap();
        assert_eq!(list[0].as_str(), "ssh-rsa");
        assert_eq!(
            serde_json::to_string(&list).unwrap(),
            r#"["ssh-rsa","ssh-ed25519"]"#
        );
        assert!(serde_json::from_str::<Vec<KeyAlgorithm>>(r#"["nope"]"#).is_err());
    }
}
