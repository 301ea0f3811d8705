//! # Configuration
//!
//! Per-endpoint connection settings and URL helpers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithms::RetryPolicy;

/// Per-call timeout used when an endpoint sets none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Bound on one endorsement fan-out, retries included, unless overridden.
pub const DEFAULT_FAN_OUT_DEADLINE: Duration = Duration::from_secs(180);
/// Keepalive timeout used when an endpoint sets none.
pub const DEFAULT_KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP/2 keepalive settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// Ping interval, `None` disables pings
    pub interval: Option<Duration>,
    /// Time to wait for a ping acknowledgement
    pub timeout: Duration,
    /// Ping even when no call is in flight
    pub permit_without_stream: bool,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval: None,
            timeout: DEFAULT_KEEPALIVE_TIMEOUT,
            permit_without_stream: false,
        }
    }
}

/// Which retry policy an endpoint uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum RetryProfile {
    /// [`RetryPolicy::default`]
    #[default]
    Default,
    /// [`RetryPolicy::channel_client`]
    ChannelClient,
    /// [`RetryPolicy::resource_management`]
    ResourceManagement,
    /// [`RetryPolicy::no_retry`]
    None,
    /// Caller supplied policy
    Custom(RetryPolicy),
}

impl RetryProfile {
    /// Resolve the profile to a concrete policy.
    pub fn policy(&self) -> RetryPolicy {
        match self {
            RetryProfile::Default => RetryPolicy::default(),
            RetryProfile::ChannelClient => RetryPolicy::channel_client(),
            RetryProfile::ResourceManagement => RetryPolicy::resource_management(),
            RetryProfile::None => RetryPolicy::no_retry(),
            RetryProfile::Custom(policy) => policy.clone(),
        }
    }
}

/// Connection settings for one peer or orderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Endpoint URL, with or without a `grpc://` / `grpcs://` scheme
    pub url: String,
    /// TLS server name override, defaults to the URL host
    pub server_name: Option<String>,
    /// Organization the endpoint belongs to
    pub msp_id: String,
    /// PEM root certificates trusted for TLS
    pub tls_ca_certs_pem: Vec<String>,
    /// PEM client certificate for mutual TLS
    pub tls_client_cert_pem: Option<String>,
    /// PEM private key matching `tls_client_cert_pem`
    pub tls_client_key_pem: Option<String>,
    /// HTTP/2 keepalive
    pub keepalive: KeepaliveConfig,
    /// Dial at construction and fail immediately when unreachable
    pub fail_fast: bool,
    /// Use plaintext when the URL carries no scheme
    pub allow_insecure: bool,
    /// Per-call timeout
    pub timeout: Duration,
    /// Retry policy for calls to this endpoint
    pub retry: RetryProfile,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "localhost:7051".to_string(),
            server_name: None,
            msp_id: String::new(),
            tls_ca_certs_pem: Vec::new(),
            tls_client_cert_pem: None,
            tls_client_key_pem: None,
            keepalive: KeepaliveConfig::default(),
            fail_fast: false,
            allow_insecure: false,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryProfile::Default,
        }
    }
}

impl EndpointConfig {
    /// Endpoint at `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create config for testing: plaintext, short timeout, no retries.
    pub fn for_testing(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            allow_insecure: true,
            timeout: Duration::from_secs(5),
            retry: RetryProfile::None,
            ..Self::default()
        }
    }

    /// `host:port` with any scheme removed.
    pub fn address(&self) -> &str {
        to_address(&self.url)
    }

    /// Whether calls to this endpoint use TLS.
    pub fn is_secured(&self) -> bool {
        attempt_secured(&self.url, self.allow_insecure)
    }

    /// Name presented in SNI and checked against the server certificate.
    pub fn tls_server_name(&self) -> String {
        match &self.server_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => host_of(self.address()).to_string(),
        }
    }

    /// PEM of the client certificate, when one is configured.
    pub fn client_cert_pem(&self) -> Option<&str> {
        self.tls_client_cert_pem.as_deref().filter(|pem| !pem.is_empty())
    }

    /// Timeout, falling back to [`DEFAULT_TIMEOUT`] when zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }

    /// Retry policy resolved from the profile.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }
}

/// Strip a `grpc://` or `grpcs://` prefix.
pub fn to_address(url: &str) -> &str {
    url.strip_prefix("grpcs://")
        .or_else(|| url.strip_prefix("grpc://"))
        .unwrap_or(url)
}

/// Whether `url` should be dialed with TLS.
///
/// A scheme ending in `s://` (any case) means TLS, any other scheme means
/// plaintext, and a bare address means TLS unless `allow_insecure` is set.
pub fn attempt_secured(url: &str, allow_insecure: bool) -> bool {
    let lower = url.to_ascii_lowercase();
    if lower.contains("s://") {
        true
    } else if lower.contains("://") {
        false
    } else {
        !allow_insecure
    }
}

fn host_of(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    address.rsplit_once(':').map(|(host, _)| host).unwrap_or(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EndpointConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.keepalive.timeout, Duration::from_secs(120));
        assert_eq!(config.retry, RetryProfile::Default);
        assert!(!config.fail_fast);
    }

    #[test]
    fn test_for_testing_config() {
        let config = EndpointConfig::for_testing("peer0:7051");
        assert!(config.allow_insecure);
        assert_eq!(config.retry_policy().attempts, 1);
    }

    #[test]
    fn test_to_address() {
        assert_eq!(to_address("grpcs://peer0.org1:7051"), "peer0.org1:7051");
        assert_eq!(to_address("grpc://peer0.org1:7051"), "peer0.org1:7051");
        assert_eq!(to_address("peer0.org1:7051"), "peer0.org1:7051");
    }

    #[test]
    fn test_attempt_secured() {
        assert!(attempt_secured("grpcs://peer:7051", true));
        assert!(attempt_secured("GRPCS://peer:7051", true));
        assert!(!attempt_secured("grpc://peer:7051", false));
        assert!(attempt_secured("peer:7051", false));
        assert!(!attempt_secured("peer:7051", true));
    }

    #[test]
    fn test_tls_server_name() {
        let mut config = EndpointConfig::new("grpcs://peer0.org1.example.com:7051");
        assert_eq!(config.tls_server_name(), "peer0.org1.example.com");

        config.server_name = Some("override.example.com".into());
        assert_eq!(config.tls_server_name(), "override.example.com");

        config.server_name = None;
        config.url = "[::1]:7051".into();
        assert_eq!(config.tls_server_name(), "::1");
    }

    #[test]
    fn test_zero_timeout_uses_default() {
        let config = EndpointConfig {
            timeout: Duration::ZERO,
            ..EndpointConfig::default()
        };
        assert_eq!(config.effective_timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_retry_profiles_resolve() {
        assert_eq!(RetryProfile::ResourceManagement.policy().attempts, 5);
        assert_eq!(RetryProfile::ChannelClient.policy().attempts, 3);
        let custom = RetryPolicy {
            attempts: 9,
            ..RetryPolicy::default()
        };
        assert_eq!(RetryProfile::Custom(custom).policy().attempts, 9);
    }
}
