//! Canvas connector configuration
//!
//! Connection and enrollment settings for a Canvas LMS tenant.
//!
//! # Security
//!
//! The base URL is checked against loopback, private and cloud metadata
//! targets (SSRF protection). Tests opt out with
//! [`CanvasConfig::with_allow_localhost`].

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use xavyo_connector::config::{ConnectionSettings, ConnectorConfig, REDACTED};
use xavyo_connector::error::{ConnectorError, ConnectorResult};

/// Path appended to the tenant base URL to reach the REST API.
const API_PREFIX: &str = "/api/v1";

/// Validate that a URL does not target internal services.
fn validate_url_ssrf(url: &url::Url) -> Result<(), String> {
    let scheme = url.scheme();
    if scheme != "https" && scheme != "http" {
        return Err(format!("Unsupported scheme: {scheme}"));
    }

    let host = url.host_str().ok_or_else(|| "URL has no host".to_string())?;
    let bare_host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = bare_host.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(format!("Private/internal IP addresses are not allowed: {ip}"));
        }
    }

    let lower_host = bare_host.to_lowercase();
    let blocked_hosts = [
        "localhost",
        "metadata",
        "metadata.google.internal",
        "169.254.169.254",
    ];

    for blocked in blocked_hosts {
        if lower_host == blocked || lower_host.ends_with(&format!(".{blocked}")) {
            return Err(format!("Blocked internal hostname: {host}"));
        }
    }

    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => is_private_ipv4(ipv4),
        IpAddr::V6(ipv6) => is_private_ipv6(ipv6),
    }
}

fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || {
            // Shared address space (100.64.0.0/10)
            let octets = ip.octets();
            octets[0] == 100 && (64..=127).contains(&octets[1])
        }
}

fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    if let Some(ipv4) = ip.to_ipv4_mapped() {
        return is_private_ipv4(&ipv4);
    }
    let segments = ip.segments();
    // Unique local (fc00::/7) and link-local (fe80::/10)
    (segments[0] & 0xfe00) == 0xfc00 || (segments[0] & 0xffc0) == 0xfe80
}

/// Canvas connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Tenant base URL, e.g. `https://school.instructure.com`.
    pub base_url: String,

    /// API access token, sent as a bearer token.
    pub auth_token: String,

    /// Root account whose users, logins and enrollments are managed.
    pub account_id: u64,

    /// Role id that classifies an enrollment as a student enrollment.
    pub student_role_id: u64,

    /// Role id that classifies an enrollment as a teacher enrollment.
    pub teacher_role_id: u64,

    /// Ask Canvas to notify users about enrollments created by the connector.
    #[serde(default)]
    pub send_enrollment_notification: bool,

    /// Whether course id attributes are returned by default on users.
    #[serde(default = "default_true")]
    pub course_ids_on_users: bool,

    /// Timeouts.
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Allow loopback and private base URLs (testing only).
    #[serde(default)]
    pub allow_localhost: bool,
}

fn default_true() -> bool {
    true
}

impl CanvasConfig {
    /// Create a new configuration.
    pub fn new(
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
        account_id: u64,
        student_role_id: u64,
        teacher_role_id: u64,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: auth_token.into(),
            account_id,
            student_role_id,
            teacher_role_id,
            send_enrollment_notification: false,
            course_ids_on_users: true,
            connection: ConnectionSettings::default(),
            allow_localhost: false,
        }
    }

    /// Enable enrollment notifications.
    pub fn with_enrollment_notification(mut self, notify: bool) -> Self {
        self.send_enrollment_notification = notify;
        self
    }

    /// Set whether user course ids are returned by default.
    pub fn with_course_ids_on_users(mut self, enabled: bool) -> Self {
        self.course_ids_on_users = enabled;
        self
    }

    /// Set connection timeouts.
    pub fn with_connection(mut self, connection: ConnectionSettings) -> Self {
        self.connection = connection;
        self
    }

    /// Allow localhost URLs (for testing only).
    ///
    /// SECURITY: Never enable this in production.
    pub fn with_allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Root of the REST API, without a trailing slash.
    pub fn api_base_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), API_PREFIX)
    }
}

impl ConnectorConfig for CanvasConfig {
    fn validate(&self) -> ConnectorResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "base_url is required".to_string(),
            });
        }

        let url =
            url::Url::parse(&self.base_url).map_err(|e| ConnectorError::InvalidConfiguration {
                message: format!("invalid base_url: {e}"),
            })?;

        if !self.allow_localhost {
            validate_url_ssrf(&url).map_err(|e| ConnectorError::InvalidConfiguration {
                message: format!("SSRF protection: {e}"),
            })?;
        }

        if self.auth_token.trim().is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "auth_token is required".to_string(),
            });
        }

        for (name, value) in [
            ("account_id", self.account_id),
            ("student_role_id", self.student_role_id),
            ("teacher_role_id", self.teacher_role_id),
        ] {
            if value == 0 {
                return Err(ConnectorError::InvalidConfiguration {
                    message: format!("{name} must be a positive id"),
                });
            }
        }

        if self.student_role_id == self.teacher_role_id {
            return Err(ConnectorError::InvalidConfiguration {
                message: "student_role_id and teacher_role_id must differ".to_string(),
            });
        }

        Ok(())
    }

    fn get_credentials(&self) -> Vec<(&'static str, String)> {
        vec![("auth_token", self.auth_token.clone())]
    }

    fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.auth_token = REDACTED.to_string();
        config
    }
}
