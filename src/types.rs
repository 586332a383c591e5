use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Timeout applied when a target carries no positive `timeout_ms`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Protocol selector for a target.
///
/// Parsing is case-insensitive and trims whitespace. Anything that is not
/// `http`, `tcp` or `dns` is kept verbatim in [`CheckKind::Unknown`] so the
/// probe can report it back instead of failing deserialization. A missing
/// `type` is `Unknown("")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CheckKind {
    Http,
    Tcp,
    Dns,
    Unknown(String),
}

impl CheckKind {
    pub fn as_str(&self) -> &str {
        match self {
            CheckKind::Http => "http",
            CheckKind::Tcp => "tcp",
            CheckKind::Dns => "dns",
            CheckKind::Unknown(raw) => raw,
        }
    }
}

impl Default for CheckKind {
    fn default() -> Self {
        CheckKind::Unknown(String::new())
    }
}

impl From<String> for CheckKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "http" => CheckKind::Http,
            "tcp" => CheckKind::Tcp,
            "dns" => CheckKind::Dns,
            _ => CheckKind::Unknown(raw),
        }
    }
}

impl From<&str> for CheckKind {
    fn from(raw: &str) -> Self {
        CheckKind::from(raw.to_string())
    }
}

impl From<CheckKind> for String {
    fn from(kind: CheckKind) -> Self {
        match kind {
            CheckKind::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a target could not be turned into an [`Endpoint`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("unknown check type: {0:?}")]
    UnknownKind(String),
    #[error("{kind} target is missing `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("invalid port {0}: must be 1-65535")]
    InvalidPort(i64),
}

/// Typed address of a target, resolved from the wire fields by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Url(String),
    HostPort { host: String, port: u16 },
    Host(String),
}

impl Endpoint {
    /// Display string used for `CheckResult::target`.
    pub fn display(&self) -> String {
        match self {
            Endpoint::Url(url) => url.clone(),
            Endpoint::HostPort { host, port } => host_port(host, *port),
            Endpoint::Host(host) => host.clone(),
        }
    }
}

/// `host:port`, bracketing IPv6 literals.
pub fn host_port(host: &str, port: impl fmt::Display) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// One endpoint to check, in the shape of the JSON target file.
///
/// Only `name` is required for the record to load. Bad or missing endpoint
/// fields surface per target through [`Target::endpoint`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: CheckKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<i64>,
}

impl Target {
    fn new(name: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            name: name.into(),
            kind,
            url: None,
            host: None,
            port: None,
            timeout_ms: None,
        }
    }

    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(name, CheckKind::Http)
        }
    }

    pub fn tcp(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(i64::from(port)),
            ..Self::new(name, CheckKind::Tcp)
        }
    }

    pub fn dns(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::new(name, CheckKind::Dns)
        }
    }

    /// A target whose `type` is taken verbatim, recognised or not.
    pub fn with_kind(name: impl Into<String>, kind: impl Into<CheckKind>) -> Self {
        Self::new(name, kind.into())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX));
        self
    }

    /// The per-probe timeout: `timeout_ms` when positive, else [`DEFAULT_TIMEOUT`].
    pub fn effective_timeout(&self) -> Duration {
        match self.timeout_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms as u64),
            _ => DEFAULT_TIMEOUT,
        }
    }

    /// Resolve the wire fields into the endpoint the kind calls for.
    pub fn endpoint(&self) -> Result<Endpoint, TargetError> {
        match &self.kind {
            CheckKind::Http => non_empty(&self.url)
                .map(|u| Endpoint::Url(u.to_string()))
                .ok_or(TargetError::MissingField { kind: "http", field: "url" }),
            CheckKind::Tcp => {
                let host = non_empty(&self.host)
                    .ok_or(TargetError::MissingField { kind: "tcp", field: "host" })?;
                let raw = self
                    .port
                    .ok_or(TargetError::MissingField { kind: "tcp", field: "port" })?;
                let port = u16::try_from(raw)
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or(TargetError::InvalidPort(raw))?;
                Ok(Endpoint::HostPort {
                    host: host.to_string(),
                    port,
                })
            }
            CheckKind::Dns => non_empty(&self.host)
                .map(|h| Endpoint::Host(h.to_string()))
                .ok_or(TargetError::MissingField { kind: "dns", field: "host" }),
            CheckKind::Unknown(raw) => Err(TargetError::UnknownKind(raw.clone())),
        }
    }

    /// Best-effort display string when no endpoint could be resolved.
    pub fn raw_display(&self) -> String {
        match (&self.url, &self.host, self.port) {
            (Some(url), _, _) => url.clone(),
            (None, Some(host), Some(port)) => host_port(host, port),
            (None, Some(host), None) => host.clone(),
            _ => String::new(),
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Outcome class of a probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Protocol-level success.
    Up,
    /// The probe ran but the endpoint failed.
    Down,
    /// The probe could not be attempted at all.
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Up => "up",
            Status::Down => "down",
            Status::Error => "error",
        }
    }

    /// Short bracketed tag for plain-text reports.
    pub fn tag(self) -> &'static str {
        match self {
            Status::Up => "[OK]",
            Status::Down => "[FAIL]",
            Status::Error => "[ERR]",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a leaf certificate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TlsInfo {
    pub subject: String,
    pub issuer: String,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    pub days_left: i64,
}

/// Result of one probe against one target.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CheckKind,
    pub target: String,
    pub status: Status,
    #[serde(rename = "latency_ms", with = "millis")]
    pub latency: Duration,
    #[serde(default)]
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsInfo>,
}

impl CheckResult {
    /// A result for a target that was never attempted.
    pub fn error(target: &Target, display: String, detail: impl Into<String>) -> Self {
        Self {
            name: target.name.clone(),
            kind: target.kind.clone(),
            target: display,
            status: Status::Error,
            latency: Duration::ZERO,
            detail: detail.into(),
            tls: None,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
