use std::error::Error as StdError;
use std::fmt::Write;
use std::net::IpAddr;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Url;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::scope;
use crate::tls;
use crate::types::{CheckKind, CheckResult, Endpoint, Status, Target};

/// Run one check against one target.
///
/// Every network step is bounded by the target's effective timeout and by `cancel`.
/// The outcome, including any failure, is carried in the returned [`CheckResult`].
pub async fn check(cancel: CancellationToken, target: Target) -> CheckResult {
    let endpoint = match target.endpoint() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            debug!(name = %target.name, error = %e, "target rejected");
            return CheckResult::error(&target, target.raw_display(), e.to_string());
        }
    };
    let limit = target.effective_timeout();

    let result = match endpoint {
        Endpoint::Url(url) => check_http(&cancel, &target, url, limit).await,
        Endpoint::HostPort { host, port } => check_tcp(&cancel, &target, host, port, limit).await,
        Endpoint::Host(host) => check_dns(&cancel, &target, host, limit).await,
    };
    debug!(
        name = %result.name,
        kind = %result.kind,
        status = %result.status,
        latency_ms = result.latency.as_millis() as u64,
        detail = %result.detail,
        "check finished"
    );
    result
}

fn outcome(target: &Target, kind: CheckKind, display: String) -> CheckResult {
    CheckResult {
        name: target.name.clone(),
        kind,
        target: display,
        status: Status::Down,
        latency: Duration::ZERO,
        detail: String::new(),
        tls: None,
    }
}

async fn check_http(
    cancel: &CancellationToken,
    target: &Target,
    url: String,
    limit: Duration,
) -> CheckResult {
    let mut result = outcome(target, CheckKind::Http, url.clone());

    let (client, request) = match build_request(&url) {
        Ok(built) => built,
        Err(reason) => {
            result.status = Status::Error;
            result.detail = format!("build request: {reason}");
            return result;
        }
    };

    let start = Instant::now();
    let sent = scope::bounded(cancel, limit, client.execute(request)).await;
    result.latency = start.elapsed();

    let resp = match sent {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            result.detail = error_chain(&e);
            return result;
        }
        Err(why) => {
            result.detail = why.to_string();
            return result;
        }
    };

    let code = resp.status();
    result.status = if (200..400).contains(&code.as_u16()) {
        Status::Up
    } else {
        Status::Down
    };
    result.detail = format!("HTTP {}", code.as_u16());
    result.tls = resp
        .extensions()
        .get::<reqwest::tls::TlsInfo>()
        .and_then(|info| info.peer_certificate())
        .and_then(tls::summarize_der);
    result
}

static CLIENT: OnceLock<Result<reqwest::Client, String>> = OnceLock::new();

/// The client shared by every HTTP check. Redirects are reported, not followed.
fn http_client() -> Result<&'static reqwest::Client, String> {
    CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .redirect(Policy::none())
                .tls_info(true)
                // Every check measures a fresh connection.
                .pool_max_idle_per_host(0)
                .build()
                .map_err(|e| error_chain(&e))
        })
        .as_ref()
        .map_err(Clone::clone)
}

fn build_request(url: &str) -> Result<(&'static reqwest::Client, reqwest::Request), String> {
    let parsed = Url::parse(url.trim()).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {:?}", parsed.scheme()));
    }
    let client = http_client()?;
    let request = client.get(parsed).build().map_err(|e| error_chain(&e))?;
    Ok((client, request))
}

async fn check_tcp(
    cancel: &CancellationToken,
    target: &Target,
    host: String,
    port: u16,
    limit: Duration,
) -> CheckResult {
    let display = Endpoint::HostPort {
        host: host.clone(),
        port,
    }
    .display();
    let mut result = outcome(target, CheckKind::Tcp, display);

    let start = Instant::now();
    let dialed = scope::bounded(cancel, limit, TcpStream::connect((host.as_str(), port))).await;
    result.latency = start.elapsed();

    match dialed {
        Ok(Ok(stream)) => drop(stream),
        Ok(Err(e)) => {
            result.detail = e.to_string();
            return result;
        }
        Err(why) => {
            result.detail = why.to_string();
            return result;
        }
    }
    result.status = Status::Up;
    result.detail = "connection successful".to_string();

    if tls::is_tls_port(port) {
        result.tls = tls::inspect(cancel, &host, port).await;
    }
    result
}

async fn check_dns(
    cancel: &CancellationToken,
    target: &Target,
    host: String,
    limit: Duration,
) -> CheckResult {
    let mut result = outcome(target, CheckKind::Dns, host.clone());

    let start = Instant::now();
    let resolved = scope::bounded(cancel, limit, lookup_host((host.as_str(), 0))).await;
    result.latency = start.elapsed();

    let addrs = match resolved {
        Ok(Ok(addrs)) => addrs,
        Ok(Err(e)) => {
            result.detail = e.to_string();
            return result;
        }
        Err(why) => {
            result.detail = why.to_string();
            return result;
        }
    };

    let mut ips: Vec<IpAddr> = Vec::new();
    for addr in addrs {
        if !ips.contains(&addr.ip()) {
            ips.push(addr.ip());
        }
    }
    if ips.is_empty() {
        result.detail = format!("no addresses found for {host}");
        return result;
    }

    result.status = Status::Up;
    result.detail = format!("resolved to [{}]", join(&ips));
    result
}

fn join(ips: &[IpAddr]) -> String {
    let mut out = String::new();
    for (i, ip) in ips.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{ip}");
    }
    out
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut s = err.to_string();
    let mut cur = err.source();
    while let Some(src) = cur {
        let msg = src.to_string();
        if !s.contains(&msg) {
            let _ = write!(s, ": {msg}");
        }
        cur = src.source();
    }
    s
}
