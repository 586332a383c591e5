//! Leaf certificate introspection.
//!
//! Everything here is best effort: failures turn into `None`, never into an
//! error that could change a probe's status.
use std::time::Duration;

use ::time::OffsetDateTime;
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use x509_parser::prelude::*;

use crate::scope;
use crate::types::TlsInfo;

/// Ports on which a TCP probe also harvests the certificate.
pub const TLS_PORTS: [u16; 2] = [443, 8443];

/// Bound on the secondary handshake.
pub const INSPECT_TIMEOUT: Duration = Duration::from_secs(3);

pub fn is_tls_port(port: u16) -> bool {
    TLS_PORTS.contains(&port)
}

/// Summarise a DER-encoded certificate.
pub fn summarize_der(der: &[u8]) -> Option<TlsInfo> {
    let (_, cert) = parse_x509_certificate(der).ok()?;
    let not_after =
        OffsetDateTime::from_unix_timestamp(cert.validity().not_after.timestamp()).ok()?;
    Some(TlsInfo {
        subject: common_name(cert.subject()),
        issuer: common_name(cert.issuer()),
        not_after,
        days_left: days_until(not_after, OffsetDateTime::now_utc()),
    })
}

/// Whole days from `now` to `not_after`, truncated toward zero.
pub fn days_until(not_after: OffsetDateTime, now: OffsetDateTime) -> i64 {
    (not_after - now).whole_days()
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Connector for inspection only: chain and hostname checks are disabled.
fn inspection_connector() -> Option<TlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    builder
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true);
    builder.build().ok().map(TlsConnector::from)
}

/// Open a fresh connection to `host:port`, complete a handshake and summarise the leaf.
pub async fn inspect(cancel: &CancellationToken, host: &str, port: u16) -> Option<TlsInfo> {
    let connector = inspection_connector()?;
    let handshake = async {
        let stream = TcpStream::connect((host, port)).await.ok()?;
        let tls = connector.connect(host, stream).await.ok()?;
        let der = tls.get_ref().peer_certificate().ok().flatten()?.to_der().ok()?;
        summarize_der(&der)
    };
    match scope::bounded(cancel, INSPECT_TIMEOUT, handshake).await {
        Ok(info) => info,
        Err(why) => {
            debug!(host, port, %why, "tls inspection skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::time::Duration as TimeDuration;
    use tokio::net::TcpListener;

    const LEAF_DER: &[u8] = include_bytes!("../tests/fixtures/leaf.der");
    const LEAF_PEM: &[u8] = include_bytes!("../tests/fixtures/leaf.pem");
    const LEAF_KEY: &[u8] = include_bytes!("../tests/fixtures/leaf.key");
    // notAfter of the fixture leaf: 2098-06-15T12:00:00Z
    const LEAF_NOT_AFTER: i64 = 4_053_672_000;

    /// Serve TLS with the fixture leaf on an ephemeral port.
    async fn serve_fixture_tls() -> u16 {
        let identity = native_tls::Identity::from_pkcs8(LEAF_PEM, LEAF_KEY).unwrap();
        let acceptor =
            tokio_native_tls::TlsAcceptor::from(native_tls::TlsAcceptor::new(identity).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    let _ = acceptor.accept(sock).await;
                });
            }
        });
        port
    }

    #[test]
    fn summarize_reads_leaf_fields() {
        let info = summarize_der(LEAF_DER).expect("fixture parses");
        assert_eq!(info.subject, "fixture.example");
        assert_eq!(info.issuer, "Netprobe Fixture CA");
        assert_eq!(info.not_after.unix_timestamp(), LEAF_NOT_AFTER);
        let expected = days_until(info.not_after, OffsetDateTime::now_utc());
        // Allow for a day boundary passing between the two clock reads.
        assert!((info.days_left - expected).abs() <= 1);
        assert!(info.days_left > 0);
    }

    #[tokio::test]
    async fn inspect_reads_self_issued_leaf() {
        let port = serve_fixture_tls().await;
        let cancel = CancellationToken::new();
        let info = inspect(&cancel, "127.0.0.1", port)
            .await
            .expect("handshake with validation disabled");
        assert_eq!(info.subject, "fixture.example");
        assert_eq!(info.issuer, "Netprobe Fixture CA");
        assert_eq!(info.not_after.unix_timestamp(), LEAF_NOT_AFTER);
    }

    #[tokio::test]
    async fn inspect_gives_up_when_cancelled() {
        let port = serve_fixture_tls().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(inspect(&cancel, "127.0.0.1", port).await.is_none());
    }

    #[test]
    fn days_until_truncates_toward_zero() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(days_until(now + TimeDuration::hours(47), now), 1);
        assert_eq!(days_until(now + TimeDuration::days(30), now), 30);
        assert_eq!(days_until(now - TimeDuration::hours(47), now), -1);
        assert_eq!(days_until(now, now), 0);
    }

    #[test]
    fn garbage_der_is_ignored() {
        assert!(summarize_der(&[]).is_none());
        assert!(summarize_der(b"not a certificate").is_none());
    }

    #[test]
    fn well_known_tls_ports() {
        assert!(is_tls_port(443));
        assert!(is_tls_port(8443));
        assert!(!is_tls_port(80));
    }

    #[tokio::test]
    async fn inspect_swallows_plaintext_peer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // Accept and close immediately: the handshake must fail quietly.
            while let Ok((sock, _)) = listener.accept().await {
                drop(sock);
            }
        });
        let cancel = CancellationToken::new();
        assert!(inspect(&cancel, "127.0.0.1", port).await.is_none());
    }
}
