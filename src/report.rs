use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use time::format_description::well_known::Rfc3339;

use crate::types::{CheckResult, Status};

const DETAIL_MAX: usize = 60;

/// Status counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub up: usize,
    pub down: usize,
    pub error: usize,
}

impl Summary {
    /// Count `results` out of `total` submitted targets.
    pub fn new(total: usize, results: &[CheckResult]) -> Self {
        let mut s = Summary {
            total,
            completed: results.len(),
            ..Default::default()
        };
        for r in results {
            match r.status {
                Status::Up => s.up += 1,
                Status::Down => s.down += 1,
                Status::Error => s.error += 1,
            }
        }
        s
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "up: {}  down: {}  error: {}  (completed {}/{})",
            self.up, self.down, self.error, self.completed, self.total
        )
    }
}

/// Render results as a fixed-width text table.
pub fn render_table(results: &[CheckResult]) -> String {
    let mut name_w = "name".len();
    let mut target_w = "target".len();
    for r in results {
        name_w = name_w.max(r.name.len());
        target_w = target_w.max(r.target.len());
    }
    let status_w = "[FAIL]".len();
    let type_w = "type".len();
    let lat_w = "latency_ms".len();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<status_w$}  {:<name_w$}  {:<type_w$}  {:<target_w$}  {:>lat_w$}  detail",
        "status", "name", "type", "target", "latency_ms",
    );
    let _ = writeln!(
        out,
        "{:-<status_w$}  {:-<name_w$}  {:-<type_w$}  {:-<target_w$}  {:-<lat_w$}  ------",
        "", "", "", "", "",
    );
    for r in results {
        let _ = writeln!(
            out,
            "{:<status_w$}  {:<name_w$}  {:<type_w$}  {:<target_w$}  {:>lat_w$}  {}",
            r.status.tag(),
            r.name,
            r.kind.as_str(),
            r.target,
            r.latency.as_millis(),
            detail_cell(r),
        );
    }
    out
}

fn detail_cell(r: &CheckResult) -> String {
    let mut detail: String = r.detail.chars().take(DETAIL_MAX).collect();
    if let Some(tls) = &r.tls {
        let expires = tls
            .not_after
            .format(&Rfc3339)
            .unwrap_or_else(|_| tls.not_after.to_string());
        let _ = write!(
            detail,
            " (tls: {} by {}, expires {}, {} days left)",
            tls.subject, tls.issuer, expires, tls.days_left
        );
    }
    detail
}

/// Write results as pretty JSON to `path`.
pub fn write_results_json(path: &Path, results: &[CheckResult]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("create output file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, results)
        .with_context(|| format!("write results to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckKind, TlsInfo};
    use std::time::Duration;
    use time::OffsetDateTime;

    fn result(name: &str, status: Status) -> CheckResult {
        CheckResult {
            name: name.into(),
            kind: CheckKind::Tcp,
            target: "127.0.0.1:443".into(),
            status,
            latency: Duration::from_millis(12),
            detail: "connection successful".into(),
            tls: None,
        }
    }

    #[test]
    fn summary_counts_by_status() {
        let results = vec![
            result("a", Status::Up),
            result("b", Status::Down),
            result("c", Status::Up),
            result("d", Status::Error),
        ];
        let s = Summary::new(5, &results);
        assert_eq!(
            s,
            Summary {
                total: 5,
                completed: 4,
                up: 2,
                down: 1,
                error: 1
            }
        );
        assert_eq!(s.to_string(), "up: 2  down: 1  error: 1  (completed 4/5)");
    }

    #[test]
    fn table_tags_and_tls_columns() {
        let mut secure = result("secure", Status::Up);
        secure.tls = Some(TlsInfo {
            subject: "example.com".into(),
            issuer: "Example CA".into(),
            not_after: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
            days_left: 9,
        });
        let table = render_table(&[secure, result("broken", Status::Down)]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("status"));
        assert!(lines[2].starts_with("[OK]"));
        assert!(lines[2].contains("tls: example.com by Example CA"));
        assert!(lines[2].contains("9 days left"));
        assert!(lines[3].starts_with("[FAIL]"));
    }
}
