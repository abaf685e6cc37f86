use console::{style, Term};
use eyre::WrapErr;
use std::{fmt, path::PathBuf, time::Duration};
use tabled::{builder::Builder, settings::Style};

use crate::{masking, runner::FileResult};

/// Reporter trait. The runner calls [`Reporter::on_result`] once per file in scan order,
/// then [`Reporter::on_summary`] once at the end of a successful run.
#[async_trait::async_trait]
pub trait Reporter {
    /// Called when a file has been run.
    async fn on_result(&mut self, _result: &FileResult) -> eyre::Result<()> {
        Ok(())
    }

    /// Called after every file has been run.
    async fn on_summary(&mut self, _summary: &Summary) -> eyre::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReporterType {
    Null,
    #[default]
    List,
    Table,
}

/// Pass/fail counts of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub failed_files: Vec<PathBuf>,
    /// Sum of the response times.
    pub elapsed: Duration,
}

impl Summary {
    pub fn of(results: &[FileResult]) -> Summary {
        let mut summary = Summary::default();
        for result in results {
            summary.elapsed += result.response.elapsed;
            if result.passed() {
                summary.passed += 1;
            } else {
                summary.failed += 1;
                summary.failed_files.push(result.file.clone());
            }
        }
        summary
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }

    fn lines(&self) -> Vec<String> {
        if self.passed + self.failed == 0 {
            return vec!["no request files found".to_string()];
        }
        let mut lines = vec![String::new()];
        let counts = format!("{self}");
        lines.push(if self.success() {
            format!("{}", style(counts).green().bold())
        } else {
            format!("{}", style(counts).red().bold())
        });
        if !self.failed_files.is_empty() {
            lines.push("failed files:".to_string());
            lines.extend(
                self.failed_files
                    .iter()
                    .map(|file| format!("  - {}", file.display())),
            );
        }
        lines
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} passed, {} failed", self.passed, self.failed)
    }
}

pub struct NullReporter;

#[async_trait::async_trait]
impl Reporter for NullReporter {}

/// Prints one line per file followed by its numbered failures.
pub struct ListReporter {
    terminal: Term,
    capture_http: bool,
    mask_sensitive: bool,
}

impl ListReporter {
    pub fn new(capture_http: bool) -> ListReporter {
        ListReporter {
            terminal: Term::stdout(),
            capture_http,
            mask_sensitive: true,
        }
    }

    /// Print captured secrets as is.
    pub fn no_mask(mut self) -> ListReporter {
        self.mask_sensitive = false;
        self
    }

    fn render(&self, result: &FileResult) -> Vec<String> {
        let mut lines = Vec::new();
        let timing = format!(
            "{} {}",
            result.response.status,
            pretty_duration(result.response.elapsed)
        );

        if result.passed() {
            lines.push(format!(
                "{} {} {}",
                style("✓").green(),
                result.file.display(),
                style(timing).dim()
            ));
        } else {
            lines.push(format!(
                "{} {} {}",
                style("✘").red(),
                result.file.display(),
                style(timing).dim()
            ));
            for (i, failure) in result.failures.iter().enumerate() {
                let origin = if failure.global { "config " } else { "" };
                lines.push(format!(
                    "   {}) {origin}line {}: {}",
                    i + 1,
                    failure.line,
                    failure.assertion
                ));
                lines.push(format!("      {}", style(&failure.reason).red()));
            }
        }

        if self.capture_http {
            lines.extend(self.render_http(result).into_iter().map(dim));
        }
        lines
    }

    fn render_http(&self, result: &FileResult) -> Vec<String> {
        let (url, headers) = if self.mask_sensitive {
            (
                masking::mask_url(&result.request.url),
                masking::mask_headers(&result.request.headers),
            )
        } else {
            (result.request.url.clone(), result.request.headers.clone())
        };

        let mut lines = vec![
            format!(" => {} {url}", result.request.method),
            "  > request:".to_string(),
            "    > headers:".to_string(),
        ];
        lines.extend(headers.iter().map(|(k, v)| format!("       > {k}: {v}")));
        if let Some(body) = &result.request.body {
            lines.push(format!("    > body: {body}"));
        }

        lines.push(format!("  < response: {}", result.response.status));
        lines.push("    < headers:".to_string());
        for (k, v) in &result.response.headers {
            let v = if self.mask_sensitive && masking::is_sensitive_header(k) {
                masking::MASK
            } else {
                v.as_str()
            };
            lines.push(format!("       < {k}: {v}"));
        }
        lines.push(format!("    < body: {}", result.response.text()));
        lines
    }
}

#[async_trait::async_trait]
impl Reporter for ListReporter {
    async fn on_result(&mut self, result: &FileResult) -> eyre::Result<()> {
        for line in self.render(result) {
            write(&self.terminal, line)?;
        }
        Ok(())
    }

    async fn on_summary(&mut self, summary: &Summary) -> eyre::Result<()> {
        for line in summary.lines() {
            write(&self.terminal, line)?;
        }
        Ok(())
    }
}

/// Collects every result and prints a single table at the end of the run.
pub struct TableReporter {
    terminal: Term,
    rows: Vec<[String; 6]>,
}

impl TableReporter {
    pub fn new() -> TableReporter {
        TableReporter {
            terminal: Term::stdout(),
            rows: Vec::new(),
        }
    }

    fn render(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(["File", "Method", "Status", "Time", "Result", "Failures"]);
        for row in &self.rows {
            builder.push_record(row.clone());
        }
        let mut table = builder.build();
        table.with(Style::rounded());
        table.to_string()
    }
}

impl Default for TableReporter {
    fn default() -> TableReporter {
        TableReporter::new()
    }
}

#[async_trait::async_trait]
impl Reporter for TableReporter {
    async fn on_result(&mut self, result: &FileResult) -> eyre::Result<()> {
        let failures = result
            .failures
            .iter()
            .map(|f| format!("line {}: {}", f.line, f.reason))
            .collect::<Vec<_>>()
            .join("\n");
        self.rows.push([
            result.file.display().to_string(),
            result.request.method.to_string(),
            result.response.status.to_string(),
            pretty_duration(result.response.elapsed),
            if result.passed() { "✓" } else { "✘" }.to_string(),
            failures,
        ]);
        Ok(())
    }

    async fn on_summary(&mut self, summary: &Summary) -> eyre::Result<()> {
        if !self.rows.is_empty() {
            self.terminal
                .write_line(&self.render())
                .wrap_err("failed to write table on terminal")?;
        }
        for line in summary.lines() {
            write(&self.terminal, line)?;
        }
        Ok(())
    }
}

/// `1m 5s`, `1s 250ms`, `23ms` or `850µs`.
pub fn pretty_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis == 0 {
        return format!("{}µs", duration.as_micros());
    }
    if millis < 1_000 {
        return format!("{millis}ms");
    }

    let secs = duration.as_secs();
    if secs < 60 {
        let rest = millis % 1_000;
        return if rest == 0 {
            format!("{secs}s")
        } else {
            format!("{secs}s {rest}ms")
        };
    }

    let rest = secs % 60;
    if rest == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}m {rest}s", secs / 60)
    }
}

fn dim(s: String) -> String {
    format!("{}", style(s).dim())
}

fn write(term: &Term, s: impl AsRef<str>) -> eyre::Result<()> {
    term.write_line(s.as_ref())
        .wrap_err("failed to write character on terminal")
}
