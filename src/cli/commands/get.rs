//! Get command implementation.
//!
//! Fetches each URL through the cache and writes the bodies to stdout or a
//! file. A per-URL report and the hit/miss totals go to stderr.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::cache::{CacheStats, EtagCache};
use crate::cli::args::GetArgs;
use crate::request::{CacheRequest, Connection, HttpConnection};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// Outcome of one fetched URL.
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub url: String,
    pub status: u16,
    pub bytes: u64,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Everything `get --json` prints.
#[derive(Debug, Serialize)]
struct GetSummary<'a> {
    requests: &'a [FetchReport],
    stats: CacheStats,
}

/// The get command implementation.
pub struct GetCommand {
    cache: EtagCache,
    args: GetArgs,
}

impl GetCommand {
    pub fn new(cache: &EtagCache, args: GetArgs) -> Self {
        Self {
            cache: cache.clone(),
            args,
        }
    }

    fn fetch_all(&self, ui: &mut dyn UserInterface) -> Result<(Vec<FetchReport>, usize)> {
        let headers = parse_headers(&self.args.headers)?;
        let mut file = match &self.args.output {
            Some(path) => Some(BufWriter::new(
                File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            )),
            None => None,
        };

        let mut reports = Vec::new();
        let mut failures = 0;
        for url in &self.args.urls {
            let result = match file.as_mut() {
                Some(file) => fetch(&self.cache, url, &headers, file),
                None => fetch(&self.cache, url, &headers, ui.body()),
            };
            match result {
                Ok(report) => {
                    if report.status != 200 {
                        ui.warning(&format!("{} returned HTTP {}", url, report.status));
                        failures += 1;
                    }
                    reports.push(report);
                }
                Err(e) => {
                    ui.error(&format!("{}: {:#}", url, e));
                    failures += 1;
                }
            }
        }

        if let Some(mut file) = file {
            file.flush().context("Failed to write output file")?;
        } else {
            ui.body().flush()?;
        }
        Ok((reports, failures))
    }
}

impl Command for GetCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> crate::error::Result<CommandResult> {
        let (reports, failures) = self.fetch_all(ui)?;
        let stats = self.cache.stats();

        if self.args.json {
            let summary = GetSummary {
                requests: &reports,
                stats,
            };
            ui.note(&serde_json::to_string_pretty(&summary).map_err(anyhow::Error::from)?);
        } else {
            for report in &reports {
                ui.note(&format!(
                    "{} {} ({} bytes, {})",
                    report.status,
                    report.url,
                    report.bytes,
                    if report.cached { "cached" } else { "fetched" }
                ));
            }
            ui.note(&format!("{} hits, {} misses", stats.hits, stats.misses));
        }

        Ok(if failures == 0 {
            CommandResult::success()
        } else {
            CommandResult::failure(1)
        })
    }
}

/// Fetch one URL, copying a successful body into `sink`.
fn fetch(
    cache: &EtagCache,
    url: &str,
    headers: &[(String, String)],
    sink: &mut dyn Write,
) -> Result<FetchReport> {
    let mut request = CacheRequest::new(HttpConnection::get(url)?, cache);
    for (name, value) in headers {
        request.header(name, value)?;
    }

    let status = request.code()?;
    let bytes = if status == 200 {
        let mut body = request.stream()?;
        let copied = io::copy(&mut body, sink).context("Failed to read response body")?;
        body.close();
        copied
    } else {
        request.disconnect();
        0
    };

    Ok(FetchReport {
        url: request.connection().url().to_string(),
        status,
        bytes,
        cached: request.cached(),
        etag: request.etag(),
    })
}

/// Parse `Name: Value` header arguments.
fn parse_headers(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|header| match header.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.trim().to_string()))
            }
            _ => bail!("Invalid header '{}', expected 'Name: Value'", header),
        })
        .collect()
}
