use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::input::parse_toilet_type;
use crate::model::floor::ToiletType;
use crate::store::RecordStore;
use crate::time::days_in_month;

/// Schema description handed to the vision model.
pub const EXTRACTION_PROMPT: &str = "\
Extract inventory data from this hand-written log.
Valid Floors: 2, 85, 86, 87, 99, 100, 105, 107, 108.
Valid Toilet Types: MALE PUBLIC, FEMALE PUBLIC, MALE STAFF, FEMALE STAFF, POWDER ROOM.
Return a JSON array of objects with keys: floor (string), type (string), day (integer 1-31), value (integer).";

pub const PROMPT_ENV_VAR: &str = "TISSUE_EXTRACTION_PROMPT";

/// Maps a photo of a paper log to untyped `{floor, type, day, value}` objects.
/// Implementations never fail: any problem yields an empty list.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, image: &[u8]) -> Vec<Value>;
}

/// Runs an external program (typically a wrapper around a vision model),
/// feeding the image on stdin and reading a JSON array from stdout.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandExtractor {
    /// `argv[0]` is the program. Returns `None` for an empty command line.
    pub fn new(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    async fn run(&self, image: &[u8]) -> anyhow::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(PROMPT_ENV_VAR, EXTRACTION_PROMPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn extractor '{}'", self.program))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("extractor stdin unavailable"))?;
        // Feed stdin while draining stdout/stderr, or a chatty child fills
        // its pipe and both sides block.
        let feed = async move {
            let written = stdin.write_all(image).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.context("wait for extractor")?;
        match written {
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("extractor closed stdin before reading the whole image");
            }
            other => other.context("write image to extractor")?,
        }
        if !output.status.success() {
            return Err(anyhow!(
                "extractor exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Extractor for CommandExtractor {
    async fn extract(&self, image: &[u8]) -> Vec<Value> {
        let text = match self.run(image).await {
            Ok(text) => text,
            Err(err) => {
                error!("AI extraction failed: {:#}", err);
                return Vec::new();
            }
        };
        if text.trim().is_empty() {
            return Vec::new();
        }
        match parse_extraction_response(&text) {
            Ok(entries) => {
                debug!(count = entries.len(), "extractor returned entries");
                entries
            }
            Err(err) => {
                error!("AI extraction returned unparseable output: {:#}", err);
                Vec::new()
            }
        }
    }
}

/// Strip markdown code fences (```json ... ```) around a model response.
pub fn clean_json_response(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed.to_string();
    };
    let after_fence = &trimmed[start + 3..];
    let body = match after_fence.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &after_fence[4..],
        _ => after_fence,
    };
    let body = body.find("```").map(|end| &body[..end]).unwrap_or(body);
    body.trim().to_string()
}

pub fn parse_extraction_response(raw: &str) -> anyhow::Result<Vec<Value>> {
    let cleaned = clean_json_response(raw);
    let value: Value = serde_json::from_str(&cleaned).context("parse extractor JSON")?;
    match value {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => ["entries", "data"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .ok_or_else(|| anyhow!("expected a JSON array of entries")),
        _ => Err(anyhow!("expected a JSON array of entries")),
    }
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub applied: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct ExtractedEntry {
    floor: String,
    kind: ToiletType,
    date: NaiveDate,
    value: f64,
}

fn coerce_floor(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => n
            .as_u64()
            .map(|v| v.to_string())
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| (f as u64).to_string())),
        _ => None,
    }
}

fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn resolve_entry(raw: &Value, year: i32, month: u32, month_len: u32) -> Option<ExtractedEntry> {
    let floor = coerce_floor(raw.get("floor"))?;
    let kind = match raw.get("type")? {
        Value::String(s) => parse_toilet_type(s).ok()?,
        _ => return None,
    };
    let day = coerce_number(raw.get("day"))?.trunc();
    if day < 1.0 || day > month_len as f64 {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day as u32)?;
    let value = coerce_number(raw.get("value")).unwrap_or(0.0);

    Some(ExtractedEntry { floor, kind, date, value })
}

/// Merge extractor output into `store` for the selected month.
///
/// Each entry stands alone: malformed entries and unknown (floor, type)
/// pairs are dropped without affecting the rest of the batch.
pub fn merge_extracted(
    store: &RecordStore,
    entries: &[Value],
    year: i32,
    month: u32,
) -> (RecordStore, MergeReport) {
    let month_len = match days_in_month(year, month) {
        Ok(len) => len,
        Err(err) => {
            warn!("cannot merge extracted data: {}", err);
            return (store.clone(), MergeReport { applied: 0, dropped: entries.len() });
        }
    };

    let mut batch = store.batch();
    let mut report = MergeReport::default();

    for raw in entries {
        let applied = resolve_entry(raw, year, month, month_len)
            .map(|e| batch.set(&e.floor, e.kind, e.date, e.value))
            .unwrap_or(false);
        if applied {
            report.applied += 1;
        } else {
            debug!(entry = %raw, "dropping extracted entry");
            report.dropped += 1;
        }
    }

    if report.dropped > 0 {
        warn!(applied = report.applied, dropped = report.dropped, "some extracted entries were dropped");
    }

    if batch.is_changed() {
        (batch.finish(), report)
    } else {
        (store.clone(), report)
    }
}
