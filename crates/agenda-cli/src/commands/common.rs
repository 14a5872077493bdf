use std::env;
use std::path::{Path, PathBuf};

use agenda_core::config::SyncConfig;
use agenda_core::models::DeadLetter;
use agenda_core::util::{compact_text, unix_millis_now};
use agenda_core::{EntityId, EntityRecord, LocalStore, MutationRecord};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CliError;

const ENV_DB_PATH: &str = "AGENDA_DB_PATH";

#[derive(Debug, Serialize)]
pub struct MutationItem {
    pub id: String,
    pub table: String,
    pub action: String,
    pub entity_id: String,
    pub timestamp: i64,
    pub queued_at: String,
    pub relative_time: String,
    pub retries: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueueReport {
    pub pending: usize,
    pub mutations: Vec<MutationItem>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(ENV_DB_PATH).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path().ok_or(CliError::NoDataDir)
}

pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("agenda").join("agenda.db"))
}

pub async fn open_store(path: &Path) -> Result<LocalStore, CliError> {
    Ok(LocalStore::open_path(path).await?)
}

pub fn load_config() -> Result<SyncConfig, CliError> {
    Ok(SyncConfig::from_env()?)
}

/// Parse a JSON argument that must be an object
pub fn parse_object(json: &str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(fields) => Ok(fields),
        other => Err(CliError::NotAnObject(compact_text(&other.to_string()))),
    }
}

/// Parse a JSON object carrying an existing `id`
pub fn parse_record(json: &str) -> Result<EntityRecord, CliError> {
    let fields = parse_object(json)?;
    match fields.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => {}
        Some(Value::Number(_)) => {}
        _ => return Err(CliError::MissingId),
    }
    Ok(EntityRecord::from_json(Value::Object(fields))?)
}

pub fn normalize_record_id(id: &str) -> Result<EntityId, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyId);
    }
    Ok(EntityId::new(trimmed))
}

/// Split `field=value`; the value is matched as text
pub fn parse_filter(filter: &str) -> Result<(String, Value), CliError> {
    let Some((field, value)) = filter.split_once('=') else {
        return Err(CliError::InvalidFilter(filter.to_string()));
    };
    let field = field.trim();
    if field.is_empty() {
        return Err(CliError::InvalidFilter(filter.to_string()));
    }
    Ok((field.to_string(), Value::String(value.trim().to_string())))
}

pub fn format_record_line(record: &EntityRecord) -> String {
    let marker = if record.id.is_temporary() {
        "  (not synced)"
    } else {
        ""
    };
    let fields = Value::Object(record.fields.clone()).to_string();
    format!("{}  {}{marker}", record.id, compact_text(&fields))
}

pub fn mutation_to_item(mutation: &MutationRecord, now_ms: i64) -> MutationItem {
    MutationItem {
        id: mutation.id.to_string(),
        table: mutation.table.clone(),
        action: mutation.kind().to_string(),
        entity_id: mutation.entity_id().to_string(),
        timestamp: mutation.timestamp,
        queued_at: format_timestamp(mutation.timestamp),
        relative_time: format_relative_time(mutation.timestamp, now_ms),
        retries: mutation.retries,
        last_error: mutation.last_error.clone(),
    }
}

/// Pending mutations in dispatch order
pub fn queue_report(mut mutations: Vec<MutationRecord>) -> QueueReport {
    mutations.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    let now_ms = unix_millis_now();
    QueueReport {
        pending: mutations.len(),
        mutations: mutations
            .iter()
            .map(|mutation| mutation_to_item(mutation, now_ms))
            .collect(),
    }
}

pub fn format_mutation_lines(items: &[MutationItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let mut line = format!(
                "{:<10}  {:<6}  {:<14}  {}",
                item.relative_time, item.action, item.table, item.entity_id
            );
            if item.retries > 0 {
                line.push_str(&format!("  retries={}", item.retries));
            }
            if let Some(error) = &item.last_error {
                line.push_str(&format!("  last_error={}", compact_text(error)));
            }
            line
        })
        .collect()
}

pub fn format_dead_letter_lines(letters: &[DeadLetter]) -> Vec<String> {
    letters
        .iter()
        .map(|letter| {
            format!(
                "{}  {:<6}  {:<14}  {}  {}",
                format_timestamp(letter.dead_lettered_at),
                letter.mutation.kind(),
                letter.mutation.table,
                letter.mutation.entity_id(),
                compact_text(&letter.reason)
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}
