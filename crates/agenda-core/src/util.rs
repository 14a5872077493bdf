//! Small helpers shared by the store, the HTTP client and the CLI.

const MAX_SNIPPET_CHARS: usize = 180;

/// First characters of `value`, trimmed, for log lines and error messages
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(MAX_SNIPPET_CHARS).collect()
}

/// Milliseconds since the Unix epoch; queue ordering and ids are built on it
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
