use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};

/// Emit a view snapshot as a single JSON line to stdout.
pub fn report<T: Serialize>(view: &str, snapshot: &T) {
    let line = json!({
        "view": view,
        "at": Utc::now().to_rfc3339(),
        "data": snapshot,
    });
    println!("{line}");
}

/// Emit a view whose last refresh failed as a JSON line. The view keeps its
/// previous data, so this goes out alongside the regular snapshot.
pub fn report_error(view: &str, error: &str, retryable: bool) {
    println!("{}", error_line(view, error, retryable));
}

fn error_line(view: &str, error: &str, retryable: bool) -> Value {
    json!({
        "view": view,
        "at": Utc::now().to_rfc3339(),
        "error": error,
        "retryable": retryable,
    })
}

/// Pretty-printed variant for one-shot commands.
pub fn report_pretty<T: Serialize>(snapshot: &T) {
    if let Ok(json) = serde_json::to_string_pretty(snapshot) {
        println!("{json}");
    }
}
