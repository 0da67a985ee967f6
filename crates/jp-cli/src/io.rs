use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

pub fn read_text(path: &Path) -> Result<String, String> {
    fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))
}

pub fn read_json(path: &Path) -> Result<Value, String> {
    let text = read_text(path)?;
    serde_json::from_str(&text)
        .map_err(|e| format!("Invalid JSON in '{}': {}", path.display(), e))
}

/// Write pretty-printed JSON to `path`, or to stdout when `path` is `None`.
pub fn write_json(path: Option<&Path>, value: &Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize output: {}", e))?;

    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
            }
            fs::write(path, text)
                .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", text).map_err(|e| format!("Failed to write output: {}", e))
        }
    }
}
