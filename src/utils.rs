use std::fs;
use std::path::Path;

/// Terminal hyperlink (OSC 8) to a written file, labelled with its path
pub fn file_link(path: &Path) -> String {
    let label = path.display().to_string();
    let target = fs::canonicalize(path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| label.clone());
    format!("\x1b]8;;file://{}\x1b\\{}\x1b]8;;\x1b\\", target, label)
}
