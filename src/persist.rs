use std::fs;
use std::path::Path;

use crate::inventory::InventoryLedger;

/// Load a previously persisted ledger, or a fresh zeroed one if the file
/// doesn't exist yet (first run in this market).
pub fn load_ledger(path: &str) -> InventoryLedger {
    let file = Path::new(path);
    if !file.exists() {
        return InventoryLedger::default();
    }
    match fs::read_to_string(file).ok().and_then(|s| serde_json::from_str(&s).ok()) {
        Some(ledger) => ledger,
        None => {
            eprintln!("[PERSIST] failed to parse {}, starting fresh", path);
            InventoryLedger::default()
        }
    }
}

/// Persist the ledger to disk, creating the parent directory if needed.
/// Called periodically and once more, unconditionally, at shutdown.
pub fn save_ledger(path: &str, ledger: &InventoryLedger) {
    let file = Path::new(path);
    if let Some(dir) = file.parent() {
        if !dir.as_os_str().is_empty() {
            let _ = fs::create_dir_all(dir);
        }
    }
    match serde_json::to_string_pretty(ledger) {
        Ok(json) => {
            if let Err(e) = fs::write(file, json) {
                eprintln!("[PERSIST] failed to write {}: {}", path, e);
            }
        }
        Err(e) => eprintln!("[PERSIST] failed to serialize ledger: {}", e),
    }
}
