//! Append-only raw chat logs, one file per name under a folder.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Log file for lines that could not be classified.
pub const UNKNOWN_LOG: &str = "unknown";

pub struct RawLog {
    folder: PathBuf,
    files: Mutex<HashMap<String, File>>,
}

impl RawLog {
    pub fn new(folder: impl AsRef<Path>) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Append `line` to `<folder>/<name>.log`, opening it on first use.
    pub fn append(&self, name: &str, line: &str) -> io::Result<()> {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);

        if !files.contains_key(name) {
            fs::create_dir_all(&self.folder)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.folder.join(format!("{}.log", name)))?;
            files.insert(name.to_string(), file);
        }

        match files.get_mut(name) {
            Some(file) => writeln!(file, "{}", line),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_creates_folder_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("logs");
        let log = RawLog::new(&folder);

        log.append("bar", "first").unwrap();
        log.append("bar", "second").unwrap();
        log.append(UNKNOWN_LOG, "???").unwrap();

        let bar = std::fs::read_to_string(folder.join("bar.log")).unwrap();
        assert_eq!(bar, "first\nsecond\n");
        let unknown = std::fs::read_to_string(folder.join("unknown.log")).unwrap();
        assert_eq!(unknown, "???\n");
    }
}
