use crate::error::{ProxyError, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::RwLock;

/// Named share records exchanged between the parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Slot {
    /// Client exponent share and partial modulus, imported by client-sign
    ClientKeys,
    /// Server exponent share and partial modulus, produced by client-full
    ServerBoundKeys,
    /// Public exponent and modulus, produced by the server
    PublicKey,
    /// Message to sign
    Message,
    /// Message and client signature share
    ClientSignature,
    /// Message and final signature
    FinalSignature,
}

impl Slot {
    pub fn file_name(self) -> &'static str {
        match self {
            Slot::ClientKeys => "client_card.key",
            Slot::ServerBoundKeys => "for_server.key",
            Slot::PublicKey => "public.key",
            Slot::Message => "message.txt",
            Slot::ClientSignature => "client.sig",
            Slot::FinalSignature => "final.sig",
        }
    }

    fn missing_hint(self) -> &'static str {
        match self {
            Slot::ClientKeys => {
                "The keys have not been generated. Run the reference implementation first."
            }
            Slot::ServerBoundKeys => {
                "The keys have not been generated. Generate the client keys first."
            }
            Slot::Message => "The message file is missing.",
            Slot::ClientSignature => {
                "The client signature share has not been computed. Run the client first."
            }
            Slot::PublicKey => "Generate the server keys first.",
            Slot::FinalSignature => "Sign the message on the server first.",
        }
    }

    pub(crate) fn missing(self) -> ProxyError {
        ProxyError::MissingRecord {
            file: self.file_name(),
            hint: self.missing_hint(),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Line-oriented storage of share records
pub trait ShareStore {
    /// All lines of the record. A missing record is [`ProxyError::MissingRecord`].
    fn read(&self, slot: Slot) -> Result<Vec<String>>;
    /// Replace the record with the given lines.
    fn write(&self, slot: Slot, lines: &[String]) -> Result<()>;
}

/// Read a record that must hold exactly `expected` lines.
///
/// Trailing blank lines are ignored; any further non-empty line, or a missing
/// one, is a format error.
pub fn read_record(store: &dyn ShareStore, slot: Slot, expected: usize) -> Result<Vec<String>> {
    let mut lines: Vec<String> = store
        .read(slot)?
        .into_iter()
        .map(|l| l.trim().to_string())
        .collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    if lines.len() != expected || lines.iter().any(|l| l.is_empty()) {
        return Err(ProxyError::RecordFormat(slot.file_name()));
    }
    Ok(lines)
}

/// In-memory storage for testing
#[cfg(test)]
pub struct MemoryStorage {
    data: RwLock<HashMap<Slot, Vec<String>>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    pub fn with(self, slot: Slot, lines: &[&str]) -> Self {
        self.data
            .write()
            .unwrap()
            .insert(slot, lines.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn get(&self, slot: Slot) -> Option<Vec<String>> {
        self.data.read().unwrap().get(&slot).cloned()
    }
}

#[cfg(test)]
impl ShareStore for MemoryStorage {
    fn read(&self, slot: Slot) -> Result<Vec<String>> {
        self.get(slot).ok_or_else(|| slot.missing())
    }

    fn write(&self, slot: Slot, lines: &[String]) -> Result<()> {
        self.data.write().unwrap().insert(slot, lines.to_vec());
        Ok(())
    }
}

/// File-based storage for CLI
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let path = base_dir.into();
        std::fs::create_dir_all(&path).map_err(|source| ProxyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { base_dir: path })
    }

    fn path(&self, slot: Slot) -> PathBuf {
        self.base_dir.join(slot.file_name())
    }
}

impl ShareStore for FileStorage {
    fn read(&self, slot: Slot) -> Result<Vec<String>> {
        let path = self.path(slot);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(slot.missing()),
            Err(source) => Err(ProxyError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn write(&self, slot: Slot, lines: &[String]) -> Result<()> {
        let path = self.path(slot);
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        std::fs::write(&path, text).map_err(|source| ProxyError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path()).unwrap();

        assert!(store.read(Slot::PublicKey).is_err());
        store
            .write(Slot::PublicKey, &["010001".to_string(), "C0FFEE".to_string()])
            .unwrap();

        let text = std::fs::read_to_string(dir.path().join("public.key")).unwrap();
        assert_eq!(text, "010001\nC0FFEE\n");
        assert_eq!(store.read(Slot::PublicKey).unwrap(), vec!["010001", "C0FFEE"]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path()).unwrap();

        let err = store.read(Slot::Message).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("message.txt"));
    }

    #[test]
    fn test_crlf_lines_accepted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("client.sig"), "AB\r\nCD\r\n").unwrap();
        let store = FileStorage::new(dir.path()).unwrap();

        let lines = read_record(&store, Slot::ClientSignature, 2).unwrap();
        assert_eq!(lines, vec!["AB", "CD"]);
    }

    #[test]
    fn test_read_record_line_count() {
        let store = MemoryStorage::new()
            .with(Slot::Message, &["AB", ""])
            .with(Slot::ClientSignature, &["AB"])
            .with(Slot::ClientKeys, &["01", "02", "03"]);

        assert_eq!(read_record(&store, Slot::Message, 1).unwrap(), vec!["AB"]);

        let err = read_record(&store, Slot::ClientSignature, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = read_record(&store, Slot::ClientKeys, 2).unwrap_err();
        assert_eq!(err.to_string(), "Wrong 'client_card.key' file format.");
    }
}
