//! Write-Ahead Log (WAL) implementation
//!
//! Every committed change to a `plocal:` database is appended here as a
//! length-prefixed, checksummed bincode record. Replaying the log in order
//! rebuilds the store with the same vertex and edge ids.
//!
//! [`Wal::compact`] rewrites the log as a single snapshot that starts with a
//! [`WalEntry::Checkpoint`]. Replay discards everything before a checkpoint,
//! so a crash between writing the snapshot and deleting the old files is
//! harmless.

use crate::graph::{Edge, EdgeType, Label, Node, PropertyType};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// WAL errors
#[derive(Error, Debug)]
pub enum WalError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Corruption detected
    #[error("WAL corruption detected at sequence {0}")]
    Corruption(u64),

    /// A replayed entry could not be applied to the store
    #[error("Cannot apply WAL entry: {0}")]
    Apply(#[from] crate::graph::GraphError),
}

pub type WalResult<T> = Result<T, WalError>;

/// Write-Ahead Log entry types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalEntry {
    CreateVertexType { label: Label },
    CreateEdgeType { edge_type: EdgeType },
    DropVertexType { label: Label },
    DropEdgeType { edge_type: EdgeType },
    CreateProperty {
        class: String,
        name: String,
        ty: PropertyType,
    },
    CreateUniqueIndex { label: Label, property: String },
    /// Vertex with the id the store assigned
    CreateNode(Node),
    /// Edge with the id the store assigned
    CreateEdge(Edge),
    /// Start of a snapshot: state before this point is superseded
    Checkpoint { next_node_id: u64, next_edge_id: u64 },
}

/// WAL record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalRecord {
    /// Sequence number (monotonically increasing)
    sequence: u64,
    /// Entry data
    entry: WalEntry,
    checksum: u32,
}

impl WalRecord {
    fn new(sequence: u64, entry: WalEntry) -> Self {
        let mut record = Self {
            sequence,
            entry,
            checksum: 0,
        };
        record.checksum = record.calculate_checksum();
        record
    }

    fn calculate_checksum(&self) -> u32 {
        let bytes = bincode::serialize(&self.entry).unwrap_or_default();
        bytes
            .iter()
            .fold(self.sequence as u32, |acc, &b| acc.rotate_left(5) ^ (b as u32))
    }

    fn verify_checksum(&self) -> bool {
        self.checksum == self.calculate_checksum()
    }
}

/// Write-Ahead Log manager
pub struct Wal {
    /// Path to WAL directory
    path: PathBuf,
    /// Current WAL file
    current_file: Option<BufWriter<File>>,
    /// Last sequence number written or replayed
    sequence: u64,
}

impl Wal {
    /// Open the WAL in `path`, creating the directory if needed.
    ///
    /// The sequence counter starts at zero; call [`Wal::replay`] before
    /// appending to an existing log.
    pub fn open(path: impl AsRef<Path>) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        info!("Opening WAL at {:?}", path);

        Ok(Self {
            path,
            current_file: None,
            sequence: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Append an entry to the WAL, returning its sequence number
    pub fn append(&mut self, entry: WalEntry) -> WalResult<u64> {
        self.sequence += 1;
        let sequence = self.sequence;

        let record = WalRecord::new(sequence, entry);
        let data = bincode::serialize(&record)?;

        if self.current_file.is_none() {
            self.open_new_file(sequence)?;
        }

        if let Some(ref mut file) = self.current_file {
            // Length prefix (4 bytes)
            file.write_all(&(data.len() as u32).to_le_bytes())?;
            file.write_all(&data)?;
        }

        Ok(sequence)
    }

    /// Force flush the WAL
    pub fn flush(&mut self) -> WalResult<()> {
        if let Some(ref mut file) = self.current_file {
            file.flush()?;
        }
        Ok(())
    }

    /// Replay every record in sequence order, handing each entry to
    /// `callback`. Returns the number of entries replayed and leaves the
    /// sequence counter at the last one.
    ///
    /// A record cut short at the end of a file (a torn write) ends that file
    /// with a warning; a checksum mismatch is an error.
    pub fn replay<F>(&mut self, mut callback: F) -> WalResult<u64>
    where
        F: FnMut(WalEntry) -> WalResult<()>,
    {
        let files = self.get_wal_files()?;
        let mut replayed = 0u64;

        for file_path in files {
            debug!("Replaying WAL file: {:?}", file_path);
            let mut reader = BufReader::new(File::open(&file_path)?);
            let mut buf = Vec::new();

            loop {
                let mut len_bytes = [0u8; 4];
                match reader.read_exact(&mut len_bytes) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e.into()),
                }

                let len = u32::from_le_bytes(len_bytes) as usize;
                buf.resize(len, 0);
                match reader.read_exact(&mut buf) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        warn!("Truncated WAL record at end of {:?}, ignoring it", file_path);
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }

                let record: WalRecord = bincode::deserialize(&buf)?;
                if !record.verify_checksum() {
                    warn!("WAL corruption detected at sequence {}", record.sequence);
                    return Err(WalError::Corruption(record.sequence));
                }

                self.sequence = self.sequence.max(record.sequence);
                callback(record.entry)?;
                replayed += 1;
            }
        }

        info!("Replayed {} WAL entries, last sequence: {}", replayed, self.sequence);
        Ok(replayed)
    }

    /// Replace the whole log with `snapshot`, which must start with a
    /// [`WalEntry::Checkpoint`]. The snapshot goes to a fresh file that is
    /// synced before the older files are deleted.
    pub fn compact<I>(&mut self, snapshot: I) -> WalResult<u64>
    where
        I: IntoIterator<Item = WalEntry>,
    {
        self.flush()?;
        self.current_file = None;
        let superseded = self.get_wal_files()?;

        let mut written = 0u64;
        for entry in snapshot {
            self.append(entry)?;
            written += 1;
        }
        if let Some(ref mut file) = self.current_file {
            file.flush()?;
            file.get_ref().sync_all()?;
        }

        for path in &superseded {
            std::fs::remove_file(path)?;
        }
        info!(
            "Compacted WAL into {} entries, removed {} files",
            written,
            superseded.len()
        );
        Ok(written)
    }

    /// Open a new WAL file named after the first sequence it holds
    fn open_new_file(&mut self, first_sequence: u64) -> WalResult<()> {
        let filename = format!("wal-{:016x}.log", first_sequence);
        let file_path = self.path.join(filename);

        debug!("Opening new WAL file: {:?}", file_path);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        self.current_file = Some(BufWriter::new(file));
        Ok(())
    }

    /// Get all WAL files in sequence order
    fn get_wal_files(&self) -> WalResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(&self.path)?.flatten() {
            if let Some(filename) = entry.file_name().to_str() {
                if filename.starts_with("wal-") && filename.ends_with(".log") {
                    files.push(entry.path());
                }
            }
        }

        // Fixed-width hex names sort in sequence order
        files.sort();
        Ok(files)
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush WAL on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{property_map, NodeId};
    use tempfile::TempDir;

    fn genre_entry(id: u64, name: &str) -> WalEntry {
        WalEntry::CreateNode(Node::new(
            NodeId::new(id),
            "Genre",
            property_map([("name", name.into())]),
        ))
    }

    #[test]
    fn test_wal_append() {
        let temp_dir = TempDir::new().unwrap();
        let mut wal = Wal::open(temp_dir.path()).unwrap();
        assert_eq!(wal.sequence(), 0);

        let seq = wal
            .append(WalEntry::CreateVertexType { label: Label::new("Genre") })
            .unwrap();
        assert_eq!(seq, 1);
        assert_eq!(wal.append(genre_entry(1, "Drama")).unwrap(), 2);
        wal.flush().unwrap();
    }

    #[test]
    fn test_wal_replay_in_order() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut wal = Wal::open(temp_dir.path()).unwrap();
            for (i, name) in ["Action", "Comedy", "Drama"].iter().enumerate() {
                wal.append(genre_entry(i as u64 + 1, name)).unwrap();
            }
        }

        let mut wal = Wal::open(temp_dir.path()).unwrap();
        let mut seen = Vec::new();
        let replayed = wal
            .replay(|entry| {
                seen.push(entry);
                Ok(())
            })
            .unwrap();

        assert_eq!(replayed, 3);
        assert_eq!(wal.sequence(), 3);
        assert_eq!(seen[0], genre_entry(1, "Action"));
        assert_eq!(seen[2], genre_entry(3, "Drama"));
    }

    #[test]
    fn test_append_after_replay_continues_sequence() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut wal = Wal::open(temp_dir.path()).unwrap();
            wal.append(genre_entry(1, "Action")).unwrap();
            wal.append(genre_entry(2, "Comedy")).unwrap();
        }
        {
            let mut wal = Wal::open(temp_dir.path()).unwrap();
            wal.replay(|_| Ok(())).unwrap();
            assert_eq!(wal.append(genre_entry(3, "Drama")).unwrap(), 3);
        }

        let mut wal = Wal::open(temp_dir.path()).unwrap();
        let mut count = 0;
        wal.replay(|_| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 3);
        assert_eq!(wal.get_wal_files().unwrap().len(), 2);
    }

    #[test]
    fn test_truncated_tail_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut wal = Wal::open(temp_dir.path()).unwrap();
            wal.append(genre_entry(1, "Action")).unwrap();
        }

        // Simulate a torn write: a length prefix with half a record behind it
        let file_path = temp_dir.path().join(format!("wal-{:016x}.log", 1));
        let mut file = OpenOptions::new().append(true).open(file_path).unwrap();
        file.write_all(&64u32.to_le_bytes()).unwrap();
        file.write_all(&[0u8; 10]).unwrap();
        drop(file);

        let mut wal = Wal::open(temp_dir.path()).unwrap();
        assert_eq!(wal.replay(|_| Ok(())).unwrap(), 1);
    }

    #[test]
    fn test_compact_replaces_old_files() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut wal = Wal::open(temp_dir.path()).unwrap();
            wal.append(genre_entry(1, "Action")).unwrap();
            wal.append(genre_entry(2, "Comedy")).unwrap();
        }
        {
            let mut wal = Wal::open(temp_dir.path()).unwrap();
            wal.replay(|_| Ok(())).unwrap();
            wal.append(genre_entry(3, "Drama")).unwrap();

            let snapshot = vec![
                WalEntry::Checkpoint { next_node_id: 4, next_edge_id: 1 },
                genre_entry(3, "Drama"),
            ];
            assert_eq!(wal.compact(snapshot).unwrap(), 2);
            assert_eq!(wal.sequence(), 5);
            assert_eq!(wal.get_wal_files().unwrap().len(), 1);
        }

        let mut wal = Wal::open(temp_dir.path()).unwrap();
        let mut seen = Vec::new();
        wal.replay(|entry| {
            seen.push(entry);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], genre_entry(3, "Drama"));
        assert_eq!(wal.sequence(), 5);
    }

    #[test]
    fn test_replay_stops_on_callback_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut wal = Wal::open(temp_dir.path()).unwrap();
        wal.append(genre_entry(1, "Action")).unwrap();
        wal.flush().unwrap();

        let result = wal.replay(|_| {
            Err(WalError::Apply(crate::graph::GraphError::TypeNotFound(
                "Genre".to_string(),
            )))
        });
        assert!(matches!(result, Err(WalError::Apply(_))));
    }
}
