//! Checkpoint persistence: load with validation, atomic save.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::format::{CheckpointHeader, HEADER_SIZE, MAGIC, VERSION};
use super::{Checkpoint, Uid};
use crate::error::{Result, WatchError};

/// Reads and writes the checkpoint file at a fixed path.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint, or an empty one if the file is missing or invalid.
    ///
    /// Never fails: an unusable file only means some messages may be
    /// processed again.
    pub fn load(&self) -> Checkpoint {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No checkpoint file, starting fresh");
            return Checkpoint::new();
        }
        match self.read() {
            Ok(checkpoint) => {
                info!(
                    path = %self.path.display(),
                    count = checkpoint.len(),
                    "Loaded checkpoint"
                );
                checkpoint
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable checkpoint, starting fresh");
                Checkpoint::new()
            }
        }
    }

    /// Replace the checkpoint file with `checkpoint`.
    ///
    /// The data goes to a temporary file in the same directory which is then
    /// renamed over the old file.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let bytes = encode(checkpoint).map_err(|reason| self.invalid(reason))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| WatchError::io(dir, e))?;
        tmp.write_all(&bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| WatchError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| WatchError::io(&self.path, e.error))?;

        debug!(
            path = %self.path.display(),
            count = checkpoint.len(),
            "Checkpoint saved"
        );
        Ok(())
    }

    fn read(&self) -> Result<Checkpoint> {
        let data = std::fs::read(&self.path).map_err(|e| WatchError::io(&self.path, e))?;
        decode(&data).map_err(|reason| self.invalid(reason))
    }

    fn invalid(&self, reason: String) -> WatchError {
        WatchError::InvalidCheckpoint {
            path: self.path.clone(),
            reason,
        }
    }
}

fn encode(checkpoint: &Checkpoint) -> std::result::Result<Vec<u8>, String> {
    let uids: Vec<Uid> = checkpoint.uids().collect();
    let payload =
        bincode::serialize(&uids).map_err(|e| format!("Payload serialization failed: {e}"))?;

    let header = CheckpointHeader {
        magic: *MAGIC,
        version: VERSION,
        uid_validity: checkpoint.uid_validity(),
        uid_count: uids.len() as u64,
        sha256_payload: Sha256::digest(&payload).into(),
    };
    let header_bytes =
        bincode::serialize(&header).map_err(|e| format!("Header serialization failed: {e}"))?;

    let mut out = vec![0u8; HEADER_SIZE];
    let copy_len = header_bytes.len().min(HEADER_SIZE);
    out[..copy_len].copy_from_slice(&header_bytes[..copy_len]);
    out.extend_from_slice(&payload);
    Ok(out)
}

fn decode(data: &[u8]) -> std::result::Result<Checkpoint, String> {
    if data.len() < HEADER_SIZE {
        return Err("File too small".into());
    }

    let header: CheckpointHeader = bincode::deserialize(&data[..HEADER_SIZE])
        .map_err(|e| format!("Header deserialization failed: {e}"))?;
    header.validate()?;

    let payload = &data[HEADER_SIZE..];
    let digest: [u8; 32] = Sha256::digest(payload).into();
    if digest != header.sha256_payload {
        return Err("Payload checksum mismatch".into());
    }

    let uids: Vec<Uid> = bincode::deserialize(payload)
        .map_err(|e| format!("Payload deserialization failed: {e}"))?;
    if uids.len() as u64 != header.uid_count {
        return Err(format!(
            "UID count mismatch: header says {}, payload has {}",
            header.uid_count,
            uids.len()
        ));
    }

    Ok(Checkpoint::from_parts(
        header.uid_validity,
        uids.into_iter().collect::<BTreeSet<_>>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Checkpoint {
        Checkpoint::from_parts(Some(7), [10, 11, 40].into_iter().collect())
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path().join("last_check.bin"));
        store.save(&sample()).unwrap();
        assert!(store.path().exists());
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn test_save_replaces_previous() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path().join("last_check.bin"));
        store.save(&sample()).unwrap();

        let mut bigger = sample();
        bigger.record([99]);
        store.save(&bigger).unwrap();
        assert_eq!(store.load(), bigger);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path().join("nope.bin"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_truncated_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("last_check.bin");
        std::fs::write(&path, b"PWCHKPT").unwrap();
        assert!(CheckpointStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_corrupt_payload_is_rejected() {
        let mut bytes = encode(&sample()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = decode(&bytes).unwrap_err();
        assert!(err.contains("checksum"), "{err}");
    }

    #[test]
    fn test_foreign_file_is_rejected() {
        let mut bytes = vec![0u8; HEADER_SIZE + 8];
        bytes[..8].copy_from_slice(b"NOTMINE!");
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_save_into_missing_dir_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path().join("no/such/dir/cp.bin"));
        assert!(store.save(&sample()).is_err());
    }
}
