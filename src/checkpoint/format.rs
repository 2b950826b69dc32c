//! Binary checkpoint file format.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (64 bytes, fixed)             │
//! │  magic: [u8; 8] = b"PWCHKPT\0"      │
//! │  version: u32                        │
//! │  uid_validity: Option<u32>           │
//! │  uid_count: u64                      │
//! │  sha256_payload: [u8; 32]            │
//! │  (padding to 64 bytes)               │
//! ├──────────────────────────────────────┤
//! │ PAYLOAD (variable)                   │
//! │  bincode-serialized Vec<u32>, sorted │
//! └──────────────────────────────────────┘
//! ```

/// Magic bytes identifying a paperwatch checkpoint file.
pub const MAGIC: &[u8; 8] = b"PWCHKPT\0";

/// Current checkpoint format version.
pub const VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 64;

/// Serializable checkpoint header.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CheckpointHeader {
    /// Magic bytes (must equal [`MAGIC`]).
    pub magic: [u8; 8],
    /// Format version (must equal [`VERSION`]).
    pub version: u32,
    /// UIDVALIDITY of the mailbox the UIDs belong to.
    pub uid_validity: Option<u32>,
    /// Number of UIDs in the payload.
    pub uid_count: u64,
    /// SHA-256 of the payload bytes.
    pub sha256_payload: [u8; 32],
}

impl CheckpointHeader {
    /// Validate that the header is well-formed and matches the current format.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.magic != *MAGIC {
            return Err("Invalid magic bytes".into());
        }
        if self.version != VERSION {
            return Err(format!(
                "Incompatible version: expected {VERSION}, found {}",
                self.version
            ));
        }
        Ok(())
    }
}
