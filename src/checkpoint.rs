use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::errors::{ModelError, Result};
use crate::model::LstmLanguageModel;
use crate::param::{ParameterSet, Parameterized};

/// Current checkpoint format version
/// Increment this when making breaking changes to the serialization format
const CHECKPOINT_VERSION: u32 = 1;

/// On-disk encoding, chosen from the checkpoint path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// `.json`: human-readable, larger
    Json,
    /// anything else: compact bincode
    Binary,
}

impl CheckpointFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => CheckpointFormat::Json,
            _ => CheckpointFormat::Binary,
        }
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            CheckpointFormat::Json => serde_json::to_vec(value).map_err(|e| ModelError::Serialization {
                source: Box::new(e),
            }),
            CheckpointFormat::Binary => bincode::serde::encode_to_vec(value, bincode::config::standard())
                .map_err(|e| ModelError::Serialization { source: Box::new(e) }),
        }
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            CheckpointFormat::Json => serde_json::from_slice(bytes).map_err(|e| ModelError::Serialization {
                source: Box::new(e),
            }),
            CheckpointFormat::Binary => {
                let (value, _): (T, usize) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                    .map_err(|e| ModelError::Serialization { source: Box::new(e) })?;
                Ok(value)
            }
        }
    }
}

/// Metadata about the saved model
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CheckpointMetadata {
    /// Timestamp when the checkpoint was written (RFC 3339)
    pub saved_at: String,
    pub vocab_size: usize,
    pub hidden_dim: usize,
    pub num_layers: usize,
    pub num_parameters: usize,
}

/// Versioned parameter snapshot with integrity checking
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Checkpoint {
    pub version: u32,
    /// SHA256 of `data` (hex)
    pub checksum: String,
    pub metadata: CheckpointMetadata,
    /// Encoded [`ParameterSet`], in the same format as the envelope
    pub data: Vec<u8>,
}

impl Checkpoint {
    pub fn from_model(model: &LstmLanguageModel, format: CheckpointFormat) -> Result<Self> {
        let data = format.encode(&model.to_parameter_set())?;
        let checksum = sha256_hex(&data);

        Ok(Checkpoint {
            version: CHECKPOINT_VERSION,
            checksum,
            metadata: CheckpointMetadata {
                saved_at: chrono::Utc::now().to_rfc3339(),
                vocab_size: model.vocab_size(),
                hidden_dim: model.hidden_dim(),
                num_layers: model.num_layers(),
                num_parameters: model.num_parameters(),
            },
            data,
        })
    }

    pub fn validate_checksum(&self) -> Result<()> {
        let computed = sha256_hex(&self.data);
        if computed != self.checksum {
            return Err(ModelError::Checkpoint {
                message: format!("checksum mismatch: expected {}, got {}", self.checksum, computed),
            });
        }
        Ok(())
    }

    pub fn validate_version(&self) -> Result<()> {
        if self.version > CHECKPOINT_VERSION {
            return Err(ModelError::Checkpoint {
                message: format!(
                    "checkpoint version {} is newer than supported version {}",
                    self.version, CHECKPOINT_VERSION
                ),
            });
        }
        if self.version < CHECKPOINT_VERSION {
            tracing::warn!(
                version = self.version,
                current = CHECKPOINT_VERSION,
                "Loading checkpoint written by an older format version"
            );
        }
        Ok(())
    }

    /// Validates the envelope and decodes the parameter payload.
    pub fn parameter_set(&self, format: CheckpointFormat) -> Result<ParameterSet> {
        self.validate_version()?;
        self.validate_checksum()?;
        format.decode(&self.data)
    }

    pub fn to_bytes(&self, format: CheckpointFormat) -> Result<Vec<u8>> {
        format.encode(self)
    }

    pub fn from_bytes(bytes: &[u8], format: CheckpointFormat) -> Result<Self> {
        format.decode(bytes)
    }
}

/// A fully written checkpoint that has not yet replaced the destination.
///
/// Dropping it without calling [`commit`](StagedCheckpoint::commit) deletes
/// the temporary file and leaves the destination untouched.
#[derive(Debug)]
pub struct StagedCheckpoint {
    temp: NamedTempFile,
    destination: PathBuf,
    checksum: String,
}

impl StagedCheckpoint {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Atomically renames the temporary file over the destination.
    pub fn commit(self) -> Result<()> {
        let StagedCheckpoint {
            temp,
            destination,
            checksum,
        } = self;
        temp.persist(&destination).map_err(|e| ModelError::from(e.error))?;
        tracing::info!(
            path = %destination.display(),
            version = CHECKPOINT_VERSION,
            checksum = &checksum[..16],
            "Checkpoint saved"
        );
        Ok(())
    }
}

/// Serializes the model into a uniquely named temporary file beside `path`
/// and flushes it to disk.
pub fn stage(model: &LstmLanguageModel, path: impl AsRef<Path>) -> Result<StagedCheckpoint> {
    let destination = path.as_ref().to_path_buf();
    let format = CheckpointFormat::from_path(&destination);
    let checkpoint = Checkpoint::from_model(model, format)?;
    let bytes = checkpoint.to_bytes(format)?;

    // same directory as the destination, so the final rename never crosses filesystems
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".checkpoint-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;

    Ok(StagedCheckpoint {
        temp,
        destination,
        checksum: checkpoint.checksum,
    })
}

/// Writes the model's parameters to `path`; the file at `path` is either the
/// previous checkpoint or the complete new one at every instant.
pub fn save(model: &LstmLanguageModel, path: impl AsRef<Path>) -> Result<()> {
    stage(model, path)?.commit()
}

/// Loads parameters from `path` into `model` in place.
///
/// Returns `Ok(false)` when no file exists, which callers treat as "start
/// from fresh initialisation".
pub fn load(model: &mut LstmLanguageModel, path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if !path.is_file() {
        return Ok(false);
    }

    let format = CheckpointFormat::from_path(path);
    let bytes = fs::read(path)?;
    let checkpoint = Checkpoint::from_bytes(&bytes, format)?;

    tracing::info!(
        path = %path.display(),
        version = checkpoint.version,
        checksum = checkpoint.checksum.get(..16).unwrap_or(&checkpoint.checksum),
        "Loading checkpoint saved at {}",
        checkpoint.metadata.saved_at
    );

    let parameters = checkpoint.parameter_set(format)?;
    model.load_parameter_set(&parameters)?;
    Ok(true)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
