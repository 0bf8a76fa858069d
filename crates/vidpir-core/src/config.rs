//! Retrieval configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{BITS_OUTPUT, DEFAULT_CHUNK_BITS, MEDIA_OUTPUT, SHARE_A_DIR, SHARE_B_DIR};
use crate::{Error, Session, ShareStore};

/// Protocol version constant
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// How the client turns a server response into the item's bits
///
/// The combination `(A*r1 + B*r2) mod 2` cannot be inverted from the masks
/// alone, so each mode states where the final bits come from:
/// - `Canonical`: the item as stored in ShareA (D0). Matches share layouts
///   where D0 holds the plain item.
/// - `XorShares`: `A XOR B`. When masks are present the client also
///   recomputes the server's combination and rejects a response that
///   disagrees. Matches layouts produced by `share-builder split`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionMode {
    #[default]
    Canonical,
    XorShares,
}

impl fmt::Display for ReconstructionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconstructionMode::Canonical => write!(f, "canonical"),
            ReconstructionMode::XorShares => write!(f, "xor_shares"),
        }
    }
}

impl FromStr for ReconstructionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "canonical" => Ok(ReconstructionMode::Canonical),
            "xor_shares" | "xor" => Ok(ReconstructionMode::XorShares),
            other => Err(Error::InvalidConfig(format!(
                "unknown reconstruction mode '{}'",
                other
            ))),
        }
    }
}

/// Configuration for one retrieval run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PirConfig {
    /// ShareA directory (D0), drives enumeration
    pub share_a_dir: PathBuf,
    /// ShareB directory (D1)
    pub share_b_dir: PathBuf,
    /// Directory for the mask artifacts
    pub session_dir: PathBuf,
    /// Request id for a tagged session; `None` uses the single slot
    #[serde(default)]
    pub request_id: Option<String>,
    /// Intermediate bit-text output
    pub bits_output: PathBuf,
    /// Binary media output
    pub media_output: PathBuf,
    /// Whether to write the intermediate bit-text output
    #[serde(default = "default_true")]
    pub write_bit_text: bool,
    /// Bits per codec chunk (non-zero multiple of 8)
    #[serde(default = "default_chunk_bits")]
    pub chunk_bits: usize,
    /// Reconstruction mode
    #[serde(default)]
    pub mode: ReconstructionMode,
    /// Protocol version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_true() -> bool {
    true
}

fn default_chunk_bits() -> usize {
    DEFAULT_CHUNK_BITS
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl PirConfig {
    /// Create a configuration rooted at a base directory
    ///
    /// Expects the following structure:
    /// ```text
    /// base_dir/
    ///   D0/<item>.binary.txt
    ///   D1/<item>.binary.txt
    /// ```
    /// Masks and outputs are written into `base_dir` itself.
    pub fn from_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base = base_dir.into();

        Self {
            share_a_dir: base.join(SHARE_A_DIR),
            share_b_dir: base.join(SHARE_B_DIR),
            session_dir: base.clone(),
            request_id: None,
            bits_output: base.join(BITS_OUTPUT),
            media_output: base.join(MEDIA_OUTPUT),
            write_bit_text: true,
            chunk_bits: DEFAULT_CHUNK_BITS,
            mode: ReconstructionMode::default(),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn with_mode(mut self, mode: ReconstructionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_chunk_bits(mut self, chunk_bits: usize) -> Self {
        self.chunk_bits = chunk_bits;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_outputs(mut self, bits: impl Into<PathBuf>, media: impl Into<PathBuf>) -> Self {
        self.bits_output = bits.into();
        self.media_output = media.into();
        self
    }

    pub fn with_bit_text(mut self, enabled: bool) -> Self {
        self.write_bit_text = enabled;
        self
    }

    /// Check the values that cannot be expressed in the types
    pub fn validate(&self) -> crate::Result<()> {
        if self.chunk_bits == 0 || self.chunk_bits % 8 != 0 {
            return Err(Error::InvalidConfig(format!(
                "chunk_bits must be a non-zero multiple of 8, got {}",
                self.chunk_bits
            )));
        }
        if self.version != PROTOCOL_VERSION {
            return Err(Error::InvalidConfig(format!(
                "protocol version {} is not supported (expected {})",
                self.version, PROTOCOL_VERSION
            )));
        }
        Ok(())
    }

    /// Open the share store described by this configuration
    pub fn open_store(&self) -> crate::Result<ShareStore> {
        Ok(ShareStore::open(&self.share_a_dir, &self.share_b_dir)?.with_chunk_bits(self.chunk_bits))
    }

    /// Session for the mask artifacts
    pub fn session(&self) -> Session {
        let session = match &self.request_id {
            Some(id) => Session::tagged(&self.session_dir, id.clone()),
            None => Session::single_slot(&self.session_dir),
        };
        session.with_chunk_bits(self.chunk_bits)
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

impl Default for PirConfig {
    fn default() -> Self {
        Self::from_base_dir(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_from_base_dir() {
        let config = PirConfig::from_base_dir("/data/pir");
        assert_eq!(config.share_a_dir, PathBuf::from("/data/pir/D0"));
        assert_eq!(config.share_b_dir, PathBuf::from("/data/pir/D1"));
        assert_eq!(config.media_output, PathBuf::from("/data/pir/reconstructed_video.mp4"));
        assert_eq!(config.mode, ReconstructionMode::Canonical);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chunk_bits_validation() {
        assert!(PirConfig::default().with_chunk_bits(0).validate().is_err());
        assert!(PirConfig::default().with_chunk_bits(12).validate().is_err());
        assert!(PirConfig::default().with_chunk_bits(64).validate().is_ok());
    }

    #[test]
    fn test_session_selection() {
        let single = PirConfig::from_base_dir("/data/pir").session();
        assert_eq!(single.r1_path(), PathBuf::from("/data/pir/r1.txt"));

        let tagged = PirConfig::from_base_dir("/data/pir")
            .with_request_id("42")
            .session();
        assert_eq!(tagged.r2_path(), PathBuf::from("/data/pir/r2-42.txt"));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("canonical".parse::<ReconstructionMode>().unwrap(), ReconstructionMode::Canonical);
        assert_eq!("xor".parse::<ReconstructionMode>().unwrap(), ReconstructionMode::XorShares);
        assert!("sum".parse::<ReconstructionMode>().is_err());
        assert_eq!(
            serde_json::to_string(&ReconstructionMode::XorShares).unwrap(),
            "\"xor_shares\""
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = PirConfig::from_base_dir(dir.path())
            .with_mode(ReconstructionMode::XorShares)
            .with_chunk_bits(8 * 1024);
        config.save(&path).unwrap();

        let loaded = PirConfig::load(&path).unwrap();
        assert_eq!(loaded.mode, ReconstructionMode::XorShares);
        assert_eq!(loaded.chunk_bits, 8 * 1024);
        assert_eq!(loaded.share_a_dir, config.share_a_dir);
    }

    #[test]
    fn test_load_applies_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "share_a_dir": "D0",
                "share_b_dir": "D1",
                "session_dir": ".",
                "bits_output": "out.bits",
                "media_output": "out.mp4"
            }"#,
        )
        .unwrap();

        let config = PirConfig::load(&path).unwrap();
        assert!(config.write_bit_text);
        assert_eq!(config.chunk_bits, DEFAULT_CHUNK_BITS);
        assert_eq!(config.version, PROTOCOL_VERSION);
    }
}
