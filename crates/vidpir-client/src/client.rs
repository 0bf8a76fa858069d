//! Retrieval pipeline
//!
//! One retrieval runs the phases in order: enumerate the catalog, build the
//! query vector, let the server combine, reconstruct, write the outputs.
//! Every failure comes back labelled with the phase it happened in.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use rand::Rng;
use vidpir_core::{build_query, ItemId, PirConfig, Session};
use vidpir_server::{ServerBuilder, ShareServer};

use crate::error::{ClientError, PhaseError, Result};
use crate::reconstructor::{OutputFiles, ReconstructionPath, Reconstructor};

/// Phases of a retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Query,
    Server,
    Reconstruct,
    Output,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => write!(f, "setup"),
            Phase::Query => write!(f, "query"),
            Phase::Server => write!(f, "server"),
            Phase::Reconstruct => write!(f, "reconstruct"),
            Phase::Output => write!(f, "output"),
        }
    }
}

/// Parse a user-supplied index
pub fn parse_index(raw: &str) -> Result<usize> {
    let raw = raw.trim();
    raw.parse()
        .map_err(|_| ClientError::InvalidInput(format!("'{}' is not a valid index", raw)))
}

/// What a successful retrieval produced
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub item: ItemId,
    pub bits_len: u64,
    /// Intermediate bit-text file, if one was written
    pub bits_path: Option<PathBuf>,
    pub media_path: PathBuf,
    pub media_bytes: u64,
    pub path: ReconstructionPath,
    /// The server could not persist its masks and returned the raw share
    pub server_fallback: bool,
}

/// Client driving a local share server
pub struct PirClient {
    config: PirConfig,
    server: ShareServer,
}

impl PirClient {
    pub fn new(config: PirConfig, server: ShareServer) -> Self {
        Self { config, server }
    }

    pub fn config(&self) -> &PirConfig {
        &self.config
    }

    pub fn server(&self) -> &ShareServer {
        &self.server
    }

    /// Item catalog in index order
    pub fn catalog(&self) -> Result<Vec<ItemId>> {
        Ok(self.server.catalog()?)
    }

    /// Retrieve item `index` and write it out
    pub fn retrieve<R: Rng + ?Sized>(
        &self,
        index: usize,
        rng: &mut R,
    ) -> std::result::Result<RetrievalOutcome, PhaseError> {
        let total = Instant::now();

        let start = Instant::now();
        let catalog = self
            .server
            .catalog()
            .map_err(|e| PhaseError::new(Phase::Setup, e))?;
        if catalog.is_empty() {
            return Err(PhaseError::new(
                Phase::Setup,
                vidpir_core::Error::EmptyDatabase(self.config.share_a_dir.clone()),
            ));
        }
        tracing::info!(
            items = catalog.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Setup complete"
        );

        let start = Instant::now();
        let query = build_query(index, catalog.len()).map_err(|e| PhaseError::new(Phase::Query, e))?;
        tracing::info!(
            len = query.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query vector built"
        );

        let start = Instant::now();
        let response = self
            .server
            .respond(&query, rng)
            .map_err(|e| PhaseError::new(Phase::Server, e))?;
        tracing::info!(
            bits = response.len(),
            fallback = response.is_fallback(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Server responded"
        );

        let reconstructor = Reconstructor::new(self.server.store(), self.server.session(), self.config.mode);
        let reconstruction = reconstructor
            .reconstruct(&response, index)
            .map_err(|e| PhaseError::new(Phase::Reconstruct, e))?;

        let start = Instant::now();
        let written = reconstructor
            .write_outputs(&reconstruction, &self.output_files())
            .map_err(|e| PhaseError::new(Phase::Output, e))?;
        tracing::info!(
            media = %self.config.media_output.display(),
            bytes = written.media_bytes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Reconstructed media written"
        );

        tracing::info!(
            item = %reconstruction.item,
            total_ms = total.elapsed().as_millis() as u64,
            "Retrieval complete"
        );

        Ok(RetrievalOutcome {
            item: reconstruction.item,
            bits_len: reconstruction.bits_len,
            bits_path: written.bits_path,
            media_path: self.config.media_output.clone(),
            media_bytes: written.media_bytes,
            path: reconstruction.path,
            server_fallback: response.is_fallback(),
        })
    }

    fn output_files(&self) -> OutputFiles {
        OutputFiles {
            bits: self
                .config
                .write_bit_text
                .then(|| self.config.bits_output.clone()),
            media: self.config.media_output.clone(),
            chunk_bits: self.config.chunk_bits,
        }
    }
}

/// Builder for PirClient
pub struct ClientBuilder {
    config: PirConfig,
    session: Option<Session>,
}

impl ClientBuilder {
    pub fn new(config: PirConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Use an explicit mask session instead of the configured one
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn build(self) -> Result<PirClient> {
        let mut server = ServerBuilder::new(self.config.clone());
        if let Some(session) = self.session {
            server = server.session(session.with_chunk_bits(self.config.chunk_bits));
        }
        Ok(PirClient::new(self.config, server.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;
    use tempfile::{tempdir, TempDir};
    use vidpir_core::ReconstructionMode;

    fn setup(items: &[(&str, &str, &str)]) -> (TempDir, PirConfig) {
        let dir = tempdir().unwrap();
        for share in ["D0", "D1"] {
            std::fs::create_dir(dir.path().join(share)).unwrap();
        }
        for (name, a, b) in items {
            std::fs::write(dir.path().join("D0").join(format!("{}.binary.txt", name)), a).unwrap();
            std::fs::write(dir.path().join("D1").join(format!("{}.binary.txt", name)), b).unwrap();
        }
        let config = PirConfig::from_base_dir(dir.path()).with_chunk_bits(8);
        (dir, config)
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Setup.to_string(), "setup");
        assert_eq!(Phase::Reconstruct.to_string(), "reconstruct");
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index(" 2\n").unwrap(), 2);
        let err = parse_index("two").unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert!(err.is_graceful());
        assert!(parse_index("-1").is_err());
    }

    #[test]
    fn test_retrieve_writes_both_outputs() {
        let (_dir, config) = setup(&[("vidA", "1111", "0000"), ("vidB", "0100100001101001", "1")]);
        let client = ClientBuilder::new(config.clone()).build().unwrap();

        // vidB has mismatched share lengths
        let err = client.retrieve(1, &mut ChaCha12Rng::seed_from_u64(1)).unwrap_err();
        assert_eq!(err.phase, Phase::Server);
        assert!(!err.is_graceful());

        let outcome = client.retrieve(0, &mut ChaCha12Rng::seed_from_u64(1)).unwrap();
        assert_eq!(outcome.item, ItemId::new("vidA"));
        assert_eq!(outcome.bits_len, 4);
        assert_eq!(outcome.media_bytes, 1);
        assert_eq!(outcome.path, ReconstructionPath::Masked);
        assert!(!outcome.server_fallback);
        assert_eq!(outcome.bits_path.as_deref(), Some(config.bits_output.as_path()));
        assert_eq!(std::fs::read_to_string(&config.bits_output).unwrap(), "1111");
        assert_eq!(std::fs::read(&config.media_output).unwrap(), vec![0xf0]);
    }

    #[test]
    fn test_retrieve_without_bit_text() {
        let (_dir, config) = setup(&[("vidA", "0100100001101001", "0000000000000000")]);
        let config = config.with_bit_text(false);
        let client = ClientBuilder::new(config.clone()).build().unwrap();

        let outcome = client.retrieve(0, &mut ChaCha12Rng::seed_from_u64(2)).unwrap();
        assert!(outcome.bits_path.is_none());
        assert!(!config.bits_output.exists());
        assert_eq!(std::fs::read(&config.media_output).unwrap(), b"Hi".to_vec());
    }

    #[test]
    fn test_bit_text_failure_falls_back_to_direct_pack() {
        let (dir, config) = setup(&[("vidA", "01001000", "00000000")]);
        let media = dir.path().join("out.mp4");
        let config = config.with_outputs(dir.path().join("missing").join("out.bits"), &media);
        let client = ClientBuilder::new(config).build().unwrap();

        let outcome = client.retrieve(0, &mut ChaCha12Rng::seed_from_u64(3)).unwrap();
        assert!(outcome.bits_path.is_none());
        assert_eq!(std::fs::read(&media).unwrap(), b"H".to_vec());
    }

    #[test]
    fn test_invalid_index_is_graceful_and_writes_nothing() {
        let (_dir, config) = setup(&[("vidA", "1", "0"), ("vidB", "1", "0")]);
        let client = ClientBuilder::new(config.clone()).build().unwrap();

        let err = client.retrieve(2, &mut ChaCha12Rng::seed_from_u64(0)).unwrap_err();
        assert_eq!(err.phase, Phase::Query);
        assert!(err.is_graceful());
        assert!(!config.media_output.exists());
        assert!(!config.bits_output.exists());
    }

    #[test]
    fn test_empty_database_is_graceful() {
        let (_dir, config) = setup(&[]);
        let client = ClientBuilder::new(config).build().unwrap();

        let err = client.retrieve(0, &mut ChaCha12Rng::seed_from_u64(0)).unwrap_err();
        assert_eq!(err.phase, Phase::Setup);
        assert!(matches!(
            err.source,
            ClientError::Core(vidpir_core::Error::EmptyDatabase(_))
        ));
        assert!(err.is_graceful());
    }

    #[test]
    fn test_xor_mode_streams_in_small_chunks() {
        let a = "0110101101001011101101010010101100101";
        let b = "1010011100111000101011100101001011100";
        let (_dir, config) = setup(&[("vidA", a, b)]);
        let config = config.with_mode(ReconstructionMode::XorShares);
        let client = ClientBuilder::new(config.clone()).build().unwrap();

        let outcome = client.retrieve(0, &mut ChaCha12Rng::seed_from_u64(5)).unwrap();
        let expected = vidpir_core::BitSequence::from_text(a)
            .xor(&vidpir_core::BitSequence::from_text(b))
            .unwrap();
        assert_eq!(outcome.bits_len, 37);
        assert_eq!(outcome.media_bytes, 5);
        assert_eq!(std::fs::read_to_string(&config.bits_output).unwrap(), expected.to_text());
        assert_eq!(
            std::fs::read(&config.media_output).unwrap(),
            vidpir_core::codec::encode_bits(expected.as_slice())
        );
    }

    #[test]
    fn test_tagged_session_and_xor_mode() {
        let (dir, config) = setup(&[("vidA", "1100", "0101")]);
        let config = config.with_mode(ReconstructionMode::XorShares);
        let session = Session::tagged(dir.path(), "req-7");
        let client = ClientBuilder::new(config.clone())
            .session(session.clone())
            .build()
            .unwrap();

        let outcome = client.retrieve(0, &mut ChaCha12Rng::seed_from_u64(4)).unwrap();
        assert_eq!(outcome.path, ReconstructionPath::Masked);
        assert!(session.has_masks());
        assert!(!dir.path().join("r1.txt").exists());
        assert_eq!(std::fs::read_to_string(&config.bits_output).unwrap(), "1001");
    }
}
