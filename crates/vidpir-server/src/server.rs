//! Share server: owns the store and the mask session

use rand::Rng;
use vidpir_core::{ItemId, PirConfig, QueryVector, Session, ShareStore};

use crate::combiner::MaskedCombiner;
use crate::error::Result;
use crate::response::ServerResponse;

/// Serves one query at a time over a pair of share collections
pub struct ShareServer {
    store: ShareStore,
    session: Session,
}

impl ShareServer {
    pub fn new(store: ShareStore, session: Session) -> Self {
        Self { store, session }
    }

    /// Item catalog in index order
    ///
    /// The catalog is public: the client needs the item count to build its
    /// query vector.
    pub fn catalog(&self) -> Result<Vec<ItemId>> {
        let items = self.store.enumerate()?;
        tracing::info!(
            share = %self.store.share_dir(vidpir_core::Share::A).display(),
            items = items.len(),
            "Enumerated share database"
        );
        Ok(items)
    }

    /// Answer a query vector
    pub fn respond<R: Rng + ?Sized>(&self, query: &QueryVector, rng: &mut R) -> Result<ServerResponse> {
        MaskedCombiner::new(&self.store, &self.session).process(query, rng)
    }

    pub fn store(&self) -> &ShareStore {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// Builder for ShareServer
pub struct ServerBuilder {
    config: PirConfig,
    session: Option<Session>,
}

impl ServerBuilder {
    pub fn new(config: PirConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Use an explicit session instead of the one the config describes
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn build(self) -> Result<ShareServer> {
        self.config.validate()?;
        let store = self.config.open_store()?;
        let session = self.session.unwrap_or_else(|| self.config.session());
        Ok(ShareServer::new(store, session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;
    use tempfile::tempdir;
    use vidpir_core::{build_query, Error};

    use crate::ServerError;

    #[test]
    fn test_build_requires_share_dirs() {
        let dir = tempdir().unwrap();
        let result = ServerBuilder::new(PirConfig::from_base_dir(dir.path())).build();
        assert!(matches!(result, Err(ServerError::Core(Error::DirectoryMissing(_)))));
    }

    #[test]
    fn test_catalog_and_respond() {
        let dir = tempdir().unwrap();
        for share in ["D0", "D1"] {
            std::fs::create_dir(dir.path().join(share)).unwrap();
            std::fs::write(dir.path().join(share).join("b.binary.txt"), "1100").unwrap();
            std::fs::write(dir.path().join(share).join("a.binary.txt"), "10").unwrap();
        }

        let server = ServerBuilder::new(PirConfig::from_base_dir(dir.path()))
            .build()
            .unwrap();
        let catalog = server.catalog().unwrap();
        assert_eq!(catalog, vec![ItemId::new("a"), ItemId::new("b")]);

        let query = build_query(1, catalog.len()).unwrap();
        let response = server
            .respond(&query, &mut ChaCha12Rng::seed_from_u64(9))
            .unwrap();
        assert_eq!(response.item(), Some(&ItemId::new("b")));
        assert_eq!(response.len(), 4);
        assert!(server.session().has_masks());
    }
}
