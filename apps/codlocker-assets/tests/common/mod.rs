//! Test infrastructure for asset service integration tests.
//!
//! Provides a `TestApp` wrapper around `axum_test::TestServer` with helper methods
//! for placing asset files, flipping flags, and toggling database readiness.

use async_trait::async_trait;
use axum_test::TestServer;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use codlocker_assets::config::{AssetsConfig, Config};
use codlocker_assets::db::{DbError, ReadinessCheck};
use codlocker_assets::services::flags::{FlagHandle, Flags};
use codlocker_assets::services::storage::{LocalStorage, StorageSelector};
use codlocker_assets::{build_router, AppState};

/// Readiness check whose answer the test controls.
pub struct StubReadiness {
    ready: AtomicBool,
}

#[async_trait]
impl ReadinessCheck for StubReadiness {
    async fn ping(&self) -> Result<(), DbError> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DbError::Timeout(Duration::from_secs(2)))
        }
    }
}

/// Test application wrapper around axum_test::TestServer.
pub struct TestApp {
    server: TestServer,
    workspace: TempDir,
    flags: FlagHandle,
    readiness: Arc<StubReadiness>,
}

impl TestApp {
    /// Create a new test application.
    ///
    /// The storage root is `<tempdir>/assets`, leaving room for sibling
    /// directories next to it. Flags start at their defaults and the
    /// database reports ready.
    pub fn new() -> Self {
        let workspace = TempDir::new().expect("Failed to create temp dir");
        let root = workspace.path().join("assets");
        std::fs::create_dir_all(&root).expect("Failed to create asset root");

        let config = Config {
            server: Default::default(),
            assets: AssetsConfig {
                base_path: root.clone(),
                ..Default::default()
            },
            database: Default::default(),
            flags: Default::default(),
        };

        let flags = FlagHandle::new(Flags::default());
        let readiness = Arc::new(StubReadiness {
            ready: AtomicBool::new(true),
        });

        let state = AppState {
            config: Arc::new(config),
            flags: flags.clone(),
            storage: StorageSelector::new(LocalStorage::new(root)),
            readiness: readiness.clone(),
        };

        let server = TestServer::new(build_router(state)).expect("Failed to create test server");

        Self {
            server,
            workspace,
            flags,
            readiness,
        }
    }

    /// Get a reference to the test server.
    pub fn server(&self) -> &TestServer {
        &self.server
    }

    /// The storage root assets are served from.
    pub fn assets_root(&self) -> PathBuf {
        self.workspace.path().join("assets")
    }

    /// Directory containing the storage root.
    #[allow(dead_code)]
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Write an asset file relative to the storage root.
    pub fn write_asset(&self, relative: &str, contents: impl AsRef<[u8]>) {
        let path = self.assets_root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create asset dir");
        }
        std::fs::write(path, contents).expect("Failed to write asset");
    }

    /// Publish a new flag snapshot.
    #[allow(dead_code)]
    pub fn set_flags(&self, flags: Flags) {
        self.flags.publish(flags);
    }

    /// Control what the readiness probe sees.
    #[allow(dead_code)]
    pub fn set_ready(&self, ready: bool) {
        self.readiness.ready.store(ready, Ordering::SeqCst);
    }
}
