//! Shared application state.

use anyhow::Context;
use pyramid::AssetReader;
use raster_common::AssetMetadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storage::TileCache;
use tokio::sync::RwLock;
use tracing::info;

/// One coherent view of the published asset: the reader together with the
/// metadata that was published alongside it. Swapped as a unit on reload,
/// so a request can never pair one asset's pixels with another asset's
/// version or color bounds.
pub struct AssetSnapshot {
    pub reader: Arc<AssetReader>,
    pub metadata: AssetMetadata,
}

/// Shared state of the tile service.
///
/// The current snapshot sits behind an `RwLock<Arc<..>>` so a reload can
/// swap in a newly published asset while in-flight requests keep the
/// snapshot they already cloned. Cache entries carry the asset version in
/// their key, so entries for the old asset are never served after a swap.
pub struct AppState {
    asset_path: PathBuf,
    metadata_path: PathBuf,
    current: RwLock<Arc<AssetSnapshot>>,
    pub cache: TileCache,
    pub request_timeout: Duration,
}

impl AppState {
    /// Open the asset and metadata, failing fast if either is missing or
    /// malformed. Called before the listener binds.
    pub fn load(
        asset_path: &Path,
        metadata_path: &Path,
        cache_size_mb: usize,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let snapshot = Self::open_snapshot(asset_path, metadata_path)?;

        info!(
            asset = %asset_path.display(),
            variable = %snapshot.metadata.variable,
            version = snapshot.metadata.asset_version,
            levels = snapshot.reader.header().levels.len(),
            "asset loaded"
        );

        Ok(Self {
            asset_path: asset_path.to_path_buf(),
            metadata_path: metadata_path.to_path_buf(),
            current: RwLock::new(Arc::new(snapshot)),
            cache: TileCache::new(cache_size_mb),
            request_timeout,
        })
    }

    fn open_snapshot(asset_path: &Path, metadata_path: &Path) -> anyhow::Result<AssetSnapshot> {
        let metadata = AssetMetadata::load(metadata_path)
            .with_context(|| format!("loading metadata from {}", metadata_path.display()))?;
        let reader = AssetReader::open(asset_path)
            .with_context(|| format!("opening asset {}", asset_path.display()))?;
        Ok(AssetSnapshot {
            reader: Arc::new(reader),
            metadata,
        })
    }

    /// The current asset snapshot. Taken once per request.
    pub async fn snapshot(&self) -> Arc<AssetSnapshot> {
        self.current.read().await.clone()
    }

    /// Re-open the asset and metadata from disk and swap them in as a
    /// single snapshot.
    pub async fn reload(&self) -> anyhow::Result<()> {
        let snapshot = Self::open_snapshot(&self.asset_path, &self.metadata_path)?;

        let mut guard = self.current.write().await;
        info!(
            old_version = guard.metadata.asset_version,
            new_version = snapshot.metadata.asset_version,
            "asset reloaded"
        );
        *guard = Arc::new(snapshot);
        Ok(())
    }
}
