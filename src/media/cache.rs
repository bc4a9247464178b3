//! Parameter-set cache
//!
//! A decoder attached mid-stream cannot render anything until it has seen
//! SPS and PPS. The cache keeps the most recent pair from the live stream
//! so a joining viewer is primed immediately instead of waiting for the
//! next keyframe, and persists the pair so the first viewer after a
//! restart is primed too.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{BridgeError, Result};
use crate::media::nal::NalUnitType;

/// Read-only snapshot of the cached parameter sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedParams {
    /// Sequence parameter set bytes (NAL header included, start code stripped)
    pub sps: Option<Bytes>,
    /// Picture parameter set bytes
    pub pps: Option<Bytes>,
}

impl CachedParams {
    pub fn is_complete(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }
}

/// Most recent SPS/PPS seen on the live stream
///
/// At most one of each is held. The stream extractor is the only writer;
/// everything else reads snapshots.
pub struct ParamSetCache {
    slots: RwLock<CachedParams>,
}

impl ParamSetCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::with_initial(CachedParams::default())
    }

    /// Create a cache seeded from persisted state
    pub fn with_initial(params: CachedParams) -> Self {
        Self {
            slots: RwLock::new(params),
        }
    }

    /// Get a snapshot of both slots
    pub async fn snapshot(&self) -> CachedParams {
        self.slots.read().await.clone()
    }

    /// Whether both slots are populated
    pub async fn is_complete(&self) -> bool {
        self.slots.read().await.is_complete()
    }

    /// Replace the slot for `kind` if `unit` differs byte-for-byte from the
    /// cached value
    ///
    /// Returns whether the slot changed. Kinds other than SPS/PPS are
    /// ignored.
    pub(crate) async fn update(&self, kind: NalUnitType, unit: &[u8]) -> bool {
        let mut slots = self.slots.write().await;

        let slot = match kind {
            NalUnitType::Sps => &mut slots.sps,
            NalUnitType::Pps => &mut slots.pps,
            _ => return false,
        };

        if slot.as_deref() == Some(unit) {
            return false;
        }

        *slot = Some(Bytes::copy_from_slice(unit));
        true
    }
}

impl Default for ParamSetCache {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk form of the cache: both slots base64-encoded, null when empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedParams {
    pub sps: Option<String>,
    pub pps: Option<String>,
}

impl PersistedParams {
    /// Encode a cache snapshot for storage
    pub fn encode(params: &CachedParams) -> Self {
        Self {
            sps: params.sps.as_ref().map(|b| BASE64.encode(b)),
            pps: params.pps.as_ref().map(|b| BASE64.encode(b)),
        }
    }

    /// Decode back into cache form
    ///
    /// A slot that fails to decode is dropped with a warning; the stream
    /// will repopulate it.
    pub fn decode(&self) -> CachedParams {
        CachedParams {
            sps: decode_slot("sps", self.sps.as_deref()),
            pps: decode_slot("pps", self.pps.as_deref()),
        }
    }
}

fn decode_slot(name: &str, encoded: Option<&str>) -> Option<Bytes> {
    let encoded = encoded?;
    match BASE64.decode(encoded) {
        Ok(raw) => Some(Bytes::from(raw)),
        Err(e) => {
            tracing::warn!(slot = name, error = %e, "Discarding undecodable cache slot");
            None
        }
    }
}

/// Durable storage for the parameter sets
///
/// Written wholesale on every cache change, read once at startup.
#[async_trait]
pub trait ParamSetStore: Send + Sync {
    /// Load the persisted record, `None` when nothing was stored yet
    async fn load(&self) -> Result<Option<PersistedParams>>;

    /// Overwrite the record
    async fn save(&self, params: &PersistedParams) -> Result<()>;
}

/// Stores the parameter sets as a small JSON file
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ParamSetStore for JsonFileStore {
    async fn load(&self) -> Result<Option<PersistedParams>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let params = serde_json::from_slice(&raw).map_err(|e| BridgeError::CacheFile {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(params))
    }

    async fn save(&self, params: &PersistedParams) -> Result<()> {
        let raw = serde_json::to_vec_pretty(params)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_and_snapshot() {
        let cache = ParamSetCache::new();
        assert!(!cache.is_complete().await);

        assert!(cache.update(NalUnitType::Sps, &[0x67, 0xAA]).await);
        assert!(cache.update(NalUnitType::Pps, &[0x68, 0xBB]).await);
        assert!(cache.is_complete().await);

        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.sps.as_deref(), Some(&[0x67, 0xAA][..]));
        assert_eq!(snapshot.pps.as_deref(), Some(&[0x68, 0xBB][..]));
    }

    #[tokio::test]
    async fn test_update_unchanged_bytes() {
        let cache = ParamSetCache::new();

        assert!(cache.update(NalUnitType::Sps, &[0x67, 0xAA]).await);
        assert!(!cache.update(NalUnitType::Sps, &[0x67, 0xAA]).await);
        assert!(cache.update(NalUnitType::Sps, &[0x67, 0xCC]).await);
    }

    #[tokio::test]
    async fn test_update_ignores_other_kinds() {
        let cache = ParamSetCache::new();

        assert!(!cache.update(NalUnitType::Idr, &[0x65, 0x88]).await);
        assert!(!cache.update(NalUnitType::Slice, &[0x41, 0x9A]).await);
        assert_eq!(cache.snapshot().await, CachedParams::default());
    }

    #[test]
    fn test_persisted_roundtrip() {
        let params = CachedParams {
            sps: Some(Bytes::from_static(&[0x67, 0xAA])),
            pps: None,
        };

        let persisted = PersistedParams::encode(&params);
        assert!(persisted.sps.is_some());
        assert!(persisted.pps.is_none());

        assert_eq!(persisted.decode(), params);
    }

    #[test]
    fn test_persisted_invalid_base64_dropped() {
        let persisted = PersistedParams {
            sps: Some("not base64!!!".to_string()),
            pps: Some(BASE64.encode([0x68, 0xBB])),
        };

        let decoded = persisted.decode();
        assert!(decoded.sps.is_none());
        assert_eq!(decoded.pps.as_deref(), Some(&[0x68, 0xBB][..]));
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("params.json"));

        assert!(store.load().await.unwrap().is_none());

        let params = PersistedParams {
            sps: Some(BASE64.encode([0x67, 0xAA])),
            pps: None,
        };
        store.save(&params).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, params);
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = JsonFileStore::new(path);
        assert!(store.load().await.is_err());
    }
}
