//! Parameter-set extraction from the live video stream
//!
//! Every chunk leaving the dongle passes through here on the way to the
//! viewers. The extractor watches for SPS/PPS units, refreshes the cache
//! when their bytes change and persists the pair. The chunk itself is never
//! modified or held back, and nothing here can fail the forward path.
//!
//! Chunks usually arrive either as one bare NAL unit or as an Annex-B run
//! of start-code-delimited units. The cheap first-byte check covers the
//! bare case; the full start-code scan only runs while the cache is still
//! incomplete or when the chunk looks like a keyframe (parameter sets
//! travel with IDR frames), which keeps steady-state cost O(1) per chunk.

use std::sync::Arc;

use crate::media::cache::{ParamSetCache, ParamSetStore, PersistedParams};
use crate::media::nal::{AnnexBUnits, NalUnitType, START_CODE};

/// Watches the outgoing video stream and keeps the parameter-set cache fresh
pub struct ParamSetExtractor {
    cache: Arc<ParamSetCache>,
    store: Arc<dyn ParamSetStore>,
}

impl ParamSetExtractor {
    pub fn new(cache: Arc<ParamSetCache>, store: Arc<dyn ParamSetStore>) -> Self {
        Self { cache, store }
    }

    /// Inspect one outgoing video chunk
    ///
    /// Malformed or truncated chunks simply yield nothing.
    pub async fn scan_chunk(&self, chunk: &[u8]) {
        // The chunk may itself be a single bare unit
        let mut updated = self.check_unit(chunk).await;

        if self.needs_full_scan(chunk).await {
            for unit in AnnexBUnits::new(chunk) {
                updated |= self.check_unit(unit).await;
            }
        }

        if updated {
            self.persist().await;
        }
    }

    /// Whether to walk every start code: required while either slot is
    /// missing, otherwise only for keyframe candidates (bare IDR unit, or an
    /// IDR header right after a leading start code)
    async fn needs_full_scan(&self, chunk: &[u8]) -> bool {
        if !self.cache.is_complete().await {
            return true;
        }

        is_idr_at(chunk, 0) || is_idr_at(chunk, START_CODE.len())
    }

    async fn check_unit(&self, unit: &[u8]) -> bool {
        let kind = match unit.first().and_then(|b| NalUnitType::from_byte(*b)) {
            Some(kind) if kind.is_parameter_set() => kind,
            _ => return false,
        };

        let changed = self.cache.update(kind, unit).await;
        if changed {
            tracing::info!(kind = ?kind, len = unit.len(), "Parameter set refreshed");
        }
        changed
    }

    async fn persist(&self) {
        let persisted = PersistedParams::encode(&self.cache.snapshot().await);

        if let Err(e) = self.store.save(&persisted).await {
            tracing::warn!(error = %e, "Failed to persist parameter sets");
        }
    }
}

fn is_idr_at(chunk: &[u8], offset: usize) -> bool {
    chunk.get(offset).and_then(|b| NalUnitType::from_byte(*b)) == Some(NalUnitType::Idr)
}
