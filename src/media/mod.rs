//! Media handling
//!
//! This module provides:
//! - H.264 NAL unit parsing for the raw Annex-B stream the dongle emits
//! - The parameter-set cache that primes late-joining viewers
//! - Per-chunk SPS/PPS extraction with durable persistence

pub mod cache;
pub mod extractor;
pub mod nal;

pub use cache::{CachedParams, JsonFileStore, ParamSetCache, ParamSetStore, PersistedParams};
pub use extractor::ParamSetExtractor;
pub use nal::{AnnexBUnits, NalUnitType};
