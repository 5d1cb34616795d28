//! # cvgo-core
//!
//! Core library for the cvgo aim assistant.
//!
//! This crate provides:
//! - Process memory access behind the [`ProcessAccess`] trait (Windows backend)
//! - Signature scanning and pointer-chain offset resolution
//! - Blob tracking, angle smoothing and trigger detection over binary masks
//! - TOML configuration

pub mod config;
pub mod error;
pub mod memory;
pub mod offset;
pub mod tracking;

pub use config::{Config, ProcessConfig, TrackingConfig, TriggerConfig};
pub use error::{Error, Result};
#[cfg(target_os = "windows")]
pub use memory::{WindowsProcess, find_process_id};
pub use memory::{
    ModuleRecord, ModuleTable, PointerWidth, ProcessAccess, Protection, ProtectionGuard,
    RegionInfo,
};
pub use offset::{
    AddressingMode, OffsetFinder, ResolvedOffset, ResolvedOffsets, SignaturePattern,
    SignatureScanner, SignatureSet, builtin_signatures, find_pattern, load_offsets,
    load_signatures, parse_pattern, resolve, save_offsets, save_signatures,
};
pub use tracking::{
    AngleFilter, Angles, BlobTracker, FrameOutput, FrameProcessor, Mask, MaskSource,
    PgmDirectory, Point, Rect, TrackState, TriggerDetector, TriggerThresholds,
};
