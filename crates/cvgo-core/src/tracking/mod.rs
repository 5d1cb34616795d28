//! Per-frame target tracking over binary masks.
//!
//! [`FrameProcessor`] ties the pieces together: [`BlobTracker`] finds the aim
//! point, [`TriggerDetector`] watches it for flick gestures and
//! [`AngleFilter`] turns it into smoothed view angles.

mod filter;
mod geometry;
mod mask;
mod processor;
mod tracker;
mod trigger;

pub use filter::{AngleFilter, Angles};
pub use geometry::{Point, Rect};
pub use mask::{Mask, MaskSource, PgmDirectory};
pub use processor::{FrameOutput, FrameProcessor};
pub use tracker::{BlobTracker, TrackGeometry, TrackState};
pub use trigger::{Phase, TriggerDetector, TriggerThresholds};
