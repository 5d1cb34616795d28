use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{
    AngleFilter, BlobTracker, Mask, MaskSource, Point, Rect, TriggerDetector, TriggerThresholds,
};
use crate::config::{Config, TriggerConfig};
use crate::error::Result;

/// Per-frame result handed to the aiming layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    pub detected: bool,
    /// Smoothed, in degrees
    pub x_angle: f64,
    pub y_angle: f64,
    /// Set only on the frame an excursion completes
    pub triggered: bool,
    pub aim_point: Point,
    pub bounding_box: Rect,
}

/// Tracker, trigger detector and angle filter driven one mask at a time
pub struct FrameProcessor {
    trigger_config: TriggerConfig,
    tracker: BlobTracker,
    trigger: TriggerDetector,
    filter: AngleFilter,
    resolution: Option<usize>,
}

impl FrameProcessor {
    pub fn new(config: &Config) -> Self {
        Self {
            trigger_config: config.trigger.clone(),
            tracker: BlobTracker::new(&config.tracking),
            trigger: TriggerDetector::new(TriggerThresholds::from_config(&config.trigger, 0)),
            filter: AngleFilter::new(config.tracking.smoothing),
            resolution: None,
        }
    }

    pub fn resolution(&self) -> Option<usize> {
        self.resolution
    }

    pub fn trigger(&self) -> &TriggerDetector {
        &self.trigger
    }

    fn configure(&mut self, resolution: usize) {
        if self.resolution == Some(resolution) {
            return;
        }

        let thresholds = TriggerThresholds::from_config(&self.trigger_config, resolution);
        self.tracker.resize(resolution);
        self.trigger.reset(thresholds);
        self.resolution = Some(resolution);

        debug!(
            "Frame geometry rebuilt for {}x{}: reticle {:?}, trigger {:?}",
            resolution,
            resolution,
            self.tracker.geometry().reticle,
            thresholds
        );
    }

    pub fn process(&mut self, mask: &Mask) -> FrameOutput {
        self.configure(mask.resolution());

        let state = self.tracker.track(mask);
        let mut aim_point = state.aim_point;
        let mut triggered = false;

        if state.detected {
            if let Some(snapped) = self.trigger.update(aim_point) {
                aim_point = snapped;
                triggered = true;
            }
        }

        let geometry = self.tracker.geometry();
        let angles = self
            .filter
            .update(aim_point, geometry.center, geometry.half_res());

        trace!(
            "Frame: detected={} aim=({}, {}) angles=({:.2}, {:.2}) triggered={}",
            state.detected, aim_point.x, aim_point.y, angles.x, angles.y, triggered
        );

        FrameOutput {
            detected: state.detected,
            x_angle: angles.x,
            y_angle: angles.y,
            triggered,
            aim_point,
            bounding_box: state.bounding_box,
        }
    }

    /// Process masks until `source` runs dry or `on_frame` breaks.
    ///
    /// Returns the number of frames processed.
    pub fn run<S, F>(&mut self, source: &mut S, mut on_frame: F) -> Result<usize>
    where
        S: MaskSource + ?Sized,
        F: FnMut(&FrameOutput) -> ControlFlow<()>,
    {
        let mut frames = 0;

        while let Some(mask) = source.next_mask()? {
            let output = self.process(&mask);
            frames += 1;
            if on_frame(&output).is_break() {
                break;
            }
        }

        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingConfig;
    use crate::error::Error;

    fn config() -> Config {
        Config {
            tracking: TrackingConfig {
                reticle_size: 40,
                no_aim_size: 4,
                sample_size: 1,
                smoothing: 1.0,
            },
            trigger: TriggerConfig {
                min_distance: 5.0,
                max_distance: 30.0,
                allowed_y_deviation: 2.0,
                allowed_x_deviation: 2.0,
            },
            ..Config::default()
        }
    }

    fn dot(x: usize, y: usize) -> Mask {
        let mut mask = Mask::empty(100);
        mask.set(x, y, true);
        mask
    }

    #[test]
    fn test_undetected_frame_is_neutral() {
        let mut processor = FrameProcessor::new(&config());
        let output = processor.process(&Mask::empty(100));

        assert!(!output.detected);
        assert!(!output.triggered);
        assert_eq!(output.aim_point, Point::new(50, 50));
        assert_eq!(output.x_angle, 0.0);
        assert_eq!(output.y_angle, 0.0);
        assert_eq!(processor.resolution(), Some(100));
    }

    #[test]
    fn test_detected_frame_reports_angles() {
        let mut processor = FrameProcessor::new(&config());
        let output = processor.process(&dot(60, 40));

        assert!(output.detected);
        assert_eq!(output.aim_point, Point::new(60, 40));
        assert_eq!(output.x_angle, 18.0);
        assert_eq!(output.y_angle, -18.0);
    }

    #[test]
    fn test_excursion_triggers_with_snapped_point() {
        let mut processor = FrameProcessor::new(&config());
        let frames: Vec<FrameOutput> = [60, 52, 45, 52, 60, 55]
            .iter()
            .map(|&y| processor.process(&dot(40, y)))
            .collect();

        assert!(frames[..5].iter().all(|f| !f.triggered));
        assert!(frames[5].triggered);
        assert_eq!(frames[5].aim_point, Point::new(40, 60));
    }

    #[test]
    fn test_undetected_frames_do_not_drive_trigger() {
        let mut processor = FrameProcessor::new(&config());
        processor.process(&dot(40, 60));
        processor.process(&Mask::empty(100));
        processor.process(&dot(40, 50));

        assert_eq!(
            processor.trigger().window(),
            &[Point::new(40, 60), Point::new(40, 50)]
        );
    }

    #[test]
    fn test_resolution_change_rebuilds_geometry() {
        let mut processor = FrameProcessor::new(&config());
        processor.process(&dot(40, 60));
        assert_eq!(processor.trigger().thresholds().max_distance, 30);

        let output = processor.process(&Mask::empty(50));
        assert_eq!(processor.resolution(), Some(50));
        assert_eq!(processor.trigger().thresholds().max_distance, 15);
        assert!(processor.trigger().window().is_empty());
        assert_eq!(output.aim_point, Point::new(25, 25));
    }

    #[test]
    fn test_run_counts_frames_and_stops_on_break() {
        let mut processor = FrameProcessor::new(&config());
        let mut source = vec![Mask::empty(100); 5].into_iter();

        let mut seen = 0;
        let frames = processor
            .run(&mut source, |_| {
                seen += 1;
                if seen == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(frames, 3);

        let rest = processor
            .run(&mut source, |_| ControlFlow::Continue(()))
            .unwrap();
        assert_eq!(rest, 2);
    }

    struct FailingSource;

    impl MaskSource for FailingSource {
        fn next_mask(&mut self) -> Result<Option<Mask>> {
            Err(Error::InvalidMask("broken frame".to_string()))
        }
    }

    #[test]
    fn test_run_propagates_source_errors() {
        let mut processor = FrameProcessor::new(&config());
        let result = processor.run(&mut FailingSource, |_| ControlFlow::Continue(()));
        assert!(matches!(result, Err(Error::InvalidMask(_))));
    }
}
