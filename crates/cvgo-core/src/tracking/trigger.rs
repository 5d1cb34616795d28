//! Flick detection over successive aim points.
//!
//! A trigger is a short vertical excursion: the aim point drops by a bounded
//! distance and then comes back close to where it started. The detector fires
//! once per excursion, on the first frame the point starts dropping again.

use tracing::debug;

use super::Point;
use crate::config::TriggerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Descending,
    Ascending,
}

/// Trigger limits in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerThresholds {
    pub min_distance: i32,
    pub max_distance: i32,
    pub y_deviation: i32,
    pub x_deviation: i32,
}

impl TriggerThresholds {
    pub fn new(min_distance: i32, max_distance: i32, y_deviation: i32, x_deviation: i32) -> Self {
        Self {
            min_distance,
            max_distance,
            y_deviation,
            x_deviation,
        }
    }

    /// Convert the configured percentages for a frame of `resolution` pixels
    pub fn from_config(config: &TriggerConfig, resolution: usize) -> Self {
        let pixels = |percent: f64| (percent * resolution as f64 / 100.0) as i32;
        Self {
            min_distance: pixels(config.min_distance),
            max_distance: pixels(config.max_distance),
            y_deviation: pixels(config.allowed_y_deviation),
            x_deviation: pixels(config.allowed_x_deviation),
        }
    }
}

pub struct TriggerDetector {
    thresholds: TriggerThresholds,
    phase: Phase,
    window: Vec<Point>,
}

impl TriggerDetector {
    pub fn new(thresholds: TriggerThresholds) -> Self {
        Self {
            thresholds,
            phase: Phase::Descending,
            window: Vec::new(),
        }
    }

    pub fn thresholds(&self) -> TriggerThresholds {
        self.thresholds
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn window(&self) -> &[Point] {
        &self.window
    }

    /// Drop the current window and start over with new limits
    pub fn reset(&mut self, thresholds: TriggerThresholds) {
        self.thresholds = thresholds;
        self.phase = Phase::Descending;
        self.window.clear();
    }

    fn restart(&mut self, seed: Point) {
        self.phase = Phase::Descending;
        self.window.clear();
        self.window.push(seed);
    }

    /// Feed one detected aim point.
    ///
    /// Returns the window's first point when an excursion completes.
    pub fn update(&mut self, point: Point) -> Option<Point> {
        let (Some(&first), Some(&last)) = (self.window.first(), self.window.last()) else {
            self.window.push(point);
            return None;
        };

        match self.phase {
            Phase::Descending if point.y <= last.y => {
                self.window.push(point);
                None
            }
            Phase::Descending => {
                let travel = first.y - last.y;
                let limits = &self.thresholds;
                if travel >= limits.min_distance && travel <= limits.max_distance {
                    debug!("Peak after {}px descent, watching return", travel);
                    self.phase = Phase::Ascending;
                } else {
                    self.restart(point);
                }
                None
            }
            Phase::Ascending if point.y >= last.y => {
                self.window.push(point);
                None
            }
            Phase::Ascending => {
                let returned = (first.y - last.y).abs() <= self.thresholds.y_deviation
                    && (first.x - last.x).abs() <= self.thresholds.x_deviation;
                self.restart(point);

                if returned {
                    debug!("Trigger at ({}, {})", first.x, first.y);
                    Some(first)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> TriggerDetector {
        TriggerDetector::new(TriggerThresholds::new(5, 30, 2, 2))
    }

    fn feed(detector: &mut TriggerDetector, ys: &[i32], x: i32) -> Vec<Option<Point>> {
        ys.iter().map(|&y| detector.update(Point::new(x, y))).collect()
    }

    #[test]
    fn test_excursion_fires_once_on_next_drop() {
        let mut detector = detector();
        let fired = feed(&mut detector, &[50, 40, 30, 40, 50, 45], 10);

        assert_eq!(fired[..5], [None; 5]);
        assert_eq!(fired[5], Some(Point::new(10, 50)));
        assert_eq!(detector.phase(), Phase::Descending);
        assert_eq!(detector.window(), &[Point::new(10, 45)]);

        // Continuing down does not fire again
        let after = feed(&mut detector, &[40, 35, 30], 10);
        assert!(after.iter().all(Option::is_none));
    }

    #[test]
    fn test_peak_switches_to_ascending() {
        let mut detector = detector();
        feed(&mut detector, &[50, 40, 30, 40], 10);

        assert_eq!(detector.phase(), Phase::Ascending);
        assert_eq!(
            detector.window(),
            &[Point::new(10, 50), Point::new(10, 40), Point::new(10, 30)]
        );
    }

    #[test]
    fn test_ascent_is_measured_from_trough() {
        let mut detector = detector();
        // 35 dips below the turning point but not below the trough
        let fired = feed(&mut detector, &[50, 40, 30, 40, 35, 45, 50, 49], 10);

        assert_eq!(fired[..7], [None; 7]);
        assert_eq!(fired[7], Some(Point::new(10, 50)));
    }

    #[test]
    fn test_descent_beyond_max_never_fires() {
        let mut detector = detector();
        let fired = feed(&mut detector, &[300, 200, 100, 200, 300, 290, 280], 10);

        assert!(fired.iter().all(Option::is_none));
        assert_eq!(detector.phase(), Phase::Descending);
    }

    #[test]
    fn test_descent_below_min_restarts_window() {
        let mut detector = detector();
        feed(&mut detector, &[50, 48, 52], 10);

        assert_eq!(detector.phase(), Phase::Descending);
        assert_eq!(detector.window(), &[Point::new(10, 52)]);
    }

    #[test]
    fn test_return_off_target_does_not_fire() {
        let mut detector = detector();
        // Comes back 5px lower than it started
        assert!(feed(&mut detector, &[50, 40, 30, 45, 40], 10).iter().all(Option::is_none));

        // Comes back level but drifted sideways
        let mut detector = self::detector();
        let points = [(10, 50), (10, 40), (10, 30), (10, 40), (16, 50), (16, 45)];
        let fired: Vec<_> = points
            .iter()
            .map(|&(x, y)| detector.update(Point::new(x, y)))
            .collect();
        assert!(fired.iter().all(Option::is_none));
    }

    #[test]
    fn test_thresholds_from_percentages_truncate() {
        let config = TriggerConfig::default();
        let thresholds = TriggerThresholds::from_config(&config, 150);

        // 3% and 15% of 150, then 4.5 and 3.0 truncated
        assert_eq!(thresholds, TriggerThresholds::new(4, 22, 4, 3));
    }

    #[test]
    fn test_reset_clears_window() {
        let mut detector = detector();
        feed(&mut detector, &[50, 40, 30, 40], 10);
        detector.reset(TriggerThresholds::new(1, 2, 3, 4));

        assert_eq!(detector.phase(), Phase::Descending);
        assert!(detector.window().is_empty());
        assert_eq!(detector.thresholds().x_deviation, 4);
    }
}
