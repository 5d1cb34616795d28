use serde::{Deserialize, Serialize};

use super::Point;

/// View angle pair in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Angles {
    pub x: f64,
    pub y: f64,
}

impl Angles {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Angles pointing at `point`; the frame edges map to ±90°
    pub fn toward(point: Point, center: i32, half_res: f64) -> Self {
        let axis = |coord: i32| -f64::from(center - coord) / half_res * 90.0;
        Self {
            x: axis(point.x),
            y: axis(point.y),
        }
    }
}

/// First-order low-pass filter over the aim angles
#[derive(Debug, Clone)]
pub struct AngleFilter {
    smoothing: f64,
    smoothed: Angles,
}

impl AngleFilter {
    /// `smoothing` is the divisor `K`; 1 disables smoothing
    pub fn new(smoothing: f64) -> Self {
        Self {
            smoothing: smoothing.max(1.0),
            smoothed: Angles::ZERO,
        }
    }

    pub fn current(&self) -> Angles {
        self.smoothed
    }

    /// Move the smoothed angles `1/K` of the way toward `aim_point`
    pub fn update(&mut self, aim_point: Point, center: i32, half_res: f64) -> Angles {
        if half_res <= 0.0 {
            return self.smoothed;
        }
        let raw = Angles::toward(aim_point, center, half_res);
        self.smoothed.x += (raw.x - self.smoothed.x) / self.smoothing;
        self.smoothed.y += (raw.y - self.smoothed.y) / self.smoothing;
        self.smoothed
    }
}
