//! Blob tracking on a binary mask.
//!
//! The tracker flood-fills outward from the reticle over a coarse lattice and
//! takes the last block it reaches as the aim point. Breadth-first order makes
//! that the block furthest (in lattice steps) from the reticle, which for a
//! player model sitting in the reticle is usually the head.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{Mask, Point, Rect};
use crate::config::TrackingConfig;

/// Result of tracking one mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackState {
    pub detected: bool,
    /// Frame centre when undetected or inside the no-aim region
    pub aim_point: Point,
    /// Accepted blocks' extent; the reticle when undetected
    pub bounding_box: Rect,
}

/// Centred regions derived from one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackGeometry {
    pub resolution: usize,
    pub center: i32,
    pub reticle: Rect,
    pub no_aim: Rect,
}

impl TrackGeometry {
    pub fn new(resolution: usize, reticle_size: u32, no_aim_size: u32) -> Self {
        let center = (resolution / 2) as i32;
        Self {
            resolution,
            center,
            reticle: Rect::centered(center, reticle_size as i32),
            no_aim: Rect::centered(center, no_aim_size as i32),
        }
    }

    pub fn center_point(&self) -> Point {
        Point::new(self.center, self.center)
    }

    pub fn half_res(&self) -> f64 {
        self.center as f64
    }
}

/// Lattice points covering the reticle, from `center - size/2` to
/// `center + size/2` on both axes, `x` outermost
fn seeds(center: i32, reticle_size: u32, step: i32) -> impl Iterator<Item = Point> {
    let half = reticle_size as i32 / 2;
    let axis = move || (center - half..=center + half).step_by(step as usize);
    axis().flat_map(move |x| axis().map(move |y| Point::new(x, y)))
}

/// The 8 neighbours of `point` on a lattice of `step`, `x` offset outermost
fn neighbours(point: Point, step: i32) -> impl Iterator<Item = Point> {
    (-1..=1)
        .flat_map(|dx| (-1..=1).map(move |dy| (dx, dy)))
        .filter(|&(dx, dy)| dx != 0 || dy != 0)
        .map(move |(dx, dy)| Point::new(point.x + dx * step, point.y + dy * step))
}

pub struct BlobTracker {
    reticle_size: u32,
    no_aim_size: u32,
    step: i32,
    geometry: TrackGeometry,
    /// `(res + 1)²` flags indexed by block origin
    visited: Vec<bool>,
    queue: VecDeque<Point>,
}

impl BlobTracker {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            reticle_size: config.reticle_size,
            no_aim_size: config.no_aim_size,
            step: config.sample_size.max(1) as i32,
            geometry: TrackGeometry::new(0, config.reticle_size, config.no_aim_size),
            visited: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn geometry(&self) -> &TrackGeometry {
        &self.geometry
    }

    /// Rebuild regions and the visited arena for `resolution`.
    ///
    /// Returns `false` when the tracker is already set up for it.
    pub fn resize(&mut self, resolution: usize) -> bool {
        if self.geometry.resolution == resolution && !self.visited.is_empty() {
            return false;
        }
        self.geometry = TrackGeometry::new(resolution, self.reticle_size, self.no_aim_size);
        self.visited = vec![false; (resolution + 1) * (resolution + 1)];
        true
    }

    fn undetected(&self) -> TrackState {
        TrackState {
            detected: false,
            aim_point: self.geometry.center_point(),
            bounding_box: self.geometry.reticle,
        }
    }

    pub fn track(&mut self, mask: &Mask) -> TrackState {
        self.resize(mask.resolution());
        let geometry = self.geometry;

        if !mask.any_foreground(geometry.reticle) {
            return self.undetected();
        }

        let res = geometry.resolution as i32;
        let stride = geometry.resolution + 1;
        let step = self.step;

        self.visited.fill(false);
        self.queue.clear();

        for seed in seeds(geometry.center, self.reticle_size, step) {
            self.queue.push_back(seed);
            self.queue.extend(neighbours(seed, step));
        }

        let mut aim = None;
        let mut bbox: Option<Rect> = None;

        while let Some(point) = self.queue.pop_front() {
            if point.x < 0 || point.y < 0 || point.x + step > res || point.y + step > res {
                continue;
            }
            let index = point.y as usize * stride + point.x as usize;
            if self.visited[index] {
                continue;
            }
            self.visited[index] = true;

            if !mask.block_has_foreground(point, step) {
                continue;
            }

            aim = Some(point);
            bbox = Some(match bbox {
                Some(rect) => rect.expand_to(point),
                None => Rect::at(point),
            });
            self.queue.extend(neighbours(point, step));
        }

        // Foreground in the reticle that no lattice block covers
        let (Some(mut aim), Some(bbox)) = (aim, bbox) else {
            return TrackState {
                detected: true,
                ..self.undetected()
            };
        };

        if geometry.no_aim.contains(aim) {
            trace!("Aim {:?} inside no-aim region, snapping to centre", aim);
            aim = geometry.center_point();
        }

        TrackState {
            detected: true,
            aim_point: aim,
            bounding_box: bbox,
        }
    }
}
