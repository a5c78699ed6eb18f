use std::f64::consts::{FRAC_PI_2, TAU};

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_DURATION_MS: u64 = 60 * 60 * 1000;
const MS_PER_MINUTE: u64 = 60_000;

/// Maps a point on the dial to a duration, with 12 o'clock as zero and the
/// value growing clockwise (screen coordinates, y pointing down).
///
/// The result lies in `[0, max_duration_ms)`: a full turn wraps back to 0
/// instead of snapping to the maximum.
pub fn angle_to_duration(x: f64, y: f64, center_x: f64, center_y: f64, max_duration_ms: u64) -> u64 {
    let mut angle = (y - center_y).atan2(x - center_x) + FRAC_PI_2;
    if angle < 0.0 {
        angle += TAU;
    }
    if angle >= TAU {
        angle -= TAU;
    }
    (angle / TAU * max_duration_ms as f64).round() as u64
}

pub fn duration_to_arc_fraction(duration_ms: u64, max_duration_ms: u64) -> f64 {
    let max = max_duration_ms.max(1) as f64;
    (duration_ms as f64 / max).clamp(0.0, 1.0)
}

/// Remembers the last whole minute reported so a drag can signal each
/// minute boundary it crosses, in either direction, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteDetent {
    last_minute: u64,
}

impl MinuteDetent {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            last_minute: duration_ms / MS_PER_MINUTE,
        }
    }

    pub fn last_minute(&self) -> u64 {
        self.last_minute
    }

    /// Returns the new minute when `duration_ms` lands in a different one.
    pub fn update(&mut self, duration_ms: u64) -> Option<u64> {
        let minute = duration_ms / MS_PER_MINUTE;
        if minute == self.last_minute {
            return None;
        }
        self.last_minute = minute;
        Some(minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DialGeometry {
    pub radius: f64,
    pub stroke_width: f64,
}

impl Default for DialGeometry {
    fn default() -> Self {
        Self {
            radius: 140.0,
            stroke_width: 40.0,
        }
    }
}

impl DialGeometry {
    /// The dial sits in a square of side `2 * (radius + stroke)`, so its
    /// center is the same on both axes.
    pub fn center(&self) -> f64 {
        self.radius + self.stroke_width
    }

    pub fn circumference(&self) -> f64 {
        TAU * self.radius
    }

    /// Dash offset that leaves `fraction` of the ring stroked.
    pub fn dash_offset(&self, fraction: f64) -> f64 {
        self.circumference() * (1.0 - fraction.clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DragUpdate {
    pub duration_ms: u64,
    pub progress: f64,
    pub dash_offset: f64,
    /// Set when the drag moved into a new whole minute.
    pub minute_crossed: Option<u64>,
}

/// Drag-to-set duration ring.
#[derive(Debug, Clone)]
pub struct CircularDial {
    geometry: DialGeometry,
    max_duration_ms: u64,
    detent: MinuteDetent,
    progress: f64,
    disabled: bool,
}

impl CircularDial {
    pub fn new(geometry: DialGeometry, max_duration_ms: u64, duration_ms: u64) -> Self {
        let max_duration_ms = max_duration_ms.max(1);
        Self {
            geometry,
            max_duration_ms,
            detent: MinuteDetent::new(duration_ms),
            progress: duration_to_arc_fraction(duration_ms, max_duration_ms),
            disabled: false,
        }
    }

    pub fn max_duration_ms(&self) -> u64 {
        self.max_duration_ms
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn dash_offset(&self) -> f64 {
        self.geometry.dash_offset(self.progress)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Re-syncs the ring with a duration chosen elsewhere (preset, restore).
    /// Does not count as crossing a minute.
    pub fn sync(&mut self, duration_ms: u64) {
        self.progress = duration_to_arc_fraction(duration_ms, self.max_duration_ms);
        self.detent = MinuteDetent::new(duration_ms);
    }

    /// Feeds one gesture sample, in the dial's own coordinate space.
    pub fn drag(&mut self, x: f64, y: f64) -> Option<DragUpdate> {
        if self.disabled {
            return None;
        }

        let center = self.geometry.center();
        let duration_ms = angle_to_duration(x, y, center, center, self.max_duration_ms);
        self.progress = duration_to_arc_fraction(duration_ms, self.max_duration_ms);

        Some(DragUpdate {
            duration_ms,
            progress: self.progress,
            dash_offset: self.dash_offset(),
            minute_crossed: self.detent.update(duration_ms),
        })
    }
}
