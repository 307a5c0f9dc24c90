use serde::{Deserialize, Serialize};

/// Drawable area in pixels. A zero extent means layout has not happened yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Moving circular target: center, per-tick velocity and radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetState {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub radius: f32,
}

impl Default for TargetState {
    fn default() -> Self {
        Self {
            x: 300.0,
            y: 300.0,
            dx: 5.0,
            dy: 3.0,
            radius: 100.0,
        }
    }
}

/// Boundary behavior when the target leaves the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionPolicy {
    /// Clamp the center back inside and point the velocity inward.
    #[default]
    ClampAndReflect,
    /// Negate velocity on violation without clamping. Targets that start
    /// outside the bounds can oscillate in place.
    Legacy,
}

/// Which axes bounced during a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounce {
    pub x: bool,
    pub y: bool,
}

impl TargetState {
    /// Advance one tick and reflect off the viewport edges.
    pub fn step(&mut self, viewport: Viewport, policy: ReflectionPolicy) -> Bounce {
        self.x += self.dx;
        self.y += self.dy;

        match policy {
            ReflectionPolicy::ClampAndReflect => Bounce {
                x: clamp_axis(&mut self.x, &mut self.dx, self.radius, viewport.width),
                y: clamp_axis(&mut self.y, &mut self.dy, self.radius, viewport.height),
            },
            ReflectionPolicy::Legacy => Bounce {
                x: legacy_axis(self.x, &mut self.dx, self.radius, viewport.width),
                y: legacy_axis(self.y, &mut self.dy, self.radius, viewport.height),
            },
        }
    }
}

fn clamp_axis(pos: &mut f32, vel: &mut f32, radius: f32, extent: f32) -> bool {
    if extent <= 0.0 {
        return false;
    }
    let (lo, hi) = (radius, extent - radius);
    if lo > hi {
        // Target wider than the viewport: pin to the middle.
        *pos = extent / 2.0;
        return false;
    }
    if *pos < lo {
        *pos = lo;
        *vel = vel.abs();
        true
    } else if *pos > hi {
        *pos = hi;
        *vel = -vel.abs();
        true
    } else {
        false
    }
}

fn legacy_axis(pos: f32, vel: &mut f32, radius: f32, extent: f32) -> bool {
    if extent <= 0.0 {
        return false;
    }
    if pos - radius < 0.0 || pos + radius > extent {
        *vel = -*vel;
        true
    } else {
        false
    }
}
