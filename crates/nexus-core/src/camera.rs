//! Virtual viewpoint animator: `idle-orbit ⇄ animating → idle-orbit`.
//!
//! Time is supplied by the caller on every call (`now` since console start),
//! so the animator is driven by frame ticks and never sleeps.

use std::ops::{Add, Mul, Sub};
use std::time::Duration;

use serde::Serialize;

use crate::constants::{AUTO_ORBIT_RATE, CAMERA_ANIMATION, DEFAULT_CAMERA_POSITION};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, or zero for the zero vector.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len < 1e-12 { Vec3::ZERO } else { self * (1.0 / len) }
    }

    pub fn lerp(self, to: Vec3, t: f64) -> Self {
        self + (to - self) * t
    }

    /// Rotate about the vertical (y) axis by `angle` radians.
    pub fn rotate_y(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Vec3::new(
            self.x * cos + self.z * sin,
            self.y,
            -self.x * sin + self.z * cos,
        )
    }

    pub fn distance(self, other: Vec3) -> f64 {
        (self - other).length()
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

/// Fast-start, slow-finish curve: `1 - (1 - t)^3`, with `t` clamped to [0, 1].
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Invoked once when an animation reaches its target. Abandoned animations
/// drop their callback without calling it.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraMode {
    IdleOrbit,
    Animating,
}

/// Snapshot of the viewpoint for the rendering layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ViewpointState {
    pub position: Vec3,
    pub look_at: Vec3,
    pub is_animating: bool,
    pub pending_target: Option<Vec3>,
}

#[derive(Clone, Copy, Debug)]
pub struct CameraConfig {
    pub duration: Duration,
    /// Auto-orbit angular rate in rad/s
    pub orbit_rate: f64,
    pub default_position: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            duration: CAMERA_ANIMATION,
            orbit_rate: AUTO_ORBIT_RATE,
            default_position: Vec3::from_array(DEFAULT_CAMERA_POSITION),
        }
    }
}

struct Animation {
    id: u64,
    from_position: Vec3,
    from_look_at: Vec3,
    to_position: Vec3,
    to_look_at: Vec3,
    started: Duration,
    on_complete: Option<CompletionCallback>,
}

pub struct CameraAnimator {
    config: CameraConfig,
    position: Vec3,
    look_at: Vec3,
    animation: Option<Animation>,
    interacting: bool,
    last_tick: Option<Duration>,
    next_id: u64,
}

impl CameraAnimator {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            position: config.default_position,
            look_at: Vec3::ZERO,
            config,
            animation: None,
            interacting: false,
            last_tick: None,
            next_id: 0,
        }
    }

    /// Animate toward `position`, looking at the origin.
    pub fn request_target(&mut self, now: Duration, position: Vec3) -> u64 {
        self.request_view(now, position, Vec3::ZERO, None)
    }

    /// Animate toward `position` looking at `look_at`. A running animation is
    /// abandoned; the new one starts from the current interpolated viewpoint.
    pub fn request_view(
        &mut self,
        now: Duration,
        position: Vec3,
        look_at: Vec3,
        on_complete: Option<CompletionCallback>,
    ) -> u64 {
        // bring position/look_at up to `now` before branching off
        self.tick(now);
        self.animation = None;

        self.next_id += 1;
        self.animation = Some(Animation {
            id: self.next_id,
            from_position: self.position,
            from_look_at: self.look_at,
            to_position: position,
            to_look_at: look_at,
            started: now,
            on_complete,
        });
        self.next_id
    }

    /// Animate back to the default overview.
    pub fn reset(&mut self, now: Duration) -> u64 {
        self.request_target(now, self.config.default_position)
    }

    /// Manual interaction (drag/zoom) suspends auto-orbit while true.
    pub fn set_interacting(&mut self, interacting: bool) {
        self.interacting = interacting;
    }

    /// Advance to `now`. Returns the id of an animation that completed on
    /// this tick.
    pub fn tick(&mut self, now: Duration) -> Option<u64> {
        let dt = self
            .last_tick
            .map(|t| now.saturating_sub(t))
            .unwrap_or_default();
        self.last_tick = Some(now);

        let Some(anim) = self.animation.as_ref() else {
            if !self.interacting && !dt.is_zero() {
                let angle = self.config.orbit_rate * dt.as_secs_f64();
                self.position = self.look_at + (self.position - self.look_at).rotate_y(angle);
            }
            return None;
        };

        let elapsed = now.saturating_sub(anim.started);
        let progress = if self.config.duration.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f64() / self.config.duration.as_secs_f64()
        };

        if progress < 1.0 {
            let eased = ease_out_cubic(progress);
            self.position = anim.from_position.lerp(anim.to_position, eased);
            self.look_at = anim.from_look_at.lerp(anim.to_look_at, eased);
            return None;
        }

        let mut done = self.animation.take()?;
        self.position = done.to_position;
        self.look_at = done.to_look_at;
        if let Some(callback) = done.on_complete.take() {
            callback();
        }
        Some(done.id)
    }

    pub fn mode(&self) -> CameraMode {
        if self.animation.is_some() {
            CameraMode::Animating
        } else {
            CameraMode::IdleOrbit
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn state(&self) -> ViewpointState {
        ViewpointState {
            position: self.position,
            look_at: self.look_at,
            is_animating: self.animation.is_some(),
            pending_target: self.animation.as_ref().map(|a| a.to_position),
        }
    }
}

impl Default for CameraAnimator {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}
