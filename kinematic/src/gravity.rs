//! Shared gravity source and the per-tick gravity integrator.
//!
//! Gravity is a single value shared by every body created against the same
//! [`SharedGravity`]. Shifting it from one body affects all of them, so callers
//! must serialize shifts: one writer at a time, applied between ticks.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Vec2, constants::GRAVITY_MAGNITUDE};

/// Cloneable handle to the shared gravity vector (m/s^2).
#[derive(Clone, Debug)]
pub struct SharedGravity {
    inner: Arc<RwLock<Vec2>>,
}

impl Default for SharedGravity {
    fn default() -> Self {
        Self::new(Vec2::new(0.0, -GRAVITY_MAGNITUDE))
    }
}

impl SharedGravity {
    pub fn new(gravity: Vec2) -> Self {
        Self {
            inner: Arc::new(RwLock::new(gravity)),
        }
    }

    #[inline]
    pub fn get(&self) -> Vec2 {
        *self.inner.read()
    }

    /// Overwrite the shared vector. Every body reading this source sees it on its next tick.
    pub fn set(&self, gravity: Vec2) {
        *self.inner.write() = gravity;
    }

    /// True if both handles read the same underlying value.
    pub fn same_source(&self, other: &SharedGravity) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Apply one tick of gravity to `velocity`.
///
/// `up` is the opposite of `gravity_direction`. While the body already moves with
/// gravity (`dot(velocity, up) < 0`) the pull is scaled by `gravity_modifier`,
/// otherwise it is applied unscaled. With a modifier above 1 this gives a fall that
/// is heavier than the rise.
#[inline]
pub fn integrate_gravity(
    velocity: Vec2,
    gravity: Vec2,
    gravity_direction: Vec2,
    gravity_modifier: f32,
    dt: f32,
) -> Vec2 {
    let up = -gravity_direction;
    let scale = if velocity.dot(&up) < 0.0 {
        gravity_modifier
    } else {
        1.0
    };
    velocity + gravity * (scale * dt)
}
