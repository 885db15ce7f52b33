use crate::{
    Vec2,
    backend::{BodyHandle, HitBuffer, KinematicBackend, SweepHit},
    constants::GRAVITY_MAGNITUDE,
    controller::{ControlContext, VelocityController},
    error::{KinematicError, Result},
    filter::ContactFilter,
    gravity::{SharedGravity, integrate_gravity},
    settings::BodySettings,
};

/// Which of the two per-tick sweeps a move belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepAxis {
    /// Along the current ground tangent.
    Horizontal,
    /// Along world Y.
    Vertical,
}

/// A body moved by explicit velocity rather than by a physics solver.
///
/// Each fixed tick:
/// 1. Gravity is integrated into `velocity`, then `velocity.x` is replaced by the
///    target velocity's x.
/// 2. Ground state is cleared and the tick's displacement is resolved as two sweeps:
///    along the ground tangent, then vertically.
/// 3. Every contact of a sweep is classified as ground or obstacle and removes the
///    matching velocity component; the move stops `shell_radius` short of the
///    nearest contact.
///
/// Position lives in the [`KinematicBackend`]; this type only holds motion state.
#[derive(Debug)]
pub struct KinematicBody {
    handle: BodyHandle,

    velocity: Vec2,
    target_velocity: Vec2,
    ground_normal: Vec2,
    is_grounded: bool,

    gravity_modifier: f32,
    gravity_direction: Vec2,
    min_ground_normal: Vec2,
    gravity: SharedGravity,

    shell_radius: f32,
    min_move_distance: f32,
    filter: ContactFilter,
    hits: HitBuffer,
}

impl KinematicBody {
    /// Create a body for `handle`. `settings` are validated; the gravity direction is
    /// normalized.
    ///
    /// The ground normal starts as the body's up vector, so an airborne body that has
    /// never landed moves along world X.
    pub fn new(
        handle: BodyHandle,
        settings: &BodySettings,
        filter: ContactFilter,
        gravity: SharedGravity,
    ) -> Result<Self> {
        settings.validate()?;
        let gravity_direction = settings.gravity_direction.normalize();

        Ok(Self {
            handle,
            velocity: Vec2::zeros(),
            target_velocity: Vec2::zeros(),
            ground_normal: -gravity_direction,
            is_grounded: false,
            gravity_modifier: settings.gravity_modifier,
            gravity_direction,
            min_ground_normal: settings.min_ground_normal,
            gravity,
            shell_radius: settings.shell_radius,
            min_move_distance: settings.min_move_distance,
            filter,
            hits: HitBuffer::with_capacity(settings.hit_capacity),
        })
    }

    #[inline]
    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    #[inline]
    pub fn target_velocity(&self) -> Vec2 {
        self.target_velocity
    }

    pub fn set_target_velocity(&mut self, target: Vec2) {
        self.target_velocity = target;
    }

    /// Supporting surface normal. Only meaningful while [`Self::is_grounded`] is true.
    #[inline]
    pub fn ground_normal(&self) -> Vec2 {
        self.ground_normal
    }

    /// Did the last tick find ground?
    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.is_grounded
    }

    #[inline]
    pub fn gravity_modifier(&self) -> f32 {
        self.gravity_modifier
    }

    pub fn set_gravity_modifier(&mut self, modifier: f32) {
        self.gravity_modifier = modifier;
    }

    #[inline]
    pub fn gravity_direction(&self) -> Vec2 {
        self.gravity_direction
    }

    #[inline]
    pub fn min_ground_normal(&self) -> Vec2 {
        self.min_ground_normal
    }

    pub fn set_min_ground_normal(&mut self, threshold: Vec2) {
        self.min_ground_normal = threshold;
    }

    #[inline]
    pub fn filter(&self) -> &ContactFilter {
        &self.filter
    }

    #[inline]
    pub fn gravity_source(&self) -> &SharedGravity {
        &self.gravity
    }

    /// Opposite of the gravity direction.
    #[inline]
    pub fn up(&self) -> Vec2 {
        -self.gravity_direction
    }

    /// Along-ground direction: the ground normal rotated a quarter turn clockwise.
    #[inline]
    pub fn ground_tangent(&self) -> Vec2 {
        Vec2::new(self.ground_normal.y, -self.ground_normal.x)
    }

    /// Reset the target velocity and let `controller` choose this tick's target.
    pub fn compute_velocity<C: VelocityController + ?Sized>(
        &mut self,
        controller: &mut C,
        position: Vec2,
    ) {
        self.target_velocity = Vec2::zeros();
        let mut ctx = ControlContext {
            target_velocity: &mut self.target_velocity,
            velocity: &mut self.velocity,
            is_grounded: self.is_grounded,
            up: -self.gravity_direction,
            position,
        };
        controller.compute_velocity(&mut ctx);
    }

    /// Advance one fixed step of `dt` seconds.
    pub fn fixed_update<B: KinematicBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        dt: f32,
    ) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            log::warn!("body {:?}: ignoring tick with dt = {dt}", self.handle);
            return Ok(());
        }

        log::debug!(
            "body {:?}: target_velocity={:?} velocity={:?} ground_normal={:?}",
            self.handle,
            self.target_velocity,
            self.velocity,
            self.ground_normal
        );

        self.velocity = integrate_gravity(
            self.velocity,
            self.gravity.get(),
            self.gravity_direction,
            self.gravity_modifier,
            dt,
        );
        self.velocity.x = self.target_velocity.x;

        self.is_grounded = false;

        let delta_position = self.velocity * dt;

        let along_ground = self.ground_tangent() * delta_position.x;
        self.perform_movement(backend, along_ground, SweepAxis::Horizontal)?;

        let vertical = Vec2::new(0.0, delta_position.y);
        self.perform_movement(backend, vertical, SweepAxis::Vertical)?;

        Ok(())
    }

    /// Sweep `mv`, let each contact adjust velocity and ground state, then move as far
    /// as the nearest contact allows.
    ///
    /// Moves at or below `min_move_distance` are applied without a sweep. A ground
    /// contact found by the vertical sweep is resolved against its normal with x zeroed,
    /// so landing on a slope never trades horizontal speed for lift.
    fn perform_movement<B: KinematicBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        mv: Vec2,
        axis: SweepAxis,
    ) -> Result<()> {
        let mut distance = mv.norm();

        if distance > self.min_move_distance {
            let count = backend.cast(
                self.handle,
                mv,
                &self.filter,
                distance + self.shell_radius,
                &mut self.hits,
            )?;

            if self.hits.dropped() > 0 {
                log::warn!(
                    "body {:?}: {:?} sweep reported {} contacts past capacity {}, ignoring them",
                    self.handle,
                    axis,
                    self.hits.dropped(),
                    self.hits.capacity()
                );
            }

            let up = self.up();
            let threshold = self.min_ground_normal.norm();

            // The reported count is only trusted up to what the buffer holds.
            let stored = count.min(self.hits.len());
            for i in 0..stored {
                let hit: SweepHit = self.hits.as_slice()[i];
                let mut normal = hit.normal;

                if is_ground_contact(hit.normal, up, threshold) {
                    self.is_grounded = true;
                    if axis == SweepAxis::Vertical {
                        self.ground_normal = hit.normal;
                        // Landing only limits the vertical part of velocity.
                        normal.x = 0.0;
                    }
                }

                self.velocity = resolve_contact_velocity(self.velocity, normal, self.is_grounded);

                let allowed = hit.distance - self.shell_radius;
                if allowed < distance {
                    distance = allowed;
                }

                log::trace!(
                    "body {:?}: {:?} contact normal={:?} distance={} grounded={} -> velocity={:?}",
                    self.handle,
                    axis,
                    hit.normal,
                    hit.distance,
                    self.is_grounded,
                    self.velocity
                );
            }
        }

        let Some(direction) = mv.try_normalize(f32::EPSILON) else {
            return Ok(());
        };
        let position = backend.position(self.handle)?;
        backend.set_position(self.handle, position + direction * distance)
    }

    /// Move to `position` instantly and stop. No collision checks.
    pub fn teleport<B: KinematicBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        position: Vec2,
    ) -> Result<()> {
        backend.set_position(self.handle, position)?;
        self.velocity = Vec2::zeros();
        backend.clear_velocity(self.handle)
    }

    /// Point gravity along `new_direction`.
    ///
    /// Stores the normalized direction on this body and writes `new_direction * 9.8`
    /// into the shared gravity source, which every body sharing it will see.
    pub fn shift_gravity(&mut self, new_direction: Vec2) -> Result<()> {
        let Some(direction) = new_direction
            .try_normalize(f32::EPSILON)
            .filter(|d| d.x.is_finite() && d.y.is_finite())
        else {
            return Err(KinematicError::NonFinite {
                what: "gravity direction",
            });
        };

        self.gravity_direction = direction;
        self.gravity.set(new_direction * GRAVITY_MAGNITUDE);

        log::info!(
            "body {:?}: gravity shifted to {:?} (shared vector {:?})",
            self.handle,
            self.gravity_direction,
            self.gravity.get()
        );
        Ok(())
    }
}

/// A contact is ground when its normal is aligned with `up` by more than `threshold`.
#[inline]
pub fn is_ground_contact(normal: Vec2, up: Vec2, threshold: f32) -> bool {
    normal.dot(&up) > threshold
}

/// Velocity after touching a surface with `normal`.
///
/// - Grounded: only a component pointing into the surface is removed, so the body
///   keeps sliding along it.
/// - Not grounded (wall or ceiling): the whole component along the normal is removed,
///   whatever its sign. Nothing bounces.
#[inline]
pub fn resolve_contact_velocity(velocity: Vec2, normal: Vec2, grounded: bool) -> Vec2 {
    let projection = velocity.dot(&normal);
    if grounded {
        if projection < 0.0 {
            velocity - normal * projection
        } else {
            velocity
        }
    } else {
        velocity - normal * projection
    }
}
