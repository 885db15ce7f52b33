//! Per-tick velocity sources.
//!
//! The host calls [`VelocityController::compute_velocity`] once per tick, right after
//! the body's target velocity has been reset to zero and before gravity is integrated.
//! Controllers decide how input or AI turns into a target velocity; the integrator
//! only ever reads `target_velocity.x`.

use crate::Vec2;

/// What a controller can see and change for one tick.
pub struct ControlContext<'a> {
    /// Desired velocity for this tick. Starts at zero.
    pub target_velocity: &'a mut Vec2,
    /// Current velocity. Writable so controllers can launch jumps.
    pub velocity: &'a mut Vec2,
    /// Ground state from the previous tick.
    pub is_grounded: bool,
    /// Opposite of the body's gravity direction.
    pub up: Vec2,
    pub position: Vec2,
}

/// Produces a body's target velocity once per tick.
pub trait VelocityController {
    fn compute_velocity(&mut self, ctx: &mut ControlContext<'_>);
}

impl<T: VelocityController + ?Sized> VelocityController for Box<T> {
    fn compute_velocity(&mut self, ctx: &mut ControlContext<'_>) {
        (**self).compute_velocity(ctx)
    }
}

/// Leaves the target at zero: the body only falls and rests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stationary;

impl VelocityController for Stationary {
    fn compute_velocity(&mut self, _ctx: &mut ControlContext<'_>) {}
}

/// Player input for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlayerInput {
    /// Horizontal axis in `[-1, 1]`.
    pub horizontal: f32,
    /// Jump pressed this frame.
    pub jump_pressed: bool,
    /// Jump released this frame.
    pub jump_released: bool,
}

/// Input-driven controller with variable-height jumps.
#[derive(Clone, Debug)]
pub struct PlayerController {
    pub max_speed: f32,
    /// Speed along `up` given at takeoff.
    pub jump_take_off_speed: f32,
    /// Factor applied to upward speed when jump is released early.
    pub jump_cut_modifier: f32,
    pub controls_enabled: bool,
    input: PlayerInput,
}

impl Default for PlayerController {
    fn default() -> Self {
        Self {
            max_speed: 7.0,
            jump_take_off_speed: 7.0,
            jump_cut_modifier: 0.5,
            controls_enabled: true,
            input: PlayerInput::default(),
        }
    }
}

impl PlayerController {
    /// Latch input for the next tick. Edge-triggered flags stay set until consumed.
    pub fn set_input(&mut self, input: PlayerInput) {
        self.input.horizontal = input.horizontal.clamp(-1.0, 1.0);
        self.input.jump_pressed |= input.jump_pressed;
        self.input.jump_released |= input.jump_released;
    }
}

impl VelocityController for PlayerController {
    fn compute_velocity(&mut self, ctx: &mut ControlContext<'_>) {
        let input = std::mem::take(&mut self.input);
        if !self.controls_enabled {
            return;
        }

        let rising = ctx.velocity.dot(&ctx.up);
        if input.jump_pressed && ctx.is_grounded {
            *ctx.velocity += ctx.up * (self.jump_take_off_speed - rising);
        } else if input.jump_released && rising > 0.0 {
            *ctx.velocity -= ctx.up * (rising * (1.0 - self.jump_cut_modifier));
        }

        ctx.target_velocity.x = input.horizontal * self.max_speed;
    }
}

/// Walks back and forth between two x coordinates.
#[derive(Clone, Debug)]
pub struct PatrolController {
    pub min_x: f32,
    pub max_x: f32,
    pub speed: f32,
    heading: f32,
}

impl PatrolController {
    pub fn new(a: f32, b: f32, speed: f32) -> Self {
        Self {
            min_x: a.min(b),
            max_x: a.max(b),
            speed: speed.abs(),
            heading: 1.0,
        }
    }

    /// +1 when walking toward `max_x`, -1 toward `min_x`.
    #[inline]
    pub fn heading(&self) -> f32 {
        self.heading
    }
}

impl VelocityController for PatrolController {
    fn compute_velocity(&mut self, ctx: &mut ControlContext<'_>) {
        if ctx.position.x >= self.max_x {
            self.heading = -1.0;
        } else if ctx.position.x <= self.min_x {
            self.heading = 1.0;
        }
        ctx.target_velocity.x = self.heading * self.speed;
    }
}
