pub mod backend;
pub mod body;
pub mod constants;
pub mod controller;
pub mod error;
pub mod filter;
pub mod gravity;
pub mod scene;
pub mod settings;
pub mod simulation;

// Re-export Rapier so hosts can build scenes without depending on `rapier2d` directly.
pub use rapier2d;

/// 2D vector in meters (positions) or meters per second (velocities).
pub type Vec2 = nalgebra::Vector2<f32>;

pub use backend::{BodyHandle, HitBuffer, KinematicBackend, SweepHit};
pub use body::{KinematicBody, SweepAxis, is_ground_contact, resolve_contact_velocity};
pub use constants::{
    DEFAULT_FIXED_DT, DEFAULT_MAX_SUBSTEPS, GRAVITY_MAGNITUDE, HIT_BUFFER_CAPACITY,
    MIN_MOVE_DISTANCE, SHELL_RADIUS,
};
pub use controller::{
    ControlContext, PatrolController, PlayerController, PlayerInput, Stationary,
    VelocityController,
};
pub use error::{KinematicError, Result};
pub use filter::{ContactFilter, LayerCollisionMatrix, LayerMask};
pub use gravity::{SharedGravity, integrate_gravity};
pub use scene::{BodyDef, RapierScene, ShapeDef, StaticDef};
pub use settings::{BodySettings, SimulationSettings};
pub use simulation::Simulation;
