/// Gap kept between a body and any surface it lands on or slides along (meters).
///
/// Casts are extended by this amount so a body resting exactly on a surface still
/// reports the contact, and every resolved move stops this far short of the hit.
pub const SHELL_RADIUS: f32 = 0.01;

/// Moves whose length is at or below this are not swept (meters).
pub const MIN_MOVE_DISTANCE: f32 = 0.001;

/// Default number of contacts a single sweep can report.
pub const HIT_BUFFER_CAPACITY: usize = 16;

/// Magnitude used when a gravity direction is turned into a gravity vector (m/s^2).
pub const GRAVITY_MAGNITUDE: f32 = 9.8;

/// Default gravity coefficient applied while a body is falling.
pub const DEFAULT_GRAVITY_MODIFIER: f32 = 1.0;

/// Default ground threshold vector. Only its length matters: a contact counts as
/// ground when `dot(normal, up)` exceeds it (~0.919, i.e. slopes under ~23 degrees).
pub const DEFAULT_MIN_GROUND_NORMAL: [f32; 2] = [0.65, 0.65];

/// Default gravity direction (straight down).
pub const DEFAULT_GRAVITY_DIRECTION: [f32; 2] = [0.0, -1.0];

/// Default fixed simulation step (seconds).
pub const DEFAULT_FIXED_DT: f32 = 1.0 / 50.0;

/// Upper bound on fixed steps run for a single `Simulation::advance` call.
/// Prevents a long frame hitch from turning into a spiral of catch-up ticks.
pub const DEFAULT_MAX_SUBSTEPS: u32 = 8;
