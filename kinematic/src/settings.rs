/*!
Kinematic body settings and tolerances.

These settings centralize the parameters used by the per-tick integrator, the
swept-move resolver, and the fixed-step host. Defaults come from
[`crate::constants`]; override them per body from game data, e.g. a TOML file:

```toml
gravity_modifier = 2.0
gravity_direction = [0.0, -1.0]
min_ground_normal = [0.65, 0.65]
shell_radius = 0.01
min_move_distance = 0.001
hit_capacity = 16
```

Notes
- Distances are in meters, time in seconds.
- Any missing key falls back to its default.
*/

use serde::{Deserialize, Serialize};

use crate::{
    Vec2,
    constants::{
        DEFAULT_FIXED_DT, DEFAULT_GRAVITY_DIRECTION, DEFAULT_GRAVITY_MODIFIER,
        DEFAULT_MAX_SUBSTEPS, DEFAULT_MIN_GROUND_NORMAL, HIT_BUFFER_CAPACITY, MIN_MOVE_DISTANCE,
        SHELL_RADIUS,
    },
    error::{KinematicError, Result},
};

/// Per-body tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodySettings {
    /// Gravity coefficient applied while the body is already moving with gravity.
    pub gravity_modifier: f32,
    /// Direction gravity pulls this body in. Normalized on load.
    pub gravity_direction: Vec2,
    /// Only the length is used: minimum `dot(normal, up)` for a contact to count as ground.
    pub min_ground_normal: Vec2,
    /// Skin kept between the body and surfaces (meters).
    pub shell_radius: f32,
    /// Moves at or below this length are skipped entirely (meters).
    pub min_move_distance: f32,
    /// Maximum contacts processed per sweep. Extra contacts are dropped.
    pub hit_capacity: usize,
}

impl Default for BodySettings {
    fn default() -> Self {
        Self {
            gravity_modifier: DEFAULT_GRAVITY_MODIFIER,
            gravity_direction: Vec2::from(DEFAULT_GRAVITY_DIRECTION),
            min_ground_normal: Vec2::from(DEFAULT_MIN_GROUND_NORMAL),
            shell_radius: SHELL_RADIUS,
            min_move_distance: MIN_MOVE_DISTANCE,
            hit_capacity: HIT_BUFFER_CAPACITY,
        }
    }
}

impl BodySettings {
    /// Parse and validate settings from TOML. The gravity direction is normalized.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let mut settings: Self = toml::from_str(src)?;
        settings.validate()?;
        settings.gravity_direction = settings.gravity_direction.normalize();
        Ok(settings)
    }

    /// Reject values the integrator cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.gravity_modifier.is_finite() {
            return Err(invalid("gravity_modifier", "must be finite"));
        }
        let dir_len_sq = self.gravity_direction.norm_squared();
        if !dir_len_sq.is_finite() || dir_len_sq <= f32::EPSILON {
            return Err(invalid("gravity_direction", "must be a finite, non-zero vector"));
        }
        if !self.min_ground_normal.norm_squared().is_finite() {
            return Err(invalid("min_ground_normal", "must be finite"));
        }
        if !(self.shell_radius.is_finite() && self.shell_radius >= 0.0) {
            return Err(invalid("shell_radius", "must be finite and >= 0"));
        }
        if !(self.min_move_distance.is_finite() && self.min_move_distance >= 0.0) {
            return Err(invalid("min_move_distance", "must be finite and >= 0"));
        }
        if self.hit_capacity == 0 {
            return Err(invalid("hit_capacity", "must be at least 1"));
        }
        Ok(())
    }
}

/// Fixed-step host configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Duration of one fixed tick (seconds).
    pub fixed_dt: f32,
    /// Cap on ticks run per `advance` call; leftover time is discarded.
    pub max_substeps: u32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            fixed_dt: DEFAULT_FIXED_DT,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
        }
    }
}

impl SimulationSettings {
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let settings: Self = toml::from_str(src)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_dt.is_finite() && self.fixed_dt > 0.0) {
            return Err(invalid("fixed_dt", "must be finite and > 0"));
        }
        if self.max_substeps == 0 {
            return Err(invalid("max_substeps", "must be at least 1"));
        }
        Ok(())
    }
}

#[inline]
fn invalid(field: &'static str, reason: &'static str) -> KinematicError {
    KinematicError::InvalidSettings { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let s = BodySettings::default();
        assert_eq!(s.shell_radius, 0.01);
        assert_eq!(s.min_move_distance, 0.001);
        assert_eq!(s.hit_capacity, 16);
        assert_eq!(s.gravity_direction, Vec2::new(0.0, -1.0));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn toml_overrides_and_normalizes_direction() {
        let s = BodySettings::from_toml_str(
            r#"
            gravity_modifier = 2.5
            gravity_direction = [3.0, 4.0]
            hit_capacity = 4
            "#,
        )
        .unwrap();

        assert_eq!(s.gravity_modifier, 2.5);
        assert_eq!(s.hit_capacity, 4);
        assert!((s.gravity_direction - Vec2::new(0.6, 0.8)).norm() < 1.0e-6);
        // Untouched keys keep their defaults.
        assert_eq!(s.shell_radius, SHELL_RADIUS);
    }

    #[test]
    fn rejects_zero_gravity_direction() {
        let err = BodySettings::from_toml_str("gravity_direction = [0.0, 0.0]").unwrap_err();
        assert!(matches!(
            err,
            KinematicError::InvalidSettings {
                field: "gravity_direction",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_hit_capacity() {
        let s = BodySettings {
            hit_capacity: 0,
            ..BodySettings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = BodySettings::from_toml_str("shell_radius = \"wide\"").unwrap_err();
        assert!(matches!(err, KinematicError::SettingsParse(_)));
    }

    #[test]
    fn simulation_settings_require_positive_step() {
        assert!(SimulationSettings::default().validate().is_ok());
        let err = SimulationSettings::from_toml_str("fixed_dt = 0.0").unwrap_err();
        assert!(matches!(
            err,
            KinematicError::InvalidSettings {
                field: "fixed_dt",
                ..
            }
        ));
    }
}
