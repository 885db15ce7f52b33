use thiserror::Error;

use crate::BodyHandle;

/// Errors surfaced by the kinematic layer.
///
/// The per-tick math never fails on its own; errors come from configuration,
/// from degenerate inputs at the API boundary, or from the backend not knowing
/// about a body.
#[derive(Debug, Error)]
pub enum KinematicError {
    #[error("no kinematic body registered for handle {0:?}")]
    UnknownBody(BodyHandle),

    #[error("body {0:?} has no collider attached, it cannot be swept")]
    MissingCollider(BodyHandle),

    #[error("invalid setting `{field}`: {reason}")]
    InvalidSettings {
        field: &'static str,
        reason: &'static str,
    },

    #[error("failed to parse settings: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("collision layer {0} is out of range (0..=31)")]
    InvalidLayer(u8),

    #[error("{what} must be finite and non-zero")]
    NonFinite { what: &'static str },
}

pub type Result<T, E = KinematicError> = std::result::Result<T, E>;
