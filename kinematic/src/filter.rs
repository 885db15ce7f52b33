//! Layer-based contact filtering.
//!
//! Every collider sits on one of 32 layers. A [`LayerCollisionMatrix`] says which
//! layer pairs interact, and a body derives its [`ContactFilter`] from its own
//! layer once, when it is created. Trigger volumes are ignored unless the filter
//! opts in. Layers past the last one are rejected with
//! [`KinematicError::InvalidLayer`].

use crate::error::{KinematicError, Result};

/// Number of addressable layers.
pub const LAYER_COUNT: usize = 32;

/// Bit set of layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const ALL: LayerMask = LayerMask(u32::MAX);
    pub const NONE: LayerMask = LayerMask(0);

    /// Mask containing a single layer.
    #[inline]
    pub fn of(layer: u8) -> Result<Self> {
        index(layer).map(|i| LayerMask(1u32 << i))
    }

    /// Out-of-range layers are never contained.
    #[inline]
    pub fn contains(self, layer: u8) -> bool {
        Self::of(layer).is_ok_and(|bit| self.0 & bit.0 != 0)
    }
}

/// Symmetric table of which layers collide with each other. Everything collides by default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerCollisionMatrix {
    rows: [u32; LAYER_COUNT],
}

impl Default for LayerCollisionMatrix {
    fn default() -> Self {
        Self {
            rows: [u32::MAX; LAYER_COUNT],
        }
    }
}

impl LayerCollisionMatrix {
    /// Enable or disable collisions between layers `a` and `b` (both directions).
    pub fn set_collides(&mut self, a: u8, b: u8, collides: bool) -> Result<()> {
        let (ia, ib) = (index(a)?, index(b)?);
        if collides {
            self.rows[ia] |= 1 << ib;
            self.rows[ib] |= 1 << ia;
        } else {
            self.rows[ia] &= !(1 << ib);
            self.rows[ib] &= !(1 << ia);
        }
        Ok(())
    }

    /// Layers that `layer` collides with.
    #[inline]
    pub fn mask_for(&self, layer: u8) -> Result<LayerMask> {
        Ok(LayerMask(self.rows[index(layer)?]))
    }
}

/// What a body's sweeps are allowed to hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactFilter {
    pub layer_mask: LayerMask,
    /// Report trigger (sensor) colliders as contacts.
    pub use_triggers: bool,
}

impl Default for ContactFilter {
    fn default() -> Self {
        Self {
            layer_mask: LayerMask::ALL,
            use_triggers: false,
        }
    }
}

impl ContactFilter {
    /// Filter for a body living on `layer`: collides with whatever the matrix allows,
    /// never with triggers.
    pub fn for_layer(layer: u8, matrix: &LayerCollisionMatrix) -> Result<Self> {
        Ok(Self {
            layer_mask: matrix.mask_for(layer)?,
            use_triggers: false,
        })
    }
}

#[inline]
fn index(layer: u8) -> Result<usize> {
    let i = layer as usize;
    if i < LAYER_COUNT {
        Ok(i)
    } else {
        Err(KinematicError::InvalidLayer(layer))
    }
}
