/*!
Seam between the kinematic integrator and whatever owns body positions.

The integrator never stores a position. It reads and writes it through a
[`KinematicBackend`], and asks the same backend to sweep the body's shape
along a move. [`crate::scene::RapierScene`] is the rapier2d implementation.
*/

use crate::{Vec2, error::Result, filter::ContactFilter};

/// Opaque identifier of a body inside a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

/// One contact reported by a sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepHit {
    /// Surface normal at the contact, pointing out of the obstacle toward the body.
    pub normal: Vec2,
    /// Distance travelled along the (unit) cast direction before touching.
    pub distance: f32,
}

/// Fixed-capacity contact buffer reused across sweeps.
///
/// Pushing past capacity drops the contact and counts it; the integrator logs the
/// overflow and carries on with the contacts it has.
#[derive(Clone, Debug)]
pub struct HitBuffer {
    hits: Vec<SweepHit>,
    capacity: usize,
    dropped: usize,
}

impl HitBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hits: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Contacts that did not fit during the last fill.
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn clear(&mut self) {
        self.hits.clear();
        self.dropped = 0;
    }

    /// Returns false (and counts a drop) when the buffer is already full.
    pub fn push(&mut self, hit: SweepHit) -> bool {
        if self.hits.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.hits.push(hit);
        true
    }

    #[inline]
    pub fn as_slice(&self) -> &[SweepHit] {
        &self.hits
    }
}

/// Positioning and swept-query service for kinematic bodies.
///
/// Calls are synchronous and never reentrant for the same body.
pub trait KinematicBackend {
    /// Authoritative position of `body`.
    fn position(&self, body: BodyHandle) -> Result<Vec2>;

    /// Place `body` at `position` without any collision checks.
    fn set_position(&mut self, body: BodyHandle, position: Vec2) -> Result<()>;

    /// Sweep `body`'s shape from its current position along `direction` (any length,
    /// only the direction is used) up to `max_distance`.
    ///
    /// Clears `hits`, fills it with admitted contacts ordered by distance, and returns
    /// how many were stored.
    fn cast(
        &self,
        body: BodyHandle,
        direction: Vec2,
        filter: &ContactFilter,
        max_distance: f32,
        hits: &mut HitBuffer,
    ) -> Result<usize>;

    /// Drop any velocity the backend itself tracks for `body`.
    fn clear_velocity(&mut self, _body: BodyHandle) -> Result<()> {
        Ok(())
    }
}

/// Fill `hits` from an unsorted contact list: nearest first, truncated to capacity.
pub fn fill_sorted(hits: &mut HitBuffer, mut found: Vec<SweepHit>) -> usize {
    hits.clear();
    found.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    for hit in found {
        hits.push(hit);
    }
    hits.len()
}

#[cfg(test)]
pub(crate) mod scripted {
    //! In-memory backend that replays a scripted list of contacts per sweep.

    use std::collections::VecDeque;

    use super::*;
    use crate::error::KinematicError;

    #[derive(Clone, Copy, Debug)]
    pub struct RecordedCast {
        pub direction: Vec2,
        pub max_distance: f32,
    }

    pub struct ScriptedBackend {
        pub position: Vec2,
        pub handle: Option<BodyHandle>,
        /// Contacts for each successive cast; an exhausted script means "no contacts".
        pub script: VecDeque<Vec<SweepHit>>,
        pub casts: std::cell::RefCell<Vec<RecordedCast>>,
        pub velocity_cleared: bool,
        cursor: std::cell::Cell<usize>,
    }

    impl ScriptedBackend {
        pub fn new(handle: BodyHandle, position: Vec2) -> Self {
            Self {
                position,
                handle: Some(handle),
                script: VecDeque::new(),
                casts: std::cell::RefCell::new(Vec::new()),
                velocity_cleared: false,
                cursor: std::cell::Cell::new(0),
            }
        }

        pub fn then(mut self, hits: Vec<SweepHit>) -> Self {
            self.script.push_back(hits);
            self
        }

        fn check(&self, body: BodyHandle) -> Result<()> {
            if self.handle == Some(body) {
                Ok(())
            } else {
                Err(KinematicError::UnknownBody(body))
            }
        }
    }

    impl KinematicBackend for ScriptedBackend {
        fn position(&self, body: BodyHandle) -> Result<Vec2> {
            self.check(body)?;
            Ok(self.position)
        }

        fn set_position(&mut self, body: BodyHandle, position: Vec2) -> Result<()> {
            self.check(body)?;
            self.position = position;
            Ok(())
        }

        fn cast(
            &self,
            body: BodyHandle,
            direction: Vec2,
            _filter: &ContactFilter,
            max_distance: f32,
            hits: &mut HitBuffer,
        ) -> Result<usize> {
            self.check(body)?;
            self.casts.borrow_mut().push(RecordedCast {
                direction,
                max_distance,
            });
            let i = self.cursor.get();
            self.cursor.set(i + 1);
            let found = self.script.get(i).cloned().unwrap_or_default();
            // Keep scripted order; only capacity applies.
            hits.clear();
            for hit in found {
                hits.push(hit);
            }
            Ok(hits.len())
        }

        fn clear_velocity(&mut self, body: BodyHandle) -> Result<()> {
            self.check(body)?;
            self.velocity_cleared = true;
            Ok(())
        }
    }
}
