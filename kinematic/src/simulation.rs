//! Fixed-step host for kinematic bodies.
//!
//! Frame time is accumulated and spent in whole fixed steps. Every step runs, for
//! each enabled body in insertion order:
//! 1. target velocity reset and the body's controller,
//! 2. the fixed tick (gravity, two sweeps, contact resolution).
//!
//! Bodies never see each other's state mid-step except through the scene, which
//! always holds the latest positions.

use crate::{
    Vec2,
    backend::{BodyHandle, KinematicBackend},
    body::KinematicBody,
    controller::VelocityController,
    error::{KinematicError, Result},
    filter::{ContactFilter, LayerCollisionMatrix},
    gravity::SharedGravity,
    scene::{BodyDef, RapierScene},
    settings::{BodySettings, SimulationSettings},
};

struct Entry<C> {
    body: KinematicBody,
    controller: C,
    enabled: bool,
}

pub struct Simulation<C> {
    settings: SimulationSettings,
    scene: RapierScene,
    gravity: SharedGravity,
    matrix: LayerCollisionMatrix,
    entries: Vec<Entry<C>>,
    accumulator: f32,
    ticks: u64,
}

impl<C: VelocityController> Simulation<C> {
    pub fn new(settings: SimulationSettings, scene: RapierScene) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            scene,
            gravity: SharedGravity::default(),
            matrix: LayerCollisionMatrix::default(),
            entries: Vec::new(),
            accumulator: 0.0,
            ticks: 0,
        })
    }

    /// Layer matrix used to build filters for bodies added afterwards.
    pub fn with_collision_matrix(mut self, matrix: LayerCollisionMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    /// Insert a body into the scene and drive it with `controller`. Bodies start enabled.
    pub fn add_body(
        &mut self,
        def: &BodyDef,
        settings: &BodySettings,
        controller: C,
    ) -> Result<BodyHandle> {
        // Validate before touching the scene so a bad config leaves no orphan body.
        settings.validate()?;
        let filter = ContactFilter::for_layer(def.layer, &self.matrix)?;
        let handle = self.scene.add_body(def)?;
        let body = KinematicBody::new(handle, settings, filter, self.gravity.clone())?;

        self.entries.push(Entry {
            body,
            controller,
            enabled: true,
        });
        log::info!("simulation: body {handle:?} added on layer {}", def.layer);
        Ok(handle)
    }

    /// Accumulate `frame_dt` seconds and run as many fixed steps as fit, up to
    /// `max_substeps`. Returns the number of steps run.
    ///
    /// Time left over after hitting the clamp is discarded.
    pub fn advance(&mut self, frame_dt: f32) -> Result<u32> {
        if !(frame_dt.is_finite() && frame_dt >= 0.0) {
            log::warn!("simulation: ignoring frame with dt = {frame_dt}");
            return Ok(0);
        }

        self.accumulator += frame_dt;
        let mut steps = 0;
        while self.accumulator >= self.settings.fixed_dt && steps < self.settings.max_substeps {
            self.step()?;
            self.accumulator -= self.settings.fixed_dt;
            steps += 1;
        }

        if self.accumulator >= self.settings.fixed_dt {
            log::warn!(
                "simulation: {steps} substeps reached, dropping {:.4}s of frame time",
                self.accumulator
            );
            self.accumulator = 0.0;
        }
        Ok(steps)
    }

    /// Run exactly one fixed step.
    pub fn step(&mut self) -> Result<()> {
        let dt = self.settings.fixed_dt;
        for entry in self.entries.iter_mut().filter(|e| e.enabled) {
            let position = self.scene.position(entry.body.handle())?;
            entry.body.compute_velocity(&mut entry.controller, position);
            entry.body.fixed_update(&mut self.scene, dt)?;
        }
        self.ticks += 1;
        Ok(())
    }

    pub fn teleport(&mut self, handle: BodyHandle, position: Vec2) -> Result<()> {
        let entry = Self::entry_mut(&mut self.entries, handle)?;
        entry.body.teleport(&mut self.scene, position)
    }

    pub fn shift_gravity(&mut self, handle: BodyHandle, direction: Vec2) -> Result<()> {
        Self::entry_mut(&mut self.entries, handle)?
            .body
            .shift_gravity(direction)
    }

    /// Disabled bodies are skipped by [`Simulation::step`] and switched to dynamic in the
    /// scene. Nothing steps the scene, so they freeze in place.
    pub fn set_enabled(&mut self, handle: BodyHandle, enabled: bool) -> Result<()> {
        let entry = Self::entry_mut(&mut self.entries, handle)?;
        if entry.enabled == enabled {
            return Ok(());
        }
        self.scene.set_enabled(handle, enabled)?;
        entry.enabled = enabled;
        log::info!(
            "simulation: body {handle:?} {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub fn is_enabled(&self, handle: BodyHandle) -> Option<bool> {
        self.entry(handle).map(|e| e.enabled)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&KinematicBody> {
        self.entry(handle).map(|e| &e.body)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut KinematicBody> {
        Self::entry_mut(&mut self.entries, handle)
            .ok()
            .map(|e| &mut e.body)
    }

    pub fn controller_mut(&mut self, handle: BodyHandle) -> Option<&mut C> {
        Self::entry_mut(&mut self.entries, handle)
            .ok()
            .map(|e| &mut e.controller)
    }

    pub fn position(&self, handle: BodyHandle) -> Result<Vec2> {
        self.scene.position(handle)
    }

    #[inline]
    pub fn scene(&self) -> &RapierScene {
        &self.scene
    }

    #[inline]
    pub fn gravity(&self) -> &SharedGravity {
        &self.gravity
    }

    #[inline]
    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Fixed steps run so far.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Fraction of a fixed step left in the accumulator, for render interpolation.
    #[inline]
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.settings.fixed_dt
    }

    fn entry(&self, handle: BodyHandle) -> Option<&Entry<C>> {
        self.entries.iter().find(|e| e.body.handle() == handle)
    }

    fn entry_mut(entries: &mut [Entry<C>], handle: BodyHandle) -> Result<&mut Entry<C>> {
        entries
            .iter_mut()
            .find(|e| e.body.handle() == handle)
            .ok_or(KinematicError::UnknownBody(handle))
    }
}
