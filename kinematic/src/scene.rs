//! Rapier-backed scene: owns body positions and answers swept-shape queries.
//!
//! Design goals
//! - Deterministic: static definitions are inserted sorted by `id`.
//! - Query-only: nothing is stepped. Kinematic bodies are moved by
//!   [`KinematicBackend::set_position`], which also moves their collider and refreshes
//!   the broad phase, so queries always see current poses.
//! - Layers are collision groups: a collider's membership is its layer, and a sweep's
//!   [`QueryFilter`] carries the body's layer mask.
//! - A sweep culls candidates with the borrowed [`QueryPipeline`], then runs parry's
//!   `cast_shapes` on each candidate so every contact is reported, not just the first.

use rapier2d::{
    na::Isometry2,
    parry::query::{self, ShapeCastOptions},
    prelude::*,
};

use crate::{
    Vec2,
    backend::{BodyHandle, HitBuffer, KinematicBackend, SweepHit, fill_sorted},
    error::{KinematicError, Result},
    filter::{ContactFilter, LayerMask},
};

/// Collider shape parameters, in meters.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeDef {
    /// Infinite half-space. Its outward normal is `rotation * +Y`.
    HalfSpace,
    Cuboid { half_extents: Vec2 },
    Ball { radius: f32 },
    /// Y-aligned capsule.
    CapsuleY { radius: f32, half_height: f32 },
    /// Segment between two local points.
    Segment { a: Vec2, b: Vec2 },
}

/// Immutable world collider.
#[derive(Clone, Debug)]
pub struct StaticDef {
    /// Stable identifier used to fix insertion order.
    pub id: u32,
    pub translation: Vec2,
    /// Rotation in radians.
    pub rotation: f32,
    pub shape: ShapeDef,
    pub layer: u8,
    /// Trigger volumes are skipped by sweeps unless the filter asks for them.
    pub is_trigger: bool,
}

/// A kinematic body to insert into the scene.
#[derive(Clone, Debug)]
pub struct BodyDef {
    pub translation: Vec2,
    pub shape: ShapeDef,
    pub layer: u8,
}

#[derive(Clone, Copy, Debug)]
struct BodyEntry {
    rigid_body: RigidBodyHandle,
    collider: ColliderHandle,
}

/// Rigid bodies, colliders and the broad phase for one level.
pub struct RapierScene {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    entries: Vec<BodyEntry>,
}

impl Default for RapierScene {
    fn default() -> Self {
        Self::new()
    }
}

impl RapierScene {
    pub fn new() -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            entries: Vec::new(),
        }
    }

    /// Build a scene from static definitions, inserted in `id` order.
    pub fn build(mut defs: Vec<StaticDef>) -> Result<Self> {
        defs.sort_by_key(|d| d.id);

        let mut scene = Self::new();
        let mut inserted = Vec::with_capacity(defs.len());
        for def in &defs {
            inserted.push(scene.insert_static(def)?);
        }
        scene.refresh(&inserted);
        Ok(scene)
    }

    /// Insert one immutable collider (no parent body).
    pub fn add_static(&mut self, def: &StaticDef) -> Result<ColliderHandle> {
        let handle = self.insert_static(def)?;
        self.refresh(&[handle]);
        Ok(handle)
    }

    fn insert_static(&mut self, def: &StaticDef) -> Result<ColliderHandle> {
        let mut collider = collider_from_shape(&def.shape, def.layer)?
            .sensor(def.is_trigger)
            .build();
        collider.set_position(Isometry2::new(def.translation, def.rotation));
        Ok(self.colliders.insert(collider))
    }

    /// Insert a kinematic body with a single collider and return its handle.
    pub fn add_body(&mut self, def: &BodyDef) -> Result<BodyHandle> {
        let collider = collider_from_shape(&def.shape, def.layer)?.build();

        let rb = RigidBodyBuilder::kinematic_position_based()
            .translation(def.translation)
            .build();
        let rigid_body = self.bodies.insert(rb);
        let collider = self
            .colliders
            .insert_with_parent(collider, rigid_body, &mut self.bodies);
        self.refresh(&[collider]);

        let handle = BodyHandle(self.entries.len() as u32);
        self.entries.push(BodyEntry {
            rigid_body,
            collider,
        });
        log::debug!("scene: added body {handle:?} at {:?}", def.translation);
        Ok(handle)
    }

    /// Number of kinematic bodies added so far.
    pub fn body_count(&self) -> usize {
        self.entries.len()
    }

    /// Enabled bodies are kinematic, disabled ones are switched to dynamic. The scene is
    /// never stepped, so a disabled body stays where it is and still blocks sweeps.
    pub fn set_enabled(&mut self, body: BodyHandle, enabled: bool) -> Result<()> {
        let entry = self.entry(body)?;
        let rb = self
            .bodies
            .get_mut(entry.rigid_body)
            .ok_or(KinematicError::UnknownBody(body))?;
        let body_type = if enabled {
            RigidBodyType::KinematicPositionBased
        } else {
            RigidBodyType::Dynamic
        };
        rb.set_body_type(body_type, true);
        Ok(())
    }

    pub fn is_kinematic(&self, body: BodyHandle) -> Result<bool> {
        let entry = self.entry(body)?;
        self.bodies
            .get(entry.rigid_body)
            .map(|rb| rb.is_kinematic())
            .ok_or(KinematicError::UnknownBody(body))
    }

    /// Linear velocity stored on the rigid body.
    pub fn linear_velocity(&self, body: BodyHandle) -> Result<Vec2> {
        let entry = self.entry(body)?;
        let rb = self
            .bodies
            .get(entry.rigid_body)
            .ok_or(KinematicError::UnknownBody(body))?;
        let v = rb.linvel();
        Ok(Vec2::new(v.x, v.y))
    }

    pub fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) -> Result<()> {
        let entry = self.entry(body)?;
        let rb = self
            .bodies
            .get_mut(entry.rigid_body)
            .ok_or(KinematicError::UnknownBody(body))?;
        rb.set_linvel(velocity, true);
        Ok(())
    }

    /// Borrowed query pipeline over the current broad phase.
    pub fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }

    #[inline]
    fn entry(&self, body: BodyHandle) -> Result<BodyEntry> {
        self.entries
            .get(body.0 as usize)
            .copied()
            .ok_or(KinematicError::UnknownBody(body))
    }

    /// Push the current AABBs of `modified` colliders into the broad phase.
    fn refresh(&mut self, modified: &[ColliderHandle]) {
        let mut events = Vec::new();
        self.broad_phase.update(
            &IntegrationParameters::default(),
            &self.colliders,
            &self.bodies,
            modified,
            &[],
            &mut events,
        );
    }
}

impl KinematicBackend for RapierScene {
    fn position(&self, body: BodyHandle) -> Result<Vec2> {
        let entry = self.entry(body)?;
        let rb = self
            .bodies
            .get(entry.rigid_body)
            .ok_or(KinematicError::UnknownBody(body))?;
        let t = rb.translation();
        Ok(Vec2::new(t.x, t.y))
    }

    fn set_position(&mut self, body: BodyHandle, position: Vec2) -> Result<()> {
        let entry = self.entry(body)?;
        let rb = self
            .bodies
            .get_mut(entry.rigid_body)
            .ok_or(KinematicError::UnknownBody(body))?;
        rb.set_translation(position, true);

        // Without a pipeline step the attached collider is not synced to its parent.
        let collider = self
            .colliders
            .get_mut(entry.collider)
            .ok_or(KinematicError::MissingCollider(body))?;
        collider.set_translation(position);
        self.refresh(&[entry.collider]);
        Ok(())
    }

    fn cast(
        &self,
        body: BodyHandle,
        direction: Vec2,
        filter: &ContactFilter,
        max_distance: f32,
        hits: &mut HitBuffer,
    ) -> Result<usize> {
        hits.clear();
        let entry = self.entry(body)?;
        let Some(dir) = direction.try_normalize(f32::EPSILON) else {
            return Ok(0);
        };
        let max_distance = max_distance.max(0.0);

        let caster = self
            .colliders
            .get(entry.collider)
            .ok_or(KinematicError::MissingCollider(body))?;
        let caster_pose = *caster.position();
        let mut end_pose = caster_pose;
        end_pose.translation.vector += dir * max_distance;
        let swept = caster.compute_swept_aabb(&end_pose);

        let mut opts = ShapeCastOptions::with_max_time_of_impact(max_distance);
        opts.stop_at_penetration = true;

        let pipeline = self.query_pipeline(query_filter(entry.rigid_body, filter));
        let mut found = Vec::new();
        for (_handle, other) in pipeline.intersect_aabb_conservative(swept) {
            let other_pose = *other.position();

            // The cast direction is unit length, so time of impact is a distance.
            if let Ok(Some(hit)) = query::cast_shapes(
                &caster_pose,
                &dir,
                caster.shape(),
                &other_pose,
                &Vec2::zeros(),
                other.shape(),
                opts,
            ) {
                // normal2 is the obstacle's outward normal in its local frame.
                let normal = other_pose.rotation * hit.normal2.into_inner();
                found.push(SweepHit {
                    normal,
                    distance: hit.time_of_impact,
                });
            }
        }

        Ok(fill_sorted(hits, found))
    }

    fn clear_velocity(&mut self, body: BodyHandle) -> Result<()> {
        self.set_linear_velocity(body, Vec2::zeros())
    }
}

/// Exclude the sweeping body itself, layers outside the mask and, unless asked for,
/// sensors.
fn query_filter<'a>(body: RigidBodyHandle, filter: &ContactFilter) -> QueryFilter<'a> {
    let mask = Group::from_bits_truncate(filter.layer_mask.0);
    let groups = InteractionGroups::all().with_filter(mask);
    let query = QueryFilter::default().exclude_rigid_body(body).groups(groups);
    if filter.use_triggers {
        query
    } else {
        query.exclude_sensors()
    }
}

/// Colliders are members of their own layer only and accept every layer.
fn layer_groups(layer: u8) -> Result<InteractionGroups> {
    let bit = LayerMask::of(layer)?;
    Ok(InteractionGroups::all().with_memberships(Group::from_bits_truncate(bit.0)))
}

fn collider_from_shape(shape: &ShapeDef, layer: u8) -> Result<ColliderBuilder> {
    let builder = match shape {
        ShapeDef::HalfSpace => {
            let halfspace = HalfSpace::new(UnitVector::new_normalize(Vector::y()));
            ColliderBuilder::new(SharedShape::new(halfspace))
        }
        ShapeDef::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y)
        }
        ShapeDef::Ball { radius } => ColliderBuilder::ball(*radius),
        ShapeDef::CapsuleY {
            radius,
            half_height,
        } => ColliderBuilder::capsule_y(*half_height, *radius),
        ShapeDef::Segment { a, b } => {
            ColliderBuilder::segment(Point::new(a.x, a.y), Point::new(b.x, b.y))
        }
    };
    Ok(builder.collision_groups(layer_groups(layer)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        body::KinematicBody, filter::LayerCollisionMatrix, gravity::SharedGravity,
        settings::BodySettings,
    };

    const DT: f32 = 0.02;
    const TOL: f32 = 1.0e-3;

    fn ground() -> StaticDef {
        StaticDef {
            id: 1,
            translation: Vec2::new(0.0, -0.5),
            rotation: 0.0,
            shape: ShapeDef::Cuboid {
                half_extents: Vec2::new(20.0, 0.5),
            },
            layer: 0,
            is_trigger: false,
        }
    }

    fn unit_box(at: Vec2) -> BodyDef {
        BodyDef {
            translation: at,
            shape: ShapeDef::Cuboid {
                half_extents: Vec2::new(0.5, 0.5),
            },
            layer: 1,
        }
    }

    fn kinematic(scene: &mut RapierScene, at: Vec2) -> KinematicBody {
        let _ = env_logger::builder().is_test(true).try_init();
        let handle = scene.add_body(&unit_box(at)).unwrap();
        KinematicBody::new(
            handle,
            &BodySettings::default(),
            ContactFilter::default(),
            SharedGravity::default(),
        )
        .unwrap()
    }

    #[test]
    fn lands_on_flat_ground_one_shell_above_it() {
        let mut scene = RapierScene::build(vec![ground()]).unwrap();
        let mut body = kinematic(&mut scene, Vec2::new(0.0, 0.505));
        body.set_velocity(Vec2::new(0.0, -5.0));

        body.fixed_update(&mut scene, DT).unwrap();

        assert!(body.is_grounded());
        assert!(body.velocity().y.abs() < TOL);
        assert!((body.ground_normal() - Vec2::new(0.0, 1.0)).norm() < TOL);
        let y = scene.position(body.handle()).unwrap().y;
        // Bottom face rests one shell radius above the ground's top (y = 0).
        assert!((y - 0.51).abs() < TOL, "y = {y}");
    }

    #[test]
    fn falls_freely_without_geometry() {
        let mut scene = RapierScene::new();
        let mut body = kinematic(&mut scene, Vec2::new(0.0, 10.0));

        body.fixed_update(&mut scene, DT).unwrap();

        let expected = 10.0 - 9.8 * DT * DT;
        let y = scene.position(body.handle()).unwrap().y;
        assert!((y - expected).abs() < 1.0e-5);
        assert!(!body.is_grounded());
    }

    #[test]
    fn wall_stops_horizontal_motion_short_of_contact() {
        let wall = StaticDef {
            id: 2,
            translation: Vec2::new(1.05, 1.0),
            rotation: 0.0,
            shape: ShapeDef::Cuboid {
                half_extents: Vec2::new(0.5, 1.0),
            },
            layer: 0,
            is_trigger: false,
        };
        let mut scene = RapierScene::build(vec![wall, ground()]).unwrap();
        let mut body = kinematic(&mut scene, Vec2::new(0.0, 0.51));
        body.set_target_velocity(Vec2::new(5.0, 0.0));

        body.fixed_update(&mut scene, DT).unwrap();

        let p = scene.position(body.handle()).unwrap();
        // Gap to the wall was 0.05; the move stops one shell radius short.
        assert!((p.x - 0.04).abs() < TOL, "x = {}", p.x);
        assert_eq!(body.velocity().x, 0.0);
        assert!(body.is_grounded());
    }

    #[test]
    fn triggers_are_not_obstacles() {
        let trigger = StaticDef {
            id: 3,
            translation: Vec2::new(0.0, -0.5),
            rotation: 0.0,
            shape: ShapeDef::Cuboid {
                half_extents: Vec2::new(5.0, 0.5),
            },
            layer: 0,
            is_trigger: true,
        };
        let mut scene = RapierScene::build(vec![trigger.clone()]).unwrap();
        let mut body = kinematic(&mut scene, Vec2::new(0.0, 0.505));
        body.set_velocity(Vec2::new(0.0, -5.0));

        body.fixed_update(&mut scene, DT).unwrap();

        assert!(!body.is_grounded());
        assert!(scene.position(body.handle()).unwrap().y < 0.45);

        // A filter that opts in reports the trigger.
        let mut scene = RapierScene::build(vec![trigger]).unwrap();
        let handle = scene.add_body(&unit_box(Vec2::new(0.0, 0.505))).unwrap();
        let with_triggers = ContactFilter {
            use_triggers: true,
            ..ContactFilter::default()
        };
        let mut hits = HitBuffer::with_capacity(4);
        let n = scene
            .cast(handle, Vec2::new(0.0, -1.0), &with_triggers, 1.0, &mut hits)
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn filtered_layers_are_ignored() {
        let mut matrix = LayerCollisionMatrix::default();
        matrix.set_collides(1, 4, false).unwrap();
        let mut floor = ground();
        floor.layer = 4;

        let mut scene = RapierScene::build(vec![floor]).unwrap();
        let handle = scene.add_body(&unit_box(Vec2::new(0.0, 0.505))).unwrap();
        let mut hits = HitBuffer::with_capacity(16);

        let blocked = ContactFilter::for_layer(1, &matrix).unwrap();
        let n = scene
            .cast(handle, Vec2::new(0.0, -1.0), &blocked, 1.0, &mut hits)
            .unwrap();
        assert_eq!(n, 0);

        let open = ContactFilter::for_layer(1, &LayerCollisionMatrix::default()).unwrap();
        let n = scene
            .cast(handle, Vec2::new(0.0, -1.0), &open, 1.0, &mut hits)
            .unwrap();
        assert_eq!(n, 1);
        assert!((hits.as_slice()[0].distance - 0.005).abs() < TOL);
        assert!((hits.as_slice()[0].normal - Vec2::new(0.0, 1.0)).norm() < TOL);
    }

    #[test]
    fn cast_orders_hits_by_distance_and_respects_capacity() {
        let near = StaticDef {
            id: 5,
            translation: Vec2::new(0.0, -0.5),
            ..ground()
        };
        let far = StaticDef {
            id: 4,
            translation: Vec2::new(0.0, -1.5),
            shape: ShapeDef::HalfSpace,
            ..ground()
        };
        let mut scene = RapierScene::build(vec![near, far]).unwrap();
        let handle = scene.add_body(&unit_box(Vec2::new(0.0, 1.0))).unwrap();

        let mut hits = HitBuffer::with_capacity(16);
        let n = scene
            .cast(handle, Vec2::new(0.0, -3.0), &ContactFilter::default(), 5.0, &mut hits)
            .unwrap();
        assert_eq!(n, 2);
        assert!((hits.as_slice()[0].distance - 0.5).abs() < TOL);
        assert!((hits.as_slice()[1].distance - 2.0).abs() < TOL);

        let mut small = HitBuffer::with_capacity(1);
        scene
            .cast(handle, Vec2::new(0.0, -3.0), &ContactFilter::default(), 5.0, &mut small)
            .unwrap();
        assert_eq!(small.len(), 1);
        assert_eq!(small.dropped(), 1);
        assert!((small.as_slice()[0].distance - 0.5).abs() < TOL);
    }

    #[test]
    fn other_bodies_block_sweeps() {
        let mut scene = RapierScene::new();
        let mover = scene.add_body(&unit_box(Vec2::new(0.0, 0.0))).unwrap();
        let _blocker = scene.add_body(&unit_box(Vec2::new(0.0, -3.0))).unwrap();
        let mut hits = HitBuffer::with_capacity(4);

        scene.set_position(mover, Vec2::new(0.0, 2.0)).unwrap();
        let n = scene
            .cast(mover, Vec2::new(0.0, -1.0), &ContactFilter::default(), 10.0, &mut hits)
            .unwrap();

        assert_eq!(n, 1);
        assert!((hits.as_slice()[0].distance - 4.0).abs() < TOL);
    }

    #[test]
    fn moved_bodies_are_found_at_their_new_pose() {
        let mut scene = RapierScene::new();
        let mover = scene.add_body(&unit_box(Vec2::new(0.0, 2.0))).unwrap();
        let blocker = scene.add_body(&unit_box(Vec2::new(50.0, 0.0))).unwrap();
        let mut hits = HitBuffer::with_capacity(4);
        let down = Vec2::new(0.0, -1.0);

        let n = scene
            .cast(mover, down, &ContactFilter::default(), 10.0, &mut hits)
            .unwrap();
        assert_eq!(n, 0);

        scene.set_position(blocker, Vec2::new(0.0, -1.0)).unwrap();
        let n = scene
            .cast(mover, down, &ContactFilter::default(), 10.0, &mut hits)
            .unwrap();
        assert_eq!(n, 1);
        assert!((hits.as_slice()[0].distance - 2.0).abs() < TOL);

        scene.set_position(blocker, Vec2::new(-50.0, 0.0)).unwrap();
        let n = scene
            .cast(mover, down, &ContactFilter::default(), 10.0, &mut hits)
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn out_of_range_layers_are_rejected() {
        let mut scene = RapierScene::new();
        let mut def = unit_box(Vec2::zeros());
        def.layer = 32;
        assert!(matches!(
            scene.add_body(&def),
            Err(KinematicError::InvalidLayer(32))
        ));
        assert_eq!(scene.body_count(), 0);

        let mut floor = ground();
        floor.layer = 200;
        assert!(RapierScene::build(vec![floor]).is_err());
    }

    #[test]
    fn teleport_moves_and_stops_the_rigid_body() {
        let mut scene = RapierScene::build(vec![ground()]).unwrap();
        let mut body = kinematic(&mut scene, Vec2::new(0.0, 3.0));
        body.set_velocity(Vec2::new(2.0, -4.0));
        scene
            .set_linear_velocity(body.handle(), Vec2::new(2.0, -4.0))
            .unwrap();

        // Teleporting into the ground is allowed: no collision checks.
        body.teleport(&mut scene, Vec2::new(1.0, -0.25)).unwrap();

        assert_eq!(scene.position(body.handle()).unwrap(), Vec2::new(1.0, -0.25));
        assert_eq!(body.velocity(), Vec2::zeros());
        assert_eq!(scene.linear_velocity(body.handle()).unwrap(), Vec2::zeros());
    }

    #[test]
    fn enable_toggles_kinematic_flag() {
        let mut scene = RapierScene::new();
        let h = scene.add_body(&unit_box(Vec2::zeros())).unwrap();
        assert!(scene.is_kinematic(h).unwrap());

        scene.set_enabled(h, false).unwrap();
        assert!(!scene.is_kinematic(h).unwrap());

        scene.set_enabled(h, true).unwrap();
        assert!(scene.is_kinematic(h).unwrap());
    }

    #[test]
    fn unknown_handles_are_errors() {
        let scene = RapierScene::new();
        let err = scene.position(BodyHandle(3)).unwrap_err();
        assert!(matches!(err, KinematicError::UnknownBody(BodyHandle(3))));
    }
}
