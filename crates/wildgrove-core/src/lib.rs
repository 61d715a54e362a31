//! Wildgrove simulation core.
//!
//! A [`World`] owns a dense entity pool addressed by generational handles,
//! a pairwise collision layer with per-pair override rules, behavior brains
//! for autonomous creatures, and a chunked procedural spawner. One call to
//! [`World::step`] advances everything in a fixed stage order:
//!
//! 1. procedural generation (resource patches, recurring creature spawns)
//! 2. brains (state machines steer their entities)
//! 3. physics (acceleration and vertical integration)
//! 4. collision (all horizontal movement, swept and resolved)
//! 5. animation playback
//! 6. cleanup (deferred destruction)
//!
//! The world is deliberately single-threaded and deterministic for a fixed
//! seed; rendering, input, and audio live in separate crates that consume
//! the dense entity rows read-only between steps.

pub mod brain;
pub mod collision;
pub mod config;
pub mod entity;
pub mod math;
pub mod procgen;

pub use brain::{AiState, Brain, BrainCore, SearchPhase};
pub use collision::{sweep_rect, CollisionRules, SweepHit};
pub use config::{
    BiomeTable, ConfigError, CreatureSpawnEntry, ResourcePatchEntry, WildgroveConfig,
};
pub use entity::{
    AnimationState, Collider, ColliderShape, Entity, EntityArena, EntityFlags, EntityId,
    EntityKind, Inventory, ItemStack,
};
pub use math::{Rect, Vec2};
pub use procgen::{ChunkGrid, SpawnOrder};

use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};
use wildgrove_assets::{AnimationLibrary, StaticAnimationLibrary};

/// Monotonic tick counter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

/// Something observable that happened during a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldEvent {
    /// An entity took damage.
    Damage {
        target: EntityId,
        kind: EntityKind,
        amount: i32,
        fatal: bool,
    },
}

/// Summary of one completed step.
#[derive(Debug)]
pub struct TickReport {
    pub tick: Tick,
    /// Delta time actually simulated, after clamping.
    pub dt: f32,
    pub spawned: u32,
    pub destroyed: u32,
    pub events: Vec<WorldEvent>,
}

/// Logical animation slots brains and systems request by role rather than
/// by id; the per-kind set maps them to concrete animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimTrack {
    Idle,
    Walk,
    Attack,
    Death,
}

/// The complete simulation state.
pub struct World {
    config: WildgroveConfig,
    seed: u64,
    tick: Tick,
    rng: SmallRng,
    arena: EntityArena,
    rules: CollisionRules,
    chunks: ChunkGrid,
    animations: Arc<dyn AnimationLibrary>,
    events: Vec<WorldEvent>,
    spawn_orders: Vec<SpawnOrder>,
    spawned_this_tick: u32,
    destroyed_this_tick: u32,
}

impl World {
    /// Build a world from a validated configuration and animation registry.
    pub fn new(
        config: WildgroveConfig,
        animations: Arc<dyn AnimationLibrary>,
    ) -> Result<Self, ConfigError> {
        let (rows, cols) = config.chunk_dimensions()?;
        let seed = config.resolved_seed();
        debug!(seed, rows, cols, "world created");
        Ok(Self {
            rng: WildgroveConfig::seeded_rng(seed),
            arena: EntityArena::with_capacity(config.max_entities),
            rules: CollisionRules::new(),
            chunks: ChunkGrid::new(rows, cols, &config, seed),
            animations,
            events: Vec::new(),
            spawn_orders: Vec::new(),
            spawned_this_tick: 0,
            destroyed_this_tick: 0,
            tick: Tick(0),
            seed,
            config,
        })
    }

    /// World with no animations registered; playback degrades to nothing.
    /// Convenient for headless tools and tests.
    pub fn headless(config: WildgroveConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(StaticAnimationLibrary::new()))
    }

    #[must_use]
    pub fn config(&self) -> &WildgroveConfig {
        &self.config
    }

    /// Seed this session runs under (configured or drawn at creation).
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.arena.len()
    }

    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.arena.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.arena.get_mut(id)
    }

    /// Dense entity rows for read-only consumers.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        self.arena.rows()
    }

    #[must_use]
    pub fn find_first_of_kind(&self, kind: EntityKind) -> Option<EntityId> {
        self.arena.find_first_of_kind(kind)
    }

    /// Live rule count, exposed for diagnostics.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub(crate) fn rng_mut(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Record a pairwise collision override.
    pub fn add_rule(&mut self, a: EntityId, b: EntityId, should_collide: bool) {
        self.rules.add_rule(a, b, should_collide);
    }

    #[must_use]
    pub fn rule_for(&self, a: EntityId, b: EntityId) -> Option<bool> {
        self.rules.rule_for(a, b)
    }

    /// Nearest live harvestable within `radius` of `center`.
    #[must_use]
    pub fn nearest_harvestable(&self, center: Vec2, radius: f32) -> Option<EntityId> {
        let radius_sq = radius * radius;
        self.arena
            .iter()
            .filter(|e| {
                e.has_flag(EntityFlags::HARVESTABLE) && !e.has_flag(EntityFlags::MARKED_DELETE)
            })
            .map(|e| (e.id, e.position.distance_sq(center)))
            .filter(|(_, d)| *d <= radius_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Spawn an entity of `kind` from its template.
    ///
    /// # Panics
    ///
    /// Panics when the pool is at capacity; see [`EntityArena::insert`].
    pub fn spawn(&mut self, kind: EntityKind, position: Vec2) -> EntityId {
        let id = self.arena.insert(Entity::from_template(kind, position));
        self.spawned_this_tick += 1;
        self.set_animation(id, AnimTrack::Idle);
        trace!(kind = kind.name(), ?position, "spawned");
        id
    }

    /// Seed the world with an initial cast.
    pub fn populate(&mut self, spawns: &[(EntityKind, Vec2)]) {
        for (kind, position) in spawns {
            self.spawn(*kind, *position);
        }
    }

    /// Destroy an entity immediately. Rules mentioning it are purged first
    /// so the table never holds entries for dead handles.
    pub fn destroy(&mut self, id: EntityId) {
        self.rules.purge_entity(id);
        if let Some(entity) = self.arena.remove(id) {
            self.destroyed_this_tick += 1;
            trace!(kind = entity.kind.name(), "destroyed");
        }
    }

    /// Deal damage to a killable entity, returning whether it was fatal.
    /// Fatal damage hands brained creatures to their death transition and
    /// marks everything else for deletion at end of tick.
    pub fn apply_damage(&mut self, id: EntityId, amount: i32) -> bool {
        let Some(entity) = self.arena.get_mut(id) else {
            return false;
        };
        if !entity.flags.has(EntityFlags::KILLABLE) {
            return false;
        }
        entity.hp -= amount;
        let fatal = entity.hp <= 0;
        let kind = entity.kind;
        if fatal {
            if let Some(brain) = entity.brain.as_mut() {
                brain.kill();
            } else {
                entity.flags.set(EntityFlags::MARKED_DELETE);
            }
        }
        debug!(kind = kind.name(), amount, fatal, "damage");
        self.events.push(WorldEvent::Damage {
            target: id,
            kind,
            amount,
            fatal,
        });
        fatal
    }

    /// Whether the entity's current animation has run to completion. A
    /// missing entity, missing animation, or unknown definition counts as
    /// finished so nothing waits forever on playback that cannot happen.
    #[must_use]
    pub fn animation_finished(&self, id: EntityId) -> bool {
        let Some(entity) = self.arena.get(id) else {
            return true;
        };
        let Some(anim_id) = entity.anim.animation else {
            return true;
        };
        match self.animations.animation(anim_id) {
            Some(def) => def.finished(entity.anim.elapsed),
            None => true,
        }
    }

    /// Switch an entity to the requested logical track, if its kind has one
    /// registered. A missing death track clears playback so the finished
    /// check passes and cleanup can proceed.
    pub fn set_animation(&mut self, id: EntityId, track: AnimTrack) {
        let Some(entity) = self.arena.get(id) else {
            return;
        };
        let resolved = self.animations.set_for(entity.kind.name()).and_then(|set| {
            match track {
                AnimTrack::Idle => set.idle,
                AnimTrack::Walk => set.walk,
                AnimTrack::Attack => set.attack,
                AnimTrack::Death => set.death,
            }
        });
        if let Some(entity) = self.arena.get_mut(id) {
            match resolved {
                Some(anim) => entity.anim.play(anim),
                None if track == AnimTrack::Death => entity.anim.animation = None,
                None => {}
            }
        }
    }

    /// Advance the simulation one tick. `dt` is clamped to the configured
    /// maximum so a long stall cannot tunnel entities through geometry.
    pub fn step(&mut self, dt: f32) -> TickReport {
        let dt = dt.clamp(0.0, self.config.max_dt);
        self.tick = Tick(self.tick.0 + 1);
        self.spawned_this_tick = 0;
        self.destroyed_this_tick = 0;

        self.stage_procgen(dt);
        self.stage_brains(dt);
        self.stage_physics(dt);
        self.stage_collision(dt);
        self.stage_animation(dt);
        self.stage_cleanup();

        TickReport {
            tick: self.tick,
            dt,
            spawned: self.spawned_this_tick,
            destroyed: self.destroyed_this_tick,
            events: std::mem::take(&mut self.events),
        }
    }

    /// Procedural generation around the player. Without a player there is
    /// no active window and the stage is skipped entirely.
    fn stage_procgen(&mut self, dt: f32) {
        let Some(player_pos) = self
            .arena
            .find_first_of_kind(EntityKind::Player)
            .and_then(|id| self.arena.get(id))
            .map(|p| p.position)
        else {
            return;
        };
        let creature_positions: Vec<Vec2> = self
            .arena
            .iter()
            .filter(|e| e.kind.is_creature())
            .map(|e| e.position)
            .collect();
        let mut orders = std::mem::take(&mut self.spawn_orders);
        orders.clear();
        self.chunks
            .tick(&self.config, player_pos, dt, &creature_positions, &mut orders);
        for order in &orders {
            self.spawn(order.kind, order.position);
        }
        self.spawn_orders = orders;
    }

    /// Drive every brain with the take-and-restore pattern: the brain is
    /// detached from its entity for the duration of its update so it can
    /// borrow the world mutably.
    fn stage_brains(&mut self, dt: f32) {
        let ids: Vec<EntityId> = self.arena.iter_handles().collect();
        for id in ids {
            let Some(mut brain) = self.arena.get_mut(id).and_then(|e| e.brain.take()) else {
                continue;
            };
            brain.update(self, id, dt);
            if let Some(entity) = self.arena.get_mut(id) {
                entity.brain = Some(brain);
            }
        }
    }

    /// Acceleration and vertical motion. Horizontal position is resolved by
    /// the collision stage, never here.
    fn stage_physics(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        for entity in self.arena.rows_mut() {
            let accel = entity.acceleration;
            entity.velocity += accel.scale(dt);
            entity.z_vel += entity.z_acc * dt;
            if entity.z_pos > 0.0 {
                entity.z_vel += gravity * dt;
            }
            entity.z_pos += entity.z_vel * dt;
            if entity.z_pos <= 0.0 {
                entity.z_pos = 0.0;
                entity.z_vel = 0.0;
            }
        }
    }

    /// All horizontal movement. Each moving entity sweeps against every
    /// colliding candidate and resolves the earliest contact: projectiles
    /// deal their hit, everything else slides along the contact surface.
    fn stage_collision(&mut self, dt: f32) {
        let cutoff = self.config.collision_cutoff;
        // Non-spatial movers still translate; the policy just never yields
        // contacts for them.
        let movers: Vec<EntityId> = self
            .arena
            .iter()
            .filter(|e| e.velocity.length_sq() > f32::EPSILON)
            .map(|e| e.id)
            .collect();

        struct Hit {
            toi: f32,
            normal: Vec2,
            target: EntityId,
            target_killable: bool,
            target_blocker: bool,
        }

        for id in movers {
            let (delta, subject_projectile, best) = {
                let Some(subject) = self.arena.get(id) else {
                    continue;
                };
                let delta = subject.velocity.scale(dt);
                if delta.length_sq() <= f32::EPSILON {
                    continue;
                }
                let sub_center = subject.center();
                let sub_half = subject.collider.half_extents();
                let mut best: Option<Hit> = None;
                for target in self.arena.iter() {
                    if !collision::should_collide(&self.rules, subject, target, cutoff) {
                        continue;
                    }
                    let expanded = sub_half + target.collider.half_extents();
                    let rel = sub_center - target.center();
                    let Some(hit) = sweep_rect(rel, delta, expanded) else {
                        continue;
                    };
                    if best.as_ref().map_or(true, |b| hit.toi < b.toi) {
                        best = Some(Hit {
                            toi: hit.toi,
                            normal: hit.normal,
                            target: target.id,
                            target_killable: target.has_flag(EntityFlags::KILLABLE),
                            target_blocker: target.has_flag(EntityFlags::BLOCKER),
                        });
                    }
                }
                (delta, subject.has_flag(EntityFlags::PROJECTILE), best)
            };

            match best {
                None => {
                    if let Some(entity) = self.arena.get_mut(id) {
                        entity.position += delta;
                    }
                }
                Some(hit) if subject_projectile => {
                    if let Some(entity) = self.arena.get_mut(id) {
                        entity.position += delta.scale(hit.toi);
                    }
                    if hit.target_killable {
                        self.apply_damage(hit.target, 1);
                    }
                    // The projectile never hits this target twice.
                    self.rules.add_rule(id, hit.target, false);
                    if hit.target_killable || hit.target_blocker {
                        if let Some(entity) = self.arena.get_mut(id) {
                            entity.flags.set(EntityFlags::MARKED_DELETE);
                            entity.velocity = Vec2::ZERO;
                        }
                    }
                }
                Some(hit) => {
                    // Slide: advance to contact, keep the tangential share of
                    // the remaining motion, and kill the normal components.
                    let advanced = delta.scale(hit.toi);
                    let remainder = delta.scale(1.0 - hit.toi);
                    let along =
                        remainder.x * hit.normal.x + remainder.y * hit.normal.y;
                    let slide = remainder - hit.normal.scale(along);
                    if let Some(entity) = self.arena.get_mut(id) {
                        entity.position += advanced + slide;
                        if hit.normal.x.abs() > f32::EPSILON {
                            entity.velocity.x = 0.0;
                            entity.acceleration.x = 0.0;
                        }
                        if hit.normal.y.abs() > f32::EPSILON {
                            entity.velocity.y = 0.0;
                            entity.acceleration.y = 0.0;
                        }
                    }
                }
            }
        }
    }

    /// Advance playback clocks and resolve current frames.
    fn stage_animation(&mut self, dt: f32) {
        let animations = Arc::clone(&self.animations);
        for entity in self.arena.rows_mut() {
            let Some(anim_id) = entity.anim.animation else {
                continue;
            };
            entity.anim.elapsed += dt;
            if let Some(def) = animations.animation(anim_id) {
                entity.anim.frame = def.frame_at(entity.anim.elapsed);
            }
        }
    }

    /// Deferred destruction: explicit marks, plus corpses whose death
    /// animation has finished.
    fn stage_cleanup(&mut self) {
        let doomed: Vec<EntityId> = self
            .arena
            .iter()
            .filter(|e| {
                e.has_flag(EntityFlags::MARKED_DELETE)
                    || (e.has_flag(EntityFlags::DELETE_AFTER_ANIM)
                        && self.animation_finished(e.id))
            })
            .map(|e| e.id)
            .collect();
        for id in doomed {
            self.destroy(id);
        }
    }
}
