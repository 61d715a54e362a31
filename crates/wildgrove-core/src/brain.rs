//! Behavior state machines for autonomous creatures.
//!
//! Every brained kind runs the same small state set; kinds differ in which
//! transitions they take out of it. The world drives brains with a
//! take-and-restore dance each tick, so a brain gets full mutable access to
//! the world (spawning hitboxes, dealing harvest damage) without aliasing
//! its own entity.

use crate::entity::{EntityFlags, EntityId, EntityKind};
use crate::math::Vec2;
use crate::{AnimTrack, World};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Arrival distance for a wander leg.
const WANDER_ARRIVE: f32 = 1.0;
/// Arrival distance for search-sweep waypoints.
const WAYPOINT_ARRIVE: f32 = 0.25;

/// Shared behavior states. Not every kind uses every state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AiState {
    Idle,
    Wander,
    Chase,
    Attack,
    Dead,
    Searching,
    Harvesting,
}

/// Where the gatherer is within its serpentine sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SearchPhase {
    /// Heading to the sweep's starting corner.
    Starting,
    /// Walking horizontal bands back and forth.
    Sweeping,
    /// Sweep exhausted; walking home.
    Returning,
}

/// State shared by every brain variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BrainCore {
    pub state: AiState,
    /// General-purpose countdown: idle delay in `Idle`, leg budget in
    /// `Wander`.
    pub cooldown: f32,
    /// Current entity of interest (chase victim, harvest node).
    pub target: EntityId,
    /// Current movement goal in world space.
    pub target_pos: Vec2,
}

impl BrainCore {
    fn new() -> Self {
        Self {
            state: AiState::Idle,
            cooldown: 0.0,
            target: EntityId::default(),
            target_pos: Vec2::ZERO,
        }
    }
}

/// One creature's behavior controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Brain {
    Boar {
        core: BrainCore,
    },
    Warrior {
        core: BrainCore,
        /// Live melee hitbox while attacking; doubles as the attack id.
        swing: EntityId,
    },
    Gatherer {
        core: BrainCore,
        phase: SearchPhase,
        /// Horizontal sweep direction, `1.0` or `-1.0`.
        direction: f32,
        harvest_cooldown: f32,
    },
}

impl Brain {
    #[must_use]
    pub fn boar() -> Self {
        Self::Boar { core: BrainCore::new() }
    }

    #[must_use]
    pub fn warrior() -> Self {
        Self::Warrior {
            core: BrainCore::new(),
            swing: EntityId::default(),
        }
    }

    #[must_use]
    pub fn gatherer() -> Self {
        Self::Gatherer {
            core: BrainCore::new(),
            phase: SearchPhase::Starting,
            direction: 1.0,
            harvest_cooldown: 0.0,
        }
    }

    #[must_use]
    pub fn core(&self) -> &BrainCore {
        match self {
            Self::Boar { core }
            | Self::Warrior { core, .. }
            | Self::Gatherer { core, .. } => core,
        }
    }

    pub fn core_mut(&mut self) -> &mut BrainCore {
        match self {
            Self::Boar { core }
            | Self::Warrior { core, .. }
            | Self::Gatherer { core, .. } => core,
        }
    }

    #[must_use]
    pub fn state(&self) -> AiState {
        self.core().state
    }

    /// Force the dead state; the next update performs the death transition.
    pub fn kill(&mut self) {
        self.core_mut().state = AiState::Dead;
    }

    /// Advance this brain one tick. `id` is the owning entity, which the
    /// world has temporarily detached this brain from.
    pub fn update(&mut self, world: &mut World, id: EntityId, dt: f32) {
        let core = self.core_mut();
        core.cooldown = (core.cooldown - dt).max(0.0);
        if core.state == AiState::Dead {
            enter_dead(world, id);
            return;
        }

        match self {
            Self::Boar { core } => update_boar(world, id, core, dt),
            Self::Warrior { core, swing } => update_warrior(world, id, core, swing),
            Self::Gatherer {
                core,
                phase,
                direction,
                harvest_cooldown,
            } => update_gatherer(world, id, core, phase, direction, harvest_cooldown, dt),
        }
    }
}

/// Death transition: stop, leave the spatial world, and play out the death
/// animation before cleanup removes the body.
fn enter_dead(world: &mut World, id: EntityId) {
    if let Some(entity) = world.entity_mut(id) {
        entity.velocity = Vec2::ZERO;
        entity.acceleration = Vec2::ZERO;
        entity.flags.set(EntityFlags::NONSPATIAL);
        entity.flags.set(EntityFlags::DELETE_AFTER_ANIM);
    }
    world.set_animation(id, AnimTrack::Death);
}

/// Steer `id` toward `goal` at `speed`, facing the movement direction.
fn steer_toward(world: &mut World, id: EntityId, goal: Vec2, speed: f32) {
    if let Some(entity) = world.entity_mut(id) {
        let dir = (goal - entity.position).normalized_or_zero();
        entity.velocity = dir.scale(speed);
        if dir.x.abs() > f32::EPSILON {
            entity.anim.flipped = dir.x < 0.0;
        }
    }
}

fn stop(world: &mut World, id: EntityId) {
    if let Some(entity) = world.entity_mut(id) {
        entity.velocity = Vec2::ZERO;
    }
}

fn enter_idle(world: &mut World, id: EntityId, core: &mut BrainCore) {
    let (min, max) = {
        let config = world.config();
        (config.idle_cooldown_min, config.idle_cooldown_max)
    };
    core.state = AiState::Idle;
    core.cooldown = world.rng_mut().gen_range(min..=max);
    stop(world, id);
    world.set_animation(id, AnimTrack::Idle);
}

fn enter_wander(world: &mut World, id: EntityId, core: &mut BrainCore) {
    let (radius, duration) = {
        let config = world.config();
        (config.wander_radius, config.wander_duration)
    };
    let here = match world.entity(id) {
        Some(entity) => entity.position,
        None => return,
    };
    let angle = world.rng_mut().gen_range(0.0..std::f32::consts::TAU);
    let dist = world.rng_mut().gen_range(0.0..radius);
    core.state = AiState::Wander;
    core.cooldown = duration;
    core.target_pos = here + Vec2::new(angle.cos(), angle.sin()).scale(dist);
    world.set_animation(id, AnimTrack::Walk);
}

/// Idle/Wander pacing shared by every grounded creature. Returns the
/// entity's current position, or `None` if it vanished mid-tick.
fn run_idle_wander(world: &mut World, id: EntityId, core: &mut BrainCore) -> Option<Vec2> {
    let here = world.entity(id)?.position;
    match core.state {
        AiState::Idle => {
            if core.cooldown <= 0.0 {
                enter_wander(world, id, core);
            }
        }
        AiState::Wander => {
            if core.cooldown <= 0.0 || here.distance(core.target_pos) <= WANDER_ARRIVE {
                enter_idle(world, id, core);
            } else {
                let speed = world.config().wander_speed;
                steer_toward(world, id, core.target_pos, speed);
            }
        }
        _ => {}
    }
    Some(here)
}

fn update_boar(world: &mut World, id: EntityId, core: &mut BrainCore, _dt: f32) {
    let _ = run_idle_wander(world, id, core);
}

fn update_warrior(world: &mut World, id: EntityId, core: &mut BrainCore, swing: &mut EntityId) {
    let (chase_radius, melee_radius, chase_speed, swing_speed, swing_offset) = {
        let config = world.config();
        (
            config.chase_radius,
            config.melee_radius,
            config.chase_speed,
            config.swing_speed,
            config.swing_offset,
        )
    };

    let here = match world.entity(id) {
        Some(entity) => entity.position,
        None => return,
    };
    let player = world
        .find_first_of_kind(EntityKind::Player)
        .and_then(|pid| world.entity(pid).map(|p| (pid, p.position)));

    match core.state {
        AiState::Idle | AiState::Wander => {
            if let Some((pid, pos)) = player {
                if here.distance(pos) <= chase_radius {
                    core.state = AiState::Chase;
                    core.target = pid;
                    world.set_animation(id, AnimTrack::Walk);
                    return;
                }
            }
            let _ = run_idle_wander(world, id, core);
        }
        AiState::Chase => {
            let Some((pid, pos)) = player else {
                enter_idle(world, id, core);
                return;
            };
            core.target = pid;
            let distance = here.distance(pos);
            if distance > chase_radius {
                enter_idle(world, id, core);
            } else if distance <= melee_radius {
                // Attack entry: the swing hitbox is its own entity and its
                // handle is the unique id of this attack.
                let dir = (pos - here).normalized_or_zero();
                let spawn_at = here + dir.scale(swing_offset);
                let hitbox = world.spawn(EntityKind::MeleeSwing, spawn_at);
                if let Some(entity) = world.entity_mut(hitbox) {
                    entity.velocity = dir.scale(swing_speed);
                }
                world.add_rule(hitbox, id, false);
                *swing = hitbox;
                core.state = AiState::Attack;
                stop(world, id);
                if let Some(entity) = world.entity_mut(id) {
                    if dir.x.abs() > f32::EPSILON {
                        entity.anim.flipped = dir.x < 0.0;
                    }
                }
                world.set_animation(id, AnimTrack::Attack);
            } else {
                steer_toward(world, id, pos, chase_speed);
            }
        }
        AiState::Attack => {
            if world.animation_finished(id) {
                if world.entity(*swing).is_some() {
                    world.destroy(*swing);
                }
                *swing = EntityId::default();
                core.state = AiState::Chase;
                world.set_animation(id, AnimTrack::Walk);
            }
        }
        _ => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn update_gatherer(
    world: &mut World,
    id: EntityId,
    core: &mut BrainCore,
    phase: &mut SearchPhase,
    direction: &mut f32,
    harvest_cooldown: &mut f32,
    dt: f32,
) {
    let (vision, half_extent, speed, harvest_range, harvest_interval) = {
        let config = world.config();
        (
            config.vision_radius,
            config.search_half_extent,
            config.gatherer_speed,
            config.harvest_range,
            config.harvest_interval,
        )
    };
    let band_step = 2.0 * vision;

    let here = match world.entity(id) {
        Some(entity) => entity.position,
        None => return,
    };

    match core.state {
        AiState::Idle => {
            if core.cooldown <= 0.0 {
                core.state = AiState::Searching;
                *phase = SearchPhase::Starting;
                *direction = 1.0;
                core.target_pos = Vec2::new(-half_extent, -half_extent);
                world.set_animation(id, AnimTrack::Walk);
            }
        }
        AiState::Searching => {
            // A harvestable in sight interrupts the sweep wherever it is.
            if let Some(found) = world.nearest_harvestable(here, vision) {
                core.state = AiState::Harvesting;
                core.target = found;
                *harvest_cooldown = 0.0;
                return;
            }
            match phase {
                SearchPhase::Starting => {
                    if here.distance(core.target_pos) <= WAYPOINT_ARRIVE {
                        *phase = SearchPhase::Sweeping;
                        core.target_pos = Vec2::new(half_extent, core.target_pos.y);
                    } else {
                        steer_toward(world, id, core.target_pos, speed);
                    }
                }
                SearchPhase::Sweeping => {
                    if here.distance(core.target_pos) <= WAYPOINT_ARRIVE {
                        // End of a band: flip direction and step one band up.
                        let next_y = core.target_pos.y + band_step;
                        if next_y > half_extent {
                            *phase = SearchPhase::Returning;
                            core.target_pos = Vec2::ZERO;
                        } else {
                            *direction = -*direction;
                            core.target_pos = Vec2::new(half_extent * *direction, next_y);
                        }
                    } else {
                        steer_toward(world, id, core.target_pos, speed);
                    }
                }
                SearchPhase::Returning => {
                    if here.distance(core.target_pos) <= WAYPOINT_ARRIVE {
                        enter_idle(world, id, core);
                    } else {
                        steer_toward(world, id, core.target_pos, speed);
                    }
                }
            }
        }
        AiState::Harvesting => {
            let Some((target_pos, target_kind)) = world
                .entity(core.target)
                .filter(|t| t.has_flag(EntityFlags::HARVESTABLE))
                .map(|t| (t.position, t.kind))
            else {
                // Node gone (or claimed); resume the sweep where it left off.
                core.target = EntityId::default();
                core.state = AiState::Searching;
                *harvest_cooldown = 0.0;
                world.set_animation(id, AnimTrack::Walk);
                return;
            };
            // The cooldown runs regardless of range; range only gates the
            // damage itself.
            *harvest_cooldown -= dt;
            if here.distance(target_pos) <= harvest_range {
                stop(world, id);
                world.set_animation(id, AnimTrack::Attack);
                if *harvest_cooldown <= 0.0 {
                    *harvest_cooldown = harvest_interval;
                    let fatal = world.apply_damage(core.target, 1);
                    if fatal {
                        if let Some(entity) = world.entity_mut(id) {
                            if let Some(inventory) = entity.inventory.as_mut() {
                                inventory.add(target_kind, 1);
                            }
                        }
                    }
                }
            } else {
                world.set_animation(id, AnimTrack::Walk);
                steer_toward(world, id, target_pos, speed);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brains_start_idle_with_null_target() {
        for brain in [Brain::boar(), Brain::warrior(), Brain::gatherer()] {
            assert_eq!(brain.state(), AiState::Idle);
            assert_eq!(brain.core().target, EntityId::default());
        }
    }

    #[test]
    fn kill_forces_dead_state() {
        let mut brain = Brain::warrior();
        brain.core_mut().state = AiState::Chase;
        brain.kill();
        assert_eq!(brain.state(), AiState::Dead);
    }
}
