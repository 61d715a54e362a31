//! Static world configuration and spawn-table data.

use crate::entity::EntityKind;
use rand::{rngs::SmallRng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Indicates a configuration value that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Weighted entry in the recurring creature spawn table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CreatureSpawnEntry {
    pub kind: EntityKind,
    pub weight: f32,
    pub group_min: u32,
    pub group_max: u32,
}

/// Weighted entry in the one-shot resource patch table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResourcePatchEntry {
    pub kind: EntityKind,
    /// Probability in `[0, 1]` that this entry fires for a chunk at all.
    pub weight: f32,
    pub min_patches: u32,
    pub max_patches: u32,
    pub min_nodes: u32,
    pub max_nodes: u32,
    /// Upper bound for the randomly chosen scatter radius of one patch.
    pub max_patch_radius: f32,
}

/// Spawn tables for one biome. The whole world currently uses a single
/// biome; the table shape is already per-biome so a chunk selector can be
/// layered on without touching chunk state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BiomeTable {
    pub creatures: Vec<CreatureSpawnEntry>,
    pub resources: Vec<ResourcePatchEntry>,
}

/// Static configuration for a Wildgrove world.
///
/// Gameplay-balance constants (broad-phase cutoff, chase radius, melee
/// radius) live here rather than in the systems that consume them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WildgroveConfig {
    /// Width of the world in world units; the world is centered on the origin.
    pub world_width: f32,
    /// Height of the world in world units.
    pub world_height: f32,
    /// Hard cap on live entities. Exceeding it is a content misconfiguration.
    pub max_entities: usize,
    /// Edge length of one spawn chunk.
    pub chunk_size: f32,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Upper clamp applied to the per-tick delta time.
    pub max_dt: f32,

    /// Broad-phase center-distance cutoff for collision candidates.
    pub collision_cutoff: f32,

    /// Distance at which a warrior locks onto the player.
    pub chase_radius: f32,
    /// Distance at which a chasing warrior starts a melee attack.
    pub melee_radius: f32,
    /// Movement speed while wandering.
    pub wander_speed: f32,
    /// Movement speed while chasing the player.
    pub chase_speed: f32,
    /// Radius of the random wander-target pick around the current position.
    pub wander_radius: f32,
    /// Time budget for one wander leg before giving up.
    pub wander_duration: f32,
    /// Bounds of the randomized idle cooldown between wander legs.
    pub idle_cooldown_min: f32,
    pub idle_cooldown_max: f32,
    /// Initial speed of a spawned melee-swing hitbox.
    pub swing_speed: f32,
    /// Forward offset at which the melee-swing hitbox appears.
    pub swing_offset: f32,

    /// Gatherer sight radius; the serpentine step is twice this.
    pub vision_radius: f32,
    /// Half extent of the square search region centered on the origin.
    pub search_half_extent: f32,
    /// Gatherer movement speed.
    pub gatherer_speed: f32,
    /// Distance within which harvesting ticks instead of pursuit.
    pub harvest_range: f32,
    /// Seconds between harvest damage ticks.
    pub harvest_interval: f32,

    /// Seconds between recurring population attempts per chunk.
    pub spawn_interval: f32,
    /// Chebyshev radius of the active chunk window around the player (2 = 5x5).
    pub chunk_window_radius: i32,
    /// Population cap per chunk for recurring spawns.
    pub chunk_population_cap: u32,
    /// Half extents of the no-spawn rectangle around the player.
    pub safe_zone_half_width: f32,
    pub safe_zone_half_height: f32,

    /// Downward acceleration applied to airborne entities.
    pub gravity: f32,

    /// Spawn tables used by the procedural generator.
    pub biome: BiomeTable,
}

impl Default for WildgroveConfig {
    fn default() -> Self {
        Self {
            world_width: 128.0,
            world_height: 128.0,
            max_entities: 4096,
            chunk_size: 16.0,
            rng_seed: None,
            max_dt: 0.1,
            collision_cutoff: 10.0,
            chase_radius: 5.0,
            melee_radius: 0.5,
            wander_speed: 1.2,
            chase_speed: 3.0,
            wander_radius: 3.0,
            wander_duration: 10.0,
            idle_cooldown_min: 1.0,
            idle_cooldown_max: 6.0,
            swing_speed: 4.0,
            swing_offset: 0.4,
            vision_radius: 2.0,
            search_half_extent: 20.0,
            gatherer_speed: 2.0,
            harvest_range: 1.5,
            harvest_interval: 1.0,
            spawn_interval: 30.0,
            chunk_window_radius: 2,
            chunk_population_cap: 6,
            safe_zone_half_width: 6.0,
            safe_zone_half_height: 6.0,
            gravity: -9.8,
            biome: BiomeTable {
                creatures: vec![
                    CreatureSpawnEntry {
                        kind: EntityKind::Boar,
                        weight: 0.5,
                        group_min: 1,
                        group_max: 3,
                    },
                    CreatureSpawnEntry {
                        kind: EntityKind::Warrior,
                        weight: 0.25,
                        group_min: 1,
                        group_max: 2,
                    },
                ],
                resources: vec![
                    ResourcePatchEntry {
                        kind: EntityKind::Tree,
                        weight: 0.6,
                        min_patches: 1,
                        max_patches: 3,
                        min_nodes: 3,
                        max_nodes: 8,
                        max_patch_radius: 4.0,
                    },
                    ResourcePatchEntry {
                        kind: EntityKind::Rock,
                        weight: 0.4,
                        min_patches: 1,
                        max_patches: 2,
                        min_nodes: 2,
                        max_nodes: 5,
                        max_patch_radius: 3.0,
                    },
                    ResourcePatchEntry {
                        kind: EntityKind::Crystal,
                        weight: 0.15,
                        min_patches: 1,
                        max_patches: 1,
                        min_nodes: 1,
                        max_nodes: 3,
                        max_patch_radius: 2.0,
                    },
                ],
            },
        }
    }
}

impl WildgroveConfig {
    /// Validates the configuration, returning the chunk grid dimensions.
    pub fn chunk_dimensions(&self) -> Result<(usize, usize), ConfigError> {
        if self.world_width <= 0.0 || self.world_height <= 0.0 {
            return Err(ConfigError::InvalidConfig("world dimensions must be positive"));
        }
        if self.chunk_size <= 0.0 {
            return Err(ConfigError::InvalidConfig("chunk_size must be positive"));
        }
        if self.max_entities == 0 {
            return Err(ConfigError::InvalidConfig("max_entities must be non-zero"));
        }
        if self.max_dt <= 0.0 {
            return Err(ConfigError::InvalidConfig("max_dt must be positive"));
        }
        if self.collision_cutoff <= 0.0 {
            return Err(ConfigError::InvalidConfig("collision_cutoff must be positive"));
        }
        if self.melee_radius <= 0.0 || self.chase_radius <= self.melee_radius {
            return Err(ConfigError::InvalidConfig(
                "chase_radius must exceed a positive melee_radius",
            ));
        }
        if self.wander_speed < 0.0
            || self.chase_speed < 0.0
            || self.gatherer_speed < 0.0
            || self.swing_speed < 0.0
        {
            return Err(ConfigError::InvalidConfig("speeds must be non-negative"));
        }
        if self.wander_radius <= 0.0 || self.wander_duration <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "wander radius and duration must be positive",
            ));
        }
        if self.idle_cooldown_min <= 0.0 || self.idle_cooldown_max < self.idle_cooldown_min {
            return Err(ConfigError::InvalidConfig(
                "idle cooldown bounds must be positive and ordered",
            ));
        }
        if self.vision_radius <= 0.0 || self.search_half_extent <= self.vision_radius {
            return Err(ConfigError::InvalidConfig(
                "search_half_extent must exceed a positive vision_radius",
            ));
        }
        if self.harvest_range <= 0.0 || self.harvest_interval <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "harvest range and interval must be positive",
            ));
        }
        if self.spawn_interval <= 0.0 {
            return Err(ConfigError::InvalidConfig("spawn_interval must be positive"));
        }
        if self.chunk_window_radius < 0 {
            return Err(ConfigError::InvalidConfig(
                "chunk_window_radius must be non-negative",
            ));
        }
        if self.safe_zone_half_width < 0.0 || self.safe_zone_half_height < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "safe zone extents must be non-negative",
            ));
        }
        for entry in &self.biome.creatures {
            if entry.weight < 0.0 {
                return Err(ConfigError::InvalidConfig("creature weights must be non-negative"));
            }
            if entry.group_min == 0 || entry.group_max < entry.group_min {
                return Err(ConfigError::InvalidConfig(
                    "creature group bounds must be positive and ordered",
                ));
            }
        }
        for entry in &self.biome.resources {
            if !(0.0..=1.0).contains(&entry.weight) {
                return Err(ConfigError::InvalidConfig(
                    "resource weights must be within [0, 1]",
                ));
            }
            if entry.min_patches == 0 || entry.max_patches < entry.min_patches {
                return Err(ConfigError::InvalidConfig(
                    "patch count bounds must be positive and ordered",
                ));
            }
            if entry.min_nodes == 0 || entry.max_nodes < entry.min_nodes {
                return Err(ConfigError::InvalidConfig(
                    "node count bounds must be positive and ordered",
                ));
            }
            if entry.max_patch_radius <= 0.0 {
                return Err(ConfigError::InvalidConfig(
                    "max_patch_radius must be positive",
                ));
            }
        }
        let cols = (self.world_width / self.chunk_size).ceil() as usize;
        let rows = (self.world_height / self.chunk_size).ceil() as usize;
        Ok((rows, cols))
    }

    /// Seed actually used for this session: the configured one, or a fresh
    /// entropy draw. The same value feeds the world RNG and every per-chunk
    /// stream so a seeded session is reproducible end to end.
    #[must_use]
    pub(crate) fn resolved_seed(&self) -> u64 {
        self.rng_seed.unwrap_or_else(rand::random)
    }

    /// World RNG for the given session seed.
    pub(crate) fn seeded_rng(seed: u64) -> SmallRng {
        SmallRng::seed_from_u64(seed)
    }
}
