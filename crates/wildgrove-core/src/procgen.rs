//! Chunked procedural spawning.
//!
//! The world is divided into a fixed grid of square chunks, each owning an
//! RNG stream seeded from the session seed and its grid coordinate. Two
//! populations run per chunk: a one-shot resource-patch pass the first time
//! the chunk enters the active window, and a recurring creature roll on a
//! timer. Spawning is deferred through [`SpawnOrder`]s so the caller can
//! commit them against the entity pool after the pass finishes.

use crate::config::WildgroveConfig;
use crate::entity::EntityKind;
use crate::math::{Rect, Vec2};
use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Attempts made to find a spawn point outside the player's safe zone
/// before the spawn is skipped for this pass.
const SAFE_PLACEMENT_ATTEMPTS: u32 = 4;

/// A spawn decided by the generator, to be committed by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnOrder {
    pub kind: EntityKind,
    pub position: Vec2,
}

/// Per-chunk generation state.
#[derive(Debug)]
struct ChunkState {
    /// One-shot resource pass already ran. Never reset: patches do not
    /// regrow when the player leaves and returns.
    resources_spawned: bool,
    /// Creature count at the last recurring roll.
    population: u32,
    respawn_timer: f32,
    rng: SmallRng,
}

/// Fixed chunk grid covering the whole world, centered on the origin.
#[derive(Debug)]
pub struct ChunkGrid {
    rows: usize,
    cols: usize,
    chunk_size: f32,
    /// World position of the grid's minimum corner.
    origin: Vec2,
    chunks: Vec<ChunkState>,
}

impl ChunkGrid {
    /// Build the grid for a validated configuration and session seed. Every
    /// chunk's stream is derived here, so generation depends only on the
    /// seed and the chunk coordinate, never on visit order.
    #[must_use]
    pub fn new(rows: usize, cols: usize, config: &WildgroveConfig, seed: u64) -> Self {
        let origin = Vec2::new(-config.world_width * 0.5, -config.world_height * 0.5);
        let mut chunks = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                chunks.push(ChunkState {
                    resources_spawned: false,
                    population: 0,
                    respawn_timer: config.spawn_interval,
                    rng: SmallRng::seed_from_u64(chunk_seed(seed, row, col)),
                });
            }
        }
        Self {
            rows,
            cols,
            chunk_size: config.chunk_size,
            origin,
            chunks,
        }
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Grid coordinate containing `pos`, or `None` outside the world.
    #[must_use]
    pub fn chunk_coord(&self, pos: Vec2) -> Option<(usize, usize)> {
        let local = pos - self.origin;
        if local.x < 0.0 || local.y < 0.0 {
            return None;
        }
        let col = (local.x / self.chunk_size).floor() as usize;
        let row = (local.y / self.chunk_size).floor() as usize;
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some((row, col))
    }

    /// World-space bounds of one chunk.
    #[must_use]
    pub fn chunk_bounds(&self, row: usize, col: usize) -> Rect {
        let min = self.origin
            + Vec2::new(col as f32 * self.chunk_size, row as f32 * self.chunk_size);
        Rect::new(min, min + Vec2::new(self.chunk_size, self.chunk_size))
    }

    /// Creature count recorded for a chunk at its last recurring roll.
    #[must_use]
    pub fn population(&self, row: usize, col: usize) -> u32 {
        self.chunks[row * self.cols + col].population
    }

    /// Advance generation for the active window around the player and queue
    /// resulting spawns. `creature_positions` is the current set of live
    /// creature positions, used to recount chunk populations.
    pub fn tick(
        &mut self,
        config: &WildgroveConfig,
        player_pos: Vec2,
        dt: f32,
        creature_positions: &[Vec2],
        orders: &mut Vec<SpawnOrder>,
    ) {
        let Some((player_row, player_col)) = self.chunk_coord(player_pos) else {
            return;
        };
        let safe_zone = Rect::centered(
            player_pos,
            config.safe_zone_half_width,
            config.safe_zone_half_height,
        );
        let radius = config.chunk_window_radius;

        for dr in -radius..=radius {
            for dc in -radius..=radius {
                let row = player_row as i64 + i64::from(dr);
                let col = player_col as i64 + i64::from(dc);
                if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
                    continue;
                }
                let (row, col) = (row as usize, col as usize);
                let bounds = self.chunk_bounds(row, col);
                let chunk = &mut self.chunks[row * self.cols + col];

                if !chunk.resources_spawned {
                    chunk.resources_spawned = true;
                    spawn_resource_patches(chunk, config, bounds, safe_zone, orders);
                }

                chunk.respawn_timer -= dt;
                if chunk.respawn_timer > 0.0 {
                    continue;
                }
                chunk.respawn_timer = config.spawn_interval;

                chunk.population = creature_positions
                    .iter()
                    .filter(|pos| bounds.contains(**pos))
                    .count() as u32;
                if chunk.population >= config.chunk_population_cap {
                    continue;
                }
                spawn_creature_group(chunk, config, bounds, safe_zone, orders);
            }
        }
    }
}

/// One-shot resource placement for a freshly activated chunk.
fn spawn_resource_patches(
    chunk: &mut ChunkState,
    config: &WildgroveConfig,
    bounds: Rect,
    safe_zone: Rect,
    orders: &mut Vec<SpawnOrder>,
) {
    for entry in &config.biome.resources {
        if chunk.rng.gen_range(0.0..1.0f32) >= entry.weight {
            continue;
        }
        let patches = chunk.rng.gen_range(entry.min_patches..=entry.max_patches);
        for _ in 0..patches {
            let Some(center) = safe_point(&mut chunk.rng, bounds, safe_zone) else {
                continue;
            };
            let radius = chunk.rng.gen_range(0.0..=entry.max_patch_radius);
            let nodes = chunk.rng.gen_range(entry.min_nodes..=entry.max_nodes);
            for _ in 0..nodes {
                let angle = chunk.rng.gen_range(0.0..std::f32::consts::TAU);
                let dist = chunk.rng.gen_range(0.0..=radius);
                let point = center + Vec2::new(angle.cos(), angle.sin()).scale(dist);
                // Scatter that leaves the chunk is dropped, not pulled back
                // in; edge patches simply come up short.
                if !bounds.contains(point) {
                    continue;
                }
                orders.push(SpawnOrder {
                    kind: entry.kind,
                    position: point,
                });
            }
        }
    }
}

/// One recurring roulette roll for a chunk below its population cap.
fn spawn_creature_group(
    chunk: &mut ChunkState,
    config: &WildgroveConfig,
    bounds: Rect,
    safe_zone: Rect,
    orders: &mut Vec<SpawnOrder>,
) {
    let total: f32 = config.biome.creatures.iter().map(|e| e.weight).sum();
    let ceiling = total.max(1.0);
    let roll = chunk.rng.gen_range(0.0..ceiling);
    let Some(entry) = weighted_pick(&config.biome.creatures, |e| e.weight, roll) else {
        // The roll landed in the empty remainder of the wheel.
        return;
    };
    let entry = *entry;
    let group = chunk.rng.gen_range(entry.group_min..=entry.group_max);
    let headroom = config.chunk_population_cap - chunk.population;
    for _ in 0..group.min(headroom) {
        if let Some(pos) = safe_point(&mut chunk.rng, bounds, safe_zone) {
            orders.push(SpawnOrder {
                kind: entry.kind,
                position: pos,
            });
        }
    }
}

/// Roulette selection: walk the entries subtracting weights until the roll
/// lands. A roll at or past the total weight selects nothing.
pub(crate) fn weighted_pick<T>(
    entries: &[T],
    weight: impl Fn(&T) -> f32,
    mut roll: f32,
) -> Option<&T> {
    for entry in entries {
        let w = weight(entry);
        if roll < w {
            return Some(entry);
        }
        roll -= w;
    }
    None
}

/// A random point in `bounds` outside `safe_zone`, or `None` after a small
/// fixed number of rejected attempts.
fn safe_point(rng: &mut SmallRng, bounds: Rect, safe_zone: Rect) -> Option<Vec2> {
    for _ in 0..SAFE_PLACEMENT_ATTEMPTS {
        let point = Vec2::new(
            rng.gen_range(bounds.min.x..bounds.max.x),
            rng.gen_range(bounds.min.y..bounds.max.y),
        );
        if !safe_zone.contains(point) {
            return Some(point);
        }
    }
    None
}

/// Stream seed for one chunk: a splitmix-style mix of the session seed and
/// the grid coordinate, so neighboring chunks get uncorrelated streams.
fn chunk_seed(seed: u64, row: usize, col: usize) -> u64 {
    let mut z = seed
        ^ (row as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (col as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
