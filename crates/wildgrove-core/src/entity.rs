//! The entity pool: dense storage with stable generational handles.
//!
//! Entities live in a contiguous array for cheap per-tick iteration;
//! destruction swap-removes so the array stays dense. External references
//! are always [`EntityId`] handles resolved through the slot map, never raw
//! indices or pointers, because a destroy can relocate any entity.

use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use wildgrove_assets::AnimationId;

use crate::brain::Brain;

new_key_type! {
    /// Stable generational handle for entities. The default key is the null
    /// handle: it never resolves and compares unequal to every live handle.
    pub struct EntityId;
}

/// Simulation object categories. `name` is the stable key used by the asset
/// registry collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Boar,
    Warrior,
    Gatherer,
    Tree,
    Rock,
    Crystal,
    Arrow,
    MeleeSwing,
    Pickup,
}

impl EntityKind {
    /// Stable registry key for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Boar => "boar",
            Self::Warrior => "warrior",
            Self::Gatherer => "gatherer",
            Self::Tree => "tree",
            Self::Rock => "rock",
            Self::Crystal => "crystal",
            Self::Arrow => "arrow",
            Self::MeleeSwing => "melee_swing",
            Self::Pickup => "pickup",
        }
    }

    /// Kinds counted against a chunk's recurring-population cap.
    #[must_use]
    pub const fn is_creature(self) -> bool {
        matches!(self, Self::Boar | Self::Warrior | Self::Gatherer)
    }
}

/// Behavioral flag set stored as a compact bitmask. Call sites go through
/// the named accessors so the representation stays private.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityFlags(u32);

impl EntityFlags {
    /// Takes damage and can die.
    pub const KILLABLE: Self = Self(1 << 0);
    /// Solid for moving entities; collisions against it slide.
    pub const BLOCKER: Self = Self(1 << 1);
    /// Excluded from all collision detection.
    pub const NONSPATIAL: Self = Self(1 << 2);
    /// Destroyed at the end of the current tick.
    pub const MARKED_DELETE: Self = Self(1 << 3);
    /// Destroyed once its current animation finishes.
    pub const DELETE_AFTER_ANIM: Self = Self(1 << 4);
    /// Pickupable item.
    pub const ITEM: Self = Self(1 << 5);
    /// The player may interact with it.
    pub const INTERACTABLE: Self = Self(1 << 6);
    /// Applies hit damage and ignore-rules on contact.
    pub const PROJECTILE: Self = Self(1 << 7);
    /// Valid target for the gatherer's harvest loop.
    pub const HARVESTABLE: Self = Self(1 << 8);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn has(self, flag: Self) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn set(&mut self, flag: Self) {
        self.0 |= flag.0;
    }

    pub fn clear(&mut self, flag: Self) {
        self.0 &= !flag.0;
    }

    /// Builder-style union used by spawn templates.
    #[must_use]
    pub const fn with(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }
}

/// Bounding shape kinds. Only axis-aligned rectangles exist today.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ColliderShape {
    #[default]
    Rect,
}

/// Axis-aligned bounding shape attached to an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Collider {
    pub shape: ColliderShape,
    /// Offset of the shape center from the entity position.
    pub offset: Vec2,
    pub width: f32,
    pub height: f32,
}

impl Collider {
    #[must_use]
    pub const fn rect(width: f32, height: f32) -> Self {
        Self {
            shape: ColliderShape::Rect,
            offset: Vec2::ZERO,
            width,
            height,
        }
    }

    #[must_use]
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

impl Default for Collider {
    fn default() -> Self {
        Self::rect(1.0, 1.0)
    }
}

/// Current animation playback state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AnimationState {
    pub animation: Option<AnimationId>,
    pub frame: u32,
    pub elapsed: f32,
    pub flipped: bool,
}

impl AnimationState {
    /// Switch to `animation`, restarting playback only on an actual change.
    pub fn play(&mut self, animation: AnimationId) {
        if self.animation != Some(animation) {
            self.animation = Some(animation);
            self.frame = 0;
            self.elapsed = 0.0;
        }
    }
}

/// One stack of a single item kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStack {
    pub kind: EntityKind,
    pub count: u32,
}

/// Carried items, merged by kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Inventory {
    slots: Vec<ItemStack>,
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: EntityKind, count: u32) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.kind == kind) {
            slot.count += count;
        } else {
            self.slots.push(ItemStack { kind, count });
        }
    }

    #[must_use]
    pub fn count_of(&self, kind: EntityKind) -> u32 {
        self.slots
            .iter()
            .find(|slot| slot.kind == kind)
            .map_or(0, |slot| slot.count)
    }

    #[must_use]
    pub fn slots(&self) -> &[ItemStack] {
        &self.slots
    }
}

/// One simulation object. Owned exclusively by [`EntityArena`].
#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub z_pos: f32,
    pub z_vel: f32,
    pub z_acc: f32,
    pub rotation: f32,
    pub collider: Collider,
    pub flags: EntityFlags,
    pub hp: i32,
    pub anim: AnimationState,
    pub brain: Option<Brain>,
    pub inventory: Option<Inventory>,
}

impl Entity {
    /// Builds an entity of `kind` at `position` from the kind's template.
    /// The id is assigned on insertion.
    #[must_use]
    pub fn from_template(kind: EntityKind, position: Vec2) -> Self {
        let template = kind_template(kind);
        Self {
            id: EntityId::default(),
            kind,
            position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            z_pos: 0.0,
            z_vel: 0.0,
            z_acc: 0.0,
            rotation: 0.0,
            collider: template.collider,
            flags: template.flags,
            hp: template.hp,
            anim: AnimationState::default(),
            brain: template.brain,
            inventory: template.inventory,
        }
    }

    /// World-space center of the bounding shape.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        self.position + self.collider.offset
    }

    #[must_use]
    pub fn has_flag(&self, flag: EntityFlags) -> bool {
        self.flags.has(flag)
    }
}

struct KindTemplate {
    flags: EntityFlags,
    collider: Collider,
    hp: i32,
    brain: Option<Brain>,
    inventory: Option<Inventory>,
}

/// Per-kind defaults. Explicit data passed through construction, not
/// process-wide statics, so tests can spawn anything without setup.
fn kind_template(kind: EntityKind) -> KindTemplate {
    use EntityFlags as F;
    match kind {
        EntityKind::Player => KindTemplate {
            flags: F::KILLABLE,
            collider: Collider::rect(0.8, 0.8),
            hp: 10,
            brain: None,
            inventory: Some(Inventory::new()),
        },
        EntityKind::Boar => KindTemplate {
            flags: F::KILLABLE,
            collider: Collider::rect(0.9, 0.6),
            hp: 3,
            brain: Some(Brain::boar()),
            inventory: None,
        },
        EntityKind::Warrior => KindTemplate {
            flags: F::KILLABLE,
            collider: Collider::rect(0.7, 0.9),
            hp: 5,
            brain: Some(Brain::warrior()),
            inventory: None,
        },
        EntityKind::Gatherer => KindTemplate {
            flags: F::KILLABLE,
            collider: Collider::rect(0.7, 0.7),
            hp: 4,
            brain: Some(Brain::gatherer()),
            inventory: Some(Inventory::new()),
        },
        EntityKind::Tree => KindTemplate {
            flags: F::KILLABLE.with(F::BLOCKER).with(F::HARVESTABLE),
            collider: Collider::rect(1.0, 1.0),
            hp: 5,
            brain: None,
            inventory: None,
        },
        EntityKind::Rock => KindTemplate {
            flags: F::KILLABLE.with(F::BLOCKER).with(F::HARVESTABLE),
            collider: Collider::rect(1.2, 1.0),
            hp: 8,
            brain: None,
            inventory: None,
        },
        EntityKind::Crystal => KindTemplate {
            flags: F::KILLABLE.with(F::HARVESTABLE),
            collider: Collider::rect(0.6, 0.8),
            hp: 4,
            brain: None,
            inventory: None,
        },
        EntityKind::Arrow => KindTemplate {
            flags: F::PROJECTILE,
            collider: Collider::rect(0.2, 0.2),
            hp: 1,
            brain: None,
            inventory: None,
        },
        EntityKind::MeleeSwing => KindTemplate {
            flags: F::PROJECTILE,
            collider: Collider::rect(0.5, 0.5),
            hp: 1,
            brain: None,
            inventory: None,
        },
        EntityKind::Pickup => KindTemplate {
            flags: F::ITEM.with(F::INTERACTABLE),
            collider: Collider::rect(0.4, 0.4),
            hp: 1,
            brain: None,
            inventory: None,
        },
    }
}

/// Dense entity storage with generational handles.
///
/// `slots` maps a handle to its current dense index; `handles` is the dense
/// handle column kept in lockstep with `entities`. For every live id,
/// `entities[slots[id]].id == id`.
#[derive(Debug)]
pub struct EntityArena {
    slots: SlotMap<EntityId, usize>,
    handles: Vec<EntityId>,
    entities: Vec<Entity>,
    capacity: usize,
}

impl EntityArena {
    /// Create an arena holding at most `capacity` live entities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
            handles: Vec::with_capacity(capacity),
            entities: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert a new entity, assigning its handle.
    ///
    /// # Panics
    ///
    /// Panics when the pool is full. Capacity is a content configuration
    /// constant, not a runtime condition to retry.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        assert!(
            self.entities.len() < self.capacity,
            "entity pool capacity ({}) exceeded; raise max_entities",
            self.capacity
        );
        let index = self.entities.len();
        let id = self.slots.insert(index);
        entity.id = id;
        self.entities.push(entity);
        self.handles.push(id);
        id
    }

    /// Remove `id`, returning its entity if it was live.
    ///
    /// The last dense row is swap-moved into the freed slot and its lookup
    /// entry fixed up, keeping `[0, len)` contiguous in O(1).
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.slots.remove(id)?;
        let removed = self.entities.swap_remove(index);
        let removed_handle = self.handles.swap_remove(index);
        debug_assert_eq!(removed_handle, id);
        if index < self.handles.len() {
            let moved = self.handles[index];
            if let Some(slot) = self.slots.get_mut(moved) {
                *slot = index;
            }
        }
        Some(removed)
    }

    /// Resolve a handle. Stale handles (destroyed since they were obtained)
    /// return `None`, never a different entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        let index = *self.slots.get(id)?;
        self.entities.get(index)
    }

    /// Mutable resolve.
    #[must_use]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let index = *self.slots.get(id)?;
        self.entities.get_mut(index)
    }

    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.slots.contains_key(id)
    }

    /// Current dense index of `id`, if live.
    #[must_use]
    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Iterate live handles in dense order.
    pub fn iter_handles(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.handles.iter().copied()
    }

    /// Iterate live entities in dense order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Dense row slice for read-only collaborators (render snapshots).
    #[must_use]
    pub fn rows(&self) -> &[Entity] {
        &self.entities
    }

    /// Mutable dense rows for bulk per-tick passes.
    pub fn rows_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    /// First live entity of `kind` in dense order.
    #[must_use]
    pub fn find_first_of_kind(&self, kind: EntityKind) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|entity| entity.kind == kind)
            .map(|entity| entity.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(arena: &mut EntityArena, kind: EntityKind, x: f32) -> EntityId {
        arena.insert(Entity::from_template(kind, Vec2::new(x, 0.0)))
    }

    #[test]
    fn handles_stay_valid_across_unrelated_removals() {
        let mut arena = EntityArena::with_capacity(8);
        let a = spawn(&mut arena, EntityKind::Boar, 0.0);
        let b = spawn(&mut arena, EntityKind::Tree, 1.0);
        let c = spawn(&mut arena, EntityKind::Rock, 2.0);

        arena.remove(b).expect("b removed");
        assert!(arena.get(b).is_none());
        assert_eq!(arena.get(a).map(|e| e.kind), Some(EntityKind::Boar));
        assert_eq!(arena.get(c).map(|e| e.kind), Some(EntityKind::Rock));

        // A recycled slot must not resurrect the old handle.
        let d = spawn(&mut arena, EntityKind::Crystal, 3.0);
        assert_ne!(b, d);
        assert!(arena.get(b).is_none());
        assert_eq!(arena.get(d).map(|e| e.kind), Some(EntityKind::Crystal));
    }

    #[test]
    fn removal_keeps_dense_rows_coherent() {
        let mut arena = EntityArena::with_capacity(8);
        let ids: Vec<_> = (0..5)
            .map(|i| spawn(&mut arena, EntityKind::Boar, i as f32))
            .collect();

        arena.remove(ids[1]).expect("removed");
        arena.remove(ids[3]).expect("removed");

        assert_eq!(arena.len(), 3);
        for (dense, entity) in arena.rows().iter().enumerate() {
            assert_eq!(arena.index_of(entity.id), Some(dense));
        }
        for id in arena.iter_handles() {
            let index = arena.index_of(id).expect("live index");
            assert_eq!(arena.rows()[index].id, id);
        }
    }

    #[test]
    fn null_handle_never_resolves() {
        let mut arena = EntityArena::with_capacity(2);
        let live = spawn(&mut arena, EntityKind::Player, 0.0);
        let null = EntityId::default();
        assert_ne!(null, live);
        assert!(arena.get(null).is_none());
        assert!(!arena.contains(null));
    }

    #[test]
    #[should_panic(expected = "entity pool capacity")]
    fn capacity_overflow_is_fatal() {
        let mut arena = EntityArena::with_capacity(2);
        spawn(&mut arena, EntityKind::Boar, 0.0);
        spawn(&mut arena, EntityKind::Boar, 1.0);
        spawn(&mut arena, EntityKind::Boar, 2.0);
    }

    #[test]
    fn find_first_of_kind_scans_dense_order() {
        let mut arena = EntityArena::with_capacity(8);
        spawn(&mut arena, EntityKind::Tree, 0.0);
        let warrior = spawn(&mut arena, EntityKind::Warrior, 1.0);
        spawn(&mut arena, EntityKind::Warrior, 2.0);
        assert_eq!(arena.find_first_of_kind(EntityKind::Warrior), Some(warrior));
        assert_eq!(arena.find_first_of_kind(EntityKind::Player), None);
    }

    #[test]
    fn flag_accessors_roundtrip() {
        let mut flags = EntityFlags::empty();
        assert!(!flags.has(EntityFlags::BLOCKER));
        flags.set(EntityFlags::BLOCKER);
        flags.set(EntityFlags::KILLABLE);
        assert!(flags.has(EntityFlags::BLOCKER));
        flags.clear(EntityFlags::BLOCKER);
        assert!(!flags.has(EntityFlags::BLOCKER));
        assert!(flags.has(EntityFlags::KILLABLE));
    }

    #[test]
    fn inventory_merges_stacks() {
        let mut inventory = Inventory::new();
        inventory.add(EntityKind::Tree, 2);
        inventory.add(EntityKind::Tree, 3);
        inventory.add(EntityKind::Crystal, 1);
        assert_eq!(inventory.count_of(EntityKind::Tree), 5);
        assert_eq!(inventory.count_of(EntityKind::Crystal), 1);
        assert_eq!(inventory.slots().len(), 2);
    }
}
