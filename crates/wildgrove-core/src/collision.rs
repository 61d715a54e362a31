//! Pairwise collision policy, the per-pair rule table, and the swept
//! rectangle test used to resolve movement.
//!
//! Most pairs are decided by [`default_should_collide`] from flags alone.
//! The rule table holds only the exceptions (a projectile that must ignore
//! the entity that fired it, a hitbox that already damaged its target) and
//! is consulted first. Rules key on the unordered pair, stored canonically
//! with the smaller handle first, so `(a, b)` and `(b, a)` are one entry.

use crate::entity::{Entity, EntityFlags, EntityId};
use crate::math::Vec2;
use slotmap::Key;

/// Bucket count for the rule table. Power of two so the bucket index is a
/// mask of the handle bits.
const RULE_BUCKETS: usize = 64;

/// Sentinel index terminating a bucket chain or the free list.
const NIL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct RuleSlot {
    low: EntityId,
    high: EntityId,
    should_collide: bool,
    next: u32,
}

/// Exception table overriding the default collision policy per entity pair.
///
/// Slots are pooled: clearing or purging a rule pushes its slot onto a free
/// list for reuse, so a long session churns slots instead of growing the
/// backing vector without bound.
#[derive(Debug)]
pub struct CollisionRules {
    buckets: [u32; RULE_BUCKETS],
    slots: Vec<RuleSlot>,
    free: u32,
    len: usize,
}

impl Default for CollisionRules {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionRules {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: [NIL; RULE_BUCKETS],
            slots: Vec::new(),
            free: NIL,
            len: 0,
        }
    }

    /// Number of live rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn canonical(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn bucket_of(low: EntityId) -> usize {
        (low.data().as_ffi() as usize) & (RULE_BUCKETS - 1)
    }

    /// Record that `a` and `b` should (or should not) collide, replacing any
    /// existing rule for the pair.
    pub fn add_rule(&mut self, a: EntityId, b: EntityId, should_collide: bool) {
        let (low, high) = Self::canonical(a, b);
        let bucket = Self::bucket_of(low);

        let mut cursor = self.buckets[bucket];
        while cursor != NIL {
            let slot = &mut self.slots[cursor as usize];
            if slot.low == low && slot.high == high {
                slot.should_collide = should_collide;
                return;
            }
            cursor = slot.next;
        }

        let slot = RuleSlot {
            low,
            high,
            should_collide,
            next: self.buckets[bucket],
        };
        let index = if self.free != NIL {
            let index = self.free;
            self.free = self.slots[index as usize].next;
            self.slots[index as usize] = slot;
            index
        } else {
            self.slots.push(slot);
            (self.slots.len() - 1) as u32
        };
        self.buckets[bucket] = index;
        self.len += 1;
    }

    /// Rule for the unordered pair, if one exists.
    #[must_use]
    pub fn rule_for(&self, a: EntityId, b: EntityId) -> Option<bool> {
        let (low, high) = Self::canonical(a, b);
        let mut cursor = self.buckets[Self::bucket_of(low)];
        while cursor != NIL {
            let slot = &self.slots[cursor as usize];
            if slot.low == low && slot.high == high {
                return Some(slot.should_collide);
            }
            cursor = slot.next;
        }
        None
    }

    /// Drop the rule for the pair, if any, returning whether one was removed.
    pub fn clear_rule(&mut self, a: EntityId, b: EntityId) -> bool {
        let (low, high) = Self::canonical(a, b);
        let bucket = Self::bucket_of(low);
        let mut prev = NIL;
        let mut cursor = self.buckets[bucket];
        while cursor != NIL {
            let slot = self.slots[cursor as usize];
            if slot.low == low && slot.high == high {
                self.unlink(bucket, prev, cursor);
                return true;
            }
            prev = cursor;
            cursor = slot.next;
        }
        false
    }

    /// Drop every rule mentioning `id`. Called when an entity is destroyed
    /// so the table cannot accumulate entries for dead handles.
    pub fn purge_entity(&mut self, id: EntityId) {
        for bucket in 0..RULE_BUCKETS {
            let mut prev = NIL;
            let mut cursor = self.buckets[bucket];
            while cursor != NIL {
                let slot = self.slots[cursor as usize];
                if slot.low == id || slot.high == id {
                    self.unlink(bucket, prev, cursor);
                    // prev is unchanged; the chain now skips the freed slot.
                    cursor = if prev == NIL {
                        self.buckets[bucket]
                    } else {
                        self.slots[prev as usize].next
                    };
                } else {
                    prev = cursor;
                    cursor = slot.next;
                }
            }
        }
    }

    fn unlink(&mut self, bucket: usize, prev: u32, index: u32) {
        let next = self.slots[index as usize].next;
        if prev == NIL {
            self.buckets[bucket] = next;
        } else {
            self.slots[prev as usize].next = next;
        }
        self.slots[index as usize].next = self.free;
        self.free = index;
        self.len -= 1;
    }
}

/// Default flag-derived policy for a subject moving against a target.
///
/// The subject is the moving entity being resolved this pass; the ordering
/// matters for the killable-versus-blocker exemption, which lets creatures
/// walk through each other while still running into walls and trees.
#[must_use]
pub fn default_should_collide(subject: &Entity, target: &Entity, cutoff: f32) -> bool {
    if subject.id == target.id {
        return false;
    }
    if subject.has_flag(EntityFlags::NONSPATIAL) || target.has_flag(EntityFlags::NONSPATIAL) {
        return false;
    }
    if subject.center().distance_sq(target.center()) > cutoff * cutoff {
        return false;
    }
    if subject.has_flag(EntityFlags::KILLABLE) && !target.has_flag(EntityFlags::BLOCKER) {
        return false;
    }
    true
}

/// Policy with the rule table consulted first.
#[must_use]
pub fn should_collide(
    rules: &CollisionRules,
    subject: &Entity,
    target: &Entity,
    cutoff: f32,
) -> bool {
    if let Some(rule) = rules.rule_for(subject.id, target.id) {
        return rule;
    }
    default_should_collide(subject, target, cutoff)
}

/// Result of a swept test: time of impact in `[0, 1]` of the frame's motion
/// and the axis-aligned surface normal at the contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    pub toi: f32,
    pub normal: Vec2,
}

/// Sweep a point along `rel_delta` against a stationary rectangle centered
/// on the origin with the given half extents (the Minkowski sum of the two
/// colliders). `rel_pos` is the subject center relative to the target center
/// at the start of the frame.
///
/// Returns the earliest contact within the frame, or `None` when the motion
/// never enters the rectangle. An already-overlapping start reports contact
/// at `toi` 0 with the normal opposing the motion's dominant axis.
#[must_use]
pub fn sweep_rect(rel_pos: Vec2, rel_delta: Vec2, half: Vec2) -> Option<SweepHit> {
    let inside_x = rel_pos.x.abs() <= half.x;
    let inside_y = rel_pos.y.abs() <= half.y;
    if inside_x && inside_y {
        // Already overlapping. Normal points out along the shallower axis,
        // toward the subject side of the rectangle.
        let pen_x = half.x - rel_pos.x.abs();
        let pen_y = half.y - rel_pos.y.abs();
        let normal = if pen_x <= pen_y {
            Vec2::new(rel_pos.x.signum(), 0.0)
        } else {
            Vec2::new(0.0, rel_pos.y.signum())
        };
        return Some(SweepHit { toi: 0.0, normal });
    }

    let mut entry = f32::NEG_INFINITY;
    let mut exit = f32::INFINITY;
    let mut normal = Vec2::ZERO;

    for axis in 0..2 {
        let (pos, delta, extent) = if axis == 0 {
            (rel_pos.x, rel_delta.x, half.x)
        } else {
            (rel_pos.y, rel_delta.y, half.y)
        };
        if delta.abs() <= f32::EPSILON {
            if pos.abs() > extent {
                return None;
            }
            continue;
        }
        let t_near = (-extent - pos) / delta;
        let t_far = (extent - pos) / delta;
        let (t_near, t_far) = if t_near <= t_far {
            (t_near, t_far)
        } else {
            (t_far, t_near)
        };
        if t_near > entry {
            entry = t_near;
            normal = if axis == 0 {
                Vec2::new(-delta.signum(), 0.0)
            } else {
                Vec2::new(0.0, -delta.signum())
            };
        }
        exit = exit.min(t_far);
    }

    if entry > exit || !(0.0..=1.0).contains(&entry) {
        return None;
    }
    Some(SweepHit { toi: entry, normal })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityArena, EntityKind};

    fn pair(arena: &mut EntityArena) -> (EntityId, EntityId) {
        let a = arena.insert(Entity::from_template(EntityKind::Arrow, Vec2::ZERO));
        let b = arena.insert(Entity::from_template(EntityKind::Warrior, Vec2::ZERO));
        (a, b)
    }

    #[test]
    fn rules_are_order_insensitive_and_last_write_wins() {
        let mut arena = EntityArena::with_capacity(4);
        let (a, b) = pair(&mut arena);
        let mut rules = CollisionRules::new();

        rules.add_rule(a, b, false);
        assert_eq!(rules.rule_for(b, a), Some(false));
        assert_eq!(rules.len(), 1);

        rules.add_rule(b, a, true);
        assert_eq!(rules.rule_for(a, b), Some(true));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn cleared_slots_are_reused() {
        let mut arena = EntityArena::with_capacity(8);
        let ids: Vec<_> = (0..4)
            .map(|i| {
                arena.insert(Entity::from_template(
                    EntityKind::Boar,
                    Vec2::new(i as f32, 0.0),
                ))
            })
            .collect();
        let mut rules = CollisionRules::new();

        rules.add_rule(ids[0], ids[1], false);
        rules.add_rule(ids[0], ids[2], false);
        let slots_before = rules.slots.len();

        assert!(rules.clear_rule(ids[1], ids[0]));
        assert!(!rules.clear_rule(ids[1], ids[0]));
        rules.add_rule(ids[0], ids[3], true);
        assert_eq!(rules.slots.len(), slots_before);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.rule_for(ids[0], ids[1]), None);
        assert_eq!(rules.rule_for(ids[0], ids[3]), Some(true));
    }

    #[test]
    fn purge_drops_every_rule_for_an_entity() {
        let mut arena = EntityArena::with_capacity(8);
        let ids: Vec<_> = (0..4)
            .map(|i| {
                arena.insert(Entity::from_template(
                    EntityKind::Boar,
                    Vec2::new(i as f32, 0.0),
                ))
            })
            .collect();
        let mut rules = CollisionRules::new();
        rules.add_rule(ids[0], ids[1], false);
        rules.add_rule(ids[0], ids[2], false);
        rules.add_rule(ids[2], ids[3], true);

        rules.purge_entity(ids[0]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rule_for(ids[0], ids[1]), None);
        assert_eq!(rules.rule_for(ids[0], ids[2]), None);
        assert_eq!(rules.rule_for(ids[2], ids[3]), Some(true));
    }

    #[test]
    fn default_policy_respects_flags_and_cutoff() {
        let mut arena = EntityArena::with_capacity(8);
        let boar = arena.insert(Entity::from_template(EntityKind::Boar, Vec2::ZERO));
        let other_boar = arena.insert(Entity::from_template(
            EntityKind::Boar,
            Vec2::new(1.0, 0.0),
        ));
        let tree = arena.insert(Entity::from_template(EntityKind::Tree, Vec2::new(1.0, 0.0)));
        let far_tree = arena.insert(Entity::from_template(
            EntityKind::Tree,
            Vec2::new(100.0, 0.0),
        ));

        let get = |id| arena.get(id).expect("live");
        // Creatures pass through each other but not through blockers.
        assert!(!default_should_collide(get(boar), get(other_boar), 10.0));
        assert!(default_should_collide(get(boar), get(tree), 10.0));
        assert!(!default_should_collide(get(boar), get(far_tree), 10.0));
        assert!(!default_should_collide(get(boar), get(boar), 10.0));

        // A projectile subject is not killable, so it hits creatures.
        let arrow = arena.insert(Entity::from_template(
            EntityKind::Arrow,
            Vec2::new(0.5, 0.0),
        ));
        let get = |id| arena.get(id).expect("live");
        assert!(default_should_collide(get(arrow), get(boar), 10.0));
    }

    #[test]
    fn rule_overrides_default_policy() {
        let mut arena = EntityArena::with_capacity(4);
        let arrow = arena.insert(Entity::from_template(EntityKind::Arrow, Vec2::ZERO));
        let boar = arena.insert(Entity::from_template(EntityKind::Boar, Vec2::new(0.5, 0.0)));
        let mut rules = CollisionRules::new();

        {
            let a = arena.get(arrow).expect("live");
            let b = arena.get(boar).expect("live");
            assert!(should_collide(&rules, a, b, 10.0));
        }
        rules.add_rule(arrow, boar, false);
        {
            let a = arena.get(arrow).expect("live");
            let b = arena.get(boar).expect("live");
            assert!(!should_collide(&rules, a, b, 10.0));
        }
    }

    #[test]
    fn sweep_reports_entry_time_and_facing_normal() {
        // Subject approaching from the left, contact at half the frame.
        let hit = sweep_rect(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(1.0, 1.0))
            .expect("hit");
        assert!((hit.toi - 0.5).abs() < 1e-6);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));

        // From below.
        let hit = sweep_rect(Vec2::new(0.0, -3.0), Vec2::new(0.0, 4.0), Vec2::new(1.0, 1.0))
            .expect("hit");
        assert!((hit.toi - 0.5).abs() < 1e-6);
        assert_eq!(hit.normal, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn sweep_misses_when_path_stays_clear() {
        // Parallel pass above the box.
        assert!(sweep_rect(
            Vec2::new(-3.0, 2.5),
            Vec2::new(6.0, 0.0),
            Vec2::new(1.0, 1.0)
        )
        .is_none());
        // Moving away.
        assert!(sweep_rect(
            Vec2::new(3.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 1.0)
        )
        .is_none());
        // Would hit, but not within this frame.
        assert!(sweep_rect(
            Vec2::new(-10.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0)
        )
        .is_none());
    }

    #[test]
    fn overlapping_start_resolves_at_time_zero() {
        let hit = sweep_rect(Vec2::new(0.5, 0.1), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0))
            .expect("hit");
        assert_eq!(hit.toi, 0.0);
        assert_eq!(hit.normal.y, 0.0);
        assert!(hit.normal.x.abs() >= 1.0 - 1e-6);
    }
}
