//! Sprite and animation lookups shared between the simulation core and its
//! rendering collaborators.
//!
//! The core never touches pixel data; it only needs to know which animation
//! to play for an entity kind, how long an animation runs, and which frame is
//! current. Everything here is plain data resolved through the
//! [`AnimationLibrary`] trait so the core stays testable without any assets
//! on disk.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Identifier of a packed sprite within the atlas owned by the renderer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SpriteId(pub u32);

/// Identifier of a registered animation definition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AnimationId(pub u32);

/// Errors raised while assembling a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    /// An animation set referenced an id that was never registered.
    #[error("animation set for `{kind}` references unknown animation {id:?}")]
    UnknownAnimation { kind: String, id: AnimationId },
    /// A definition with no frames or a non-positive frame duration.
    #[error("animation definition is degenerate: {0}")]
    DegenerateDefinition(&'static str),
}

/// Frame-level description of one animation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnimationDef {
    /// Sprite of the first frame; subsequent frames follow in the atlas.
    pub base_sprite: SpriteId,
    /// Number of frames in the strip.
    pub frame_count: u32,
    /// Seconds each frame is held.
    pub frame_duration: f32,
    /// Whether playback wraps or holds on the final frame.
    pub looping: bool,
}

impl AnimationDef {
    /// Total wall-clock length of one playback pass.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.frame_count as f32 * self.frame_duration
    }

    /// Frame index for `elapsed` seconds of playback.
    #[must_use]
    pub fn frame_at(&self, elapsed: f32) -> u32 {
        if self.frame_count == 0 || self.frame_duration <= 0.0 {
            return 0;
        }
        let raw = (elapsed / self.frame_duration).floor() as u32;
        if self.looping {
            raw % self.frame_count
        } else {
            raw.min(self.frame_count - 1)
        }
    }

    /// Whether a non-looping playback has run to completion.
    #[must_use]
    pub fn finished(&self, elapsed: f32) -> bool {
        elapsed >= self.duration()
    }
}

/// Animations available to one entity kind. Absent entries are valid
/// configuration, not errors; callers skip what is missing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct AnimationSet {
    pub idle: Option<AnimationId>,
    pub walk: Option<AnimationId>,
    pub attack: Option<AnimationId>,
    pub death: Option<AnimationId>,
}

impl AnimationSet {
    /// Set that only ever shows its idle strip.
    #[must_use]
    pub const fn idle_only(idle: AnimationId) -> Self {
        Self {
            idle: Some(idle),
            walk: None,
            attack: None,
            death: None,
        }
    }
}

/// Lookup surface the simulation core depends on.
pub trait AnimationLibrary: Send + Sync {
    /// Animation set for an entity kind, keyed by the kind's stable name.
    fn set_for(&self, kind: &str) -> Option<&AnimationSet>;

    /// Definition backing a registered animation id.
    fn animation(&self, id: AnimationId) -> Option<&AnimationDef>;

    /// Default sprite shown when no animation is playing.
    fn default_sprite(&self, kind: &str) -> Option<SpriteId>;
}

/// Map-backed registry built once at startup and shared by reference.
#[derive(Debug, Default)]
pub struct StaticAnimationLibrary {
    defs: Vec<AnimationDef>,
    sets: HashMap<String, AnimationSet>,
    sprites: HashMap<String, SpriteId>,
}

impl StaticAnimationLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, returning its id.
    pub fn register_animation(&mut self, def: AnimationDef) -> Result<AnimationId, AssetError> {
        if def.frame_count == 0 {
            return Err(AssetError::DegenerateDefinition("frame_count is zero"));
        }
        if def.frame_duration <= 0.0 {
            return Err(AssetError::DegenerateDefinition(
                "frame_duration must be positive",
            ));
        }
        let id = AnimationId(self.defs.len() as u32);
        self.defs.push(def);
        Ok(id)
    }

    /// Attaches an animation set to an entity kind name.
    pub fn register_set(
        &mut self,
        kind: impl Into<String>,
        set: AnimationSet,
    ) -> Result<(), AssetError> {
        let kind = kind.into();
        for id in [set.idle, set.walk, set.attack, set.death].into_iter().flatten() {
            if id.0 as usize >= self.defs.len() {
                return Err(AssetError::UnknownAnimation { kind, id });
            }
        }
        self.sets.insert(kind, set);
        Ok(())
    }

    /// Records the fallback sprite for a kind.
    pub fn register_sprite(&mut self, kind: impl Into<String>, sprite: SpriteId) {
        self.sprites.insert(kind.into(), sprite);
    }
}

impl AnimationLibrary for StaticAnimationLibrary {
    fn set_for(&self, kind: &str) -> Option<&AnimationSet> {
        self.sets.get(kind)
    }

    fn animation(&self, id: AnimationId) -> Option<&AnimationDef> {
        self.defs.get(id.0 as usize)
    }

    fn default_sprite(&self, kind: &str) -> Option<SpriteId> {
        self.sprites.get(kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(frames: u32, dur: f32, looping: bool) -> AnimationDef {
        AnimationDef {
            base_sprite: SpriteId(0),
            frame_count: frames,
            frame_duration: dur,
            looping,
        }
    }

    #[test]
    fn frame_selection_loops_and_clamps() {
        let looping = def(4, 0.25, true);
        assert_eq!(looping.frame_at(0.0), 0);
        assert_eq!(looping.frame_at(0.30), 1);
        assert_eq!(looping.frame_at(1.10), 0);

        let oneshot = def(4, 0.25, false);
        assert_eq!(oneshot.frame_at(5.0), 3);
        assert!(oneshot.finished(1.0));
        assert!(!oneshot.finished(0.9));
    }

    #[test]
    fn registry_validates_set_references() {
        let mut lib = StaticAnimationLibrary::new();
        let idle = lib.register_animation(def(2, 0.5, true)).expect("idle");
        lib.register_set("boar", AnimationSet::idle_only(idle))
            .expect("valid set");
        assert!(lib.set_for("boar").is_some());
        assert!(lib.set_for("warrior").is_none());

        let bogus = AnimationSet::idle_only(AnimationId(99));
        let err = lib.register_set("warrior", bogus).unwrap_err();
        assert_eq!(
            err,
            AssetError::UnknownAnimation {
                kind: "warrior".into(),
                id: AnimationId(99)
            }
        );
    }

    #[test]
    fn degenerate_definitions_are_rejected() {
        let mut lib = StaticAnimationLibrary::new();
        assert!(lib.register_animation(def(0, 0.5, true)).is_err());
        assert!(lib.register_animation(def(2, 0.0, true)).is_err());
    }

    #[test]
    fn default_sprites_resolve_by_kind() {
        let mut lib = StaticAnimationLibrary::new();
        lib.register_sprite("rock", SpriteId(7));
        assert_eq!(lib.default_sprite("rock"), Some(SpriteId(7)));
        assert_eq!(lib.default_sprite("tree"), None);
    }
}
