//! Desktop seat adjustment
//!
//! Desktop occupants can nudge their seat offset with six held keys. The
//! mapper turns the keys held this tick into a rate-limited offset change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::util::vec3::Vec3;

/// Adjustment direction in seat-local space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Up,
        Direction::Down,
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit axis this direction moves along
    pub fn axis(&self) -> Vec3 {
        match self {
            Direction::Up => Vec3::UP,
            Direction::Down => Vec3::DOWN,
            Direction::Forward => Vec3::FORWARD,
            Direction::Backward => Vec3::BACK,
            Direction::Left => Vec3::LEFT,
            Direction::Right => Vec3::RIGHT,
        }
    }

    /// Suffix used for `STATION_KEY_*` environment overrides
    pub fn env_suffix(&self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Forward => "FORWARD",
            Direction::Backward => "BACKWARD",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }

    #[inline]
    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

/// Keyboard keys a binding can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    PageUp,
    PageDown,
    Home,
    End,
    Insert,
    Delete,
    KeyW,
    KeyQ,
    KeyE,
    /// Jump
    Space,
}

impl Key {
    const ALL: [Key; 10] = [
        Key::PageUp,
        Key::PageDown,
        Key::Home,
        Key::End,
        Key::Insert,
        Key::Delete,
        Key::KeyW,
        Key::KeyQ,
        Key::KeyE,
        Key::Space,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Key::PageUp => "PageUp",
            Key::PageDown => "PageDown",
            Key::Home => "Home",
            Key::End => "End",
            Key::Insert => "Insert",
            Key::Delete => "Delete",
            Key::KeyW => "KeyW",
            Key::KeyQ => "KeyQ",
            Key::KeyE => "KeyE",
            Key::Space => "Space",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Key {
    type Err = UnknownKey;

    /// Case-insensitive key name lookup
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKey(s.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown key name '{0}'")]
pub struct UnknownKey(String);

/// Key assignment for each adjustment direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub up: Key,
    pub down: Key,
    pub forward: Key,
    pub backward: Key,
    pub left: Key,
    pub right: Key,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            up: Key::PageUp,
            down: Key::PageDown,
            forward: Key::Home,
            backward: Key::End,
            left: Key::Insert,
            right: Key::Delete,
        }
    }
}

impl KeyBindings {
    pub fn key_for(&self, direction: Direction) -> Key {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Forward => self.forward,
            Direction::Backward => self.backward,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    pub fn set(&mut self, direction: Direction, key: Key) {
        let slot = match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
            Direction::Forward => &mut self.forward,
            Direction::Backward => &mut self.backward,
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
        };
        *slot = key;
    }
}

/// Held-key state, queried once per tick
pub trait InputSource {
    fn is_held(&self, key: Key) -> bool;
}

/// Set of directions held during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldDirections(u8);

impl HeldDirections {
    pub const NONE: HeldDirections = HeldDirections(0);

    /// Sample the input source through the given bindings
    pub fn poll(bindings: &KeyBindings, source: &impl InputSource) -> Self {
        Direction::ALL
            .into_iter()
            .filter(|d| source.is_held(bindings.key_for(*d)))
            .fold(Self::NONE, Self::with)
    }

    #[must_use]
    pub fn with(self, direction: Direction) -> Self {
        Self(self.0 | direction.bit())
    }

    #[inline]
    pub fn contains(&self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Direction> for HeldDirections {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

/// Accumulates the desktop occupant's preferred seat offset
#[derive(Debug, Clone, Copy)]
pub struct DesktopInputMapper {
    transition_speed: f32,
}

impl DesktopInputMapper {
    pub fn new(transition_speed: f32) -> Self {
        Self { transition_speed }
    }

    /// Move `offset` by `elapsed * transition_speed` along every held axis.
    ///
    /// Returns true if any direction was held, even when `elapsed` was zero,
    /// so the caller can decide whether to request a sync.
    pub fn update(&self, offset: &mut Vec3, elapsed_seconds: f32, held: HeldDirections) -> bool {
        if held.is_empty() {
            return false;
        }

        let step = if elapsed_seconds.is_finite() {
            elapsed_seconds.max(0.0) * self.transition_speed
        } else {
            0.0
        };

        for direction in held.iter() {
            *offset += step * direction.axis();
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const EPSILON: f32 = 1e-6;

    struct FakeKeyboard(HashSet<Key>);

    impl InputSource for FakeKeyboard {
        fn is_held(&self, key: Key) -> bool {
            self.0.contains(&key)
        }
    }

    #[test]
    fn test_nothing_held() {
        let mapper = DesktopInputMapper::new(0.2);
        let mut offset = Vec3::new(0.0, -0.6, 0.0);
        assert!(!mapper.update(&mut offset, 1.0, HeldDirections::NONE));
        assert_eq!(offset, Vec3::new(0.0, -0.6, 0.0));
    }

    #[test]
    fn test_move_up_one_second() {
        let mapper = DesktopInputMapper::new(0.2);
        let mut offset = Vec3::ZERO;
        let held: HeldDirections = [Direction::Up].into_iter().collect();

        assert!(mapper.update(&mut offset, 1.0, held));
        assert!(offset.approx_eq(Vec3::new(0.0, 0.2, 0.0), EPSILON));
    }

    #[test]
    fn test_opposite_directions_cancel() {
        let mapper = DesktopInputMapper::new(0.2);
        let mut offset = Vec3::ZERO;
        let held: HeldDirections = [Direction::Left, Direction::Right, Direction::Forward]
            .into_iter()
            .collect();

        assert!(mapper.update(&mut offset, 0.5, held));
        assert!(offset.approx_eq(Vec3::new(0.0, 0.0, 0.1), EPSILON));
    }

    #[test]
    fn test_invalid_elapsed_does_not_move() {
        let mapper = DesktopInputMapper::new(0.2);
        let mut offset = Vec3::ZERO;
        let held = HeldDirections::NONE.with(Direction::Down);

        assert!(mapper.update(&mut offset, -1.0, held));
        assert!(mapper.update(&mut offset, f32::NAN, held));
        assert_eq!(offset, Vec3::ZERO);
    }

    #[test]
    fn test_poll_uses_bindings() {
        let keyboard = FakeKeyboard([Key::PageUp, Key::Delete, Key::Space].into_iter().collect());
        let held = HeldDirections::poll(&KeyBindings::default(), &keyboard);

        assert!(held.contains(Direction::Up));
        assert!(held.contains(Direction::Right));
        assert!(!held.contains(Direction::Down));
        assert_eq!(held.iter().count(), 2);
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!("pageup".parse::<Key>().unwrap(), Key::PageUp);
        assert_eq!(" Delete ".parse::<Key>().unwrap(), Key::Delete);
        assert!("F13".parse::<Key>().is_err());
        assert_eq!(Key::Home.to_string(), "Home");
    }

    #[test]
    fn test_every_key_name_parses_back() {
        for key in Key::ALL {
            assert_eq!(key.name().parse::<Key>().unwrap(), key);
        }
    }

    #[test]
    fn test_rebinding() {
        let mut bindings = KeyBindings::default();
        bindings.set(Direction::Forward, Key::KeyW);
        assert_eq!(bindings.key_for(Direction::Forward), Key::KeyW);
        assert_eq!(bindings.key_for(Direction::Backward), Key::End);
    }
}
