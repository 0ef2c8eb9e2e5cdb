// ==============================================================================
// controls.rs — KEY EVENTS -> CONTROL FLAGS
// ------------------------------------------------------------------------------
// Converts discrete key-down/key-up events into the five boolean control
// flags read once per frame by the vehicle rig. No debouncing, no repeat
// suppression: keydown sets a flag, keyup clears it, independent of how many
// frames elapsed in between.
//
// The key -> action table is a fixed enum mapping built and validated at
// startup (every flag bound, no duplicate keys, reset key present), so the
// per-event path is a single table lookup instead of string dispatch.
// ==============================================================================

use std::collections::HashMap;

use crate::error::ConfigError;

/// The five control flags of the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlFlag {
    Forward,
    Backward,
    Left,
    Right,
    Brake,
}

impl ControlFlag {
    pub const ALL: [ControlFlag; 5] = [
        ControlFlag::Forward,
        ControlFlag::Backward,
        ControlFlag::Left,
        ControlFlag::Right,
        ControlFlag::Brake,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlFlag::Forward => "forward",
            ControlFlag::Backward => "backward",
            ControlFlag::Left => "left",
            ControlFlag::Right => "right",
            ControlFlag::Brake => "brake",
        }
    }
}

/// What a bound key does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Flag(ControlFlag),
    /// Immediate rig reset, independent of flag state.
    Reset,
}

/// Current control state. Mutated only by key events, read once per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Controls {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub brake: bool,
}

impl Controls {
    pub fn set(&mut self, flag: ControlFlag, down: bool) {
        match flag {
            ControlFlag::Forward => self.forward = down,
            ControlFlag::Backward => self.backward = down,
            ControlFlag::Left => self.left = down,
            ControlFlag::Right => self.right = down,
            ControlFlag::Brake => self.brake = down,
        }
    }

    pub fn get(&self, flag: ControlFlag) -> bool {
        match flag {
            ControlFlag::Forward => self.forward,
            ControlFlag::Backward => self.backward,
            ControlFlag::Left => self.left,
            ControlFlag::Right => self.right,
            ControlFlag::Brake => self.brake,
        }
    }
}

/// Key name -> action table, validated at construction.
#[derive(Debug)]
pub struct KeyMap {
    bindings: HashMap<String, KeyAction>,
}

impl KeyMap {
    /// The demo's standard bindings: w/a/s/d drive, space brakes, r resets.
    pub fn standard() -> Result<Self, ConfigError> {
        Self::from_bindings(&[
            ("w", KeyAction::Flag(ControlFlag::Forward)),
            ("s", KeyAction::Flag(ControlFlag::Backward)),
            ("a", KeyAction::Flag(ControlFlag::Left)),
            ("d", KeyAction::Flag(ControlFlag::Right)),
            ("space", KeyAction::Flag(ControlFlag::Brake)),
            ("r", KeyAction::Reset),
        ])
    }

    pub fn from_bindings(bindings: &[(&str, KeyAction)]) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        for (key, action) in bindings {
            let key = normalize_key(key);
            if map.insert(key.clone(), *action).is_some() {
                return Err(ConfigError::DuplicateKey { key });
            }
        }

        for flag in ControlFlag::ALL {
            let bound = map.values().any(|a| *a == KeyAction::Flag(flag));
            if !bound {
                return Err(ConfigError::UnboundFlag {
                    flag: flag.as_str(),
                });
            }
        }
        if !map.values().any(|a| *a == KeyAction::Reset) {
            return Err(ConfigError::NoResetKey);
        }

        Ok(Self { bindings: map })
    }

    pub fn lookup(&self, key: &str) -> Option<KeyAction> {
        self.bindings.get(&normalize_key(key)).copied()
    }
}

/// Browsers report the spacebar as " "; everything else is lowercased.
fn normalize_key(key: &str) -> String {
    if key == " " {
        "space".to_string()
    } else {
        key.to_ascii_lowercase()
    }
}
