use serde::Serialize;

use crate::{ConfigValue, Error, FlagValue};

/// Kinds of events a client emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Client finished initialization (possibly in degraded, bootstrap-backed mode).
    Ready,
    /// A refresh produced at least one changed flag or config.
    Change,
    /// Initialization or a background poll failed.
    Error,
}

/// An event delivered to subscribers.
#[derive(Debug, Clone)]
pub enum Event {
    /// See [`EventKind::Ready`].
    Ready,
    /// See [`EventKind::Change`].
    Change(ChangeEvent),
    /// See [`EventKind::Error`].
    Error(Error),
}

impl Event {
    /// Kind of this event, used to route it to subscribers.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Ready => EventKind::Ready,
            Event::Change(_) => EventKind::Change,
            Event::Error(_) => EventKind::Error,
        }
    }
}

/// Changes produced by a single cache update. Never empty when delivered to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Changed flags.
    pub flags: Vec<FlagChange>,
    /// Changed configs.
    pub configs: Vec<ConfigChange>,
}

impl ChangeEvent {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.configs.is_empty()
    }
}

/// A flag whose value differs from the previously stored one. `previous` is `None` when the key
/// was not known before.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagChange {
    /// Flag key.
    pub key: String,
    /// Value before the update.
    pub previous: Option<FlagValue>,
    /// Value after the update.
    pub current: FlagValue,
}

/// A config whose value differs from the previously stored one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigChange {
    /// Config key.
    pub key: String,
    /// Value before the update, `None` for a new key.
    pub previous: Option<ConfigValue>,
    /// Value after the update.
    pub current: ConfigValue,
}
