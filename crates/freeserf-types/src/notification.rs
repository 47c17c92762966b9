//! Player notification queue entries.

use serde::{Deserialize, Serialize};

use crate::enums::NotificationKind;

/// A single queued notification: a kind plus the map position it concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// What happened.
    pub kind: NotificationKind,
    /// Linear map position the notification concerns.
    pub pos: u32,
}

impl Notification {
    /// Build a notification for the given kind and position.
    #[must_use]
    pub const fn new(kind: NotificationKind, pos: u32) -> Self {
        Self { kind, pos }
    }
}
