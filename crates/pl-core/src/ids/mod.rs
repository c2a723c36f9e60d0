//! Identifier newtypes shared across the engine.

use serde::{Deserialize, Serialize};

mod id_macro;
use id_macro::impl_id;

/// Stable unique id of a device instance. Two paired devices never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

/// Identifier of a persisted task record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl_id!(PeerId, TaskId);

/// Monotonic id of a paste entry on its origin device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct PasteId(pub i64);

impl PasteId {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for PasteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PasteId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_uniqueness() {
        assert_ne!(PeerId::new(), PeerId::new());
    }

    #[test]
    fn test_paste_id_roundtrip() {
        let id = PasteId::from(42);
        let json = serde_json::to_string(&id).unwrap();
        let back: PasteId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.value(), 42);
    }
}
