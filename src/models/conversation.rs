use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Normalized unordered pair of participant ids.
///
/// The smaller id is always stored first, so the pair itself is the
/// uniqueness key for the one-conversation-per-pair invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair {
    a: Uuid,
    b: Uuid,
}

impl ParticipantPair {
    /// Returns `None` when both ids denote the same user.
    pub fn new(x: Uuid, y: Uuid) -> Option<Self> {
        match x.cmp(&y) {
            Ordering::Less => Some(Self { a: x, b: y }),
            Ordering::Greater => Some(Self { a: y, b: x }),
            Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> Uuid {
        self.a
    }

    pub fn second(&self) -> Uuid {
        self.b
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.a == id || self.b == id
    }

    /// The other participant, if `id` is one of the pair.
    pub fn other(&self, id: Uuid) -> Option<Uuid> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Durable record of a two-party messaging relationship.
///
/// Created lazily on first message between a pair, never deleted. Only the
/// relay pipeline mutates it, and only to advance `last_message_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub pair: ParticipantPair,
    pub last_message_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_order_independent() {
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();

        let p1 = ParticipantPair::new(x, y).unwrap();
        let p2 = ParticipantPair::new(y, x).unwrap();

        assert_eq!(p1, p2);
        assert!(p1.first() < p1.second());
    }

    #[test]
    fn pair_rejects_self() {
        let x = Uuid::new_v4();
        assert!(ParticipantPair::new(x, x).is_none());
    }

    #[test]
    fn other_resolves_the_counterpart() {
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let pair = ParticipantPair::new(x, y).unwrap();

        assert_eq!(pair.other(x), Some(y));
        assert_eq!(pair.other(y), Some(x));
        assert_eq!(pair.other(Uuid::new_v4()), None);
        assert!(pair.contains(x) && pair.contains(y));
    }
}
