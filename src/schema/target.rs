use serde::{Deserialize, Serialize};

use super::entity::EntityId;

/// Identifier of one concretized quest (one ledger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestId(pub u64);

/// A resource whose creation is postponed until the commit phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Deferred {
    /// A battle fought near `level`, created through the event channel.
    Battle { level: EntityId },
    /// A book placed on `level`, created through the object factory.
    Book { level: EntityId },
    /// The quest-giver of a nested quest, known once that quest commits.
    SubquestGiver { quest: QuestId },
}

/// What a quest step is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Concrete(EntityId),
    Deferred(Deferred),
}

impl Target {
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Self::Concrete(id) => Some(*id),
            Self::Deferred(_) => None,
        }
    }
}

impl From<EntityId> for Target {
    fn from(id: EntityId) -> Self {
        Self::Concrete(id)
    }
}

impl From<Deferred> for Target {
    fn from(deferred: Deferred) -> Self {
        Self::Deferred(deferred)
    }
}
