use serde::{Deserialize, Serialize};

use super::entity::EntityId;
use super::target::QuestId;
use super::task::{TargetType, TaskKind};

/// Marks an entity as the target of one quest step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestTarget {
    pub target_type: TargetType,
    pub target_id: EntityId,
    pub quest_id: QuestId,
    pub task: TaskKind,
    /// Set when the target is the giver of a nested quest.
    pub sub_quest_id: Option<QuestId>,
}

/// Attached to the actor handing out a quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestGiver {
    pub quest_id: QuestId,
    pub description: String,
    pub targets: Vec<(TargetType, EntityId)>,
}

/// Prompt shown when the player talks to a `listen` target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestInfo {
    pub question: String,
    pub answer: String,
}

/// Attached to a `report` target; the info must come from `expect_info_from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestReport {
    pub expect_info_from: EntityId,
}

/// Components the quest system attaches to world entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Component {
    QuestTarget(QuestTarget),
    QuestGiver(QuestGiver),
    QuestInfo(QuestInfo),
    QuestReport(QuestReport),
    Broken,
    /// Written into a book created for a `read` step.
    ReadText(String),
}

/// Discriminant used for component queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    QuestTarget,
    QuestGiver,
    QuestInfo,
    QuestReport,
    Broken,
    ReadText,
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::QuestTarget(_) => ComponentKind::QuestTarget,
            Self::QuestGiver(_) => ComponentKind::QuestGiver,
            Self::QuestInfo(_) => ComponentKind::QuestInfo,
            Self::QuestReport(_) => ComponentKind::QuestReport,
            Self::Broken => ComponentKind::Broken,
            Self::ReadText(_) => ComponentKind::ReadText,
        }
    }
}
