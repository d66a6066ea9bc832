use serde::{Deserialize, Serialize};

/// The closed vocabulary of quest steps the binder knows about.
///
/// Grammar terminals are parsed into this enum with [`TaskKind::parse`].
/// `Location` and `Subquest` are ledger-only kinds: the binder creates them
/// itself and never accepts them as grammar terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKind {
    Capture,
    Damage,
    Defend,
    Escort,
    Exchange,
    Experiment,
    Explore,
    FinishBattle,
    Gather,
    Get,
    Give,
    Goto,
    Kill,
    Learn,
    Listen,
    Read,
    Repair,
    Report,
    Rescue,
    Spy,
    Steal,
    Stealth,
    Take,
    Use,
    WinBattle,
    Subquest,
    Location,
}

/// Canonical kind of resource a task binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    Entity,
    Item,
    Element,
    Place,
    Battle,
}

impl TargetType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Item => "item",
            Self::Element => "element",
            Self::Place => "place",
            Self::Battle => "battle",
        }
    }
}

/// Auxiliary "most recent resource of this kind" stacks shared by the
/// steps of one binding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Item,
    Actor,
    Read,
    Listen,
}

impl TaskKind {
    pub const ALL: [TaskKind; 27] = [
        Self::Capture,
        Self::Damage,
        Self::Defend,
        Self::Escort,
        Self::Exchange,
        Self::Experiment,
        Self::Explore,
        Self::FinishBattle,
        Self::Gather,
        Self::Get,
        Self::Give,
        Self::Goto,
        Self::Kill,
        Self::Learn,
        Self::Listen,
        Self::Read,
        Self::Repair,
        Self::Report,
        Self::Rescue,
        Self::Spy,
        Self::Steal,
        Self::Stealth,
        Self::Take,
        Self::Use,
        Self::WinBattle,
        Self::Subquest,
        Self::Location,
    ];

    /// Parse a grammar terminal. Returns `None` for words outside the
    /// vocabulary.
    pub fn parse(text: &str) -> Option<TaskKind> {
        Self::ALL.iter().copied().find(|kind| kind.name() == text)
    }

    /// The terminal text for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Damage => "damage",
            Self::Defend => "defend",
            Self::Escort => "escort",
            Self::Exchange => "exchange",
            Self::Experiment => "experiment",
            Self::Explore => "explore",
            Self::FinishBattle => "finishbattle",
            Self::Gather => "gather",
            Self::Get => "get",
            Self::Give => "give",
            Self::Goto => "goto",
            Self::Kill => "kill",
            Self::Learn => "learn",
            Self::Listen => "listen",
            Self::Read => "read",
            Self::Repair => "repair",
            Self::Report => "report",
            Self::Rescue => "rescue",
            Self::Spy => "spy",
            Self::Steal => "steal",
            Self::Stealth => "stealth",
            Self::Take => "take",
            Self::Use => "use",
            Self::WinBattle => "winbattle",
            Self::Subquest => "subquest",
            Self::Location => "location",
        }
    }

    /// Whether the binder can map this kind when it appears as a grammar
    /// terminal. Anything else short-circuits the attempt as a soft failure.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Stealth | Self::Subquest | Self::Location)
    }

    pub fn target_type(&self) -> TargetType {
        match self {
            Self::Capture
            | Self::Damage
            | Self::Defend
            | Self::Escort
            | Self::Give
            | Self::Kill
            | Self::Learn
            | Self::Listen
            | Self::Report
            | Self::Rescue
            | Self::Spy
            | Self::Stealth
            | Self::Subquest => TargetType::Entity,
            Self::Exchange
            | Self::Experiment
            | Self::Gather
            | Self::Get
            | Self::Read
            | Self::Steal
            | Self::Take
            | Self::Use => TargetType::Item,
            Self::Explore | Self::Repair => TargetType::Element,
            Self::Goto | Self::Location => TargetType::Place,
            Self::FinishBattle | Self::WinBattle => TargetType::Battle,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_name() {
        for kind in TaskKind::ALL {
            assert_eq!(TaskKind::parse(kind.name()), Some(kind));
        }
    }

    #[test]
    fn parse_rejects_unknown_words() {
        assert_eq!(TaskKind::parse("dance"), None);
        assert_eq!(TaskKind::parse("Kill"), None);
        assert_eq!(TaskKind::parse(""), None);
    }

    #[test]
    fn target_type_table() {
        assert_eq!(TaskKind::Kill.target_type(), TargetType::Entity);
        assert_eq!(TaskKind::Get.target_type(), TargetType::Item);
        assert_eq!(TaskKind::Location.target_type(), TargetType::Place);
        assert_eq!(TaskKind::Explore.target_type(), TargetType::Element);
        assert_eq!(TaskKind::WinBattle.target_type(), TargetType::Battle);
    }

    #[test]
    fn ledger_only_kinds_are_not_supported_terminals() {
        assert!(!TaskKind::Subquest.is_supported());
        assert!(!TaskKind::Location.is_supported());
        assert!(!TaskKind::Stealth.is_supported());
        assert!(TaskKind::Kill.is_supported());
    }
}
