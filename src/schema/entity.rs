use serde::{Deserialize, Serialize};

/// Newtype wrapper for entity IDs. Actors, items, elements and levels
/// share one ID space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Reserved "no entity" value, never issued by a world.
    pub const NONE: EntityId = EntityId(0);

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// Newtype wrapper for zone IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub u64);

/// One chunk of the overworld grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AreaTile {
    pub x: i32,
    pub y: i32,
}

/// Broad kind of an entity, used when asking for a fresh unique name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Actor,
    Item,
    Element,
    Level,
}

/// A creature living on a level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: EntityId,
    /// Empty until a unique name is assigned.
    pub name: String,
    pub is_player: bool,
    pub alive: bool,
}

impl Actor {
    pub fn new(id: EntityId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            is_player: false,
            alive: true,
        }
    }

    /// Living and not controlled by the player.
    pub fn is_npc(&self) -> bool {
        self.alive && !self.is_player
    }
}

/// An item lying on a level, optionally owned by an actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: EntityId,
    pub name: String,
    pub item_type: String,
    pub owner: Option<EntityId>,
    pub value: u32,
}

impl Item {
    pub fn new(id: EntityId, name: &str, item_type: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            item_type: item_type.to_string(),
            owner: None,
            value: 0,
        }
    }
}

/// Kind of a static map element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Door,
    Lever,
    LeverDoor,
    Bridge,
    Stairs,
    Passage,
    Other(String),
}

impl ElementKind {
    /// Elements a `repair` task can target.
    pub fn is_breakable(&self) -> bool {
        matches!(
            self,
            Self::Door | Self::Lever | Self::LeverDoor | Self::Bridge
        )
    }

    /// Elements leading somewhere else, targeted by `explore`.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Stairs | Self::Passage)
    }
}

/// A static map element (door, lever, stairs, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: EntityId,
    pub name: String,
    pub kind: ElementKind,
}

impl Element {
    pub fn new(id: EntityId, kind: ElementKind) -> Self {
        Self {
            id,
            name: String::new(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_id_is_reserved() {
        assert!(EntityId::NONE.is_none());
        assert!(!EntityId(7).is_none());
    }

    #[test]
    fn actor_npc_status() {
        let mut actor = Actor::new(EntityId(1), "Margaret");
        assert!(actor.is_npc());
        actor.alive = false;
        assert!(!actor.is_npc());
        actor.alive = true;
        actor.is_player = true;
        assert!(!actor.is_npc());
    }

    #[test]
    fn element_categories() {
        assert!(ElementKind::Door.is_breakable());
        assert!(ElementKind::Bridge.is_breakable());
        assert!(!ElementKind::Stairs.is_breakable());
        assert!(ElementKind::Passage.is_connection());
        assert!(!ElementKind::Other("fountain".to_string()).is_connection());
    }
}
