/// Collaborator contracts the quest binder needs from the game world.
///
/// Level generation, component storage, cell layout and item templates are
/// owned by the game. The binder only queries and mutates through these
/// traits, so any world representation can host quests.
use rand::rngs::StdRng;

use super::component::{Component, ComponentKind};
use super::entity::{Actor, Element, EntityId, EntityKind, Item, ZoneId};

/// Read access to zones and their levels.
pub trait Levels {
    fn zone_levels(&self, zone: ZoneId) -> Vec<EntityId>;
    fn zone_name(&self, zone: ZoneId) -> Option<String>;
    fn level_zone(&self, level: EntityId) -> Option<ZoneId>;
    fn actors(&self, level: EntityId) -> Vec<&Actor>;
    fn items(&self, level: EntityId) -> Vec<&Item>;
    fn elements(&self, level: EntityId) -> Vec<&Element>;
}

/// Cell predicate for placing new entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFilter {
    /// A floor cell with nothing else on it.
    FreeFloor,
    Any,
}

/// Moves freshly created items onto levels and back off them.
pub trait Placement {
    /// Place `item` on a random cell of `level` matching `filter`.
    fn place_item(
        &mut self,
        level: EntityId,
        item: EntityId,
        filter: CellFilter,
        rng: &mut StdRng,
    ) -> bool;

    fn remove_item(&mut self, level: EntityId, item: EntityId) -> bool;
}

/// Creates item instances that are not yet on any level.
pub trait ObjectFactory {
    fn create_item(&mut self, name: &str) -> Option<EntityId>;

    fn create_random_item(
        &mut self,
        filter: &dyn Fn(&Item) -> bool,
        rng: &mut StdRng,
    ) -> Option<EntityId>;

    /// Drop an item that was created but never placed.
    fn destroy_item(&mut self, item: EntityId);
}

/// Display names for entities.
pub trait Naming {
    fn name_of(&self, id: EntityId) -> Option<String>;
    fn set_name(&mut self, id: EntityId, name: &str) -> bool;
    fn unique_name(&mut self, kind: EntityKind) -> String;
}

/// Component storage.
pub trait Components {
    /// Returns false if `id` does not name an entity that accepts components.
    fn add_component(&mut self, id: EntityId, component: Component) -> bool;
    fn components(&self, id: EntityId) -> Vec<&Component>;
    fn remove_component(&mut self, id: EntityId, kind: ComponentKind) -> bool;

    fn has_component(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.components(id).iter().any(|c| c.kind() == kind)
    }
}

/// Requests answered synchronously by other game systems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateRequest {
    Battle { level: EntityId },
}

/// The event/response channel used for deferred targets that only another
/// game system can build.
pub trait Responder {
    fn respond(&mut self, request: &CreateRequest) -> Option<EntityId>;
}

/// Everything the binder and committer need.
pub trait World: Levels + Placement + ObjectFactory + Naming + Components + Responder {}

impl<T> World for T where T: Levels + Placement + ObjectFactory + Naming + Components + Responder {}
