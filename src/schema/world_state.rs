/// In-memory game world implementing every collaborator contract.
///
/// Used by the tools and tests; a real game implements the traits in
/// `schema::world` over its own level and component storage.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rustc_hash::{FxHashMap, FxHashSet};

use super::component::{Component, ComponentKind};
use super::entity::{Actor, Element, ElementKind, EntityId, EntityKind, Item, ZoneId};
use super::world::{
    CellFilter, Components, CreateRequest, Levels, Naming, ObjectFactory, Placement, Responder,
};

const DEFAULT_FREE_CELLS: usize = 64;

const NAME_STEMS: &[&str] = &[
    "Aldric", "Brenna", "Corwin", "Dagny", "Eirik", "Fenna", "Garrick", "Hilde", "Ivar", "Jorun",
];

#[derive(Debug, Clone)]
struct ZoneRecord {
    name: String,
    levels: Vec<EntityId>,
}

#[derive(Debug, Clone)]
struct LevelRecord {
    zone: ZoneId,
    name: String,
    actors: Vec<Actor>,
    items: Vec<Item>,
    elements: Vec<Element>,
    free_cells: usize,
}

/// Identity of everything on a level, in iteration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSnapshot {
    pub actors: Vec<EntityId>,
    pub items: Vec<EntityId>,
    pub elements: Vec<EntityId>,
}

/// Owns zones, levels and everything on them.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    zones: FxHashMap<ZoneId, ZoneRecord>,
    levels: FxHashMap<EntityId, LevelRecord>,
    /// Items created by the factory but not placed yet.
    limbo: FxHashMap<EntityId, Item>,
    templates: Vec<Item>,
    battles: Vec<EntityId>,
    components: FxHashMap<EntityId, Vec<Component>>,
    used_names: FxHashSet<String>,
    next_id: u64,
    next_zone: u64,
    name_counter: usize,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    pub fn add_zone(&mut self, name: &str) -> ZoneId {
        self.next_zone += 1;
        let id = ZoneId(self.next_zone);
        self.zones.insert(
            id,
            ZoneRecord {
                name: name.to_string(),
                levels: Vec::new(),
            },
        );
        id
    }

    /// Add a level to `zone`. Returns `None` for an unknown zone.
    pub fn add_level(&mut self, zone: ZoneId, name: &str) -> Option<EntityId> {
        if !self.zones.contains_key(&zone) {
            return None;
        }
        let id = self.issue_id();
        self.levels.insert(
            id,
            LevelRecord {
                zone,
                name: name.to_string(),
                actors: Vec::new(),
                items: Vec::new(),
                elements: Vec::new(),
                free_cells: DEFAULT_FREE_CELLS,
            },
        );
        if let Some(record) = self.zones.get_mut(&zone) {
            record.levels.push(id);
        }
        Some(id)
    }

    pub fn set_free_cells(&mut self, level: EntityId, cells: usize) {
        if let Some(record) = self.levels.get_mut(&level) {
            record.free_cells = cells;
        }
    }

    pub fn add_actor(&mut self, level: EntityId, name: &str) -> Option<EntityId> {
        if !self.levels.contains_key(&level) {
            return None;
        }
        let id = self.issue_id();
        if !name.is_empty() {
            self.used_names.insert(name.to_string());
        }
        self.levels
            .get_mut(&level)
            .map(|record| record.actors.push(Actor::new(id, name)))?;
        Some(id)
    }

    pub fn add_item(&mut self, level: EntityId, name: &str, item_type: &str) -> Option<EntityId> {
        if !self.levels.contains_key(&level) {
            return None;
        }
        let id = self.issue_id();
        self.levels
            .get_mut(&level)
            .map(|record| record.items.push(Item::new(id, name, item_type)))?;
        Some(id)
    }

    pub fn add_element(&mut self, level: EntityId, kind: ElementKind) -> Option<EntityId> {
        if !self.levels.contains_key(&level) {
            return None;
        }
        let id = self.issue_id();
        self.levels
            .get_mut(&level)
            .map(|record| record.elements.push(Element::new(id, kind)))?;
        Some(id)
    }

    /// Register an item the factory can produce.
    pub fn add_item_template(&mut self, name: &str, item_type: &str, value: u32) {
        let mut item = Item::new(EntityId::NONE, name, item_type);
        item.value = value;
        self.templates.push(item);
    }

    pub fn actor_mut(&mut self, id: EntityId) -> Option<&mut Actor> {
        self.levels
            .values_mut()
            .flat_map(|record| record.actors.iter_mut())
            .find(|actor| actor.id == id)
    }

    pub fn item_mut(&mut self, id: EntityId) -> Option<&mut Item> {
        self.levels
            .values_mut()
            .flat_map(|record| record.items.iter_mut())
            .find(|item| item.id == id)
    }

    pub fn item(&self, id: EntityId) -> Option<&Item> {
        self.levels
            .values()
            .flat_map(|record| record.items.iter())
            .find(|item| item.id == id)
            .or_else(|| self.limbo.get(&id))
    }

    pub fn battles(&self) -> &[EntityId] {
        &self.battles
    }

    pub fn snapshot(&self, level: EntityId) -> Option<LevelSnapshot> {
        let record = self.levels.get(&level)?;
        Some(LevelSnapshot {
            actors: record.actors.iter().map(|a| a.id).collect(),
            items: record.items.iter().map(|i| i.id).collect(),
            elements: record.elements.iter().map(|e| e.id).collect(),
        })
    }

    /// True if `id` names any entity in this world.
    pub fn contains(&self, id: EntityId) -> bool {
        self.levels.contains_key(&id)
            || self.limbo.contains_key(&id)
            || self.battles.contains(&id)
            || self.levels.values().any(|record| {
                record.actors.iter().any(|a| a.id == id)
                    || record.items.iter().any(|i| i.id == id)
                    || record.elements.iter().any(|e| e.id == id)
            })
    }

    /// A small zone with a village, a cave and a tower, used by the preview
    /// tool and tests.
    pub fn demo() -> (WorldState, ZoneId) {
        let mut world = WorldState::new();
        let zone = world.add_zone("Greyfen");
        let layouts: [(&str, &[&str], &[(&str, &str)], &[ElementKind]); 3] = [
            (
                "Greyfen village",
                &["Mara", "Tobin", "Wenna", ""],
                &[("iron key", "tool"), ("bread", "food")],
                &[ElementKind::Door, ElementKind::Stairs],
            ),
            (
                "Greyfen cave",
                &["cave troll", "", "goblin"],
                &[("rusty sword", "weapon")],
                &[ElementKind::Passage, ElementKind::Bridge],
            ),
            (
                "Greyfen tower",
                &["Old Sage", "tower guard", ""],
                &[("spell scroll", "scroll")],
                &[ElementKind::Lever, ElementKind::Stairs],
            ),
        ];
        for (name, actors, items, elements) in layouts {
            if let Some(level) = world.add_level(zone, name) {
                for actor in actors {
                    world.add_actor(level, actor);
                }
                for (item, item_type) in items {
                    world.add_item(level, item, item_type);
                }
                for kind in elements {
                    world.add_element(level, kind.clone());
                }
            }
        }
        for (item, owner) in [("iron key", "Tobin"), ("rusty sword", "goblin")] {
            let owner = world
                .levels
                .values()
                .flat_map(|record| record.actors.iter())
                .find(|actor| actor.name == owner)
                .map(|actor| actor.id);
            if let Some(owned) = world
                .levels
                .values_mut()
                .flat_map(|record| record.items.iter_mut())
                .find(|i| i.name == item)
            {
                owned.owner = owner;
            }
        }
        world.add_item_template("healing potion", "potion", 20);
        world.add_item_template("silver amulet", "amulet", 80);
        world.add_item_template("short bow", "weapon", 40);
        world.add_item_template("book", "book", 5);
        (world, zone)
    }

    fn instantiate(&mut self, template: Item) -> EntityId {
        let id = self.issue_id();
        let mut item = template;
        item.id = id;
        self.limbo.insert(id, item);
        id
    }
}

impl Levels for WorldState {
    fn zone_levels(&self, zone: ZoneId) -> Vec<EntityId> {
        self.zones
            .get(&zone)
            .map(|record| record.levels.clone())
            .unwrap_or_default()
    }

    fn zone_name(&self, zone: ZoneId) -> Option<String> {
        self.zones.get(&zone).map(|record| record.name.clone())
    }

    fn level_zone(&self, level: EntityId) -> Option<ZoneId> {
        self.levels.get(&level).map(|record| record.zone)
    }

    fn actors(&self, level: EntityId) -> Vec<&Actor> {
        self.levels
            .get(&level)
            .map(|record| record.actors.iter().collect())
            .unwrap_or_default()
    }

    fn items(&self, level: EntityId) -> Vec<&Item> {
        self.levels
            .get(&level)
            .map(|record| record.items.iter().collect())
            .unwrap_or_default()
    }

    fn elements(&self, level: EntityId) -> Vec<&Element> {
        self.levels
            .get(&level)
            .map(|record| record.elements.iter().collect())
            .unwrap_or_default()
    }
}

impl Placement for WorldState {
    fn place_item(
        &mut self,
        level: EntityId,
        item: EntityId,
        filter: CellFilter,
        _rng: &mut StdRng,
    ) -> bool {
        let Some(record) = self.levels.get_mut(&level) else {
            return false;
        };
        if filter == CellFilter::FreeFloor && record.free_cells == 0 {
            return false;
        }
        let Some(instance) = self.limbo.remove(&item) else {
            return false;
        };
        record.items.push(instance);
        record.free_cells = record.free_cells.saturating_sub(1);
        true
    }

    fn remove_item(&mut self, level: EntityId, item: EntityId) -> bool {
        let Some(record) = self.levels.get_mut(&level) else {
            return false;
        };
        let Some(pos) = record.items.iter().position(|i| i.id == item) else {
            return false;
        };
        record.items.remove(pos);
        record.free_cells += 1;
        self.components.remove(&item);
        true
    }
}

impl ObjectFactory for WorldState {
    fn create_item(&mut self, name: &str) -> Option<EntityId> {
        let template = self
            .templates
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .unwrap_or_else(|| Item::new(EntityId::NONE, name, "misc"));
        Some(self.instantiate(template))
    }

    fn create_random_item(
        &mut self,
        filter: &dyn Fn(&Item) -> bool,
        rng: &mut StdRng,
    ) -> Option<EntityId> {
        let candidates: Vec<&Item> = self.templates.iter().filter(|t| filter(t)).collect();
        let template = (*candidates.choose(rng)?).clone();
        Some(self.instantiate(template))
    }

    fn destroy_item(&mut self, item: EntityId) {
        self.limbo.remove(&item);
        self.components.remove(&item);
    }
}

impl Naming for WorldState {
    fn name_of(&self, id: EntityId) -> Option<String> {
        if let Some(record) = self.levels.get(&id) {
            return Some(record.name.clone());
        }
        for record in self.levels.values() {
            if let Some(actor) = record.actors.iter().find(|a| a.id == id) {
                return Some(actor.name.clone());
            }
            if let Some(item) = record.items.iter().find(|i| i.id == id) {
                return Some(item.name.clone());
            }
            if let Some(element) = record.elements.iter().find(|e| e.id == id) {
                return Some(element.name.clone());
            }
        }
        self.limbo.get(&id).map(|item| item.name.clone())
    }

    fn set_name(&mut self, id: EntityId, name: &str) -> bool {
        if let Some(record) = self.levels.get_mut(&id) {
            record.name = name.to_string();
            return true;
        }
        for record in self.levels.values_mut() {
            if let Some(actor) = record.actors.iter_mut().find(|a| a.id == id) {
                actor.name = name.to_string();
                return true;
            }
            if let Some(item) = record.items.iter_mut().find(|i| i.id == id) {
                item.name = name.to_string();
                return true;
            }
            if let Some(element) = record.elements.iter_mut().find(|e| e.id == id) {
                element.name = name.to_string();
                return true;
            }
        }
        false
    }

    fn unique_name(&mut self, kind: EntityKind) -> String {
        loop {
            let stem = NAME_STEMS[self.name_counter % NAME_STEMS.len()];
            let round = self.name_counter / NAME_STEMS.len();
            self.name_counter += 1;
            let name = match kind {
                EntityKind::Actor if round == 0 => stem.to_string(),
                EntityKind::Actor => format!("{} {}", stem, round + 1),
                EntityKind::Item => format!("{}'s heirloom", stem),
                EntityKind::Element => format!("{}'s mark", stem),
                EntityKind::Level => format!("{}'s hollow", stem),
            };
            if self.used_names.insert(name.clone()) {
                return name;
            }
        }
    }
}

impl Components for WorldState {
    fn add_component(&mut self, id: EntityId, component: Component) -> bool {
        if id.is_none() || !self.contains(id) {
            return false;
        }
        self.components.entry(id).or_default().push(component);
        true
    }

    fn components(&self, id: EntityId) -> Vec<&Component> {
        self.components
            .get(&id)
            .map(|list| list.iter().collect())
            .unwrap_or_default()
    }

    fn remove_component(&mut self, id: EntityId, kind: ComponentKind) -> bool {
        let Some(list) = self.components.get_mut(&id) else {
            return false;
        };
        let before = list.len();
        list.retain(|c| c.kind() != kind);
        before != list.len()
    }
}

impl Responder for WorldState {
    fn respond(&mut self, request: &CreateRequest) -> Option<EntityId> {
        match request {
            CreateRequest::Battle { level } => {
                if !self.levels.contains_key(level) {
                    return None;
                }
                let id = self.issue_id();
                self.battles.push(id);
                Some(id)
            }
        }
    }
}
