/// Per-task binding handlers.
///
/// Every handler looks at the ledger's current location, picks a candidate
/// through the world traits and registers it under the task's kind. A
/// handler returns `Ok(false)` when nothing suitable exists.

use log::debug;
use rand::seq::SliceRandom;

use crate::core::ledger::{Cleanup, CleanupSubject, CleanupTag, QuestData, TargetKey};
use crate::core::populate::{BindContext, PopulateError};
use crate::schema::component::ComponentKind;
use crate::schema::entity::{ElementKind, EntityId, Item, ZoneId};
use crate::schema::quest::Task;
use crate::schema::target::{Deferred, Target};
use crate::schema::task::{Category, TaskKind};
use crate::schema::world::{CellFilter, World};

/// Item type reserved for books created at commit time.
const BOOK_TYPE: &str = "book";

impl<'a, W: World + ?Sized> BindContext<'a, W> {
    pub(crate) fn bind_task(
        &mut self,
        data: &mut QuestData,
        task: &Task,
    ) -> Result<bool, PopulateError> {
        let kind = TaskKind::parse(task.task_type())
            .ok_or_else(|| PopulateError::UnknownTask(task.task_type().to_string()))?;
        if !kind.is_supported() {
            debug!("Task '{}' is not supported by the binder yet", kind);
            return Ok(false);
        }
        let Some(level) = data.location() else {
            return Ok(false);
        };

        match kind {
            TaskKind::Capture | TaskKind::Damage | TaskKind::Kill | TaskKind::Spy => {
                self.bind_actor(data, kind, level, None)
            }
            // Actors the hero befriends can be handed an item later on.
            TaskKind::Defend | TaskKind::Escort | TaskKind::Learn | TaskKind::Rescue => {
                self.bind_actor(data, kind, level, Some(Category::Actor))
            }
            TaskKind::Listen => self.bind_actor(data, kind, level, Some(Category::Listen)),
            TaskKind::Report => self.bind_report(data, level),
            TaskKind::Give => self.bind_give(data, level),
            TaskKind::Get | TaskKind::Gather | TaskKind::Exchange => {
                self.bind_item(data, kind, level, true)
            }
            TaskKind::Take => self.bind_item(data, kind, level, false),
            TaskKind::Steal => self.bind_steal(data, level),
            TaskKind::Experiment | TaskKind::Use => self.bind_previous_item(data, kind, level),
            TaskKind::Explore => self.bind_element(data, kind, level, ElementKind::is_connection),
            TaskKind::Repair => self.bind_element(data, kind, level, ElementKind::is_breakable),
            TaskKind::Goto => self.bind_goto(data, level),
            TaskKind::Read => {
                let key = data.add_target(kind, Deferred::Book { level }.into())?;
                self.push_category(Category::Read, key, Deferred::Book { level }.into());
                Ok(true)
            }
            TaskKind::WinBattle | TaskKind::FinishBattle => {
                data.add_target(kind, Deferred::Battle { level }.into())?;
                Ok(true)
            }
            TaskKind::Stealth | TaskKind::Subquest | TaskKind::Location => Ok(false),
        }
    }

    /// Living non-player actors on `level` not yet bound to any quest.
    fn free_actors(&self, level: EntityId) -> Vec<EntityId> {
        self.world
            .actors(level)
            .into_iter()
            .filter(|actor| actor.is_npc())
            .map(|actor| actor.id)
            .filter(|id| self.is_free(*id))
            .collect()
    }

    /// Unowned items on `level` not yet bound to any quest.
    fn free_items(&self, level: EntityId) -> Vec<EntityId> {
        self.world
            .items(level)
            .into_iter()
            .filter(|item| item.owner.is_none() && item.item_type != BOOK_TYPE)
            .map(|item| item.id)
            .filter(|id| self.is_free(*id))
            .collect()
    }

    fn is_free(&self, id: EntityId) -> bool {
        !self.state.claimed.contains(&id)
            && !self.world.has_component(id, ComponentKind::QuestTarget)
            && !self.world.has_component(id, ComponentKind::QuestGiver)
    }

    /// A random free actor anywhere in `zone`, for handing out a quest.
    pub(crate) fn pick_giver(&mut self, zone: ZoneId) -> Option<EntityId> {
        let candidates: Vec<EntityId> = self
            .world
            .zone_levels(zone)
            .into_iter()
            .flat_map(|level| self.free_actors(level))
            .collect();
        candidates.choose(&mut *self.rng).copied()
    }

    fn register(
        &mut self,
        data: &mut QuestData,
        kind: TaskKind,
        id: EntityId,
        category: Option<Category>,
    ) -> Result<TargetKey, PopulateError> {
        let key = data.add_target(kind, id.into())?;
        self.claim(data, id);
        if let Some(category) = category {
            self.push_category(category, key, id.into());
        }
        Ok(key)
    }

    fn bind_actor(
        &mut self,
        data: &mut QuestData,
        kind: TaskKind,
        level: EntityId,
        category: Option<Category>,
    ) -> Result<bool, PopulateError> {
        let candidates = self.free_actors(level);
        let Some(&actor) = candidates.choose(&mut *self.rng) else {
            debug!("No free actor for '{}' on level {:?}", kind, level);
            return Ok(false);
        };
        self.register(data, kind, actor, category)?;
        Ok(true)
    }

    /// The reporting actor must relay what was heard at the most recent
    /// unmatched `listen`.
    fn bind_report(&mut self, data: &mut QuestData, level: EntityId) -> Result<bool, PopulateError> {
        let Some((listen_key, _)) = self.peek_category(Category::Listen) else {
            return Err(PopulateError::MissingListen(data.id()));
        };
        if !self.bind_actor(data, TaskKind::Report, level, None)? {
            return Ok(false);
        }
        self.pop_category(Category::Listen);
        if let Some((report_key, _)) = data.previous(TaskKind::Report) {
            self.state.cross_refs.push(report_key, listen_key);
        }
        Ok(true)
    }

    /// The recipient is the last befriended actor when they still live on
    /// `level`, otherwise any free actor there.
    fn bind_give(&mut self, data: &mut QuestData, level: EntityId) -> Result<bool, PopulateError> {
        if self.peek_category(Category::Item).is_none() {
            debug!("Nothing to give in quest {:?}", data.id());
            return Ok(false);
        }
        if let Some((_, Target::Concrete(friend))) = self.peek_category(Category::Actor) {
            let present = self
                .world
                .actors(level)
                .into_iter()
                .any(|actor| actor.id == friend && actor.is_npc());
            if present {
                data.add_target(TaskKind::Give, friend.into())?;
                return Ok(true);
            }
        }
        self.bind_actor(data, TaskKind::Give, level, None)
    }

    /// Bind an item lying on `level`. When `create` is set and none is free,
    /// a random item is made and placed there, recorded for cleanup.
    fn bind_item(
        &mut self,
        data: &mut QuestData,
        kind: TaskKind,
        level: EntityId,
        create: bool,
    ) -> Result<bool, PopulateError> {
        let candidates = self.free_items(level);
        if let Some(&item) = candidates.choose(&mut *self.rng) {
            self.register(data, kind, item, Some(Category::Item))?;
            return Ok(true);
        }
        if !create {
            debug!("No free item for '{}' on level {:?}", kind, level);
            return Ok(false);
        }

        let not_a_book = |item: &Item| item.item_type != BOOK_TYPE;
        let Some(item) = self.world.create_random_item(&not_a_book, &mut *self.rng) else {
            debug!("Object factory has no item for '{}'", kind);
            return Ok(false);
        };
        if !self
            .world
            .place_item(level, item, CellFilter::FreeFloor, &mut *self.rng)
        {
            self.world.destroy_item(item);
            debug!("No free cell on level {:?} for a new item", level);
            return Ok(false);
        }
        data.add_cleanup(Cleanup {
            level,
            subject: CleanupSubject::Item(item),
            tag: CleanupTag::Placed,
        });
        self.register(data, kind, item, Some(Category::Item))?;
        Ok(true)
    }

    fn bind_steal(&mut self, data: &mut QuestData, level: EntityId) -> Result<bool, PopulateError> {
        let candidates: Vec<EntityId> = self
            .world
            .items(level)
            .into_iter()
            .filter(|item| item.owner.is_some())
            .map(|item| item.id)
            .filter(|id| self.is_free(*id))
            .collect();
        let Some(&item) = candidates.choose(&mut *self.rng) else {
            debug!("No owned item to steal on level {:?}", level);
            return Ok(false);
        };
        self.register(data, TaskKind::Steal, item, Some(Category::Item))?;
        Ok(true)
    }

    /// `experiment` and `use` act on the item obtained last, or on a free
    /// item at hand when the quest has none yet.
    fn bind_previous_item(
        &mut self,
        data: &mut QuestData,
        kind: TaskKind,
        level: EntityId,
    ) -> Result<bool, PopulateError> {
        match self.peek_category(Category::Item) {
            Some((_, Target::Concrete(item))) => {
                data.add_target(kind, item.into())?;
                Ok(true)
            }
            _ => self.bind_item(data, kind, level, false),
        }
    }

    fn bind_element(
        &mut self,
        data: &mut QuestData,
        kind: TaskKind,
        level: EntityId,
        accepts: fn(&ElementKind) -> bool,
    ) -> Result<bool, PopulateError> {
        let candidates: Vec<EntityId> = self
            .world
            .elements(level)
            .into_iter()
            .filter(|element| accepts(&element.kind))
            .map(|element| element.id)
            .filter(|id| self.is_free(*id))
            .collect();
        let Some(&element) = candidates.choose(&mut *self.rng) else {
            debug!("No element for '{}' on level {:?}", kind, level);
            return Ok(false);
        };
        self.register(data, kind, element, None)?;
        Ok(true)
    }

    /// Move the quest to another level of the same zone. A pending `read`
    /// is linked to this destination so the book can reveal it.
    fn bind_goto(&mut self, data: &mut QuestData, level: EntityId) -> Result<bool, PopulateError> {
        let Some(zone) = self.world.level_zone(level) else {
            return Ok(false);
        };
        let others: Vec<EntityId> = self
            .world
            .zone_levels(zone)
            .into_iter()
            .filter(|other| *other != level)
            .collect();
        let Some(&next) = others.choose(&mut *self.rng) else {
            debug!("Zone {:?} has nowhere to go from {:?}", zone, level);
            return Ok(false);
        };

        let key = data.add_target(TaskKind::Goto, next.into())?;
        data.push_location(next);
        if let Some((read_key, _)) = self.pop_category(Category::Read) {
            self.state.cross_refs.push(read_key, key);
        }
        Ok(true)
    }
}
