/// Commit phase: turns bound ledgers into components on world entities.
///
/// Runs once per zone after every attempted quest has either bound or been
/// rolled back. Ledgers are processed children first so a parent's
/// `subquest` target can resolve to its child's quest-giver.

use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::core::ledger::{CrossRefs, QuestData, TargetKey};
use crate::core::populate::{PopulateError, QuestPopulate};
use crate::schema::component::{
    Component, QuestGiver, QuestInfo, QuestReport, QuestTarget,
};
use crate::schema::entity::{EntityId, EntityKind};
use crate::schema::target::{Deferred, QuestId, Target};
use crate::schema::task::{TargetType, TaskKind};
use crate::schema::world::{CellFilter, CreateRequest, World};

/// Summary of one quest whose components were attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedQuest {
    pub quest_id: QuestId,
    pub name: String,
    pub motive: Option<String>,
    pub giver: EntityId,
    /// Concrete targets in path order.
    pub targets: Vec<(TaskKind, TargetType, EntityId)>,
}

/// Lookup of concrete targets across every ledger of the zone.
type TargetIndex = FxHashMap<TargetKey, EntityId>;

impl QuestPopulate {
    /// Attach quest components for every bound quest of the current zone
    /// and reset the zone state. Any error here is an invariant violation.
    pub fn add_quest_components<W: World + ?Sized>(
        &mut self,
        world: &mut W,
    ) -> Result<Vec<CommittedQuest>, PopulateError> {
        let mut ledgers = std::mem::take(&mut self.state.committed);
        let mut cross_refs = std::mem::take(&mut self.state.cross_refs);
        self.state.claimed.clear();

        let index: TargetIndex = ledgers
            .iter()
            .flat_map(|data| data.bound_path())
            .filter_map(|(_, key, target)| target.entity().map(|id| (key, id)))
            .collect();

        let mut givers: FxHashMap<QuestId, EntityId> = FxHashMap::default();
        let mut committed = Vec::with_capacity(ledgers.len());

        for data in &mut ledgers {
            let sub_quests = self.materialize(world, data, &givers, &index, &mut cross_refs)?;
            let giver = data.giver().ok_or(PopulateError::MissingGiver(data.id()))?;

            name_targets(world, data, giver);
            attach_markers(world, data, &sub_quests)?;
            apply_side_effects(world, data, &index, &mut cross_refs)?;

            let targets: Vec<(TaskKind, TargetType, EntityId)> = data
                .bound_path()
                .into_iter()
                .filter_map(|(kind, _, target)| {
                    target.entity().map(|id| (kind, kind.target_type(), id))
                })
                .collect();
            let description = describe(world, data, &targets);
            let component = Component::QuestGiver(QuestGiver {
                quest_id: data.id(),
                description,
                targets: targets.iter().map(|(_, ty, id)| (*ty, *id)).collect(),
            });
            if !world.add_component(giver, component) {
                return Err(PopulateError::MissingEntity(giver));
            }

            info!(
                "Committed quest {:?} ({}) with {} targets, giver {:?}",
                data.id(),
                data.motive().unwrap_or(data.name()),
                targets.len(),
                giver
            );
            givers.insert(data.id(), giver);
            committed.push(CommittedQuest {
                quest_id: data.id(),
                name: data.name().to_string(),
                motive: data.motive().map(str::to_string),
                giver,
                targets,
            });
        }

        if !cross_refs.is_empty() {
            debug!("{} unused cross-references dropped at commit", cross_refs.len());
        }
        Ok(committed)
    }

    /// Replace every deferred target of `data` with a real entity. Returns
    /// the sub-quest id behind each resolved `subquest` key.
    fn materialize<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        data: &mut QuestData,
        givers: &FxHashMap<QuestId, EntityId>,
        index: &TargetIndex,
        cross_refs: &mut CrossRefs,
    ) -> Result<FxHashMap<TargetKey, QuestId>, PopulateError> {
        let mut sub_quests = FxHashMap::default();

        for (_, key, deferred) in data.deferred() {
            let entity = match deferred {
                Deferred::Battle { level } => world
                    .respond(&CreateRequest::Battle { level })
                    .ok_or(PopulateError::FactoryFailed(deferred))?,
                Deferred::Book { level } => {
                    let book = world
                        .create_item("book")
                        .ok_or(PopulateError::FactoryFailed(deferred))?;
                    if !world.place_item(level, book, CellFilter::Any, &mut self.rng) {
                        world.destroy_item(book);
                        return Err(PopulateError::FactoryFailed(deferred));
                    }
                    let text = match cross_refs.pop(key).and_then(|to| index.get(&to)) {
                        Some(place) => format!(
                            "The notes speak of {}.",
                            world.name_of(*place).unwrap_or_else(|| "a distant place".to_string())
                        ),
                        None => "The pages are faded beyond reading.".to_string(),
                    };
                    if !world.add_component(book, Component::ReadText(text)) {
                        return Err(PopulateError::MissingEntity(book));
                    }
                    book
                }
                Deferred::SubquestGiver { quest } => {
                    sub_quests.insert(key, quest);
                    *givers
                        .get(&quest)
                        .ok_or(PopulateError::UnresolvedSubquest(quest))?
                }
            };
            data.replace_key(key, Target::Concrete(entity))?;
        }

        Ok(sub_quests)
    }
}

fn entity_kind(target_type: TargetType) -> Option<EntityKind> {
    match target_type {
        TargetType::Entity => Some(EntityKind::Actor),
        TargetType::Item => Some(EntityKind::Item),
        TargetType::Element => Some(EntityKind::Element),
        TargetType::Place => Some(EntityKind::Level),
        TargetType::Battle => None,
    }
}

fn name_if_missing<W: World + ?Sized>(world: &mut W, id: EntityId, kind: EntityKind) {
    let unnamed = world.name_of(id).map_or(true, |name| name.is_empty());
    if !unnamed {
        return;
    }
    let name = world.unique_name(kind);
    if !world.set_name(id, &name) {
        debug!("Entity {:?} cannot be named", id);
    }
}

fn name_targets<W: World + ?Sized>(world: &mut W, data: &QuestData, giver: EntityId) {
    for (kind, _, target) in data.bound_path() {
        if let (Some(id), Some(entity)) = (target.entity(), entity_kind(kind.target_type())) {
            name_if_missing(world, id, entity);
        }
    }
    name_if_missing(world, giver, EntityKind::Actor);
}

/// One marker per distinct entity of the quest, tagged with the first step
/// that bound it.
fn attach_markers<W: World + ?Sized>(
    world: &mut W,
    data: &QuestData,
    sub_quests: &FxHashMap<TargetKey, QuestId>,
) -> Result<(), PopulateError> {
    let mut marked = FxHashSet::default();
    for (kind, key, target) in data.bound_path() {
        let Some(id) = target.entity() else {
            continue;
        };
        if !marked.insert(id) {
            continue;
        }
        let marker = Component::QuestTarget(QuestTarget {
            target_type: kind.target_type(),
            target_id: id,
            quest_id: data.id(),
            task: kind,
            sub_quest_id: sub_quests.get(&key).copied(),
        });
        if !world.add_component(id, marker) {
            return Err(PopulateError::MissingEntity(id));
        }
    }
    Ok(())
}

fn apply_side_effects<W: World + ?Sized>(
    world: &mut W,
    data: &QuestData,
    index: &TargetIndex,
    cross_refs: &mut CrossRefs,
) -> Result<(), PopulateError> {
    let topic = data.motive().unwrap_or(data.name()).to_lowercase();

    // The level the hero stands on at each step of the path.
    let mut here = None;
    for (kind, key, target) in data.bound_path() {
        let Some(id) = target.entity() else {
            continue;
        };
        let component = match kind {
            TaskKind::Location | TaskKind::Goto => {
                here = Some(id);
                continue;
            }
            TaskKind::Repair => Component::Broken,
            TaskKind::Listen => {
                let place = here.and_then(|level| world.name_of(level)).unwrap_or_default();
                Component::QuestInfo(QuestInfo {
                    question: format!("What do you know about {}?", topic),
                    answer: format!("Trouble has been stirring around {}.", place),
                })
            }
            TaskKind::Report => {
                let listen = cross_refs
                    .pop(key)
                    .ok_or(PopulateError::MissingCrossRef(key))?;
                let expect_info_from = *index
                    .get(&listen)
                    .ok_or(PopulateError::MissingCrossRef(listen))?;
                Component::QuestReport(QuestReport { expect_info_from })
            }
            _ => continue,
        };
        if !world.add_component(id, component) {
            return Err(PopulateError::MissingEntity(id));
        }
    }
    Ok(())
}

fn describe<W: World + ?Sized>(
    world: &W,
    data: &QuestData,
    targets: &[(TaskKind, TargetType, EntityId)],
) -> String {
    let steps: Vec<String> = targets
        .iter()
        .filter(|(kind, _, _)| *kind != TaskKind::Location)
        .map(|(kind, _, id)| match world.name_of(*id) {
            Some(name) if !name.is_empty() => format!("{} {}", kind, name),
            _ => kind.to_string(),
        })
        .collect();
    format!("{}: {}", data.motive().unwrap_or(data.name()), steps.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grammar::GrammarSet;
    use crate::schema::component::ComponentKind;
    use crate::schema::entity::AreaTile;
    use crate::schema::world::{Components, Levels, Naming};
    use crate::schema::world_state::WorldState;

    fn populate(grammar: &str, seed: u64) -> QuestPopulate {
        QuestPopulate::builder()
            .seed(seed)
            .with_grammar(GrammarSet::parse_bnf(grammar).unwrap())
            .build()
            .unwrap()
    }

    fn markers(world: &WorldState, id: EntityId) -> Vec<QuestTarget> {
        world
            .components(id)
            .into_iter()
            .filter_map(|c| match c {
                Component::QuestTarget(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn commit_attaches_giver_and_markers() {
        let (mut world, zone) = WorldState::demo();
        let mut populate = populate("<QUEST> ::= goto kill", 2);
        assert_eq!(
            populate
                .create_quests_for_zone(&mut world, zone, AreaTile::default())
                .unwrap(),
            1
        );
        let committed = populate.add_quest_components(&mut world).unwrap();
        assert_eq!(committed.len(), 1);
        let quest = &committed[0];

        assert!(world.has_component(quest.giver, ComponentKind::QuestGiver));
        let kill = quest
            .targets
            .iter()
            .find(|(kind, _, _)| *kind == TaskKind::Kill)
            .unwrap()
            .2;
        let marker = &markers(&world, kill)[0];
        assert_eq!(marker.quest_id, quest.quest_id);
        assert_eq!(marker.target_type, TargetType::Entity);
        assert!(populate.committed().is_empty());
    }

    #[test]
    fn unnamed_targets_receive_names() {
        let (mut world, zone) = WorldState::demo();
        let cave = world.zone_levels(zone)[1];
        let mut populate = populate("<QUEST> ::= repair", 8);
        let mut committed = Vec::new();
        // Retry until the quest starts in the cave, where the bridge is unnamed.
        for _ in 0..20 {
            populate
                .create_quests_for_zone(&mut world, zone, AreaTile::default())
                .unwrap();
            committed.extend(populate.add_quest_components(&mut world).unwrap());
        }
        for quest in &committed {
            for (_, _, id) in &quest.targets {
                assert!(!world.name_of(*id).unwrap().is_empty());
            }
            assert!(world.has_component(quest.targets[1].2, ComponentKind::Broken));
        }
        assert!(committed.iter().any(|q| q.targets[0].2 == cave));
    }

    #[test]
    fn listen_answer_names_the_level_it_was_heard_on() {
        let (mut world, zone) = WorldState::demo();
        let mut populate = populate("<QUEST> ::= listen goto", 6);
        assert_eq!(
            populate
                .create_quests_for_zone(&mut world, zone, AreaTile::default())
                .unwrap(),
            1
        );
        let committed = populate.add_quest_components(&mut world).unwrap();
        let targets = &committed[0].targets;
        assert_eq!(targets[1].0, TaskKind::Listen);
        let heard_at = world.name_of(targets[0].2).unwrap();
        let went_to = world.name_of(targets[2].2).unwrap();

        let info = world
            .components(targets[1].2)
            .into_iter()
            .find_map(|c| match c {
                Component::QuestInfo(info) => Some(info.clone()),
                _ => None,
            })
            .unwrap();
        assert!(info.answer.contains(&heard_at));
        assert!(!info.answer.contains(&went_to));
    }

    #[test]
    fn battles_and_books_are_created_at_commit() {
        let (mut world, zone) = WorldState::demo();
        let mut populate = populate("<QUEST> ::= winbattle read goto", 5);
        populate
            .create_quests_for_zone(&mut world, zone, AreaTile::default())
            .unwrap();
        assert!(world.battles().is_empty());

        let committed = populate.add_quest_components(&mut world).unwrap();
        let targets = &committed[0].targets;
        assert_eq!(world.battles().len(), 1);
        assert_eq!(targets[1].0, TaskKind::WinBattle);
        assert_eq!(targets[1].2, world.battles()[0]);

        let book = targets[2].2;
        let destination = world.name_of(targets[3].2).unwrap();
        let text = world
            .components(book)
            .into_iter()
            .find_map(|c| match c {
                Component::ReadText(text) => Some(text.clone()),
                _ => None,
            })
            .unwrap();
        assert!(text.contains(&destination));
    }
}
