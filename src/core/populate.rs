/// Quest binder: maps generated quest trees onto live world resources.
///
/// Binding is speculative: nothing is attached to world entities until
/// [`QuestPopulate::add_quest_components`] runs. Items the binder places
/// while trying a quest are recorded as cleanups and removed again when
/// the attempt fails.

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use thiserror::Error;

use crate::core::config::{ConfigError, QuestConfig};
use crate::core::expander::QuestExpander;
use crate::core::grammar::{GrammarError, GrammarSet};
use crate::core::ledger::{CleanupSubject, CrossRefs, LedgerError, QuestData, TargetKey};
use crate::schema::entity::{AreaTile, EntityId, ZoneId};
use crate::schema::quest::{Quest, Step};
use crate::schema::target::{Deferred, QuestId, Target};
use crate::schema::task::{Category, TaskKind};
use crate::schema::world::World;

#[derive(Debug, Error)]
pub enum PopulateError {
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("unknown task type '{0}'")]
    UnknownTask(String),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("report in quest {0:?} has no preceding listen")]
    MissingListen(QuestId),
    #[error("no cross-reference recorded for {0:?}")]
    MissingCrossRef(TargetKey),
    #[error("sub-quest {0:?} was not committed before its parent")]
    UnresolvedSubquest(QuestId),
    #[error("deferred target {0:?} could not be created")]
    FactoryFailed(Deferred),
    #[error("quest {0:?} reached commit without a quest-giver")]
    MissingGiver(QuestId),
    #[error("entity {0:?} cannot take components")]
    MissingEntity(EntityId),
}

impl PopulateError {
    /// Invariant violations signal a defect and must not be swallowed.
    /// Everything else is a configuration problem that only aborts the
    /// current generation attempt.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Grammar(_) | Self::Config(_) | Self::UnknownTask(_)
        )
    }
}

/// State shared by every quest bound for the current zone, up to commit.
#[derive(Debug, Default)]
pub(crate) struct ZoneState {
    /// Ledgers that passed binding, children before parents.
    pub(crate) committed: Vec<QuestData>,
    pub(crate) cross_refs: CrossRefs,
    /// Entities already bound by some ledger and not yet committed.
    pub(crate) claimed: FxHashSet<EntityId>,
    next_quest: u64,
}

impl ZoneState {
    pub(crate) fn issue_quest_id(&mut self) -> QuestId {
        self.next_quest += 1;
        QuestId(self.next_quest)
    }
}

/// Transient state of one top-level binding attempt, threaded through the
/// recursion over nested quests.
pub(crate) struct BindContext<'a, W: World + ?Sized> {
    pub(crate) world: &'a mut W,
    pub(crate) rng: &'a mut StdRng,
    pub(crate) state: &'a mut ZoneState,
    /// Most recent resources of each category, with their keys.
    pub(crate) categories: FxHashMap<Category, Vec<(TargetKey, Target)>>,
}

/// The quest binder. Built via `QuestPopulate::builder()`.
pub struct QuestPopulate {
    grammar: GrammarSet,
    config: QuestConfig,
    pub(crate) rng: StdRng,
    pub(crate) state: ZoneState,
}

/// Builder for constructing a `QuestPopulate`.
pub struct QuestPopulateBuilder {
    seed: u64,
    grammar_path: Option<String>,
    config_path: Option<String>,
    /// Directly provided grammar (for testing without files).
    grammar: Option<GrammarSet>,
    /// Directly provided config (for testing without files).
    config: Option<QuestConfig>,
}

impl QuestPopulate {
    pub fn builder() -> QuestPopulateBuilder {
        QuestPopulateBuilder {
            seed: 0,
            grammar_path: None,
            config_path: None,
            grammar: None,
            config: None,
        }
    }

    pub fn config(&self) -> &QuestConfig {
        &self.config
    }

    pub fn grammar(&self) -> &GrammarSet {
        &self.grammar
    }

    /// Ledgers bound so far and waiting for commit, children first.
    pub fn committed(&self) -> &[QuestData] {
        &self.state.committed
    }

    /// Generate and bind up to `quests_per_zone` quests for a newly revealed
    /// zone. Returns how many were bound; zero is a normal outcome.
    pub fn create_quests_for_zone<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        zone: ZoneId,
        tile: AreaTile,
    ) -> Result<usize, PopulateError> {
        let mut created = 0;

        for slot in 0..self.config.quests_per_zone {
            for attempt in 1..=self.config.max_tries_per_zone {
                let generated = match QuestExpander::new(&self.grammar).generate(
                    &self.config.start_rule,
                    &self.config.constraints,
                    &mut self.rng,
                ) {
                    Ok(generated) => generated,
                    Err(e) => {
                        error!(
                            "Quest {} attempt {} for tile ({}, {}) failed to generate: {}",
                            slot, attempt, tile.x, tile.y, e
                        );
                        continue;
                    }
                };

                match self.map_quest_to_resources(world, &generated.quest, zone) {
                    Ok(true) => {
                        created += 1;
                        info!(
                            "Bound quest {} for tile ({}, {}) on attempt {}: {:?}",
                            slot, tile.x, tile.y, attempt, generated.tasks
                        );
                        break;
                    }
                    Ok(false) => {
                        debug!(
                            "Quest {} attempt {} for tile ({}, {}) could not be bound",
                            slot, attempt, tile.x, tile.y
                        );
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        error!(
                            "Quest {} attempt {} for tile ({}, {}) aborted: {}",
                            slot, attempt, tile.x, tile.y, e
                        );
                    }
                }
            }
        }

        Ok(created)
    }

    /// Bind every step of `quest`, recursing into sub-quests. On success the
    /// ledgers join the committed list; on failure every speculative world
    /// change made for the attempt is undone.
    pub fn map_quest_to_resources<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        quest: &Quest,
        zone: ZoneId,
    ) -> Result<bool, PopulateError> {
        let checkpoint = self.state.committed.len();
        let id = self.state.issue_quest_id();
        let mut ctx = BindContext {
            world,
            rng: &mut self.rng,
            state: &mut self.state,
            categories: FxHashMap::default(),
        };
        let bound = ctx.map_quest(id, quest, zone)?;
        if bound {
            // The whole tree made it, so its mutations are permanent now.
            for data in &mut self.state.committed[checkpoint..] {
                data.take_cleanup();
            }
        }
        Ok(bound)
    }
}

impl<'a, W: World + ?Sized> BindContext<'a, W> {
    /// Bind one quest under the ledger `id`, rolling back on any failure.
    pub(crate) fn map_quest(
        &mut self,
        id: QuestId,
        quest: &Quest,
        zone: ZoneId,
    ) -> Result<bool, PopulateError> {
        let checkpoint = self.state.committed.len();
        let mut data = QuestData::new(id, quest.name());
        data.set_motive(quest.motive());

        match self.bind_quest(&mut data, quest, zone) {
            Ok(true) => {
                self.state.committed.push(data);
                Ok(true)
            }
            other => {
                self.rollback(data, checkpoint);
                other
            }
        }
    }

    fn bind_quest(
        &mut self,
        data: &mut QuestData,
        quest: &Quest,
        zone: ZoneId,
    ) -> Result<bool, PopulateError> {
        let levels = self.world.zone_levels(zone);
        let Some(&start) = levels.choose(&mut *self.rng) else {
            debug!("Zone {:?} has no levels", zone);
            return Ok(false);
        };
        data.add_target(TaskKind::Location, start.into())?;
        data.push_location(start);

        for step in quest.steps() {
            let bound = match step {
                Step::Quest(sub) => {
                    let here = data.location().unwrap_or(start);
                    let sub_zone = self.world.level_zone(here).unwrap_or(zone);
                    let child = self.state.issue_quest_id();
                    data.add_target(
                        TaskKind::Subquest,
                        Deferred::SubquestGiver { quest: child }.into(),
                    )?;
                    self.map_quest(child, sub, sub_zone)?
                }
                Step::Task(task) => self.bind_task(data, task)?,
            };
            if !bound {
                debug!("Quest {:?} failed at step {:?}", data.id(), step_name(step));
                return Ok(false);
            }
        }

        match self.pick_giver(zone) {
            Some(giver) => {
                data.set_giver(giver);
                self.claim(data, giver);
                Ok(true)
            }
            None => {
                debug!("No quest-giver available in zone {:?}", zone);
                Ok(false)
            }
        }
    }

    /// Undo everything `data` and any ledgers committed since `checkpoint`
    /// did to the world and the shared state.
    fn rollback(&mut self, data: QuestData, checkpoint: usize) {
        let mut failed: Vec<QuestData> = self.state.committed.drain(checkpoint..).collect();
        failed.push(data);

        let ids: Vec<QuestId> = failed.iter().map(QuestData::id).collect();
        for ledger in failed.iter_mut().rev() {
            for cleanup in ledger.take_cleanup().into_iter().rev() {
                match cleanup.subject {
                    CleanupSubject::Item(item) => {
                        if !self.world.remove_item(cleanup.level, item) {
                            error!("Could not remove item {:?} from {:?}", item, cleanup.level);
                        }
                    }
                }
            }
            for id in ledger.claimed() {
                self.state.claimed.remove(id);
            }
        }

        self.state.cross_refs.discard_quests(&ids);
        for stack in self.categories.values_mut() {
            stack.retain(|(key, _)| !ids.contains(&key.quest));
        }
    }

    pub(crate) fn claim(&mut self, data: &mut QuestData, id: EntityId) {
        if self.state.claimed.insert(id) {
            data.claim(id);
        }
    }

    pub(crate) fn push_category(&mut self, category: Category, key: TargetKey, target: Target) {
        self.categories
            .entry(category)
            .or_default()
            .push((key, target));
    }

    pub(crate) fn peek_category(&self, category: Category) -> Option<(TargetKey, Target)> {
        self.categories.get(&category)?.last().copied()
    }

    pub(crate) fn pop_category(&mut self, category: Category) -> Option<(TargetKey, Target)> {
        self.categories.get_mut(&category)?.pop()
    }
}

fn step_name(step: &Step) -> &str {
    match step {
        Step::Task(task) => task.name(),
        Step::Quest(quest) => quest.name(),
    }
}

impl QuestPopulateBuilder {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn grammar_file(mut self, path: &str) -> Self {
        self.grammar_path = Some(path.to_string());
        self
    }

    pub fn config_file(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    /// Provide a grammar directly (for testing without files).
    pub fn with_grammar(mut self, grammar: GrammarSet) -> Self {
        self.grammar = Some(grammar);
        self
    }

    /// Provide a config directly (for testing without files).
    pub fn with_config(mut self, config: QuestConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<QuestPopulate, PopulateError> {
        let mut grammar = match self.grammar {
            Some(grammar) => grammar,
            None => GrammarSet::builtin()?.clone(),
        };
        // Game-specific grammar files override built-in rules.
        if let Some(ref path) = self.grammar_path {
            grammar.merge(GrammarSet::load(Path::new(path))?);
        }

        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => QuestConfig::load_from_ron(Path::new(&path))?,
            (None, None) => QuestConfig::default(),
        };
        config.validate()?;

        if grammar.get(&config.start_rule).is_none() {
            return Err(GrammarError::RuleNotFound(config.start_rule.clone()).into());
        }

        Ok(QuestPopulate {
            grammar,
            config,
            rng: StdRng::seed_from_u64(self.seed),
            state: ZoneState::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::world_state::WorldState;

    fn engine(grammar: &str) -> QuestPopulate {
        QuestPopulate::builder()
            .seed(11)
            .with_grammar(GrammarSet::parse_bnf(grammar).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn builder_defaults_to_builtin_grammar() {
        let populate = QuestPopulate::builder().seed(5).build().unwrap();
        assert!(populate.grammar().get("QUEST").is_some());
        assert_eq!(populate.config().quests_per_zone, 1);
    }

    #[test]
    fn builder_rejects_missing_start_rule() {
        let result = QuestPopulate::builder()
            .with_grammar(GrammarSet::parse_bnf("<Other> ::= kill").unwrap())
            .build();
        assert!(matches!(
            result,
            Err(PopulateError::Grammar(GrammarError::RuleNotFound(_)))
        ));
    }

    #[test]
    fn error_tiers() {
        assert!(!PopulateError::UnknownTask("dance".to_string()).is_fatal());
        assert!(PopulateError::MissingListen(QuestId(1)).is_fatal());
        assert!(PopulateError::MissingEntity(EntityId(3)).is_fatal());
    }

    #[test]
    fn unknown_task_aborts_attempt_without_error() {
        let (mut world, zone) = WorldState::demo();
        let mut populate = engine("<QUEST> ::= dance");
        let created = populate
            .create_quests_for_zone(&mut world, zone, AreaTile::default())
            .unwrap();
        assert_eq!(created, 0);
        assert!(populate.committed().is_empty());
    }

    #[test]
    fn unknown_task_is_reported_by_direct_mapping() {
        let (mut world, zone) = WorldState::demo();
        let mut populate = engine("<QUEST> ::= goto dance");
        let quest = {
            let mut q = Quest::new("QUEST");
            q.add_step(Step::Task(crate::schema::quest::Task::new("dance")));
            q
        };
        let result = populate.map_quest_to_resources(&mut world, &quest, zone);
        assert!(matches!(result, Err(PopulateError::UnknownTask(t)) if t == "dance"));
        assert!(populate.committed().is_empty());
    }

    #[test]
    fn unsupported_task_is_a_soft_failure() {
        let (mut world, zone) = WorldState::demo();
        let mut populate = engine("<QUEST> ::= stealth");
        let created = populate
            .create_quests_for_zone(&mut world, zone, AreaTile::default())
            .unwrap();
        assert_eq!(created, 0);
    }

    #[test]
    fn empty_zone_yields_no_quests() {
        let mut world = WorldState::new();
        let zone = world.add_zone("Nowhere");
        let mut populate = engine("<QUEST> ::= kill");
        let created = populate
            .create_quests_for_zone(&mut world, zone, AreaTile::default())
            .unwrap();
        assert_eq!(created, 0);
    }
}
