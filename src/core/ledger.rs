/// Quest ledger: per-quest bookkeeping of bound world resources.
///
/// Targets are stored in an arena owned by the ledger. Every `add_target`
/// issues a [`TargetKey`]; the path, the per-kind stacks and the
/// cross-reference table only ever hold keys, so replacing a deferred
/// target with the concrete one updates every view at once.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

use crate::schema::entity::EntityId;
use crate::schema::target::{Deferred, QuestId, Target};
use crate::schema::task::TaskKind;

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("invalid target: {0:?}")]
    InvalidTarget(Target),
    #[error("target {target:?} is not bound under '{kind}'")]
    NotBound { kind: TaskKind, target: Target },
    #[error("unknown target key {0:?}")]
    UnknownKey(TargetKey),
}

/// Opaque handle to one bound target of one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetKey {
    pub quest: QuestId,
    index: u32,
}

/// One step of the traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub kind: TaskKind,
    pub key: TargetKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanupSubject {
    /// An item the binder created and put on a level.
    Item(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanupTag {
    /// The binder created and placed this entity.
    Placed,
}

/// A speculative world mutation, undone if the quest fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cleanup {
    pub level: EntityId,
    pub subject: CleanupSubject,
    pub tag: CleanupTag,
}

/// Bookkeeping for one concretized quest.
#[derive(Debug, Clone)]
pub struct QuestData {
    id: QuestId,
    name: String,
    motive: Option<String>,
    targets: Vec<Target>,
    path: Vec<PathEntry>,
    stacks: FxHashMap<TaskKind, Vec<TargetKey>>,
    locations: Vec<EntityId>,
    cleanup: Vec<Cleanup>,
    claimed: Vec<EntityId>,
    giver: Option<EntityId>,
}

impl QuestData {
    pub fn new(id: QuestId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            motive: None,
            targets: Vec::new(),
            path: Vec::new(),
            stacks: FxHashMap::default(),
            locations: Vec::new(),
            cleanup: Vec::new(),
            claimed: Vec::new(),
            giver: None,
        }
    }

    pub fn id(&self) -> QuestId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn motive(&self) -> Option<&str> {
        self.motive.as_deref()
    }

    pub fn set_motive(&mut self, motive: Option<&str>) {
        self.motive = motive.map(str::to_string);
    }

    pub fn giver(&self) -> Option<EntityId> {
        self.giver
    }

    pub fn set_giver(&mut self, giver: EntityId) {
        self.giver = Some(giver);
    }

    fn validate(&self, target: &Target) -> bool {
        match target {
            Target::Concrete(id) => !id.is_none(),
            Target::Deferred(Deferred::Battle { level } | Deferred::Book { level }) => {
                !level.is_none()
            }
            Target::Deferred(Deferred::SubquestGiver { quest }) => *quest != self.id,
        }
    }

    /// Bind `target` as the next step of kind `kind`.
    pub fn add_target(&mut self, kind: TaskKind, target: Target) -> Result<TargetKey, LedgerError> {
        if !self.validate(&target) {
            return Err(LedgerError::InvalidTarget(target));
        }
        let key = TargetKey {
            quest: self.id,
            index: self.targets.len() as u32,
        };
        self.targets.push(target);
        self.path.push(PathEntry { kind, key });
        self.stacks.entry(kind).or_default().push(key);
        Ok(key)
    }

    /// Swap `old` for `new` under `kind`. Either the target is replaced
    /// everywhere or the ledger is left untouched.
    pub fn replace_target(
        &mut self,
        kind: TaskKind,
        old: Target,
        new: Target,
    ) -> Result<TargetKey, LedgerError> {
        if !self.validate(&new) {
            return Err(LedgerError::InvalidTarget(new));
        }
        let key = self
            .stacks
            .get(&kind)
            .and_then(|keys| {
                keys.iter()
                    .rev()
                    .find(|key| self.targets[key.index as usize] == old)
            })
            .copied()
            .ok_or(LedgerError::NotBound { kind, target: old })?;
        self.targets[key.index as usize] = new;
        Ok(key)
    }

    /// Replace the target behind `key`.
    pub fn replace_key(&mut self, key: TargetKey, new: Target) -> Result<(), LedgerError> {
        if self.resolve(key).is_none() {
            return Err(LedgerError::UnknownKey(key));
        }
        if !self.validate(&new) {
            return Err(LedgerError::InvalidTarget(new));
        }
        self.targets[key.index as usize] = new;
        Ok(())
    }

    pub fn resolve(&self, key: TargetKey) -> Option<Target> {
        if key.quest != self.id {
            return None;
        }
        self.targets.get(key.index as usize).copied()
    }

    /// Most recent target bound under `kind`.
    pub fn previous(&self, kind: TaskKind) -> Option<(TargetKey, Target)> {
        let key = *self.stacks.get(&kind)?.last()?;
        self.resolve(key).map(|target| (key, target))
    }

    /// Targets bound under `kind`, oldest first.
    pub fn targets_of(&self, kind: TaskKind) -> Vec<Target> {
        self.stacks
            .get(&kind)
            .map(|keys| keys.iter().filter_map(|key| self.resolve(*key)).collect())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &[PathEntry] {
        &self.path
    }

    /// Path entries with their current targets.
    pub fn bound_path(&self) -> Vec<(TaskKind, TargetKey, Target)> {
        self.path
            .iter()
            .filter_map(|entry| {
                self.resolve(entry.key)
                    .map(|target| (entry.kind, entry.key, target))
            })
            .collect()
    }

    /// Targets still waiting for the commit phase, in path order.
    pub fn deferred(&self) -> Vec<(TaskKind, TargetKey, Deferred)> {
        self.bound_path()
            .into_iter()
            .filter_map(|(kind, key, target)| match target {
                Target::Deferred(deferred) => Some((kind, key, deferred)),
                Target::Concrete(_) => None,
            })
            .collect()
    }

    pub fn push_location(&mut self, level: EntityId) {
        self.locations.push(level);
    }

    /// Where the quest currently is.
    pub fn location(&self) -> Option<EntityId> {
        self.locations.last().copied()
    }

    pub fn add_cleanup(&mut self, cleanup: Cleanup) {
        self.cleanup.push(cleanup);
    }

    pub fn cleanup(&self) -> &[Cleanup] {
        &self.cleanup
    }

    pub fn take_cleanup(&mut self) -> Vec<Cleanup> {
        std::mem::take(&mut self.cleanup)
    }

    pub fn claim(&mut self, id: EntityId) {
        self.claimed.push(id);
    }

    pub fn claimed(&self) -> &[EntityId] {
        &self.claimed
    }
}

/// Links a bound target to targets bound elsewhere that must be recalled
/// when it is committed (`report` → `listen`, `read` → `goto`).
#[derive(Debug, Clone, Default)]
pub struct CrossRefs {
    table: FxHashMap<TargetKey, VecDeque<TargetKey>>,
}

impl CrossRefs {
    pub fn push(&mut self, from: TargetKey, to: TargetKey) {
        self.table.entry(from).or_default().push_back(to);
    }

    /// Take the oldest reference recorded for `from`. Each reference is
    /// returned once.
    pub fn pop(&mut self, from: TargetKey) -> Option<TargetKey> {
        let queue = self.table.get_mut(&from)?;
        let to = queue.pop_front();
        if queue.is_empty() {
            self.table.remove(&from);
        }
        to
    }

    /// Forget every reference touching one of `quests`.
    pub fn discard_quests(&mut self, quests: &[QuestId]) {
        self.table.retain(|from, queue| {
            if quests.contains(&from.quest) {
                return false;
            }
            queue.retain(|to| !quests.contains(&to.quest));
            !queue.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.table.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> QuestData {
        QuestData::new(QuestId(1), "QUEST")
    }

    #[test]
    fn add_target_records_path_and_stack() {
        let mut data = ledger();
        let loc = data.add_target(TaskKind::Location, EntityId(10).into()).unwrap();
        let kill = data.add_target(TaskKind::Kill, EntityId(11).into()).unwrap();
        assert_eq!(data.path().len(), 2);
        assert_eq!(data.path()[0].key, loc);
        assert_eq!(data.previous(TaskKind::Kill), Some((kill, Target::Concrete(EntityId(11)))));
        assert_eq!(data.previous(TaskKind::Get), None);
    }

    #[test]
    fn add_target_rejects_invalid_targets() {
        let mut data = ledger();
        assert_eq!(
            data.add_target(TaskKind::Kill, Target::Concrete(EntityId::NONE)),
            Err(LedgerError::InvalidTarget(Target::Concrete(EntityId::NONE)))
        );
        let self_ref = Target::Deferred(Deferred::SubquestGiver { quest: QuestId(1) });
        assert!(data.add_target(TaskKind::Subquest, self_ref).is_err());
        let no_level = Target::Deferred(Deferred::Battle { level: EntityId::NONE });
        assert!(data.add_target(TaskKind::WinBattle, no_level).is_err());
        assert!(data.path().is_empty());

        let child = Target::Deferred(Deferred::SubquestGiver { quest: QuestId(2) });
        assert!(data.add_target(TaskKind::Subquest, child).is_ok());
    }

    #[test]
    fn replace_target_updates_path_and_stack() {
        let mut data = ledger();
        let battle = Target::Deferred(Deferred::Battle { level: EntityId(5) });
        let key = data.add_target(TaskKind::WinBattle, battle).unwrap();
        let replaced = data
            .replace_target(TaskKind::WinBattle, battle, EntityId(77).into())
            .unwrap();
        assert_eq!(key, replaced);
        assert_eq!(data.targets_of(TaskKind::WinBattle), vec![Target::Concrete(EntityId(77))]);
        assert_eq!(data.bound_path()[0].2, Target::Concrete(EntityId(77)));
        assert!(data.deferred().is_empty());
    }

    #[test]
    fn failed_replace_leaves_ledger_unchanged() {
        let mut data = ledger();
        data.add_target(TaskKind::Kill, EntityId(3).into()).unwrap();
        let before = data.bound_path();

        let missing = data.replace_target(TaskKind::Kill, EntityId(4).into(), EntityId(9).into());
        assert!(matches!(missing, Err(LedgerError::NotBound { .. })));
        let wrong_kind = data.replace_target(TaskKind::Get, EntityId(3).into(), EntityId(9).into());
        assert!(wrong_kind.is_err());
        let invalid = data.replace_target(TaskKind::Kill, EntityId(3).into(), EntityId::NONE.into());
        assert!(matches!(invalid, Err(LedgerError::InvalidTarget(_))));

        assert_eq!(data.bound_path(), before);
    }

    #[test]
    fn keys_from_other_ledgers_do_not_resolve() {
        let mut a = ledger();
        let mut b = QuestData::new(QuestId(2), "QUEST");
        let key = a.add_target(TaskKind::Kill, EntityId(3).into()).unwrap();
        b.add_target(TaskKind::Kill, EntityId(4).into()).unwrap();
        assert_eq!(b.resolve(key), None);
        assert!(matches!(b.replace_key(key, EntityId(8).into()), Err(LedgerError::UnknownKey(_))));
    }

    #[test]
    fn location_stack() {
        let mut data = ledger();
        assert_eq!(data.location(), None);
        data.push_location(EntityId(1));
        data.push_location(EntityId(2));
        assert_eq!(data.location(), Some(EntityId(2)));
    }

    #[test]
    fn cross_refs_pop_once() {
        let mut data = ledger();
        let listen = data.add_target(TaskKind::Listen, EntityId(1).into()).unwrap();
        let report = data.add_target(TaskKind::Report, EntityId(2).into()).unwrap();
        let mut refs = CrossRefs::default();
        refs.push(report, listen);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs.pop(report), Some(listen));
        assert_eq!(refs.pop(report), None);
        assert!(refs.is_empty());
    }

    #[test]
    fn cross_refs_discard_by_quest() {
        let mut a = ledger();
        let mut b = QuestData::new(QuestId(2), "QUEST");
        let a1 = a.add_target(TaskKind::Read, EntityId(1).into()).unwrap();
        let a2 = a.add_target(TaskKind::Report, EntityId(2).into()).unwrap();
        let b1 = b.add_target(TaskKind::Goto, EntityId(3).into()).unwrap();
        let b2 = b.add_target(TaskKind::Listen, EntityId(4).into()).unwrap();
        let mut refs = CrossRefs::default();
        refs.push(a1, b1);
        refs.push(a2, b2);
        refs.push(b2, a1);
        refs.discard_quests(&[QuestId(2)]);
        assert!(refs.is_empty());
    }
}
