/// Quest expander: turns grammar rules into concrete quest trees.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::core::config::Constraints;
use crate::core::grammar::{GrammarError, GrammarSet, Term, ROOT_RULE};
use crate::schema::quest::{Quest, Step, Task};

/// Result of [`QuestExpander::generate`].
#[derive(Debug, Clone)]
pub struct Generated {
    pub quest: Quest,
    /// Terminal texts in the order they were produced.
    pub tasks: Vec<String>,
    /// False when every try missed the constraints and `quest` is the last
    /// tree produced.
    pub accepted: bool,
    pub tries: u32,
}

/// Expands a start rule into a quest tree, retrying until the tree fits
/// the given [`Constraints`].
pub struct QuestExpander<'g> {
    rules: &'g GrammarSet,
}

/// State of one expansion attempt.
struct Attempt<'a> {
    rules: &'a GrammarSet,
    start_rule: &'a str,
    max_depth: usize,
    stack: Vec<Quest>,
    finished: Option<Quest>,
}

impl<'g> QuestExpander<'g> {
    pub fn new(rules: &'g GrammarSet) -> Self {
        Self { rules }
    }

    /// Generate a quest tree from `start_rule`.
    ///
    /// The flattened task count must fall in `[min_length, max_length]` and
    /// the top-level quest count in `[min_quests, max_quests]`. When no try
    /// within `max_tries` fits, the last tree is returned with
    /// `accepted == false` instead of an error.
    pub fn generate(
        &self,
        start_rule: &str,
        constraints: &Constraints,
        rng: &mut StdRng,
    ) -> Result<Generated, GrammarError> {
        if self.rules.get(start_rule).is_none() {
            return Err(GrammarError::RuleNotFound(start_rule.to_string()));
        }

        let mut last: Option<(Quest, Vec<String>)> = None;
        let mut tries = 0;

        // Zero tries still gets one expansion.
        for attempt_no in 1..=constraints.max_tries.max(1) {
            tries = attempt_no;
            let mut attempt = Attempt {
                rules: self.rules,
                start_rule,
                max_depth: constraints.max_depth,
                stack: Vec::new(),
                finished: None,
            };

            let tasks = match attempt.expand(start_rule, rng, 0) {
                Ok(tasks) => tasks,
                Err(GrammarError::DepthExceeded(depth)) => {
                    debug!("Attempt {} exceeded expansion depth {}", attempt_no, depth);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Some(quest) = attempt.finished.take() else {
                continue;
            };

            if constraints.accepts_length(tasks.len()) && constraints.accepts_quests(quest.num_quests())
            {
                return Ok(Generated {
                    quest,
                    tasks,
                    accepted: true,
                    tries: attempt_no,
                });
            }
            debug!(
                "Rejected quest attempt {}: {} tasks, {} quests",
                attempt_no,
                tasks.len(),
                quest.num_quests()
            );
            last = Some((quest, tasks));
        }

        match last {
            Some((quest, tasks)) => {
                warn!(
                    "No quest from '{}' met the constraints in {} tries, using the last one",
                    start_rule, tries
                );
                Ok(Generated {
                    quest,
                    tasks,
                    accepted: false,
                    tries,
                })
            }
            None => Err(GrammarError::DepthExceeded(constraints.max_depth)),
        }
    }
}

impl<'a> Attempt<'a> {
    fn opens_quest(&self, name: &str) -> bool {
        name == self.start_rule || name == ROOT_RULE
    }

    fn expand(
        &mut self,
        name: &str,
        rng: &mut StdRng,
        depth: usize,
    ) -> Result<Vec<String>, GrammarError> {
        if depth > self.max_depth {
            return Err(GrammarError::DepthExceeded(self.max_depth));
        }
        let rules = self.rules;
        let rule = rules
            .get(name)
            .ok_or_else(|| GrammarError::RuleNotFound(name.to_string()))?;
        let production = rule
            .productions
            .choose(rng)
            .ok_or_else(|| GrammarError::EmptyRule(name.to_string()))?;

        let opens = self.opens_quest(name);
        if opens {
            let mut quest = Quest::new(name);
            // The first rule the opening production expands is the motive.
            let motive = production.terms.iter().find_map(|term| match term {
                Term::NonTerminal(rule) => Some(rule),
                Term::Terminal(_) => None,
            });
            if let Some(motive) = motive {
                quest.set_motive(motive);
            }
            self.stack.push(quest);
        }

        let mut produced = Vec::new();
        for term in &production.terms {
            match term {
                Term::Terminal(text) => {
                    let current = self
                        .stack
                        .last_mut()
                        .ok_or_else(|| GrammarError::NoCurrentQuest(text.clone()))?;
                    current.add_step(Step::Task(Task::new(text)));
                    produced.push(text.clone());
                }
                Term::NonTerminal(child) => {
                    produced.extend(self.expand(child, rng, depth + 1)?);
                }
            }
        }

        if opens {
            if let Some(done) = self.stack.pop() {
                match self.stack.last_mut() {
                    Some(parent) => parent.add_step(Step::Quest(done)),
                    None => self.finished = Some(done),
                }
            }
        }

        Ok(produced)
    }
}
