/// Quest trees produced by the expander.
use serde::{Deserialize, Serialize};

/// An atomic quest step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    task_type: String,
    name: String,
}

impl Task {
    pub fn new(task_type: &str) -> Self {
        Self {
            task_type: task_type.to_string(),
            name: task_type.to_string(),
        }
    }

    pub fn with_name(task_type: &str, name: &str) -> Self {
        Self {
            task_type: task_type.to_string(),
            name: name.to_string(),
        }
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One ordered step of a quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    Task(Task),
    Quest(Quest),
}

/// A composite step: ordered tasks and nested quests.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Quest {
    name: String,
    motive: Option<String>,
    steps: Vec<Step>,
}

impl Quest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            motive: None,
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn motive(&self) -> Option<&str> {
        self.motive.as_deref()
    }

    pub fn set_motive(&mut self, motive: &str) {
        self.motive = Some(motive.to_string());
    }

    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    /// This quest plus its direct sub-quests.
    pub fn num_quests(&self) -> usize {
        1 + self
            .steps
            .iter()
            .filter(|step| matches!(step, Step::Quest(_)))
            .count()
    }

    /// Direct tasks of this quest.
    pub fn num_tasks(&self) -> usize {
        self.num_steps() - (self.num_quests() - 1)
    }

    /// All tasks in the tree, depth first.
    pub fn flattened_tasks(&self) -> Vec<&Task> {
        let mut tasks = Vec::new();
        collect_tasks(self, &mut tasks);
        tasks
    }

    /// Quest nodes in the whole tree, this one included.
    pub fn total_quests(&self) -> usize {
        1 + self
            .steps
            .iter()
            .map(|step| match step {
                Step::Quest(q) => q.total_quests(),
                Step::Task(_) => 0,
            })
            .sum::<usize>()
    }
}

fn collect_tasks<'a>(quest: &'a Quest, out: &mut Vec<&'a Task>) {
    for step in &quest.steps {
        match step {
            Step::Task(task) => out.push(task),
            Step::Quest(sub) => collect_tasks(sub, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Quest {
        let mut inner = Quest::new("QUEST");
        inner.add_step(Step::Task(Task::new("goto")));
        inner.add_step(Step::Task(Task::new("kill")));

        let mut outer = Quest::new("QUEST");
        outer.add_step(Step::Task(Task::new("goto")));
        outer.add_step(Step::Quest(inner));
        outer.add_step(Step::Task(Task::new("report")));
        outer
    }

    #[test]
    fn counts_follow_step_invariant() {
        let quest = nested();
        assert_eq!(quest.num_steps(), 3);
        assert_eq!(quest.num_quests(), 2);
        assert_eq!(quest.num_tasks(), 2);
        assert_eq!(
            quest.num_tasks() + quest.num_quests() - 1,
            quest.num_steps()
        );
    }

    #[test]
    fn flattened_tasks_are_depth_first() {
        let quest = nested();
        let names: Vec<&str> = quest
            .flattened_tasks()
            .iter()
            .map(|t| t.task_type())
            .collect();
        assert_eq!(names, vec!["goto", "goto", "kill", "report"]);
        assert_eq!(quest.total_quests(), 2);
    }

    #[test]
    fn empty_quest() {
        let quest = Quest::new("QUEST");
        assert_eq!(quest.num_quests(), 1);
        assert_eq!(quest.num_tasks(), 0);
        assert!(quest.motive().is_none());
    }

    #[test]
    fn task_name_defaults_to_type() {
        let task = Task::new("kill");
        assert_eq!(task.name(), "kill");
        let named = Task::with_name("kill", "slay the beast");
        assert_eq!(named.task_type(), "kill");
        assert_eq!(named.name(), "slay the beast");
    }
}
