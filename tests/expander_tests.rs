/// Expander integration tests: structural properties of generated trees.

use quest_engine::core::config::Constraints;
use quest_engine::core::expander::QuestExpander;
use quest_engine::core::grammar::GrammarSet;
use quest_engine::schema::quest::{Quest, Step};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn check_step_counts(quest: &Quest) {
    assert_eq!(quest.num_tasks() + (quest.num_quests() - 1), quest.num_steps());
    for step in quest.steps() {
        if let Step::Quest(sub) = step {
            check_step_counts(sub);
        }
    }
}

#[test]
fn goto_kill_scenario() {
    let gs = GrammarSet::parse_bnf("<QUEST> ::= <goto> kill\n<goto> ::= goto").unwrap();
    let constraints = Constraints::default().length(1, 5);
    for seed in 0..10 {
        let generated = QuestExpander::new(&gs)
            .generate("QUEST", &constraints, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        assert!(generated.accepted);
        let names: Vec<&str> = generated
            .quest
            .flattened_tasks()
            .iter()
            .map(|task| task.task_type())
            .collect();
        assert_eq!(names, vec!["goto", "kill"]);
    }
}

#[test]
fn builtin_trees_respect_step_counts() {
    let gs = GrammarSet::builtin().unwrap();
    let constraints = Constraints::default();
    for seed in 0..50 {
        let generated = QuestExpander::new(gs)
            .generate("QUEST", &constraints, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        check_step_counts(&generated.quest);
        assert_eq!(generated.quest.flattened_tasks().len(), generated.tasks.len());
        assert!(generated.quest.motive().is_some());
    }
}

#[test]
fn accepted_trees_fit_the_length_bounds() {
    let gs = GrammarSet::builtin().unwrap();
    let constraints = Constraints::default().length(3, 6).max_tries(40);
    for seed in 0..30 {
        let generated = QuestExpander::new(gs)
            .generate("QUEST", &constraints, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        let length = generated.tasks.len();
        if generated.accepted {
            assert!((3..=6).contains(&length), "seed {} gave {} tasks", seed, length);
        } else {
            assert_eq!(generated.tries, 40);
        }
    }
}

#[test]
fn nested_quests_come_from_subquest_rule() {
    let gs = GrammarSet::parse_bnf(
        "<QUEST> ::= <Inner> | goto <subquest>\n<subquest> ::= goto <QUEST> goto\n<Inner> ::= kill",
    )
    .unwrap();
    let constraints = Constraints::default().quests(2, 2);
    let generated = QuestExpander::new(&gs)
        .generate("QUEST", &constraints, &mut StdRng::seed_from_u64(17))
        .unwrap();
    assert!(generated.accepted);
    assert_eq!(generated.quest.num_quests(), 2);
    assert!(generated.quest.total_quests() >= 2);
    check_step_counts(&generated.quest);
}
