/// Grammar loading and built-in grammar integration tests.

use quest_engine::core::grammar::{GrammarSet, Term};
use quest_engine::schema::task::TaskKind;
use std::path::Path;

#[test]
fn builtin_grammar_is_closed() {
    let gs = GrammarSet::builtin().unwrap();
    assert!(gs.get("QUEST").is_some());
    assert!(
        gs.undefined_references().is_empty(),
        "undefined: {:?}",
        gs.undefined_references()
    );
}

#[test]
fn builtin_terminals_are_known_tasks() {
    let gs = GrammarSet::builtin().unwrap();
    for terminal in gs.terminals() {
        let kind = TaskKind::parse(&terminal)
            .unwrap_or_else(|| panic!("unknown task terminal '{}'", terminal));
        assert!(
            kind.is_supported() || kind == TaskKind::Stealth,
            "terminal '{}' cannot be bound",
            terminal
        );
    }
}

#[test]
fn builtin_reports_follow_a_listen() {
    let gs = GrammarSet::builtin().unwrap();
    for rule in gs.rules.values() {
        for production in &rule.productions {
            let terminals: Vec<&str> = production
                .terms
                .iter()
                .filter_map(|term| match term {
                    Term::Terminal(text) => Some(text.as_str()),
                    Term::NonTerminal(_) => None,
                })
                .collect();
            if let Some(report) = terminals.iter().position(|t| *t == "report") {
                assert!(
                    terminals[..report].contains(&"listen"),
                    "rule '{}' reports without listening",
                    rule.name
                );
            }
        }
    }
}

#[test]
fn fixture_grammars_load_and_merge() {
    let mut gs = GrammarSet::load(Path::new("tests/fixtures/errands.bnf")).unwrap();
    assert_eq!(gs.get("Errand").unwrap().productions.len(), 2);
    assert_eq!(gs.get("QUEST").unwrap().productions.len(), 2);

    let overrides = GrammarSet::load(Path::new("tests/fixtures/errands.ron")).unwrap();
    gs.merge(overrides);

    let errand = gs.get("Errand").unwrap();
    assert_eq!(errand.productions.len(), 2);
    assert_eq!(
        errand.productions[1].terms,
        vec![
            Term::NonTerminal("goto".to_string()),
            Term::Terminal("winbattle".to_string()),
        ]
    );
    // Rules not named in the override survive the merge.
    assert!(gs.get("Rumour").is_some());
    assert!(gs.undefined_references().is_empty());
}

#[test]
fn missing_grammar_file_is_an_io_error() {
    let result = GrammarSet::load(Path::new("tests/fixtures/no_such_grammar.bnf"));
    assert!(result.is_err());
}
