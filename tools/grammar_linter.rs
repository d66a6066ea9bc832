/// Grammar Linter: checks a quest grammar against the binder's task vocabulary.
///
/// Usage: grammar_linter <grammar_path> [--with-builtin] [--start <rule>]
///
/// `grammar_path` is a `.bnf`/`.ron` file or a directory searched recursively.

use quest_engine::core::grammar::{GrammarSet, Rule, Term, ROOT_RULE};
use quest_engine::schema::task::TaskKind;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: grammar_linter <grammar_path> [--with-builtin] [--start <rule>]");
        process::exit(0);
    }

    let grammar_arg = &args[1];
    let mut with_builtin = false;
    let mut start_rule = ROOT_RULE.to_string();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--with-builtin" => with_builtin = true,
            "--start" if i + 1 < args.len() => {
                i += 1;
                start_rule = args[i].clone();
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut grammars = if with_builtin {
        match GrammarSet::builtin() {
            Ok(gs) => gs.clone(),
            Err(e) => {
                eprintln!("ERROR: Built-in grammar is broken: {}", e);
                process::exit(1);
            }
        }
    } else {
        GrammarSet::default()
    };

    let grammar_path = Path::new(grammar_arg);
    if grammar_path.is_file() {
        match GrammarSet::load(grammar_path) {
            Ok(gs) => grammars.merge(gs),
            Err(e) => {
                eprintln!("ERROR: Failed to load grammar file: {}", e);
                process::exit(1);
            }
        }
    } else if grammar_path.is_dir() {
        load_grammars_recursive(grammar_path, &mut grammars);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", grammar_arg);
        process::exit(1);
    }

    println!("Loaded {} grammar rules", grammars.rules.len());

    let (errors, warnings) = lint_grammars(&grammars, &start_rule);

    println!("\n=== Grammar Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    process::exit(if errors.is_empty() { 0 } else { 1 });
}

fn load_grammars_recursive(dir: &Path, grammars: &mut GrammarSet) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<_> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            load_grammars_recursive(&path, grammars);
            continue;
        }
        let ext = path.extension().and_then(|s| s.to_str());
        if !matches!(ext, Some("bnf") | Some("ron")) {
            continue;
        }
        match GrammarSet::load(&path) {
            Ok(gs) => {
                println!("  Loaded: {}", path.display());
                grammars.merge(gs);
            }
            Err(e) => {
                eprintln!("  ERROR loading {}: {}", path.display(), e);
            }
        }
    }
}

fn lint_grammars(grammars: &GrammarSet, start_rule: &str) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if grammars.get(start_rule).is_none() {
        errors.push(format!("Start rule '{}' is not defined", start_rule));
    }

    for name in grammars.undefined_references() {
        errors.push(format!("Rule '{}' is referenced but never defined", name));
    }

    for terminal in grammars.terminals() {
        match TaskKind::parse(&terminal) {
            None => errors.push(format!("Terminal '{}' is not a known task", terminal)),
            Some(kind) if !kind.is_supported() => warnings.push(format!(
                "Task '{}' is not supported by the binder; quests using it never bind",
                kind
            )),
            Some(_) => {}
        }
    }

    let mut names: Vec<&String> = grammars.rules.keys().collect();
    names.sort();
    for name in &names {
        let rule = &grammars.rules[*name];
        if rule.productions.is_empty() {
            errors.push(format!("Rule '{}' has no alternatives", name));
        }
        for (index, production) in rule.productions.iter().enumerate() {
            if reports_before_listening(&production.terms) {
                errors.push(format!(
                    "Rule '{}' alternative {} has a report with no earlier listen",
                    name,
                    index + 1
                ));
            }
        }
    }

    let terminating = terminating_rules(grammars);
    for name in &names {
        if !terminating.contains(name.as_str()) {
            errors.push(format!(
                "Rule '{}' has no alternative that finishes expanding",
                name
            ));
        }
    }

    let reachable = reachable_rules(grammars, start_rule);
    for name in &names {
        if !reachable.contains(name.as_str()) {
            warnings.push(format!(
                "Rule '{}' is unreachable from '{}'",
                name, start_rule
            ));
        }
    }

    (errors, warnings)
}

fn reports_before_listening(terms: &[Term]) -> bool {
    let mut heard = false;
    for term in terms {
        match term {
            Term::Terminal(text) if text == "listen" => heard = true,
            Term::Terminal(text) if text == "report" && !heard => return true,
            _ => {}
        }
    }
    false
}

/// Rules with at least one alternative whose nonterminals all terminate.
fn terminating_rules(grammars: &GrammarSet) -> HashSet<&str> {
    let mut done: HashSet<&str> = HashSet::new();
    loop {
        let before = done.len();
        for (name, rule) in &grammars.rules {
            if done.contains(name.as_str()) {
                continue;
            }
            if rule_terminates(rule, &done) {
                done.insert(name.as_str());
            }
        }
        if done.len() == before {
            return done;
        }
    }
}

fn rule_terminates(rule: &Rule, done: &HashSet<&str>) -> bool {
    rule.productions.iter().any(|production| {
        production.terms.iter().all(|term| match term {
            Term::Terminal(_) => true,
            Term::NonTerminal(name) => done.contains(name.as_str()),
        })
    })
}

fn reachable_rules<'a>(grammars: &'a GrammarSet, start_rule: &'a str) -> BTreeSet<&'a str> {
    let mut seen = BTreeSet::new();
    let mut pending = vec![start_rule];
    while let Some(name) = pending.pop() {
        if !seen.insert(name) {
            continue;
        }
        if let Some(rule) = grammars.get(name) {
            pending.extend(rule.references());
        }
    }
    seen
}
