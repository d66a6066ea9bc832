/// Quest grammar runtime: types, parsing, loading.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

/// Name of the root rule. Expanding it always opens a new quest frame.
pub const ROOT_RULE: &str = "QUEST";

const BUILTIN_GRAMMAR: &str = include_str!("../../data/quest_grammar.bnf");

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("grammar parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("grammar parse error at line {line}: term without text")]
    EmptyTerm { line: usize },
    #[error("rule not found: {0}")]
    RuleNotFound(String),
    #[error("rule '{0}' has no alternatives")]
    EmptyRule(String),
    #[error("expansion exceeded depth {0}")]
    DepthExceeded(usize),
    #[error("terminal '{0}' produced outside of any quest")]
    NoCurrentQuest(String),
    #[error("built-in grammar is invalid: {0}")]
    Builtin(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// One element of a production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    /// A task name, emitted as-is: `kill` or `"kill"`.
    Terminal(String),
    /// Reference to another rule: `<goto>`.
    NonTerminal(String),
}

/// An ordered list of terms, one alternative of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub terms: Vec<Term>,
}

/// A named rule with its alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub productions: Vec<Production>,
}

/// A set of named grammar rules.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GrammarSet {
    pub rules: HashMap<String, Rule>,
}

lazy_static! {
    static ref BUILTIN: Result<GrammarSet, String> =
        GrammarSet::parse_bnf(BUILTIN_GRAMMAR).map_err(|e| e.to_string());
}

// RON deserialization helper: alternatives are written with the same
// term syntax as the BNF form.
#[derive(Debug, Deserialize)]
#[serde(rename = "Rule")]
struct RonRule {
    alternatives: Vec<String>,
}

#[derive(Debug, PartialEq)]
enum Token {
    Term(Term),
    Alt,
}

/// Split the right-hand side of a rule into terms and `|` separators.
///
/// Syntax:
/// - `<name>` → `NonTerminal`
/// - `"text"` → `Terminal`
/// - a bare word → `Terminal`
/// - `|` → alternative separator
fn tokenize(input: &str, line: usize) -> Result<Vec<Token>, GrammarError> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '|' {
            tokens.push(Token::Alt);
            i += 1;
        } else if c == '<' || c == '"' {
            let close = if c == '<' { '>' } else { '"' };
            let start = i + 1;
            let end = match chars[start..].iter().position(|&ch| ch == close) {
                Some(offset) => start + offset,
                None => {
                    return Err(GrammarError::Parse {
                        line,
                        message: format!("unclosed '{}'", c),
                    })
                }
            };
            let text: String = chars[start..end].iter().collect();
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(GrammarError::EmptyTerm { line });
            }
            let term = if c == '<' {
                Term::NonTerminal(text)
            } else {
                Term::Terminal(text)
            };
            tokens.push(Token::Term(term));
            i = end + 1;
        } else if c == '>' {
            return Err(GrammarError::Parse {
                line,
                message: "unmatched '>'".to_string(),
            });
        } else {
            let start = i;
            while i < len && !chars[i].is_whitespace() && !matches!(chars[i], '<' | '"' | '|' | '>') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(Token::Term(Term::Terminal(word)));
        }
    }

    Ok(tokens)
}

/// Group tokens into productions. Empty alternatives are rejected.
fn productions(tokens: Vec<Token>, line: usize) -> Result<Vec<Production>, GrammarError> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        match token {
            Token::Term(term) => current.push(term),
            Token::Alt => {
                if current.is_empty() {
                    return Err(GrammarError::Parse {
                        line,
                        message: "empty alternative".to_string(),
                    });
                }
                out.push(Production {
                    terms: std::mem::take(&mut current),
                });
            }
        }
    }
    if current.is_empty() {
        return Err(GrammarError::Parse {
            line,
            message: "empty alternative".to_string(),
        });
    }
    out.push(Production { terms: current });
    Ok(out)
}

/// Parse a single production such as `<goto> kill`.
pub fn parse_production(input: &str) -> Result<Production, GrammarError> {
    let mut prods = productions(tokenize(input, 1)?, 1)?;
    if prods.len() != 1 {
        return Err(GrammarError::Parse {
            line: 1,
            message: "expected a single alternative".to_string(),
        });
    }
    Ok(prods.remove(0))
}

fn parse_rule_name(lhs: &str, line: usize) -> Result<String, GrammarError> {
    let lhs = lhs.trim();
    let name = match lhs.strip_prefix('<') {
        Some(rest) => rest.strip_suffix('>').ok_or_else(|| GrammarError::Parse {
            line,
            message: format!("malformed rule name '{}'", lhs),
        })?,
        None => lhs,
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(GrammarError::EmptyTerm { line });
    }
    if name.chars().any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '|')) {
        return Err(GrammarError::Parse {
            line,
            message: format!("malformed rule name '{}'", name),
        });
    }
    Ok(name.to_string())
}

impl Rule {
    /// Nonterminals referenced by any production.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.productions.iter().flat_map(|p| {
            p.terms.iter().filter_map(|t| match t {
                Term::NonTerminal(name) => Some(name.as_str()),
                Term::Terminal(_) => None,
            })
        })
    }
}

impl GrammarSet {
    /// The default quest grammar, compiled once on first use.
    pub fn builtin() -> Result<&'static GrammarSet, GrammarError> {
        BUILTIN
            .as_ref()
            .map_err(|msg| GrammarError::Builtin(msg.clone()))
    }

    /// Load a grammar file; `.ron` files use the RON form, anything else BNF.
    pub fn load(path: &Path) -> Result<GrammarSet, GrammarError> {
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            Self::load_from_ron(path)
        } else {
            let contents = std::fs::read_to_string(path)?;
            Self::parse_bnf(&contents)
        }
    }

    /// Load a grammar set from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<GrammarSet, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a grammar set from a RON string.
    pub fn parse_ron(input: &str) -> Result<GrammarSet, GrammarError> {
        let raw: HashMap<String, RonRule> = ron::from_str(input)?;
        let mut rules = HashMap::new();

        for (name, ron_rule) in raw {
            let mut prods = Vec::new();
            for (index, alt) in ron_rule.alternatives.iter().enumerate() {
                let mut parsed = productions(tokenize(alt, index + 1)?, index + 1)?;
                prods.append(&mut parsed);
            }
            rules.insert(
                name.clone(),
                Rule {
                    name,
                    productions: prods,
                },
            );
        }

        Ok(GrammarSet { rules })
    }

    /// Parse BNF-like grammar text.
    ///
    /// ```text
    /// # comment
    /// <QUEST> ::= <goto> kill | spy
    ///           | <get> <goto> give
    /// ```
    ///
    /// `->` is accepted in place of `::=`. A rule name appearing twice adds
    /// alternatives to the earlier definition.
    pub fn parse_bnf(input: &str) -> Result<GrammarSet, GrammarError> {
        let mut rules: HashMap<String, Rule> = HashMap::new();
        let mut last: Option<String> = None;

        for (index, raw_line) in input.lines().enumerate() {
            let line = index + 1;
            let text = match raw_line.find('#') {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            };
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            let (name, rhs) = if let Some(rest) = text.strip_prefix('|') {
                let name = last.clone().ok_or_else(|| GrammarError::Parse {
                    line,
                    message: "continuation without a rule".to_string(),
                })?;
                (name, rest)
            } else {
                let (lhs, rhs) = text
                    .split_once("::=")
                    .or_else(|| text.split_once("->"))
                    .ok_or_else(|| GrammarError::Parse {
                        line,
                        message: "expected '::='".to_string(),
                    })?;
                (parse_rule_name(lhs, line)?, rhs)
            };

            let mut prods = productions(tokenize(rhs, line)?, line)?;
            rules
                .entry(name.clone())
                .or_insert_with(|| Rule {
                    name: name.clone(),
                    productions: Vec::new(),
                })
                .productions
                .append(&mut prods);
            last = Some(name);
        }

        Ok(GrammarSet { rules })
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Merge another grammar set into this one. Rules from `other`
    /// override rules in `self` with the same name.
    pub fn merge(&mut self, other: GrammarSet) {
        for (name, rule) in other.rules {
            self.rules.insert(name, rule);
        }
    }

    /// Referenced rule names that have no definition, sorted.
    pub fn undefined_references(&self) -> Vec<String> {
        let missing: BTreeSet<String> = self
            .rules
            .values()
            .flat_map(|rule| rule.references())
            .filter(|name| !self.rules.contains_key(*name))
            .map(str::to_string)
            .collect();
        missing.into_iter().collect()
    }

    /// All terminal texts used anywhere in the grammar, sorted.
    pub fn terminals(&self) -> Vec<String> {
        let all: BTreeSet<String> = self
            .rules
            .values()
            .flat_map(|rule| rule.productions.iter())
            .flat_map(|p| p.terms.iter())
            .filter_map(|t| match t {
                Term::Terminal(text) => Some(text.clone()),
                Term::NonTerminal(_) => None,
            })
            .collect();
        all.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(text: &str) -> Term {
        Term::Terminal(text.to_string())
    }

    fn nt(text: &str) -> Term {
        Term::NonTerminal(text.to_string())
    }

    #[test]
    fn parse_single_rule() {
        let gs = GrammarSet::parse_bnf("<QUEST> ::= <goto> kill").unwrap();
        let rule = gs.get("QUEST").unwrap();
        assert_eq!(rule.productions.len(), 1);
        assert_eq!(rule.productions[0].terms, vec![nt("goto"), t("kill")]);
    }

    #[test]
    fn parse_alternatives_and_continuations() {
        let text = "
            # motives
            <Knowledge> ::= <get> <goto> \"give\" | spy
                          | <goto> listen <goto> report
        ";
        let gs = GrammarSet::parse_bnf(text).unwrap();
        let rule = gs.get("Knowledge").unwrap();
        assert_eq!(rule.productions.len(), 3);
        assert_eq!(rule.productions[0].terms, vec![nt("get"), nt("goto"), t("give")]);
        assert_eq!(rule.productions[1].terms, vec![t("spy")]);
        assert_eq!(rule.productions[2].terms.len(), 4);
    }

    #[test]
    fn parse_arrow_and_glued_terms() {
        let gs = GrammarSet::parse_bnf("QUEST -> <goto>goto kill").unwrap();
        let rule = gs.get("QUEST").unwrap();
        assert_eq!(
            rule.productions[0].terms,
            vec![nt("goto"), t("goto"), t("kill")]
        );
    }

    #[test]
    fn repeated_rule_appends_alternatives() {
        let gs = GrammarSet::parse_bnf("<a> ::= x\n<a> ::= y").unwrap();
        assert_eq!(gs.get("a").unwrap().productions.len(), 2);
    }

    #[test]
    fn empty_terms_are_errors() {
        assert!(matches!(
            GrammarSet::parse_bnf("<a> ::= <> x"),
            Err(GrammarError::EmptyTerm { line: 1 })
        ));
        assert!(matches!(
            GrammarSet::parse_bnf("\n<a> ::= \"\""),
            Err(GrammarError::EmptyTerm { line: 2 })
        ));
        assert!(matches!(
            GrammarSet::parse_bnf("<> ::= x"),
            Err(GrammarError::EmptyTerm { .. })
        ));
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(GrammarSet::parse_bnf("<a> x y").is_err());
        assert!(GrammarSet::parse_bnf("<a> ::= <goto").is_err());
        assert!(GrammarSet::parse_bnf("<a> ::= x | | y").is_err());
        assert!(GrammarSet::parse_bnf("<a> ::= x |").is_err());
        assert!(GrammarSet::parse_bnf("| x").is_err());
        assert!(GrammarSet::parse_bnf("<a> ::= x > y").is_err());
    }

    #[test]
    fn parse_ron_form() {
        let input = r#"{
            "QUEST": Rule(alternatives: ["<goto> kill", "spy | listen"]),
            "goto": Rule(alternatives: ["goto"]),
        }"#;
        let gs = GrammarSet::parse_ron(input).unwrap();
        assert_eq!(gs.rules.len(), 2);
        assert_eq!(gs.get("QUEST").unwrap().productions.len(), 3);
    }

    #[test]
    fn merge_precedence() {
        let mut base = GrammarSet::parse_bnf("<shared> ::= x\n<base_only> ::= y").unwrap();
        let other = GrammarSet::parse_bnf("<shared> ::= z | w").unwrap();
        base.merge(other);
        assert_eq!(base.get("shared").unwrap().productions.len(), 2);
        assert!(base.get("base_only").is_some());
    }

    #[test]
    fn undefined_references_are_reported() {
        let gs = GrammarSet::parse_bnf("<QUEST> ::= <goto> kill | <missing>\n<goto> ::= goto").unwrap();
        assert_eq!(gs.undefined_references(), vec!["missing".to_string()]);
        assert_eq!(gs.terminals(), vec!["goto".to_string(), "kill".to_string()]);
    }

    #[test]
    fn parse_production_rejects_alternatives() {
        assert_eq!(
            parse_production("<goto> kill").unwrap().terms,
            vec![nt("goto"), t("kill")]
        );
        assert!(parse_production("a | b").is_err());
    }

    #[test]
    fn builtin_grammar_compiles_and_is_closed() {
        let gs = GrammarSet::builtin().unwrap();
        assert!(gs.get(ROOT_RULE).is_some());
        assert!(gs.undefined_references().is_empty());
    }
}
