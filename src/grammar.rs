/*
    MIT License

    Copyright (c) 2020 Lars Krueger <lars_e_krueger@gmx.de>

    Permission is hereby granted, free of charge, to any person obtaining a copy
    of this software and associated documentation files (the "Software"), to deal
    in the Software without restriction, including without limitation the rights
    to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
    copies of the Software, and to permit persons to whom the Software is
    furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in all
    copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
    OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
    SOFTWARE.
*/

//! Rules and rule sets: the grammar model the chart engine interprets.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::symbol::Symbol;

/// Index of a [`ParseRule`] within a [`RuleSet`]; stable for the set's lifetime.
pub type RuleId = usize;

/// Everything that can go wrong while building a grammar, detected at
/// construction time rather than left to trip the engine later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarError {
    /// A rule's head name was empty.
    EmptyHead,
    /// `greedy`/`lazy` was set on a symbol whose quantifier is `exactly-one`.
    GreedyLazyWithoutQuantifier,
    /// `prefer_early`/`prefer_late` was set on a terminal symbol.
    PreferenceOnTerminal,
}

/// A single production: a head name, an ordered right-hand side, and an
/// integer penalty used by post-processing to prefer cheaper derivations.
#[derive(Clone, Debug)]
pub struct ParseRule<M> {
    head: String,
    symbols: Vec<Symbol<M>>,
    penalty: i64,
    priority: usize,
}

impl<M> ParseRule<M> {
    pub fn new(head: impl Into<String>, symbols: Vec<Symbol<M>>) -> Self {
        ParseRule {
            head: head.into(),
            symbols,
            penalty: 0,
            priority: 0,
        }
    }

    pub fn with_penalty(mut self, penalty: i64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn symbols(&self) -> &[Symbol<M>] {
        &self.symbols
    }

    pub fn symbol(&self, dot: usize) -> Option<&Symbol<M>> {
        self.symbols.get(dot)
    }

    pub fn penalty(&self) -> i64 {
        self.penalty
    }

    /// 1-based insertion index of this rule among its head's rules, assigned
    /// by [`RuleSet::add`]. Drives `prefer_early`/`prefer_late`.
    pub fn priority(&self) -> usize {
        self.priority
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// A grammar: rules indexed by head name, plus the set of heads whose name
/// should be unfolded rather than shown verbatim in error messages.
#[derive(Default)]
pub struct RuleSet<M> {
    rules: Vec<ParseRule<M>>,
    by_head: HashMap<String, Vec<RuleId>>,
    anonymous: HashSet<String>,
}

impl<M> RuleSet<M> {
    pub fn new() -> Self {
        RuleSet {
            rules: Vec::new(),
            by_head: HashMap::new(),
            anonymous: HashSet::new(),
        }
    }

    /// Appends `rule`, assigning it a `priority` equal to its 1-based
    /// insertion index within its head. Fails if any of the rule's symbols
    /// carry an invalid combination of flags.
    pub fn add(&mut self, mut rule: ParseRule<M>) -> Result<RuleId, GrammarError> {
        if rule.head.is_empty() {
            return Err(GrammarError::EmptyHead);
        }
        for symbol in &rule.symbols {
            symbol.validate()?;
        }
        let id = self.rules.len();
        let slot = self.by_head.entry(rule.head.clone()).or_default();
        rule.priority = slot.len() + 1;
        slot.push(id);
        self.rules.push(rule);
        Ok(id)
    }

    /// The rule ids defining `head`, in insertion order. Empty if `head` is
    /// undefined.
    pub fn get(&self, head: &str) -> &[RuleId] {
        self.by_head.get(head).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rule(&self, id: RuleId) -> &ParseRule<M> {
        &self.rules[id]
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn mark_anonymous(&mut self, head: impl Into<String>) {
        self.anonymous.insert(head.into());
    }

    pub fn is_anonymous(&self, head: &str) -> bool {
        self.anonymous.contains(head)
    }

    pub fn heads(&self) -> impl Iterator<Item = &str> {
        self.by_head.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Symbol;

    #[test]
    fn priority_tracks_insertion_order() {
        let mut rules: RuleSet<char> = RuleSet::new();
        let r1 = rules
            .add(ParseRule::new("top", vec![Symbol::terminal('a')]))
            .unwrap();
        let r2 = rules
            .add(ParseRule::new("top", vec![Symbol::terminal('b')]))
            .unwrap();
        assert_eq!(rules.rule(r1).priority(), 1);
        assert_eq!(rules.rule(r2).priority(), 2);
        assert_eq!(rules.get("top"), &[r1, r2]);
    }

    #[test]
    fn empty_head_is_rejected() {
        let mut rules: RuleSet<char> = RuleSet::new();
        let err = rules.add(ParseRule::new("", vec![])).unwrap_err();
        assert_eq!(err, GrammarError::EmptyHead);
    }

    #[test]
    fn invalid_symbol_flags_are_rejected_at_add_time() {
        let mut rules: RuleSet<char> = RuleSet::new();
        let bad = ParseRule::new("top", vec![Symbol::terminal('a').greedy()]);
        assert_eq!(
            rules.add(bad).unwrap_err(),
            GrammarError::GreedyLazyWithoutQuantifier
        );
    }

    #[test]
    fn anonymous_heads_are_tracked() {
        let mut rules: RuleSet<char> = RuleSet::new();
        assert!(!rules.is_anonymous("gamma"));
        rules.mark_anonymous("gamma");
        assert!(rules.is_anonymous("gamma"));
    }

    #[test]
    fn unknown_head_has_no_rules() {
        let rules: RuleSet<char> = RuleSet::new();
        assert!(rules.get("nope").is_empty());
    }
}
