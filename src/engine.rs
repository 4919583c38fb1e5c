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

//! The chart engine: turns a rule set, a start head and a token sequence
//! into a [`ParseForest`], column by column.

use std::collections::HashMap;
use std::collections::HashSet;

use itertools::Itertools;
use log::{debug, trace};

use crate::error::ParseError;
use crate::forest::ParseForest;
use crate::grammar::{ParseRule, RuleId, RuleSet};
use crate::item::{next_sub_state, skip_admissible, Contribution, ItemArena, ItemId, PartialItem};
use crate::symbol::{Matcher, Symbol};

const GAMMA_HEAD: &str = "$gamma";

/// Parses `tokens` against `rule_set`, starting from `start_head`, and
/// returns the resulting (untrimmed) parse forest. Equivalent to
/// `parse_opts(rule_set, start_head, tokens, true)`.
pub fn parse<'g, T, M>(
    rule_set: &'g RuleSet<M>,
    start_head: &str,
    tokens: &[T],
) -> Result<ParseForest<'g, T, M>, ParseError<T>>
where
    T: Clone,
    M: Matcher<T>,
{
    parse_opts(rule_set, start_head, tokens, true)
}

/// Like [`parse`], but lets the caller choose the `fail_if_empty` behavior:
/// when `false`, reaching the end of input with nothing derived returns a
/// vacuous empty forest instead of a [`ParseError::NoParse`].
pub fn parse_opts<'g, T, M>(
    rule_set: &'g RuleSet<M>,
    start_head: &str,
    tokens: &[T],
    fail_if_empty: bool,
) -> Result<ParseForest<'g, T, M>, ParseError<T>>
where
    T: Clone,
    M: Matcher<T>,
{
    let n = tokens.len();
    let gamma_rule: ParseRule<M> =
        ParseRule::new(GAMMA_HEAD, vec![Symbol::non_terminal(start_head)]);
    let gamma_id: RuleId = rule_set.rule_count();

    let resolve = |rid: RuleId| -> &ParseRule<M> {
        if rid == gamma_id {
            &gamma_rule
        } else {
            rule_set.rule(rid)
        }
    };

    let mut arena: ItemArena<T> = ItemArena::new();
    let (root, _) = arena.intern_initial(gamma_id, 0);

    let mut pending_by_head: Vec<HashMap<String, Vec<ItemId>>> =
        (0..=n).map(|_| HashMap::new()).collect();

    let mut carry: Vec<ItemId> = vec![root];
    let mut final_item: Option<ItemId> = None;

    for index in 0..=n {
        trace!("column {}: {} seed item(s)", index, carry.len());
        let mut current_items = std::mem::take(&mut carry);
        let mut next_items: Vec<ItemId> = Vec::new();
        let mut completed_by_head: HashMap<String, Vec<ItemId>> = HashMap::new();
        let mut terminal_items: Vec<ItemId> = Vec::new();

        while let Some(pid) = current_items.pop() {
            let item = arena.get(pid).clone();
            let rule = resolve(item.rule);

            if item.is_complete(rule.len()) {
                if item.rule == gamma_id && item.start == 0 && index == n {
                    final_item = Some(pid);
                }
                let head = rule.head().to_string();
                let waiters = pending_by_head[item.start]
                    .get(&head)
                    .cloned()
                    .unwrap_or_default();
                for q_id in waiters {
                    let q = arena.get(q_id).clone();
                    let q_rule = resolve(q.rule);
                    let q_symbol = q_rule
                        .symbol(q.dot)
                        .expect("a pending item always has a next symbol");
                    extend(
                        &mut arena,
                        &mut current_items,
                        &mut next_items,
                        index,
                        q_id,
                        &q,
                        q_symbol,
                        Contribution::Item(pid),
                        item.end,
                    );
                }
                if item.start == index {
                    completed_by_head.entry(head).or_default().push(pid);
                }
            } else {
                let symbol = rule.symbol(item.dot).expect("dot within bounds");
                if symbol.is_terminal() {
                    terminal_items.push(pid);
                    if index < n && symbol.matches(&tokens[index]) {
                        let (succ, is_new) = arena.intern_derived(
                            item.rule,
                            item.dot + 1,
                            0,
                            item.start,
                            index + 1,
                            (pid, Contribution::Token(tokens[index].clone())),
                        );
                        if is_new {
                            next_items.push(succ);
                        }
                    }
                } else {
                    let head = symbol.head().unwrap().to_string();
                    pending_by_head[index]
                        .entry(head.clone())
                        .or_default()
                        .push(pid);
                    for rid in rule_set.get(&head).to_vec() {
                        let (new_id, is_new) = arena.intern_initial(rid, index);
                        if is_new {
                            current_items.push(new_id);
                        }
                    }
                    if let Some(completed) = completed_by_head.get(&head).cloned() {
                        for c_id in completed {
                            extend(
                                &mut arena,
                                &mut current_items,
                                &mut next_items,
                                index,
                                pid,
                                &item,
                                symbol,
                                Contribution::Item(c_id),
                                index,
                            );
                        }
                    }
                }
                if skip_admissible(symbol, item.sub_state) {
                    let (succ, is_new) = arena.intern_derived(
                        item.rule,
                        item.dot + 1,
                        0,
                        item.start,
                        item.end,
                        (pid, Contribution::Skip),
                    );
                    if is_new {
                        current_items.push(succ);
                    }
                }
            }
        }

        debug!(
            "column {} done: {} item(s) carried forward, final_item={}",
            index,
            next_items.len(),
            final_item.is_some()
        );

        if next_items.is_empty() && final_item.is_none() {
            if index == n && !fail_if_empty {
                return Ok(ParseForest::vacuous(rule_set, gamma_rule, gamma_id));
            }
            let encountered = if index < n {
                Some(tokens[index].clone())
            } else {
                None
            };
            return Err(build_no_parse_error(
                rule_set,
                &gamma_rule,
                gamma_id,
                &arena,
                &pending_by_head,
                &terminal_items,
                index,
                encountered,
            ));
        }
        carry = next_items;
    }

    let root = final_item.expect("loop only exits early or with a final item");
    ParseForest::new(rule_set, arena, root, gamma_rule, gamma_id)
}

#[allow(clippy::too_many_arguments)]
fn extend<T: Clone, M>(
    arena: &mut ItemArena<T>,
    current_items: &mut Vec<ItemId>,
    next_items: &mut Vec<ItemId>,
    index: usize,
    pred_id: ItemId,
    pred: &PartialItem<T>,
    symbol: &Symbol<M>,
    contribution: Contribution<T>,
    new_end: usize,
) {
    let (new_dot, new_sub) = if symbol.multiple() {
        (pred.dot, next_sub_state(pred.sub_state, symbol))
    } else {
        (pred.dot + 1, 0)
    };
    let (succ, is_new) = arena.intern_derived(
        pred.rule, new_dot, new_sub, pred.start, new_end, (pred_id, contribution),
    );
    if is_new {
        if new_end == index {
            current_items.push(succ);
        } else {
            next_items.push(succ);
        }
    }
}

/// Builds the `NoParse` error for a failed column: walks backward from the
/// terminals the engine tried, through predicting parents, unfolding
/// anonymous (and the synthetic gamma) heads into their own predictors so
/// the reported expectation set is meaningful to a grammar author.
#[allow(clippy::too_many_arguments)]
fn build_no_parse_error<T: Clone, M>(
    rule_set: &RuleSet<M>,
    gamma_rule: &ParseRule<M>,
    gamma_id: RuleId,
    arena: &ItemArena<T>,
    pending_by_head: &[HashMap<String, Vec<ItemId>>],
    terminal_items: &[ItemId],
    index: usize,
    encountered: Option<T>,
) -> ParseError<T> {
    let resolve = |rid: RuleId| -> &ParseRule<M> {
        if rid == gamma_id {
            gamma_rule
        } else {
            rule_set.rule(rid)
        }
    };

    let mut open_set: Vec<ItemId> = terminal_items.to_vec();
    let mut visited: HashSet<ItemId> = HashSet::new();
    let mut children: HashMap<ItemId, Vec<ItemId>> = HashMap::new();
    let mut exits: Vec<ItemId> = Vec::new();

    while let Some(id) = open_set.pop() {
        if !visited.insert(id) {
            continue;
        }
        let item = arena.get(id);
        if item.rule == gamma_id {
            exits.push(id);
        } else if item.dot == 0 && item.sub_state == 0 {
            let rule = resolve(item.rule);
            let parents = pending_by_head[index]
                .get(rule.head())
                .cloned()
                .unwrap_or_default();
            for parent in parents {
                children.entry(parent).or_default().push(id);
                open_set.push(parent);
            }
        } else {
            exits.push(id);
        }
    }

    let mut non_anon: Vec<ItemId> = Vec::new();
    let mut seen_non_anon: HashSet<ItemId> = HashSet::new();
    while let Some(id) = exits.pop() {
        let item = arena.get(id);
        let rule = resolve(item.rule);
        let symbol = rule
            .symbol(item.dot)
            .expect("exit items are always incomplete");
        if !symbol.is_terminal() {
            let head = symbol.head().unwrap();
            if rule_set.is_anonymous(head) || item.rule == gamma_id {
                if let Some(kids) = children.get(&id) {
                    exits.extend(kids.iter().copied());
                }
                continue;
            }
        }
        if seen_non_anon.insert(id) {
            non_anon.push(id);
        }
    }

    let symbol_name = |id: ItemId| -> String {
        let item = arena.get(id);
        let rule = resolve(item.rule);
        rule.symbol(item.dot)
            .map(|s| s.display_name().to_string())
            .unwrap_or_default()
    };

    let terminals_tried: Vec<String> = terminal_items
        .iter()
        .copied()
        .map(symbol_name)
        .unique()
        .collect();
    let expected: Vec<String> = non_anon.into_iter().map(symbol_name).sorted().unique().collect();

    ParseError::NoParse {
        encountered,
        start_index: index,
        end_index: index,
        terminals_tried,
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ParseRule;

    fn single_terminal_grammar() -> RuleSet<char> {
        let mut rules = RuleSet::new();
        rules
            .add(ParseRule::new("top", vec![Symbol::terminal('a')]))
            .unwrap();
        rules
    }

    #[test]
    fn matches_a_single_terminal() {
        let rules = single_terminal_grammar();
        let forest = parse(&rules, "top", &['a']).unwrap();
        assert_eq!(forest.count().unwrap(), num_bigint::BigUint::from(1u32));
    }

    #[test]
    fn reports_no_parse_with_expected_set() {
        let rules = single_terminal_grammar();
        let err = parse(&rules, "top", &['b']).unwrap_err();
        match err {
            ParseError::NoParse {
                encountered,
                start_index,
                end_index,
                expected,
                ..
            } => {
                assert_eq!(encountered, Some('b'));
                assert_eq!(start_index, 0);
                assert_eq!(end_index, 0);
                assert_eq!(expected, vec!["<terminal>".to_string()]);
            }
            other => panic!("expected NoParse, got {:?}", other),
        }
    }

    #[test]
    fn reports_end_of_input_when_tokens_run_out() {
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "top",
                vec![Symbol::terminal('a'), Symbol::terminal('b')],
            ))
            .unwrap();
        let err = parse(&rules, "top", &['a']).unwrap_err();
        match err {
            ParseError::NoParse { encountered, .. } => assert_eq!(encountered, None),
            other => panic!("expected NoParse, got {:?}", other),
        }
    }

    #[test]
    fn epsilon_rule_completes_in_its_prediction_column() {
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "top",
                vec![Symbol::terminal('a').star(), Symbol::non_terminal("maybe")],
            ))
            .unwrap();
        rules.add(ParseRule::new("maybe", vec![])).unwrap();
        let forest = parse(&rules, "top", &['a', 'a']).unwrap();
        assert!(forest.internal_node_count() > 0);
    }
}
