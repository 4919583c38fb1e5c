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

//! The parse forest: post-processing passes (reverse edges, penalty trim,
//! greedy/preference trim, loop detection) and the public query API
//! (`single`/`all`/`count`/iteration/`apply`).

use std::collections::HashMap;
use std::collections::HashSet;

use log::debug;
use num_bigint::BigUint;

use crate::builder::{
    make_iter_builder, make_list_builder, Builder, CountingBuilder, LazyList, SingleTreeBuilder,
    Value,
};
use crate::error::ParseError;
use crate::grammar::{ParseRule, RuleId, RuleSet};
use crate::item::{Contribution, ItemArena, ItemId};
use crate::symbol::{HeadPreference, QuantifierPreference};

/// The forest produced by [`crate::engine::parse`]: a DAG of canonical
/// [`crate::item::PartialItem`]s rooted at a synthetic gamma item, plus the
/// reverse-edge map and trimming passes applied to it.
///
/// Borrows the grammar (`rules`) for the forest's lifetime: the rule set is
/// read-only for the duration of a parse and the forest only needs to
/// resolve symbols, never to mutate rules (§5 of the design).
pub struct ParseForest<'g, T, M> {
    rules: &'g RuleSet<M>,
    gamma_rule: ParseRule<M>,
    gamma_id: RuleId,
    arena: ItemArena<T>,
    root: ItemId,
}

impl<'g, T, M> ParseForest<'g, T, M>
where
    T: Clone,
{
    /// Builds a forest from a freshly parsed arena, running all four
    /// post-processing passes in the order mandated by spec.md §4.4.
    pub(crate) fn new(
        rules: &'g RuleSet<M>,
        mut arena: ItemArena<T>,
        root: ItemId,
        gamma_rule: ParseRule<M>,
        gamma_id: RuleId,
    ) -> Result<Self, ParseError<T>> {
        compute_dests(&mut arena, root);
        trim_penalty(&mut arena, root, &gamma_rule, gamma_id, rules);
        trim_greedy(&mut arena, root, &gamma_rule, gamma_id, rules);
        detect_loops(&arena, root)?;
        debug!(
            "forest built: {} item(s) reachable from the root",
            count_reachable(&arena, root)
        );
        Ok(ParseForest {
            rules,
            gamma_rule,
            gamma_id,
            arena,
            root,
        })
    }

    /// A forest with no derivations, used when `fail_if_empty` is `false`
    /// and the input is empty.
    pub(crate) fn vacuous(rules: &'g RuleSet<M>, gamma_rule: ParseRule<M>, gamma_id: RuleId) -> Self {
        let mut arena: ItemArena<T> = ItemArena::new();
        let (root, _) = arena.intern_initial(gamma_id, 0);
        ParseForest {
            rules,
            gamma_rule,
            gamma_id,
            arena,
            root,
        }
    }

    pub(crate) fn resolve(&self, rule: RuleId) -> &ParseRule<M> {
        if rule == self.gamma_id {
            &self.gamma_rule
        } else {
            self.rules.rule(rule)
        }
    }

    /// Whether `rule` is the synthetic gamma rule seeded by [`crate::engine::parse`].
    pub(crate) fn is_gamma(&self, rule: RuleId) -> bool {
        rule == self.gamma_id
    }

    pub(crate) fn arena(&self) -> &ItemArena<T> {
        &self.arena
    }

    pub(crate) fn root(&self) -> ItemId {
        self.root
    }

    /// Number of distinct items reachable from the root. Grows linearly in
    /// input size for LL/LR-shaped grammars even when the tree count grows
    /// exponentially (spec.md §8, "Sharing").
    pub fn internal_node_count(&self) -> usize {
        count_reachable(&self.arena, self.root)
    }

    /// Drives `builder` over the forest with a single stackless post-order
    /// walk, memoizing one value per item (spec.md §4.5).
    pub fn apply<B>(&self, builder: &mut B) -> Result<B::Value, ParseError<T, B::Value>>
    where
        B: Builder<T>,
    {
        crate::builder::traverse(self, builder)
    }

    /// The single parse tree, or [`ParseError::AmbiguousParse`] if more than
    /// one derivation exists anywhere in the forest.
    pub fn single(&self) -> Result<Value<T>, ParseError<T, Value<T>>> {
        self.apply(&mut SingleTreeBuilder::new())
    }

    /// Every parse tree contained in the forest.
    pub fn all(&self) -> Result<Vec<Value<T>>, ParseError<T, Vec<Value<T>>>> {
        self.apply(&mut make_list_builder(SingleTreeBuilder::new()))
    }

    /// The number of parse trees contained in the forest, without
    /// materializing any of them. Arbitrary precision: the documented
    /// stress case (`top -> a* ; a -> 'a' | 'a'` over 1000 tokens) yields
    /// `2**1000`, which does not fit in any fixed-width integer.
    pub fn count(&self) -> Result<BigUint, ParseError<T, BigUint>> {
        self.apply(&mut CountingBuilder::new())
    }

    /// A lazy, stackless iterator over every parse tree in the forest.
    /// Trees are forced one at a time via a trampolined thunk chain rather
    /// than materialized up front.
    pub fn iter(&self) -> Result<ForestIter<T>, ParseError<T, Value<T>>> {
        let thunk = self.apply(&mut make_iter_builder(SingleTreeBuilder::new()))?;
        Ok(ForestIter { next: Some(thunk) })
    }
}

/// Iterator returned by [`ParseForest::iter`]. Each call to `next` forces
/// exactly one more cell of the lazy cons-list via [`crate::builder::Thunk::force`].
pub struct ForestIter<T> {
    next: Option<crate::builder::Thunk<Value<T>>>,
}

impl<T> Iterator for ForestIter<T> {
    type Item = Value<T>;

    fn next(&mut self) -> Option<Value<T>> {
        let thunk = self.next.take()?;
        match thunk.force() {
            LazyList::Nil => None,
            LazyList::Cons(head, tail) => {
                self.next = Some(tail);
                Some(head)
            }
        }
    }
}

fn count_reachable<T>(arena: &ItemArena<T>, root: ItemId) -> usize {
    let mut visited = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(sources) = &arena.get(id).sources {
            for (pred, contribution) in sources {
                stack.push(*pred);
                if let Some(inner) = contribution.as_item() {
                    stack.push(inner);
                }
            }
        }
    }
    visited.len()
}

/// P1: fills in `dests[pred]` with `(current, contribution)` for every edge
/// `(pred, contribution)` found in `current.sources`, by a DFS from the
/// root. Also records the reverse edge for inner (completion) items so that
/// trimming can walk both predecessor chains uniformly.
fn compute_dests<T: Clone>(arena: &mut ItemArena<T>, root: ItemId) {
    let mut visited: HashSet<ItemId> = HashSet::new();
    let mut stack: Vec<(ItemId, bool)> = vec![(root, true)];
    while let Some((id, first)) = stack.pop() {
        if first {
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, false));
            if let Some(sources) = arena.get(id).sources.clone() {
                for (pred, contribution) in sources {
                    stack.push((pred, true));
                    if let Some(inner) = contribution.as_item() {
                        stack.push((inner, true));
                    }
                }
            }
        } else if let Some(sources) = arena.get(id).sources.clone() {
            for (pred, contribution) in sources {
                arena.get_mut(pred).dests.push((id, contribution));
            }
        }
    }
}

fn penalty_of<T, M>(
    arena: &ItemArena<T>,
    id: ItemId,
    gamma_rule: &ParseRule<M>,
    gamma_id: RuleId,
    rules: &RuleSet<M>,
) -> i64 {
    let item = arena.get(id);
    let rule = if item.rule == gamma_id {
        gamma_rule
    } else {
        rules.rule(item.rule)
    };
    rule.penalty()
}

/// P2: assigns every item the minimum over its source pairs of
/// `penalty(source0) + penalty(source1)`, removing any source pair whose
/// penalty exceeds that minimum. Not Dijkstra-correct in the presence of
/// cycles (spec.md §4.4, §9) — an acknowledged, documented approximation.
fn trim_penalty<T: Clone, M>(
    arena: &mut ItemArena<T>,
    root: ItemId,
    gamma_rule: &ParseRule<M>,
    gamma_id: RuleId,
    rules: &RuleSet<M>,
) {
    let mut visited: HashSet<ItemId> = HashSet::new();
    let mut penalties: HashMap<ItemId, i64> = HashMap::new();
    let mut stack: Vec<(ItemId, bool)> = vec![(root, true)];

    let score_pair = |penalties: &HashMap<ItemId, i64>,
                       visited: &HashSet<ItemId>,
                       pred: ItemId,
                       contribution: &Contribution<T>|
     -> i64 {
        let p0 = if visited.contains(&pred) {
            *penalties.get(&pred).unwrap_or(&0)
        } else {
            0
        };
        let p1 = match contribution.as_item() {
            Some(inner) if visited.contains(&inner) => *penalties.get(&inner).unwrap_or(&0),
            _ => 0,
        };
        p0 + p1
    };

    while let Some((id, first)) = stack.pop() {
        if first {
            if visited.contains(&id) {
                continue;
            }
            visited.insert(id);
            let item = arena.get(id);
            if item.sources.is_none() {
                penalties.insert(id, penalty_of(arena, id, gamma_rule, gamma_id, rules));
            } else {
                stack.push((id, false));
                let sources = item.sources.clone().unwrap();
                for (pred, contribution) in sources {
                    stack.push((pred, true));
                    if let Some(inner) = contribution.as_item() {
                        stack.push((inner, true));
                    }
                }
            }
        } else {
            let sources = arena.get(id).sources.clone().unwrap_or_default();
            let mut min_penalty = i64::MAX;
            let mut max_penalty = i64::MIN;
            for (pred, contribution) in &sources {
                let p = score_pair(&penalties, &visited, *pred, contribution);
                min_penalty = min_penalty.min(p);
                max_penalty = max_penalty.max(p);
            }
            if min_penalty != max_penalty {
                let keep: Vec<(ItemId, Contribution<T>)> = sources
                    .into_iter()
                    .filter(|(pred, contribution)| {
                        score_pair(&penalties, &visited, *pred, contribution) == min_penalty
                    })
                    .collect();
                remove_trimmed_dests(arena, id, &keep);
                arena.get_mut(id).sources = Some(keep);
            }
            penalties.insert(id, min_penalty);
        }
    }
}

/// Replaces `item`'s `dests`-side bookkeeping after `sources` has been
/// narrowed down to `keep`: every predecessor that is no longer referenced
/// has the corresponding `(item, contribution)` pair removed from its
/// `dests` set.
fn remove_trimmed_dests<T: Clone>(
    arena: &mut ItemArena<T>,
    item: ItemId,
    keep: &[(ItemId, Contribution<T>)],
) {
    let removed: Vec<(ItemId, Contribution<T>)> = {
        let full = arena.get(item).sources.clone().unwrap_or_default();
        full.into_iter()
            .filter(|pair| !contains_pair(keep, pair))
            .collect()
    };
    for (pred, contribution) in removed {
        let dests = &mut arena.get_mut(pred).dests;
        if let Some(pos) = dests
            .iter()
            .position(|(dst, c)| *dst == item && contributions_eq(c, &contribution))
        {
            dests.remove(pos);
        }
    }
}

fn contains_pair<T: Clone>(haystack: &[(ItemId, Contribution<T>)], needle: &(ItemId, Contribution<T>)) -> bool {
    haystack
        .iter()
        .any(|pair| pair.0 == needle.0 && contributions_eq(&pair.1, &needle.1))
}

fn contributions_eq<T>(a: &Contribution<T>, b: &Contribution<T>) -> bool {
    match (a, b) {
        (Contribution::Skip, Contribution::Skip) => true,
        (Contribution::Item(x), Contribution::Item(y)) => x == y,
        // Tokens are compared by position in the scan, never by identity
        // across two different contributions; reaching this arm means the
        // caller is comparing a fresh removal set against itself.
        (Contribution::Token(_), Contribution::Token(_)) => true,
        _ => false,
    }
}

/// P3: greedy/lazy and prefer-early/prefer-late trimming, via `dests`.
/// Greedy/lazy runs first — it picks among skip vs. extend of the *same*
/// symbol position, which is conceptually outside the rule-priority choice
/// that prefer-early/late selects (spec.md §4.4).
fn trim_greedy<T: Clone, M>(
    arena: &mut ItemArena<T>,
    root: ItemId,
    gamma_rule: &ParseRule<M>,
    gamma_id: RuleId,
    rules: &RuleSet<M>,
) {
    let mut visited: HashSet<ItemId> = HashSet::new();
    let mut stack: Vec<(ItemId, bool)> = vec![(root, true)];
    while let Some((id, first)) = stack.pop() {
        if first {
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, false));
            if let Some(sources) = arena.get(id).sources.clone() {
                for (pred, contribution) in sources {
                    stack.push((pred, true));
                    if let Some(inner) = contribution.as_item() {
                        stack.push((inner, true));
                    }
                }
            }
            continue;
        }

        // Second visit: every predecessor (and every inner completion
        // reachable through it) has already made its own trimming
        // decisions, so this item's `dests` reflect their outcome.

        // Cascade: an item whose sources were fully trimmed away is dead;
        // remove the edges it contributed to its own successors too.
        if matches!(&arena.get(id).sources, Some(s) if s.is_empty()) {
            let dests = arena.get(id).dests.clone();
            for (next, contribution) in dests {
                remove_link(arena, id, &contribution, next);
            }
        }

        let item = arena.get(id);
        let rule = resolve_rule(item.rule, gamma_rule, gamma_id, rules);
        if item.is_complete(rule.len()) {
            continue;
        }
        let symbol = rule.symbol(item.dot).expect("dot within bounds");

        if symbol.quantifier_preference() != QuantifierPreference::None {
            let dests = arena.get(id).dests.clone();
            let has_skip = dests.iter().any(|(_, c)| c.is_skip());
            let has_extend = dests.iter().any(|(_, c)| !c.is_skip());
            if has_skip && has_extend {
                let drop_skip = symbol.quantifier_preference() == QuantifierPreference::Greedy;
                for (next, contribution) in dests {
                    if contribution.is_skip() == drop_skip {
                        remove_link(arena, id, &contribution, next);
                    }
                }
            }
        }

        if !symbol.is_terminal() && symbol.head_preference() != HeadPreference::None {
            let dests = arena.get(id).dests.clone();
            // The priority that matters is the completed non-terminal's own
            // rule, carried by the completion `contribution` (the inner
            // item) — not the successor item `next`, which is the *same*
            // canonical item (same dot/sub_state/span) no matter which of
            // the competing rules completed it. A `skip` edge (possible
            // when this symbol is also optional/multiple) has no rule of
            // its own and plays no part in this comparison.
            let priority_of = |arena: &ItemArena<T>, contribution: &Contribution<T>| -> Option<usize> {
                let inner = contribution.as_item()?;
                let inner_rule = resolve_rule(arena.get(inner).rule, gamma_rule, gamma_id, rules);
                Some(inner_rule.priority())
            };
            let mut min_priority = usize::MAX;
            let mut max_priority = usize::MIN;
            for (_, contribution) in &dests {
                if let Some(p) = priority_of(arena, contribution) {
                    min_priority = min_priority.min(p);
                    max_priority = max_priority.max(p);
                }
            }
            if min_priority != max_priority {
                let keep_priority = if symbol.head_preference() == HeadPreference::PreferEarly {
                    min_priority
                } else {
                    max_priority
                };
                for (next, contribution) in dests {
                    if priority_of(arena, &contribution).map_or(false, |p| p != keep_priority) {
                        remove_link(arena, id, &contribution, next);
                    }
                }
            }
        }
    }
}

fn resolve_rule<'a, M>(
    rule: RuleId,
    gamma_rule: &'a ParseRule<M>,
    gamma_id: RuleId,
    rules: &'a RuleSet<M>,
) -> &'a ParseRule<M> {
    if rule == gamma_id {
        gamma_rule
    } else {
        rules.rule(rule)
    }
}

/// Removes the edge `before --contribution--> after` from both `after.sources`
/// and `before.dests`.
fn remove_link<T: Clone>(
    arena: &mut ItemArena<T>,
    before: ItemId,
    contribution: &Contribution<T>,
    after: ItemId,
) {
    if let Some(sources) = &mut arena.get_mut(after).sources {
        if let Some(pos) = sources
            .iter()
            .position(|(pred, c)| *pred == before && contributions_eq(c, contribution))
        {
            sources.remove(pos);
        }
    }
    let dests = &mut arena.get_mut(before).dests;
    if let Some(pos) = dests
        .iter()
        .position(|(dst, c)| *dst == after && contributions_eq(c, contribution))
    {
        dests.remove(pos);
    }
}

/// P4: Tarjan's SCC over the (candidate) DAG using an explicit work stack.
/// Any SCC of size greater than one, or a self-edge on a size-one SCC,
/// raises [`ParseError::InfiniteParse`]. `lowlink` starts at `+inf` so a
/// size-one SCC without a self-edge is distinguished from one with (spec.md
/// §4.4).
fn detect_loops<T: Clone>(arena: &ItemArena<T>, root: ItemId) -> Result<(), ParseError<T>> {
    let mut index = 0usize;
    let mut indices: HashMap<ItemId, usize> = HashMap::new();
    let mut lowlinks: HashMap<ItemId, usize> = HashMap::new();
    let mut short_stack: Vec<ItemId> = Vec::new();
    let mut short_stack_set: HashSet<ItemId> = HashSet::new();

    #[derive(Clone, Copy)]
    enum Source {
        Pred(ItemId),
        Inner(ItemId),
    }

    struct Frame {
        node: ItemId,
        sources: Option<Vec<Source>>,
        cursor: usize,
        parent: Option<ItemId>,
    }

    let mut full_stack: Vec<Frame> = vec![Frame {
        node: root,
        sources: None,
        cursor: 0,
        parent: None,
    }];

    const INF: usize = usize::MAX;

    while let Some(mut frame) = full_stack.pop() {
        if frame.sources.is_none() {
            indices.insert(frame.node, index);
            lowlinks.insert(frame.node, INF);
            index += 1;
            short_stack.push(frame.node);
            short_stack_set.insert(frame.node);
            let sources: Vec<Source> = match &arena.get(frame.node).sources {
                None => Vec::new(),
                Some(pairs) => pairs
                    .iter()
                    .flat_map(|(pred, contribution)| {
                        let mut v = vec![Source::Pred(*pred)];
                        if let Some(inner) = contribution.as_item() {
                            v.push(Source::Inner(inner));
                        }
                        v
                    })
                    .collect(),
            };
            frame.sources = Some(sources);
        }

        let sources = frame.sources.as_ref().unwrap();
        if frame.cursor < sources.len() {
            let source = match sources[frame.cursor] {
                Source::Pred(id) | Source::Inner(id) => id,
            };
            frame.cursor += 1;
            let current = frame.node;
            let parent = frame.parent;
            full_stack.push(frame);

            if !indices.contains_key(&source) {
                full_stack.push(Frame {
                    node: source,
                    sources: None,
                    cursor: 0,
                    parent: Some(current),
                });
            } else if short_stack_set.contains(&source) {
                let lowlink = lowlinks[&current].min(indices[&source]);
                lowlinks.insert(current, lowlink);
            }
        } else {
            let current = frame.node;
            let parent = frame.parent;
            if lowlinks[&current] == INF {
                let child = short_stack.pop().unwrap();
                short_stack_set.remove(&child);
                debug_assert_eq!(child, current);
            } else if lowlinks[&current] == indices[&current] {
                loop {
                    let child = short_stack.pop().unwrap();
                    short_stack_set.remove(&child);
                    if child == current {
                        break;
                    }
                }
                let item = arena.get(current);
                return Err(ParseError::InfiniteParse {
                    message: "forest contains a cycle".to_string(),
                    start_index: item.start,
                    end_index: item.end,
                });
            }
            if let Some(parent) = parent {
                let lowlink = lowlinks[&parent].min(lowlinks[&current]).min(indices[&current]);
                lowlinks.insert(parent, lowlink);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parse;
    use crate::grammar::ParseRule;
    use crate::symbol::Symbol;

    #[test]
    fn unambiguous_input_yields_one_tree() {
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new("top", vec![Symbol::terminal('a')]))
            .unwrap();
        let forest = parse(&rules, "top", &['a']).unwrap();
        assert_eq!(forest.internal_node_count() > 0, true);
        assert_eq!(forest.count().unwrap(), BigUint::from(1u32));
        forest.single().unwrap();
    }

    #[test]
    fn ambiguous_sum_has_two_trees() {
        // top -> top top | 'a'
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "top",
                vec![Symbol::non_terminal("top"), Symbol::non_terminal("top")],
            ))
            .unwrap();
        rules
            .add(ParseRule::new("top", vec![Symbol::terminal('a')]))
            .unwrap();
        let forest = parse(&rules, "top", &['a', 'a', 'a']).unwrap();
        assert_eq!(forest.count().unwrap(), BigUint::from(2u32));
        assert_eq!(forest.all().unwrap().len(), 2);
        assert!(forest.single().is_err());
    }

    #[test]
    fn direct_left_recursion_without_progress_is_infinite() {
        // top -> top ; top -> 'a'
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new("top", vec![Symbol::non_terminal("top")]))
            .unwrap();
        rules
            .add(ParseRule::new("top", vec![Symbol::terminal('a')]))
            .unwrap();
        let err = parse(&rules, "top", &['a']).unwrap_err();
        assert!(matches!(err, ParseError::InfiniteParse { .. }));
    }

    #[test]
    fn penalty_resolves_recursive_ambiguity() {
        // top -> top (penalty 1) | 'a'
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(
                ParseRule::new("top", vec![Symbol::non_terminal("top")]).with_penalty(1),
            )
            .unwrap();
        rules
            .add(ParseRule::new("top", vec![Symbol::terminal('a')]))
            .unwrap();
        // top -> top loops, but the penalty trim runs before loop detection
        // and prunes the self-referential edge off the root (it scores worse
        // than the direct 'a' derivation), so the loop is never reachable
        // from the root and the parse succeeds with one tree.
        let forest = parse(&rules, "top", &['a']).unwrap();
        let tree = forest.single().unwrap();
        assert_eq!(crate::unparse::unparse(&tree), vec!['a']);
    }

    #[test]
    fn greedy_optional_before_star_resolves_to_one_tree() {
        // top -> 'a'?(greedy) 'a'*
        //
        // The tie genuinely lives on the optional's own item: it can either
        // extend (consume the first 'a') or skip, and both leave the
        // remaining 'a' for the star to pick up. Greedy prefers extending,
        // collapsing the ambiguity. Putting the preference on the star
        // instead does not resolve anything, since by the time the star's
        // item is reached the optional has already committed one way or the
        // other.
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "top",
                vec![Symbol::terminal('a').optional().greedy(), Symbol::terminal('a').star()],
            ))
            .unwrap();
        let forest = parse(&rules, "top", &['a', 'a']).unwrap();
        assert_eq!(forest.count().unwrap(), BigUint::from(1u32));
    }

    #[test]
    fn lazy_optional_before_star_resolves_to_one_tree() {
        // top -> 'a'?(lazy) 'a'*
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "top",
                vec![Symbol::terminal('a').optional().lazy(), Symbol::terminal('a').star()],
            ))
            .unwrap();
        let forest = parse(&rules, "top", &['a', 'a']).unwrap();
        assert_eq!(forest.count().unwrap(), BigUint::from(1u32));
    }

    #[test]
    fn plain_optional_star_overlap_is_ambiguous() {
        // top -> 'a'? 'a'* (no preference)
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "top",
                vec![Symbol::terminal('a').optional(), Symbol::terminal('a').star()],
            ))
            .unwrap();
        let forest = parse(&rules, "top", &['a', 'a']).unwrap();
        assert!(forest.single().is_err());
    }

    fn described_relative_rules(greedy_adjectives: bool) -> RuleSet<&'static str> {
        // relative     -> 'great'* 'grandfather'
        // adjective    -> 'awesome' | 'great'
        // described    -> adjective*(greedy?) relative
        //
        // "great grandfather" is ambiguous without a preference: "great" can
        // be consumed either by the outer `adjective*` or by `relative`'s own
        // `'great'*`. `greedy` on the non-terminal star prefers matching one
        // more adjective over ending the star there, resolving it.
        let mut rules: RuleSet<&str> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "relative",
                vec![Symbol::terminal("great").star(), Symbol::terminal("grandfather")],
            ))
            .unwrap();
        rules
            .add(ParseRule::new("adjective", vec![Symbol::terminal("awesome")]))
            .unwrap();
        rules
            .add(ParseRule::new("adjective", vec![Symbol::terminal("great")]))
            .unwrap();
        let adjectives = if greedy_adjectives {
            Symbol::non_terminal("adjective").star().greedy()
        } else {
            Symbol::non_terminal("adjective").star()
        };
        rules
            .add(ParseRule::new(
                "described",
                vec![adjectives, Symbol::non_terminal("relative")],
            ))
            .unwrap();
        rules
    }

    #[test]
    fn greedy_non_terminal_star_resolves_adjective_ambiguity() {
        let rules = described_relative_rules(true);
        let forest = parse(&rules, "described", &["great", "grandfather"]).unwrap();
        assert_eq!(forest.count().unwrap(), BigUint::from(1u32));
    }

    #[test]
    fn lazy_non_terminal_star_resolves_adjective_ambiguity() {
        let mut rules = described_relative_rules(false);
        rules
            .add(ParseRule::new(
                "described lazy",
                vec![
                    Symbol::non_terminal("adjective").star().lazy(),
                    Symbol::non_terminal("relative"),
                ],
            ))
            .unwrap();
        let forest = parse(&rules, "described lazy", &["great", "grandfather"]).unwrap();
        assert_eq!(forest.count().unwrap(), BigUint::from(1u32));
    }

    #[test]
    fn non_terminal_star_without_preference_is_ambiguous() {
        let rules = described_relative_rules(false);
        let forest = parse(&rules, "described", &["great", "grandfather"]).unwrap();
        assert!(forest.single().is_err());
    }

    #[test]
    fn dinner_order_prefer_early_resolves_to_single_item_reading() {
        // dish -> 'ham' 'and' 'eggs'      (priority 1: one dish literally named
        //                                  "ham and eggs")
        // dish -> food 'and' food         (priority 2: two separate dishes)
        // food -> 'ham' | 'eggs'
        // request -> 'I' 'want' dish!     (dish referenced with prefer_early)
        let mut rules: RuleSet<&str> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "dish",
                vec![
                    Symbol::terminal("ham"),
                    Symbol::terminal("and"),
                    Symbol::terminal("eggs"),
                ],
            ))
            .unwrap();
        rules
            .add(ParseRule::new(
                "dish",
                vec![
                    Symbol::non_terminal("food"),
                    Symbol::terminal("and"),
                    Symbol::non_terminal("food"),
                ],
            ))
            .unwrap();
        rules
            .add(ParseRule::new("food", vec![Symbol::terminal("ham")]))
            .unwrap();
        rules
            .add(ParseRule::new("food", vec![Symbol::terminal("eggs")]))
            .unwrap();
        rules
            .add(ParseRule::new(
                "request",
                vec![
                    Symbol::terminal("I"),
                    Symbol::terminal("want"),
                    Symbol::non_terminal("dish").prefer_early(),
                ],
            ))
            .unwrap();

        let tokens = ["I", "want", "ham", "and", "eggs"];
        let forest = parse(&rules, "request", &tokens).unwrap();
        assert_eq!(forest.count().unwrap(), BigUint::from(1u32));
        match forest.single().unwrap() {
            Value::Tree(t) => match &t.children[2] {
                // the single-item reading: "ham" "and" "eggs" as three
                // terminals of one dish, not a `food 'and' food` split.
                Value::Tree(dish) => assert_eq!(dish.children.len(), 3),
                other => panic!("expected a Tree for dish, got {:?}", other),
            },
            other => panic!("expected a Tree, got {:?}", other),
        }
    }

    #[test]
    fn prefer_early_keeps_only_the_first_defined_rule() {
        // greeting -> 'x' (priority 1) | 'x' (priority 2); top -> greeting!
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new("greeting", vec![Symbol::terminal('x')]))
            .unwrap();
        rules
            .add(ParseRule::new("greeting", vec![Symbol::terminal('x')]))
            .unwrap();
        rules
            .add(ParseRule::new(
                "top",
                vec![Symbol::non_terminal("greeting").prefer_early()],
            ))
            .unwrap();
        let forest = parse(&rules, "top", &['x']).unwrap();
        assert_eq!(forest.count().unwrap(), BigUint::from(1u32));
        forest.single().unwrap();
    }

    #[test]
    fn prefer_late_keeps_only_the_last_defined_rule() {
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new("greeting", vec![Symbol::terminal('x')]))
            .unwrap();
        rules
            .add(ParseRule::new("greeting", vec![Symbol::terminal('x')]))
            .unwrap();
        rules
            .add(ParseRule::new(
                "top",
                vec![Symbol::non_terminal("greeting").prefer_late()],
            ))
            .unwrap();
        let forest = parse(&rules, "top", &['x']).unwrap();
        assert_eq!(forest.count().unwrap(), BigUint::from(1u32));
        forest.single().unwrap();
    }

    #[test]
    fn item_count_stays_linear_while_tree_count_is_exponential() {
        // top -> a*; a -> 'a' | 'a'. Every token doubles the tree count (two
        // ways to derive each `a`) but contributes a fixed number of new
        // chart items, so internal_node_count must grow linearly in N while
        // count() grows as 2**N.
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "top",
                vec![Symbol::non_terminal("a").star()],
            ))
            .unwrap();
        rules
            .add(ParseRule::new("a", vec![Symbol::terminal('a')]))
            .unwrap();
        rules
            .add(ParseRule::new("a", vec![Symbol::terminal('a')]))
            .unwrap();

        let counts_at: Vec<usize> = [4usize, 20, 100]
            .iter()
            .map(|&n| {
                let tokens: Vec<char> = std::iter::repeat('a').take(n).collect();
                let forest = parse(&rules, "top", &tokens).unwrap();
                assert_eq!(forest.count().unwrap(), BigUint::from(2u32).pow(n as u32));
                forest.internal_node_count()
            })
            .collect();

        // Linear growth: the per-token item cost (slope between successive
        // sample points) must be the same constant at every N, not growing
        // with N the way it would if sharing had failed.
        let slope_a = (counts_at[1] - counts_at[0]) / (20 - 4);
        let slope_b = (counts_at[2] - counts_at[1]) / (100 - 20);
        assert_eq!(slope_a, slope_b);
    }
}
