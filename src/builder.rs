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

//! The builder traversal (C5): a stackless, memoized post-order walk of a
//! [`crate::forest::ParseForest`] that drives any [`Builder`] implementation,
//! plus the four standard builders (`Count`, `SingleTree`, `List`, `Iter`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigUint;

use crate::error::ParseError;
use crate::forest::ParseForest;
use crate::item::{Contribution, ItemId};

/// Location and rule context passed to every [`Builder`] method. Mirrors the
/// span/symbol-position information available while walking a single forest
/// item, independent of the grammar's matcher type.
#[derive(Clone, Debug)]
pub struct BuilderContext {
    /// Head of the rule being assembled, or `None` for a context that has no
    /// associated rule (the synthetic gamma rule is never surfaced to a
    /// builder, so this is only ever `None` defensively).
    pub rule_head: Option<String>,
    /// Index of the relevant symbol within the rule; may equal the rule's
    /// length when the rule is complete.
    pub symbol_index: usize,
    /// First token in the relevant range.
    pub start_index: usize,
    /// One past the last token in the relevant range.
    pub end_index: usize,
    /// Whether the relevant symbol is quantified (`star`/`plus`), which
    /// changes how [`Builder::extend`] should fold in a new occurrence.
    pub symbol_multiple: bool,
}

/// A capability set that materializes a [`crate::forest::ParseForest`] into
/// a caller-chosen value: a tree, a count, a list of trees, or anything
/// else. See spec.md §4.5 for the full contract of each method.
pub trait Builder<T> {
    type Value: Clone;

    /// Begins assembling a rule instance.
    fn start_rule(&mut self, ctx: &BuilderContext) -> Self::Value;
    /// Finalizes a rule instance.
    fn end_rule(&mut self, ctx: &BuilderContext, prev: Self::Value) -> Self::Value;
    /// Value for a scanned token.
    fn terminal(&mut self, ctx: &BuilderContext, token: &T) -> Self::Value;
    /// The current `optional` symbol contributed nothing.
    fn skip_optional(&mut self, ctx: &BuilderContext, prev: Self::Value) -> Self::Value;
    /// Opens a quantified (`star`/`plus`) slot, once per symbol position.
    fn begin_multiple(&mut self, ctx: &BuilderContext, prev: Self::Value) -> Self::Value;
    /// Closes a quantified slot once no more occurrences are matched.
    fn end_multiple(&mut self, ctx: &BuilderContext, prev: Self::Value) -> Self::Value;
    /// Appends one contribution to the in-progress rule value.
    fn extend(&mut self, ctx: &BuilderContext, prev: Self::Value, extension: Self::Value) -> Self::Value;

    /// Shared implementation for [`Builder::merge_vertical`] and
    /// [`Builder::merge_horizontal`]; overriding this one method is usually
    /// enough since all four standard builders treat the two merges
    /// identically. The default forbids ambiguity entirely.
    fn merge(
        &mut self,
        ctx: &BuilderContext,
        values: Vec<Self::Value>,
    ) -> Result<Self::Value, ParseError<T, Self::Value>> {
        Err(ParseError::AmbiguousParse {
            start_index: ctx.start_index,
            end_index: ctx.end_index,
            candidates: values,
        })
    }

    /// Several distinct rules competed for the same non-terminal span.
    fn merge_vertical(
        &mut self,
        ctx: &BuilderContext,
        values: Vec<Self::Value>,
    ) -> Result<Self::Value, ParseError<T, Self::Value>> {
        self.merge(ctx, values)
    }

    /// Several internal derivations exist for the same rule and span.
    fn merge_horizontal(
        &mut self,
        ctx: &BuilderContext,
        values: Vec<Self::Value>,
    ) -> Result<Self::Value, ParseError<T, Self::Value>> {
        self.merge(ctx, values)
    }

    /// Value produced for a forest with no derivations at all (`parse`
    /// called with `fail_if_empty = false` over input the grammar could not
    /// derive). Most builders have an obvious "zero trees" answer; the
    /// default reports it the same as any other no-parse.
    fn empty_forest(&mut self) -> Result<Self::Value, ParseError<T, Self::Value>> {
        Err(ParseError::NoParse {
            encountered: None,
            start_index: 0,
            end_index: 0,
            terminals_tried: Vec::new(),
            expected: Vec::new(),
        })
    }
}

/// Drives `builder` over `forest` with a single stackless post-order DFS,
/// memoizing exactly one value per item regardless of how many parents
/// reference it (spec.md §4.5). Items are grouped by predecessor
/// (`source0`); within a group, competing inner derivations are folded with
/// `merge_vertical` before `extend`, and competing predecessor groups are
/// folded with `merge_horizontal`. The synthetic gamma rule's
/// `start_rule`/`extend`/`end_rule` frames are elided.
pub(crate) fn traverse<T, M, B>(
    forest: &ParseForest<T, M>,
    builder: &mut B,
) -> Result<B::Value, ParseError<T, B::Value>>
where
    T: Clone,
    B: Builder<T>,
{
    let arena = forest.arena();
    let root = forest.root();

    if arena.get(root).sources.is_none() {
        return builder.empty_forest();
    }

    let mut memo: HashMap<ItemId, B::Value> = HashMap::new();
    let mut stack: Vec<(ItemId, bool)> = vec![(root, true)];

    while let Some((id, first_time)) = stack.pop() {
        if memo.contains_key(&id) {
            continue;
        }
        let item = arena.get(id);
        match &item.sources {
            None => {
                // A predicted-but-never-advanced item: emit start_rule (and
                // end_rule, for an empty rule) with no predecessors to fold.
                let rule = forest.resolve(item.rule);
                let ctx = BuilderContext {
                    rule_head: Some(rule.head().to_string()),
                    symbol_index: 0,
                    start_index: item.start,
                    end_index: item.end,
                    symbol_multiple: false,
                };
                let mut value = builder.start_rule(&ctx);
                if item.is_complete(rule.len()) {
                    value = builder.end_rule(&ctx, value);
                }
                memo.insert(id, value);
            }
            Some(sources) => {
                if first_time {
                    stack.push((id, false));
                    for (pred, contribution) in sources.clone() {
                        stack.push((pred, true));
                        if let Some(inner) = contribution.as_item() {
                            stack.push((inner, true));
                        }
                    }
                    continue;
                }

                let is_gamma = forest.is_gamma(item.rule);
                let rule = forest.resolve(item.rule);
                let item_end = item.end;
                let item_start = item.start;
                let item_dot = item.dot;
                let item_complete = item.is_complete(rule.len());

                // Group source pairs by predecessor, preserving first-seen order.
                let mut order: Vec<ItemId> = Vec::new();
                let mut groups: HashMap<ItemId, Vec<Contribution<T>>> = HashMap::new();
                for (pred, contribution) in sources.clone() {
                    groups
                        .entry(pred)
                        .or_insert_with(|| {
                            order.push(pred);
                            Vec::new()
                        })
                        .push(contribution);
                }

                let mut group_values: Vec<B::Value> = Vec::with_capacity(order.len());
                for pred in &order {
                    let contributions = &groups[pred];
                    let pred_item = arena.get(*pred);
                    let pred_rule = forest.resolve(pred_item.rule);
                    let symbol = pred_rule
                        .symbol(pred_item.dot)
                        .expect("a predecessor always has a next symbol");
                    let symbol_multiple = symbol.multiple();

                    let mut value0 = memo
                        .get(pred)
                        .expect("predecessors are visited before their successor")
                        .clone();
                    let ctx = BuilderContext {
                        rule_head: Some(pred_rule.head().to_string()),
                        symbol_index: pred_item.dot,
                        start_index: pred_item.start,
                        end_index: pred_item.end,
                        symbol_multiple,
                    };
                    if symbol_multiple && pred_item.sub_state == 0 {
                        value0 = builder.begin_multiple(&ctx, value0);
                    }

                    let has_skip = contributions.iter().any(Contribution::is_skip);
                    let has_value = contributions.iter().any(|c| !c.is_skip());
                    debug_assert!(
                        has_skip != has_value,
                        "a predecessor group mixes skip and value contributions"
                    );

                    let value = if has_skip {
                        if symbol_multiple {
                            builder.end_multiple(&ctx, value0)
                        } else {
                            builder.skip_optional(&ctx, value0)
                        }
                    } else {
                        let merge_ctx = BuilderContext {
                            rule_head: ctx.rule_head.clone(),
                            symbol_index: ctx.symbol_index,
                            start_index: pred_item.end,
                            end_index: item_end,
                            symbol_multiple,
                        };
                        let mut values: Vec<B::Value> = Vec::with_capacity(contributions.len());
                        for contribution in contributions {
                            let v = match contribution {
                                Contribution::Item(inner) => memo
                                    .get(inner)
                                    .expect("inner derivations are visited before their successor")
                                    .clone(),
                                Contribution::Token(token) => builder.terminal(&merge_ctx, token),
                                Contribution::Skip => unreachable!("filtered out by has_value"),
                            };
                            values.push(v);
                        }
                        let merged = if values.len() == 1 {
                            values.into_iter().next().unwrap()
                        } else {
                            builder.merge_vertical(&merge_ctx, values)?
                        };
                        if is_gamma {
                            merged
                        } else {
                            builder.extend(&ctx, value0, merged)
                        }
                    };
                    group_values.push(value);
                }

                let top_ctx = BuilderContext {
                    rule_head: Some(rule.head().to_string()),
                    symbol_index: item_dot,
                    start_index: item_start,
                    end_index: item_end,
                    symbol_multiple: false,
                };
                let mut value = if group_values.len() == 1 {
                    group_values.into_iter().next().unwrap()
                } else {
                    debug_assert!(!is_gamma, "the gamma item never needs a horizontal merge");
                    builder.merge_horizontal(&top_ctx, group_values)?
                };
                if item_complete && !is_gamma {
                    value = builder.end_rule(&top_ctx, value);
                }
                memo.insert(id, value);
            }
        }
    }

    Ok(memo.remove(&root).unwrap())
}

/// Counts the number of distinct parse trees in a forest. Backed by
/// [`BigUint`] so the documented stress case (`2**1000` derivations of
/// `top -> a* ; a -> 'a' | 'a'` over 1000 tokens) does not silently wrap a
/// fixed-width integer.
pub struct CountingBuilder;

impl CountingBuilder {
    pub fn new() -> Self {
        CountingBuilder
    }
}

impl Default for CountingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Builder<T> for CountingBuilder {
    type Value = BigUint;

    fn start_rule(&mut self, _ctx: &BuilderContext) -> BigUint {
        BigUint::from(1u32)
    }
    fn end_rule(&mut self, _ctx: &BuilderContext, prev: BigUint) -> BigUint {
        prev
    }
    fn terminal(&mut self, _ctx: &BuilderContext, _token: &T) -> BigUint {
        BigUint::from(1u32)
    }
    fn skip_optional(&mut self, _ctx: &BuilderContext, prev: BigUint) -> BigUint {
        prev
    }
    fn begin_multiple(&mut self, _ctx: &BuilderContext, prev: BigUint) -> BigUint {
        prev
    }
    fn end_multiple(&mut self, _ctx: &BuilderContext, prev: BigUint) -> BigUint {
        prev
    }
    fn extend(&mut self, _ctx: &BuilderContext, prev: BigUint, extension: BigUint) -> BigUint {
        prev * extension
    }
    fn merge(
        &mut self,
        _ctx: &BuilderContext,
        values: Vec<BigUint>,
    ) -> Result<BigUint, ParseError<T, BigUint>> {
        Ok(values.into_iter().fold(BigUint::from(0u32), |acc, v| acc + v))
    }
    fn empty_forest(&mut self) -> Result<BigUint, ParseError<T, BigUint>> {
        Ok(BigUint::from(0u32))
    }
}

/// One matched contribution in a built parse tree: a token, a nested rule
/// instance, an absent `optional` symbol, or the elements matched by a
/// `star`/`plus` symbol.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<T> {
    Token(T),
    Tree(ParseTree<T>),
    None,
    Many(Vec<Value<T>>),
}

/// A single built rule instance: the matched rule's head, and one [`Value`]
/// per symbol of the rule.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseTree<T> {
    pub head: String,
    pub children: Vec<Value<T>>,
}

fn push_child<T>(value: Value<T>, child: Value<T>) -> Value<T> {
    match value {
        Value::Tree(mut tree) => {
            tree.children.push(child);
            Value::Tree(tree)
        }
        _ => unreachable!("a rule's in-progress value is always a Tree"),
    }
}

fn push_into_last_many<T>(value: Value<T>, item: Value<T>) -> Value<T> {
    match value {
        Value::Tree(mut tree) => {
            match tree.children.last_mut() {
                Some(Value::Many(list)) => list.push(item),
                _ => unreachable!("begin_multiple always precedes the first extend of a quantified symbol"),
            }
            Value::Tree(tree)
        }
        _ => unreachable!("a rule's in-progress value is always a Tree"),
    }
}

/// Builds a single parse tree, or reports [`ParseError::AmbiguousParse`]
/// (the default `merge` behavior, left un-overridden) when more than one
/// derivation exists anywhere in the forest.
pub struct SingleTreeBuilder;

impl SingleTreeBuilder {
    pub fn new() -> Self {
        SingleTreeBuilder
    }
}

impl Default for SingleTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Builder<T> for SingleTreeBuilder {
    type Value = Value<T>;

    fn start_rule(&mut self, ctx: &BuilderContext) -> Value<T> {
        Value::Tree(ParseTree {
            head: ctx.rule_head.clone().unwrap_or_default(),
            children: Vec::new(),
        })
    }
    fn end_rule(&mut self, _ctx: &BuilderContext, prev: Value<T>) -> Value<T> {
        prev
    }
    fn terminal(&mut self, _ctx: &BuilderContext, token: &T) -> Value<T> {
        Value::Token(token.clone())
    }
    fn skip_optional(&mut self, _ctx: &BuilderContext, prev: Value<T>) -> Value<T> {
        push_child(prev, Value::None)
    }
    fn begin_multiple(&mut self, _ctx: &BuilderContext, prev: Value<T>) -> Value<T> {
        push_child(prev, Value::Many(Vec::new()))
    }
    fn end_multiple(&mut self, _ctx: &BuilderContext, prev: Value<T>) -> Value<T> {
        prev
    }
    fn extend(&mut self, ctx: &BuilderContext, prev: Value<T>, extension: Value<T>) -> Value<T> {
        if ctx.symbol_multiple {
            push_into_last_many(prev, extension)
        } else {
            push_child(prev, extension)
        }
    }
}

/// Wraps another builder, turning each of its slots into a list so that
/// every possible parse is produced rather than just one.
pub struct ListBuilder<U> {
    underlying: U,
}

/// Takes a builder that has no `merge_vertical`/`merge_horizontal` of its
/// own and returns one that accumulates every built value into a list.
pub fn make_list_builder<U>(underlying: U) -> ListBuilder<U> {
    ListBuilder { underlying }
}

impl<T, U> Builder<T> for ListBuilder<U>
where
    U: Builder<T>,
{
    type Value = Vec<U::Value>;

    fn start_rule(&mut self, ctx: &BuilderContext) -> Vec<U::Value> {
        vec![self.underlying.start_rule(ctx)]
    }
    fn end_rule(&mut self, ctx: &BuilderContext, prev: Vec<U::Value>) -> Vec<U::Value> {
        prev.into_iter().map(|v| self.underlying.end_rule(ctx, v)).collect()
    }
    fn terminal(&mut self, ctx: &BuilderContext, token: &T) -> Vec<U::Value> {
        vec![self.underlying.terminal(ctx, token)]
    }
    fn skip_optional(&mut self, ctx: &BuilderContext, prev: Vec<U::Value>) -> Vec<U::Value> {
        prev.into_iter().map(|v| self.underlying.skip_optional(ctx, v)).collect()
    }
    fn begin_multiple(&mut self, ctx: &BuilderContext, prev: Vec<U::Value>) -> Vec<U::Value> {
        prev.into_iter().map(|v| self.underlying.begin_multiple(ctx, v)).collect()
    }
    fn end_multiple(&mut self, ctx: &BuilderContext, prev: Vec<U::Value>) -> Vec<U::Value> {
        prev.into_iter().map(|v| self.underlying.end_multiple(ctx, v)).collect()
    }
    fn extend(&mut self, ctx: &BuilderContext, prev: Vec<U::Value>, extension: Vec<U::Value>) -> Vec<U::Value> {
        let mut out = Vec::with_capacity(prev.len() * extension.len().max(1));
        for p in &prev {
            for e in &extension {
                out.push(self.underlying.extend(ctx, p.clone(), e.clone()));
            }
        }
        out
    }
    fn merge(
        &mut self,
        _ctx: &BuilderContext,
        values: Vec<Vec<U::Value>>,
    ) -> Result<Vec<U::Value>, ParseError<T, Vec<U::Value>>> {
        Ok(values.into_iter().flatten().collect())
    }
    fn empty_forest(&mut self) -> Result<Vec<U::Value>, ParseError<T, Vec<U::Value>>> {
        Ok(Vec::new())
    }
}

/// A lazily-forced cons-list cell: either empty, or one value plus a
/// [`Thunk`] for the rest.
pub enum LazyList<V> {
    Nil,
    Cons(V, Thunk<V>),
}

enum ThunkBody<V> {
    Direct(Box<dyn Fn() -> LazyList<V>>),
    Bind(Thunk<V>, Rc<dyn Fn(LazyList<V>) -> Thunk<V>>),
}

/// A deferred computation producing a [`LazyList`] cell. `force` resolves a
/// chain of `bind`s with an explicit loop rather than host recursion, so an
/// arbitrarily long chain (one `bind` per forest edge traversed) never grows
/// the call stack (spec.md §9's trampoline requirement).
pub struct Thunk<V>(Rc<ThunkBody<V>>);

impl<V> Clone for Thunk<V> {
    fn clone(&self) -> Self {
        Thunk(self.0.clone())
    }
}

impl<V: 'static> Thunk<V> {
    pub fn direct(f: impl Fn() -> LazyList<V> + 'static) -> Self {
        Thunk(Rc::new(ThunkBody::Direct(Box::new(f))))
    }

    fn bind(t: Thunk<V>, f: impl Fn(LazyList<V>) -> Thunk<V> + 'static) -> Self {
        Thunk(Rc::new(ThunkBody::Bind(t, Rc::new(f))))
    }

    pub fn force(&self) -> LazyList<V> {
        let mut thens: Vec<Rc<dyn Fn(LazyList<V>) -> Thunk<V>>> = Vec::new();
        let mut current = self.clone();
        loop {
            match &*current.0 {
                ThunkBody::Bind(inner, then) => {
                    thens.push(then.clone());
                    current = inner.clone();
                }
                ThunkBody::Direct(f) => {
                    let produced = f();
                    match thens.pop() {
                        Some(then) => current = then(produced),
                        None => return produced,
                    }
                }
            }
        }
    }
}

fn thunk_single<V: Clone + 'static>(v: V) -> Thunk<V> {
    Thunk::direct(move || LazyList::Cons(v.clone(), Thunk::direct(|| LazyList::Nil)))
}

fn thunk_map<V: Clone + 'static>(t: Thunk<V>, f: Rc<dyn Fn(V) -> V>) -> Thunk<V> {
    Thunk::bind(t, move |list| {
        let f = f.clone();
        match list {
            LazyList::Nil => Thunk::direct(|| LazyList::Nil),
            LazyList::Cons(head, tail) => {
                let value = f(head);
                Thunk::direct(move || LazyList::Cons(value.clone(), thunk_map(tail.clone(), f.clone())))
            }
        }
    })
}

fn thunk_concat<V: Clone + 'static>(a: Thunk<V>, b: Thunk<V>) -> Thunk<V> {
    Thunk::bind(a, move |list| {
        let b = b.clone();
        match list {
            LazyList::Nil => b,
            LazyList::Cons(head, tail) => {
                Thunk::direct(move || LazyList::Cons(head.clone(), thunk_concat(tail.clone(), b.clone())))
            }
        }
    })
}

fn thunk_cross<V: Clone + 'static>(it1: Thunk<V>, it2: Thunk<V>, f: Rc<dyn Fn(V, V) -> V>) -> Thunk<V> {
    Thunk::bind(it1, move |list1| {
        let it2 = it2.clone();
        let f = f.clone();
        match list1 {
            LazyList::Nil => Thunk::direct(|| LazyList::Nil),
            LazyList::Cons(v1, tail1) => {
                let mapped_it2 = {
                    let f = f.clone();
                    let v1 = v1.clone();
                    thunk_map(it2.clone(), Rc::new(move |v2| f(v1.clone(), v2)))
                };
                thunk_concat(mapped_it2, thunk_cross(tail1, it2, f))
            }
        }
    })
}

fn thunk_concat_all<V: Clone + 'static>(values: Vec<Thunk<V>>) -> Thunk<V> {
    let mut acc = Thunk::direct(|| LazyList::Nil);
    for t in values.into_iter().rev() {
        acc = thunk_concat(t, acc);
    }
    acc
}

/// Returns the same shape of values as `underlying`, but lazily: a
/// [`Thunk`]-backed cons-list instead of a materialized `Vec`, so a forest
/// with astronomically many trees can be streamed one at a time (spec.md
/// §4.5's "Iterator (lazy)" builder).
pub struct IterBuilder<U> {
    underlying: Rc<RefCell<U>>,
}

/// Takes a builder that has no `merge_vertical`/`merge_horizontal` of its
/// own and returns one that accumulates every built value into a lazy,
/// stackless iterator.
pub fn make_iter_builder<U>(underlying: U) -> IterBuilder<U> {
    IterBuilder {
        underlying: Rc::new(RefCell::new(underlying)),
    }
}

impl<T, U> Builder<T> for IterBuilder<U>
where
    T: 'static,
    U: Builder<T> + 'static,
{
    type Value = Thunk<U::Value>;

    fn start_rule(&mut self, ctx: &BuilderContext) -> Thunk<U::Value> {
        thunk_single(self.underlying.borrow_mut().start_rule(ctx))
    }
    fn end_rule(&mut self, ctx: &BuilderContext, prev: Thunk<U::Value>) -> Thunk<U::Value> {
        let ctx = ctx.clone();
        let underlying = self.underlying.clone();
        thunk_map(prev, Rc::new(move |v| underlying.borrow_mut().end_rule(&ctx, v)))
    }
    fn terminal(&mut self, ctx: &BuilderContext, token: &T) -> Thunk<U::Value> {
        thunk_single(self.underlying.borrow_mut().terminal(ctx, token))
    }
    fn skip_optional(&mut self, ctx: &BuilderContext, prev: Thunk<U::Value>) -> Thunk<U::Value> {
        let ctx = ctx.clone();
        let underlying = self.underlying.clone();
        thunk_map(prev, Rc::new(move |v| underlying.borrow_mut().skip_optional(&ctx, v)))
    }
    fn begin_multiple(&mut self, ctx: &BuilderContext, prev: Thunk<U::Value>) -> Thunk<U::Value> {
        let ctx = ctx.clone();
        let underlying = self.underlying.clone();
        thunk_map(prev, Rc::new(move |v| underlying.borrow_mut().begin_multiple(&ctx, v)))
    }
    fn end_multiple(&mut self, ctx: &BuilderContext, prev: Thunk<U::Value>) -> Thunk<U::Value> {
        let ctx = ctx.clone();
        let underlying = self.underlying.clone();
        thunk_map(prev, Rc::new(move |v| underlying.borrow_mut().end_multiple(&ctx, v)))
    }
    fn extend(&mut self, ctx: &BuilderContext, prev: Thunk<U::Value>, extension: Thunk<U::Value>) -> Thunk<U::Value> {
        let ctx = ctx.clone();
        let underlying = self.underlying.clone();
        thunk_cross(
            prev,
            extension,
            Rc::new(move |a, b| underlying.borrow_mut().extend(&ctx, a, b)),
        )
    }
    fn merge(
        &mut self,
        _ctx: &BuilderContext,
        values: Vec<Thunk<U::Value>>,
    ) -> Result<Thunk<U::Value>, ParseError<T, Thunk<U::Value>>> {
        Ok(thunk_concat_all(values))
    }
    fn empty_forest(&mut self) -> Result<Thunk<U::Value>, ParseError<T, Thunk<U::Value>>> {
        Ok(Thunk::direct(|| LazyList::Nil))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parse;
    use crate::grammar::{ParseRule, RuleSet};
    use crate::symbol::Symbol;

    #[test]
    fn single_tree_matches_expected_shape() {
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new("top", vec![Symbol::terminal('a')]))
            .unwrap();
        let forest = parse(&rules, "top", &['a']).unwrap();
        let tree = forest.single().unwrap();
        match tree {
            Value::Tree(t) => {
                assert_eq!(t.head, "top");
                assert_eq!(t.children, vec![Value::Token('a')]);
            }
            other => panic!("expected a Tree, got {:?}", other),
        }
    }

    #[test]
    fn optional_skip_records_none() {
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new("top", vec![Symbol::terminal('a').optional()]))
            .unwrap();
        let forest = parse(&rules, "top", &[]).unwrap();
        let tree = forest.single().unwrap();
        match tree {
            Value::Tree(t) => assert_eq!(t.children, vec![Value::None]),
            other => panic!("expected a Tree, got {:?}", other),
        }
    }

    #[test]
    fn star_collects_repeated_matches_into_many() {
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new("top", vec![Symbol::terminal('a').star()]))
            .unwrap();
        let forest = parse(&rules, "top", &['a', 'a', 'a']).unwrap();
        let tree = forest.single().unwrap();
        match tree {
            Value::Tree(t) => match &t.children[0] {
                Value::Many(items) => assert_eq!(items.len(), 3),
                other => panic!("expected Many, got {:?}", other),
            },
            other => panic!("expected a Tree, got {:?}", other),
        }
    }

    #[test]
    fn list_builder_enumerates_every_tree() {
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
        let trees = forest.all().unwrap();
        assert_eq!(trees.len(), 2);
    }

    #[test]
    fn iter_builder_yields_the_same_count_as_list_builder() {
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
        let count = forest.iter().unwrap().count();
        assert_eq!(count, 2);
    }

    #[test]
    fn competing_rules_for_same_span_trigger_merge_vertical() {
        // top -> inner; inner -> 'a' | 'a'. Both `inner` rules complete over
        // the same span and extend the same (single) predecessor, so the
        // traversal must fold them with `merge_vertical`, not
        // `merge_horizontal` (there is only one predecessor group here).
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new("top", vec![Symbol::non_terminal("inner")]))
            .unwrap();
        rules
            .add(ParseRule::new("inner", vec![Symbol::terminal('a')]))
            .unwrap();
        rules
            .add(ParseRule::new("inner", vec![Symbol::terminal('a')]))
            .unwrap();
        let forest = parse(&rules, "top", &['a']).unwrap();
        assert_eq!(forest.count().unwrap(), BigUint::from(2u32));
        match forest.single() {
            Err(ParseError::AmbiguousParse { candidates, .. }) => assert_eq!(candidates.len(), 2),
            other => panic!("expected AmbiguousParse, got {:?}", other),
        }
    }

    #[test]
    fn counting_builder_matches_list_length() {
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new("top", vec![Symbol::terminal('a').star()]))
            .unwrap();
        rules
            .add(ParseRule::new("a", vec![Symbol::terminal('a')]))
            .unwrap();
        let forest = parse(&rules, "top", &['a', 'a']).unwrap();
        let count = forest.count().unwrap();
        let all = forest.all().unwrap();
        assert_eq!(count, BigUint::from(all.len()));
    }
}
