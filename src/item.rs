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

//! Partial (Earley) items: the forest's node type, and the per-column
//! canonicalization arena that deduplicates them by key while merging
//! provenance.

use std::collections::HashMap;

use crate::grammar::RuleId;
use crate::symbol::Symbol;

/// Handle into an [`ItemArena`]. Small and `Copy`, so the forest is a graph
/// of integer handles rather than a graph of owned nodes.
pub type ItemId = usize;

/// One way a [`PartialItem`] was reached: by completing a predecessor with
/// an inner non-terminal derivation, by scanning a token, or by skipping a
/// symbol that allows zero occurrences.
#[derive(Clone, Debug)]
pub enum Contribution<T> {
    Item(ItemId),
    Token(T),
    Skip,
}

impl<T> Contribution<T> {
    pub fn is_skip(&self) -> bool {
        matches!(self, Contribution::Skip)
    }

    pub fn as_item(&self) -> Option<ItemId> {
        match self {
            Contribution::Item(id) => Some(*id),
            _ => None,
        }
    }
}

/// A canonical Earley item, keyed by `(rule, dot, sub_state, start, end)`.
///
/// `sources` is `None` for a freshly predicted item that has not yet been
/// reached by any completion/scan/skip (the "absent" state from the data
/// model); it is `Some(edges)` — possibly empty after post-processing has
/// trimmed every edge — for everything else. `dests` is populated by forest
/// post-processing's reverse-edge pass and is empty beforehand.
#[derive(Clone, Debug)]
pub struct PartialItem<T> {
    pub rule: RuleId,
    pub dot: usize,
    pub sub_state: usize,
    pub start: usize,
    pub end: usize,
    pub sources: Option<Vec<(ItemId, Contribution<T>)>>,
    pub dests: Vec<(ItemId, Contribution<T>)>,
}

impl<T> PartialItem<T> {
    pub fn is_complete(&self, rule_len: usize) -> bool {
        self.dot >= rule_len
    }
}

type ItemKey = (RuleId, usize, usize, usize, usize);

/// Per-parse canonicalization table: interns items by key, merging new
/// provenance edges into an existing item rather than creating a duplicate.
#[derive(Default)]
pub struct ItemArena<T> {
    items: Vec<PartialItem<T>>,
    index: HashMap<ItemKey, ItemId>,
}

impl<T> ItemArena<T> {
    pub fn new() -> Self {
        ItemArena {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn get(&self, id: ItemId) -> &PartialItem<T> {
        &self.items[id]
    }

    pub fn get_mut(&mut self, id: ItemId) -> &mut PartialItem<T> {
        &mut self.items[id]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Interns the predicted (dot=0, sub_state=0) item for `rule` at `start`.
    /// Returns the canonical id and whether this call created it.
    pub fn intern_initial(&mut self, rule: RuleId, start: usize) -> (ItemId, bool) {
        let key = (rule, 0, 0, start, start);
        if let Some(&id) = self.index.get(&key) {
            return (id, false);
        }
        let id = self.items.len();
        self.items.push(PartialItem {
            rule,
            dot: 0,
            sub_state: 0,
            start,
            end: start,
            sources: None,
            dests: Vec::new(),
        });
        self.index.insert(key, id);
        (id, true)
    }

    /// Interns a derived item, produced by extending or skipping a
    /// predecessor. If the key already has a canonical item, `source` is
    /// merged into its edge set and no new item is created. Returns the
    /// canonical id and whether this call created it.
    pub fn intern_derived(
        &mut self,
        rule: RuleId,
        dot: usize,
        sub_state: usize,
        start: usize,
        end: usize,
        source: (ItemId, Contribution<T>),
    ) -> (ItemId, bool) {
        let key = (rule, dot, sub_state, start, end);
        if let Some(&id) = self.index.get(&key) {
            self.items[id]
                .sources
                .get_or_insert_with(Vec::new)
                .push(source);
            return (id, false);
        }
        let id = self.items.len();
        self.items.push(PartialItem {
            rule,
            dot,
            sub_state,
            start,
            end,
            sources: Some(vec![source]),
            dests: Vec::new(),
        });
        self.index.insert(key, id);
        (id, true)
    }
}

/// `sub_state` a successor has after matching one more occurrence of a
/// `multiple` symbol (`star`/`plus`). Both quantifiers clamp to 1 after the
/// first match, since only the *presence* of a repetition, not its count,
/// needs to be distinguished once `min_occurs` has been satisfied.
pub(crate) fn next_sub_state<M>(current: usize, symbol: &Symbol<M>) -> usize {
    debug_assert!(symbol.multiple());
    let cap = symbol.min_occurs().max(1);
    (current + 1).min(cap)
}

/// Whether `skip()` is admissible for an item whose next symbol is `symbol`
/// and whose current sub_state is `sub_state`.
pub(crate) fn skip_admissible<M>(symbol: &Symbol<M>, sub_state: usize) -> bool {
    symbol.is_optional() || (symbol.multiple() && sub_state >= symbol.min_occurs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_items_are_canonicalized() {
        let mut arena: ItemArena<char> = ItemArena::new();
        let (a, new_a) = arena.intern_initial(0, 3);
        let (b, new_b) = arena.intern_initial(0, 3);
        assert!(new_a);
        assert!(!new_b);
        assert_eq!(a, b);
        assert!(arena.get(a).sources.is_none());
    }

    #[test]
    fn derived_items_merge_sources_on_duplicate_key() {
        let mut arena: ItemArena<char> = ItemArena::new();
        let (seed, _) = arena.intern_initial(0, 0);
        let (first, is_new) =
            arena.intern_derived(0, 1, 0, 0, 1, (seed, Contribution::Token('a')));
        assert!(is_new);
        let (second, is_new2) =
            arena.intern_derived(0, 1, 0, 0, 1, (seed, Contribution::Skip));
        assert!(!is_new2);
        assert_eq!(first, second);
        assert_eq!(arena.get(first).sources.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn star_and_plus_clamp_sub_state_to_one() {
        let star: Symbol<char> = Symbol::terminal('a').star();
        let plus: Symbol<char> = Symbol::terminal('a').plus();
        assert_eq!(next_sub_state(0, &star), 1);
        assert_eq!(next_sub_state(1, &star), 1);
        assert_eq!(next_sub_state(0, &plus), 1);
        assert_eq!(next_sub_state(1, &plus), 1);
    }

    #[test]
    fn skip_requires_optional_or_satisfied_multiple() {
        let optional: Symbol<char> = Symbol::terminal('a').optional();
        let plus: Symbol<char> = Symbol::terminal('a').plus();
        let exactly_one: Symbol<char> = Symbol::terminal('a');
        assert!(skip_admissible(&optional, 0));
        assert!(!skip_admissible(&plus, 0));
        assert!(skip_admissible(&plus, 1));
        assert!(!skip_admissible(&exactly_one, 0));
    }
}
