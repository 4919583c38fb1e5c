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

//! Symbols: the terminal/non-terminal positions that make up a rule, plus the
//! quantifier and preference flags attached to each.

use crate::grammar::GrammarError;

/// How many times a symbol may occur within a single rule instance.
///
/// `min_occurs` and `multiple` (used throughout the engine) are derived from
/// this rather than stored separately, so the two can never disagree.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Quantifier {
    ExactlyOne,
    Optional,
    Star,
    Plus,
}

impl Quantifier {
    pub fn min_occurs(self) -> usize {
        match self {
            Quantifier::ExactlyOne | Quantifier::Plus => 1,
            Quantifier::Optional | Quantifier::Star => 0,
        }
    }

    pub fn multiple(self) -> bool {
        matches!(self, Quantifier::Star | Quantifier::Plus)
    }

    pub fn is_optional(self) -> bool {
        matches!(self, Quantifier::Optional | Quantifier::Star)
    }
}

/// Preference between matching more (`Greedy`) or fewer (`Lazy`) repetitions
/// of a quantified symbol, when both are derivable from the same input.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QuantifierPreference {
    None,
    Greedy,
    Lazy,
}

/// Preference between competing rules for the same non-terminal head,
/// keyed by the rule's insertion-order `priority`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HeadPreference {
    None,
    PreferEarly,
    PreferLate,
}

/// Decides whether a terminal symbol accepts a given token.
///
/// Blanket-implemented for any `T: PartialEq`, so matching an exact token
/// never requires a dedicated matcher type; richer token models (ranges,
/// predicates) implement this directly.
pub trait Matcher<T> {
    fn matches(&self, token: &T) -> bool;
}

impl<T: PartialEq> Matcher<T> for T {
    fn matches(&self, token: &T) -> bool {
        self == token
    }
}

#[derive(Clone, Debug)]
pub(crate) enum SymbolKind<M> {
    Terminal(M),
    NonTerminal(String),
}

/// One position within a rule: either a terminal (with its matcher) or a
/// non-terminal (by head name), carrying a quantifier and the two
/// disambiguation hints.
#[derive(Clone, Debug)]
pub struct Symbol<M> {
    pub(crate) kind: SymbolKind<M>,
    pub(crate) quantifier: Quantifier,
    pub(crate) quantifier_pref: QuantifierPreference,
    pub(crate) head_pref: HeadPreference,
    pub(crate) name: Option<String>,
}

impl<M> Symbol<M> {
    /// A terminal matching tokens accepted by `matcher`.
    pub fn terminal(matcher: M) -> Self {
        Symbol {
            kind: SymbolKind::Terminal(matcher),
            quantifier: Quantifier::ExactlyOne,
            quantifier_pref: QuantifierPreference::None,
            head_pref: HeadPreference::None,
            name: None,
        }
    }

    /// A non-terminal referring to `head` by name.
    pub fn non_terminal(head: impl Into<String>) -> Self {
        Symbol {
            kind: SymbolKind::NonTerminal(head.into()),
            quantifier: Quantifier::ExactlyOne,
            quantifier_pref: QuantifierPreference::None,
            head_pref: HeadPreference::None,
            name: None,
        }
    }

    /// Attaches a human-readable name, used only for error messages (a
    /// terminal otherwise has no printable identity of its own).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.quantifier = Quantifier::Optional;
        self
    }

    pub fn star(mut self) -> Self {
        self.quantifier = Quantifier::Star;
        self
    }

    pub fn plus(mut self) -> Self {
        self.quantifier = Quantifier::Plus;
        self
    }

    pub fn greedy(mut self) -> Self {
        self.quantifier_pref = QuantifierPreference::Greedy;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.quantifier_pref = QuantifierPreference::Lazy;
        self
    }

    pub fn prefer_early(mut self) -> Self {
        self.head_pref = HeadPreference::PreferEarly;
        self
    }

    pub fn prefer_late(mut self) -> Self {
        self.head_pref = HeadPreference::PreferLate;
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, SymbolKind::Terminal(_))
    }

    /// The name given via [`Symbol::named`], falling back to the head name
    /// for non-terminals or to `"<terminal>"` for an unnamed terminal.
    pub fn display_name(&self) -> &str {
        if let Some(name) = &self.name {
            return name;
        }
        match &self.kind {
            SymbolKind::NonTerminal(h) => h.as_str(),
            SymbolKind::Terminal(_) => "<terminal>",
        }
    }

    pub fn head(&self) -> Option<&str> {
        match &self.kind {
            SymbolKind::NonTerminal(h) => Some(h.as_str()),
            SymbolKind::Terminal(_) => None,
        }
    }

    pub fn min_occurs(&self) -> usize {
        self.quantifier.min_occurs()
    }

    pub fn multiple(&self) -> bool {
        self.quantifier.multiple()
    }

    pub fn is_optional(&self) -> bool {
        self.quantifier.is_optional()
    }

    pub fn quantifier(&self) -> Quantifier {
        self.quantifier
    }

    pub fn quantifier_preference(&self) -> QuantifierPreference {
        self.quantifier_pref
    }

    pub fn head_preference(&self) -> HeadPreference {
        self.head_pref
    }

    /// Checks a terminal symbol's matcher against a token. Panics if called
    /// on a non-terminal symbol; callers branch on [`Symbol::is_terminal`]
    /// first, as the engine does.
    pub(crate) fn matches<T>(&self, token: &T) -> bool
    where
        M: Matcher<T>,
    {
        match &self.kind {
            SymbolKind::Terminal(m) => m.matches(token),
            SymbolKind::NonTerminal(_) => {
                unreachable!("matches() called on a non-terminal symbol")
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), GrammarError> {
        if self.quantifier_pref != QuantifierPreference::None
            && self.quantifier == Quantifier::ExactlyOne
        {
            return Err(GrammarError::GreedyLazyWithoutQuantifier);
        }
        if self.head_pref != HeadPreference::None && self.is_terminal() {
            return Err(GrammarError::PreferenceOnTerminal);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_properties_match_quantifier() {
        assert_eq!(Quantifier::ExactlyOne.min_occurs(), 1);
        assert!(!Quantifier::ExactlyOne.multiple());
        assert_eq!(Quantifier::Optional.min_occurs(), 0);
        assert!(!Quantifier::Optional.multiple());
        assert_eq!(Quantifier::Star.min_occurs(), 0);
        assert!(Quantifier::Star.multiple());
        assert_eq!(Quantifier::Plus.min_occurs(), 1);
        assert!(Quantifier::Plus.multiple());
    }

    #[test]
    fn blanket_matcher_is_equality() {
        assert!('a'.matches(&'a'));
        assert!(!'a'.matches(&'b'));
    }

    #[test]
    fn greedy_without_quantifier_is_rejected() {
        let s: Symbol<char> = Symbol::terminal('a').greedy();
        assert!(matches!(
            s.validate(),
            Err(GrammarError::GreedyLazyWithoutQuantifier)
        ));
    }

    #[test]
    fn preference_on_terminal_is_rejected() {
        let s: Symbol<char> = Symbol::terminal('a').prefer_early();
        assert!(matches!(
            s.validate(),
            Err(GrammarError::PreferenceOnTerminal)
        ));
    }

    #[test]
    fn star_with_greedy_is_valid() {
        let s: Symbol<char> = Symbol::terminal('a').star().greedy();
        assert!(s.validate().is_ok());
    }
}
