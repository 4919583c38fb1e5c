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

//! A chart parser for ambiguous context-free grammars.
//!
//! Parsing a token sequence against a [`RuleSet`] produces a [`ParseForest`]:
//! a DAG of canonical partial items that shares every sub-derivation common
//! to two or more ambiguous parses. The forest can be queried directly
//! (`single`, `all`, `count`, lazy iteration) or walked with a custom
//! [`Builder`] to materialize results in whatever shape a caller needs.
//!
//! ```
//! use parsegrove::{parse, ParseRule, RuleSet, Symbol};
//!
//! let mut rules: RuleSet<char> = RuleSet::new();
//! rules.add(ParseRule::new("top", vec![Symbol::terminal('a')])).unwrap();
//!
//! let forest = parse(&rules, "top", &['a']).unwrap();
//! assert_eq!(forest.count().unwrap(), num_bigint::BigUint::from(1u32));
//! ```

mod builder;
mod engine;
mod error;
mod forest;
mod grammar;
mod item;
mod symbol;
mod unparse;

pub use builder::{
    make_iter_builder, make_list_builder, Builder, BuilderContext, CountingBuilder, LazyList,
    ListBuilder, ParseTree, SingleTreeBuilder, Thunk, Value,
};
pub use engine::{parse, parse_opts};
pub use error::ParseError;
pub use forest::{ForestIter, ParseForest};
pub use grammar::{GrammarError, ParseRule, RuleId, RuleSet};
pub use symbol::{HeadPreference, Matcher, Quantifier, QuantifierPreference, Symbol};
pub use unparse::unparse;
