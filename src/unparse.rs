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

//! Flattens a built [`Value`] tree back into the token sequence it was
//! parsed from (spec.md §6).

use crate::builder::Value;

/// Collects every token in `value`, in left-to-right order. `Value::None`
/// (a skipped `optional`) contributes nothing; a `Value::Many` contributes
/// each of its elements in turn.
///
/// For a tree built from the exact input a parse consumed, `unparse(&tree)`
/// reproduces that input; the function itself has no notion of "the
/// original input" and will happily flatten any tree a [`Builder`] built,
/// including ones stitched together from unrelated trees.
///
/// [`Builder`]: crate::builder::Builder
pub fn unparse<T: Clone>(value: &Value<T>) -> Vec<T> {
    let mut out = Vec::new();
    unparse_rec(value, &mut out);
    out
}

fn unparse_rec<T: Clone>(value: &Value<T>, out: &mut Vec<T>) {
    match value {
        Value::None => {}
        Value::Token(token) => out.push(token.clone()),
        Value::Many(items) => {
            for item in items {
                unparse_rec(item, out);
            }
        }
        Value::Tree(tree) => {
            for child in &tree.children {
                unparse_rec(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parse;
    use crate::grammar::{ParseRule, RuleSet};
    use crate::symbol::Symbol;

    #[test]
    fn unparse_reproduces_a_flat_sequence() {
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "top",
                vec![Symbol::terminal('a'), Symbol::terminal('b')],
            ))
            .unwrap();
        let forest = parse(&rules, "top", &['a', 'b']).unwrap();
        let tree = forest.single().unwrap();
        assert_eq!(unparse(&tree), vec!['a', 'b']);
    }

    #[test]
    fn unparse_skips_absent_optionals_and_flattens_repeats() {
        let mut rules: RuleSet<char> = RuleSet::new();
        rules
            .add(ParseRule::new(
                "top",
                vec![
                    Symbol::terminal('x').optional(),
                    Symbol::terminal('a').star(),
                ],
            ))
            .unwrap();
        let forest = parse(&rules, "top", &['a', 'a', 'a']).unwrap();
        let tree = forest.single().unwrap();
        assert_eq!(unparse(&tree), vec!['a', 'a', 'a']);
    }
}
