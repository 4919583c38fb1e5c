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

//! A custom builder, run over a tiny arithmetic grammar, that turns the
//! forest into an s-expression-shaped value instead of the stock
//! [`parsegrove::Value`] tree. Demonstrates that [`parsegrove::Builder`] is a
//! capability set any caller can implement from scratch, not just a tag the
//! standard builders carry.

use std::fmt;

use parsegrove::{parse, Builder, BuilderContext, ParseError, ParseRule, RuleSet, Symbol};

/// `(+ (+ 1 2) 3)`-style nested list, built directly by [`SexprBuilder`]
/// rather than converted from a [`parsegrove::Value`] after the fact.
#[derive(Clone, Debug, PartialEq)]
enum Sexpr {
    Atom(char),
    Tag(String),
    Absent,
    List(Vec<Sexpr>),
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Atom(c) => write!(f, "{}", c),
            Sexpr::Tag(name) => write!(f, "{}", name),
            Sexpr::Absent => write!(f, "_"),
            Sexpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn push(value: Sexpr, child: Sexpr) -> Sexpr {
    match value {
        Sexpr::List(mut items) => {
            items.push(child);
            Sexpr::List(items)
        }
        other => other,
    }
}

fn push_into_last_list(value: Sexpr, child: Sexpr) -> Sexpr {
    match value {
        Sexpr::List(mut items) => {
            match items.last_mut() {
                Some(Sexpr::List(inner)) => inner.push(child),
                _ => unreachable!("begin_multiple always precedes the first extend"),
            }
            Sexpr::List(items)
        }
        other => other,
    }
}

/// A [`Builder`] that tags every rule instance with its head name, the way
/// a hand-written s-expression emitter over this forest would.
struct SexprBuilder;

impl Builder<char> for SexprBuilder {
    type Value = Sexpr;

    fn start_rule(&mut self, ctx: &BuilderContext) -> Sexpr {
        Sexpr::List(vec![Sexpr::Tag(ctx.rule_head.clone().unwrap_or_default())])
    }

    fn end_rule(&mut self, _ctx: &BuilderContext, prev: Sexpr) -> Sexpr {
        prev
    }

    fn terminal(&mut self, _ctx: &BuilderContext, token: &char) -> Sexpr {
        Sexpr::Atom(*token)
    }

    fn skip_optional(&mut self, _ctx: &BuilderContext, prev: Sexpr) -> Sexpr {
        push(prev, Sexpr::Absent)
    }

    fn begin_multiple(&mut self, _ctx: &BuilderContext, prev: Sexpr) -> Sexpr {
        push(prev, Sexpr::List(Vec::new()))
    }

    fn end_multiple(&mut self, _ctx: &BuilderContext, prev: Sexpr) -> Sexpr {
        prev
    }

    fn extend(&mut self, ctx: &BuilderContext, prev: Sexpr, extension: Sexpr) -> Sexpr {
        if ctx.symbol_multiple {
            push_into_last_list(prev, extension)
        } else {
            push(prev, extension)
        }
    }

    fn merge(
        &mut self,
        _ctx: &BuilderContext,
        values: Vec<Sexpr>,
    ) -> Result<Sexpr, ParseError<char, Sexpr>> {
        let mut items = vec![Sexpr::Tag("or".to_string())];
        items.extend(values);
        Ok(Sexpr::List(items))
    }
}

/// `sum -> sum '+' sum | 'a'`. Genuinely ambiguous: `a+a+a` associates either
/// left or right, and the rendered s-expression shows both under one `or`.
fn grammar() -> RuleSet<char> {
    let mut rules = RuleSet::new();
    rules
        .add(ParseRule::new(
            "sum",
            vec![
                Symbol::non_terminal("sum"),
                Symbol::terminal('+'),
                Symbol::non_terminal("sum"),
            ],
        ))
        .unwrap();
    rules
        .add(ParseRule::new("sum", vec![Symbol::terminal('a')]))
        .unwrap();
    rules
}

fn main() {
    let rules = grammar();
    let tokens: Vec<char> = "a+a+a".chars().collect();
    let forest = parse(&rules, "sum", &tokens).expect("grammar accepts a+a+a");
    println!("{} tree(s) in the forest", forest.count().unwrap());
    let mut builder = SexprBuilder;
    let rendered = forest.apply(&mut builder).expect("merge never fails in this builder");
    println!("{}", rendered);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_both_associations_under_an_or_tag() {
        let rules = grammar();
        let tokens: Vec<char> = "a+a+a".chars().collect();
        let forest = parse(&rules, "sum", &tokens).unwrap();
        let mut builder = SexprBuilder;
        let rendered = forest.apply(&mut builder).unwrap();
        match rendered {
            Sexpr::List(items) => assert_eq!(items[0], Sexpr::Tag("or".to_string())),
            other => panic!("expected a merged or-list, got {:?}", other),
        }
    }
}
