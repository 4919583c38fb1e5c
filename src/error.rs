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

//! The error taxonomy: grammar construction failures and the three ways a
//! parse itself can fail.

use std::fmt;

use crate::grammar::GrammarError;

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            GrammarError::EmptyHead => "rule head name must not be empty",
            GrammarError::GreedyLazyWithoutQuantifier => {
                "greedy/lazy requires a star, plus, or optional quantifier"
            }
            GrammarError::PreferenceOnTerminal => {
                "prefer_early/prefer_late only apply to non-terminal symbols"
            }
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for GrammarError {}

/// Everything a parse attempt can fail with: the three kinds from the error
/// model, plus grammar construction errors folded in so callers can use a
/// single `Result` type end to end.
#[derive(Debug)]
pub enum ParseError<T, V = std::convert::Infallible> {
    /// No item could advance past `start_index..end_index` and the start
    /// symbol was never fully derived.
    NoParse {
        /// `None` means end of input was reached.
        encountered: Option<T>,
        start_index: usize,
        end_index: usize,
        /// Names of the terminal symbols the engine tried at this position.
        terminals_tried: Vec<String>,
        /// Expected symbol names after unfolding anonymous heads.
        expected: Vec<String>,
    },
    /// A builder that forbids ambiguity was asked to merge more than one
    /// candidate derivation.
    AmbiguousParse {
        start_index: usize,
        end_index: usize,
        candidates: Vec<V>,
    },
    /// Forest post-processing found a cycle (a strongly connected component)
    /// reachable from the root.
    InfiniteParse {
        message: String,
        start_index: usize,
        end_index: usize,
    },
    /// A grammar construction error surfaced while building the rule set
    /// passed to `parse`.
    Grammar(GrammarError),
}

impl<T: fmt::Debug, V: fmt::Debug> fmt::Display for ParseError<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::NoParse {
                encountered,
                start_index,
                end_index,
                expected,
                ..
            } => match encountered {
                Some(token) => write!(
                    f,
                    "no parse at {}..{}: unexpected {:?}, expected one of {:?}",
                    start_index, end_index, token, expected
                ),
                None => write!(
                    f,
                    "no parse at {}..{}: unexpected end of input, expected one of {:?}",
                    start_index, end_index, expected
                ),
            },
            ParseError::AmbiguousParse {
                start_index,
                end_index,
                candidates,
            } => write!(
                f,
                "ambiguous parse at {}..{}: {} competing derivations",
                start_index,
                end_index,
                candidates.len()
            ),
            ParseError::InfiniteParse {
                message,
                start_index,
                end_index,
            } => write!(f, "infinite parse at {}..{}: {}", start_index, end_index, message),
            ParseError::Grammar(e) => write!(f, "{}", e),
        }
    }
}

impl<T: fmt::Debug, V: fmt::Debug> std::error::Error for ParseError<T, V> {}

impl<T, V> From<GrammarError> for ParseError<T, V> {
    fn from(e: GrammarError) -> Self {
        ParseError::Grammar(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grammar_error_renders_a_message() {
        assert_eq!(
            GrammarError::EmptyHead.to_string(),
            "rule head name must not be empty"
        );
    }

    #[test]
    fn no_parse_distinguishes_end_of_input() {
        let err: ParseError<char, ()> = ParseError::NoParse {
            encountered: None,
            start_index: 3,
            end_index: 3,
            terminals_tried: vec!["'a'".to_string()],
            expected: vec!["'a'".to_string()],
        };
        assert!(err.to_string().contains("end of input"));
    }

    #[test]
    fn grammar_error_converts_into_parse_error() {
        let err: ParseError<char, ()> = GrammarError::EmptyHead.into();
        assert!(matches!(err, ParseError::Grammar(GrammarError::EmptyHead)));
    }
}
