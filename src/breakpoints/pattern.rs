//! Anchored glob patterns over unit names
//!
//! `*` matches any run of characters (including none) and `?` exactly one.
//! Everything else is literal.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyOne,
    AnySeq,
}

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct Glob {
    source: String,
    tokens: Vec<Token>,
    case_insensitive: bool,
}

impl Glob {
    pub fn new(pattern: &str) -> Self {
        Self::compile(pattern, false)
    }

    pub fn case_insensitive(pattern: &str) -> Self {
        Self::compile(pattern, true)
    }

    fn compile(pattern: &str, case_insensitive: bool) -> Self {
        let mut tokens = Vec::with_capacity(pattern.len());
        for c in fold(pattern, case_insensitive) {
            let token = match c {
                '*' => Token::AnySeq,
                '?' => Token::AnyOne,
                c => Token::Literal(c),
            };
            // Consecutive stars are equivalent to one
            if token == Token::AnySeq && tokens.last() == Some(&Token::AnySeq) {
                continue;
            }
            tokens.push(token);
        }

        Self {
            source: pattern.to_string(),
            tokens,
            case_insensitive,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whole-string match with single-star backtracking
    pub fn matches(&self, text: &str) -> bool {
        let text = fold(text, self.case_insensitive);
        let (mut p, mut t) = (0, 0);
        // Pattern position after the last star, and the text position it is anchored at
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.tokens.get(p) {
                Some(Token::AnySeq) => {
                    backtrack = Some((p + 1, t));
                    p += 1;
                }
                Some(Token::AnyOne) => {
                    p += 1;
                    t += 1;
                }
                Some(Token::Literal(c)) if *c == text[t] => {
                    p += 1;
                    t += 1;
                }
                _ => match backtrack {
                    Some((star_p, star_t)) => {
                        p = star_p;
                        t = star_t + 1;
                        backtrack = Some((star_p, star_t + 1));
                    }
                    None => return false,
                },
            }
        }

        self.tokens[p..].iter().all(|tok| *tok == Token::AnySeq)
    }
}

impl fmt::Display for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn fold(s: &str, case_insensitive: bool) -> Vec<char> {
    if case_insensitive {
        s.chars().flat_map(char::to_lowercase).collect()
    } else {
        s.chars().collect()
    }
}
