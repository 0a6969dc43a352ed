//! Condition expression dialect
//!
//! Triggers and state transitions use a compact string syntax:
//!
//! ```text
//! [name]                    fact `name` is present
//! [name,start,duration]     present, and entered between start and start+duration seconds ago
//! {name:min,max}            numeric fact within [min, max]
//! !expr                     negation
//! a | b                     any
//! a & b                     all
//! ```
//!
//! There are no parentheses. `&` splits first, then `|` within each
//! `&`-segment, then a leading `!`. So `[a]&[b]|[c]` reads as
//! `[a] & ([b] | [c])` and `![a]|[b]` as `(![a]) | [b]`. Anything that does
//! not match a leaf form parses to [`Expr::Unrecognized`], which evaluates to
//! false.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parsed condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Every sub-expression holds
    All(Vec<Expr>),

    /// At least one sub-expression holds
    Any(Vec<Expr>),

    /// The sub-expression does not hold
    Not(Box<Expr>),

    /// `[name]`
    Present { name: String },

    /// `[name,start,duration]`
    Window {
        name: String,
        start: f64,
        duration: f64,
    },

    /// `{name:min,max}`
    InRange { name: String, min: f64, max: f64 },

    /// Text that is none of the above
    Unrecognized(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    And,
    Or,
    Text(&'a str),
}

/// Split on the operator characters; text and operators strictly alternate,
/// starting and ending with (possibly empty) text.
fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut segment_start = 0;

    for (i, ch) in source.char_indices() {
        let op = match ch {
            '&' => Token::And,
            '|' => Token::Or,
            _ => continue,
        };
        tokens.push(Token::Text(&source[segment_start..i]));
        tokens.push(op);
        segment_start = i + ch.len_utf8();
    }
    tokens.push(Token::Text(&source[segment_start..]));

    tokens
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next_text(&mut self) -> &'a str {
        match self.peek() {
            Some(Token::Text(text)) => {
                self.pos += 1;
                text
            }
            _ => "",
        }
    }

    fn eat(&mut self, op: Token<'a>) -> bool {
        if self.peek() == Some(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// all := any ('&' any)*
    fn parse_all(&mut self) -> Expr {
        let mut parts = vec![self.parse_any()];
        while self.eat(Token::And) {
            parts.push(self.parse_any());
        }
        collapse(parts, Expr::All)
    }

    /// any := unary ('|' unary)*
    fn parse_any(&mut self) -> Expr {
        let mut parts = vec![parse_unary(self.next_text())];
        while self.eat(Token::Or) {
            parts.push(parse_unary(self.next_text()));
        }
        collapse(parts, Expr::Any)
    }
}

fn collapse(mut parts: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        wrap(parts)
    }
}

/// unary := '!' unary | leaf
fn parse_unary(text: &str) -> Expr {
    let text = text.trim();
    match text.strip_prefix('!') {
        Some(rest) => Expr::Not(Box::new(parse_unary(rest))),
        None => parse_leaf(text),
    }
}

fn parse_leaf(text: &str) -> Expr {
    if let Some(inner) = text.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if !inner.contains(',') {
            return Expr::Present {
                name: inner.trim().to_string(),
            };
        }

        let fields: Vec<&str> = inner.split(',').map(str::trim).collect();
        if let [name, start, duration] = fields.as_slice() {
            if let (Ok(start), Ok(duration)) = (start.parse(), duration.parse()) {
                return Expr::Window {
                    name: name.to_string(),
                    start,
                    duration,
                };
            }
        }
        return Expr::Unrecognized(text.to_string());
    }

    if let Some(inner) = text.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if let Some((name, range)) = inner.split_once(':') {
            if let Some((min, max)) = range.split_once(',') {
                if !range.contains(':') && !max.contains(',') {
                    if let (Ok(min), Ok(max)) = (min.trim().parse(), max.trim().parse()) {
                        return Expr::InRange {
                            name: name.trim().to_string(),
                            min,
                            max,
                        };
                    }
                }
            }
        }
    }

    Expr::Unrecognized(text.to_string())
}

impl Expr {
    /// Parse an expression string; never fails
    pub fn parse(source: &str) -> Self {
        let mut parser = Parser {
            tokens: tokenize(source),
            pos: 0,
        };
        parser.parse_all()
    }

    /// Whether every leaf of the tree is a recognized form
    pub fn is_recognized(&self) -> bool {
        match self {
            Expr::All(parts) | Expr::Any(parts) => parts.iter().all(Expr::is_recognized),
            Expr::Not(inner) => inner.is_recognized(),
            Expr::Unrecognized(_) => false,
            _ => true,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, parts: &[Expr], sep: &str| {
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{part}")?;
            }
            Ok(())
        };

        match self {
            Expr::All(parts) => join(f, parts, " & "),
            Expr::Any(parts) => join(f, parts, " | "),
            Expr::Not(inner) => write!(f, "!{inner}"),
            Expr::Present { name } => write!(f, "[{name}]"),
            Expr::Window {
                name,
                start,
                duration,
            } => write!(f, "[{name},{start},{duration}]"),
            Expr::InRange { name, min, max } => write!(f, "{{{name}:{min},{max}}}"),
            Expr::Unrecognized(text) => f.write_str(text),
        }
    }
}

/// A condition expression together with its source text
///
/// Deserializes from and serializes to the plain string form, parsing once
/// at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ConditionExpr {
    source: String,
    expr: Expr,
}

impl ConditionExpr {
    /// Parse a condition expression
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let expr = Expr::parse(&source);
        Self { source, expr }
    }

    /// The text this expression was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed tree
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl From<String> for ConditionExpr {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

impl From<&str> for ConditionExpr {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<ConditionExpr> for String {
    fn from(condition: ConditionExpr) -> Self {
        condition.source
    }
}

impl fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn present(name: &str) -> Expr {
        Expr::Present {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_tokenize_alternates_text_and_operators() {
        assert_eq!(
            tokenize("[a]&[b]|[c]"),
            vec![
                Token::Text("[a]"),
                Token::And,
                Token::Text("[b]"),
                Token::Or,
                Token::Text("[c]"),
            ]
        );
        assert_eq!(
            tokenize("[a]&"),
            vec![Token::Text("[a]"), Token::And, Token::Text("")]
        );
    }

    #[test]
    fn test_leaf_forms() {
        assert_eq!(Expr::parse("[danger]"), present("danger"));
        assert_eq!(
            Expr::parse("[boss, 2, 3.5]"),
            Expr::Window {
                name: "boss".to_string(),
                start: 2.0,
                duration: 3.5
            }
        );
        assert_eq!(
            Expr::parse(" {hp: 0, 30} "),
            Expr::InRange {
                name: "hp".to_string(),
                min: 0.0,
                max: 30.0
            }
        );
    }

    #[test]
    fn test_and_splits_before_or() {
        assert_eq!(
            Expr::parse("[a]&[b]|[c]"),
            Expr::All(vec![
                present("a"),
                Expr::Any(vec![present("b"), present("c")])
            ])
        );
        assert_eq!(
            Expr::parse("[a]|[b]&[c]"),
            Expr::All(vec![
                Expr::Any(vec![present("a"), present("b")]),
                present("c")
            ])
        );
    }

    #[test]
    fn test_negation_binds_to_one_part() {
        assert_eq!(
            Expr::parse("![a]|[b]"),
            Expr::Any(vec![Expr::Not(Box::new(present("a"))), present("b")])
        );
        assert_eq!(
            Expr::parse("!![a]"),
            Expr::Not(Box::new(Expr::Not(Box::new(present("a")))))
        );
    }

    #[test]
    fn test_unrecognized_forms() {
        for source in [
            "",
            "danger",
            "[a,1]",
            "[a,x,2]",
            "{hp:1}",
            "{hp:a,b}",
            "{hp:1,2,3}",
            "{hp:1:2,3}",
            "(a)",
        ] {
            let expr = Expr::parse(source);
            assert!(
                matches!(expr, Expr::Unrecognized(_)),
                "{source:?} parsed as {expr:?}"
            );
        }

        // Operators inside brackets split the leaf apart
        let expr = Expr::parse("[a&b]");
        assert!(!expr.is_recognized());
        assert!(Expr::parse("[a]&{x:0,1}|![b,0,1]").is_recognized());
    }

    #[test]
    fn test_display_round_trips_structure() {
        let expr = Expr::parse("[a] & {x:0,10} | ![b,1,2]");
        assert_eq!(expr.to_string(), "[a] & {x:0,10} | ![b,1,2]");
        assert_eq!(Expr::parse(&expr.to_string()), expr);
    }

    #[test]
    fn test_condition_expr_serde_as_string() {
        let condition: ConditionExpr = serde_json::from_str(r#""[danger]&{hp:0,20}""#).unwrap();
        assert_eq!(condition.source(), "[danger]&{hp:0,20}");
        assert!(matches!(condition.expr(), Expr::All(parts) if parts.len() == 2));

        let back = serde_json::to_string(&condition).unwrap();
        assert_eq!(back, r#""[danger]&{hp:0,20}""#);
    }
}
