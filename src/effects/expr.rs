//! Value-or-expression evaluation.
//!
//! ## Value
//!
//! An op amount is a literal integer, a bound variable reference, or a small
//! formula. Formulas are parsed once, at deserialization, into a closed AST:
//!
//! ```text
//! formula  := sum
//! sum      := product (('+' | '-') product)*
//! product  := unary (('*' | '/') unary)*
//! unary    := '-' unary | atom
//! atom     := integer | accessor | '(' sum ')'
//! accessor := (caster|target).(hp|maxHp|mp|maxMp|ki|maxKi|kiRegen|shield|power|defense)
//!           | (caster|target).(hand|markers|disasters).count
//!           | discardPile.count | drawPool.count | turn
//!           | dN | dice(N) | roll(N)
//!           | $name | var.name | find.name | loop.name | name
//! ```
//!
//! A formula that fails to parse is kept verbatim and evaluates to 0, so one
//! malformed card degrades instead of failing the op. Division by zero is 0
//! and arithmetic saturates.
//!
//! ## Condition
//!
//! `formula cmp formula` with `cmp` one of `< <= > >= == !=`. A condition
//! that fails to parse is always false.
//!
//! ```
//! use card_battle::effects::{Condition, Value};
//!
//! let v: Value = serde_json::from_str(r#""caster.hp / 2 + 1""#).unwrap();
//! assert!(v.is_well_formed());
//!
//! let c: Condition = serde_json::from_str(r#""target.hp <= 10""#).unwrap();
//! assert!(c.is_well_formed());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::scope::{bare_name, is_var_reference, VarLookup};
use crate::core::{Match, MatchRng, ParticipantId, Participant, Stat};

/// Parenthesis nesting allowed in a formula.
const MAX_PAREN_DEPTH: usize = 8;

/// Everything an expression may read.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub state: &'a Match,
    pub caster: &'a ParticipantId,
    pub target: Option<&'a ParticipantId>,
    pub vars: VarLookup<'a>,
}

impl<'a> EvalContext<'a> {
    fn subject(&self, subject: Subject) -> Option<&'a Participant> {
        let id = match subject {
            Subject::Caster => Some(self.caster),
            Subject::Target => self.target,
        }?;
        self.state.participant(id)
    }
}

// =============================================================================
// AST
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Subject {
    Caster,
    Target,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Stat(Stat),
    Shield,
    HandCount,
    MarkerCount,
    DisasterCount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    Num(i64),
    Neg(Box<Node>),
    Bin(BinOp, Box<Node>, Box<Node>),
    Field(Subject, Field),
    DiscardPile,
    DrawPool,
    Turn,
    Dice(i64),
    Var(String),
}

impl Node {
    fn eval(&self, ctx: &EvalContext<'_>, rng: &mut MatchRng) -> i64 {
        match self {
            Node::Num(n) => *n,
            Node::Neg(inner) => inner.eval(ctx, rng).saturating_neg(),
            Node::Bin(op, lhs, rhs) => {
                let a = lhs.eval(ctx, rng);
                let b = rhs.eval(ctx, rng);
                match op {
                    BinOp::Add => a.saturating_add(b),
                    BinOp::Sub => a.saturating_sub(b),
                    BinOp::Mul => a.saturating_mul(b),
                    BinOp::Div => a.checked_div(b).unwrap_or(0),
                }
            }
            Node::Field(subject, field) => ctx.subject(*subject).map_or(0, |p| match field {
                Field::Stat(stat) => p.stat(*stat),
                Field::Shield => p.shield,
                Field::HandCount => p.hand.len() as i64,
                Field::MarkerCount => p.markers.len() as i64,
                Field::DisasterCount => p.disasters.len() as i64,
            }),
            Node::DiscardPile => ctx.state.discard_pile.len() as i64,
            Node::DrawPool => ctx.state.draw_pool.len() as i64,
            Node::Turn => i64::from(ctx.state.turn),
            Node::Dice(sides) => rng.roll(*sides),
            Node::Var(name) => ctx.vars.get(name).map_or(0, |b| b.as_number()),
        }
    }
}

// =============================================================================
// Lexer
// =============================================================================

/// Comparison operator of a condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparator {
    /// Apply the comparison.
    #[must_use]
    pub fn holds(self, a: i64, b: i64) -> bool {
        match self {
            Comparator::Lt => a < b,
            Comparator::Le => a <= b,
            Comparator::Gt => a > b,
            Comparator::Ge => a >= b,
            Comparator::Eq => a == b,
            Comparator::Ne => a != b,
        }
    }

    /// Split `lhs cmp rhs` on the first comparator.
    ///
    /// Returns `None` when the text has no comparator.
    #[must_use]
    pub fn split(text: &str) -> Option<(&str, Comparator, &str)> {
        const OPS: [(&str, Comparator); 7] = [
            ("<=", Comparator::Le),
            (">=", Comparator::Ge),
            ("==", Comparator::Eq),
            ("!=", Comparator::Ne),
            ("<", Comparator::Lt),
            (">", Comparator::Gt),
            ("=", Comparator::Eq),
        ];
        let (idx, len, cmp) = OPS
            .iter()
            .filter_map(|(sym, cmp)| text.find(sym).map(|i| (i, sym.len(), *cmp)))
            .min_by_key(|(i, len, _)| (*i, std::cmp::Reverse(*len)))?;
        Some((&text[..idx], cmp, &text[idx + len..]))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Num(i64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

fn tokenize(src: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '(' | ')' => {
                chars.next();
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::Open,
                    _ => Token::Close,
                });
            }
            c if c.is_ascii_digit() => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Num(src[start..end].parse().ok()?));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_alphanumeric() || d == '_' || d == '.' || d == '$') {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Ident(src[start..end].to_string()));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

// =============================================================================
// Parser
// =============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn parse(src: &str) -> Option<Node> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return None;
        }
        let mut parser = Parser { tokens, pos: 0, depth: 0 };
        let node = parser.sum()?;
        (parser.pos == parser.tokens.len()).then_some(node)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn sum(&mut self) -> Option<Node> {
        let mut lhs = self.product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Some(lhs),
            };
            self.pos += 1;
            let rhs = self.product()?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn product(&mut self) -> Option<Node> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Some(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Option<Node> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            self.enter()?;
            let inner = self.unary();
            self.depth -= 1;
            return Some(Node::Neg(Box::new(inner?)));
        }
        self.atom()
    }

    fn enter(&mut self) -> Option<()> {
        self.depth += 1;
        (self.depth <= MAX_PAREN_DEPTH).then_some(())
    }

    fn atom(&mut self) -> Option<Node> {
        match self.next()? {
            Token::Num(n) => Some(Node::Num(n)),
            Token::Open => {
                self.enter()?;
                let inner = self.sum()?;
                self.depth -= 1;
                (self.next()? == Token::Close).then_some(inner)
            }
            Token::Ident(name) => {
                let lower = name.to_ascii_lowercase();
                if (lower == "dice" || lower == "roll") && self.peek() == Some(&Token::Open) {
                    self.pos += 1;
                    let Token::Num(sides) = self.next()? else {
                        return None;
                    };
                    (self.next()? == Token::Close).then_some(Node::Dice(sides))
                } else {
                    accessor(&name)
                }
            }
            _ => None,
        }
    }
}

fn accessor(name: &str) -> Option<Node> {
    if is_var_reference(name) {
        return Some(Node::Var(bare_name(name).to_string()));
    }
    let lower = name.to_ascii_lowercase();
    if let Some(sides) = lower.strip_prefix('d').and_then(|s| s.parse::<i64>().ok()) {
        return Some(Node::Dice(sides));
    }
    match lower.as_str() {
        "turn" => return Some(Node::Turn),
        "discardpile.count" | "caster.discardpile.count" | "discard.count" => return Some(Node::DiscardPile),
        "drawpool.count" | "deck.count" | "commondeck.count" => return Some(Node::DrawPool),
        _ => {}
    }
    let Some((head, rest)) = lower.split_once('.') else {
        // Bare identifiers are variables bound by setVar.
        return Some(Node::Var(name.to_string()));
    };
    let subject = match head {
        "caster" | "self" => Subject::Caster,
        "target" => Subject::Target,
        _ => return None,
    };
    let field = match rest {
        "shield" => Field::Shield,
        "hand.count" | "hand" => Field::HandCount,
        "markers.count" | "markers" => Field::MarkerCount,
        "disasters.count" | "disasters" => Field::DisasterCount,
        other => Field::Stat(other.parse().ok()?),
    };
    Some(Node::Field(subject, field))
}

// =============================================================================
// Value
// =============================================================================

/// A parsed formula. Keeps its source for the wire form and for logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formula {
    source: String,
    ast: Option<Node>,
}

impl Formula {
    /// Parse a formula. Never fails; a malformed formula evaluates to 0.
    #[must_use]
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let ast = Parser::parse(&source);
        if ast.is_none() {
            tracing::warn!(formula = %source, "unrecognized formula, evaluating to 0");
        }
        Self { source, ast }
    }

    /// Source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the source parsed.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.ast.is_some()
    }

    /// Evaluate against a context. Dice consume the match RNG.
    pub fn evaluate(&self, ctx: &EvalContext<'_>, rng: &mut MatchRng) -> i64 {
        self.ast.as_ref().map_or(0, |ast| ast.eval(ctx, rng))
    }
}

/// An integer amount: literal, variable reference or formula.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawValue", into = "RawValue")]
pub enum Value {
    Literal(i64),
    Var(String),
    Formula(Formula),
}

impl Default for Value {
    fn default() -> Self {
        Value::Literal(0)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Literal(n)
    }
}

impl Value {
    /// Build from a formula string.
    #[must_use]
    pub fn formula(source: &str) -> Self {
        Value::Formula(Formula::parse(source))
    }

    /// Interpret a string the way the wire form does.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            Value::Literal(n)
        } else if is_var_reference(trimmed) {
            Value::Var(bare_name(trimmed).to_string())
        } else {
            Value::formula(trimmed)
        }
    }

    /// Evaluate to an integer.
    pub fn evaluate(&self, ctx: &EvalContext<'_>, rng: &mut MatchRng) -> i64 {
        match self {
            Value::Literal(n) => *n,
            Value::Var(name) => ctx.vars.get(name).map_or(0, |b| b.as_number()),
            Value::Formula(f) => f.evaluate(ctx, rng),
        }
    }

    /// False only for a formula that did not parse.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match self {
            Value::Formula(f) => f.is_well_formed(),
            _ => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(n) => write!(f, "{n}"),
            Value::Var(name) => write!(f, "${name}"),
            Value::Formula(formula) => f.write_str(formula.source()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
    Expr { expr: String },
}

impl From<RawValue> for Value {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Int(n) => Value::Literal(n),
            RawValue::Float(x) => Value::Literal(x as i64),
            RawValue::Text(text) => Value::from_text(&text),
            RawValue::Expr { expr } => Value::formula(&expr),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Literal(n) => RawValue::Int(n),
            Value::Var(name) => RawValue::Text(format!("${name}")),
            Value::Formula(f) => RawValue::Expr { expr: f.source },
        }
    }
}

// =============================================================================
// Condition
// =============================================================================

/// A comparison guarding an `if` op.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Condition {
    source: String,
    ast: Option<(Node, Comparator, Node)>,
}

impl Condition {
    /// Parse a condition. Never fails; a malformed condition is false.
    #[must_use]
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let ast = Comparator::split(&source).and_then(|(lhs, cmp, rhs)| {
            Some((Parser::parse(lhs)?, cmp, Parser::parse(rhs)?))
        });
        if ast.is_none() {
            tracing::warn!(condition = %source, "unrecognized condition, treating as false");
        }
        Self { source, ast }
    }

    /// Source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the source parsed.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.ast.is_some()
    }

    /// Evaluate the comparison.
    pub fn evaluate(&self, ctx: &EvalContext<'_>, rng: &mut MatchRng) -> bool {
        self.ast
            .as_ref()
            .is_some_and(|(lhs, cmp, rhs)| cmp.holds(lhs.eval(ctx, rng), rhs.eval(ctx, rng)))
    }
}

impl From<String> for Condition {
    fn from(s: String) -> Self {
        Condition::parse(s)
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> Self {
        c.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MatchBuilder, Participant};
    use crate::effects::scope::{Binding, Bindings};

    fn fixture() -> Match {
        let mut p1 = Participant::new("p1", 20, 10, 10).with_ki(3, 2);
        p1.hp = 14;
        p1.shield = 4;
        let p2 = Participant::new("p2", 30, 10, 10);
        MatchBuilder::new("m", 7).participant(p1).participant(p2).build()
    }

    fn eval(value: &Value, state: &Match, vars: &Bindings) -> i64 {
        let caster = ParticipantId::new("p1");
        let target = ParticipantId::new("p2");
        let ctx = EvalContext {
            state,
            caster: &caster,
            target: Some(&target),
            vars: VarLookup::new(vars, &[]),
        };
        value.evaluate(&ctx, &mut MatchRng::new(state.seed))
    }

    #[test]
    fn test_literal_and_numeric_strings() {
        let state = fixture();
        let vars = Bindings::new();
        assert_eq!(eval(&serde_json::from_str::<Value>("12").unwrap(), &state, &vars), 12);
        assert_eq!(eval(&serde_json::from_str::<Value>("\"7\"").unwrap(), &state, &vars), 7);
        assert_eq!(eval(&serde_json::from_str::<Value>("2.9").unwrap(), &state, &vars), 2);
    }

    #[test]
    fn test_accessors_and_precedence() {
        let state = fixture();
        let vars = Bindings::new();
        assert_eq!(eval(&Value::formula("caster.hp"), &state, &vars), 14);
        assert_eq!(eval(&Value::formula("target.maxHp - caster.hp"), &state, &vars), 16);
        assert_eq!(eval(&Value::formula("caster.shield + 2 * 3"), &state, &vars), 10);
        assert_eq!(eval(&Value::formula("(caster.shield + 2) * 3"), &state, &vars), 18);
        assert_eq!(eval(&Value::formula("-caster.ki"), &state, &vars), -3);
        assert_eq!(eval(&Value::formula("turn"), &state, &vars), 1);
        assert_eq!(eval(&Value::formula("discardPile.count"), &state, &vars), 0);
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        let state = fixture();
        let vars = Bindings::new();
        assert_eq!(eval(&Value::formula("caster.hp / 0"), &state, &vars), 0);
        assert_eq!(eval(&Value::formula("caster.hp / 4"), &state, &vars), 3);
    }

    #[test]
    fn test_saturating_arithmetic() {
        let state = fixture();
        let vars = Bindings::new();
        let big = format!("{} * 4", i64::MAX);
        assert_eq!(eval(&Value::formula(&big), &state, &vars), i64::MAX);
    }

    #[test]
    fn test_unknown_formula_evaluates_to_zero() {
        let state = fixture();
        let vars = Bindings::new();
        for src in ["enemy.luck", "caster.hp +", "import os", "((((((((((1))))))))))", ""] {
            let v = Value::formula(src);
            assert!(!v.is_well_formed(), "{src} should not parse");
            assert_eq!(eval(&v, &state, &vars), 0);
        }
    }

    #[test]
    fn test_variables() {
        let state = fixture();
        let mut vars = Bindings::new();
        vars.set("bonus", Binding::Number(5));
        vars.set("weak", Binding::Participants(smallvec::smallvec![ParticipantId::new("p2")]));

        assert_eq!(eval(&Value::from_text("$bonus"), &state, &vars), 5);
        assert_eq!(eval(&Value::formula("bonus * 2"), &state, &vars), 10);
        assert_eq!(eval(&Value::formula("find.weak + 1"), &state, &vars), 2);
        assert_eq!(eval(&Value::from_text("$missing"), &state, &vars), 0);
    }

    #[test]
    fn test_dice_stay_in_range() {
        let state = fixture();
        let vars = Bindings::new();
        for src in ["d6", "dice(6)", "roll(6)"] {
            let v = Value::formula(src);
            assert!(v.is_well_formed());
            let n = eval(&v, &state, &vars);
            assert!((1..=6).contains(&n));
        }
    }

    #[test]
    fn test_value_wire_forms_round_trip() {
        let v: Value = serde_json::from_str(r#"{"expr": "caster.hp / 2"}"#).unwrap();
        assert_eq!(serde_json::to_value(&v).unwrap(), serde_json::json!({"expr": "caster.hp / 2"}));
        let v: Value = serde_json::from_str(r#""$x""#).unwrap();
        assert_eq!(v, Value::Var("x".into()));
        assert_eq!(serde_json::to_value(&v).unwrap(), serde_json::json!("$x"));
    }

    #[test]
    fn test_conditions() {
        let state = fixture();
        let vars = Bindings::new();
        let caster = ParticipantId::new("p1");
        let ctx = EvalContext { state: &state, caster: &caster, target: None, vars: VarLookup::new(&vars, &[]) };
        let mut rng = MatchRng::new(1);

        assert!(Condition::parse("caster.hp < 20").evaluate(&ctx, &mut rng));
        assert!(Condition::parse("caster.hp >= 14").evaluate(&ctx, &mut rng));
        assert!(!Condition::parse("caster.hp != 14").evaluate(&ctx, &mut rng));
        assert!(Condition::parse("caster.ki * 2 == 6").evaluate(&ctx, &mut rng));
        // Missing target reads as 0.
        assert!(Condition::parse("target.hp <= 0").evaluate(&ctx, &mut rng));

        let broken = Condition::parse("caster.hp is low");
        assert!(!broken.is_well_formed());
        assert!(!broken.evaluate(&ctx, &mut rng));
    }

    #[test]
    fn test_comparator_split_prefers_longest() {
        let (lhs, cmp, rhs) = Comparator::split("a <= b").unwrap();
        assert_eq!((lhs.trim(), cmp, rhs.trim()), ("a", Comparator::Le, "b"));
        assert!(Comparator::split("a + b").is_none());
    }
}
