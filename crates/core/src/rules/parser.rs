//! Turns rule text into an [`Expr`].
//!
//! Keyword phrases (`is not`, `is less than`, ...) are folded into operators first, then a
//! recursive descent parser builds the tree. Precedence from loosest to tightest is
//! `or`, `and`, `not`, comparison.

use log::debug;

use super::lexer::{tokenize, Symbol, Token};
use super::{CompareOp, Expr, Scope, FILE_FIELDS};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Operand(Expr),
    Compare(CompareOp),
    Contains,
    State(bool),
    Not,
    And,
    Or,
    Open,
    Close,
}

impl Lexeme {
    fn is_operator(&self) -> bool {
        matches!(self, Lexeme::Compare(_) | Lexeme::Contains | Lexeme::State(_))
    }
}

pub(super) struct Parser<'a> {
    scope: &'a dyn Scope,
    current: Option<&'a str>,
}

impl<'a> Parser<'a> {
    pub(super) fn new(scope: &'a dyn Scope, current: Option<&'a str>) -> Self {
        Self { scope, current }
    }

    /// Resolves a bare word to a reference when a node of that name exists.
    pub(super) fn operand(&self, word: &str) -> Expr {
        if self.scope.has(word) {
            return Expr::Reference {
                name: word.to_string(),
                field: None,
            };
        }
        if let Some((name, field)) = word.split_once('.') {
            if FILE_FIELDS.contains(&field) && self.scope.has(name) {
                return Expr::Reference {
                    name: name.to_string(),
                    field: Some(field.to_string()),
                };
            }
        }
        Expr::Literal(Value::from_literal(word))
    }

    /// Parses `text`, comparing it against `context` when one is given.
    pub(super) fn parse(&self, text: &str, context: Option<&str>) -> Result<Expr, String> {
        let mut lexemes = self.lex(text)?;
        if lexemes.is_empty() {
            lexemes.push(Lexeme::Operand(Expr::Literal(Value::empty())));
        }

        if let Some(context) = context {
            let left = Lexeme::Operand(self.operand(context));
            if lexemes[0].is_operator() {
                lexemes.insert(0, left);
            } else {
                lexemes.insert(0, Lexeme::Compare(CompareOp::Eq));
                lexemes.insert(0, left);
            }
        }

        let mut cursor = Cursor {
            lexemes: &lexemes,
            position: 0,
        };
        let expr = cursor.or()?;
        if cursor.position < lexemes.len() {
            return Err(format!(
                "unexpected {:?} after a complete expression",
                lexemes[cursor.position]
            ));
        }
        debug!("Parsed rule `{text}` into {expr:?}");
        Ok(expr)
    }

    fn lex(&self, text: &str) -> Result<Vec<Lexeme>, String> {
        let tokens = tokenize(text)?;
        let mut lexemes: Vec<Lexeme> = Vec::with_capacity(tokens.len());
        let mut index = 0;

        while index < tokens.len() {
            let next_word = |offset: usize| match tokens.get(index + offset) {
                Some(Token::Word(word)) => Some(word.as_str()),
                _ => None,
            };

            let (lexeme, consumed) = match &tokens[index] {
                Token::Quoted(text) => (Lexeme::Operand(Expr::Literal(Value::from(text.as_str()))), 1),
                Token::Symbol(symbol) => (
                    match symbol {
                        Symbol::Eq => Lexeme::Compare(CompareOp::Eq),
                        Symbol::Ne => Lexeme::Compare(CompareOp::Ne),
                        Symbol::Lt => Lexeme::Compare(CompareOp::Lt),
                        Symbol::Gt => Lexeme::Compare(CompareOp::Gt),
                        Symbol::Le => Lexeme::Compare(CompareOp::Le),
                        Symbol::Ge => Lexeme::Compare(CompareOp::Ge),
                        Symbol::Not => Lexeme::Not,
                        Symbol::And => Lexeme::And,
                        Symbol::Or => Lexeme::Or,
                        Symbol::Open => Lexeme::Open,
                        Symbol::Close => Lexeme::Close,
                    },
                    1,
                ),
                Token::Word(word) => match word.as_str() {
                    "is" => match (next_word(1), next_word(2)) {
                        (Some("not"), Some("enabled")) => (Lexeme::State(false), 3),
                        (Some("not"), Some("disabled")) => (Lexeme::State(true), 3),
                        (Some("not"), _) => (Lexeme::Compare(CompareOp::Ne), 2),
                        (Some("equal"), Some("to")) => (Lexeme::Compare(CompareOp::Eq), 3),
                        (Some("less"), Some("than")) => (Lexeme::Compare(CompareOp::Lt), 3),
                        (Some("more" | "greater"), Some("than")) => {
                            (Lexeme::Compare(CompareOp::Gt), 3)
                        }
                        (Some("enabled"), _) => (Lexeme::State(true), 2),
                        (Some("disabled"), _) => (Lexeme::State(false), 2),
                        _ => (Lexeme::Compare(CompareOp::Eq), 1),
                    },
                    "equals" => (Lexeme::Compare(CompareOp::Eq), 1),
                    "contains" => (Lexeme::Contains, 1),
                    "not" | "no" | "invert" => (Lexeme::Not, 1),
                    "and" => (Lexeme::And, 1),
                    "or" => (Lexeme::Or, 1),
                    "enabled" => (Lexeme::State(true), 1),
                    "disabled" => (Lexeme::State(false), 1),
                    "on" | "yes" | "ticked" | "checked" | "selected" => {
                        (Lexeme::Operand(Expr::Literal(Value::Bool(true))), 1)
                    }
                    "off" | "disable" => (Lexeme::Operand(Expr::Literal(Value::Bool(false))), 1),
                    "undefined" => (Lexeme::Operand(Expr::Literal(Value::empty())), 1),
                    "this" => match self.current {
                        Some(current) => (Lexeme::Operand(self.operand(current)), 1),
                        None => (Lexeme::Operand(Expr::Literal(Value::from("this"))), 1),
                    },
                    other => (Lexeme::Operand(self.operand(other)), 1),
                },
            };

            // adjacent text literals read as one phrase: `output file` is "output file"
            match (lexemes.last_mut(), &lexeme) {
                (
                    Some(Lexeme::Operand(Expr::Literal(Value::Text(previous)))),
                    Lexeme::Operand(Expr::Literal(Value::Text(text))),
                ) => {
                    previous.push(' ');
                    previous.push_str(text);
                }
                _ => lexemes.push(lexeme),
            }
            index += consumed;
        }

        Ok(lexemes)
    }
}

struct Cursor<'l> {
    lexemes: &'l [Lexeme],
    position: usize,
}

impl<'l> Cursor<'l> {
    fn peek(&self) -> Option<&'l Lexeme> {
        self.lexemes.get(self.position)
    }

    fn advance(&mut self) -> Option<&'l Lexeme> {
        let lexeme = self.lexemes.get(self.position);
        self.position += 1;
        lexeme
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while self.peek() == Some(&Lexeme::Or) {
            self.position += 1;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Lexeme::And) {
            self.position += 1;
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Lexeme::Not) {
            self.position += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let left = self.primary()?;
        match self.peek() {
            Some(Lexeme::Compare(op)) => {
                let op = *op;
                self.position += 1;
                let right = self.negated_primary()?;
                Ok(Expr::Compare {
                    op,
                    lhs: Box::new(left),
                    rhs: Box::new(right),
                })
            }
            Some(Lexeme::Contains) => {
                self.position += 1;
                let right = self.negated_primary()?;
                Ok(Expr::Contains {
                    haystack: Box::new(left),
                    needle: Box::new(right),
                })
            }
            Some(Lexeme::State(enabled)) => {
                let enabled = *enabled;
                self.position += 1;
                let name = match left {
                    Expr::Reference { name, field: None } => name,
                    Expr::Literal(value) => value.to_string(),
                    other => return Err(format!("cannot read the state of {other:?}")),
                };
                Ok(Expr::State { name, enabled })
            }
            _ => Ok(left),
        }
    }

    fn negated_primary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Lexeme::Not) {
            self.position += 1;
            return Ok(Expr::Not(Box::new(self.primary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Lexeme::Operand(expr)) => Ok(expr.clone()),
            Some(Lexeme::Open) => {
                let inner = self.or()?;
                match self.advance() {
                    Some(Lexeme::Close) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(other) => Err(format!("expected an operand, found {other:?}")),
            None => Err("missing operand".to_string()),
        }
    }
}
