//! Compiles descriptor rules, which may be plain phrases or structured conditionals.
//!
//! A structured rule is one of:
//! - `{"condition": result}`: `result` when the condition holds;
//! - `{"option": {"value": result, ...}}`: conditions compared against `option`;
//! - an object with several keys, read as a cascade of single-key objects in key order;
//! - an array, an ordered cascade where the first matching entry wins.

use log::error;
use serde_json::Value as JsonValue;

use super::parser::Parser;
use super::{Expr, Rule, Scope};
use crate::error::RuleCompileError;
use crate::value::Value;

pub struct Compiler<'a> {
    parser: Parser<'a>,
}

impl<'a> Compiler<'a> {
    /// A compiler resolving references against `scope`.
    pub fn new(scope: &'a dyn Scope) -> Self {
        Self {
            parser: Parser::new(scope, None),
        }
    }

    /// A compiler for rules declared on option `current`, which `this` refers to.
    pub fn for_option(scope: &'a dyn Scope, current: &'a str) -> Self {
        Self {
            parser: Parser::new(scope, Some(current)),
        }
    }

    /// Compiles `rule`, yielding `result` when the rule holds.
    ///
    /// # Arguments
    ///
    /// * `rule` - Descriptor value: a phrase, a literal, an object or an array.
    /// * `result` - What the rule evaluates to when its condition holds. `None` returns the
    ///   condition itself.
    /// * `context` - Option the rule is compared against.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleCompileError`] naming the rule text when it cannot be parsed.
    pub fn compile(
        &self,
        rule: &JsonValue,
        result: Option<&JsonValue>,
        context: Option<&str>,
    ) -> Result<Rule, RuleCompileError> {
        let expr = self.expression(rule, result, context)?;
        Ok(Rule::new(rule_text(rule), expr))
    }

    /// Like [`Compiler::compile`], but logs failures and degrades to a rule that reads empty.
    pub fn compile_or_noop(
        &self,
        rule: &JsonValue,
        result: Option<&JsonValue>,
        context: Option<&str>,
    ) -> Rule {
        self.compile(rule, result, context).unwrap_or_else(|err| {
            error!("{err}");
            Rule::noop(rule_text(rule))
        })
    }

    fn expression(
        &self,
        rule: &JsonValue,
        result: Option<&JsonValue>,
        context: Option<&str>,
    ) -> Result<Expr, RuleCompileError> {
        match rule {
            JsonValue::Array(items) => self.cascade(items, result, context),
            JsonValue::Object(map) if map.len() > 1 => {
                let items: Vec<JsonValue> = map
                    .iter()
                    .map(|(key, value)| {
                        let mut single = serde_json::Map::new();
                        single.insert(key.clone(), value.clone());
                        JsonValue::Object(single)
                    })
                    .collect();
                self.cascade(&items, result, context)
            }
            JsonValue::Object(map) => match map.iter().next() {
                None => Ok(Expr::Literal(Value::empty())),
                Some((key, nested @ (JsonValue::Object(_) | JsonValue::Array(_)))) => {
                    self.expression(nested, result, Some(key))
                }
                Some((key, value)) => self.phrase(key, Some(value), context),
            },
            JsonValue::String(text) => self.phrase(text, result, context),
            literal => Ok(Expr::Literal(Value::from(literal))),
        }
    }

    fn cascade(
        &self,
        items: &[JsonValue],
        result: Option<&JsonValue>,
        context: Option<&str>,
    ) -> Result<Expr, RuleCompileError> {
        let mut branches = Vec::with_capacity(items.len());
        let mut otherwise = Expr::Literal(Value::empty());

        for item in items {
            match self.expression(item, result, context)? {
                Expr::Conditional {
                    branches: nested,
                    otherwise: fallback,
                } => {
                    branches.extend(nested);
                    otherwise = *fallback;
                }
                condition => {
                    branches.push((condition, Expr::Literal(Value::Bool(true))));
                    otherwise = Expr::Literal(Value::Bool(false));
                }
            }
        }

        Ok(Expr::Conditional {
            branches,
            otherwise: Box::new(otherwise),
        })
    }

    fn phrase(
        &self,
        text: &str,
        result: Option<&JsonValue>,
        context: Option<&str>,
    ) -> Result<Expr, RuleCompileError> {
        let condition = self
            .parser
            .parse(text, context)
            .map_err(|cause| RuleCompileError::new(text, cause))?;

        let result = result.map(|result| self.result(result));
        let holds_true = matches!(result, None | Some(Expr::Literal(Value::Bool(true))));
        if holds_true && context.is_none() {
            return Ok(condition);
        }

        let otherwise = match &result {
            None | Some(Expr::Literal(Value::Bool(true))) => Value::Bool(false),
            Some(Expr::Literal(Value::Bool(false))) => Value::Bool(true),
            _ => Value::empty(),
        };
        Ok(Expr::Conditional {
            branches: vec![(
                condition,
                result.unwrap_or(Expr::Literal(Value::Bool(true))),
            )],
            otherwise: Box::new(Expr::Literal(otherwise)),
        })
    }

    /// A result may itself reference options; text that does not parse is kept verbatim.
    fn result(&self, result: &JsonValue) -> Expr {
        match result {
            JsonValue::String(text) => self
                .parser
                .parse(text, None)
                .unwrap_or_else(|_| Expr::Literal(Value::from(text.as_str()))),
            other => Expr::Literal(Value::from(other)),
        }
    }
}

fn rule_text(rule: &JsonValue) -> String {
    match rule {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use serde_json::json;

    use super::*;

    fn scope() -> IndexMap<String, Value> {
        IndexMap::from([
            ("mode".to_string(), Value::from("fast")),
            ("threads".to_string(), Value::Number(4.0)),
            ("name".to_string(), Value::from("sample")),
        ])
    }

    fn eval(rule: JsonValue, result: Option<JsonValue>, context: Option<&str>) -> Value {
        let values = scope();
        let compiler = Compiler::new(&values);
        compiler
            .compile(&rule, result.as_ref(), context)
            .unwrap()
            .evaluate(&values)
    }

    #[test]
    fn test_plain_condition() {
        assert_eq!(eval(json!("mode is fast"), None, None), Value::Bool(true));
        assert_eq!(eval(json!("threads > 8"), None, None), Value::Bool(false));
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval(json!(12), None, None), Value::Number(12.0));
        assert_eq!(eval(json!(true), None, None), Value::Bool(true));
        assert_eq!(eval(json!("plain"), None, None), Value::from("plain"));
    }

    #[test]
    fn test_conditional_object() {
        assert_eq!(eval(json!({"mode is fast": "-f"}), None, None), Value::from("-f"));
        assert_eq!(eval(json!({"mode is slow": "-s"}), None, None), Value::empty());
        assert_eq!(eval(json!({"mode is slow": false}), None, None), Value::Bool(true));
    }

    #[test]
    fn test_context_object() {
        let rule = json!({"mode": {"slow": "-s", "fast": "-f"}});
        assert_eq!(eval(rule, None, None), Value::from("-f"));
        let rule = json!({"threads": {"> 2": "many", "<= 2": "few"}});
        assert_eq!(eval(rule, None, None), Value::from("many"));
    }

    #[test]
    fn test_cascade_first_match_wins() {
        let rule = json!([{"threads > 2": "a"}, {"threads > 1": "b"}]);
        assert_eq!(eval(rule, None, None), Value::from("a"));
        let rule = json!([{"threads > 10": "a"}, {"threads > 1": "b"}]);
        assert_eq!(eval(rule, None, None), Value::from("b"));
    }

    #[test]
    fn test_result_references_option() {
        assert_eq!(
            eval(json!({"mode is fast": "name"}), None, None),
            Value::from("sample")
        );
    }

    #[test]
    fn test_result_phrase_kept_verbatim() {
        assert_eq!(
            eval(json!({"mode is fast": "-x ("}), None, None),
            Value::from("-x (")
        );
    }

    #[test]
    fn test_context_argument() {
        assert_eq!(eval(json!("fast"), None, Some("mode")), Value::Bool(true));
        assert_eq!(eval(json!("slow"), None, Some("mode")), Value::Bool(false));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let values = scope();
        let compiler = Compiler::new(&values);
        let rule = compiler
            .compile(&json!({"threads > 2": "name"}), None, None)
            .unwrap();
        assert_eq!(rule.evaluate(&values), rule.evaluate(&values));
    }

    #[test]
    fn test_failed_compile_degrades_to_noop() {
        let values = scope();
        let compiler = Compiler::new(&values);
        assert!(compiler.compile(&json!("mode =="), None, None).is_err());
        let rule = compiler.compile_or_noop(&json!("mode =="), None, None);
        assert_eq!(rule.evaluate(&values), Value::empty());
    }
}
