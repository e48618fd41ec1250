use super::file::FileSlot;
use super::format::NumberFormat;
use super::selection::SelectionList;
use crate::descriptor::Order;
use crate::rules::Rule;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    Text,
    Numeric(NumberFormat),
    Boolean,
    Hidden,
    Selection(SelectionList),
    File(FileSlot),
}

impl OptionKind {
    pub fn name(&self) -> &'static str {
        match self {
            OptionKind::Text => "text",
            OptionKind::Numeric(_) => "numeric",
            OptionKind::Boolean => "boolean",
            OptionKind::Hidden => "hidden",
            OptionKind::Selection(_) => "selection",
            OptionKind::File(_) => "file",
        }
    }

    /// Text-like inputs treat their default as a placeholder rather than a value.
    pub fn is_textual(&self) -> bool {
        matches!(self, OptionKind::Text | OptionKind::Numeric(_))
    }
}

/// Several inputs whose values are joined into one argument.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeGroup {
    pub sources: Vec<String>,
    pub separator: String,
}

/// How a node computes its value from other nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// Holds `checked` or `unchecked` depending on the boolean `source`.
    Checkbox {
        source: String,
        checked: Value,
        unchecked: Value,
    },
    Merge(MergeGroup),
}

impl Derivation {
    pub fn depends_on(&self, name: &str) -> bool {
        match self {
            Derivation::Checkbox { source, .. } => source == name,
            Derivation::Merge(group) => group.sources.iter().any(|source| source == name),
        }
    }
}

/// Enable/disable rule of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Toggle {
    pub rule: Rule,
    /// The rule states when the node is enabled rather than disabled.
    pub enables: bool,
}

impl Toggle {
    pub fn disables(&self, outcome: &Value) -> bool {
        outcome.is_truthy() != self.enables
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// Message raised while the node is empty and has no default.
    Required(String),
    /// Rule evaluating to a message, or to empty when the value is fine.
    Rule(Rule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionNode {
    pub name: String,
    pub title: String,
    pub desc: String,
    /// Argument name without prefix; `Some("")` marks a positional argument.
    pub option: Option<String>,
    pub prefix: String,
    pub kind: OptionKind,
    pub(crate) value: Value,
    pub default: Option<Value>,
    pub order: Order,
    /// The node this input only feeds; never emitted itself.
    pub proxy_for: Option<String>,
    pub derivation: Option<Derivation>,
    pub toggle: Option<Toggle>,
    pub validation: Option<Validation>,
    pub(crate) disabled: bool,
    pub(crate) snapshot: Option<Value>,
}

impl OptionNode {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            desc: String::new(),
            option: None,
            prefix: String::new(),
            kind,
            value: Value::empty(),
            default: None,
            order: Order::Natural,
            proxy_for: None,
            derivation: None,
            toggle: None,
            validation: None,
            disabled: false,
            snapshot: None,
        }
    }

    /// The command-line name: `prefix + option`, empty for positional arguments.
    pub fn arg_name(&self) -> Option<String> {
        self.option.as_ref().map(|option| {
            if option.is_empty() {
                String::new()
            } else {
                format!("{}{}", self.prefix, option)
            }
        })
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy_for.is_some()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn selection(&self) -> Option<&SelectionList> {
        match &self.kind {
            OptionKind::Selection(list) => Some(list),
            _ => None,
        }
    }

    pub fn file(&self) -> Option<&FileSlot> {
        match &self.kind {
            OptionKind::File(slot) => Some(slot),
            _ => None,
        }
    }

    /// The default shown in place of an empty text input.
    pub fn placeholder(&self) -> Option<&Value> {
        self.default.as_ref().filter(|_| self.kind.is_textual())
    }
}
