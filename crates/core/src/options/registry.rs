use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value as JsonValue;

use super::file::{file_selection, FileSlot, PreviousStep};
use super::format::NumberFormat;
use super::node::{Derivation, MergeGroup, OptionKind, OptionNode, Validation};
use super::selection::SelectionList;
use crate::descriptor::{split_prefix, Entry, Group, OptionDecl};
use crate::error::{Error, Result, ValidationError};
use crate::linkage::SyncGuard;
use crate::rules::{Compiler, Scope};
use crate::value::Value;

/// Settings a registry is built with.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Plugin title used in messages.
    pub plugin: String,
    /// Prefix for options that declare none.
    pub prefix: String,
    /// Position of the plugin in its pipeline, counted from 0.
    pub step: usize,
    /// Outputs of the step before, for file inputs of later steps.
    pub previous: Option<PreviousStep>,
    pub pipes: bool,
    /// How long a selection ignores matching after it pushed its linked values.
    pub sync_cooldown: Duration,
}

impl RegistryConfig {
    pub fn new(plugin: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            prefix: prefix.into(),
            step: 0,
            previous: None,
            pipes: true,
            sync_cooldown: Duration::from_millis(100),
        }
    }
}

/// A group of which at least one input has to be filled.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRequirement {
    pub name: String,
    pub message: String,
    pub members: Vec<String>,
}

/// Rules kept aside until every node is known.
#[derive(Debug, Clone)]
pub(crate) struct PendingRules {
    pub name: String,
    pub type_name: String,
    pub enable: Option<JsonValue>,
    pub disable: Option<JsonValue>,
    pub validation: Option<JsonValue>,
}

/// The option nodes of one plugin instance.
#[derive(Debug)]
pub struct Registry {
    pub(crate) config: RegistryConfig,
    pub(crate) nodes: IndexMap<String, OptionNode>,
    pub(crate) groups: Vec<GroupRequirement>,
    pub(crate) outfiles: Vec<JsonValue>,
    pub(crate) pending_rules: Vec<PendingRules>,
    /// Merge targets keyed by argument name, with the prefix of their first component.
    pub(crate) pending_merges: IndexMap<String, (MergeGroup, String)>,
    pub(crate) guards: HashMap<String, SyncGuard>,
    pub(crate) finished: bool,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            nodes: IndexMap::new(),
            groups: Vec::new(),
            outfiles: Vec::new(),
            pending_rules: Vec::new(),
            pending_merges: IndexMap::new(),
            guards: HashMap::new(),
            finished: false,
        }
    }

    /// Builds and finishes a registry for an option tree.
    pub fn build(config: RegistryConfig, entries: &[Entry]) -> Result<Self> {
        let mut registry = Self::new(config);
        registry.register(entries)?;
        registry.finish();
        Ok(registry)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn node(&self, name: &str) -> Option<&OptionNode> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &OptionNode> {
        self.nodes.values()
    }

    pub fn groups(&self) -> &[GroupRequirement] {
        &self.groups
    }

    /// Output filename rules gathered from `outfile` attributes.
    pub fn outfile_rules(&self) -> &[JsonValue] {
        &self.outfiles
    }

    /// Finds a node by name, then by argument name, then by title.
    ///
    /// Inputs that only feed another node are found by name alone.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        if let Some((name, _)) = self.nodes.get_key_value(key) {
            return Some(name.as_str());
        }
        let visible = || self.nodes.values().filter(|node| !node.is_proxy());
        visible()
            .find(|node| node.option.as_deref() == Some(key))
            .or_else(|| visible().find(|node| !node.title.is_empty() && node.title == key))
            .map(|node| node.name.as_str())
    }

    /// The current value of a node, computed for derived and file nodes.
    pub fn value(&self, name: &str) -> Value {
        let Some(node) = self.nodes.get(name) else {
            return Value::empty();
        };
        match (&node.derivation, &node.kind) {
            (
                Some(Derivation::Checkbox {
                    source,
                    checked,
                    unchecked,
                }),
                _,
            ) => {
                if self.value(source).is_truthy() {
                    checked.clone()
                } else {
                    unchecked.clone()
                }
            }
            (Some(Derivation::Merge(group)), _) => {
                let parts: Vec<String> = group
                    .sources
                    .iter()
                    .map(|source| self.value(source))
                    .filter(|value| match value {
                        Value::Number(_) => true,
                        Value::Text(text) => !text.is_empty() && text != "true" && text != "false",
                        Value::Bool(_) => false,
                    })
                    .map(|value| value.to_string())
                    .collect();
                Value::Text(parts.join(&group.separator))
            }
            (None, OptionKind::File(slot)) => slot.source(),
            _ => node.value.clone(),
        }
    }

    /// Messages of every enabled node whose requirement or check fails, then of every
    /// group left completely empty.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for node in self.nodes.values().filter(|node| !node.disabled) {
            let message = match &node.validation {
                None => continue,
                Some(Validation::Required(message)) => {
                    let no_placeholder = node.placeholder().map_or(true, Value::is_empty);
                    (self.value(&node.name) == Value::empty() && no_placeholder)
                        .then(|| message.clone())
                }
                Some(Validation::Rule(rule)) => match rule.evaluate(self) {
                    Value::Bool(_) => None,
                    other => Some(other.to_string()),
                },
            };
            if let Some(message) = message.filter(|message| !message.is_empty()) {
                errors.push(ValidationError {
                    option: node.name.clone(),
                    message,
                });
            }
        }

        for group in &self.groups {
            if group.members.iter().all(|member| !self.value(member).is_truthy()) {
                errors.push(ValidationError {
                    option: group.name.clone(),
                    message: group.message.clone(),
                });
            }
        }
        errors
    }

    /// First pass: creates a node for every declaration of the tree.
    pub fn register(&mut self, entries: &[Entry]) -> Result<()> {
        for entry in entries {
            match entry {
                Entry::Option(decl) => self.register_option(decl.as_ref().clone())?,
                Entry::Group(group) => self.register_group(group)?,
            }
        }
        Ok(())
    }

    fn register_group(&mut self, group: &Group) -> Result<()> {
        let first = self.nodes.len();
        self.register(&group.entries)?;
        if let Some(message) = &group.required {
            let members = self
                .nodes
                .values()
                .skip(first)
                .filter(|node| node.kind != OptionKind::Hidden)
                .map(|node| node.name.clone())
                .collect();
            let name = group
                .name
                .clone()
                .unwrap_or_else(|| format!("_optgroup{}", self.groups.len() + 1));
            self.groups.push(GroupRequirement {
                name,
                message: message.clone(),
                members,
            });
        }
        Ok(())
    }

    fn register_option(&mut self, mut decl: OptionDecl) -> Result<()> {
        let type_name = decl.type_name.clone();
        let is_checkbox = matches!(type_name.as_str(), "bool" | "tickbox" | "checkbox");
        let delegated = is_checkbox && decl.value.as_ref().is_some_and(|value| !value.is_null());

        let merge = decl.merge.take().filter(|_| match decl.option.as_deref() {
            None | Some("") => {
                warn!("Merging inputs needs an argument name (`option`); `merge` ignored.");
                false
            }
            Some(_) if type_name == "file" => {
                warn!("File inputs cannot be merged; `merge` ignored.");
                false
            }
            Some(_) => true,
        });
        if merge.is_some() && decl.name == decl.option {
            decl.name = None;
        }

        if decl.prefix.is_none() {
            if let Some(option) = decl.option.clone() {
                if let (Some(prefix), rest) = split_prefix(&option) {
                    decl.prefix = Some(prefix.to_string());
                    decl.option = Some(rest.to_string());
                }
            }
        }
        let prefix = decl.prefix.clone().unwrap_or_else(|| self.config.prefix.clone());

        let name = match (&decl.name, decl.option.as_deref()) {
            (Some(name), _) => name.clone(),
            (None, Some(option)) if !option.is_empty() && merge.is_none() => option.to_string(),
            _ => self.make_name(),
        };
        if self.nodes.contains_key(&name) {
            warn!(
                "Plugin {} declares `{name}` twice; skipping the second declaration.",
                self.config.plugin
            );
            return Ok(());
        }
        if let Some(option) = &decl.option {
            if option.chars().any(char::is_whitespace) {
                return Err(Error::OptionWithSpace(option.clone()));
            }
        }

        let title = match (&decl.title, decl.option.as_deref()) {
            (Some(title), Some(option)) if !option.is_empty() && title == option => {
                format!("{prefix}{option}")
            }
            (Some(title), _) => title.clone(),
            (None, _) => String::new(),
        };
        let default = decl
            .default
            .as_ref()
            .map(|rule| self.evaluate_once(rule, &name));

        match &decl.outfile {
            Some(JsonValue::Bool(true)) => self.outfiles.push(JsonValue::String(name.clone())),
            Some(JsonValue::String(rule)) if !rule.is_empty() => {
                self.outfiles.push(JsonValue::String(rule.clone()))
            }
            _ => {}
        }

        let mut node = OptionNode::new(name.clone(), OptionKind::Text);
        node.title = title;
        node.desc = decl.desc.clone().unwrap_or_default();
        node.option = decl.option.clone();
        node.prefix = prefix.clone();
        node.order = decl.order;

        if delegated {
            self.register_checkbox(node, &decl, default);
            return Ok(());
        }

        if let Some(separator) = merge {
            let target = decl.option.clone().unwrap_or_default();
            let (group, _) = self.pending_merges.entry(target.clone()).or_insert_with(|| {
                (
                    MergeGroup {
                        sources: Vec::new(),
                        separator,
                    },
                    prefix,
                )
            });
            group.sources.push(name.clone());
            node.option = None;
            node.proxy_for = Some(target);
        }

        node.kind = match type_name.as_str() {
            "number" | "int" | "float" => {
                OptionKind::Numeric(NumberFormat::from_type(&type_name).unwrap_or(NumberFormat::Number))
            },
            "bool" | "tickbox" | "checkbox" => OptionKind::Boolean,
            "hidden" => OptionKind::Hidden,
            "select" => OptionKind::Selection(SelectionList::parse(
                decl.selection.as_ref(),
                decl.caption.as_deref(),
                default.clone(),
            )
            .multiple(decl.multi.clone())),
            "file" => OptionKind::File(FileSlot::new(
                self.config.step > 0,
                decl.default
                    .as_ref()
                    .or(decl.value.as_ref())
                    .and_then(JsonValue::as_str)
                    .map(str::to_string),
            )),
            _ => OptionKind::Text,
        };

        match &node.kind {
            OptionKind::Text | OptionKind::Numeric(_) => node.default = default,
            OptionKind::Boolean => {
                let checked = default.as_ref().is_some_and(Value::as_flag);
                node.value = Value::Bool(checked);
                node.default = Some(Value::Bool(checked));
            }
            OptionKind::Hidden => {
                node.value = match &decl.value {
                    Some(rule) => self.evaluate_once(rule, &name),
                    None => default.clone().unwrap_or(Value::Bool(true)),
                };
                node.default = default;
            }
            OptionKind::Selection(list) => {
                node.value = list.default.clone().unwrap_or_default();
                node.default = list.default.clone();
            }
            OptionKind::File(_) => {
                let argument = node.arg_name().filter(|arg| !arg.is_empty());
                if node.desc.is_empty() {
                    node.desc = format!(
                        "Give an input file for the {} program argument{}",
                        if decl.validation().is_some() { "required" } else { "optional" },
                        argument.map(|arg| format!(" {arg}")).unwrap_or_default()
                    );
                }
                if self.config.step > 0 {
                    self.register_file_selection(&node, &decl, &type_name);
                }
            }
        }

        self.pending_rules.push(PendingRules {
            name: name.clone(),
            type_name,
            enable: decl.enable.clone(),
            disable: decl.disable.clone(),
            validation: decl.validation().cloned(),
        });
        debug!("Registered {} input `{name}`.", node.kind.name());
        self.nodes.insert(name, node);
        Ok(())
    }

    /// A checkbox with a `value` pair: a hidden node holding the checked or unchecked
    /// value, fed by a boolean node named `<name>_checkbox`.
    fn register_checkbox(&mut self, mut holder: OptionNode, decl: &OptionDecl, default: Option<Value>) {
        let (checked, unchecked) = match &decl.value {
            Some(JsonValue::Array(pair)) => (
                pair.first().map_or(Value::Bool(false), checkbox_value),
                pair.get(1).map_or(Value::Bool(false), checkbox_value),
            ),
            Some(value) => (checkbox_value(value), Value::Bool(false)),
            None => (Value::Bool(true), Value::Bool(false)),
        };
        let default = match default {
            Some(Value::Bool(flag)) => Value::Bool(flag),
            Some(value) => Value::Text(value.to_string()),
            None => unchecked.clone(),
        };
        if !default.loose_eq(&checked) && !default.loose_eq(&unchecked) {
            warn!(
                "Default of checkbox `{}` is neither of its values `{checked}` and `{unchecked}`.",
                holder.name
            );
        }

        let source = format!("{}_checkbox", holder.name);
        let mut proxy = OptionNode::new(source.clone(), OptionKind::Boolean);
        proxy.title = holder.title.clone();
        proxy.desc = holder.desc.clone();
        proxy.value = Value::Bool(default.loose_eq(&checked));
        proxy.default = Some(proxy.value.clone());
        proxy.proxy_for = Some(holder.name.clone());

        holder.kind = OptionKind::Hidden;
        holder.default = Some(default);
        holder.derivation = Some(Derivation::Checkbox {
            source: source.clone(),
            checked,
            unchecked,
        });

        for (name, validation) in [(&holder.name, decl.validation()), (&source, None)] {
            self.pending_rules.push(PendingRules {
                name: name.clone(),
                type_name: decl.type_name.clone(),
                enable: decl.enable.clone(),
                disable: decl.disable.clone(),
                validation: validation.cloned(),
            });
        }
        debug!("Registered checkbox `{}` with `{source}`.", holder.name);
        self.nodes.insert(holder.name.clone(), holder);
        self.nodes.insert(source, proxy);
    }

    /// The selection in front of a file input of a later step, named `<name>_sel`.
    fn register_file_selection(&mut self, file: &OptionNode, decl: &OptionDecl, type_name: &str) {
        let previous = self.config.previous.clone().unwrap_or_default();
        let mut list = file_selection(
            &previous,
            decl.validation().is_some(),
            decl.required_message().is_none(),
            self.config.pipes,
        );
        list.file_input = Some(file.name.clone());

        let name = format!("{}_sel", file.name);
        let mut node = OptionNode::new(name.clone(), OptionKind::Hidden);
        node.title = if file.title.is_empty() {
            "Input file:".to_string()
        } else {
            file.title.clone()
        };
        node.desc = file.desc.clone();
        node.value = list.default.clone().unwrap_or_default();
        node.default = list.default.clone();
        node.proxy_for = Some(file.name.clone());
        node.kind = OptionKind::Selection(list);

        self.pending_rules.push(PendingRules {
            name: name.clone(),
            type_name: type_name.to_string(),
            enable: decl.enable.clone(),
            disable: decl.disable.clone(),
            validation: None,
        });
        self.nodes.insert(name, node);
    }

    fn make_name(&self) -> String {
        let mut count = self
            .nodes
            .keys()
            .filter(|name| name.starts_with("trackName"))
            .count()
            + 1;
        while self.nodes.contains_key(&format!("trackName{count}")) {
            count += 1;
        }
        format!("trackName{count}")
    }

    /// Evaluates a rule once against the nodes registered so far.
    fn evaluate_once(&self, rule: &JsonValue, current: &str) -> Value {
        Compiler::for_option(self, current)
            .compile_or_noop(rule, None, None)
            .evaluate(self)
    }
}

fn checkbox_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Bool(flag) => Value::Bool(*flag),
        other => Value::Text(Value::from(other).to_string()),
    }
}

impl Scope for Registry {
    fn has(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    fn value(&self, name: &str) -> Value {
        Registry::value(self, name)
    }

    fn field(&self, name: &str, field: &str) -> Option<Value> {
        self.nodes.get(name)?.file()?.field(field)
    }

    fn is_disabled(&self, name: &str) -> bool {
        self.nodes.get(name).is_some_and(OptionNode::is_disabled)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::descriptor::PluginDescriptor;

    fn registry(options: JsonValue) -> Registry {
        let descriptor =
            PluginDescriptor::from_json(json!({"program": "tool", "options": options})).unwrap();
        Registry::build(RegistryConfig::new("tool", "-"), &descriptor.entries()).unwrap()
    }

    #[test]
    fn test_resolve_by_name_option_and_title() {
        let registry = registry(json!([
            {"text": "pattern", "option": "e"},
            {"name": "threads", "type": "int", "option": "t", "title": "Threads"}
        ]));
        assert_eq!(registry.resolve("e"), Some("e"));
        assert_eq!(registry.resolve("pattern"), Some("e"));
        assert_eq!(registry.resolve("t"), Some("threads"));
        assert_eq!(registry.resolve("Threads"), Some("threads"));
        assert_eq!(registry.resolve("missing"), None);
    }

    #[test]
    fn test_leading_symbols_become_the_prefix() {
        let registry = registry(json!([{"bool": "verbose", "option": "--verbose"}]));
        let node = registry.node("verbose").unwrap();
        assert_eq!(node.prefix, "--");
        assert_eq!(node.arg_name(), Some("--verbose".to_string()));
    }

    #[test]
    fn test_option_with_space_is_rejected() {
        let descriptor = PluginDescriptor::from_json(
            json!({"program": "tool", "options": [{"name": "x", "option": "a b"}]}),
        )
        .unwrap();
        let result = Registry::build(RegistryConfig::new("tool", "-"), &descriptor.entries());
        assert!(matches!(result, Err(Error::OptionWithSpace(_))));
    }

    #[test]
    fn test_duplicate_names_keep_the_first() {
        let registry = registry(json!([
            {"name": "x", "option": "a"},
            {"name": "x", "option": "b"}
        ]));
        assert_eq!(registry.node("x").unwrap().option.as_deref(), Some("a"));
        assert_eq!(registry.nodes().count(), 1);
    }

    #[test]
    fn test_generated_names() {
        let registry = registry(json!([{"text": "Some title"}, {"text": "Other title"}]));
        assert!(registry.node("trackName1").is_some());
        assert!(registry.node("trackName2").is_some());
    }

    #[test]
    fn test_default_values_by_kind() {
        let registry = registry(json!([
            {"text": "a", "default": "x"},
            {"bool": "b", "default": true},
            {"hidden": "c"},
            {"name": "d", "type": "hidden", "value": "fixed"}
        ]));
        assert_eq!(registry.value("a"), Value::empty());
        assert_eq!(registry.node("a").unwrap().placeholder(), Some(&Value::from("x")));
        assert_eq!(registry.value("b"), Value::Bool(true));
        assert_eq!(registry.value("c"), Value::Bool(true));
        assert_eq!(registry.node("c").unwrap().default, None);
        assert_eq!(registry.value("d"), Value::from("fixed"));
    }

    #[test]
    fn test_checkbox_with_values() {
        let registry = registry(json!([
            {"bool": "verbose", "option": "v", "value": ["--verbose", false]}
        ]));
        assert_eq!(registry.node("verbose").unwrap().kind, OptionKind::Hidden);
        assert!(registry.node("verbose_checkbox").unwrap().is_proxy());
        assert_eq!(registry.value("verbose"), Value::Bool(false));
    }

    #[test]
    fn test_group_requirement() {
        let registry = registry(json!([
            {"group": [{"text": "a"}, {"text": "b"}, {"hidden": "c"}], "required": "Fill one"}
        ]));
        let group = &registry.groups()[0];
        assert_eq!(group.name, "_optgroup1");
        assert_eq!(group.members, vec!["a", "b"]);
        let errors = registry.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Fill one");
    }

    #[test]
    fn test_required_input_message() {
        let registry = registry(json!([
            {"text": "pattern", "required": true},
            {"text": "other", "required": "Give other", "default": "x"}
        ]));
        let errors = registry.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].option, "pattern");
        assert_eq!(errors[0].message, "text input required");
    }

    #[test]
    fn test_outfile_rules() {
        let registry = registry(json!([
            {"text": "out", "outfile": true},
            {"text": "log", "outfile": "log.txt"}
        ]));
        assert_eq!(registry.outfile_rules(), &[json!("out"), json!("log.txt")]);
    }
}
