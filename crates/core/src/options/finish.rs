use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value as JsonValue;

use super::node::{Derivation, OptionKind, OptionNode, Toggle, Validation};
use super::registry::Registry;
use super::selection::Visibility;
use crate::descriptor::{is_flag_name, split_prefix};
use crate::rules::Compiler;
use crate::value::Value;

impl Registry {
    /// Second pass, run once every declaration is registered.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.add_linked_options();
        self.add_merge_targets();
        self.track_linked_options();
        self.compile_rules();
        self.compile_visibility();
        self.initial_sync();
        self.finished = true;
        debug!(
            "Plugin {} has {} inputs.",
            self.config.plugin,
            self.nodes.len()
        );
    }

    /// Linked options that match no node become hidden nodes placed after their selection.
    fn add_linked_options(&mut self) {
        let selections: Vec<(String, Vec<String>, IndexMap<String, Value>)> = self
            .nodes
            .values()
            .filter_map(|node| {
                let list = node.selection()?;
                let defaults = list
                    .default
                    .as_ref()
                    .and_then(|default| list.item_for(default))
                    .map(|item| item.linked.clone())
                    .unwrap_or_default();
                Some((node.name.clone(), list.linked_keys(), defaults))
            })
            .collect();

        for (selection, keys, defaults) in selections {
            let Some(mut position) = self.nodes.get_index_of(&selection) else {
                continue;
            };
            for key in keys {
                if self.resolve(&key).is_some() {
                    continue;
                }
                let value = defaults.get(&key).cloned().unwrap_or_default();
                let mut node = OptionNode::new(key.clone(), OptionKind::Hidden);
                node.title = key.clone();
                node.prefix = self.config.prefix.clone();
                if is_flag_name(&key) {
                    let (prefix, option) = split_prefix(&key);
                    if let Some(prefix) = prefix {
                        node.prefix = prefix.to_string();
                    }
                    node.option = Some(option.to_string());
                }
                node.value = value.clone();
                node.default = Some(value);
                debug!("Added hidden input `{key}` linked from `{selection}`.");
                position += 1;
                self.nodes.shift_insert(position, key, node);
            }
        }
    }

    /// Every merged argument gets a hidden node joining its components.
    fn add_merge_targets(&mut self) {
        for (target, (group, prefix)) in std::mem::take(&mut self.pending_merges) {
            if let Some(node) = self.nodes.get_mut(&target) {
                node.derivation = Some(Derivation::Merge(group));
                continue;
            }
            let position = group
                .sources
                .iter()
                .filter_map(|source| self.nodes.get_index_of(source))
                .max()
                .map_or(self.nodes.len(), |index| index + 1);
            let mut node = OptionNode::new(target.clone(), OptionKind::Hidden);
            node.title = target.clone();
            node.option = Some(target.clone());
            node.prefix = prefix;
            node.derivation = Some(Derivation::Merge(group));
            debug!("Merging inputs into `{target}`.");
            self.nodes.shift_insert(position, target, node);
        }
    }

    fn track_linked_options(&mut self) {
        let tracked: Vec<(String, IndexMap<String, String>)> = self
            .nodes
            .values()
            .filter_map(|node| {
                let list = node.selection()?;
                let mut tracked = IndexMap::new();
                for key in list.linked_keys() {
                    match self.resolve(&key) {
                        Some(target) => {
                            tracked.insert(key, target.to_string());
                        }
                        None => warn!("Selection `{}` links unknown input `{key}`.", node.name),
                    }
                }
                Some((node.name.clone(), tracked))
            })
            .collect();

        for (name, tracked) in tracked {
            if let Some(OptionKind::Selection(list)) = self.nodes.get_mut(&name).map(|node| &mut node.kind) {
                list.tracked = tracked;
            }
        }
    }

    fn compile_rules(&mut self) {
        for pending in std::mem::take(&mut self.pending_rules) {
            let (toggle, validation) = {
                let compiler = Compiler::for_option(&*self, &pending.name);
                let toggle = match (&pending.enable, &pending.disable) {
                    (Some(rule), _) => Some(Toggle {
                        rule: compiler.compile_or_noop(rule, None, None),
                        enables: true,
                    }),
                    (None, Some(rule)) => Some(Toggle {
                        rule: compiler.compile_or_noop(rule, None, None),
                        enables: false,
                    }),
                    (None, None) => None,
                };
                let validation = pending.validation.as_ref().map(|rule| match rule {
                    JsonValue::Bool(true) => {
                        Validation::Required(format!("{} input required", pending.type_name))
                    }
                    JsonValue::String(message) => Validation::Required(message.clone()),
                    other => Validation::Rule(compiler.compile_or_noop(other, None, None)),
                });
                (toggle, validation)
            };
            if let Some(node) = self.nodes.get_mut(&pending.name) {
                node.toggle = toggle;
                node.validation = validation;
            }
        }
    }

    fn compile_visibility(&mut self) {
        let mut compiled = Vec::new();
        for (index, node) in self.nodes.values().enumerate() {
            let Some(list) = node.selection() else {
                continue;
            };
            let compiler = Compiler::for_option(&*self, &node.name);
            for (position, item) in list.items.iter().enumerate() {
                if let Some((hide, rule)) = &item.pending_visibility {
                    let rule = compiler.compile_or_noop(rule, None, None);
                    let visibility = if *hide {
                        Visibility::Hide(rule)
                    } else {
                        Visibility::Show(rule)
                    };
                    compiled.push((index, position, visibility));
                }
            }
        }

        for (index, position, visibility) in compiled {
            if let Some((_, node)) = self.nodes.get_index_mut(index) {
                if let OptionKind::Selection(list) = &mut node.kind {
                    if let Some(item) = list.items.get_mut(position) {
                        item.pending_visibility = None;
                        item.visibility = Some(visibility);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::descriptor::PluginDescriptor;
    use crate::options::RegistryConfig;

    fn registry(options: JsonValue) -> Registry {
        let descriptor =
            PluginDescriptor::from_json(json!({"program": "tool", "options": options})).unwrap();
        Registry::build(RegistryConfig::new("tool", "-"), &descriptor.entries()).unwrap()
    }

    #[test]
    fn test_unknown_linked_options_become_hidden_inputs() {
        let registry = registry(json!([
            {"select": "Mode", "selection": [
                {"title": "Fast", "option": {"--speed": "high"}, "default": true},
                {"title": "Slow", "option": {"--speed": "low"}}
            ]},
            {"text": "last"}
        ]));
        let names: Vec<_> = registry.nodes().map(|node| node.name.as_str()).collect();
        assert_eq!(names, vec!["trackName1", "--speed", "last"]);
        let added = registry.node("--speed").unwrap();
        assert_eq!(added.arg_name(), Some("--speed".to_string()));
        assert_eq!(registry.value("--speed"), Value::from("high"));
    }

    #[test]
    fn test_merge_target_follows_its_components() {
        let registry = registry(json!([
            {"name": "x", "type": "int", "option": "size", "merge": true},
            {"name": "y", "type": "int", "option": "size", "merge": true},
            {"text": "after"}
        ]));
        let names: Vec<_> = registry.nodes().map(|node| node.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "size", "after"]);
        let target = registry.node("size").unwrap();
        assert_eq!(target.arg_name(), Some("-size".to_string()));
        assert!(registry.node("x").unwrap().is_proxy());
    }

    #[test]
    fn test_rules_may_reference_later_inputs() {
        let registry = registry(json!([
            {"int": "threads", "enable": "mode is fast"},
            {"text": "mode", "required": "Mode needed"}
        ]));
        let toggle = registry.node("threads").unwrap().toggle.as_ref().unwrap();
        assert!(toggle.enables);
        assert!(registry.node("threads").unwrap().is_disabled());
        assert_eq!(
            registry.node("mode").unwrap().validation,
            Some(Validation::Required("Mode needed".to_string()))
        );
    }

    #[test]
    fn test_selection_tracks_resolved_nodes() {
        let registry = registry(json!([
            {"text": "level", "option": "l", "title": "Level"},
            {"select": "Preset", "name": "preset", "selection": [
                {"title": "High", "option": {"Level": 9}}
            ]}
        ]));
        let list = registry.node("preset").unwrap().selection().unwrap();
        assert_eq!(list.tracked.get("Level"), Some(&"l".to_string()));
    }

    #[test]
    fn test_item_visibility_compiled() {
        let registry = registry(json!([
            {"bool": "advanced"},
            {"select": "Level", "name": "level", "selection": [
                "basic",
                {"title": "expert", "show": "advanced"}
            ]}
        ]));
        let list = registry.node("level").unwrap().selection().unwrap();
        let expert = list.item_for(&Value::from("expert")).unwrap();
        assert!(expert.pending_visibility.is_none());
        assert!(!expert.is_visible(&registry));
    }
}
