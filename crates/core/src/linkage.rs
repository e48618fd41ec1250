//! Propagation of value changes between the nodes of a registry.
//!
//! Writes are synchronous and depth-first. A selection pushes the linked values of its
//! chosen item; every change to a tracked node makes the selections tracking it look for
//! the item matching the new values. Each selection carries a [`SyncGuard`] so that its own
//! pushes never make it re-match itself, and so that a push is not undone by the echo of
//! the values it wrote. Guards only live for one external write.

use std::collections::VecDeque;
use std::time::Instant;

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::error::{Error, Result, SyncFailure};
use crate::options::{
    is_marker, unique_filename, Derivation, MergeGroup, OptionKind, Registry, LOCAL_MARKER,
    PREVIOUS_STEP_PATH,
};
use crate::value::{Value, PIPE_MARKER};

/// Deepest chain of derived writes followed before giving up.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Default)]
pub(crate) struct SyncGuard {
    locked: bool,
    cooldown_until: Option<Instant>,
}

impl SyncGuard {
    fn engaged(&self) -> bool {
        self.locked || self.cooldown_until.is_some_and(|until| Instant::now() < until)
    }
}

impl Registry {
    /// Writes a value to the node `key` resolves to and propagates the change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] when no node matches `key`.
    pub fn write(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let name = self
            .resolve(key)
            .map(str::to_string)
            .ok_or_else(|| Error::UnknownOption(self.config.plugin.clone(), key.to_string()))?;
        self.guards.clear();
        self.assign(&name, value.into(), 0);
        self.settle_toggles();
        Ok(())
    }

    /// Attaches uploaded content to a file input, marking it local.
    pub fn attach(&mut self, key: &str, filename: &str, content: impl Into<String>) -> Result<()> {
        let name = self
            .resolve(key)
            .map(str::to_string)
            .ok_or_else(|| Error::UnknownOption(self.config.plugin.clone(), key.to_string()))?;
        self.guards.clear();
        let selection = format!("{name}_sel");
        if self.nodes.contains_key(&selection) {
            self.assign(&selection, Value::from(LOCAL_MARKER), 0);
        }
        match self.nodes.get_mut(&name).map(|node| &mut node.kind) {
            Some(OptionKind::File(slot)) => {
                slot.filepath = String::new();
                slot.piped = false;
                slot.content = Some(content.into());
            }
            _ => {
                warn!("Cannot attach `{filename}`: `{name}` is not a file input.");
                return Ok(());
            }
        }
        self.assign(&name, Value::from(filename), 0);
        self.settle_toggles();
        Ok(())
    }

    pub(crate) fn initial_sync(&mut self) {
        let selections: Vec<String> = self
            .nodes
            .values()
            .filter(|node| node.selection().is_some())
            .map(|node| node.name.clone())
            .collect();
        for selection in &selections {
            self.selection_changed(selection, 0);
        }
        for selection in &selections {
            self.match_selection(selection, 0);
        }
        self.settle_toggles();
        self.guards.clear();
    }

    fn assign(&mut self, name: &str, value: Value, depth: usize) {
        if depth > MAX_DEPTH {
            warn!("Stopped writing `{name}`: chain of linked inputs deeper than {MAX_DEPTH}.");
            return;
        }
        let Some(node) = self.nodes.get(name) else {
            return;
        };
        let derivation = node.derivation.clone();
        let is_file = node.file().is_some();
        let coerced = match &node.kind {
            OptionKind::Numeric(format) => format.apply(&value),
            OptionKind::Boolean => Value::Bool(value.as_flag()),
            OptionKind::Selection(list) => list.choose(&value),
            _ => value.clone(),
        };

        match derivation {
            Some(Derivation::Checkbox {
                source,
                checked,
                unchecked,
            }) => {
                let flag = if value.loose_eq(&checked) {
                    true
                } else if value.loose_eq(&unchecked) {
                    false
                } else {
                    value.as_flag()
                };
                self.assign(&source, Value::Bool(flag), depth + 1);
                return;
            }
            Some(Derivation::Merge(group)) => {
                if let Err(failure) = self.write_merged(name, &group, &value, depth) {
                    warn!("{failure}");
                }
                return;
            }
            None => {}
        }

        if is_file {
            let before = self.value(name);
            self.write_file(name, &value);
            if self.value(name) != before {
                self.propagate(name, depth);
            }
            return;
        }

        let Some(node) = self.nodes.get_mut(name) else {
            return;
        };
        if node.value == coerced {
            return;
        }
        debug!("`{name}` = `{coerced}`");
        node.value = coerced;
        self.propagate(name, depth);
    }

    /// Splits `value` on the separator and hands the parts to the components in order.
    ///
    /// A component that does not take its part as given leaves the part for the next one.
    fn write_merged(
        &mut self,
        name: &str,
        group: &MergeGroup,
        value: &Value,
        depth: usize,
    ) -> std::result::Result<(), SyncFailure> {
        let text = match value {
            Value::Bool(_) => return Ok(()),
            other => other.to_string(),
        };
        let mut parts: VecDeque<String> = if group.separator.is_empty() {
            VecDeque::from([text])
        } else {
            text.split(group.separator.as_str()).map(str::to_string).collect()
        };

        for source in &group.sources {
            let part = parts.front().cloned().unwrap_or_default();
            self.assign(source, Value::Text(part.clone()), depth + 1);
            if self.value(source) == Value::Text(part) {
                parts.pop_front();
            }
        }

        if parts.is_empty() {
            Ok(())
        } else {
            Err(SyncFailure {
                target: name.to_string(),
                unassigned: parts.into(),
            })
        }
    }

    /// Stores a filename in a file slot. Local files get a name no other local file uses.
    fn write_file(&mut self, name: &str, value: &Value) {
        let text = match value {
            Value::Text(text) => {
                text.trim_start_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            }
            _ => "",
        };
        let Some(slot) = self.nodes.get(name).and_then(|node| node.file()) else {
            return;
        };

        let mut filename = text.to_string();
        if !filename.is_empty() && slot.is_local() {
            if let Some(fixed) = &slot.fixed_name {
                filename = fixed.clone();
            }
            let taken: Vec<&str> = self
                .nodes
                .values()
                .filter(|node| node.name != name)
                .filter_map(|node| node.file())
                .filter(|other| other.is_local() && !other.filename.is_empty())
                .map(|other| other.filename.as_str())
                .collect();
            filename = unique_filename(&filename, &taken);
        }

        if let Some(OptionKind::File(slot)) = self.nodes.get_mut(name).map(|node| &mut node.kind) {
            debug!("File input `{name}` = `{filename}`");
            slot.filename = filename;
        }
    }

    fn propagate(&mut self, name: &str, depth: usize) {
        if depth > MAX_DEPTH {
            warn!("Stopped propagating `{name}`: chain of linked inputs deeper than {MAX_DEPTH}.");
            return;
        }
        if self.nodes.get(name).is_some_and(|node| node.selection().is_some()) {
            self.selection_changed(name, depth);
        }

        let trackers: Vec<String> = self
            .nodes
            .values()
            .filter(|node| node.name != name)
            .filter(|node| {
                node.selection()
                    .is_some_and(|list| list.tracked.values().any(|target| target == name))
            })
            .map(|node| node.name.clone())
            .collect();
        for tracker in trackers {
            self.match_selection(&tracker, depth + 1);
        }

        let dependants: Vec<String> = self
            .nodes
            .values()
            .filter(|node| node.derivation.as_ref().is_some_and(|derivation| derivation.depends_on(name)))
            .map(|node| node.name.clone())
            .collect();
        for dependant in dependants {
            self.propagate(&dependant, depth + 1);
        }
    }

    /// A selection changed: feed its file input, then push the linked values of the new
    /// item after restoring the values the previous item replaced.
    fn selection_changed(&mut self, name: &str, depth: usize) {
        let value = self.value(name);
        let Some(list) = self.nodes.get(name).and_then(|node| node.selection()) else {
            return;
        };
        let file_input = list.file_input.clone();
        let linked = list.item_for(&value).map(|item| item.linked.clone());

        if let Some(file) = file_input {
            self.feed_file(&file, &value, depth);
        }
        let Some(linked) = linked else {
            return;
        };
        if self.guard_engaged(name) {
            return;
        }

        self.lock(name);
        let restore = match self.nodes.get_mut(name).map(|node| &mut node.kind) {
            Some(OptionKind::Selection(list)) => std::mem::take(&mut list.restore),
            _ => IndexMap::new(),
        };
        for (key, previous) in restore {
            if let Some(target) = self.resolve(&key).map(str::to_string) {
                self.assign(&target, previous, depth + 1);
            }
        }

        let mut remembered = IndexMap::new();
        for (key, linked_value) in linked {
            match self.resolve(&key).map(str::to_string) {
                Some(target) => {
                    remembered.insert(key, self.value(&target));
                    self.assign(&target, linked_value, depth + 1);
                }
                None => warn!("Selection `{name}` links unknown input `{key}`."),
            }
        }
        if let Some(OptionKind::Selection(list)) = self.nodes.get_mut(name).map(|node| &mut node.kind) {
            list.restore = remembered;
        }
        self.release(name);
    }

    /// Hands the choice of a file selection to its file input.
    fn feed_file(&mut self, file: &str, choice: &Value, depth: usize) {
        let choice_text = choice.to_string();
        if let Some(OptionKind::File(slot)) = self.nodes.get_mut(file).map(|node| &mut node.kind) {
            if choice_text == LOCAL_MARKER {
                slot.filepath = String::new();
            } else {
                slot.filepath = PREVIOUS_STEP_PATH.to_string();
                slot.content = None;
            }
            slot.piped = choice_text == PIPE_MARKER;
        }
        let filename = if is_marker(&choice_text) {
            Value::empty()
        } else {
            choice.clone()
        };
        self.write_file(file, &filename);
        self.propagate(file, depth + 1);
    }

    /// Points a selection at the first item whose linked values all match the current
    /// values, or back to its default when the current item no longer matches.
    fn match_selection(&mut self, name: &str, depth: usize) {
        if self.guard_engaged(name) {
            return;
        }
        let Some(list) = self.nodes.get(name).and_then(|node| node.selection()) else {
            return;
        };
        if list.tracked.is_empty() {
            return;
        }

        let current: IndexMap<&str, Value> = list
            .tracked
            .iter()
            .map(|(key, target)| (key.as_str(), self.tracked_value(target)))
            .collect();
        let mut fallback = Value::empty();
        let mut matched = None;
        for item in &list.items {
            if item.linked.is_empty() {
                if list.default.as_ref().is_some_and(|default| default.loose_eq(&item.value)) {
                    fallback = item.value.clone();
                }
                continue;
            }
            let matches = item.linked.iter().all(|(key, value)| {
                current
                    .get(key.as_str())
                    .is_some_and(|current| current.loose_eq(value))
            });
            if matches {
                matched = Some(item.value.clone());
                break;
            }
        }

        let selected = self.value(name);
        let selected_has_links = list
            .item_for(&selected)
            .is_some_and(|item| !item.linked.is_empty());
        let target = match matched {
            Some(value) if !value.loose_eq(&selected) => Some(value),
            Some(_) => None,
            None if selected_has_links => Some(fallback),
            None => None,
        };
        let Some(target) = target else {
            return;
        };

        debug!("Selection `{name}` follows its linked inputs to `{target}`.");
        self.lock(name);
        if let Some(OptionKind::Selection(list)) = self.nodes.get_mut(name).map(|node| &mut node.kind) {
            list.restore.clear();
        }
        self.assign(name, target, depth + 1);
        self.unlock(name);
    }

    /// Value of a tracked node, reading an empty text input as its placeholder.
    fn tracked_value(&self, name: &str) -> Value {
        let value = self.value(name);
        match self.nodes.get(name).and_then(|node| node.placeholder()) {
            Some(placeholder) if value.is_empty() => placeholder.clone(),
            _ => value,
        }
    }

    /// Applies enable/disable rules until no node changes state.
    ///
    /// A disabled node is reset to its placeholder or empty; a truthy value is kept aside
    /// and restored when the node is enabled again.
    pub(crate) fn settle_toggles(&mut self) {
        let toggled: Vec<String> = self
            .nodes
            .values()
            .filter(|node| node.toggle.is_some())
            .map(|node| node.name.clone())
            .collect();
        if toggled.is_empty() {
            return;
        }

        for _ in 0..=self.nodes.len() {
            let mut changed = false;
            for name in &toggled {
                let Some(node) = self.nodes.get(name) else {
                    continue;
                };
                let Some(toggle) = &node.toggle else {
                    continue;
                };
                let disable = toggle.disables(&toggle.rule.evaluate(self));
                if disable == node.disabled {
                    continue;
                }
                changed = true;
                if disable {
                    self.disable(name);
                } else {
                    self.enable(name);
                }
            }
            if !changed {
                return;
            }
        }
        warn!(
            "Enable/disable rules of plugin {} keep flipping; giving up.",
            self.config.plugin
        );
    }

    fn disable(&mut self, name: &str) {
        let current = self.value(name);
        let Some(node) = self.nodes.get_mut(name) else {
            return;
        };
        let reset = node.placeholder().cloned().unwrap_or_default();
        node.disabled = true;
        if current.is_truthy() {
            node.snapshot = Some(current);
        }
        info!("Input `{name}` disabled.");
        self.assign(name, reset, 0);
    }

    fn enable(&mut self, name: &str) {
        let Some(node) = self.nodes.get_mut(name) else {
            return;
        };
        node.disabled = false;
        let snapshot = node.snapshot.take();
        info!("Input `{name}` enabled.");
        if let Some(snapshot) = snapshot {
            self.assign(name, snapshot, 0);
        }
    }

    fn guard_engaged(&self, name: &str) -> bool {
        self.guards.get(name).is_some_and(SyncGuard::engaged)
    }

    fn lock(&mut self, name: &str) {
        self.guards.entry(name.to_string()).or_default().locked = true;
    }

    fn unlock(&mut self, name: &str) {
        if let Some(guard) = self.guards.get_mut(name) {
            guard.locked = false;
        }
    }

    /// Unlocks and starts the cooldown.
    fn release(&mut self, name: &str) {
        let until = Instant::now() + self.config.sync_cooldown;
        let guard = self.guards.entry(name.to_string()).or_default();
        guard.locked = false;
        guard.cooldown_until = Some(until);
    }
}
