//! A plugin descriptor placed at one step of a pipeline.

use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::config::Settings;
use crate::descriptor::PluginDescriptor;
use crate::error::Result;
use crate::options::{OptionKind, PreviousStep, Registry, RegistryConfig};
use crate::rules::{Compiler, Rule};
use crate::value::Value;

#[derive(Debug)]
pub struct PluginInstance {
    /// Identifier within the pipeline; clones at later steps carry the step number.
    pub id: String,
    /// Identifier of the descriptor in the library.
    pub source_id: String,
    pub descriptor: PluginDescriptor,
    /// Location the descriptor was read from.
    pub path: Option<String>,
    pub step: usize,
    pub job_name: String,
    pub registry: Registry,
    outfile_rules: Vec<Rule>,
    stdout_rule: Rule,
}

impl PluginInstance {
    /// Builds the registry of a descriptor placed at `step`.
    ///
    /// # Errors
    ///
    /// Fails when an option declaration is unusable, see [`Registry::register`].
    pub fn new(
        descriptor: PluginDescriptor,
        source_id: &str,
        path: Option<String>,
        step: usize,
        previous: Option<PreviousStep>,
        settings: &Settings,
    ) -> Result<Self> {
        let mut config = RegistryConfig::new(
            descriptor.title(),
            descriptor.option_prefix(&settings.prefix),
        );
        config.step = step;
        config.previous = previous;
        config.pipes = settings.pipes;
        config.sync_cooldown = Duration::from_millis(settings.sync_cooldown_ms);
        let registry = Registry::build(config, &descriptor.entries())?;

        let (outfile_rules, stdout_rule) = {
            let compiler = Compiler::new(&registry);
            let outfile_rules = descriptor
                .out_files
                .iter()
                .chain(registry.outfile_rules())
                .map(|rule| compiler.compile_or_noop(rule, None, None))
                .collect();
            (outfile_rules, compiler.compile_or_noop(&descriptor.stdout, None, None))
        };

        let id = if step == 0 {
            source_id.to_string()
        } else {
            format!("{source_id}{step}")
        };
        info!("Step {}: plugin {} ({id}).", step + 1, descriptor.title());
        Ok(Self {
            id,
            source_id: source_id.to_string(),
            job_name: descriptor.job_name.clone(),
            descriptor,
            path,
            step,
            registry,
            outfile_rules,
            stdout_rule,
        })
    }

    pub fn title(&self) -> &str {
        self.descriptor.title()
    }

    pub fn write(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.registry.write(key, value)
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.registry
            .resolve(key)
            .map(|name| self.registry.value(name))
    }

    pub fn attach(&mut self, key: &str, filename: &str, content: impl Into<String>) -> Result<()> {
        self.registry.attach(key, filename, content)
    }

    /// Output filenames the current values produce, empty results left out.
    pub fn outfiles(&self) -> Vec<String> {
        self.outfile_rules
            .iter()
            .filter_map(|rule| filename(rule.evaluate(&self.registry)))
            .collect()
    }

    pub fn stdout(&self) -> String {
        filename(self.stdout_rule.evaluate(&self.registry)).unwrap_or_default()
    }

    /// Whether a file input reads the previous step's standard output.
    pub fn is_piped(&self) -> bool {
        self.registry
            .nodes()
            .filter(|node| !node.is_disabled())
            .filter_map(|node| node.file())
            .any(|slot| slot.piped)
    }

    /// What this step offers to the file inputs of the next one.
    pub fn snapshot(&self) -> PreviousStep {
        let inputs = self
            .registry
            .nodes()
            .filter_map(|node| {
                let slot = node.file()?;
                if slot.filename.is_empty() || slot.piped {
                    return None;
                }
                let usage = match node.arg_name() {
                    Some(arg) if !arg.is_empty() => format!("option {arg}"),
                    _ => "a positional argument".to_string(),
                };
                Some((slot.filename.clone(), usage))
            })
            .collect();
        PreviousStep {
            outfiles: self.outfiles(),
            stdout: self.stdout(),
            inputs,
        }
    }

    /// The values a user changed from their defaults, keyed by node name.
    pub fn read_inputs(&self) -> IndexMap<String, Value> {
        let mut inputs = IndexMap::new();
        for node in self.registry.nodes() {
            if node.derivation.is_some() || matches!(node.kind, OptionKind::File(_)) {
                continue;
            }
            let value = self.registry.value(&node.name);
            let keeps_empty = !(node.kind.is_textual() || node.kind == OptionKind::Hidden)
                && node.default.is_some();
            if value.is_empty() && !keeps_empty {
                continue;
            }
            if node.default.as_ref().is_some_and(|default| default.loose_eq(&value)) {
                continue;
            }
            inputs.insert(node.name.clone(), value);
        }
        inputs
    }

    /// Writes saved values in declaration order.
    ///
    /// Names the registry does not know are skipped with a warning, or a debug message
    /// when `quiet`.
    pub fn load_preset(&mut self, values: &IndexMap<String, Value>, quiet: bool) -> Result<()> {
        let names: Vec<String> = self.registry.nodes().map(|node| node.name.clone()).collect();
        for name in &names {
            if let Some(value) = values.get(name) {
                self.registry.write(name, value.clone())?;
            }
        }
        for key in values.keys().filter(|key| !names.contains(*key)) {
            match self.registry.resolve(key).map(str::to_string) {
                Some(name) => self.registry.write(&name, values[key].clone())?,
                None if quiet => debug!("Preset value `{key}` matches no input of {}.", self.title()),
                None => warn!("Preset value `{key}` matches no input of {}.", self.title()),
            }
        }
        Ok(())
    }
}

fn filename(value: Value) -> Option<String> {
    match value {
        Value::Text(text) if !text.is_empty() => Some(text),
        Value::Number(_) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn instance(descriptor: serde_json::Value) -> PluginInstance {
        let descriptor = PluginDescriptor::from_json(descriptor).unwrap();
        PluginInstance::new(descriptor, "tool", None, 0, None, &Settings::default()).unwrap()
    }

    #[test]
    fn test_outfiles_follow_values() {
        let mut plugin = instance(json!({
            "program": "tool",
            "outFiles": ["summary.txt", ""],
            "options": [{"text": "out", "outfile": true}]
        }));
        assert_eq!(plugin.outfiles(), vec!["summary.txt"]);
        plugin.write("out", "result.fa").unwrap();
        assert_eq!(plugin.outfiles(), vec!["summary.txt", "result.fa"]);
        assert_eq!(plugin.stdout(), "output.log");
    }

    #[test]
    fn test_stdout_rule_reads_inputs() {
        let mut plugin = instance(json!({
            "program": "tool",
            "stdout": {"format is csv": "table.csv", "format is txt": "output.txt"},
            "options": [
                {"name": "format", "type": "select", "selection": ["txt", "csv"], "default": "txt"}
            ]
        }));
        assert_eq!(plugin.stdout(), "output.txt");
        plugin.write("format", "csv").unwrap();
        assert_eq!(plugin.stdout(), "table.csv");
    }

    #[test]
    fn test_read_inputs_skips_defaults() {
        let mut plugin = instance(json!({
            "program": "tool",
            "options": [
                {"text": "pattern", "option": "e"},
                {"int": "threads", "default": 4},
                {"bool": "count", "option": "c"}
            ]
        }));
        assert!(plugin.read_inputs().is_empty());
        plugin.write("pattern", "foo").unwrap();
        plugin.write("threads", 4.0).unwrap();
        plugin.write("c", true).unwrap();
        let inputs = plugin.read_inputs();
        assert_eq!(inputs.get("e"), Some(&Value::from("foo")));
        assert_eq!(inputs.get("c"), Some(&Value::Bool(true)));
        assert_eq!(inputs.get("threads"), None);
    }

    #[test]
    fn test_preset_round_trip() {
        let options = json!({
            "program": "tool",
            "options": [{"text": "pattern", "option": "e"}, {"bool": "count", "option": "c"}]
        });
        let mut first = instance(options.clone());
        first.write("e", "needle").unwrap();
        first.write("c", true).unwrap();

        let mut second = instance(options);
        let mut preset = first.read_inputs();
        preset.insert("unknown".to_string(), Value::from("x"));
        second.load_preset(&preset, false).unwrap();
        assert_eq!(second.value("e"), Some(Value::from("needle")));
        assert_eq!(second.value("count"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_snapshot_lists_inputs() {
        let mut plugin = instance(json!({
            "program": "tool",
            "options": [{"file": "reads", "option": "i"}]
        }));
        plugin.attach("i", "reads.fq", "ACGT").unwrap();
        let snapshot = plugin.snapshot();
        assert_eq!(snapshot.stdout, "output.log");
        assert_eq!(
            snapshot.inputs,
            vec![("reads.fq".to_string(), "option -i".to_string())]
        );
    }
}
