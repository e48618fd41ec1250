//! Plugin descriptors and the normalisation of their option declarations.
//!
//! A descriptor is a JSON (or YAML) document naming a `program` and its `options`. Option
//! declarations come in a loose shorthand (`{"text": "pattern", "option": "e"}`), which
//! [`OptionDecl`] turns into explicit fields. Groups are flattened into [`Entry`] trees
//! carrying inherited attributes down to their leaves.

use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::config::{DEFAULT_JOB_NAME, DEFAULT_STDOUT};
use crate::error::{Error, Result};

/// Shorthand keys that name the input type of a declaration.
const TYPE_KEYS: [&str; 11] = [
    "text", "string", "number", "int", "float", "bool", "tickbox", "checkbox", "hidden",
    "select", "file",
];

/// Keys that turn a declaration into a group of options.
const GROUP_KEYS: [&str; 3] = ["line", "group", "section"];

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    name: Option<String>,
    id: Option<String>,
    version: Option<JsonValue>,
    program: Option<String>,
    prefix: Option<String>,
    value_sep: Option<String>,
    job_name: Option<String>,
    out_files: Option<JsonValue>,
    stdout: Option<JsonValue>,
    config_file: Option<String>,
    config_param: Option<String>,
    options: Option<Vec<JsonValue>>,
}

/// A validated plugin descriptor.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub name: Option<String>,
    pub id: Option<String>,
    pub version: Option<String>,
    pub program: String,
    pub prefix: Option<String>,
    pub value_sep: Option<String>,
    pub job_name: String,
    pub out_files: Vec<JsonValue>,
    pub stdout: JsonValue,
    pub config_file: Option<String>,
    pub config_param: String,
    pub options: Vec<JsonValue>,
}

impl PluginDescriptor {
    /// Validates a parsed descriptor document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DescriptorFormat`] when the document is not an object, and
    /// [`Error::MissingKey`] when `options` or `program` is absent.
    pub fn from_json(document: JsonValue) -> Result<Self> {
        if !document.is_object() {
            return Err(Error::DescriptorFormat(format!(
                "expected an object, found `{document}`"
            )));
        }
        let raw: RawDescriptor = serde_json::from_value(document)
            .map_err(|err| Error::DescriptorFormat(err.to_string()))?;

        let options = raw.options.ok_or(Error::MissingKey("options"))?;
        let program = raw
            .program
            .filter(|program| !program.is_empty())
            .ok_or(Error::MissingKey("program"))?;

        let out_files = match raw.out_files {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Array(files)) => files,
            Some(file) => vec![file],
        };

        Ok(Self {
            name: raw.name,
            id: raw.id,
            version: raw.version.map(|version| match version {
                JsonValue::String(text) => text,
                other => other.to_string(),
            }),
            program,
            prefix: raw.prefix,
            value_sep: raw.value_sep,
            job_name: raw
                .job_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_JOB_NAME.to_string()),
            out_files,
            stdout: raw
                .stdout
                .unwrap_or_else(|| JsonValue::String(DEFAULT_STDOUT.to_string())),
            config_file: raw.config_file.filter(|file| !file.is_empty()),
            config_param: raw.config_param.unwrap_or_default(),
            options,
        })
    }

    /// Displayed title: `name`, falling back to the program.
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.program)
    }

    /// Prefix for options that declare none. Config-file plugins default to no prefix.
    pub fn option_prefix(&self, global: &str) -> String {
        match (&self.prefix, &self.config_file) {
            (Some(prefix), _) => prefix.clone(),
            (None, Some(_)) => String::new(),
            (None, None) => global.to_string(),
        }
    }

    /// Parses the option tree into entries.
    pub fn entries(&self) -> Vec<Entry> {
        parse_entries(&self.options, &Inherited::default())
    }
}

/// Argument placement hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    Start,
    #[default]
    Natural,
    End,
}

impl Order {
    fn parse(value: Option<&JsonValue>) -> Self {
        match value.and_then(JsonValue::as_str) {
            Some("start") => Order::Start,
            Some("end") => Order::End,
            _ => Order::Natural,
        }
    }
}

/// Attributes a group passes down to its members.
#[derive(Debug, Clone, Default)]
struct Inherited {
    prefix: Option<JsonValue>,
    merge: Option<JsonValue>,
}

/// One element of an option tree.
#[derive(Debug, Clone)]
pub enum Entry {
    Option(Box<OptionDecl>),
    Group(Group),
}

#[derive(Debug, Clone)]
pub struct Group {
    pub name: Option<String>,
    /// Message shown when every input of the group is left empty.
    pub required: Option<String>,
    pub entries: Vec<Entry>,
}

/// A normalised option declaration.
#[derive(Debug, Clone, Default)]
pub struct OptionDecl {
    /// The declared `type`, or the shorthand key that named it.
    pub type_name: String,
    pub option: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub desc: Option<String>,
    pub prefix: Option<String>,
    pub default: Option<JsonValue>,
    pub value: Option<JsonValue>,
    pub merge: Option<String>,
    /// Separator joining the chosen items of a selection that takes several.
    pub multi: Option<String>,
    pub enable: Option<JsonValue>,
    pub disable: Option<JsonValue>,
    pub required: Option<JsonValue>,
    pub check: Option<JsonValue>,
    pub selection: Option<JsonValue>,
    pub caption: Option<String>,
    pub outfile: Option<JsonValue>,
    pub order: Order,
}

/// Whether `label` can be used as an argument name.
pub(crate) fn is_flag_name(label: &str) -> bool {
    label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'))
}

/// Splits the leading non-word run off an argument name: `--out` is `("--", "out")`.
pub(crate) fn split_prefix(option: &str) -> (Option<&str>, &str) {
    let rest = option.trim_start_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_'));
    let prefix = &option[..option.len() - rest.len()];
    if prefix.is_empty() {
        (None, option)
    } else {
        (Some(prefix), rest)
    }
}

fn string_field(map: &Map<String, JsonValue>, key: &str) -> Option<String> {
    match map.get(key)? {
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

impl OptionDecl {
    /// Reads a declaration, filling `type`, `title` and `option` from shorthand keys.
    ///
    /// Returns `None` for empty objects, which are dropped with a warning.
    pub fn from_object(map: &Map<String, JsonValue>) -> Option<Self> {
        if map.is_empty() {
            warn!("Dropping an empty option declaration.");
            return None;
        }

        let mut type_name = string_field(map, "type");
        let mut title = string_field(map, "title");
        let mut option = string_field(map, "option");

        for (key, label) in map.iter().filter(|(key, _)| TYPE_KEYS.contains(&key.as_str())) {
            if type_name.is_none() {
                type_name = Some(key.clone());
            }
            let label = label.as_str().unwrap_or_default();
            if title.is_none() && key != "file" {
                title = Some(label.to_string());
            }
            if option.is_none() && key != "select" {
                if is_flag_name(label) {
                    option = Some(label.to_string());
                } else {
                    debug!("Cannot use `{label}` as an argument name; declare `name` instead.");
                }
            }
        }

        let type_name = type_name
            .filter(|name| TYPE_KEYS.contains(&name.as_str()))
            .unwrap_or_else(|| "text".to_string());

        let separator = |key: &str| match map.get(key) {
            Some(JsonValue::Bool(true)) => Some(",".to_string()),
            Some(JsonValue::String(separator)) => Some(separator.clone()),
            _ => None,
        };
        let merge = separator("merge");
        let multi = separator("multi");

        Some(Self {
            type_name,
            option,
            name: string_field(map, "name").filter(|name| !name.is_empty()),
            title,
            desc: string_field(map, "desc"),
            prefix: string_field(map, "prefix"),
            default: map.get("default").cloned(),
            value: map.get("value").cloned(),
            merge,
            multi,
            enable: map.get("enable").cloned(),
            disable: map.get("disable").cloned(),
            required: map.get("required").cloned(),
            check: map.get("check").cloned(),
            selection: map.get("selection").cloned(),
            caption: string_field(map, "caption"),
            outfile: map.get("outfile").cloned(),
            order: Order::parse(map.get("order")),
        })
    }

    /// The validation rule: `required`, else `check`.
    pub fn validation(&self) -> Option<&JsonValue> {
        self.required
            .as_ref()
            .or(self.check.as_ref())
            .filter(|rule| !matches!(rule, JsonValue::Null | JsonValue::Bool(false)))
    }

    /// A `required` message that is a plain string.
    pub fn required_message(&self) -> Option<&str> {
        self.required.as_ref().and_then(JsonValue::as_str)
    }
}

fn parse_entries(options: &[JsonValue], inherited: &Inherited) -> Vec<Entry> {
    options
        .iter()
        .filter_map(|option| parse_entry(option, inherited))
        .collect()
}

fn parse_entry(option: &JsonValue, inherited: &Inherited) -> Option<Entry> {
    // text labels and `info` entries only matter to a user interface
    let JsonValue::Object(map) = option else {
        return None;
    };
    if map.contains_key("info") {
        return None;
    }

    let mut map = map.clone();
    if map.get("prefix").is_none() {
        if let Some(prefix) = &inherited.prefix {
            map.insert("prefix".to_string(), prefix.clone());
        }
    }
    if map.get("merge").is_none() {
        if let Some(merge) = &inherited.merge {
            map.insert("merge".to_string(), merge.clone());
        }
    }

    let members = GROUP_KEYS
        .iter()
        .find_map(|key| match map.get(*key) {
            Some(JsonValue::Array(members)) => Some(members.clone()),
            _ => None,
        })
        .or_else(|| match map.get("options") {
            Some(JsonValue::Array(members)) => Some(members.clone()),
            _ => None,
        });

    let Some(members) = members else {
        return OptionDecl::from_object(&map).map(|decl| Entry::Option(Box::new(decl)));
    };

    let inherited = Inherited {
        prefix: map.get("prefix").cloned(),
        merge: map.get("merge").cloned(),
    };
    Some(Entry::Group(Group {
        name: string_field(&map, "name"),
        required: map
            .get("required")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        entries: parse_entries(&members, &inherited),
    }))
}
