//! Selection lists: items, their linked options and the state kept while syncing them.

use indexmap::IndexMap;
use log::warn;
use serde_json::Value as JsonValue;

use crate::rules::{Rule, Scope};
use crate::value::Value;

/// Caption shown by selections that declare no default item.
pub const DEFAULT_CAPTION: &str = "Select...";

#[derive(Debug, Clone, PartialEq)]
pub enum Visibility {
    Hide(Rule),
    Show(Rule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionItem {
    pub title: String,
    pub value: Value,
    pub desc: String,
    /// Option values applied when this item is chosen, keyed as declared.
    pub linked: IndexMap<String, Value>,
    pub visibility: Option<Visibility>,
    /// `hide`/`show` rule waiting for the finishing pass, flagged `true` for `hide`.
    pub(crate) pending_visibility: Option<(bool, JsonValue)>,
}

impl SelectionItem {
    pub fn new(title: impl Into<String>, value: impl Into<Value>, desc: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            desc: desc.into(),
            linked: IndexMap::new(),
            visibility: None,
            pending_visibility: None,
        }
    }

    pub fn is_visible(&self, scope: &dyn Scope) -> bool {
        match &self.visibility {
            None => true,
            Some(Visibility::Hide(rule)) => !rule.evaluate(scope).is_truthy(),
            Some(Visibility::Show(rule)) => rule.evaluate(scope).is_truthy(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionList {
    pub items: Vec<SelectionItem>,
    /// Value of the designated default entry.
    pub default: Option<Value>,
    /// Linked option keys mapped to the node each resolves to.
    pub tracked: IndexMap<String, String>,
    /// Values to put back when the current item is replaced.
    pub(crate) restore: IndexMap<String, Value>,
    /// File node fed by this selection.
    pub file_input: Option<String>,
    /// Separator between chosen items when several can be chosen at once.
    pub multi: Option<String>,
}

impl SelectionList {
    /// Parses the `selection` attribute of a declaration.
    ///
    /// `declared_default` is the option's own evaluated `default`; a default item overrides it.
    /// Without any default a caption item with an empty value is put first.
    pub fn parse(
        selection: Option<&JsonValue>,
        caption: Option<&str>,
        declared_default: Option<Value>,
    ) -> Self {
        let entries = match selection {
            Some(JsonValue::Array(entries)) => entries.as_slice(),
            _ => {
                warn!("A `select` option needs a `selection` array.");
                &[]
            }
        };

        let mut default = declared_default;
        let mut items = Vec::with_capacity(entries.len() + 1);
        for entry in entries {
            match entry {
                JsonValue::String(_) | JsonValue::Number(_) => {
                    let value = Value::from(entry);
                    if value.is_empty() && default.is_none() {
                        default = Some(Value::empty());
                    }
                    items.push(SelectionItem::new(value.to_string(), value, ""));
                }
                JsonValue::Object(item) => {
                    let Some(parsed) = parse_item(item) else {
                        continue;
                    };
                    let declares_default = item.get("default").is_some_and(|flag| Value::from(flag).is_truthy());
                    if declares_default {
                        default = Some(parsed.value.clone());
                    } else if parsed.value.is_empty() && default.is_none() {
                        default = Some(Value::empty());
                    }
                    items.push(parsed);
                }
                other => warn!("Dropping selection item `{other}`: expected a string, number or object."),
            }
        }

        if default.is_none() {
            items.insert(
                0,
                SelectionItem::new(caption.unwrap_or(DEFAULT_CAPTION), Value::empty(), ""),
            );
        }

        Self {
            items,
            default,
            ..Self::default()
        }
    }

    /// Lets the list take several items at once, joined with `separator`.
    ///
    /// Linked options are dropped: a combination of items has no single set of values to push.
    pub fn multiple(mut self, separator: Option<String>) -> Self {
        if separator.is_none() {
            return self;
        }
        if self.items.iter().any(|item| !item.linked.is_empty()) {
            warn!("A selection taking several items cannot set linked options; links dropped.");
            self.items.iter_mut().for_each(|item| item.linked.clear());
        }
        self.multi = separator;
        self.default = self.default.take().map(|default| self.choose(&default));
        self
    }

    pub fn item_for(&self, value: &Value) -> Option<&SelectionItem> {
        self.items.iter().find(|item| item.value.loose_eq(value))
    }

    /// Items named by `value`, in the order given and without repeats.
    pub fn chosen(&self, value: &Value) -> Vec<&SelectionItem> {
        let text = value.to_string();
        let parts: Vec<&str> = match self.multi.as_deref() {
            Some(separator) if !separator.is_empty() => text.split(separator).collect(),
            _ => vec![text.as_str()],
        };

        let mut chosen: Vec<&SelectionItem> = Vec::new();
        for part in parts.into_iter().map(str::trim).filter(|part| !part.is_empty()) {
            match self.item_for(&Value::from(part)) {
                Some(item) if !chosen.iter().any(|known| std::ptr::eq(*known, item)) => chosen.push(item),
                Some(_) => {}
                None => warn!("`{part}` is not one of the choices; dropped."),
            }
        }
        chosen
    }

    /// The value stored for `value`: unchanged for single selections, otherwise the
    /// known items it names joined with the separator.
    pub fn choose(&self, value: &Value) -> Value {
        let Some(separator) = &self.multi else {
            return value.clone();
        };
        let values: Vec<String> = self
            .chosen(value)
            .iter()
            .map(|item| item.value.to_string())
            .collect();
        Value::Text(values.join(separator))
    }

    /// Every linked option key used by any item, in first-use order.
    pub fn linked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in self.items.iter().flat_map(|item| item.linked.keys()) {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }
}

fn scalar_text(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn parse_item(item: &serde_json::Map<String, JsonValue>) -> Option<SelectionItem> {
    let title = match item.get("title") {
        Some(JsonValue::Object(_) | JsonValue::Array(_)) => {
            warn!("Dropping selection item: `title` needs to be a string.");
            return None;
        }
        Some(title) => Value::from(title).to_string(),
        None => scalar_text(item.get("default"))
            .filter(|text| !text.is_empty())
            .or_else(|| item.get("option").and_then(JsonValue::as_str).map(str::to_string))
            .unwrap_or_default(),
    };
    let value = match item.get("value") {
        Some(JsonValue::Object(_) | JsonValue::Array(_)) => {
            warn!("Dropping selection item `{title}`: `value` needs to be a string.");
            return None;
        }
        Some(value) => Value::from(value),
        None => Value::from(title.as_str()),
    };

    let mut parsed = SelectionItem::new(
        title,
        value,
        item.get("desc").and_then(JsonValue::as_str).unwrap_or_default(),
    );

    parsed.pending_visibility = match (item.get("hide"), item.get("show")) {
        (Some(rule), _) => Some((true, rule.clone())),
        (None, Some(rule)) => Some((false, rule.clone())),
        (None, None) => None,
    };

    let linked = match item.get("option") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(linked)) => linked.clone(),
        Some(linked) => vec![linked.clone()],
    };
    for link in linked {
        match link {
            JsonValue::String(name) => {
                parsed.linked.insert(name, Value::Bool(true));
            }
            JsonValue::Object(values) => {
                parsed
                    .linked
                    .extend(values.iter().map(|(name, value)| (name.clone(), Value::from(value))));
            }
            other => warn!("Ignoring linked option `{other}`: expected a name or an object."),
        }
    }

    Some(parsed)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_caption_added_without_default() {
        let list = SelectionList::parse(Some(&json!(["a", "b"])), None, None);
        assert_eq!(list.items.len(), 3);
        assert_eq!(list.items[0].title, DEFAULT_CAPTION);
        assert_eq!(list.items[0].value, Value::empty());
        assert_eq!(list.default, None);
    }

    #[test]
    fn test_custom_caption() {
        let list = SelectionList::parse(Some(&json!(["a"])), Some("Pick one"), None);
        assert_eq!(list.items[0].title, "Pick one");
    }

    #[test]
    fn test_default_item_wins() {
        let list = SelectionList::parse(
            Some(&json!(["a", {"title": "B", "value": "b", "default": true}])),
            None,
            Some(Value::from("a")),
        );
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.default, Some(Value::from("b")));
    }

    #[test]
    fn test_empty_item_is_the_default() {
        let list = SelectionList::parse(Some(&json!(["", "x"])), None, None);
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.default, Some(Value::empty()));
    }

    #[test]
    fn test_multiple_choices_are_joined() {
        let list = SelectionList::parse(Some(&json!(["a", "b", "c"])), None, None)
            .multiple(Some(",".to_string()));
        assert_eq!(list.choose(&Value::from("c, a,zz,c")), Value::from("c,a"));
        assert_eq!(list.choose(&Value::empty()), Value::empty());
        let titles: Vec<_> = list
            .chosen(&Value::from("b,a"))
            .iter()
            .map(|item| item.title.as_str())
            .collect();
        assert_eq!(titles, vec!["b", "a"]);
    }

    #[test]
    fn test_multiple_choices_with_custom_separator() {
        let list = SelectionList::parse(
            Some(&json!([{"title": "A", "value": "a", "option": {"x": 1}}, "b"])),
            None,
            Some(Value::from("b+a")),
        )
        .multiple(Some("+".to_string()));
        assert_eq!(list.default, Some(Value::from("b+a")));
        assert!(list.items.iter().all(|item| item.linked.is_empty()));
        assert!(list.linked_keys().is_empty());
    }

    #[test]
    fn test_linked_options_forms() {
        let list = SelectionList::parse(
            Some(&json!([
                {"title": "Fast", "option": {"mode": "fast", "level": 1}},
                {"title": "Verbose", "option": ["v", {"level": 3}]},
                {"title": "Plain"}
            ])),
            None,
            None,
        );
        let fast = list.item_for(&Value::from("Fast")).unwrap();
        assert_eq!(fast.linked.get("mode"), Some(&Value::from("fast")));
        assert_eq!(fast.linked.get("level"), Some(&Value::Number(1.0)));
        let verbose = list.item_for(&Value::from("Verbose")).unwrap();
        assert_eq!(verbose.linked.get("v"), Some(&Value::Bool(true)));
        assert_eq!(list.linked_keys(), vec!["mode", "level", "v"]);
    }

    #[test]
    fn test_malformed_items_are_dropped() {
        let list = SelectionList::parse(
            Some(&json!([{"title": {"nested": 1}}, {"value": [1]}, true, "ok"])),
            None,
            None,
        );
        let titles: Vec<_> = list.items.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(titles, vec![DEFAULT_CAPTION, "ok"]);
    }

    #[test]
    fn test_numbers_match_numeric_text() {
        let list = SelectionList::parse(Some(&json!([1, 2])), None, None);
        assert!(list.item_for(&Value::from("2")).is_some());
    }
}
