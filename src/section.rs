use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named group of options tagged with a type. Sections with an empty name are unnamed and are
/// addressed through `@type[index]` selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    kind: String,
    name: String,
    options: Vec<ConfigOption>,
    index: HashMap<String, usize>,
}

impl Section {
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            options: Vec::with_capacity(8),
            index: HashMap::with_capacity(8),
        }
    }

    /// The section type, e.g. `interface` in `config interface 'lan'`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The explicit name; empty for unnamed sections.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_unnamed(&self) -> bool {
        self.name.is_empty()
    }

    #[must_use]
    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConfigOption> {
        self.index.get(name).map(|&i| &self.options[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ConfigOption> {
        self.index.get(name).map(|&i| &mut self.options[i])
    }

    /// Inserts `option`, replacing any option of the same name in place.
    pub fn set(&mut self, option: ConfigOption) {
        if let Some(&i) = self.index.get(option.name()) {
            self.options[i] = option;
        } else {
            self.index.insert(option.name.clone(), self.options.len());
            self.options.push(option);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<ConfigOption> {
        let i = self.index.remove(name)?;
        let removed = self.options.remove(i);
        for position in self.index.values_mut() {
            if *position > i {
                *position -= 1;
            }
        }
        Some(removed)
    }

    pub(crate) fn set_kind(&mut self, kind: &str) {
        kind.clone_into(&mut self.kind);
    }

    /// Folds one declared value into the section: `option` overwrites, `list` appends values not
    /// yet present.
    pub(crate) fn merge(&mut self, name: String, value: String, kind: OptionKind) {
        let Some(&i) = self.index.get(&name) else {
            self.set(ConfigOption::new(name, kind, vec![value]));
            return;
        };

        let existing = &mut self.options[i];
        match kind {
            OptionKind::Single => {
                existing.kind = OptionKind::Single;
                existing.values = vec![value];
            }
            OptionKind::List => {
                existing.kind = OptionKind::List;
                if !existing.values.contains(&value) {
                    existing.values.push(value);
                }
            }
        }
    }
}

/// How an option is written: once with `option`, or once per value with `list`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionKind {
    #[default]
    #[serde(rename = "option")]
    Single,
    #[serde(rename = "list")]
    List,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Single => "option".fmt(f),
            Self::List => "list".fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOption {
    name: String,
    kind: OptionKind,
    values: Vec<String>,
}

impl ConfigOption {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: OptionKind, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// A single-valued option, as written by `option name 'value'`.
    #[must_use]
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Single, vec![value.into()])
    }

    /// A list option, as written by one `list name 'value'` line per value.
    #[must_use]
    pub fn list<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::new(
            name,
            OptionKind::List,
            values.into_iter().map(Into::into).collect(),
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.values.last().map(String::as_str)
    }
}
