use std::collections::HashMap;
use std::fmt;
use std::io;

use crate::section::{OptionKind, Section};
use crate::util::{SelectorError, parse_selector};

/// One UCI file: an ordered list of sections.
///
/// Named sections are indexed by name; unnamed sections are addressed positionally with
/// `@type[index]` selectors, so their synthetic names shift when earlier sections of the same type
/// are removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    name: String,
    sections: Vec<Section>,
    index: HashMap<String, usize>,
    pub(crate) tainted: bool,
}

impl Config {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sections: Vec::with_capacity(4),
            index: HashMap::with_capacity(4),
            tainted: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Whether the document has changes that have not been written back yet.
    #[must_use]
    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    /// Looks up a section by explicit name or by `@type[index]` selector.
    pub fn get(&self, name: &str) -> Result<Option<&Section>, SelectorError> {
        Ok(self.position(name)?.map(|i| &self.sections[i]))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<Option<&mut Section>, SelectorError> {
        Ok(self.position(name)?.map(|i| &mut self.sections[i]))
    }

    /// The name a section is addressed by: its explicit name, or `@type[ordinal]` where ordinal
    /// counts the earlier sections of the same type.
    #[must_use]
    pub fn effective_name(&self, position: usize) -> Option<String> {
        let section = self.sections.get(position)?;
        if !section.is_unnamed() {
            return Some(section.name().to_owned());
        }

        let ordinal = self.sections[..position]
            .iter()
            .filter(|other| other.kind() == section.kind())
            .count();
        Some(format!("@{}[{ordinal}]", section.kind()))
    }

    /// Effective names of every section of the given type, in declaration order.
    #[must_use]
    pub fn section_names(&self, kind: &str) -> Vec<String> {
        let mut ordinal = 0;
        let mut names = Vec::new();

        for section in self.sections.iter().filter(|s| s.kind() == kind) {
            if section.is_unnamed() {
                names.push(format!("@{kind}[{ordinal}]"));
            } else {
                names.push(section.name().to_owned());
            }
            ordinal += 1;
        }

        names
    }

    /// Appends `section`, or replaces the existing section of the same explicit name. Returns the
    /// section's position.
    pub fn add(&mut self, section: Section) -> usize {
        if !section.is_unnamed() {
            if let Some(&i) = self.index.get(section.name()) {
                self.sections[i] = section;
                return i;
            }
            self.index
                .insert(section.name().to_owned(), self.sections.len());
        }

        self.sections.push(section);
        self.sections.len() - 1
    }

    pub fn remove(&mut self, name: &str) -> Result<Option<Section>, SelectorError> {
        let Some(i) = self.position(name)? else {
            return Ok(None);
        };

        let removed = self.sections.remove(i);
        if !removed.is_unnamed() {
            self.index.remove(removed.name());
        }
        for position in self.index.values_mut() {
            if *position > i {
                *position -= 1;
            }
        }

        Ok(Some(removed))
    }

    /// Serializes the document in UCI syntax.
    ///
    /// Values are written between single quotes without further escaping.
    pub fn write_to<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "{self}")
    }

    /// Resolves a `config` declaration to the section it refers to. A repeated explicit name
    /// resolves to the earlier section, which takes on the later declaration's type.
    pub(crate) fn declare(&mut self, kind: &str, name: Option<&str>) -> usize {
        if let Some(&i) = name.and_then(|name| self.index.get(name)) {
            self.sections[i].set_kind(kind);
            return i;
        }

        self.add(Section::new(kind, name.unwrap_or_default()))
    }

    pub(crate) fn section_at_mut(&mut self, position: usize) -> Option<&mut Section> {
        self.sections.get_mut(position)
    }

    fn position(&self, name: &str) -> Result<Option<usize>, SelectorError> {
        if !name.starts_with('@') {
            return Ok(self.index.get(name).copied());
        }

        let (kind, index) = parse_selector(name)?;
        let positions = self
            .sections
            .iter()
            .enumerate()
            .filter(|(_, section)| section.kind() == kind)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        let ordinal = if index < 0 {
            positions.len().checked_sub(index.unsigned_abs())
        } else {
            Some(index.unsigned_abs())
        };

        Ok(ordinal.and_then(|ordinal| positions.get(ordinal).copied()))
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        for section in &self.sections {
            write!(f, "config {}", section.kind())?;
            if !section.is_unnamed() {
                write!(f, " '{}'", section.name())?;
            }
            writeln!(f)?;

            for option in section.options() {
                match option.kind() {
                    OptionKind::Single => {
                        let value = option.last().unwrap_or_default();
                        writeln!(f, "\toption {} '{value}'", option.name())?;
                    }
                    OptionKind::List => {
                        for value in option.values() {
                            writeln!(f, "\tlist {} '{value}'", option.name())?;
                        }
                    }
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
