//! Structured-data view of a [`Config`], used to write and compare test fixtures.
//!
//! ```json
//! {"name": "system", "sections": [{"type": "system", "options": [
//!     {"name": "hostname", "type": "option", "values": ["OpenWrt"]}
//! ]}]}
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::Config;
use crate::section::{ConfigOption, OptionKind, Section};

#[derive(Serialize, Deserialize)]
struct ConfigRepr {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sections: Vec<SectionRepr>,
}

#[derive(Serialize, Deserialize)]
struct SectionRepr {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    options: Vec<OptionRepr>,
}

#[derive(Serialize, Deserialize)]
struct OptionRepr {
    name: String,
    #[serde(rename = "type", default)]
    kind: OptionKind,
    values: Vec<String>,
}

impl From<&Section> for SectionRepr {
    fn from(section: &Section) -> Self {
        Self {
            name: section.name().to_owned(),
            kind: section.kind().to_owned(),
            options: section
                .options()
                .iter()
                .map(|option| OptionRepr {
                    name: option.name().to_owned(),
                    kind: option.kind(),
                    values: option.values().to_vec(),
                })
                .collect(),
        }
    }
}

impl From<SectionRepr> for Section {
    fn from(repr: SectionRepr) -> Self {
        let mut section = Section::new(repr.kind, repr.name);
        for option in repr.options {
            section.set(ConfigOption::new(option.name, option.kind, option.values));
        }
        section
    }
}

impl Serialize for Config {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ConfigRepr {
            name: self.name().to_owned(),
            sections: self.sections().iter().map(SectionRepr::from).collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Config {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = ConfigRepr::deserialize(deserializer)?;

        let mut config = Config::new(repr.name);
        for section in repr.sections {
            config.add(section.into());
        }
        Ok(config)
    }
}
