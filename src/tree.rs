use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::Error;
use crate::parser::parse;
use crate::section::{ConfigOption, OptionKind, Section};
use crate::storage::{DirStorage, Storage};
use crate::util::{decode, is_identifier, parse_bool};

/// Where OpenWrt keeps its config files.
pub const DEFAULT_TREE_PATH: &str = "/etc/config";

/// A set of configs loaded on demand from a [`Storage`].
///
/// Changes stay in memory until [`Tree::commit`] writes every modified config back. All
/// operations take one exclusive lock for their whole duration, file I/O included, so a `Tree`
/// can be shared between threads.
#[derive(Debug)]
pub struct Tree<S = DirStorage> {
    storage: S,
    configs: Mutex<BTreeMap<String, Config>>,
}

impl Tree<DirStorage> {
    /// A tree backed by the config files in `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_storage(DirStorage::new(root))
    }
}

impl Default for Tree<DirStorage> {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_PATH)
    }
}

impl<S: Storage> Tree<S> {
    #[must_use]
    pub fn with_storage(storage: S) -> Self {
        Self {
            storage,
            configs: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Reads config `name` into memory, discarding unsaved changes when `force_reload` is set.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigAlreadyLoaded`] if the config is resident and `force_reload` is not set;
    /// otherwise any read or parse failure. A failed reload keeps the previous contents.
    pub fn load_config(&self, name: &str, force_reload: bool) -> Result<(), Error> {
        let mut configs = self.lock();
        if !force_reload && configs.contains_key(name) {
            return Err(Error::ConfigAlreadyLoaded(name.to_owned()));
        }

        let config = self.read(name)?;
        configs.insert(name.to_owned(), config);
        Ok(())
    }

    /// Names of every section of type `kind`, unnamed ones as `@kind[index]` selectors.
    pub fn get_sections(&self, config: &str, kind: &str) -> Result<Vec<String>, Error> {
        let mut configs = self.lock();
        let loaded = self.ensure_loaded(&mut configs, config)?;
        Ok(loaded.section_names(kind))
    }

    /// Values of an option.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigNotFound`], [`Error::SectionNotFound`] or [`Error::OptionNotFound`]
    /// depending on which part is absent, or the failure that kept the config from loading.
    pub fn get(&self, config: &str, section: &str, option: &str) -> Result<Vec<String>, Error> {
        let mut configs = self.lock();
        let loaded = self.ensure_loaded(&mut configs, config)?;

        let values = loaded
            .get(section)?
            .ok_or_else(|| section_not_found(config, section))?
            .get(option)
            .ok_or_else(|| option_not_found(config, section, option))?
            .values()
            .to_vec();
        Ok(values)
    }

    /// The last value of an option, which is the only value for single options.
    pub fn get_last(&self, config: &str, section: &str, option: &str) -> Result<String, Error> {
        self.get(config, section, option)?
            .pop()
            .ok_or_else(|| option_not_found(config, section, option))
    }

    /// The last value of an option, decoded as a boolean (`1`, `on`, `true`, `yes`, `enabled`
    /// and their opposites).
    pub fn get_bool(&self, config: &str, section: &str, option: &str) -> Result<bool, Error> {
        let value = self.get_last(config, section, option)?;
        parse_bool(&value).ok_or(Error::NotABoolean { value })
    }

    /// Replaces the values of an option, creating it if needed. More than one value makes it a
    /// list option.
    ///
    /// # Errors
    ///
    /// The config and section must already exist; see [`Tree::add_section`].
    /// [`Error::InvalidName`] if `option` is not an identifier.
    pub fn set<I, V>(&self, config: &str, section: &str, option: &str, values: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        check_identifier("option", option)?;
        let values = values.into_iter().map(Into::into).collect::<Vec<String>>();
        let kind = if values.len() > 1 {
            OptionKind::List
        } else {
            OptionKind::Single
        };

        let mut configs = self.lock();
        let loaded = self.ensure_loaded(&mut configs, config)?;
        loaded
            .get_mut(section)?
            .ok_or_else(|| section_not_found(config, section))?
            .set(ConfigOption::new(option, kind, values));
        loaded.tainted = true;

        trace!(config, section, option, %kind, "set option");
        Ok(())
    }

    /// Removes an option. Removing something that does not exist is not an error.
    pub fn del(&self, config: &str, section: &str, option: &str) -> Result<(), Error> {
        let mut configs = self.lock();
        let loaded = match self.ensure_loaded(&mut configs, config) {
            Ok(loaded) => loaded,
            Err(Error::ConfigNotFound(_)) => return Ok(()),
            Err(error) => return Err(error),
        };

        let removed = loaded
            .get_mut(section)?
            .and_then(|found| found.remove(option))
            .is_some();
        if removed {
            loaded.tainted = true;
            trace!(config, section, option, "deleted option");
        }
        Ok(())
    }

    /// Ensures a section named `section` of type `kind` exists, creating the config too when it
    /// has no backing file yet. An empty `section` appends a new unnamed section.
    ///
    /// Returns the name the section is addressed by, which for unnamed sections is an
    /// `@kind[index]` selector.
    ///
    /// # Errors
    ///
    /// [`Error::SectionTypeMismatch`] if the section exists with another type, and
    /// [`Error::SectionNotFound`] for a selector that matches nothing. [`Error::InvalidName`] if
    /// `kind` is not an identifier or `section` cannot be written between single quotes.
    pub fn add_section(&self, config: &str, section: &str, kind: &str) -> Result<String, Error> {
        check_identifier("section type", kind)?;
        if section.contains(['\'', '\n', '\\']) {
            return Err(Error::InvalidName {
                what: "section",
                name: section.to_owned(),
            });
        }

        let mut configs = self.lock();
        if let Some(loaded) = configs.get_mut(config) {
            return declare_section(loaded, section, kind);
        }

        let mut loaded = match self.read(config) {
            Ok(loaded) => loaded,
            Err(Error::ConfigNotFound(_)) => {
                debug!(name = config, "creating config");
                Config::new(config)
            }
            Err(error) => return Err(error),
        };

        let name = declare_section(&mut loaded, section, kind)?;
        configs.insert(config.to_owned(), loaded);
        Ok(name)
    }

    /// Removes a section and all of its options. Removing something that does not exist is not
    /// an error.
    pub fn del_section(&self, config: &str, section: &str) -> Result<(), Error> {
        let mut configs = self.lock();
        let loaded = match self.ensure_loaded(&mut configs, config) {
            Ok(loaded) => loaded,
            Err(Error::ConfigNotFound(_)) => return Ok(()),
            Err(error) => return Err(error),
        };

        if loaded.remove(section)?.is_some() {
            loaded.tainted = true;
            trace!(config, section, "deleted section");
        }
        Ok(())
    }

    /// Writes every modified config back to storage, in name order.
    ///
    /// # Errors
    ///
    /// Stops at the first config that cannot be saved. Configs saved before it stay saved; the
    /// failed one and any after it remain in [`Tree::tainted`].
    pub fn commit(&self) -> Result<(), Error> {
        let mut configs = self.lock();

        for (name, config) in configs.iter_mut().filter(|(_, config)| config.is_tainted()) {
            if let Err(error) = self.storage.save(name, config.to_string().as_bytes()) {
                warn!(name = name.as_str(), %error, "failed to commit config");
                return Err(error);
            }
            config.tainted = false;
            debug!(name = name.as_str(), "committed config");
        }
        Ok(())
    }

    /// Drops the named configs from memory, or every config if `names` is empty. Unsaved
    /// changes are lost; storage is not touched.
    pub fn revert(&self, names: &[&str]) {
        let mut configs = self.lock();
        if names.is_empty() {
            configs.clear();
        } else {
            for name in names {
                configs.remove(*name);
            }
        }
        debug!(?names, "reverted configs");
    }

    /// Configs with changes that have not been committed.
    #[must_use]
    pub fn tainted(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, config)| config.is_tainted())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Configs currently held in memory.
    #[must_use]
    pub fn loaded(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// A copy of config `name`, loading it first if needed.
    pub fn config(&self, name: &str) -> Result<Config, Error> {
        let mut configs = self.lock();
        self.ensure_loaded(&mut configs, name).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Config>> {
        self.configs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, name: &str) -> Result<Config, Error> {
        let data = self.storage.load(name).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigNotFound(name.to_owned())
            } else {
                Error::Read {
                    name: name.to_owned(),
                    source,
                }
            }
        })?;

        let config = parse(name, &decode(&data))?;
        debug!(name, sections = config.sections().len(), "loaded config");
        Ok(config)
    }

    fn ensure_loaded<'m>(
        &self,
        configs: &'m mut BTreeMap<String, Config>,
        name: &str,
    ) -> Result<&'m mut Config, Error> {
        if !configs.contains_key(name) {
            let config = self.read(name)?;
            configs.insert(name.to_owned(), config);
        }
        configs
            .get_mut(name)
            .ok_or_else(|| Error::ConfigNotFound(name.to_owned()))
    }
}

fn declare_section(config: &mut Config, section: &str, kind: &str) -> Result<String, Error> {
    if !section.is_empty() {
        if let Some(existing) = config.get(section)? {
            if existing.kind() != kind {
                return Err(Error::SectionTypeMismatch {
                    config: config.name().to_owned(),
                    section: section.to_owned(),
                    existing: existing.kind().to_owned(),
                    requested: kind.to_owned(),
                });
            }
            return Ok(section.to_owned());
        }
        if section.starts_with('@') {
            return Err(section_not_found(config.name(), section));
        }
    }

    let position = config.add(Section::new(kind, section));
    config.tainted = true;

    let name = config
        .effective_name(position)
        .ok_or_else(|| section_not_found(config.name(), section))?;
    trace!(config = config.name(), section = name.as_str(), kind, "added section");
    Ok(name)
}

fn check_identifier(what: &'static str, name: &str) -> Result<(), Error> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::InvalidName {
            what,
            name: name.to_owned(),
        })
    }
}

fn section_not_found(config: &str, section: &str) -> Error {
    Error::SectionNotFound {
        config: config.to_owned(),
        section: section.to_owned(),
    }
}

fn option_not_found(config: &str, section: &str, option: &str) -> Error {
    Error::OptionNotFound {
        config: config.to_owned(),
        section: section.to_owned(),
        option: option.to_owned(),
    }
}
