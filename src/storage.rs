use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Phase};

/// Permission bits given to every persisted config file.
pub const DEFAULT_MODE: u32 = 0o644;

/// Where config files live. A directory on the local machine is the usual backend, but anything
/// that can read and atomically replace named blobs will do.
pub trait Storage {
    /// Reads the raw contents of config `name`. A missing config is reported as
    /// [`io::ErrorKind::NotFound`].
    fn load(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Replaces config `name` with `data`, so that readers see either the old or the new
    /// contents, never a mix.
    fn save(&self, name: &str, data: &[u8]) -> Result<(), Error>;
}

/// A directory holding one file per config, e.g. `/etc/config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirStorage {
    root: PathBuf,
    mode: u32,
}

impl DirStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_mode(root, DEFAULT_MODE)
    }

    #[must_use]
    pub fn with_mode(root: impl Into<PathBuf>, mode: u32) -> Self {
        Self {
            root: root.into(),
            mode,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing config `name`. Names must not leave the directory.
    pub fn path(&self, name: &str) -> io::Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid config name {name:?}"),
            ));
        }
        Ok(self.root.join(name))
    }
}

impl Storage for DirStorage {
    fn load(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path(name)?)
    }

    /// Writes a temporary file next to the destination and renames it into place. The temporary
    /// file is removed if any step fails.
    fn save(&self, name: &str, data: &[u8]) -> Result<(), Error> {
        let dest = self
            .path(name)
            .map_err(|source| persist_error(self.root.join(name), Phase::Create, source))?;

        let mut file = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .tempfile_in(&self.root)
            .map_err(|source| persist_error(&dest, Phase::Create, source))?;

        file.write_all(data)
            .map_err(|source| persist_error(&dest, Phase::Write, source))?;
        set_mode(file.as_file(), self.mode)
            .map_err(|source| persist_error(&dest, Phase::Chmod, source))?;
        file.as_file()
            .sync_all()
            .map_err(|source| persist_error(&dest, Phase::Sync, source))?;

        // Closes the handle; the path is still deleted on drop until persisted.
        let temp = file.into_temp_path();
        temp.persist(&dest)
            .map_err(|error| persist_error(&dest, Phase::Rename, error.error))?;

        debug!(path = %dest.display(), bytes = data.len(), "persisted config");
        Ok(())
    }
}

fn persist_error(path: impl Into<PathBuf>, phase: Phase, source: io::Error) -> Error {
    Error::Persist {
        path: path.into(),
        phase,
        source,
    }
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let storage = DirStorage::new(dir.path());

        storage.save("network", b"\nconfig interface 'lan'\n\n").unwrap();
        storage.save("network", b"\nconfig interface 'wan'\n\n").unwrap();

        assert_eq!(
            storage.load("network").unwrap(),
            b"\nconfig interface 'wan'\n\n"
        );
        assert_eq!(entries(dir.path()), vec!["network"]);
    }

    #[test]
    fn missing_config_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = DirStorage::new(dir.path());

        let error = storage.load("absent").unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn names_cannot_escape_the_directory() {
        let storage = DirStorage::new("/etc/config");

        for name in ["", ".", "..", "../passwd", "a/b", "a\\b"] {
            let error = storage.path(name).unwrap_err();
            assert_eq!(error.kind(), io::ErrorKind::InvalidInput, "{name:?}");
        }
        assert_eq!(storage.root(), Path::new("/etc/config"));
        assert_eq!(
            storage.path("wireless").unwrap(),
            Path::new("/etc/config/wireless")
        );
    }

    #[cfg(unix)]
    #[test]
    fn applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = DirStorage::with_mode(dir.path(), 0o600);

        storage.save("system", b"\n").unwrap();

        let mode = fs::metadata(dir.path().join("system"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn failed_rename_leaves_no_temporary_file() {
        let dir = TempDir::new().unwrap();
        let storage = DirStorage::new(dir.path());
        // A non-empty directory cannot be replaced by a file.
        fs::create_dir_all(dir.path().join("network").join("occupied")).unwrap();

        let error = storage.save("network", b"\n").unwrap_err();

        assert!(matches!(
            error,
            Error::Persist {
                phase: Phase::Rename,
                ..
            }
        ));
        assert!(error.to_string().starts_with("rename "));
        assert_eq!(entries(dir.path()), vec!["network"]);
    }
}
