// src/core/dir_ref.rs

//! Directory references: a shared mode and profile for every file below one directory.

use crate::conf::{ConfBackend, ParseProfile, default_backend};
use crate::core::file_ref::ConfigFileReference;
use crate::core::stream::AccessMode;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A directory of configuration files sharing one mode and parser profile.
///
/// Nothing is read from disk until a child reference is used.
#[derive(Debug, Clone)]
pub struct ConfigDirReference {
    name: PathBuf,
    mode: AccessMode,
    profile: ParseProfile,
    backend: Arc<dyn ConfBackend>,
}

impl ConfigDirReference {
    /// A reference to the directory `name`. Nothing is checked on disk.
    pub fn new(name: impl Into<PathBuf>, mode: AccessMode, profile: ParseProfile) -> Self {
        Self {
            name: name.into(),
            mode,
            profile,
            backend: default_backend(),
        }
    }

    /// Replaces the backend handed down to child references.
    pub fn with_backend(mut self, backend: Arc<dyn ConfBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// The directory path.
    pub fn name(&self) -> &Path {
        &self.name
    }

    /// The mode handed to child references.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// The profile handed to child references.
    pub fn profile(&self) -> &ParseProfile {
        &self.profile
    }

    /// A lazy reference to `relpath` under this directory, inheriting mode and profile.
    pub fn get_file(&self, relpath: impl AsRef<Path>) -> ConfigFileReference {
        let path = self.name.join(relpath);
        ConfigFileReference::new(path.display().to_string(), self.mode, self.profile.clone())
            .with_backend(self.backend.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_get_file_inherits_mode_and_profile() {
        let dir = ConfigDirReference::new("/etc/app", AccessMode::ReadWrite, ParseProfile::mid());
        let child = dir.get_file("app.conf");

        assert_eq!(child.path(), Some(Path::new("/etc/app/app.conf")));
        assert_eq!(child.mode(), AccessMode::ReadWrite);
        assert_eq!(child.profile(), &ParseProfile::mid());
        assert!(!child.is_open());
    }

    #[test]
    fn test_children_are_independent() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("a.conf"), "[a]\nx = 1\n").unwrap();
        fs::create_dir(tmp.path().join("local")).unwrap();
        fs::write(tmp.path().join("local").join("b.conf"), "[b]\ny = 2\n").unwrap();

        let dir = ConfigDirReference::new(tmp.path(), AccessMode::Read, ParseProfile::new());
        let mut a = dir.get_file("a.conf");
        let mut b = dir.get_file(Path::new("local").join("b.conf"));

        assert!(a.data().unwrap().contains_key("a"));
        assert!(b.data().unwrap().contains_key("b"));
        assert!(a.is_open() && b.is_open());
    }
}
