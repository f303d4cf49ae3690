//! Unix filesystem operations

use crate::platform::traits::FilesystemOps;
use std::env;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub struct UnixFilesystem;

impl UnixFilesystem {
    pub fn new() -> Self {
        Self
    }
}

impl FilesystemOps for UnixFilesystem {
    fn is_executable(&self, path: &Path) -> bool {
        if let Ok(metadata) = path.metadata() {
            if metadata.is_file() {
                // Check if file has executable permissions
                let permissions = metadata.permissions();
                return (permissions.mode() & 0o111) != 0;
            }
        }
        false
    }

    fn find_command(&self, command: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
        if command.is_empty() {
            return None;
        }

        // Names with a separator are paths, not search-path lookups
        if command.contains('/') {
            let path = PathBuf::from(command);
            return self.is_executable(&path).then_some(path);
        }

        let path_var = match search_path {
            Some(value) => value.to_os_string(),
            None => env::var_os("PATH")?,
        };

        env::split_paths(&path_var)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(command))
            .find(|candidate| self.is_executable(candidate))
    }
}
