// Copyright 2021 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Virtual file systems for module lookups.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

/// A virtual file system, through which the module cache reads sources.
///
/// For example, this could be a collection of in-memory files, or it could
/// be a thin wrapper around the local file system (or a subset of it).
pub trait FileSys: Send + Sync {
  /// Reads the file with the given name.
  fn read_file(&self, file_name: &Path) -> io::Result<String>;
}

/// The local file system.
///
/// A `Local` can specify a custom "working directory" (relative to which
/// relative paths are resolved) and a "required prefix", such that
/// canonicalized paths cannot escape a certain subset of the local file system.
pub struct Local {
  cwd: PathBuf,
  prefix: Option<PathBuf>,
}

impl Local {
  /// Creates a new `Local` with the current process's working directory as both
  /// the working directory and the prefix.
  pub fn new() -> io::Result<Self> {
    let cwd = env::current_dir()?;
    Ok(Self::with_options(cwd.clone(), Some(cwd)))
  }

  /// Creates a new `Local` with the given working directory and prefix.
  pub fn with_options(cwd: PathBuf, prefix: Option<PathBuf>) -> Self {
    Self { cwd, prefix }
  }
}

impl FileSys for Local {
  fn read_file(&self, file_name: &Path) -> io::Result<String> {
    let mut full_path = self.cwd.join(file_name);
    if let Some(prefix) = &self.prefix {
      full_path = fs::canonicalize(&full_path)?;
      if !full_path.starts_with(prefix) {
        return Err(io::Error::new(
          io::ErrorKind::PermissionDenied,
          "attempted to escape local filesystem prefix",
        ));
      }
    }
    fs::read_to_string(full_path)
  }
}

/// An in-memory file system.
#[derive(Clone, Debug, Default)]
pub struct Memory {
  files: HashMap<PathBuf, String>,
}

impl Memory {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a file, replacing any file already at `file_name`.
  pub fn with_file(
    mut self,
    file_name: impl Into<PathBuf>,
    text: impl Into<String>,
  ) -> Self {
    self.files.insert(file_name.into(), text.into());
    self
  }
}

impl FileSys for Memory {
  fn read_file(&self, file_name: &Path) -> io::Result<String> {
    self.files.get(file_name).cloned().ok_or_else(|| {
      io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", file_name.display()),
      )
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn memory_lookup() {
    let fs = Memory::new().with_file("a.kes", "x = 1\n");
    assert_eq!(fs.read_file(Path::new("a.kes")).unwrap(), "x = 1\n");
    let err = fs.read_file(Path::new("b.kes")).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
    assert_eq!(err.to_string(), "no such file: b.kes");
  }

  #[test]
  fn local_prefix_escape() {
    let dir = env::temp_dir();
    let fs = Local::with_options(dir.clone(), Some(dir.join("nowhere")));
    assert!(fs.read_file(Path::new(".")).is_err());
  }
}
