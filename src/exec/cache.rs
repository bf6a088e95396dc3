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

//! A concurrent module cache, which executes each module at most once and
//! detects cycles among loads running on different threads.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::sync::Mutex;

use thread_local::ThreadLocal;

use crate::eval;
use crate::eval::error::LoadError;
use crate::eval::LoadResult;
use crate::eval::StringDict;
use crate::eval::Thread;
use crate::exec::fs::FileSys;
use crate::syn;

/// A handle to a loader: one chain of nested loads, executing on one thread.
type LoaderId = usize;
/// A handle to a cache entry.
type EntryId = usize;

/// A cache of loaded modules, shared by any number of threads.
///
/// The first thread to request a module executes it and freezes its globals;
/// every other requester blocks until the result is published. Before
/// blocking, a requester checks that the module's owner is not, transitively,
/// waiting on the requester itself.
pub struct ModuleCache<'i> {
  inner: Arc<Inner<'i>>,
}

impl Clone for ModuleCache<'_> {
  fn clone(&self) -> Self {
    ModuleCache {
      inner: Arc::clone(&self.inner),
    }
  }
}

struct Inner<'i> {
  fs: &'i dyn FileSys,
  arenas: &'i ThreadLocal<syn::Arena>,
  dialect: syn::Dialect,
  predeclared: StringDict<'i>,
  graph: Mutex<Graph<'i>>,
}

/// The waits-for graph. Every loader has at most one outgoing edge: either
/// the entry it waits on, or none. Every in-progress entry has an owner.
#[derive(Default)]
struct Graph<'i> {
  entries: Vec<Entry<'i>>,
  by_name: HashMap<PathBuf, EntryId>,
  loaders: Vec<Loader>,
}

struct Entry<'i> {
  owner: Option<LoaderId>,
  result: Option<LoadResult<'i>>,
  waiters: Vec<(LoaderId, mpsc::SyncSender<LoadResult<'i>>)>,
}

#[derive(Default)]
struct Loader {
  waits_for: Option<EntryId>,
}

/// What a loader must do after consulting the graph.
enum Lookup<'i> {
  Done(LoadResult<'i>),
  Wait(mpsc::Receiver<LoadResult<'i>>),
  Exec(EntryId),
}

impl<'i> Graph<'i> {
  /// Returns whether following edges from `entry` leads back to `loader`.
  fn leads_to(&self, mut entry: EntryId, loader: LoaderId) -> bool {
    loop {
      let owner = match self.entries[entry].owner {
        Some(owner) => owner,
        None => return false,
      };
      if owner == loader {
        return true;
      }
      entry = match self.loaders[owner].waits_for {
        Some(next) => next,
        None => return false,
      };
    }
  }

  fn lookup(&mut self, loader: LoaderId, name: &Path) -> Lookup<'i> {
    let id = match self.by_name.get(name) {
      Some(&id) => id,
      None => {
        let id = self.entries.len();
        self.entries.push(Entry {
          owner: Some(loader),
          result: None,
          waiters: Vec::new(),
        });
        self.by_name.insert(name.to_path_buf(), id);
        return Lookup::Exec(id);
      }
    };

    if let Some(result) = &self.entries[id].result {
      tracing::debug!(module = %name.display(), "cache hit");
      return Lookup::Done(result.clone());
    }

    if self.leads_to(id, loader) {
      tracing::warn!(module = %name.display(), "cycle in load graph");
      return Lookup::Done(Err(LoadError::new("cycle in load graph")));
    }

    tracing::debug!(module = %name.display(), "waiting on another loader");
    let (tx, rx) = mpsc::sync_channel(1);
    self.entries[id].waiters.push((loader, tx));
    self.loaders[loader].waits_for = Some(id);
    Lookup::Wait(rx)
  }

  fn publish(&mut self, id: EntryId, result: &LoadResult<'i>) {
    let entry = &mut self.entries[id];
    entry.owner = None;
    entry.result = Some(result.clone());
    for (loader, tx) in std::mem::take(&mut entry.waiters) {
      self.loaders[loader].waits_for = None;
      // The receiver only goes away if its thread panicked.
      let _ = tx.send(result.clone());
    }
  }
}

impl<'i> ModuleCache<'i> {
  /// Creates a cache reading through `fs`, parsing into per-thread arenas
  /// and executing every module with `predeclared` in scope.
  pub fn new(
    fs: &'i dyn FileSys,
    arenas: &'i ThreadLocal<syn::Arena>,
    dialect: syn::Dialect,
    predeclared: StringDict<'i>,
  ) -> Self {
    ModuleCache {
      inner: Arc::new(Inner {
        fs,
        arenas,
        dialect,
        predeclared,
        graph: Mutex::new(Graph::default()),
      }),
    }
  }

  /// Loads `name` on behalf of a fresh loader, returning its frozen globals.
  pub fn load(&self, name: &str) -> LoadResult<'i> {
    let loader = self.inner.new_loader();
    Inner::get(&self.inner, loader, Path::new(name))
  }

  /// Executes the given files with up to `parallelism` threads.
  ///
  /// Returns each file's globals, in order, or the number of files that
  /// failed. Failures are logged as they happen.
  pub fn exec_files(
    &self,
    file_names: impl IntoIterator<Item = &'i Path>,
    parallelism: usize,
  ) -> Result<Vec<(&'i Path, StringDict<'i>)>, usize> {
    let file_names = file_names.into_iter().collect::<Vec<_>>();
    let results = Mutex::new(vec![None; file_names.len()]);
    let next_work_item = AtomicUsize::new(0);
    let spawned = crossbeam::scope(|s| {
      for i in 0..parallelism.max(1) {
        let spawned = s
          .builder()
          .name(format!("kestrel-loader-{}", i))
          .stack_size(1024 * 1024 * 8) // 8 MB.
          .spawn(|_| loop {
            let idx = next_work_item.fetch_add(1, Ordering::SeqCst);
            if idx >= file_names.len() {
              return;
            }
            let file_name = file_names[idx];
            let loader = self.inner.new_loader();
            let result = Inner::get(&self.inner, loader, file_name);
            results.lock().unwrap()[idx] = Some(result);
          });
        if let Err(e) = spawned {
          tracing::error!("cannot spawn loader thread: {}", e);
          return Err(());
        }
      }
      Ok(())
    });
    if !matches!(spawned, Ok(Ok(()))) {
      return Err(file_names.len());
    }

    let mut errors = 0;
    let mut values = Vec::new();
    let results = results.into_inner().unwrap();
    for (file_name, result) in file_names.iter().zip(results) {
      match result {
        Some(Ok(globals)) => values.push((*file_name, globals)),
        _ => errors += 1,
      }
    }

    if errors > 0 {
      return Err(errors);
    }
    Ok(values)
  }
}

impl<'i> Inner<'i> {
  fn new_loader(&self) -> LoaderId {
    let mut graph = self.graph.lock().unwrap();
    graph.loaders.push(Loader::default());
    graph.loaders.len() - 1
  }

  fn get(this: &Arc<Self>, loader: LoaderId, name: &Path) -> LoadResult<'i> {
    let lookup = this.graph.lock().unwrap().lookup(loader, name);
    match lookup {
      Lookup::Done(result) => result,
      Lookup::Wait(rx) => rx.recv().unwrap_or_else(|_| {
        Err(LoadError::new(format!(
          "loader of {} went away",
          name.display()
        )))
      }),
      Lookup::Exec(id) => {
        let result = Self::exec(this, loader, name);
        this.graph.lock().unwrap().publish(id, &result);
        result
      }
    }
  }

  /// Actually executes a module.
  fn exec(this: &Arc<Self>, loader: LoaderId, name: &Path) -> LoadResult<'i> {
    tracing::info!(module = %name.display(), "loading");
    let text = this.fs.read_file(name).map_err(|e| {
      tracing::error!(module = %name.display(), "cannot read: {}", e);
      LoadError::new(e.to_string())
    })?;

    let arena = this.arenas.get_or(syn::Arena::new);
    let file_name =
      Path::new(arena.alloc_string(name.to_string_lossy().into_owned()));
    let text = arena.alloc_string(text);

    let mut thread = Thread::new(file_name.display().to_string());
    let inner = Arc::clone(this);
    thread.set_load(move |_, module| {
      Inner::get(&inner, loader, Path::new(module))
    });

    let result = eval::exec_file(
      &mut thread,
      file_name,
      text,
      this.dialect,
      &this.predeclared,
      arena,
    );
    match result {
      Ok(globals) => {
        tracing::info!(module = %name.display(), "loaded");
        Ok(globals)
      }
      Err(e) => {
        tracing::error!(module = %name.display(), "{}", e);
        Err(e.into())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::exec::fs::Memory;
  use pretty_assertions::assert_eq;

  fn repr(globals: &StringDict) -> String {
    globals
      .iter()
      .map(|(k, v)| format!("{} = {}", k, v.repr()))
      .collect::<Vec<_>>()
      .join("\n")
  }

  #[test]
  fn load_once() {
    let fs = Memory::new()
      .with_file("a.kes", "load('b.kes', 'y')\nx = y + 1\n")
      .with_file("b.kes", "y = 41\nz = [y]\n");
    let arenas = ThreadLocal::new();
    let cache =
      ModuleCache::new(&fs, &arenas, Default::default(), StringDict::new());

    let a = cache.load("a.kes").unwrap();
    assert_eq!(repr(&a), "x = 42");
    let b = cache.load("b.kes").unwrap();
    assert_eq!(repr(&b), "y = 41\nz = [41]");
    assert_eq!(cache.inner.graph.lock().unwrap().entries.len(), 2);

    // Loaded globals are frozen.
    match b.get("z") {
      Some(crate::eval::value::Value::List(z)) => {
        let err = z.push(1.into()).unwrap_err();
        assert_eq!(err.0, "cannot append to frozen list");
      }
      z => panic!("unexpected {:?}", z),
    }
  }

  #[test]
  fn missing_module() {
    let fs = Memory::new().with_file("a.kes", "load('nope.kes', 'x')\n");
    let arenas = ThreadLocal::new();
    let cache =
      ModuleCache::new(&fs, &arenas, Default::default(), StringDict::new());
    let err = cache.load("a.kes").unwrap_err();
    assert_eq!(err.message, "cannot load nope.kes: no such file: nope.kes");
    assert!(err.backtrace.unwrap().contains("Error: cannot load nope.kes"));
  }

  #[test]
  fn self_cycle() {
    let fs = Memory::new().with_file("a.kes", "load('a.kes', 'x')\n");
    let arenas = ThreadLocal::new();
    let cache =
      ModuleCache::new(&fs, &arenas, Default::default(), StringDict::new());
    let err = cache.load("a.kes").unwrap_err();
    assert_eq!(err.message, "cannot load a.kes: cycle in load graph");
  }

  #[test]
  fn concurrent_cycle() {
    let fs = Memory::new()
      .with_file("a.kes", "load('b.kes', 'b')\na = 1\n")
      .with_file("b.kes", "load('c.kes', 'c')\nb = 1\n")
      .with_file("c.kes", "load('a.kes', 'a')\nc = 1\n");
    let arenas = ThreadLocal::new();
    let cache =
      ModuleCache::new(&fs, &arenas, Default::default(), StringDict::new());

    for _ in 0..10 {
      let cache = cache.clone();
      let (b, c) = crossbeam::scope(|s| {
        let b = s.spawn(|_| cache.load("b.kes"));
        let c = s.spawn(|_| cache.load("c.kes"));
        (b.join().unwrap(), c.join().unwrap())
      })
      .unwrap();
      for result in [b, c] {
        let err = result.unwrap_err();
        assert!(err.message.contains("cycle in load graph"), "{}", err);
      }
    }
  }

  #[test]
  fn exec_many() {
    let fs = Memory::new()
      .with_file("a.kes", "load('c.kes', 'c')\na = c * 2\n")
      .with_file("b.kes", "load('c.kes', 'c')\nb = c * 3\n")
      .with_file("c.kes", "c = 7\n")
      .with_file("bad.kes", "x = 1 // 0\n");
    let arenas = ThreadLocal::new();
    let cache =
      ModuleCache::new(&fs, &arenas, Default::default(), StringDict::new());

    let files = [Path::new("a.kes"), Path::new("b.kes")];
    let out = cache.exec_files(files, 4).unwrap();
    let out = out
      .iter()
      .map(|(f, g)| format!("{}: {}", f.display(), repr(g)))
      .collect::<Vec<_>>();
    assert_eq!(out, ["a.kes: a = 14", "b.kes: b = 21"]);

    let files = [Path::new("c.kes"), Path::new("bad.kes")];
    assert!(matches!(cache.exec_files(files, 2), Err(1)));
  }
}
