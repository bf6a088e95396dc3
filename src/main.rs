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

#![deny(unused)]
#![deny(warnings)]

use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use thread_local::ThreadLocal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kestrel::eval;
use kestrel::eval::StringDict;
use kestrel::eval::Thread;
use kestrel::exec::cache::ModuleCache;
use kestrel::exec::fs::Local;
use kestrel::exec::repl::Repl;
use kestrel::syn;

#[derive(Parser)]
#[command(name = "kestrel", version, about = "The Kestrel interpreter")]
struct Cli {
  /// Executes PROGRAM instead of reading files.
  #[arg(short = 'c', value_name = "PROGRAM")]
  program: Option<String>,
  /// How many files to execute in parallel.
  #[arg(short = 'j', value_name = "N", default_value_t = 8)]
  jobs: usize,
  /// Dumps the final globals of every file to stderr.
  #[arg(long)]
  showenv: bool,

  /// Allows floating-point numbers.
  #[arg(long, value_name = "BOOL")]
  float: Option<bool>,
  /// Allows the `set` builtin.
  #[arg(long, value_name = "BOOL")]
  set: Option<bool>,
  /// Allows `lambda` expressions.
  #[arg(long, value_name = "BOOL")]
  lambda: Option<bool>,
  /// Allows `def` inside functions.
  #[arg(long, value_name = "BOOL")]
  nested_def: Option<bool>,
  /// Allows recursive calls.
  #[arg(long, value_name = "BOOL")]
  recursion: Option<bool>,
  /// Allows top-level globals to be reassigned.
  #[arg(long, value_name = "BOOL")]
  global_reassign: Option<bool>,

  /// Files to execute. Without any (and without -c), starts a REPL.
  files: Vec<PathBuf>,
}

impl Cli {
  fn dialect(&self) -> syn::Dialect {
    let default = syn::Dialect::default();
    syn::Dialect {
      float: self.float.unwrap_or(default.float),
      set: self.set.unwrap_or(default.set),
      lambda: self.lambda.unwrap_or(default.lambda),
      nested_def: self.nested_def.unwrap_or(default.nested_def),
      recursion: self.recursion.unwrap_or(default.recursion),
      global_reassign: self.global_reassign.unwrap_or(default.global_reassign),
    }
  }
}

fn main() {
  let cli = Cli::parse();
  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr).without_time())
    .with(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn")),
    )
    .init();

  std::process::exit(run(&cli))
}

/// Runs the interpreter, returning the process's exit code.
fn run(cli: &Cli) -> i32 {
  let fs = match Local::new() {
    Ok(fs) => fs,
    Err(e) => {
      eprintln!("error: cannot read current working directory: {}", e);
      return 1;
    }
  };
  let arenas = ThreadLocal::new();
  let arena = syn::Arena::new();
  let dialect = cli.dialect();
  let cache = ModuleCache::new(&fs, &arenas, dialect, StringDict::new());

  if let Some(program) = &cli.program {
    let mut thread = Thread::new("main");
    let loads = cache.clone();
    thread.set_load(move |_, module| loads.load(module));
    let result = eval::exec_file(
      &mut thread,
      Path::new("<command-line>"),
      program,
      dialect,
      &StringDict::new(),
      &arena,
    );
    return match result {
      Ok(globals) => {
        if cli.showenv {
          show_env(&globals);
        }
        0
      }
      Err(e) => {
        eprintln!("{}", e);
        1
      }
    };
  }

  if cli.files.is_empty() {
    let result =
      Repl::new(&arena, dialect, cache).and_then(|mut r| r.execute_loop());
    return match result {
      Ok(()) => 0,
      Err(e) => {
        eprintln!("error: {}", e);
        1
      }
    };
  }

  let file_names = cli.files.iter().map(PathBuf::as_path);
  let code = match cache.exec_files(file_names, cli.jobs) {
    Ok(values) => {
      if cli.showenv {
        for (file_name, globals) in values {
          eprintln!("# {}", file_name.display());
          show_env(&globals);
        }
      }
      0
    }
    Err(n) => {
      eprintln!("error: got {} errors", n);
      1
    }
  };
  code
}

fn show_env(globals: &StringDict) {
  for (name, value) in globals {
    eprintln!("{} = {}", name, value.repr());
  }
}
