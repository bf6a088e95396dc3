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

//! Interpreter for the Kestrel language.
//!
//! A resolved `Program` is executed by a `Thread`, which owns the call stack
//! and the host's hooks. Each executed file gets a `Module` holding its
//! globals; functions defined in it keep the module alive.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::RwLock;

use indexmap::IndexMap;

use crate::eval::error::CallFrame;
use crate::eval::error::Error;
use crate::eval::error::EvalError;
use crate::eval::error::LoadError;
use crate::eval::error::ValueError;
use crate::eval::value::Function;
use crate::eval::value::Value;
use crate::syn;
use crate::syn::Program;
use crate::syn::Span;

#[macro_use]
pub mod error;

#[macro_use]
pub mod value;

pub mod encode;
pub mod methods;
pub mod ops;
pub mod stdlib;

mod call;
mod exec;
mod expr;
mod interp;

pub(crate) mod escaping;

#[cfg(test)]
mod conformance;

/// The result type for evaluation.
pub type Result<'i, T> = std::result::Result<T, EvalError<'i>>;

/// A mapping of names to values, in insertion order: the predeclared
/// environment of a file, or the globals it defines.
pub type StringDict<'i> = IndexMap<String, Value<'i>>;

/// The name of the synthetic file in which builtins run.
const BUILTIN_FILE: &str = "<builtin>";

/// A `Module` is the state of one executed file: its program, the
/// predeclared names it was given, and its globals.
pub struct Module<'i> {
  program: &'i Program<'i>,
  predeclared: StringDict<'i>,
  globals: RwLock<Vec<Option<Value<'i>>>>,
}

impl<'i> Module<'i> {
  pub fn new(program: &'i Program<'i>, predeclared: StringDict<'i>) -> Self {
    Module {
      program,
      predeclared,
      globals: RwLock::new(vec![None; program.globals.len()]),
    }
  }

  pub fn program(&self) -> &'i Program<'i> {
    self.program
  }

  /// Returns the value of the global in `slot`, if it has been assigned.
  pub fn global(&self, slot: u32) -> Option<Value<'i>> {
    self.globals.read().unwrap()[slot as usize].clone()
  }

  fn set_global(&self, slot: u32, value: Value<'i>) {
    self.globals.write().unwrap()[slot as usize] = Some(value);
  }

  pub fn predeclared(&self, name: &str) -> Option<&Value<'i>> {
    self.predeclared.get(name)
  }

  /// Returns the assigned globals, in order of first assignment in the
  /// source.
  pub fn globals(&self) -> StringDict<'i> {
    let globals = self.globals.read().unwrap();
    self
      .program
      .globals
      .iter()
      .zip(globals.iter())
      .filter_map(|(name, v)| Some((name.to_string(), v.clone()?)))
      .collect()
  }

  /// Freezes every global.
  pub fn freeze(&self) {
    for v in self.globals.read().unwrap().iter().flatten() {
      v.freeze();
    }
  }
}

impl fmt::Debug for Module<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<module {}>", self.program.file.span.file_name().display())
  }
}

/// What a `Frame` is executing.
#[derive(Clone, Debug)]
enum Callable<'i> {
  Toplevel,
  Function(Function<'i>),
  Builtin(&'static str),
}

/// A `Frame` is one entry of the call stack. Its position is updated as
/// evaluation proceeds, so that errors and callers' entries in a backtrace
/// point at the right place.
#[derive(Clone, Debug)]
pub struct Frame<'i> {
  callable: Callable<'i>,
  pos: Span<'i>,
}

impl<'i> Frame<'i> {
  /// Returns the name of the function this frame is executing.
  pub fn name(&self) -> &str {
    match &self.callable {
      Callable::Toplevel => "<toplevel>",
      Callable::Function(f) => f.name(),
      Callable::Builtin(name) => name,
    }
  }

  /// Returns the current position in this frame.
  pub fn position(&self) -> Span<'i> {
    self.pos
  }
}

/// The signal produced by executing a statement.
#[derive(Debug)]
enum Flow<'i> {
  Normal,
  Break,
  Continue,
  Return(Value<'i>),
}

/// The variables visible to the code being executed: a function's (or the
/// top level's) local slots, the function's captured free variables, and its
/// module's globals.
struct Env<'i> {
  module: Arc<Module<'i>>,
  locals: Vec<Option<Value<'i>>>,
  fnc: Option<Function<'i>>,
}

impl<'i> Env<'i> {
  fn program(&self) -> &'i Program<'i> {
    self.module.program()
  }

  fn freevars(&self) -> &[Option<Value<'i>>] {
    match &self.fnc {
      Some(f) => f.freevars(),
      None => &[],
    }
  }
}

/// The result of the `load` hook.
pub type LoadResult<'i> = std::result::Result<StringDict<'i>, LoadError>;

type PrintFn<'i> = dyn Fn(&Thread<'i>, &str) + 'i;
type LoadFn<'i> = dyn Fn(&Thread<'i>, &str) -> LoadResult<'i> + 'i;

/// A `Thread` is the state of one Kestrel call stack: its frames, the host
/// hooks for `print` and `load`, and storage for host extensions.
///
/// A `Thread` executes one call at a time. Independent threads may run in
/// parallel and share frozen values.
pub struct Thread<'i> {
  /// A name for this thread, for logging.
  pub name: String,
  stack: Vec<Frame<'i>>,
  print: Option<Box<PrintFn<'i>>>,
  load: Option<Box<LoadFn<'i>>>,
  locals: HashMap<&'static str, Box<dyn Any>>,
}

impl<'i> Thread<'i> {
  pub fn new(name: impl Into<String>) -> Self {
    Thread {
      name: name.into(),
      stack: Vec::new(),
      print: None,
      load: None,
      locals: HashMap::new(),
    }
  }

  /// Sets the hook called by `print()`. By default, lines go to stderr.
  pub fn set_print(&mut self, print: impl Fn(&Thread<'i>, &str) + 'i) {
    self.print = Some(Box::new(print));
  }

  /// Sets the hook called by `load` statements. Without one, every `load`
  /// fails.
  pub fn set_load(
    &mut self,
    load: impl Fn(&Thread<'i>, &str) -> LoadResult<'i> + 'i,
  ) {
    self.load = Some(Box::new(load));
  }

  /// Stores a value for use by host extensions.
  pub fn set_local<T: Any>(&mut self, key: &'static str, value: T) {
    self.locals.insert(key, Box::new(value));
  }

  /// Retrieves a value stored with `set_local()`, if it has type `T`.
  pub fn local<T: Any>(&self, key: &str) -> Option<&T> {
    self.locals.get(key)?.downcast_ref()
  }

  /// Writes a line of program output through the print hook.
  pub fn print(&self, msg: &str) {
    match &self.print {
      Some(print) => print(self, msg),
      None => eprintln!("{}", msg),
    }
  }

  /// Returns the active frames, outermost first.
  pub fn frames(&self) -> &[Frame<'i>] {
    &self.stack
  }

  /// Snapshots the call stack, outermost frame first.
  pub fn call_stack(&self) -> Vec<CallFrame<'i>> {
    self
      .stack
      .iter()
      .map(|f| CallFrame {
        name: f.name().to_string(),
        pos: f.pos,
      })
      .collect()
  }

  /// Records `pos` as the current position of the innermost frame.
  fn set_pos(&mut self, pos: Span<'i>) {
    if let Some(frame) = self.stack.last_mut() {
      frame.pos = pos;
    }
  }

  /// Positions a value-level error at `span` in the innermost frame.
  fn value_error(&self, span: Span<'i>, e: ValueError) -> EvalError<'i> {
    EvalError::new(self, span, e.0)
  }

  fn builtin_span() -> Span<'i> {
    Span::synthetic(Path::new(BUILTIN_FILE))
  }

  /// Executes a resolved program in a fresh module, returning the module.
  ///
  /// The module's globals are not frozen.
  pub fn exec_program(
    &mut self,
    program: &'i Program<'i>,
    predeclared: StringDict<'i>,
  ) -> Result<'i, Arc<Module<'i>>> {
    let module = Arc::new(Module::new(program, predeclared));
    let mut env = Env {
      module: module.clone(),
      locals: vec![None; program.toplevel_locals as usize],
      fnc: None,
    };

    self.stack.push(Frame {
      callable: Callable::Toplevel,
      pos: program.file.span,
    });
    let result = self.exec_stmts(&mut env, program.file.stmts);
    self.stack.pop();

    match result? {
      Flow::Normal => Ok(module),
      flow => bug!("unexpected {:?} at top level", flow),
    }
  }

  /// Evaluates a program produced by `syn::parse_expr()`, returning the
  /// value of its expression.
  pub fn eval_program(
    &mut self,
    program: &'i Program<'i>,
    predeclared: StringDict<'i>,
  ) -> Result<'i, Value<'i>> {
    let expr = match program.file.stmts {
      [syn::Stmt::Expr(e)] if program.file.is_expr => e,
      _ => bug!("eval_program() called on a non-expression file"),
    };
    let module = Arc::new(Module::new(program, predeclared));
    let mut env = Env {
      module,
      locals: vec![None; program.toplevel_locals as usize],
      fnc: None,
    };

    self.stack.push(Frame {
      callable: Callable::Toplevel,
      pos: program.file.span,
    });
    let result = self.eval(&mut env, expr);
    self.stack.pop();
    result
  }
}

impl fmt::Debug for Thread<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Thread")
      .field("name", &self.name)
      .field("stack", &self.stack)
      .finish()
  }
}

/// Resolves `file` against the universal builtins and `predeclared`.
fn resolve<'i>(
  file: &'i syn::File<'i>,
  dialect: syn::Dialect,
  predeclared: &StringDict<'i>,
  arena: &'i syn::Arena,
) -> std::result::Result<&'i Program<'i>, Error<'i>> {
  let is_predeclared = |name: &str| predeclared.contains_key(name);
  Ok(syn::resolve(
    file,
    dialect,
    &is_predeclared,
    &stdlib::is_universal,
    arena,
  )?)
}

/// Parses, resolves and executes a file, returning its frozen globals.
pub fn exec_file<'i>(
  thread: &mut Thread<'i>,
  file_name: &'i Path,
  src: &'i str,
  dialect: syn::Dialect,
  predeclared: &StringDict<'i>,
  arena: &'i syn::Arena,
) -> std::result::Result<StringDict<'i>, Error<'i>> {
  let module =
    exec_module(thread, file_name, src, dialect, predeclared, arena)?;
  module.freeze();
  Ok(module.globals())
}

/// Like `exec_file()`, but leaves the globals mutable, for interactive use.
pub fn exec_chunk<'i>(
  thread: &mut Thread<'i>,
  file_name: &'i Path,
  src: &'i str,
  dialect: syn::Dialect,
  predeclared: &StringDict<'i>,
  arena: &'i syn::Arena,
) -> std::result::Result<StringDict<'i>, Error<'i>> {
  let module =
    exec_module(thread, file_name, src, dialect, predeclared, arena)?;
  Ok(module.globals())
}

fn exec_module<'i>(
  thread: &mut Thread<'i>,
  file_name: &'i Path,
  src: &'i str,
  dialect: syn::Dialect,
  predeclared: &StringDict<'i>,
  arena: &'i syn::Arena,
) -> std::result::Result<Arc<Module<'i>>, Error<'i>> {
  let file = syn::parse(file_name, src, arena)?;
  let program = resolve(file, dialect, predeclared, arena)?;
  Ok(thread.exec_program(program, predeclared.clone())?)
}

/// Parses, resolves and evaluates a single expression.
pub fn eval<'i>(
  thread: &mut Thread<'i>,
  file_name: &'i Path,
  src: &'i str,
  dialect: syn::Dialect,
  predeclared: &StringDict<'i>,
  arena: &'i syn::Arena,
) -> std::result::Result<Value<'i>, Error<'i>> {
  let file = syn::parse_expr(file_name, src, arena)?;
  let program = resolve(file, dialect, predeclared, arena)?;
  Ok(thread.eval_program(program, predeclared.clone())?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn run(
    src: &str,
    dialect: syn::Dialect,
  ) -> std::result::Result<String, String> {
    let arena = syn::Arena::new();
    let src = arena.alloc_string(src.to_string());
    let mut thread = Thread::new("test");
    let out = exec_file(
      &mut thread,
      Path::new("t.kes"),
      src,
      dialect,
      &StringDict::new(),
      &arena,
    )
    .map(|globals| {
      globals
        .iter()
        .map(|(k, v)| format!("{} = {}", k, v.repr()))
        .collect::<Vec<_>>()
        .join("\n")
    })
    .map_err(|e| e.to_string());
    out
  }

  #[test]
  fn globals_in_order() {
    let out = run("b = 1\na = [b, 2]\n", syn::Dialect::default());
    assert_eq!(out.unwrap(), "b = 1\na = [1, 2]");
  }

  #[test]
  fn recursion_is_rejected_by_default() {
    let src = "\
def f(x):
  return 1 if x == 0 else f(x - 1)
y = f(3)
";
    let err = run(src, syn::Dialect::default()).unwrap_err();
    assert_eq!(
      err,
      "\
Traceback (most recent call last):
  t.kes:3:5: in <toplevel>
  t.kes:2:27: in f
Error: function f called recursively"
    );

    let dialect = syn::Dialect {
      recursion: true,
      ..syn::Dialect::default()
    };
    assert_eq!(run(src, dialect).unwrap(), "f = <function f>\ny = 1");
  }

  #[test]
  fn builtin_errors_name_the_builtin() {
    let err = run("x = len(1)\n", syn::Dialect::default()).unwrap_err();
    assert_eq!(
      err,
      "\
Traceback (most recent call last):
  t.kes:1:5: in <toplevel>
  <builtin>:1: in len
Error: len: value of type int has no len"
    );
  }

  #[test]
  fn print_hook() {
    use std::cell::RefCell;
    let arena = syn::Arena::new();
    let out = RefCell::new(Vec::new());
    let mut thread = Thread::new("test");
    thread.set_print(|_, msg| out.borrow_mut().push(msg.to_string()));
    exec_file(
      &mut thread,
      Path::new("t.kes"),
      "print('a', 1)\nprint([2], sep='-')\n",
      syn::Dialect::default(),
      &StringDict::new(),
      &arena,
    )
    .unwrap();
    drop(thread);
    assert_eq!(out.into_inner(), vec!["a 1", "[2]"]);
  }

  #[test]
  fn static_errors_are_reported_unwrapped() {
    let d = syn::Dialect::default();
    assert_eq!(
      run("f() = 1\n", d).unwrap_err(),
      "t.kes:1:1: cannot assign to function call"
    );
    assert_eq!(run("x = y\n", d).unwrap_err(), "t.kes:1:5: undefined: y");
  }

  #[test]
  fn load_failures() {
    let err =
      run("load('m.kes', 'x')\n", syn::Dialect::default()).unwrap_err();
    assert!(
      err.ends_with("Error: load not implemented by this application"),
      "{}",
      err
    );

    let arena = syn::Arena::new();
    let mut thread = Thread::new("test");
    thread.set_load(|_, _| {
      let mut module = StringDict::new();
      module.insert("x".to_string(), Value::from(1));
      Ok(module)
    });
    let err = exec_file(
      &mut thread,
      Path::new("t.kes"),
      "load('m.kes', 'x', 'y')\n",
      syn::Dialect::default(),
      &StringDict::new(),
      &arena,
    )
    .unwrap_err();
    match err {
      Error::Eval(e) => {
        assert_eq!(e.message, "load: name y not found in module m.kes")
      }
      e => panic!("unexpected error: {}", e),
    }
  }

  /// A host object with a single settable integer field, `n`.
  #[derive(Debug, Default)]
  struct Counter(std::sync::Mutex<i64>);

  impl<'i> value::Extension<'i> for Counter {
    fn type_name(&self) -> &'static str {
      "counter"
    }

    fn attr(
      &self,
      name: &str,
    ) -> std::result::Result<Option<Value<'i>>, ValueError> {
      Ok(match name {
        "n" => Some(Value::from(*self.0.lock().unwrap())),
        _ => None,
      })
    }

    fn set_field(
      &self,
      name: &str,
      value: Value<'i>,
    ) -> std::result::Result<(), ValueError> {
      match (name, &value) {
        ("n", Value::Int(n)) => {
          *self.0.lock().unwrap() = n.to_i64().unwrap_or(0);
          Ok(())
        }
        _ => Err(ValueError::new(format!(
          "cannot set .{} of counter to {}",
          name,
          value.type_name()
        ))),
      }
    }
  }

  #[test]
  fn extension_fields() {
    let arena = syn::Arena::new();
    let mut predeclared = StringDict::new();
    let counter = Arc::new(Counter::default());
    predeclared.insert("c".to_string(), Value::Extension(counter.clone()));

    let mut thread = Thread::new("test");
    let globals = exec_file(
      &mut thread,
      Path::new("t.kes"),
      "c.n = 5\nc.n += 2\nm = c.n\n",
      syn::Dialect::default(),
      &predeclared,
      &arena,
    )
    .unwrap();
    assert_eq!(globals.get("m").map(Value::repr), Some("7".to_string()));
    assert_eq!(*counter.0.lock().unwrap(), 7);

    let err = exec_file(
      &mut thread,
      Path::new("t.kes"),
      "c.n = 'x'\n",
      syn::Dialect::default(),
      &predeclared,
      &arena,
    )
    .unwrap_err();
    match err {
      Error::Eval(e) => {
        assert_eq!(e.message, "cannot set .n of counter to string")
      }
      e => panic!("unexpected error: {}", e),
    }
  }

  #[test]
  fn thread_locals() {
    let mut thread = Thread::new("test");
    thread.set_local("answer", 42u32);
    assert_eq!(thread.local::<u32>("answer"), Some(&42));
    assert_eq!(thread.local::<i64>("answer"), None);
  }
}
