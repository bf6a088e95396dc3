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

//! Static name resolution.
//!
//! The resolver walks a parsed `File` once, assigning every identifier
//! occurrence a `Binding` and every function literal a `FunctionInfo`. The
//! evaluator trusts these tables and never looks names up by string, except
//! for `Binding::Universal`.

use std::collections::HashMap;

use crate::syn::*;

const NO_FLOAT: &str = "dialect does not support floating point (use //)";

/// Dialect options, which turn optional language features on or off.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Dialect {
  /// Allows float literals, the `/` operator and the `float` builtin.
  pub float: bool,
  /// Allows the `set` builtin.
  pub set: bool,
  /// Allows `lambda` expressions.
  pub lambda: bool,
  /// Allows `def` statements inside functions.
  pub nested_def: bool,
  /// Allows functions to call themselves.
  pub recursion: bool,
  /// Allows a global to be bound more than once at the top level.
  pub global_reassign: bool,
}

impl Default for Dialect {
  fn default() -> Self {
    Dialect {
      float: true,
      set: true,
      lambda: true,
      nested_def: true,
      recursion: false,
      global_reassign: false,
    }
  }
}

/// Where a resolved identifier lives at runtime.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Binding {
  /// A slot in the current frame's locals.
  Local(u32),
  /// A slot in the current function's captured free variables.
  Free(u32),
  /// A slot in the module's globals.
  Global(u32),
  /// A predeclared or universal name, looked up by name.
  Universal,
}

/// Static facts about a function literal.
#[derive(Copy, Clone, Debug, Default)]
pub struct FunctionInfo<'i> {
  /// The size of the function's local slot array.
  pub num_locals: u32,
  /// The number of ordinary (non-star) parameters.
  pub num_params: u32,
  /// How many of the ordinary parameters have defaults.
  pub num_defaults: u32,
  /// Whether the function has a `*args` parameter.
  pub has_varargs: bool,
  /// Whether the function has a `**kwargs` parameter.
  pub has_kwargs: bool,
  /// The captured variables, each as a binding in the enclosing scope.
  pub freevars: &'i [Binding],
}

/// A resolved file, ready for evaluation.
#[derive(Copy, Clone, Debug)]
pub struct Program<'i> {
  /// The syntax tree.
  pub file: &'i File<'i>,
  /// Resolved bindings, indexed by `Ident::id`.
  pub bindings: &'i [Binding],
  /// Function facts, indexed by `Func::id`.
  pub functions: &'i [FunctionInfo<'i>],
  /// The names of the module's globals, indexed by slot.
  pub globals: &'i [&'i str],
  /// The number of local slots in the module's top-level frame.
  pub toplevel_locals: u32,
  /// Whether recursive calls are permitted.
  pub allow_recursion: bool,
}

impl<'i> Program<'i> {
  /// Returns the binding of `ident`.
  pub fn binding(&self, ident: &Ident<'i>) -> Binding {
    self.bindings[ident.id as usize]
  }

  /// Returns the facts for `func`.
  pub fn function(&self, func: &Func<'i>) -> &'i FunctionInfo<'i> {
    &self.functions[func.id as usize]
  }
}

/// One resolution failure.
#[derive(Clone, Debug)]
pub struct Diagnostic<'i> {
  /// Where the problem is.
  pub span: Span<'i>,
  /// What the problem is.
  pub message: String,
}

/// The errors found while resolving a file, in source order.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{}", render(.errors))]
pub struct ResolveError<'i> {
  /// Every error found; never empty.
  pub errors: Vec<Diagnostic<'i>>,
}

fn render(errors: &[Diagnostic]) -> String {
  errors
    .iter()
    .map(|d| format!("{}: {}", d.span, d.message))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Resolves the names in `file`.
///
/// `is_predeclared` and `is_universal` report which free names the host will
/// supply at runtime. The universal names `float` and `set` are only visible
/// when `dialect` enables them.
pub fn resolve<'i>(
  file: &'i File<'i>,
  dialect: Dialect,
  is_predeclared: &dyn Fn(&str) -> bool,
  is_universal: &dyn Fn(&str) -> bool,
  arena: &'i Arena,
) -> Result<&'i Program<'i>, ResolveError<'i>> {
  let mut r = Resolver {
    arena,
    dialect,
    is_predeclared,
    is_universal,
    bindings: vec![Binding::Universal; file.num_idents as usize],
    functions: vec![FunctionInfo::default(); file.num_funcs as usize],
    globals: HashMap::new(),
    global_names: Vec::new(),
    scopes: vec![Scope {
      blocks: vec![HashMap::new()],
      ..Scope::default()
    }],
    errors: Vec::new(),
  };

  r.collect(file.stmts);
  r.stmts(file.stmts);

  if !r.errors.is_empty() {
    r.errors.sort_by_key(|d| d.span.start_byte());
    return Err(ResolveError { errors: r.errors });
  }

  Ok(arena.alloc(Program {
    file,
    bindings: arena.alloc_vec(r.bindings),
    functions: arena.alloc_vec(r.functions),
    globals: arena.alloc_vec(r.global_names),
    toplevel_locals: r.scopes[0].num_locals,
    allow_recursion: dialect.recursion,
  }))
}

/// The scope of a function body, or of the module's top level.
#[derive(Default)]
struct Scope<'i> {
  /// `blocks[0]` holds the function's locals, or at the top level the names
  /// bound by `load`. Later entries are comprehension scopes.
  blocks: Vec<HashMap<&'i str, (u32, Span<'i>)>>,
  num_locals: u32,
  freevars: Vec<Binding>,
  free_index: HashMap<&'i str, u32>,
  loops: u32,
  /// Depth of `if`/`for` nesting.
  control: u32,
}

impl<'i> Scope<'i> {
  fn new_slot(&mut self) -> u32 {
    self.num_locals += 1;
    self.num_locals - 1
  }
}

struct Resolver<'i, 'a> {
  arena: &'i Arena,
  dialect: Dialect,
  is_predeclared: &'a dyn Fn(&str) -> bool,
  is_universal: &'a dyn Fn(&str) -> bool,
  bindings: Vec<Binding>,
  functions: Vec<FunctionInfo<'i>>,
  globals: HashMap<&'i str, (u32, Span<'i>)>,
  global_names: Vec<&'i str>,
  scopes: Vec<Scope<'i>>,
  errors: Vec<Diagnostic<'i>>,
}

impl<'i, 'a> Resolver<'i, 'a> {
  fn error(&mut self, span: Span<'i>, message: impl Into<String>) {
    self.errors.push(Diagnostic {
      span,
      message: message.into(),
    })
  }

  fn at_toplevel(&self) -> bool {
    self.scopes.len() == 1
  }

  fn scope(&mut self) -> &mut Scope<'i> {
    // The module scope is never popped.
    let last = self.scopes.len() - 1;
    &mut self.scopes[last]
  }

  fn bind(&mut self, ident: &Ident<'i>, binding: Binding) {
    self.bindings[ident.id as usize] = binding;
  }

  // -- Declaration pre-pass. --

  /// Declares the names bound directly in `stmts`, descending into `if` and
  /// `for` bodies but not into nested functions.
  fn collect(&mut self, stmts: &'i [Stmt<'i>]) {
    for stmt in stmts {
      match stmt {
        Stmt::Assign(a) => self.declare_target(a.lhs),
        Stmt::Def(d) => self.declare(&d.name),
        Stmt::For(f) => {
          self.declare_target(f.vars);
          self.collect(f.body);
        }
        Stmt::If(i) => {
          self.collect(i.then_block);
          self.collect(i.else_block);
        }
        Stmt::Load(l) if self.at_toplevel() => {
          for b in l.bindings {
            self.declare_load(&b.local);
          }
        }
        _ => {}
      }
    }
  }

  fn declare_target(&mut self, target: &'i Expr<'i>) {
    match target {
      Expr::Ident(id) => self.declare(id),
      Expr::Tuple(seq) | Expr::List(seq) => {
        for elem in seq.elems {
          self.declare_target(elem);
        }
      }
      _ => {}
    }
  }

  fn declare(&mut self, ident: &Ident<'i>) {
    if !self.at_toplevel() {
      let scope = self.scope();
      if !scope.blocks[0].contains_key(ident.name) {
        let slot = scope.new_slot();
        scope.blocks[0].insert(ident.name, (slot, ident.span));
      }
      return;
    }

    let loaded = self.scopes[0].blocks[0]
      .get(ident.name)
      .map(|&(_, span)| span);
    if let Some(prev) = loaded {
      return self.error(
        ident.span,
        format!(
          "cannot reassign top-level {} declared at {}",
          ident.name, prev
        ),
      );
    }
    match self.globals.get(ident.name) {
      Some(&(_, prev)) if !self.dialect.global_reassign => self.error(
        ident.span,
        format!("cannot reassign global {} declared at {}", ident.name, prev),
      ),
      Some(_) => {}
      None => {
        let slot = self.global_names.len() as u32;
        self.globals.insert(ident.name, (slot, ident.span));
        self.global_names.push(ident.name);
      }
    }
  }

  fn declare_load(&mut self, ident: &Ident<'i>) {
    let scope = &mut self.scopes[0];
    let prev = scope.blocks[0]
      .get(ident.name)
      .map(|&(_, span)| span)
      .or_else(|| self.globals.get(ident.name).map(|&(_, span)| span));
    if let Some(prev) = prev {
      return self.error(
        ident.span,
        format!(
          "cannot reassign top-level {} declared at {}",
          ident.name, prev
        ),
      );
    }
    let slot = scope.new_slot();
    scope.blocks[0].insert(ident.name, (slot, ident.span));
  }

  // -- Lookup. --

  fn use_ident(&mut self, ident: &Ident<'i>) {
    let depth = self.scopes.len() - 1;
    let binding = match self.lookup(depth, ident.name) {
      Some(b) => b,
      None => {
        let universal = match ident.name {
          "float" if !self.dialect.float => false,
          "set" if !self.dialect.set => false,
          name => (self.is_universal)(name),
        };
        if !universal && !(self.is_predeclared)(ident.name) {
          self.error(ident.span, format!("undefined: {}", ident.name));
        }
        Binding::Universal
      }
    };
    self.bind(ident, binding);
  }

  /// Looks up `name` starting from the scope at `depth`, capturing it as a
  /// free variable of every function it crosses.
  fn lookup(&mut self, depth: usize, name: &'i str) -> Option<Binding> {
    let scope = &self.scopes[depth];
    for block in scope.blocks.iter().rev() {
      if let Some(&(slot, _)) = block.get(name) {
        return Some(Binding::Local(slot));
      }
    }
    if let Some(&index) = scope.free_index.get(name) {
      return Some(Binding::Free(index));
    }
    if depth == 0 {
      return self.globals.get(name).map(|&(slot, _)| Binding::Global(slot));
    }

    match self.lookup(depth - 1, name)? {
      outer @ (Binding::Local(_) | Binding::Free(_)) => {
        let scope = &mut self.scopes[depth];
        let index = scope.freevars.len() as u32;
        scope.freevars.push(outer);
        scope.free_index.insert(name, index);
        Some(Binding::Free(index))
      }
      outer => Some(outer),
    }
  }

  // -- Statements. --

  fn stmts(&mut self, stmts: &'i [Stmt<'i>]) {
    for stmt in stmts {
      self.stmt(stmt);
    }
  }

  fn stmt(&mut self, stmt: &'i Stmt<'i>) {
    match stmt {
      Stmt::Expr(e) => self.expr(e),
      Stmt::Assign(a) => {
        if a.op == Some(BinOp::Div) && !self.dialect.float {
          self.error(a.span, NO_FLOAT);
        }
        self.expr(a.rhs);
        self.target(a.lhs);
      }
      Stmt::Def(d) => {
        if !self.at_toplevel() && !self.dialect.nested_def {
          self.error(d.span, "nested def statements are not allowed");
        }
        self.function(d.func);
        self.use_ident(&d.name);
      }
      Stmt::If(i) => {
        self.expr(i.cond);
        self.scope().control += 1;
        self.stmts(i.then_block);
        self.stmts(i.else_block);
        self.scope().control -= 1;
      }
      Stmt::For(f) => {
        self.expr(f.iter);
        self.target(f.vars);
        let scope = self.scope();
        scope.control += 1;
        scope.loops += 1;
        self.stmts(f.body);
        let scope = self.scope();
        scope.control -= 1;
        scope.loops -= 1;
      }
      Stmt::Return(r) => {
        if self.at_toplevel() {
          self.error(r.span, "return statement not within a function");
        }
        if let Some(value) = r.value {
          self.expr(value);
        }
      }
      Stmt::Branch(b) => {
        let what = match b.kind {
          BranchKind::Break => "break",
          BranchKind::Continue => "continue",
          BranchKind::Pass => return,
        };
        if self.scope().loops == 0 {
          self.error(b.span, format!("{} not in a loop", what));
        }
      }
      Stmt::Load(l) => {
        if !self.at_toplevel() {
          return self.error(l.span, "load statement within a function");
        }
        if self.scopes[0].control > 0 {
          return self.error(l.span, "load statement not at top level");
        }
        for b in l.bindings {
          let slot = self.scopes[0].blocks[0]
            .get(b.local.name)
            .map(|&(slot, _)| slot);
          match slot {
            Some(slot) => self.bind(&b.local, Binding::Local(slot)),
            None => self.use_ident(&b.local),
          }
        }
      }
    }
  }

  /// Resolves the names in an assignment target. Its identifiers were
  /// declared by `collect`.
  fn target(&mut self, target: &'i Expr<'i>) {
    match target {
      Expr::Ident(id) => self.use_ident(id),
      Expr::Tuple(seq) | Expr::List(seq) => {
        for elem in seq.elems {
          self.target(elem);
        }
      }
      e => self.expr(e),
    }
  }

  fn function(&mut self, func: &'i Func<'i>) {
    for param in func.params {
      if let ParamKind::Optional(default) = param.kind {
        self.expr(default);
      }
    }

    let mut info = FunctionInfo::default();
    let mut seen_optional = false;
    for param in func.params {
      let problem = match param.kind {
        _ if info.has_kwargs => Some("parameter may not follow **kwargs"),
        ParamKind::Varargs if info.has_varargs => {
          Some("multiple * parameters not allowed")
        }
        ParamKind::Required | ParamKind::Optional(_) if info.has_varargs => {
          Some("parameter may not follow *args")
        }
        ParamKind::Required if seen_optional => {
          Some("required parameter may not follow optional")
        }
        _ => None,
      };
      if let Some(problem) = problem {
        self.error(param.span, problem);
      }
      match param.kind {
        ParamKind::Required => info.num_params += 1,
        ParamKind::Optional(_) => {
          info.num_params += 1;
          info.num_defaults += 1;
          seen_optional = true;
        }
        ParamKind::Varargs => info.has_varargs = true,
        ParamKind::Kwargs => info.has_kwargs = true,
      }
    }

    let mut scope = Scope::default();
    scope.blocks.push(HashMap::new());
    for param in func.params {
      if let Some(&(_, prev)) = scope.blocks[0].get(param.name.name) {
        self.error(
          param.name.span,
          format!(
            "duplicate parameter: {} (previously declared at {})",
            param.name.name, prev
          ),
        );
        continue;
      }
      let slot = scope.new_slot();
      scope.blocks[0].insert(param.name.name, (slot, param.name.span));
    }
    self.scopes.push(scope);

    for param in func.params {
      self.use_ident(&param.name);
    }
    self.collect(func.body);
    self.stmts(func.body);

    let scope = self.scopes.pop().unwrap_or_default();
    info.num_locals = scope.num_locals;
    info.freevars = self.arena.alloc_vec(scope.freevars);
    self.functions[func.id as usize] = info;
  }

  // -- Expressions. --

  fn expr(&mut self, expr: &'i Expr<'i>) {
    match expr {
      Expr::Ident(id) => self.use_ident(id),
      Expr::Literal(lit) => {
        if let LitValue::Float(_) = lit.value {
          if !self.dialect.float {
            self.error(
              lit.span,
              "dialect does not support floating point (use --float)",
            );
          }
        }
      }
      Expr::List(seq) | Expr::Tuple(seq) => {
        for elem in seq.elems {
          self.expr(elem);
        }
      }
      Expr::Dict(dict) => {
        for (k, v) in dict.entries {
          self.expr(k);
          self.expr(v);
        }
      }
      Expr::Comprehension(comp) => self.comprehension(comp),
      Expr::Unary(u) => self.expr(u.x),
      Expr::Binary(b) => {
        if b.op == BinOp::Div && !self.dialect.float {
          self.error(b.span, NO_FLOAT);
        }
        self.expr(b.x);
        self.expr(b.y);
      }
      Expr::Cond(c) => {
        self.expr(c.cond);
        self.expr(c.then_expr);
        self.expr(c.else_expr);
      }
      Expr::Lambda(l) => {
        if !self.dialect.lambda {
          self.error(l.span, "lambda expressions are not allowed");
        }
        self.function(l.func);
      }
      Expr::Call(c) => {
        self.expr(c.fnc);
        for arg in c.args {
          self.expr(&arg.value);
        }
      }
      Expr::Dot(d) => self.expr(d.x),
      Expr::Index(i) => {
        self.expr(i.x);
        self.expr(i.index);
      }
      Expr::Slice(s) => {
        self.expr(s.x);
        for e in [s.lo, s.hi, s.step].into_iter().flatten() {
          self.expr(e);
        }
      }
    }
  }

  fn comprehension(&mut self, comp: &'i Comprehension<'i>) {
    // The first iterable is evaluated in the enclosing scope.
    if let Some(Clause::For { iter, .. }) = comp.clauses.first() {
      self.expr(iter);
    }

    self.scope().blocks.push(HashMap::new());
    for (i, clause) in comp.clauses.iter().enumerate() {
      match clause {
        Clause::For { vars, iter, .. } => {
          if i > 0 {
            self.expr(iter);
          }
          self.comprehension_vars(vars);
        }
        Clause::If { cond, .. } => self.expr(cond),
      }
    }
    match comp.body {
      CompBody::List(e) => self.expr(e),
      CompBody::Dict(k, v) => {
        self.expr(k);
        self.expr(v);
      }
    }
    self.scope().blocks.pop();
  }

  fn comprehension_vars(&mut self, vars: &'i Expr<'i>) {
    match vars {
      Expr::Ident(id) => {
        let scope = self.scope();
        let slot = scope.new_slot();
        if let Some(block) = scope.blocks.last_mut() {
          block.insert(id.name, (slot, id.span));
        }
        self.bind(id, Binding::Local(slot));
      }
      Expr::Tuple(seq) | Expr::List(seq) => {
        for elem in seq.elems {
          self.comprehension_vars(elem);
        }
      }
      e => self.expr(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use std::path::Path;

  fn universal(name: &str) -> bool {
    matches!(name, "len" | "range" | "float" | "set" | "None" | "True")
  }

  fn check(src: &str, dialect: Dialect) -> Result<(), String> {
    let arena = Arena::new();
    let file =
      parse(Path::new("t.kes"), src, &arena).map_err(|e| e.to_string())?;
    let out = resolve(file, dialect, &|_| false, &universal, &arena)
      .map(|_| ())
      .map_err(|e| e.to_string());
    out
  }

  fn err(src: &str) -> String {
    check(src, Dialect::default()).unwrap_err()
  }

  #[test]
  fn static_errors() {
    assert_eq!(err("x = y\n"), "t.kes:1:5: undefined: y");
    assert_eq!(
      err("x = 1\nx = 2\n"),
      "t.kes:2:1: cannot reassign global x declared at t.kes:1:1"
    );
    assert_eq!(err("break\n"), "t.kes:1:1: break not in a loop");
    assert_eq!(
      err("return 1\n"),
      "t.kes:1:1: return statement not within a function"
    );
    assert_eq!(
      err("def f(a=1, b): pass\n"),
      "t.kes:1:12: required parameter may not follow optional"
    );
    assert_eq!(
      err("def f():\n  load('m', 'x')\n"),
      "t.kes:2:3: load statement within a function"
    );
    assert_eq!(
      err("a = b\nc = d\n"),
      "t.kes:1:5: undefined: b\nt.kes:2:5: undefined: d"
    );
  }

  #[test]
  fn dialect_flags() {
    let strict = Dialect {
      float: false,
      set: false,
      lambda: false,
      nested_def: false,
      ..Dialect::default()
    };
    assert!(check("x = 1.5\n", strict).is_err());
    assert_eq!(
      check("x = float\n", strict),
      Err("t.kes:1:5: undefined: float".to_string())
    );
    assert_eq!(
      check("f = lambda: 1\n", strict),
      Err("t.kes:1:5: lambda expressions are not allowed".to_string())
    );
    assert!(check("def f():\n  def g(): pass\n", strict).is_err());
    let src = "x = float\nf = lambda: set\n";
    assert_eq!(check(src, Dialect::default()), Ok(()));

    let reassign = Dialect {
      global_reassign: true,
      ..Dialect::default()
    };
    assert_eq!(check("x = 1\nx += 2\n", reassign), Ok(()));
  }

  fn def_func<'i>(stmt: &Stmt<'i>) -> &'i Func<'i> {
    match stmt {
      Stmt::Def(d) => d.func,
      s => panic!("expected def, got {:?}", s),
    }
  }

  #[test]
  fn free_variables_thread_through_scopes() {
    let src = "
def outer(a):
  b = 1
  def mid():
    def inner():
      return a + b
    return inner
  return mid
";
    let arena = Arena::new();
    let file = parse(Path::new("t.kes"), src, &arena).unwrap();
    let program =
      resolve(file, Dialect::default(), &|_| false, &universal, &arena)
        .unwrap();

    let outer = def_func(&file.stmts[0]);
    let mid = def_func(&outer.body[1]);
    let inner = def_func(&mid.body[0]);

    let info = program.function(outer);
    assert_eq!((info.num_locals, info.num_params), (3, 1));
    assert!(info.freevars.is_empty());
    assert_eq!(
      program.function(mid).freevars,
      &[Binding::Local(0), Binding::Local(1)]
    );
    assert_eq!(
      program.function(inner).freevars,
      &[Binding::Free(0), Binding::Free(1)]
    );
  }

  #[test]
  fn comprehension_slots() {
    let src = "
z = [x for x in [1]]
def f(y, *args, **kw):
  return {k: 1 for k in y}
";
    let arena = Arena::new();
    let file = parse(Path::new("t.kes"), src, &arena).unwrap();
    let program =
      resolve(file, Dialect::default(), &|_| false, &universal, &arena)
        .unwrap();
    assert_eq!(program.toplevel_locals, 1);
    assert_eq!(program.globals, &["z", "f"]);

    let info = program.function(def_func(&file.stmts[1]));
    assert_eq!(info.num_locals, 4);
    assert_eq!(info.num_params, 1);
    assert!(info.has_varargs && info.has_kwargs);
    assert!(!program.allow_recursion);
  }
}
