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

//! Calls: argument evaluation, the builtin-method fast path, and binding of
//! arguments to a function's parameters.

use std::ptr;

use crate::eval::error::CallError;
use crate::eval::error::EvalError;
use crate::eval::error::ValueError;
use crate::eval::methods;
use crate::eval::value::Args;
use crate::eval::value::Dict;
use crate::eval::value::Function;
use crate::eval::value::Iter;
use crate::eval::value::Str;
use crate::eval::value::Value;
use crate::eval::Callable;
use crate::eval::Env;
use crate::eval::Flow;
use crate::eval::Frame;
use crate::eval::Result;
use crate::eval::Thread;
use crate::syn;
use crate::syn::Span;

impl<'i> Thread<'i> {
  /// Calls `fnc` with `args` on behalf of the host or a builtin.
  pub fn call(
    &mut self,
    fnc: &Value<'i>,
    args: Args<'i>,
  ) -> Result<'i, Value<'i>> {
    let span = match self.stack.last() {
      Some(frame) => frame.pos,
      None => Self::builtin_span(),
    };
    self.call_value(span, fnc, None, args)
  }

  /// Evaluates a call expression.
  pub(super) fn eval_call(
    &mut self,
    env: &mut Env<'i>,
    call: &'i syn::Call<'i>,
  ) -> Result<'i, Value<'i>> {
    // `recv.method(...)` calls a builtin method without binding it first.
    let (fnc, recv) = match call.fnc {
      syn::Expr::Dot(dot) => {
        let recv = self.eval(env, dot.x)?;
        match methods::lookup(&recv, dot.name.name) {
          Some(method) => (Value::Builtin(method), Some(recv)),
          None => (self.getattr(&recv, &dot.name)?, None),
        }
      }
      fnc => (self.eval(env, fnc)?, None),
    };
    let args = self.eval_args(env, call)?;

    self.set_pos(call.span);
    self.call_value(call.span, &fnc, recv.as_ref(), args)
  }

  /// Evaluates the actual arguments of a call, flattening `*args` and
  /// `**kwargs`.
  fn eval_args(
    &mut self,
    env: &mut Env<'i>,
    call: &'i syn::Call<'i>,
  ) -> Result<'i, Args<'i>> {
    let mut args = Args::default();
    for arg in call.args {
      let value = self.eval(env, &arg.value)?;
      match arg.kind {
        syn::ArgKind::Positional => args.positional.push(value),
        syn::ArgKind::Named(name) => {
          args.named.push((Str::from_static(name.name), value))
        }
        syn::ArgKind::Star => match Iter::new(&value) {
          Ok(iter) => args.positional.extend(iter),
          Err(_) => error!(
            self,
            arg,
            "argument after * must be iterable, not {}",
            value.type_name()
          ),
        },
        syn::ArgKind::StarStar => {
          let dict = match &value {
            Value::Dict(d) => d,
            _ => error!(
              self,
              arg,
              "argument after ** must be a mapping, not {}",
              value.type_name()
            ),
          };
          for (k, v) in dict.items() {
            match k {
              Value::String(k) => args.named.push((k, v)),
              k => error!(
                self,
                arg,
                "keywords must be strings, not {}",
                k.type_name()
              ),
            }
          }
        }
      }
    }
    Ok(args)
  }

  /// Calls any callable value. `recv` is the receiver of a method found by
  /// the fast path.
  fn call_value(
    &mut self,
    span: Span<'i>,
    fnc: &Value<'i>,
    recv: Option<&Value<'i>>,
    args: Args<'i>,
  ) -> Result<'i, Value<'i>> {
    match fnc {
      Value::Function(f) => self.call_function(span, f, args),
      Value::Builtin(b) => {
        let recv = recv.or_else(|| b.receiver());
        let fnc = b.fnc();
        self.call_native(b.name(), |thread| fnc(thread, recv, args))
      }
      Value::Extension(e) => {
        let e = e.clone();
        self.call_native(e.type_name(), |thread| match e.call(thread, args) {
          Some(result) => result,
          None => Err(CallError::new("value is not callable")),
        })
      }
      _ => error!(
        self,
        span,
        "invalid call of non-function ({})",
        fnc.type_name()
      ),
    }
  }

  /// Runs host code in a synthetic builtin frame. Unpositioned errors are
  /// prefixed with `name` and attributed to that frame.
  fn call_native(
    &mut self,
    name: &'static str,
    f: impl FnOnce(&mut Self) -> std::result::Result<Value<'i>, CallError<'i>>,
  ) -> Result<'i, Value<'i>> {
    self.stack.push(Frame {
      callable: Callable::Builtin(name),
      pos: Self::builtin_span(),
    });
    let result = f(self).map_err(|e| match e {
      CallError::Value(e) => EvalError::new(
        self,
        Self::builtin_span(),
        format!("{}: {}", name, e),
      ),
      CallError::Eval(e) => e,
    });
    self.stack.pop();
    result
  }

  /// Calls a Kestrel function in a new frame.
  fn call_function(
    &mut self,
    span: Span<'i>,
    f: &Function<'i>,
    args: Args<'i>,
  ) -> Result<'i, Value<'i>> {
    let program = f.module().program();
    if !program.allow_recursion {
      let recursive = self.stack.iter().any(|frame| match &frame.callable {
        Callable::Function(g) => ptr::eq(g.func(), f.func()),
        _ => false,
      });
      if recursive {
        error!(self, span, "function {} called recursively", f.name())
      }
    }

    let locals = bind_args(f, args).map_err(|e| self.value_error(span, e))?;
    let mut env = Env {
      module: f.module().clone(),
      locals,
      fnc: Some(f.clone()),
    };

    self.stack.push(Frame {
      callable: Callable::Function(f.clone()),
      pos: f.func().span,
    });
    let result = self.exec_stmts(&mut env, f.func().body);
    self.stack.pop();

    match result? {
      Flow::Return(v) => Ok(v),
      Flow::Normal => Ok(Value::None),
      flow => bug!("{:?} escaped function {}", flow, f.name()),
    }
  }
}

fn plural(n: usize) -> &'static str {
  if n == 1 {
    ""
  } else {
    "s"
  }
}

/// Binds actual arguments to the parameters of `f`, returning the initial
/// contents of its local slots.
///
/// Ordinary parameters occupy the first slots, followed by `*args` and then
/// `**kwargs`.
pub(super) fn bind_args<'i>(
  f: &Function<'i>,
  args: Args<'i>,
) -> std::result::Result<Vec<Option<Value<'i>>>, ValueError> {
  let info = f.info();
  let name = f.name();
  let nparams = info.num_params as usize;
  let defaults = f.defaults();
  let given = args.positional.len() + args.named.len();
  let mut locals = vec![None; info.num_locals as usize];

  if nparams == 0 && !info.has_varargs && !info.has_kwargs {
    if given > 0 {
      return Err(ValueError::new(format!(
        "function {} takes no arguments ({} given)",
        name, given
      )));
    }
    return Ok(locals);
  }

  let mut positional = args.positional;
  if positional.len() > nparams && !info.has_varargs {
    return Err(ValueError::new(format!(
      "function {} takes {} {} positional argument{} ({} given)",
      name,
      if defaults.is_empty() { "exactly" } else { "at most" },
      nparams,
      plural(nparams),
      given
    )));
  }

  let surplus = positional.split_off(positional.len().min(nparams));
  let n = positional.len();
  for (slot, v) in locals.iter_mut().zip(positional) {
    *slot = Some(v);
  }

  if info.has_varargs {
    locals[nparams] = Some(Value::Tuple(surplus.into()));
  }

  let kwargs = if info.has_kwargs {
    let dict = Dict::new();
    let slot = nparams + info.has_varargs as usize;
    locals[slot] = Some(Value::Dict(dict.clone()));
    Some(dict)
  } else {
    None
  };

  let params = &f.func().params[..nparams];
  for (key, v) in args.named {
    let key_str = key.to_str_lossy();
    if let Some(i) = params.iter().position(|p| p.name.name == key_str) {
      if locals[i].is_some() {
        return Err(ValueError::new(format!(
          "function {} got multiple values for keyword argument {}",
          name, key_str
        )));
      }
      locals[i] = Some(v);
      continue;
    }

    let kwargs = match &kwargs {
      Some(kwargs) => kwargs,
      None => {
        return Err(ValueError::new(format!(
          "function {} got an unexpected keyword argument {}",
          name, key_str
        )))
      }
    };
    let len = kwargs.len();
    kwargs.insert(Value::String(key.clone()), v)?;
    if kwargs.len() == len {
      return Err(ValueError::new(format!(
        "function {} got multiple values for keyword argument {}",
        name, key_str
      )));
    }
  }

  if n < nparams {
    let first_default = nparams - defaults.len();
    let missing = (n..first_default)
      .filter(|&i| locals[i].is_none())
      .map(|i| params[i].name.name)
      .collect::<Vec<_>>();
    if !missing.is_empty() {
      return Err(ValueError::new(format!(
        "function {} takes {} {} positional argument{} ({} given); \
         missing {}",
        name,
        if defaults.is_empty() { "exactly" } else { "at least" },
        first_default,
        plural(first_default),
        given,
        missing.join(", ")
      )));
    }

    for i in first_default.max(n)..nparams {
      if locals[i].is_none() {
        locals[i] = Some(defaults[i - first_default].clone());
      }
    }
  }

  Ok(locals)
}

#[cfg(test)]
mod tests {
  use crate::eval::StringDict;
  use crate::eval::Thread;
  use crate::syn;
  use pretty_assertions::assert_eq;
  use std::path::Path;

  /// Runs `src`, returning the repr of `result` or the error message.
  fn run(src: &str) -> String {
    let arena = syn::Arena::new();
    let src = arena.alloc_string(src.to_string());
    let mut thread = Thread::new("test");
    let out = match crate::eval::exec_file(
      &mut thread,
      Path::new("call.kes"),
      src,
      syn::Dialect::default(),
      &StringDict::new(),
      &arena,
    ) {
      Ok(globals) => match globals.get("result") {
        Some(v) => v.repr(),
        None => "no result".to_string(),
      },
      Err(crate::eval::error::Error::Eval(e)) => e.message,
      Err(e) => e.to_string(),
    };
    out
  }

  #[test]
  fn binds_every_kind_of_argument() {
    let src = r#"
def f(a, b=42, *args, **kwargs):
  return a, b, args, kwargs
result = f(0, 1, x=2, *[3, 4], y=5, **{"z": 6})
"#;
    assert_eq!(run(src), r#"(0, 1, (3, 4), {"x": 2, "y": 5, "z": 6})"#);
  }

  #[test]
  fn defaults_fill_gaps() {
    let src = "def f(a, b=2, c=3):\n  return [a, b, c]\nresult = f(1, c=4)\n";
    assert_eq!(run(src), "[1, 2, 4]");
  }

  #[test]
  fn arity_errors() {
    assert_eq!(
      run("def b(a, b):\n  pass\nb(1, 2, 3)\n"),
      "function b takes exactly 2 positional arguments (3 given)"
    );
    assert_eq!(
      run("def c(a, b=42):\n  pass\nc()\n"),
      "function c takes at least 1 positional argument (0 given); missing a"
    );
    assert_eq!(
      run("def d(a, b, c=1):\n  pass\nd(c=2)\n"),
      "function d takes at least 2 positional arguments (1 given); \
       missing a, b"
    );
    assert_eq!(
      run("def e(a=1):\n  pass\ne(1, 2)\n"),
      "function e takes at most 1 positional argument (2 given)"
    );
    assert_eq!(
      run("def g():\n  pass\ng(1, x=2)\n"),
      "function g takes no arguments (2 given)"
    );
  }

  #[test]
  fn keyword_errors() {
    assert_eq!(
      run("def f(a):\n  pass\nf(1, a=2)\n"),
      "function f got multiple values for keyword argument a"
    );
    assert_eq!(
      run("def f(a):\n  pass\nf(1, b=2)\n"),
      "function f got an unexpected keyword argument b"
    );
    assert_eq!(
      run("def f(**kw):\n  pass\nf(a=1, **{'a': 2})\n"),
      "function f got multiple values for keyword argument a"
    );
  }

  #[test]
  fn splat_errors() {
    assert_eq!(
      run("def f(*a):\n  pass\nf(*1)\n"),
      "argument after * must be iterable, not int"
    );
    assert_eq!(
      run("def f(**a):\n  pass\nf(**{1: 2})\n"),
      "keywords must be strings, not int"
    );
  }

  #[test]
  fn methods_and_non_callables() {
    assert_eq!(run("x = [1]\nx.append(2)\nresult = x\n"), "[1, 2]");
    assert_eq!(run("f = [].append\nf(1)\nresult = 1\n"), "1");
    assert_eq!(run("x = 1\nx()\n"), "invalid call of non-function (int)");
    assert_eq!(run("x = 1\nx.foo\n"), "int has no .foo field or method");
  }
}
