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

//! The expression evaluator.

use num_bigint::BigInt;

use crate::eval::methods;
use crate::eval::ops;
use crate::eval::stdlib;
use crate::eval::value::Dict;
use crate::eval::value::Function;
use crate::eval::value::Int;
use crate::eval::value::Iter;
use crate::eval::value::List;
use crate::eval::value::Str;
use crate::eval::value::Tuple;
use crate::eval::value::Value;
use crate::eval::Env;
use crate::eval::Result;
use crate::eval::Thread;
use crate::syn;
use crate::syn::BinOp;
use crate::syn::Binding;
use crate::syn::Spanned as _;
use crate::syn::UnOp;

impl<'i> Thread<'i> {
  /// Evaluates an expression.
  pub(super) fn eval(
    &mut self,
    env: &mut Env<'i>,
    expr: &'i syn::Expr<'i>,
  ) -> Result<'i, Value<'i>> {
    let val = match expr {
      syn::Expr::Ident(id) => self.lookup(env, id)?,

      syn::Expr::Literal(lit) => match lit.value {
        syn::LitValue::Int(i) => Value::Int(Int::from_i64(i)),
        syn::LitValue::BigInt(digits) => {
          match BigInt::parse_bytes(digits.as_bytes(), 10) {
            Some(i) => Value::Int(Int::from_big(i)),
            None => bug!("malformed integer literal {}", digits),
          }
        }
        syn::LitValue::Float(f) => Value::Float(f),
        syn::LitValue::String(s) => Value::String(Str::new_static(s)),
        syn::LitValue::Bytes(s) => Value::Bytes(Str::new_static(s)),
      },

      syn::Expr::List(seq) => Value::List(List::new(self.eval_all(env, seq)?)),
      syn::Expr::Tuple(seq) => {
        Value::Tuple(Tuple::from(self.eval_all(env, seq)?))
      }

      syn::Expr::Dict(d) => {
        let dict = Dict::new();
        for (k, v) in d.entries {
          let key = self.eval(env, k)?;
          let value = self.eval(env, v)?;
          let dup = dict
            .contains(&key)
            .map_err(|e| self.value_error(k.span(), e))?;
          if dup {
            error!(self, k, "duplicate key: {}", key.repr())
          }
          dict
            .insert(key, value)
            .map_err(|e| self.value_error(k.span(), e))?;
        }
        Value::Dict(dict)
      }

      syn::Expr::Comprehension(c) => self.comprehension(env, c)?,

      syn::Expr::Unary(u) => {
        let x = self.eval(env, u.x)?;
        match u.op {
          UnOp::Not => Value::Bool(!x.truth()),
          op => ops::unary(op, &x).map_err(|e| self.value_error(u.span, e))?,
        }
      }

      syn::Expr::Binary(b) => {
        let x = self.eval(env, b.x)?;
        match b.op {
          BinOp::And if !x.truth() => x,
          BinOp::Or if x.truth() => x,
          BinOp::And | BinOp::Or => self.eval(env, b.y)?,
          op => {
            let y = self.eval(env, b.y)?;
            ops::binary(op, &x, &y).map_err(|e| self.value_error(b.span, e))?
          }
        }
      }

      syn::Expr::Cond(c) => {
        if self.eval(env, c.cond)?.truth() {
          self.eval(env, c.then_expr)?
        } else {
          self.eval(env, c.else_expr)?
        }
      }

      syn::Expr::Lambda(l) => self.make_function(env, l.func)?,

      syn::Expr::Call(c) => self.eval_call(env, c)?,

      syn::Expr::Dot(d) => {
        let x = self.eval(env, d.x)?;
        self.getattr(&x, &d.name)?
      }

      syn::Expr::Index(ix) => {
        let x = self.eval(env, ix.x)?;
        let index = self.eval(env, ix.index)?;
        ops::index(&x, &index).map_err(|e| self.value_error(ix.span, e))?
      }

      syn::Expr::Slice(s) => {
        let x = self.eval(env, s.x)?;
        let mut bound = |e: Option<&'i syn::Expr<'i>>| match e {
          Some(e) => self.eval(env, e),
          None => Ok(Value::None),
        };
        let lo = bound(s.lo)?;
        let hi = bound(s.hi)?;
        let step = bound(s.step)?;
        ops::slice(&x, &lo, &hi, &step)
          .map_err(|e| self.value_error(s.span, e))?
      }
    };
    Ok(val)
  }

  fn eval_all(
    &mut self,
    env: &mut Env<'i>,
    seq: &'i syn::Sequence<'i>,
  ) -> Result<'i, Vec<Value<'i>>> {
    seq.elems.iter().map(|e| self.eval(env, e)).collect()
  }

  /// Reads a variable.
  pub(super) fn lookup(
    &self,
    env: &Env<'i>,
    id: &syn::Ident<'i>,
  ) -> Result<'i, Value<'i>> {
    let (value, scope) = match env.program().binding(id) {
      Binding::Local(slot) => (env.locals[slot as usize].clone(), "local"),
      Binding::Free(slot) => (env.freevars()[slot as usize].clone(), "free"),
      Binding::Global(slot) => (env.module.global(slot), "global"),
      Binding::Universal => {
        let value = match env.module.predeclared(id.name) {
          Some(v) => Some(v.clone()),
          None => stdlib::universe(id.name),
        };
        match value {
          Some(v) => return Ok(v),
          None => error!(self, id, "undefined: {}", id.name),
        }
      }
    };
    match value {
      Some(v) => Ok(v),
      None => error!(
        self,
        id,
        "{} variable {} referenced before assignment",
        scope,
        id.name
      ),
    }
  }

  /// Evaluates `x.name`, which is either a bound builtin method or an
  /// attribute of an extension value.
  pub(super) fn getattr(
    &self,
    x: &Value<'i>,
    name: &syn::Name<'i>,
  ) -> Result<'i, Value<'i>> {
    match methods::getattr(x, name.name) {
      Ok(Some(v)) => Ok(v),
      Ok(None) => error!(
        self,
        name,
        "{} has no .{} field or method",
        x.type_name(),
        name.name
      ),
      Err(e) => Err(self.value_error(name.span, e)),
    }
  }

  /// Creates a function value, evaluating its defaults and capturing its
  /// free variables from the current environment.
  pub(super) fn make_function(
    &mut self,
    env: &mut Env<'i>,
    func: &'i syn::Func<'i>,
  ) -> Result<'i, Value<'i>> {
    let mut defaults = Vec::new();
    for param in func.params {
      if let syn::ParamKind::Optional(default) = param.kind {
        defaults.push(self.eval(env, default)?);
      }
    }

    let info = env.program().function(func);
    let freevars = info
      .freevars
      .iter()
      .map(|b| match *b {
        Binding::Local(slot) => env.locals[slot as usize].clone(),
        Binding::Free(slot) => env.freevars()[slot as usize].clone(),
        b => bug!("free variable of {} bound as {:?}", func.name, b),
      })
      .collect();

    Ok(Value::Function(Function::new(
      func,
      env.module.clone(),
      defaults.into(),
      freevars,
    )))
  }

  /// Evaluates a list or dict comprehension.
  fn comprehension(
    &mut self,
    env: &mut Env<'i>,
    c: &'i syn::Comprehension<'i>,
  ) -> Result<'i, Value<'i>> {
    let acc = match c.body {
      syn::CompBody::List(_) => Value::List(List::default()),
      syn::CompBody::Dict(..) => Value::Dict(Dict::new()),
    };
    self.comp_clause(env, c, 0, &acc)?;
    Ok(acc)
  }

  /// Runs the comprehension's clauses from `clause` inward, adding to `acc`
  /// once every clause has been satisfied.
  fn comp_clause(
    &mut self,
    env: &mut Env<'i>,
    c: &'i syn::Comprehension<'i>,
    clause: usize,
    acc: &Value<'i>,
  ) -> Result<'i, ()> {
    match c.clauses.get(clause) {
      Some(syn::Clause::For { vars, iter, span }) => {
        let iterable = self.eval(env, iter)?;
        let items =
          Iter::new(&iterable).map_err(|e| self.value_error(*span, e))?;
        for item in items {
          self.assign(env, vars, item)?;
          self.comp_clause(env, c, clause + 1, acc)?;
        }
      }
      Some(syn::Clause::If { cond, .. }) => {
        if self.eval(env, cond)?.truth() {
          self.comp_clause(env, c, clause + 1, acc)?;
        }
      }
      None => match (c.body, acc) {
        (syn::CompBody::List(e), Value::List(list)) => {
          let v = self.eval(env, e)?;
          list.push(v).map_err(|err| self.value_error(e.span(), err))?;
        }
        (syn::CompBody::Dict(k, v), Value::Dict(dict)) => {
          let key = self.eval(env, k)?;
          let value = self.eval(env, v)?;
          dict
            .insert(key, value)
            .map_err(|e| self.value_error(k.span(), e))?;
        }
        _ => bug!("comprehension accumulator mismatch"),
      },
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::eval::StringDict;
  use pretty_assertions::assert_eq;
  use std::path::Path;

  fn eval(src: &str) -> String {
    let arena = syn::Arena::new();
    let src = arena.alloc_string(src.to_string());
    let mut thread = Thread::new("test");
    let out = match crate::eval::eval(
      &mut thread,
      Path::new("e.kes"),
      src,
      syn::Dialect::default(),
      &StringDict::new(),
      &arena,
    ) {
      Ok(v) => v.repr(),
      Err(e) => format!("error: {}", e),
    };
    out
  }

  #[test]
  fn comprehension_clauses_nest_in_order() {
    assert_eq!(
      eval("[(x, y) for x in [1, 2] if x == 2 for y in [3, 4]]"),
      "[(2, 3), (2, 4)]"
    );
    assert_eq!(
      eval("{k: v for k, v in [('a', 1), ('b', 2), ('a', 3)]}"),
      r#"{"a": 3, "b": 2}"#
    );
  }

  #[test]
  fn short_circuit() {
    assert_eq!(eval("0 or 'x'"), r#""x""#);
    assert_eq!(eval("[] and 1 // 0"), "[]");
    assert_eq!(eval("not None"), "True");
    assert_eq!(eval("1 if '' else 2"), "2");
  }

  #[test]
  fn slicing_by_bytes() {
    assert_eq!(eval(r#""aΩb"[1]"#), r#""\xce""#);
    assert_eq!(eval("[1, 2, 3][::-1]"), "[3, 2, 1]");
    assert_eq!(eval("(1, 2, 3)[::-1]"), "(3, 2, 1)");
    assert_eq!(eval("'abc'[::-1]"), r#""cba""#);
    assert!(eval("'abc'[::0]").ends_with("zero is not a valid slice step"));
  }

  #[test]
  fn duplicate_dict_keys() {
    assert!(eval("{1: 2, 1: 3}").ends_with("Error: duplicate key: 1"));
  }

  #[test]
  fn big_literals() {
    assert_eq!(
      eval("100000000000000000000 + 1"),
      "100000000000000000001"
    );
  }
}
