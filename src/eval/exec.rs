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

//! The statement executor.

use crate::eval::ops;
use crate::eval::value::Iter;
use crate::eval::value::Value;
use crate::eval::Env;
use crate::eval::Flow;
use crate::eval::Result;
use crate::eval::Thread;
use crate::syn;
use crate::syn::Binding;
use crate::syn::BinOp;
use crate::syn::Spanned as _;

impl<'i> Thread<'i> {
  /// Executes a block, stopping at the first statement that does not
  /// complete normally.
  pub(super) fn exec_stmts(
    &mut self,
    env: &mut Env<'i>,
    stmts: &'i [syn::Stmt<'i>],
  ) -> Result<'i, Flow<'i>> {
    for stmt in stmts {
      match self.exec_stmt(env, stmt)? {
        Flow::Normal => continue,
        flow => return Ok(flow),
      }
    }
    Ok(Flow::Normal)
  }

  fn exec_stmt(
    &mut self,
    env: &mut Env<'i>,
    stmt: &'i syn::Stmt<'i>,
  ) -> Result<'i, Flow<'i>> {
    match stmt {
      syn::Stmt::Expr(e) => {
        self.eval(env, e)?;
      }

      syn::Stmt::Assign(a) => match a.op {
        None => {
          let value = self.eval(env, a.rhs)?;
          self.assign(env, a.lhs, value)?;
        }
        Some(op) => self.exec_aug_assign(env, a, op)?,
      },

      syn::Stmt::Def(d) => {
        let f = self.make_function(env, d.func)?;
        self.assign_ident(env, &d.name, f);
      }

      syn::Stmt::If(i) => {
        let block = if self.eval(env, i.cond)?.truth() {
          i.then_block
        } else {
          i.else_block
        };
        return self.exec_stmts(env, block);
      }

      syn::Stmt::For(f) => {
        let iterable = self.eval(env, f.iter)?;
        let iter = Iter::new(&iterable)
          .map_err(|e| self.value_error(f.iter.span(), e))?;
        for item in iter {
          self.assign(env, f.vars, item)?;
          match self.exec_stmts(env, f.body)? {
            Flow::Normal | Flow::Continue => {}
            Flow::Break => break,
            flow @ Flow::Return(_) => return Ok(flow),
          }
        }
      }

      syn::Stmt::Return(r) => {
        let value = match r.value {
          Some(e) => self.eval(env, e)?,
          None => Value::None,
        };
        return Ok(Flow::Return(value));
      }

      syn::Stmt::Branch(b) => {
        return Ok(match b.kind {
          syn::BranchKind::Break => Flow::Break,
          syn::BranchKind::Continue => Flow::Continue,
          syn::BranchKind::Pass => Flow::Normal,
        })
      }

      syn::Stmt::Load(l) => self.exec_load(env, l)?,
    }
    Ok(Flow::Normal)
  }

  /// Executes `lhs op= rhs`, evaluating the operands of `lhs` only once.
  fn exec_aug_assign(
    &mut self,
    env: &mut Env<'i>,
    a: &'i syn::Assign<'i>,
    op: BinOp,
  ) -> Result<'i, ()> {
    match a.lhs {
      syn::Expr::Ident(id) => {
        let old = self.lookup(env, id)?;
        let new = self.aug_binary(env, a, op, old)?;
        self.assign_ident(env, id, new);
      }
      syn::Expr::Index(ix) => {
        let x = self.eval(env, ix.x)?;
        let index = self.eval(env, ix.index)?;
        let old =
          ops::index(&x, &index).map_err(|e| self.value_error(ix.span, e))?;
        let new = self.aug_binary(env, a, op, old)?;
        ops::set_index(&x, &index, new)
          .map_err(|e| self.value_error(ix.span, e))?;
      }
      syn::Expr::Dot(dot) => {
        let x = self.eval(env, dot.x)?;
        let old = self.getattr(&x, &dot.name)?;
        let new = self.aug_binary(env, a, op, old)?;
        self.setattr(&x, &dot.name, new)?;
      }
      lhs => error!(self, lhs, "invalid target for augmented assignment"),
    }
    Ok(())
  }

  /// Computes `old op rhs` for an augmented assignment. `list += iterable`
  /// extends the list in place.
  fn aug_binary(
    &mut self,
    env: &mut Env<'i>,
    a: &'i syn::Assign<'i>,
    op: BinOp,
    old: Value<'i>,
  ) -> Result<'i, Value<'i>> {
    let rhs = self.eval(env, a.rhs)?;
    if let (BinOp::Add, Value::List(list)) = (op, &old) {
      if let Ok(iter) = Iter::new(&rhs) {
        let items = iter.collect::<Vec<_>>();
        list.extend(items).map_err(|e| self.value_error(a.span, e))?;
        return Ok(old);
      }
    }
    ops::binary(op, &old, &rhs).map_err(|e| self.value_error(a.span, e))
  }

  /// Assigns `value` to an assignment target.
  pub(super) fn assign(
    &mut self,
    env: &mut Env<'i>,
    lhs: &'i syn::Expr<'i>,
    value: Value<'i>,
  ) -> Result<'i, ()> {
    match lhs {
      syn::Expr::Ident(id) => self.assign_ident(env, id, value),

      syn::Expr::Tuple(seq) | syn::Expr::List(seq) => {
        let items = match Iter::new(&value) {
          Ok(iter) => iter.collect::<Vec<_>>(),
          Err(_) => error!(
            self,
            lhs,
            "got {} in sequence assignment",
            value.type_name()
          ),
        };
        let want = seq.elems.len();
        if items.len() != want {
          let which = if items.len() > want { "many" } else { "few" };
          error!(
            self,
            lhs,
            "too {} values to unpack (got {}, want {})",
            which,
            items.len(),
            want
          )
        }
        for (target, item) in seq.elems.iter().zip(items) {
          self.assign(env, target, item)?;
        }
      }

      syn::Expr::Index(ix) => {
        let x = self.eval(env, ix.x)?;
        let index = self.eval(env, ix.index)?;
        ops::set_index(&x, &index, value)
          .map_err(|e| self.value_error(ix.span, e))?;
      }

      syn::Expr::Dot(dot) => {
        let x = self.eval(env, dot.x)?;
        self.setattr(&x, &dot.name, value)?;
      }

      lhs => error!(self, lhs, "cannot assign to this expression"),
    }
    Ok(())
  }

  /// Binds an identifier that the resolver placed in a local or global
  /// slot.
  pub(super) fn assign_ident(
    &mut self,
    env: &mut Env<'i>,
    id: &syn::Ident<'i>,
    value: Value<'i>,
  ) {
    match env.program().binding(id) {
      Binding::Local(slot) => env.locals[slot as usize] = Some(value),
      Binding::Global(slot) => env.module.set_global(slot, value),
      b => bug!("assignment to {} bound as {:?}", id.name, b),
    }
  }

  /// Sets `x.name = value`.
  fn setattr(
    &mut self,
    x: &Value<'i>,
    name: &syn::Name<'i>,
    value: Value<'i>,
  ) -> Result<'i, ()> {
    match x {
      Value::Extension(e) => e
        .set_field(name.name, value)
        .map_err(|e| self.value_error(name.span, e)),
      _ => error!(
        self,
        name,
        "cannot set .{} field of {} value",
        name.name,
        x.type_name()
      ),
    }
  }

  /// Executes a `load` statement through the thread's load hook.
  fn exec_load(
    &mut self,
    env: &mut Env<'i>,
    l: &'i syn::Load<'i>,
  ) -> Result<'i, ()> {
    self.set_pos(l.span);
    let result = match &self.load {
      Some(load) => load(self, l.module),
      None => error!(self, l, "load not implemented by this application"),
    };
    let module = match result {
      Ok(module) => module,
      Err(e) => error!(self, l, "cannot load {}: {}", l.module, e.message),
    };

    for b in l.bindings {
      match module.get(b.name) {
        Some(v) => self.assign_ident(env, &b.local, v.clone()),
        None => error!(
          self,
          b,
          "load: name {} not found in module {}",
          b.name,
          l.module
        ),
      }
    }
    Ok(())
  }
}
