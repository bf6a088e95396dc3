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

//! Kestrel functions: interpreted `Function`s and host-provided `Builtin`s.

use std::fmt;
use std::sync::Arc;

use crate::eval::error::CallError;
use crate::eval::error::ValueError;
use crate::eval::value::Str;
use crate::eval::value::Tuple;
use crate::eval::value::Value;
use crate::eval::Module;
use crate::eval::Thread;
use crate::syn;

/// A `Function` is a Kestrel function: its syntax, the module whose globals
/// it sees, its parameter defaults, and the values of its free variables
/// captured when it was created.
#[derive(Clone)]
pub struct Function<'i>(Arc<FunctionInner<'i>>);

struct FunctionInner<'i> {
  func: &'i syn::Func<'i>,
  module: Arc<Module<'i>>,
  defaults: Tuple<'i>,
  freevars: Vec<Option<Value<'i>>>,
}

impl<'i> Function<'i> {
  pub(crate) fn new(
    func: &'i syn::Func<'i>,
    module: Arc<Module<'i>>,
    defaults: Tuple<'i>,
    freevars: Vec<Option<Value<'i>>>,
  ) -> Self {
    Function(Arc::new(FunctionInner {
      func,
      module,
      defaults,
      freevars,
    }))
  }

  pub fn name(&self) -> &'i str {
    self.0.func.name
  }

  /// Returns the syntax of this function, which identifies its body.
  pub fn func(&self) -> &'i syn::Func<'i> {
    self.0.func
  }

  /// Returns the resolver's summary of this function.
  pub fn info(&self) -> &'i syn::FunctionInfo<'i> {
    self.0.module.program().function(self.0.func)
  }

  pub(crate) fn module(&self) -> &Arc<Module<'i>> {
    &self.0.module
  }

  /// The values of the defaulted parameters, in order.
  pub fn defaults(&self) -> &Tuple<'i> {
    &self.0.defaults
  }

  pub(crate) fn freevars(&self) -> &[Option<Value<'i>>] {
    &self.0.freevars
  }

  /// Returns the names of the ordinary parameters.
  pub fn param_names(&self) -> impl Iterator<Item = &'i str> + 'i {
    self.0.func.params.iter().map(|p| p.name.name)
  }

  pub fn ptr_eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  pub fn hash32(&self) -> u32 {
    let addr = Arc::as_ptr(&self.0) as usize as u64;
    (addr ^ (addr >> 32)) as u32
  }

  pub fn freeze(&self) {
    for v in self.0.defaults.iter() {
      v.freeze();
    }
    for v in self.0.freevars.iter().flatten() {
      v.freeze();
    }
  }
}

impl fmt::Debug for Function<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<function {}>", self.name())
  }
}

/// The signature of a host-provided function. The second argument is the
/// receiver of a bound method.
pub type BuiltinFn = for<'i> fn(
  &mut Thread<'i>,
  Option<&Value<'i>>,
  Args<'i>,
) -> Result<Value<'i>, CallError<'i>>;

/// A host-provided function, optionally bound to a receiver.
#[derive(Clone)]
pub struct Builtin<'i> {
  name: &'static str,
  fnc: BuiltinFn,
  recv: Option<Arc<Value<'i>>>,
}

impl<'i> Builtin<'i> {
  pub fn new(name: &'static str, fnc: BuiltinFn) -> Self {
    Builtin {
      name,
      fnc,
      recv: None,
    }
  }

  /// Binds this builtin to a receiver, making it a method.
  pub fn bind(self, recv: Value<'i>) -> Self {
    Builtin {
      recv: Some(Arc::new(recv)),
      ..self
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn receiver(&self) -> Option<&Value<'i>> {
    self.recv.as_deref()
  }

  pub fn fnc(&self) -> BuiltinFn {
    self.fnc
  }

  pub fn hash32(&self) -> u32 {
    let h = super::seq::hash_bytes(self.name.as_bytes());
    if self.recv.is_some() {
      h ^ 5521
    } else {
      h
    }
  }

  pub fn freeze(&self) {
    if let Some(recv) = &self.recv {
      recv.freeze();
    }
  }
}

impl fmt::Debug for Builtin<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match &self.recv {
      Some(recv) => write!(
        f,
        "<built-in method {} of {} value>",
        self.name,
        recv.type_name()
      ),
      None => write!(f, "<built-in function {}>", self.name),
    }
  }
}

/// The actual arguments of a call: positional values, and `name=value`
/// pairs in call order.
#[derive(Clone, Debug, Default)]
pub struct Args<'i> {
  pub positional: Vec<Value<'i>>,
  pub named: Vec<(Str<'i>, Value<'i>)>,
}

impl<'i> Args<'i> {
  /// Creates an argument list with only positional arguments.
  pub fn positional(values: Vec<Value<'i>>) -> Self {
    Args {
      positional: values,
      named: Vec::new(),
    }
  }

  /// Fails if any named arguments were passed.
  pub fn no_named(&self) -> Result<(), ValueError> {
    if self.named.is_empty() {
      Ok(())
    } else {
      Err(ValueError::new("unexpected keyword arguments"))
    }
  }

  /// Matches the arguments against a parameter list, returning the value of
  /// each parameter in order.
  ///
  /// A parameter name ending in `?` is optional, as are all parameters after
  /// it; missing optional parameters are `None`. Arguments may be passed
  /// positionally or by name.
  pub fn unpack<const N: usize>(
    self,
    params: [&str; N],
  ) -> Result<[Option<Value<'i>>; N], ValueError> {
    let name = |i: usize| params[i].trim_end_matches('?');
    if self.positional.len() > N {
      return Err(ValueError::new(format!(
        "got {} arguments, want at most {}",
        self.positional.len(),
        N
      )));
    }

    let mut values: [Option<Value<'i>>; N] = std::array::from_fn(|_| None);
    for (slot, v) in values.iter_mut().zip(self.positional) {
      *slot = Some(v);
    }

    for (key, v) in self.named {
      let key = key.to_str_lossy();
      let i = match (0..N).find(|&i| name(i) == key) {
        Some(i) => i,
        None => {
          return Err(ValueError::new(format!(
            "unexpected keyword argument {}",
            key
          )))
        }
      };
      if values[i].is_some() {
        return Err(ValueError::new(format!(
          "got multiple values for keyword argument {}",
          key
        )));
      }
      values[i] = Some(v);
    }

    let required = params
      .iter()
      .position(|p| p.ends_with('?'))
      .unwrap_or(N);
    if let Some(i) = (0..required).find(|&i| values[i].is_none()) {
      return Err(ValueError::new(format!("missing argument for {}", name(i))));
    }
    Ok(values)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn args(pos: Vec<i32>, named: Vec<(&'static str, i32)>) -> Args<'static> {
    Args {
      positional: pos.into_iter().map(Value::from).collect(),
      named: named
        .into_iter()
        .map(|(k, v)| (Str::from_static(k), Value::from(v)))
        .collect(),
    }
  }

  fn unpack_err(a: Args<'static>) -> String {
    a.unpack(["x", "y?", "z"]).unwrap_err().to_string()
  }

  #[test]
  fn unpacks_positional_and_named() {
    let [x, y, z] = args(vec![1], vec![("z", 3)])
      .unpack(["x", "y?", "z"])
      .unwrap();
    assert_eq!(x.unwrap().to_string(), "1");
    assert!(y.is_none());
    assert_eq!(z.unwrap().to_string(), "3");
  }

  #[test]
  fn unpack_errors() {
    assert_eq!(unpack_err(args(vec![], vec![])), "missing argument for x");
    assert_eq!(
      unpack_err(args(vec![1, 2, 3, 4], vec![])),
      "got 4 arguments, want at most 3"
    );
    assert_eq!(
      unpack_err(args(vec![1], vec![("w", 2)])),
      "unexpected keyword argument w"
    );
    assert_eq!(
      unpack_err(args(vec![1], vec![("x", 2)])),
      "got multiple values for keyword argument x"
    );
  }
}
