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

//! Kestrel runtime values. These consist of fourteen types:
//! - `NoneType`, the singleton `None`.
//! - `bool`, a boolean.
//! - `int`, an arbitrary-precision integer.
//! - `float`, an IEEE double.
//! - `string` and `bytes`, immutable byte strings.
//! - `list`, `dict` and `set`, mutable containers that can be frozen.
//! - `tuple`, an immutable sequence.
//! - `function`, a function defined in Kestrel.
//! - `builtin_function_or_method`, a function provided by the host.
//! - `range`, a lazy arithmetic sequence.
//! - extension types, defined by the host through `Extension`.

use std::fmt;
use std::sync::Arc;

use crate::eval::encode;
use crate::eval::error::ValueError;

#[macro_use]
pub mod native_macros;

pub mod compare;
pub mod convert;
pub use convert::FromValue;
pub use convert::IntoValue;

mod dict;
pub use dict::Dict;
pub use dict::Key;
pub use dict::Set;

mod ext;
pub use ext::Extension;
pub use ext::Side;

mod fns;
pub use fns::Args;
pub use fns::Builtin;
pub use fns::BuiltinFn;
pub use fns::Function;

mod int;
pub use int::cmp_int_float;
pub use int::Int;

mod iter;
pub use iter::Iter;

mod list;
pub use list::List;

mod range;
pub use range::Range;

pub mod seq;
pub use seq::ArcSlice;
pub use seq::Str;
pub use seq::Tuple;

mod shared;

/// A `Value` is a Kestrel value. Frozen `Value`s can be safely shared across
/// threads, though execution of a Kestrel file is single-threaded.
#[derive(Clone, Debug)]
pub enum Value<'i> {
  None,
  Bool(bool),
  Int(Int),
  Float(f64),
  String(Str<'i>),
  Bytes(Str<'i>),
  List(List<'i>),
  Tuple(Tuple<'i>),
  Dict(Dict<'i>),
  Set(Set<'i>),
  Function(Function<'i>),
  Builtin(Builtin<'i>),
  Range(Range),
  Extension(Arc<dyn Extension<'i> + 'i>),
}

impl Default for Value<'_> {
  fn default() -> Self {
    Value::None
  }
}

impl<'i> Value<'i> {
  /// Returns the name of this value's type, as reported by `type()`.
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::None => "NoneType",
      Value::Bool(_) => "bool",
      Value::Int(_) => "int",
      Value::Float(_) => "float",
      Value::String(_) => "string",
      Value::Bytes(_) => "bytes",
      Value::List(_) => "list",
      Value::Tuple(_) => "tuple",
      Value::Dict(_) => "dict",
      Value::Set(_) => "set",
      Value::Function(_) => "function",
      Value::Builtin(_) => "builtin_function_or_method",
      Value::Range(_) => "range",
      Value::Extension(e) => e.type_name(),
    }
  }

  /// Returns the truth value of this value, as used by `if` and `bool()`.
  pub fn truth(&self) -> bool {
    match self {
      Value::None => false,
      Value::Bool(b) => *b,
      Value::Int(i) => !i.is_zero(),
      Value::Float(f) => *f != 0.0,
      Value::String(s) | Value::Bytes(s) => !s.is_empty(),
      Value::List(l) => !l.is_empty(),
      Value::Tuple(t) => !t.is_empty(),
      Value::Dict(d) => !d.is_empty(),
      Value::Set(s) => !s.is_empty(),
      Value::Function(_) | Value::Builtin(_) => true,
      Value::Range(r) => !r.is_empty(),
      Value::Extension(e) => e.truth(),
    }
  }

  /// Makes this value, and everything reachable from it, immutable.
  ///
  /// Freezing is idempotent, and terminates on cyclic structures.
  pub fn freeze(&self) {
    match self {
      Value::List(l) => l.freeze(),
      Value::Tuple(t) => t.iter().for_each(Value::freeze),
      Value::Dict(d) => d.freeze(),
      Value::Set(s) => s.freeze(),
      Value::Function(f) => f.freeze(),
      Value::Builtin(b) => b.freeze(),
      Value::Extension(e) => e.freeze(),
      _ => {}
    }
  }

  /// Returns this value's hash, consistent with `compare::equals`.
  ///
  /// Fails for mutable types.
  pub fn hash(&self) -> Result<u32, ValueError> {
    match self {
      Value::None => Ok(0),
      Value::Bool(b) => Ok(*b as u32 + 1),
      Value::Int(i) => Ok(i.hash32()),
      Value::Float(f) => Ok(float_hash(*f)),
      Value::String(s) => Ok(seq::hash_bytes(s)),
      Value::Bytes(s) => Ok(seq::hash_bytes(s) ^ 0x5bd1e995),
      Value::Tuple(t) => {
        let mut x = 8731u32;
        let mut m = 9474u32;
        for v in t.iter() {
          x ^= v.hash()?.wrapping_mul(m);
          m = m.wrapping_add(7349);
        }
        Ok(x)
      }
      Value::Function(f) => Ok(f.hash32()),
      Value::Builtin(b) => Ok(b.hash32()),
      Value::Extension(e) => e.hash(),
      Value::List(_) | Value::Dict(_) | Value::Set(_) | Value::Range(_) => Err(
        ValueError::new(format!("unhashable type: {}", self.type_name())),
      ),
    }
  }

  /// Compares two values with `==`.
  pub fn equals(&self, other: &Value<'i>) -> Result<bool, ValueError> {
    compare::equals(self, other)
  }

  /// Returns the `repr()` of this value.
  pub fn repr(&self) -> String {
    encode::repr(self)
  }

  /// Returns whether `self` and `other` are the same mutable object.
  pub fn is_same_object(&self, other: &Value<'i>) -> bool {
    match (self, other) {
      (Value::List(x), Value::List(y)) => x.ptr_eq(y),
      (Value::Dict(x), Value::Dict(y)) => x.ptr_eq(y),
      (Value::Set(x), Value::Set(y)) => x.ptr_eq(y),
      (Value::Extension(x), Value::Extension(y)) => {
        std::ptr::eq(
          Arc::as_ptr(x) as *const (),
          Arc::as_ptr(y) as *const (),
        )
      }
      _ => false,
    }
  }
}

/// Hashes a float. Integral floats hash like the equal `int`.
fn float_hash(f: f64) -> u32 {
  if f.fract() == 0.0 {
    if let Ok(i) = Int::from_f64(f) {
      return i.hash32();
    }
  }
  let bits = if f.is_nan() {
    f64::NAN.to_bits()
  } else {
    f.to_bits()
  };
  (bits ^ (bits >> 32)) as u32
}

/// Formats the `str()` of a value.
impl fmt::Display for Value<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(&encode::str(self))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn numeric_hashes_agree() {
    let hash = |v: Value| v.hash().unwrap();
    let big = Value::Int(Int::from_i64(1 << 40));
    assert_eq!(hash(big), hash(Value::Float((1u64 << 40) as f64)));
    assert_eq!(hash(Value::from(7)), hash(Value::Float(7.0)));
    assert_ne!(hash(Value::Float(7.5)), hash(Value::from(7)));
  }

  #[test]
  fn equal_tuples_hash_equal() {
    let a = Value::Tuple(vec![Value::from(1), Value::from("a")].into());
    let b = Value::Tuple(vec![Value::Float(1.0), Value::from("a")].into());
    assert!(a.equals(&b).unwrap());
    assert_eq!(a.hash().unwrap(), b.hash().unwrap());
  }

  #[test]
  fn unhashable() {
    for v in [
      Value::List(List::default()),
      Value::Dict(Dict::new()),
      Value::Set(Set::new()),
    ] {
      let err = v.hash().unwrap_err();
      let want = format!("unhashable type: {}", v.type_name());
      assert_eq!(err.to_string(), want);
    }
    let t = Value::Tuple(vec![Value::List(List::default())].into());
    assert_eq!(t.hash().unwrap_err().to_string(), "unhashable type: list");
  }

  #[test]
  fn freeze_is_deep_and_idempotent() {
    let inner = List::new(vec![Value::from(1)]);
    let d = Dict::new();
    d.insert(Value::from("k"), Value::List(inner.clone())).unwrap();
    let outer = Value::Tuple(vec![Value::Dict(d.clone())].into());
    outer.freeze();
    outer.freeze();
    assert!(d.is_frozen());
    assert_eq!(
      inner.push(Value::None).unwrap_err().to_string(),
      "cannot append to frozen list"
    );
  }

  #[test]
  fn freeze_terminates_on_cycles() {
    let l = List::new(vec![]);
    l.push(Value::List(l.clone())).unwrap();
    Value::List(l.clone()).freeze();
    assert!(l.is_frozen());
  }

  #[test]
  fn frozen_values_are_shared_across_threads() {
    let d = Dict::new();
    for i in 0..100 {
      d.insert(Value::from(i), Value::List(List::new(vec![Value::from(i)])))
        .unwrap();
    }
    let v = Value::Dict(d);
    v.freeze();
    crossbeam::scope(|s| {
      for _ in 0..4 {
        let v = &v;
        s.spawn(move |_| {
          let mut total = 0;
          for k in Iter::new(v).unwrap() {
            if let Value::Dict(d) = v {
              let item = d.get(&k).unwrap().unwrap();
              assert!(item.hash().is_err());
              total += 1;
            }
          }
          assert_eq!(total, 100);
          assert_eq!(v.repr().len(), v.to_string().len());
        });
      }
    })
    .unwrap();
  }
}
