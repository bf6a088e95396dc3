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

//! Host-defined value types.

use std::fmt;

use crate::eval::error::CallError;
use crate::eval::error::ValueError;
use crate::eval::value::Args;
use crate::eval::value::Value;
use crate::eval::Thread;
use crate::syn::BinOp;
use crate::syn::UnOp;

/// Which operand of a binary operator an `Extension` is.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Side {
  Left,
  Right,
}

/// A host-defined value type.
///
/// Types implementing this trait can be wrapped in `Value::Extension`,
/// allowing the host to expose its own objects to Kestrel programs. Every
/// capability is optional; the defaults describe an opaque, immutable,
/// unhashable value.
///
/// Extensions are shared between threads once frozen, so they must be
/// `Send + Sync`. An extension with interior mutability must reject
/// mutation after `freeze()`.
#[allow(unused, clippy::len_without_is_empty)]
pub trait Extension<'i>: Send + Sync + fmt::Debug {
  /// The name reported by `type()`.
  fn type_name(&self) -> &'static str;

  /// Writes the `str()` form of this value.
  fn display(&self, buf: &mut String) {
    buf.push('<');
    buf.push_str(self.type_name());
    buf.push('>');
  }

  fn truth(&self) -> bool {
    true
  }

  /// Makes this value, and everything reachable from it, immutable.
  fn freeze(&self) {}

  fn hash(&self) -> Result<u32, ValueError> {
    Err(ValueError::new(format!(
      "unhashable type: {}",
      self.type_name()
    )))
  }

  /// Looks up the attribute `name`; `Ok(None)` means there is none.
  fn attr(&self, name: &str) -> Result<Option<Value<'i>>, ValueError> {
    Ok(None)
  }

  /// The attribute names reported by `dir()`.
  fn attr_names(&self) -> Vec<String> {
    Vec::new()
  }

  /// Assigns `x.name = value`.
  fn set_field(&self, name: &str, value: Value<'i>) -> Result<(), ValueError> {
    Err(ValueError::new(format!(
      "{} has no .{} field",
      self.type_name(),
      name
    )))
  }

  /// Applies a binary operator with `other` on the given side. `Ok(None)`
  /// means the operator is not supported for these operands.
  fn binary(
    &self,
    op: BinOp,
    other: &Value<'i>,
    side: Side,
  ) -> Result<Option<Value<'i>>, ValueError> {
    Ok(None)
  }

  /// Applies a unary operator. `Ok(None)` means it is not supported.
  fn unary(&self, op: UnOp) -> Result<Option<Value<'i>>, ValueError> {
    Ok(None)
  }

  /// Calls this value. `None` means it is not callable.
  fn call(
    &self,
    thread: &mut Thread<'i>,
    args: Args<'i>,
  ) -> Option<Result<Value<'i>, CallError<'i>>> {
    None
  }

  /// Starts an iteration. `None` means this value is not iterable.
  fn iterate(&self) -> Option<Box<dyn Iterator<Item = Value<'i>> + 'i>> {
    None
  }

  /// The length, for `len()` and indexing. `None` means there is none.
  fn len(&self) -> Option<usize> {
    None
  }

  /// Returns the element at `index`, which is below `len()`.
  fn index(&self, index: usize) -> Option<Value<'i>> {
    None
  }

  /// Looks up `key` for `x[key]` when this value is not indexable by
  /// position. `Ok(None)` means the key is absent.
  fn get(&self, key: &Value<'i>) -> Result<Option<Value<'i>>, ValueError> {
    Err(ValueError::new(format!(
      "unhandled index operation {}[{}]",
      self.type_name(),
      key.type_name()
    )))
  }

  /// Compares with another value for equality. `None` falls back to
  /// identity.
  fn equals(&self, other: &Value<'i>) -> Option<bool> {
    None
  }
}
