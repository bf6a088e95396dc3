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

//! Kestrel lists.

use std::fmt;
use std::sync::Arc;
use std::sync::RwLockReadGuard;

use crate::eval::error::ValueError;
use crate::eval::value::shared::Shared;
use crate::eval::value::Value;

/// A mutable, reference-counted list of values.
///
/// Cloning a `List` produces an alias, not a copy.
#[derive(Clone, Default)]
pub struct List<'i>(Arc<Shared<Vec<Value<'i>>>>);

impl<'i> List<'i> {
  pub fn new(values: Vec<Value<'i>>) -> Self {
    List(Arc::new(Shared::new(values)))
  }

  /// Locks this list for reading.
  ///
  /// The guard must not be held across evaluation of user code.
  pub fn read(&self) -> RwLockReadGuard<Vec<Value<'i>>> {
    self.0.read()
  }

  /// Copies out the current elements.
  pub fn snapshot(&self) -> Vec<Value<'i>> {
    self.read().clone()
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn get(&self, index: usize) -> Option<Value<'i>> {
    self.read().get(index).cloned()
  }

  /// Replaces the element at `index`, which must be in bounds.
  pub fn set(&self, index: usize, value: Value<'i>) -> Result<(), ValueError> {
    let mut data = self.0.update("assign to element of", "list")?;
    if let Some(slot) = data.get_mut(index) {
      *slot = value;
    }
    Ok(())
  }

  pub fn push(&self, value: Value<'i>) -> Result<(), ValueError> {
    self.0.write("append to", "list")?.push(value);
    Ok(())
  }

  pub fn extend(&self, values: Vec<Value<'i>>) -> Result<(), ValueError> {
    self.0.write("extend", "list")?.extend(values);
    Ok(())
  }

  /// Inserts `value` before `index`, which is clamped to the list's bounds.
  pub fn insert(
    &self,
    index: usize,
    value: Value<'i>,
  ) -> Result<(), ValueError> {
    let mut data = self.0.write("insert into", "list")?;
    let index = index.min(data.len());
    data.insert(index, value);
    Ok(())
  }

  /// Removes the element at `index`, which must be in bounds.
  pub fn remove(&self, index: usize) -> Result<Value<'i>, ValueError> {
    let mut data = self.0.write("pop from", "list")?;
    if index >= data.len() {
      return Err(ValueError::new(format!(
        "index {} out of range [0:{}]",
        index,
        data.len()
      )));
    }
    Ok(data.remove(index))
  }

  pub fn clear(&self) -> Result<(), ValueError> {
    self.0.write("clear", "list")?.clear();
    Ok(())
  }

  /// Freezes this list and everything reachable from it.
  pub fn freeze(&self) {
    if self.0.mark_frozen() {
      for v in self.snapshot() {
        v.freeze();
      }
    }
  }

  pub fn is_frozen(&self) -> bool {
    self.0.is_frozen()
  }

  /// Returns whether `self` and `other` are the same list.
  pub fn ptr_eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  /// Returns the address of this list, for cycle detection.
  pub fn addr(&self) -> usize {
    Arc::as_ptr(&self.0) as *const () as usize
  }

  pub(crate) fn shared(&self) -> &Shared<Vec<Value<'i>>> {
    &self.0
  }
}

impl fmt::Debug for List<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "List({:#x})", self.addr())
  }
}

impl<'i> From<Vec<Value<'i>>> for List<'i> {
  fn from(values: Vec<Value<'i>>) -> Self {
    List::new(values)
  }
}
