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

//! Kestrel dicts and sets, and the hashed keys they store.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use std::sync::RwLockReadGuard;

use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::eval::error::ValueError;
use crate::eval::value::shared::Shared;
use crate::eval::value::Value;

/// A hashable value, paired with its precomputed Kestrel hash.
///
/// Equality is Kestrel equality, so `1` and `1.0` are the same key.
#[derive(Clone, Debug)]
pub struct Key<'i> {
  hash: u32,
  value: Value<'i>,
}

impl<'i> Key<'i> {
  /// Creates a key, failing if `value` is unhashable.
  pub fn new(value: Value<'i>) -> Result<Self, ValueError> {
    let hash = value.hash()?;
    Ok(Key { hash, value })
  }

  pub fn value(&self) -> &Value<'i> {
    &self.value
  }

  pub fn into_value(self) -> Value<'i> {
    self.value
  }
}

impl Hash for Key<'_> {
  fn hash<H: Hasher>(&self, state: &mut H) {
    state.write_u32(self.hash)
  }
}

impl PartialEq for Key<'_> {
  fn eq(&self, other: &Self) -> bool {
    self.hash == other.hash && self.value.equals(&other.value).unwrap_or(false)
  }
}

impl Eq for Key<'_> {}

/// A mutable, insertion-ordered mapping.
///
/// Cloning a `Dict` produces an alias, not a copy.
#[derive(Clone, Default)]
pub struct Dict<'i>(Arc<Shared<IndexMap<Key<'i>, Value<'i>>>>);

impl<'i> Dict<'i> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Locks this dict for reading.
  pub fn read(&self) -> RwLockReadGuard<IndexMap<Key<'i>, Value<'i>>> {
    self.0.read()
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Looks up `key`. Fails only if `key` is unhashable.
  pub fn get(&self, key: &Value<'i>) -> Result<Option<Value<'i>>, ValueError> {
    let key = Key::new(key.clone())?;
    Ok(self.read().get(&key).cloned())
  }

  /// Looks up a string key.
  pub fn get_str(&self, key: &str) -> Option<Value<'i>> {
    self.get(&Value::from(key.to_string())).ok().flatten()
  }

  pub fn contains(&self, key: &Value<'i>) -> Result<bool, ValueError> {
    Ok(self.get(key)?.is_some())
  }

  /// Inserts or replaces an entry. Replacing keeps the entry's position.
  pub fn insert(
    &self,
    key: Value<'i>,
    value: Value<'i>,
  ) -> Result<(), ValueError> {
    let key = Key::new(key)?;
    self.0.write("insert into", "dict")?.insert(key, value);
    Ok(())
  }

  /// Removes an entry, preserving the order of the others.
  pub fn remove(
    &self,
    key: &Value<'i>,
  ) -> Result<Option<Value<'i>>, ValueError> {
    let key = Key::new(key.clone())?;
    Ok(self.0.write("delete from", "dict")?.shift_remove(&key))
  }

  /// Removes and returns the first entry.
  pub fn pop_first(
    &self,
  ) -> Result<Option<(Value<'i>, Value<'i>)>, ValueError> {
    let mut data = self.0.write("delete from", "dict")?;
    Ok(data.shift_remove_index(0).map(|(k, v)| (k.into_value(), v)))
  }

  pub fn clear(&self) -> Result<(), ValueError> {
    self.0.write("clear", "dict")?.clear();
    Ok(())
  }

  pub fn keys(&self) -> Vec<Value<'i>> {
    self.read().keys().map(|k| k.value.clone()).collect()
  }

  pub fn values(&self) -> Vec<Value<'i>> {
    self.read().values().cloned().collect()
  }

  pub fn items(&self) -> Vec<(Value<'i>, Value<'i>)> {
    self
      .read()
      .iter()
      .map(|(k, v)| (k.value.clone(), v.clone()))
      .collect()
  }

  /// Freezes this dict and everything reachable from it.
  pub fn freeze(&self) {
    if self.0.mark_frozen() {
      for (k, v) in self.items() {
        k.freeze();
        v.freeze();
      }
    }
  }

  pub fn is_frozen(&self) -> bool {
    self.0.is_frozen()
  }

  pub fn ptr_eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  /// Returns the address of this dict, for cycle detection.
  pub fn addr(&self) -> usize {
    Arc::as_ptr(&self.0) as *const () as usize
  }

  pub(crate) fn shared(&self) -> &Shared<IndexMap<Key<'i>, Value<'i>>> {
    &self.0
  }
}

impl fmt::Debug for Dict<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "Dict({:#x})", self.addr())
  }
}

/// A mutable, insertion-ordered set.
///
/// Cloning a `Set` produces an alias, not a copy.
#[derive(Clone, Default)]
pub struct Set<'i>(Arc<Shared<IndexSet<Key<'i>>>>);

impl<'i> Set<'i> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a set from `values`, failing on the first unhashable one.
  pub fn from_values(
    values: impl IntoIterator<Item = Value<'i>>,
  ) -> Result<Self, ValueError> {
    let keys = values
      .into_iter()
      .map(Key::new)
      .collect::<Result<IndexSet<_>, _>>()?;
    Ok(Set(Arc::new(Shared::new(keys))))
  }

  pub fn read(&self) -> RwLockReadGuard<IndexSet<Key<'i>>> {
    self.0.read()
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn contains(&self, value: &Value<'i>) -> Result<bool, ValueError> {
    let key = Key::new(value.clone())?;
    Ok(self.read().contains(&key))
  }

  /// Adds `value`; returns whether it was absent.
  pub fn insert(&self, value: Value<'i>) -> Result<bool, ValueError> {
    let key = Key::new(value)?;
    Ok(self.0.write("insert into", "set")?.insert(key))
  }

  /// Removes `value`; returns whether it was present.
  pub fn remove(&self, value: &Value<'i>) -> Result<bool, ValueError> {
    let key = Key::new(value.clone())?;
    Ok(self.0.write("delete from", "set")?.shift_remove(&key))
  }

  /// Removes and returns the first element.
  pub fn pop_first(&self) -> Result<Option<Value<'i>>, ValueError> {
    let mut data = self.0.write("delete from", "set")?;
    Ok(data.shift_remove_index(0).map(Key::into_value))
  }

  pub fn clear(&self) -> Result<(), ValueError> {
    self.0.write("clear", "set")?.clear();
    Ok(())
  }

  pub fn elems(&self) -> Vec<Value<'i>> {
    self.read().iter().map(|k| k.value.clone()).collect()
  }

  /// Returns a new set with the elements of `self` followed by those of
  /// `other`.
  pub fn union(&self, other: &Set<'i>) -> Set<'i> {
    let mut keys = self.read().clone();
    keys.extend(other.read().iter().cloned());
    Set(Arc::new(Shared::new(keys)))
  }

  /// Returns a new set with the elements of `self` that are also in `other`.
  /// Probes the larger set while walking the smaller one, keeping the order
  /// of `self`.
  pub fn intersection(&self, other: &Set<'i>) -> Set<'i> {
    let (xs, ys) = (self.read(), other.read());
    let keys = if xs.len() <= ys.len() {
      xs.iter().filter(|k| ys.contains(*k)).cloned().collect()
    } else {
      let found = ys
        .iter()
        .filter(|k| xs.contains(*k))
        .cloned()
        .collect::<IndexSet<_>>();
      xs.iter().filter(|k| found.contains(*k)).cloned().collect()
    };
    Set(Arc::new(Shared::new(keys)))
  }

  /// Returns a new set with the elements of `self` not in `other`.
  pub fn difference(&self, other: &Set<'i>) -> Set<'i> {
    let ys = other.read();
    let keys = self
      .read()
      .iter()
      .filter(|k| !ys.contains(*k))
      .cloned()
      .collect();
    Set(Arc::new(Shared::new(keys)))
  }

  /// Returns a new set with the elements in exactly one of `self` and
  /// `other`.
  pub fn symmetric_difference(&self, other: &Set<'i>) -> Set<'i> {
    let (xs, ys) = (self.read(), other.read());
    let mut keys = xs
      .iter()
      .filter(|k| !ys.contains(*k))
      .cloned()
      .collect::<IndexSet<_>>();
    keys.extend(ys.iter().filter(|k| !xs.contains(*k)).cloned());
    Set(Arc::new(Shared::new(keys)))
  }

  /// Returns whether every element of `self` is in `other`.
  pub fn is_subset(&self, other: &Set<'i>) -> bool {
    let ys = other.read();
    self.read().iter().all(|k| ys.contains(k))
  }

  /// Freezes this set. Elements are hashable, and therefore already
  /// immutable, but they are frozen too so that extension values see it.
  pub fn freeze(&self) {
    if self.0.mark_frozen() {
      for v in self.elems() {
        v.freeze();
      }
    }
  }

  pub fn is_frozen(&self) -> bool {
    self.0.is_frozen()
  }

  pub fn ptr_eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  /// Returns the address of this set, for cycle detection.
  pub fn addr(&self) -> usize {
    Arc::as_ptr(&self.0) as *const () as usize
  }

  pub(crate) fn shared(&self) -> &Shared<IndexSet<Key<'i>>> {
    &self.0
  }
}

impl fmt::Debug for Set<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "Set({:#x})", self.addr())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn int(x: i32) -> Value<'static> {
    Value::from(x)
  }

  #[test]
  fn numeric_keys_collide() {
    let d = Dict::new();
    d.insert(int(1), Value::from("one")).unwrap();
    d.insert(Value::Float(1.0), Value::from("uno")).unwrap();
    assert_eq!(d.len(), 1);
    assert_eq!(d.get(&int(1)).unwrap().unwrap().to_string(), "uno");
  }

  #[test]
  fn reinsertion_moves_to_end() {
    let d = Dict::new();
    for i in 0..3 {
      d.insert(int(i), Value::None).unwrap();
    }
    d.remove(&int(0)).unwrap();
    d.insert(int(0), Value::None).unwrap();
    let keys = d.keys().iter().map(|k| k.to_string()).collect::<Vec<_>>();
    assert_eq!(keys, vec!["1", "2", "0"]);
  }

  #[test]
  fn unhashable_keys() {
    let d = Dict::new();
    let err = d.insert(Value::List(Default::default()), Value::None);
    assert_eq!(err.unwrap_err().to_string(), "unhashable type: list");
  }

  #[test]
  fn set_algebra() {
    let a = Set::from_values((1..=4).map(int)).unwrap();
    let b = Set::from_values([int(6), int(4), int(3)]).unwrap();
    let show = |s: Set| {
      s.elems().iter().map(|v| v.to_string()).collect::<Vec<_>>()
    };
    assert_eq!(show(a.intersection(&b)), vec!["3", "4"]);
    assert_eq!(show(b.intersection(&a)), vec!["4", "3"]);
    assert_eq!(show(a.union(&b)), vec!["1", "2", "3", "4", "6"]);
    assert_eq!(show(a.difference(&b)), vec!["1", "2"]);
    assert_eq!(show(a.symmetric_difference(&b)), vec!["1", "2", "6"]);
    assert!(!a.is_subset(&b));
  }
}
