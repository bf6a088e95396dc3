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

//! Iteration over Kestrel values.

use crate::eval::error::ValueError;
use crate::eval::value::Dict;
use crate::eval::value::List;
use crate::eval::value::Range;
use crate::eval::value::Set;
use crate::eval::value::Tuple;
use crate::eval::value::Value;

/// An iterator over the elements of an iterable value.
///
/// While an `Iter` over an unfrozen container is alive, the container
/// rejects insertions and removals. The registration is released when the
/// `Iter` is dropped, however iteration ends.
pub struct Iter<'i> {
  kind: Kind<'i>,
  index: usize,
}

enum Kind<'i> {
  List(List<'i>, bool),
  Tuple(Tuple<'i>),
  Dict(Dict<'i>, bool),
  Set(Set<'i>, bool),
  Range(Range),
  Ext(Box<dyn Iterator<Item = Value<'i>> + 'i>),
}

impl<'i> Iter<'i> {
  /// Starts iterating over `value`.
  pub fn new(value: &Value<'i>) -> Result<Self, ValueError> {
    let kind = match value {
      Value::List(l) => Kind::List(l.clone(), l.shared().start_iteration()),
      Value::Tuple(t) => Kind::Tuple(t.clone()),
      Value::Dict(d) => Kind::Dict(d.clone(), d.shared().start_iteration()),
      Value::Set(s) => Kind::Set(s.clone(), s.shared().start_iteration()),
      Value::Range(r) => Kind::Range(*r),
      Value::Extension(e) => match e.iterate() {
        Some(it) => Kind::Ext(it),
        None => return Err(not_iterable(value)),
      },
      _ => return Err(not_iterable(value)),
    };
    Ok(Iter { kind, index: 0 })
  }
}

fn not_iterable(value: &Value) -> ValueError {
  ValueError::new(format!("{} value is not iterable", value.type_name()))
}

impl<'i> Iterator for Iter<'i> {
  type Item = Value<'i>;

  fn next(&mut self) -> Option<Value<'i>> {
    let i = self.index;
    let next = match &mut self.kind {
      Kind::List(l, _) => l.get(i),
      Kind::Tuple(t) => t.get(i).cloned(),
      Kind::Dict(d, _) => d.read().get_index(i).map(|(k, _)| k.value().clone()),
      Kind::Set(s, _) => s.read().get_index(i).map(|k| k.value().clone()),
      Kind::Range(r) if i < r.len() => Some(Value::Int(r.get(i))),
      Kind::Range(_) => None,
      Kind::Ext(it) => it.next(),
    };
    self.index += 1;
    next
  }
}

impl Drop for Iter<'_> {
  fn drop(&mut self) {
    match &self.kind {
      Kind::List(l, true) => l.shared().end_iteration(),
      Kind::Dict(d, true) => d.shared().end_iteration(),
      Kind::Set(s, true) => s.shared().end_iteration(),
      _ => {}
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn iteration_locks_list_shape() {
    let l = List::new(vec![Value::from(1), Value::from(2)]);
    let v = Value::List(l.clone());
    {
      let mut it = Iter::new(&v).unwrap();
      assert_eq!(it.next().unwrap().to_string(), "1");
      assert_eq!(
        l.push(Value::None).unwrap_err().to_string(),
        "cannot append to list during iteration"
      );
      l.set(1, Value::from(5)).unwrap();
      assert_eq!(it.next().unwrap().to_string(), "5");
      assert!(it.next().is_none());
    }
    l.push(Value::None).unwrap();
    assert_eq!(l.len(), 3);
  }

  #[test]
  fn strings_are_not_iterable() {
    let err = Iter::new(&Value::from("abc")).err().unwrap();
    assert_eq!(err.to_string(), "string value is not iterable");
  }
}
