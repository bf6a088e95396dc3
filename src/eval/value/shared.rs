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

//! Storage shared by mutable containers.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use crate::eval::error::ValueError;

/// The contents of a mutable container, together with its frozen flag and
/// the number of live iterators over it.
///
/// Frozen contents are never written again, so concurrent readers on other
/// threads only ever contend on the read side of the lock.
#[derive(Debug, Default)]
pub struct Shared<T> {
  data: RwLock<T>,
  frozen: AtomicBool,
  iterators: AtomicUsize,
}

impl<T> Shared<T> {
  pub fn new(data: T) -> Self {
    Shared {
      data: RwLock::new(data),
      frozen: AtomicBool::new(false),
      iterators: AtomicUsize::new(0),
    }
  }

  /// Locks the contents for reading.
  pub fn read(&self) -> RwLockReadGuard<T> {
    self.data.read().unwrap()
  }

  /// Locks the contents for a mutation that may change their shape, such as
  /// an insertion or removal.
  ///
  /// Fails if the container is frozen or is being iterated.
  pub fn write(
    &self,
    verb: &str,
    ty: &str,
  ) -> Result<RwLockWriteGuard<T>, ValueError> {
    self.check_mutable(verb, ty)?;
    if self.iterators.load(Ordering::Acquire) > 0 {
      return Err(ValueError::new(format!(
        "cannot {} {} during iteration",
        verb, ty
      )));
    }
    Ok(self.data.write().unwrap())
  }

  /// Locks the contents for a mutation that leaves their shape alone, such as
  /// replacing an element in place. This is permitted during iteration.
  pub fn update(
    &self,
    verb: &str,
    ty: &str,
  ) -> Result<RwLockWriteGuard<T>, ValueError> {
    self.check_mutable(verb, ty)?;
    Ok(self.data.write().unwrap())
  }

  fn check_mutable(&self, verb: &str, ty: &str) -> Result<(), ValueError> {
    if self.is_frozen() {
      return Err(ValueError::new(format!("cannot {} frozen {}", verb, ty)));
    }
    Ok(())
  }

  pub fn is_frozen(&self) -> bool {
    self.frozen.load(Ordering::Acquire)
  }

  /// Marks the contents as frozen. Returns `true` if this call froze them,
  /// and `false` if they were already frozen.
  pub fn mark_frozen(&self) -> bool {
    !self.frozen.swap(true, Ordering::AcqRel)
  }

  /// Registers a new iterator. Returns whether it was counted; iterators
  /// over frozen contents are not, since they can never be invalidated.
  pub fn start_iteration(&self) -> bool {
    if self.is_frozen() {
      return false;
    }
    self.iterators.fetch_add(1, Ordering::AcqRel);
    true
  }

  pub fn end_iteration(&self) {
    self.iterators.fetch_sub(1, Ordering::AcqRel);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn frozen_rejects_writes() {
    let s = Shared::new(vec![1, 2]);
    s.write("append to", "list").unwrap().push(3);
    assert!(s.mark_frozen());
    assert!(!s.mark_frozen());
    assert_eq!(
      s.write("append to", "list").unwrap_err().to_string(),
      "cannot append to frozen list"
    );
    assert_eq!(*s.read(), vec![1, 2, 3]);
  }

  #[test]
  fn iteration_blocks_structural_writes() {
    let s = Shared::new(vec![1, 2]);
    assert!(s.start_iteration());
    assert_eq!(
      s.write("clear", "list").unwrap_err().to_string(),
      "cannot clear list during iteration"
    );
    s.update("assign to element of", "list").unwrap()[0] = 5;
    s.end_iteration();
    s.write("clear", "list").unwrap().clear();
    assert!(s.read().is_empty());
  }
}
