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

//! Immutable sequence values: strings, bytes and tuples.

use std::borrow::Borrow;
use std::borrow::Cow;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::ops::Deref;
use std::ops::Range;
use std::sync::Arc;

use crate::eval::value::Value;

/// A Kestrel string (or bytes) value: an immutable, reference-counted slice
/// of bytes. Strings are usually, but not necessarily, valid UTF-8.
pub type Str<'i> = ArcSlice<'i, u8>;

/// A Kestrel tuple: an immutable, reference-counted slice of values.
pub type Tuple<'i> = ArcSlice<'i, Value<'i>>;

/// An `ArcSlice` is a slice of a reference-counted block of data.
///
/// `ArcSlice`es contain an `Arc` pointing to the complete block of data, and
/// a range of that data. This means that slicing an `ArcSlice` is as cheap as
/// an atomic increment.
///
/// An `ArcSlice` can also point to static data, bounded by the lifetime `'i`;
/// string literals are represented this way, pointing into the syntax tree.
pub struct ArcSlice<'i, T> {
  inner: Inner<'i, T>,
  start: usize,
  end: usize,
}

enum Inner<'i, T> {
  Empty,
  Static(&'i [T]),
  Dynamic(Arc<[T]>),
}

impl<'i, T> Inner<'i, T> {
  fn as_ref(&self) -> &[T] {
    match self {
      Inner::Empty => &[],
      Inner::Static(s) => s,
      Inner::Dynamic(s) => s,
    }
  }
}

impl<'i, T> ArcSlice<'i, T> {
  /// Creates a new `ArcSlice` pointing to all of `values`.
  pub fn new(values: impl Into<Arc<[T]>>) -> Self {
    let values = values.into();
    let len = values.len();
    if len == 0 {
      return Self::empty();
    }
    Self {
      inner: Inner::Dynamic(values),
      start: 0,
      end: len,
    }
  }

  /// Creates an empty `ArcSlice`.
  pub fn empty() -> Self {
    Self {
      inner: Inner::Empty,
      start: 0,
      end: 0,
    }
  }

  /// Creates an `ArcSlice` that points to a static, rather than ref-counted,
  /// value.
  pub fn new_static(ptr: &'i [T]) -> Self {
    if ptr.is_empty() {
      return Self::empty();
    }
    Self {
      inner: Inner::Static(ptr),
      start: 0,
      end: ptr.len(),
    }
  }

  /// Returns the subrange of the underlying data this `ArcSlice` points to.
  pub fn as_sliced(&self) -> &[T] {
    &self.inner.as_ref()[self.start..self.end]
  }

  /// Reslices the underlying data, returning a copy of `self` with the indices
  /// further constrained. Indexing is relative to `self`.
  ///
  /// Returns `None` if the range is out of bounds.
  pub fn slice(&self, range: Range<usize>) -> Option<Self> {
    if range.start > range.end || range.end > self.len() {
      return None;
    }
    if range.start == range.end {
      return Some(Self::empty());
    }

    Some(ArcSlice {
      start: self.start + range.start,
      end: self.start + range.end,
      ..self.clone()
    })
  }

  /// Returns the length of the subrange that this `ArcSlice` points to.
  pub fn len(&self) -> usize {
    self.end - self.start
  }

  /// Returns whether this `ArcSlice` is empty.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Compares `self` and `other` for pointer equality, i.e., they point to the
  /// same subrange of the same block of data.
  pub fn ptr_eq(&self, other: &Self) -> bool {
    self.start == other.start
      && self.end == other.end
      && self.inner.as_ref().as_ptr() == other.inner.as_ref().as_ptr()
  }
}

impl<'i> Str<'i> {
  /// Creates a new string from Rust text.
  pub fn from_string(s: impl Into<String>) -> Self {
    Self::new(s.into().into_bytes())
  }

  /// Creates a string pointing at static text.
  pub fn from_static(s: &'i str) -> Self {
    Self::new_static(s.as_bytes())
  }

  /// Returns this string as text, replacing invalid UTF-8 with U+FFFD.
  pub fn to_str_lossy(&self) -> Cow<str> {
    String::from_utf8_lossy(self.as_sliced())
  }
}

impl<T> Deref for ArcSlice<'_, T> {
  type Target = [T];

  fn deref(&self) -> &Self::Target {
    self.as_sliced()
  }
}

impl<T> Borrow<[T]> for ArcSlice<'_, T> {
  fn borrow(&self) -> &[T] {
    self.as_sliced()
  }
}

impl<T> From<Vec<T>> for ArcSlice<'_, T> {
  fn from(values: Vec<T>) -> Self {
    Self::new(values)
  }
}

impl<T: Hash> Hash for ArcSlice<'_, T> {
  #[inline]
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.as_sliced().hash(state)
  }
}

impl PartialEq for Str<'_> {
  #[inline]
  fn eq(&self, other: &Self) -> bool {
    self.as_sliced() == other.as_sliced()
  }
}

impl Eq for Str<'_> {}

impl<T> Clone for ArcSlice<'_, T> {
  fn clone(&self) -> Self {
    ArcSlice {
      inner: match &self.inner {
        Inner::Empty => Inner::Empty,
        Inner::Static(p) => Inner::Static(p),
        Inner::Dynamic(arc) => Inner::Dynamic(arc.clone()),
      },
      start: self.start,
      end: self.end,
    }
  }
}

impl<T: fmt::Debug> fmt::Debug for ArcSlice<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_list().entries(self.iter()).finish()
  }
}

/// Hashes a byte string the way Kestrel does: FNV-1a over the bytes.
pub fn hash_bytes(s: &[u8]) -> u32 {
  s.iter().fold(2166136261u32, |h, &b| (h ^ b as u32).wrapping_mul(16777619))
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn slicing_is_relative() {
    let xs = Str::new(b"hello world".to_vec());
    let world = xs.slice(6..11).unwrap();
    assert_eq!(&*world, b"world");
    assert_eq!(&*world.slice(1..3).unwrap(), b"or");
    assert!(world.slice(3..6).is_none());
    assert!(world.slice(2..2).unwrap().is_empty());
  }

  #[test]
  fn pointer_equality() {
    let xs = Str::from_string("abc");
    let ys = xs.clone();
    let zs = Str::from_string("abc");
    assert!(xs.ptr_eq(&ys));
    assert!(!xs.ptr_eq(&zs));
    assert_eq!(xs, zs);
  }

  #[test]
  fn static_strings() {
    let s = Str::from_static("kestrel");
    assert_eq!(s.to_str_lossy(), "kestrel");
    assert!(Str::from_static("").is_empty());
    assert_eq!(hash_bytes(b"a"), hash_bytes(&*Str::from_string("a")));
  }
}
