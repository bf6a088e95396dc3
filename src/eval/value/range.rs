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

//! The lazily-computed values produced by `range()`.

use std::fmt;

use crate::eval::error::ValueError;
use crate::eval::value::Int;

/// An immutable arithmetic sequence `start, start + step, ...`, stopping
/// before `stop`.
#[derive(Copy, Clone, Debug)]
pub struct Range {
  start: i64,
  stop: i64,
  step: i64,
  len: usize,
}

impl Range {
  pub fn new(start: i64, stop: i64, step: i64) -> Result<Range, ValueError> {
    if step == 0 {
      return Err(ValueError::new("step argument must not be zero"));
    }
    let (start_, stop_, step_) = (start as i128, stop as i128, step as i128);
    let len = if step > 0 && start_ < stop_ {
      (stop_ - start_ - 1) / step_ + 1
    } else if step < 0 && start_ > stop_ {
      (start_ - stop_ - 1) / -step_ + 1
    } else {
      0
    };
    let len = usize::try_from(len)
      .map_err(|_| ValueError::new("range has too many elements"))?;
    Ok(Range {
      start,
      stop,
      step,
      len,
    })
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Returns the `i`th element; `i` must be below `len()`.
  pub fn get(&self, i: usize) -> Int {
    Int::from_i64((self.start as i128 + i as i128 * self.step as i128) as i64)
  }

  /// Returns whether `x` is one of this range's elements.
  pub fn contains(&self, x: &Int) -> bool {
    let x = match x.to_i64() {
      Some(x) => x as i128,
      None => return false,
    };
    let (start, stop, step) =
      (self.start as i128, self.stop as i128, self.step as i128);
    let in_bounds = if step > 0 {
      start <= x && x < stop
    } else {
      stop < x && x <= start
    };
    in_bounds && (x - start) % step == 0
  }

  /// Returns the subsequence selected by the given indices of this range, as
  /// computed by slice normalization.
  pub fn slice(&self, start: i64, stop: i64, step: i64) -> Range {
    let at = |i: i64| {
      (self.start as i128 + i as i128 * self.step as i128)
        .clamp(i64::MIN as i128, i64::MAX as i128) as i64
    };
    let step = (step as i128 * self.step as i128)
      .clamp(i64::MIN as i128 + 1, i64::MAX as i128) as i64;
    // The indices come from normalization against `len`, so the new range
    // has exactly the selected elements.
    Range::new(at(start), at(stop), step).unwrap_or(Range {
      start: 0,
      stop: 0,
      step: 1,
      len: 0,
    })
  }

  /// Compares two ranges by their elements.
  pub fn same_elements(&self, other: &Range) -> bool {
    self.len == other.len
      && (self.len == 0
        || (self.start == other.start
          && (self.len == 1 || self.step == other.step)))
  }

  pub fn iter(&self) -> impl Iterator<Item = Int> + '_ {
    (0..self.len).map(move |i| self.get(i))
  }
}

impl fmt::Display for Range {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.step == 1 {
      write!(f, "range({}, {})", self.start, self.stop)
    } else {
      write!(f, "range({}, {}, {})", self.start, self.stop, self.step)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn elems(r: &Range) -> Vec<String> {
    r.iter().map(|i| i.to_string()).collect()
  }

  #[test]
  fn lengths() {
    assert_eq!(Range::new(0, 10, 3).unwrap().len(), 4);
    assert_eq!(Range::new(10, 0, -3).unwrap().len(), 4);
    assert_eq!(Range::new(0, 10, -1).unwrap().len(), 0);
    assert_eq!(
      Range::new(0, 1, 0).unwrap_err().to_string(),
      "step argument must not be zero"
    );
  }

  #[test]
  fn membership() {
    let r = Range::new(1, 10, 3).unwrap();
    assert!(r.contains(&Int::Small(7)));
    assert!(!r.contains(&Int::Small(8)));
    assert!(!r.contains(&Int::Small(10)));
    let r = Range::new(10, 1, -3).unwrap();
    assert!(r.contains(&Int::Small(4)));
    assert!(!r.contains(&Int::Small(1)));
  }

  #[test]
  fn slices() {
    let r = Range::new(0, 10, 1).unwrap();
    assert_eq!(elems(&r.slice(9, -1, -2)), vec!["9", "7", "5", "3", "1"]);
    assert_eq!(elems(&r.slice(2, 5, 1)), vec!["2", "3", "4"]);
    assert!(r.slice(0, 10, 2).same_elements(&Range::new(0, 9, 2).unwrap()));
  }
}
