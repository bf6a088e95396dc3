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

//! Kestrel integers.
//!
//! An `Int` is either a small integer in the `i32` range, or an arbitrary
//! precision `BigInt`. The representation is normalized: a value that fits in
//! an `i32` is always `Small`, so two equal integers always have the same
//! representation. Small arithmetic is carried out in `i64`, which cannot
//! overflow for `i32` operands.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use num_bigint::Sign;
use num_integer::Integer;
use num_traits::FromPrimitive;
use num_traits::Signed;
use num_traits::ToPrimitive;

use crate::eval::error::ValueError;

/// Shift counts at or above this value are rejected.
const MAX_SHIFT: u32 = 512;

/// A Kestrel integer.
#[derive(Clone, Debug)]
pub enum Int {
  Small(i32),
  Big(Arc<BigInt>),
}

impl Int {
  /// Creates an `Int` from an `i64`.
  pub fn from_i64(x: i64) -> Int {
    match i32::try_from(x) {
      Ok(x) => Int::Small(x),
      Err(_) => Int::Big(Arc::new(BigInt::from(x))),
    }
  }

  /// Creates an `Int` from a `BigInt`, using the small representation if
  /// possible.
  pub fn from_big(x: BigInt) -> Int {
    match x.to_i32() {
      Some(x) => Int::Small(x),
      None => Int::Big(Arc::new(x)),
    }
  }

  /// Converts a finite float to the integer it truncates to.
  pub fn from_f64(x: f64) -> Result<Int, ValueError> {
    if x.is_nan() {
      return Err(ValueError::new("cannot convert float NaN to integer"));
    }
    if x.is_infinite() {
      return Err(ValueError::new("cannot convert float infinity to integer"));
    }
    let x = x.trunc();
    if x.abs() < (1u64 << 53) as f64 {
      return Ok(Int::from_i64(x as i64));
    }
    BigInt::from_f64(x)
      .map(Int::from_big)
      .ok_or_else(|| ValueError::new("cannot convert float to integer"))
  }

  /// Returns this integer as an `i64`, if it fits.
  pub fn to_i64(&self) -> Option<i64> {
    match self {
      Int::Small(x) => Some(*x as i64),
      Int::Big(x) => x.to_i64(),
    }
  }

  /// Returns this integer as an `i32`, if it fits.
  pub fn to_i32(&self) -> Option<i32> {
    match self {
      Int::Small(x) => Some(*x),
      Int::Big(_) => None,
    }
  }

  /// Returns this integer as a `BigInt`.
  pub fn to_big(&self) -> BigInt {
    match self {
      Int::Small(x) => BigInt::from(*x),
      Int::Big(x) => (**x).clone(),
    }
  }

  /// Returns the nearest float, which may be infinite.
  pub fn to_f64(&self) -> f64 {
    match self {
      Int::Small(x) => *x as f64,
      Int::Big(x) => x.to_f64().unwrap_or(f64::NAN),
    }
  }

  /// Returns the nearest float, failing if it is not finite.
  pub fn to_finite_f64(&self) -> Result<f64, ValueError> {
    let f = self.to_f64();
    if !f.is_finite() {
      return Err(ValueError::new("int too large to convert to float"));
    }
    Ok(f)
  }

  /// Returns -1, 0, or 1 according to the sign of this integer.
  pub fn signum(&self) -> i32 {
    match self {
      Int::Small(x) => x.signum(),
      Int::Big(x) => match x.sign() {
        Sign::Minus => -1,
        Sign::NoSign => 0,
        Sign::Plus => 1,
      },
    }
  }

  pub fn is_zero(&self) -> bool {
    self.signum() == 0
  }

  /// Applies `small` when both operands are small, and `big` otherwise.
  fn apply(
    &self,
    other: &Int,
    small: impl FnOnce(i64, i64) -> i64,
    big: impl FnOnce(BigInt, BigInt) -> BigInt,
  ) -> Int {
    match (self, other) {
      (Int::Small(x), Int::Small(y)) => {
        Int::from_i64(small(*x as i64, *y as i64))
      }
      _ => Int::from_big(big(self.to_big(), other.to_big())),
    }
  }

  pub fn add(&self, other: &Int) -> Int {
    self.apply(other, |x, y| x + y, |x, y| x + y)
  }

  pub fn sub(&self, other: &Int) -> Int {
    self.apply(other, |x, y| x - y, |x, y| x - y)
  }

  pub fn mul(&self, other: &Int) -> Int {
    self.apply(other, |x, y| x * y, |x, y| x * y)
  }

  pub fn bitand(&self, other: &Int) -> Int {
    self.apply(other, |x, y| x & y, |x, y| x & y)
  }

  pub fn bitor(&self, other: &Int) -> Int {
    self.apply(other, |x, y| x | y, |x, y| x | y)
  }

  pub fn bitxor(&self, other: &Int) -> Int {
    self.apply(other, |x, y| x ^ y, |x, y| x ^ y)
  }

  /// Floored division.
  pub fn floor_div(&self, other: &Int) -> Result<Int, ValueError> {
    if other.is_zero() {
      return Err(ValueError::new("floored division by zero"));
    }
    Ok(self.apply(
      other,
      |x, y| Integer::div_floor(&x, &y),
      |x, y| x.div_floor(&y),
    ))
  }

  /// Floored modulo; the result has the sign of `other`.
  pub fn modulo(&self, other: &Int) -> Result<Int, ValueError> {
    if other.is_zero() {
      return Err(ValueError::new("integer modulo by zero"));
    }
    Ok(self.apply(
      other,
      |x, y| Integer::mod_floor(&x, &y),
      |x, y| x.mod_floor(&y),
    ))
  }

  pub fn neg(&self) -> Int {
    match self {
      Int::Small(x) => Int::from_i64(-(*x as i64)),
      Int::Big(x) => Int::from_big(-(**x).clone()),
    }
  }

  /// Bitwise complement, `-x - 1`.
  pub fn invert(&self) -> Int {
    match self {
      Int::Small(x) => Int::Small(!*x),
      Int::Big(x) => Int::from_big(!(**x).clone()),
    }
  }

  fn shift_count(other: &Int) -> Result<usize, ValueError> {
    match other.to_i64() {
      Some(n) if n < 0 => {
        Err(ValueError::new(format!("negative shift count: {}", other)))
      }
      Some(n) if n < MAX_SHIFT as i64 => Ok(n as usize),
      _ => Err(ValueError::new(format!("shift count too large: {}", other))),
    }
  }

  pub fn shl(&self, other: &Int) -> Result<Int, ValueError> {
    let n = Self::shift_count(other)?;
    Ok(match self {
      Int::Small(x) if n < 32 => Int::from_i64((*x as i64) << n),
      _ => Int::from_big(self.to_big() << n),
    })
  }

  pub fn shr(&self, other: &Int) -> Result<Int, ValueError> {
    let n = Self::shift_count(other)?;
    Ok(match self {
      Int::Small(x) => Int::Small(x >> n.min(31)),
      Int::Big(x) => Int::from_big((**x).clone() >> n),
    })
  }

  pub fn abs(&self) -> Int {
    match self {
      Int::Small(x) => Int::from_i64((*x as i64).abs()),
      Int::Big(x) => Int::from_big(x.abs()),
    }
  }

  /// Hashes this integer. Floats with integral values hash the same way.
  pub fn hash32(&self) -> u32 {
    match self {
      Int::Small(x) => 12582917u32.wrapping_mul((*x as u32).wrapping_add(3)),
      Int::Big(x) => {
        let (sign, digits) = x.to_u32_digits();
        let seed = if sign == Sign::Minus { 0x9e3779b9 } else { 0 };
        digits
          .iter()
          .fold(seed, |h, &d| h.wrapping_mul(16777619) ^ d)
      }
    }
  }

  /// Formats this integer in the given radix, without a prefix.
  pub fn to_str_radix(&self, radix: u32) -> String {
    match self {
      Int::Small(x) => BigInt::from(*x).to_str_radix(radix),
      Int::Big(x) => x.to_str_radix(radix),
    }
  }
}

impl From<i32> for Int {
  fn from(x: i32) -> Self {
    Int::Small(x)
  }
}

impl From<i64> for Int {
  fn from(x: i64) -> Self {
    Int::from_i64(x)
  }
}

impl From<usize> for Int {
  fn from(x: usize) -> Self {
    match i64::try_from(x) {
      Ok(x) => Int::from_i64(x),
      Err(_) => Int::from_big(BigInt::from(x)),
    }
  }
}

impl PartialEq for Int {
  fn eq(&self, other: &Int) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Int {}

impl PartialOrd for Int {
  fn partial_cmp(&self, other: &Int) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Int {
  fn cmp(&self, other: &Int) -> Ordering {
    match (self, other) {
      (Int::Small(x), Int::Small(y)) => x.cmp(y),
      (Int::Big(x), Int::Big(y)) => x.cmp(y),
      // Normalization puts every big integer outside the small range.
      (Int::Small(_), Int::Big(y)) => {
        if y.is_negative() {
          Ordering::Greater
        } else {
          Ordering::Less
        }
      }
      (Int::Big(x), Int::Small(_)) => {
        if x.is_negative() {
          Ordering::Less
        } else {
          Ordering::Greater
        }
      }
    }
  }
}

impl fmt::Display for Int {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Int::Small(x) => write!(f, "{}", x),
      Int::Big(x) => write!(f, "{}", x),
    }
  }
}

/// Compares an integer with a float by value. NaN is greater than every
/// integer.
pub fn cmp_int_float(x: &Int, y: f64) -> Ordering {
  if y.is_nan() {
    return Ordering::Less;
  }
  if y.is_infinite() {
    return if y > 0.0 {
      Ordering::Less
    } else {
      Ordering::Greater
    };
  }
  let floor = y.floor();
  // `floor` is integral and finite, so the conversion is exact.
  let yi = match Int::from_f64(floor) {
    Ok(yi) => yi,
    Err(_) => return Ordering::Equal,
  };
  match x.cmp(&yi) {
    Ordering::Equal if floor < y => Ordering::Less,
    ord => ord,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn big(s: &str) -> Int {
    Int::from_big(s.parse().unwrap())
  }

  #[test]
  fn small_big_boundary() {
    let max = Int::Small(i32::MAX);
    let one = Int::Small(1);
    let sum = max.add(&one);
    assert!(matches!(sum, Int::Big(_)));
    assert_eq!(sum, big("2147483648"));
    assert!(matches!(sum.sub(&one), Int::Small(i32::MAX)));

    let min = Int::Small(i32::MIN);
    assert_eq!(min.sub(&one), big("-2147483649"));
    assert_eq!(min.neg(), big("2147483648"));
    assert_eq!(min.abs(), big("2147483648"));
    assert_eq!(min.floor_div(&Int::Small(-1)).unwrap(), big("2147483648"));
  }

  #[test]
  fn fast_path_agrees_with_big() {
    let samples = [
      0,
      1,
      -1,
      7,
      -7,
      46341,
      -46341,
      65536,
      i32::MAX,
      i32::MIN,
      i32::MAX - 1,
      i32::MIN + 1,
    ];
    for &a in &samples {
      for &b in &samples {
        let (x, y) = (Int::Small(a), Int::Small(b));
        let (bx, by) = (BigInt::from(a), BigInt::from(b));
        assert_eq!(x.add(&y), Int::from_big(&bx + &by));
        assert_eq!(x.sub(&y), Int::from_big(&bx - &by));
        assert_eq!(x.mul(&y), Int::from_big(&bx * &by));
      }
    }
  }

  #[test]
  fn floor_identity() {
    let samples = [7, -7, 3, -3, 1, -1, 100, -100, i32::MAX, i32::MIN];
    for &a in &samples {
      for &b in &samples {
        let (x, y) = (Int::Small(a), Int::Small(b));
        let q = x.floor_div(&y).unwrap();
        let r = x.modulo(&y).unwrap();
        assert_eq!(q.mul(&y).add(&r), x);
        assert!(r.is_zero() || r.signum() == y.signum());
      }
    }
    assert_eq!(
      Int::Small(1).modulo(&Int::Small(0)).unwrap_err().to_string(),
      "integer modulo by zero"
    );
  }

  #[test]
  fn shifts() {
    assert_eq!(
      Int::Small(1).shl(&Int::Small(40)).unwrap(),
      big("1099511627776")
    );
    assert_eq!(Int::Small(-8).shr(&Int::Small(1)).unwrap(), Int::Small(-4));
    assert_eq!(Int::Small(-1).shr(&Int::Small(100)).unwrap(), Int::Small(-1));
    assert_eq!(
      Int::Small(1).shl(&Int::Small(-1)).unwrap_err().to_string(),
      "negative shift count: -1"
    );
  }

  #[test]
  fn hash_matches_representation() {
    let x = Int::Small(5).add(&big("10000000000")).sub(&big("10000000000"));
    assert!(matches!(x, Int::Small(5)));
    assert_eq!(x.hash32(), Int::Small(5).hash32());
  }

  #[test]
  fn compares_with_floats() {
    assert_eq!(cmp_int_float(&Int::Small(1), 1.0), Ordering::Equal);
    assert_eq!(cmp_int_float(&Int::Small(1), 1.5), Ordering::Less);
    assert_eq!(cmp_int_float(&Int::Small(-1), -1.5), Ordering::Greater);
    assert_eq!(cmp_int_float(&Int::Small(1), f64::NAN), Ordering::Less);
    assert_eq!(
      cmp_int_float(&big("100000000000000000000"), 1e20),
      Ordering::Equal
    );
  }
}
