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

//! The operator table: binary and unary operators, membership, indexing and
//! slicing.

use crate::eval::error::ValueError;
use crate::eval::interp;
use crate::eval::value::compare;
use crate::eval::value::ArcSlice;
use crate::eval::value::Dict;
use crate::eval::value::Int;
use crate::eval::value::List;
use crate::eval::value::Side;
use crate::eval::value::Str;
use crate::eval::value::Tuple;
use crate::eval::value::Value;
use crate::eval::value::Value as V;
use crate::syn::BinOp;
use crate::syn::UnOp;

/// The largest string or sequence that repetition may produce.
const MAX_REPEAT: usize = 1 << 30;

/// Evaluates `x op y` for every operator except `and` and `or`, which
/// short-circuit and are handled by the evaluator.
pub fn binary<'i>(
  op: BinOp,
  x: &Value<'i>,
  y: &Value<'i>,
) -> Result<Value<'i>, ValueError> {
  if op.is_comparison() {
    return compare::compare(op, x, y).map(Value::Bool);
  }

  let result = match (op, x, y) {
    (BinOp::In, _, _) => return contains(y, x).map(V::Bool),
    (BinOp::NotIn, _, _) => return contains(y, x).map(|b| V::Bool(!b)),

    (BinOp::Add, V::Int(a), V::Int(b)) => Some(V::Int(a.add(b))),
    (BinOp::Sub, V::Int(a), V::Int(b)) => Some(V::Int(a.sub(b))),
    (BinOp::Mul, V::Int(a), V::Int(b)) => Some(V::Int(a.mul(b))),
    (BinOp::FloorDiv, V::Int(a), V::Int(b)) => Some(V::Int(a.floor_div(b)?)),
    (BinOp::Mod, V::Int(a), V::Int(b)) => Some(V::Int(a.modulo(b)?)),
    (BinOp::BitAnd, V::Int(a), V::Int(b)) => Some(V::Int(a.bitand(b))),
    (BinOp::BitOr, V::Int(a), V::Int(b)) => Some(V::Int(a.bitor(b))),
    (BinOp::BitXor, V::Int(a), V::Int(b)) => Some(V::Int(a.bitxor(b))),
    (BinOp::Shl, V::Int(a), V::Int(b)) => Some(V::Int(a.shl(b)?)),
    (BinOp::Shr, V::Int(a), V::Int(b)) => Some(V::Int(a.shr(b)?)),

    (
      BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::FloorDiv
      | BinOp::Mod,
      V::Int(_) | V::Float(_),
      V::Int(_) | V::Float(_),
    ) => Some(V::Float(float_op(op, as_float(x)?, as_float(y)?)?)),

    (BinOp::Mod, V::String(s), _) => Some(interp::format(s, y)?),

    (BinOp::Add, V::String(a), V::String(b)) => {
      Some(V::String(concat(a, b)))
    }
    (BinOp::Add, V::Bytes(a), V::Bytes(b)) => Some(V::Bytes(concat(a, b))),
    (BinOp::Add, V::List(a), V::List(b)) => {
      let mut xs = a.snapshot();
      xs.extend(b.snapshot());
      Some(V::List(xs.into()))
    }
    (BinOp::Add, V::Tuple(a), V::Tuple(b)) => Some(V::Tuple(concat(a, b))),

    (BinOp::Mul, V::Int(n), seq) | (BinOp::Mul, seq, V::Int(n))
      if is_repeatable(seq) =>
    {
      Some(repeat(seq, n)?)
    }

    (BinOp::BitOr, V::Set(a), V::Set(b)) => Some(V::Set(a.union(b))),
    (BinOp::BitAnd, V::Set(a), V::Set(b)) => Some(V::Set(a.intersection(b))),
    (BinOp::BitXor, V::Set(a), V::Set(b)) => {
      Some(V::Set(a.symmetric_difference(b)))
    }
    (BinOp::Sub, V::Set(a), V::Set(b)) => Some(V::Set(a.difference(b))),
    (BinOp::BitOr, V::Dict(a), V::Dict(b)) => {
      let d = Dict::new();
      for (k, v) in a.items().into_iter().chain(b.items()) {
        d.insert(k, v)?;
      }
      Some(V::Dict(d))
    }

    (_, V::Extension(e), _) => e.binary(op, y, Side::Left)?,
    _ => None,
  };

  let result = match (result, y) {
    (None, V::Extension(e)) => e.binary(op, x, Side::Right)?,
    (result, _) => result,
  };

  result.ok_or_else(|| {
    ValueError::new(format!(
      "unknown binary op: {} {} {}",
      x.type_name(),
      op,
      y.type_name()
    ))
  })
}

fn as_float(x: &Value) -> Result<f64, ValueError> {
  match x {
    Value::Int(i) => i.to_finite_f64(),
    Value::Float(f) => Ok(*f),
    _ => bug!("as_float of {}", x.type_name()),
  }
}

/// Applies an arithmetic operator to floats. `%` and `//` are floored,
/// consistent with integers.
fn float_op(op: BinOp, x: f64, y: f64) -> Result<f64, ValueError> {
  Ok(match op {
    BinOp::Add => x + y,
    BinOp::Sub => x - y,
    BinOp::Mul => x * y,
    BinOp::Div if y == 0.0 => {
      return Err(ValueError::new("real division by zero"))
    }
    BinOp::Div => x / y,
    BinOp::FloorDiv if y == 0.0 => {
      return Err(ValueError::new("floored division by zero"))
    }
    BinOp::FloorDiv => (x / y).floor(),
    BinOp::Mod if y == 0.0 => {
      return Err(ValueError::new("float modulo by zero"))
    }
    BinOp::Mod => {
      let r = x % y;
      if r != 0.0 && (r < 0.0) != (y < 0.0) {
        r + y
      } else {
        r
      }
    }
    _ => bug!("float_op of {}", op),
  })
}

fn concat<'i, T: Clone>(
  a: &ArcSlice<'i, T>,
  b: &ArcSlice<'i, T>,
) -> ArcSlice<'i, T> {
  if a.is_empty() {
    return b.clone();
  }
  if b.is_empty() {
    return a.clone();
  }
  let mut xs = Vec::with_capacity(a.len() + b.len());
  xs.extend_from_slice(a);
  xs.extend_from_slice(b);
  xs.into()
}

fn is_repeatable(x: &Value) -> bool {
  matches!(
    x,
    Value::String(_) | Value::Bytes(_) | Value::List(_) | Value::Tuple(_)
  )
}

/// Repeats a sequence `n` times; non-positive counts give an empty result.
fn repeat<'i>(seq: &Value<'i>, n: &Int) -> Result<Value<'i>, ValueError> {
  let len = len(seq).unwrap_or(0);
  let n = if len == 0 || n.signum() <= 0 {
    0
  } else {
    match n.to_i64() {
      Some(k) if (k as u64).saturating_mul(len as u64) <= MAX_REPEAT as u64 => {
        k as usize
      }
      _ => {
        return Err(ValueError::new(format!(
          "excessive repeat ({} * {} elements)",
          len, n
        )))
      }
    }
  };
  Ok(match seq {
    Value::String(s) => Value::String(s.repeat(n).into()),
    Value::Bytes(s) => Value::Bytes(s.repeat(n).into()),
    Value::List(l) => Value::List(repeat_values(&l.read(), n).into()),
    Value::Tuple(t) => Value::Tuple(repeat_values(t, n).into()),
    _ => bug!("repeat of {}", seq.type_name()),
  })
}

fn repeat_values<'i>(xs: &[Value<'i>], n: usize) -> Vec<Value<'i>> {
  let mut out = Vec::with_capacity(xs.len() * n);
  for _ in 0..n {
    out.extend_from_slice(xs);
  }
  out
}

/// Evaluates a unary operator other than `not`.
pub fn unary<'i>(op: UnOp, x: &Value<'i>) -> Result<Value<'i>, ValueError> {
  let result = match (op, x) {
    (UnOp::Not, _) => Some(Value::Bool(!x.truth())),
    (UnOp::Neg, Value::Int(i)) => Some(Value::Int(i.neg())),
    (UnOp::Neg, Value::Float(f)) => Some(Value::Float(-f)),
    (UnOp::Pos, Value::Int(_) | Value::Float(_)) => Some(x.clone()),
    (UnOp::Invert, Value::Int(i)) => Some(Value::Int(i.invert())),
    (_, Value::Extension(e)) => e.unary(op)?,
    _ => None,
  };
  result.ok_or_else(|| {
    ValueError::new(format!("unknown unary op: {}{}", op, x.type_name()))
  })
}

/// Returns the length of `x`, if it has one.
pub fn len(x: &Value) -> Option<usize> {
  match x {
    Value::String(s) | Value::Bytes(s) => Some(s.len()),
    Value::List(l) => Some(l.len()),
    Value::Tuple(t) => Some(t.len()),
    Value::Dict(d) => Some(d.len()),
    Value::Set(s) => Some(s.len()),
    Value::Range(r) => Some(r.len()),
    Value::Extension(e) => e.len(),
    _ => None,
  }
}

/// Evaluates `x in container`.
pub fn contains<'i>(
  container: &Value<'i>,
  x: &Value<'i>,
) -> Result<bool, ValueError> {
  match container {
    Value::String(s) => match x {
      Value::String(needle) => Ok(find(s, needle, 0).is_some()),
      _ => Err(ValueError::new(format!(
        "'in <string>' requires string as left operand, not {}",
        x.type_name()
      ))),
    },
    Value::Bytes(s) => match x {
      Value::Bytes(needle) => Ok(find(s, needle, 0).is_some()),
      Value::Int(i) => match i.to_i64() {
        Some(b @ 0..=255) => Ok(s.contains(&(b as u8))),
        _ => Err(ValueError::new(format!("int in bytes: {} out of range", i))),
      },
      _ => Err(ValueError::new(format!(
        "'in bytes' requires bytes or int as left operand, not {}",
        x.type_name()
      ))),
    },
    Value::List(l) => contains_elem(&l.snapshot(), x),
    Value::Tuple(t) => contains_elem(t, x),
    Value::Dict(d) => d.contains(x),
    Value::Set(s) => s.contains(x),
    Value::Range(r) => Ok(match x {
      Value::Int(i) => r.contains(i),
      Value::Float(f) if f.fract() == 0.0 => match Int::from_f64(*f) {
        Ok(i) => r.contains(&i),
        Err(_) => false,
      },
      _ => false,
    }),
    Value::Extension(e) => {
      if let Some(it) = e.iterate() {
        for v in it {
          if v.equals(x)? {
            return Ok(true);
          }
        }
        return Ok(false);
      }
      Ok(e.get(x)?.is_some())
    }
    _ => Err(ValueError::new(format!(
      "unknown binary op: {} in {}",
      x.type_name(),
      container.type_name()
    ))),
  }
}

fn contains_elem<'i>(
  xs: &[Value<'i>],
  x: &Value<'i>,
) -> Result<bool, ValueError> {
  for v in xs {
    if v.equals(x)? {
      return Ok(true);
    }
  }
  Ok(false)
}

/// Finds `needle` in `haystack` at or after `from`.
pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
  if from > haystack.len() {
    return None;
  }
  if needle.is_empty() {
    return Some(from);
  }
  haystack[from..]
    .windows(needle.len())
    .position(|w| w == needle)
    .map(|i| i + from)
}

/// Finds the last `needle` in `haystack[..to]`.
pub fn rfind(haystack: &[u8], needle: &[u8], to: usize) -> Option<usize> {
  let haystack = haystack.get(..to)?;
  if needle.is_empty() {
    return Some(haystack.len());
  }
  haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Builds the error for an index outside `[0, len)`, after negative-index
/// adjustment.
pub fn out_of_range(ty: &str, index: i64, len: usize) -> ValueError {
  if len == 0 {
    return ValueError::new(format!(
      "{} index {} out of range: empty {}",
      ty, index, ty
    ));
  }
  ValueError::new(format!(
    "{} index {} out of range [{}:{})",
    ty,
    index,
    -(len as i64),
    len
  ))
}

/// Resolves a possibly-negative index against `len`.
fn resolve_index(
  ty: &str,
  index: &Value,
  len: usize,
) -> Result<usize, ValueError> {
  let i = match index {
    Value::Int(i) => i.to_i64(),
    _ => {
      return Err(ValueError::new(format!(
        "{} index: got {}, want int",
        ty,
        index.type_name()
      )))
    }
  };
  let i = match i {
    Some(i) => i,
    None => return Err(out_of_range(ty, i64::MAX, len)),
  };
  let adjusted = if i < 0 { i + len as i64 } else { i };
  if adjusted < 0 || adjusted >= len as i64 {
    return Err(out_of_range(ty, i, len));
  }
  Ok(adjusted as usize)
}

/// Evaluates `x[index]`.
pub fn index<'i>(
  x: &Value<'i>,
  index: &Value<'i>,
) -> Result<Value<'i>, ValueError> {
  let ty = x.type_name();
  match x {
    Value::String(s) => {
      let i = resolve_index(ty, index, s.len())?;
      Ok(Value::String(s.slice(i..i + 1).unwrap_or_else(Str::empty)))
    }
    Value::Bytes(s) => {
      let i = resolve_index(ty, index, s.len())?;
      Ok(Value::from(s[i] as i32))
    }
    Value::List(l) => {
      let items = l.read();
      let i = resolve_index(ty, index, items.len())?;
      Ok(items[i].clone())
    }
    Value::Tuple(t) => {
      let i = resolve_index(ty, index, t.len())?;
      Ok(t[i].clone())
    }
    Value::Range(r) => {
      let i = resolve_index(ty, index, r.len())?;
      Ok(Value::Int(r.get(i)))
    }
    Value::Dict(d) => match d.get(index)? {
      Some(v) => Ok(v),
      None => Err(ValueError::new(format!(
        "key {} not in dict",
        index.repr()
      ))),
    },
    Value::Extension(e) => match e.len() {
      Some(len) => {
        let i = resolve_index(ty, index, len)?;
        e.index(i).ok_or_else(|| out_of_range(ty, i as i64, len))
      }
      None => match e.get(index)? {
        Some(v) => Ok(v),
        None => Err(ValueError::new(format!(
          "key {} not in {}",
          index.repr(),
          ty
        ))),
      },
    },
    _ => Err(ValueError::new(format!(
      "unhandled index operation {}[{}]",
      ty,
      index.type_name()
    ))),
  }
}

/// Evaluates `x[index] = value`.
pub fn set_index<'i>(
  x: &Value<'i>,
  index: &Value<'i>,
  value: Value<'i>,
) -> Result<(), ValueError> {
  match x {
    Value::List(l) => {
      let i = resolve_index("list", index, l.len())?;
      l.set(i, value)
    }
    Value::Dict(d) => d.insert(index.clone(), value),
    _ => Err(ValueError::new(format!(
      "{} value does not support item assignment",
      x.type_name()
    ))),
  }
}

/// Maps an out-of-range bound to a value that clamps the same way.
fn saturate(i: &Int) -> i64 {
  if i.signum() < 0 {
    i64::MIN / 2
  } else {
    i64::MAX / 2
  }
}

/// Converts a slice bound, adding `len` to a negative one.
fn slice_bound(
  v: &Value,
  len: usize,
  default: i64,
) -> Result<i64, ValueError> {
  match v {
    Value::None => Ok(default),
    Value::Int(i) => {
      let i = i.to_i64().unwrap_or(saturate(i));
      Ok(if i < 0 { i + len as i64 } else { i })
    }
    _ => Err(ValueError::new(format!(
      "invalid slice index: got {}, want int",
      v.type_name()
    ))),
  }
}

/// Normalizes slice bounds for a sequence of length `len`, returning
/// `(start, end, step)` such that the selected indices are `start`,
/// `start + step`, ..., stopping before `end`.
pub fn slice_indices(
  lo: &Value,
  hi: &Value,
  step: &Value,
  len: usize,
) -> Result<(i64, i64, i64), ValueError> {
  let step = match step {
    Value::None => 1,
    Value::Int(i) => i.to_i64().unwrap_or(saturate(i)),
    _ => {
      return Err(ValueError::new(format!(
        "invalid slice step: got {}, want int",
        step.type_name()
      )))
    }
  };
  if step == 0 {
    return Err(ValueError::new("zero is not a valid slice step"));
  }

  let n = len as i64;
  if step > 0 {
    let start = slice_bound(lo, len, 0)?.clamp(0, n);
    let end = slice_bound(hi, len, n)?.clamp(0, n);
    Ok((start, end.max(start), step))
  } else {
    // The default range is effectively [n-1:-1].
    let start = slice_bound(lo, len, n - 1)?.clamp(-1, n - 1);
    let end = slice_bound(hi, len, -1)?.clamp(-1, n - 1);
    Ok((start, end, step))
  }
}

fn select<T: Clone>(xs: &[T], start: i64, end: i64, step: i64) -> Vec<T> {
  let mut out = Vec::new();
  let mut i = start;
  while (step > 0 && i < end) || (step < 0 && i > end) {
    out.push(xs[i as usize].clone());
    i += step;
  }
  out
}

/// Evaluates `x[lo:hi:step]`; absent bounds are `None`.
pub fn slice<'i>(
  x: &Value<'i>,
  lo: &Value<'i>,
  hi: &Value<'i>,
  step: &Value<'i>,
) -> Result<Value<'i>, ValueError> {
  let n = match x {
    Value::String(_)
    | Value::Bytes(_)
    | Value::List(_)
    | Value::Tuple(_)
    | Value::Range(_) => len(x).unwrap_or(0),
    _ => {
      return Err(ValueError::new(format!(
        "invalid slice operand {}",
        x.type_name()
      )))
    }
  };
  let (start, end, step) = slice_indices(lo, hi, step, n)?;
  let contiguous = step == 1;
  let range = start as usize..end.max(start) as usize;

  Ok(match x {
    Value::String(s) if contiguous => {
      Value::String(s.slice(range).unwrap_or_else(Str::empty))
    }
    Value::Bytes(s) if contiguous => {
      Value::Bytes(s.slice(range).unwrap_or_else(Str::empty))
    }
    Value::Tuple(t) if contiguous => {
      Value::Tuple(t.slice(range).unwrap_or_else(Tuple::empty))
    }
    Value::List(l) if contiguous => {
      Value::List(List::new(l.read()[range].to_vec()))
    }
    Value::String(s) => Value::String(select(s, start, end, step).into()),
    Value::Bytes(s) => Value::Bytes(select(s, start, end, step).into()),
    Value::Tuple(t) => Value::Tuple(select(t, start, end, step).into()),
    Value::List(l) => {
      Value::List(List::new(select(&l.read(), start, end, step)))
    }
    Value::Range(r) => Value::Range(r.slice(start, end, step)),
    _ => bug!("slice of {}", x.type_name()),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::eval::value::Extension;
  use pretty_assertions::assert_eq;
  use std::sync::Arc;

  fn s(x: &'static str) -> Value<'static> {
    Value::from(x)
  }

  fn i(x: i32) -> Value<'static> {
    Value::from(x)
  }

  fn list(xs: &[i32]) -> Value<'static> {
    Value::List(List::new(xs.iter().map(|&x| i(x)).collect()))
  }

  fn bin(op: BinOp, x: &Value<'static>, y: &Value<'static>) -> String {
    match binary(op, x, y) {
      Ok(v) => v.repr(),
      Err(e) => format!("error: {}", e),
    }
  }

  #[test]
  fn arithmetic() {
    assert_eq!(bin(BinOp::Add, &i(1), &Value::Float(0.5)), "1.5");
    assert_eq!(bin(BinOp::Div, &i(7), &i(2)), "3.5");
    assert_eq!(bin(BinOp::FloorDiv, &i(-7), &i(2)), "-4");
    assert_eq!(bin(BinOp::Mod, &i(-7), &i(2)), "1");
    assert_eq!(bin(BinOp::Mod, &Value::Float(-7.0), &i(2)), "1.0");
    assert_eq!(bin(BinOp::Mod, &Value::Float(7.0), &i(-2)), "-1.0");
    assert_eq!(bin(BinOp::Div, &i(1), &i(0)), "error: real division by zero");
    assert_eq!(
      bin(BinOp::FloorDiv, &Value::Float(1.0), &i(0)),
      "error: floored division by zero"
    );
    assert_eq!(
      bin(BinOp::Sub, &s("a"), &i(1)),
      "error: unknown binary op: string - int"
    );
  }

  #[test]
  fn sequences() {
    assert_eq!(bin(BinOp::Add, &s("ab"), &s("cd")), r#""abcd""#);
    assert_eq!(bin(BinOp::Mul, &i(2), &list(&[1, 2])), "[1, 2, 1, 2]");
    assert_eq!(bin(BinOp::Mul, &s("ab"), &i(-1)), r#""""#);
    assert_eq!(bin(BinOp::In, &i(2), &list(&[1, 2])), "True");
    assert_eq!(bin(BinOp::NotIn, &s("b"), &s("abc")), "False");
    assert_eq!(
      bin(BinOp::In, &i(1), &s("abc")),
      "error: 'in <string>' requires string as left operand, not int"
    );
  }

  #[test]
  fn repetition_counts() {
    let huge = Int::from(1).shl(&Int::from(70)).unwrap();
    let neg = Value::Int(huge.neg());
    assert_eq!(bin(BinOp::Mul, &s("a"), &neg), r#""""#);
    assert_eq!(bin(BinOp::Mul, &neg, &list(&[1])), "[]");
    assert_eq!(bin(BinOp::Mul, &list(&[]), &Value::Int(huge)), "[]");
    assert_eq!(bin(BinOp::Mul, &s(""), &Value::from(i64::MAX)), r#""""#);
    assert_eq!(
      bin(BinOp::Mul, &s("ab"), &Value::from(i64::MAX)),
      format!("error: excessive repeat (2 * {} elements)", i64::MAX)
    );
  }

  /// Multiplies by ints from either side, reporting which side it was on.
  #[derive(Debug)]
  struct Scale(i64);

  impl<'i> Extension<'i> for Scale {
    fn type_name(&self) -> &'static str {
      "scale"
    }

    fn binary(
      &self,
      op: BinOp,
      other: &Value<'i>,
      side: Side,
    ) -> Result<Option<Value<'i>>, ValueError> {
      match (op, other) {
        (BinOp::Mul, Value::Int(n)) => {
          let n = n.to_i64().unwrap_or(0);
          Ok(Some(Value::from(format!("{:?}:{}", side, self.0 * n))))
        }
        _ => Ok(None),
      }
    }
  }

  #[test]
  fn extension_operands() {
    let x = Value::Extension(Arc::new(Scale(3)));
    assert_eq!(bin(BinOp::Mul, &x, &i(2)), r#""Left:6""#);
    assert_eq!(bin(BinOp::Mul, &i(2), &x), r#""Right:6""#);
    assert_eq!(
      bin(BinOp::Add, &x, &i(1)),
      "error: unknown binary op: scale + int"
    );
    assert_eq!(
      bin(BinOp::Add, &i(1), &x),
      "error: unknown binary op: int + scale"
    );
  }

  #[test]
  fn indexing() {
    let l = list(&[1, 2, 3]);
    assert_eq!(index(&l, &i(-1)).unwrap().repr(), "3");
    assert_eq!(
      index(&l, &i(3)).unwrap_err().to_string(),
      "list index 3 out of range [-3:3)"
    );
    assert_eq!(index(&s("aΩb"), &i(1)).unwrap().repr(), r#""\xce""#);
  }

  #[test]
  fn slicing() {
    let l = list(&[0, 1, 2, 3, 4]);
    let none = Value::None;
    let sl = |lo: &Value<'static>, hi: &Value<'static>, st: &Value<'static>| {
      slice(&l, lo, hi, st).map(|v| v.repr())
    };
    assert_eq!(sl(&none, &none, &i(-1)).unwrap(), "[4, 3, 2, 1, 0]");
    assert_eq!(sl(&i(1), &i(-1), &none).unwrap(), "[1, 2, 3]");
    assert_eq!(sl(&i(-2), &none, &i(-2)).unwrap(), "[3, 1]");
    assert_eq!(sl(&i(10), &i(-10), &i(-1)).unwrap(), "[4, 3, 2, 1, 0]");
    assert_eq!(sl(&i(3), &i(1), &none).unwrap(), "[]");
    assert_eq!(
      sl(&none, &none, &i(0)).unwrap_err().to_string(),
      "zero is not a valid slice step"
    );
    let r = slice(&s("hello"), &none, &none, &i(-1)).unwrap();
    assert_eq!(r.repr(), r#""olleh""#);
  }
}
