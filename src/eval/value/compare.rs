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

//! Equality and ordering of Kestrel values.
//!
//! Comparison is separate from the binary operator table: `==` and `!=` are
//! defined for every pair of values, while the ordering operators are
//! defined for numbers, strings, bytes, lists, tuples and bools only.

use std::cmp::Ordering;

use crate::eval::error::ValueError;
use crate::eval::value::cmp_int_float;
use crate::eval::value::Value;
use crate::syn::BinOp;

/// How deeply nested containers may be compared.
pub const MAX_DEPTH: usize = 10;

/// Compares `x` and `y` with `==`.
pub fn equals<'i>(x: &Value<'i>, y: &Value<'i>) -> Result<bool, ValueError> {
  compare(BinOp::Eq, x, y)
}

/// Evaluates the comparison `x op y`, where `op` is one of the six
/// comparison operators.
pub fn compare<'i>(
  op: BinOp,
  x: &Value<'i>,
  y: &Value<'i>,
) -> Result<bool, ValueError> {
  compare_depth(op, x, y, MAX_DEPTH)
}

/// Returns the ordering of `x` and `y`, for sorting.
pub fn cmp<'i>(x: &Value<'i>, y: &Value<'i>) -> Result<Ordering, ValueError> {
  if compare(BinOp::Lt, x, y)? {
    Ok(Ordering::Less)
  } else if compare(BinOp::Lt, y, x)? {
    Ok(Ordering::Greater)
  } else {
    Ok(Ordering::Equal)
  }
}

fn threeway(op: BinOp, ord: Ordering) -> bool {
  match op {
    BinOp::Eq => ord == Ordering::Equal,
    BinOp::Ne => ord != Ordering::Equal,
    BinOp::Lt => ord == Ordering::Less,
    BinOp::Le => ord != Ordering::Greater,
    BinOp::Gt => ord == Ordering::Greater,
    BinOp::Ge => ord != Ordering::Less,
    _ => bug!("not a comparison operator: {}", op),
  }
}

/// Orders floats totally: NaN equals itself and exceeds everything else.
fn cmp_floats(x: f64, y: f64) -> Ordering {
  match (x.is_nan(), y.is_nan()) {
    (true, true) => Ordering::Equal,
    (true, false) => Ordering::Greater,
    (false, true) => Ordering::Less,
    (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
  }
}

fn not_implemented(op: BinOp, x: &Value, y: &Value) -> ValueError {
  ValueError::new(format!(
    "{} {} {} not implemented",
    x.type_name(),
    op,
    y.type_name()
  ))
}

fn compare_depth<'i>(
  op: BinOp,
  x: &Value<'i>,
  y: &Value<'i>,
  depth: usize,
) -> Result<bool, ValueError> {
  if depth == 0 {
    return Err(ValueError::new(
      "comparison exceeded maximum recursion depth",
    ));
  }
  let is_eq = matches!(op, BinOp::Eq | BinOp::Ne);
  if is_eq && x.is_same_object(y) {
    return Ok(op == BinOp::Eq);
  }

  // Answers `x op y` given only whether `x == y`, for types without an
  // ordering.
  let equality = |eq: bool| -> Result<bool, ValueError> {
    match op {
      BinOp::Eq => Ok(eq),
      BinOp::Ne => Ok(!eq),
      _ => Err(not_implemented(op, x, y)),
    }
  };

  match (x, y) {
    (Value::None, Value::None) => equality(true),
    (Value::Bool(a), Value::Bool(b)) => Ok(threeway(op, a.cmp(b))),
    (Value::Int(a), Value::Int(b)) => Ok(threeway(op, a.cmp(b))),
    (Value::Int(a), Value::Float(b)) => {
      Ok(threeway(op, cmp_int_float(a, *b)))
    }
    (Value::Float(a), Value::Int(b)) => {
      Ok(threeway(op, cmp_int_float(b, *a).reverse()))
    }
    (Value::Float(a), Value::Float(b)) => Ok(threeway(op, cmp_floats(*a, *b))),
    (Value::String(a), Value::String(b))
    | (Value::Bytes(a), Value::Bytes(b)) => {
      Ok(threeway(op, a.as_sliced().cmp(b.as_sliced())))
    }
    (Value::List(a), Value::List(b)) => {
      let (a, b) = (a.snapshot(), b.snapshot());
      compare_slices(op, &a, &b, depth)
    }
    (Value::Tuple(a), Value::Tuple(b)) => compare_slices(op, a, b, depth),
    (Value::Dict(a), Value::Dict(b)) => {
      if !is_eq {
        return Err(not_implemented(op, x, y));
      }
      if a.len() != b.len() {
        return equality(false);
      }
      for (k, xv) in a.items() {
        let yv = match b.get(&k)? {
          Some(yv) => yv,
          None => return equality(false),
        };
        if !compare_depth(BinOp::Eq, &xv, &yv, depth - 1)? {
          return equality(false);
        }
      }
      equality(true)
    }
    (Value::Set(a), Value::Set(b)) => {
      if !is_eq {
        return Err(not_implemented(op, x, y));
      }
      equality(a.len() == b.len() && a.is_subset(b))
    }
    (Value::Range(a), Value::Range(b)) => equality(a.same_elements(b)),
    (Value::Function(a), Value::Function(b)) => equality(a.ptr_eq(b)),
    (Value::Builtin(a), Value::Builtin(b)) => {
      let same_recv = match (a.receiver(), b.receiver()) {
        (None, None) => true,
        (Some(r), Some(s)) => r.is_same_object(s),
        _ => false,
      };
      equality(a.name() == b.name() && same_recv)
    }
    (Value::Extension(a), _) => match a.equals(y) {
      Some(eq) => equality(eq),
      None => equality(x.is_same_object(y)),
    },
    (_, Value::Extension(b)) => match b.equals(x) {
      Some(eq) => equality(eq),
      None => equality(false),
    },
    _ => equality(false),
  }
}

fn compare_slices<'i>(
  op: BinOp,
  xs: &[Value<'i>],
  ys: &[Value<'i>],
  depth: usize,
) -> Result<bool, ValueError> {
  if xs.len() != ys.len() && matches!(op, BinOp::Eq | BinOp::Ne) {
    return Ok(op == BinOp::Ne);
  }
  for (x, y) in xs.iter().zip(ys) {
    if !compare_depth(BinOp::Eq, x, y, depth - 1)? {
      return match op {
        BinOp::Eq => Ok(false),
        BinOp::Ne => Ok(true),
        _ => compare_depth(op, x, y, depth - 1),
      };
    }
  }
  Ok(threeway(op, xs.len().cmp(&ys.len())))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::eval::value::Dict;
  use crate::eval::value::List;
  use pretty_assertions::assert_eq;

  fn list(xs: Vec<Value<'static>>) -> Value<'static> {
    Value::List(List::new(xs))
  }

  #[test]
  fn numbers() {
    let one = Value::from(1);
    assert!(equals(&one, &Value::Float(1.0)).unwrap());
    assert!(compare(BinOp::Lt, &one, &Value::Float(1.5)).unwrap());
    assert!(equals(&Value::Float(f64::NAN), &Value::Float(f64::NAN)).unwrap());
    assert!(compare(BinOp::Gt, &Value::Float(f64::NAN), &one).unwrap());
  }

  #[test]
  fn sequences() {
    let a = list(vec![Value::from(1), Value::from(2)]);
    let b = list(vec![Value::from(1), Value::from(3)]);
    let c = list(vec![Value::from(1)]);
    assert!(compare(BinOp::Lt, &a, &b).unwrap());
    assert!(compare(BinOp::Gt, &a, &c).unwrap());
    assert!(compare(BinOp::Ne, &a, &c).unwrap());
    assert!(!equals(&a, &Value::from("ab")).unwrap());
  }

  #[test]
  fn unordered_types() {
    let d = Value::Dict(Dict::new());
    assert!(equals(&d, &Value::Dict(Dict::new())).unwrap());
    assert_eq!(
      compare(BinOp::Lt, &d, &d).unwrap_err().to_string(),
      "dict < dict not implemented"
    );
    assert_eq!(
      compare(BinOp::Lt, &Value::from(1), &Value::from("a"))
        .unwrap_err()
        .to_string(),
      "int < string not implemented"
    );
  }

  #[test]
  fn depth_is_bounded() {
    let l = List::new(vec![]);
    l.push(Value::List(l.clone())).unwrap();
    let m = List::new(vec![]);
    m.push(Value::List(m.clone())).unwrap();
    assert_eq!(
      equals(&Value::List(l.clone()), &Value::List(m))
        .unwrap_err()
        .to_string(),
      "comparison exceeded maximum recursion depth"
    );
    assert!(equals(&Value::List(l.clone()), &Value::List(l)).unwrap());
  }
}
