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

//! Native code implementations of the Kestrel universe: the builtins that
//! every file can see.

use std::cmp::Ordering;

use num_bigint::BigInt;

use crate::eval::encode;
use crate::eval::error::CallError;
use crate::eval::error::ValueError;
use crate::eval::methods;
use crate::eval::ops;
use crate::eval::value::compare;
use crate::eval::value::Args;
use crate::eval::value::Builtin;
use crate::eval::value::Dict;
use crate::eval::value::Int;
use crate::eval::value::Iter;
use crate::eval::value::Range;
use crate::eval::value::Set;
use crate::eval::value::Str;
use crate::eval::value::Value;
use crate::eval::Thread;

/// Returns whether `name` is bound in the universe.
pub fn is_universal(name: &str) -> bool {
  matches!(name, "None" | "True" | "False") || builtin(name).is_some()
}

/// Looks up `name` in the universe.
///
/// Returns `None` if `name` is undefined.
pub fn universe<'i>(name: &str) -> Option<Value<'i>> {
  match name {
    "None" => Some(Value::None),
    "True" => Some(Value::Bool(true)),
    "False" => Some(Value::Bool(false)),
    _ => builtin(name).map(Value::Builtin),
  }
}

fn builtin<'i>(name: &str) -> Option<Builtin<'i>> {
  stdlib! { name =>
    // Returns the absolute value of a number.
    fn abs(_, x) {
      match &x {
        Value::Int(i) => Ok(Value::Int(i.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        x => Err(ValueError::new(format!(
          "got {}, want int or float",
          x.type_name()
        ))),
      }
    }

    fn all(_, iterable) {
      let mut iter = Iter::new(&iterable)?;
      iter.all(|v| v.truth())
    }

    fn any(_, iterable) {
      let mut iter = Iter::new(&iterable)?;
      iter.any(|v| v.truth())
    }

    fn bool(_; x) {
      x.map_or(false, |x| x.truth())
    }

    // Converts a string, or an iterable of ints in [0, 255], to bytes.
    fn bytes(_, x) {
      to_bytes(&x)
    }

    fn chr(_, i) {
      let i = i.expect_i64("i")?;
      u32::try_from(i)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Value::from(c.to_string()))
        .ok_or_else(|| {
          ValueError::new(format!("Unicode code point {} out of range", i))
        })
    }

    fn dict(_, _recv, args) raw {
      let dict = Dict::new();
      methods::update_dict(&dict, args)?;
      Value::Dict(dict)
    }

    // Returns the names of the attributes and methods of `x`.
    fn dir(_, x) {
      methods::names(&x)
        .into_iter()
        .map(Value::from)
        .collect::<Vec<_>>()
    }

    fn enumerate(_, iterable; start) {
      let start = start.unwrap_or_default().expect_i64_or("start", 0)?;
      let values = Iter::new(&iterable)?
        .zip(start..)
        .map(|(v, i)| Value::Tuple(vec![Value::from(i), v].into()))
        .collect::<Vec<_>>();
      Value::from(values)
    }

    // Fails execution with a message built from its arguments, as `print`
    // would print them.
    fn fail(_, _recv, args) raw {
      let msg = join_args(args)?;
      Err::<Value, _>(CallError::new(msg))
    }

    fn float(_; x) {
      to_float(x.unwrap_or(Value::Float(0.0)))
    }

    fn getattr(_, x, name; default) {
      let name = name.expect::<Str>("name")?;
      let name = name.to_str_lossy();
      match (methods::getattr(&x, &name)?, default) {
        (Some(v), _) | (None, Some(v)) => Ok(v),
        (None, None) => Err(ValueError::new(format!(
          "{} has no .{} field or method",
          x.type_name(),
          name
        ))),
      }
    }

    fn hasattr(_, x, name) {
      let name = name.expect::<Str>("name")?;
      methods::getattr(&x, &name.to_str_lossy())?.is_some()
    }

    // Returns the hash of a hashable value. Equal values have equal hashes,
    // and the result is the same on every run.
    fn hash(_, x) {
      Value::from(x.hash()? as i64)
    }

    fn int(_; x, base) {
      to_int(x.unwrap_or(Value::from(0)), base)
    }

    fn len(_, x) {
      ops::len(&x).map(Value::from).ok_or_else(|| {
        ValueError::new(format!("value of type {} has no len", x.type_name()))
      })
    }

    fn list(_; iterable) {
      let values: Vec<Value> = match iterable {
        Some(it) => Iter::new(&it)?.collect(),
        None => Vec::new(),
      };
      Value::from(values)
    }

    fn max(thread, _recv, args) raw {
      extremum(thread, args, Ordering::Greater)
    }

    fn min(thread, _recv, args) raw {
      extremum(thread, args, Ordering::Less)
    }

    // Returns the Unicode code point of a one-character string, or the value
    // of a one-byte bytes.
    fn ord(_, c) {
      match &c {
        Value::String(s) => {
          let text = s.to_str_lossy();
          let mut chars = text.chars();
          match (chars.next(), chars.next()) {
            (Some(ch), None) if std::str::from_utf8(s).is_ok() => {
              Ok(Value::from(ch as i64))
            }
            _ => Err(ValueError::new(format!(
              "string encodes {} Unicode code points, want 1",
              text.chars().count()
            ))),
          }
        }
        Value::Bytes(b) if b.len() == 1 => Ok(Value::from(b[0] as i32)),
        Value::Bytes(b) => Err(ValueError::new(format!(
          "bytes has length {}, want 1",
          b.len()
        ))),
        c => Err(ValueError::new(format!(
          "got {}, want string or bytes",
          c.type_name()
        ))),
      }
    }

    // Prints its arguments, separated by `sep`, through the thread's print
    // hook.
    fn print(thread, _recv, args) raw {
      let msg = join_args(args)?;
      thread.print(&msg);
      Value::None
    }

    fn range(_, start_or_stop; stop, step) {
      let (start, stop) = match stop {
        Some(stop) => (
          start_or_stop.expect_i64("start")?,
          stop.expect_i64("stop")?,
        ),
        None => (0, start_or_stop.expect_i64("stop")?),
      };
      let step = step.unwrap_or_default().expect_i64_or("step", 1)?;
      Range::new(start, stop, step).map(Value::Range)
    }

    fn repr(_, x) {
      x.repr()
    }

    fn reversed(_, iterable) {
      let mut values = Iter::new(&iterable)?.collect::<Vec<_>>();
      values.reverse();
      Value::from(values)
    }

    fn set(_; iterable) {
      let set = match iterable {
        Some(it) => Set::from_values(Iter::new(&it)?)?,
        None => Set::new(),
      };
      Value::Set(set)
    }

    // Returns a new sorted list of the elements of `iterable`. The sort is
    // stable; `key` is called once per element.
    fn sorted(thread, iterable; key, reverse) {
      sorted(thread, &iterable, key, reverse)
    }

    fn str(_, x) {
      match x {
        x @ Value::String(_) => x,
        x => Value::from(encode::str(&x)),
      }
    }

    fn tuple(_; iterable) {
      let values = match iterable {
        Some(Value::Tuple(t)) => return Ok(Value::Tuple(t)),
        Some(it) => Iter::new(&it)?.collect::<Vec<_>>(),
        None => Vec::new(),
      };
      Value::Tuple(values.into())
    }

    fn type_ as "type"(_, x) {
      x.type_name()
    }

    fn zip(_, _recv, args) raw {
      args.no_named()?;
      let mut iters = args
        .positional
        .iter()
        .map(Iter::new)
        .collect::<Result<Vec<_>, _>>()?;
      let mut out = Vec::new();
      if !iters.is_empty() {
        'outer: loop {
          let mut row = Vec::with_capacity(iters.len());
          for iter in &mut iters {
            match iter.next() {
              Some(v) => row.push(v),
              None => break 'outer,
            }
          }
          out.push(Value::Tuple(row.into()));
        }
      }
      Value::from(out)
    }
  }
}

/// Joins `print`-style arguments: `str` of each, separated by the `sep`
/// keyword argument.
fn join_args(args: Args) -> Result<String, ValueError> {
  let [sep] = Args {
    positional: Vec::new(),
    named: args.named,
  }
  .unpack(["sep?"])?;
  let sep = match sep {
    None | Some(Value::None) => " ".to_string(),
    Some(sep) => sep.expect::<Str>("sep")?.to_str_lossy().into_owned(),
  };
  let parts = args.positional.iter().map(encode::str).collect::<Vec<_>>();
  Ok(parts.join(&sep))
}

fn to_bytes<'i>(x: &Value<'i>) -> Result<Value<'i>, ValueError> {
  match x {
    Value::Bytes(_) => Ok(x.clone()),
    Value::String(s) => Ok(Value::Bytes(s.clone())),
    x => {
      let iter = Iter::new(x).map_err(|_| {
        ValueError::new(format!(
          "got {}, want string, bytes, or iterable of ints",
          x.type_name()
        ))
      })?;
      let mut out = Vec::new();
      for (i, v) in iter.enumerate() {
        let b = match &v {
          Value::Int(n) => n.to_i64().and_then(|n| u8::try_from(n).ok()),
          _ => None,
        };
        match b {
          Some(b) => out.push(b),
          None => {
            return Err(ValueError::new(format!(
              "at index {}, {} out of range [0, 255]",
              i,
              v.repr()
            )))
          }
        }
      }
      Ok(Value::Bytes(out.into()))
    }
  }
}

fn to_float<'i>(x: Value<'i>) -> Result<Value<'i>, ValueError> {
  match &x {
    Value::Float(_) => Ok(x),
    Value::Int(i) => i.to_finite_f64().map(Value::Float),
    Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
    Value::String(s) => {
      match s.to_str_lossy().trim().parse::<f64>() {
        Ok(f) => Ok(Value::Float(f)),
        Err(_) => Err(ValueError::new(format!(
          "invalid float literal: {}",
          x.repr()
        ))),
      }
    }
    x => Err(ValueError::new(format!(
      "got {}, want number or string",
      x.type_name()
    ))),
  }
}

fn to_int<'i>(
  x: Value<'i>,
  base: Option<Value<'i>>,
) -> Result<Value<'i>, ValueError> {
  let s = match &x {
    Value::String(s) => s.clone(),
    _ if base.is_some() => {
      return Err(ValueError::new(
        "can't convert non-string with explicit base",
      ))
    }
    Value::Int(_) => return Ok(x.clone()),
    Value::Float(f) => return Int::from_f64(*f).map(Value::Int),
    Value::Bool(b) => return Ok(Value::from(*b as i32)),
    x => {
      return Err(ValueError::new(format!(
        "got {}, want int, float, bool or string",
        x.type_name()
      )))
    }
  };

  let base = base.unwrap_or_default().expect_i64_or("base", 10)?;
  if base != 0 && !(2..=36).contains(&base) {
    return Err(ValueError::new("base must be 0 or between 2 and 36"));
  }
  let invalid = || {
    ValueError::new(format!(
      "invalid literal for int() with base {}: {}",
      base,
      x.repr()
    ))
  };

  let text = s.to_str_lossy();
  let text = text.trim();
  let (negative, digits) = match text.as_bytes().first() {
    Some(b'-') => (true, &text[1..]),
    Some(b'+') => (false, &text[1..]),
    _ => (false, text),
  };

  let lower = digits.to_ascii_lowercase();
  let prefixed = |prefix: &str, radix: u32| {
    lower.starts_with(prefix) && (base == 0 || base == radix as i64)
  };
  let (radix, digits) = if prefixed("0x", 16) {
    (16, &digits[2..])
  } else if prefixed("0o", 8) {
    (8, &digits[2..])
  } else if prefixed("0b", 2) {
    (2, &digits[2..])
  } else if base == 0 {
    if digits.len() > 1 && digits.bytes().all(|b| b == b'0') {
      (10, digits)
    } else if digits.starts_with('0') && digits.len() > 1 {
      return Err(invalid());
    } else {
      (10, digits)
    }
  } else {
    (base as u32, digits)
  };

  if digits.is_empty() || digits.starts_with(['+', '-']) {
    return Err(invalid());
  }
  let n = BigInt::parse_bytes(digits.as_bytes(), radix).ok_or_else(invalid)?;
  Ok(Value::Int(Int::from_big(if negative { -n } else { n })))
}

/// Implements `max` and `min`: `want` is the ordering that makes a new
/// element replace the current best.
fn extremum<'i>(
  thread: &mut Thread<'i>,
  args: Args<'i>,
  want: Ordering,
) -> Result<Value<'i>, CallError<'i>> {
  let [key] = Args {
    positional: Vec::new(),
    named: args.named,
  }
  .unpack(["key?"])?;
  let key = key.filter(|k| !matches!(k, Value::None));

  let values = match args.positional.len() {
    0 => return Err(CallError::new("got no arguments, want at least 1")),
    1 => Iter::new(&args.positional[0])?.collect::<Vec<_>>(),
    _ => args.positional,
  };

  let mut best: Option<(Value<'i>, Value<'i>)> = None;
  for v in values {
    let k = match &key {
      Some(key) => thread.call(key, Args::positional(vec![v.clone()]))?,
      None => v.clone(),
    };
    best = match best {
      Some((bk, bv)) if compare::cmp(&k, &bk)? != want => Some((bk, bv)),
      _ => Some((k, v)),
    };
  }
  match best {
    Some((_, v)) => Ok(v),
    None => Err(CallError::new("empty sequence")),
  }
}

fn sorted<'i>(
  thread: &mut Thread<'i>,
  iterable: &Value<'i>,
  key: Option<Value<'i>>,
  reverse: Option<Value<'i>>,
) -> Result<Value<'i>, CallError<'i>> {
  let key = key.filter(|k| !matches!(k, Value::None));
  let reverse = reverse.map_or(false, |r| r.truth());

  let mut items = Vec::new();
  for v in Iter::new(iterable)?.collect::<Vec<_>>() {
    let k = match &key {
      Some(key) => thread.call(key, Args::positional(vec![v.clone()]))?,
      None => v.clone(),
    };
    items.push((k, v));
  }

  type Item<'i> = (Value<'i>, Value<'i>);
  let mut less = |x: &Item<'i>, y: &Item<'i>| -> Result<bool, ValueError> {
    let (x, y) = if reverse { (&y.0, &x.0) } else { (&x.0, &y.0) };
    Ok(compare::cmp(x, y)? == Ordering::Less)
  };
  let items = merge_sort(items, &mut less)?;
  let values = items.into_iter().map(|(_, v)| v).collect::<Vec<_>>();
  Ok(Value::from(values))
}

/// A stable merge sort with a fallible comparison.
fn merge_sort<T>(
  mut items: Vec<T>,
  less: &mut dyn FnMut(&T, &T) -> Result<bool, ValueError>,
) -> Result<Vec<T>, ValueError> {
  if items.len() < 2 {
    return Ok(items);
  }
  let right = items.split_off(items.len() / 2);
  let left = merge_sort(items, less)?;
  let right = merge_sort(right, less)?;

  let mut out = Vec::with_capacity(left.len() + right.len());
  let mut left = left.into_iter().peekable();
  let mut right = right.into_iter().peekable();
  loop {
    let take_right = match (left.peek(), right.peek()) {
      (Some(l), Some(r)) => less(r, l)?,
      (Some(_), None) => false,
      (None, Some(_)) => true,
      (None, None) => break,
    };
    out.extend(if take_right { right.next() } else { left.next() });
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::eval::StringDict;
  use crate::syn;
  use pretty_assertions::assert_eq;
  use std::path::Path;

  /// Evaluates the expression `src`, returning its repr or the error
  /// message.
  fn eval(src: &str) -> String {
    let arena = syn::Arena::new();
    let src = arena.alloc_string(src.to_string());
    let mut thread = Thread::new("test");
    let out = match crate::eval::eval(
      &mut thread,
      Path::new("stdlib.kes"),
      src,
      syn::Dialect::default(),
      &StringDict::new(),
      &arena,
    ) {
      Ok(v) => v.repr(),
      Err(crate::eval::error::Error::Eval(e)) => e.message,
      Err(e) => e.to_string(),
    };
    out
  }

  #[test]
  fn universe_names() {
    assert!(is_universal("len"));
    assert!(is_universal("None"));
    assert!(!is_universal("struct"));
    assert!(matches!(universe("True"), Some(Value::Bool(true))));
  }

  #[test]
  fn conversions() {
    assert_eq!(eval("int('0x1f', 0)"), "31");
    assert_eq!(eval("int('-42')"), "-42");
    assert_eq!(eval("int('ff', 16)"), "255");
    assert_eq!(eval("int(3.9)"), "3");
    assert_eq!(
      eval("int('012', 0)"),
      r#"int: invalid literal for int() with base 0: "012""#
    );
    assert_eq!(eval("float('1e3')"), "1000.0");
    assert_eq!(eval("float('-inf')"), "-inf");
    assert_eq!(eval("str(1) + repr('a')"), r#""1\"a\"""#);
    assert_eq!(eval("bytes([104, 105])"), r#"b"hi""#);
    assert_eq!(eval("chr(937) + str(ord('Ω'))"), r#""Ω937""#);
    assert_eq!(eval("bool([]) or bool(1)"), "True");
    assert_eq!(eval("type(range(3))"), r#""range""#);
  }

  #[test]
  fn collections() {
    assert_eq!(eval("len('abc') + len([1]) + len({})"), "4");
    assert_eq!(eval("len(1)"), "len: value of type int has no len");
    assert_eq!(eval("list(range(1, 10, 3))"), "[1, 4, 7]");
    assert_eq!(eval("tuple([1])"), "(1,)");
    assert_eq!(eval("dict([('a', 1)], b=2)"), r#"{"a": 1, "b": 2}"#);
    assert_eq!(eval("enumerate('ab'.elems(), 1)"), r#"[(1, "a"), (2, "b")]"#);
    assert_eq!(eval("zip([1, 2], 'ab'.elems(), [3])"), r#"[(1, "a", 3)]"#);
    assert_eq!(eval("reversed([1, 2])"), "[2, 1]");
    assert_eq!(eval("sorted(set([3, 1, 2]))"), "[1, 2, 3]");
    assert_eq!(eval("any([0, 1]) and not all([0, 1])"), "True");
  }

  #[test]
  fn sorting_and_extrema() {
    assert_eq!(
      eval("sorted(['bb', 'a', 'ccc', 'dd'], key=len)"),
      r#"["a", "bb", "dd", "ccc"]"#
    );
    assert_eq!(
      eval(
        "sorted([(1, 'x'), (0, 'y'), (1, 'a')], \
         key=lambda p: p[0], reverse=True)"
      ),
      r#"[(1, "x"), (1, "a"), (0, "y")]"#
    );
    assert_eq!(
      eval("sorted([1, 'a'])"),
      "sorted: string < int not implemented"
    );
    assert_eq!(eval("max([1, 3, 2])"), "3");
    assert_eq!(eval("min(4, 2, 8)"), "2");
    assert_eq!(eval("max(['aa', 'b'], key=len)"), r#""aa""#);
    assert_eq!(eval("min([])"), "min: empty sequence");
  }

  #[test]
  fn attributes() {
    assert_eq!(eval("hasattr([], 'append')"), "True");
    assert_eq!(eval("getattr('a', 'upper')()"), r#""A""#);
    assert_eq!(eval("getattr(1, 'x', 2)"), "2");
    assert_eq!(eval("dir({})[0]"), r#""clear""#);
    assert_eq!(eval("fail('x', 1)"), "fail: x 1");
  }
}
