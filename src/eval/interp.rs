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

//! String interpolation: the `%` operator on strings.

use std::char;

use crate::eval::encode;
use crate::eval::error::ValueError;
use crate::eval::value::Int;
use crate::eval::value::Str;
use crate::eval::value::Value;

/// Evaluates `fmt % arg`.
///
/// A tuple supplies one positional argument per directive; any other value
/// is a single argument. `%(name)s` directives look `name` up in a dict.
/// Flags, widths and precisions are not supported.
pub fn format<'i>(
  fmt: &[u8],
  arg: &Value<'i>,
) -> Result<Value<'i>, ValueError> {
  let positional = match arg {
    Value::Tuple(t) => &t[..],
    _ => std::slice::from_ref(arg),
  };

  let mut buf = Vec::with_capacity(fmt.len());
  let mut index = 0;
  let mut rest = fmt;
  loop {
    let i = match rest.iter().position(|&b| b == b'%') {
      Some(i) => i,
      None => {
        buf.extend_from_slice(rest);
        break;
      }
    };
    buf.extend_from_slice(&rest[..i]);
    rest = &rest[i + 1..];

    if rest.first() == Some(&b'%') {
      buf.push(b'%');
      rest = &rest[1..];
      continue;
    }

    let value = if rest.first() == Some(&b'(') {
      let close = rest
        .iter()
        .position(|&b| b == b')')
        .ok_or_else(|| ValueError::new("incomplete format key"))?;
      let key = &rest[1..close];
      rest = &rest[close + 1..];
      let dict = match arg {
        Value::Dict(d) => d,
        _ => return Err(ValueError::new("format requires a mapping")),
      };
      let key = Value::String(Str::from(key.to_vec()));
      match dict.get(&key)? {
        Some(v) => v,
        None => {
          return Err(ValueError::new(format!("key not found: {}", key)))
        }
      }
    } else {
      match positional.get(index) {
        Some(v) => v.clone(),
        None => {
          return Err(ValueError::new(
            "not enough arguments for format string",
          ))
        }
      }
    };

    let conv = match rest.first() {
      Some(&c) => c,
      None => return Err(ValueError::new("incomplete format")),
    };
    rest = &rest[1..];
    directive(&mut buf, conv, &value)?;
    index += 1;
  }

  if index < positional.len() && !matches!(arg, Value::Dict(_)) {
    return Err(ValueError::new("too many arguments for format string"));
  }
  Ok(Value::String(buf.into()))
}

/// Formats one argument according to the conversion character `conv`.
fn directive(
  buf: &mut Vec<u8>,
  conv: u8,
  value: &Value,
) -> Result<(), ValueError> {
  match conv {
    b's' => match value {
      Value::String(s) => buf.extend_from_slice(s),
      v => buf.extend_from_slice(encode::str(v).as_bytes()),
    },
    b'r' => buf.extend_from_slice(encode::repr(value).as_bytes()),
    b'd' | b'i' | b'o' | b'x' | b'X' => {
      let int = match value {
        Value::Int(i) => i.clone(),
        Value::Float(f) => Int::from_f64(f.trunc()).map_err(|e| {
          e.context(format_args!("%{} format requires integer", conv as char))
        })?,
        v => {
          return Err(ValueError::new(format!(
            "%{} format requires integer: got {}",
            conv as char,
            v.type_name()
          )))
        }
      };
      let text = match conv {
        b'o' => int.to_str_radix(8),
        b'x' => int.to_str_radix(16),
        b'X' => int.to_str_radix(16).to_uppercase(),
        _ => int.to_string(),
      };
      buf.extend_from_slice(text.as_bytes());
    }
    b'e' | b'f' | b'g' | b'E' | b'F' | b'G' => {
      let f = match value {
        Value::Float(f) => *f,
        Value::Int(i) => i.to_f64(),
        v => {
          return Err(ValueError::new(format!(
            "%{} format requires float, not {}",
            conv as char,
            v.type_name()
          )))
        }
      };
      buf.extend_from_slice(encode::float(f, conv as char).as_bytes());
    }
    b'c' => {
      let c = match value {
        Value::Int(i) => i
          .to_i64()
          .and_then(|i| u32::try_from(i).ok())
          .and_then(char::from_u32)
          .ok_or_else(|| {
            ValueError::new(format!(
              "%c format requires a valid Unicode code point, got {}",
              i
            ))
          })?,
        Value::String(s) => match std::str::from_utf8(s) {
          Ok(s) if s.chars().count() == 1 => s.chars().next().unwrap_or('?'),
          _ => {
            return Err(ValueError::new(
              "%c format requires a single-character string",
            ))
          }
        },
        v => {
          return Err(ValueError::new(format!(
            "%c format requires int or single-character string, not {}",
            v.type_name()
          )))
        }
      };
      let mut utf8 = [0; 4];
      buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }
    c => {
      return Err(ValueError::new(format!(
        "unknown conversion %{}",
        c as char
      )))
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::eval::value::Dict;
  use pretty_assertions::assert_eq;

  fn fmt(f: &str, arg: Value) -> String {
    match format(f.as_bytes(), &arg) {
      Ok(v) => v.to_string(),
      Err(e) => format!("error: {}", e),
    }
  }

  fn tuple<'i>(values: Vec<Value<'i>>) -> Value<'i> {
    Value::Tuple(values.into())
  }

  #[test]
  fn directives() {
    let a = tuple(vec!["a".into(), "a".into()]);
    assert_eq!(fmt("%s|%r", a), r#"a|"a""#);
    assert_eq!(fmt("%d%%", Value::from(50)), "50%");
    let n = tuple(vec![255.into(), 255.into(), 8.into()]);
    assert_eq!(fmt("%x %X %o", n), "ff FF 10");
    assert_eq!(fmt("%d", Value::Float(-2.7)), "-2");
    assert_eq!(fmt("%g", Value::Float(1e20)), "1e+20");
    assert_eq!(fmt("%c%c", tuple(vec![65.into(), "Ω".into()])), "AΩ");
    let list = Value::from(vec![Value::from(1)]);
    assert_eq!(fmt("%s", tuple(vec![list])), "[1]");
  }

  #[test]
  fn named() {
    let d = Dict::new();
    d.insert("x".into(), 1.into()).unwrap();
    assert_eq!(fmt("%(x)d-%(x)r", Value::Dict(d.clone())), "1-1");
    assert_eq!(fmt("%(y)s", Value::Dict(d)), "error: key not found: y");
    assert_eq!(
      fmt("%(y)s", Value::from(1)),
      "error: format requires a mapping"
    );
  }

  #[test]
  fn argument_count() {
    assert_eq!(
      fmt("%s %s", Value::from(1)),
      "error: not enough arguments for format string"
    );
    assert_eq!(
      fmt("%s", tuple(vec![1.into(), 2.into()])),
      "error: too many arguments for format string"
    );
    assert_eq!(fmt("%q", Value::from(1)), "error: unknown conversion %q");
    assert_eq!(fmt("%", Value::from(1)), "error: incomplete format");
  }
}
