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

//! Textual encodings of Kestrel values: `str()` and `repr()`.

use std::collections::HashSet;
use std::fmt::Write;

use crate::eval::escaping;
use crate::eval::value::Value;

/// Returns the `str()` of `val`: strings and bytes are written without
/// quotes, everything else as by `repr()`.
pub fn str(val: &Value) -> String {
  match val {
    Value::String(s) | Value::Bytes(s) => s.to_str_lossy().into_owned(),
    v => repr(v),
  }
}

/// Returns the `repr()` of `val`.
pub fn repr(val: &Value) -> String {
  let mut encoder = Encoder::new();
  encoder.encode(val);
  encoder.buf
}

/// An `Encoder` gradually constructs the textual representation of a value,
/// replacing references back into a container that is still being encoded
/// with an ellipsis.
struct Encoder {
  buf: String,
  cycle_detector: HashSet<usize>,
}

impl Encoder {
  fn new() -> Self {
    Encoder {
      buf: String::new(),
      cycle_detector: HashSet::new(),
    }
  }

  /// Call `f` with `ptr` marked as "visited", or write `cycle` if it already
  /// is.
  fn with_indirection(
    &mut self,
    ptr: usize,
    cycle: &str,
    f: impl FnOnce(&mut Self),
  ) {
    if !self.cycle_detector.insert(ptr) {
      self.buf.push_str(cycle);
      return;
    }
    f(self);
    self.cycle_detector.remove(&ptr);
  }

  fn encode_all<'a, 'i: 'a>(
    &mut self,
    vals: impl IntoIterator<Item = &'a Value<'i>>,
  ) {
    for (i, v) in vals.into_iter().enumerate() {
      if i != 0 {
        self.buf.push_str(", ");
      }
      self.encode(v);
    }
  }

  fn encode(&mut self, val: &Value) {
    match val {
      Value::None => self.buf.push_str("None"),
      Value::Bool(true) => self.buf.push_str("True"),
      Value::Bool(false) => self.buf.push_str("False"),
      Value::Int(i) => {
        let _ = write!(self.buf, "{}", i);
      }
      Value::Float(f) => self.buf.push_str(&float(*f, 'g')),
      Value::String(s) => escaping::escape_string(s, &mut self.buf),
      Value::Bytes(s) => escaping::escape_bytes(s, &mut self.buf),
      Value::List(l) => self.with_indirection(l.addr(), "[...]", |this| {
        this.buf.push('[');
        this.encode_all(l.read().iter());
        this.buf.push(']');
      }),
      Value::Tuple(t) => {
        self.buf.push('(');
        self.encode_all(t.iter());
        if t.len() == 1 {
          self.buf.push(',');
        }
        self.buf.push(')');
      }
      Value::Dict(d) => self.with_indirection(d.addr(), "{...}", |this| {
        this.buf.push('{');
        for (i, (k, v)) in d.read().iter().enumerate() {
          if i != 0 {
            this.buf.push_str(", ");
          }
          this.encode(k.value());
          this.buf.push_str(": ");
          this.encode(v);
        }
        this.buf.push('}');
      }),
      Value::Set(s) => {
        self.buf.push_str("set([");
        self.encode_all(s.read().iter().map(|k| k.value()));
        self.buf.push_str("])");
      }
      Value::Function(f) => {
        let _ = write!(self.buf, "<function {}>", f.name());
      }
      Value::Builtin(b) => {
        let _ = write!(self.buf, "{:?}", b);
      }
      Value::Range(r) => {
        let _ = write!(self.buf, "{}", r);
      }
      Value::Extension(e) => {
        let ptr = std::sync::Arc::as_ptr(e) as *const () as usize;
        self.with_indirection(ptr, "...", |this| e.display(&mut this.buf))
      }
    }
  }
}

/// Formats a float. `conv` is one of `eEfFgG`, as in `%`-interpolation.
///
/// The `g` forms use the shortest representation that reads back as the
/// same value, and always include a `.` or an exponent so that the result
/// is self-evidently a float.
pub fn float(f: f64, conv: char) -> String {
  if f.is_nan() {
    return "nan".into();
  }
  if f.is_infinite() {
    return if f > 0.0 { "+inf" } else { "-inf" }.into();
  }

  let upper = conv.is_ascii_uppercase();
  let out = match conv.to_ascii_lowercase() {
    'e' => fix_exponent(&format!("{:.6e}", f)),
    'f' => format!("{:.6}", f),
    _ => {
      let sci = format!("{:e}", f);
      let exp = sci
        .rsplit_once('e')
        .and_then(|(_, e)| e.parse::<i32>().ok())
        .unwrap_or(0);
      if !(-4..6).contains(&exp) && f != 0.0 {
        fix_exponent(&sci)
      } else {
        let mut s = format!("{}", f);
        if !s.contains('.') {
          s.push_str(".0");
        }
        s
      }
    }
  };
  if upper {
    out.to_ascii_uppercase()
  } else {
    out
  }
}

/// Rewrites Rust's `1.5e7` exponent form as `1.5e+07`.
fn fix_exponent(s: &str) -> String {
  match s.rsplit_once('e') {
    Some((mantissa, exp)) => {
      let (sign, digits) = match exp.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exp),
      };
      format!("{}e{}{:0>2}", mantissa, sign, digits)
    }
    None => s.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::eval::value::Dict;
  use crate::eval::value::List;
  use crate::eval::value::Tuple;
  use pretty_assertions::assert_eq;

  #[test]
  fn floats() {
    assert_eq!(float(1.0, 'g'), "1.0");
    assert_eq!(float(-0.0, 'g'), "-0.0");
    assert_eq!(float(0.1, 'g'), "0.1");
    assert_eq!(float(123456.0, 'g'), "123456.0");
    assert_eq!(float(1234567.0, 'g'), "1.234567e+06");
    assert_eq!(float(1e100, 'g'), "1e+100");
    assert_eq!(float(0.00001, 'g'), "1e-05");
    assert_eq!(float(1.5, 'e'), "1.500000e+00");
    assert_eq!(float(1.5, 'E'), "1.500000E+00");
    assert_eq!(float(2.0 / 3.0, 'f'), "0.666667");
    assert_eq!(float(f64::INFINITY, 'g'), "+inf");
    assert_eq!(float(f64::NAN, 'f'), "nan");
  }

  #[test]
  fn containers() {
    let one: Tuple = vec![Value::from(1)].into();
    assert_eq!(repr(&Value::Tuple(one)), "(1,)");

    let d = Dict::new();
    d.insert(Value::from("k"), Value::Bytes(vec![0u8].into()))
      .unwrap();
    assert_eq!(repr(&Value::Dict(d)), r#"{"k": b"\x00"}"#);

    let l = List::new(vec![Value::from(1)]);
    l.push(Value::List(l.clone())).unwrap();
    assert_eq!(repr(&Value::List(l)), "[1, [...]]");
  }

  #[test]
  fn str_is_unquoted() {
    assert_eq!(str(&Value::from("a\"b")), "a\"b");
    assert_eq!(repr(&Value::from("a\"b")), r#""a\"b""#);
  }
}
