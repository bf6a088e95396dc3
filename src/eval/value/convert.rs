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

//! Traits for converting between Rust types and Kestrel values.

use crate::eval::error::CallError;
use crate::eval::error::ValueError;
use crate::eval::value::Builtin;
use crate::eval::value::Dict;
use crate::eval::value::Function;
use crate::eval::value::Int;
use crate::eval::value::List;
use crate::eval::value::Set;
use crate::eval::value::Str;
use crate::eval::value::Tuple;
use crate::eval::value::Value;

/// Represents a type that can be converted into a `Value`.
///
/// This trait mostly exists to be different from `Into` to avoid coherence
/// issues, and `Into::into()` should generally be preferred instead.
pub trait IntoValue<'i> {
  fn into_value(self) -> Value<'i>;
}

impl<'i, T: IntoValue<'i>> From<T> for Value<'i> {
  #[inline]
  fn from(x: T) -> Self {
    x.into_value()
  }
}

macro_rules! into_value {
  ($($ty:ty => |$x:ident| $e:expr,)*) => {$(
    impl<'i> IntoValue<'i> for $ty {
      fn into_value(self) -> Value<'i> {
        let $x = self;
        $e
      }
    }
  )*};
}

into_value! {
  () => |_x| Value::None,
  bool => |x| Value::Bool(x),
  i32 => |x| Value::Int(Int::Small(x)),
  i64 => |x| Value::Int(Int::from_i64(x)),
  usize => |x| Value::Int(Int::from(x)),
  Int => |x| Value::Int(x),
  f64 => |x| Value::Float(x),
  String => |x| Value::String(Str::from_string(x)),
  &'i str => |x| Value::String(Str::from_static(x)),
  Str<'i> => |x| Value::String(x),
  Vec<Value<'i>> => |x| Value::List(List::new(x)),
  List<'i> => |x| Value::List(x),
  Tuple<'i> => |x| Value::Tuple(x),
  Dict<'i> => |x| Value::Dict(x),
  Set<'i> => |x| Value::Set(x),
  Function<'i> => |x| Value::Function(x),
  Builtin<'i> => |x| Value::Builtin(x),
}

impl<'i, T: IntoValue<'i>> IntoValue<'i> for Option<T> {
  fn into_value(self) -> Value<'i> {
    match self {
      Some(x) => x.into_value(),
      None => Value::None,
    }
  }
}

/// Represents a type that can be converted into a `Result<Value>`.
///
/// This trait mostly exists to be different from `Into` to avoid coherence
/// issues. It is exclusively used by `native_fn!()`.
#[doc(hidden)]
pub trait IntoValueResult<'i> {
  fn into_value_result(self) -> Result<Value<'i>, CallError<'i>>;
}

impl<'i, I> IntoValueResult<'i> for I
where
  I: IntoValue<'i>,
{
  fn into_value_result(self) -> Result<Value<'i>, CallError<'i>> {
    Ok(self.into_value())
  }
}

impl<'i> IntoValueResult<'i> for Value<'i> {
  fn into_value_result(self) -> Result<Value<'i>, CallError<'i>> {
    Ok(self)
  }
}

impl<'i> IntoValueResult<'i> for Result<Value<'i>, CallError<'i>> {
  fn into_value_result(self) -> Result<Value<'i>, CallError<'i>> {
    self
  }
}

impl<'i> IntoValueResult<'i> for Result<Value<'i>, ValueError> {
  fn into_value_result(self) -> Result<Value<'i>, CallError<'i>> {
    self.map_err(CallError::Value)
  }
}

/// Represents a type that a `Value` can be checked and converted into, for
/// unpacking builtin arguments.
pub trait FromValue<'i>: Sized {
  /// The type name used in error messages.
  const TYPE: &'static str;

  /// Converts `value`, or returns `None` if it has the wrong type.
  fn from_value(value: &Value<'i>) -> Option<Self>;
}

macro_rules! from_value {
  ($($ty:ty, $name:literal => |$v:ident| $e:expr,)*) => {$(
    impl<'i> FromValue<'i> for $ty {
      const TYPE: &'static str = $name;

      fn from_value($v: &Value<'i>) -> Option<Self> {
        $e
      }
    }
  )*};
}

from_value! {
  Value<'i>, "value" => |v| Some(v.clone()),
  bool, "bool" => |v| match v {
    Value::Bool(b) => Some(*b),
    _ => None,
  },
  Int, "int" => |v| match v {
    Value::Int(i) => Some(i.clone()),
    _ => None,
  },
  f64, "float or int" => |v| match v {
    Value::Float(f) => Some(*f),
    Value::Int(i) => Some(i.to_f64()),
    _ => None,
  },
  Str<'i>, "string" => |v| match v {
    Value::String(s) => Some(s.clone()),
    _ => None,
  },
  List<'i>, "list" => |v| match v {
    Value::List(l) => Some(l.clone()),
    _ => None,
  },
  Tuple<'i>, "tuple" => |v| match v {
    Value::Tuple(t) => Some(t.clone()),
    _ => None,
  },
  Dict<'i>, "dict" => |v| match v {
    Value::Dict(d) => Some(d.clone()),
    _ => None,
  },
  Set<'i>, "set" => |v| match v {
    Value::Set(s) => Some(s.clone()),
    _ => None,
  },
}

impl<'i> Value<'i> {
  /// Converts this value for the parameter `param`, failing with a message
  /// like `for parameter x: got string, want int`.
  pub fn expect<T: FromValue<'i>>(&self, param: &str) -> Result<T, ValueError> {
    T::from_value(self).ok_or_else(|| {
      ValueError::new(format!(
        "for parameter {}: got {}, want {}",
        param,
        self.type_name(),
        T::TYPE
      ))
    })
  }

  /// Converts this value to an `i64`, for parameters that are indices or
  /// counts.
  pub fn expect_i64(&self, param: &str) -> Result<i64, ValueError> {
    self.expect::<Int>(param)?.to_i64().ok_or_else(|| {
      ValueError::new(format!("for parameter {}: int out of range", param))
    })
  }

  /// Like `expect_i64`, but `None` selects `default`.
  pub fn expect_i64_or(
    &self,
    param: &str,
    default: i64,
  ) -> Result<i64, ValueError> {
    match self {
      Value::None => Ok(default),
      v => v.expect_i64(param),
    }
  }

  /// Returns the text of a string value.
  pub fn as_str(&self) -> Option<&[u8]> {
    match self {
      Value::String(s) => Some(s.as_sliced()),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn expect_reports_types() {
    let v = Value::from("x");
    assert_eq!(
      v.expect::<Int>("n").unwrap_err().to_string(),
      "for parameter n: got string, want int"
    );
    assert_eq!(Value::from(3).expect::<f64>("f").unwrap(), 3.0);
    assert_eq!(Value::None.expect_i64_or("n", -1).unwrap(), -1);
  }
}
