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

//! Macros for creating native functions.

/// Generates a `BuiltinFn`, saving significant boilerplate.
///
/// Syntax is as follows:
/// ```ignore
/// native_fn!((thread, x, y; z) {
///   // `thread` is the current `Thread`, and may be `_`.
///   // `x` and `y` are required `Value`s; `z` is an optional
///   // `Option<Value>`. All of them may also be passed by name.
/// })
///
/// native_fn!((thread, recv: List, x) {
///   // A method: `recv` is the receiver, a `&List`.
/// })
///
/// native_fn!((thread, recv, args) raw {
///   // `recv` is the optional receiver and `args` the unparsed `Args`.
/// })
/// ```
///
/// Argument-count and keyword errors are produced automatically. The body
/// may have any type which can be converted to a `Value` (by
/// `IntoValueResult`), or it can explictly `return` a `Result`.
#[macro_export]
macro_rules! native_fn {
  (($thread:tt, $recv:tt, $args:tt) raw $block:block) => {{
    let f: $crate::eval::value::BuiltinFn = |thread, recv, args| {
      #[allow(unused_variables)]
      let ($thread, $recv, $args) = (thread, recv, args);
      $crate::eval::value::convert::IntoValueResult::into_value_result($block)
    };
    f
  }};

  (($thread:tt, $recv:ident: $ty:ident $(, $req:ident)*
    $(; $($opt:ident),*)?) $block:block) => {{
    let f: $crate::eval::value::BuiltinFn = |thread, recv, args| {
      let $recv = match recv {
        Some($crate::eval::value::Value::$ty(x)) => x,
        _ => {
          return Err($crate::eval::error::CallError::new(format!(
            "receiver must be a {}",
            stringify!($ty)
          )))
        }
      };
      native_fn!(@body thread, args, $thread,
        ($($req)*), ($($($opt)*)?), $block)
    };
    f
  }};

  (($thread:tt $(, $req:ident)* $(; $($opt:ident),*)?) $block:block) => {{
    let f: $crate::eval::value::BuiltinFn = |thread, _, args| {
      native_fn!(@body thread, args, $thread,
        ($($req)*), ($($($opt)*)?), $block)
    };
    f
  }};

  (@body $th:ident, $args:ident, $thread:tt,
    ($($req:ident)*), ($($opt:ident)*), $block:block) => {{
    #[allow(unused_mut, unused_variables)]
    let mut values = $args
      .unpack([
        $(stringify!($req),)*
        $(concat!(stringify!($opt), "?"),)*
      ])?
      .into_iter();
    // `unpack` guarantees that every required parameter is present.
    $(let $req = values.next().flatten().unwrap_or_default();)*
    $(let $opt = values.next().flatten();)*
    #[allow(unused_variables)]
    let $thread = $th;
    $crate::eval::value::convert::IntoValueResult::into_value_result($block)
  }};
}

/// Generates a lookup table of builtins, as a `match` over `$key` that
/// evaluates to an `Option<Builtin>`.
///
/// Each entry is `fn name(params) { body }`, with `params` as in
/// `native_fn!()`; `fn name as "text"(...)` registers the builtin under a
/// name that is not a Rust identifier.
#[macro_export]
macro_rules! stdlib {
  ($key:expr => $(
    fn $name:ident $(as $alias:literal)? ($($args:tt)*) $($raw:ident)?
      $body:block
  )*) => {
    match $key {
      $(stdlib!(@name $name $($alias)?) => Some(
        $crate::eval::value::Builtin::new(
          stdlib!(@name $name $($alias)?),
          native_fn!(($($args)*) $($raw)? $body),
        ),
      ),)*
      _ => None,
    }
  };

  (@name $name:ident) => {
    stringify!($name)
  };
  (@name $name:ident $alias:literal) => {
    $alias
  };
}
