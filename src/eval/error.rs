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

//! Errors raised while evaluating Kestrel.

use std::fmt;

use crate::eval::Thread;
use crate::syn::ParseError;
use crate::syn::ResolveError;
use crate::syn::Span;

/// An error from a value-level operation, without position information.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValueError(pub String);

impl ValueError {
  pub fn new(message: impl Into<String>) -> Self {
    ValueError(message.into())
  }

  /// Prefixes this error's message with `context: `.
  pub fn context(self, context: impl fmt::Display) -> Self {
    ValueError(format!("{}: {}", context, self.0))
  }
}

/// An `EvalError` is any error raised during evaluation; it records an error
/// message and a snapshot of the call stack at the point of failure.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct EvalError<'i> {
  pub message: String,
  /// The call stack, outermost frame first.
  pub trace: Vec<CallFrame<'i>>,
}

/// One entry of an `EvalError`'s call stack.
#[derive(Clone, Debug)]
pub struct CallFrame<'i> {
  /// The function name, or `<toplevel>`.
  pub name: String,
  /// The position being evaluated in this frame.
  pub pos: Span<'i>,
}

impl fmt::Display for CallFrame<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.pos.is_synthetic() {
      write!(f, "{}:1: in {}", self.pos.file_name().display(), self.name)
    } else {
      write!(f, "{}: in {}", self.pos, self.name)
    }
  }
}

impl<'i> EvalError<'i> {
  /// Creates a new `EvalError`, recording an error at the given span in the
  /// innermost frame of `thread`.
  pub fn new(thread: &Thread<'i>, span: Span<'i>, message: String) -> Self {
    let mut trace = thread.call_stack();
    if let Some(top) = trace.last_mut() {
      if !top.pos.is_synthetic() || span.is_synthetic() {
        top.pos = span;
      }
    } else {
      trace.push(CallFrame {
        name: "<toplevel>".to_string(),
        pos: span,
      });
    }
    EvalError { message, trace }
  }

  /// Returns the position of the innermost frame.
  pub fn position(&self) -> Option<Span<'i>> {
    self.trace.last().map(|f| f.pos)
  }

  /// Renders a Python-style traceback, ending in `Error: <message>`.
  pub fn backtrace(&self) -> String {
    let mut buf = String::from("Traceback (most recent call last):\n");
    for frame in &self.trace {
      buf.push_str(&format!("  {}\n", frame));
    }
    buf.push_str("Error: ");
    buf.push_str(&self.message);
    buf
  }
}

/// The error type of builtin functions.
///
/// A `Value` error is positioned at the call site by the caller; an `Eval`
/// error already carries a stack, and passes through untouched.
#[derive(Clone, Debug)]
pub enum CallError<'i> {
  Value(ValueError),
  Eval(EvalError<'i>),
}

impl<'i> CallError<'i> {
  pub fn new(message: impl Into<String>) -> Self {
    CallError::Value(ValueError::new(message))
  }
}

impl From<ValueError> for CallError<'_> {
  fn from(e: ValueError) -> Self {
    CallError::Value(e)
  }
}

impl<'i> From<EvalError<'i>> for CallError<'i> {
  fn from(e: EvalError<'i>) -> Self {
    CallError::Eval(e)
  }
}

impl fmt::Display for CallError<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      CallError::Value(e) => write!(f, "{}", e),
      CallError::Eval(e) => write!(f, "{}", e),
    }
  }
}

/// A failure to load a module.
///
/// `LoadError`s are shared by every thread waiting on the same module, so
/// they own their text rather than borrowing source spans.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LoadError {
  pub message: String,
  /// The rendered backtrace, if the module failed during evaluation.
  pub backtrace: Option<String>,
}

impl LoadError {
  pub fn new(message: impl Into<String>) -> Self {
    LoadError {
      message: message.into(),
      backtrace: None,
    }
  }
}

impl<'i> From<Error<'i>> for LoadError {
  fn from(e: Error<'i>) -> Self {
    match e {
      Error::Eval(e) => LoadError {
        message: e.message.clone(),
        backtrace: Some(e.backtrace()),
      },
      e => LoadError::new(e.to_string()),
    }
  }
}

/// Any error produced by parsing, resolving or evaluating a file.
#[derive(Debug, thiserror::Error)]
pub enum Error<'i> {
  #[error("{0}")]
  Syntax(ParseError<'i>),
  #[error("{0}")]
  Resolve(ResolveError<'i>),
  #[error("{}", .0.backtrace())]
  Eval(EvalError<'i>),
}

impl<'i> From<ParseError<'i>> for Error<'i> {
  fn from(e: ParseError<'i>) -> Self {
    Error::Syntax(e)
  }
}

impl<'i> From<ResolveError<'i>> for Error<'i> {
  fn from(e: ResolveError<'i>) -> Self {
    Error::Resolve(e)
  }
}

impl<'i> From<EvalError<'i>> for Error<'i> {
  fn from(e: EvalError<'i>) -> Self {
    Error::Eval(e)
  }
}

/// Generates, and returns, an `EvalError` given a `Thread`, a `Spanned`, and
/// a formatted message.
macro_rules! error {
  ($thread:expr, $expr:expr, $($tt:tt)*) => {{
    #[allow(unused_imports)]
    use $crate::syn::Spanned;
    return Err($crate::eval::error::EvalError::new(
      $thread,
      $expr.span(),
      format!($($tt)*),
    ).into())
  }}
}

/// Panics on a violated interpreter invariant.
macro_rules! bug {
  ($($tt:tt)*) => {{
    panic!(
      "internal interpreter error; this is a bug: {}",
      format!($($tt)*)
    )
  }}
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use std::path::Path;

  #[test]
  fn synthetic_frames() {
    let frame = CallFrame {
      name: "len".to_string(),
      pos: Span::synthetic(Path::new("<builtin>")),
    };
    assert_eq!(frame.to_string(), "<builtin>:1: in len");
  }

  #[test]
  fn value_error_context() {
    let e = ValueError::new("missing argument for x").context("f");
    assert_eq!(e.to_string(), "f: missing argument for x");
  }
}
