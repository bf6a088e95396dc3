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

//! Conformance tests for the interpreter.
//!
//! A conformance test is a Kestrel file, which is parsed, resolved and
//! executed; it fails if execution fails.
//!
//! Tests get access to assertions by loading the magic `assert.kes` module:
//! ```text
//! load("assert.kes", "assert")
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::eval;
use crate::eval::error::CallError;
use crate::eval::error::LoadError;
use crate::eval::error::ValueError;
use crate::eval::ops;
use crate::eval::value::compare;
use crate::eval::value::Args;
use crate::eval::value::Builtin;
use crate::eval::value::Extension;
use crate::eval::value::Str;
use crate::eval::value::Value;
use crate::eval::LoadResult;
use crate::eval::StringDict;
use crate::eval::Thread;
use crate::syn;

const ASSERT_MODULE: &str = "assert.kes";

/// Macro for generating conformance tests.
macro_rules! conf_test {
  ($test_name:ident) => {
    #[test]
    fn $test_name() {
      conformance_test(
        concat!(stringify!($test_name), ".kes"),
        include_str!(concat!(stringify!($test_name), ".kes")),
      )
    }
  };
}

/// The `assert` value.
#[derive(Debug)]
struct Assert;

const ASSERTIONS: &[&str] =
  &["contains", "eq", "fail", "fails", "freeze", "ne", "true"];

impl<'i> Extension<'i> for Assert {
  fn type_name(&self) -> &'static str {
    "assert"
  }

  fn attr(&self, name: &str) -> Result<Option<Value<'i>>, ValueError> {
    Ok(assertion(name).map(Value::Builtin))
  }

  fn attr_names(&self) -> Vec<String> {
    ASSERTIONS.iter().map(|s| s.to_string()).collect()
  }
}

fn assertion<'i>(name: &str) -> Option<Builtin<'i>> {
  stdlib! { name =>
    fn contains(_, container, x) {
      if !ops::contains(&container, &x)? {
        return Err(CallError::new(format!(
          "{} does not contain {}",
          container.repr(),
          x.repr()
        )));
      }
      Value::None
    }

    fn eq(_, x, y) {
      if !compare::equals(&x, &y)? {
        return Err(CallError::new(format!("{} != {}", x.repr(), y.repr())));
      }
      Value::None
    }

    fn fail(_, msg) {
      Err::<Value, _>(CallError::new(eval::encode::str(&msg)))
    }

    // Calls `f`, which must fail with an error containing `pattern`.
    fn fails(thread, f, pattern) {
      let pattern = pattern.expect::<Str>("pattern")?;
      let pattern = pattern.to_str_lossy();
      match thread.call(&f, Args::default()) {
        Ok(_) => Err(CallError::new(format!(
          "evaluation succeeded unexpectedly (want error containing {:?})",
          pattern
        ))),
        Err(e) if e.message.contains(&*pattern) => Ok(Value::None),
        Err(e) => Err(CallError::new(format!(
          "error {:?} does not contain {:?}",
          e.message, pattern
        ))),
      }
    }

    fn freeze(_, x) {
      x.freeze();
      x
    }

    fn ne(_, x, y) {
      if compare::equals(&x, &y)? {
        return Err(CallError::new(format!("{} == {}", x.repr(), y.repr())));
      }
      Value::None
    }

    fn true_ as "true"(_, cond; msg) {
      if !cond.truth() {
        let msg = msg.map_or("assertion failed".to_string(), |m| {
          eval::encode::str(&m)
        });
        return Err(CallError::new(msg));
      }
      Value::None
    }
  }
}

fn load_assert<'i>(module: &str) -> LoadResult<'i> {
  if module != ASSERT_MODULE {
    return Err(LoadError::new(format!("no such module: {}", module)));
  }
  let mut globals = StringDict::new();
  globals.insert("assert".to_string(), Value::Extension(Arc::new(Assert)));
  Ok(globals)
}

/// Basic fixture for all conformance tests.
fn conformance_test(name: &'static str, text: &'static str) {
  let arena = syn::Arena::new();
  let mut thread = Thread::new(name);
  thread.set_load(|_, module| load_assert(module));
  let result = eval::exec_file(
    &mut thread,
    Path::new(name),
    text,
    syn::Dialect::default(),
    &StringDict::new(),
    &arena,
  );

  if let Err(e) = result {
    eprintln!("{}", e);
    panic!("{} failed", name)
  }
}

conf_test!(arith);
conf_test!(strings);
conf_test!(control);
conf_test!(functions);
conf_test!(lists);
conf_test!(dicts);
conf_test!(sets);
conf_test!(builtins);
conf_test!(freezing);
