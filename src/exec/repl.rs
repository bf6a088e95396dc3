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

//! Execution environment for the Kestrel Read-Eval-Print Loop.

use std::path::Path;
use std::time::Duration;
use std::time::Instant;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::eval;
use crate::eval::error::Error;
use crate::eval::value::Value;
use crate::eval::StringDict;
use crate::eval::Thread;
use crate::exec::cache::ModuleCache;
use crate::syn;

const DOUBLE_CTRL_C_THRESHOLD: Duration = Duration::from_millis(300);

/// What the REPL should do after reading a line.
enum Input {
  Text(String),
  Skip,
  Quit,
}

/// All state for the REPL.
pub struct Repl<'i> {
  arena: &'i syn::Arena,
  dialect: syn::Dialect,
  thread: Thread<'i>,
  /// Every global defined so far; each chunk sees them as predeclared.
  globals: StringDict<'i>,
  editor: DefaultEditor,
  last_ctrl_c: Instant,
}

impl<'i> Repl<'i> {
  /// Creates a new REPL; call `execute_loop()` to run it.
  ///
  /// `load` statements are served by `cache`.
  pub fn new(
    arena: &'i syn::Arena,
    dialect: syn::Dialect,
    cache: ModuleCache<'i>,
  ) -> Result<Self, ReadlineError> {
    let mut thread = Thread::new("repl");
    thread.set_load(move |_, module| cache.load(module));
    Ok(Repl {
      arena,
      dialect,
      thread,
      globals: StringDict::new(),
      editor: DefaultEditor::new()?,
      last_ctrl_c: Instant::now(),
    })
  }

  /// Runs the REPL until `:quit` or end of input.
  pub fn execute_loop(&mut self) -> Result<(), ReadlineError> {
    eprintln!(
      "Welcome to Kestrel v{version} ({arch} {os})",
      version = env!("CARGO_PKG_VERSION"),
      os = std::env::consts::OS,
      arch = std::env::consts::ARCH,
    );
    eprintln!("Enter statements or expressions below to have them evaluated.");
    eprintln!("Run :quit, or double-press ^C, to escape.");
    eprintln!("Run :help for more information.");
    eprintln!();
    loop {
      let buf = match self.read_input()? {
        Input::Text(buf) => buf,
        Input::Skip => continue,
        Input::Quit => return Ok(()),
      };
      if buf.trim().is_empty() {
        continue;
      }

      if buf.starts_with(':') {
        if !self.execute_command(&buf) {
          return Ok(());
        }
        continue;
      }

      self.execute(buf);
    }
  }

  /// Evaluates `buf` as an expression, or failing that, executes it as a
  /// chunk of statements.
  fn execute(&mut self, buf: String) {
    let text = self.arena.alloc_string(buf);
    let file_name = Path::new("<stdin>");
    let value = eval::eval(
      &mut self.thread,
      file_name,
      text,
      self.dialect,
      &self.globals,
      self.arena,
    );
    match value {
      Ok(Value::None) => return,
      Ok(v) => {
        println!("{}", v.repr());
        return;
      }
      Err(Error::Syntax(_)) => {}
      Err(e) => {
        eprintln!("{}", e);
        return;
      }
    }

    let chunk = eval::exec_chunk(
      &mut self.thread,
      file_name,
      text,
      self.dialect,
      &self.globals,
      self.arena,
    );
    match chunk {
      Ok(globals) => self.globals.extend(globals),
      Err(e) => eprintln!("{}", e),
    }
  }

  fn read_input(&mut self) -> Result<Input, ReadlineError> {
    let mut buf = String::new();
    let mut block = false;
    loop {
      let prompt = if buf.is_empty() { "kestrel> " } else { "   | " };
      let indent = if block { "  " } else { "" };
      let line = match self.editor.readline_with_initial(prompt, (indent, ""))
      {
        Ok(line) => line,
        Err(ReadlineError::Eof) => return Ok(Input::Quit),
        Err(ReadlineError::Interrupted) => {
          if self.last_ctrl_c.elapsed() < DOUBLE_CTRL_C_THRESHOLD {
            return Ok(Input::Quit);
          }
          self.last_ctrl_c = Instant::now();
          return Ok(Input::Skip);
        }
        Err(e) => return Err(e),
      };

      let first = buf.is_empty();
      block |= first && opens_block(&line);
      let blank = line.trim().is_empty();
      buf.push_str(&line);
      buf.push('\n');

      let (matches, depth) = check_brackets_match(&buf);
      let done = if block { blank } else { matches || depth < 0 };
      if done {
        buf.pop();
        self.editor.add_history_entry(buf.trim_end())?;
        return Ok(Input::Text(buf));
      }
    }
  }

  /// Runs a `:command`; returns false if the REPL should exit.
  fn execute_command(&mut self, command: &str) -> bool {
    let args = command.split_ascii_whitespace().collect::<Vec<_>>();
    match args.first().copied().unwrap_or(":") {
      ":help" | ":h" => println!(
        "\
available commands:
:clear - clears the terminal
:help  - shows this message
:quit  - exits the REPL\
"
      ),
      ":clear" | ":c" => {
        print!("{}{}", termion::clear::All, termion::cursor::Goto(1, 1))
      }
      ":quit" | ":q" => return false,
      command => eprintln!("unknown command: {}", command),
    }
    true
  }
}

/// Returns whether `line` starts an indented block, i.e., ends in a colon
/// outside of any comment.
fn opens_block(line: &str) -> bool {
  let code = match line.find('#') {
    Some(i) => &line[..i],
    None => line,
  };
  code.trim_end().ends_with(':')
}

/// Returns true if `s` has balanced brackets and strings; it also returns the
/// bracket nesting depth.
fn check_brackets_match(s: &str) -> (bool, i32) {
  let mut bracket_count: i32 = 0;

  let mut chars = s.chars().peekable();
  'char_loop: while let Some(c) = chars.next() {
    match c {
      '#' => loop {
        match chars.next() {
          Some('\n') | None => continue 'char_loop,
          _ => {}
        }
      },

      '(' | '[' | '{' => bracket_count += 1,
      ')' | ']' | '}' => bracket_count -= 1,

      '"' | '\'' => loop {
        let next = chars.next();
        let peek = chars.peek();
        match (next, peek) {
          (Some('\\'), Some('\\')) => {
            let _ = chars.next();
          }
          (Some('\\'), Some(q)) if *q == c => {
            let _ = chars.next();
          }
          (Some(q), _) if q == c => continue 'char_loop,
          (None, _) => return (false, 0),
          _ => {}
        }
      },
      _ => {}
    }
  }

  (bracket_count == 0, bracket_count)
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn brackets() {
    assert_eq!(check_brackets_match("f(1, 2)\n"), (true, 0));
    assert_eq!(check_brackets_match("x = [1,\n"), (false, 1));
    assert_eq!(check_brackets_match("x = {'a': (1,\n"), (false, 2));
    assert_eq!(check_brackets_match("x = ]\n"), (false, -1));
  }

  #[test]
  fn brackets_in_strings_and_comments() {
    assert_eq!(check_brackets_match("x = '('\n"), (true, 0));
    assert_eq!(check_brackets_match("x = \"[\\\"\"\n"), (true, 0));
    assert_eq!(check_brackets_match("x = 1 # (\n"), (true, 0));
    assert_eq!(check_brackets_match("x = 'abc\n"), (false, 0));
  }

  #[test]
  fn blocks() {
    assert!(opens_block("def f(x):"));
    assert!(opens_block("for x in y:  # loop"));
    assert!(!opens_block("x = {'a': 1}"));
    assert!(!opens_block("x = 1  # note:"));
  }
}
