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

//! Splits source text into logical lines.
//!
//! A logical line ends at a newline that is outside of any bracket, string
//! literal or backslash continuation. Blank and comment-only lines produce
//! nothing. Each line records the column of its first token, from which the
//! parser rebuilds block structure.

/// One logical line, as byte offsets into the original input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LogicalLine {
  pub indent: usize,
  pub start: usize,
  pub end: usize,
}

/// A layout failure, at a byte offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutError {
  pub offset: usize,
  pub message: &'static str,
}

const TAB_WIDTH: usize = 8;

/// Splits `input` into logical lines.
pub fn split(input: &str) -> Result<Vec<LogicalLine>, LayoutError> {
  let b = input.as_bytes();
  let mut lines = Vec::new();
  let mut i = 0;

  while i < b.len() {
    let mut indent = 0;
    while i < b.len() {
      match b[i] {
        b' ' | b'\x0C' => indent += 1,
        b'\t' => indent = (indent / TAB_WIDTH + 1) * TAB_WIDTH,
        _ => break,
      }
      i += 1;
    }

    match b.get(i) {
      None => break,
      Some(b'\n') => {
        i += 1;
        continue;
      }
      Some(b'\r') if b.get(i + 1) == Some(&b'\n') => {
        i += 2;
        continue;
      }
      Some(b'#') => {
        i = skip_comment(b, i);
        continue;
      }
      _ => {}
    }

    let start = i;
    let mut depth = 0usize;
    while i < b.len() {
      match b[i] {
        b'#' => {
          i = skip_comment(b, i);
          continue;
        }
        b'\\' if b.get(i + 1) == Some(&b'\n') => i += 1,
        b'\\' if b.get(i + 1) == Some(&b'\r')
          && b.get(i + 2) == Some(&b'\n') =>
        {
          i += 2
        }
        b'(' | b'[' | b'{' => depth += 1,
        b')' | b']' | b'}' => depth = depth.saturating_sub(1),
        b'\n' if depth == 0 => break,
        b'"' | b'\'' => {
          i = skip_string(b, i)?;
          continue;
        }
        _ => {}
      }
      i += 1;
    }

    let mut end = i;
    while end > start && matches!(b[end - 1], b' ' | b'\t' | b'\r') {
      end -= 1;
    }
    lines.push(LogicalLine { indent, start, end });
    i += 1;
  }

  Ok(lines)
}

/// Returns the offset of the newline ending the comment at `i`, or the end of
/// input.
fn skip_comment(b: &[u8], mut i: usize) -> usize {
  while i < b.len() && b[i] != b'\n' {
    i += 1;
  }
  i
}

/// Skips the string literal whose opening quote is at `i`, returning the
/// offset just past its closing quote.
///
/// An unterminated single-line string stops at the end of its line; the
/// grammar reports it from there.
fn skip_string(b: &[u8], start: usize) -> Result<usize, LayoutError> {
  let quote = b[start];
  let triple =
    b.get(start + 1) == Some(&quote) && b.get(start + 2) == Some(&quote);
  let mut i = if triple { start + 3 } else { start + 1 };
  loop {
    match b.get(i) {
      None if triple => {
        return Err(LayoutError {
          offset: start,
          message: "unterminated triple-quoted string literal",
        })
      }
      None => return Ok(i),
      Some(b'\\') => i += 2,
      Some(b'\n') if !triple => return Ok(i),
      Some(&c) if c == quote => {
        if !triple {
          return Ok(i + 1);
        }
        if b.get(i + 1) == Some(&quote) && b.get(i + 2) == Some(&quote) {
          return Ok(i + 3);
        }
        i += 1;
      }
      Some(_) => i += 1,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn texts(input: &str) -> Vec<(usize, &str)> {
    split(input)
      .unwrap()
      .into_iter()
      .map(|l| (l.indent, &input[l.start..l.end]))
      .collect()
  }

  #[test]
  fn blank_and_comment_lines_vanish() {
    let src = "x = 1\n\n   # comment\ny = 2  # trailing\n";
    assert_eq!(texts(src), vec![(0, "x = 1"), (0, "y = 2  # trailing")]);
  }

  #[test]
  fn brackets_join_lines() {
    let src = "x = [\n  1,\n  2,\n]\nif x:\n    pass\n";
    assert_eq!(
      texts(src),
      vec![(0, "x = [\n  1,\n  2,\n]"), (0, "if x:"), (4, "pass")]
    );
  }

  #[test]
  fn strings_hide_brackets_and_newlines() {
    let src = "s = '('\nt = \"\"\"a\n)b\"\"\"\nu = 1\n";
    assert_eq!(
      texts(src),
      vec![(0, "s = '('"), (0, "t = \"\"\"a\n)b\"\"\""), (0, "u = 1")]
    );
  }

  #[test]
  fn backslash_continues() {
    let src = "x = 1 + \\\n  2\n";
    assert_eq!(texts(src), vec![(0, "x = 1 + \\\n  2")]);
  }

  #[test]
  fn tabs_round_up() {
    let src = "if x:\n\tpass\n";
    assert_eq!(texts(src), vec![(0, "if x:"), (8, "pass")]);
  }

  #[test]
  fn unterminated_triple_quote() {
    let err = split("x = '''abc").unwrap_err();
    assert_eq!(err.offset, 4);
  }
}
