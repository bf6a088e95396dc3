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

//! String literal escaping and unescaping.

use std::fmt::Write as _;

/// Decodes the body of a string or bytes literal, without its quotes.
///
/// Raw literals are returned verbatim. String literals may only use `\x` and
/// octal escapes for ASCII; `\u` and `\U` produce UTF-8 in both kinds.
pub fn unescape_literal(
  body: &str,
  raw: bool,
  is_bytes: bool,
) -> Result<Vec<u8>, String> {
  if raw {
    return Ok(body.as_bytes().to_vec());
  }

  let b = body.as_bytes();
  let mut out = Vec::with_capacity(b.len());
  let mut i = 0;
  while i < b.len() {
    if b[i] != b'\\' {
      out.push(b[i]);
      i += 1;
      continue;
    }

    let c = match b.get(i + 1) {
      Some(&c) => c,
      None => return Err("invalid escape sequence at end of literal".into()),
    };
    i += 2;
    match c {
      b'\n' => {}
      b'\r' if b.get(i) == Some(&b'\n') => i += 1,
      b'a' => out.push(0x07),
      b'b' => out.push(0x08),
      b'f' => out.push(0x0C),
      b'n' => out.push(b'\n'),
      b'r' => out.push(b'\r'),
      b't' => out.push(b'\t'),
      b'v' => out.push(0x0B),
      b'\\' | b'\'' | b'"' => out.push(c),
      b'0'..=b'7' => {
        let start = i - 1;
        let mut end = start + 1;
        while end < b.len()
          && end < start + 3
          && matches!(b[end], b'0'..=b'7')
        {
          end += 1;
        }
        let digits = &body[start..end];
        let n = u32::from_str_radix(digits, 8).map_err(|e| e.to_string())?;
        if n > 0xFF {
          return Err(format!("invalid escape sequence \\{}", digits));
        }
        if !is_bytes && n > 0x7F {
          return Err(format!(
            "non-ASCII octal escape \\{} (use \\u{:04X} for the UTF-8 \
             encoding of U+{:04X})",
            digits, n, n
          ));
        }
        out.push(n as u8);
        i = end;
      }
      b'x' => {
        let digits = body
          .get(i..i + 2)
          .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
          .ok_or_else(|| "truncated escape sequence \\x".to_string())?;
        let n = u8::from_str_radix(digits, 16).map_err(|e| e.to_string())?;
        if !is_bytes && n > 0x7F {
          return Err(format!(
            "non-ASCII hex escape \\x{} (use \\u{:04X} for the UTF-8 \
             encoding of U+{:04X})",
            digits, n, n
          ));
        }
        out.push(n);
        i += 2;
      }
      b'u' | b'U' => {
        let len = if c == b'u' { 4 } else { 8 };
        let digits = body
          .get(i..i + len)
          .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
          .ok_or_else(|| format!("truncated escape sequence \\{}", c as char))?;
        let n = u32::from_str_radix(digits, 16).map_err(|e| e.to_string())?;
        let ch = char::from_u32(n).ok_or_else(|| {
          format!("invalid Unicode code point \\{}{}", c as char, digits)
        })?;
        let mut buf = [0; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        i += len;
      }
      _ => {
        let seq = match body.get(i - 1..).and_then(|s| s.chars().next()) {
          Some(ch) => ch.to_string(),
          None => format!("x{:02x}", c),
        };
        return Err(format!("invalid escape sequence \\{}", seq));
      }
    }
  }
  Ok(out)
}

fn escape_common(c: char, quote: char, buf: &mut String) -> bool {
  match c {
    '\x07' => buf.push_str("\\a"),
    '\x08' => buf.push_str("\\b"),
    '\x0C' => buf.push_str("\\f"),
    '\n' => buf.push_str("\\n"),
    '\r' => buf.push_str("\\r"),
    '\t' => buf.push_str("\\t"),
    '\x0B' => buf.push_str("\\v"),
    '\\' => buf.push_str("\\\\"),
    c if c == quote => {
      buf.push('\\');
      buf.push(c);
    }
    _ => return false,
  }
  true
}

/// Writes `s` as a double-quoted string literal into `buf`.
///
/// Bytes that are not valid UTF-8 are written as `\x` escapes, so the output
/// always reads back as the same byte sequence.
pub fn escape_string(s: &[u8], buf: &mut String) {
  buf.push('"');
  for c in chars(s) {
    let c = match c {
      Ok(c) => c,
      Err(b) => {
        let _ = write!(buf, "\\x{:02x}", b);
        continue;
      }
    };
    if escape_common(c, '"', buf) {
      continue;
    }
    if c.is_control() {
      let _ = match c as u32 {
        n @ 0..=0x7F => write!(buf, "\\x{:02x}", n),
        n @ 0x80..=0xFFFF => write!(buf, "\\u{:04x}", n),
        n => write!(buf, "\\U{:08x}", n),
      };
      continue;
    }
    buf.push(c);
  }
  buf.push('"');
}

/// Decodes `s` as UTF-8, yielding each byte of an invalid sequence as an
/// error.
pub fn chars(s: &[u8]) -> impl Iterator<Item = Result<char, u8>> + '_ {
  let mut s = s;
  std::iter::from_fn(move || {
    let (&first, _) = s.split_first()?;
    let width = match first {
      0x00..=0x7F => 1,
      0xC2..=0xDF => 2,
      0xE0..=0xEF => 3,
      0xF0..=0xF4 => 4,
      _ => 0,
    };
    if width > 0 && width <= s.len() {
      if let Some(c) = std::str::from_utf8(&s[..width])
        .ok()
        .and_then(|st| st.chars().next())
      {
        s = &s[width..];
        return Some(Ok(c));
      }
    }
    s = &s[1..];
    Some(Err(first))
  })
}

/// Writes `s` as a bytes literal, `b"..."`, into `buf`.
pub fn escape_bytes(s: &[u8], buf: &mut String) {
  buf.push_str("b\"");
  for &b in s {
    let c = b as char;
    if b < 0x80 && escape_common(c, '"', buf) {
      continue;
    }
    if (0x20..0x7F).contains(&b) {
      buf.push(c);
    } else {
      let _ = write!(buf, "\\x{:02x}", b);
    }
  }
  buf.push('"');
}

/// Returns whether `s` is a valid identifier.
pub fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn unescape(s: &str) -> Result<Vec<u8>, String> {
    unescape_literal(s, false, false)
  }

  #[test]
  fn unescapes() {
    assert_eq!(unescape(r"a\tb\n").unwrap(), b"a\tb\n");
    assert_eq!(unescape(r"\101\x42").unwrap(), b"AB");
    assert_eq!(unescape(r"Ω").unwrap(), "Ω".as_bytes());
    assert_eq!(unescape(r"\U0001F600").unwrap(), "😀".as_bytes());
    assert_eq!(unescape("a\\\nb").unwrap(), b"ab");
    assert_eq!(unescape_literal(r"\xff", false, true).unwrap(), b"\xff");
    assert_eq!(unescape_literal(r"\d", true, false).unwrap(), b"\\d");
  }

  #[test]
  fn rejects_bad_escapes() {
    assert_eq!(unescape(r"\q").unwrap_err(), r"invalid escape sequence \q");
    assert!(unescape(r"\xff").unwrap_err().starts_with("non-ASCII hex escape"));
    assert!(unescape(r"\x4").is_err());
    assert!(unescape(r"\ud800").is_err());
  }

  #[test]
  fn escapes() {
    let mut buf = String::new();
    escape_string(b"a\"b\n\xffc\x01", &mut buf);
    assert_eq!(buf, r#""a\"b\n\xffc\x01""#);

    let mut buf = String::new();
    escape_bytes(b"a\x80'", &mut buf);
    assert_eq!(buf, r#"b"a\x80'""#);
  }
}
