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

//! Builtin methods of strings, bytes, lists, dicts and sets.
//!
//! Methods are looked up unbound, so that `x.f(...)` can call them without
//! allocating a bound method; `x.f` on its own binds the receiver.

use std::ops::Range;

use crate::eval::encode;
use crate::eval::escaping;
use crate::eval::error::ValueError;
use crate::eval::ops;
use crate::eval::value::Args;
use crate::eval::value::Builtin;
use crate::eval::value::Dict;
use crate::eval::value::FromValue;
use crate::eval::value::Iter;
use crate::eval::value::List;
use crate::eval::value::Set;
use crate::eval::value::Str;
use crate::eval::value::Value;

const STRING_METHODS: &[&str] = &[
  "capitalize",
  "codepoints",
  "count",
  "elems",
  "endswith",
  "find",
  "format",
  "index",
  "isalnum",
  "isalpha",
  "isdigit",
  "islower",
  "isspace",
  "isupper",
  "join",
  "lower",
  "lstrip",
  "partition",
  "removeprefix",
  "removesuffix",
  "replace",
  "rfind",
  "rindex",
  "rpartition",
  "rsplit",
  "rstrip",
  "split",
  "splitlines",
  "startswith",
  "strip",
  "title",
  "upper",
];

const BYTES_METHODS: &[&str] = &["elems"];

const LIST_METHODS: &[&str] =
  &["append", "clear", "extend", "index", "insert", "pop", "remove"];

const DICT_METHODS: &[&str] = &[
  "clear",
  "get",
  "items",
  "keys",
  "pop",
  "popitem",
  "setdefault",
  "update",
  "values",
];

const SET_METHODS: &[&str] = &[
  "add",
  "clear",
  "difference",
  "discard",
  "intersection",
  "issubset",
  "issuperset",
  "pop",
  "remove",
  "symmetric_difference",
  "union",
];

/// Looks up the builtin method `name` of `recv`'s type, without binding it.
pub fn lookup<'i>(recv: &Value<'i>, name: &str) -> Option<Builtin<'i>> {
  match recv {
    Value::String(_) => string_method(name),
    Value::Bytes(_) => bytes_method(name),
    Value::List(_) => list_method(name),
    Value::Dict(_) => dict_method(name),
    Value::Set(_) => set_method(name),
    _ => None,
  }
}

/// Evaluates `x.name`: a method bound to `x`, or an extension attribute.
pub fn getattr<'i>(
  x: &Value<'i>,
  name: &str,
) -> Result<Option<Value<'i>>, ValueError> {
  if let Some(method) = lookup(x, name) {
    return Ok(Some(Value::Builtin(method.bind(x.clone()))));
  }
  match x {
    Value::Extension(e) => e.attr(name),
    _ => Ok(None),
  }
}

/// Returns the sorted attribute names of `x`, as reported by `dir()`.
pub fn names(x: &Value) -> Vec<String> {
  let methods = match x {
    Value::String(_) => STRING_METHODS,
    Value::Bytes(_) => BYTES_METHODS,
    Value::List(_) => LIST_METHODS,
    Value::Dict(_) => DICT_METHODS,
    Value::Set(_) => SET_METHODS,
    Value::Extension(e) => {
      let mut names = e.attr_names();
      names.sort();
      return names;
    }
    _ => &[],
  };
  methods.iter().map(|s| s.to_string()).collect()
}

/// Extracts the receiver of a raw method.
fn receiver<'i, T: FromValue<'i>>(
  recv: Option<&Value<'i>>,
) -> Result<T, ValueError> {
  recv.and_then(T::from_value).ok_or_else(|| {
    ValueError::new(format!("receiver must be a {}", T::TYPE))
  })
}

fn string_method<'i>(name: &str) -> Option<Builtin<'i>> {
  stdlib! { name =>
    fn capitalize(_, recv: String) {
      let mut first = true;
      map_chars(recv, |c, out| {
        if first {
          out.extend(c.to_uppercase());
        } else {
          out.extend(c.to_lowercase());
        }
        first = false;
      })
    }

    fn codepoints(_, recv: String) {
      recv
        .to_str_lossy()
        .chars()
        .map(|c| Value::from(c.to_string()))
        .collect::<Vec<_>>()
    }

    fn count(_, recv: String, sub; start, end) {
      count(recv, &sub, start, end)
    }

    fn elems(_, recv: String) {
      (0..recv.len()).map(|i| substr(recv, i..i + 1)).collect::<Vec<_>>()
    }

    fn endswith(_, recv: String, suffix; start, end) {
      affix(recv, &suffix, start, end, |s, x| s.ends_with(x))
    }

    fn find(_, recv: String, sub; start, end) {
      locate(recv, &sub, start, end, false)
        .map(|i| Value::from(i.map_or(-1, |i| i as i64)))
    }

    fn format(_, recv, args) raw {
      let recv = receiver::<Str>(recv)?;
      format(&recv, args)
    }

    fn index(_, recv: String, sub; start, end) {
      match locate(recv, &sub, start, end, false)? {
        Some(i) => Ok(Value::from(i)),
        None => Err(ValueError::new("substring not found")),
      }
    }

    fn isalnum(_, recv: String) {
      all_chars(recv, char::is_alphanumeric)
    }

    fn isalpha(_, recv: String) {
      all_chars(recv, char::is_alphabetic)
    }

    fn isdigit(_, recv: String) {
      all_chars(recv, |c| c.is_ascii_digit())
    }

    fn islower(_, recv: String) {
      let s = recv.to_str_lossy();
      s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase)
    }

    fn isspace(_, recv: String) {
      all_chars(recv, char::is_whitespace)
    }

    fn isupper(_, recv: String) {
      let s = recv.to_str_lossy();
      s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
    }

    fn join(_, recv: String, iterable) {
      join(recv, &iterable)
    }

    fn lower(_, recv: String) {
      map_chars(recv, |c, out| out.extend(c.to_lowercase()))
    }

    fn lstrip(_, recv: String; chars) {
      strip(recv, chars, true, false)
    }

    fn partition(_, recv: String, sep) {
      partition(recv, &sep, false)
    }

    fn removeprefix(_, recv: String, prefix) {
      let prefix = prefix.expect::<Str>("prefix")?;
      match recv.starts_with(&prefix) {
        true => Ok(substr(recv, prefix.len()..recv.len())),
        false => Ok::<_, ValueError>(Value::String(recv.clone())),
      }
    }

    fn removesuffix(_, recv: String, suffix) {
      let suffix = suffix.expect::<Str>("suffix")?;
      match recv.ends_with(&suffix) {
        true => Ok(substr(recv, 0..recv.len() - suffix.len())),
        false => Ok::<_, ValueError>(Value::String(recv.clone())),
      }
    }

    fn replace(_, recv: String, old, new; count) {
      replace(recv, &old, &new, count)
    }

    fn rfind(_, recv: String, sub; start, end) {
      locate(recv, &sub, start, end, true)
        .map(|i| Value::from(i.map_or(-1, |i| i as i64)))
    }

    fn rindex(_, recv: String, sub; start, end) {
      match locate(recv, &sub, start, end, true)? {
        Some(i) => Ok(Value::from(i)),
        None => Err(ValueError::new("substring not found")),
      }
    }

    fn rpartition(_, recv: String, sep) {
      partition(recv, &sep, true)
    }

    fn rsplit(_, recv: String; sep, maxsplit) {
      split(recv, sep, maxsplit, true)
    }

    fn rstrip(_, recv: String; chars) {
      strip(recv, chars, false, true)
    }

    fn split(_, recv: String; sep, maxsplit) {
      split(recv, sep, maxsplit, false)
    }

    fn splitlines(_, recv: String; keepends) {
      let keepends = keepends.unwrap_or_default().truth();
      splitlines(recv, keepends)
    }

    fn startswith(_, recv: String, prefix; start, end) {
      affix(recv, &prefix, start, end, |s, x| s.starts_with(x))
    }

    fn strip(_, recv: String; chars) {
      strip(recv, chars, true, true)
    }

    fn title(_, recv: String) {
      let mut prev_cased = false;
      map_chars(recv, |c, out| {
        if prev_cased {
          out.extend(c.to_lowercase());
        } else {
          out.extend(c.to_uppercase());
        }
        prev_cased = c.is_alphabetic();
      })
    }

    fn upper(_, recv: String) {
      map_chars(recv, |c, out| out.extend(c.to_uppercase()))
    }
  }
}

fn bytes_method<'i>(name: &str) -> Option<Builtin<'i>> {
  stdlib! { name =>
    fn elems(_, recv: Bytes) {
      recv.iter().map(|&b| Value::from(b as i32)).collect::<Vec<_>>()
    }
  }
}

fn list_method<'i>(name: &str) -> Option<Builtin<'i>> {
  stdlib! { name =>
    fn append(_, recv: List, x) {
      recv.push(x).map(|()| Value::None)
    }

    fn clear(_, recv: List) {
      recv.clear().map(|()| Value::None)
    }

    fn extend(_, recv: List, iterable) {
      let values = Iter::new(&iterable)?.collect::<Vec<_>>();
      recv.extend(values).map(|()| Value::None)
    }

    fn index(_, recv: List, x; start, end) {
      list_index(recv, &x, start, end)
    }

    fn insert(_, recv: List, index, x) {
      let len = recv.len() as i64;
      let mut i = index.expect_i64("index")?;
      if i < 0 {
        i += len;
      }
      recv.insert(i.clamp(0, len) as usize, x).map(|()| Value::None)
    }

    fn pop(_, recv: List; index) {
      let len = recv.len();
      let i = index.unwrap_or_default().expect_i64_or("index", -1)?;
      let adjusted = if i < 0 { i + len as i64 } else { i };
      if adjusted < 0 || adjusted >= len as i64 {
        return Err(ops::out_of_range("list", i, len).into());
      }
      recv.remove(adjusted as usize)
    }

    fn remove(_, recv: List, x) {
      for (i, v) in recv.snapshot().iter().enumerate() {
        if v.equals(&x)? {
          return recv.remove(i).map(|_| Value::None).map_err(Into::into);
        }
      }
      Err::<Value, _>(ValueError::new(format!(
        "{} not found in list",
        x.repr()
      )))
    }
  }
}

fn dict_method<'i>(name: &str) -> Option<Builtin<'i>> {
  stdlib! { name =>
    fn clear(_, recv: Dict) {
      recv.clear().map(|()| Value::None)
    }

    fn get(_, recv: Dict, key; default) {
      Ok::<_, ValueError>(recv.get(&key)?.or(default).unwrap_or_default())
    }

    fn items(_, recv: Dict) {
      recv
        .items()
        .into_iter()
        .map(|(k, v)| Value::Tuple(vec![k, v].into()))
        .collect::<Vec<_>>()
    }

    fn keys(_, recv: Dict) {
      recv.keys()
    }

    fn pop(_, recv: Dict, key; default) {
      match (recv.remove(&key)?, default) {
        (Some(v), _) | (None, Some(v)) => Ok(v),
        (None, None) => {
          Err(ValueError::new(format!("missing key {}", key.repr())))
        }
      }
    }

    fn popitem(_, recv: Dict) {
      match recv.pop_first()? {
        Some((k, v)) => Ok(Value::Tuple(vec![k, v].into())),
        None => Err(ValueError::new("empty dict")),
      }
    }

    fn setdefault(_, recv: Dict, key; default) {
      if let Some(v) = recv.get(&key)? {
        return Ok(v);
      }
      let v = default.unwrap_or_default();
      recv.insert(key, v.clone())?;
      Ok::<_, ValueError>(v)
    }

    fn update(_, recv, args) raw {
      let recv = receiver::<Dict>(recv)?;
      update_dict(&recv, args).map(|()| Value::None)
    }

    fn values(_, recv: Dict) {
      recv.values()
    }
  }
}

fn set_method<'i>(name: &str) -> Option<Builtin<'i>> {
  stdlib! { name =>
    fn add(_, recv: Set, x) {
      recv.insert(x).map(|_| Value::None)
    }

    fn clear(_, recv: Set) {
      recv.clear().map(|()| Value::None)
    }

    fn difference(_, recv, args) raw {
      let recv = receiver::<Set>(recv)?;
      fold_sets(&recv, args, |x, y| x.difference(y))
    }

    fn discard(_, recv: Set, x) {
      recv.remove(&x).map(|_| Value::None)
    }

    fn intersection(_, recv, args) raw {
      let recv = receiver::<Set>(recv)?;
      fold_sets(&recv, args, |x, y| x.intersection(y))
    }

    fn issubset(_, recv: Set, x) {
      to_set(&x).map(|x| recv.is_subset(&x))?
    }

    fn issuperset(_, recv: Set, x) {
      to_set(&x).map(|x| x.is_subset(recv))?
    }

    fn pop(_, recv: Set) {
      match recv.pop_first()? {
        Some(v) => Ok(v),
        None => Err(ValueError::new("empty set")),
      }
    }

    fn remove(_, recv: Set, x) {
      match recv.remove(&x)? {
        true => Ok(Value::None),
        false => Err(ValueError::new(format!("missing key {}", x.repr()))),
      }
    }

    fn symmetric_difference(_, recv: Set, x) {
      to_set(&x).map(|x| recv.symmetric_difference(&x))?
    }

    fn union(_, recv, args) raw {
      let recv = receiver::<Set>(recv)?;
      fold_sets(&recv, args, |x, y| x.union(y))
    }
  }
}

/// Returns `s[range]` as a string value.
fn substr<'i>(s: &Str<'i>, range: Range<usize>) -> Value<'i> {
  Value::String(s.slice(range).unwrap_or_else(Str::empty))
}

/// Resolves optional `start` and `end` arguments against a length, clamping
/// them like slice bounds.
fn bounds(
  len: usize,
  start: Option<Value>,
  end: Option<Value>,
) -> Result<Range<usize>, ValueError> {
  let resolve = |v: Option<Value>, param: &str, default: usize| {
    let i = v.unwrap_or_default().expect_i64_or(param, default as i64)?;
    let i = if i < 0 { i + len as i64 } else { i };
    Ok::<_, ValueError>(i.clamp(0, len as i64) as usize)
  };
  let start = resolve(start, "start", 0)?;
  let end = resolve(end, "end", len)?;
  Ok(start..end.max(start))
}

fn all_chars(s: &Str, f: impl Fn(char) -> bool) -> bool {
  let s = s.to_str_lossy();
  !s.is_empty() && s.chars().all(f)
}

fn locate(
  s: &Str,
  sub: &Value,
  start: Option<Value>,
  end: Option<Value>,
  last: bool,
) -> Result<Option<usize>, ValueError> {
  let sub = sub.expect::<Str>("sub")?;
  let range = bounds(s.len(), start, end)?;
  let offset = range.start;
  let hay = &s[range];
  let i = match last {
    true => ops::rfind(hay, &sub, hay.len()),
    false => ops::find(hay, &sub, 0),
  };
  Ok(i.map(|i| i + offset))
}

fn count<'i>(
  s: &Str<'i>,
  sub: &Value<'i>,
  start: Option<Value<'i>>,
  end: Option<Value<'i>>,
) -> Result<Value<'i>, ValueError> {
  let sub = sub.expect::<Str>("sub")?;
  let hay = &s[bounds(s.len(), start, end)?];
  if sub.is_empty() {
    return Ok(Value::from(hay.len() + 1));
  }
  let mut n = 0;
  let mut i = 0;
  while let Some(j) = ops::find(hay, &sub, i) {
    n += 1;
    i = j + sub.len();
  }
  Ok(Value::from(n as usize))
}

fn affix<'i>(
  s: &Str<'i>,
  x: &Value<'i>,
  start: Option<Value<'i>>,
  end: Option<Value<'i>>,
  matches: fn(&[u8], &[u8]) -> bool,
) -> Result<Value<'i>, ValueError> {
  let hay = &s[bounds(s.len(), start, end)?];
  let found = match x {
    Value::String(x) => matches(hay, x),
    Value::Tuple(xs) => {
      let mut found = false;
      for x in xs.iter() {
        match x {
          Value::String(x) => found |= matches(hay, x),
          x => {
            return Err(ValueError::new(format!(
              "want string, got {}",
              x.type_name()
            )))
          }
        }
      }
      found
    }
    x => {
      return Err(ValueError::new(format!(
        "got {}, want string or tuple of strings",
        x.type_name()
      )))
    }
  };
  Ok(Value::Bool(found))
}

fn join<'i>(
  sep: &Str<'i>,
  iterable: &Value<'i>,
) -> Result<Value<'i>, ValueError> {
  let mut out = Vec::new();
  for (i, v) in Iter::new(iterable)?.enumerate() {
    if i > 0 {
      out.extend_from_slice(sep);
    }
    match v {
      Value::String(s) => out.extend_from_slice(&s),
      v => {
        return Err(ValueError::new(format!(
          "in list, want string, got {}",
          v.type_name()
        )))
      }
    }
  }
  Ok(Value::String(out.into()))
}

fn strip<'i>(
  s: &Str<'i>,
  chars: Option<Value<'i>>,
  left: bool,
  right: bool,
) -> Result<Value<'i>, ValueError> {
  let cut = match chars {
    None | Some(Value::None) => None,
    Some(v) => Some(v.expect::<Str>("chars")?.to_str_lossy().into_owned()),
  };
  let matches = |c: char| match &cut {
    Some(cut) => cut.contains(c),
    None => c.is_whitespace(),
  };
  let (mut start, mut end) = (0, s.len());
  if left {
    while let Some(c) = first_char(&s[start..end]).filter(|&c| matches(c)) {
      start += c.len_utf8();
    }
  }
  if right {
    while let Some(c) = last_char(&s[start..end]).filter(|&c| matches(c)) {
      end -= c.len_utf8();
    }
  }
  Ok(substr(s, start..end))
}

/// Decodes the char at the start of `b`, if it begins with valid UTF-8.
fn first_char(b: &[u8]) -> Option<char> {
  escaping::chars(b).next()?.ok()
}

/// Decodes the char at the end of `b`, if it ends with valid UTF-8.
fn last_char(b: &[u8]) -> Option<char> {
  (1..=b.len().min(4)).find_map(|k| {
    let mut chars = std::str::from_utf8(&b[b.len() - k..]).ok()?.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
  })
}

/// Rebuilds `s` by passing each char through `f`. Bytes that are not valid
/// UTF-8 are copied through unchanged.
fn map_chars<'i>(
  s: &Str<'i>,
  mut f: impl FnMut(char, &mut String),
) -> Value<'i> {
  let mut out = Vec::with_capacity(s.len());
  let mut buf = String::new();
  for c in escaping::chars(s) {
    match c {
      Ok(c) => {
        buf.clear();
        f(c, &mut buf);
        out.extend_from_slice(buf.as_bytes());
      }
      Err(b) => out.push(b),
    }
  }
  Value::String(out.into())
}

fn partition<'i>(
  s: &Str<'i>,
  sep: &Value<'i>,
  last: bool,
) -> Result<Value<'i>, ValueError> {
  let sep = sep.expect::<Str>("sep")?;
  if sep.is_empty() {
    return Err(ValueError::new("empty separator"));
  }
  let found = match last {
    true => ops::rfind(s, &sep, s.len()),
    false => ops::find(s, &sep, 0),
  };
  let empty = || Value::String(Str::empty());
  let parts = match found {
    Some(i) => vec![
      substr(s, 0..i),
      Value::String(sep.clone()),
      substr(s, i + sep.len()..s.len()),
    ],
    None if last => vec![empty(), empty(), Value::String(s.clone())],
    None => vec![Value::String(s.clone()), empty(), empty()],
  };
  Ok(Value::Tuple(parts.into()))
}

fn replace<'i>(
  s: &Str<'i>,
  old: &Value<'i>,
  new: &Value<'i>,
  count: Option<Value<'i>>,
) -> Result<Value<'i>, ValueError> {
  let old = old.expect::<Str>("old")?;
  let new = new.expect::<Str>("new")?;
  let count = count.unwrap_or_default().expect_i64_or("count", -1)?;
  let limit = usize::try_from(count).unwrap_or(usize::MAX);

  let mut out = Vec::with_capacity(s.len());
  let mut i = 0;
  let mut n = 0;
  if old.is_empty() {
    // `new` goes before every UTF-8 sequence, and at the end.
    while n < limit {
      out.extend_from_slice(&new);
      n += 1;
      if i == s.len() {
        break;
      }
      let mut k = i + 1;
      while k < s.len() && s[k] & 0xc0 == 0x80 {
        k += 1;
      }
      out.extend_from_slice(&s[i..k]);
      i = k;
    }
  } else {
    while n < limit {
      match ops::find(s, &old, i) {
        Some(j) => {
          out.extend_from_slice(&s[i..j]);
          out.extend_from_slice(&new);
          i = j + old.len();
          n += 1;
        }
        None => break,
      }
    }
  }
  out.extend_from_slice(&s[i..]);
  Ok(Value::String(out.into()))
}

fn split<'i>(
  s: &Str<'i>,
  sep: Option<Value<'i>>,
  maxsplit: Option<Value<'i>>,
  right: bool,
) -> Result<Value<'i>, ValueError> {
  let max = maxsplit.unwrap_or_default().expect_i64_or("maxsplit", -1)?;
  let max = usize::try_from(max).unwrap_or(usize::MAX);
  let sep = match sep {
    None | Some(Value::None) => None,
    Some(v) => Some(v.expect::<Str>("sep")?),
  };

  let mut parts = Vec::new();
  match sep {
    Some(sep) if sep.is_empty() => {
      return Err(ValueError::new("empty separator"))
    }
    Some(sep) if right => {
      let mut end = s.len();
      while parts.len() < max {
        match ops::rfind(s, &sep, end) {
          Some(j) => {
            parts.push(j + sep.len()..end);
            end = j;
          }
          None => break,
        }
      }
      parts.push(0..end);
      parts.reverse();
    }
    Some(sep) => {
      let mut start = 0;
      while parts.len() < max {
        match ops::find(s, &sep, start) {
          Some(j) => {
            parts.push(start..j);
            start = j + sep.len();
          }
          None => break,
        }
      }
      parts.push(start..s.len());
    }
    None if right => {
      let ws = |i: usize| s[i].is_ascii_whitespace();
      let mut j = s.len();
      loop {
        while j > 0 && ws(j - 1) {
          j -= 1;
        }
        if j == 0 {
          break;
        }
        if parts.len() == max {
          parts.push(0..j);
          break;
        }
        let mut i = j;
        while i > 0 && !ws(i - 1) {
          i -= 1;
        }
        parts.push(i..j);
        j = i;
      }
      parts.reverse();
    }
    None => {
      let ws = |i: usize| s[i].is_ascii_whitespace();
      let mut i = 0;
      loop {
        while i < s.len() && ws(i) {
          i += 1;
        }
        if i == s.len() {
          break;
        }
        if parts.len() == max {
          parts.push(i..s.len());
          break;
        }
        let mut j = i;
        while j < s.len() && !ws(j) {
          j += 1;
        }
        parts.push(i..j);
        i = j;
      }
    }
  }

  let parts = parts.into_iter().map(|r| substr(s, r)).collect::<Vec<_>>();
  Ok(Value::from(parts))
}

fn splitlines<'i>(s: &Str<'i>, keepends: bool) -> Value<'i> {
  let mut lines = Vec::new();
  let mut start = 0;
  let mut i = 0;
  while i < s.len() {
    let eol = match (s[i], s.get(i + 1)) {
      (b'\r', Some(b'\n')) => 2,
      (b'\r', _) | (b'\n', _) => 1,
      _ => {
        i += 1;
        continue;
      }
    };
    let end = if keepends { i + eol } else { i };
    lines.push(substr(s, start..end));
    i += eol;
    start = i;
  }
  if start < s.len() {
    lines.push(substr(s, start..s.len()));
  }
  Value::from(lines)
}

/// Implements `str.format`: `{}`, `{0}` and `{name}` fields, with optional
/// `!s` and `!r` conversions.
fn format<'i>(
  fmt: &Str<'i>,
  args: Args<'i>,
) -> Result<Value<'i>, ValueError> {
  let mut out = Vec::with_capacity(fmt.len());
  let mut auto: Option<bool> = None;
  let mut next = 0;
  let mut i = 0;
  while i < fmt.len() {
    match fmt[i] {
      b'{' if fmt.get(i + 1) == Some(&b'{') => {
        out.push(b'{');
        i += 2;
      }
      b'}' if fmt.get(i + 1) == Some(&b'}') => {
        out.push(b'}');
        i += 2;
      }
      b'}' => return Err(ValueError::new("single '}' in format")),
      b'{' => {
        let close = fmt[i..]
          .iter()
          .position(|&b| b == b'}')
          .ok_or_else(|| ValueError::new("unmatched '{' in format"))?;
        let field = &fmt[i + 1..i + close];
        i += close + 1;

        let (name, conv) = match field.iter().position(|&b| b == b'!') {
          Some(j) => (&field[..j], Some(&field[j + 1..])),
          None => (field, None),
        };
        if name.contains(&b':') {
          return Err(ValueError::new(
            "format spec features not supported in replacement fields",
          ));
        }

        let value = if name.is_empty() {
          if auto == Some(false) {
            return Err(ValueError::new(
              "cannot switch from manual field specification to automatic \
               field numbering",
            ));
          }
          auto = Some(true);
          next += 1;
          args.positional.get(next - 1)
        } else if name.iter().all(u8::is_ascii_digit) {
          if auto == Some(true) {
            return Err(ValueError::new(
              "cannot switch from automatic field numbering to manual field \
               specification",
            ));
          }
          auto = Some(false);
          let index = String::from_utf8_lossy(name).parse::<usize>().ok();
          index.and_then(|i| args.positional.get(i))
        } else {
          let found = args.named.iter().find(|(k, _)| &k[..] == name);
          match found {
            Some((_, v)) => Some(v),
            None => {
              return Err(ValueError::new(format!(
                "keyword {} not found",
                String::from_utf8_lossy(name)
              )))
            }
          }
        };
        let value = value
          .ok_or_else(|| ValueError::new("tuple index out of range"))?;

        match conv {
          None | Some(b"s") => match value {
            Value::String(s) => out.extend_from_slice(s),
            v => out.extend_from_slice(encode::str(v).as_bytes()),
          },
          Some(b"r") => out.extend_from_slice(value.repr().as_bytes()),
          Some(c) => {
            return Err(ValueError::new(format!(
              "unknown conversion {:?}",
              String::from_utf8_lossy(c)
            )))
          }
        }
      }
      b => {
        out.push(b);
        i += 1;
      }
    }
  }
  Ok(Value::String(out.into()))
}

fn list_index<'i>(
  list: &List<'i>,
  x: &Value<'i>,
  start: Option<Value<'i>>,
  end: Option<Value<'i>>,
) -> Result<Value<'i>, ValueError> {
  let values = list.snapshot();
  let range = bounds(values.len(), start, end)?;
  for i in range {
    if values[i].equals(x)? {
      return Ok(Value::from(i));
    }
  }
  Err(ValueError::new(format!("{} not found in list", x.repr())))
}

/// Applies the `dict.update` protocol: an optional mapping or iterable of
/// pairs, then keyword arguments.
pub(crate) fn update_dict<'i>(
  dict: &Dict<'i>,
  args: Args<'i>,
) -> Result<(), ValueError> {
  if args.positional.len() > 1 {
    return Err(ValueError::new(format!(
      "got {} arguments, want at most 1",
      args.positional.len()
    )));
  }
  if let Some(x) = args.positional.first() {
    match x {
      Value::Dict(d) => {
        for (k, v) in d.items() {
          dict.insert(k, v)?;
        }
      }
      x => {
        let iter = Iter::new(x).map_err(|_| {
          ValueError::new(format!("got {}, want iterable", x.type_name()))
        })?;
        for (i, pair) in iter.enumerate() {
          let pair = match Iter::new(&pair) {
            Ok(it) => it.collect::<Vec<_>>(),
            Err(_) => {
              return Err(ValueError::new(format!(
                "dictionary update sequence element #{} is not iterable ({})",
                i,
                pair.type_name()
              )))
            }
          };
          let [k, v]: [Value; 2] = pair.try_into().map_err(|p: Vec<_>| {
            ValueError::new(format!(
              "dictionary update sequence element #{} has length {}, want 2",
              i,
              p.len()
            ))
          })?;
          dict.insert(k, v)?;
        }
      }
    }
  }
  for (k, v) in args.named {
    dict.insert(Value::String(k), v)?;
  }
  Ok(())
}

/// Converts an iterable to a set.
fn to_set<'i>(x: &Value<'i>) -> Result<Set<'i>, ValueError> {
  match x {
    Value::Set(s) => Ok(s.clone()),
    x => Set::from_values(Iter::new(x)?),
  }
}

fn fold_sets<'i>(
  recv: &Set<'i>,
  args: Args<'i>,
  op: impl Fn(&Set<'i>, &Set<'i>) -> Set<'i>,
) -> Result<Value<'i>, ValueError> {
  args.no_named()?;
  let mut acc = recv.union(&Set::new());
  for x in &args.positional {
    acc = op(&acc, &to_set(x)?);
  }
  Ok(Value::Set(acc))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::eval::Thread;
  use pretty_assertions::assert_eq;

  /// Calls method `name` on `recv` with positional `args`, returning the repr
  /// of the result or the error message.
  fn call(
    recv: Value<'static>,
    name: &str,
    args: Vec<Value<'static>>,
  ) -> String {
    let method = match lookup(&recv, name) {
      Some(m) => m,
      None => return format!("no method {}", name),
    };
    let mut thread = Thread::new("test");
    match (method.fnc())(&mut thread, Some(&recv), Args::positional(args)) {
      Ok(v) => v.repr(),
      Err(e) => e.to_string(),
    }
  }

  fn s(text: &'static str) -> Value<'static> {
    Value::from(text)
  }

  #[test]
  fn invalid_utf8_is_preserved() {
    let raw = |b: &[u8]| Value::String(Str::new(b.to_vec()));
    assert_eq!(call(raw(b" \xffa "), "strip", vec![]), r#""\xffa""#);
    assert_eq!(
      call(raw(b"xx\xffxx"), "rstrip", vec![s("x")]),
      r#""xx\xff""#
    );
    assert_eq!(call(raw(b"\xffAB"), "lower", vec![]), r#""\xffab""#);
    assert_eq!(call(raw(b"ab\xfe"), "upper", vec![]), r#""AB\xfe""#);
    assert_eq!(call(raw(b"\xffab"), "capitalize", vec![]), r#""\xffAb""#);
    assert_eq!(call(s("  Ωa  "), "strip", vec![]), r#""Ωa""#);
  }

  #[test]
  fn every_listed_method_exists() {
    let receivers = [
      s(""),
      Value::Bytes(Str::empty()),
      Value::List(List::default()),
      Value::Dict(Dict::new()),
      Value::Set(Set::new()),
    ];
    for recv in &receivers {
      for name in names(recv) {
        assert!(lookup(recv, &name).is_some(), "{}.{}", recv.type_name(), name);
      }
    }
  }

  #[test]
  fn string_search() {
    assert_eq!(call(s("banana"), "find", vec![s("an")]), "1");
    assert_eq!(call(s("banana"), "rfind", vec![s("an")]), "3");
    assert_eq!(call(s("banana"), "find", vec![s("x")]), "-1");
    assert_eq!(call(s("banana"), "find", vec![s("an"), 2.into()]), "3");
    assert_eq!(call(s("banana"), "count", vec![s("a")]), "3");
    assert_eq!(call(s("banana"), "index", vec![s("x")]), "substring not found");
    let t = Value::Tuple(vec![s("x"), s("na")].into());
    assert_eq!(call(s("banana"), "endswith", vec![t]), "True");
  }

  #[test]
  fn string_split() {
    assert_eq!(
      call(s(" a b  c "), "split", vec![]),
      r#"["a", "b", "c"]"#
    );
    assert_eq!(
      call(s("a b  c "), "split", vec![Value::None, 1.into()]),
      r#"["a", "b  c "]"#
    );
    assert_eq!(
      call(s("a,b,c"), "rsplit", vec![s(","), 1.into()]),
      r#"["a,b", "c"]"#
    );
    assert_eq!(call(s("a,b"), "split", vec![s("")]), "empty separator");
    assert_eq!(
      call(s("x\ny\r\nz"), "splitlines", vec![]),
      r#"["x", "y", "z"]"#
    );
    assert_eq!(
      call(s("a=b=c"), "rpartition", vec![s("=")]),
      r#"("a=b", "=", "c")"#
    );
  }

  #[test]
  fn string_transforms() {
    assert_eq!(call(s("hello world"), "title", vec![]), r#""Hello World""#);
    assert_eq!(call(s("hELLO"), "capitalize", vec![]), r#""Hello""#);
    assert_eq!(call(s("  x  "), "strip", vec![]), r#""x""#);
    assert_eq!(call(s("xxaxx"), "lstrip", vec![s("x")]), r#""axx""#);
    assert_eq!(
      call(s("aaa"), "replace", vec![s("a"), s("b"), 2.into()]),
      r#""bba""#
    );
    assert_eq!(call(s("ab"), "replace", vec![s(""), s("-")]), r#""-a-b-""#);
    let parts = Value::from(vec![s("a"), s("b")]);
    assert_eq!(call(s(", "), "join", vec![parts]), r#""a, b""#);
    let bad = Value::from(vec![s("a"), 1.into()]);
    assert_eq!(
      call(s(""), "join", vec![bad]),
      "in list, want string, got int"
    );
  }

  #[test]
  fn string_format() {
    let args = vec![s("x"), 2.into()];
    assert_eq!(call(s("{} {!r} {{}}"), "format", args), r#""x 2 {}""#);
    let args = vec![s("x"), 2.into()];
    assert_eq!(call(s("{1}{0}"), "format", args), r#""2x""#);
    assert_eq!(
      call(s("{}{0}"), "format", vec![1.into()]),
      "cannot switch from automatic field numbering to manual field \
       specification"
    );
    assert_eq!(
      call(s("{}{}"), "format", vec![1.into()]),
      "tuple index out of range"
    );
  }

  #[test]
  fn list_methods() {
    let list = List::new(vec![1.into(), 2.into(), 3.into()]);
    let recv = Value::List(list.clone());
    assert_eq!(call(recv.clone(), "pop", vec![]), "3");
    let args = vec![(-1).into(), 9.into()];
    assert_eq!(call(recv.clone(), "insert", args), "None");
    assert_eq!(recv.repr(), "[1, 9, 2]");
    assert_eq!(call(recv.clone(), "index", vec![2.into()]), "2");
    assert_eq!(
      call(recv.clone(), "remove", vec![7.into()]),
      "7 not found in list"
    );
    assert_eq!(
      call(recv.clone(), "pop", vec![5.into()]),
      "list index 5 out of range [-3:3)"
    );
    list.freeze();
    assert!(call(recv, "append", vec![1.into()]).contains("frozen"));
  }

  #[test]
  fn dict_and_set_methods() {
    let dict = Dict::new();
    let recv = Value::Dict(dict.clone());
    let pairs = Value::from(vec![Value::Tuple(vec![s("a"), 1.into()].into())]);
    assert_eq!(call(recv.clone(), "update", vec![pairs]), "None");
    assert_eq!(call(recv.clone(), "setdefault", vec![s("b"), 2.into()]), "2");
    assert_eq!(call(recv.clone(), "get", vec![s("z"), 0.into()]), "0");
    assert_eq!(call(recv.clone(), "pop", vec![s("z")]), r#"missing key "z""#);
    assert_eq!(call(recv.clone(), "popitem", vec![]), r#"("a", 1)"#);
    assert_eq!(recv.repr(), r#"{"b": 2}"#);
    let bad = Value::from(vec![Value::from(vec![1.into()])]);
    assert_eq!(
      call(recv, "update", vec![bad]),
      "dictionary update sequence element #0 has length 1, want 2"
    );

    let set = Value::Set(Set::from_values(vec![1.into(), 2.into()]).unwrap());
    let other = Value::from(vec![2.into(), 3.into()]);
    assert_eq!(
      call(set.clone(), "union", vec![other.clone()]),
      "set([1, 2, 3])"
    );
    assert_eq!(
      call(set.clone(), "intersection", vec![other.clone()]),
      "set([2])"
    );
    assert_eq!(call(set.clone(), "issubset", vec![other]), "False");
    assert_eq!(call(set, "remove", vec![5.into()]), "missing key 5");
  }
}
