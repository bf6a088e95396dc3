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

//! The nuts and bolts of the Kestrel parser.
//!
//! Parsing happens in two passes: `layout` splits the file into logical lines,
//! each of which pest parses on its own; then `Context::block` rebuilds the
//! nesting of compound statements from line indentation.

#![allow(clippy::upper_case_acronyms)]

use std::cell::Cell;
use std::path::Path;

use num_bigint::BigInt;

use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::iterators::Pairs;

use pest_derive::Parser;

use crate::eval::escaping;
use crate::syn;
use crate::syn::layout;
use crate::syn::layout::LogicalLine;
use crate::syn::Span;
use crate::syn::Spanned as _;

/// A `ParseError` represents a parse failure at some `Span`.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{span}: {message}")]
pub struct ParseError<'i> {
  /// The `Span` at which the error occured.
  pub span: Span<'i>,
  /// An error message.
  pub message: String,
}

type Result<'i, T> = std::result::Result<T, ParseError<'i>>;

/// Parse `input` into a `File`, returning an error on failure.
pub fn parse<'i>(
  file_name: &'i Path,
  input: &'i str,
  arena: &'i syn::Arena,
) -> Result<'i, &'i syn::File<'i>> {
  let ctx = Context::new(file_name, input, arena);

  let lines = layout::split(input).map_err(|e| ParseError {
    span: ctx.span_at(e.offset, e.offset),
    message: e.message.to_string(),
  })?;
  let lines = lines
    .iter()
    .map(|l| ctx.parse_line(l))
    .collect::<Result<'i, Vec<_>>>()?;

  let mut pos = 0;
  let stmts = ctx.block(&lines, &mut pos, 0)?;
  Ok(ctx.arena.alloc(syn::File {
    stmts: ctx.arena.alloc_vec(stmts),
    is_expr: false,
    num_idents: ctx.next_ident.get(),
    num_funcs: ctx.next_func.get(),
    span: ctx.span_at(0, input.len()),
  }))
}

/// Parse `input` as a single expression, which may span several lines.
///
/// The resulting `File` holds a single expression statement and has `is_expr`
/// set.
pub fn parse_expr<'i>(
  file_name: &'i Path,
  input: &'i str,
  arena: &'i syn::Arena,
) -> Result<'i, &'i syn::File<'i>> {
  let ctx = Context::new(file_name, input, arena);
  let pair = ctx.run(Rule::ExprLine, input)?;
  let expr = ctx.expr(pair.into_inner().next().unwrap())?;
  Ok(ctx.arena.alloc(syn::File {
    stmts: ctx.arena.alloc_vec(vec![syn::Stmt::Expr(expr)]),
    is_expr: true,
    num_idents: ctx.next_ident.get(),
    num_funcs: ctx.next_func.get(),
    span: ctx.span_at(0, input.len()),
  }))
}

#[derive(Parser)]
#[grammar = "syn/kestrel.pest"]
struct PegParser;

/// A logical line after parsing, before block assembly.
#[derive(Copy, Clone)]
struct Line<'i> {
  indent: usize,
  kind: LineKind<'i>,
  span: Span<'i>,
}

#[derive(Copy, Clone)]
enum LineKind<'i> {
  Simple(&'i [syn::Stmt<'i>]),
  Def {
    name: syn::Ident<'i>,
    params: &'i [syn::Param<'i>],
    inline: Option<&'i [syn::Stmt<'i>]>,
  },
  If {
    cond: &'i syn::Expr<'i>,
    inline: Option<&'i [syn::Stmt<'i>]>,
  },
  Elif {
    cond: &'i syn::Expr<'i>,
    inline: Option<&'i [syn::Stmt<'i>]>,
  },
  Else {
    inline: Option<&'i [syn::Stmt<'i>]>,
  },
  For {
    vars: &'i syn::Expr<'i>,
    iter: &'i syn::Expr<'i>,
    inline: Option<&'i [syn::Stmt<'i>]>,
  },
}

struct Context<'i> {
  file_name: &'i Path,
  input: &'i str,
  arena: &'i toolshed::Arena,
  /// Offset of the logical line currently being parsed.
  base: Cell<usize>,
  next_ident: Cell<u32>,
  next_func: Cell<u32>,
}

fn is_keyword(rule: Rule) -> bool {
  matches!(
    rule,
    Rule::And
      | Rule::Break
      | Rule::Continue
      | Rule::Def
      | Rule::Elif
      | Rule::Else
      | Rule::For
      | Rule::If
      | Rule::In
      | Rule::Lambda
      | Rule::Load
      | Rule::Not
      | Rule::Or
      | Rule::Pass
      | Rule::Return
  )
}

/// Iterates over the children of `pair`, skipping keyword tokens.
fn children<'i>(pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
  pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn binop(rule: Rule) -> Option<syn::BinOp> {
  use syn::BinOp::*;
  Some(match rule {
    Rule::Or => Or,
    Rule::And => And,
    Rule::EqEq => Eq,
    Rule::NotEq => Ne,
    Rule::LtEq => Le,
    Rule::GtEq => Ge,
    Rule::Lt => Lt,
    Rule::Gt => Gt,
    Rule::In => In,
    Rule::NotIn => NotIn,
    Rule::Pipe => BitOr,
    Rule::Caret => BitXor,
    Rule::Amp => BitAnd,
    Rule::ShlOp => Shl,
    Rule::ShrOp => Shr,
    Rule::Plus => Add,
    Rule::Minus => Sub,
    Rule::Star => Mul,
    Rule::SlashSlash => FloorDiv,
    Rule::Slash => Div,
    Rule::Percent => Mod,
    _ => return None,
  })
}

impl<'i> Context<'i> {
  fn new(file_name: &'i Path, input: &'i str, arena: &'i syn::Arena) -> Self {
    Context {
      file_name,
      input,
      arena,
      base: Cell::new(0),
      next_ident: Cell::new(0),
      next_func: Cell::new(0),
    }
  }

  fn span_at(&self, start: usize, end: usize) -> Span<'i> {
    Span::new_from_parts(self.file_name, self.input, (start, end))
  }

  fn span(&self, span: pest::Span<'i>) -> Span<'i> {
    let base = self.base.get();
    self.span_at(base + span.start(), base + span.end())
  }

  fn error<T>(
    &self,
    span: Span<'i>,
    message: impl Into<String>,
  ) -> Result<'i, T> {
    Err(ParseError {
      span,
      message: message.into(),
    })
  }

  /// Runs the pest parser for `rule` over `text`, which starts at `base`.
  fn run(&self, rule: Rule, text: &'i str) -> Result<'i, Pair<'i, Rule>> {
    use pest::Parser as _;
    let mut pairs: Pairs<'i, Rule> = match PegParser::parse(rule, text) {
      Ok(pairs) => pairs,
      Err(err) => {
        let (start, end) = match err.location {
          InputLocation::Pos(pos) => (pos, pos),
          InputLocation::Span(span) => span,
        };
        let rest = text.get(start..).unwrap_or("");
        let token: String = rest
          .chars()
          .take_while(|c| !c.is_whitespace())
          .take(16)
          .collect();
        let message = if token.is_empty() {
          "syntax error: unexpected end of line".to_string()
        } else {
          format!("syntax error: unexpected {:?}", token)
        };
        let base = self.base.get();
        return self.error(self.span_at(base + start, base + end), message);
      }
    };
    Ok(pairs.next().unwrap())
  }

  fn ident(&self, pair: Pair<'i, Rule>) -> syn::Ident<'i> {
    let id = self.next_ident.get();
    self.next_ident.set(id + 1);
    syn::Ident {
      name: pair.as_str(),
      id,
      span: self.span(pair.as_span()),
    }
  }

  fn func(
    &self,
    name: &'i str,
    params: &'i [syn::Param<'i>],
    body: &'i [syn::Stmt<'i>],
    span: Span<'i>,
  ) -> &'i syn::Func<'i> {
    let id = self.next_func.get();
    self.next_func.set(id + 1);
    self.arena.alloc(syn::Func {
      id,
      name,
      params,
      body,
      span,
    })
  }

  fn alloc_expr(&self, expr: syn::Expr<'i>) -> &'i syn::Expr<'i> {
    self.arena.alloc(expr)
  }

  fn alloc_stmts(&self, stmts: Vec<syn::Stmt<'i>>) -> &'i [syn::Stmt<'i>] {
    self.arena.alloc_vec(stmts)
  }

  // -- Lines and blocks. --

  fn parse_line(&self, line: &LogicalLine) -> Result<'i, Line<'i>> {
    self.base.set(line.start);
    let text = &self.input[line.start..line.end];
    let span = self.span_at(line.start, line.end);
    let mut pairs = children(self.run(Rule::Line, text)?);

    let first = pairs.next().unwrap();
    let inline = match pairs.next() {
      Some(p) if p.as_rule() == Rule::SimpleStmts => {
        Some(self.alloc_stmts(self.simple_stmts(p)?))
      }
      _ => None,
    };

    let kind = match first.as_rule() {
      Rule::SimpleStmts => {
        LineKind::Simple(self.alloc_stmts(self.simple_stmts(first)?))
      }
      Rule::DefHeader => {
        let mut pairs = children(first);
        let name = self.ident(pairs.next().unwrap());
        let params = self.params(pairs)?;
        LineKind::Def {
          name,
          params,
          inline,
        }
      }
      Rule::IfHeader => LineKind::If {
        cond: self.alloc_expr(self.expr(children(first).next().unwrap())?),
        inline,
      },
      Rule::ElifHeader => LineKind::Elif {
        cond: self.alloc_expr(self.expr(children(first).next().unwrap())?),
        inline,
      },
      Rule::ElseHeader => LineKind::Else { inline },
      Rule::ForHeader => {
        let mut pairs = children(first);
        let vars = self.loop_vars(pairs.next().unwrap())?;
        let iter = self.expr(pairs.next().unwrap())?;
        LineKind::For {
          vars: self.alloc_expr(vars),
          iter: self.alloc_expr(iter),
          inline,
        }
      }
      r => panic!("unexpected rule: {:?}", r),
    };

    Ok(Line {
      indent: line.indent,
      kind,
      span,
    })
  }

  /// Assembles the statements of the block at `indent`, starting at `pos`.
  fn block(
    &self,
    lines: &[Line<'i>],
    pos: &mut usize,
    indent: usize,
  ) -> Result<'i, Vec<syn::Stmt<'i>>> {
    let mut stmts = Vec::new();
    while let Some(line) = lines.get(*pos).copied() {
      if line.indent < indent {
        break;
      }
      if line.indent > indent {
        return self.error(line.span, "unexpected indentation");
      }
      *pos += 1;

      match line.kind {
        LineKind::Simple(simple) => stmts.extend_from_slice(simple),
        LineKind::Def {
          name,
          params,
          inline,
        } => {
          let body = self.suite(inline, lines, pos, &line)?;
          let span = self.join_body(line.span, body);
          let func = self.func(name.name, params, body, span);
          stmts.push(syn::Stmt::Def(syn::Def { name, func, span }));
        }
        LineKind::If { cond, inline } => {
          stmts.push(self.if_stmt(cond, inline, lines, pos, &line)?);
        }
        LineKind::Elif { .. } => {
          return self.error(line.span, "syntax error: unexpected elif");
        }
        LineKind::Else { .. } => {
          return self.error(line.span, "syntax error: unexpected else");
        }
        LineKind::For { vars, iter, inline } => {
          let body = self.suite(inline, lines, pos, &line)?;
          stmts.push(syn::Stmt::For(syn::For {
            vars,
            iter,
            body,
            span: self.join_body(line.span, body),
          }));
        }
      }
    }
    Ok(stmts)
  }

  /// Parses the body of the compound statement headed by `header`.
  fn suite(
    &self,
    inline: Option<&'i [syn::Stmt<'i>]>,
    lines: &[Line<'i>],
    pos: &mut usize,
    header: &Line<'i>,
  ) -> Result<'i, &'i [syn::Stmt<'i>]> {
    if let Some(stmts) = inline {
      return Ok(stmts);
    }
    match lines.get(*pos) {
      Some(next) if next.indent > header.indent => {
        let indent = next.indent;
        let stmts = self.block(lines, pos, indent)?;
        Ok(self.alloc_stmts(stmts))
      }
      _ => {
        let end = header.span.end_byte();
        self.error(self.span_at(end, end), "expected an indented block")
      }
    }
  }

  fn if_stmt(
    &self,
    cond: &'i syn::Expr<'i>,
    inline: Option<&'i [syn::Stmt<'i>]>,
    lines: &[Line<'i>],
    pos: &mut usize,
    header: &Line<'i>,
  ) -> Result<'i, syn::Stmt<'i>> {
    let then_block = self.suite(inline, lines, pos, header)?;

    let mut else_block: &'i [syn::Stmt<'i>] = &[];
    if let Some(next) = lines.get(*pos).copied() {
      if next.indent == header.indent {
        match next.kind {
          LineKind::Elif { cond, inline } => {
            *pos += 1;
            let nested = self.if_stmt(cond, inline, lines, pos, &next)?;
            else_block = self.alloc_stmts(vec![nested]);
          }
          LineKind::Else { inline } => {
            *pos += 1;
            else_block = self.suite(inline, lines, pos, &next)?;
          }
          _ => {}
        }
      }
    }

    let body = if else_block.is_empty() {
      then_block
    } else {
      else_block
    };
    Ok(syn::Stmt::If(syn::If {
      cond,
      then_block,
      else_block,
      span: self.join_body(header.span, body),
    }))
  }

  fn join_body(&self, header: Span<'i>, body: &[syn::Stmt<'i>]) -> Span<'i> {
    match body.last() {
      Some(last) => Span::join(header, last.span()),
      None => header,
    }
  }

  // -- Simple statements. --

  fn simple_stmts(
    &self,
    pair: Pair<'i, Rule>,
  ) -> Result<'i, Vec<syn::Stmt<'i>>> {
    pair.into_inner().map(|p| self.small_stmt(p)).collect()
  }

  fn small_stmt(&self, pair: Pair<'i, Rule>) -> Result<'i, syn::Stmt<'i>> {
    let span = self.span(pair.as_span());
    let stmt = match pair.as_rule() {
      Rule::ReturnStmt => {
        let value = match children(pair).next() {
          Some(p) => Some(self.alloc_expr(self.expr(p)?)),
          None => None,
        };
        syn::Stmt::Return(syn::Return { value, span })
      }
      Rule::BreakStmt => syn::Stmt::Branch(syn::Branch {
        kind: syn::BranchKind::Break,
        span,
      }),
      Rule::ContinueStmt => syn::Stmt::Branch(syn::Branch {
        kind: syn::BranchKind::Continue,
        span,
      }),
      Rule::PassStmt => syn::Stmt::Branch(syn::Branch {
        kind: syn::BranchKind::Pass,
        span,
      }),
      Rule::LoadStmt => syn::Stmt::Load(self.load(pair)?),
      Rule::ExprStmt => {
        let mut pairs = pair.into_inner();
        let lhs = self.expr(pairs.next().unwrap())?;
        let op = match pairs.next() {
          Some(op) => op,
          None => return Ok(syn::Stmt::Expr(lhs)),
        };
        let rhs = self.expr(pairs.next().unwrap())?;
        let op = match op.as_str() {
          "=" => None,
          s => binop_for_augmented(s),
        };
        self.check_target(&lhs, op.is_some())?;
        syn::Stmt::Assign(syn::Assign {
          lhs: self.alloc_expr(lhs),
          op,
          rhs: self.alloc_expr(rhs),
          span,
        })
      }
      r => panic!("unexpected rule: {:?}", r),
    };
    Ok(stmt)
  }

  fn load(&self, pair: Pair<'i, Rule>) -> Result<'i, syn::Load<'i>> {
    let span = self.span(pair.as_span());
    let mut pairs = children(pair);
    let module = self.string_value(pairs.next().unwrap())?;

    let mut bindings = Vec::new();
    for arg in pairs {
      let arg_span = self.span(arg.as_span());
      let mut inner = arg.into_inner().peekable();
      let local = match inner.peek().map(|p| p.as_rule()) {
        Some(Rule::Ident) => Some(self.ident(inner.next().unwrap())),
        _ => None,
      };
      let name_pair = inner.next().unwrap();
      let name_span = self.span(name_pair.as_span());
      let name = self.string_value(name_pair)?;
      if name.starts_with('_') {
        return self.error(
          name_span,
          format!(
            "load: names with leading underscores are not exported: {}",
            name
          ),
        );
      }
      let local = match local {
        Some(local) => local,
        None => {
          if !escaping::is_identifier(name) {
            return self
              .error(name_span, format!("load: not an identifier: {}", name));
          }
          let id = self.next_ident.get();
          self.next_ident.set(id + 1);
          syn::Ident {
            name,
            id,
            span: name_span,
          }
        }
      };
      bindings.push(syn::LoadBinding {
        local,
        name,
        span: arg_span,
      });
    }

    if bindings.is_empty() {
      return self.error(span, "load statement must import at least 1 symbol");
    }
    Ok(syn::Load {
      module,
      bindings: self.arena.alloc_vec(bindings),
      span,
    })
  }

  /// Decodes a string literal that must be valid UTF-8.
  fn string_value(&self, pair: Pair<'i, Rule>) -> Result<'i, &'i str> {
    let span = self.span(pair.as_span());
    match self.literal(pair)? {
      syn::LitValue::String(bytes) => match std::str::from_utf8(bytes) {
        Ok(s) => Ok(self.arena.alloc_str(s)),
        Err(_) => self.error(span, "invalid UTF-8 in string literal"),
      },
      _ => self.error(span, "expected a string literal"),
    }
  }

  fn check_target(
    &self,
    expr: &syn::Expr<'i>,
    augmented: bool,
  ) -> Result<'i, ()> {
    use syn::Expr;
    let what = match expr {
      Expr::Ident(_) | Expr::Index(_) | Expr::Dot(_) => return Ok(()),
      Expr::Tuple(seq) | Expr::List(seq) if !augmented => {
        for elem in seq.elems {
          self.check_target(elem, false)?;
        }
        return Ok(());
      }
      Expr::Tuple(_) | Expr::List(_) => {
        return self.error(
          expr.span(),
          "cannot perform augmented assignment on a list or tuple expression",
        )
      }
      Expr::Literal(_) => "literal",
      Expr::Dict(_) => "dict expression",
      Expr::Comprehension(_) => "comprehension",
      Expr::Unary(_) | Expr::Binary(_) => "operator expression",
      Expr::Cond(_) => "conditional expression",
      Expr::Lambda(_) => "lambda",
      Expr::Call(_) => "function call",
      Expr::Slice(_) => "slice expression",
    };
    self.error(expr.span(), format!("cannot assign to {}", what))
  }

  fn params(
    &self,
    pairs: impl Iterator<Item = Pair<'i, Rule>>,
  ) -> Result<'i, &'i [syn::Param<'i>]> {
    let mut params = Vec::new();
    for pair in pairs {
      let span = self.span(pair.as_span());
      let rule = pair.as_rule();
      let mut inner = pair.into_inner();
      let name = self.ident(inner.next().unwrap());
      let kind = match rule {
        Rule::RequiredParam => syn::ParamKind::Required,
        Rule::OptionalParam => {
          let default = self.expr(inner.next().unwrap())?;
          syn::ParamKind::Optional(self.alloc_expr(default))
        }
        Rule::VarargsParam => syn::ParamKind::Varargs,
        Rule::KwargsParam => syn::ParamKind::Kwargs,
        r => panic!("unexpected rule: {:?}", r),
      };
      params.push(syn::Param { name, kind, span });
    }
    Ok(self.arena.alloc_vec(params))
  }

  fn loop_vars(&self, pair: Pair<'i, Rule>) -> Result<'i, syn::Expr<'i>> {
    let vars = self.tuple_or_single(pair)?;
    self.check_target(&vars, false)?;
    Ok(vars)
  }

  // -- Expressions. --

  /// Builds a tuple if `pair` has any comma children; otherwise returns its
  /// single element.
  fn tuple_or_single(&self, pair: Pair<'i, Rule>) -> Result<'i, syn::Expr<'i>> {
    let span = self.span(pair.as_span());
    let mut elems = Vec::new();
    let mut has_comma = false;
    for p in pair.into_inner() {
      match p.as_rule() {
        Rule::Comma => has_comma = true,
        _ => elems.push(self.expr(p)?),
      }
    }
    if !has_comma && elems.len() == 1 {
      return Ok(elems[0]);
    }
    Ok(syn::Expr::Tuple(syn::Sequence {
      elems: self.arena.alloc_vec(elems),
      span,
    }))
  }

  /// Left-folds a chain of binary operators of equal precedence.
  fn fold(&self, pair: Pair<'i, Rule>) -> Result<'i, syn::Expr<'i>> {
    let mut pairs = pair.into_inner();
    let mut x = self.expr(pairs.next().unwrap())?;
    while let Some(op) = pairs.next() {
      let op = match binop(op.as_rule()) {
        Some(op) => op,
        None => panic!("unexpected rule: {:?}", op.as_rule()),
      };
      let y = self.expr(pairs.next().unwrap())?;
      let span = Span::join(x.span(), y.span());
      x = syn::Expr::Binary(syn::Binary {
        op,
        x: self.alloc_expr(x),
        y: self.alloc_expr(y),
        span,
      });
    }
    Ok(x)
  }

  fn expr(&self, pair: Pair<'i, Rule>) -> Result<'i, syn::Expr<'i>> {
    let span = self.span(pair.as_span());
    let expr = match pair.as_rule() {
      Rule::Expression | Rule::ParenExpr => self.tuple_or_single(pair)?,
      Rule::SliceLo | Rule::SliceHi | Rule::SliceStep | Rule::PosArg => {
        self.expr(pair.into_inner().next().unwrap())?
      }
      Rule::LambdaExpr => {
        let pairs: Vec<_> = children(pair).collect();
        let (body, params) = pairs.split_last().unwrap();
        let params = self.params(params.iter().cloned())?;
        let body = self.expr(body.clone())?;
        let ret = syn::Stmt::Return(syn::Return {
          value: Some(self.alloc_expr(body)),
          span: body.span(),
        });
        let body = self.alloc_stmts(vec![ret]);
        let func = self.func("lambda", params, body, span);
        syn::Expr::Lambda(syn::Lambda { func, span })
      }
      Rule::CondExpr => {
        let mut pairs = children(pair);
        let then_expr = self.expr(pairs.next().unwrap())?;
        match pairs.next() {
          None => then_expr,
          Some(cond) => {
            let cond = self.expr(cond)?;
            let else_expr = self.expr(pairs.next().unwrap())?;
            syn::Expr::Cond(syn::Cond {
              cond: self.alloc_expr(cond),
              then_expr: self.alloc_expr(then_expr),
              else_expr: self.alloc_expr(else_expr),
              span,
            })
          }
        }
      }
      Rule::OrTest
      | Rule::AndTest
      | Rule::Comparison
      | Rule::BitOr
      | Rule::BitXor
      | Rule::BitAnd
      | Rule::Shift
      | Rule::Arith
      | Rule::Term => self.fold(pair)?,
      Rule::NotTest => {
        let pairs: Vec<_> = pair.into_inner().collect();
        let (operand, nots) = pairs.split_last().unwrap();
        let mut x = self.expr(operand.clone())?;
        for not in nots.iter().rev() {
          let span = Span::join(self.span(not.as_span()), x.span());
          x = syn::Expr::Unary(syn::Unary {
            op: syn::UnOp::Not,
            x: self.alloc_expr(x),
            span,
          });
        }
        x
      }
      Rule::Factor => {
        let pairs: Vec<_> = pair.into_inner().collect();
        let (operand, ops) = pairs.split_last().unwrap();
        let mut x = self.expr(operand.clone())?;
        for op in ops.iter().rev() {
          let span = Span::join(self.span(op.as_span()), x.span());
          let op = match op.as_rule() {
            Rule::Plus => syn::UnOp::Pos,
            Rule::Minus => syn::UnOp::Neg,
            Rule::Tilde => syn::UnOp::Invert,
            r => panic!("unexpected rule: {:?}", r),
          };
          x = syn::Expr::Unary(syn::Unary {
            op,
            x: self.alloc_expr(x),
            span,
          });
        }
        x
      }
      Rule::Primary => {
        let mut pairs = pair.into_inner();
        let mut x = self.expr(pairs.next().unwrap())?;
        for suffix in pairs {
          x = self.suffix(x, suffix)?;
        }
        x
      }
      Rule::Ident => syn::Expr::Ident(self.ident(pair)),
      Rule::IntLit
      | Rule::FloatLit
      | Rule::StringLit
      | Rule::BytesLit => syn::Expr::Literal(syn::Literal {
        value: self.literal(pair)?,
        span,
      }),
      Rule::ListExpr => {
        let (elems, clauses) = self.display(pair, |p| self.expr(p))?;
        if clauses.is_empty() {
          syn::Expr::List(syn::Sequence {
            elems: self.arena.alloc_vec(elems),
            span,
          })
        } else {
          syn::Expr::Comprehension(syn::Comprehension {
            body: syn::CompBody::List(self.alloc_expr(elems[0])),
            clauses: self.arena.alloc_vec(clauses),
            span,
          })
        }
      }
      Rule::DictExpr => {
        let (entries, clauses) = self.display(pair, |p| {
          let mut pairs = p.into_inner();
          let k = self.expr(pairs.next().unwrap())?;
          let v = self.expr(pairs.next().unwrap())?;
          Ok((k, v))
        })?;
        if clauses.is_empty() {
          syn::Expr::Dict(syn::DictExpr {
            entries: self.arena.alloc_vec(entries),
            span,
          })
        } else {
          let (k, v) = entries[0];
          syn::Expr::Comprehension(syn::Comprehension {
            body: syn::CompBody::Dict(self.alloc_expr(k), self.alloc_expr(v)),
            clauses: self.arena.alloc_vec(clauses),
            span,
          })
        }
      }
      r => panic!("unexpected rule: {:?}", r),
    };
    Ok(expr)
  }

  /// Splits the children of a list or dict display into its elements and
  /// comprehension clauses.
  fn display<T>(
    &self,
    pair: Pair<'i, Rule>,
    elem: impl Fn(Pair<'i, Rule>) -> Result<'i, T>,
  ) -> Result<'i, (Vec<T>, Vec<syn::Clause<'i>>)> {
    let mut elems = Vec::new();
    let mut clauses = Vec::new();
    for p in pair.into_inner() {
      let span = self.span(p.as_span());
      match p.as_rule() {
        Rule::CompFor => {
          let mut pairs = children(p);
          let vars = self.loop_vars(pairs.next().unwrap())?;
          let iter = self.expr(pairs.next().unwrap())?;
          clauses.push(syn::Clause::For {
            vars: self.alloc_expr(vars),
            iter: self.alloc_expr(iter),
            span,
          });
        }
        Rule::CompIf => {
          let cond = self.expr(children(p).next().unwrap())?;
          clauses.push(syn::Clause::If {
            cond: self.alloc_expr(cond),
            span,
          });
        }
        _ => elems.push(elem(p)?),
      }
    }
    Ok((elems, clauses))
  }

  fn suffix(
    &self,
    x: syn::Expr<'i>,
    pair: Pair<'i, Rule>,
  ) -> Result<'i, syn::Expr<'i>> {
    let span = Span::join(x.span(), self.span(pair.as_span()));
    let x = self.alloc_expr(x);
    let expr = match pair.as_rule() {
      Rule::DotSuffix => {
        let name = pair.into_inner().next().unwrap();
        syn::Expr::Dot(syn::Dot {
          x,
          name: syn::Name {
            name: name.as_str(),
            span: self.span(name.as_span()),
          },
          span,
        })
      }
      Rule::CallSuffix => {
        let mut args = Vec::new();
        for arg in pair.into_inner() {
          let arg_span = self.span(arg.as_span());
          let rule = arg.as_rule();
          let mut inner = arg.into_inner();
          let kind = match rule {
            Rule::PosArg => syn::ArgKind::Positional,
            Rule::VarargsArg => syn::ArgKind::Star,
            Rule::KwargsArg => syn::ArgKind::StarStar,
            Rule::NamedArg => {
              let name = inner.next().unwrap();
              syn::ArgKind::Named(syn::Name {
                name: name.as_str(),
                span: self.span(name.as_span()),
              })
            }
            r => panic!("unexpected rule: {:?}", r),
          };
          args.push(syn::Arg {
            kind,
            value: self.expr(inner.next().unwrap())?,
            span: arg_span,
          });
        }
        syn::Expr::Call(syn::Call {
          fnc: x,
          args: self.arena.alloc_vec(args),
          span,
        })
      }
      Rule::Subscript => {
        let mut lo = None;
        let mut hi = None;
        let mut step = None;
        let mut colons = 0;
        for p in pair.into_inner() {
          match p.as_rule() {
            Rule::SliceColon => colons += 1,
            Rule::SliceLo => lo = Some(self.expr(p)?),
            Rule::SliceHi => hi = Some(self.alloc_expr(self.expr(p)?)),
            Rule::SliceStep => step = Some(self.alloc_expr(self.expr(p)?)),
            r => panic!("unexpected rule: {:?}", r),
          }
        }
        if colons == 0 {
          return match lo {
            Some(index) => Ok(syn::Expr::Index(syn::Index {
              x,
              index: self.alloc_expr(index),
              span,
            })),
            None => self.error(span, "syntax error: empty subscript"),
          };
        }
        if let Some(syn::Expr::Tuple(t)) = lo {
          return self.error(t.span, "syntax error: invalid slice");
        }
        syn::Expr::Slice(syn::Slice {
          x,
          lo: lo.map(|lo| self.alloc_expr(lo)),
          hi,
          step,
          span,
        })
      }
      r => panic!("unexpected rule: {:?}", r),
    };
    Ok(expr)
  }

  // -- Literals. --

  fn literal(&self, pair: Pair<'i, Rule>) -> Result<'i, syn::LitValue<'i>> {
    let span = self.span(pair.as_span());
    let text = pair.as_str();
    match pair.as_rule() {
      Rule::IntLit => self.int_literal(text, span),
      Rule::FloatLit => match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(syn::LitValue::Float(f)),
        _ => self.error(span, format!("invalid float literal: {}", text)),
      },
      Rule::StringLit | Rule::BytesLit => {
        let is_bytes = pair.as_rule() == Rule::BytesLit;
        let prefix_len = text.find(|c| c == '"' || c == '\'').unwrap_or(0);
        let (prefix, quoted) = text.split_at(prefix_len);
        let raw = prefix.contains(|c| c == 'r' || c == 'R');
        let quote_len = if quoted.len() >= 6
          && (quoted.starts_with("\"\"\"") || quoted.starts_with("'''"))
        {
          3
        } else {
          1
        };
        let body = &quoted[quote_len..quoted.len() - quote_len];
        let value = escaping::unescape_literal(body, raw, is_bytes)
          .map_err(|message| ParseError { span, message })?;
        let value = self.arena.alloc_vec(value);
        Ok(if is_bytes {
          syn::LitValue::Bytes(value)
        } else {
          syn::LitValue::String(value)
        })
      }
      r => panic!("unexpected rule: {:?}", r),
    }
  }

  fn int_literal(
    &self,
    text: &'i str,
    span: Span<'i>,
  ) -> Result<'i, syn::LitValue<'i>> {
    let lower = text.get(..2).map(|s| s.to_ascii_lowercase());
    let (digits, radix) = match lower.as_deref() {
      Some("0x") => (&text[2..], 16),
      Some("0o") => (&text[2..], 8),
      Some("0b") => (&text[2..], 2),
      _ => {
        let nonzero = text.bytes().any(|b| b != b'0');
        if text.len() > 1 && text.starts_with('0') && nonzero {
          return self.error(
            span,
            format!("obsolete form of octal literal; use 0o{}", &text[1..]),
          );
        }
        (text, 10)
      }
    };
    if let Ok(n) = i64::from_str_radix(digits, radix) {
      return Ok(syn::LitValue::Int(n));
    }
    match BigInt::parse_bytes(digits.as_bytes(), radix) {
      Some(n) => {
        Ok(syn::LitValue::BigInt(self.arena.alloc_str(&n.to_string())))
      }
      None => self.error(span, format!("invalid int literal: {}", text)),
    }
  }
}

fn binop_for_augmented(op: &str) -> Option<syn::BinOp> {
  use syn::BinOp::*;
  Some(match op {
    "+=" => Add,
    "-=" => Sub,
    "*=" => Mul,
    "/=" => Div,
    "//=" => FloorDiv,
    "%=" => Mod,
    "&=" => BitAnd,
    "|=" => BitOr,
    "^=" => BitXor,
    "<<=" => Shl,
    ">>=" => Shr,
    _ => return None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::syn::{BinOp, Expr, LitValue, Stmt};
  use pretty_assertions::assert_eq;

  fn with_file<R>(
    src: &str,
    f: impl for<'a> FnOnce(&'a syn::File<'a>) -> R,
  ) -> R {
    let arena = syn::Arena::new();
    let file = parse(Path::new("test.kes"), src, &arena).unwrap();
    f(file)
  }

  fn parse_err(src: &str) -> String {
    let arena = syn::Arena::new();
    let err = parse(Path::new("test.kes"), src, &arena).unwrap_err();
    err.to_string()
  }

  #[test]
  fn precedence() {
    with_file("x = 1 + 2 * 3\n", |file| {
      let assign = match file.stmts[0] {
        Stmt::Assign(a) => a,
        s => panic!("{:?}", s),
      };
      match assign.rhs {
        Expr::Binary(b) => {
          assert_eq!(b.op, BinOp::Add);
          assert!(matches!(b.y, Expr::Binary(m) if m.op == BinOp::Mul));
        }
        e => panic!("{:?}", e),
      }
    });
  }

  #[test]
  fn blocks_and_elif_chains() {
    let src = "
def f(x):
  if x == 1:
    return 'a'
  elif x == 2:
    return 'b'
  else:
    pass
  for i in range(3): print(i)
y = f(1)
";
    with_file(src, |file| {
      assert_eq!(file.stmts.len(), 2);
      let def = match file.stmts[0] {
        Stmt::Def(d) => d,
        s => panic!("{:?}", s),
      };
      assert_eq!(def.name.name, "f");
      assert_eq!(def.func.body.len(), 2);
      let outer = match def.func.body[0] {
        Stmt::If(i) => i,
        s => panic!("{:?}", s),
      };
      assert_eq!(outer.else_block.len(), 1);
      assert!(matches!(
        outer.else_block[0],
        Stmt::If(i) if i.else_block.len() == 1
      ));
      assert!(matches!(def.func.body[1], Stmt::For(_)));
    });
  }

  #[test]
  fn slices_and_comprehensions() {
    let src = "\
a = x[::-1]
b = [i for i in y if i]
c = {k: v for k, v in z}
";
    with_file(src, |file| {
      let rhs: Vec<_> = file
        .stmts
        .iter()
        .map(|s| match s {
          Stmt::Assign(a) => *a.rhs,
          s => panic!("{:?}", s),
        })
        .collect();
      assert!(matches!(
        rhs[0],
        Expr::Slice(s) if s.lo.is_none() && s.hi.is_none() && s.step.is_some()
      ));
      assert!(matches!(
        rhs[1],
        Expr::Comprehension(c) if c.clauses.len() == 2
      ));
      assert!(matches!(
        rhs[2],
        Expr::Comprehension(c) if matches!(c.body, syn::CompBody::Dict(..))
      ));
    });
  }

  #[test]
  fn literals() {
    with_file("0x10; 99999999999999999999; 1.5e3; 'a\\tb'; b'\\xff'\n", |file| {
      let lits: Vec<_> = file
        .stmts
        .iter()
        .map(|s| match s {
          Stmt::Expr(Expr::Literal(l)) => l.value,
          s => panic!("{:?}", s),
        })
        .collect();
      assert!(matches!(lits[0], LitValue::Int(16)));
      assert!(matches!(lits[1], LitValue::BigInt("99999999999999999999")));
      assert!(matches!(lits[2], LitValue::Float(f) if f == 1500.0));
      assert!(matches!(lits[3], LitValue::String(b"a\tb")));
      assert!(matches!(lits[4], LitValue::Bytes(b"\xff")));
    });
  }

  #[test]
  fn load_bindings() {
    with_file("load('m.kes', 'a', b = 'c')\n", |file| match file.stmts[0] {
      Stmt::Load(l) => {
        assert_eq!(l.module, "m.kes");
        assert_eq!(l.bindings[0].local.name, "a");
        assert_eq!(l.bindings[1].local.name, "b");
        assert_eq!(l.bindings[1].name, "c");
      }
      s => panic!("{:?}", s),
    });
  }

  #[test]
  fn errors() {
    let cases = [
      ("  x = 1\n", "1:3: unexpected indentation"),
      ("if x:\ny = 1\n", "1:6: expected an indented block"),
      ("else:\n  pass\n", "1:1: syntax error: unexpected else"),
      ("f() = 1\n", "1:1: cannot assign to function call"),
      ("x = 0777\n", "1:5: obsolete form of octal literal; use 0o777"),
      ("x[1, 2:3]\n", "1:3: syntax error: invalid slice"),
    ];
    for (src, want) in cases {
      assert_eq!(parse_err(src), format!("test.kes:{}", want));
    }
  }

  #[test]
  fn spans_are_file_relative() {
    with_file("x = 1\n\ny = zz\n", |file| match file.stmts[1] {
      Stmt::Assign(a) => {
        assert_eq!(a.rhs.span().start_position(), Some((3, 5)));
        assert_eq!(a.rhs.span().text(), Some("zz"));
      }
      s => panic!("{:?}", s),
    });
  }
}
