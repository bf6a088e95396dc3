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

//! Syntax tree data structures for the Kestrel language.
//!
//! Every node is `Copy` and lives in a `toolshed::Arena`; runtime values
//! borrow function bodies for the arena's lifetime `'i`.

#![deny(missing_docs)]

use std::fmt;
use std::path::Path;

mod layout;
mod parser;
pub use parser::{parse, parse_expr, ParseError};

pub mod resolve;
pub use resolve::{
  resolve, Binding, Dialect, FunctionInfo, Program, ResolveError,
};

pub use toolshed::Arena;

/// A source span.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Span<'i> {
  file_name: &'i Path,
  input: Option<&'i str>,
  start: usize,
  end: usize,
}

impl<'i> Span<'i> {
  /// Builds a new `Span` from raw parts.
  pub(crate) fn new_from_parts(
    file_name: &'i Path,
    input: &'i str,
    span: (usize, usize),
  ) -> Self {
    Self {
      file_name,
      input: Some(input),
      start: span.0,
      end: span.1,
    }
  }

  /// Builds a new "synthetic" span, which does not point into a real file,
  /// such as the frame of a builtin.
  pub fn synthetic(file_name: &'i Path) -> Self {
    Self {
      file_name,
      input: None,
      start: 0,
      end: 0,
    }
  }

  /// Returns the name of the file this `Span` refers to.
  pub fn file_name(&self) -> &'i Path {
    self.file_name
  }

  /// Returns whether this `Span` is synthetic, i.e., whether it does not
  /// actually point to a real file.
  pub fn is_synthetic(&self) -> bool {
    self.input.is_none()
  }

  /// Returns the offset at which this `Span` starts.
  pub fn start_byte(&self) -> usize {
    self.start
  }

  /// Returns the offset at which this `Span` ends.
  pub fn end_byte(&self) -> usize {
    self.end
  }

  /// Returns the line and column this `Span` starts at, both one-indexed.
  pub fn start_position(&self) -> Option<(usize, usize)> {
    self
      .input
      .and_then(|s| pest::Position::new(s, self.start))
      .map(|p| p.line_col())
  }

  /// Returns the line and column this `Span` ends at, both one-indexed.
  pub fn end_position(&self) -> Option<(usize, usize)> {
    self
      .input
      .and_then(|s| pest::Position::new(s, self.end))
      .map(|p| p.line_col())
  }

  /// Returns the input text that this `Span` refers to.
  pub fn input(&self) -> Option<&'i str> {
    self.input
  }

  /// Returns the text that this `Span` refers to.
  pub fn text(&self) -> Option<&'i str> {
    self.input.and_then(|s| s.get(self.start..self.end))
  }

  /// Joins two spans into a single, contiguous span.
  pub fn join(first: Span<'i>, second: Span<'i>) -> Span<'i> {
    debug_assert!(first.start <= second.end);
    Span {
      end: second.end.max(first.end),
      ..first
    }
  }
}

impl fmt::Debug for Span<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.is_synthetic() {
      return write!(f, "<{}>[?..?]", self.file_name().display());
    }
    write!(
      f,
      "<{}>[{}..{}]",
      self.file_name().display(),
      self.start_byte(),
      self.end_byte()
    )
  }
}

impl fmt::Display for Span<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self.start_position() {
      Some((line, col)) => {
        write!(f, "{}:{}:{}", self.file_name().display(), line, col)
      }
      None => write!(f, "{}", self.file_name().display()),
    }
  }
}

/// Represents a type with a file span.
pub trait Spanned<'i> {
  /// Returns the associated file span.
  fn span(&self) -> Span<'i>;
}

impl<'i> Spanned<'i> for Span<'i> {
  fn span(&self) -> Span<'i> {
    *self
  }
}

impl<'i, S> Spanned<'i> for &S
where
  S: Spanned<'i>,
{
  fn span(&self) -> Span<'i> {
    S::span(*self)
  }
}

macro_rules! spanned {
  ($($ty:ident),* $(,)?) => {$(
    impl<'i> Spanned<'i> for $ty<'i> {
      fn span(&self) -> Span<'i> {
        self.span
      }
    }
  )*};
}

spanned!(
  File, Ident, Name, Assign, Def, If, For, Return, Branch, Load, LoadBinding,
  Func, Param, Literal, Sequence, DictExpr, Comprehension, Unary, Binary, Cond,
  Lambda, Call, Arg, Dot, Index, Slice,
);

/// A `File` is a complete unit of evaluation: a parsed source file, or a
/// single parsed expression.
#[derive(Copy, Clone, Debug)]
pub struct File<'i> {
  /// The statements at the top level of this file.
  pub stmts: &'i [Stmt<'i>],
  /// Whether this file was parsed from a lone expression.
  pub is_expr: bool,
  /// The number of identifier occurrences; each `Ident::id` is below this.
  pub num_idents: u32,
  /// The number of function literals; each `Func::id` is below this.
  pub num_funcs: u32,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// An `Ident` is a name occurrence that the resolver binds to a scope slot.
#[derive(Copy, Clone, Debug)]
pub struct Ident<'i> {
  /// The name of this identifier.
  pub name: &'i str,
  /// A file-unique index, used to look up this occurrence's `Binding`.
  pub id: u32,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A `Name` is an unresolved name, such as an attribute or keyword argument.
#[derive(Copy, Clone, Debug)]
pub struct Name<'i> {
  /// The text of the name.
  pub name: &'i str,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A statement.
#[derive(Copy, Clone, Debug)]
#[allow(missing_docs)]
pub enum Stmt<'i> {
  Expr(Expr<'i>),
  Assign(Assign<'i>),
  Def(Def<'i>),
  If(If<'i>),
  For(For<'i>),
  Return(Return<'i>),
  Branch(Branch<'i>),
  Load(Load<'i>),
}

impl<'i> Spanned<'i> for Stmt<'i> {
  fn span(&self) -> Span<'i> {
    match self {
      Stmt::Expr(s) => s.span(),
      Stmt::Assign(s) => s.span(),
      Stmt::Def(s) => s.span(),
      Stmt::If(s) => s.span(),
      Stmt::For(s) => s.span(),
      Stmt::Return(s) => s.span(),
      Stmt::Branch(s) => s.span(),
      Stmt::Load(s) => s.span(),
    }
  }
}

/// An assignment `lhs = rhs`, or an augmented assignment such as `lhs += rhs`.
#[derive(Copy, Clone, Debug)]
pub struct Assign<'i> {
  /// The target: an identifier, a tuple or list of targets, an index
  /// expression or an attribute expression.
  pub lhs: &'i Expr<'i>,
  /// The operator of an augmented assignment, if this is one.
  pub op: Option<BinOp>,
  /// The assigned value.
  pub rhs: &'i Expr<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A `def` statement.
#[derive(Copy, Clone, Debug)]
pub struct Def<'i> {
  /// The name the function is bound to.
  pub name: Ident<'i>,
  /// The function itself.
  pub func: &'i Func<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// An `if` statement; `elif` chains nest in `else_block`.
#[derive(Copy, Clone, Debug)]
pub struct If<'i> {
  /// The condition.
  pub cond: &'i Expr<'i>,
  /// Statements executed when `cond` is truthy.
  pub then_block: &'i [Stmt<'i>],
  /// Statements executed otherwise; possibly empty.
  pub else_block: &'i [Stmt<'i>],
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A `for` loop.
#[derive(Copy, Clone, Debug)]
pub struct For<'i> {
  /// The loop variables, using the same target shapes as assignment.
  pub vars: &'i Expr<'i>,
  /// The iterated expression.
  pub iter: &'i Expr<'i>,
  /// The loop body.
  pub body: &'i [Stmt<'i>],
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A `return` statement.
#[derive(Copy, Clone, Debug)]
pub struct Return<'i> {
  /// The returned value; `None` if omitted.
  pub value: Option<&'i Expr<'i>>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// The kind of a `Branch` statement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BranchKind {
  Break,
  Continue,
  Pass,
}

/// One of `break`, `continue` or `pass`.
#[derive(Copy, Clone, Debug)]
pub struct Branch<'i> {
  /// Which branch this is.
  pub kind: BranchKind,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A `load` statement, which may only appear at the top level.
#[derive(Copy, Clone, Debug)]
pub struct Load<'i> {
  /// The name of the module to load.
  pub module: &'i str,
  /// The names brought into scope.
  pub bindings: &'i [LoadBinding<'i>],
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A single binding in a `load` statement, `local = "name"` or `"name"`.
#[derive(Copy, Clone, Debug)]
pub struct LoadBinding<'i> {
  /// The name bound in the loading file.
  pub local: Ident<'i>,
  /// The name exported by the loaded module.
  pub name: &'i str,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A function literal, either a `def` or a `lambda`.
#[derive(Copy, Clone, Debug)]
pub struct Func<'i> {
  /// A file-unique index, used to look up this function's `FunctionInfo`.
  pub id: u32,
  /// The function's name; `"lambda"` for lambdas.
  pub name: &'i str,
  /// The formal parameters.
  pub params: &'i [Param<'i>],
  /// The body. A lambda's body is a single `return`.
  pub body: &'i [Stmt<'i>],
  /// This AST node's span.
  pub span: Span<'i>,
}

/// The kind of a formal parameter.
#[derive(Copy, Clone, Debug)]
pub enum ParamKind<'i> {
  /// `name`.
  Required,
  /// `name = default`.
  Optional(&'i Expr<'i>),
  /// `*name`.
  Varargs,
  /// `**name`.
  Kwargs,
}

/// A formal parameter.
#[derive(Copy, Clone, Debug)]
pub struct Param<'i> {
  /// The parameter's name.
  pub name: Ident<'i>,
  /// What kind of parameter this is.
  pub kind: ParamKind<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// An expression.
#[derive(Copy, Clone, Debug)]
#[allow(missing_docs)]
pub enum Expr<'i> {
  Ident(Ident<'i>),
  Literal(Literal<'i>),
  List(Sequence<'i>),
  Tuple(Sequence<'i>),
  Dict(DictExpr<'i>),
  Comprehension(Comprehension<'i>),
  Unary(Unary<'i>),
  Binary(Binary<'i>),
  Cond(Cond<'i>),
  Lambda(Lambda<'i>),
  Call(Call<'i>),
  Dot(Dot<'i>),
  Index(Index<'i>),
  Slice(Slice<'i>),
}

impl<'i> Spanned<'i> for Expr<'i> {
  fn span(&self) -> Span<'i> {
    match self {
      Expr::Ident(e) => e.span(),
      Expr::Literal(e) => e.span(),
      Expr::List(e) => e.span(),
      Expr::Tuple(e) => e.span(),
      Expr::Dict(e) => e.span(),
      Expr::Comprehension(e) => e.span(),
      Expr::Unary(e) => e.span(),
      Expr::Binary(e) => e.span(),
      Expr::Cond(e) => e.span(),
      Expr::Lambda(e) => e.span(),
      Expr::Call(e) => e.span(),
      Expr::Dot(e) => e.span(),
      Expr::Index(e) => e.span(),
      Expr::Slice(e) => e.span(),
    }
  }
}

/// The value of a literal.
#[derive(Copy, Clone, Debug)]
pub enum LitValue<'i> {
  /// An integer literal that fits in an `i64`.
  Int(i64),
  /// A larger integer literal, as decimal digits.
  BigInt(&'i str),
  /// A floating-point literal.
  Float(f64),
  /// A string literal, unescaped.
  String(&'i [u8]),
  /// A bytes literal, unescaped.
  Bytes(&'i [u8]),
}

/// A literal constant.
#[derive(Copy, Clone, Debug)]
pub struct Literal<'i> {
  /// The literal's value.
  pub value: LitValue<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A list or tuple display.
#[derive(Copy, Clone, Debug)]
pub struct Sequence<'i> {
  /// The elements, in order.
  pub elems: &'i [Expr<'i>],
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A dict display.
#[derive(Copy, Clone, Debug)]
pub struct DictExpr<'i> {
  /// The key-value entries, in order.
  pub entries: &'i [(Expr<'i>, Expr<'i>)],
  /// This AST node's span.
  pub span: Span<'i>,
}

/// The body of a comprehension.
#[derive(Copy, Clone, Debug)]
#[allow(missing_docs)]
pub enum CompBody<'i> {
  List(&'i Expr<'i>),
  Dict(&'i Expr<'i>, &'i Expr<'i>),
}

/// A single `for` or `if` clause of a comprehension.
#[derive(Copy, Clone, Debug)]
#[allow(missing_docs)]
pub enum Clause<'i> {
  For {
    vars: &'i Expr<'i>,
    iter: &'i Expr<'i>,
    span: Span<'i>,
  },
  If {
    cond: &'i Expr<'i>,
    span: Span<'i>,
  },
}

/// A list or dict comprehension. The first clause is always a `for`.
#[derive(Copy, Clone, Debug)]
pub struct Comprehension<'i> {
  /// The value produced per iteration.
  pub body: CompBody<'i>,
  /// The clauses, outermost first.
  pub clauses: &'i [Clause<'i>],
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A unary operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum UnOp {
  Neg,
  Pos,
  Invert,
  Not,
}

impl fmt::Display for UnOp {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(match self {
      UnOp::Neg => "-",
      UnOp::Pos => "+",
      UnOp::Invert => "~",
      UnOp::Not => "not ",
    })
  }
}

/// A binary operator, including comparisons and the short-circuiting
/// `and` and `or`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  FloorDiv,
  Mod,
  BitAnd,
  BitOr,
  BitXor,
  Shl,
  Shr,
  Eq,
  Ne,
  Lt,
  Gt,
  Le,
  Ge,
  In,
  NotIn,
  And,
  Or,
}

impl BinOp {
  /// Returns whether this is one of the six comparison operators.
  pub fn is_comparison(self) -> bool {
    matches!(
      self,
      BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
    )
  }
}

impl fmt::Display for BinOp {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(match self {
      BinOp::Add => "+",
      BinOp::Sub => "-",
      BinOp::Mul => "*",
      BinOp::Div => "/",
      BinOp::FloorDiv => "//",
      BinOp::Mod => "%",
      BinOp::BitAnd => "&",
      BinOp::BitOr => "|",
      BinOp::BitXor => "^",
      BinOp::Shl => "<<",
      BinOp::Shr => ">>",
      BinOp::Eq => "==",
      BinOp::Ne => "!=",
      BinOp::Lt => "<",
      BinOp::Gt => ">",
      BinOp::Le => "<=",
      BinOp::Ge => ">=",
      BinOp::In => "in",
      BinOp::NotIn => "not in",
      BinOp::And => "and",
      BinOp::Or => "or",
    })
  }
}

/// A unary operation.
#[derive(Copy, Clone, Debug)]
pub struct Unary<'i> {
  /// The operator.
  pub op: UnOp,
  /// The operand.
  pub x: &'i Expr<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A binary operation.
#[derive(Copy, Clone, Debug)]
pub struct Binary<'i> {
  /// The operator.
  pub op: BinOp,
  /// The left operand.
  pub x: &'i Expr<'i>,
  /// The right operand.
  pub y: &'i Expr<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A conditional expression, `then_expr if cond else else_expr`.
#[derive(Copy, Clone, Debug)]
pub struct Cond<'i> {
  /// The condition.
  pub cond: &'i Expr<'i>,
  /// The value when `cond` is truthy.
  pub then_expr: &'i Expr<'i>,
  /// The value otherwise.
  pub else_expr: &'i Expr<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A `lambda` expression.
#[derive(Copy, Clone, Debug)]
pub struct Lambda<'i> {
  /// The function itself.
  pub func: &'i Func<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// The kind of an actual argument at a call site.
#[derive(Copy, Clone, Debug)]
#[allow(missing_docs)]
pub enum ArgKind<'i> {
  Positional,
  Named(Name<'i>),
  Star,
  StarStar,
}

/// An actual argument at a call site.
#[derive(Copy, Clone, Debug)]
pub struct Arg<'i> {
  /// How this argument is passed.
  pub kind: ArgKind<'i>,
  /// The argument expression.
  pub value: Expr<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A call expression.
#[derive(Copy, Clone, Debug)]
pub struct Call<'i> {
  /// The callee.
  pub fnc: &'i Expr<'i>,
  /// The arguments, in source order.
  pub args: &'i [Arg<'i>],
  /// This AST node's span.
  pub span: Span<'i>,
}

/// An attribute access, `x.name`.
#[derive(Copy, Clone, Debug)]
pub struct Dot<'i> {
  /// The receiver.
  pub x: &'i Expr<'i>,
  /// The attribute name.
  pub name: Name<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// An index expression, `x[index]`.
#[derive(Copy, Clone, Debug)]
pub struct Index<'i> {
  /// The indexed value.
  pub x: &'i Expr<'i>,
  /// The index.
  pub index: &'i Expr<'i>,
  /// This AST node's span.
  pub span: Span<'i>,
}

/// A slice expression, `x[lo:hi:step]`.
#[derive(Copy, Clone, Debug)]
pub struct Slice<'i> {
  /// The sliced value.
  pub x: &'i Expr<'i>,
  /// The lower bound, if present.
  pub lo: Option<&'i Expr<'i>>,
  /// The upper bound, if present.
  pub hi: Option<&'i Expr<'i>>,
  /// The stride, if present.
  pub step: Option<&'i Expr<'i>>,
  /// This AST node's span.
  pub span: Span<'i>,
}
