use std::ops::Range;

use splice::number::Number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    MatMul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Arg {
    pub name: Option<String>,
    pub value: Ast,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AstKind {
    None,
    Bool(bool),
    Number(Number),
    Str(String),
    Name(String),
    List(Vec<Ast>),
    Unary {
        op: UnaryOp,
        operand: Box<Ast>,
    },
    Binary {
        op: BinOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    /// `a < b <= c`
    Compare {
        first: Box<Ast>,
        rest: Vec<(CmpOp, Ast)>,
    },
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
    Call {
        callee: Box<Ast>,
        args: Vec<Arg>,
    },
    Index {
        base: Box<Ast>,
        index: Box<Ast>,
    },
    Attr {
        base: Box<Ast>,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Ast {
    pub kind: AstKind,
    pub span: Range<usize>,
}

impl Ast {
    pub(crate) fn new(kind: AstKind, span: Range<usize>) -> Self {
        Ast { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Expr(Ast),
    Assign {
        target: String,
        value: Ast,
        span: Range<usize>,
    },
}
