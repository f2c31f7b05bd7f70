use super::Value;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt;

/// Binary operators of the parameter expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    SmallerThan,
    SmallerThanOrEqual,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::FloorDivide => "//",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::SmallerThan => "<",
            BinaryOp::SmallerThanOrEqual => "<=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    /// Higher numbers bind more tightly.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual
            | BinaryOp::SmallerThan
            | BinaryOp::SmallerThanOrEqual => 4,
            BinaryOp::Add | BinaryOp::Subtract => 5,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::FloorDivide | BinaryOp::Modulo => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "not ",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            UnaryOp::Not => 3,
            UnaryOp::Negate | UnaryOp::Plus => 7,
        }
    }
}

/// The syntax tree of a parsed parameter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// A namespace lookup, either a variable (`samp_rate`) or a block
    /// parameter (`blk_0.freq`).
    Name(String),
    List(Vec<Expression>),
    Unary(UnaryOp, Box<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    Call(String, Vec<Expression>),
}

impl Expression {
    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary(op, Box::new(left), Box::new(right))
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary(op, Box::new(operand))
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::Binary(op, _, _) => op.precedence(),
            Expression::Unary(op, _) => op.precedence(),
            Expression::Literal(_)
            | Expression::Name(_)
            | Expression::List(_)
            | Expression::Call(_, _) => 9,
        }
    }

    /// Every namespace name this expression reads, sorted.
    pub fn references(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names
    }

    pub fn collect_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Expression::Name(name) => {
                names.insert(name.clone());
            }
            Expression::Binary(_, l, r) => {
                l.collect_names(names);
                r.collect_names(names);
            }
            Expression::Unary(_, v) => v.collect_names(names),
            Expression::List(items) | Expression::Call(_, items) => {
                for item in items {
                    item.collect_names(names);
                }
            }
            Expression::Literal(_) => {}
        }
    }

    /// Recursively formats the expression, adding parentheses only when necessary.
    fn fmt_with_precedence(
        &self,
        f: &mut fmt::Formatter<'_>,
        parent_precedence: u8,
    ) -> fmt::Result {
        let current_precedence = self.precedence();
        let needs_parens = current_precedence < parent_precedence;

        if needs_parens {
            write!(f, "(")?;
        }

        match self {
            Expression::Binary(op, l, r) => {
                l.fmt_with_precedence(f, current_precedence)?;
                write!(f, " {} ", op.symbol())?;
                // Right operands of equal precedence need parentheses to keep
                // left associativity visible, e.g. `a - (b - c)`.
                r.fmt_with_precedence(f, current_precedence + 1)?;
            }
            Expression::Unary(op, v) => {
                write!(f, "{}", op.symbol())?;
                v.fmt_with_precedence(f, current_precedence)?;
            }
            Expression::Literal(Value::Str(s)) => write!(f, "{:?}", s)?,
            Expression::Literal(v) => write!(f, "{}", v)?,
            Expression::Name(name) => write!(f, "{}", name)?,
            Expression::List(items) => write!(f, "[{}]", items.iter().join(", "))?,
            Expression::Call(name, args) => write!(f, "{}({})", name, args.iter().join(", "))?,
        }

        if needs_parens {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_precedence(f, 0)
    }
}
