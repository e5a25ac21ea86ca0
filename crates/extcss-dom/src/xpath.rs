//! [XPath 1.0](https://www.w3.org/TR/1999/REC-xpath-19991116/) subset evaluator.
//!
//! Supports location paths over all axes except `namespace`, the abbreviated
//! syntax (`//`, `.`, `..`, `@`), predicates, unions, boolean/equality/
//! relational/additive operators and the core string/boolean/number
//! functions. Results are returned in document order without duplicates.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::{DomTree, NodeId, NodeType};

/// Errors raised while compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XPathError {
    /// The expression stopped in the middle of a construct.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// A token appeared where the grammar does not allow it.
    #[error("unexpected token `{0}`")]
    UnexpectedToken(String),
    /// A character that starts no token.
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    /// A string literal without its closing quote.
    #[error("unterminated string literal")]
    UnterminatedLiteral,
    /// An axis name outside the XPath 1.0 axis list.
    #[error("unknown axis `{0}`")]
    UnknownAxis(String),
    /// A function this evaluator does not implement.
    #[error("unknown function `{0}()`")]
    UnknownFunction(String),
    /// A function called with the wrong number of arguments.
    #[error("wrong number of arguments for `{0}()`")]
    Arity(String),
    /// A node-set was required (path step, union, `count()`).
    #[error("expression does not evaluate to a node-set")]
    NotANodeSet,
}

/// Evaluate `expression` with `context` as the context node and return the
/// selected tree nodes in document order. Attribute nodes are dropped.
///
/// # Errors
///
/// Returns [`XPathError`] if the expression is malformed or does not
/// evaluate to a node-set.
pub fn evaluate(tree: &DomTree, context: NodeId, expression: &str) -> Result<Vec<NodeId>, XPathError> {
    let expr = compile(expression)?;
    let evaluator = Evaluator::new(tree, context);
    let value = evaluator.eval(
        &expr,
        &Context {
            node: XNode::Node(context),
            position: 1,
            size: 1,
        },
    )?;
    match value {
        Value::Nodes(nodes) => Ok(nodes
            .into_iter()
            .filter_map(|n| match n {
                XNode::Node(id) => Some(id),
                XNode::Attr(..) => None,
            })
            .collect()),
        _ => Err(XPathError::NotANodeSet),
    }
}

/// Parse an expression without evaluating it.
///
/// # Errors
///
/// Returns [`XPathError`] if the expression is malformed.
pub fn validate(expression: &str) -> Result<(), XPathError> {
    compile(expression).map(|_| ())
}

impl DomTree {
    /// [`evaluate`] with this tree.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError`] if the expression is malformed or does not
    /// select nodes.
    pub fn evaluate_xpath(&self, context: NodeId, expression: &str) -> Result<Vec<NodeId>, XPathError> {
        evaluate(self, context, expression)
    }
}

fn compile(expression: &str) -> Result<Expr, XPathError> {
    let tokens = lex(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(XPathError::UnexpectedToken(tok.to_string())),
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Slash,
    DoubleSlash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    Pipe,
    ColonColon,
    Star,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Literal(String),
    Number(f64),
    Name(String),
}

impl std::fmt::Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Slash => "/",
            Self::DoubleSlash => "//",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Dot => ".",
            Self::DotDot => "..",
            Self::At => "@",
            Self::Comma => ",",
            Self::Pipe => "|",
            Self::ColonColon => "::",
            Self::Star => "*",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Literal(s) | Self::Name(s) => s,
            Self::Number(n) => return write!(f, "{n}"),
        };
        f.write_str(text)
    }
}

fn lex(input: &str) -> Result<Vec<Tok>, XPathError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        let tok = match c {
            c if c.is_whitespace() => continue,
            '/' if chars.peek() == Some(&'/') => {
                let _ = chars.next();
                Tok::DoubleSlash
            }
            '/' => Tok::Slash,
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '[' => Tok::LBracket,
            ']' => Tok::RBracket,
            '@' => Tok::At,
            ',' => Tok::Comma,
            '|' => Tok::Pipe,
            '*' => Tok::Star,
            '=' => Tok::Eq,
            '+' => Tok::Plus,
            '-' => Tok::Minus,
            ':' if chars.peek() == Some(&':') => {
                let _ = chars.next();
                Tok::ColonColon
            }
            '!' if chars.peek() == Some(&'=') => {
                let _ = chars.next();
                Tok::NotEq
            }
            '<' | '>' => {
                let or_equal = chars.peek() == Some(&'=');
                if or_equal {
                    let _ = chars.next();
                }
                match (c, or_equal) {
                    ('<', false) => Tok::Lt,
                    ('<', true) => Tok::Le,
                    (_, false) => Tok::Gt,
                    (_, true) => Tok::Ge,
                }
            }
            '"' | '\'' => {
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == c => break,
                        Some(ch) => literal.push(ch),
                        None => return Err(XPathError::UnterminatedLiteral),
                    }
                }
                Tok::Literal(literal)
            }
            '.' if chars.peek() == Some(&'.') => {
                let _ = chars.next();
                Tok::DotDot
            }
            '.' if chars.peek().is_some_and(char::is_ascii_digit) => {
                let mut number = String::from("0.");
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    number.push(d);
                    let _ = chars.next();
                }
                Tok::Number(number.parse().unwrap_or(f64::NAN))
            }
            '.' => Tok::Dot,
            c if c.is_ascii_digit() => {
                let mut number = String::from(c);
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit() || **d == '.') {
                    number.push(d);
                    let _ = chars.next();
                }
                Tok::Number(number.parse().unwrap_or(f64::NAN))
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::from(c);
                while let Some(&d) = chars
                    .peek()
                    .filter(|d| d.is_alphanumeric() || matches!(d, '-' | '_' | '.'))
                {
                    name.push(d);
                    let _ = chars.next();
                }
                Tok::Name(name)
            }
            other => return Err(XPathError::UnexpectedChar(other)),
        };
        tokens.push(tok);
    }
    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Parent,
    Preceding,
    PrecedingSibling,
    SelfAxis,
}

impl Axis {
    fn from_name(name: &str) -> Result<Self, XPathError> {
        Ok(match name {
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "attribute" => Self::Attribute,
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "following" => Self::Following,
            "following-sibling" => Self::FollowingSibling,
            "parent" => Self::Parent,
            "preceding" => Self::Preceding,
            "preceding-sibling" => Self::PrecedingSibling,
            "self" => Self::SelfAxis,
            other => return Err(XPathError::UnknownAxis(other.to_string())),
        })
    }

    const fn is_reverse(self) -> bool {
        matches!(
            self,
            Self::Ancestor | Self::AncestorOrSelf | Self::Preceding | Self::PrecedingSibling
        )
    }
}

#[derive(Debug, Clone)]
enum NodeTest {
    Name(String),
    Any,
    Node,
    Text,
    Comment,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

impl Step {
    const fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

#[derive(Debug, Clone)]
enum Expr {
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path { absolute: bool, steps: Vec<Step> },
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    Call(String, Vec<Expr>),
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), XPathError> {
        match self.bump() {
            Some(ref t) if t == tok => Ok(()),
            Some(t) => Err(XPathError::UnexpectedToken(t.to_string())),
            None => Err(XPathError::UnexpectedEnd),
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Name(n)) if n == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_equality()?;
        while self.eat_keyword("and") {
            let right = self.parse_equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => BinaryOp::Eq,
                Some(Tok::NotEq) => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Lt) => BinaryOp::Lt,
                Some(Tok::Le) => BinaryOp::Le,
                Some(Tok::Gt) => BinaryOp::Gt,
                Some(Tok::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinaryOp::Add,
                Some(Tok::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_path()?;
        while self.eat(&Tok::Pipe) {
            let right = self.parse_path()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn starts_filter_expr(&self) -> bool {
        match self.peek() {
            Some(Tok::Literal(_) | Tok::Number(_) | Tok::LParen) => true,
            Some(Tok::Name(name)) => {
                self.peek_at(1) == Some(&Tok::LParen)
                    && !matches!(
                        name.as_str(),
                        "node" | "text" | "comment" | "processing-instruction"
                    )
            }
            _ => false,
        }
    }

    fn parse_path(&mut self) -> Result<Expr, XPathError> {
        if self.starts_filter_expr() {
            let primary = self.parse_primary()?;
            let predicates = self.parse_predicates()?;
            let mut steps = Vec::new();
            self.parse_trailing_steps(&mut steps)?;
            if predicates.is_empty() && steps.is_empty() {
                return Ok(primary);
            }
            return Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
                steps,
            });
        }

        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Tok::Slash) => {
                self.pos += 1;
                if self.starts_step() {
                    steps.push(self.parse_step()?);
                }
                true
            }
            Some(Tok::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
                steps.push(self.parse_step()?);
                true
            }
            _ => {
                steps.push(self.parse_step()?);
                false
            }
        };
        self.parse_trailing_steps(&mut steps)?;
        Ok(Expr::Path { absolute, steps })
    }

    fn parse_trailing_steps(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        loop {
            match self.peek() {
                Some(Tok::Slash) => {
                    self.pos += 1;
                    steps.push(self.parse_step()?);
                }
                Some(Tok::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(Step::descendant_or_self());
                    steps.push(self.parse_step()?);
                }
                _ => return Ok(()),
            }
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Tok::Name(_) | Tok::Star | Tok::At | Tok::Dot | Tok::DotDot)
        )
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Tok::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Tok::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = if self.eat(&Tok::At) {
            Axis::Attribute
        } else if let (Some(Tok::Name(name)), Some(Tok::ColonColon)) = (self.peek(), self.peek_at(1)) {
            let axis = Axis::from_name(name)?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };

        let test = match self.bump() {
            Some(Tok::Star) => NodeTest::Any,
            Some(Tok::Name(name)) => {
                if self.peek() == Some(&Tok::LParen) {
                    self.pos += 1;
                    self.expect(&Tok::RParen)?;
                    match name.as_str() {
                        "node" => NodeTest::Node,
                        "text" => NodeTest::Text,
                        "comment" => NodeTest::Comment,
                        _ => return Err(XPathError::UnexpectedToken(name)),
                    }
                } else {
                    NodeTest::Name(name.to_ascii_lowercase())
                }
            }
            Some(other) => return Err(XPathError::UnexpectedToken(other.to_string())),
            None => return Err(XPathError::UnexpectedEnd),
        };

        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Tok::LBracket) {
            predicates.push(self.parse_or()?);
            self.expect(&Tok::RBracket)?;
        }
        Ok(predicates)
    }

    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        match self.bump() {
            Some(Tok::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Tok::Number(n)) => Ok(Expr::Number(n)),
            Some(Tok::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::Name(name)) => {
                self.expect(&Tok::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Tok::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Tok::RParen) {
                            break;
                        }
                        self.expect(&Tok::Comma)?;
                    }
                }
                Ok(Expr::Call(name, args))
            }
            Some(other) => Err(XPathError::UnexpectedToken(other.to_string())),
            None => Err(XPathError::UnexpectedEnd),
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum XNode {
    Node(NodeId),
    Attr(NodeId, String),
}

#[derive(Debug, Clone)]
enum Value {
    Nodes(Vec<XNode>),
    Str(String),
    Num(f64),
    Bool(bool),
}

struct Context {
    node: XNode,
    position: usize,
    size: usize,
}

struct Evaluator<'a> {
    tree: &'a DomTree,
    /// Pre-order index of every node in the context's tree.
    order: HashMap<NodeId, usize>,
    /// Root of the context's tree (the document for connected nodes).
    root: NodeId,
}

impl<'a> Evaluator<'a> {
    fn new(tree: &'a DomTree, context: NodeId) -> Self {
        let root = tree.ancestors(context).last().unwrap_or(context);
        let mut order = HashMap::new();
        let _ = order.insert(root, 0);
        for (index, node) in tree.descendants(root).into_iter().enumerate() {
            let _ = order.insert(node, index + 1);
        }
        Self { tree, order, root }
    }

    fn document_order(&self, a: &XNode, b: &XNode) -> Ordering {
        let key = |n: &XNode| match n {
            XNode::Node(id) => (self.order.get(id).copied().unwrap_or(usize::MAX), 0, String::new()),
            XNode::Attr(id, name) => (
                self.order.get(id).copied().unwrap_or(usize::MAX),
                1,
                name.clone(),
            ),
        };
        key(a).cmp(&key(b))
    }

    fn sort_unique(&self, nodes: &mut Vec<XNode>) {
        nodes.sort_by(|a, b| self.document_order(a, b));
        nodes.dedup();
    }

    fn eval(&self, expr: &Expr, ctx: &Context) -> Result<Value, XPathError> {
        match expr {
            Expr::Literal(s) => Ok(Value::Str(s.clone())),
            Expr::Number(n) => Ok(Value::Num(*n)),
            Expr::Negate(inner) => Ok(Value::Num(-self.to_number(&self.eval(inner, ctx)?))),
            Expr::Union(left, right) => {
                let (Value::Nodes(mut a), Value::Nodes(b)) = (self.eval(left, ctx)?, self.eval(right, ctx)?) else {
                    return Err(XPathError::NotANodeSet);
                };
                a.extend(b);
                self.sort_unique(&mut a);
                Ok(Value::Nodes(a))
            }
            Expr::Binary(op, left, right) => self.eval_binary(*op, left, right, ctx),
            Expr::Call(name, args) => self.call(name, args, ctx),
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    XNode::Node(self.root)
                } else {
                    ctx.node.clone()
                };
                self.eval_steps(vec![start], steps).map(Value::Nodes)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let Value::Nodes(mut nodes) = self.eval(primary, ctx)? else {
                    return Err(XPathError::NotANodeSet);
                };
                self.sort_unique(&mut nodes);
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                self.eval_steps(nodes, steps).map(Value::Nodes)
            }
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr, ctx: &Context) -> Result<Value, XPathError> {
        match op {
            BinaryOp::Or => {
                let l = self.to_bool(&self.eval(left, ctx)?);
                Ok(Value::Bool(l || self.to_bool(&self.eval(right, ctx)?)))
            }
            BinaryOp::And => {
                let l = self.to_bool(&self.eval(left, ctx)?);
                Ok(Value::Bool(l && self.to_bool(&self.eval(right, ctx)?)))
            }
            BinaryOp::Add | BinaryOp::Sub => {
                let l = self.to_number(&self.eval(left, ctx)?);
                let r = self.to_number(&self.eval(right, ctx)?);
                Ok(Value::Num(if matches!(op, BinaryOp::Add) { l + r } else { l - r }))
            }
            _ => {
                let l = self.eval(left, ctx)?;
                let r = self.eval(right, ctx)?;
                Ok(Value::Bool(self.compare(op, &l, &r)))
            }
        }
    }

    /// [§ 3.4 Booleans](https://www.w3.org/TR/1999/REC-xpath-19991116/#booleans)
    fn compare(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(a), Value::Nodes(b)) => a.iter().any(|x| {
                let sx = self.string_value(x);
                b.iter()
                    .any(|y| self.compare_atoms(op, &Value::Str(sx.clone()), &Value::Str(self.string_value(y))))
            }),
            (Value::Nodes(nodes), other) => nodes
                .iter()
                .any(|n| self.compare_atoms(op, &self.node_as(n, other), other)),
            (other, Value::Nodes(nodes)) => nodes
                .iter()
                .any(|n| self.compare_atoms(op, other, &self.node_as(n, other))),
            _ => self.compare_atoms(op, left, right),
        }
    }

    /// Convert a node to the type of the other comparison operand.
    fn node_as(&self, node: &XNode, other: &Value) -> Value {
        let s = self.string_value(node);
        match other {
            Value::Num(_) => Value::Num(parse_number(&s)),
            Value::Bool(_) => Value::Bool(true),
            _ => Value::Str(s),
        }
    }

    #[allow(clippy::float_cmp)]
    fn compare_atoms(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                let equal = match (left, right) {
                    (Value::Bool(_), _) | (_, Value::Bool(_)) => self.to_bool(left) == self.to_bool(right),
                    (Value::Num(_), _) | (_, Value::Num(_)) => self.to_number(left) == self.to_number(right),
                    _ => self.to_string(left) == self.to_string(right),
                };
                equal == matches!(op, BinaryOp::Eq)
            }
            _ => {
                let l = self.to_number(left);
                let r = self.to_number(right);
                match op {
                    BinaryOp::Lt => l < r,
                    BinaryOp::Le => l <= r,
                    BinaryOp::Gt => l > r,
                    _ => l >= r,
                }
            }
        }
    }

    fn eval_steps(&self, mut nodes: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>, XPathError> {
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                let mut selected: Vec<XNode> = self
                    .axis(node, step.axis)
                    .into_iter()
                    .filter(|candidate| self.node_test(candidate, &step.test, step.axis))
                    .collect();
                for predicate in &step.predicates {
                    selected = self.filter(selected, predicate)?;
                }
                next.extend(selected);
            }
            self.sort_unique(&mut next);
            nodes = next;
        }
        Ok(nodes)
    }

    /// Apply a predicate to nodes given in axis order.
    fn filter(&self, nodes: Vec<XNode>, predicate: &Expr) -> Result<Vec<XNode>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node: node.clone(),
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                #[allow(clippy::float_cmp, clippy::cast_precision_loss)]
                Value::Num(n) => n == ctx.position as f64,
                other => self.to_bool(&other),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along `axis`, in axis order (reverse axes nearest-first).
    fn axis(&self, node: &XNode, axis: Axis) -> Vec<XNode> {
        let tree = self.tree;
        let id = match node {
            XNode::Node(id) => *id,
            XNode::Attr(owner, _) => {
                return match axis {
                    Axis::Parent => vec![XNode::Node(*owner)],
                    Axis::SelfAxis => vec![node.clone()],
                    Axis::Ancestor | Axis::AncestorOrSelf => {
                        let mut out = Vec::new();
                        if axis == Axis::AncestorOrSelf {
                            out.push(node.clone());
                        }
                        out.push(XNode::Node(*owner));
                        out.extend(tree.ancestors(*owner).map(XNode::Node));
                        out
                    }
                    _ => Vec::new(),
                };
            }
        };

        let wrap = |ids: Vec<NodeId>| ids.into_iter().map(XNode::Node).collect::<Vec<_>>();
        match axis {
            Axis::Child => wrap(tree.children(id).to_vec()),
            Axis::Descendant => wrap(tree.descendants(id)),
            Axis::DescendantOrSelf => {
                let mut ids = vec![id];
                ids.extend(tree.descendants(id));
                wrap(ids)
            }
            Axis::Parent => wrap(tree.parent(id).into_iter().collect()),
            Axis::Ancestor => wrap(tree.ancestors(id).collect()),
            Axis::AncestorOrSelf => {
                let mut ids = vec![id];
                ids.extend(tree.ancestors(id));
                wrap(ids)
            }
            Axis::FollowingSibling => {
                let mut ids = Vec::new();
                let mut current = tree.next_sibling(id);
                while let Some(sibling) = current {
                    ids.push(sibling);
                    current = tree.next_sibling(sibling);
                }
                wrap(ids)
            }
            Axis::PrecedingSibling => wrap(tree.preceding_siblings(id).collect()),
            Axis::Following | Axis::Preceding => {
                let Some(&own) = self.order.get(&id) else {
                    return Vec::new();
                };
                let ancestors: Vec<NodeId> = tree.ancestors(id).collect();
                let mut ids: Vec<NodeId> = self
                    .order
                    .iter()
                    .filter(|(candidate, index)| {
                        if axis == Axis::Following {
                            **index > own && !tree.is_descendant_of(**candidate, id)
                        } else {
                            **index < own && !ancestors.contains(*candidate)
                        }
                    })
                    .map(|(candidate, _)| *candidate)
                    .collect();
                ids.sort_by_key(|candidate| self.order.get(candidate).copied());
                if axis.is_reverse() {
                    ids.reverse();
                }
                wrap(ids)
            }
            Axis::SelfAxis => vec![node.clone()],
            Axis::Attribute => {
                let mut attrs: Vec<XNode> = tree
                    .as_element(id)
                    .map(|e| e.attrs.keys().map(|name| XNode::Attr(id, name.clone())).collect())
                    .unwrap_or_default();
                attrs.sort_by(|a, b| self.document_order(a, b));
                attrs
            }
        }
    }

    fn node_test(&self, node: &XNode, test: &NodeTest, axis: Axis) -> bool {
        match node {
            XNode::Attr(_, name) => match test {
                NodeTest::Any | NodeTest::Node => true,
                NodeTest::Name(expected) => axis == Axis::Attribute && expected == name,
                NodeTest::Text | NodeTest::Comment => false,
            },
            XNode::Node(id) => {
                let Some(n) = self.tree.get(*id) else {
                    return false;
                };
                match (test, &n.node_type) {
                    (NodeTest::Node, _)
                    | (NodeTest::Text, NodeType::Text(_))
                    | (NodeTest::Comment, NodeType::Comment(_))
                    | (NodeTest::Any, NodeType::Element(_)) => axis != Axis::Attribute,
                    (NodeTest::Name(expected), NodeType::Element(data)) => {
                        axis != Axis::Attribute && data.tag_name.eq_ignore_ascii_case(expected)
                    }
                    _ => false,
                }
            }
        }
    }

    fn string_value(&self, node: &XNode) -> String {
        match node {
            XNode::Node(id) => match self.tree.get(*id).map(|n| &n.node_type) {
                Some(NodeType::Comment(text)) => text.clone(),
                _ => self.tree.text_content(*id),
            },
            XNode::Attr(id, name) => self.tree.attribute(*id, name).unwrap_or_default().to_string(),
        }
    }

    fn to_string(&self, value: &Value) -> String {
        match value {
            Value::Str(s) => s.clone(),
            Value::Num(n) => {
                if n.is_nan() {
                    "NaN".to_string()
                } else if n.fract() == 0.0 && n.is_finite() {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            Value::Bool(b) => b.to_string(),
            Value::Nodes(nodes) => nodes.first().map(|n| self.string_value(n)).unwrap_or_default(),
        }
    }

    fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => parse_number(&self.to_string(other)),
        }
    }

    fn to_bool(&self, value: &Value) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Nodes(nodes) => !nodes.is_empty(),
        }
    }

    /// [§ 4 Core Function Library](https://www.w3.org/TR/1999/REC-xpath-19991116/#corelib)
    #[allow(clippy::cast_precision_loss)]
    fn call(&self, name: &str, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        let arity = |expected: std::ops::RangeInclusive<usize>| {
            if expected.contains(&args.len()) {
                Ok(())
            } else {
                Err(XPathError::Arity(name.to_string()))
            }
        };
        let string_arg = |index: usize| -> Result<String, XPathError> {
            match args.get(index) {
                Some(expr) => Ok(self.to_string(&self.eval(expr, ctx)?)),
                None => Ok(self.string_value(&ctx.node)),
            }
        };

        match name {
            "last" => {
                arity(0..=0)?;
                Ok(Value::Num(ctx.size as f64))
            }
            "position" => {
                arity(0..=0)?;
                Ok(Value::Num(ctx.position as f64))
            }
            "count" => {
                arity(1..=1)?;
                match self.eval(&args[0], ctx)? {
                    Value::Nodes(nodes) => Ok(Value::Num(nodes.len() as f64)),
                    _ => Err(XPathError::NotANodeSet),
                }
            }
            "string" => {
                arity(0..=1)?;
                Ok(Value::Str(string_arg(0)?))
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(XPathError::Arity(name.to_string()));
                }
                let mut out = String::new();
                for index in 0..args.len() {
                    out.push_str(&string_arg(index)?);
                }
                Ok(Value::Str(out))
            }
            "contains" | "starts-with" | "ends-with" => {
                arity(2..=2)?;
                let haystack = string_arg(0)?;
                let needle = string_arg(1)?;
                Ok(Value::Bool(match name {
                    "contains" => haystack.contains(&needle),
                    "starts-with" => haystack.starts_with(&needle),
                    _ => haystack.ends_with(&needle),
                }))
            }
            "normalize-space" => {
                arity(0..=1)?;
                Ok(Value::Str(
                    string_arg(0)?.split_whitespace().collect::<Vec<_>>().join(" "),
                ))
            }
            "string-length" => {
                arity(0..=1)?;
                Ok(Value::Num(string_arg(0)?.chars().count() as f64))
            }
            "not" => {
                arity(1..=1)?;
                Ok(Value::Bool(!self.to_bool(&self.eval(&args[0], ctx)?)))
            }
            "boolean" => {
                arity(1..=1)?;
                Ok(Value::Bool(self.to_bool(&self.eval(&args[0], ctx)?)))
            }
            "number" => {
                arity(0..=1)?;
                match args.first() {
                    Some(expr) => Ok(Value::Num(self.to_number(&self.eval(expr, ctx)?))),
                    None => Ok(Value::Num(parse_number(&self.string_value(&ctx.node)))),
                }
            }
            "true" | "false" => {
                arity(0..=0)?;
                Ok(Value::Bool(name == "true"))
            }
            "name" | "local-name" => {
                arity(0..=1)?;
                let node = match args.first() {
                    Some(expr) => match self.eval(expr, ctx)? {
                        Value::Nodes(nodes) => nodes.into_iter().next(),
                        _ => return Err(XPathError::NotANodeSet),
                    },
                    None => Some(ctx.node.clone()),
                };
                Ok(Value::Str(match node {
                    Some(XNode::Node(id)) => self
                        .tree
                        .as_element(id)
                        .map(|e| e.tag_name.clone())
                        .unwrap_or_default(),
                    Some(XNode::Attr(_, attr)) => attr,
                    None => String::new(),
                }))
            }
            other => Err(XPathError::UnknownFunction(other.to_string())),
        }
    }
}

fn parse_number(text: &str) -> f64 {
    text.trim().parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DomTree, NodeId, NodeId, NodeId) {
        let mut tree = DomTree::new();
        let html = tree.create_element(NodeId::ROOT, "html", &[]);
        let body = tree.create_element(html, "body", &[]);
        let first = tree.create_element(body, "div", &[("class", "ad")]);
        let _ = tree.create_text(first, "Buy now");
        let second = tree.create_element(body, "div", &[("id", "content")]);
        let _ = tree.create_text(second, "Article");
        (tree, body, first, second)
    }

    #[test]
    fn absolute_descendant_path() {
        let (tree, _, first, second) = sample();
        assert_eq!(evaluate(&tree, NodeId::ROOT, "//div").unwrap(), vec![first, second]);
    }

    #[test]
    fn attribute_and_text_predicates() {
        let (tree, _, first, second) = sample();
        assert_eq!(evaluate(&tree, NodeId::ROOT, "//div[@class='ad']").unwrap(), vec![first]);
        assert_eq!(
            evaluate(&tree, NodeId::ROOT, "//div[contains(text(), 'Art')]").unwrap(),
            vec![second]
        );
    }

    #[test]
    fn relative_parent_and_position() {
        let (tree, body, first, second) = sample();
        assert_eq!(evaluate(&tree, first, "..").unwrap(), vec![body]);
        assert_eq!(evaluate(&tree, body, "div[2]").unwrap(), vec![second]);
        assert_eq!(evaluate(&tree, body, "div[last()]").unwrap(), vec![second]);
        assert_eq!(
            evaluate(&tree, second, "preceding-sibling::div[1]").unwrap(),
            vec![first]
        );
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(validate("//div[").is_err());
        assert!(validate("//div[@class='x'").is_err());
        assert!(validate("bogus::div").is_err());
        assert!(validate("//div)").is_err());
    }

    #[test]
    fn non_node_set_results_are_errors() {
        let (tree, ..) = sample();
        assert_eq!(
            evaluate(&tree, NodeId::ROOT, "count(//div)"),
            Err(XPathError::NotANodeSet)
        );
    }
}
