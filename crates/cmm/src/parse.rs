//! Lexer and recursive-descent parser for C-- source text.

use std::fmt;

use num_bigint::BigInt;
use serde::Serialize;

use crate::{
    expressions::{Assign, Block, Call, Expr, FunctionDecl, Place, Program, Stmt},
    value::BinaryOp,
};

/// Maximum nesting depth for blocks and expressions during parsing.
///
/// Deeper input is rejected with a `ParseError` instead of overflowing the stack.
#[cfg(not(debug_assertions))]
pub const MAX_NESTING_DEPTH: u16 = 200;
/// In debug builds, we use a lower limit because stack frames are much larger
/// (no inlining, debug info, etc.).
#[cfg(debug_assertions)]
pub const MAX_NESTING_DEPTH: u16 = 35;

/// A 1-based line and column in source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A syntax error. Parsing stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub loc: CodeLoc,
}

impl ParseError {
    fn new(message: impl Into<String>, loc: CodeLoc) -> Self {
        Self {
            message: message.into(),
            loc,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at {}: {}", self.loc, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses a whole source file.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth_remaining: MAX_NESTING_DEPTH,
    };
    parser.parse_program()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(BigInt),
    Print,
    Return,
    Array,
    If,
    Else,
    While,
    For,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Assign,
    Op(BinaryOp),
    /// `-` is lexed separately because it is both unary and binary.
    Minus,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Int(value) => write!(f, "integer {value}"),
            Self::Print => f.write_str("'print'"),
            Self::Return => f.write_str("'return'"),
            Self::Array => f.write_str("'array'"),
            Self::If => f.write_str("'if'"),
            Self::Else => f.write_str("'else'"),
            Self::While => f.write_str("'while'"),
            Self::For => f.write_str("'for'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::LBrace => f.write_str("'{'"),
            Self::RBrace => f.write_str("'}'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::Comma => f.write_str("','"),
            Self::Semi => f.write_str("';'"),
            Self::Assign => f.write_str("'='"),
            Self::Op(op) => write!(f, "'{op}'"),
            Self::Minus => f.write_str("'-'"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

/// Character cursor that tracks the 1-based position of the next character.
struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

impl Lexer<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let next = self.chars.next();
        if next == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        next
    }

    fn loc(&self) -> CodeLoc {
        CodeLoc::new(self.line, self.column)
    }

    /// Consumes characters while `pred` holds, returning them.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek()
            && pred(c)
        {
            out.push(c);
            self.bump();
        }
        out
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, CodeLoc)>, ParseError> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();

    while let Some(ch) = lexer.peek() {
        let loc = lexer.loc();
        if ch.is_whitespace() {
            lexer.bump();
            continue;
        }
        if ch.is_ascii_digit() {
            let digits = lexer.take_while(|c| c.is_ascii_digit());
            let value = digits
                .parse::<BigInt>()
                .map_err(|err| ParseError::new(format!("invalid integer literal: {err}"), loc))?;
            tokens.push((Token::Int(value), loc));
            continue;
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            let word = lexer.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
            let token = match word.as_str() {
                "print" => Token::Print,
                "return" => Token::Return,
                "array" => Token::Array,
                "if" => Token::If,
                "else" => Token::Else,
                "while" => Token::While,
                "for" => Token::For,
                _ => Token::Ident(word),
            };
            tokens.push((token, loc));
            continue;
        }

        lexer.bump();
        let next = lexer.peek();
        if ch == '/' && next == Some('/') {
            lexer.take_while(|c| c != '\n');
            continue;
        }
        let (token, two_chars) = match (ch, next) {
            ('=', Some('=')) => (Token::Op(BinaryOp::Eq), true),
            ('!', Some('=')) => (Token::Op(BinaryOp::Ne), true),
            ('<', Some('=')) => (Token::Op(BinaryOp::Le), true),
            ('>', Some('=')) => (Token::Op(BinaryOp::Ge), true),
            ('&', Some('&')) => (Token::Op(BinaryOp::And), true),
            ('|', Some('|')) => (Token::Op(BinaryOp::Or), true),
            ('=', _) => (Token::Assign, false),
            ('<', _) => (Token::Op(BinaryOp::Lt), false),
            ('>', _) => (Token::Op(BinaryOp::Gt), false),
            ('+', _) => (Token::Op(BinaryOp::Add), false),
            ('-', _) => (Token::Minus, false),
            ('*', _) => (Token::Op(BinaryOp::Mul), false),
            ('/', _) => (Token::Op(BinaryOp::Div), false),
            ('%', _) => (Token::Op(BinaryOp::Mod), false),
            ('(', _) => (Token::LParen, false),
            (')', _) => (Token::RParen, false),
            ('{', _) => (Token::LBrace, false),
            ('}', _) => (Token::RBrace, false),
            ('[', _) => (Token::LBracket, false),
            (']', _) => (Token::RBracket, false),
            (',', _) => (Token::Comma, false),
            (';', _) => (Token::Semi, false),
            _ => return Err(ParseError::new(format!("unexpected character '{ch}'"), loc)),
        };
        if two_chars {
            lexer.bump();
        }
        tokens.push((token, loc));
    }

    tokens.push((Token::Eof, lexer.loc()));
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, CodeLoc)>,
    pos: usize,
    /// Starts at MAX_NESTING_DEPTH and decrements on each nested block or expression.
    depth_remaining: u16,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        // the token list always ends with Eof, so clamp to it
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index].0
    }

    fn loc(&self) -> CodeLoc {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        if let Token::Ident(name) = self.peek() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected("an identifier"))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::new(format!("expected {expected}, found {}", self.peek()), self.loc())
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth_remaining == 0 {
            return Err(ParseError::new("nesting too deep", self.loc()));
        }
        self.depth_remaining -= 1;
        Ok(())
    }

    fn exit(&mut self) {
        self.depth_remaining += 1;
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut functions = Vec::new();
        while self.peek() != &Token::Eof {
            functions.push(self.parse_function()?);
        }
        Ok(Program { functions })
    }

    fn parse_function(&mut self) -> Result<FunctionDecl, ParseError> {
        let loc = self.loc();
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                params.push(self.expect_ident()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            params,
            body,
            loc,
        })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.expect(&Token::LBrace)?;
        self.enter()?;
        let mut statements = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.peek() == &Token::Eof {
                return Err(self.unexpected("'}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.exit();
        Ok(Block { statements })
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let stmt = match self.peek() {
            Token::Print => {
                self.advance();
                Stmt::Print(self.parse_expr()?)
            }
            Token::Return => {
                self.advance();
                Stmt::Return(self.parse_expr()?)
            }
            Token::Array => {
                self.advance();
                let name = self.expect_ident()?;
                self.expect(&Token::LBracket)?;
                let size = self.parse_expr()?;
                self.expect(&Token::RBracket)?;
                Stmt::ArrayInit { name, size }
            }
            Token::If => return self.parse_if(),
            Token::While => {
                self.advance();
                self.expect(&Token::LParen)?;
                let condition = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                let body = self.parse_block()?;
                return Ok(Stmt::While { condition, body });
            }
            Token::For => {
                self.advance();
                self.expect(&Token::LParen)?;
                let init = self.parse_assign()?;
                self.expect(&Token::Semi)?;
                let condition = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                let step = self.parse_assign()?;
                self.expect(&Token::RParen)?;
                let body = self.parse_block()?;
                return Ok(Stmt::For {
                    init,
                    condition,
                    step,
                    body,
                });
            }
            Token::LBrace => return Ok(Stmt::Block(self.parse_block()?)),
            Token::Ident(_) if self.peek_nth(1) == &Token::LParen => Stmt::Call(self.parse_call()?),
            Token::Ident(_) => Stmt::Assign(self.parse_assign()?),
            _ => return Err(self.unexpected("a statement")),
        };
        self.expect(&Token::Semi)?;
        Ok(stmt)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(&Token::Else) {
            if self.peek() == &Token::If {
                self.enter()?;
                let nested = self.parse_if()?;
                self.exit();
                Some(Block {
                    statements: vec![nested],
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_block,
            else_block,
        })
    }

    fn parse_assign(&mut self) -> Result<Assign, ParseError> {
        let target = self.parse_place()?;
        self.expect(&Token::Assign)?;
        let value = self.parse_expr()?;
        Ok(Assign { target, value })
    }

    fn parse_place(&mut self) -> Result<Place, ParseError> {
        let loc = self.loc();
        let name = self.expect_ident()?;
        let mut indices = Vec::new();
        while self.eat(&Token::LBracket) {
            indices.push(self.parse_expr()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(Place { name, indices, loc })
    }

    fn parse_call(&mut self) -> Result<Call, ParseError> {
        let loc = self.loc();
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }
        Ok(Call { name, args, loc })
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let expr = self.parse_binary(0);
        self.exit();
        expr
    }

    /// Precedence climbing over the fixed levels, lowest first.
    fn parse_binary(&mut self, level: usize) -> Result<Expr, ParseError> {
        const LEVELS: [&[BinaryOp]; 6] = [
            &[BinaryOp::Or],
            &[BinaryOp::And],
            &[BinaryOp::Eq, BinaryOp::Ne],
            &[BinaryOp::Lt, BinaryOp::Gt, BinaryOp::Le, BinaryOp::Ge],
            &[BinaryOp::Add, BinaryOp::Sub],
            &[BinaryOp::Mul, BinaryOp::Div, BinaryOp::Mod],
        ];
        let Some(ops) = LEVELS.get(level) else {
            return self.parse_unary();
        };
        let mut lhs = self.parse_binary(level + 1)?;
        loop {
            let op = match self.peek() {
                Token::Op(op) if ops.contains(op) => *op,
                Token::Minus if ops.contains(&BinaryOp::Sub) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_binary(level + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Minus) {
            self.enter()?;
            let operand = self.parse_unary();
            self.exit();
            return Ok(Expr::Neg(Box::new(operand?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Token::Int(value) => {
                let value = value.clone();
                self.advance();
                Ok(Expr::Int(value))
            }
            Token::Ident(_) if self.peek_nth(1) == &Token::LParen => Ok(Expr::Call(self.parse_call()?)),
            Token::Ident(_) => Ok(Expr::Place(self.parse_place()?)),
            Token::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn int(value: i64) -> Expr {
        Expr::Int(BigInt::from(value))
    }

    fn main_body(source: &str) -> Vec<Stmt> {
        let program = parse(source).unwrap();
        program.functions.into_iter().next().unwrap().body.statements
    }

    #[test]
    fn precedence_and_associativity() {
        let body = main_body("main() { print 3 + 4 * 2 - 1; }");
        let expected = Expr::Binary {
            op: BinaryOp::Sub,
            lhs: Box::new(Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(int(3)),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(int(4)),
                    rhs: Box::new(int(2)),
                }),
            }),
            rhs: Box::new(int(1)),
        };
        assert_eq!(body, vec![Stmt::Print(expected)]);
    }

    #[test]
    fn logical_operators_bind_loosest() {
        let body = main_body("main() { print 1 < 2 && 3 == 3 || 0; }");
        let Stmt::Print(Expr::Binary { op, lhs, .. }) = &body[0] else {
            panic!("expected a print of a binary expression: {body:?}");
        };
        assert_eq!(*op, BinaryOp::Or);
        assert!(matches!(**lhs, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn statements_and_calls() {
        let program = parse(
            "// leading comment\n\
             square(x) { return x * x; }\n\
             main() {\n\
               array xs[5];\n\
               xs[2] = square(3);\n\
               for (i = 0; i < 5; i = i + 1) { print xs[i]; }\n\
               if (1) { print 1; } else if (0) { print 2; } else { print 3; }\n\
               square(2);\n\
             }",
        )
        .unwrap();
        assert_eq!(program.functions.len(), 2);
        assert_eq!(program.functions[0].params, vec!["x".to_owned()]);
        assert!(program.functions[0].yields_value());
        let body = &program.functions[1].body.statements;
        assert_eq!(body.len(), 5);
        assert!(matches!(&body[0], Stmt::ArrayInit { name, .. } if name == "xs"));
        assert!(matches!(&body[1], Stmt::Assign(Assign { target, .. }) if target.indices.len() == 1));
        assert!(matches!(&body[2], Stmt::For { .. }));
        let Stmt::If { else_block: Some(else_block), .. } = &body[3] else {
            panic!("expected if/else");
        };
        assert!(matches!(else_block.statements[..], [Stmt::If { .. }]));
        assert!(matches!(&body[4], Stmt::Call(call) if call.name == "square" && call.args.len() == 1));
    }

    #[test]
    fn unary_minus_nests() {
        let body = main_body("main() { x = --5; }");
        let Stmt::Assign(assign) = &body[0] else {
            panic!("expected assignment");
        };
        assert_eq!(assign.value, Expr::Neg(Box::new(Expr::Neg(Box::new(int(5))))));
    }

    #[test]
    fn errors_report_location() {
        let err = parse("main() {\n  print 1\n}").unwrap_err();
        assert_eq!(err.loc, CodeLoc::new(3, 1));
        assert_eq!(err.message, "expected ';', found '}'");
        let err = parse("main() { x = 1 $ 2; }").unwrap_err();
        assert_eq!(err.loc, CodeLoc::new(1, 16));
        assert!(err.to_string().starts_with("syntax error at 1:16"));
    }

    #[test]
    fn big_literals_are_exact() {
        let body = main_body("main() { print 123456789012345678901234567890; }");
        assert_eq!(
            body,
            vec![Stmt::Print(Expr::Int(
                "123456789012345678901234567890".parse().unwrap()
            ))]
        );
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let depth = usize::from(MAX_NESTING_DEPTH) + 5;
        let source = format!("main() {{ print {}1{}; }}", "(".repeat(depth), ")".repeat(depth));
        let err = parse(&source).unwrap_err();
        assert_eq!(err.message, "nesting too deep");
    }
}
