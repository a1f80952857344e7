use std::{cmp::Ordering, f64::consts::PI, mem};

use super::{is_ident_start, LineParser};
use crate::{
    ast::{AstKind, AstNode},
    clock::{format_time, DEFAULT_TIME_FORMAT},
    context::{Lcg, MAX_EVAL_DEPTH},
    error::{AsmError, SyntaxError},
    value::{format_number, to_int, Value},
};

/// A value plus the tree it came from. `known` is false when an undefined
/// symbol was stood in for on the first pass.
#[derive(Debug, Clone)]
pub struct Evaluated {
    pub value: Value,
    pub node: AstNode,
    pub known: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Func {
    Hi,
    Lo,
    Sin,
    Cos,
    Tan,
    Asn,
    Acs,
    Atn,
    Sqr,
    Rad,
    Deg,
    Int,
    Abs,
    Sgn,
    Rnd,
    Not,
    Log,
    Ln,
    Exp,
    Time,
    StrHex,
    Str,
    Val,
    Eval,
    Len,
    Chr,
    Asc,
    Mid,
    Left,
    Right,
    StringOf,
    Upper,
    Lower,
}

#[rustfmt::skip]
const FUNCTIONS: &[(&str, Func, usize)] = &[
    ("HI(", Func::Hi, 1),
    ("LO(", Func::Lo, 1),
    ("SIN(", Func::Sin, 1),
    ("COS(", Func::Cos, 1),
    ("TAN(", Func::Tan, 1),
    ("ASN(", Func::Asn, 1),
    ("ACS(", Func::Acs, 1),
    ("ATN(", Func::Atn, 1),
    ("SQR(", Func::Sqr, 1),
    ("RAD(", Func::Rad, 1),
    ("DEG(", Func::Deg, 1),
    ("INT(", Func::Int, 1),
    ("ABS(", Func::Abs, 1),
    ("SGN(", Func::Sgn, 1),
    ("RND(", Func::Rnd, 1),
    ("NOT(", Func::Not, 1),
    ("LOG(", Func::Log, 1),
    ("LN(", Func::Ln, 1),
    ("EXP(", Func::Exp, 1),
    ("TIME$(", Func::Time, 1),
    ("STR$~(", Func::StrHex, 1), // must precede STR$(
    ("STR$(", Func::Str, 1),
    ("VAL(", Func::Val, 1),
    ("EVAL(", Func::Eval, 1),
    ("LEN(", Func::Len, 1),
    ("CHR$(", Func::Chr, 1),
    ("ASC(", Func::Asc, 1),
    ("MID$(", Func::Mid, 3),
    ("LEFT$(", Func::Left, 2),
    ("RIGHT$(", Func::Right, 2),
    ("STRING$(", Func::StringOf, 2),
    ("UPPER$(", Func::Upper, 1),
    ("LOWER$(", Func::Lower, 1),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Open,
    Call(Func, usize),
    Neg,
    Plus,
    LoByte,
    HiByte,
    Pow,
    Mul,
    Div,
    Mod,
    IntDiv,
    Shl,
    Shr,
    Add,
    Sub,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    And,
    Or,
    Eor,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::Open | Op::Call(..) => 0,
            Op::LoByte | Op::HiByte => 10,
            Op::Neg | Op::Plus => 8,
            Op::Pow => 7,
            Op::Mul | Op::Div | Op::Mod | Op::IntDiv | Op::Shl | Op::Shr => 6,
            Op::Add | Op::Sub => 5,
            Op::Eq | Op::Ne | Op::Le | Op::Ge | Op::Lt | Op::Gt => 4,
            Op::And => 3,
            Op::Or | Op::Eor => 2,
        }
    }

    fn is_bracket(self) -> bool {
        matches!(self, Op::Open | Op::Call(..))
    }

    fn is_unary(self) -> bool {
        matches!(self, Op::Neg | Op::Plus | Op::LoByte | Op::HiByte)
    }
}

const UNARY: &[(&str, Op)] = &[
    ("-", Op::Neg),
    ("+", Op::Plus),
    ("<", Op::LoByte),
    (">", Op::HiByte),
];

// longest match first
#[rustfmt::skip]
const BINARY: &[(&str, Op)] = &[
    ("<<", Op::Shl), (">>", Op::Shr), ("<=", Op::Le), (">=", Op::Ge),
    ("<>", Op::Ne), ("!=", Op::Ne), ("==", Op::Eq), ("=", Op::Eq),
    ("<", Op::Lt), (">", Op::Gt), ("^", Op::Pow), ("*", Op::Mul),
    ("/", Op::Div), ("%", Op::Mod), ("+", Op::Add), ("-", Op::Sub),
    ("DIV", Op::IntDiv), ("MOD", Op::Mod), ("AND", Op::And), ("OR", Op::Or),
    ("EOR", Op::Eor),
];

struct Pending {
    op: Op,
    text: &'static str,
    column: usize,
}

fn truth(value: bool) -> f64 {
    if value {
        -1.0
    } else {
        0.0
    }
}

fn shift(value: i32, amount: i32, left: bool) -> i32 {
    let (left, amount) = if amount < 0 {
        (!left, amount.unsigned_abs())
    } else {
        (left, amount as u32)
    };
    if amount > 31 {
        return 0;
    }
    if left {
        value.wrapping_shl(amount)
    } else {
        value >> amount
    }
}

fn compare(op: Op, ordering: Ordering) -> f64 {
    truth(match op {
        Op::Eq => ordering == Ordering::Equal,
        Op::Ne => ordering != Ordering::Equal,
        Op::Le => ordering != Ordering::Greater,
        Op::Ge => ordering != Ordering::Less,
        Op::Lt => ordering == Ordering::Less,
        _ => ordering == Ordering::Greater,
    })
}

fn numeric(op: Op, a: f64, b: f64) -> Result<f64, SyntaxError> {
    let result = match op {
        Op::Pow => a.powf(b),
        Op::Mul => a * b,
        Op::Div => {
            if b == 0.0 {
                return Err(SyntaxError::DivisionByZero);
            }
            (a / b).floor()
        }
        Op::IntDiv => {
            let divisor = b.trunc();
            if divisor == 0.0 {
                return Err(SyntaxError::DivisionByZero);
            }
            a.trunc() / divisor
        }
        Op::Mod => {
            let divisor = to_int(b);
            if divisor == 0 {
                return Err(SyntaxError::DivisionByZero);
            }
            to_int(a).checked_rem(divisor).unwrap_or(0) as f64
        }
        Op::Shl => shift(to_int(a), to_int(b), true) as f64,
        Op::Shr => shift(to_int(a), to_int(b), false) as f64,
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::And => (to_int(a) & to_int(b)) as f64,
        Op::Or => (to_int(a) | to_int(b)) as f64,
        Op::Eor => (to_int(a) ^ to_int(b)) as f64,
        Op::Eq | Op::Ne | Op::Le | Op::Ge | Op::Lt | Op::Gt => {
            compare(op, a.partial_cmp(&b).ok_or(SyntaxError::IllegalOperation)?)
        }
        _ => return Err(SyntaxError::IllegalOperation),
    };
    if result.is_nan() {
        return Err(SyntaxError::IllegalOperation);
    }
    Ok(result)
}

fn binary(op: Op, lhs: Value, rhs: Value) -> Result<Value, SyntaxError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => numeric(op, a, b).map(Value::Number),
        (Value::Str(a), Value::Str(b)) => match op {
            Op::Add => Ok(Value::Str(a + &b)),
            Op::Eq | Op::Ne | Op::Le | Op::Ge | Op::Lt | Op::Gt => {
                Ok(Value::Number(compare(op, a.cmp(&b))))
            }
            _ => Err(SyntaxError::TypeMismatch),
        },
        _ => Err(SyntaxError::TypeMismatch),
    }
}

fn unary(op: Op, value: Value) -> Result<Value, SyntaxError> {
    let n = value.number()?;
    Ok(Value::Number(match op {
        Op::Neg => -n,
        Op::LoByte => (to_int(n) & 0xFF) as f64,
        Op::HiByte => ((to_int(n) >> 8) & 0xFF) as f64,
        _ => n,
    }))
}

fn checked(n: f64) -> Result<Value, SyntaxError> {
    if n.is_nan() || n.is_infinite() {
        return Err(SyntaxError::IllegalOperation);
    }
    Ok(Value::Number(n))
}

/// Parses the leading number of `text`, or 0 if there is none.
fn leading_number(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end += 1;
    }
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'-' | b'+')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            end = exp;
            while bytes.get(end).is_some_and(u8::is_ascii_digit) {
                end += 1;
            }
        }
    }
    text[..end].parse().unwrap_or(0.0)
}

fn string_function(func: Func, args: &[Value]) -> Result<Value, SyntaxError> {
    let text: Vec<char> = args[0].string()?.chars().collect();
    let len = text.len() as i32;
    let slice = |start: i32, count: i32| Value::Str(text[start as usize..(start + count) as usize].iter().collect());
    match func {
        Func::Len => Ok(Value::Number(len as f64)),
        Func::Asc => text
            .first()
            .map(|c| Value::Number(*c as u32 as f64))
            .ok_or(SyntaxError::IllegalOperation),
        Func::Val => Ok(Value::Number(leading_number(args[0].string()?))),
        Func::Upper => Ok(Value::Str(args[0].string()?.to_ascii_uppercase())),
        Func::Lower => Ok(Value::Str(args[0].string()?.to_ascii_lowercase())),
        Func::Mid => {
            let start = args[1].int()?;
            let count = args[2].int()?;
            if !(1..=len + 1).contains(&start) || count < 0 {
                return Err(SyntaxError::IllegalOperation);
            }
            let start = start - 1;
            Ok(slice(start, count.min(len - start)))
        }
        Func::Left | Func::Right => {
            let count = args[1].int()?;
            if !(0..=len).contains(&count) {
                return Err(SyntaxError::IllegalOperation);
            }
            let start = if func == Func::Left { 0 } else { len - count };
            Ok(slice(start, count))
        }
        _ => Err(SyntaxError::IllegalOperation),
    }
}

impl<'p, 'a> LineParser<'p, 'a> {
    /// Evaluates the expression at the cursor. Stops before a `,` or `)`
    /// that does not belong to it.
    pub(super) fn evaluate(&mut self) -> Result<Evaluated, AsmError> {
        let outer = mem::replace(&mut self.unknown, false);
        self.skip_spaces();
        let start = self.column;
        let result = self.evaluate_stacks();
        let known = !self.unknown;
        self.unknown |= outer;
        let (value, node) = result?;
        let text = self.line[start..self.column].trim_end();
        Ok(Evaluated {
            value,
            node: AstNode::new(AstKind::Expression, text, start).with_children(vec![node]),
            known,
        })
    }

    fn evaluate_stacks(&mut self) -> Result<(Value, AstNode), AsmError> {
        let mut operands: Vec<(Value, AstNode)> = Vec::new();
        let mut operators: Vec<Pending> = Vec::new();
        let mut expect_value = true;

        loop {
            self.skip_spaces();
            let column = self.column;
            let Some(c) = self.peek() else {
                break;
            };

            if expect_value {
                if c == b'(' {
                    operators.push(Pending {
                        op: Op::Open,
                        text: "(",
                        column,
                    });
                    self.column += 1;
                    continue;
                }
                if let Some((text, op)) = UNARY.iter().find(|(text, _)| text.as_bytes()[0] == c) {
                    operators.push(Pending {
                        op: *op,
                        text,
                        column,
                    });
                    self.column += 1;
                    continue;
                }
                if let Some((text, func, _)) = self.match_function() {
                    operators.push(Pending {
                        op: Op::Call(func, 0),
                        text,
                        column,
                    });
                    self.column += text.len();
                    continue;
                }
                if matches!(c, b')' | b',' | b':' | b';' | b'\\') {
                    break;
                }
                let operand = self.parse_value()?;
                operands.push(operand);
                expect_value = false;
                continue;
            }

            match c {
                b')' | b',' => {
                    let Some(bracket) = operators.iter().rposition(|p| p.op.is_bracket()) else {
                        break;
                    };
                    while operators.len() > bracket + 1 {
                        self.reduce(&mut operands, &mut operators)?;
                    }
                    self.column += 1;
                    let top = &mut operators[bracket];
                    match (c, top.op) {
                        (b',', Op::Call(func, args)) => {
                            top.op = Op::Call(func, args + 1);
                            expect_value = true;
                        }
                        (b',', _) => return Err(self.error(SyntaxError::UnexpectedComma, column)),
                        (_, Op::Call(func, args)) => {
                            top.op = Op::Call(func, args + 1);
                            self.reduce(&mut operands, &mut operators)?;
                        }
                        _ => {
                            operators.pop();
                        }
                    }
                }
                _ => {
                    let Some((text, op)) = self.match_binary() else {
                        break;
                    };
                    while operators
                        .last()
                        .is_some_and(|top| !top.op.is_bracket() && top.op.precedence() >= op.precedence())
                    {
                        self.reduce(&mut operands, &mut operators)?;
                    }
                    operators.push(Pending { op, text, column });
                    self.column += text.len();
                    expect_value = true;
                }
            }
        }

        if expect_value {
            let kind = if operands.is_empty() && operators.is_empty() {
                SyntaxError::EmptyExpression
            } else {
                SyntaxError::MissingValue
            };
            return Err(self.error(kind, self.column));
        }
        while let Some(top) = operators.last() {
            if top.op.is_bracket() {
                return Err(self.error(SyntaxError::MismatchedParentheses, top.column));
            }
            self.reduce(&mut operands, &mut operators)?;
        }
        match (operands.pop(), operands.is_empty()) {
            (Some(result), true) => Ok(result),
            _ => Err(self.error(SyntaxError::InvalidCharacter, self.column)),
        }
    }

    fn match_function(&self) -> Option<(&'static str, Func, usize)> {
        let rest = &self.line.as_bytes()[self.column..];
        FUNCTIONS
            .iter()
            .find(|(text, _, _)| {
                rest.len() >= text.len() && rest[..text.len()].eq_ignore_ascii_case(text.as_bytes())
            })
            .copied()
    }

    fn match_binary(&self) -> Option<(&'static str, Op)> {
        let rest = &self.line.as_bytes()[self.column..];
        BINARY
            .iter()
            .find(|(text, _)| {
                let len = text.len();
                if rest.len() < len || !rest[..len].eq_ignore_ascii_case(text.as_bytes()) {
                    return false;
                }
                let word = text.as_bytes()[0].is_ascii_alphabetic();
                !word || !rest.get(len).is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_')
            })
            .copied()
    }

    /// Applies the operator on top of the stack.
    fn reduce(
        &mut self,
        operands: &mut Vec<(Value, AstNode)>,
        operators: &mut Vec<Pending>,
    ) -> Result<(), AsmError> {
        let Some(pending) = operators.pop() else {
            return Ok(());
        };
        let column = pending.column;
        let name = pending.text.trim_end_matches('(');

        let arity = match pending.op {
            Op::Call(func, args) => {
                let arity = FUNCTIONS
                    .iter()
                    .find(|(_, f, _)| *f == func)
                    .map_or(1, |(_, _, arity)| *arity);
                if args != arity {
                    return Err(self.error(SyntaxError::ParameterCount, column));
                }
                arity
            }
            op if op.is_unary() => 1,
            _ => 2,
        };
        if operands.len() < arity {
            return Err(self.error(SyntaxError::MissingValue, column));
        }
        let (values, nodes): (Vec<Value>, Vec<AstNode>) =
            operands.drain(operands.len() - arity..).unzip();

        let (value, kind) = match pending.op {
            Op::Call(func, _) => (self.call(func, values, column)?, AstKind::Function),
            op if op.is_unary() => {
                let value = unary(op, values.into_iter().next().unwrap_or_default());
                (value.map_err(|e| self.error(e, column))?, AstKind::Function)
            }
            op => {
                let mut values = values.into_iter();
                let lhs = values.next().unwrap_or_default();
                let rhs = values.next().unwrap_or_default();
                let value = binary(op, lhs, rhs).map_err(|e| self.error(e, column))?;
                (value, AstKind::BinaryOp)
            }
        };
        operands.push((value, AstNode::new(kind, name, column).with_children(nodes)));
        Ok(())
    }

    fn call(&mut self, func: Func, args: Vec<Value>, column: usize) -> Result<Value, AsmError> {
        if func == Func::Eval {
            return self.eval_string(&args[0], column);
        }
        self.function(func, &args).map_err(|e| self.error(e, column))
    }

    fn function(&mut self, func: Func, args: &[Value]) -> Result<Value, SyntaxError> {
        let arg = &args[0];
        let value = match func {
            Func::Hi => Value::Number(((arg.int()? >> 8) & 0xFF) as f64),
            Func::Lo => Value::Number((arg.int()? & 0xFF) as f64),
            Func::Sin => checked(arg.number()?.sin())?,
            Func::Cos => checked(arg.number()?.cos())?,
            Func::Tan => checked(arg.number()?.tan())?,
            Func::Asn => checked(arg.number()?.asin())?,
            Func::Acs => checked(arg.number()?.acos())?,
            Func::Atn => checked(arg.number()?.atan())?,
            Func::Sqr => checked(arg.number()?.sqrt())?,
            Func::Rad => Value::Number(arg.number()? * PI / 180.0),
            Func::Deg => Value::Number(arg.number()? * 180.0 / PI),
            Func::Int => Value::Number(arg.number()?.trunc()),
            Func::Abs => Value::Number(arg.number()?.abs()),
            Func::Sgn => {
                let n = arg.number()?;
                Value::Number(if n > 0.0 {
                    1.0
                } else if n < 0.0 {
                    -1.0
                } else {
                    0.0
                })
            }
            Func::Rnd => {
                let n = arg.number()?;
                if n < 1.0 {
                    return Err(SyntaxError::IllegalOperation);
                }
                let r = self.env.ctx.rng.rand() as f64 / (f64::from(Lcg::MAX) + 1.0);
                Value::Number(if n == 1.0 { r } else { (r * n).floor() })
            }
            Func::Not => Value::Number(!arg.int()? as f64),
            Func::Log => {
                let n = arg.number()?;
                if n <= 0.0 {
                    return Err(SyntaxError::IllegalOperation);
                }
                Value::Number(n.log10())
            }
            Func::Ln => {
                let n = arg.number()?;
                if n <= 0.0 {
                    return Err(SyntaxError::IllegalOperation);
                }
                Value::Number(n.ln())
            }
            Func::Exp => checked(arg.number()?.exp())?,
            Func::Time => Value::Str(format_time(self.env.ctx.time, arg.string()?)),
            Func::Str => Value::Str(format_number(arg.number()?)),
            Func::StrHex => Value::Str(format!("{:X}", arg.int()? as u32)),
            Func::Chr => {
                let n = arg.int()?;
                let byte = u8::try_from(n).map_err(|_| SyntaxError::IllegalOperation)?;
                Value::Str(char::from(byte).to_string())
            }
            Func::StringOf => {
                let count = arg.int()?;
                let text = args[1].string()?;
                if count < 0 {
                    return Err(SyntaxError::IllegalOperation);
                }
                if (count as u64) * (text.chars().count() as u64) >= 0x10000 {
                    return Err(SyntaxError::OutOfRange);
                }
                Value::Str(text.repeat(count as usize))
            }
            Func::Eval => return Err(SyntaxError::IllegalOperation),
            _ => string_function(func, args)?,
        };
        Ok(value)
    }

    /// Evaluates a string as an expression in the current scope.
    fn eval_string(&mut self, text: &Value, column: usize) -> Result<Value, AsmError> {
        let text = text.string().map_err(|e| self.error(e, column))?.to_string();
        if self.env.ctx.eval_depth >= MAX_EVAL_DEPTH {
            return Err(self.error(SyntaxError::TooManyEvals, column));
        }
        self.env.ctx.eval_depth += 1;
        let mut sub = LineParser::new(&mut *self.drv, &mut *self.env, &text, self.index, 0);
        let result = sub.evaluate().and_then(|evaluated| {
            sub.expect_statement_end()?;
            Ok(evaluated)
        });
        self.env.ctx.eval_depth -= 1;
        match result {
            Ok(evaluated) => {
                self.unknown |= !evaluated.known;
                Ok(evaluated.value)
            }
            Err(e) => Err(AsmError::new(e.kind, self.line, column)),
        }
    }

    fn parse_value(&mut self) -> Result<(Value, AstNode), AsmError> {
        let start = self.column;
        let bytes = self.line.as_bytes();
        let c = bytes[start];
        let value = match c {
            b'0'..=b'9' | b'.' => self.parse_decimal()?,
            b'&' | b'$' => self.parse_radix(16, 8, SyntaxError::BadHex)?,
            b'%' => self.parse_radix(2, 32, SyntaxError::BadBin)?,
            b'*' => {
                self.column += 1;
                Value::Number(self.env.ctx.objcode.pc() as f64)
            }
            b'\'' => {
                if bytes.get(start + 2) != Some(&b'\'') {
                    return Err(self.error(SyntaxError::MissingQuote, start));
                }
                self.column += 3;
                Value::Number(bytes[start + 1] as f64)
            }
            b'"' => self.parse_string()?,
            c if is_ident_start(c) => return self.parse_symbol(),
            _ => return Err(self.error(SyntaxError::InvalidCharacter, start)),
        };
        let text = &self.line[start..self.column];
        Ok((value, AstNode::new(AstKind::Value, text, start)))
    }

    fn parse_decimal(&mut self) -> Result<Value, AsmError> {
        let start = self.column;
        let bytes = self.line.as_bytes();
        let mut end = start;
        while bytes.get(end).is_some_and(|c| c.is_ascii_digit() || *c == b'_') {
            end += 1;
        }
        if bytes.get(end) == Some(&b'.') {
            end += 1;
            while bytes.get(end).is_some_and(|c| c.is_ascii_digit() || *c == b'_') {
                end += 1;
            }
        }
        if matches!(bytes.get(end), Some(b'e' | b'E')) {
            let mut exp = end + 1;
            if matches!(bytes.get(exp), Some(b'-' | b'+')) {
                exp += 1;
            }
            if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
                end = exp;
                while bytes.get(end).is_some_and(u8::is_ascii_digit) {
                    end += 1;
                }
            }
        }
        let digits: String = self.line[start..end].chars().filter(|c| *c != '_').collect();
        let n: f64 = digits
            .parse()
            .map_err(|_| self.error(SyntaxError::InvalidCharacter, start))?;
        if n.is_infinite() {
            return Err(self.error(SyntaxError::NumberTooBig, start));
        }
        self.column = end;
        Ok(Value::Number(n))
    }

    fn parse_radix(&mut self, radix: u32, max_digits: usize, bad: SyntaxError) -> Result<Value, AsmError> {
        let start = self.column;
        self.column += 1;
        let mut value: u64 = 0;
        let mut digits = 0;
        let mut significant = 0;
        let digit_at = |parser: &Self, column: usize| {
            parser
                .peek_at(column)
                .and_then(|c| char::from(c).to_digit(radix))
        };
        loop {
            // `_` separates digits and counts for nothing
            if digits > 0 && self.peek() == Some(b'_') && digit_at(self, self.column + 1).is_some() {
                self.column += 1;
            }
            let Some(digit) = digit_at(self, self.column) else {
                break;
            };
            value = (value * u64::from(radix) + u64::from(digit)) & 0xFFFF_FFFF_FFFF;
            digits += 1;
            if significant > 0 || digit != 0 {
                significant += 1;
            }
            self.column += 1;
        }
        if digits == 0 {
            return Err(self.error(bad, start));
        }
        if significant > max_digits {
            return Err(self.error(SyntaxError::NumberTooBig, start));
        }
        Ok(Value::Number(value as f64))
    }

    fn parse_string(&mut self) -> Result<Value, AsmError> {
        let start = self.column;
        let bytes = self.line.as_bytes();
        let mut text = String::new();
        let mut column = start + 1;
        loop {
            match bytes.get(column) {
                None => return Err(self.error(SyntaxError::MissingQuote, start)),
                Some(b'"') if bytes.get(column + 1) == Some(&b'"') => {
                    text.push('"');
                    column += 2;
                }
                Some(b'"') => break,
                Some(_) => {
                    let ch = self.line[column..].chars().next().unwrap_or_default();
                    text.push(ch);
                    column += ch.len_utf8();
                }
            }
        }
        self.column = column + 1;
        Ok(Value::Str(text))
    }

    fn parse_symbol(&mut self) -> Result<(Value, AstNode), AsmError> {
        let start = self.column;
        let rest = &self.line.as_bytes()[start..];
        if rest.len() >= 5 && rest[..5].eq_ignore_ascii_case(b"TIME$") {
            self.column += 5;
            let value = Value::Str(format_time(self.env.ctx.time, DEFAULT_TIME_FORMAT));
            return Ok((value, AstNode::new(AstKind::Value, "TIME$", start)));
        }

        let name = self.symbol_name();
        let node = AstNode::new(AstKind::Symbol, &name, start);
        if name == "P%" {
            return Ok((Value::Number(self.env.ctx.objcode.pc() as f64), node));
        }
        let pos = self.drv.pos(self.index, start);
        match self.drv.get_symbol_value(self.env, &name, pos) {
            Some(value) => Ok((value, node)),
            None if self.env.ctx.is_first_pass() => {
                self.unknown = true;
                Ok((Value::Number(self.env.ctx.objcode.pc() as f64), node))
            }
            None => Err(self.error(SyntaxError::SymbolNotDefined, start)),
        }
    }
}
