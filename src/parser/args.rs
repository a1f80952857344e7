use super::LineParser;
use crate::{
    ast::AstNode,
    error::{AsmError, SyntaxError},
    value::Value,
};

/// Conversion from an evaluated argument.
pub(super) trait ArgValue: Sized + Default {
    fn from_value(value: Value) -> Result<Self, SyntaxError>;
}

impl ArgValue for i32 {
    fn from_value(value: Value) -> Result<Self, SyntaxError> {
        value.int()
    }
}

impl ArgValue for f64 {
    fn from_value(value: Value) -> Result<Self, SyntaxError> {
        value.number()
    }
}

impl ArgValue for String {
    fn from_value(value: Value) -> Result<Self, SyntaxError> {
        match value {
            Value::Str(s) => Ok(s),
            Value::Number(_) => Err(SyntaxError::TypeMismatch),
        }
    }
}

enum State<T> {
    Missing,
    Undefined,
    Found(T),
}

/// One comma separated directive argument. Checks are applied when the
/// value is taken.
pub(super) struct Arg<'l, T> {
    state: State<T>,
    line: &'l str,
    column: usize,
    default: Option<T>,
    accept_undef: bool,
    range: Option<(T, T, SyntaxError)>,
}

impl<'l, T: ArgValue + PartialOrd> Arg<'l, T> {
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn default(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    /// Tolerates an undefined first pass value, standing in the default.
    pub fn accept_undef(mut self) -> Self {
        self.accept_undef = true;
        self
    }

    pub fn range(mut self, min: T, max: T) -> Self {
        self.range = Some((min, max, SyntaxError::OutOfRange));
        self
    }

    pub fn value(self) -> Result<T, AsmError> {
        match self.state {
            State::Found(value) => {
                if let Some((min, max, kind)) = self.range {
                    if value < min || value > max {
                        return Err(AsmError::new(kind, self.line, self.column));
                    }
                }
                Ok(value)
            }
            State::Undefined if self.accept_undef => Ok(self.default.unwrap_or_default()),
            State::Undefined => Err(AsmError::new(
                SyntaxError::SymbolNotDefined,
                self.line,
                self.column,
            )),
            State::Missing => self.default.ok_or_else(|| {
                AsmError::new(SyntaxError::ParameterCount, self.line, self.column)
            }),
        }
    }

    /// `None` when the argument was left off and has no default.
    pub fn optional(self) -> Result<Option<T>, AsmError> {
        if matches!(self.state, State::Missing) && self.default.is_none() {
            return Ok(None);
        }
        self.value().map(Some)
    }
}

impl<'l> Arg<'l, i32> {
    /// A 16 bit address.
    pub fn address(mut self) -> Self {
        self.range = Some((0, 0xFFFF, SyntaxError::BadAddress));
        self
    }
}

/// Reads directive arguments left to right.
pub(super) struct ArgList<'l, 'p, 'a> {
    parser: &'l mut LineParser<'p, 'a>,
    first: bool,
    nodes: Vec<AstNode>,
}

impl<'l, 'p, 'a> ArgList<'l, 'p, 'a> {
    pub fn new(parser: &'l mut LineParser<'p, 'a>) -> Self {
        Self {
            parser,
            first: true,
            nodes: Vec::new(),
        }
    }

    fn next<T: ArgValue>(&mut self) -> Result<Arg<'p, T>, AsmError> {
        let line = self.parser.line;
        let missing = |column| Arg {
            state: State::Missing,
            line,
            column,
            default: None,
            accept_undef: false,
            range: None,
        };
        if self.parser.at_statement_end() {
            return Ok(missing(self.parser.column));
        }
        if !self.first {
            self.parser.expect_comma()?;
        }
        self.first = false;
        self.parser.skip_spaces();
        let column = self.parser.column;

        let evaluated = self.parser.evaluate()?;
        self.nodes.push(evaluated.node);
        let state = if evaluated.known {
            State::Found(T::from_value(evaluated.value).map_err(|e| AsmError::new(e, line, column))?)
        } else {
            State::Undefined
        };
        Ok(Arg {
            state,
            ..missing(column)
        })
    }

    pub fn int(&mut self) -> Result<Arg<'p, i32>, AsmError> {
        self.next()
    }

    pub fn number(&mut self) -> Result<Arg<'p, f64>, AsmError> {
        self.next()
    }

    pub fn string(&mut self) -> Result<Arg<'p, String>, AsmError> {
        self.next()
    }

    /// Takes the next argument only if it evaluates to a string.
    pub fn string_if_present(&mut self) -> Result<Option<(String, usize)>, AsmError> {
        let (column, first, nodes) = (self.parser.column, self.first, self.nodes.len());
        if self.parser.at_statement_end() {
            return Ok(None);
        }
        if !self.first && self.parser.peek() != Some(b',') {
            return Ok(None);
        }
        if !self.first {
            self.parser.column += 1;
        }
        self.parser.skip_spaces();
        let start = self.parser.column;
        let evaluated = self.parser.evaluate()?;
        if let Value::Str(text) = evaluated.value {
            self.first = false;
            self.nodes.push(evaluated.node);
            return Ok(Some((text, start)));
        }
        self.parser.column = column;
        self.first = first;
        self.nodes.truncate(nodes);
        Ok(None)
    }

    pub fn finish(self) -> Result<Vec<AstNode>, AsmError> {
        self.parser.expect_statement_end()?;
        Ok(self.nodes)
    }
}
