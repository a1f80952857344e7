mod args;
mod asm;
mod directives;
mod expr;

#[cfg(test)]
mod tests;

use crate::{
    ast::{AstKind, AstNode},
    context::Engine,
    driver::{ScopeKind, SourceDriver},
    error::{AsmError, ErrorKind, SyntaxError},
    objcode::SourceMapEntry,
    opcodes,
    value::Value,
};

pub use expr::Evaluated;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Directive {
    Label,
    Comment,
    Separator,
    OpenBrace,
    CloseBrace,
    Print,
    Cpu,
    Org,
    Include,
    IncBin,
    Equb,
    Equd,
    Equs,
    Equw,
    Assert,
    Save,
    For,
    Next,
    If,
    Elif,
    Else,
    Endif,
    Align,
    SkipTo,
    Skip,
    Guard,
    Clear,
    MapChar,
    PutFile,
    PutText,
    PutBasic,
    Macro,
    EndMacro,
    Error,
    CopyBlock,
    Randomize,
    Asm,
}

impl Directive {
    /// Dispatched even inside a false IF so nesting stays balanced.
    fn is_conditional(self) -> bool {
        matches!(
            self,
            Directive::Comment
                | Directive::Separator
                | Directive::If
                | Directive::Elif
                | Directive::Else
                | Directive::Endif
                | Directive::Macro
                | Directive::EndMacro
        )
    }
}

const DIRECTIVES: &[(&str, Directive)] = &[
    (".", Directive::Label),
    ("\\", Directive::Comment),
    (";", Directive::Comment),
    (":", Directive::Separator),
    ("{", Directive::OpenBrace),
    ("}", Directive::CloseBrace),
    ("PRINT", Directive::Print),
    ("CPU", Directive::Cpu),
    ("ORG", Directive::Org),
    ("INCLUDE", Directive::Include),
    ("INCBIN", Directive::IncBin),
    ("EQUB", Directive::Equb),
    ("EQUD", Directive::Equd),
    ("EQUS", Directive::Equs),
    ("EQUW", Directive::Equw),
    ("ASSERT", Directive::Assert),
    ("SAVE", Directive::Save),
    ("FOR", Directive::For),
    ("NEXT", Directive::Next),
    ("IF", Directive::If),
    ("ELIF", Directive::Elif),
    ("ELSE", Directive::Else),
    ("ENDIF", Directive::Endif),
    ("ALIGN", Directive::Align),
    ("SKIPTO", Directive::SkipTo),
    ("SKIP", Directive::Skip),
    ("GUARD", Directive::Guard),
    ("CLEAR", Directive::Clear),
    ("MAPCHAR", Directive::MapChar),
    ("PUTFILE", Directive::PutFile),
    ("PUTTEXT", Directive::PutText),
    ("PUTBASIC", Directive::PutBasic),
    ("MACRO", Directive::Macro),
    ("ENDMACRO", Directive::EndMacro),
    ("ERROR", Directive::Error),
    ("COPYBLOCK", Directive::CopyBlock),
    ("RANDOMIZE", Directive::Randomize),
    ("ASM", Directive::Asm),
];

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Parses and executes the statements of one line.
pub struct LineParser<'p, 'a> {
    drv: &'p mut SourceDriver,
    env: &'p mut Engine<'a>,
    line: &'p str,
    index: usize,
    column: usize,
    nodes: Vec<AstNode>,
    unknown: bool,
}

impl<'p, 'a> LineParser<'p, 'a> {
    pub fn new(
        drv: &'p mut SourceDriver,
        env: &'p mut Engine<'a>,
        line: &'p str,
        index: usize,
        column: usize,
    ) -> Self {
        Self {
            drv,
            env,
            line,
            index,
            column,
            nodes: Vec::new(),
            unknown: false,
        }
    }

    pub fn into_ast(self) -> AstNode {
        AstNode::new(AstKind::Line, self.line, 0).with_children(self.nodes)
    }

    pub fn process(&mut self) -> Result<(), AsmError> {
        while self.skip_spaces() {
            let start = self.column;
            let assignment = self.is_assignment();

            let directive = if assignment {
                None
            } else {
                self.match_directive()
            };
            if let Some((directive, len)) = directive {
                if directive.is_conditional() || self.drv.is_if_condition_true() {
                    self.column += len;
                    self.handle_directive(directive, start, len)?;
                    if self.drv.rewound() {
                        break;
                    }
                } else {
                    self.skip_statement();
                }
                continue;
            }

            if !self.drv.is_if_condition_true() {
                self.skip_statement();
                continue;
            }

            if !assignment {
                let cpu = self.env.ctx.objcode.cpu();
                if let Some(mne) = opcodes::find_mnemonic(&self.line[start..], cpu) {
                    self.column += 3;
                    self.handle_assembler(mne, start)?;
                    continue;
                }
            }

            if assignment {
                self.handle_assignment(start)?;
                continue;
            }

            if self.peek().is_some_and(is_ident_start) {
                let name = self.symbol_name();
                if self.env.ctx.macros.exists(&name) {
                    self.handle_macro_call(&name, start)?;
                    continue;
                }
                return Err(self.error(SyntaxError::MacroNotFound, start));
            }
            return Err(self.error(SyntaxError::UnrecognisedToken, start));
        }
        Ok(())
    }

    fn error(&self, kind: impl Into<ErrorKind>, column: usize) -> AsmError {
        AsmError::new(kind, self.line, column)
    }

    fn peek(&self) -> Option<u8> {
        self.line.as_bytes().get(self.column).copied()
    }

    fn peek_at(&self, column: usize) -> Option<u8> {
        self.line.as_bytes().get(column).copied()
    }

    /// Skips blanks; true if anything is left on the line.
    fn skip_spaces(&mut self) -> bool {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.column += 1;
        }
        self.column < self.line.len()
    }

    fn at_statement_end(&mut self) -> bool {
        !self.skip_spaces() || matches!(self.peek(), Some(b':' | b';' | b'\\'))
    }

    fn expect_statement_end(&mut self) -> Result<(), AsmError> {
        if self.at_statement_end() {
            return Ok(());
        }
        let kind = if self.peek() == Some(b',') {
            SyntaxError::UnexpectedComma
        } else {
            SyntaxError::InvalidCharacter
        };
        Err(self.error(kind, self.column))
    }

    fn expect_comma(&mut self) -> Result<(), AsmError> {
        self.skip_spaces();
        if self.peek() != Some(b',') {
            return Err(self.error(SyntaxError::MissingComma, self.column));
        }
        self.column += 1;
        Ok(())
    }

    /// Identifier with an optional trailing `%` or `$`.
    fn symbol_name(&mut self) -> String {
        let start = self.column;
        while self.peek().is_some_and(is_ident) {
            self.column += 1;
        }
        if matches!(self.peek(), Some(b'%' | b'$')) {
            self.column += 1;
        }
        self.line[start..self.column].to_string()
    }

    fn expect_symbol_name(&mut self) -> Result<String, AsmError> {
        self.skip_spaces();
        if !self.peek().is_some_and(is_ident_start) {
            return Err(self.error(SyntaxError::InvalidSymbolName, self.column));
        }
        Ok(self.symbol_name())
    }

    fn is_assignment(&self) -> bool {
        let bytes = self.line.as_bytes();
        let mut column = self.column;
        if !bytes.get(column).copied().is_some_and(is_ident_start) {
            return false;
        }
        while bytes.get(column).copied().is_some_and(is_ident) {
            column += 1;
        }
        if matches!(bytes.get(column), Some(b'%' | b'$')) {
            column += 1;
        }
        while matches!(bytes.get(column), Some(b' ' | b'\t')) {
            column += 1;
        }
        bytes.get(column) == Some(&b'=')
    }

    fn match_directive(&self) -> Option<(Directive, usize)> {
        let rest = &self.line.as_bytes()[self.column..];
        DIRECTIVES.iter().find_map(|(text, directive)| {
            let len = text.len();
            if rest.len() < len || !rest[..len].eq_ignore_ascii_case(text.as_bytes()) {
                return None;
            }
            let word = text.as_bytes()[0].is_ascii_alphabetic();
            if word && rest.get(len).copied().is_some_and(is_ident) {
                return None;
            }
            Some((*directive, len))
        })
    }

    /// Steps over a statement without executing it.
    fn skip_statement(&mut self) {
        let bytes = self.line.as_bytes();
        let mut quoted = false;
        let mut depth = 0usize;
        while let Some(&c) = bytes.get(self.column) {
            if quoted {
                quoted = c != b'"';
            } else {
                match c {
                    b'"' => quoted = true,
                    b'\'' if bytes.get(self.column + 2) == Some(&b'\'') => self.column += 2,
                    b'(' => depth += 1,
                    b')' => depth = depth.saturating_sub(1),
                    b':' | b';' | b'\\' if depth == 0 => break,
                    _ => {}
                }
            }
            self.column += 1;
        }
    }

    fn src(&self, column: usize) -> SourceMapEntry {
        SourceMapEntry {
            file: self.drv.file(),
            line: self.drv.line_number(self.index),
            column,
            parent: self.drv.call_site(),
        }
    }

    fn handle_label(&mut self, start: usize) -> Result<(), AsmError> {
        let level = self.drv.scope_level();
        let (target, marker) = match self.peek() {
            Some(b'*') => (0, "*"),
            Some(b'^') => (level.saturating_sub(1), "^"),
            _ => (level, ""),
        };
        self.column += marker.len();
        let name_col = self.column;
        if !self.peek().is_some_and(is_ident_start) {
            return Err(self.error(SyntaxError::InvalidSymbolName, name_col));
        }
        let name = self.symbol_name();

        for frame in &self.drv.scopes()[target..] {
            match frame.kind {
                ScopeKind::For => return Err(self.error(SyntaxError::PromoteOutOfFor, start)),
                ScopeKind::Macro => return Err(self.error(SyntaxError::PromoteOutOfMacro, start)),
                ScopeKind::Brace => {}
            }
        }

        let full = format!("{name}{}", self.drv.suffix(target));
        let value = Value::Number(self.env.ctx.objcode.pc() as f64);
        let pos = self.drv.pos(self.index, name_col);
        if self.env.ctx.is_first_pass() {
            if !self.env.ctx.symbols.add(&full, value, true, Some(pos)) {
                return Err(self.error(SyntaxError::LabelAlreadyDefined, name_col));
            }
        } else {
            let problem = match self.env.ctx.symbols.get(&full) {
                Some(sym) if !sym.is_label || sym.defined_at != Some(pos) => {
                    Some(SyntaxError::LabelAlreadyDefined)
                }
                Some(sym) if sym.value == value => None,
                _ => Some(SyntaxError::SecondPassProblem),
            };
            if let Some(kind) = problem {
                return Err(self.error(kind, name_col));
            }
        }

        self.nodes.push(
            AstNode::new(AstKind::VariableDeclaration, format!("{marker}{name}"), start)
                .with_children(vec![AstNode::new(AstKind::Symbol, full, name_col)]),
        );
        Ok(())
    }

    fn handle_assignment(&mut self, start: usize) -> Result<(), AsmError> {
        let name = self.symbol_name();
        self.skip_spaces();
        self.column += 1; // =
        let conditional = self.peek() == Some(b'?');
        if conditional {
            self.column += 1;
        }
        let full = self.drv.scoped_name(&name);
        let pos = self.drv.pos(self.index, start);

        let arg = self.evaluate()?;
        self.nodes.push(
            AstNode::new(AstKind::VariableDeclaration, &name, start).with_children(vec![
                AstNode::new(AstKind::Symbol, &full, start),
                arg.node,
            ]),
        );
        self.expect_statement_end()?;

        let defined_here = self
            .env
            .ctx
            .symbols
            .get(&full)
            .map(|sym| sym.defined_at == Some(pos));
        match defined_here {
            None => {
                // an unknown first pass value is defined on the second pass instead
                if arg.known {
                    self.env.ctx.symbols.add(&full, arg.value, false, Some(pos));
                }
            }
            Some(true) => self.env.ctx.symbols.change(&full, arg.value),
            Some(false) if conditional => {}
            Some(false) => return Err(self.error(SyntaxError::LabelAlreadyDefined, start)),
        }
        Ok(())
    }

    fn handle_macro_call(&mut self, name: &str, start: usize) -> Result<(), AsmError> {
        let Some(mac) = self.env.ctx.macros.get(name).cloned() else {
            return Err(self.error(SyntaxError::MacroNotFound, start));
        };
        if self.env.ctx.is_second_pass() {
            let pos = self.drv.pos(self.index, start);
            self.env.ctx.macros.add_reference(name, pos);
        }
        let mut node = AstNode::new(AstKind::MacroCall, name, start);

        self.drv
            .open_macro_scope(self.env, self.index, start)
            .map_err(|e| self.error(e, start))?;
        let result = self.bind_macro_args(&mac.params, &mut node).map(|()| {
            let call_site = self.env.ctx.objcode.push_call_site(self.src(start));
            let mut instance = SourceDriver::new(
                mac.defined_at.file,
                &mac.body,
                mac.defined_at.line + 1,
                self.drv.scopes().to_vec(),
                Some(call_site),
            );
            tracing::trace!("expanding macro {name}");
            instance.process(self.env);
        });
        self.drv.close_macro_scope();
        self.nodes.push(node);
        result
    }

    /// Binds each argument to its parameter at the macro's own scope level.
    fn bind_macro_args(&mut self, params: &[String], node: &mut AstNode) -> Result<(), AsmError> {
        for (i, param) in params.iter().enumerate() {
            if self.at_statement_end() {
                return Err(self.error(SyntaxError::ParameterCount, self.column));
            }
            if i > 0 {
                self.expect_comma()?;
            }
            let full = self.drv.scoped_name(param);
            if self.env.ctx.is_second_pass() {
                // a stale binding from the first pass must not shadow the caller's value
                self.env.ctx.symbols.remove(&full);
            }
            let arg = self.evaluate()?;
            node.push(arg.node);
            if arg.known {
                self.env.ctx.symbols.add(&full, arg.value, false, None);
            }
        }
        if !self.at_statement_end() {
            let kind = if self.peek() == Some(b',') {
                SyntaxError::ParameterCount
            } else {
                SyntaxError::InvalidCharacter
            };
            return Err(self.error(kind, self.column));
        }
        Ok(())
    }
}
