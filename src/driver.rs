use std::mem;

use crate::{
    context::Engine,
    diagnostic::{Diagnostic, Span},
    error::{AsmError, ErrorKind, SyntaxError},
    macros::Macro,
    parser::LineParser,
    value::Value,
    Pos,
};

pub const MAX_SCOPE_LEVELS: usize = 256;
pub const MAX_IF_LEVELS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Brace,
    For,
    Macro,
}

/// One level of `{}`, FOR or macro-instance scoping. Only FOR frames loop;
/// the others keep `step` at 0.
#[derive(Debug, Clone)]
pub struct ScopeFrame {
    pub kind: ScopeKind,
    pub id: usize,
    pub var: String,
    pub current: f64,
    pub end: f64,
    pub step: f64,
    pub count: usize,
    pub first_iteration: bool,
    resume: (usize, usize),
    opened_at: (usize, usize),
}

impl ScopeFrame {
    fn new(kind: ScopeKind, id: usize, opened_at: (usize, usize)) -> Self {
        Self {
            kind,
            id,
            var: String::new(),
            current: 0.0,
            end: 0.0,
            step: 0.0,
            count: 0,
            first_iteration: true,
            resume: opened_at,
            opened_at,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IfFrame {
    condition: bool,
    passed: bool,
    had_else: bool,
    is_macro: bool,
    opened_at: (usize, usize),
}

struct MacroCapture {
    mac: Macro,
    start_line: usize,
}

/// Walks one buffer of lines: a file, an included file or a macro body.
pub struct SourceDriver {
    file: usize,
    lines: Vec<String>,
    first_line: usize,
    cursor: usize,
    resume_column: usize,
    rewound: bool,
    scopes: Vec<ScopeFrame>,
    base_scope: usize,
    ifs: Vec<IfFrame>,
    capture: Option<MacroCapture>,
    call_site: Option<usize>,
}

impl SourceDriver {
    /// `scopes` are the caller's frames; this driver can never close them.
    pub fn new(
        file: usize,
        text: &str,
        first_line: usize,
        scopes: Vec<ScopeFrame>,
        call_site: Option<usize>,
    ) -> Self {
        Self {
            file,
            lines: text.lines().map(str::to_string).collect(),
            first_line,
            cursor: 0,
            resume_column: 0,
            rewound: false,
            base_scope: scopes.len(),
            scopes,
            ifs: Vec::new(),
            capture: None,
            call_site,
        }
    }

    pub fn process(&mut self, env: &mut Engine<'_>) {
        while self.cursor < self.lines.len() {
            if env.cancel.is_cancelled() {
                tracing::trace!("cancelled before line {}", self.line_number(self.cursor));
                return;
            }
            let index = self.cursor;
            let column = mem::take(&mut self.resume_column);
            self.cursor += 1;
            self.rewound = false;

            let record = env.ctx.is_second_pass()
                && column == 0
                && self.scopes.iter().all(|frame| frame.first_iteration);
            let line = self.lines[index].clone();
            let mut parser = LineParser::new(self, env, &line, index, column);
            let result = parser.process();
            let ast = parser.into_ast();

            if let Err(e) = result {
                self.report(env, index, &e);
            }
            if record {
                env.ctx.record_ast(self.file, self.line_number(index), ast);
            }
            if let Some(capture) = &mut self.capture {
                if capture.start_line != index {
                    capture.mac.add_line(&line);
                }
            }
        }
        self.finish(env);
    }

    fn finish(&mut self, env: &mut Engine<'_>) {
        for frame in mem::take(&mut self.ifs) {
            let kind = if frame.is_macro {
                SyntaxError::NoEndMacro
            } else {
                SyntaxError::IfWithoutEndif
            };
            self.report_at(env, frame.opened_at, kind.into());
        }
        self.capture = None;
        while self.scopes.len() > self.base_scope {
            let Some(frame) = self.scopes.pop() else {
                break;
            };
            let kind = match frame.kind {
                ScopeKind::For => SyntaxError::ForWithoutNext,
                ScopeKind::Brace => SyntaxError::MismatchedBraces,
                ScopeKind::Macro => continue,
            };
            self.report_at(env, frame.opened_at, kind.into());
        }
    }

    fn report(&self, env: &mut Engine<'_>, index: usize, e: &AsmError) {
        self.report_at(env, (index, e.column), e.kind.clone());
    }

    fn report_at(&self, env: &mut Engine<'_>, (index, column): (usize, usize), kind: ErrorKind) {
        let end = self.lines.get(index).map_or(column, String::len).max(column);
        let line = self.line_number(index);
        tracing::debug!("line {}:{}: {kind}", line + 1, column + 1);
        env.ctx.report(
            self.file,
            Diagnostic::error(
                Span {
                    line,
                    start: column,
                    end,
                },
                kind.to_string(),
            ),
        );
    }

    pub fn file(&self) -> usize {
        self.file
    }

    pub fn call_site(&self) -> Option<usize> {
        self.call_site
    }

    /// Line number within the file for a buffer index.
    pub fn line_number(&self, index: usize) -> usize {
        self.first_line + index
    }

    pub fn pos(&self, index: usize, column: usize) -> Pos {
        Pos {
            file: self.file,
            line: self.line_number(index),
            column,
        }
    }

    pub fn rewound(&self) -> bool {
        self.rewound
    }

    pub fn scopes(&self) -> &[ScopeFrame] {
        &self.scopes
    }

    pub fn scope_level(&self) -> usize {
        self.scopes.len()
    }

    pub fn in_for_loop(&self) -> bool {
        self.scopes.iter().any(|frame| frame.kind == ScopeKind::For)
    }

    /// `@id_count` for every frame below `level`, innermost first.
    pub fn suffix(&self, level: usize) -> String {
        self.scopes[..level.min(self.scopes.len())]
            .iter()
            .rev()
            .map(|frame| format!("@{}_{}", frame.id, frame.count))
            .collect()
    }

    pub fn scoped_name(&self, name: &str) -> String {
        format!("{name}{}", self.suffix(self.scopes.len()))
    }

    /// Full name of the nearest visible definition of `name`.
    pub fn find_symbol(&self, env: &Engine<'_>, name: &str) -> Option<String> {
        (0..=self.scopes.len())
            .rev()
            .map(|level| format!("{name}{}", self.suffix(level)))
            .find(|full| env.ctx.symbols.is_defined(full))
    }

    pub fn get_symbol_value(&self, env: &mut Engine<'_>, name: &str, pos: Pos) -> Option<Value> {
        let full = self.find_symbol(env, name)?;
        if env.ctx.is_second_pass() {
            env.ctx.symbols.add_reference(&full, pos);
        }
        env.ctx.symbols.value(&full).cloned()
    }

    fn push_scope(
        &mut self,
        env: &mut Engine<'_>,
        kind: ScopeKind,
        opened_at: (usize, usize),
    ) -> Result<(), SyntaxError> {
        if self.scopes.len() >= MAX_SCOPE_LEVELS {
            return Err(SyntaxError::TooManyFors);
        }
        let id = env.ctx.next_scope_id();
        tracing::trace!("opening {kind:?} scope {id}");
        self.scopes.push(ScopeFrame::new(kind, id, opened_at));
        Ok(())
    }

    pub fn open_brace(&mut self, env: &mut Engine<'_>, index: usize, column: usize) -> Result<(), SyntaxError> {
        self.push_scope(env, ScopeKind::Brace, (index, column))
    }

    pub fn close_brace(&mut self) -> Result<(), SyntaxError> {
        match self.scopes.last() {
            Some(frame) if self.scopes.len() > self.base_scope && frame.kind == ScopeKind::Brace => {
                self.scopes.pop();
                Ok(())
            }
            _ => Err(SyntaxError::MismatchedBraces),
        }
    }

    pub fn open_macro_scope(&mut self, env: &mut Engine<'_>, index: usize, column: usize) -> Result<(), SyntaxError> {
        self.push_scope(env, ScopeKind::Macro, (index, column))
    }

    pub fn close_macro_scope(&mut self) {
        if self.scopes.last().map(|frame| frame.kind) == Some(ScopeKind::Macro) {
            self.scopes.pop();
        }
    }

    /// Opens a FOR frame and binds the loop variable at the new level.
    /// The next iteration resumes at `resume_column` of line `index`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_for(
        &mut self,
        env: &mut Engine<'_>,
        var: &str,
        start: f64,
        end: f64,
        step: f64,
        index: usize,
        column: usize,
        resume_column: usize,
    ) -> Result<(), SyntaxError> {
        if step == 0.0 {
            return Err(SyntaxError::BadStep);
        }
        self.push_scope(env, ScopeKind::For, (index, column))?;
        let level = self.scopes.len();
        let frame = &mut self.scopes[level - 1];
        frame.var = var.to_string();
        frame.current = start;
        frame.end = end;
        frame.step = step;
        frame.resume = (index, resume_column);
        let full = self.scoped_name(var);
        define_loop_var(env, &full, start);
        Ok(())
    }

    /// Steps the innermost FOR; rewinds the cursor unless the loop is done.
    pub fn update_for(&mut self, env: &mut Engine<'_>) -> Result<(), SyntaxError> {
        let level = self.scopes.len();
        if level <= self.base_scope {
            return Err(SyntaxError::NextWithoutFor);
        }
        let frame = &mut self.scopes[level - 1];
        if frame.kind != ScopeKind::For {
            return Err(SyntaxError::NextWithoutFor);
        }
        frame.current += frame.step;
        let done = if frame.step > 0.0 {
            frame.current > frame.end
        } else {
            frame.current < frame.end
        };
        if done {
            tracing::trace!("closing FOR scope {}", frame.id);
            self.scopes.pop();
            return Ok(());
        }
        frame.count += 1;
        frame.first_iteration = false;
        let (line, column) = frame.resume;
        let value = frame.current;
        let var = frame.var.clone();

        self.cursor = line;
        self.resume_column = column;
        self.rewound = true;
        let full = self.scoped_name(&var);
        define_loop_var(env, &full, value);
        Ok(())
    }

    pub fn is_if_condition_true(&self) -> bool {
        self.ifs.iter().all(|frame| frame.condition)
    }

    /// Whether everything enclosing the innermost IF is true.
    pub fn is_outer_condition_true(&self) -> bool {
        let len = self.ifs.len().saturating_sub(1);
        self.ifs[..len].iter().all(|frame| frame.condition)
    }

    pub fn add_if(&mut self, index: usize, column: usize) -> Result<(), SyntaxError> {
        if self.ifs.len() >= MAX_IF_LEVELS {
            return Err(SyntaxError::TooManyIfs);
        }
        self.ifs.push(IfFrame {
            condition: true,
            passed: false,
            had_else: false,
            is_macro: false,
            opened_at: (index, column),
        });
        Ok(())
    }

    pub fn set_if_condition(&mut self, condition: bool) {
        if let Some(frame) = self.ifs.last_mut() {
            frame.condition = condition;
            frame.passed |= condition;
        }
    }

    fn innermost_if(&mut self, missing: SyntaxError) -> Result<&mut IfFrame, SyntaxError> {
        match self.ifs.last_mut() {
            Some(frame) if !frame.is_macro => Ok(frame),
            _ => Err(missing),
        }
    }

    /// Returns whether the ELIF condition still needs evaluating.
    pub fn start_elif(&mut self) -> Result<bool, SyntaxError> {
        let frame = self.innermost_if(SyntaxError::ElifWithoutIf)?;
        if frame.had_else {
            return Err(SyntaxError::ElifAfterElse);
        }
        if frame.passed {
            frame.condition = false;
            return Ok(false);
        }
        Ok(true)
    }

    pub fn start_else(&mut self) -> Result<(), SyntaxError> {
        let frame = self.innermost_if(SyntaxError::ElseWithoutIf)?;
        if frame.had_else {
            return Err(SyntaxError::ElseAfterElse);
        }
        frame.had_else = true;
        frame.condition = !frame.passed;
        frame.passed = true;
        Ok(())
    }

    pub fn remove_if(&mut self) -> Result<(), SyntaxError> {
        self.innermost_if(SyntaxError::EndifWithoutIf)?;
        self.ifs.pop();
        Ok(())
    }

    /// Opens a forced-false frame so the body lines are skipped. With a
    /// macro to fill, those lines are captured as its body.
    pub fn start_macro(
        &mut self,
        capture: Option<Macro>,
        index: usize,
        column: usize,
    ) -> Result<(), SyntaxError> {
        if self.capture.is_some() || self.ifs.iter().any(|frame| frame.is_macro) {
            return Err(SyntaxError::NoNestedMacros);
        }
        if self.ifs.len() >= MAX_IF_LEVELS {
            return Err(SyntaxError::TooManyIfs);
        }
        self.ifs.push(IfFrame {
            condition: false,
            passed: false,
            had_else: false,
            is_macro: true,
            opened_at: (index, column),
        });
        self.capture = capture.map(|mac| MacroCapture {
            mac,
            start_line: index,
        });
        Ok(())
    }

    pub fn end_macro(&mut self) -> Result<Option<Macro>, SyntaxError> {
        match self.ifs.last() {
            Some(frame) if frame.is_macro => {
                self.ifs.pop();
                Ok(self.capture.take().map(|capture| capture.mac))
            }
            _ => Err(SyntaxError::EndMacroUnexpected),
        }
    }
}

fn define_loop_var(env: &mut Engine<'_>, full: &str, value: f64) {
    if !env
        .ctx
        .symbols
        .add(full, Value::Number(value), false, None)
    {
        env.ctx.symbols.change(full, Value::Number(value));
    }
}
