use std::path::PathBuf;

use super::{args::ArgList, Directive, LineParser};
use crate::{
    ast::{AstKind, AstNode},
    context::{DocumentLink, LinkKind, SaveRequest, MAX_EVAL_DEPTH, MAX_INCLUDE_DEPTH},
    driver::SourceDriver,
    error::{AsmError, SyntaxError},
    macros::Macro,
    objcode::MEMORY_SIZE,
    value::{format_number, to_int, Value},
};

type Nodes = Result<Vec<AstNode>, AsmError>;

impl<'p, 'a> LineParser<'p, 'a> {
    pub(super) fn handle_directive(&mut self, directive: Directive, start: usize, len: usize) -> Result<(), AsmError> {
        let children = match directive {
            Directive::Label => return self.handle_label(start),
            Directive::Comment => {
                self.column = self.line.len();
                return Ok(());
            }
            Directive::Separator => return Ok(()),
            Directive::OpenBrace => {
                return self
                    .drv
                    .open_brace(self.env, self.index, start)
                    .map_err(|e| self.error(e, start));
            }
            Directive::CloseBrace => {
                return self.drv.close_brace().map_err(|e| self.error(e, start));
            }
            Directive::Print => self.handle_print()?,
            Directive::Cpu => self.handle_cpu()?,
            Directive::Org => self.handle_org()?,
            Directive::Include => self.handle_include(start)?,
            Directive::IncBin => self.handle_incbin(start)?,
            Directive::Equb | Directive::Equs => self.handle_equ(1)?,
            Directive::Equw => self.handle_equ(2)?,
            Directive::Equd => self.handle_equ(4)?,
            Directive::Assert => self.handle_assert()?,
            Directive::Save => self.handle_save(start)?,
            Directive::For => self.handle_for(start)?,
            Directive::Next => self.handle_next(start)?,
            Directive::If => self.handle_if(start)?,
            Directive::Elif => self.handle_elif(start)?,
            Directive::Else => self.handle_else(start)?,
            Directive::Endif => self.handle_endif(start)?,
            Directive::Align => self.handle_align(start)?,
            Directive::SkipTo => self.handle_skipto(start)?,
            Directive::Skip => self.handle_skip(start)?,
            Directive::Guard => self.handle_guard()?,
            Directive::Clear => self.handle_clear()?,
            Directive::MapChar => self.handle_mapchar()?,
            Directive::PutFile => self.handle_putfile(LinkKind::PutFile)?,
            Directive::PutText => self.handle_putfile(LinkKind::PutText)?,
            Directive::PutBasic => self.handle_putbasic()?,
            Directive::Macro => self.handle_macro(start)?,
            Directive::EndMacro => self.handle_endmacro(start)?,
            Directive::Error => self.handle_error(start)?,
            Directive::CopyBlock => self.handle_copyblock(start)?,
            Directive::Randomize => self.handle_randomize()?,
            Directive::Asm => self.handle_asm()?,
        };
        let name = self.line[start..start + len].to_ascii_uppercase();
        self.nodes
            .push(AstNode::new(AstKind::Command, name, start).with_children(children));
        Ok(())
    }

    fn handle_org(&mut self) -> Nodes {
        let mut args = ArgList::new(self);
        let addr = args.int()?.address().value()?;
        let nodes = args.finish()?;
        self.env.ctx.objcode.set_pc(addr as usize);
        Ok(nodes)
    }

    fn handle_cpu(&mut self) -> Nodes {
        let mut args = ArgList::new(self);
        let cpu = args.int()?.range(0, 1).value()?;
        let nodes = args.finish()?;
        self.env.ctx.objcode.set_cpu(cpu as u8);
        self.env.ctx.symbols.change("CPU", Value::from(cpu));
        Ok(nodes)
    }

    fn handle_guard(&mut self) -> Nodes {
        let mut args = ArgList::new(self);
        let addr = args.int()?.address().value()?;
        let nodes = args.finish()?;
        self.env.ctx.objcode.set_guard(addr as usize);
        Ok(nodes)
    }

    fn handle_clear(&mut self) -> Nodes {
        let mut args = ArgList::new(self);
        let start = args.int()?.address().value()?;
        let end = args.int()?;
        let end_col = end.column();
        let end = end.range(0, MEMORY_SIZE as i32).value()?;
        let nodes = args.finish()?;
        if end < start {
            return Err(self.error(SyntaxError::OutOfRange, end_col));
        }
        self.env
            .ctx
            .objcode
            .clear(start as usize, end as usize, true);
        Ok(nodes)
    }

    fn handle_skip(&mut self, start: usize) -> Nodes {
        let mut args = ArgList::new(self);
        let count = args.int()?.range(0, MEMORY_SIZE as i32).value()?;
        let nodes = args.finish()?;
        self.env
            .ctx
            .objcode
            .inc_pc(count as usize)
            .map_err(|e| self.error(e, start))?;
        Ok(nodes)
    }

    fn handle_skipto(&mut self, start: usize) -> Nodes {
        let mut args = ArgList::new(self);
        let addr = args.int()?;
        let column = addr.column();
        let addr = addr.range(0, MEMORY_SIZE as i32).value()? as usize;
        let nodes = args.finish()?;
        let pc = self.env.ctx.objcode.pc();
        if addr < pc {
            return Err(self.error(SyntaxError::BackwardsSkip, column));
        }
        self.env
            .ctx
            .objcode
            .inc_pc(addr - pc)
            .map_err(|e| self.error(e, start))?;
        Ok(nodes)
    }

    fn handle_align(&mut self, start: usize) -> Nodes {
        let mut args = ArgList::new(self);
        let align = args.int()?;
        let column = align.column();
        let align = align.value()?;
        let nodes = args.finish()?;
        if align < 1 || align > MEMORY_SIZE as i32 || (align & (align - 1)) != 0 {
            return Err(self.error(SyntaxError::BadAlignment, column));
        }
        let align = align as usize;
        let pc = self.env.ctx.objcode.pc();
        self.env
            .ctx
            .objcode
            .inc_pc((align - pc % align) % align)
            .map_err(|e| self.error(e, start))?;
        Ok(nodes)
    }

    /// EQUB/EQUS take bytes and strings, EQUW words, EQUD double words.
    fn handle_equ(&mut self, width: usize) -> Nodes {
        let mut nodes = Vec::new();
        loop {
            self.skip_spaces();
            let column = self.column;
            let arg = self.evaluate()?;
            nodes.push(arg.node);
            match arg.value {
                Value::Str(text) => {
                    if width != 1 {
                        return Err(self.error(SyntaxError::TypeMismatch, column));
                    }
                    for c in text.chars() {
                        let byte = u8::try_from(u32::from(c))
                            .map_err(|_| self.error(SyntaxError::OutOfRange, column))?;
                        let mapped = self.env.ctx.objcode.mapped_char(byte);
                        self.put_bytes(&[mapped], true, column)?;
                    }
                }
                Value::Number(n) => {
                    let (min, max) = match width {
                        1 => (-0x80, 0xFF),
                        2 => (-0x8000, 0xFFFF),
                        _ => (i32::MIN as i64, u32::MAX as i64),
                    };
                    if arg.known && (n.trunc() < min as f64 || n.trunc() > max as f64) {
                        return Err(self.error(SyntaxError::NumberTooBig, column));
                    }
                    let value = n.trunc() as i64 as u32;
                    self.put_bytes(&value.to_le_bytes()[..width], arg.known, column)?;
                }
            }
            if self.at_statement_end() {
                return Ok(nodes);
            }
            self.expect_comma()?;
        }
    }

    fn put_bytes(&mut self, bytes: &[u8], known: bool, column: usize) -> Result<(), AsmError> {
        for byte in bytes {
            let src = self.src(column);
            self.env
                .ctx
                .objcode
                .put_byte(*byte, known, src)
                .map_err(|e| self.error(e, column))?;
        }
        Ok(())
    }

    fn handle_assert(&mut self) -> Nodes {
        let mut nodes = Vec::new();
        loop {
            self.skip_spaces();
            let column = self.column;
            let arg = self.evaluate()?;
            nodes.push(arg.node);
            let condition = arg.value.number().map_err(|e| self.error(e, column))?;
            if arg.known && self.env.ctx.is_second_pass() && condition == 0.0 {
                return Err(self.error(SyntaxError::AssertionFailed, column));
            }
            if self.at_statement_end() {
                return Ok(nodes);
            }
            self.expect_comma()?;
        }
    }

    fn handle_print(&mut self) -> Nodes {
        let mut nodes = Vec::new();
        let mut items = Vec::new();
        while !self.at_statement_end() {
            if !nodes.is_empty() {
                self.expect_comma()?;
                self.skip_spaces();
            }
            let hex = self.peek() == Some(b'~');
            if hex {
                self.column += 1;
            }
            let arg = self.evaluate()?;
            nodes.push(arg.node);
            items.push(match arg.value {
                Value::Str(text) => text,
                Value::Number(n) if hex => format!("&{:X}", to_int(n) as u32),
                Value::Number(n) => format_number(n),
            });
        }
        if self.env.ctx.is_second_pass() {
            self.env.ctx.print(items.join(" "));
        }
        Ok(nodes)
    }

    fn handle_error(&mut self, start: usize) -> Nodes {
        let mut args = ArgList::new(self);
        let message = args.string()?.value()?;
        let nodes = args.finish()?;
        if self.env.ctx.is_second_pass() {
            return Err(self.error(SyntaxError::UserError(message), start));
        }
        Ok(nodes)
    }

    fn handle_save(&mut self, start: usize) -> Nodes {
        let mut args = ArgList::new(self);
        let name = args.string_if_present()?.map(|(name, _)| name);
        let begin = args.int()?.accept_undef().address().value()?;
        let end = args.int()?.accept_undef().range(0, MEMORY_SIZE as i32).value()?;
        let exec = args.int()?.accept_undef().default(begin).address().value()?;
        let reload = args.int()?.accept_undef().default(begin).address().value()?;
        let nodes = args.finish()?;

        let Some(name) = name.or_else(|| self.env.ctx.options.default_output.clone()) else {
            return Err(self.error(SyntaxError::NoAnonSave, start));
        };
        if self.env.ctx.is_second_pass() {
            if end < begin {
                return Err(self.error(SyntaxError::OutOfRange, start));
            }
            tracing::debug!("save {name} &{begin:04X}-&{end:04X}");
            let pos = self.drv.pos(self.index, start);
            self.env.ctx.add_save(SaveRequest {
                name,
                start: begin as usize,
                end: end as usize,
                exec: exec as usize,
                reload: reload as usize,
                pos,
            });
        }
        Ok(nodes)
    }

    fn handle_for(&mut self, start: usize) -> Nodes {
        self.skip_spaces();
        let var_col = self.column;
        let var = self.expect_symbol_name()?;
        self.expect_comma()?;
        let mut args = ArgList::new(self);
        let first = args.number()?.value()?;
        let last = args.number()?.value()?;
        let step = args.number()?.default(1.0).value()?;
        let mut nodes = args.finish()?;
        nodes.insert(0, AstNode::new(AstKind::Symbol, &var, var_col));

        let resume = self.column;
        self.drv
            .add_for(self.env, &var, first, last, step, self.index, start, resume)
            .map_err(|e| self.error(e, start))?;
        Ok(nodes)
    }

    fn handle_next(&mut self, start: usize) -> Nodes {
        self.expect_statement_end()?;
        self.drv
            .update_for(self.env)
            .map_err(|e| self.error(e, start))?;
        Ok(Vec::new())
    }

    fn handle_if(&mut self, start: usize) -> Nodes {
        let outer = self.drv.is_if_condition_true();
        self.drv
            .add_if(self.index, start)
            .map_err(|e| self.error(e, start))?;
        if !outer {
            self.drv.set_if_condition(false);
            self.skip_statement();
            return Ok(Vec::new());
        }
        // the body stays skipped if the condition fails to evaluate
        self.drv.set_if_condition(false);
        self.condition(start)
    }

    fn handle_elif(&mut self, start: usize) -> Nodes {
        let pending = self.drv.start_elif().map_err(|e| self.error(e, start))?;
        if !pending || !self.drv.is_outer_condition_true() {
            self.skip_statement();
            return Ok(Vec::new());
        }
        self.condition(start)
    }

    fn condition(&mut self, start: usize) -> Nodes {
        self.skip_spaces();
        let column = self.column;
        let arg = self.evaluate()?;
        let condition = arg.value.number().map_err(|e| self.error(e, column))?;
        self.expect_statement_end()?;
        tracing::trace!("condition at column {start} is {condition}");
        self.drv.set_if_condition(condition != 0.0);
        Ok(vec![arg.node])
    }

    fn handle_else(&mut self, start: usize) -> Nodes {
        self.expect_statement_end()?;
        self.drv.start_else().map_err(|e| self.error(e, start))?;
        Ok(Vec::new())
    }

    fn handle_endif(&mut self, start: usize) -> Nodes {
        self.expect_statement_end()?;
        self.drv.remove_if().map_err(|e| self.error(e, start))?;
        Ok(Vec::new())
    }

    fn handle_macro(&mut self, start: usize) -> Nodes {
        self.skip_spaces();
        let name_col = self.column;
        let name = self.expect_symbol_name()?;
        let mut mac = Macro::new(&name, self.drv.pos(self.index, name_col));
        let mut nodes = vec![AstNode::new(AstKind::Symbol, &name, name_col)];
        while !self.at_statement_end() {
            // the comma after the name is optional
            if !mac.params.is_empty() || self.peek() == Some(b',') {
                self.expect_comma()?;
            }
            self.skip_spaces();
            let column = self.column;
            let param = self.expect_symbol_name()?;
            mac.add_param(&param);
            nodes.push(AstNode::new(AstKind::Symbol, &param, column));
        }

        let define = self.drv.is_if_condition_true() && self.env.ctx.is_first_pass();
        let duplicate = define && self.env.ctx.macros.exists(&name);
        let capture = (define && !duplicate).then_some(mac);
        self.drv
            .start_macro(capture, self.index, start)
            .map_err(|e| self.error(e, start))?;
        if duplicate {
            return Err(self.error(SyntaxError::DuplicateMacroName, name_col));
        }
        Ok(nodes)
    }

    fn handle_endmacro(&mut self, start: usize) -> Nodes {
        self.expect_statement_end()?;
        let mac = self.drv.end_macro().map_err(|e| self.error(e, start))?;
        if let Some(mac) = mac {
            tracing::trace!("defined macro {} with {} parameters", mac.name, mac.params.len());
            self.env.ctx.macros.add(mac);
        }
        Ok(Vec::new())
    }

    fn handle_mapchar(&mut self) -> Nodes {
        let mut args = ArgList::new(self);
        let first = args.int()?;
        let first_col = first.column();
        let first = first.range(32, 127).value()?;
        let second = args.int()?.range(0, 255).value()?;
        let third = args.int()?.range(0, 255).optional()?;
        let nodes = args.finish()?;

        let Some(mapped) = third else {
            self.env.ctx.objcode.map_char(first as u8, second as u8);
            return Ok(nodes);
        };
        if second < first || second > 127 || mapped + (second - first) > 255 {
            return Err(self.error(SyntaxError::OutOfRange, first_col));
        }
        for offset in 0..=(second - first) {
            self.env
                .ctx
                .objcode
                .map_char((first + offset) as u8, (mapped + offset) as u8);
        }
        Ok(nodes)
    }

    fn handle_copyblock(&mut self, start: usize) -> Nodes {
        let mut args = ArgList::new(self);
        let begin = args.int()?.address().value()?;
        let end = args.int()?.range(0, MEMORY_SIZE as i32).value()?;
        let dest = args.int()?.address().value()?;
        let nodes = args.finish()?;
        if end < begin {
            return Err(self.error(SyntaxError::OutOfRange, start));
        }
        self.env
            .ctx
            .objcode
            .copy_block(begin as usize, end as usize, dest as usize)
            .map_err(|e| self.error(e, start))?;
        Ok(nodes)
    }

    fn handle_randomize(&mut self) -> Nodes {
        let mut args = ArgList::new(self);
        let seed = args.int()?.value()?;
        let nodes = args.finish()?;
        self.env.ctx.rng.seed(seed as u32);
        Ok(nodes)
    }

    fn handle_asm(&mut self) -> Nodes {
        let mut args = ArgList::new(self);
        let text = args.string()?;
        let column = text.column();
        let text = text.value()?;
        let mut nodes = args.finish()?;
        if self.env.ctx.eval_depth >= MAX_EVAL_DEPTH {
            return Err(self.error(SyntaxError::TooManyEvals, column));
        }

        self.env.ctx.eval_depth += 1;
        let mut sub = LineParser::new(&mut *self.drv, &mut *self.env, &text, self.index, 0);
        let result = sub.process();
        nodes.push(sub.into_ast());
        self.env.ctx.eval_depth -= 1;
        result.map_err(|e| AsmError::new(e.kind, self.line, column))?;
        Ok(nodes)
    }

    /// Resolves a file named by a directive and records the link on the
    /// second pass.
    fn resolve_file(&mut self, name: &str, column: usize, kind: LinkKind) -> Result<PathBuf, AsmError> {
        let from = self
            .env
            .ctx
            .file_path(self.drv.file())
            .map(|path| path.to_path_buf())
            .unwrap_or_default();
        let Some(path) = self.env.provider.resolve(&from, name) else {
            return Err(self.error(SyntaxError::FileOpen, column));
        };
        if self.env.ctx.is_second_pass() {
            let pos = self.drv.pos(self.index, column);
            self.env.ctx.add_link(DocumentLink {
                kind,
                target: path.clone(),
                pos,
                len: name.len() + 2,
            });
        }
        Ok(path)
    }

    fn handle_include(&mut self, start: usize) -> Nodes {
        let mut args = ArgList::new(self);
        let name = args.string()?;
        let column = name.column();
        let name = name.value()?;
        let nodes = args.finish()?;

        if self.drv.in_for_loop() {
            return Err(self.error(SyntaxError::CantInclude, start));
        }
        if self.env.ctx.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(self.error(SyntaxError::TooManyIncludes, start));
        }
        let path = self.resolve_file(&name, column, LinkKind::Include)?;
        let text = self
            .env
            .provider
            .read_text(&path)
            .map_err(|_| self.error(SyntaxError::FileOpen, column))?;

        tracing::trace!("including {}", path.display());
        let file = self.env.ctx.file_id(&path);
        let mut included = SourceDriver::new(
            file,
            &text,
            0,
            self.drv.scopes().to_vec(),
            self.drv.call_site(),
        );
        self.env.ctx.include_depth += 1;
        included.process(self.env);
        self.env.ctx.include_depth -= 1;
        Ok(nodes)
    }

    fn handle_incbin(&mut self, start: usize) -> Nodes {
        let mut args = ArgList::new(self);
        let name = args.string()?;
        let column = name.column();
        let name = name.value()?;
        let nodes = args.finish()?;

        let path = self.resolve_file(&name, column, LinkKind::IncBin)?;
        let bytes = self
            .env
            .provider
            .read_bytes(&path)
            .map_err(|_| self.error(SyntaxError::FileOpen, column))?;
        self.put_bytes(&bytes, true, start)?;
        Ok(nodes)
    }

    fn handle_putfile(&mut self, kind: LinkKind) -> Nodes {
        let mut args = ArgList::new(self);
        let host = args.string()?;
        let column = host.column();
        let host = host.value()?;
        args.string_if_present()?;
        let begin = args.int()?.accept_undef().address().value()?;
        args.int()?.accept_undef().default(begin).address().value()?;
        let nodes = args.finish()?;

        self.resolve_file(&host, column, kind)?;
        Ok(nodes)
    }

    fn handle_putbasic(&mut self) -> Nodes {
        let mut args = ArgList::new(self);
        let host = args.string()?;
        let column = host.column();
        let host = host.value()?;
        args.string_if_present()?;
        let nodes = args.finish()?;

        self.resolve_file(&host, column, LinkKind::PutBasic)?;
        Ok(nodes)
    }
}
