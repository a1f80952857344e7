use super::{is_ident, LineParser};
use crate::{
    ast::{AstKind, AstNode},
    error::{AsmError, AssembleError, SyntaxError},
    opcodes::{Addr, Mnemonic},
};

impl<'p, 'a> LineParser<'p, 'a> {
    pub(super) fn handle_assembler(&mut self, mne: Mnemonic, start: usize) -> Result<(), AsmError> {
        let mut node = AstNode::new(AstKind::Assembly, mne.mne.as_str(), start);
        let result = self.operand(&mne, start, &mut node);
        self.nodes.push(node);
        result
    }

    fn operand(&mut self, mne: &Mnemonic, start: usize, node: &mut AstNode) -> Result<(), AsmError> {
        if self.at_statement_end() {
            let op = mne
                .opcode(Addr::IMP)
                .or_else(|| mne.opcode(Addr::ACC))
                .ok_or_else(|| self.error(SyntaxError::NoImplied, start))?;
            return self.emit1(op, start);
        }

        let column = self.column;
        match self.peek() {
            Some(b'#') => {
                let op = mne
                    .opcode(Addr::IMM)
                    .ok_or_else(|| self.error(SyntaxError::NoImmediate, column))?;
                self.column += 1;
                let arg = self.evaluate()?;
                node.push(arg.node);
                let value = arg.value.int().map_err(|e| self.error(e, column))?;
                self.expect_statement_end()?;
                if arg.known && value > 0xFF {
                    return Err(self.error(SyntaxError::ImmTooLarge, column));
                }
                if arg.known && value < -0x80 {
                    return Err(self.error(SyntaxError::ImmNegative, column));
                }
                self.emit2(op, value as u8, arg.known, start)
            }
            Some(b'A' | b'a') if mne.has(Addr::ACC) && self.is_accumulator() => {
                self.column += 1;
                node.push(AstNode::new(AstKind::Value, "A", column));
                self.expect_statement_end()?;
                let op = mne
                    .opcode(Addr::ACC)
                    .ok_or_else(|| self.error(SyntaxError::NoImplied, column))?;
                self.emit1(op, start)
            }
            Some(b'(') if mne.has_indirect() => {
                let mark = node.children.len();
                let rng = self.env.ctx.rng;
                if self.indirect(mne, start, node)? {
                    return Ok(());
                }
                // a bracketed address expression rather than an indirect mode
                node.children.truncate(mark);
                self.env.ctx.rng = rng;
                self.column = column;
                self.address(mne, start, node)
            }
            _ => self.address(mne, start, node),
        }
    }

    fn is_accumulator(&self) -> bool {
        let bytes = self.line.as_bytes();
        if bytes.get(self.column + 1).copied().is_some_and(is_ident) {
            return false;
        }
        let mut column = self.column + 1;
        while matches!(bytes.get(column), Some(b' ' | b'\t')) {
            column += 1;
        }
        matches!(bytes.get(column), None | Some(b':' | b';' | b'\\'))
    }

    /// Returns false when the operand turned out not to be indirect.
    fn indirect(&mut self, mne: &Mnemonic, start: usize, node: &mut AstNode) -> Result<bool, AsmError> {
        let column = self.column;
        self.column += 1;
        let arg = self.evaluate()?;
        let value = arg.value.int().map_err(|e| self.error(e, column))?;
        node.push(arg.node);
        self.skip_spaces();

        match self.peek() {
            Some(b',') => {
                self.column += 1;
                self.skip_spaces();
                if !matches!(self.peek(), Some(b'X' | b'x')) {
                    return Err(self.error(SyntaxError::BadIndexed, self.column));
                }
                self.column += 1;
                self.skip_spaces();
                if self.peek() != Some(b')') {
                    return Err(self.error(SyntaxError::MismatchedParentheses, column));
                }
                self.column += 1;
                node.push(AstNode::new(AstKind::Value, "X", column));
                self.expect_statement_end()?;

                if let Some(op) = mne.opcode(Addr::INX) {
                    self.check_zero_page(value, arg.known, column)?;
                    self.emit2(op, value as u8, arg.known, start)?;
                } else if let Some(op) = mne.opcode(Addr::IAX) {
                    self.check_address(value, arg.known, column)?;
                    self.emit3(op, value as u16, arg.known, start)?;
                } else {
                    return Err(self.error(SyntaxError::NoIndexedX, column));
                }
                Ok(true)
            }
            Some(b')') => {
                self.column += 1;
                if self.at_statement_end() {
                    if let Some(op) = mne.opcode(Addr::IND) {
                        self.check_address(value, arg.known, column)?;
                        if arg.known && self.env.ctx.objcode.cpu() == 0 && value & 0xFF == 0xFF {
                            return Err(self.error(AssembleError::Jmp6502Bug, column));
                        }
                        self.emit3(op, value as u16, arg.known, start)?;
                        return Ok(true);
                    }
                    if let Some(op) = mne.opcode(Addr::IZP) {
                        self.check_zero_page(value, arg.known, column)?;
                        self.emit2(op, value as u8, arg.known, start)?;
                        return Ok(true);
                    }
                    return Ok(false);
                }
                if self.peek() != Some(b',') {
                    return Ok(false);
                }
                let mut lookahead = self.column + 1;
                while matches!(self.peek_at(lookahead), Some(b' ' | b'\t')) {
                    lookahead += 1;
                }
                let Some(op) = mne.opcode(Addr::INY) else {
                    return Ok(false);
                };
                if !matches!(self.peek_at(lookahead), Some(b'Y' | b'y')) {
                    return Ok(false);
                }
                self.column = lookahead + 1;
                node.push(AstNode::new(AstKind::Value, "Y", lookahead));
                self.expect_statement_end()?;
                self.check_zero_page(value, arg.known, column)?;
                self.emit2(op, value as u8, arg.known, start)?;
                Ok(true)
            }
            _ => Err(self.error(SyntaxError::MismatchedParentheses, column)),
        }
    }

    fn address(&mut self, mne: &Mnemonic, start: usize, node: &mut AstNode) -> Result<(), AsmError> {
        let column = self.column;
        let arg = self.evaluate()?;
        node.push(arg.node);
        let value = arg.value.int().map_err(|e| self.error(e, column))?;

        if let Some(op) = mne.opcode(Addr::REL) {
            self.expect_statement_end()?;
            return self.branch(op, value, arg.known, start, column);
        }
        self.check_address(value, arg.known, column)?;
        let zero_page = value < 0x100;

        let (zp, abs, missing) = if self.at_statement_end() {
            (Addr::ZP, Addr::ABS, SyntaxError::NoAbsolute)
        } else {
            if self.peek() != Some(b',') {
                return self.expect_statement_end();
            }
            self.column += 1;
            self.skip_spaces();
            let reg_col = self.column;
            let reg = self.peek().map(|c| c.to_ascii_uppercase());
            if self.peek_at(reg_col + 1).is_some_and(is_ident) {
                return Err(self.error(SyntaxError::BadIndexed, reg_col));
            }
            self.column += 1;
            self.expect_statement_end()?;
            match reg {
                Some(b'X') => {
                    node.push(AstNode::new(AstKind::Value, "X", reg_col));
                    (Addr::ZPX, Addr::ABX, SyntaxError::NoIndexedX)
                }
                Some(b'Y') => {
                    node.push(AstNode::new(AstKind::Value, "Y", reg_col));
                    (Addr::ZPY, Addr::ABY, SyntaxError::NoIndexedY)
                }
                _ => return Err(self.error(SyntaxError::BadIndexed, reg_col)),
            }
        };

        match (mne.opcode(zp), mne.opcode(abs)) {
            (Some(op), _) if zero_page => self.emit2(op, value as u8, arg.known, start),
            (_, Some(op)) => self.emit3(op, value as u16, arg.known, start),
            (Some(_), None) => Err(self.error(SyntaxError::NotZeroPage, column)),
            (None, None) => Err(self.error(missing, column)),
        }
    }

    fn branch(&mut self, op: u8, target: i32, known: bool, start: usize, column: usize) -> Result<(), AsmError> {
        let pc = self.env.ctx.objcode.pc() as i32;
        // forward targets are not settled until the second pass
        let (target, known) = if self.env.ctx.is_first_pass() {
            (pc, false)
        } else {
            (target, known)
        };
        let offset = target - (pc + 2);
        if !(-128..=127).contains(&offset) {
            return Err(self.error(SyntaxError::BranchOutOfRange, column));
        }
        self.emit2(op, offset as u8, known, start)
    }

    fn check_zero_page(&self, value: i32, known: bool, column: usize) -> Result<(), AsmError> {
        if known && !(0..=0xFF).contains(&value) {
            return Err(self.error(SyntaxError::NotZeroPage, column));
        }
        Ok(())
    }

    fn check_address(&self, value: i32, known: bool, column: usize) -> Result<(), AsmError> {
        if known && !(0..=0xFFFF).contains(&value) {
            return Err(self.error(SyntaxError::BadAddress, column));
        }
        Ok(())
    }

    fn emit1(&mut self, op: u8, start: usize) -> Result<(), AsmError> {
        let src = self.src(start);
        self.env
            .ctx
            .objcode
            .assemble1(op, src)
            .map_err(|e| self.error(e, start))
    }

    fn emit2(&mut self, op: u8, value: u8, known: bool, start: usize) -> Result<(), AsmError> {
        let src = self.src(start);
        self.env
            .ctx
            .objcode
            .assemble2(op, value, known, src)
            .map_err(|e| self.error(e, start))
    }

    fn emit3(&mut self, op: u8, value: u16, known: bool, start: usize) -> Result<(), AsmError> {
        let src = self.src(start);
        self.env
            .ctx
            .objcode
            .assemble3(op, value, known, src)
            .map_err(|e| self.error(e, start))
    }
}
