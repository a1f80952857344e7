use crate::error::AssembleError;

pub const MEMORY_SIZE: usize = 0x10000;

pub struct MemFlags;

#[rustfmt::skip]
impl MemFlags {
    pub const USED: u8 = 1 << 0;       // written during the current pass
    pub const GUARD: u8 = 1 << 1;      // writes forbidden
    pub const CHECK: u8 = 1 << 2;      // pass 1 must reproduce the pass 0 byte
    pub const DONT_CHECK: u8 = 1 << 3; // never compared (cleared, or unknown on pass 0)
}

/// Where a byte of object code came from. `parent` indexes the call-site
/// table when the byte was emitted by a macro expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapEntry {
    pub file: usize,
    pub line: usize,
    pub column: usize,
    pub parent: Option<usize>,
}

pub struct ObjectCode {
    memory: Vec<u8>,
    flags: Vec<u8>,
    source_map: Vec<Option<SourceMapEntry>>,
    call_sites: Vec<SourceMapEntry>,
    pc: usize,
    cpu: u8,
    mapchar: [u8; 96],
    first_pass: bool,
    inconsistency_reported: bool,
}

impl ObjectCode {
    pub fn new() -> Self {
        Self {
            memory: vec![0; MEMORY_SIZE],
            flags: vec![0; MEMORY_SIZE],
            source_map: vec![None; MEMORY_SIZE],
            call_sites: Vec::new(),
            pc: 0,
            cpu: 0,
            mapchar: identity_mapchar(),
            first_pass: true,
            inconsistency_reported: false,
        }
    }

    /// Soft-clears the whole image and resets the per-pass registers.
    pub fn begin_pass(&mut self, first_pass: bool, cpu: u8) {
        self.first_pass = first_pass;
        self.clear(0, MEMORY_SIZE, false);
        self.source_map.fill(None);
        self.call_sites.clear();
        self.pc = 0;
        self.cpu = cpu;
        self.mapchar = identity_mapchar();
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    pub fn inc_pc(&mut self, amount: usize) -> Result<(), AssembleError> {
        if self.pc + amount > MEMORY_SIZE {
            return Err(AssembleError::OutOfMemory);
        }
        self.pc += amount;
        Ok(())
    }

    pub fn cpu(&self) -> u8 {
        self.cpu
    }

    pub fn set_cpu(&mut self, cpu: u8) {
        self.cpu = cpu;
    }

    pub fn put_byte(
        &mut self,
        byte: u8,
        known: bool,
        src: SourceMapEntry,
    ) -> Result<(), AssembleError> {
        self.write(&[(byte, known)], src)
    }

    pub fn assemble1(&mut self, opcode: u8, src: SourceMapEntry) -> Result<(), AssembleError> {
        self.write(&[(opcode, true)], src)
    }

    pub fn assemble2(
        &mut self,
        opcode: u8,
        value: u8,
        known: bool,
        src: SourceMapEntry,
    ) -> Result<(), AssembleError> {
        self.write(&[(opcode, true), (value, known)], src)
    }

    pub fn assemble3(
        &mut self,
        opcode: u8,
        addr: u16,
        known: bool,
        src: SourceMapEntry,
    ) -> Result<(), AssembleError> {
        let [lo, hi] = addr.to_le_bytes();
        self.write(&[(opcode, true), (lo, known), (hi, known)], src)
    }

    fn write(&mut self, bytes: &[(u8, bool)], src: SourceMapEntry) -> Result<(), AssembleError> {
        let start = self.pc;
        let end = start + bytes.len();
        if end > MEMORY_SIZE {
            return Err(AssembleError::OutOfMemory);
        }
        if self.flags[start..end]
            .iter()
            .any(|flags| flags & MemFlags::GUARD != 0)
        {
            return Err(AssembleError::GuardHit);
        }
        if self.flags[start..end]
            .iter()
            .any(|flags| flags & MemFlags::USED != 0)
        {
            return Err(AssembleError::Overlap);
        }

        let mut inconsistent = false;
        for (addr, &(byte, known)) in (start..end).zip(bytes) {
            let flags = &mut self.flags[addr];
            if self.first_pass {
                *flags |= if known {
                    MemFlags::CHECK
                } else {
                    MemFlags::DONT_CHECK
                };
            } else if (*flags & (MemFlags::CHECK | MemFlags::DONT_CHECK)) == MemFlags::CHECK
                && self.memory[addr] != byte
            {
                inconsistent = true;
            }
            *flags |= MemFlags::USED;
            self.memory[addr] = byte;
            self.source_map[addr] = Some(src);
        }
        self.pc = end;

        if inconsistent && !self.inconsistency_reported {
            self.inconsistency_reported = true;
            return Err(AssembleError::InconsistentCode);
        }
        Ok(())
    }

    pub fn set_guard(&mut self, addr: usize) {
        if let Some(flags) = self.flags.get_mut(addr) {
            *flags |= MemFlags::GUARD;
        }
    }

    /// A hard clear zeroes memory and exempts the range from the pass 1 check;
    /// a soft clear only releases it for writing.
    pub fn clear(&mut self, start: usize, end: usize, hard: bool) {
        let end = end.min(MEMORY_SIZE);
        if start >= end {
            return;
        }
        if hard {
            self.memory[start..end].fill(0);
            self.flags[start..end].fill(MemFlags::DONT_CHECK);
            self.source_map[start..end].fill(None);
        } else {
            for flags in &mut self.flags[start..end] {
                *flags &= !(MemFlags::USED | MemFlags::GUARD);
            }
        }
    }

    pub fn copy_block(&mut self, start: usize, end: usize, dest: usize) -> Result<(), AssembleError> {
        if end < start || end > MEMORY_SIZE || dest + (end - start) > MEMORY_SIZE {
            return Err(AssembleError::OutOfMemory);
        }
        self.memory.copy_within(start..end, dest);
        self.flags.copy_within(start..end, dest);
        self.source_map.copy_within(start..end, dest);
        Ok(())
    }

    pub fn map_char(&mut self, ascii: u8, mapped: u8) {
        if (32..128).contains(&ascii) {
            self.mapchar[(ascii - 32) as usize] = mapped;
        }
    }

    pub fn mapped_char(&self, ascii: u8) -> u8 {
        if (32..128).contains(&ascii) {
            self.mapchar[(ascii - 32) as usize]
        } else {
            ascii
        }
    }

    pub fn byte(&self, addr: usize) -> u8 {
        self.memory[addr]
    }

    pub fn flags(&self, addr: usize) -> u8 {
        self.flags[addr]
    }

    pub fn slice(&self, start: usize, end: usize) -> &[u8] {
        &self.memory[start.min(MEMORY_SIZE)..end.min(MEMORY_SIZE)]
    }

    pub fn source_map(&self, addr: usize) -> Option<SourceMapEntry> {
        self.source_map.get(addr).copied().flatten()
    }

    pub fn push_call_site(&mut self, entry: SourceMapEntry) -> usize {
        self.call_sites.push(entry);
        self.call_sites.len() - 1
    }

    pub fn call_site(&self, id: usize) -> Option<&SourceMapEntry> {
        self.call_sites.get(id)
    }

    pub fn used_bytes(&self) -> usize {
        self.flags
            .iter()
            .filter(|flags| *flags & MemFlags::USED != 0)
            .count()
    }
}

impl Default for ObjectCode {
    fn default() -> Self {
        Self::new()
    }
}

fn identity_mapchar() -> [u8; 96] {
    let mut table = [0; 96];
    for (i, c) in table.iter_mut().enumerate() {
        *c = (i + 32) as u8;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: SourceMapEntry = SourceMapEntry {
        file: 0,
        line: 0,
        column: 0,
        parent: None,
    };

    #[test]
    fn writes_set_used_and_check_on_first_pass() {
        let mut code = ObjectCode::new();
        code.set_pc(0x2000);
        code.assemble3(0x4C, 0x1234, true, SRC).unwrap();
        assert_eq!(0x2003, code.pc());
        assert_eq!(&[0x4C, 0x34, 0x12], code.slice(0x2000, 0x2003));
        assert_eq!(MemFlags::USED | MemFlags::CHECK, code.flags(0x2000));

        code.begin_pass(false, 0);
        assert_eq!(MemFlags::CHECK, code.flags(0x2000));
        code.set_pc(0x2000);
        code.assemble3(0x4C, 0x1234, true, SRC).unwrap();
        assert_eq!(MemFlags::USED | MemFlags::CHECK, code.flags(0x2000));
    }

    #[test]
    fn guard_then_overlap() {
        let mut code = ObjectCode::new();
        code.set_guard(0x3000);
        code.set_pc(0x2FFF);
        assert_eq!(
            Err(AssembleError::GuardHit),
            code.assemble2(0xA9, 0, true, SRC)
        );
        code.set_pc(0x2000);
        code.assemble1(0xEA, SRC).unwrap();
        code.set_pc(0x2000);
        assert_eq!(Err(AssembleError::Overlap), code.assemble1(0xEA, SRC));
    }

    #[test]
    fn out_of_memory() {
        let mut code = ObjectCode::new();
        code.set_pc(0xFFFF);
        assert_eq!(
            Err(AssembleError::OutOfMemory),
            code.assemble3(0x20, 0, true, SRC)
        );
        code.assemble1(0x60, SRC).unwrap();
        assert_eq!(0x10000, code.pc());
        assert_eq!(Err(AssembleError::OutOfMemory), code.inc_pc(1));
    }

    #[test]
    fn inconsistency_is_reported_once() {
        let mut code = ObjectCode::new();
        code.set_pc(0x100);
        code.put_byte(1, true, SRC).unwrap();
        code.put_byte(2, true, SRC).unwrap();
        code.put_byte(3, false, SRC).unwrap();

        code.begin_pass(false, 0);
        code.set_pc(0x100);
        assert_eq!(
            Err(AssembleError::InconsistentCode),
            code.put_byte(9, true, SRC)
        );
        assert_eq!(Ok(()), code.put_byte(9, true, SRC));
        // unknown on the first pass so never compared
        assert_eq!(Ok(()), code.put_byte(7, true, SRC));
        assert_eq!(&[9, 9, 7], code.slice(0x100, 0x103));
    }

    #[test]
    fn hard_clear_exempts_from_check() {
        let mut code = ObjectCode::new();
        code.put_byte(1, true, SRC).unwrap();
        code.clear(0, 1, true);
        assert_eq!(MemFlags::DONT_CHECK, code.flags(0));
        assert_eq!(0, code.byte(0));
        code.set_pc(0);
        code.put_byte(5, true, SRC).unwrap();
        code.begin_pass(false, 0);
        assert_eq!(Ok(()), code.put_byte(6, true, SRC));
    }

    #[test]
    fn mapchar() {
        let mut code = ObjectCode::new();
        assert_eq!(b'A', code.mapped_char(b'A'));
        code.map_char(b'A', 0x80);
        assert_eq!(0x80, code.mapped_char(b'A'));
        code.map_char(10, 0);
        assert_eq!(10, code.mapped_char(10));
        code.begin_pass(false, 0);
        assert_eq!(b'A', code.mapped_char(b'A'));
    }
}
