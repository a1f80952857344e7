#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Addr(u8);

#[rustfmt::skip]
impl Addr {
    pub const IMP: Self = Self(0);  //
    pub const ACC: Self = Self(1);  // A
    pub const IMM: Self = Self(2);  // #&00
    pub const ZP: Self = Self(3);   // &00
    pub const ZPX: Self = Self(4);  // &00,X
    pub const ZPY: Self = Self(5);  // &00,Y
    pub const ABS: Self = Self(6);  // &0000
    pub const ABX: Self = Self(7);  // &0000,X
    pub const ABY: Self = Self(8);  // &0000,Y
    pub const IND: Self = Self(9);  // (&0000)
    pub const INX: Self = Self(10); // (&00,X)
    pub const INY: Self = Self(11); // (&00),Y
    pub const IZP: Self = Self(12); // (&00)
    pub const IAX: Self = Self(13); // (&0000,X)
    pub const REL: Self = Self(14); // ±&00
}

const ____: u8 = 0x42; // $42 is unassigned on both the 6502 and 65C02 so it marks a blank

#[rustfmt::skip]
const MNEMONICS: &[(Mne, &[u8; 15])] = &[
    //           imp   acc   imm   zp    zpx   zpy   abs   abx   aby   ind   inx   iny   izp   iax   rel
    (Mne::ADC, &[____, ____, 0x69, 0x65, 0x75, ____, 0x6D, 0x7D, 0x79, ____, 0x61, 0x71, 0x72, ____, ____]),
    (Mne::AND, &[____, ____, 0x29, 0x25, 0x35, ____, 0x2D, 0x3D, 0x39, ____, 0x21, 0x31, 0x32, ____, ____]),
    (Mne::ASL, &[____, 0x0A, ____, 0x06, 0x16, ____, 0x0E, 0x1E, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::BCC, &[____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, 0x90]),
    (Mne::BCS, &[____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, 0xB0]),
    (Mne::BEQ, &[____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, 0xF0]),
    (Mne::BIT, &[____, ____, 0x89, 0x24, 0x34, ____, 0x2C, 0x3C, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::BMI, &[____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, 0x30]),
    (Mne::BNE, &[____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, 0xD0]),
    (Mne::BPL, &[____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, 0x10]),
    (Mne::BRA, &[____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, 0x80]),
    (Mne::BRK, &[0x00, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::BVC, &[____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, 0x50]),
    (Mne::BVS, &[____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, 0x70]),
    (Mne::CLC, &[0x18, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::CLD, &[0xD8, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::CLI, &[0x58, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::CLV, &[0xB8, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::CMP, &[____, ____, 0xC9, 0xC5, 0xD5, ____, 0xCD, 0xDD, 0xD9, ____, 0xC1, 0xD1, 0xD2, ____, ____]),
    (Mne::CPX, &[____, ____, 0xE0, 0xE4, ____, ____, 0xEC, ____, ____, ____, ____, ____, ____, ____, ____]),
    //           imp   acc   imm   zp    zpx   zpy   abs   abx   aby   ind   inx   iny   izp   iax   rel
    (Mne::CPY, &[____, ____, 0xC0, 0xC4, ____, ____, 0xCC, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::DEC, &[____, 0x3A, ____, 0xC6, 0xD6, ____, 0xCE, 0xDE, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::DEX, &[0xCA, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::DEY, &[0x88, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::EOR, &[____, ____, 0x49, 0x45, 0x55, ____, 0x4D, 0x5D, 0x59, ____, 0x41, 0x51, 0x52, ____, ____]),
    (Mne::INC, &[____, 0x1A, ____, 0xE6, 0xF6, ____, 0xEE, 0xFE, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::INX, &[0xE8, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::INY, &[0xC8, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::JMP, &[____, ____, ____, ____, ____, ____, 0x4C, ____, ____, 0x6C, ____, ____, ____, 0x7C, ____]),
    (Mne::JSR, &[____, ____, ____, ____, ____, ____, 0x20, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::LDA, &[____, ____, 0xA9, 0xA5, 0xB5, ____, 0xAD, 0xBD, 0xB9, ____, 0xA1, 0xB1, 0xB2, ____, ____]),
    (Mne::LDX, &[____, ____, 0xA2, 0xA6, ____, 0xB6, 0xAE, ____, 0xBE, ____, ____, ____, ____, ____, ____]),
    (Mne::LDY, &[____, ____, 0xA0, 0xA4, 0xB4, ____, 0xAC, 0xBC, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::LSR, &[____, 0x4A, ____, 0x46, 0x56, ____, 0x4E, 0x5E, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::NOP, &[0xEA, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::ORA, &[____, ____, 0x09, 0x05, 0x15, ____, 0x0D, 0x1D, 0x19, ____, 0x01, 0x11, 0x12, ____, ____]),
    (Mne::PHA, &[0x48, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::PHP, &[0x08, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::PHX, &[0xDA, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::PHY, &[0x5A, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    //           imp   acc   imm   zp    zpx   zpy   abs   abx   aby   ind   inx   iny   izp   iax   rel
    (Mne::PLA, &[0x68, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::PLP, &[0x28, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::PLX, &[0xFA, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::PLY, &[0x7A, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::ROL, &[____, 0x2A, ____, 0x26, 0x36, ____, 0x2E, 0x3E, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::ROR, &[____, 0x6A, ____, 0x66, 0x76, ____, 0x6E, 0x7E, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::RTI, &[0x40, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::RTS, &[0x60, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::SBC, &[____, ____, 0xE9, 0xE5, 0xF5, ____, 0xED, 0xFD, 0xF9, ____, 0xE1, 0xF1, 0xF2, ____, ____]),
    (Mne::SEC, &[0x38, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::SED, &[0xF8, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::SEI, &[0x78, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::STA, &[____, ____, ____, 0x85, 0x95, ____, 0x8D, 0x9D, 0x99, ____, 0x81, 0x91, 0x92, ____, ____]),
    (Mne::STX, &[____, ____, ____, 0x86, ____, 0x96, 0x8E, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::STY, &[____, ____, ____, 0x84, 0x94, ____, 0x8C, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::STZ, &[____, ____, ____, 0x64, 0x74, ____, 0x9C, 0x9E, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::TAX, &[0xAA, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::TAY, &[0xA8, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::TRB, &[____, ____, ____, 0x14, ____, ____, 0x1C, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::TSB, &[____, ____, ____, 0x04, ____, ____, 0x0C, ____, ____, ____, ____, ____, ____, ____, ____]),
    //           imp   acc   imm   zp    zpx   zpy   abs   abx   aby   ind   inx   iny   izp   iax   rel
    (Mne::TSX, &[0xBA, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::TXA, &[0x8A, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::TXS, &[0x9A, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
    (Mne::TYA, &[0x98, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____, ____]),
];

/// Opcodes that only exist on the 65C02.
#[rustfmt::skip]
const CMOS_OPCODES: &[u8] = &[
    0x04, 0x0C, 0x12, 0x14, 0x1A, 0x1C, 0x32, 0x34, 0x3A, 0x3C, 0x52, 0x5A, 0x64, 0x72,
    0x74, 0x7A, 0x7C, 0x80, 0x89, 0x92, 0x9C, 0x9E, 0xB2, 0xD2, 0xDA, 0xF2, 0xFA,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mne(&'static str);

impl Mne {
    pub const ADC: Self = Self("ADC");
    pub const AND: Self = Self("AND");
    pub const ASL: Self = Self("ASL");
    pub const BCC: Self = Self("BCC");
    pub const BCS: Self = Self("BCS");
    pub const BEQ: Self = Self("BEQ");
    pub const BIT: Self = Self("BIT");
    pub const BMI: Self = Self("BMI");
    pub const BNE: Self = Self("BNE");
    pub const BPL: Self = Self("BPL");
    pub const BRA: Self = Self("BRA");
    pub const BRK: Self = Self("BRK");
    pub const BVC: Self = Self("BVC");
    pub const BVS: Self = Self("BVS");
    pub const CLC: Self = Self("CLC");
    pub const CLD: Self = Self("CLD");
    pub const CLI: Self = Self("CLI");
    pub const CLV: Self = Self("CLV");
    pub const CMP: Self = Self("CMP");
    pub const CPX: Self = Self("CPX");
    pub const CPY: Self = Self("CPY");
    pub const DEC: Self = Self("DEC");
    pub const DEX: Self = Self("DEX");
    pub const DEY: Self = Self("DEY");
    pub const EOR: Self = Self("EOR");
    pub const INC: Self = Self("INC");
    pub const INX: Self = Self("INX");
    pub const INY: Self = Self("INY");
    pub const JMP: Self = Self("JMP");
    pub const JSR: Self = Self("JSR");
    pub const LDA: Self = Self("LDA");
    pub const LDX: Self = Self("LDX");
    pub const LDY: Self = Self("LDY");
    pub const LSR: Self = Self("LSR");
    pub const NOP: Self = Self("NOP");
    pub const ORA: Self = Self("ORA");
    pub const PHA: Self = Self("PHA");
    pub const PHP: Self = Self("PHP");
    pub const PHX: Self = Self("PHX");
    pub const PHY: Self = Self("PHY");
    pub const PLA: Self = Self("PLA");
    pub const PLP: Self = Self("PLP");
    pub const PLX: Self = Self("PLX");
    pub const PLY: Self = Self("PLY");
    pub const ROL: Self = Self("ROL");
    pub const ROR: Self = Self("ROR");
    pub const RTI: Self = Self("RTI");
    pub const RTS: Self = Self("RTS");
    pub const SBC: Self = Self("SBC");
    pub const SEC: Self = Self("SEC");
    pub const SED: Self = Self("SED");
    pub const SEI: Self = Self("SEI");
    pub const STA: Self = Self("STA");
    pub const STX: Self = Self("STX");
    pub const STY: Self = Self("STY");
    pub const STZ: Self = Self("STZ");
    pub const TAX: Self = Self("TAX");
    pub const TAY: Self = Self("TAY");
    pub const TRB: Self = Self("TRB");
    pub const TSB: Self = Self("TSB");
    pub const TSX: Self = Self("TSX");
    pub const TXA: Self = Self("TXA");
    pub const TXS: Self = Self("TXS");
    pub const TYA: Self = Self("TYA");

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

/// A mnemonic as seen by one CPU.
#[derive(Clone, Copy, Debug)]
pub struct Mnemonic {
    pub mne: Mne,
    opcodes: &'static [u8; 15],
    cpu: u8,
}

impl Mnemonic {
    pub fn opcode(&self, addr: Addr) -> Option<u8> {
        let op = self.opcodes[addr.0 as usize];
        if op == ____ || (self.cpu == 0 && CMOS_OPCODES.contains(&op)) {
            return None;
        }
        Some(op)
    }

    pub fn has(&self, addr: Addr) -> bool {
        self.opcode(addr).is_some()
    }

    pub fn has_indirect(&self) -> bool {
        [Addr::IND, Addr::INX, Addr::INY, Addr::IZP, Addr::IAX]
            .into_iter()
            .any(|addr| self.has(addr))
    }

    fn exists(&self) -> bool {
        (0..self.opcodes.len() as u8).any(|addr| self.has(Addr(addr)))
    }
}

/// Matches a three letter mnemonic at the start of `text`, ignoring case.
pub fn find_mnemonic(text: &str, cpu: u8) -> Option<Mnemonic> {
    let bytes = text.as_bytes();
    if bytes.len() < 3 || bytes.get(3).is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_') {
        return None;
    }
    MNEMONICS
        .iter()
        .find(|(mne, _)| mne.0.as_bytes().eq_ignore_ascii_case(&bytes[..3]))
        .map(|(mne, opcodes)| Mnemonic {
            mne: *mne,
            opcodes,
            cpu,
        })
        .filter(Mnemonic::exists)
}
