//! Decoding of raw opcodes into [`Instruction`]s.
//!
//! Opcodes are big-endian words. `F000 NNNN` is the only instruction that
//! spans four bytes; everything else is two.
use crate::error::MachineError;
use crate::memory::MemoryMap;
use std::fmt;

/// the one encoding followed by a 16-bit immediate
pub const LONG_LOAD_OPCODE: u16 = 0xF000;

/// Every operation the interpreter knows, plus a sentinel for everything it
/// doesn't.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// 00CN
    ScrollDown,
    /// 00DN
    ScrollUp,
    /// 00E0
    Cls,
    /// 00EE
    Ret,
    /// 00FB
    ScrollRight,
    /// 00FC
    ScrollLeft,
    /// 00FD
    Exit,
    /// 00FE
    LoRes,
    /// 00FF
    HiRes,
    /// 1NNN
    Jump,
    /// 2NNN
    Call,
    /// 3XNN
    SkipEqImm,
    /// 4XNN
    SkipNeImm,
    /// 5XY0
    SkipEqReg,
    /// 5XY2
    StoreRange,
    /// 5XY3
    LoadRange,
    /// 6XNN
    LoadImm,
    /// 7XNN
    AddImm,
    /// 8XY0
    Assign,
    /// 8XY1
    Or,
    /// 8XY2
    And,
    /// 8XY3
    Xor,
    /// 8XY4
    Add,
    /// 8XY5
    Sub,
    /// 8XY6
    ShiftRight,
    /// 8XY7
    SubReverse,
    /// 8XYE
    ShiftLeft,
    /// 9XY0
    SkipNeReg,
    /// ANNN
    LoadIndex,
    /// BNNN
    JumpOffset,
    /// CXNN
    Random,
    /// DXYN
    Draw,
    /// EX9E
    SkipKey,
    /// EXA1
    SkipNotKey,
    /// F000 NNNN
    LoadIndexLong,
    /// FX01
    SelectPlanes,
    /// FX07
    GetDelay,
    /// FX0A
    WaitKey,
    /// FX15
    SetDelay,
    /// FX18
    SetSound,
    /// FX1E
    AddIndex,
    /// FX29
    FontChar,
    /// FX30
    BigFontChar,
    /// FX33
    Bcd,
    /// FX55
    StoreRegs,
    /// FX65
    LoadRegs,
    /// FX75
    SaveFlags,
    /// FX85
    RestoreFlags,
    Unknown,
}

impl Opcode {
    /// false for instructions that never continue at the next address, so
    /// they can sit in the last word of memory
    pub fn falls_through(self) -> bool {
        !matches!(
            self,
            Opcode::Jump
                | Opcode::Call
                | Opcode::Ret
                | Opcode::JumpOffset
                | Opcode::Exit
                | Opcode::Unknown
        )
    }

    /// classify a raw 16-bit opcode
    pub fn classify(op: u16) -> Opcode {
        let group = op >> 12;
        let n = op & 0xF;
        let nn = op & 0xFF;
        match (group, nn) {
            (0x0, _) => match op {
                0x00E0 => Opcode::Cls,
                0x00EE => Opcode::Ret,
                0x00FB => Opcode::ScrollRight,
                0x00FC => Opcode::ScrollLeft,
                0x00FD => Opcode::Exit,
                0x00FE => Opcode::LoRes,
                0x00FF => Opcode::HiRes,
                _ if op & 0xFFF0 == 0x00C0 => Opcode::ScrollDown,
                _ if op & 0xFFF0 == 0x00D0 => Opcode::ScrollUp,
                _ => Opcode::Unknown,
            },
            (0x1, _) => Opcode::Jump,
            (0x2, _) => Opcode::Call,
            (0x3, _) => Opcode::SkipEqImm,
            (0x4, _) => Opcode::SkipNeImm,
            (0x5, _) => match n {
                0x0 => Opcode::SkipEqReg,
                0x2 => Opcode::StoreRange,
                0x3 => Opcode::LoadRange,
                _ => Opcode::Unknown,
            },
            (0x6, _) => Opcode::LoadImm,
            (0x7, _) => Opcode::AddImm,
            (0x8, _) => match n {
                0x0 => Opcode::Assign,
                0x1 => Opcode::Or,
                0x2 => Opcode::And,
                0x3 => Opcode::Xor,
                0x4 => Opcode::Add,
                0x5 => Opcode::Sub,
                0x6 => Opcode::ShiftRight,
                0x7 => Opcode::SubReverse,
                0xE => Opcode::ShiftLeft,
                _ => Opcode::Unknown,
            },
            (0x9, _) if n == 0 => Opcode::SkipNeReg,
            (0xA, _) => Opcode::LoadIndex,
            (0xB, _) => Opcode::JumpOffset,
            (0xC, _) => Opcode::Random,
            (0xD, _) => Opcode::Draw,
            (0xE, 0x9E) => Opcode::SkipKey,
            (0xE, 0xA1) => Opcode::SkipNotKey,
            (0xF, _) if op == LONG_LOAD_OPCODE => Opcode::LoadIndexLong,
            (0xF, 0x01) => Opcode::SelectPlanes,
            (0xF, 0x07) => Opcode::GetDelay,
            (0xF, 0x0A) => Opcode::WaitKey,
            (0xF, 0x15) => Opcode::SetDelay,
            (0xF, 0x18) => Opcode::SetSound,
            (0xF, 0x1E) => Opcode::AddIndex,
            (0xF, 0x29) => Opcode::FontChar,
            (0xF, 0x30) => Opcode::BigFontChar,
            (0xF, 0x33) => Opcode::Bcd,
            (0xF, 0x55) => Opcode::StoreRegs,
            (0xF, 0x65) => Opcode::LoadRegs,
            (0xF, 0x75) => Opcode::SaveFlags,
            (0xF, 0x85) => Opcode::RestoreFlags,
            _ => Opcode::Unknown,
        }
    }
}

/// A decoded instruction, with every field pre-sliced whether the opcode
/// uses it or not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u16,
    /// length in bytes; 2, or 4 for `F000 NNNN`
    pub len: u16,
    pub group: u8,
    pub x: u8,
    pub y: u8,
    pub n: u8,
    pub nn: u8,
    pub nnn: u16,
    /// the trailing immediate of the 4-byte form, zero otherwise
    pub nnnn: u16,
    pub op: Opcode,
}

impl Instruction {
    /// slice the fields out of a raw opcode; `nnnn` is filled in by [`decode`]
    pub fn from_opcode(opcode: u16) -> Self {
        Instruction {
            opcode,
            len: 2,
            group: (opcode >> 12) as u8,
            x: ((opcode >> 8) & 0xF) as u8,
            y: ((opcode >> 4) & 0xF) as u8,
            n: (opcode & 0xF) as u8,
            nn: (opcode & 0xFF) as u8,
            nnn: opcode & 0xFFF,
            nnnn: 0,
            op: Opcode::classify(opcode),
        }
    }
}

/// Read the instruction at `addr`. Side-effect free, so collaborators may
/// call it for look-ahead as often as they like.
pub fn decode(memory: &impl MemoryMap, addr: u16) -> Result<Instruction, MachineError> {
    let mut inst = Instruction::from_opcode(memory.get_word(addr)?);
    if inst.op == Opcode::LoadIndexLong {
        let imm_addr = addr.checked_add(2).ok_or(MachineError::MemoryOutOfBounds {
            addr: addr as usize + 2,
            len: 2,
        })?;
        inst.nnnn = memory.get_word(imm_addr)?;
        inst.len = 4;
    }
    Ok(inst)
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y, n, nn, nnn) = (self.x, self.y, self.n, self.nn, self.nnn);
        match self.op {
            Opcode::ScrollDown => write!(f, "SCD {}", n),
            Opcode::ScrollUp => write!(f, "SCU {}", n),
            Opcode::Cls => write!(f, "CLS"),
            Opcode::Ret => write!(f, "RET"),
            Opcode::ScrollRight => write!(f, "SCR"),
            Opcode::ScrollLeft => write!(f, "SCL"),
            Opcode::Exit => write!(f, "EXIT"),
            Opcode::LoRes => write!(f, "LOW"),
            Opcode::HiRes => write!(f, "HIGH"),
            Opcode::Jump => write!(f, "JP 0x{:03X}", nnn),
            Opcode::Call => write!(f, "CALL 0x{:03X}", nnn),
            Opcode::SkipEqImm => write!(f, "SE V{:X}, 0x{:02X}", x, nn),
            Opcode::SkipNeImm => write!(f, "SNE V{:X}, 0x{:02X}", x, nn),
            Opcode::SkipEqReg => write!(f, "SE V{:X}, V{:X}", x, y),
            Opcode::StoreRange => write!(f, "SAVE V{:X}-V{:X}", x, y),
            Opcode::LoadRange => write!(f, "LOAD V{:X}-V{:X}", x, y),
            Opcode::LoadImm => write!(f, "LD V{:X}, 0x{:02X}", x, nn),
            Opcode::AddImm => write!(f, "ADD V{:X}, 0x{:02X}", x, nn),
            Opcode::Assign => write!(f, "LD V{:X}, V{:X}", x, y),
            Opcode::Or => write!(f, "OR V{:X}, V{:X}", x, y),
            Opcode::And => write!(f, "AND V{:X}, V{:X}", x, y),
            Opcode::Xor => write!(f, "XOR V{:X}, V{:X}", x, y),
            Opcode::Add => write!(f, "ADD V{:X}, V{:X}", x, y),
            Opcode::Sub => write!(f, "SUB V{:X}, V{:X}", x, y),
            Opcode::ShiftRight => write!(f, "SHR V{:X}", x),
            Opcode::SubReverse => write!(f, "SUBN V{:X}, V{:X}", x, y),
            Opcode::ShiftLeft => write!(f, "SHL V{:X}", x),
            Opcode::SkipNeReg => write!(f, "SNE V{:X}, V{:X}", x, y),
            Opcode::LoadIndex => write!(f, "LD I, 0x{:03X}", nnn),
            Opcode::JumpOffset => write!(f, "JP V0, 0x{:03X}", nnn),
            Opcode::Random => write!(f, "RND V{:X}, 0x{:02X}", x, nn),
            Opcode::Draw => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            Opcode::SkipKey => write!(f, "SKP V{:X}", x),
            Opcode::SkipNotKey => write!(f, "SKNP V{:X}", x),
            Opcode::LoadIndexLong => write!(f, "LD I, 0x{:04X}", self.nnnn),
            Opcode::SelectPlanes => write!(f, "PLANE V{:X}", x),
            Opcode::GetDelay => write!(f, "LD V{:X}, DT", x),
            Opcode::WaitKey => write!(f, "LD V{:X}, K", x),
            Opcode::SetDelay => write!(f, "LD DT, V{:X}", x),
            Opcode::SetSound => write!(f, "LD ST, V{:X}", x),
            Opcode::AddIndex => write!(f, "ADD I, V{:X}", x),
            Opcode::FontChar => write!(f, "LD F, V{:X}", x),
            Opcode::BigFontChar => write!(f, "LD HF, V{:X}", x),
            Opcode::Bcd => write!(f, "LD B, V{:X}", x),
            Opcode::StoreRegs => write!(f, "LD [I], V{:X}", x),
            Opcode::LoadRegs => write!(f, "LD V{:X}, [I]", x),
            Opcode::SaveFlags => write!(f, "LD R, V{:X}", x),
            Opcode::RestoreFlags => write!(f, "LD V{:X}, R", x),
            Opcode::Unknown => write!(f, "DW 0x{:04X}", self.opcode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Chip8MemoryMap;

    fn memory_with(addr: u16, bytes: &[u8]) -> Chip8MemoryMap {
        let mut m = Chip8MemoryMap::new();
        m.write(bytes, addr).unwrap();
        m
    }

    #[test]
    fn test_field_slicing() {
        let i = Instruction::from_opcode(0xD12A);
        assert_eq!(i.group, 0xD);
        assert_eq!(i.x, 0x1);
        assert_eq!(i.y, 0x2);
        assert_eq!(i.n, 0xA);
        assert_eq!(i.nn, 0x2A);
        assert_eq!(i.nnn, 0x12A);
        assert_eq!(i.len, 2);
        assert_eq!(i.op, Opcode::Draw);
    }

    #[test]
    fn test_falls_through() {
        for op in [0x1200, 0x2200, 0x00EE, 0xB200, 0x00FD, 0xE0F0] {
            assert!(!Opcode::classify(op).falls_through(), "{:04x}", op);
        }
        for op in [0x00E0, 0x3000, 0xE09E, 0xF000, 0xF00A, 0xD015] {
            assert!(Opcode::classify(op).falls_through(), "{:04x}", op);
        }
    }

    #[test]
    fn test_classify_system_group() {
        assert_eq!(Opcode::classify(0x00E0), Opcode::Cls);
        assert_eq!(Opcode::classify(0x00EE), Opcode::Ret);
        assert_eq!(Opcode::classify(0x00C4), Opcode::ScrollDown);
        assert_eq!(Opcode::classify(0x00D2), Opcode::ScrollUp);
        assert_eq!(Opcode::classify(0x00FB), Opcode::ScrollRight);
        assert_eq!(Opcode::classify(0x00FC), Opcode::ScrollLeft);
        assert_eq!(Opcode::classify(0x00FD), Opcode::Exit);
        assert_eq!(Opcode::classify(0x00FE), Opcode::LoRes);
        assert_eq!(Opcode::classify(0x00FF), Opcode::HiRes);
        // machine code routines are not supported
        assert_eq!(Opcode::classify(0x0123), Opcode::Unknown);
        assert_eq!(Opcode::classify(0x0000), Opcode::Unknown);
    }

    #[test]
    fn test_classify_register_groups() {
        assert_eq!(Opcode::classify(0x5120), Opcode::SkipEqReg);
        assert_eq!(Opcode::classify(0x5122), Opcode::StoreRange);
        assert_eq!(Opcode::classify(0x5123), Opcode::LoadRange);
        assert_eq!(Opcode::classify(0x5121), Opcode::Unknown);
        assert_eq!(Opcode::classify(0x8124), Opcode::Add);
        assert_eq!(Opcode::classify(0x812E), Opcode::ShiftLeft);
        assert_eq!(Opcode::classify(0x8128), Opcode::Unknown);
        assert_eq!(Opcode::classify(0x9120), Opcode::SkipNeReg);
        assert_eq!(Opcode::classify(0x9121), Opcode::Unknown);
    }

    #[test]
    fn test_classify_key_and_misc_groups() {
        assert_eq!(Opcode::classify(0xE39E), Opcode::SkipKey);
        assert_eq!(Opcode::classify(0xE3A1), Opcode::SkipNotKey);
        assert_eq!(Opcode::classify(0xE3A2), Opcode::Unknown);
        assert_eq!(Opcode::classify(0xF000), Opcode::LoadIndexLong);
        assert_eq!(Opcode::classify(0xF100), Opcode::Unknown);
        assert_eq!(Opcode::classify(0xF201), Opcode::SelectPlanes);
        assert_eq!(Opcode::classify(0xF30A), Opcode::WaitKey);
        assert_eq!(Opcode::classify(0xF330), Opcode::BigFontChar);
        assert_eq!(Opcode::classify(0xF375), Opcode::SaveFlags);
        assert_eq!(Opcode::classify(0xF385), Opcode::RestoreFlags);
        // audio pattern / pitch are out of scope
        assert_eq!(Opcode::classify(0xF002), Opcode::Unknown);
        assert_eq!(Opcode::classify(0xF33A), Opcode::Unknown);
    }

    #[test]
    fn test_decode_short() -> Result<(), MachineError> {
        let m = memory_with(0x200, &[0x60, 0x05]);
        let i = decode(&m, 0x200)?;
        assert_eq!(i.opcode, 0x6005);
        assert_eq!(i.len, 2);
        assert_eq!(i.nnnn, 0);
        assert_eq!(i.op, Opcode::LoadImm);
        Ok(())
    }

    #[test]
    fn test_decode_long_load() -> Result<(), MachineError> {
        let m = memory_with(0x200, &[0xF0, 0x00, 0xBE, 0xEF]);
        let i = decode(&m, 0x200)?;
        assert_eq!(i.op, Opcode::LoadIndexLong);
        assert_eq!(i.len, 4);
        assert_eq!(i.nnnn, 0xBEEF);
        // decoding is repeatable
        assert_eq!(decode(&m, 0x200)?, i);
        Ok(())
    }

    #[test]
    fn test_decode_past_end_of_memory() {
        let m = memory_with(0xfffe, &[0xF0, 0x00]);
        assert!(matches!(
            decode(&m, 0xfffe),
            Err(MachineError::MemoryOutOfBounds { .. })
        ));
        assert!(decode(&m, 0xffff).is_err());
    }

    #[test]
    fn test_disassembly() {
        assert_eq!(Instruction::from_opcode(0x632A).to_string(), "LD V3, 0x2A");
        assert_eq!(Instruction::from_opcode(0xD015).to_string(), "DRW V0, V1, 5");
        assert_eq!(Instruction::from_opcode(0x2ABC).to_string(), "CALL 0xABC");
        assert_eq!(Instruction::from_opcode(0xFFFF).to_string(), "DW 0xFFFF");
    }
}
