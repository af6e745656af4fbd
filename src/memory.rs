use crate::error::MachineError;
use std::io;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents the flat address space. All access is bounds-checked; a slice
/// that would run off the end of memory is an error, never a panic.
pub trait MemoryMap {
    /// write unknown len of data into memory at a particular address
    fn write_any(&mut self, reader: &mut impl io::Read, addr: u16) -> Result<usize, MachineError> {
        let mut buf = Vec::new();
        let len = reader.read_to_end(&mut buf)?;
        self.write(buf.as_slice(), addr)?;
        Ok(len)
    }

    /// write a chunk of bytes into "RAM"
    fn write(&mut self, data: &[u8], addr: u16) -> Result<(), MachineError> {
        self.get_rw_slice(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// get a big-endian two-byte word (opcodes, immediates)
    fn get_word(&self, addr: u16) -> Result<u16, MachineError> {
        let word = self.get_ro_slice(addr, 2)?;
        Ok(u16::from_be_bytes([word[0], word[1]]))
    }

    fn get_byte(&self, addr: u16) -> Result<u8, MachineError> {
        Ok(self.get_ro_slice(addr, 1)?[0])
    }

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], MachineError>;

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], MachineError>;
}

/// Defines the extended CHIP-8 memory map; 64K, all of it addressable by I:
///   0x0000-0x004f  base font, 16 glyphs of 5 bytes
///   0x0050-0x00ef  big font, 16 glyphs of 10 bytes
///   0x0200-0xffff  program
///
/// the stack lives outside of addressable memory
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
    pub program_addr: u16,
    pub font_addr: u16,
    pub big_font_addr: u16,
}

impl MemoryMap for Chip8MemoryMap {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], MachineError> {
        let a = addr as usize;
        self.bytes
            .get_mut(a..a + len)
            .ok_or(MachineError::MemoryOutOfBounds { addr: a, len })
    }
    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], MachineError> {
        let a = addr as usize;
        self.bytes
            .get(a..a + len)
            .ok_or(MachineError::MemoryOutOfBounds { addr: a, len })
    }
}

/// how much RAM we have
pub const RAM_SIZE_BYTES: usize = 0x10000;

/// where the program is loaded
pub const PROGRAM_ADDR: u16 = 0x0200;

/// where the fonts live; the big font immediately follows the base font
pub const FONT_ADDR: u16 = 0x0000;
pub const BIG_FONT_ADDR: u16 = FONT_ADDR + FONT.len() as u16;

/// bytes per glyph
pub const FONT_GLYPH_BYTES: u16 = 5;
pub const BIG_FONT_GLYPH_BYTES: u16 = 10;

impl Chip8MemoryMap {
    /// zeroed memory with both fonts installed
    pub fn new() -> Self {
        let mut bytes = vec![0u8; RAM_SIZE_BYTES].into_boxed_slice();
        let font = FONT_ADDR as usize;
        let big_font = BIG_FONT_ADDR as usize;
        bytes[font..font + FONT.len()].copy_from_slice(&FONT);
        bytes[big_font..big_font + BIG_FONT.len()].copy_from_slice(&BIG_FONT);
        Chip8MemoryMap {
            bytes,
            program_addr: PROGRAM_ADDR,
            font_addr: FONT_ADDR,
            big_font_addr: BIG_FONT_ADDR,
        }
    }

    /// how many bytes a program may occupy
    pub fn program_capacity(&self) -> usize {
        self.bytes.len() - self.program_addr as usize
    }

    /// copy a program image in at 0x200
    pub fn load(&mut self, data: &[u8]) -> Result<(), MachineError> {
        if data.len() > self.program_capacity() {
            return Err(MachineError::RomTooLarge {
                len: data.len(),
                capacity: self.program_capacity(),
            });
        }
        self.write(data, self.program_addr)
    }

    /// load a program from a reader at 0x200
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, MachineError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.load(&buf)?;
        Ok(buf.len())
    }

    /// the whole address space, for look-ahead disassembly and the like
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

pub const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

// 8x10 glyphs for hi-res mode
#[rustfmt::skip]
pub const BIG_FONT: [u8; 160] = [
    0xFF, 0xFF, 0xC3, 0xC3, 0xC3, 0xC3, 0xC3, 0xC3, 0xFF, 0xFF, // 0
    0x18, 0x78, 0x78, 0x18, 0x18, 0x18, 0x18, 0x18, 0xFF, 0xFF, // 1
    0xFF, 0xFF, 0x03, 0x03, 0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, // 2
    0xFF, 0xFF, 0x03, 0x03, 0xFF, 0xFF, 0x03, 0x03, 0xFF, 0xFF, // 3
    0xC3, 0xC3, 0xC3, 0xC3, 0xFF, 0xFF, 0x03, 0x03, 0x03, 0x03, // 4
    0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, 0x03, 0x03, 0xFF, 0xFF, // 5
    0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, 0xC3, 0xC3, 0xFF, 0xFF, // 6
    0xFF, 0xFF, 0x03, 0x03, 0x06, 0x0C, 0x18, 0x18, 0x18, 0x18, // 7
    0xFF, 0xFF, 0xC3, 0xC3, 0xFF, 0xFF, 0xC3, 0xC3, 0xFF, 0xFF, // 8
    0xFF, 0xFF, 0xC3, 0xC3, 0xFF, 0xFF, 0x03, 0x03, 0xFF, 0xFF, // 9
    0x7E, 0xFF, 0xC3, 0xC3, 0xC3, 0xFF, 0xFF, 0xC3, 0xC3, 0xC3, // A
    0xFC, 0xFC, 0xC3, 0xC3, 0xFC, 0xFC, 0xC3, 0xC3, 0xFC, 0xFC, // B
    0x3C, 0xFF, 0xC3, 0xC0, 0xC0, 0xC0, 0xC0, 0xC3, 0xFF, 0x3C, // C
    0xFC, 0xFE, 0xC3, 0xC3, 0xC3, 0xC3, 0xC3, 0xC3, 0xFE, 0xFC, // D
    0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, // E
    0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, 0xC0, 0xC0, 0xC0, 0xC0, // F
];
