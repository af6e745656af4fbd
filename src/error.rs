use std::io;
use thiserror::Error;

/// Everything that can stop the machine. Engine errors are fatal: the
/// interpreter halts before handing one back.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("unknown opcode 0x{opcode:04x} at 0x{addr:04x}")]
    UnknownOpcode { opcode: u16, addr: u16 },

    #[error("stack overflow calling from 0x{addr:04x}")]
    StackOverflow { addr: u16 },

    #[error("stack underflow returning from 0x{addr:04x}")]
    StackUnderflow { addr: u16 },

    #[error("memory access out of bounds: {len} byte(s) at 0x{addr:04x}")]
    MemoryOutOfBounds { addr: usize, len: usize },

    #[error("program of {len} bytes does not fit in {capacity} bytes of program memory")]
    RomTooLarge { len: usize, capacity: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}
