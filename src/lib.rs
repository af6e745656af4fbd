//! # chip8x
//!
//! An interpreter for CHIP-8 and its extensions: SUPER-CHIP (hi-res,
//! scrolling, big font, flag registers) and XO-CHIP (two bitplanes, long
//! index load, register range transfers, 64KiB of memory).
//!
//! ## Design
//!
//! * the machine is plain state; `Machine::step` runs exactly one
//!   instruction and is the only thing that changes it
//! * decoding is pure; the same decoder feeds the interpreter, the
//!   skip-length lookahead and the debugger's disassembly
//! * the host owns pacing: instructions per second, the 60Hz timers,
//!   rendering, keys and the buzzer
//! * display, input and sound are traits, so the terminal front-end can be
//!   swapped out (tests use the Dummy/Mute versions)
//! * any fault halts the machine with pc left on the faulting instruction
//! * historical behaviour differences are opt-in quirks, all off by default
//!
//! Model
//!
//! Environment
//!  |-- display, input, sound, config
//!  |-- machine(quirks, seed)
//!  |    |-- memory map (fonts at 0x000, program at 0x200)
//!  |    |-- frame buffer (two planes, lo-res / hi-res)
//!  |    `-- registers, flags, stack, timers
//!  `-- main loop
//!       |-- poll input; quit / debugger / single-step
//!       |-- machine.step(keys) x (ips / timer hz)
//!       |-- machine.tick_timers()
//!       |-- sound follows the sound timer
//!       `-- redraw if asked; sleep until the next tick
pub mod config;
pub mod display;
pub mod environment;
pub mod error;
pub mod framebuffer;
pub mod input;
pub mod instruction;
mod interpreter;
pub mod machine;
pub mod memory;
pub mod sound;

pub use config::{Config, Quirks};
pub use environment::Environment;
pub use error::MachineError;
pub use instruction::{decode, Instruction, Opcode};
pub use machine::{Machine, Status};
