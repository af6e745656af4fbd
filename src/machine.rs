/// # machine
///
/// All of the state of one emulated machine. The host owns it, the
/// interpreter (`Machine::step`) is its only mutator, and the host reads it
/// back out to render, beep and run the timers.
use crate::config::Quirks;
use crate::error::MachineError;
use crate::framebuffer::{Frame, FrameBuffer};
use crate::memory::{Chip8MemoryMap, PROGRAM_ADDR};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;

/// how many return addresses fit on the stack. Entries are u32 so a call
/// from the last word of memory can record its (unreachable) return address.
pub const STACK_CAPACITY: usize = 4096;

/// register used for carry, borrow and collision
pub const VF: usize = 0xf;

/// where the interpreter is up to, as seen from outside
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Running,
    /// blocked on FX0A, storing the key into this register
    WaitingForKey(u8),
    Halted,
}

pub struct Machine {
    pub(crate) memory: Chip8MemoryMap,
    pub(crate) framebuffer: FrameBuffer,
    pub(crate) v: [u8; 16],
    pub(crate) flags: [u8; 16],
    pub(crate) index: u16,
    pub(crate) pc: u16,
    pub(crate) stack: Box<[u32]>,
    pub(crate) stack_ptr: usize,
    pub(crate) delay_timer: u8,
    pub(crate) sound_timer: u8,
    pub(crate) plane_mask: u8,
    pub(crate) halted: bool,
    pub(crate) waiting_register: Option<u8>,
    pub(crate) redraw: bool,
    pub(crate) rng: StdRng,
    pub(crate) quirks: Quirks,
}

impl Machine {
    /// zeroed machine with fonts installed and pc at 0x200; the random
    /// source is seeded from `seed` if given, otherwise from the OS
    pub fn new(quirks: Quirks, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Machine {
            memory: Chip8MemoryMap::new(),
            framebuffer: FrameBuffer::new(),
            v: [0; 16],
            flags: [0; 16],
            index: 0,
            pc: PROGRAM_ADDR,
            stack: vec![0u32; STACK_CAPACITY].into_boxed_slice(),
            stack_ptr: 0,
            delay_timer: 0,
            sound_timer: 0,
            plane_mask: 1,
            halted: false,
            waiting_register: None,
            redraw: false,
            rng,
            quirks,
        }
    }

    /// install a program image at 0x200
    pub fn load(&mut self, program: &[u8]) -> Result<(), MachineError> {
        self.memory.load(program)?;
        log::debug!("loaded {} byte program", program.len());
        Ok(())
    }

    /// install a program image read from e.g. a ROM file
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, MachineError> {
        let len = self.memory.load_program(reader)?;
        log::debug!("loaded {} byte program", len);
        Ok(len)
    }

    pub fn status(&self) -> Status {
        if self.halted {
            Status::Halted
        } else if let Some(r) = self.waiting_register {
            Status::WaitingForKey(r)
        } else {
            Status::Running
        }
    }

    /// count both timers down by one, stopping at zero. This is for the
    /// host's 60Hz tick; the interpreter itself never calls it.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    pub fn frame(&self) -> Frame<'_> {
        self.framebuffer.frame()
    }

    pub fn redraw(&self) -> bool {
        self.redraw
    }

    /// the host has presented the frame
    pub fn clear_redraw(&mut self) {
        self.redraw = false;
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn flag_registers(&self) -> &[u8; 16] {
        &self.flags
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn stack_ptr(&self) -> usize {
        self.stack_ptr
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn plane_mask(&self) -> u8 {
        self.plane_mask
    }

    pub fn is_hires(&self) -> bool {
        self.framebuffer.is_hires()
    }

    pub fn memory(&self) -> &Chip8MemoryMap {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryMap;

    #[test]
    fn test_init_state() {
        let m = Machine::new(Quirks::default(), Some(1));
        assert_eq!(m.pc(), 0x200);
        assert_eq!(m.index(), 0);
        assert_eq!(m.stack_ptr(), 0);
        assert_eq!(m.registers(), &[0; 16]);
        assert_eq!(m.flag_registers(), &[0; 16]);
        assert_eq!(m.plane_mask(), 1);
        assert_eq!(m.status(), Status::Running);
        assert!(!m.redraw());
        assert!(!m.is_hires());
        assert_eq!(m.stack.len(), STACK_CAPACITY);
    }

    #[test]
    fn test_load() -> Result<(), MachineError> {
        let mut m = Machine::new(Quirks::default(), Some(1));
        m.load(&[0x60, 0x05, 0x70, 0x03])?;
        assert_eq!(m.memory().get_ro_slice(0x200, 4)?, &[0x60, 0x05, 0x70, 0x03]);
        let mut rom: &[u8] = &[0x00, 0xe0];
        assert_eq!(m.load_program(&mut rom)?, 2);
        assert_eq!(m.memory().get_word(0x200)?, 0x00e0);
        Ok(())
    }

    #[test]
    fn test_tick_timers_stops_at_zero() {
        let mut m = Machine::new(Quirks::default(), Some(1));
        m.delay_timer = 2;
        m.sound_timer = 1;
        m.tick_timers();
        assert_eq!((m.delay_timer(), m.sound_timer()), (1, 0));
        m.tick_timers();
        m.tick_timers();
        assert_eq!((m.delay_timer(), m.sound_timer()), (0, 0));
    }

    #[test]
    fn test_status_reflects_flags() {
        let mut m = Machine::new(Quirks::default(), Some(1));
        m.waiting_register = Some(0x3);
        assert_eq!(m.status(), Status::WaitingForKey(0x3));
        m.halted = true;
        assert_eq!(m.status(), Status::Halted);
    }
}
