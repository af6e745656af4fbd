/// # interpreter
///
/// The fetch/decode/execute cycle. `step` runs exactly one instruction (or
/// one poll of the keypad while blocked on FX0A) against a `Machine`.
///
/// Ambiguous instructions follow SUPER-CHIP / XO-CHIP conventions:
///  8XY6/8XYE   shift VX in place, carry out of VX; VY is ignored
///  8XY4-8XY7   VF is written before the result, so VF as a destination
///              ends up holding the result
///  BNNN        V0 + NNN (see Quirks for BXNN)
///  FX55/FX65   I is left alone (see Quirks)
///  DXY0        16x16 sprite in both resolutions
///  EX9E/EXA1   always skip two bytes; the other skips step over F000 NNNN
use crate::error::MachineError;
use crate::instruction::{decode, Instruction, Opcode};
use crate::input::Keypad;
use crate::machine::{Machine, Status, STACK_CAPACITY, VF};
use crate::memory::{MemoryMap, BIG_FONT_GLYPH_BYTES, FONT_GLYPH_BYTES};
use rand::Rng;

/// columns moved by 00FB/00FC
const HORIZONTAL_SCROLL: isize = 4;

impl Machine {
    /// Advance by one instruction. Any error halts the machine, with pc left
    /// on the offending instruction and no part of it applied.
    pub fn step(&mut self, keys: &dyn Keypad) -> Result<Status, MachineError> {
        if self.halted {
            return Ok(Status::Halted);
        }

        if let Some(r) = self.waiting_register {
            return Ok(self.poll_wait(r, keys));
        }

        let addr = self.pc;
        match self.fetch_execute(addr, keys) {
            Ok(()) => Ok(self.status()),
            Err(e) => {
                self.pc = addr;
                self.halted = true;
                log::error!("halted: {}", e);
                Err(e)
            }
        }
    }

    /// scan the keypad lowest key first; the first one down goes into the
    /// waiting register and releases the machine
    fn poll_wait(&mut self, r: u8, keys: &dyn Keypad) -> Status {
        match (0..16u8).find(|&k| keys.is_pressed(k)) {
            Some(key) => {
                log::debug!("key 0x{:x} pressed, stored in V{:X}", key, r);
                self.v[r as usize] = key;
                self.waiting_register = None;
                Status::Running
            }
            None => Status::WaitingForKey(r),
        }
    }

    fn fetch_execute(&mut self, addr: u16, keys: &dyn Keypad) -> Result<(), MachineError> {
        let inst = decode(&self.memory, addr)?;
        log::trace!("{:04x}: {:04x} {}", addr, inst.opcode, inst);
        let next = addr as u32 + inst.len as u32;
        match u16::try_from(next) {
            Ok(pc) => self.pc = pc,
            // the last word of memory may hold a jump, just not a fall-through
            Err(_) if !inst.op.falls_through() => {}
            Err(_) => return Err(past_end(next, inst.len)),
        }
        self.execute(&inst, addr, next, keys)
    }

    fn execute(
        &mut self,
        inst: &Instruction,
        addr: u16,
        next: u32,
        keys: &dyn Keypad,
    ) -> Result<(), MachineError> {
        let x = inst.x as usize;
        let y = inst.y as usize;
        let nn = inst.nn;
        let nnn = inst.nnn;

        match inst.op {
            Opcode::Cls => {
                self.framebuffer.clear(self.plane_mask);
                self.redraw = true;
            }
            Opcode::Ret => {
                if self.stack_ptr == 0 {
                    return Err(MachineError::StackUnderflow { addr });
                }
                let ret = self.stack[self.stack_ptr - 1];
                self.pc = u16::try_from(ret).map_err(|_| past_end(ret, 2))?;
                self.stack_ptr -= 1;
                self.stack[self.stack_ptr] = 0;
            }
            Opcode::ScrollDown => self.scroll(0, inst.n as isize),
            Opcode::ScrollUp => self.scroll(0, -(inst.n as isize)),
            Opcode::ScrollRight => self.scroll(HORIZONTAL_SCROLL, 0),
            Opcode::ScrollLeft => self.scroll(-HORIZONTAL_SCROLL, 0),
            Opcode::Exit => {
                log::info!("program exited at 0x{:04x}", addr);
                self.halted = true;
            }
            Opcode::LoRes | Opcode::HiRes => {
                let hires = inst.op == Opcode::HiRes;
                log::debug!("hires {}", hires);
                self.framebuffer.set_hires(hires);
                self.redraw = true;
            }
            Opcode::Jump => self.pc = nnn,
            Opcode::Call => {
                if self.stack_ptr >= STACK_CAPACITY {
                    return Err(MachineError::StackOverflow { addr });
                }
                self.stack[self.stack_ptr] = next;
                self.stack_ptr += 1;
                self.pc = nnn;
            }
            Opcode::SkipEqImm => self.skip_if(self.v[x] == nn)?,
            Opcode::SkipNeImm => self.skip_if(self.v[x] != nn)?,
            Opcode::SkipEqReg => self.skip_if(self.v[x] == self.v[y])?,
            Opcode::SkipNeReg => self.skip_if(self.v[x] != self.v[y])?,
            Opcode::StoreRange => {
                let (lo, hi) = (x.min(y), x.max(y));
                self.memory
                    .get_rw_slice(self.index, hi - lo + 1)?
                    .copy_from_slice(&self.v[lo..=hi]);
            }
            Opcode::LoadRange => {
                let (lo, hi) = (x.min(y), x.max(y));
                let src = self.memory.get_ro_slice(self.index, hi - lo + 1)?;
                self.v[lo..=hi].copy_from_slice(src);
            }
            Opcode::LoadImm => self.v[x] = nn,
            Opcode::AddImm => self.v[x] = self.v[x].wrapping_add(nn),
            Opcode::Assign => self.v[x] = self.v[y],
            Opcode::Or => self.v[x] |= self.v[y],
            Opcode::And => self.v[x] &= self.v[y],
            Opcode::Xor => self.v[x] ^= self.v[y],
            Opcode::Add => {
                let (sum, carry) = self.v[x].overflowing_add(self.v[y]);
                self.v[VF] = carry as u8;
                self.v[x] = sum;
            }
            Opcode::Sub => {
                let (vx, vy) = (self.v[x], self.v[y]);
                self.v[VF] = (vx >= vy) as u8;
                self.v[x] = vx.wrapping_sub(vy);
            }
            Opcode::SubReverse => {
                let (vx, vy) = (self.v[x], self.v[y]);
                self.v[VF] = (vy >= vx) as u8;
                self.v[x] = vy.wrapping_sub(vx);
            }
            Opcode::ShiftRight => {
                let vx = self.v[x];
                self.v[VF] = vx & 0x01;
                self.v[x] = vx >> 1;
            }
            Opcode::ShiftLeft => {
                let vx = self.v[x];
                self.v[VF] = vx >> 7;
                self.v[x] = vx << 1;
            }
            Opcode::LoadIndex => self.index = nnn,
            Opcode::JumpOffset => {
                let base = if self.quirks.jump_uses_vx {
                    self.v[x]
                } else {
                    self.v[0]
                };
                self.pc = (base as u16 + nnn) & 0x0FFF;
            }
            Opcode::Random => self.v[x] = self.rng.gen::<u8>() & nn,
            Opcode::Draw => self.draw(inst)?,
            Opcode::SkipKey => {
                if keys.is_pressed(self.v[x] & 0xf) {
                    self.pc = advance(self.pc, 2)?;
                }
            }
            Opcode::SkipNotKey => {
                if !keys.is_pressed(self.v[x] & 0xf) {
                    self.pc = advance(self.pc, 2)?;
                }
            }
            Opcode::LoadIndexLong => self.index = inst.nnnn,
            Opcode::SelectPlanes => self.plane_mask = self.v[x] & 0b11,
            Opcode::GetDelay => self.v[x] = self.delay_timer,
            Opcode::WaitKey => {
                log::debug!("waiting for a key for V{:X}", x);
                self.waiting_register = Some(inst.x);
            }
            Opcode::SetDelay => self.delay_timer = self.v[x],
            Opcode::SetSound => self.sound_timer = self.v[x],
            Opcode::AddIndex => {
                let sum = self.index as u32 + self.v[x] as u32;
                if self.quirks.index_overflow_sets_vf {
                    self.v[VF] = (sum > 0x0FFF) as u8;
                }
                self.index = sum as u16;
            }
            Opcode::FontChar => {
                self.index = self.memory.font_addr + (self.v[x] & 0xf) as u16 * FONT_GLYPH_BYTES;
            }
            Opcode::BigFontChar => {
                self.index =
                    self.memory.big_font_addr + (self.v[x] & 0xf) as u16 * BIG_FONT_GLYPH_BYTES;
            }
            Opcode::Bcd => {
                let value = self.v[x];
                self.memory
                    .get_rw_slice(self.index, 3)?
                    .copy_from_slice(&[value / 100, (value / 10) % 10, value % 10]);
            }
            Opcode::StoreRegs => {
                self.memory
                    .get_rw_slice(self.index, x + 1)?
                    .copy_from_slice(&self.v[..=x]);
                self.bump_index(x);
            }
            Opcode::LoadRegs => {
                let src = self.memory.get_ro_slice(self.index, x + 1)?;
                self.v[..=x].copy_from_slice(src);
                self.bump_index(x);
            }
            Opcode::SaveFlags => self.flags[..=x].copy_from_slice(&self.v[..=x]),
            Opcode::RestoreFlags => self.v[..=x].copy_from_slice(&self.flags[..=x]),
            Opcode::Unknown => {
                return Err(MachineError::UnknownOpcode {
                    opcode: inst.opcode,
                    addr,
                })
            }
        }
        Ok(())
    }

    /// conditional skips step over a whole instruction, which may be 4 bytes
    fn skip_if(&mut self, condition: bool) -> Result<(), MachineError> {
        if condition {
            let next = decode(&self.memory, self.pc)?;
            self.pc = advance(self.pc, next.len)?;
        }
        Ok(())
    }

    fn bump_index(&mut self, x: usize) {
        if self.quirks.load_store_increments_index {
            self.index = self.index.wrapping_add(x as u16 + 1);
        }
    }

    /// DXYN: XOR a sprite from memory[I..] onto the selected planes
    fn draw(&mut self, inst: &Instruction) -> Result<(), MachineError> {
        let (w, h) = (self.framebuffer.width(), self.framebuffer.height());
        let x0 = self.v[inst.x as usize] as usize & (w - 1);
        let y0 = self.v[inst.y as usize] as usize & (h - 1);
        let (rows, row_bytes) = match inst.n {
            0 => (16, 2),
            n => (n as usize, 1),
        };

        let sprite = self.memory.get_ro_slice(self.index, rows * row_bytes)?;
        let mask = self.plane_mask;
        let mut collided = false;
        for (row, bytes) in sprite.chunks(row_bytes).enumerate() {
            let bits = match bytes {
                [hi, lo] => u16::from_be_bytes([*hi, *lo]),
                [hi] => (*hi as u16) << 8,
                _ => 0,
            };
            for col in 0..row_bytes * 8 {
                if bits & (0x8000 >> col) != 0 && mask != 0 {
                    collided |= self.framebuffer.toggle(x0 + col, y0 + row, mask);
                }
            }
        }
        self.v[VF] = collided as u8;
        self.redraw = true;
        Ok(())
    }

    /// shift the selected planes by (dx, dy), filling in from off-screen
    /// with unlit pixels. Walks away from the direction of travel so no
    /// pixel is read after it has been overwritten.
    fn scroll(&mut self, dx: isize, dy: isize) {
        let (w, h) = (
            self.framebuffer.width() as isize,
            self.framebuffer.height() as isize,
        );
        let mask = self.plane_mask;
        for j in 0..h {
            let y = if dy > 0 { h - 1 - j } else { j };
            for i in 0..w {
                let x = if dx > 0 { w - 1 - i } else { i };
                self.framebuffer
                    .move_pixel((x as usize, y as usize), (x - dx, y - dy), mask);
            }
        }
        self.redraw = true;
    }
}

/// pc arithmetic that refuses to run off the end of memory
fn advance(pc: u16, len: u16) -> Result<u16, MachineError> {
    pc.checked_add(len).ok_or_else(|| past_end(pc as u32 + len as u32, len))
}

fn past_end(addr: u32, len: u16) -> MachineError {
    MachineError::MemoryOutOfBounds {
        addr: addr as usize,
        len: len as usize,
    }
}
