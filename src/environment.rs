/// # environment
///
/// The host: owns the machine, paces it, and wires it up to a display, an
/// input device and a buzzer.
///
///  main loop, once per timer tick (60Hz by default)
///   |-- poll input; handle quit / debugger toggle / single-step
///   |-- run ips / timer_hz instructions (carrying the fraction over)
///   |-- tick the delay and sound timers
///   |-- beep or not depending on the sound timer
///   |-- draw if the machine asked for it
///   `-- sleep until the next tick
use crate::config::Config;
use crate::display::{Display, Overlay};
use crate::error::MachineError;
use crate::input::{Control, Input};
use crate::machine::{Machine, Status};
use crate::sound::Sound;
use std::io;
use std::time::{Duration, Instant};

pub struct Environment<'a> {
    machine: Machine,
    display: &'a mut dyn Display,
    input: &'a mut dyn Input,
    sound: &'a mut dyn Sound,
    config: Config,
    paused: bool,
    quit: bool,
    sound_ok: bool,
    steps: u64,
    step_credit: f64,
}

impl<'a> Environment<'a> {
    pub fn new(
        config: Config,
        display: &'a mut dyn Display,
        input: &'a mut dyn Input,
        sound: &'a mut dyn Sound,
    ) -> Self {
        Environment {
            machine: Machine::new(config.quirks(), config.seed),
            display,
            input,
            sound,
            paused: config.debug,
            config,
            quit: false,
            sound_ok: true,
            steps: 0,
            step_credit: 0.0,
        }
    }

    /// load a program, e.g. from a ROM file
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, MachineError> {
        self.machine.load_program(reader)
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// instructions executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Run until the program halts, the user quits, or the configured
    /// number of cycles is used up. A machine fault comes back as an error.
    pub fn main_loop(&mut self) -> Result<Status, MachineError> {
        let timer_hz = self.config.timer_hz.max(1);
        let tick = Duration::from_secs_f64(1.0 / timer_hz as f64);
        let mut next = Instant::now();

        self.present(true)?;
        while !self.finished() {
            self.run_tick()?;
            next += tick;
            let now = Instant::now();
            if next > now {
                spin_sleep::sleep(next - now);
            } else {
                // running slow; don't try to catch up
                next = now;
            }
        }
        self.sound_set(false);
        self.present(true)?;
        Ok(self.machine.status())
    }

    fn finished(&self) -> bool {
        self.quit
            || self.machine.status() == Status::Halted
            || (self.config.cycles > 0 && self.steps >= self.config.cycles)
    }

    /// one timer tick worth of work
    pub fn run_tick(&mut self) -> Result<(), MachineError> {
        let mut force_draw = false;
        for control in self.input.poll()? {
            match control {
                Control::Quit => self.quit = true,
                Control::ToggleDebug => {
                    self.paused = !self.paused;
                    force_draw = true;
                    log::debug!("debugger {}", if self.paused { "on" } else { "off" });
                }
                Control::Step if self.paused => {
                    self.step()?;
                    self.machine.tick_timers();
                    force_draw = true;
                }
                Control::Step => {}
            }
        }
        if self.quit {
            return Ok(());
        }

        if !self.paused {
            self.step_credit += self.config.ips as f64 / self.config.timer_hz.max(1) as f64;
            while self.step_credit >= 1.0 && !self.finished() {
                self.step_credit -= 1.0;
                self.step()?;
            }
            self.machine.tick_timers();
        }

        self.sound_set(self.machine.sound_timer() > 0);
        self.present(force_draw)
    }

    fn step(&mut self) -> Result<Status, MachineError> {
        let keys = self.input.keys();
        self.steps += 1;
        let result = self.machine.step(&keys);
        if result.is_err() {
            // show where it stopped before handing the error back
            self.paused = true;
            self.present(true)?;
        }
        result
    }

    fn sound_set(&mut self, on: bool) {
        if !self.sound_ok {
            return;
        }
        if let Err(e) = self.sound.set(on) {
            log::warn!("sound disabled: {}", e);
            self.sound_ok = false;
        }
    }

    fn present(&mut self, force: bool) -> Result<(), MachineError> {
        if force || self.machine.redraw() {
            let overlay = Overlay {
                debug: self.paused,
                buzzer: self.machine.sound_timer() > 0,
            };
            self.display.draw(&self.machine, &overlay)?;
            self.machine.clear_redraw();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DummyDisplay;
    use crate::input::DummyInput;
    use crate::sound::Mute;

    fn config() -> Config {
        Config {
            ips: 600,
            timer_hz: 60,
            seed: Some(1),
            ..Config::default()
        }
    }

    #[test]
    fn test_runs_until_exit() -> Result<(), MachineError> {
        let (mut d, mut i, mut s) = (DummyDisplay::new(), DummyInput::new(&[]), Mute::new());
        let mut env = Environment::new(config(), &mut d, &mut i, &mut s);
        let mut rom: &[u8] = &[0x60, 0x05, 0x00, 0xFD];
        env.load_program(&mut rom)?;
        assert_eq!(env.main_loop()?, Status::Halted);
        assert_eq!(env.machine().registers()[0], 5);
        assert_eq!(env.steps(), 2);
        Ok(())
    }

    #[test]
    fn test_tick_paces_instructions_and_timers() -> Result<(), MachineError> {
        let (mut d, mut i, mut s) = (DummyDisplay::new(), DummyInput::new(&[]), Mute::new());
        let mut env = Environment::new(config(), &mut d, &mut i, &mut s);
        // v0 += 1; jp 0x200
        let mut rom: &[u8] = &[0x70, 0x01, 0x12, 0x00];
        env.load_program(&mut rom)?;
        env.machine.sound_timer = 3;
        env.run_tick()?;
        assert_eq!(env.steps(), 10);
        assert_eq!(env.machine().registers()[0], 5);
        assert_eq!(env.machine().sound_timer(), 2);
        env.run_tick()?;
        assert_eq!(env.steps(), 20);
        assert_eq!(env.machine().sound_timer(), 1);
        drop(env);
        assert_eq!(s.beeps, 1);
        assert!(s.is_beeping());
        Ok(())
    }

    #[test]
    fn test_cycle_limit() -> Result<(), MachineError> {
        let (mut d, mut i, mut s) = (DummyDisplay::new(), DummyInput::new(&[]), Mute::new());
        let c = Config {
            cycles: 25,
            ..config()
        };
        let mut env = Environment::new(c, &mut d, &mut i, &mut s);
        let mut rom: &[u8] = &[0x12, 0x00];
        env.load_program(&mut rom)?;
        assert_eq!(env.main_loop()?, Status::Running);
        assert_eq!(env.steps(), 25);
        Ok(())
    }

    #[test]
    fn test_fault_is_returned() -> Result<(), MachineError> {
        let (mut d, mut i, mut s) = (DummyDisplay::new(), DummyInput::new(&[]), Mute::new());
        let mut env = Environment::new(config(), &mut d, &mut i, &mut s);
        let mut rom: &[u8] = &[0x00, 0xEE];
        env.load_program(&mut rom)?;
        assert!(matches!(
            env.main_loop(),
            Err(MachineError::StackUnderflow { addr: 0x200 })
        ));
        drop(env);
        assert!(d.last_overlay.debug);
        Ok(())
    }

    #[test]
    fn test_quit_and_debugger_controls() -> Result<(), MachineError> {
        let (mut d, mut s) = (DummyDisplay::new(), Mute::new());
        let mut i = DummyInput::new(&[]).with_controls(&[Control::ToggleDebug, Control::Step]);
        let mut env = Environment::new(config(), &mut d, &mut i, &mut s);
        let mut rom: &[u8] = &[0x70, 0x01, 0x12, 0x00];
        env.load_program(&mut rom)?;
        env.run_tick()?;
        // paused, so only the single step ran
        assert_eq!(env.steps(), 1);
        env.run_tick()?;
        assert_eq!(env.steps(), 1);
        drop(env);

        let (mut d, mut s) = (DummyDisplay::new(), Mute::new());
        let mut i = DummyInput::new(&[]).with_controls(&[Control::Quit]);
        let mut env = Environment::new(config(), &mut d, &mut i, &mut s);
        assert_eq!(env.main_loop()?, Status::Running);
        assert_eq!(env.steps(), 0);
        Ok(())
    }

    #[test]
    fn test_draws_on_redraw() -> Result<(), MachineError> {
        let (mut d, mut i, mut s) = (DummyDisplay::new(), DummyInput::new(&[]), Mute::new());
        let mut env = Environment::new(config(), &mut d, &mut i, &mut s);
        // draw font '0' then spin
        let mut rom: &[u8] = &[0xD0, 0x05, 0x12, 0x02];
        env.load_program(&mut rom)?;
        env.run_tick()?;
        assert!(!env.machine().redraw());
        drop(env);
        assert_eq!(d.frames, 1);
        assert_eq!(d.last_lit, 14);
        Ok(())
    }

    #[test]
    fn test_key_wait_through_input() -> Result<(), MachineError> {
        let (mut d, mut s) = (DummyDisplay::new(), Mute::new());
        let mut i = DummyInput::new(&[0x9]);
        let mut env = Environment::new(config(), &mut d, &mut i, &mut s);
        // wait for key into v4, then exit
        let mut rom: &[u8] = &[0xF4, 0x0A, 0x00, 0xFD];
        env.load_program(&mut rom)?;
        assert_eq!(env.main_loop()?, Status::Halted);
        assert_eq!(env.machine().registers()[4], 0x9);
        Ok(())
    }
}
