use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_INSTRUCTIONS_PER_SECOND: u64 = 1000;
pub const DEFAULT_TIMER_HZ: u64 = 60;

/// Compatibility switches for the points where CHIP-8 dialects disagree.
/// Everything defaults to off.
///
/// NB. 8XY6/8XYE always shift VX in place and take the carry from VX; the
/// COSMAC VIP behaviour of shifting VY into VX is not available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Quirks {
    /// BXNN jumps to XNN + VX rather than NNN + V0
    pub jump_uses_vx: bool,
    /// FX1E sets VF when I runs past 0x0FFF
    pub index_overflow_sets_vf: bool,
    /// FX55/FX65 leave I pointing past the last register transferred
    pub load_store_increments_index: bool,
}

/// extended CHIP-8 interpreter in a terminal
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// ROM file to run
    pub rom: PathBuf,

    /// instructions per second
    #[arg(long, default_value_t = DEFAULT_INSTRUCTIONS_PER_SECOND)]
    pub ips: u64,

    /// delay/sound timer rate
    #[arg(long, default_value_t = DEFAULT_TIMER_HZ)]
    pub timer_hz: u64,

    /// start paused in the debugger (ctrl-d to toggle, ctrl-e to step)
    #[arg(short, long)]
    pub debug: bool,

    /// never beep
    #[arg(short, long)]
    pub mute: bool,

    /// seed for CXNN, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// stop after this many steps; 0 runs until halted or quit
    #[arg(long, default_value_t = 0)]
    pub cycles: u64,

    /// BXNN jumps to XNN + VX
    #[arg(long)]
    pub jump_uses_vx: bool,

    /// FX1E sets VF on index overflow past 0x0FFF
    #[arg(long)]
    pub index_overflow_sets_vf: bool,

    /// FX55/FX65 increment I
    #[arg(long)]
    pub load_store_increments_index: bool,
}

impl Config {
    pub fn quirks(&self) -> Quirks {
        Quirks {
            jump_uses_vx: self.jump_uses_vx,
            index_overflow_sets_vf: self.index_overflow_sets_vf,
            load_store_increments_index: self.load_store_increments_index,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rom: PathBuf::new(),
            ips: DEFAULT_INSTRUCTIONS_PER_SECOND,
            timer_hz: DEFAULT_TIMER_HZ,
            debug: false,
            mute: false,
            seed: None,
            cycles: 0,
            jump_uses_vx: false,
            index_overflow_sets_vf: false,
            load_store_increments_index: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_cli() {
        let c = Config::try_parse_from(["chip8x", "roms/ibm.ch8"]).unwrap();
        assert_eq!(c.rom, PathBuf::from("roms/ibm.ch8"));
        assert_eq!(c.ips, 1000);
        assert_eq!(c.timer_hz, 60);
        assert_eq!(c.seed, None);
        assert_eq!(c.quirks(), Quirks::default());
    }

    #[test]
    fn test_quirk_flags() {
        let c = Config::try_parse_from([
            "chip8x",
            "--jump-uses-vx",
            "--load-store-increments-index",
            "--seed",
            "7",
            "game.ch8",
        ])
        .unwrap();
        let q = c.quirks();
        assert!(q.jump_uses_vx);
        assert!(!q.index_overflow_sets_vf);
        assert!(q.load_store_increments_index);
        assert_eq!(c.seed, Some(7));
    }

    #[test]
    fn test_rom_is_required() {
        assert!(Config::try_parse_from(["chip8x"]).is_err());
    }
}
