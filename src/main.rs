use std::error::Error;
use std::fs::File;

use chip8x::config::Config;
use chip8x::display::TermDisplay;
use chip8x::environment::Environment;
use chip8x::input::TermInput;
use chip8x::sound::{Mute, SimpleBeep, Sound};
use clap::Parser;

fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // open the ROM before touching the terminal, so a bad path reads cleanly
    let mut rom = File::open(&config.rom)?;

    let mut sound: Box<dyn Sound> = if config.mute {
        Box::new(Mute::new())
    } else {
        Box::new(SimpleBeep::new())
    };
    let mut input = TermInput::new()?;
    let mut display = TermDisplay::new()?;

    let mut environment = Environment::new(config, &mut display, &mut input, sound.as_mut());
    let len = environment.load_program(&mut rom)?;
    log::info!("loaded {} bytes", len);

    let status = environment.main_loop()?;
    log::info!("stopped after {} steps: {:?}", environment.steps(), status);
    Ok(())
}
