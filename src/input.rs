use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;
use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

/// number of keys on the hex keypad
pub const KEY_COUNT: usize = 16;

/// terminals don't report key releases, so a key counts as held for this
/// long after its last press (or auto-repeat)
pub const KEY_HOLD: Duration = Duration::from_millis(128);

/// map of keys read from the terminal to the hex keypad, using the left-hand
/// side of a qwerty keyboard
const CONVENTIONAL_KEYMAP: [(char, u8); KEY_COUNT] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// The only thing the interpreter needs to know about the keyboard. Must
/// not block.
pub trait Keypad {
    fn is_pressed(&self, key: u8) -> bool;
}

/// a snapshot of which hex keys are down
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyState([bool; KEY_COUNT]);

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// a snapshot with exactly these keys held
    pub fn with_pressed(keys: &[u8]) -> Self {
        let mut ks = Self::default();
        for &k in keys {
            ks.press(k);
        }
        ks
    }

    pub fn press(&mut self, key: u8) {
        self.0[(key & 0xf) as usize] = true;
    }

    pub fn release(&mut self, key: u8) {
        self.0[(key & 0xf) as usize] = false;
    }
}

impl Keypad for KeyState {
    fn is_pressed(&self, key: u8) -> bool {
        self.0.get(key as usize).copied().unwrap_or(false)
    }
}

/// requests from the user to the host rather than to the running program
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Quit,
    ToggleDebug,
    Step,
}

/// reads keypresses
pub trait Input {
    /// drain whatever the device has buffered, returning any control
    /// requests; keypad keys are folded into the held-key state
    fn poll(&mut self) -> Result<Vec<Control>, io::Error>;

    /// which keypad keys are held right now
    fn keys(&self) -> KeyState;
}

/// Input from the terminal, using crossterm in raw mode
pub struct TermInput {
    held_since: [Option<Instant>; KEY_COUNT],
    keymap: HashMap<char, u8>,
}

impl TermInput {
    pub fn new() -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(TermInput {
            held_since: [None; KEY_COUNT],
            keymap: HashMap::from(CONVENTIONAL_KEYMAP),
        })
    }

    fn handle_key(&mut self, evt: KeyEvent, now: Instant) -> Option<Control> {
        let ctrl = evt.modifiers.contains(KeyModifiers::CONTROL);
        match evt.code {
            KeyCode::Char('c') if ctrl => Some(Control::Quit),
            KeyCode::Char('d') if ctrl => Some(Control::ToggleDebug),
            KeyCode::Char('e') if ctrl => Some(Control::Step),
            KeyCode::Esc => Some(Control::Quit),
            KeyCode::Char(key) => {
                match self.keymap.get(&key.to_ascii_lowercase()) {
                    Some(&mapped_key) => self.held_since[mapped_key as usize] = Some(now),
                    None => log::debug!("can't map {:?} to a keypad key", key),
                }
                None
            }
            other => {
                log::debug!("ignoring key event {:?}", other);
                None
            }
        }
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("couldn't restore terminal mode: {}", e);
        }
    }
}

impl Input for TermInput {
    fn poll(&mut self) -> Result<Vec<Control>, io::Error> {
        let mut controls = Vec::new();
        while poll(Duration::from_millis(0))? {
            if let Event::Key(evt) = read()? {
                if let Some(c) = self.handle_key(evt, Instant::now()) {
                    controls.push(c);
                }
            }
        }
        Ok(controls)
    }

    fn keys(&self) -> KeyState {
        held_keys(&self.held_since, Instant::now())
    }
}

fn held_keys(held_since: &[Option<Instant>; KEY_COUNT], now: Instant) -> KeyState {
    let mut ks = KeyState::new();
    for (key, since) in held_since.iter().enumerate() {
        if matches!(since, Some(t) if now.saturating_duration_since(*t) < KEY_HOLD) {
            ks.press(key as u8);
        }
    }
    ks
}

/// dummy Input implementation for testing
pub struct DummyInput {
    keys: KeyState,
    controls: Vec<Control>,
}

impl DummyInput {
    pub fn new(keys: &[u8]) -> Self {
        DummyInput {
            keys: KeyState::with_pressed(keys),
            controls: Vec::new(),
        }
    }

    /// queue up control requests to be returned by the next poll
    pub fn with_controls(mut self, controls: &[Control]) -> Self {
        self.controls.extend_from_slice(controls);
        self
    }
}

impl Input for DummyInput {
    fn poll(&mut self) -> Result<Vec<Control>, io::Error> {
        Ok(std::mem::take(&mut self.controls))
    }

    fn keys(&self) -> KeyState {
        self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keystate() {
        let mut ks = KeyState::with_pressed(&[0x0, 0xa]);
        assert!(ks.is_pressed(0x0));
        assert!(ks.is_pressed(0xa));
        assert!(!ks.is_pressed(0xb));
        ks.release(0xa);
        assert!(!ks.is_pressed(0xa));
        // out of range keys are never pressed
        assert!(!ks.is_pressed(0x10));
    }

    #[test]
    fn test_keymap_is_complete() {
        let map: HashMap<char, u8> = HashMap::from(CONVENTIONAL_KEYMAP);
        let mut seen = [false; KEY_COUNT];
        for v in map.values() {
            seen[*v as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_held_keys_expire() {
        let now = Instant::now();
        let mut held = [None; KEY_COUNT];
        held[0x5] = Some(now);
        assert!(held_keys(&held, now).is_pressed(0x5));
        assert!(held_keys(&held, now + KEY_HOLD / 2).is_pressed(0x5));
        assert!(!held_keys(&held, now + KEY_HOLD).is_pressed(0x5));
    }

    #[test]
    fn test_dummy_input_controls_drain() -> Result<(), io::Error> {
        let mut i = DummyInput::new(&[0x1]).with_controls(&[Control::Step]);
        assert_eq!(i.poll()?, vec![Control::Step]);
        assert!(i.poll()?.is_empty());
        assert!(i.keys().is_pressed(0x1));
        Ok(())
    }
}
