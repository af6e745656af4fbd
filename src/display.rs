use crate::framebuffer::Frame;
use crate::instruction::decode;
use crate::machine::{Machine, Status};
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Modifier, Style};
use tui::symbols::Marker;
use tui::text::{Span, Spans};
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders, Paragraph};
use tui::Terminal;

/// Display is used by the host to put the machine on the screen. It should
/// abstract the implementation details, so a variety of kinds of screen would
/// work.
pub trait Display {
    /// present the machine's current frame, plus whatever host state
    /// the overlay asks for
    fn draw(&mut self, machine: &Machine, overlay: &Overlay) -> Result<(), io::Error>;
}

/// host-side state shown alongside the frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Overlay {
    /// paused in the debugger; show the register panel
    pub debug: bool,
    /// sound timer is running
    pub buzzer: bool,
}

/// colour for each combination of lit planes
const PLANE_COLOURS: [(u8, Color); 3] = [(1, Color::White), (2, Color::Cyan), (3, Color::Yellow)];

/// instructions shown before pc in the debugger
const DISASSEMBLY_BEFORE: u16 = 3;
const DISASSEMBLY_LINES: usize = 12;

// how a frame maps onto terminal cells
struct Resolution(usize, usize, Marker);

impl Resolution {
    fn of(frame: &Frame) -> Self {
        // braille packs 2x4 pixels per cell, which keeps hi-res on a normal
        // sized terminal
        let marker = if frame.hires {
            Marker::Braille
        } else {
            Marker::Block
        };
        Resolution(frame.width, frame.height, marker)
    }

    /// terminal cells needed, including the border
    fn cells(&self) -> (u16, u16) {
        let (w, h) = match self.2 {
            Marker::Braille => (self.0 / 2, self.1 / 4),
            _ => (self.0, self.1),
        };
        (w as u16 + 2, h as u16 + 2)
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    /// canvas coordinates of every cell holding exactly `planes`
    fn points_with(&self, frame: &Frame, planes: u8) -> Vec<(f64, f64)> {
        frame
            .cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == planes)
            .map(|(i, _)| ((i % self.0) as f64, -1.0 * (i / self.0) as f64))
            .collect()
    }
}

/// A window of disassembly around pc, as (address, is pc, text). Starts a
/// few words before pc; bytes that don't decode show as data.
pub fn disassembly(machine: &Machine, lines: usize) -> Vec<(u16, bool, String)> {
    let pc = machine.pc();
    let mut addr = pc.saturating_sub(2 * DISASSEMBLY_BEFORE);
    let mut out = Vec::with_capacity(lines);
    while out.len() < lines {
        let (len, text) = match decode(machine.memory(), addr) {
            Ok(inst) => (inst.len, format!("{:04X} {}", inst.opcode, inst)),
            Err(_) => break,
        };
        out.push((addr, addr == pc, text));
        addr = match addr.checked_add(len) {
            Some(a) => a,
            None => break,
        };
    }
    out
}

/// the debugger panel: disassembly, then registers
fn debug_lines(machine: &Machine) -> Vec<Spans<'static>> {
    let mut lines: Vec<Spans> = disassembly(machine, DISASSEMBLY_LINES)
        .into_iter()
        .map(|(addr, current, text)| {
            let marker = if current { ">" } else { " " };
            Spans::from(format!("{} {:04X}  {}", marker, addr, text))
        })
        .collect();
    lines.push(Spans::from(""));
    for (r, value) in machine.registers().iter().enumerate() {
        lines.push(Spans::from(format!("v{:X}: {:02X}", r, value)));
    }
    lines.push(Spans::from(format!(" I: {:04X}", machine.index())));
    lines.push(Spans::from(format!("SC: {:04X}", machine.stack_ptr())));
    lines.push(Spans::from(format!("PC: {:04X}", machine.pc())));
    lines.push(Spans::from(format!(
        "DT: {:02X}  ST: {:02X}  PL: {}",
        machine.delay_timer(),
        machine.sound_timer(),
        machine.plane_mask()
    )));
    let status = match machine.status() {
        Status::Running => "DEBUG".to_string(),
        Status::WaitingForKey(r) => format!("DEBUG  waiting for key -> v{:X}", r),
        Status::Halted => "DEBUG  halted".to_string(),
    };
    lines.push(Spans::from(Span::styled(
        status,
        Style::default()
            .fg(Color::Black)
            .bg(Color::White)
            .add_modifier(Modifier::BOLD),
    )));
    lines
}

/// the machine's display in a terminal, rendered using TUI and crossterm
pub struct TermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TermDisplay {
    pub fn new() -> Result<TermDisplay, io::Error> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(TermDisplay { terminal })
    }
}

impl Drop for TermDisplay {
    fn drop(&mut self) {
        if let Err(e) = execute!(self.terminal.backend_mut(), LeaveAlternateScreen, Show) {
            log::warn!("couldn't restore terminal: {}", e);
        }
    }
}

impl Display for TermDisplay {
    fn draw(&mut self, machine: &Machine, overlay: &Overlay) -> Result<(), io::Error> {
        let frame = machine.frame();
        let resolution = Resolution::of(&frame);
        let layers: Vec<(Vec<(f64, f64)>, Color)> = PLANE_COLOURS
            .iter()
            .map(|&(planes, colour)| (resolution.points_with(&frame, planes), colour))
            .collect();
        let panel = if overlay.debug {
            Some(debug_lines(machine))
        } else {
            None
        };
        let title = if frame.hires {
            "CHIP-8 128x64"
        } else {
            "CHIP-8 64x32"
        };

        self.terminal.draw(|f| {
            let area = f.size();
            let buzzer_colour = if overlay.buzzer {
                Color::Red
            } else {
                Color::Reset
            };
            let buzzer = Block::default().style(Style::default().bg(buzzer_colour));
            f.render_widget(buzzer, Rect::new(0, 0, area.width, area.height.min(1)));

            let (w, h) = resolution.cells();
            let screen = Rect::new(0, 1, w, h).intersection(area);
            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title(title)
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(resolution.x_bounds())
                .y_bounds(resolution.y_bounds())
                .marker(resolution.2)
                .paint(|ctx| {
                    for (coords, colour) in &layers {
                        ctx.draw(&Points {
                            coords: coords.as_slice(),
                            color: *colour,
                        });
                    }
                });
            f.render_widget(canvas, screen);

            if let Some(lines) = panel {
                let side = Rect::new(w + 1, 1, 40, area.height.saturating_sub(1)).intersection(area);
                let debugger = Paragraph::new(lines)
                    .block(Block::default().title("debug").borders(Borders::ALL));
                f.render_widget(debugger, side);
            }
        })?;
        Ok(())
    }
}

/// useful for testing non-display routines; just counts what it's given
#[derive(Default)]
pub struct DummyDisplay {
    pub frames: usize,
    pub last_lit: usize,
    pub last_overlay: Overlay,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        Self::default()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, machine: &Machine, overlay: &Overlay) -> Result<(), io::Error> {
        self.frames += 1;
        self.last_lit = machine.frame().cells.iter().filter(|&&c| c != 0).count();
        self.last_overlay = *overlay;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Quirks;

    fn frame_of(cells: &[u8], width: usize, height: usize, hires: bool) -> Frame<'_> {
        Frame {
            width,
            height,
            hires,
            cells,
        }
    }

    // Resolution tests
    #[test]
    fn test_lores_cells() {
        let cells = [0u8; 2048];
        let r = Resolution::of(&frame_of(&cells, 64, 32, false));
        assert_eq!(r.cells(), (66, 34));
    }

    #[test]
    fn test_hires_cells() {
        let cells = [0u8; 8192];
        let r = Resolution::of(&frame_of(&cells, 128, 64, true));
        assert_eq!(r.cells(), (66, 18));
    }

    #[test]
    fn test_bounds() {
        let cells = [0u8; 2048];
        let r = Resolution::of(&frame_of(&cells, 64, 32, false));
        assert_eq!(r.x_bounds(), [0.0, 63.0]);
        assert_eq!(r.y_bounds(), [-31.0, 0.0]);
    }

    #[test]
    fn test_points_by_plane() {
        let mut cells = [0u8; 2048];
        cells[0] = 1;
        cells[65] = 2;
        cells[130] = 3;
        let f = frame_of(&cells, 64, 32, false);
        let r = Resolution::of(&f);
        assert_eq!(r.points_with(&f, 1), vec![(0.0, 0.0)]);
        assert_eq!(r.points_with(&f, 2), vec![(1.0, -1.0)]);
        assert_eq!(r.points_with(&f, 3), vec![(2.0, -2.0)]);
    }

    #[test]
    fn test_disassembly_window() {
        let mut m = Machine::new(Quirks::default(), Some(0));
        m.load(&[0x60, 0x05, 0xF0, 0x00, 0x12, 0x34, 0x00, 0xE0]).unwrap();
        let d = disassembly(&m, 4);
        // starts before pc
        assert_eq!(d[0].0, 0x1fa);
        assert!(!d[0].1);
        assert_eq!(d[3], (0x200, true, "6005 LD V0, 0x05".to_string()));

        let d = disassembly(&m, 6);
        // the long load takes four bytes
        assert_eq!(d[4].0, 0x202);
        assert_eq!(d[4].2, "F000 LD I, 0x1234");
        assert_eq!(d[5].0, 0x206);
    }

    #[test]
    fn test_debug_lines_show_registers() {
        let mut m = Machine::new(Quirks::default(), Some(0));
        m.v[0xa] = 0x3c;
        let lines = debug_lines(&m);
        let text: Vec<String> = lines
            .iter()
            .map(|s| s.0.iter().map(|span| span.content.as_ref()).collect())
            .collect();
        assert!(text.contains(&"vA: 3C".to_string()));
        assert!(text.contains(&"PC: 0200".to_string()));
        assert_eq!(text.last().map(String::as_str), Some("DEBUG"));
    }

    #[test]
    fn test_dummy_display_counts() -> Result<(), io::Error> {
        let m = Machine::new(Quirks::default(), Some(0));
        let mut d = DummyDisplay::new();
        d.draw(&m, &Overlay::default())?;
        assert_eq!(d.frames, 1);
        assert_eq!(d.last_lit, 0);
        Ok(())
    }
}
