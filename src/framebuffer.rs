//! # framebuffer
//!
//! Two overlapping bit-planes sharing one cell per pixel: bit 0 is plane 1,
//! bit 1 is plane 2. Storage is always sized for hi-res; in lo-res only the
//! first 64x32 cells are meaningful, laid out row-major at a 64-cell pitch.
//!
//! Every operation takes a plane mask and leaves the other plane alone.

pub const LORES_WIDTH: usize = 64;
pub const LORES_HEIGHT: usize = 32;
pub const HIRES_WIDTH: usize = 128;
pub const HIRES_HEIGHT: usize = 64;

/// both planes
pub const ALL_PLANES: u8 = 0b11;

pub struct FrameBuffer {
    cells: Box<[u8]>,
    hires: bool,
}

/// a read-only copy-out view of the current resolution
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub width: usize,
    pub height: usize,
    pub hires: bool,
    pub cells: &'a [u8],
}

impl<'a> Frame<'a> {
    /// plane bits at (x, y); no wrapping
    pub fn cell(&self, x: usize, y: usize) -> u8 {
        self.cells[y * self.width + x]
    }

    /// lit on any plane
    pub fn is_on(&self, x: usize, y: usize) -> bool {
        self.cell(x, y) != 0
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        FrameBuffer {
            cells: vec![0u8; HIRES_WIDTH * HIRES_HEIGHT].into_boxed_slice(),
            hires: false,
        }
    }

    pub fn width(&self) -> usize {
        if self.hires {
            HIRES_WIDTH
        } else {
            LORES_WIDTH
        }
    }

    pub fn height(&self) -> usize {
        if self.hires {
            HIRES_HEIGHT
        } else {
            LORES_HEIGHT
        }
    }

    pub fn is_hires(&self) -> bool {
        self.hires
    }

    /// switch resolution; the whole buffer is wiped either way
    pub fn set_hires(&mut self, hires: bool) {
        self.hires = hires;
        self.clear_all();
    }

    /// clear the masked planes everywhere
    pub fn clear(&mut self, mask: u8) {
        for c in self.cells.iter_mut() {
            *c &= !mask;
        }
    }

    pub fn clear_all(&mut self) {
        self.cells.fill(0);
    }

    fn offset(&self, x: usize, y: usize) -> usize {
        // dimensions are powers of two
        let x = x & (self.width() - 1);
        let y = y & (self.height() - 1);
        y * self.width() + x
    }

    /// plane bits at (x, y), wrapping
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.cells[self.offset(x, y)]
    }

    /// XOR a lit pixel into each masked plane at (x, y), wrapping. Returns
    /// true if any of those planes already had the pixel lit.
    pub fn toggle(&mut self, x: usize, y: usize, mask: u8) -> bool {
        let pos = self.offset(x, y);
        let collided = self.cells[pos] & mask != 0;
        self.cells[pos] ^= mask;
        collided
    }

    /// Copy the masked planes of `src` onto `dst`. A source off the edge of
    /// the screen reads as unlit; `dst` must be on screen.
    pub fn move_pixel(&mut self, dst: (usize, usize), src: (isize, isize), mask: u8) {
        let (w, h) = (self.width() as isize, self.height() as isize);
        let src_bits = if src.0 < 0 || src.1 < 0 || src.0 >= w || src.1 >= h {
            0
        } else {
            self.cells[src.1 as usize * w as usize + src.0 as usize] & mask
        };
        let pos = dst.1 * self.width() + dst.0;
        self.cells[pos] = (self.cells[pos] & !mask) | src_bits;
    }

    /// copy-out view of the visible cells
    pub fn frame(&self) -> Frame<'_> {
        let (width, height) = (self.width(), self.height());
        Frame {
            width,
            height,
            hires: self.hires,
            cells: &self.cells[..width * height],
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
