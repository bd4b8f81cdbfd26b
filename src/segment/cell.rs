//! Screen segment cell - one mirrored character position
//!
//! Cells carry everything a reader needs to present one grid position:
//! the glyph and the fully resolved colors. Attribute emphasis (bold,
//! dim, reverse) is baked into the color channels by the emulation
//! engine before the cell is written, so readers never re-derive
//! rendition state; only blink and underline survive as flags because
//! braille displays present those separately.

pub const CELL_SIZE: usize = 12;

/// Base channel intensity for palette colors, the classic VGA level.
pub const COLOR_LEVEL_NORMAL: u8 = 0xAA;
/// Channel intensity after bold/standout raises the foreground.
pub const COLOR_LEVEL_BRIGHT: u8 = 0xFF;

const FLAG_BLINK: u8 = 0x01;
const FLAG_UNDERLINE: u8 = 0x02;

/// A resolved RGB intensity triple.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl CellColor {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Halves every channel, the dim-attribute adjustment.
    pub fn dimmed(self) -> Self {
        Self {
            red: self.red >> 1,
            green: self.green >> 1,
            blue: self.blue >> 1,
        }
    }
}

/// One mirrored character cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScreenCell {
    /// The displayed code point. Space for blank cells.
    pub glyph: char,
    pub foreground: CellColor,
    pub background: CellColor,
    pub blink: bool,
    pub underline: bool,
}

impl ScreenCell {
    /// A blank cell: space, default foreground at base intensity on a
    /// black background. This is what scrolled-in and cleared regions
    /// hold.
    pub fn blank() -> Self {
        Self {
            glyph: ' ',
            foreground: CellColor::new(
                COLOR_LEVEL_NORMAL,
                COLOR_LEVEL_NORMAL,
                COLOR_LEVEL_NORMAL,
            ),
            background: CellColor::new(0, 0, 0),
            blink: false,
            underline: false,
        }
    }

    /// Encodes the cell into its 12-byte record form.
    ///
    /// `out` must be exactly `CELL_SIZE` bytes.
    pub fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&(self.glyph as u32).to_ne_bytes());
        out[4] = self.foreground.red;
        out[5] = self.foreground.green;
        out[6] = self.foreground.blue;
        out[7] = self.background.red;
        out[8] = self.background.green;
        out[9] = self.background.blue;
        let mut flags = 0u8;
        if self.blink {
            flags |= FLAG_BLINK;
        }
        if self.underline {
            flags |= FLAG_UNDERLINE;
        }
        out[10] = flags;
        out[11] = 0;
    }

    /// Decodes a 12-byte record. Invalid code points decode as a space;
    /// a torn concurrent write must never panic a reader.
    pub fn decode(raw: &[u8]) -> Self {
        let mut glyph_raw = [0u8; 4];
        glyph_raw.copy_from_slice(&raw[0..4]);
        let glyph = char::from_u32(u32::from_ne_bytes(glyph_raw)).unwrap_or(' ');
        Self {
            glyph,
            foreground: CellColor::new(raw[4], raw[5], raw[6]),
            background: CellColor::new(raw[7], raw[8], raw[9]),
            blink: raw[10] & FLAG_BLINK != 0,
            underline: raw[10] & FLAG_UNDERLINE != 0,
        }
    }
}

impl Default for ScreenCell {
    fn default() -> Self {
        Self::blank()
    }
}
