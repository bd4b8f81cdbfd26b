//! Rendition state: attribute bits and the base color palette

use bitflags::bitflags;

use crate::segment::CellColor;

bitflags! {
    /// Active character attributes, the six every terminal supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CellAttrs: u8 {
        const BOLD      = 1 << 0;
        const DIM       = 1 << 1;
        const UNDERLINE = 1 << 2;
        const BLINK     = 1 << 3;
        const REVERSE   = 1 << 4;
        const STANDOUT  = 1 << 5;
    }
}

/// The eight base terminal colors, indexed as in SGR 30-37.
///
/// The index doubles as a channel mask: bit 0 red, bit 1 green,
/// bit 2 blue. Yellow (3) is red+green, white (7) lights all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteColor {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
}

impl PaletteColor {
    /// Maps an SGR palette index (0-7) to a color.
    pub fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(PaletteColor::Black),
            1 => Some(PaletteColor::Red),
            2 => Some(PaletteColor::Green),
            3 => Some(PaletteColor::Yellow),
            4 => Some(PaletteColor::Blue),
            5 => Some(PaletteColor::Magenta),
            6 => Some(PaletteColor::Cyan),
            7 => Some(PaletteColor::White),
            _ => None,
        }
    }

    /// Resolves the color at an intensity level: each channel is either
    /// fully off or lit to `level`.
    pub fn channels(self, level: u8) -> CellColor {
        let mask = self as u8;
        CellColor::new(
            if mask & 0b001 != 0 { level } else { 0 },
            if mask & 0b010 != 0 { level } else { 0 },
            if mask & 0b100 != 0 { level } else { 0 },
        )
    }
}
