// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VT100 / ANSI control sequences.
//!
//! Fixed sequences are string constants; parameterized ones are small types
//! whose `Display` impl writes the sequence, so they can be used with
//! `write!` without allocating.

use core::fmt;

// Cursor.
pub const CURSOR_HOME: &str = "\x1b[H";
pub const CURSOR_SAVE: &str = "\x1b[s";
pub const CURSOR_RESTORE: &str = "\x1b[u";
pub const CURSOR_HIDE: &str = "\x1b[?25l";
pub const CURSOR_SHOW: &str = "\x1b[?25h";
pub const CURSOR_GET_POS: &str = "\x1b[6n";

// Erasing.
pub const CLEAR_SCREEN: &str = "\x1b[2J";
pub const CLEAR_LINE: &str = "\x1b[K";
pub const CLEAR_LINE_LEFT: &str = "\x1b[1K";
pub const CLEAR_LINE_ALL: &str = "\x1b[2K";

/// Asks the terminal to identify itself.
pub const TERM_IDENTIFY: &str = "\x1b[c";

// Text attributes.
pub const RESET_ALL: &str = "\x1b[0m";
pub const TEXT_BOLD: &str = "\x1b[1m";
pub const TEXT_DIM: &str = "\x1b[2m";
pub const TEXT_ITALIC: &str = "\x1b[3m";
pub const TEXT_UNDERLINE: &str = "\x1b[4m";
pub const TEXT_BLINK: &str = "\x1b[5m";
pub const TEXT_REVERSE: &str = "\x1b[7m";
pub const TEXT_HIDDEN: &str = "\x1b[8m";
pub const TEXT_STRIKE: &str = "\x1b[9m";

pub const FG_BLACK: &str = "\x1b[30m";
pub const FG_RED: &str = "\x1b[31m";
pub const FG_GREEN: &str = "\x1b[32m";
pub const FG_YELLOW: &str = "\x1b[33m";
pub const FG_BLUE: &str = "\x1b[34m";
pub const FG_MAGENTA: &str = "\x1b[35m";
pub const FG_CYAN: &str = "\x1b[36m";
pub const FG_WHITE: &str = "\x1b[37m";

pub const BG_BLACK: &str = "\x1b[40m";
pub const BG_RED: &str = "\x1b[41m";
pub const BG_GREEN: &str = "\x1b[42m";
pub const BG_YELLOW: &str = "\x1b[43m";
pub const BG_BLUE: &str = "\x1b[44m";
pub const BG_MAGENTA: &str = "\x1b[45m";
pub const BG_CYAN: &str = "\x1b[46m";
pub const BG_WHITE: &str = "\x1b[47m";

/// Erases the character left of the cursor: back, blank, back.
pub const ERASE_BACK: &str = "\x08 \x08";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CursorUp(pub u16);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CursorDown(pub u16);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CursorRight(pub u16);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CursorLeft(pub u16);

/// Moves the cursor to a 1-based row and column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CursorPos {
    pub row: u16,
    pub col: u16,
}

/// Foreground from the 256-color palette.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fg256(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bg256(pub u8);

/// 24-bit foreground color.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FgRgb(pub u8, pub u8, pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BgRgb(pub u8, pub u8, pub u8);

macro_rules! csi_display {
    ($t:ty, $final:literal) => {
        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "\x1b[{}{}", self.0, $final)
            }
        }
    };
}

csi_display!(CursorUp, 'A');
csi_display!(CursorDown, 'B');
csi_display!(CursorRight, 'C');
csi_display!(CursorLeft, 'D');

impl fmt::Display for CursorPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[{};{}H", self.row, self.col)
    }
}

impl fmt::Display for Fg256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[38;5;{}m", self.0)
    }
}

impl fmt::Display for Bg256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[48;5;{}m", self.0)
    }
}

impl fmt::Display for FgRgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[38;2;{};{};{}m", self.0, self.1, self.2)
    }
}

impl fmt::Display for BgRgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[48;2;{};{};{}m", self.0, self.1, self.2)
    }
}
