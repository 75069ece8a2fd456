//! One-wire ROM commands

pub const SEARCH_NORMAL: u8 = 0xF0;
pub const MATCH_ROM: u8 = 0x55;
pub const SKIP_ROM: u8 = 0xCC;
