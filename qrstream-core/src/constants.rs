//! Constants and limits for the qrstream wire format

/// Current content stream version
pub const CONTENT_VERSION: u64 = 1;

/// First byte of every correction frame
///
/// Content frames always start with a decimal digit, so a single byte is
/// enough to tell the two kinds apart.
pub const CORRECTION_MARKER: u8 = b'C';

/// FNV-1a 32-bit offset basis
pub const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

/// FNV-1a 32-bit prime
pub const FNV_PRIME: u32 = 0x0100_0193;

/// Largest number of decimal digits a VLQ length may have
pub const MAX_LENGTH_DIGITS: usize = 9;

/// Assumed loss rates, in percent, the sender walks through in every round
pub const LOSS_RATE_LADDER: [u8; 10] = [1, 2, 3, 5, 8, 13, 21, 34, 55, 89];

/// Largest accepted loss rate percentage in a correction frame
pub const MAX_LOSS_RATE_PERCENT: u8 = 99;

/// Digits reserved for a frame (or correction) index
pub const MAX_INDEX_DIGITS: usize = 6;

/// Largest number of content frames a transfer may use
pub const MAX_FRAMES: usize = 1_000_000;

/// Worst-case size of an index field: digit count + length digit + digits
pub const INDEX_FIELD_MAX: usize = 2 + MAX_INDEX_DIGITS;

/// Worst-case size of everything before the parity in a correction frame:
/// marker + loss rate field ("12" + "99") + correction index field
pub const CORRECTION_HEADER_MAX: usize = 1 + 4 + INDEX_FIELD_MAX;

/// Default total capacity of one optical code, in bytes
pub const DEFAULT_CAPACITY_TOTAL: usize = 300;

/// Default time between two displayed codes, in milliseconds
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 100;

/// Number of decimal digits of `value`
pub const fn decimal_digits(mut value: usize) -> usize {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}
