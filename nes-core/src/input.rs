use bincode::{Decode, Encode};

/// Current button state for one standard controller.
///
/// The host writes this into the emulator once per frame (or whenever it
/// likes); the bus handles the strobe/shift-register protocol on reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub struct JoypadState {
    pub a: bool,
    pub b: bool,
    pub select: bool,
    pub start: bool,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl JoypadState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack into the wire order the console sees: A in bit 0, then B,
    /// Select, Start, Up, Down, Left, Right.
    pub(crate) fn latch(self) -> LatchedJoypadState {
        let bits = u8::from(self.a)
            | (u8::from(self.b) << 1)
            | (u8::from(self.select) << 2)
            | (u8::from(self.start) << 3)
            | (u8::from(self.up) << 4)
            | (u8::from(self.down) << 5)
            | (u8::from(self.left) << 6)
            | (u8::from(self.right) << 7);
        LatchedJoypadState(bits)
    }
}

/// The shift-register form of a latched controller read.
#[derive(Debug, Clone, Copy, Default, Encode, Decode)]
pub(crate) struct LatchedJoypadState(u8);

impl LatchedJoypadState {
    pub(crate) fn next_bit(self) -> u8 {
        self.0 & 0x01
    }

    // Hardware shifts 1s in from the top, so reads past the eighth return 1.
    #[must_use]
    pub(crate) fn shift(self) -> Self {
        Self((self.0 >> 1) | 0x80)
    }
}
