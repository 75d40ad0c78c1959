//! Counter units shared by the pulse, triangle, and noise channels.

use bincode::{Decode, Encode};

const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, //
    12, 16, 24, 18, 48, 20, 96, 22, 192, 24, 72, 26, 16, 28, 32, 30,
];

/// Silences a channel when it reaches zero; decremented on half-frame
/// clocks unless halted.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct LengthCounter {
    counter: u8,
    enabled: bool,
    halted: bool,
}

impl LengthCounter {
    pub(crate) fn new() -> Self {
        Self { counter: 0, enabled: false, halted: false }
    }

    pub(crate) fn counter(&self) -> u8 {
        self.counter
    }

    pub(crate) fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.counter = 0;
        }
    }

    /// Load from the 5-bit length index in the channel's high timer write.
    pub(crate) fn load(&mut self, register_value: u8) {
        if self.enabled {
            self.counter = LENGTH_TABLE[(register_value >> 3) as usize];
        }
    }

    pub(crate) fn clock(&mut self) {
        if !self.halted && self.counter > 0 {
            self.counter -= 1;
        }
    }
}

/// Volume envelope: a divider stepping a 15-to-0 decay, optionally looping,
/// optionally bypassed by a constant volume.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Envelope {
    divider: u8,
    divider_period: u8,
    decay_level: u8,
    start_flag: bool,
    loop_flag: bool,
    constant_volume: bool,
}

impl Envelope {
    pub(crate) fn new() -> Self {
        Self {
            divider: 0,
            divider_period: 0,
            decay_level: 0,
            start_flag: false,
            loop_flag: false,
            constant_volume: false,
        }
    }

    pub(crate) fn write_control(&mut self, value: u8) {
        self.loop_flag = value & 0x20 != 0;
        self.constant_volume = value & 0x10 != 0;
        self.divider_period = value & 0x0F;
    }

    pub(crate) fn restart(&mut self) {
        self.start_flag = true;
    }

    pub(crate) fn volume(&self) -> u8 {
        if self.constant_volume {
            self.divider_period
        } else {
            self.decay_level
        }
    }

    pub(crate) fn clock(&mut self) {
        if self.start_flag {
            self.start_flag = false;
            self.divider = self.divider_period;
            self.decay_level = 15;
        } else if self.divider == 0 {
            self.divider = self.divider_period;
            if self.decay_level > 0 {
                self.decay_level -= 1;
            } else if self.loop_flag {
                self.decay_level = 15;
            }
        } else {
            self.divider -= 1;
        }
    }
}
