use crate::apu::units::LengthCounter;
use bincode::{Decode, Encode};

// 32-step sequence: 15 down to 0, then 0 up to 15
const SEQUENCE_STEPS: u8 = 32;

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct TriangleChannel {
    timer: u16,
    timer_period: u16,
    sequencer_step: u8,
    length_counter: LengthCounter,
    linear_counter: u8,
    linear_reload_value: u8,
    linear_reload_flag: bool,
    control_flag: bool,
}

impl TriangleChannel {
    pub(crate) fn new() -> Self {
        Self {
            timer: 0,
            timer_period: 0,
            sequencer_step: 0,
            length_counter: LengthCounter::new(),
            linear_counter: 0,
            linear_reload_value: 0,
            linear_reload_flag: false,
            control_flag: false,
        }
    }

    pub(crate) fn write_linear(&mut self, value: u8) {
        self.control_flag = value & 0x80 != 0;
        self.length_counter.set_halted(self.control_flag);
        self.linear_reload_value = value & 0x7F;
    }

    pub(crate) fn write_timer_lo(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0xFF00) | u16::from(value);
    }

    pub(crate) fn write_timer_hi(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | (u16::from(value & 0x07) << 8);
        self.length_counter.load(value);
        self.linear_reload_flag = true;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.length_counter.set_enabled(enabled);
    }

    pub(crate) fn length_counter(&self) -> u8 {
        self.length_counter.counter()
    }

    pub(crate) fn clock_quarter_frame(&mut self) {
        if self.linear_reload_flag {
            self.linear_counter = self.linear_reload_value;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control_flag {
            self.linear_reload_flag = false;
        }
    }

    pub(crate) fn clock_half_frame(&mut self) {
        self.length_counter.clock();
    }

    // Called every CPU cycle; the sequencer only advances while both the
    // length and linear counters are live, which is how the channel goes
    // silent (the output level holds rather than dropping to zero)
    pub(crate) fn tick_timer(&mut self) {
        if self.timer == 0 {
            self.timer = self.timer_period;
            if self.length_counter.counter() > 0 && self.linear_counter > 0 {
                self.sequencer_step = (self.sequencer_step + 1) % SEQUENCE_STEPS;
            }
        } else {
            self.timer -= 1;
        }
    }

    pub(crate) fn sample(&self) -> u8 {
        if self.sequencer_step < 16 {
            15 - self.sequencer_step
        } else {
            self.sequencer_step - 16
        }
    }
}
