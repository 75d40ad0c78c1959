use crate::apu::units::{Envelope, LengthCounter};
use bincode::{Decode, Encode};

const DUTY_WAVEFORMS: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum SweepNegateBehavior {
    // Pulse 1 subtracts one extra; pulse 2 does a plain two's complement
    OnesComplement,
    TwosComplement,
}

impl SweepNegateBehavior {
    fn negate(self, value: u16) -> u16 {
        match self {
            Self::OnesComplement => !value,
            Self::TwosComplement => (!value).wrapping_add(1),
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
struct Sweep {
    enabled: bool,
    divider: u8,
    divider_period: u8,
    negate: bool,
    negate_behavior: SweepNegateBehavior,
    shift: u8,
    reload_flag: bool,
}

impl Sweep {
    fn new(negate_behavior: SweepNegateBehavior) -> Self {
        Self {
            enabled: false,
            divider: 0,
            divider_period: 0,
            negate: false,
            negate_behavior,
            shift: 0,
            reload_flag: false,
        }
    }

    fn write_register(&mut self, value: u8) {
        self.enabled = value & 0x80 != 0;
        self.divider_period = (value >> 4) & 0x07;
        self.negate = value & 0x08 != 0;
        self.shift = value & 0x07;
        self.reload_flag = true;
    }

    fn target_period(&self, timer_period: u16) -> u16 {
        let change = timer_period >> self.shift;
        let signed_change =
            if self.negate { self.negate_behavior.negate(change) } else { change };
        timer_period.wrapping_add(signed_change)
    }

    fn mutes_channel(&self, timer_period: u16) -> bool {
        timer_period < 8 || self.target_period(timer_period) > 0x07FF
    }

    fn clock(&mut self, timer_period: &mut u16) {
        if self.divider == 0 && self.enabled && self.shift > 0 && !self.mutes_channel(*timer_period)
        {
            *timer_period = self.target_period(*timer_period);
        }

        if self.divider == 0 || self.reload_flag {
            self.divider = self.divider_period;
            self.reload_flag = false;
        } else {
            self.divider -= 1;
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct PulseChannel {
    duty_cycle: u8,
    duty_step: u8,
    timer: u16,
    timer_period: u16,
    length_counter: LengthCounter,
    envelope: Envelope,
    sweep: Sweep,
}

impl PulseChannel {
    pub(crate) fn new(negate_behavior: SweepNegateBehavior) -> Self {
        Self {
            duty_cycle: 0,
            duty_step: 0,
            timer: 0,
            timer_period: 0,
            length_counter: LengthCounter::new(),
            envelope: Envelope::new(),
            sweep: Sweep::new(negate_behavior),
        }
    }

    pub(crate) fn write_control(&mut self, value: u8) {
        self.duty_cycle = value >> 6;
        self.length_counter.set_halted(value & 0x20 != 0);
        self.envelope.write_control(value);
    }

    pub(crate) fn write_sweep(&mut self, value: u8) {
        self.sweep.write_register(value);
    }

    pub(crate) fn write_timer_lo(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0xFF00) | u16::from(value);
    }

    pub(crate) fn write_timer_hi(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | (u16::from(value & 0x07) << 8);
        self.length_counter.load(value);
        self.envelope.restart();
        self.duty_step = 0;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.length_counter.set_enabled(enabled);
    }

    pub(crate) fn length_counter(&self) -> u8 {
        self.length_counter.counter()
    }

    pub(crate) fn clock_quarter_frame(&mut self) {
        self.envelope.clock();
    }

    pub(crate) fn clock_half_frame(&mut self) {
        self.length_counter.clock();
        self.sweep.clock(&mut self.timer_period);
    }

    // Called every other CPU cycle
    pub(crate) fn tick_timer(&mut self) {
        if self.timer == 0 {
            self.timer = self.timer_period;
            self.duty_step = (self.duty_step + 1) & 0x07;
        } else {
            self.timer -= 1;
        }
    }

    pub(crate) fn sample(&self) -> u8 {
        if self.length_counter.counter() == 0 || self.sweep.mutes_channel(self.timer_period) {
            return 0;
        }

        DUTY_WAVEFORMS[self.duty_cycle as usize][self.duty_step as usize] * self.envelope.volume()
    }
}
