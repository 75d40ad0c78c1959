//! The audio processing unit: two pulse channels, triangle, noise, DMC, the
//! frame counter driving envelope/length/sweep clocks, and the nonlinear
//! mixer producing samples at the host rate.

mod dmc;
mod noise;
mod pulse;
mod triangle;
mod units;

use crate::apu::dmc::DmcChannel;
use crate::apu::noise::NoiseChannel;
use crate::apu::pulse::{PulseChannel, SweepNegateBehavior};
use crate::apu::triangle::TriangleChannel;
use crate::audio::{SampleClock, SampleQueue};
use crate::bus::cartridge::Mapper;
use bincode::{Decode, Encode};

// The frame counter divides the CPU clock down to ~240Hz
const FRAME_COUNTER_PERIOD: u16 = 7457;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum FrameCounterMode {
    FourStep,
    FiveStep,
}

#[derive(Debug, Clone, Copy, Default)]
struct FrameClock {
    quarter: bool,
    half: bool,
    raise_irq: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
struct FrameCounter {
    cpu_ticks: u16,
    step: u8,
    mode: FrameCounterMode,
    interrupt_inhibit: bool,
}

impl FrameCounter {
    fn new() -> Self {
        Self {
            cpu_ticks: 0,
            step: 0,
            mode: FrameCounterMode::FourStep,
            interrupt_inhibit: false,
        }
    }

    /// Process a $4017 write. Returns true if an immediate quarter+half
    /// clock should fire (5-step mode does this on the mode write).
    fn write(&mut self, value: u8) -> bool {
        self.mode =
            if value & 0x80 != 0 { FrameCounterMode::FiveStep } else { FrameCounterMode::FourStep };
        self.interrupt_inhibit = value & 0x40 != 0;
        self.cpu_ticks = 0;
        self.step = 0;

        self.mode == FrameCounterMode::FiveStep
    }

    fn tick(&mut self) -> FrameClock {
        self.cpu_ticks += 1;
        if self.cpu_ticks < FRAME_COUNTER_PERIOD {
            return FrameClock::default();
        }
        self.cpu_ticks = 0;
        self.step += 1;

        match self.mode {
            FrameCounterMode::FourStep => {
                let last = self.step == 4;
                if last {
                    self.step = 0;
                }
                FrameClock {
                    quarter: true,
                    half: self.step == 2 || last,
                    raise_irq: last && !self.interrupt_inhibit,
                }
            }
            FrameCounterMode::FiveStep => {
                let last = self.step == 5;
                if last {
                    self.step = 0;
                }
                // Step 4 of the 5-step sequence clocks nothing
                FrameClock {
                    quarter: self.step != 4,
                    half: self.step == 2 || last,
                    raise_irq: false,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct ApuState {
    pulse1: PulseChannel,
    pulse2: PulseChannel,
    triangle: TriangleChannel,
    noise: NoiseChannel,
    dmc: DmcChannel,
    frame_counter: FrameCounter,
    frame_irq: bool,
    cpu_cycles: u64,
    sample_clock: SampleClock,
    sample_queue: SampleQueue,
}

impl ApuState {
    pub(crate) fn new() -> Self {
        Self {
            pulse1: PulseChannel::new(SweepNegateBehavior::OnesComplement),
            pulse2: PulseChannel::new(SweepNegateBehavior::TwosComplement),
            triangle: TriangleChannel::new(),
            noise: NoiseChannel::new(),
            dmc: DmcChannel::new(),
            frame_counter: FrameCounter::new(),
            frame_irq: false,
            cpu_cycles: 0,
            sample_clock: SampleClock::new(),
            sample_queue: SampleQueue::new(),
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn frame_irq_pending(&self) -> bool {
        self.frame_irq
    }

    pub(crate) fn sample_queue_mut(&mut self) -> &mut SampleQueue {
        &mut self.sample_queue
    }

    pub(crate) fn write_register(&mut self, address: u16, value: u8) {
        match address {
            0x4000 => self.pulse1.write_control(value),
            0x4001 => self.pulse1.write_sweep(value),
            0x4002 => self.pulse1.write_timer_lo(value),
            0x4003 => self.pulse1.write_timer_hi(value),
            0x4004 => self.pulse2.write_control(value),
            0x4005 => self.pulse2.write_sweep(value),
            0x4006 => self.pulse2.write_timer_lo(value),
            0x4007 => self.pulse2.write_timer_hi(value),
            0x4008 => self.triangle.write_linear(value),
            0x400A => self.triangle.write_timer_lo(value),
            0x400B => self.triangle.write_timer_hi(value),
            0x400C => self.noise.write_control(value),
            0x400E => self.noise.write_period(value),
            0x400F => self.noise.write_length(value),
            0x4010 => self.dmc.write_control(value),
            0x4011 => self.dmc.write_direct_load(value),
            0x4012 => self.dmc.write_sample_address(value),
            0x4013 => self.dmc.write_sample_length(value),
            0x4015 => {
                self.pulse1.set_enabled(value & 0x01 != 0);
                self.pulse2.set_enabled(value & 0x02 != 0);
                self.triangle.set_enabled(value & 0x04 != 0);
                self.noise.set_enabled(value & 0x08 != 0);
                self.dmc.set_enabled(value & 0x10 != 0);
                self.frame_irq = false;
            }
            0x4017 => {
                let immediate_clock = self.frame_counter.write(value);
                if self.frame_counter.interrupt_inhibit {
                    self.frame_irq = false;
                }
                if immediate_clock {
                    self.clock_quarter_frame();
                    self.clock_half_frame();
                }
            }
            _ => {}
        }
    }

    /// $4015 read: per-channel length status, DMC state, and the frame IRQ
    /// flag, which the read acknowledges.
    pub(crate) fn read_status(&mut self) -> u8 {
        let mut status = 0;
        if self.pulse1.length_counter() > 0 {
            status |= 0x01;
        }
        if self.pulse2.length_counter() > 0 {
            status |= 0x02;
        }
        if self.triangle.length_counter() > 0 {
            status |= 0x04;
        }
        if self.noise.length_counter() > 0 {
            status |= 0x08;
        }
        if self.dmc.bytes_remaining() > 0 {
            status |= 0x10;
        }
        if self.frame_irq {
            status |= 0x40;
        }
        if self.dmc.irq_enabled() {
            status |= 0x80;
        }

        self.frame_irq = false;
        status
    }

    fn clock_quarter_frame(&mut self) {
        self.pulse1.clock_quarter_frame();
        self.pulse2.clock_quarter_frame();
        self.triangle.clock_quarter_frame();
        self.noise.clock_quarter_frame();
    }

    fn clock_half_frame(&mut self) {
        self.pulse1.clock_half_frame();
        self.pulse2.clock_half_frame();
        self.triangle.clock_half_frame();
        self.noise.clock_half_frame();
    }

    /// Advance by one CPU cycle.
    pub(crate) fn tick(&mut self, mapper: &mut Mapper) {
        // Pulse and noise timers run at half the CPU rate; the triangle
        // timer at the full rate
        if self.cpu_cycles % 2 == 0 {
            self.pulse1.tick_timer();
            self.pulse2.tick_timer();
            self.noise.tick_timer();
        }
        self.triangle.tick_timer();
        self.dmc.tick(mapper);
        self.cpu_cycles += 1;

        let clock = self.frame_counter.tick();
        if clock.quarter {
            self.clock_quarter_frame();
        }
        if clock.half {
            self.clock_half_frame();
        }
        if clock.raise_irq {
            self.frame_irq = true;
        }

        if self.sample_clock.tick() {
            let sample = self.mix_sample();
            self.sample_queue.push(sample);
        }
    }

    fn mix_sample(&self) -> f32 {
        let pulse1 = f32::from(self.pulse1.sample());
        let pulse2 = f32::from(self.pulse2.sample());
        let triangle = f32::from(self.triangle.sample());
        let noise = f32::from(self.noise.sample());
        let dmc = f32::from(self.dmc.sample());

        let pulse_mix = if pulse1 > 0.0 || pulse2 > 0.0 {
            95.88 / (8128.0 / (pulse1 + pulse2) + 100.0)
        } else {
            0.0
        };

        let tnd_mix = if triangle > 0.0 || noise > 0.0 || dmc > 0.0 {
            159.79 / (1.0 / (triangle / 8227.0 + noise / 12241.0 + dmc / 22638.0) + 100.0)
        } else {
            0.0
        };

        pulse_mix + tnd_mix
    }
}
