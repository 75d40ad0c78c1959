use crate::bus::cartridge::Mapper;
use bincode::{Decode, Encode};

// NTSC rate table, in CPU cycles per output bit
const DMC_PERIODS: [u16; 16] =
    [428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54];

/// The delta modulation channel: a memory reader feeding a 1-bit shift
/// register that nudges a 7-bit output level up or down.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct DmcChannel {
    irq_enabled: bool,
    loop_flag: bool,
    timer: u16,
    timer_period: u16,
    output_level: u8,
    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    bytes_remaining: u16,
    sample_buffer: Option<u8>,
    shift_register: u8,
    bits_remaining: u8,
    silence: bool,
}

impl DmcChannel {
    pub(crate) fn new() -> Self {
        Self {
            irq_enabled: false,
            loop_flag: false,
            timer: 0,
            timer_period: DMC_PERIODS[0],
            output_level: 0,
            sample_address: 0xC000,
            sample_length: 1,
            current_address: 0xC000,
            bytes_remaining: 0,
            sample_buffer: None,
            shift_register: 0,
            bits_remaining: 8,
            silence: true,
        }
    }

    pub(crate) fn write_control(&mut self, value: u8) {
        self.irq_enabled = value & 0x80 != 0;
        self.loop_flag = value & 0x40 != 0;
        self.timer_period = DMC_PERIODS[(value & 0x0F) as usize];
    }

    pub(crate) fn write_direct_load(&mut self, value: u8) {
        self.output_level = value & 0x7F;
    }

    pub(crate) fn write_sample_address(&mut self, value: u8) {
        self.sample_address = 0xC000 + u16::from(value) * 64;
    }

    pub(crate) fn write_sample_length(&mut self, value: u8) {
        self.sample_length = u16::from(value) * 16 + 1;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.restart_sample();
        }
    }

    pub(crate) fn bytes_remaining(&self) -> u16 {
        self.bytes_remaining
    }

    pub(crate) fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    fn restart_sample(&mut self) {
        self.current_address = self.sample_address;
        self.bytes_remaining = self.sample_length;
    }

    fn fill_sample_buffer(&mut self, mapper: &mut Mapper) {
        if self.sample_buffer.is_some() || self.bytes_remaining == 0 {
            return;
        }

        self.sample_buffer = Some(mapper.read_cpu_address(self.current_address));
        // The reader wraps from the top of memory back to $8000
        self.current_address =
            if self.current_address == 0xFFFF { 0x8000 } else { self.current_address + 1 };
        self.bytes_remaining -= 1;

        if self.bytes_remaining == 0 && self.loop_flag {
            self.restart_sample();
        }
    }

    // Called every CPU cycle
    pub(crate) fn tick(&mut self, mapper: &mut Mapper) {
        self.fill_sample_buffer(mapper);

        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.timer_period.saturating_sub(1);

        if !self.silence {
            if self.shift_register & 1 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
        }
        self.shift_register >>= 1;

        self.bits_remaining -= 1;
        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            match self.sample_buffer.take() {
                Some(byte) => {
                    self.shift_register = byte;
                    self.silence = false;
                }
                None => {
                    self.silence = true;
                }
            }
        }
    }

    pub(crate) fn sample(&self) -> u8 {
        self.output_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dmc_with_rom() -> (DmcChannel, Mapper) {
        // $C000 maps to PRG offset $0000 in a 16KiB NROM image
        let mut prg_rom = vec![0; 16 * 1024];
        prg_rom[0] = 0xFF; // eight "up" deltas
        (DmcChannel::new(), Mapper::nrom_for_test(prg_rom))
    }

    #[test]
    fn direct_load_sets_output_level() {
        let (mut dmc, _mapper) = dmc_with_rom();

        dmc.write_direct_load(0xFF);
        assert_eq!(dmc.sample(), 0x7F);
    }

    #[test]
    fn enabling_restarts_an_empty_sample() {
        let (mut dmc, _mapper) = dmc_with_rom();

        dmc.write_sample_address(0x00);
        dmc.write_sample_length(0x01);
        dmc.set_enabled(true);
        assert_eq!(dmc.bytes_remaining(), 17);

        dmc.set_enabled(false);
        assert_eq!(dmc.bytes_remaining(), 0);
    }

    #[test]
    fn sample_playback_raises_output() {
        let (mut dmc, mut mapper) = dmc_with_rom();

        dmc.write_control(0x0F); // fastest rate
        dmc.write_sample_address(0x00);
        dmc.write_sample_length(0x00); // 1 byte
        dmc.set_enabled(true);

        // One byte of $FF: eight +2 deltas once the byte reaches the shift
        // register
        for _ in 0..(54 * 20) {
            dmc.tick(&mut mapper);
        }
        assert_eq!(dmc.sample(), 16);
        assert_eq!(dmc.bytes_remaining(), 0);
    }
}
