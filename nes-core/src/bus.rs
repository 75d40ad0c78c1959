pub(crate) mod cartridge;

use crate::apu::ApuState;
use crate::bus::cartridge::Mapper;
use crate::input::{JoypadState, LatchedJoypadState};
use crate::num::GetBit;
use crate::ppu::PpuState;
use bincode::{Decode, Encode};

pub(crate) const CPU_RAM_MASK: u16 = 0x07FF;

pub(crate) const CPU_NMI_VECTOR: u16 = 0xFFFA;
pub(crate) const CPU_RESET_VECTOR: u16 = 0xFFFC;
pub(crate) const CPU_IRQ_VECTOR: u16 = 0xFFFE;

pub(crate) const CPU_STACK_START: u16 = 0x0100;

// Reads from $4016/$4017 only drive the low bits; the rest of the byte is
// whatever the data bus last held, which on this port reads back as $40.
const JOYPAD_OPEN_BUS: u8 = 0x40;

#[derive(Debug, Clone, Encode, Decode)]
struct JoypadPort {
    input: JoypadState,
    shift_register: LatchedJoypadState,
}

impl JoypadPort {
    fn new() -> Self {
        Self { input: JoypadState::new(), shift_register: LatchedJoypadState::default() }
    }

    fn latch(&mut self) {
        self.shift_register = self.input.latch();
    }

    fn read(&mut self, strobe: bool) -> u8 {
        let bit = if strobe {
            // While the strobe is held high the shift register continuously
            // reloads, so reads see the live A button.
            self.input.latch().next_bit()
        } else {
            let bit = self.shift_register.next_bit();
            self.shift_register = self.shift_register.shift();
            bit
        };

        bit | JOYPAD_OPEN_BUS
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Bus {
    mapper: Mapper,
    cpu_ram: [u8; 2048],
    joypads: [JoypadPort; 2],
    strobe: bool,
    open_bus: u8,
    pending_oam_dma: Option<u8>,
}

impl Bus {
    pub(crate) fn new(mapper: Mapper) -> Self {
        Self {
            mapper,
            cpu_ram: [0; 2048],
            joypads: [JoypadPort::new(), JoypadPort::new()],
            strobe: false,
            open_bus: 0xFF,
            pending_oam_dma: None,
        }
    }

    pub(crate) fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub(crate) fn mapper_mut(&mut self) -> &mut Mapper {
        &mut self.mapper
    }

    pub(crate) fn set_joypad_states(&mut self, p1: JoypadState, p2: JoypadState) {
        self.joypads[0].input = p1;
        self.joypads[1].input = p2;
    }

    pub(crate) fn take_pending_oam_dma(&mut self) -> Option<u8> {
        self.pending_oam_dma.take()
    }

    fn write_strobe(&mut self, value: u8) {
        let new_strobe = value.bit(0);
        if self.strobe && !new_strobe {
            for joypad in &mut self.joypads {
                joypad.latch();
            }
        }
        self.strobe = new_strobe;
    }
}

/// The CPU's view of the address space: RAM, PPU registers, APU/IO registers,
/// and the cartridge.
pub(crate) struct CpuBus<'a> {
    bus: &'a mut Bus,
    ppu: &'a mut PpuState,
    apu: &'a mut ApuState,
}

impl<'a> CpuBus<'a> {
    pub(crate) fn new(bus: &'a mut Bus, ppu: &'a mut PpuState, apu: &'a mut ApuState) -> Self {
        Self { bus, ppu, apu }
    }

    pub(crate) fn read_address(&mut self, address: u16) -> u8 {
        match address {
            0x0000..=0x1FFF => self.bus.cpu_ram[(address & CPU_RAM_MASK) as usize],
            0x2000..=0x3FFF => self.ppu.read_register(address, &mut self.bus.mapper),
            0x4015 => self.apu.read_status(),
            0x4016 => self.bus.joypads[0].read(self.bus.strobe),
            0x4017 => self.bus.joypads[1].read(self.bus.strobe),
            // The remaining $40xx registers are write-only or undecoded
            0x4000..=0x4014 | 0x4018..=0x401F => self.bus.open_bus,
            0x4020..=0xFFFF => self.bus.mapper.read_cpu_address(address),
        }
    }

    pub(crate) fn write_address(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => {
                self.bus.cpu_ram[(address & CPU_RAM_MASK) as usize] = value;
            }
            0x2000..=0x3FFF => {
                self.ppu.write_register(address, value, &mut self.bus.mapper);
            }
            0x4014 => {
                self.bus.pending_oam_dma = Some(value);
            }
            0x4016 => {
                self.bus.write_strobe(value);
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => {
                self.apu.write_register(address, value);
            }
            0x4018..=0x401F => {}
            0x4020..=0xFFFF => {
                self.bus.mapper.write_cpu_address(address, value);
            }
        }
    }

    pub(crate) fn read_address_u16(&mut self, address: u16) -> u16 {
        let lsb = self.read_address(address);
        let msb = self.read_address(address.wrapping_add(1));
        u16::from_le_bytes([lsb, msb])
    }
}
