mod mmc3;
mod nrom;

use crate::bus::cartridge::Cartridge;
use bincode::{Decode, Encode};

pub(crate) use mmc3::Mmc3;
pub(crate) use nrom::Nrom;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum ChrType {
    ROM,
    RAM,
}

impl ChrType {
    fn to_map_result(self, address: u32) -> PpuMapResult {
        match self {
            Self::ROM => PpuMapResult::ChrROM(address),
            Self::RAM => PpuMapResult::ChrRAM(address),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub(crate) enum NametableMirroring {
    Horizontal,
    Vertical,
}

impl NametableMirroring {
    fn map_to_vram(self, address: u16) -> u16 {
        debug_assert!((0x2000..=0x3EFF).contains(&address));

        let relative_addr = address & 0x0FFF;

        match self {
            // NT0/NT1 -> bank 0, NT2/NT3 -> bank 1
            Self::Horizontal => ((relative_addr & 0x0800) >> 1) | (relative_addr & 0x03FF),
            // NT0/NT2 -> bank 0, NT1/NT3 -> bank 1
            Self::Vertical => relative_addr & 0x07FF,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum CpuMapResult {
    PrgROM(u32),
    PrgRAM(u32),
    None,
}

impl CpuMapResult {
    fn read(self, cartridge: &Cartridge) -> u8 {
        match self {
            Self::PrgROM(address) => cartridge.get_prg_rom(address),
            Self::PrgRAM(address) => cartridge.get_prg_ram(address),
            Self::None => 0xFF,
        }
    }

    fn write(self, value: u8, cartridge: &mut Cartridge) {
        if let Self::PrgRAM(address) = self {
            cartridge.set_prg_ram(address, value);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum PpuMapResult {
    ChrROM(u32),
    ChrRAM(u32),
    Vram(u16),
}

impl PpuMapResult {
    fn read(self, cartridge: &Cartridge, vram: &[u8; 2048]) -> u8 {
        match self {
            Self::ChrROM(address) => cartridge.get_chr_rom(address),
            Self::ChrRAM(address) => cartridge.get_chr_ram(address),
            Self::Vram(address) => vram[address as usize],
        }
    }

    fn write(self, value: u8, cartridge: &mut Cartridge, vram: &mut [u8; 2048]) {
        match self {
            Self::ChrROM(..) => {}
            Self::ChrRAM(address) => {
                cartridge.set_chr_ram(address, value);
            }
            Self::Vram(address) => {
                vram[address as usize] = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_mirroring_banks() {
        let m = NametableMirroring::Horizontal;

        // NT0 and NT1 alias bank 0
        assert_eq!(m.map_to_vram(0x2000), 0x0000);
        assert_eq!(m.map_to_vram(0x2400), 0x0000);
        assert_eq!(m.map_to_vram(0x2523), 0x0123);

        // NT2 and NT3 alias bank 1
        assert_eq!(m.map_to_vram(0x2800), 0x0400);
        assert_eq!(m.map_to_vram(0x2C00), 0x0400);
        assert_eq!(m.map_to_vram(0x2FFF), 0x07FF);
    }

    #[test]
    fn vertical_mirroring_banks() {
        let m = NametableMirroring::Vertical;

        // NT0 and NT2 alias bank 0
        assert_eq!(m.map_to_vram(0x2000), 0x0000);
        assert_eq!(m.map_to_vram(0x2800), 0x0000);

        // NT1 and NT3 alias bank 1
        assert_eq!(m.map_to_vram(0x2400), 0x0400);
        assert_eq!(m.map_to_vram(0x2C00), 0x0400);
    }
}
