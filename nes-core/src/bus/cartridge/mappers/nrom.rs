use crate::bus::cartridge::mappers::{ChrType, CpuMapResult, NametableMirroring, PpuMapResult};
use crate::bus::cartridge::MapperImpl;
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct Nrom {
    chr_type: ChrType,
    nametable_mirroring: NametableMirroring,
}

impl Nrom {
    pub(crate) fn new(chr_type: ChrType, nametable_mirroring: NametableMirroring) -> Self {
        Self { chr_type, nametable_mirroring }
    }
}

impl MapperImpl<Nrom> {
    fn map_cpu_address(&self, address: u16) -> CpuMapResult {
        match address {
            0x0000..=0x401F => panic!("invalid CPU map address: 0x{address:04X}"),
            0x4020..=0x5FFF => CpuMapResult::None,
            0x6000..=0x7FFF => CpuMapResult::PrgRAM(u32::from(address - 0x6000)),
            // A single 16KiB bank mirrors to fill the 32KiB window; the
            // cartridge wraps the offset to the PRG ROM length
            0x8000..=0xFFFF => CpuMapResult::PrgROM(u32::from(address - 0x8000)),
        }
    }

    pub(crate) fn read_cpu_address(&self, address: u16) -> u8 {
        self.map_cpu_address(address).read(&self.cartridge)
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        self.map_cpu_address(address).write(value, &mut self.cartridge);
    }

    fn map_ppu_address(&self, address: u16) -> PpuMapResult {
        match address {
            0x0000..=0x1FFF => self.data.chr_type.to_map_result(address.into()),
            0x2000..=0x3EFF => {
                PpuMapResult::Vram(self.data.nametable_mirroring.map_to_vram(address))
            }
            _ => panic!("invalid PPU map address: 0x{address:04X}"),
        }
    }

    pub(crate) fn read_ppu_address(&self, address: u16, vram: &[u8; 2048]) -> u8 {
        self.map_ppu_address(address).read(&self.cartridge, vram)
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8, vram: &mut [u8; 2048]) {
        self.map_ppu_address(address).write(value, &mut self.cartridge, vram);
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::cartridge::Mapper;

    #[test]
    fn single_bank_prg_mirrors() {
        let mut prg_rom = vec![0; 16 * 1024];
        prg_rom[0x0000] = 0xAB;
        prg_rom[0x3FFF] = 0xCD;

        let mut mapper = Mapper::nrom_for_test(prg_rom);

        assert_eq!(mapper.read_cpu_address(0x8000), 0xAB);
        assert_eq!(mapper.read_cpu_address(0xC000), 0xAB);
        assert_eq!(mapper.read_cpu_address(0xBFFF), 0xCD);
        assert_eq!(mapper.read_cpu_address(0xFFFF), 0xCD);
    }

    #[test]
    fn prg_ram_window() {
        let mut mapper = Mapper::nrom_for_test(vec![0; 16 * 1024]);

        mapper.write_cpu_address(0x6000, 0x12);
        mapper.write_cpu_address(0x7FFF, 0x34);

        assert_eq!(mapper.read_cpu_address(0x6000), 0x12);
        assert_eq!(mapper.read_cpu_address(0x7FFF), 0x34);
    }

    #[test]
    fn chr_ram_is_writable() {
        let mut mapper = Mapper::nrom_for_test(vec![0; 16 * 1024]);
        let mut vram = [0; 2048];

        mapper.write_ppu_address(0x1234, 0x56, &mut vram);
        assert_eq!(mapper.read_ppu_address(0x1234, &vram), 0x56);
    }

    #[test]
    fn unmapped_cpu_range_reads_open() {
        let mut mapper = Mapper::nrom_for_test(vec![0; 16 * 1024]);
        assert_eq!(mapper.read_cpu_address(0x4020), 0xFF);
        assert_eq!(mapper.read_cpu_address(0x5FFF), 0xFF);
    }
}
