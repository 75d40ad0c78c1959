mod mappers;

use crate::bus::cartridge::mappers::{ChrType, Mmc3, NametableMirroring, Nrom};
use crate::num::GetBit;
use bincode::{Decode, Encode};
use thiserror::Error;

const PRG_BANK_SIZE: usize = 16 * 1024;
const CHR_BANK_SIZE: usize = 8 * 1024;
const PRG_RAM_SIZE: usize = 8 * 1024;
const CHR_RAM_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub(crate) struct Cartridge {
    prg_rom: Vec<u8>,
    prg_ram: Vec<u8>,
    chr_rom: Vec<u8>,
    chr_ram: Vec<u8>,
    has_ram_battery: bool,
}

// Encode/Decode are implemented by hand so that save states do not contain
// the ROM bytes; they are moved over from the live cartridge on load.
impl Encode for Cartridge {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        self.prg_ram.encode(encoder)?;
        self.chr_ram.encode(encoder)?;
        self.has_ram_battery.encode(encoder)?;

        Ok(())
    }
}

impl<Context> Decode<Context> for Cartridge {
    fn decode<D: bincode::de::Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        let prg_ram = Decode::decode(decoder)?;
        let chr_ram = Decode::decode(decoder)?;
        let has_ram_battery = Decode::decode(decoder)?;

        Ok(Self { prg_rom: Vec::new(), prg_ram, chr_rom: Vec::new(), chr_ram, has_ram_battery })
    }
}

bincode::impl_borrow_decode!(Cartridge);

impl Cartridge {
    fn get_prg_rom(&self, address: u32) -> u8 {
        if self.prg_rom.is_empty() {
            return 0xFF;
        }
        self.prg_rom[address as usize % self.prg_rom.len()]
    }

    fn get_prg_ram(&self, address: u32) -> u8 {
        if self.prg_ram.is_empty() {
            return 0xFF;
        }
        self.prg_ram[address as usize % self.prg_ram.len()]
    }

    fn set_prg_ram(&mut self, address: u32, value: u8) {
        if self.prg_ram.is_empty() {
            return;
        }
        let len = self.prg_ram.len();
        self.prg_ram[address as usize % len] = value;
    }

    fn get_chr_rom(&self, address: u32) -> u8 {
        if self.chr_rom.is_empty() {
            return 0xFF;
        }
        self.chr_rom[address as usize % self.chr_rom.len()]
    }

    fn get_chr_ram(&self, address: u32) -> u8 {
        if self.chr_ram.is_empty() {
            return 0xFF;
        }
        self.chr_ram[address as usize % self.chr_ram.len()]
    }

    fn set_chr_ram(&mut self, address: u32, value: u8) {
        if self.chr_ram.is_empty() {
            return;
        }
        let len = self.chr_ram.len();
        self.chr_ram[address as usize % len] = value;
    }

    fn take_rom(&mut self) -> (Vec<u8>, Vec<u8>) {
        (std::mem::take(&mut self.prg_rom), std::mem::take(&mut self.chr_rom))
    }

    fn restore_rom(&mut self, prg_rom: Vec<u8>, chr_rom: Vec<u8>) {
        self.prg_rom = prg_rom;
        self.chr_rom = chr_rom;
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct MapperImpl<MapperData> {
    cartridge: Cartridge,
    data: MapperData,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) enum Mapper {
    Nrom(MapperImpl<Nrom>),
    Mmc3(MapperImpl<Mmc3>),
}

impl Mapper {
    /// User-readable board name, only used for logging.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Nrom(..) => "NROM",
            Self::Mmc3(..) => "MMC3",
        }
    }

    pub(crate) fn read_cpu_address(&mut self, address: u16) -> u8 {
        match self {
            Self::Nrom(nrom) => nrom.read_cpu_address(address),
            Self::Mmc3(mmc3) => mmc3.read_cpu_address(address),
        }
    }

    pub(crate) fn write_cpu_address(&mut self, address: u16, value: u8) {
        match self {
            Self::Nrom(nrom) => nrom.write_cpu_address(address, value),
            Self::Mmc3(mmc3) => mmc3.write_cpu_address(address, value),
        }
    }

    pub(crate) fn read_ppu_address(&mut self, address: u16, vram: &[u8; 2048]) -> u8 {
        match self {
            Self::Nrom(nrom) => nrom.read_ppu_address(address, vram),
            Self::Mmc3(mmc3) => mmc3.read_ppu_address(address, vram),
        }
    }

    pub(crate) fn write_ppu_address(&mut self, address: u16, value: u8, vram: &mut [u8; 2048]) {
        match self {
            Self::Nrom(nrom) => nrom.write_ppu_address(address, value, vram),
            Self::Mmc3(mmc3) => mmc3.write_ppu_address(address, value, vram),
        }
    }

    /// Per-PPU-dot processing; used by boards that watch the A12 line.
    pub(crate) fn tick(&mut self) {
        if let Self::Mmc3(mmc3) = self {
            mmc3.tick();
        }
    }

    /// Whether the board is currently asserting its IRQ line.
    pub(crate) fn interrupt_flag(&self) -> bool {
        match self {
            Self::Nrom(..) => false,
            Self::Mmc3(mmc3) => mmc3.interrupt_flag(),
        }
    }

    /// Restore the board's power-on register state. Cartridge RAM contents
    /// are preserved.
    pub(crate) fn reset(&mut self) {
        if let Self::Mmc3(mmc3) = self {
            mmc3.reset();
        }
    }

    fn cartridge_mut(&mut self) -> &mut Cartridge {
        match self {
            Self::Nrom(nrom) => &mut nrom.cartridge,
            Self::Mmc3(mmc3) => &mut mmc3.cartridge,
        }
    }

    /// Move the ROM buffers out of `other` into `self`. Used when loading
    /// save states, which deliberately do not contain ROM bytes.
    pub(crate) fn move_rom_from(&mut self, other: &mut Mapper) {
        let (prg_rom, chr_rom) = other.cartridge_mut().take_rom();
        self.cartridge_mut().restore_rom(prg_rom, chr_rom);
    }

    #[cfg(test)]
    pub(crate) fn nrom_for_test(prg_rom: Vec<u8>) -> Self {
        Self::Nrom(MapperImpl {
            cartridge: Cartridge {
                prg_rom,
                prg_ram: vec![0; PRG_RAM_SIZE],
                chr_rom: Vec::new(),
                chr_ram: vec![0; CHR_RAM_SIZE],
                has_ram_battery: false,
            },
            data: Nrom::new(ChrType::RAM, NametableMirroring::Horizontal),
        })
    }

    #[cfg(test)]
    pub(crate) fn mmc3_for_test(prg_rom: Vec<u8>) -> Self {
        let prg_rom_len = prg_rom.len() as u32;
        Self::Mmc3(MapperImpl {
            cartridge: Cartridge {
                prg_rom,
                prg_ram: vec![0; PRG_RAM_SIZE],
                chr_rom: Vec::new(),
                chr_ram: vec![0; CHR_RAM_SIZE],
                has_ram_battery: false,
            },
            data: Mmc3::new(
                ChrType::RAM,
                prg_rom_len,
                CHR_RAM_SIZE as u32,
                NametableMirroring::Vertical,
            ),
        })
    }
}

#[derive(Debug, Error)]
pub enum CartridgeFileError {
    #[error("invalid or unsupported file format")]
    Format,
    #[error("file is shorter than the header-declared PRG/CHR size")]
    Truncated,
    #[error("unsupported mapper: {mapper_number}")]
    UnsupportedMapper { mapper_number: u8 },
}

#[derive(Debug, Clone)]
struct INesHeader {
    mapper_number: u8,
    prg_rom_size: usize,
    chr_rom_size: usize,
    chr_type: ChrType,
    nametable_mirroring: NametableMirroring,
    has_trainer: bool,
    has_battery: bool,
}

impl INesHeader {
    fn parse_from_file(file_bytes: &[u8]) -> Result<Self, CartridgeFileError> {
        if file_bytes.len() < 16 {
            return Err(CartridgeFileError::Format);
        }
        let header = &file_bytes[..16];

        // "NES" followed by the character MS-DOS used for EOF
        if header[..4] != [0x4E, 0x45, 0x53, 0x1A] {
            return Err(CartridgeFileError::Format);
        }

        let prg_rom_size = PRG_BANK_SIZE * usize::from(header[4]);
        let chr_rom_size = CHR_BANK_SIZE * usize::from(header[5]);

        let mapper_number = (header[7] & 0xF0) | (header[6] >> 4);

        let chr_type = if chr_rom_size == 0 { ChrType::RAM } else { ChrType::ROM };

        let nametable_mirroring = if header[6].bit(0) {
            NametableMirroring::Vertical
        } else {
            NametableMirroring::Horizontal
        };

        Ok(Self {
            mapper_number,
            prg_rom_size,
            chr_rom_size,
            chr_type,
            nametable_mirroring,
            has_trainer: header[6].bit(2),
            has_battery: header[6].bit(1),
        })
    }
}

/// Parse cartridge data out of an iNES file and construct the matching
/// mapper.
///
/// # Errors
///
/// Returns an error if the bytes do not look like an iNES file, the file is
/// shorter than the header claims, or the mapper is not supported.
pub(crate) fn from_ines_file(file_bytes: &[u8]) -> Result<Mapper, CartridgeFileError> {
    let header = INesHeader::parse_from_file(file_bytes)?;

    // Header is 16 bytes, trainer (when present) is 512 bytes and skipped
    let prg_rom_start = if header.has_trainer { 16 + 512 } else { 16 };
    let prg_rom_end = prg_rom_start + header.prg_rom_size;
    let chr_rom_end = prg_rom_end + header.chr_rom_size;

    if file_bytes.len() < chr_rom_end || header.prg_rom_size == 0 {
        return Err(CartridgeFileError::Truncated);
    }

    let prg_rom = Vec::from(&file_bytes[prg_rom_start..prg_rom_end]);
    let chr_rom = Vec::from(&file_bytes[prg_rom_end..chr_rom_end]);

    let chr_ram = match header.chr_type {
        ChrType::RAM => vec![0; CHR_RAM_SIZE],
        ChrType::ROM => Vec::new(),
    };
    let chr_len = match header.chr_type {
        ChrType::ROM => header.chr_rom_size,
        ChrType::RAM => CHR_RAM_SIZE,
    };

    let cartridge = Cartridge {
        prg_rom,
        prg_ram: vec![0; PRG_RAM_SIZE],
        chr_rom,
        chr_ram,
        has_ram_battery: header.has_battery,
    };

    let mapper = match header.mapper_number {
        0 => Mapper::Nrom(MapperImpl {
            cartridge,
            data: Nrom::new(header.chr_type, header.nametable_mirroring),
        }),
        4 => Mapper::Mmc3(MapperImpl {
            cartridge,
            data: Mmc3::new(
                header.chr_type,
                header.prg_rom_size as u32,
                chr_len as u32,
                header.nametable_mirroring,
            ),
        }),
        _ => {
            return Err(CartridgeFileError::UnsupportedMapper {
                mapper_number: header.mapper_number,
            });
        }
    };

    log::info!("Mapper number: {} ({})", header.mapper_number, mapper.name());
    log::info!("PRG ROM size: {}", header.prg_rom_size);
    log::info!("CHR ROM size: {}", header.chr_rom_size);
    log::info!("CHR memory type: {:?}", header.chr_type);
    log::info!("Battery-backed PRG RAM: {}", header.has_battery);
    log::debug!("Hardwired nametable mirroring: {:?}", header.nametable_mirroring);

    Ok(mapper)
}
