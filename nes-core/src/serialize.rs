//! Save-state serialization: a small versioned header followed by the four
//! subsystem states. ROM contents are deliberately excluded; on load they
//! are moved over from the live cartridge.

use crate::apu::ApuState;
use crate::bus::Bus;
use crate::cpu::CpuState;
use crate::ppu::PpuState;
use bincode::config::{self, Configuration};
use bincode::error::{DecodeError, EncodeError};
use std::io;
use thiserror::Error;

const MAGIC: [u8; 8] = *b"NESSTATE";
const VERSION: u32 = 1;

fn bincode_config() -> Configuration {
    config::standard()
}

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("error serializing state: {source}")]
    Encode {
        #[from]
        source: EncodeError,
    },
    #[error("error deserializing state: {source}")]
    Decode {
        #[from]
        source: DecodeError,
    },
    #[error("not a save state file")]
    Format,
    #[error("unsupported save state version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub(crate) struct EmulationState {
    pub(crate) bus: Bus,
    pub(crate) cpu: CpuState,
    pub(crate) ppu: PpuState,
    pub(crate) apu: ApuState,
}

pub(crate) fn save_state<W: io::Write>(
    bus: &Bus,
    cpu: &CpuState,
    ppu: &PpuState,
    apu: &ApuState,
    mut writer: W,
) -> Result<(), SaveStateError> {
    let config = bincode_config();

    bincode::encode_into_std_write(MAGIC, &mut writer, config)?;
    bincode::encode_into_std_write(VERSION, &mut writer, config)?;
    bincode::encode_into_std_write(bus, &mut writer, config)?;
    bincode::encode_into_std_write(cpu, &mut writer, config)?;
    bincode::encode_into_std_write(ppu, &mut writer, config)?;
    bincode::encode_into_std_write(apu, &mut writer, config)?;

    Ok(())
}

pub(crate) fn load_state<R: io::Read>(mut reader: R) -> Result<EmulationState, SaveStateError> {
    let config = bincode_config();

    let magic: [u8; 8] = bincode::decode_from_std_read(&mut reader, config)?;
    if magic != MAGIC {
        return Err(SaveStateError::Format);
    }

    let version: u32 = bincode::decode_from_std_read(&mut reader, config)?;
    if version != VERSION {
        return Err(SaveStateError::UnsupportedVersion { version });
    }

    let bus: Bus = bincode::decode_from_std_read(&mut reader, config)?;
    let cpu: CpuState = bincode::decode_from_std_read(&mut reader, config)?;
    let ppu: PpuState = bincode::decode_from_std_read(&mut reader, config)?;
    let apu: ApuState = bincode::decode_from_std_read(&mut reader, config)?;

    Ok(EmulationState { bus, cpu, ppu, apu })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::cartridge::Mapper;
    use crate::bus::CpuBus;

    fn new_components() -> (Bus, CpuState, PpuState, ApuState) {
        let mut prg_rom = vec![0; 16 * 1024];
        prg_rom[0x3FFD] = 0x80;

        let mut bus = Bus::new(Mapper::nrom_for_test(prg_rom));
        let mut ppu = PpuState::new();
        let mut apu = ApuState::new();
        let cpu = {
            let mut cpu_bus = CpuBus::new(&mut bus, &mut ppu, &mut apu);
            CpuState::new(&mut cpu_bus)
        };

        (bus, cpu, ppu, apu)
    }

    #[test]
    fn round_trip_preserves_state() {
        let (mut bus, mut cpu, mut ppu, mut apu) = new_components();

        {
            let mut cpu_bus = CpuBus::new(&mut bus, &mut ppu, &mut apu);
            cpu_bus.write_address(0x0123, 0xAB);
        }
        cpu.registers.accumulator = 0x42;
        cpu.add_cycles(100);

        let mut blob = Vec::new();
        save_state(&bus, &cpu, &ppu, &apu, &mut blob).unwrap();

        let mut state = load_state(blob.as_slice()).unwrap();
        assert_eq!(state.cpu.registers.accumulator, 0x42);
        assert_eq!(state.cpu.cycles(), cpu.cycles());

        let mut cpu_bus = CpuBus::new(&mut state.bus, &mut state.ppu, &mut state.apu);
        assert_eq!(cpu_bus.read_address(0x0123), 0xAB);
    }

    #[test]
    fn rom_bytes_are_not_serialized() {
        let (bus, cpu, ppu, apu) = new_components();
        let mut blob = Vec::new();
        save_state(&bus, &cpu, &ppu, &apu, &mut blob).unwrap();

        // A much larger PRG ROM must not change the blob size
        let big_bus = Bus::new(Mapper::nrom_for_test(vec![0; 512 * 1024]));
        let mut big_blob = Vec::new();
        save_state(&big_bus, &cpu, &ppu, &apu, &mut big_blob).unwrap();
        assert_eq!(blob.len(), big_blob.len());

        // Loaded state reads open bus from PRG until ROM is moved in
        let mut state = load_state(blob.as_slice()).unwrap();
        assert_eq!(state.bus.mapper_mut().read_cpu_address(0xFFFD), 0xFF);
    }

    #[test]
    fn moving_rom_restores_cartridge_reads() {
        let (mut bus, cpu, ppu, apu) = new_components();

        let mut blob = Vec::new();
        save_state(&bus, &cpu, &ppu, &apu, &mut blob).unwrap();

        let mut state = load_state(blob.as_slice()).unwrap();
        state.bus.mapper_mut().move_rom_from(bus.mapper_mut());
        assert_eq!(state.bus.mapper_mut().read_cpu_address(0xFFFD), 0x80);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let (bus, cpu, ppu, apu) = new_components();

        let mut blob = Vec::new();
        save_state(&bus, &cpu, &ppu, &apu, &mut blob).unwrap();
        blob[0] = b'X';

        assert!(matches!(load_state(blob.as_slice()), Err(SaveStateError::Format)));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let (bus, cpu, ppu, apu) = new_components();

        let mut blob = Vec::new();
        save_state(&bus, &cpu, &ppu, &apu, &mut blob).unwrap();
        // Bump the version field just past the magic
        blob[8] = 0xEE;

        assert!(matches!(
            load_state(blob.as_slice()),
            Err(SaveStateError::UnsupportedVersion { .. })
        ));
    }
}
