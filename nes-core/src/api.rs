use crate::apu::ApuState;
use crate::bus::cartridge::{self, CartridgeFileError};
use crate::bus::{Bus, CpuBus};
use crate::cpu::{self, trace, CpuState};
use crate::input::JoypadState;
use crate::ppu::{FrameBuffer, PpuState};
use crate::serialize::{self, SaveStateError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

pub trait Renderer {
    type Err;

    /// Present a completed frame. Called once per frame, on the rising edge
    /// of the PPU's frame-ready signal.
    ///
    /// The frame buffer is a 256x240 grid of ARGB8888 pixels. Implementations
    /// should assume the entire frame has changed on every call.
    ///
    /// # Errors
    ///
    /// Any error is propagated out of [`Emulator::run_frame`].
    fn render_frame(&mut self, frame_buffer: &FrameBuffer) -> Result<(), Self::Err>;
}

pub trait AudioPlayer {
    type Err;

    /// Queue audio samples on the output device.
    ///
    /// Samples are mono 32-bit float PCM at 44100Hz.
    ///
    /// # Errors
    ///
    /// Any error is propagated out of [`Emulator::run_frame`].
    fn push_samples(&mut self, samples: &[f32]) -> Result<(), Self::Err>;
}

pub trait InputPoller {
    /// Retrieve the current player 1 input state.
    fn poll_p1_input(&self) -> JoypadState;

    /// Retrieve the current player 2 input state. Return
    /// `JoypadState::default()` if only one input device is desired.
    fn poll_p2_input(&self) -> JoypadState;
}

#[derive(Debug)]
pub enum EmulationError<RenderError, AudioError> {
    Render(RenderError),
    Audio(AudioError),
}

impl<R: Display, A: Display> Display for EmulationError<R, A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render(err) => write!(f, "Rendering error: {err}"),
            Self::Audio(err) => write!(f, "Audio error: {err}"),
        }
    }
}

impl<R: Error + 'static, A: Error + 'static> Error for EmulationError<R, A> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Render(err) => Some(err),
            Self::Audio(err) => Some(err),
        }
    }
}

// 256 byte transfers plus the read/write alignment cycle; one more when the
// transfer starts on an odd CPU cycle
const OAM_DMA_STALL_CYCLES: u64 = 513;

pub struct Emulator<R, A, I> {
    bus: Bus,
    cpu: CpuState,
    ppu: PpuState,
    apu: ApuState,
    renderer: R,
    audio_player: A,
    input_poller: I,
}

impl<R: Renderer, A: AudioPlayer, I: InputPoller> Emulator<R, A, I> {
    /// Create an emulator from iNES ROM bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be parsed as a supported iNES
    /// cartridge.
    pub fn create(
        rom_bytes: &[u8],
        renderer: R,
        audio_player: A,
        input_poller: I,
    ) -> Result<Self, CartridgeFileError> {
        let mapper = cartridge::from_ines_file(rom_bytes)?;
        let mut bus = Bus::new(mapper);
        let mut ppu = PpuState::new();
        let mut apu = ApuState::new();

        let cpu = {
            let mut cpu_bus = CpuBus::new(&mut bus, &mut ppu, &mut apu);
            CpuState::new(&mut cpu_bus)
        };

        let mut emulator =
            Self { bus, cpu, ppu, apu, renderer, audio_player, input_poller };

        // The PPU and APU run during the 7-cycle reset sequence
        emulator.tick_components(cpu::RESET_CYCLES as u32);

        Ok(emulator)
    }

    /// Re-initialize all four subsystems without reloading the cartridge.
    /// Cartridge RAM and console RAM survive, as they do on hardware.
    pub fn reset(&mut self) {
        self.ppu.reset();
        self.apu.reset();
        self.bus.mapper_mut().reset();

        {
            let mut cpu_bus = CpuBus::new(&mut self.bus, &mut self.ppu, &mut self.apu);
            self.cpu.reset(&mut cpu_bus);
        }

        self.tick_components(cpu::RESET_CYCLES as u32);
    }

    fn tick_components(&mut self, cpu_cycles: u32) {
        for _ in 0..cpu_cycles {
            for _ in 0..3 {
                self.ppu.tick(self.bus.mapper_mut());
                self.bus.mapper_mut().tick();
            }
            self.apu.tick(self.bus.mapper_mut());
        }
    }

    fn run_oam_dma(&mut self, page: u8) {
        let base_address = u16::from(page) << 8;

        {
            let mut cpu_bus = CpuBus::new(&mut self.bus, &mut self.ppu, &mut self.apu);
            for offset in 0..256 {
                let value = cpu_bus.read_address(base_address.wrapping_add(offset));
                cpu_bus.write_address(0x2004, value);
            }
        }

        let stall_cycles = OAM_DMA_STALL_CYCLES + u64::from(self.cpu.cycles() % 2 == 1);
        self.cpu.add_cycles(stall_cycles);
        self.tick_components(stall_cycles as u32);
    }

    /// Run one CPU instruction and fan its cycle count out to the PPU (3x)
    /// and APU (1x). Pending OAM-DMA stalls and interrupt entry sequences
    /// are serviced at this boundary first.
    pub fn step_instruction(&mut self) {
        if let Some(page) = self.bus.take_pending_oam_dma() {
            self.run_oam_dma(page);
        }

        if self.ppu.take_nmi_pending() {
            let cycles = {
                let mut cpu_bus = CpuBus::new(&mut self.bus, &mut self.ppu, &mut self.apu);
                cpu::nmi(&mut self.cpu, &mut cpu_bus)
            };
            self.tick_components(cycles);
        } else if self.apu.frame_irq_pending() || self.bus.mapper().interrupt_flag() {
            // Level-triggered: stays pending until acknowledged through the
            // owning device's register, and masked by the I flag
            let cycles = {
                let mut cpu_bus = CpuBus::new(&mut self.bus, &mut self.ppu, &mut self.apu);
                cpu::irq(&mut self.cpu, &mut cpu_bus)
            };
            if cycles > 0 {
                self.tick_components(cycles);
            }
        }

        let cycles = {
            let mut cpu_bus = CpuBus::new(&mut self.bus, &mut self.ppu, &mut self.apu);
            cpu::step(&mut self.cpu, &mut cpu_bus)
        };
        self.tick_components(cycles);
    }

    /// Run until the PPU completes the current frame, then deliver the frame
    /// buffer, drain the audio sample queue, and poll controller input.
    ///
    /// # Errors
    ///
    /// Propagates renderer and audio player failures.
    pub fn run_frame(&mut self) -> Result<(), EmulationError<R::Err, A::Err>> {
        while !self.ppu.frame_ready() {
            self.step_instruction();
        }
        self.ppu.clear_frame_ready();

        self.renderer
            .render_frame(self.ppu.frame_buffer())
            .map_err(EmulationError::Render)?;

        let sample_queue = self.apu.sample_queue_mut();
        if !sample_queue.is_empty() {
            let samples = sample_queue.drain();
            self.audio_player.push_samples(&samples).map_err(EmulationError::Audio)?;
        }

        let p1 = self.input_poller.poll_p1_input();
        let p2 = self.input_poller.poll_p2_input();
        self.bus.set_joypad_states(p1, p2);

        Ok(())
    }

    /// Overwrite the current controller state directly, bypassing the
    /// per-frame [`InputPoller`] refresh.
    pub fn set_joypad_states(&mut self, p1: JoypadState, p2: JoypadState) {
        self.bus.set_joypad_states(p1, p2);
    }

    /// Force the program counter, e.g. to enter a test ROM's automated mode.
    pub fn set_program_counter(&mut self, pc: u16) {
        self.cpu.registers.pc = pc;
    }

    /// Current PPU position as (scanline, dot).
    #[must_use]
    pub fn ppu_position(&self) -> (u16, u16) {
        (self.ppu.scanline(), self.ppu.dot())
    }

    /// Format the instruction at the current PC as a nestest-style trace
    /// line, without executing it.
    pub fn trace_line(&mut self) -> String {
        let scanline = self.ppu.scanline();
        let dot = self.ppu.dot();
        let cycles = self.cpu.cycles();

        let mut cpu_bus = CpuBus::new(&mut self.bus, &mut self.ppu, &mut self.apu);
        trace::trace_line(&self.cpu.registers, cycles, scanline, dot, &mut cpu_bus)
    }

    /// Serialize the emulation state (excluding ROM contents) to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying write fails.
    pub fn save_state<W: io::Write>(&self, writer: W) -> Result<(), SaveStateError> {
        serialize::save_state(&self.bus, &self.cpu, &self.ppu, &self.apu, writer)
    }

    /// Replace the emulation state with one previously saved. The loaded
    /// state takes ownership of the running cartridge's ROM buffers; on
    /// failure the running state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is not a compatible save state.
    pub fn load_state<Reader: io::Read>(&mut self, reader: Reader) -> Result<(), SaveStateError> {
        let mut state = serialize::load_state(reader)?;
        state.bus.mapper_mut().move_rom_from(self.bus.mapper_mut());

        self.bus = state.bus;
        self.cpu = state.cpu;
        self.ppu = state.ppu;
        self.apu = state.apu;

        Ok(())
    }
}
