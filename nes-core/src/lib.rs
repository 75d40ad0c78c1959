//! Cycle-driven emulation core for the NES / Famicom.
//!
//! The core is headless: it produces a 256x240 ARGB frame buffer and a mono
//! 44.1 kHz sample stream, and consumes controller state through the
//! [`InputPoller`] trait. Window creation, audio device queueing, and input
//! decoding are the host's responsibility.

#![forbid(unsafe_code)]

mod api;
mod apu;
mod audio;
mod bus;
mod cpu;
mod input;
mod num;
mod ppu;
mod serialize;

pub use api::{AudioPlayer, EmulationError, Emulator, InputPoller, Renderer};
pub use bus::cartridge::CartridgeFileError;
pub use input::JoypadState;
pub use ppu::{FrameBuffer, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use serialize::SaveStateError;
