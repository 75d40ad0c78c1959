//! Runs a CPU test ROM in automated mode and emits a nestest-format trace
//! line per instruction. When given a reference log, diffs the output
//! line-by-line and reports the first divergence.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use nes_core::{AudioPlayer, Emulator, FrameBuffer, InputPoller, JoypadState, Renderer};
use std::fs;
use std::path::PathBuf;

struct NullRenderer;

impl Renderer for NullRenderer {
    type Err = std::convert::Infallible;

    fn render_frame(&mut self, _frame_buffer: &FrameBuffer) -> Result<(), Self::Err> {
        Ok(())
    }
}

struct NullAudioPlayer;

impl AudioPlayer for NullAudioPlayer {
    type Err = std::convert::Infallible;

    fn push_samples(&mut self, _samples: &[f32]) -> Result<(), Self::Err> {
        Ok(())
    }
}

struct NullInputPoller;

impl InputPoller for NullInputPoller {
    fn poll_p1_input(&self) -> JoypadState {
        JoypadState::default()
    }

    fn poll_p2_input(&self) -> JoypadState {
        JoypadState::default()
    }
}

#[derive(Debug, Parser)]
struct Args {
    /// Path to the test ROM (iNES format)
    #[arg(long, short = 'r')]
    rom_path: PathBuf,

    /// Reference log to diff against; trace lines are printed to stdout when
    /// omitted
    #[arg(long, short = 'l')]
    log_path: Option<PathBuf>,

    /// Entry point for automated mode
    #[arg(long, default_value = "0xC000", value_parser = parse_hex_u16)]
    entry_point: u16,

    /// Number of instructions to trace
    #[arg(long, default_value_t = 8991)]
    instruction_count: u32,
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|err| err.to_string())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let rom_bytes = fs::read(&args.rom_path)
        .with_context(|| format!("failed to read ROM from {}", args.rom_path.display()))?;

    let mut emulator = Emulator::create(&rom_bytes, NullRenderer, NullAudioPlayer, NullInputPoller)
        .context("failed to load ROM")?;
    emulator.set_program_counter(args.entry_point);

    let reference_log = match &args.log_path {
        Some(log_path) => Some(
            fs::read_to_string(log_path)
                .with_context(|| format!("failed to read log from {}", log_path.display()))?,
        ),
        None => None,
    };

    match reference_log {
        Some(log) => diff_against_log(&mut emulator, &log, args.instruction_count),
        None => {
            for _ in 0..args.instruction_count {
                println!("{}", emulator.trace_line());
                emulator.step_instruction();
            }
            Ok(())
        }
    }
}

fn diff_against_log<R, A, I>(
    emulator: &mut Emulator<R, A, I>,
    reference_log: &str,
    instruction_count: u32,
) -> anyhow::Result<()>
where
    R: Renderer,
    A: AudioPlayer,
    I: InputPoller,
{
    let mut mismatches = 0;
    let mut lines_checked = 0u32;

    for (line_number, expected) in reference_log.lines().take(instruction_count as usize).enumerate()
    {
        let actual = emulator.trace_line();
        let expected = expected.trim_end();

        if actual != expected {
            mismatches += 1;
            log::error!("Mismatch at line {}:", line_number + 1);
            log::error!("  expected: {expected}");
            log::error!("  actual:   {actual}");
            if mismatches >= 10 {
                anyhow::bail!("too many mismatches, giving up");
            }
        }

        emulator.step_instruction();
        lines_checked += 1;
    }

    if mismatches != 0 {
        anyhow::bail!("{mismatches} mismatched lines out of {lines_checked}");
    }

    log::info!("All {lines_checked} trace lines match");
    Ok(())
}
