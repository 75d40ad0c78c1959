pub(crate) mod instructions;
pub(crate) mod trace;

use crate::bus::{self, CpuBus};
use crate::num::GetBit;
use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusReadContext {
    HardwareInterruptHandler,
    Brk,
    PushStack,
}

#[derive(Debug, Clone, Copy, Encode, Decode)]
pub(crate) struct StatusFlags {
    pub(crate) negative: bool,
    pub(crate) overflow: bool,
    pub(crate) decimal: bool,
    pub(crate) interrupt_disable: bool,
    pub(crate) zero: bool,
    pub(crate) carry: bool,
}

impl StatusFlags {
    pub(crate) fn new() -> Self {
        // I defaults to 1, everything else to 0
        Self {
            negative: false,
            overflow: false,
            decimal: false,
            interrupt_disable: true,
            zero: false,
            carry: false,
        }
    }

    pub(crate) fn set_negative(&mut self, negative: bool) -> &mut Self {
        self.negative = negative;
        self
    }

    pub(crate) fn set_overflow(&mut self, overflow: bool) -> &mut Self {
        self.overflow = overflow;
        self
    }

    pub(crate) fn set_zero(&mut self, zero: bool) -> &mut Self {
        self.zero = zero;
        self
    }

    pub(crate) fn set_carry(&mut self, carry: bool) -> &mut Self {
        self.carry = carry;
        self
    }

    pub(crate) fn to_byte(self, read_ctx: StatusReadContext) -> u8 {
        // B is not a real flag: it reads as set in bytes pushed by BRK and
        // PHP, and clear in bytes pushed by the NMI/IRQ entry sequence
        let b_flag = match read_ctx {
            StatusReadContext::Brk | StatusReadContext::PushStack => 0x10,
            StatusReadContext::HardwareInterruptHandler => 0x00,
        };

        // Bit 5 is unused and always reads as 1
        (u8::from(self.negative) << 7)
            | (u8::from(self.overflow) << 6)
            | 0x20
            | b_flag
            | (u8::from(self.decimal) << 3)
            | (u8::from(self.interrupt_disable) << 2)
            | (u8::from(self.zero) << 1)
            | u8::from(self.carry)
    }

    pub(crate) fn from_byte(byte: u8) -> Self {
        Self {
            negative: byte.bit(7),
            overflow: byte.bit(6),
            decimal: byte.bit(3),
            interrupt_disable: byte.bit(2),
            zero: byte.bit(1),
            carry: byte.bit(0),
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct CpuRegisters {
    pub(crate) accumulator: u8,
    pub(crate) x: u8,
    pub(crate) y: u8,
    pub(crate) status: StatusFlags,
    pub(crate) pc: u16,
    pub(crate) sp: u8,
}

impl CpuRegisters {
    fn create(bus: &mut CpuBus<'_>) -> Self {
        let pc = bus.read_address_u16(bus::CPU_RESET_VECTOR);
        Self { accumulator: 0, x: 0, y: 0, status: StatusFlags::new(), pc, sp: 0xFD }
    }
}

// The reset sequence takes 7 cycles before the first instruction fetch.
pub(crate) const RESET_CYCLES: u64 = 7;

const INTERRUPT_CYCLES: u32 = 7;

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct CpuState {
    pub(crate) registers: CpuRegisters,
    cycles: u64,
}

impl CpuState {
    pub(crate) fn new(bus: &mut CpuBus<'_>) -> Self {
        Self { registers: CpuRegisters::create(bus), cycles: RESET_CYCLES }
    }

    pub(crate) fn reset(&mut self, bus: &mut CpuBus<'_>) {
        self.registers = CpuRegisters::create(bus);
        self.cycles = RESET_CYCLES;
    }

    pub(crate) fn cycles(&self) -> u64 {
        self.cycles
    }

    pub(crate) fn add_cycles(&mut self, cycles: u64) {
        self.cycles += cycles;
    }
}

/// Execute one instruction and return the number of CPU cycles it consumed.
pub(crate) fn step(state: &mut CpuState, bus: &mut CpuBus<'_>) -> u32 {
    let opcode = bus.read_address(state.registers.pc);
    state.registers.pc = state.registers.pc.wrapping_add(1);

    let cycles = instructions::execute(opcode, &mut state.registers, bus);
    state.cycles += u64::from(cycles);
    cycles
}

/// Enter the NMI handler. Returns the cycles consumed by the entry sequence.
pub(crate) fn nmi(state: &mut CpuState, bus: &mut CpuBus<'_>) -> u32 {
    service_interrupt(&mut state.registers, bus, bus::CPU_NMI_VECTOR);
    state.cycles += u64::from(INTERRUPT_CYCLES);
    INTERRUPT_CYCLES
}

/// Enter the IRQ handler if interrupts are enabled. Returns the cycles
/// consumed, 0 when the IRQ-disable flag masked the request.
pub(crate) fn irq(state: &mut CpuState, bus: &mut CpuBus<'_>) -> u32 {
    if state.registers.status.interrupt_disable {
        return 0;
    }

    service_interrupt(&mut state.registers, bus, bus::CPU_IRQ_VECTOR);
    state.cycles += u64::from(INTERRUPT_CYCLES);
    INTERRUPT_CYCLES
}

fn service_interrupt(registers: &mut CpuRegisters, bus: &mut CpuBus<'_>, vector: u16) {
    let pc = registers.pc;
    instructions::push_u16(registers, bus, pc);

    let status = registers.status.to_byte(StatusReadContext::HardwareInterruptHandler);
    instructions::push(registers, bus, status);

    registers.status.interrupt_disable = true;
    registers.pc = bus.read_address_u16(vector);
}
