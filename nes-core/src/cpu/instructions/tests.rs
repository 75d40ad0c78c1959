use crate::apu::ApuState;
use crate::bus::cartridge::Mapper;
use crate::bus::{Bus, CpuBus};
use crate::cpu::{self, CpuState, StatusReadContext};
use crate::ppu::PpuState;

#[derive(Default)]
struct ExpectedState {
    a: Option<u8>,
    x: Option<u8>,
    y: Option<u8>,
    p: Option<u8>,
    s: Option<u8>,
    pc: Option<u16>,
    cycles: Option<u64>,
    memory: Vec<(u16, u8)>,
}

macro_rules! check_field {
    ($errors:expr, $name:literal, $expected:expr, $actual:expr) => {
        if let Some(expected) = $expected {
            let actual = $actual;
            if expected != actual {
                $errors.push(format!(
                    "[{} mismatch: expected = {:02X}, actual = {:02X}]",
                    $name, expected, actual
                ));
            }
        }
    };
}

impl ExpectedState {
    fn assert_eq(&self, cpu_state: &CpuState, bus: &mut CpuBus<'_>, cycles_executed: u64) {
        let registers = &cpu_state.registers;
        let mut errors: Vec<String> = Vec::new();

        check_field!(errors, "A", self.a, registers.accumulator);
        check_field!(errors, "X", self.x, registers.x);
        check_field!(errors, "Y", self.y, registers.y);
        check_field!(errors, "P", self.p, registers.status.to_byte(StatusReadContext::PushStack));
        check_field!(errors, "S", self.s, registers.sp);
        check_field!(errors, "PC", self.pc, registers.pc);
        check_field!(errors, "Cycles", self.cycles, cycles_executed);

        for &(address, expected) in &self.memory {
            let actual = bus.read_address(address);
            if expected != actual {
                errors.push(format!(
                    "[memory mismatch at {address:04X}: expected = {expected:02X}, actual = {actual:02X}]"
                ));
            }
        }

        assert!(errors.is_empty(), "Expected state mismatch: {}", errors.join(", "));
    }
}

fn program_from_hex(program: &str) -> Vec<u8> {
    program
        .as_bytes()
        .chunks_exact(2)
        .map(|chunk| {
            let hex = std::str::from_utf8(chunk).unwrap();
            u8::from_str_radix(hex, 16).unwrap()
        })
        .collect()
}

fn run_test(program: &str, expected: ExpectedState) {
    run_test_patched(program, &[], expected);
}

/// Assemble `program` at $8000 with the reset vector pointing at it, apply
/// any extra PRG ROM patches (e.g. interrupt vectors or handler code), and
/// step instructions until the PC leaves the program.
fn run_test_patched(program: &str, rom_patches: &[(usize, u8)], expected: ExpectedState) {
    let program_bytes = program_from_hex(program);

    let mut prg_rom = vec![0; 16 * 1024];
    prg_rom[0x3FFC] = 0x00;
    prg_rom[0x3FFD] = 0x80;
    prg_rom[..program_bytes.len()].copy_from_slice(&program_bytes);
    for &(offset, value) in rom_patches {
        prg_rom[offset] = value;
    }

    let mut bus = Bus::new(Mapper::nrom_for_test(prg_rom));
    let mut ppu = PpuState::new();
    let mut apu = ApuState::new();

    let mut cpu_bus = CpuBus::new(&mut bus, &mut ppu, &mut apu);
    let mut cpu_state = CpuState::new(&mut cpu_bus);

    let program_range = 0x8000..0x8000 + program_bytes.len() as u16;
    let mut cycles_executed = 0;
    while program_range.contains(&cpu_state.registers.pc) {
        cycles_executed += u64::from(cpu::step(&mut cpu_state, &mut cpu_bus));
        assert!(cycles_executed < 10_000, "program did not terminate");
    }

    expected.assert_eq(&cpu_state, &mut cpu_bus, cycles_executed);
}

#[test]
fn lda_immediate() {
    run_test(
        // LDA #$78
        "A978",
        ExpectedState { a: Some(0x78), p: Some(0x34), cycles: Some(2), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$DD
        "A9DD",
        ExpectedState { a: Some(0xDD), p: Some(0xB4), cycles: Some(2), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$00
        "A900",
        ExpectedState { a: Some(0x00), p: Some(0x36), cycles: Some(2), ..ExpectedState::default() },
    );
}

#[test]
fn load_store_zero_page() {
    run_test(
        // LDA #$55; STA $10; LDA #$00; LDA $10
        "A9558510A900A510",
        ExpectedState {
            a: Some(0x55),
            p: Some(0x34),
            cycles: Some(2 + 3 + 2 + 3),
            memory: vec![(0x0010, 0x55)],
            ..ExpectedState::default()
        },
    );
}

#[test]
fn ldx_ldy_immediate() {
    run_test(
        // LDX #$80; LDY #$00
        "A280A000",
        ExpectedState {
            x: Some(0x80),
            y: Some(0x00),
            p: Some(0x36),
            cycles: Some(4),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn absolute_x_page_cross_penalty() {
    run_test(
        // LDX #$02; LDA $01FF,X
        "A202BDFF01",
        ExpectedState { cycles: Some(2 + 5), ..ExpectedState::default() },
    );

    run_test(
        // LDX #$02; LDA $0140,X (no cross)
        "A202BD4001",
        ExpectedState { cycles: Some(2 + 4), ..ExpectedState::default() },
    );
}

#[test]
fn sta_absolute_x_no_penalty() {
    run_test(
        // LDX #$02; LDA #$11; STA $01FF,X
        "A202A9119DFF01",
        ExpectedState {
            cycles: Some(2 + 2 + 5),
            memory: vec![(0x0201, 0x11)],
            ..ExpectedState::default()
        },
    );
}

#[test]
fn zero_page_x_wraps() {
    run_test(
        // LDX #$10; LDA #$77; STA $F8,X
        "A210A97795F8",
        ExpectedState { memory: vec![(0x0008, 0x77)], ..ExpectedState::default() },
    );
}

#[test]
fn indirect_x_pointer_wraps() {
    run_test(
        // LDA #$21; STA $00; LDA #$43; STA $01; LDX #$FF; LDA ($01,X)
        // pointer = ($01 + $FF) & $FF = $00 -> target $4321, open bus
        "A9218500A9438501A2FFA101",
        ExpectedState {
            a: Some(0xFF),
            p: Some(0xB4),
            cycles: Some(2 + 3 + 2 + 3 + 2 + 6),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn indirect_y_zero_page_pointer_wraps() {
    run_test(
        // LDA #$00; STA $FF; LDA #$02; STA $00; LDY #$03; LDA ($FF),Y
        // base is read from $FF/$00 -> $0200; target $0203
        "A90085FFA9028500A003B1FF",
        ExpectedState {
            a: Some(0x00),
            p: Some(0x36),
            cycles: Some(2 + 3 + 2 + 3 + 2 + 5),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn indirect_y_store() {
    run_test(
        // pointer $40 = $1234; LDY #$05; LDA #$99; STA ($40),Y
        "A9348540A9128541A005A9999140",
        ExpectedState { memory: vec![(0x1239, 0x99)], ..ExpectedState::default() },
    );
}

#[test]
fn adc_overflow_and_carry() {
    run_test(
        // LDA #$50; ADC #$50 (positive overflow)
        "A9506950",
        ExpectedState { a: Some(0xA0), p: Some(0xF4), cycles: Some(4), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$D0; ADC #$90 (negative overflow, carry out)
        "A9D06990",
        ExpectedState { a: Some(0x60), p: Some(0x75), cycles: Some(4), ..ExpectedState::default() },
    );

    run_test(
        // SEC; LDA #$01; ADC #$01 (carry in)
        "38A9016901",
        ExpectedState { a: Some(0x03), p: Some(0x34), ..ExpectedState::default() },
    );
}

#[test]
fn sbc_borrow() {
    run_test(
        // SEC; LDA #$50; SBC #$F0
        "38A950E9F0",
        ExpectedState { a: Some(0x60), p: Some(0x34), cycles: Some(6), ..ExpectedState::default() },
    );

    run_test(
        // SEC; LDA #$50; SBC #$10
        "38A950E910",
        ExpectedState { a: Some(0x40), p: Some(0x35), ..ExpectedState::default() },
    );
}

#[test]
fn compare_flags() {
    run_test(
        // LDA #$40; CMP #$41
        "A940C941",
        ExpectedState { p: Some(0xB4), cycles: Some(4), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$40; CMP #$40
        "A940C940",
        ExpectedState { p: Some(0x37), ..ExpectedState::default() },
    );

    run_test(
        // LDX #$41; CPX #$40
        "A241E040",
        ExpectedState { p: Some(0x35), ..ExpectedState::default() },
    );
}

#[test]
fn bit_test_flags() {
    run_test(
        // LDA #$C0; STA $20; LDA #$01; BIT $20
        "A9C08520A9012420",
        ExpectedState { p: Some(0xF6), ..ExpectedState::default() },
    );
}

#[test]
fn shifts_accumulator_and_memory() {
    run_test(
        // LDA #$81; ASL A
        "A9810A",
        ExpectedState { a: Some(0x02), p: Some(0x35), cycles: Some(4), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$02; STA $30; LSR $30
        "A90285304630",
        ExpectedState {
            p: Some(0x34),
            cycles: Some(2 + 3 + 5),
            memory: vec![(0x0030, 0x01)],
            ..ExpectedState::default()
        },
    );
}

#[test]
fn rotates_through_carry() {
    run_test(
        // SEC; LDA #$80; ROL A
        "38A9802A",
        ExpectedState { a: Some(0x01), p: Some(0x35), ..ExpectedState::default() },
    );

    run_test(
        // SEC; LDA #$01; ROR A
        "38A9016A",
        ExpectedState { a: Some(0x80), p: Some(0xB5), ..ExpectedState::default() },
    );
}

#[test]
fn increments_and_decrements() {
    run_test(
        // INC $10; INC $10; DEC $10
        "E610E610C610",
        ExpectedState {
            p: Some(0x34),
            cycles: Some(15),
            memory: vec![(0x0010, 0x01)],
            ..ExpectedState::default()
        },
    );

    run_test(
        // LDX #$00; DEX
        "A200CA",
        ExpectedState { x: Some(0xFF), p: Some(0xB4), ..ExpectedState::default() },
    );
}

#[test]
fn transfers() {
    run_test(
        // LDA #$AB; TAX; TXS; TSX has no effect on flags for TXS
        "A9ABAA9A",
        ExpectedState { x: Some(0xAB), s: Some(0xAB), p: Some(0xB4), ..ExpectedState::default() },
    );
}

#[test]
fn branch_cycle_counts() {
    run_test(
        // LDA #$01; BNE +1 (taken, same page); skip NOP; LDA #$02
        "A901D001EAA902",
        ExpectedState { a: Some(0x02), cycles: Some(2 + 3 + 2), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$01; BEQ +1 (not taken); NOP; LDA #$02
        "A901F001EAA902",
        ExpectedState { a: Some(0x02), cycles: Some(2 + 2 + 2 + 2), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$00; BEQ -12 (taken, crosses into $7Fxx)
        "A900F0F4",
        ExpectedState { pc: Some(0x7FF8), cycles: Some(2 + 4), ..ExpectedState::default() },
    );
}

#[test]
fn jmp_indirect_page_wrap_bug() {
    run_test(
        // LDA #$34; STA $02FF; LDA #$12; STA $0200; JMP ($02FF)
        // high byte comes from $0200, not $0300
        "A9348DFF02A9128D00026CFF02",
        ExpectedState { pc: Some(0x1234), cycles: Some(2 + 4 + 2 + 4 + 5), ..ExpectedState::default() },
    );
}

#[test]
fn jsr_and_rts() {
    run_test(
        // JSR $8007; JMP $800A; (padding NOP); LDX #$07; RTS
        "2007804C0A80EAA20760",
        ExpectedState {
            x: Some(0x07),
            s: Some(0xFD),
            pc: Some(0x800A),
            cycles: Some(6 + 2 + 6 + 3),
            // JSR pushes the address of its own last byte, $8002
            memory: vec![(0x01FD, 0x80), (0x01FC, 0x02)],
            ..ExpectedState::default()
        },
    );
}

#[test]
fn php_pushes_break_and_unused() {
    run_test(
        // PHP; LDA $01FD
        "08ADFD01",
        ExpectedState { a: Some(0x34), s: Some(0xFC), ..ExpectedState::default() },
    );
}

#[test]
fn plp_ignores_break_forces_unused() {
    run_test(
        // LDA #$CF; PHA; PLP
        "A9CF4828",
        ExpectedState { p: Some(0xFF), s: Some(0xFD), cycles: Some(2 + 3 + 4), ..ExpectedState::default() },
    );
}

#[test]
fn brk_and_rti_round_trip() {
    // IRQ/BRK vector -> $9000, which holds RTI
    run_test_patched(
        // BRK; (padding); NOP
        "00EAEA",
        &[(0x3FFE, 0x00), (0x3FFF, 0x90), (0x1000, 0x40)],
        ExpectedState {
            s: Some(0xFD),
            pc: Some(0x8003),
            p: Some(0x34),
            cycles: Some(7 + 6 + 2),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn lax_loads_both_registers() {
    run_test(
        // LDA #$C3; STA $44; LDA #$00; *LAX $44
        "A9C38544A900A744",
        ExpectedState {
            a: Some(0xC3),
            x: Some(0xC3),
            p: Some(0xB4),
            cycles: Some(2 + 3 + 2 + 3),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn sax_stores_a_and_x() {
    run_test(
        // LDA #$F0; LDX #$3C; *SAX $21
        "A9F0A23C8721",
        ExpectedState { memory: vec![(0x0021, 0x30)], p: Some(0x34), ..ExpectedState::default() },
    );
}

#[test]
fn dcp_decrements_then_compares() {
    run_test(
        // LDA #$40; STA $30; *DCP $30
        "A9408530C730",
        ExpectedState {
            p: Some(0x35),
            cycles: Some(2 + 3 + 5),
            memory: vec![(0x0030, 0x3F)],
            ..ExpectedState::default()
        },
    );
}

#[test]
fn isb_increments_then_subtracts() {
    run_test(
        // LDA #$40; STA $30; SEC; *ISB $30
        "A940853038E730",
        ExpectedState {
            a: Some(0xFF),
            p: Some(0xB4),
            memory: vec![(0x0030, 0x41)],
            ..ExpectedState::default()
        },
    );
}

#[test]
fn slo_shifts_then_ors() {
    run_test(
        // LDA #$02; STA $30; LDA #$01; *SLO $30
        "A9028530A9010730",
        ExpectedState {
            a: Some(0x05),
            p: Some(0x34),
            memory: vec![(0x0030, 0x04)],
            ..ExpectedState::default()
        },
    );
}

#[test]
fn anc_sets_carry_from_bit7() {
    run_test(
        // LDA #$80; *ANC #$FF
        "A9800BFF",
        ExpectedState { a: Some(0x80), p: Some(0xB5), cycles: Some(4), ..ExpectedState::default() },
    );
}

#[test]
fn alr_ands_then_shifts() {
    run_test(
        // LDA #$03; *ALR #$01
        "A9034B01",
        ExpectedState { a: Some(0x00), p: Some(0x37), ..ExpectedState::default() },
    );
}

#[test]
fn arr_flag_behavior() {
    run_test(
        // SEC; LDA #$FF; *ARR #$C0
        "38A9FF6BC0",
        ExpectedState { a: Some(0xE0), p: Some(0xB5), ..ExpectedState::default() },
    );
}

#[test]
fn axs_subtracts_without_borrow() {
    run_test(
        // LDA #$F0; LDX #$CC; *AXS #$0F
        "A9F0A2CCCB0F",
        ExpectedState { x: Some(0xB1), p: Some(0xB5), cycles: Some(6), ..ExpectedState::default() },
    );
}

#[test]
fn illegal_nop_consumes_operand() {
    run_test(
        // *NOP $10 (0x04); *NOP #$AA (0x80); *NOP $1234,X (0x1C, no cross)
        "041080AA1C3412",
        ExpectedState { pc: Some(0x8007), cycles: Some(3 + 2 + 4), ..ExpectedState::default() },
    );
}

#[test]
fn nmi_entry_sequence() {
    let mut prg_rom = vec![0; 16 * 1024];
    prg_rom[0x3FFC] = 0x00;
    prg_rom[0x3FFD] = 0x80;
    prg_rom[0x3FFA] = 0x00;
    prg_rom[0x3FFB] = 0x95;

    let mut bus = Bus::new(Mapper::nrom_for_test(prg_rom));
    let mut ppu = PpuState::new();
    let mut apu = ApuState::new();

    let mut cpu_bus = CpuBus::new(&mut bus, &mut ppu, &mut apu);
    let mut cpu_state = CpuState::new(&mut cpu_bus);

    let cycles = cpu::nmi(&mut cpu_state, &mut cpu_bus);

    assert_eq!(cycles, 7);
    assert_eq!(cpu_state.registers.pc, 0x9500);
    assert_eq!(cpu_state.registers.sp, 0xFA);
    assert!(cpu_state.registers.status.interrupt_disable);
    // Pushed status has Unused set and Break clear
    assert_eq!(cpu_bus.read_address(0x01FB), 0x24);
    // Pushed return address is the pre-interrupt PC
    assert_eq!(cpu_bus.read_address(0x01FD), 0x80);
    assert_eq!(cpu_bus.read_address(0x01FC), 0x00);
}

#[test]
fn irq_masked_by_interrupt_disable() {
    let mut prg_rom = vec![0; 16 * 1024];
    prg_rom[0x3FFC] = 0x00;
    prg_rom[0x3FFD] = 0x80;

    let mut bus = Bus::new(Mapper::nrom_for_test(prg_rom));
    let mut ppu = PpuState::new();
    let mut apu = ApuState::new();

    let mut cpu_bus = CpuBus::new(&mut bus, &mut ppu, &mut apu);
    let mut cpu_state = CpuState::new(&mut cpu_bus);

    // I is set after reset; the IRQ must be ignored
    assert_eq!(cpu::irq(&mut cpu_state, &mut cpu_bus), 0);
    assert_eq!(cpu_state.registers.pc, 0x8000);
    assert_eq!(cpu_state.registers.sp, 0xFD);
}

#[test]
fn unused_flag_always_reads_set() {
    run_test(
        // CLC; CLD; CLV; CLI
        "18D8B858",
        ExpectedState { p: Some(0x30), ..ExpectedState::default() },
    );
}
