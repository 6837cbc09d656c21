use std::cell::Cell;
use std::rc::Rc;

use opemu_core::{
    AddressingFault, DecodeMode, Destination, EmulationError, FlatMemory, RegisterFile, Vector,
};
use opemu_trap::{DispatchConfig, FamilyDecoder, FamilySet, Handled, TrapDispatcher, TrapOutcome};

const MEM_BASE: u64 = 0x10_0000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn machine() -> (RegisterFile, FlatMemory) {
    (RegisterFile::default(), FlatMemory::new(MEM_BASE, 0x1000))
}

/// Stand-in for a sibling family such as `sysenter` (`0F 34`), counting how
/// often it is consulted.
#[derive(Clone, Default)]
struct Sysenter {
    calls: Rc<Cell<usize>>,
}

impl FamilyDecoder<RegisterFile, FlatMemory> for Sysenter {
    fn name(&self) -> &'static str {
        "sysenter"
    }

    fn try_emulate(
        &self,
        bytes: &[u8],
        _mode: DecodeMode,
        regs: &mut RegisterFile,
        _mem: &mut FlatMemory,
    ) -> Result<Handled, EmulationError> {
        self.calls.set(self.calls.get() + 1);
        match bytes {
            [0x0F, 0x34, ..] => {
                regs.gpr[1] = 0x5151;
                Ok(Handled {
                    len: 2,
                    destination: None,
                })
            }
            [0x0F, opcode, ..] => Err(EmulationError::UnrecognizedOpcode { opcode: *opcode }),
            _ => Err(EmulationError::UnrecognizedPrefix),
        }
    }
}

fn dispatcher() -> TrapDispatcher<RegisterFile, FlatMemory> {
    TrapDispatcher::new(DispatchConfig::default())
}

#[test]
fn families_are_tried_in_priority_order() {
    let sibling = Sysenter::default();
    let d = dispatcher().with_sibling(sibling);
    let names: Vec<_> = d.families().collect();
    assert_eq!(names, ["ssse3", "sse3-66", "sse3-f2", "sse3-f3", "sse4.2-string", "sysenter"]);
}

#[test]
fn each_family_claims_its_own_encodings() {
    init_tracing();
    let d = dispatcher();
    let (mut regs, mut mem) = machine();

    let cases: &[(&[u8], &str, Destination)] = &[
        // pshufb xmm0, xmm1
        (&[0x66, 0x0F, 0x38, 0x00, 0xC1], "ssse3", Destination::Xmm(0)),
        // pabsw mm2, mm3
        (&[0x0F, 0x38, 0x1D, 0xD3], "ssse3", Destination::Mm(2)),
        // haddpd xmm1, xmm2
        (&[0x66, 0x0F, 0x7C, 0xCA], "sse3-66", Destination::Xmm(1)),
        // movddup xmm3, xmm4
        (&[0xF2, 0x0F, 0x12, 0xDC], "sse3-f2", Destination::Xmm(3)),
        // movsldup xmm5, xmm6
        (&[0xF3, 0x0F, 0x12, 0xEE], "sse3-f3", Destination::Xmm(5)),
        // pcmpistri xmm1, xmm2, 0
        (&[0x66, 0x0F, 0x3A, 0x63, 0xCA, 0x00], "sse4.2-string", Destination::Gpr(1)),
    ];

    for &(bytes, family, destination) in cases {
        let outcome = d.handle(bytes, DecodeMode::Bits64, &mut regs, &mut mem);
        assert_eq!(
            outcome,
            TrapOutcome::Emulated {
                len: bytes.len() as u8,
                family,
                destination: Some(destination),
            },
            "{bytes:02x?}"
        );
        assert_eq!(outcome.bytes_consumed(), bytes.len());
    }
}

#[test]
fn unknown_bytes_fall_through_to_sibling() {
    init_tracing();
    let sibling = Sysenter::default();
    let calls = sibling.calls.clone();
    let d = dispatcher().with_sibling(sibling);
    let (mut regs, mut mem) = machine();

    let outcome = d.handle(&[0x0F, 0x34, 0x90], DecodeMode::Bits64, &mut regs, &mut mem);
    assert_eq!(
        outcome,
        TrapOutcome::Emulated {
            len: 2,
            family: "sysenter",
            destination: None,
        }
    );
    assert_eq!(calls.get(), 1);
    assert_eq!(regs.gpr[1], 0x5151);
}

#[test]
fn unemulatable_instruction_stops_the_search() {
    init_tracing();
    let sibling = Sysenter::default();
    let calls = sibling.calls.clone();
    let d = dispatcher().with_sibling(sibling);
    let (mut regs, mut mem) = machine();
    let before = regs.clone();

    // 66 0F 38 00 05 <disp32> => pshufb xmm0, [rip+disp32]
    let bytes = [0x66, 0x0F, 0x38, 0x00, 0x05, 0x10, 0x00, 0x00, 0x00];
    let outcome = d.handle(&bytes, DecodeMode::Bits64, &mut regs, &mut mem);
    assert_eq!(
        outcome,
        TrapOutcome::Unemulatable {
            family: "ssse3",
            error: EmulationError::UnsupportedAddressing(AddressingFault::RipRelative),
        }
    );
    assert_eq!(outcome.bytes_consumed(), 0);
    assert_eq!(calls.get(), 0);
    assert_eq!(regs, before);

    // pcmpistri with a ranges aggregation.
    let outcome = d.handle(
        &[0x66, 0x0F, 0x3A, 0x63, 0xCA, 0x04],
        DecodeMode::Bits64,
        &mut regs,
        &mut mem,
    );
    assert_eq!(
        outcome,
        TrapOutcome::Unemulatable {
            family: "sse4.2-string",
            error: EmulationError::UnimplementedComparisonMode { imm: 0x04 },
        }
    );
    assert_eq!(regs, before);
}

#[test]
fn memory_fault_is_unemulatable() {
    let d = dispatcher();
    let (mut regs, mut mem) = machine();
    regs.gpr[0] = 0xDEAD_0000;

    // 66 0F 38 04 00 => pmaddubsw xmm0, [rax]
    let outcome = d.handle(&[0x66, 0x0F, 0x38, 0x04, 0x00], DecodeMode::Bits64, &mut regs, &mut mem);
    assert_eq!(
        outcome,
        TrapOutcome::Unemulatable {
            family: "ssse3",
            error: EmulationError::MemoryFault { addr: 0xDEAD_0000 },
        }
    );
}

#[test]
fn unknown_opcode_is_invalid() {
    init_tracing();
    let d = dispatcher();
    let (mut regs, mut mem) = machine();
    let before = regs.clone();

    for bytes in [&[0x0F, 0x0B][..], &[0x66, 0x0F, 0x38, 0xFF, 0xC0], &[0x90]] {
        let outcome = d.handle(bytes, DecodeMode::Bits64, &mut regs, &mut mem);
        assert_eq!(outcome, TrapOutcome::InvalidOpcode, "{bytes:02x?}");
        assert_eq!(outcome.bytes_consumed(), 0);
    }
    assert_eq!(regs, before);
}

#[test]
fn empty_buffer_is_invalid() {
    let sibling = Sysenter::default();
    let calls = sibling.calls.clone();
    let d = dispatcher().with_sibling(sibling);
    let (mut regs, mut mem) = machine();

    assert_eq!(d.handle(&[], DecodeMode::Bits64, &mut regs, &mut mem), TrapOutcome::InvalidOpcode);
    assert_eq!(calls.get(), 0);
}

#[test]
fn disabled_family_is_not_consulted() {
    let d: TrapDispatcher<RegisterFile, FlatMemory> =
        TrapDispatcher::new(DispatchConfig::default().without(FamilySet::SSE3));
    let (mut regs, mut mem) = machine();

    assert_eq!(
        d.handle(&[0x66, 0x0F, 0x7C, 0xCA], DecodeMode::Bits64, &mut regs, &mut mem),
        TrapOutcome::InvalidOpcode
    );
    assert!(matches!(
        d.handle(&[0x66, 0x0F, 0x38, 0x00, 0xC1], DecodeMode::Bits64, &mut regs, &mut mem),
        TrapOutcome::Emulated { family: "ssse3", .. }
    ));
}

#[test]
fn oversized_buffer_is_capped_at_fifteen_bytes() {
    let d = dispatcher();
    let (mut regs, mut mem) = machine();
    regs.set_xmm(1, Vector::from_lanes([-3i16, 4, -5, 6, i16::MIN, 0, 1, -1]));

    // 66 0F 38 1D C1 => pabsw xmm0, xmm1, followed by a long run of trailing bytes.
    let mut bytes = vec![0x66, 0x0F, 0x38, 0x1D, 0xC1];
    bytes.resize(64, 0x90);
    let outcome = d.handle(&bytes, DecodeMode::Bits64, &mut regs, &mut mem);
    assert_eq!(outcome.bytes_consumed(), 5);
    assert_eq!(
        regs.xmm(0).lanes::<i16, 8>(),
        [3, 4, 5, 6, i16::MIN, 0, 1, 1]
    );
}

#[test]
fn thirty_two_bit_mode_dispatch() {
    let d = dispatcher();
    let (mut regs, mut mem) = machine();
    mem.load(MEM_BASE + 0x10, &[0x11; 16]).unwrap();
    regs.gpr[3] = MEM_BASE;

    // 66 0F 38 01 43 10 => phaddw xmm0, [ebx+0x10]
    let outcome = d.handle(
        &[0x66, 0x0F, 0x38, 0x01, 0x43, 0x10],
        DecodeMode::Bits32,
        &mut regs,
        &mut mem,
    );
    assert_eq!(outcome.bytes_consumed(), 6);
    assert_eq!(regs.xmm(0).lanes::<u16, 8>()[4..], [0x2222; 4]);
}
