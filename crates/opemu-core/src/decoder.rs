//! Decode / execute orchestration.
//!
//! [`decode`] only reads the GPRs (for effective addresses). [`execute`] does
//! every fallible step (validation, imm8 checks, operand fetch) before it
//! writes anything, so an error never leaves partial state behind.

use tracing::trace;

use crate::error::{AddressingFault, EmulationError};
use crate::mem::GuestMemory;
use crate::modrm::{decode_operands, OperandRef};
use crate::opcode::{lookup, Arity, Family, Mnemonic, OpcodeEntry, SourceRule};
use crate::operand::{check_register, commit_vector, fetch_source, read_register, Destination};
use crate::operand::{GprState, RegisterBank};
use crate::prefix;
use crate::semantics::strcmp::StringControl;
use crate::semantics::{self, strcmp, EmulationContext, LaneFn, Operation};
use crate::vector::{Vector, VectorWidth};
use crate::{DecodeMode, MAX_INST_LEN};

/// GPR index written by `pcmpistri`.
const RCX: u8 = 1;
/// XMM register written by `pcmpistrm`.
const XMM0: u8 = 0;

/// One decoded instruction, ready for [`execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub family: Family,
    pub entry: OpcodeEntry,
    pub width: VectorWidth,
    /// Destination lives in the MM bank.
    pub legacy_mmx: bool,
    pub src: OperandRef,
    pub dst: OperandRef,
    pub immediate: Option<u8>,
    /// Total encoded length, prefixes through immediate.
    pub len: u8,
}

impl DecodedInstruction {
    #[inline]
    pub fn mnemonic(&self) -> Mnemonic {
        self.entry.mnemonic
    }

    /// Bytes read from memory for a memory source.
    fn source_len(&self) -> usize {
        match self.entry.source {
            SourceRule::Low64 => 8,
            SourceRule::RegOrMem | SourceRule::MemOnly => self.width.bytes(),
        }
    }
}

/// Successful emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emulated {
    /// Bytes to skip past the trapping instruction.
    pub len: u8,
    pub destination: Destination,
    pub mnemonic: Mnemonic,
}

/// Decode one instruction of `family` from the start of `bytes`.
pub fn decode<G: GprState + ?Sized>(
    bytes: &[u8],
    mode: DecodeMode,
    family: Family,
    gprs: &G,
) -> Result<DecodedInstruction, EmulationError> {
    let bytes = &bytes[..bytes.len().min(MAX_INST_LEN)];
    let desc = family.descriptor();

    let prefixes = prefix::scan(bytes, mode, desc.prefix)?;
    let hit = lookup(desc, &bytes[prefixes.len..])?;
    let entry = *hit.entry;
    let width = prefixes.width;

    let mut cursor = prefixes.len + hit.len;
    let operands = decode_operands(bytes, cursor, &prefixes, width, mode, gprs)?;
    cursor += operands.len;

    if entry.source == SourceRule::MemOnly && matches!(operands.src, OperandRef::Register(_)) {
        return Err(EmulationError::MalformedOperand);
    }

    let immediate = if entry.needs_immediate {
        let imm = *bytes.get(cursor).ok_or(EmulationError::Truncated)?;
        cursor += 1;
        Some(imm)
    } else {
        None
    };

    Ok(DecodedInstruction {
        family,
        entry,
        width,
        legacy_mmx: width == VectorWidth::Mm64,
        src: operands.src,
        dst: OperandRef::Register(operands.dst),
        immediate,
        len: cursor as u8,
    })
}

enum Plan {
    Lanes(LaneFn),
    Compare(StringControl),
}

/// Validate the destination against the instruction width.
fn destination_index(insn: &DecodedInstruction) -> Result<u8, EmulationError> {
    let OperandRef::Register(index) = insn.dst else {
        return Err(EmulationError::MalformedOperand);
    };
    match (insn.legacy_mmx, insn.width) {
        (true, VectorWidth::Xmm128) => Err(EmulationError::UnsupportedAddressing(
            AddressingFault::LegacyMmxDestination,
        )),
        (false, VectorWidth::Mm64) => Err(EmulationError::MalformedOperand),
        _ => check_register(index, insn.width),
    }
}

/// Compute and commit the result of `insn`.
pub fn execute<R, M>(
    insn: &DecodedInstruction,
    regs: &mut R,
    mem: &mut M,
) -> Result<Emulated, EmulationError>
where
    R: RegisterBank + GprState + ?Sized,
    M: GuestMemory + ?Sized,
{
    let dst_index = destination_index(insn)?;
    if insn.entry.source == SourceRule::MemOnly && !matches!(insn.src, OperandRef::Memory(_)) {
        return Err(EmulationError::MalformedOperand);
    }
    let immediate = match (insn.entry.needs_immediate, insn.immediate) {
        (true, Some(imm)) => imm,
        (true, None) => return Err(EmulationError::MalformedOperand),
        (false, _) => 0,
    };

    // Unsupported compare modes are rejected before memory is touched.
    let plan = match semantics::operation(insn.mnemonic()) {
        Operation::Lanes(f) => Plan::Lanes(f),
        Operation::StringCompare => Plan::Compare(StringControl::parse(immediate)?),
    };

    // Unary results depend on the source alone; the old destination is never read.
    let dst = match insn.entry.arity {
        Arity::Unary => Vector::ZERO,
        Arity::Binary => read_register(&*regs, dst_index, insn.width),
    };
    let src = fetch_source(&*regs, mem, insn.src, insn.width, insn.source_len())?;

    let destination = match plan {
        Plan::Lanes(f) => {
            let ctx = EmulationContext {
                dst,
                src,
                immediate,
                width: insn.width,
            };
            commit_vector(regs, dst_index, insn.width, f(&ctx))
        }
        Plan::Compare(ctrl) => commit_string_compare(insn, &ctrl, dst, src, regs),
    };

    trace!(
        mnemonic = %insn.mnemonic(),
        width = insn.width.bits(),
        lanes = ?insn.entry.lanes,
        len = insn.len,
        ?destination,
        "emulated"
    );

    Ok(Emulated {
        len: insn.len,
        destination,
        mnemonic: insn.mnemonic(),
    })
}

fn commit_string_compare<R>(
    insn: &DecodedInstruction,
    ctrl: &StringControl,
    dst: Vector,
    src: Vector,
    regs: &mut R,
) -> Destination
where
    R: RegisterBank + GprState + ?Sized,
{
    let result = strcmp::compare(ctrl, &dst, &src);
    let destination = match insn.mnemonic() {
        Mnemonic::Pcmpistrm => {
            regs.set128(XMM0, ctrl.mask_vector(result.mask).to_bytes());
            Destination::Xmm(XMM0)
        }
        _ => {
            regs.set_gpr(RCX, u64::from(ctrl.index(result.mask)));
            Destination::Gpr(RCX)
        }
    };
    regs.set_rflags(result.flags.merge_into(regs.rflags()));
    destination
}

/// [`decode`] followed by [`execute`].
pub fn emulate<R, M>(
    bytes: &[u8],
    mode: DecodeMode,
    family: Family,
    regs: &mut R,
    mem: &mut M,
) -> Result<Emulated, EmulationError>
where
    R: RegisterBank + GprState + ?Sized,
    M: GuestMemory + ?Sized,
{
    let result = decode(bytes, mode, family, &*regs).and_then(|insn| execute(&insn, regs, mem));
    if let Err(err) = &result {
        trace!(%family, %err, "not emulated");
    }
    result
}
