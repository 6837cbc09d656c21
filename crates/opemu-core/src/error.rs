use thiserror::Error;

/// Addressing forms the decoder recognizes but does not emulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum AddressingFault {
    /// A SIB byte combined with REX.B or REX.X (r8-r15 as base/index).
    #[error("SIB addressing with an extended register")]
    SibWithExtendedRegister,
    /// `mod == 0, rm == 5` in 64-bit mode.
    #[error("RIP-relative addressing")]
    RipRelative,
    /// A 128-bit encoding whose destination lives in the MM register bank.
    #[error("MMX destination under a 128-bit encoding")]
    LegacyMmxDestination,
}

/// A guest memory read could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("memory read of {len} bytes at 0x{addr:x} failed")]
pub struct MemoryFault {
    pub addr: u64,
    pub len: usize,
}

/// Why a decode/execute call did not complete.
///
/// Every variant means zero bytes were consumed and no register or flag was
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmulationError {
    /// The prefix/escape bytes do not belong to the family being attempted.
    #[error("prefix or escape bytes do not match the instruction family")]
    UnrecognizedPrefix,
    /// The escape matched but the opcode byte is not in the family's table.
    #[error("unrecognized opcode 0x{opcode:02x}")]
    UnrecognizedOpcode { opcode: u8 },
    #[error("unsupported addressing: {0}")]
    UnsupportedAddressing(AddressingFault),
    /// String-compare aggregation/polarity other than a positive equal-any scan.
    #[error("unimplemented string comparison mode (imm8=0x{imm:02x})")]
    UnimplementedComparisonMode { imm: u8 },
    /// An operand kind the instruction does not accept (e.g. a memory
    /// destination, or a register source for `lddqu`).
    #[error("malformed operand")]
    MalformedOperand,
    /// The buffer ended before ModRM/SIB/displacement/immediate bytes.
    #[error("instruction bytes truncated")]
    Truncated,
    #[error("source operand fault at 0x{addr:x}")]
    MemoryFault { addr: u64 },
}

impl EmulationError {
    /// Whether the caller should try the next instruction family.
    ///
    /// Only prefix/opcode mismatches qualify; any other error means the bytes
    /// *were* recognized as this family and no other family will accept them.
    #[inline]
    pub const fn is_family_mismatch(&self) -> bool {
        matches!(
            self,
            EmulationError::UnrecognizedPrefix | EmulationError::UnrecognizedOpcode { .. }
        )
    }
}

impl From<MemoryFault> for EmulationError {
    fn from(fault: MemoryFault) -> Self {
        EmulationError::MemoryFault { addr: fault.addr }
    }
}
