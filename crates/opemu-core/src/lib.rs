#![forbid(unsafe_code)]

//! Trap-time emulation of the SSSE3 / SSE3 / SSE4.2 string-compare subset.
//!
//! A kernel that runs on a CPU lacking these extensions takes a `#UD` trap when
//! it hits one of them. The trap handler hands the faulting bytes to this crate,
//! together with access to the saved register state ([`RegisterBank`],
//! [`GprState`]) and to memory ([`GuestMemory`]). The crate decodes exactly one
//! instruction of the requested [`Family`], computes the architectural result,
//! commits it, and reports how many bytes to skip.
//!
//! The crate never tries more than one family per call: a mismatch is reported
//! as an error with [`EmulationError::is_family_mismatch`] set, so the caller can
//! move on to the next family in its own priority order (see `opemu-trap`).
//!
//! Pipeline (one call, no state kept between calls):
//!
//! ```text
//! bytes -> prefix::scan -> opcode::lookup -> modrm::decode_operands
//!       -> operand::fetch -> semantics -> operand::commit -> Emulated
//! ```

pub mod decoder;
pub mod error;
pub mod mem;
pub mod modrm;
pub mod opcode;
pub mod operand;
pub mod prefix;
pub mod semantics;
pub mod vector;

pub use decoder::{decode, emulate, execute, DecodedInstruction, Emulated};
pub use error::{AddressingFault, EmulationError, MemoryFault};
pub use mem::{FlatMemory, GuestMemory};
pub use modrm::OperandRef;
pub use opcode::{Family, Mnemonic};
pub use operand::{Destination, GprState, RegisterBank, RegisterFile};
pub use vector::{Lane, Vector, VectorWidth};

/// Maximum x86 instruction length (architectural limit).
pub const MAX_INST_LEN: usize = 15;

/// Execution width of the trapped context.
///
/// Selects 32- or 64-bit effective-address arithmetic and whether `0x40..=0x4F`
/// bytes are REX prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeMode {
    Bits32,
    Bits64,
}

impl DecodeMode {
    #[inline]
    pub const fn is_long(self) -> bool {
        matches!(self, DecodeMode::Bits64)
    }

    /// Truncate an address or register value to the mode's address width.
    #[inline]
    pub const fn mask(self, value: u64) -> u64 {
        match self {
            DecodeMode::Bits32 => value & 0xFFFF_FFFF,
            DecodeMode::Bits64 => value,
        }
    }
}
