//! Per-family opcode tables.
//!
//! Each [`Family`] is described by a static [`FamilyDescriptor`]: the prefix
//! rule, and one or more escape maps listing the opcodes the family emulates.
//! A single decoder walks these tables; there is no per-family decode loop.

use core::fmt;

use crate::error::EmulationError;
use crate::prefix::PrefixRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    // SSSE3 (0F 38 / 0F 3A).
    Pshufb,
    Phaddw,
    Phaddd,
    Phaddsw,
    Pmaddubsw,
    Phsubw,
    Phsubd,
    Phsubsw,
    Psignb,
    Psignw,
    Psignd,
    Pmulhrsw,
    Palignr,
    Pabsb,
    Pabsw,
    Pabsd,
    // SSE3.
    Haddpd,
    Hsubpd,
    Addsubpd,
    Haddps,
    Hsubps,
    Addsubps,
    Movddup,
    Lddqu,
    Movsldup,
    Movshdup,
    // SSE4.2 implicit-length string compare.
    Pcmpistri,
    Pcmpistrm,
}

impl Mnemonic {
    pub const fn name(self) -> &'static str {
        match self {
            Mnemonic::Pshufb => "pshufb",
            Mnemonic::Phaddw => "phaddw",
            Mnemonic::Phaddd => "phaddd",
            Mnemonic::Phaddsw => "phaddsw",
            Mnemonic::Pmaddubsw => "pmaddubsw",
            Mnemonic::Phsubw => "phsubw",
            Mnemonic::Phsubd => "phsubd",
            Mnemonic::Phsubsw => "phsubsw",
            Mnemonic::Psignb => "psignb",
            Mnemonic::Psignw => "psignw",
            Mnemonic::Psignd => "psignd",
            Mnemonic::Pmulhrsw => "pmulhrsw",
            Mnemonic::Palignr => "palignr",
            Mnemonic::Pabsb => "pabsb",
            Mnemonic::Pabsw => "pabsw",
            Mnemonic::Pabsd => "pabsd",
            Mnemonic::Haddpd => "haddpd",
            Mnemonic::Hsubpd => "hsubpd",
            Mnemonic::Addsubpd => "addsubpd",
            Mnemonic::Haddps => "haddps",
            Mnemonic::Hsubps => "hsubps",
            Mnemonic::Addsubps => "addsubps",
            Mnemonic::Movddup => "movddup",
            Mnemonic::Lddqu => "lddqu",
            Mnemonic::Movsldup => "movsldup",
            Mnemonic::Movshdup => "movshdup",
            Mnemonic::Pcmpistri => "pcmpistri",
            Mnemonic::Pcmpistrm => "pcmpistrm",
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lane interpretation used by an instruction.
///
/// Table metadata for logs and tooling; each semantic function fixes its own
/// lane type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneClass {
    Byte,
    Word,
    Dword,
    Qword,
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Result depends on the source only (`pabs*`, duplicates, `lddqu`), so
    /// the destination register is not read.
    Unary,
    Binary,
}

/// Which source operand forms an instruction accepts, and how wide the memory
/// read is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRule {
    /// Register or memory; memory reads the full operand width.
    RegOrMem,
    /// Register or memory; memory reads only 8 bytes (`movddup xmm, m64`).
    Low64,
    /// Memory only (`lddqu xmm, m128`).
    MemOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeEntry {
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub lanes: LaneClass,
    pub arity: Arity,
    pub needs_immediate: bool,
    pub source: SourceRule,
}

impl OpcodeEntry {
    const fn binary(opcode: u8, mnemonic: Mnemonic, lanes: LaneClass) -> Self {
        Self {
            opcode,
            mnemonic,
            lanes,
            arity: Arity::Binary,
            needs_immediate: false,
            source: SourceRule::RegOrMem,
        }
    }

    const fn unary(opcode: u8, mnemonic: Mnemonic, lanes: LaneClass) -> Self {
        Self {
            arity: Arity::Unary,
            ..Self::binary(opcode, mnemonic, lanes)
        }
    }

    const fn imm8(self) -> Self {
        Self {
            needs_immediate: true,
            ..self
        }
    }

    const fn source(self, source: SourceRule) -> Self {
        Self { source, ..self }
    }
}

/// Opcode escape sequence following the prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    Map0F,
    Map0F38,
    Map0F3A,
}

impl Escape {
    pub const fn bytes(self) -> &'static [u8] {
        match self {
            Escape::Map0F => &[0x0F],
            Escape::Map0F38 => &[0x0F, 0x38],
            Escape::Map0F3A => &[0x0F, 0x3A],
        }
    }
}

#[derive(Debug)]
pub struct OpcodeMap {
    pub escape: Escape,
    pub entries: &'static [OpcodeEntry],
}

#[derive(Debug)]
pub struct FamilyDescriptor {
    pub family: Family,
    pub prefix: PrefixRule,
    pub maps: &'static [OpcodeMap],
}

impl FamilyDescriptor {
    /// Find the table entry for `mnemonic`, if this family emulates it.
    pub fn entry(&self, mnemonic: Mnemonic) -> Option<&'static OpcodeEntry> {
        self.maps
            .iter()
            .flat_map(|map| map.entries.iter())
            .find(|entry| entry.mnemonic == mnemonic)
    }
}

/// An instruction family: the unit a trap handler tries, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// SSSE3 with both 64-bit (MMX) and 128-bit (`66`) forms.
    Ssse3,
    /// SSE3 double-precision horizontal ops (`66 0F`).
    Sse3Prefix66,
    /// SSE3 single-precision horizontal ops, `movddup`, `lddqu` (`F2 0F`).
    Sse3PrefixF2,
    /// SSE3 `movsldup` / `movshdup` (`F3 0F`).
    Sse3PrefixF3,
    /// SSE4.2 `pcmpistri` / `pcmpistrm` (`66 0F 3A`).
    Sse42String,
}

impl Family {
    /// The order in which a trap handler should attempt the families.
    pub const PRIORITY: [Family; 5] = [
        Family::Ssse3,
        Family::Sse3Prefix66,
        Family::Sse3PrefixF2,
        Family::Sse3PrefixF3,
        Family::Sse42String,
    ];

    pub fn descriptor(self) -> &'static FamilyDescriptor {
        match self {
            Family::Ssse3 => &SSSE3,
            Family::Sse3Prefix66 => &SSE3_66,
            Family::Sse3PrefixF2 => &SSE3_F2,
            Family::Sse3PrefixF3 => &SSE3_F3,
            Family::Sse42String => &SSE42_STRING,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Family::Ssse3 => "ssse3",
            Family::Sse3Prefix66 => "sse3-66",
            Family::Sse3PrefixF2 => "sse3-f2",
            Family::Sse3PrefixF3 => "sse3-f3",
            Family::Sse42String => "sse4.2-string",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

use LaneClass::{Byte, Double, Dword, Qword, Single, Word};
use Mnemonic as M;

static SSSE3_0F38: [OpcodeEntry; 15] = [
    OpcodeEntry::binary(0x00, M::Pshufb, Byte),
    OpcodeEntry::binary(0x01, M::Phaddw, Word),
    OpcodeEntry::binary(0x02, M::Phaddd, Dword),
    OpcodeEntry::binary(0x03, M::Phaddsw, Word),
    OpcodeEntry::binary(0x04, M::Pmaddubsw, Byte),
    OpcodeEntry::binary(0x05, M::Phsubw, Word),
    OpcodeEntry::binary(0x06, M::Phsubd, Dword),
    OpcodeEntry::binary(0x07, M::Phsubsw, Word),
    OpcodeEntry::binary(0x08, M::Psignb, Byte),
    OpcodeEntry::binary(0x09, M::Psignw, Word),
    OpcodeEntry::binary(0x0A, M::Psignd, Dword),
    OpcodeEntry::binary(0x0B, M::Pmulhrsw, Word),
    OpcodeEntry::unary(0x1C, M::Pabsb, Byte),
    OpcodeEntry::unary(0x1D, M::Pabsw, Word),
    OpcodeEntry::unary(0x1E, M::Pabsd, Dword),
];

static SSSE3_0F3A: [OpcodeEntry; 1] = [OpcodeEntry::binary(0x0F, M::Palignr, Byte).imm8()];

static SSE3_66_0F: [OpcodeEntry; 3] = [
    OpcodeEntry::binary(0x7C, M::Haddpd, Double),
    OpcodeEntry::binary(0x7D, M::Hsubpd, Double),
    OpcodeEntry::binary(0xD0, M::Addsubpd, Double),
];

static SSE3_F2_0F: [OpcodeEntry; 5] = [
    OpcodeEntry::binary(0x7C, M::Haddps, Single),
    OpcodeEntry::binary(0x7D, M::Hsubps, Single),
    OpcodeEntry::binary(0xD0, M::Addsubps, Single),
    OpcodeEntry::unary(0x12, M::Movddup, Qword).source(SourceRule::Low64),
    OpcodeEntry::unary(0xF0, M::Lddqu, Byte).source(SourceRule::MemOnly),
];

static SSE3_F3_0F: [OpcodeEntry; 2] = [
    OpcodeEntry::unary(0x12, M::Movsldup, Dword),
    OpcodeEntry::unary(0x16, M::Movshdup, Dword),
];

static SSE42_0F3A: [OpcodeEntry; 2] = [
    OpcodeEntry::binary(0x63, M::Pcmpistri, Byte).imm8(),
    OpcodeEntry::binary(0x62, M::Pcmpistrm, Byte).imm8(),
];

static SSSE3: FamilyDescriptor = FamilyDescriptor {
    family: Family::Ssse3,
    prefix: PrefixRule::OptionalOperandSize,
    maps: &[
        OpcodeMap {
            escape: Escape::Map0F38,
            entries: &SSSE3_0F38,
        },
        OpcodeMap {
            escape: Escape::Map0F3A,
            entries: &SSSE3_0F3A,
        },
    ],
};

static SSE3_66: FamilyDescriptor = FamilyDescriptor {
    family: Family::Sse3Prefix66,
    prefix: PrefixRule::Mandatory(0x66),
    maps: &[OpcodeMap {
        escape: Escape::Map0F,
        entries: &SSE3_66_0F,
    }],
};

static SSE3_F2: FamilyDescriptor = FamilyDescriptor {
    family: Family::Sse3PrefixF2,
    prefix: PrefixRule::Mandatory(0xF2),
    maps: &[OpcodeMap {
        escape: Escape::Map0F,
        entries: &SSE3_F2_0F,
    }],
};

static SSE3_F3: FamilyDescriptor = FamilyDescriptor {
    family: Family::Sse3PrefixF3,
    prefix: PrefixRule::Mandatory(0xF3),
    maps: &[OpcodeMap {
        escape: Escape::Map0F,
        entries: &SSE3_F3_0F,
    }],
};

static SSE42_STRING: FamilyDescriptor = FamilyDescriptor {
    family: Family::Sse42String,
    prefix: PrefixRule::Mandatory(0x66),
    maps: &[OpcodeMap {
        escape: Escape::Map0F3A,
        entries: &SSE42_0F3A,
    }],
};

/// An opcode table hit.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeMatch {
    pub entry: &'static OpcodeEntry,
    /// Escape + opcode bytes consumed.
    pub len: usize,
}

/// Match the escape and opcode bytes at the start of `bytes` (i.e. right after
/// the prefixes) against `desc`.
///
/// No escape of the family matches → [`EmulationError::UnrecognizedPrefix`];
/// escape matches but the opcode is not listed →
/// [`EmulationError::UnrecognizedOpcode`].
pub fn lookup(desc: &FamilyDescriptor, bytes: &[u8]) -> Result<OpcodeMatch, EmulationError> {
    // Prefer the longest escape so `0F 38 xx` is never read as `0F` + opcode 0x38.
    let map = desc
        .maps
        .iter()
        .filter(|map| bytes.starts_with(map.escape.bytes()))
        .max_by_key(|map| map.escape.bytes().len())
        .ok_or(EmulationError::UnrecognizedPrefix)?;

    let escape_len = map.escape.bytes().len();
    let opcode = *bytes.get(escape_len).ok_or(EmulationError::Truncated)?;
    let entry = map
        .entries
        .iter()
        .find(|entry| entry.opcode == opcode)
        .ok_or(EmulationError::UnrecognizedOpcode { opcode })?;

    Ok(OpcodeMatch {
        entry,
        len: escape_len + 1,
    })
}
