// Shared test helpers (integration tests compile as separate crates, so put
// common code in a submodule to avoid it becoming its own test target).
#![allow(dead_code)]

use opemu_core::{Family, FlatMemory, Mnemonic, RegisterFile, Vector, VectorWidth};

/// Base address of the flat memory used by the tests.
pub const MEM_BASE: u64 = 0x10_0000;
pub const MEM_SIZE: usize = 0x1000;

/// Tiny deterministic PRNG for test input generation.
///
/// Randomized tests must reproduce exactly across machines/CI.
pub struct XorShift64(pub u64);

impl XorShift64 {
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    pub fn fill(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(8) {
            let v = self.next_u64().to_le_bytes();
            let n = chunk.len();
            chunk.copy_from_slice(&v[..n]);
        }
    }

    pub fn vector(&mut self) -> Vector {
        let mut bytes = [0u8; 16];
        self.fill(&mut bytes);
        Vector::from_bytes(bytes)
    }

    /// Bytes biased toward lane edge cases (0, -1, MIN, MAX) so saturation and
    /// sign paths get hit.
    pub fn edgy_vector(&mut self) -> Vector {
        let mut v = self.vector().to_bytes();
        for b in v.iter_mut() {
            match self.next_u64() % 8 {
                0 => *b = 0x00,
                1 => *b = 0xFF,
                2 => *b = 0x80,
                3 => *b = 0x7F,
                _ => {}
            }
        }
        Vector::from_bytes(v)
    }
}

pub fn machine() -> (RegisterFile, FlatMemory) {
    (RegisterFile::default(), FlatMemory::new(MEM_BASE, MEM_SIZE))
}

/// One row of the opcode map, as raw encoding pieces.
#[derive(Debug, Clone, Copy)]
pub struct Encoding {
    pub family: Family,
    pub mnemonic: Mnemonic,
    pub prefix: Option<u8>,
    pub escape: &'static [u8],
    pub opcode: u8,
    pub imm: bool,
}

impl Encoding {
    const fn new(
        family: Family,
        mnemonic: Mnemonic,
        prefix: Option<u8>,
        escape: &'static [u8],
        opcode: u8,
    ) -> Self {
        Self {
            family,
            mnemonic,
            prefix,
            escape,
            opcode,
            imm: false,
        }
    }

    const fn imm8(mut self) -> Self {
        self.imm = true;
        self
    }

    /// Encode with an explicit REX byte (or none) and ModRM, plus `tail`
    /// (SIB/displacement) and the imm8 when the instruction takes one.
    pub fn encode(&self, rex: Option<u8>, modrm: u8, tail: &[u8], imm: u8) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(self.prefix);
        out.extend(rex);
        out.extend_from_slice(self.escape);
        out.push(self.opcode);
        out.push(modrm);
        out.extend_from_slice(tail);
        if self.imm {
            out.push(imm);
        }
        out
    }

    /// Register-direct form: `reg` is the destination, `rm` the source.
    pub fn reg_reg(&self, reg: u8, rm: u8, imm: u8) -> Vec<u8> {
        self.encode(None, 0xC0 | ((reg & 7) << 3) | (rm & 7), &[], imm)
    }

    /// Widths the instruction exists in.
    pub fn widths(&self) -> &'static [VectorWidth] {
        match self.family {
            Family::Ssse3 => &[VectorWidth::Mm64, VectorWidth::Xmm128],
            _ => &[VectorWidth::Xmm128],
        }
    }

    /// Same encoding with the operand-size prefix dropped (SSSE3 MMX form).
    pub fn mmx(&self) -> Self {
        Self {
            prefix: None,
            ..*self
        }
    }

    pub fn at_width(&self, width: VectorWidth) -> Self {
        match width {
            VectorWidth::Mm64 => self.mmx(),
            VectorWidth::Xmm128 => *self,
        }
    }
}

const E0F38: &[u8] = &[0x0F, 0x38];
const E0F3A: &[u8] = &[0x0F, 0x3A];
const E0F: &[u8] = &[0x0F];

/// Every emulated instruction, 128-bit form.
pub const ENCODINGS: &[Encoding] = &[
    Encoding::new(Family::Ssse3, Mnemonic::Pshufb, Some(0x66), E0F38, 0x00),
    Encoding::new(Family::Ssse3, Mnemonic::Phaddw, Some(0x66), E0F38, 0x01),
    Encoding::new(Family::Ssse3, Mnemonic::Phaddd, Some(0x66), E0F38, 0x02),
    Encoding::new(Family::Ssse3, Mnemonic::Phaddsw, Some(0x66), E0F38, 0x03),
    Encoding::new(Family::Ssse3, Mnemonic::Pmaddubsw, Some(0x66), E0F38, 0x04),
    Encoding::new(Family::Ssse3, Mnemonic::Phsubw, Some(0x66), E0F38, 0x05),
    Encoding::new(Family::Ssse3, Mnemonic::Phsubd, Some(0x66), E0F38, 0x06),
    Encoding::new(Family::Ssse3, Mnemonic::Phsubsw, Some(0x66), E0F38, 0x07),
    Encoding::new(Family::Ssse3, Mnemonic::Psignb, Some(0x66), E0F38, 0x08),
    Encoding::new(Family::Ssse3, Mnemonic::Psignw, Some(0x66), E0F38, 0x09),
    Encoding::new(Family::Ssse3, Mnemonic::Psignd, Some(0x66), E0F38, 0x0A),
    Encoding::new(Family::Ssse3, Mnemonic::Pmulhrsw, Some(0x66), E0F38, 0x0B),
    Encoding::new(Family::Ssse3, Mnemonic::Pabsb, Some(0x66), E0F38, 0x1C),
    Encoding::new(Family::Ssse3, Mnemonic::Pabsw, Some(0x66), E0F38, 0x1D),
    Encoding::new(Family::Ssse3, Mnemonic::Pabsd, Some(0x66), E0F38, 0x1E),
    Encoding::new(Family::Ssse3, Mnemonic::Palignr, Some(0x66), E0F3A, 0x0F).imm8(),
    Encoding::new(Family::Sse3Prefix66, Mnemonic::Haddpd, Some(0x66), E0F, 0x7C),
    Encoding::new(Family::Sse3Prefix66, Mnemonic::Hsubpd, Some(0x66), E0F, 0x7D),
    Encoding::new(Family::Sse3Prefix66, Mnemonic::Addsubpd, Some(0x66), E0F, 0xD0),
    Encoding::new(Family::Sse3PrefixF2, Mnemonic::Haddps, Some(0xF2), E0F, 0x7C),
    Encoding::new(Family::Sse3PrefixF2, Mnemonic::Hsubps, Some(0xF2), E0F, 0x7D),
    Encoding::new(Family::Sse3PrefixF2, Mnemonic::Addsubps, Some(0xF2), E0F, 0xD0),
    Encoding::new(Family::Sse3PrefixF2, Mnemonic::Movddup, Some(0xF2), E0F, 0x12),
    Encoding::new(Family::Sse3PrefixF2, Mnemonic::Lddqu, Some(0xF2), E0F, 0xF0),
    Encoding::new(Family::Sse3PrefixF3, Mnemonic::Movsldup, Some(0xF3), E0F, 0x12),
    Encoding::new(Family::Sse3PrefixF3, Mnemonic::Movshdup, Some(0xF3), E0F, 0x16),
    Encoding::new(Family::Sse42String, Mnemonic::Pcmpistri, Some(0x66), E0F3A, 0x63).imm8(),
    Encoding::new(Family::Sse42String, Mnemonic::Pcmpistrm, Some(0x66), E0F3A, 0x62).imm8(),
];

pub fn encoding(mnemonic: Mnemonic) -> Encoding {
    *ENCODINGS
        .iter()
        .find(|e| e.mnemonic == mnemonic)
        .unwrap_or_else(|| panic!("no encoding for {mnemonic}"))
}
