//! Legacy/mandatory prefix and REX scanning.

use crate::error::EmulationError;
use crate::vector::VectorWidth;
use crate::DecodeMode;

/// How a family uses the `66`/`F2`/`F3` prefix slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixRule {
    /// `66` selects the 128-bit form; no prefix selects the 64-bit MMX form.
    /// `F2`/`F3` are rejected.
    OptionalOperandSize,
    /// Exactly this prefix must be present; the instruction is always 128-bit.
    Mandatory(u8),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RexPrefix {
    pub w: bool,
    pub r: bool,
    pub x: bool,
    pub b: bool,
}

impl RexPrefix {
    #[inline]
    pub const fn from_byte(b: u8) -> Self {
        Self {
            w: (b & 0b1000) != 0,
            r: (b & 0b0100) != 0,
            x: (b & 0b0010) != 0,
            b: (b & 0b0001) != 0,
        }
    }
}

/// Result of the prefix scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixState {
    /// Number of prefix bytes consumed.
    pub len: usize,
    pub width: VectorWidth,
    /// The `66`/`F2`/`F3` byte, if one was present.
    pub legacy: Option<u8>,
    pub rex: RexPrefix,
}

impl PrefixState {
    /// REX.B: extends ModRM.rm (register source or memory base).
    #[inline]
    pub const fn src_high(&self) -> bool {
        self.rex.b
    }

    /// REX.R: extends ModRM.reg (destination).
    #[inline]
    pub const fn dst_high(&self) -> bool {
        self.rex.r
    }

    /// REX.X: extends SIB.index.
    #[inline]
    pub const fn index_high(&self) -> bool {
        self.rex.x
    }
}

#[inline]
fn is_legacy_prefix(b: u8) -> bool {
    matches!(b, 0x66 | 0xF2 | 0xF3)
}

/// Consume at most one `66`/`F2`/`F3` prefix followed by at most one REX prefix
/// (64-bit mode only), then check the result against `rule`.
///
/// Escape bytes are not examined here; see [`crate::opcode::lookup`].
pub fn scan(bytes: &[u8], mode: DecodeMode, rule: PrefixRule) -> Result<PrefixState, EmulationError> {
    let mut idx = 0usize;
    let mut legacy = None;
    let mut rex = RexPrefix::default();

    if let Some(&b) = bytes.first() {
        if is_legacy_prefix(b) {
            legacy = Some(b);
            idx += 1;
        }
    }

    // In 32-bit mode 0x40..=0x4F are INC/DEC and end the prefix run.
    if mode.is_long() {
        if let Some(&b) = bytes.get(idx) {
            if (0x40..=0x4F).contains(&b) {
                rex = RexPrefix::from_byte(b);
                idx += 1;
            }
        }
    }

    let width = match (rule, legacy) {
        (PrefixRule::OptionalOperandSize, None) => VectorWidth::Mm64,
        (PrefixRule::OptionalOperandSize, Some(0x66)) => VectorWidth::Xmm128,
        (PrefixRule::Mandatory(required), Some(found)) if required == found => VectorWidth::Xmm128,
        _ => return Err(EmulationError::UnrecognizedPrefix),
    };

    Ok(PrefixState {
        len: idx,
        width,
        legacy,
        rex,
    })
}
