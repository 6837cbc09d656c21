//! Implicit-length packed string compare (`pcmpistri` / `pcmpistrm`).
//!
//! Only the equal-any aggregation with positive polarity is emulated. The
//! match mask is a plain scan: destination lane `j` matches when it equals
//! any source lane, with no early termination at a null lane.

use bitflags::bitflags;

use crate::error::EmulationError;
use crate::vector::Vector;

bitflags! {
    /// RFLAGS bits written by the string compares.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u64 {
        const CF = 1 << 0;
        const PF = 1 << 2;
        const AF = 1 << 4;
        const ZF = 1 << 6;
        const SF = 1 << 7;
        const OF = 1 << 11;
    }
}

impl StatusFlags {
    /// Replace the arithmetic flags in `rflags` with `self`, leaving every
    /// other bit untouched.
    #[inline]
    pub fn merge_into(self, rflags: u64) -> u64 {
        (rflags & !StatusFlags::all().bits()) | self.bits()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    EqualAny,
    Ranges,
    EqualEach,
    EqualOrdered,
}

/// Decoded imm8 control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringControl {
    /// 8 x u16 lanes instead of 16 x u8.
    pub words: bool,
    /// Irrelevant to equality; kept for completeness.
    pub signed: bool,
    pub aggregation: Aggregation,
    /// Bits 5:4.
    pub polarity: u8,
    /// Bit 6: most-significant index (`pcmpistri`) or expanded lane mask
    /// (`pcmpistrm`).
    pub bit6: bool,
}

impl StringControl {
    /// Decode `imm`, rejecting any mode that is not emulated.
    pub fn parse(imm: u8) -> Result<Self, EmulationError> {
        let aggregation = match (imm >> 2) & 0b11 {
            0b00 => Aggregation::EqualAny,
            0b01 => Aggregation::Ranges,
            0b10 => Aggregation::EqualEach,
            _ => Aggregation::EqualOrdered,
        };
        let polarity = (imm >> 4) & 0b11;

        // Polarity 10 (masked positive) only differs from 00 past the string
        // terminator, which the plain scan does not track. 01/11 negate.
        if aggregation != Aggregation::EqualAny || polarity & 0b01 != 0 {
            return Err(EmulationError::UnimplementedComparisonMode { imm });
        }

        Ok(Self {
            words: imm & 0b1 != 0,
            signed: imm & 0b10 != 0,
            aggregation,
            polarity,
            bit6: imm & 0b100_0000 != 0,
        })
    }

    #[inline]
    pub const fn lanes(&self) -> usize {
        if self.words {
            8
        } else {
            16
        }
    }

    fn element(&self, v: &Vector, i: usize) -> u16 {
        if self.words {
            v.lane::<u16>(i)
        } else {
            v.lane::<u8>(i) as u16
        }
    }

    /// Bit `j` set when `dst[j]` equals any lane of `src`.
    pub fn match_mask(&self, dst: &Vector, src: &Vector) -> u16 {
        let lanes = self.lanes();
        let mut mask = 0u16;
        for j in 0..lanes {
            let d = self.element(dst, j);
            if (0..lanes).any(|i| self.element(src, i) == d) {
                mask |= 1 << j;
            }
        }
        mask
    }

    pub fn has_null(&self, v: &Vector) -> bool {
        (0..self.lanes()).any(|i| self.element(v, i) == 0)
    }

    /// `pcmpistri` result: lowest (or, with bit 6, highest) set mask bit, or
    /// the lane count when nothing matched.
    pub fn index(&self, mask: u16) -> u32 {
        if mask == 0 {
            self.lanes() as u32
        } else if self.bit6 {
            15 - mask.leading_zeros()
        } else {
            mask.trailing_zeros()
        }
    }

    /// `pcmpistrm` result.
    pub fn mask_vector(&self, mask: u16) -> Vector {
        if !self.bit6 {
            return Vector::from_u128(mask as u128);
        }
        let mut out = Vector::ZERO;
        for j in 0..self.lanes() {
            if mask & (1 << j) != 0 {
                if self.words {
                    out.set_lane(j, u16::MAX);
                } else {
                    out.set_lane(j, u8::MAX);
                }
            }
        }
        out
    }

    pub fn flags(&self, dst: &Vector, src: &Vector, mask: u16) -> StatusFlags {
        let mut flags = StatusFlags::empty();
        flags.set(StatusFlags::CF, mask != 0);
        flags.set(StatusFlags::ZF, self.has_null(src));
        flags.set(StatusFlags::SF, self.has_null(dst));
        flags.set(StatusFlags::OF, mask & 1 != 0);
        flags
    }
}

/// Full result of one string compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareResult {
    pub mask: u16,
    pub flags: StatusFlags,
}

pub fn compare(ctrl: &StringControl, dst: &Vector, src: &Vector) -> CompareResult {
    let mask = ctrl.match_mask(dst, src);
    CompareResult {
        mask,
        flags: ctrl.flags(dst, src, mask),
    }
}
