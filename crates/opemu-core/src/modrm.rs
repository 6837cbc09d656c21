//! ModRM / SIB / displacement decoding and effective-address computation.

use crate::error::{AddressingFault, EmulationError};
use crate::operand::GprState;
use crate::prefix::PrefixState;
use crate::vector::VectorWidth;
use crate::DecodeMode;

/// Where an operand lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandRef {
    /// Register index in the bank selected by the instruction width.
    Register(u8),
    /// Effective address, already wrapped to the decode mode's width.
    Memory(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModRm {
    pub mod_bits: u8,
    pub reg: u8,
    pub rm: u8,
}

impl ModRm {
    #[inline]
    pub const fn from_byte(b: u8) -> Self {
        Self {
            mod_bits: (b >> 6) & 0b11,
            reg: (b >> 3) & 0b111,
            rm: b & 0b111,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sib {
    pub scale: u8,
    pub index: u8,
    pub base: u8,
}

impl Sib {
    #[inline]
    pub const fn from_byte(b: u8) -> Self {
        Self {
            scale: (b >> 6) & 0b11,
            index: (b >> 3) & 0b111,
            base: b & 0b111,
        }
    }
}

/// Decoded operand locations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operands {
    /// Destination register index (ModRM.reg).
    pub dst: u8,
    pub src: OperandRef,
    /// ModRM + SIB + displacement bytes consumed.
    pub len: usize,
}

fn read_disp32(bytes: &[u8], at: usize) -> Result<i32, EmulationError> {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(
        bytes
            .get(at..at + 4)
            .ok_or(EmulationError::Truncated)?,
    );
    Ok(i32::from_le_bytes(buf))
}

/// Decode the ModRM byte at `bytes[cursor]` and everything hanging off it.
///
/// MM register operands use the low three bits of `reg`/`rm` only; REX.R and
/// REX.B extend XMM indices and (REX.B) the memory base register.
pub fn decode_operands<G: GprState + ?Sized>(
    bytes: &[u8],
    cursor: usize,
    prefixes: &PrefixState,
    width: VectorWidth,
    mode: DecodeMode,
    gprs: &G,
) -> Result<Operands, EmulationError> {
    let modrm = ModRm::from_byte(*bytes.get(cursor).ok_or(EmulationError::Truncated)?);
    let xmm = width == VectorWidth::Xmm128;
    let mut used = 1usize;

    let dst = modrm.reg | if xmm && prefixes.dst_high() { 0b1000 } else { 0 };

    if modrm.mod_bits == 0b11 {
        let src = modrm.rm | if xmm && prefixes.src_high() { 0b1000 } else { 0 };
        return Ok(Operands {
            dst,
            src: OperandRef::Register(src),
            len: used,
        });
    }

    let reg = |index: u8| mode.mask(gprs.gpr(index));
    let mut addr: u64;

    if modrm.rm == 0b100 {
        if prefixes.src_high() || prefixes.index_high() {
            return Err(EmulationError::UnsupportedAddressing(
                AddressingFault::SibWithExtendedRegister,
            ));
        }
        let sib = Sib::from_byte(*bytes.get(cursor + used).ok_or(EmulationError::Truncated)?);
        used += 1;

        addr = if sib.base == 0b101 && modrm.mod_bits == 0b00 {
            let disp = read_disp32(bytes, cursor + used)?;
            used += 4;
            disp as i64 as u64
        } else {
            reg(sib.base)
        };
        // Index 4 (rsp) means "no index".
        if sib.index != 0b100 {
            addr = addr.wrapping_add(reg(sib.index) << sib.scale);
        }
    } else if modrm.rm == 0b101 && modrm.mod_bits == 0b00 {
        if mode.is_long() {
            return Err(EmulationError::UnsupportedAddressing(AddressingFault::RipRelative));
        }
        let disp = read_disp32(bytes, cursor + used)?;
        used += 4;
        addr = disp as i64 as u64;
    } else {
        let base = modrm.rm | if prefixes.src_high() { 0b1000 } else { 0 };
        addr = reg(base);
    }

    match modrm.mod_bits {
        0b01 => {
            let disp = *bytes.get(cursor + used).ok_or(EmulationError::Truncated)? as i8;
            used += 1;
            addr = addr.wrapping_add(disp as i64 as u64);
        }
        0b10 => {
            let disp = read_disp32(bytes, cursor + used)?;
            used += 4;
            addr = addr.wrapping_add(disp as i64 as u64);
        }
        _ => {}
    }

    Ok(Operands {
        dst,
        src: OperandRef::Memory(mode.mask(addr)),
        len: used,
    })
}
