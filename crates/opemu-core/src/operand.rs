//! Register capabilities and operand fetch / commit.

use crate::error::EmulationError;
use crate::mem::GuestMemory;
use crate::modrm::OperandRef;
use crate::vector::{Vector, VectorWidth};

pub const XMM_COUNT: u8 = 16;
pub const MM_COUNT: u8 = 8;
pub const GPR_COUNT: u8 = 16;

/// The saved vector register state of the trapped context.
///
/// XMM indices are `0..16`, MM indices `0..8`. The core validates indices
/// before calling in.
pub trait RegisterBank {
    fn get128(&self, index: u8) -> [u8; 16];
    fn set128(&mut self, index: u8, value: [u8; 16]);
    fn get64(&self, index: u8) -> [u8; 8];
    fn set64(&mut self, index: u8, value: [u8; 8]);
}

/// General-purpose registers (0 = rax ... 15 = r15) and RFLAGS.
pub trait GprState {
    fn gpr(&self, index: u8) -> u64;
    fn set_gpr(&mut self, index: u8, value: u64);
    fn rflags(&self) -> u64;
    fn set_rflags(&mut self, value: u64);
}

impl<T: RegisterBank + ?Sized> RegisterBank for &mut T {
    fn get128(&self, index: u8) -> [u8; 16] {
        (**self).get128(index)
    }
    fn set128(&mut self, index: u8, value: [u8; 16]) {
        (**self).set128(index, value)
    }
    fn get64(&self, index: u8) -> [u8; 8] {
        (**self).get64(index)
    }
    fn set64(&mut self, index: u8, value: [u8; 8]) {
        (**self).set64(index, value)
    }
}

impl<T: GprState + ?Sized> GprState for &mut T {
    fn gpr(&self, index: u8) -> u64 {
        (**self).gpr(index)
    }
    fn set_gpr(&mut self, index: u8, value: u64) {
        (**self).set_gpr(index, value)
    }
    fn rflags(&self) -> u64 {
        (**self).rflags()
    }
    fn set_rflags(&mut self, value: u64) {
        (**self).set_rflags(value)
    }
}

/// The register that received an instruction's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Xmm(u8),
    Mm(u8),
    /// `pcmpistri` writes its index to a general-purpose register (ECX/RCX).
    Gpr(u8),
}

/// Plain in-memory register state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    pub xmm: [[u8; 16]; 16],
    pub mm: [[u8; 8]; 8],
    pub gpr: [u64; 16],
    pub rflags: u64,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            xmm: [[0; 16]; 16],
            mm: [[0; 8]; 8],
            gpr: [0; 16],
            // Bit 1 is reserved and always reads as one.
            rflags: 0x2,
        }
    }
}

impl RegisterFile {
    pub fn xmm(&self, index: usize) -> Vector {
        Vector::from_bytes(self.xmm[index])
    }

    pub fn set_xmm(&mut self, index: usize, value: impl Into<Vector>) {
        self.xmm[index] = value.into().to_bytes();
    }

    pub fn mm(&self, index: usize) -> Vector {
        Vector::from_mm(self.mm[index])
    }

    pub fn set_mm(&mut self, index: usize, value: impl Into<Vector>) {
        self.mm[index] = value.into().to_mm();
    }
}

impl RegisterBank for RegisterFile {
    fn get128(&self, index: u8) -> [u8; 16] {
        self.xmm[index as usize]
    }
    fn set128(&mut self, index: u8, value: [u8; 16]) {
        self.xmm[index as usize] = value;
    }
    fn get64(&self, index: u8) -> [u8; 8] {
        self.mm[index as usize]
    }
    fn set64(&mut self, index: u8, value: [u8; 8]) {
        self.mm[index as usize] = value;
    }
}

impl GprState for RegisterFile {
    fn gpr(&self, index: u8) -> u64 {
        self.gpr[index as usize]
    }
    fn set_gpr(&mut self, index: u8, value: u64) {
        self.gpr[index as usize] = value;
    }
    fn rflags(&self) -> u64 {
        self.rflags
    }
    fn set_rflags(&mut self, value: u64) {
        self.rflags = value;
    }
}

/// Check a vector register index against the bank `width` selects.
#[inline]
pub fn check_register(index: u8, width: VectorWidth) -> Result<u8, EmulationError> {
    let limit = match width {
        VectorWidth::Mm64 => MM_COUNT,
        VectorWidth::Xmm128 => XMM_COUNT,
    };
    if index < limit {
        Ok(index)
    } else {
        Err(EmulationError::MalformedOperand)
    }
}

pub fn read_register<R: RegisterBank + ?Sized>(regs: &R, index: u8, width: VectorWidth) -> Vector {
    match width {
        VectorWidth::Mm64 => Vector::from_mm(regs.get64(index)),
        VectorWidth::Xmm128 => Vector::from_bytes(regs.get128(index)),
    }
}

/// Fetch a source operand. Memory sources read exactly `read_len` bytes.
pub fn fetch_source<R, M>(
    regs: &R,
    mem: &mut M,
    src: OperandRef,
    width: VectorWidth,
    read_len: usize,
) -> Result<Vector, EmulationError>
where
    R: RegisterBank + ?Sized,
    M: GuestMemory + ?Sized,
{
    match src {
        OperandRef::Register(index) => Ok(read_register(regs, check_register(index, width)?, width)),
        OperandRef::Memory(addr) => {
            let mut buf = [0u8; 16];
            let buf = &mut buf[..read_len.min(16)];
            mem.read(addr, buf)?;
            Ok(Vector::from_slice(buf, width))
        }
    }
}

/// Write a full vector to `index`. Returns the [`Destination`] written.
pub fn commit_vector<R: RegisterBank + ?Sized>(
    regs: &mut R,
    index: u8,
    width: VectorWidth,
    value: Vector,
) -> Destination {
    match width {
        VectorWidth::Mm64 => {
            regs.set64(index, value.to_mm());
            Destination::Mm(index)
        }
        VectorWidth::Xmm128 => {
            regs.set128(index, value.to_bytes());
            Destination::Xmm(index)
        }
    }
}
