use crate::error::MemoryFault;

/// Read access to the trapped context's memory.
///
/// Implementations decide whether an address is dereferenced directly or
/// copied in from another address space; the core only needs fixed-size reads.
pub trait GuestMemory {
    /// Fill `buf` from `addr`. A partial read must be reported as a fault.
    fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryFault>;
}

impl<T: GuestMemory + ?Sized> GuestMemory for &mut T {
    #[inline]
    fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryFault> {
        (**self).read(addr, buf)
    }
}

/// Bounds-checked flat memory starting at `base`.
#[derive(Debug, Clone, Default)]
pub struct FlatMemory {
    base: u64,
    mem: Vec<u8>,
}

impl FlatMemory {
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            mem: vec![0; size],
        }
    }

    /// Copy `data` to `addr`. Fails without writing if any byte falls outside
    /// the buffer.
    pub fn load(&mut self, addr: u64, data: &[u8]) -> Result<(), MemoryFault> {
        let range = self.range(addr, data.len()).ok_or(MemoryFault {
            addr,
            len: data.len(),
        })?;
        self.mem[range].copy_from_slice(data);
        Ok(())
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    fn range(&self, addr: u64, len: usize) -> Option<core::ops::Range<usize>> {
        let start = usize::try_from(addr.checked_sub(self.base)?).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.mem.len()).then_some(start..end)
    }
}

impl GuestMemory for FlatMemory {
    fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryFault> {
        let range = self.range(addr, buf.len()).ok_or(MemoryFault {
            addr,
            len: buf.len(),
        })?;
        buf.copy_from_slice(&self.mem[range]);
        Ok(())
    }
}
