use core::fmt;

use opemu_core::{
    emulate, DecodeMode, Destination, EmulationError, Family, GprState, GuestMemory, RegisterBank,
    MAX_INST_LEN,
};
use tracing::{debug, warn};

use crate::config::DispatchConfig;

/// What a family decoder did with an instruction it accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handled {
    /// Bytes to skip.
    pub len: u8,
    /// The register written, when the result is a register value.
    pub destination: Option<Destination>,
}

impl From<opemu_core::Emulated> for Handled {
    fn from(e: opemu_core::Emulated) -> Self {
        Self {
            len: e.len,
            destination: Some(e.destination),
        }
    }
}

/// One instruction family, tried in turn by [`TrapDispatcher::handle`].
///
/// Returning an error for which [`EmulationError::is_family_mismatch`] holds
/// hands the bytes to the next family; any other error stops the search.
/// Implementations must not modify `regs` unless they return `Ok`.
pub trait FamilyDecoder<R: ?Sized, M: ?Sized> {
    fn name(&self) -> &'static str;

    fn try_emulate(
        &self,
        bytes: &[u8],
        mode: DecodeMode,
        regs: &mut R,
        mem: &mut M,
    ) -> Result<Handled, EmulationError>;
}

/// A core family from `opemu_core`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreFamily(pub Family);

impl<R, M> FamilyDecoder<R, M> for CoreFamily
where
    R: RegisterBank + GprState + ?Sized,
    M: GuestMemory + ?Sized,
{
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn try_emulate(
        &self,
        bytes: &[u8],
        mode: DecodeMode,
        regs: &mut R,
        mem: &mut M,
    ) -> Result<Handled, EmulationError> {
        emulate(bytes, mode, self.0, regs, mem).map(Handled::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    Emulated {
        len: u8,
        family: &'static str,
        destination: Option<Destination>,
    },
    /// `family` recognized the instruction but cannot emulate it.
    Unemulatable {
        family: &'static str,
        error: EmulationError,
    },
    /// No family recognized the bytes.
    InvalidOpcode,
}

impl TrapOutcome {
    /// Bytes to advance the instruction pointer by; zero means the trap must
    /// be delivered to the faulting context.
    #[inline]
    pub fn bytes_consumed(&self) -> usize {
        match self {
            TrapOutcome::Emulated { len, .. } => *len as usize,
            TrapOutcome::Unemulatable { .. } | TrapOutcome::InvalidOpcode => 0,
        }
    }
}

/// Lowercase hex dump for log fields.
struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Tries every registered family in order until one accepts the bytes.
pub struct TrapDispatcher<R: ?Sized, M: ?Sized> {
    decoders: Vec<Box<dyn FamilyDecoder<R, M>>>,
}

impl<R, M> TrapDispatcher<R, M>
where
    R: RegisterBank + GprState + ?Sized + 'static,
    M: GuestMemory + ?Sized + 'static,
{
    /// Register the core families enabled in `config`, in priority order.
    pub fn new(config: DispatchConfig) -> Self {
        let decoders = config
            .families
            .families()
            .map(|family| Box::new(CoreFamily(family)) as Box<dyn FamilyDecoder<R, M>>)
            .collect();
        Self { decoders }
    }
}

impl<R: ?Sized, M: ?Sized> TrapDispatcher<R, M> {
    /// Append a sibling family (e.g. `sysenter`, `rdmsr`), tried after every
    /// family registered so far.
    pub fn with_sibling(mut self, decoder: impl FamilyDecoder<R, M> + 'static) -> Self {
        self.decoders.push(Box::new(decoder));
        self
    }

    /// Names of the registered families, in the order they are tried.
    pub fn families(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.decoders.iter().map(|d| d.name())
    }

    pub fn handle(&self, bytes: &[u8], mode: DecodeMode, regs: &mut R, mem: &mut M) -> TrapOutcome {
        let bytes = &bytes[..bytes.len().min(MAX_INST_LEN)];
        if bytes.is_empty() {
            warn!("empty instruction buffer");
            return TrapOutcome::InvalidOpcode;
        }

        for decoder in &self.decoders {
            match decoder.try_emulate(bytes, mode, regs, mem) {
                Ok(handled) => {
                    debug!(
                        family = decoder.name(),
                        len = handled.len,
                        destination = ?handled.destination,
                        "emulated trapped instruction"
                    );
                    return TrapOutcome::Emulated {
                        len: handled.len,
                        family: decoder.name(),
                        destination: handled.destination,
                    };
                }
                Err(err) if err.is_family_mismatch() => continue,
                Err(error) => {
                    warn!(
                        family = decoder.name(),
                        bytes = %Hex(bytes),
                        %error,
                        "recognized but unemulatable instruction"
                    );
                    return TrapOutcome::Unemulatable {
                        family: decoder.name(),
                        error,
                    };
                }
            }
        }

        warn!(bytes = %Hex(bytes), "invalid opcode");
        TrapOutcome::InvalidOpcode
    }
}

impl<R: ?Sized, M: ?Sized> fmt::Debug for TrapDispatcher<R, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.decoders.iter().map(|d| d.name()))
            .finish()
    }
}
