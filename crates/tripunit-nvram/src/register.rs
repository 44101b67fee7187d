//! Redundant, complement-checked persistent registers.
//!
//! A register occupies eight bytes at each of two independent addresses: the
//! 32-bit value followed by its bitwise complement. A copy is trusted only when
//! the two halves agree. Loading tries the primary copy, then the mirror, and
//! falls back to a documented default when both are damaged.

use crate::error::{NvError, NvResult};
use crate::store::PersistentStore;

/// Bytes used by one copy of a register.
pub const REGISTER_COPY_LEN: usize = 8;

/// Values that can be packed into a single complement-checked word.
pub trait Complemented: Copy {
    /// Pack into the 32-bit storage word.
    fn to_word(self) -> u32;

    /// Unpack from the 32-bit storage word.
    fn from_word(word: u32) -> Self;
}

impl Complemented for u32 {
    fn to_word(self) -> u32 {
        self
    }

    fn from_word(word: u32) -> Self {
        word
    }
}

/// Which copy a loaded value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopySource {
    /// The primary copy passed its complement check.
    Primary,
    /// The primary copy was damaged; the mirror passed.
    Mirror,
    /// Both copies were damaged; the register default was substituted.
    Defaulted,
}

/// Result of [`PersistentRegister::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterLoad<T> {
    /// Recovered (or defaulted) value.
    pub value: T,
    /// Where the value came from.
    pub source: CopySource,
}

impl<T> RegisterLoad<T> {
    /// `true` unless the default had to be substituted.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !matches!(self.source, CopySource::Defaulted)
    }
}

/// A dual-copy register holding a [`Complemented`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentRegister<T> {
    primary: u32,
    mirror: u32,
    default: T,
}

impl<T: Complemented> PersistentRegister<T> {
    /// Create a register with copies at `primary` and `mirror`.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::InvalidGeometry`] if the two copies overlap.
    pub fn new(primary: u32, mirror: u32, default: T) -> NvResult<Self> {
        if primary.abs_diff(mirror) < REGISTER_COPY_LEN as u32 {
            return Err(NvError::invalid_geometry(format!(
                "register copies at {primary:#x} and {mirror:#x} overlap"
            )));
        }
        Ok(Self {
            primary,
            mirror,
            default,
        })
    }

    /// Address of the primary copy.
    #[must_use]
    pub fn primary(&self) -> u32 {
        self.primary
    }

    /// Address of the mirror copy.
    #[must_use]
    pub fn mirror(&self) -> u32 {
        self.mirror
    }

    /// Value substituted when both copies are damaged.
    #[must_use]
    pub fn default_value(&self) -> T {
        self.default
    }

    /// Write `value` and its complement to both copies, primary first.
    ///
    /// # Errors
    ///
    /// Propagates store errors. If the primary write succeeds and the mirror write
    /// fails, the primary still holds the new value.
    pub fn store<S: PersistentStore + ?Sized>(&self, store: &mut S, value: T) -> NvResult<()> {
        let bytes = encode(value.to_word());
        store.write(self.primary, &bytes)?;
        store.write(self.mirror, &bytes)
    }

    /// Recover the register value.
    ///
    /// # Errors
    ///
    /// Propagates store read errors. Integrity failures are reported through
    /// [`RegisterLoad::source`], never as `Err`.
    pub fn load<S: PersistentStore + ?Sized>(&self, store: &S) -> NvResult<RegisterLoad<T>> {
        if let Some(word) = read_copy(store, self.primary)? {
            return Ok(RegisterLoad {
                value: T::from_word(word),
                source: CopySource::Primary,
            });
        }
        tracing::debug!(
            primary = self.primary,
            mirror = self.mirror,
            "primary register copy failed complement check"
        );
        if let Some(word) = read_copy(store, self.mirror)? {
            return Ok(RegisterLoad {
                value: T::from_word(word),
                source: CopySource::Mirror,
            });
        }
        Ok(RegisterLoad {
            value: self.default,
            source: CopySource::Defaulted,
        })
    }
}

fn encode(word: u32) -> [u8; REGISTER_COPY_LEN] {
    let mut bytes = [0u8; REGISTER_COPY_LEN];
    let (value, complement) = bytes.split_at_mut(4);
    value.copy_from_slice(&word.to_le_bytes());
    complement.copy_from_slice(&(!word).to_le_bytes());
    bytes
}

fn read_copy<S: PersistentStore + ?Sized>(store: &S, address: u32) -> NvResult<Option<u32>> {
    let mut value = [0u8; 4];
    let mut complement = [0u8; 4];
    store.read(address, &mut value)?;
    store.read(address.saturating_add(4), &mut complement)?;
    let word = u32::from_le_bytes(value);
    Ok((word == !u32::from_le_bytes(complement)).then_some(word))
}
