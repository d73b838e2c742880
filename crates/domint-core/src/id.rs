//! Domain identity
//!
//! A `DomainId` names a slot in the domain table. Slots are recycled, so
//! an id on its own cannot say *which* domain it meant; the identity of
//! one life of a slot is the id paired with the interruptor generation
//! that life ran under. `DomainIdent` is that pairing, and it is what
//! join handles are keyed by.

use core::fmt;

/// Index of a slot in the domain table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct DomainId(u32);

impl DomainId {
    /// Id for the given table slot
    #[inline]
    pub const fn new(index: usize) -> Self {
        DomainId(index as u32)
    }

    /// Slot index, for table lookups
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw value, for the log context
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one life of a domain slot.
///
/// The generation advances once per stop, so a stale identity never
/// matches a slot's later life even though ids are reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DomainIdent {
    id: DomainId,
    generation: u64,
}

impl DomainIdent {
    /// Pair a slot with the generation its life runs under
    #[inline]
    pub const fn new(id: DomainId, generation: u64) -> Self {
        DomainIdent { id, generation }
    }

    /// The slot this identity lives in
    #[inline]
    pub const fn id(self) -> DomainId {
        self.id
    }

    /// The generation this identity is keyed to
    #[inline]
    pub const fn generation(self) -> u64 {
        self.generation
    }

    /// Whether the slot has moved past this life.
    ///
    /// `current_generation` is the slot interruptor's generation now;
    /// strictly greater means this life has terminated.
    #[inline]
    pub const fn is_stale(self, current_generation: u64) -> bool {
        current_generation > self.generation
    }
}

impl fmt::Display for DomainIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.generation)
    }
}
