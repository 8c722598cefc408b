//! Access to the raw image bytes
//!
//! Everything above this layer asks for `(offset, len)` windows of the image and copies out
//! what it needs before asking for the next one. Implementations decide how the bytes get
//! there: pointer arithmetic over a mapping ([`Linear`](linear/struct.Linear.html)) or a small
//! rotating buffer cache in front of a block device ([`Block`](block/struct.Block.html)).

use parking_lot::MappedMutexGuard;
use std::ops::Deref;
use std::sync::Arc;
use std::fmt;

use crate::config::AddressingMode;
use crate::errors::Result;

pub mod block;
pub mod linear;

pub use block::Block;
pub use linear::Linear;

pub trait Accessor: Send + Sync + fmt::Debug {
    /// Borrow `len` bytes of the image starting at `offset`
    ///
    /// A zero length request returns an empty view without touching the store. The view must
    /// be dropped before the next call on the same thread: block backed views hold the cache
    /// lock.
    fn read(&self, offset: u32, len: usize) -> Result<View<'_>>;

    fn mode(&self) -> AddressingMode;

    /// True if files may be mapped directly out of the store
    fn supports_xip(&self) -> bool {
        false
    }

    /// The physical address of offset 0 of the image, when the store is memory mapped
    fn phys_base(&self) -> Option<u64> {
        None
    }
}

/// A borrowed window of the image
pub enum View<'a> {
    Mapped(&'a [u8]),
    Buffered(MappedMutexGuard<'a, [u8]>),
}

impl View<'_> {
    pub fn empty() -> Self {
        View::Mapped(&[])
    }
}

impl Deref for View<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            View::Mapped(bytes) => bytes,
            View::Buffered(guard) => guard,
        }
    }
}

impl fmt::Debug for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            View::Mapped(_) => "Mapped",
            View::Buffered(_) => "Buffered",
        };
        f.debug_struct("View")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

macro_rules! deref_accessor {
    () => {
        fn read(&self, offset: u32, len: usize) -> Result<View<'_>> {
            (**self).read(offset, len)
        }

        fn mode(&self) -> AddressingMode {
            (**self).mode()
        }

        fn supports_xip(&self) -> bool {
            (**self).supports_xip()
        }

        fn phys_base(&self) -> Option<u64> {
            (**self).phys_base()
        }
    };
}

impl<A: ?Sized + Accessor> Accessor for Box<A> {
    deref_accessor!();
}

impl<A: ?Sized + Accessor> Accessor for Arc<A> {
    deref_accessor!();
}

impl<A: ?Sized + Accessor> Accessor for &A {
    deref_accessor!();
}
