use snafu::ensure;
use std::fmt;

use super::{Accessor, View};
use crate::config::AddressingMode;
use crate::errors::*;

/// An image which is entirely mapped in memory
///
/// Reads are plain slicing. Only requests which fall off the end of the mapping fail.
pub struct Linear<M> {
    map: M,
    phys_base: Option<u64>,
    xip: bool,
}

impl<M: AsRef<[u8]>> Linear<M> {
    pub fn new(map: M) -> Self {
        Self {
            map,
            phys_base: None,
            xip: false,
        }
    }

    /// A mapping whose first byte lives at physical address `phys_base`
    pub fn with_phys_base(map: M, phys_base: u64) -> Self {
        Self {
            map,
            phys_base: Some(phys_base),
            xip: false,
        }
    }

    /// A mapping whose execute-in-place files may be mapped directly from `phys_base`
    pub fn xip(map: M, phys_base: u64) -> Self {
        Self {
            map,
            phys_base: Some(phys_base),
            xip: true,
        }
    }

    pub fn get_ref(&self) -> &M {
        &self.map
    }
}

impl<M> Accessor for Linear<M>
where
    M: AsRef<[u8]> + Send + Sync,
{
    fn read(&self, offset: u32, len: usize) -> Result<View<'_>> {
        if len == 0 {
            return Ok(View::empty());
        }
        let bytes = self.map.as_ref();
        let start = offset as usize;
        ensure!(
            start <= bytes.len() && len <= bytes.len() - start,
            OutOfBounds {
                offset,
                len,
                limit: bytes.len() as u64,
            }
        );
        Ok(View::Mapped(&bytes[start..start + len]))
    }

    fn mode(&self) -> AddressingMode {
        if self.xip {
            AddressingMode::LinearXip
        } else {
            AddressingMode::Linear
        }
    }

    fn supports_xip(&self) -> bool {
        self.xip
    }

    fn phys_base(&self) -> Option<u64> {
        self.phys_base
    }
}

impl<M: AsRef<[u8]>> fmt::Debug for Linear<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Linear")
            .field("len", &self.map.as_ref().len())
            .field("phys_base", &self.phys_base)
            .field("xip", &self.xip)
            .finish()
    }
}
