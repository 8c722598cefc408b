use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// How the image is reached. Fixed for the lifetime of a mount, and chosen by whoever
/// describes the device, never by the image contents
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    /// The whole image is one contiguous mapping
    Linear,
    /// Like `Linear`, but files marked with the sticky bit are stored uncompressed and can be
    /// mapped in place
    LinearXip,
    /// The image is read from a block device through a small buffer cache
    Block,
    /// A character device. Never mountable
    Char,
}

impl AddressingMode {
    pub fn name(self) -> &'static str {
        match self {
            AddressingMode::Linear => "linear",
            AddressingMode::LinearXip => "linear-xip",
            AddressingMode::Block => "block",
            AddressingMode::Char => "char",
        }
    }

    pub fn is_linear(self) -> bool {
        matches!(self, AddressingMode::Linear | AddressingMode::LinearXip)
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for AddressingMode {
    fn default() -> Self {
        AddressingMode::Block
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Options {
    /// cramfs records no timestamps. Every inode reports this one instead
    pub timestamp: DateTime<Utc>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timestamp(&mut self, timestamp: DateTime<Utc>) -> &mut Self {
        self.timestamp = timestamp;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timestamp: Utc.timestamp(0, 0),
        }
    }
}
