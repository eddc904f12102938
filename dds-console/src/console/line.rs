//! Bounded line buffer

/// Characters a console line holds before the terminator.
pub const LINE_CAPACITY: usize = 10;

/// A line grew past [`LINE_CAPACITY`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OverflowError {
    /// Capacity of the buffer that overflowed.
    pub capacity: usize,
}

/// Input collected since the last terminator.
#[derive(Clone, Debug, Default)]
pub struct LineBuffer {
    bytes: [u8; LINE_CAPACITY],
    len: usize,
}

impl LineBuffer {
    /// An empty line.
    pub const fn new() -> Self {
        Self {
            bytes: [0; LINE_CAPACITY],
            len: 0,
        }
    }

    /// Append a byte. A full buffer is left unchanged.
    pub fn push(&mut self, byte: u8) -> Result<(), OverflowError> {
        let slot = self.bytes.get_mut(self.len).ok_or(OverflowError {
            capacity: LINE_CAPACITY,
        })?;
        *slot = byte;
        self.len += 1;
        Ok(())
    }

    /// The bytes collected so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Forget the collected bytes.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Number of bytes collected.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
