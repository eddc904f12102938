//! Memory-mapped register blocks
//!
//! A register block is a flat array of 32-bit registers addressed by offset,
//! in register-width units from the block's base address. Writes are volatile
//! and visible to the peripheral one by one.

use vcell::VolatileCell;

/// An offset outside the register block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeError {
    /// The rejected offset.
    pub offset: usize,
    /// Number of registers in the block.
    pub count: usize,
}

/// A block of write-only 32-bit registers.
pub trait RegisterFile {
    /// Number of registers in the block.
    fn count(&self) -> usize;

    /// Store `value` into the register at `offset`.
    fn write(&mut self, offset: usize, value: u32) -> Result<(), RangeError>;
}

impl<T: RegisterFile + ?Sized> RegisterFile for &mut T {
    fn count(&self) -> usize {
        T::count(self)
    }

    fn write(&mut self, offset: usize, value: u32) -> Result<(), RangeError> {
        T::write(self, offset, value)
    }
}

/// `N` consecutive memory-mapped registers.
pub struct MmioRegisterFile<'a, const N: usize> {
    registers: &'a [VolatileCell<u32>; N],
}

impl<'a, const N: usize> MmioRegisterFile<'a, N> {
    /// Wrap a block of cells.
    ///
    /// On hardware use [`from_address`](Self::from_address); this is for blocks
    /// that live in RAM.
    pub fn new(registers: &'a [VolatileCell<u32>; N]) -> Self {
        Self { registers }
    }

    /// Last value stored at `offset`.
    ///
    /// Peripheral registers are generally write-only; reading back is only
    /// meaningful for RAM-backed blocks.
    pub fn read(&self, offset: usize) -> Option<u32> {
        self.registers.get(offset).map(VolatileCell::get)
    }
}

impl<const N: usize> MmioRegisterFile<'static, N> {
    /// Register block at a fixed physical address.
    ///
    /// # Safety
    ///
    /// `base` must be the word-aligned address of `N` consecutive 32-bit
    /// registers, valid for the whole program. Only one instance per block may
    /// exist at a time.
    pub unsafe fn from_address(base: usize) -> Self {
        Self {
            registers: &*(base as *const [VolatileCell<u32>; N]),
        }
    }
}

impl<const N: usize> RegisterFile for MmioRegisterFile<'_, N> {
    fn count(&self) -> usize {
        N
    }

    fn write(&mut self, offset: usize, value: u32) -> Result<(), RangeError> {
        let register = self
            .registers
            .get(offset)
            .ok_or(RangeError { offset, count: N })?;
        register.set(value);
        Ok(())
    }
}

/// Register map of the audio DDS peripheral.
pub mod dds {
    use super::MmioRegisterFile;

    /// Phase increment of the left channel.
    pub const LEFT_PHASE_INCREMENT: usize = 0;
    /// Phase increment of the right channel.
    pub const RIGHT_PHASE_INCREMENT: usize = 1;
    /// Number of registers in the block.
    pub const REGISTER_COUNT: usize = 2;

    /// The DDS register block.
    pub type DdsRegisters = MmioRegisterFile<'static, REGISTER_COUNT>;
}
