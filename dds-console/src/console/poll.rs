//! Polling the receive FIFO

use embedded_hal_nb::serial::Read;

/// How long to keep polling an empty receive FIFO.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollLimit {
    /// Poll until a byte arrives.
    #[default]
    Unbounded,
    /// Give up after this many empty polls.
    Attempts(u32),
}

impl PollLimit {
    fn allows(self, polls: u32) -> bool {
        match self {
            PollLimit::Unbounded => true,
            PollLimit::Attempts(limit) => polls < limit,
        }
    }
}

pub(crate) enum PollError<E> {
    Exhausted,
    Serial(E),
}

/// Busy-poll `serial` for the next byte.
pub(crate) fn next_byte<S>(serial: &mut S, limit: PollLimit) -> Result<u8, PollError<S::Error>>
where
    S: Read<u8>,
{
    let mut polls = 0u32;
    loop {
        match serial.read() {
            Ok(byte) => return Ok(byte),
            Err(nb::Error::Other(e)) => return Err(PollError::Serial(e)),
            Err(nb::Error::WouldBlock) => {
                polls = polls.saturating_add(1);
                if !limit.allows(polls) {
                    return Err(PollError::Exhausted);
                }
                core::hint::spin_loop();
            }
        }
    }
}

/// Throw away whatever is waiting in the receive FIFO.
///
/// Receive errors are part of the stale input and are dropped as well. Returns
/// the number of bytes discarded.
pub(crate) fn drain<S>(serial: &mut S, limit: PollLimit) -> usize
where
    S: Read<u8>,
{
    let mut discarded = 0usize;
    let mut reads = 0u32;
    while limit.allows(reads) {
        reads = reads.saturating_add(1);
        match serial.read() {
            Ok(_) => discarded += 1,
            Err(nb::Error::Other(_)) => {}
            Err(nb::Error::WouldBlock) => break,
        }
    }
    discarded
}
