//! Operator console
//!
//! The console reads lines of decimal text from a polled UART and turns each
//! pair of lines into one register write: first the register offset, then the
//! value to store there.
//!
//! [`CommandSession`] is the state machine and knows nothing about the UART;
//! it is fed one received byte at a time and reports what happened as an
//! [`Outcome`]. [`Interpreter`] owns a session, polls the UART and writes the
//! prompts, echoes and confirmations back to the operator.
//!
//! ```text
//!            "\r" (offset parsed)
//!  AwaitingOffset ---------------> AwaitingValue { offset }
//!        ^                                |
//!        +--------------------------------+
//!            "\r" (value parsed, one register write)
//! ```
//!
//! `q` ends the session in either phase, throws the partial line away and
//! puts the session back to [`Phase::AwaitingOffset`].

use core::fmt::{self, Write as _};

use embedded_hal_nb::serial::{Read, Write};

use crate::register_file::{RangeError, RegisterFile};

mod line;
mod parse;
mod poll;

pub use self::line::{LineBuffer, OverflowError, LINE_CAPACITY};
pub use self::parse::parse_decimal;
pub use self::poll::PollLimit;

use self::poll::PollError;

/// Ends the session.
pub const QUIT: u8 = b'q';

/// Ends a line.
pub const TERMINATOR: u8 = b'\r';

pub(crate) const NEWLINE: &str = "\n\r";
const OFFSET_PROMPT: &str = "Enter register offset (0 = LEFT, 1 = RIGHT): ";
const VALUE_PROMPT: &str = "Enter DDS phase increment value: ";
const INTRO: [&str; 2] = [
    "Write LEFT audio DDS phase increment to REGISTER 0",
    "Write RIGHT audio DDS phase increment to REGISTER 1",
];

/// What the next completed line means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// The line is a register offset.
    AwaitingOffset,
    /// The line is the value to write at `offset`.
    AwaitingValue {
        /// Offset taken from the previous line.
        offset: u32,
    },
}

/// Result of feeding one byte to a [`CommandSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The byte was added to the line.
    Echo(u8),
    /// An offset line was completed.
    OffsetEntered(u32),
    /// A value line was completed and written.
    Written {
        /// Register offset.
        offset: u32,
        /// Value stored.
        value: u32,
    },
    /// A value line was completed but its offset is outside the register block.
    Rejected {
        /// Value that was not written.
        value: u32,
        /// Why.
        error: RangeError,
    },
    /// The line is too long. Input is ignored up to the next terminator.
    Overflow(OverflowError),
    /// Byte dropped while discarding an overflowed line.
    Ignored,
    /// An overflowed line was terminated and thrown away.
    Discarded,
    /// The operator asked to quit.
    Quit,
}

/// The two-phase offset/value state machine.
#[derive(Clone, Debug)]
pub struct CommandSession {
    line: LineBuffer,
    phase: Phase,
    overflowed: bool,
}

impl CommandSession {
    /// A session waiting for a register offset.
    pub const fn new() -> Self {
        Self {
            line: LineBuffer::new(),
            phase: Phase::AwaitingOffset,
            overflowed: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Input collected for the current line.
    pub fn line(&self) -> &[u8] {
        self.line.as_bytes()
    }

    /// Throw away the current line. The phase is kept.
    pub fn abandon_line(&mut self) {
        self.line.clear();
        self.overflowed = false;
    }

    /// Process one received byte.
    ///
    /// Every completed value line causes exactly one call to
    /// [`RegisterFile::write`], whether or not the offset turns out to be valid.
    pub fn feed<R>(&mut self, byte: u8, registers: &mut R) -> Outcome
    where
        R: RegisterFile + ?Sized,
    {
        match byte {
            QUIT => {
                *self = Self::new();
                Outcome::Quit
            }
            TERMINATOR if self.overflowed => {
                self.abandon_line();
                Outcome::Discarded
            }
            TERMINATOR => {
                let number = parse_decimal(self.line.as_bytes());
                self.line.clear();
                match self.phase {
                    Phase::AwaitingOffset => {
                        self.phase = Phase::AwaitingValue { offset: number };
                        Outcome::OffsetEntered(number)
                    }
                    Phase::AwaitingValue { offset } => {
                        self.phase = Phase::AwaitingOffset;
                        match registers.write(offset as usize, number) {
                            Ok(()) => Outcome::Written {
                                offset,
                                value: number,
                            },
                            Err(error) => Outcome::Rejected {
                                value: number,
                                error,
                            },
                        }
                    }
                }
            }
            _ if self.overflowed => Outcome::Ignored,
            _ => match self.line.push(byte) {
                Ok(()) => Outcome::Echo(byte),
                Err(error) => {
                    self.overflowed = true;
                    Outcome::Overflow(error)
                }
            },
        }
    }
}

impl Default for CommandSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Console settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct Config {
    /// How long to wait for the operator.
    pub poll_limit: PollLimit,
}

impl Config {
    /// Default settings: wait for the operator forever.
    pub const fn new() -> Self {
        Self {
            poll_limit: PollLimit::Unbounded,
        }
    }

    /// Set the poll limit.
    pub fn poll_limit(mut self, poll_limit: PollLimit) -> Self {
        self.poll_limit = poll_limit;
        self
    }
}

/// Console errors. `E` is the UART error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// No input within the configured [`PollLimit`].
    Timeout,
    /// Transmitting to the operator failed.
    Serial(E),
    /// A message could not be formatted.
    Format,
}

/// Runs a [`CommandSession`] on a UART.
#[derive(Debug, Default)]
pub struct Interpreter {
    config: Config,
    session: CommandSession,
}

impl Interpreter {
    /// Create an interpreter.
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            session: CommandSession::new(),
        }
    }

    /// The session state.
    pub fn session(&self) -> &CommandSession {
        &self.session
    }

    /// Serve the operator until `q` is received.
    ///
    /// Bytes already waiting in the receive FIFO are discarded unread before
    /// the introduction is printed. A receive error throws the current line
    /// away and repeats the prompt.
    pub fn run<S, R>(
        &mut self,
        serial: &mut S,
        registers: &mut R,
    ) -> Result<(), Error<S::Error>>
    where
        S: Read<u8> + Write<u8>,
        R: RegisterFile + ?Sized,
    {
        let limit = self.config.poll_limit;
        let stale = poll::drain(serial, limit);
        if stale > 0 {
            debug!("discarded {} stale bytes", stale);
        }

        transmit(serial, |out| {
            for line in INTRO {
                write!(out, "{}{}", line, NEWLINE)?;
            }
            write!(out, "{}{}", OFFSET_PROMPT, NEWLINE)
        })?;

        loop {
            let byte = match poll::next_byte(serial, limit) {
                Ok(byte) => byte,
                Err(PollError::Exhausted) => {
                    warn!("no console input, giving up");
                    return Err(Error::Timeout);
                }
                Err(PollError::Serial(_)) => {
                    warn!("console receive error");
                    self.session.abandon_line();
                    let phase = self.session.phase();
                    transmit(serial, |out| {
                        write!(out, "{}Receive error, line discarded{}", NEWLINE, NEWLINE)?;
                        prompt(out, phase)
                    })?;
                    continue;
                }
            };

            let outcome = self.session.feed(byte, registers);
            match outcome {
                Outcome::Written { offset, value } => {
                    info!("wrote {} to register offset {}", value, offset)
                }
                Outcome::Rejected { value, error } => {
                    warn!("offset {} out of range, {} dropped", error.offset, value)
                }
                Outcome::Quit => {
                    nb::block!(serial.flush()).map_err(Error::Serial)?;
                    return Ok(());
                }
                // raw byte, as typed
                Outcome::Echo(byte) => {
                    nb::block!(serial.write(byte)).map_err(Error::Serial)?;
                    continue;
                }
                _ => {}
            }
            let phase = self.session.phase();
            transmit(serial, |out| render(out, outcome, phase))?;
        }
    }
}

fn prompt<W: fmt::Write>(out: &mut W, phase: Phase) -> fmt::Result {
    let text = match phase {
        Phase::AwaitingOffset => OFFSET_PROMPT,
        Phase::AwaitingValue { .. } => VALUE_PROMPT,
    };
    write!(out, "{}{}", text, NEWLINE)
}

/// Operator-facing text for `outcome`. `phase` is the phase after it.
///
/// Echoes are not text and go to the UART unformatted.
fn render<W: fmt::Write>(out: &mut W, outcome: Outcome, phase: Phase) -> fmt::Result {
    match outcome {
        Outcome::OffsetEntered(offset) => {
            write!(out, "{0}Register offset entered: {1}{0}", NEWLINE, offset)?;
            prompt(out, phase)
        }
        Outcome::Written { offset, value } => {
            write!(out, "{0}Value entered: {1}{0}", NEWLINE, value)?;
            write!(out, "Wrote {} to register offset {}{}", value, offset, NEWLINE)?;
            prompt(out, phase)
        }
        Outcome::Rejected { value, error } => {
            write!(out, "{0}Value entered: {1}{0}", NEWLINE, value)?;
            write!(
                out,
                "Register offset {} out of range (0..{}), nothing written{}",
                error.offset, error.count, NEWLINE
            )?;
            prompt(out, phase)
        }
        Outcome::Overflow(error) => write!(
            out,
            "{0}Input longer than {1} characters, line discarded{0}",
            NEWLINE, error.capacity
        ),
        Outcome::Discarded => prompt(out, phase),
        Outcome::Echo(_) | Outcome::Ignored | Outcome::Quit => Ok(()),
    }
}

/// Format straight into the UART transmit FIFO.
struct Transmitter<'a, S: Write<u8>> {
    serial: &'a mut S,
    error: Option<S::Error>,
}

impl<S: Write<u8>> fmt::Write for Transmitter<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if let Err(e) = nb::block!(self.serial.write(byte)) {
                self.error = Some(e);
                return Err(fmt::Error);
            }
        }
        Ok(())
    }
}

/// Write formatted text to the operator.
pub(crate) fn print<S: Write<u8>>(
    serial: &mut S,
    args: fmt::Arguments<'_>,
) -> Result<(), Error<S::Error>> {
    transmit(serial, |out| out.write_fmt(args))
}

fn transmit<S, F>(serial: &mut S, f: F) -> Result<(), Error<S::Error>>
where
    S: Write<u8>,
    F: FnOnce(&mut Transmitter<'_, S>) -> fmt::Result,
{
    let mut out = Transmitter {
        serial,
        error: None,
    };
    f(&mut out).map_err(|_| out.error.take().map_or(Error::Format, Error::Serial))
}
