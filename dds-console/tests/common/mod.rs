//! Host-side fakes shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use dds_console::embedded_hal_nb::serial::{ErrorKind, ErrorType, Read, Write};
use dds_console::register_file::MmioRegisterFile;
use vcell::VolatileCell;

/// One receive FIFO event.
#[derive(Clone, Copy, Debug)]
pub enum Rx {
    Byte(u8),
    /// The FIFO reads empty once.
    Gap,
    /// A framing error.
    Fault,
}

/// A UART with a scripted receive side and a recorded transmit side.
pub struct Terminal {
    rx: VecDeque<Rx>,
    tx: Rc<RefCell<Vec<u8>>>,
    fail_tx: bool,
}

impl Terminal {
    /// The operator types `input` after the console is up.
    pub fn typing(input: &[u8]) -> Self {
        Self::script(input.iter().map(|byte| Rx::Byte(*byte)))
    }

    /// The FIFO reads empty when the console starts, then yields `rx`.
    pub fn script(rx: impl IntoIterator<Item = Rx>) -> Self {
        Self {
            rx: core::iter::once(Rx::Gap).chain(rx).collect(),
            tx: Rc::default(),
            fail_tx: false,
        }
    }

    /// Bytes that were already waiting in the FIFO before the console started.
    pub fn with_stale(mut self, stale: &[u8]) -> Self {
        for byte in stale.iter().rev() {
            self.rx.push_front(Rx::Byte(*byte));
        }
        self
    }

    pub fn failing_tx(mut self) -> Self {
        self.fail_tx = true;
        self
    }

    /// Handle on everything transmitted, usable after the terminal is moved.
    pub fn transcript(&self) -> Transcript {
        Transcript(self.tx.clone())
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl ErrorType for Terminal {
    type Error = ErrorKind;
}

impl Read<u8> for Terminal {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        match self.rx.pop_front() {
            Some(Rx::Byte(byte)) => Ok(byte),
            Some(Rx::Fault) => Err(nb::Error::Other(ErrorKind::FrameFormat)),
            Some(Rx::Gap) | None => Err(nb::Error::WouldBlock),
        }
    }
}

impl Write<u8> for Terminal {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        if self.fail_tx {
            return Err(nb::Error::Other(ErrorKind::Other));
        }
        self.tx.borrow_mut().push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct Transcript(Rc<RefCell<Vec<u8>>>);

impl Transcript {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }
}

/// A RAM-backed DDS register block.
pub fn dds_block() -> &'static [VolatileCell<u32>; 2] {
    Box::leak(Box::new([VolatileCell::new(0), VolatileCell::new(0)]))
}

pub fn dds_registers(cells: &'static [VolatileCell<u32>; 2]) -> MmioRegisterFile<'static, 2> {
    MmioRegisterFile::new(cells)
}

pub fn values(cells: &[VolatileCell<u32>; 2]) -> [u32; 2] {
    [cells[0].get(), cells[1].get()]
}
