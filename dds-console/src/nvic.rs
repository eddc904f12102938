//! Cortex-M NVIC backend for [`InterruptController`]
//!
//! Owning the `NVIC` singleton proves nobody else configures the external
//! interrupts. The peripheral itself is not kept: every operation goes through
//! the stateless `NVIC` associated functions, so [`Nvic`] stays zero-sized and
//! can be moved into a `static` [`SharedDispatch`](crate::dispatch::SharedDispatch).

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::scb::VectActive;
use cortex_m::peripheral::{NVIC, SCB};

use crate::dispatch::InterruptController;
use crate::vector_table::Line;

// SAFETY: a `Line` is only ever turned into an interrupt number by the NVIC
// backend, which is given lines taken from the board's vector table.
unsafe impl InterruptNumber for Line {
    fn number(self) -> u16 {
        Line::number(self)
    }
}

/// The nested vectored interrupt controller with `LINES` external interrupts.
#[derive(Debug)]
pub struct Nvic<const LINES: usize = 32> {
    _private: (),
}

impl<const LINES: usize> Nvic<LINES> {
    /// Take control of the NVIC.
    pub fn new(_nvic: NVIC) -> Self {
        Self { _private: () }
    }
}

impl<const LINES: usize> InterruptController for Nvic<LINES> {
    fn init(&mut self) -> Result<(), &'static str> {
        if SCB::vect_active() != VectActive::ThreadMode {
            return Err("NVIC init from handler mode");
        }
        for number in 0..LINES {
            let line = Line::new(number as u16);
            NVIC::mask(line);
            NVIC::unpend(line);
        }
        // SAFETY: every line is masked, nothing is dispatched before it is
        // enabled through `InterruptDispatch::enable`.
        unsafe { cortex_m::interrupt::enable() };
        Ok(())
    }

    fn enable(&mut self, line: Line) {
        // SAFETY: called from `InterruptDispatch::enable` once a handler is
        // bound to `line`.
        unsafe { NVIC::unmask(line) };
    }

    fn disable(&mut self, line: Line) {
        NVIC::mask(line);
    }

    fn active_line(&self) -> Option<Line> {
        match SCB::vect_active() {
            VectActive::Interrupt { irqn } => Some(Line::new(u16::from(irqn))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_is_an_interrupt_number() {
        fn number<I: InterruptNumber>(irq: I) -> u16 {
            irq.number()
        }
        assert_eq!(number(Line::new(24)), 24);
    }
}
