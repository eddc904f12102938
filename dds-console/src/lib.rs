//! Interrupt dispatch and operator console for an audio DDS evaluation board
//!
//! The crate brings up the board in a fixed order, binds a static interrupt
//! vector table to the platform interrupt controller and then hands the UART
//! to an operator console. The console turns lines of decimal text into
//! writes to the phase-increment registers of a direct digital synthesizer.
//!
//! Everything hardware facing goes through the [`embedded-hal`] family of
//! traits, so the same code runs on the board and against host-side fakes.
//!
//! # Crate features
//!
//! * **defmt** -
//!   Implement `defmt::Format` for the public types and emit log messages via defmt
//! * **rp2040** -
//!   Build the `dds-firmware` image for the RP2040 evaluation board
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal

#![warn(missing_docs)]
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod bringup;
pub mod codec;
pub mod console;
pub mod dispatch;
pub mod nvic;
pub mod register_file;
pub mod vector_table;

pub use bringup::{Board, ExitCode};
pub use console::{CommandSession, Interpreter};
pub use dispatch::{InterruptController, InterruptDispatch, SharedDispatch};
pub use register_file::{MmioRegisterFile, RegisterFile};
pub use vector_table::{InterruptVectorEntry, IrqHandler, Line, VectorTable};

// Re-export crates used in the public API
pub extern crate embedded_hal;
pub extern crate embedded_hal_nb;
pub extern crate fugit;
