//! Board bring-up
//!
//! [`run`] is the whole firmware in one call: it brings the board up in a
//! fixed order, hands the UART to the operator console and returns the exit
//! code once the operator quits.
//!
//! The order is strict and every step must succeed before the next one
//! starts:
//!
//! 1. interrupt controller
//! 2. I2C bus to the audio codec
//! 3. audio codec
//! 4. settle delay
//! 5. codec line input
//! 6. interrupt vector table (register and enable)
//! 7. console UART
//! 8. display
//! 9. DDS register block
//!
//! The first failure is reported once and ends the bring-up. Once the UART
//! is up the step's diagnostic is also written to the operator.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, I2c};
use embedded_hal_nb::serial::{Read, Write};
use fugit::{HertzU32, MillisDurationU32};

use crate::codec::{self, Ssm2603};
use crate::console::{self, Interpreter, NEWLINE};
use crate::dispatch::{self, InterruptController, InterruptDispatch, SharedDispatch, MAX_LINES};
use crate::register_file::RegisterFile;
use crate::vector_table::VectorTable;

const RULE: &str = "-----------------------------";

/// A bring-up step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Platform interrupt controller.
    InterruptController,
    /// I2C bus to the codec.
    I2c,
    /// Codec configuration.
    Codec,
    /// Codec line input selection.
    LineInput,
    /// Binding and enabling the interrupt vector table.
    InterruptEnable,
    /// Console UART.
    Uart,
    /// Display controller.
    Display,
    /// DDS register block.
    Registers,
}

impl Step {
    /// Operator-facing message for a failure of this step.
    pub const fn diagnostic(self) -> &'static str {
        match self {
            Step::InterruptController => "Interrupt init failed",
            Step::I2c => "IIC init failed",
            Step::Codec => "Audio codec init failed",
            Step::LineInput => "Audio line input selection failed",
            Step::InterruptEnable => "Interrupt enable failed",
            Step::Uart => "UART init failed",
            Step::Display => "Display init failed",
            Step::Registers => "DDS register block unavailable",
        }
    }
}

/// Bring-up errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A step failed to initialize.
    Init {
        /// The failing step.
        step: Step,
        /// What went wrong.
        reason: &'static str,
    },
    /// The vector table could not be bound.
    Dispatch(dispatch::Error),
}

impl Error {
    /// The step that failed.
    pub fn step(&self) -> Step {
        match self {
            Error::Init { step, .. } => *step,
            Error::Dispatch(_) => Step::InterruptEnable,
        }
    }
}

impl From<dispatch::Error> for Error {
    fn from(e: dispatch::Error) -> Self {
        Error::Dispatch(e)
    }
}

fn failed(step: Step) -> impl FnOnce(&'static str) -> Error {
    move |reason| Error::Init { step, reason }
}

fn bus_failed<E: i2c::Error>(step: Step) -> impl FnOnce(codec::Error<E>) -> Error {
    move |codec::Error::Bus(e)| {
        let reason = match e.kind() {
            i2c::ErrorKind::Bus => "bus error",
            i2c::ErrorKind::ArbitrationLoss => "arbitration lost",
            i2c::ErrorKind::NoAcknowledge(_) => "no acknowledge",
            i2c::ErrorKind::Overrun => "overrun",
            _ => "transfer failed",
        };
        Error::Init { step, reason }
    }
}

/// Process exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ExitCode {
    /// The operator quit.
    Success = 0,
    /// Bring-up or the console failed.
    Failure = 1,
}

impl ExitCode {
    /// Numeric exit code.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Bring-up settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Config {
    /// Wait between codec configuration and input selection.
    pub settle: MillisDurationU32,
    /// Console baud rate.
    pub baud_rate: HertzU32,
    /// Console settings.
    pub console: console::Config,
}

impl Config {
    /// 2 s settle time, 115200 baud console.
    pub const fn new() -> Self {
        Self {
            settle: MillisDurationU32::millis(2000),
            baud_rate: HertzU32::Hz(115_200),
            console: console::Config::new(),
        }
    }

    /// Set the settle delay.
    pub fn settle(mut self, settle: MillisDurationU32) -> Self {
        self.settle = settle;
        self
    }

    /// Set the console baud rate.
    pub fn baud_rate(mut self, baud_rate: HertzU32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the console settings.
    pub fn console(mut self, console: console::Config) -> Self {
        self.console = console;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// The collaborators a board provides to the bring-up sequence.
///
/// Each method performs one step. Clock and pin setup happen before the
/// board value is created.
pub trait Board<const LINES: usize = MAX_LINES> {
    /// Platform interrupt controller.
    type Controller: InterruptController;
    /// Codec bus.
    type I2c: I2c;
    /// Delay provider for the codec and the settle time.
    type Delay: DelayNs;
    /// Console UART.
    type Serial: Read<u8> + Write<u8>;
    /// DDS register block.
    type Registers: RegisterFile;

    /// Take the interrupt controller.
    fn interrupt_controller(&mut self) -> Result<Self::Controller, &'static str>;

    /// The slot interrupt handlers dispatch through.
    fn dispatch(&self) -> &SharedDispatch<Self::Controller, LINES>;

    /// Bring up the codec bus.
    fn init_i2c(&mut self) -> Result<Self::I2c, &'static str>;

    /// Delay provider.
    fn delay(&mut self) -> &mut Self::Delay;

    /// Configure the console UART.
    fn configure_uart(&mut self, baud_rate: HertzU32) -> Result<Self::Serial, &'static str>;

    /// Bring up the display and its demo pattern.
    fn init_display(&mut self) -> Result<(), &'static str>;

    /// Take the DDS register block.
    fn dds_registers(&mut self) -> Result<Self::Registers, &'static str>;
}

/// Everything the console needs once the board is up.
pub struct System<I2C, S, R> {
    /// The configured codec.
    pub codec: Ssm2603<I2C>,
    /// Console UART.
    pub serial: S,
    /// DDS register block.
    pub registers: R,
}

/// Run the bring-up sequence.
pub fn bring_up<B, const LINES: usize>(
    board: &mut B,
    vectors: &VectorTable,
    config: &Config,
) -> Result<System<B::I2c, B::Serial, B::Registers>, Error>
where
    B: Board<LINES>,
{
    let controller = board
        .interrupt_controller()
        .map_err(failed(Step::InterruptController))?;
    let mut dispatch =
        InterruptDispatch::<_, LINES>::initialize(controller).map_err(|e| match e {
            dispatch::Error::Init(reason) => failed(Step::InterruptController)(reason),
            other => Error::Dispatch(other),
        })?;

    let i2c = board.init_i2c().map_err(failed(Step::I2c))?;
    let mut codec = Ssm2603::new(i2c);
    codec.init(board.delay()).map_err(bus_failed(Step::Codec))?;

    board.delay().delay_ms(config.settle.to_millis());
    codec
        .select_line_input()
        .map_err(bus_failed(Step::LineInput))?;

    dispatch.register(vectors)?;
    board.dispatch().install_enabled(dispatch, vectors)?;
    info!("{} interrupt lines enabled", vectors.len());

    let mut serial = board
        .configure_uart(config.baud_rate)
        .map_err(failed(Step::Uart))?;
    console::print(
        &mut serial,
        format_args!("Audio system initialized.{0}UART ready{0}", NEWLINE),
    )
    .map_err(|_| failed(Step::Uart)("transmit failed"))?;

    let registers = board
        .init_display()
        .map_err(failed(Step::Display))
        .and_then(|()| board.dds_registers().map_err(failed(Step::Registers)));
    // the operator can see failures from here on
    let registers = match registers {
        Ok(registers) => registers,
        Err(e) => {
            let _ = console::print(
                &mut serial,
                format_args!("{}{}", e.step().diagnostic(), NEWLINE),
            );
            return Err(e);
        }
    };

    Ok(System {
        codec,
        serial,
        registers,
    })
}

/// Bring the board up and serve the operator console until `q`.
pub fn run<B, const LINES: usize>(
    board: &mut B,
    vectors: &VectorTable,
    config: &Config,
) -> ExitCode
where
    B: Board<LINES>,
{
    let mut system = match bring_up(board, vectors, config) {
        Ok(system) => system,
        Err(e) => {
            error!("{}: {}", e.step().diagnostic(), e);
            return ExitCode::Failure;
        }
    };

    let banner = console::print(
        &mut system.serial,
        format_args!(
            "{0}{1}{0}AXI DDS demo with display ready{0}Press q to quit DDS entry{0}{1}{0}",
            NEWLINE, RULE
        ),
    );
    if banner.is_err() {
        error!("console transmit failed");
        return ExitCode::Failure;
    }

    let mut interpreter = Interpreter::new(config.console);
    match interpreter.run(&mut system.serial, &mut system.registers) {
        Ok(()) => {
            match console::print(&mut system.serial, format_args!("Exiting...{}", NEWLINE)) {
                Ok(()) => ExitCode::Success,
                Err(_) => ExitCode::Failure,
            }
        }
        Err(console::Error::Timeout) => {
            warn!("console timed out");
            ExitCode::Failure
        }
        Err(_) => {
            error!("console transmit failed");
            ExitCode::Failure
        }
    }
}
