//! Firmware image for the RP2040 audio DDS evaluation board
//!
//! The SSM2603 codec sits on I2C1 (GPIO18 = SDA, GPIO19 = SCL), the operator
//! console on UART0 (GPIO0 = TX, GPIO1 = RX). The synthesizer engine reads its
//! two phase increments from the start of SRAM5, which `memory.x` keeps out of
//! the general purpose RAM.
//!
//! Transfer aborts on the codec bus raise `I2C1_IRQ`, which goes through the
//! interrupt vector table to a counter that is reported when the console
//! exits.
#![no_std]
#![no_main]

use core::cell::Cell;

use critical_section::Mutex;
use defmt_rtt as _;
use panic_probe as _;

use rp2040_hal as hal;

use hal::fugit::{HertzU32, RateExtU32};
use hal::gpio::bank0::{Gpio0, Gpio1, Gpio18, Gpio19};
use hal::gpio::{FunctionI2C, FunctionUart, Pin, PullDown, PullUp};
use hal::pac::{self, interrupt};
use hal::uart::{DataBits, Enabled, StopBits, UartConfig, UartPeripheral};
use hal::Clock;

use dds_console::bringup::{self, Board};
use dds_console::dispatch::SharedDispatch;
use dds_console::nvic::Nvic;
use dds_console::register_file::dds::DdsRegisters;
use dds_console::vector_table::{InterruptVectorEntry, IrqHandler, Line, VectorTable};

/// The linker will place this boot block at the start of our program image. We
/// need this to help the ROM bootloader get our code up and running.
#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

/// External high-speed crystal on the board is 12 MHz.
const XTAL_FREQ_HZ: u32 = 12_000_000u32;

/// External interrupts of the RP2040.
const LINES: usize = 32;

/// SRAM5, reserved for the synthesizer's phase increment registers.
const DDS_BASE: usize = 0x2004_1000;

type SdaPin = Pin<Gpio18, FunctionI2C, PullUp>;
type SclPin = Pin<Gpio19, FunctionI2C, PullUp>;
type CodecBus = hal::I2C<pac::I2C1, (SdaPin, SclPin)>;
type UartPins = (
    Pin<Gpio0, FunctionUart, PullDown>,
    Pin<Gpio1, FunctionUart, PullDown>,
);
type Console = UartPeripheral<Enabled, pac::UART0, UartPins>;

static DISPATCH: SharedDispatch<Nvic<LINES>, LINES> = SharedDispatch::new();

/// Counts transfer aborts on the codec bus.
struct BusMonitor {
    aborts: Mutex<Cell<u32>>,
}

impl BusMonitor {
    const fn new() -> Self {
        Self {
            aborts: Mutex::new(Cell::new(0)),
        }
    }

    fn aborts(&self) -> u32 {
        critical_section::with(|cs| self.aborts.borrow(cs).get())
    }
}

impl IrqHandler for BusMonitor {
    fn handle(&self) {
        // SAFETY: the codec driver is idle once bring-up is complete, clearing
        // the abort flag does not race with a transfer.
        let i2c = unsafe { &*pac::I2C1::ptr() };
        if i2c.ic_raw_intr_stat().read().tx_abrt().bit_is_set() {
            i2c.ic_clr_tx_abrt().read();
            critical_section::with(|cs| {
                let aborts = self.aborts.borrow(cs);
                aborts.set(aborts.get().wrapping_add(1));
            });
        }
    }
}

static BUS_MONITOR: BusMonitor = BusMonitor::new();

static VECTORS: [InterruptVectorEntry; 1] = [InterruptVectorEntry::new(
    Line::new(pac::Interrupt::I2C1_IRQ as u16),
    "codec i2c",
    &BUS_MONITOR,
)];

/// Peripherals handed out to the bring-up steps, each exactly once.
struct EvalBoard {
    nvic: Option<pac::NVIC>,
    i2c: Option<(pac::I2C1, SdaPin, SclPin)>,
    uart: Option<(pac::UART0, UartPins)>,
    resets: pac::RESETS,
    system_clock: HertzU32,
    peripheral_clock: HertzU32,
    timer: hal::Timer,
    registers_taken: bool,
}

impl Board<LINES> for EvalBoard {
    type Controller = Nvic<LINES>;
    type I2c = CodecBus;
    type Delay = hal::Timer;
    type Serial = Console;
    type Registers = DdsRegisters;

    fn interrupt_controller(&mut self) -> Result<Nvic<LINES>, &'static str> {
        self.nvic.take().map(Nvic::new).ok_or("NVIC already taken")
    }

    fn dispatch(&self) -> &SharedDispatch<Nvic<LINES>, LINES> {
        &DISPATCH
    }

    fn init_i2c(&mut self) -> Result<CodecBus, &'static str> {
        let (i2c1, sda, scl) = self.i2c.take().ok_or("I2C1 already taken")?;
        let bus = hal::I2C::i2c1(
            i2c1,
            sda,
            scl,
            100.kHz(),
            &mut self.resets,
            self.system_clock,
        );
        // Only transfer aborts (M_TX_ABRT) reach the bus monitor
        // SAFETY: the interrupt mask is not touched by the HAL driver.
        unsafe {
            (*pac::I2C1::ptr())
                .ic_intr_mask()
                .write(|w| w.bits(1 << 6));
        }
        Ok(bus)
    }

    fn delay(&mut self) -> &mut hal::Timer {
        &mut self.timer
    }

    fn configure_uart(&mut self, baud_rate: HertzU32) -> Result<Console, &'static str> {
        let (uart0, pins) = self.uart.take().ok_or("UART0 already taken")?;
        UartPeripheral::new(uart0, pins, &mut self.resets)
            .enable(
                UartConfig::new(baud_rate, DataBits::Eight, None, StopBits::One),
                self.peripheral_clock,
            )
            .map_err(|_| "baud rate out of reach")
    }

    fn init_display(&mut self) -> Result<(), &'static str> {
        defmt::info!("no display fitted");
        Ok(())
    }

    fn dds_registers(&mut self) -> Result<DdsRegisters, &'static str> {
        if self.registers_taken {
            return Err("DDS registers already taken");
        }
        self.registers_taken = true;
        // SAFETY: SRAM5 is excluded from RAM in memory.x and handed out once.
        Ok(unsafe { DdsRegisters::from_address(DDS_BASE) })
    }
}

/// Entry point to our bare-metal application.
///
/// The `#[rp2040_hal::entry]` macro ensures the Cortex-M start-up code calls this function
/// as soon as all global variables and the spinlock are initialised.
#[hal::entry]
fn main() -> ! {
    defmt::info!("dds-firmware start");
    let mut pac = pac::Peripherals::take().unwrap();
    let core = pac::CorePeripherals::take().unwrap();
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    let clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut board = EvalBoard {
        nvic: Some(core.NVIC),
        i2c: Some((pac.I2C1, pins.gpio18.reconfigure(), pins.gpio19.reconfigure())),
        uart: Some((
            pac.UART0,
            (pins.gpio0.into_function(), pins.gpio1.into_function()),
        )),
        resets: pac.RESETS,
        system_clock: clocks.system_clock.freq(),
        peripheral_clock: clocks.peripheral_clock.freq(),
        timer,
        registers_taken: false,
    };

    let code = bringup::run::<_, LINES>(
        &mut board,
        &VectorTable::new(&VECTORS),
        &bringup::Config::new(),
    );
    defmt::info!(
        "exit code {}, {} codec bus aborts",
        code.code(),
        BUS_MONITOR.aborts()
    );

    loop {
        cortex_m::asm::wfi();
    }
}

#[interrupt]
fn I2C1_IRQ() {
    DISPATCH.dispatch_active();
}

// End of file
