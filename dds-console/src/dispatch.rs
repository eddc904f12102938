//! Interrupt dispatch
//!
//! [`InterruptDispatch`] sits on top of a platform [`InterruptController`]. It
//! binds the entries of a [`VectorTable`] to their lines, enables those lines
//! at the controller and routes every asserted interrupt to the handler bound
//! to it.
//!
//! The controller moves through three phases:
//!
//! ```text
//! initialize() -> Initialized --register()--> Registered --enable()--> Enabled
//!                                  ^    |
//!                                  +----+ (register() may be repeated)
//! ```
//!
//! An uninitialized controller cannot be observed: [`InterruptDispatch::initialize`]
//! is the only way to obtain one. Asking for the lines to be enabled before
//! anything was registered is an [`OrderError`].
//!
//! Interrupt handlers reach the controller through [`SharedDispatch`], a
//! critical-section protected slot that usually lives in a `static`:
//!
//! ```no_run
//! use dds_console::dispatch::{InterruptController, InterruptDispatch, SharedDispatch};
//! use dds_console::vector_table::{InterruptVectorEntry, Line, VectorTable};
//!
//! struct Controller;
//! impl InterruptController for Controller {
//!     fn init(&mut self) -> Result<(), &'static str> { Ok(()) }
//!     fn enable(&mut self, _line: Line) {}
//!     fn disable(&mut self, _line: Line) {}
//!     fn active_line(&self) -> Option<Line> { None }
//! }
//!
//! static DISPATCH: SharedDispatch<Controller, 32> = SharedDispatch::new();
//! static TICK: fn() = || {};
//! static ENTRIES: [InterruptVectorEntry; 1] =
//!     [InterruptVectorEntry::new(Line::new(3), "tick", &TICK)];
//!
//! let vectors = VectorTable::new(&ENTRIES);
//! let mut dispatch = InterruptDispatch::initialize(Controller).unwrap();
//! dispatch.register(&vectors).unwrap();
//! dispatch.enable(&vectors).unwrap();
//! DISPATCH.install(dispatch);
//!
//! // From the interrupt handler:
//! DISPATCH.dispatch_active();
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::vector_table::{InterruptVectorEntry, Line, VectorTable};

/// Default number of lines a dispatch table can hold.
pub const MAX_LINES: usize = 64;

/// A platform interrupt controller.
///
/// Implemented by the interrupt hardware backends, see [`crate::nvic`] for
/// the Cortex-M one.
pub trait InterruptController {
    /// Bring the controller to a known state and connect it to the processor's
    /// exception mechanism.
    fn init(&mut self) -> Result<(), &'static str>;

    /// Let `line` through to the processor.
    fn enable(&mut self, line: Line);

    /// Stop `line` from reaching the processor.
    fn disable(&mut self, line: Line);

    /// The line currently being serviced, if any.
    fn active_line(&self) -> Option<Line>;

    /// Acknowledge `line` after its handler has returned.
    ///
    /// Controllers that acknowledge in hardware keep the default, which does
    /// nothing.
    fn end_of_interrupt(&mut self, _line: Line) {}
}

/// Lifecycle phase of an [`InterruptDispatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// The controller is configured, no line is bound.
    Initialized,
    /// At least one vector table has been registered.
    Registered,
    /// Lines have been enabled. Dispatch only from here on.
    Enabled,
}

/// Operations requested in the wrong phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OrderError {
    /// `enable` was called before any `register`.
    EnableBeforeRegister,
    /// `enable` was asked for a line that has no handler bound.
    LineNotRegistered(Line),
    /// `register` was called after lines were enabled.
    RegisterAfterEnable,
}

/// Dispatch errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The platform controller failed to initialize.
    Init(&'static str),
    /// A protocol step was called out of order.
    Order(OrderError),
    /// The line does not fit in the dispatch table.
    LineOutOfRange(Line),
}

impl From<OrderError> for Error {
    fn from(e: OrderError) -> Self {
        Error::Order(e)
    }
}

/// Routes interrupts from an [`InterruptController`] to the handlers of a
/// [`VectorTable`].
///
/// `LINES` bounds the line numbers the table can bind.
pub struct InterruptDispatch<C, const LINES: usize = MAX_LINES> {
    controller: C,
    table: [Option<InterruptVectorEntry>; LINES],
    enabled: [bool; LINES],
    phase: Phase,
    spurious: u32,
}

impl<C: InterruptController, const LINES: usize> InterruptDispatch<C, LINES> {
    /// Initialize `controller` and wrap it in an empty dispatch table.
    pub fn initialize(mut controller: C) -> Result<Self, Error> {
        controller.init().map_err(Error::Init)?;
        debug!("interrupt controller initialized");
        Ok(Self {
            controller,
            table: [None; LINES],
            enabled: [false; LINES],
            phase: Phase::Initialized,
            spurious: 0,
        })
    }

    /// Bind every entry of `vectors` to its line, in table order.
    ///
    /// When a line appears more than once the last entry wins. Nothing is
    /// bound if any entry's line is out of range.
    pub fn register(&mut self, vectors: &VectorTable) -> Result<(), Error> {
        if self.phase == Phase::Enabled {
            return Err(OrderError::RegisterAfterEnable.into());
        }
        self.check_range(vectors)?;

        for entry in vectors {
            let line = entry.line();
            if let Some(previous) = self.table[line.index()].replace(*entry) {
                warn!(
                    "line {} rebound from {} to {}",
                    line.number(),
                    previous.name(),
                    entry.name()
                );
            } else {
                debug!("line {} bound to {}", line.number(), entry.name());
            }
        }
        self.phase = Phase::Registered;
        Ok(())
    }

    /// Enable every line of `vectors` at the controller.
    ///
    /// Lines that are already enabled are left alone, so calling this twice is
    /// harmless. Every line must have been registered first; nothing is
    /// enabled otherwise.
    pub fn enable(&mut self, vectors: &VectorTable) -> Result<(), Error> {
        if self.phase == Phase::Initialized {
            return Err(OrderError::EnableBeforeRegister.into());
        }
        self.check_range(vectors)?;
        if let Some(entry) = vectors
            .iter()
            .find(|entry| self.table[entry.line().index()].is_none())
        {
            return Err(OrderError::LineNotRegistered(entry.line()).into());
        }

        for entry in vectors {
            let line = entry.line();
            if !self.enabled[line.index()] {
                self.controller.enable(line);
                self.enabled[line.index()] = true;
                debug!("line {} enabled", line.number());
            }
        }
        self.phase = Phase::Enabled;
        Ok(())
    }

    /// Disable a single line. The binding is kept.
    pub fn disable(&mut self, line: Line) -> Result<(), Error> {
        let enabled = self
            .enabled
            .get_mut(line.index())
            .ok_or(Error::LineOutOfRange(line))?;
        if *enabled {
            self.controller.disable(line);
            *enabled = false;
        }
        Ok(())
    }

    /// Run the handler bound to `line`, then acknowledge the line.
    ///
    /// Returns `false` without calling anything when the line is unbound or
    /// disabled; such interrupts are only counted, see
    /// [`spurious`](Self::spurious).
    pub fn dispatch(&mut self, line: Line) -> bool {
        let index = line.index();
        let entry = match self.table.get(index) {
            Some(Some(entry)) if self.enabled[index] => *entry,
            _ => {
                self.spurious = self.spurious.wrapping_add(1);
                warn!("spurious interrupt on line {}", line.number());
                return false;
            }
        };
        entry.handler().handle();
        self.controller.end_of_interrupt(line);
        true
    }

    /// Dispatch the line the controller reports as active.
    pub fn dispatch_active(&mut self) -> bool {
        match self.controller.active_line() {
            Some(line) => self.dispatch(line),
            None => {
                self.spurious = self.spurious.wrapping_add(1);
                false
            }
        }
    }

    fn check_range(&self, vectors: &VectorTable) -> Result<(), Error> {
        match vectors.iter().find(|entry| entry.line().index() >= LINES) {
            Some(entry) => Err(Error::LineOutOfRange(entry.line())),
            None => Ok(()),
        }
    }
}

impl<C, const LINES: usize> InterruptDispatch<C, LINES> {
    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether `line` is enabled.
    pub fn is_enabled(&self, line: Line) -> bool {
        self.enabled.get(line.index()).copied().unwrap_or(false)
    }

    /// The entry bound to `line`.
    pub fn binding(&self, line: Line) -> Option<&InterruptVectorEntry> {
        self.table.get(line.index()).and_then(Option::as_ref)
    }

    /// Number of interrupts that found no enabled handler.
    pub fn spurious(&self) -> u32 {
        self.spurious
    }

    /// Borrow the platform controller.
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Release the platform controller.
    pub fn free(self) -> C {
        self.controller
    }
}

/// An [`InterruptDispatch`] reachable from interrupt context.
///
/// Handlers run inside the critical section, so they run to completion and
/// never nest. A handler must not call back into the same `SharedDispatch`.
pub struct SharedDispatch<C, const LINES: usize = MAX_LINES> {
    slot: Mutex<RefCell<Option<InterruptDispatch<C, LINES>>>>,
}

impl<C, const LINES: usize> SharedDispatch<C, LINES> {
    /// Create an empty slot.
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(None)),
        }
    }

    /// Move a configured dispatch into the slot, returning the previous one.
    pub fn install(
        &self,
        dispatch: InterruptDispatch<C, LINES>,
    ) -> Option<InterruptDispatch<C, LINES>> {
        critical_section::with(|cs| self.slot.borrow(cs).borrow_mut().replace(dispatch))
    }

    /// Enable the lines of `vectors` and install `dispatch` in one critical
    /// section, so the first interrupt already finds its handler.
    ///
    /// Nothing is installed if enabling fails.
    pub fn install_enabled(
        &self,
        mut dispatch: InterruptDispatch<C, LINES>,
        vectors: &VectorTable,
    ) -> Result<(), Error>
    where
        C: InterruptController,
    {
        critical_section::with(|cs| {
            dispatch.enable(vectors)?;
            *self.slot.borrow(cs).borrow_mut() = Some(dispatch);
            Ok(())
        })
    }

    /// Take the dispatch back out of the slot.
    pub fn take(&self) -> Option<InterruptDispatch<C, LINES>> {
        critical_section::with(|cs| self.slot.borrow(cs).borrow_mut().take())
    }

    /// Run `f` on the installed dispatch.
    ///
    /// Returns `None` if nothing is installed.
    pub fn with<R>(&self, f: impl FnOnce(&mut InterruptDispatch<C, LINES>) -> R) -> Option<R> {
        critical_section::with(|cs| self.slot.borrow(cs).borrow_mut().as_mut().map(f))
    }
}

impl<C: InterruptController, const LINES: usize> SharedDispatch<C, LINES> {
    /// See [`InterruptDispatch::dispatch`]. `false` if nothing is installed.
    pub fn dispatch(&self, line: Line) -> bool {
        self.with(|dispatch| dispatch.dispatch(line))
            .unwrap_or(false)
    }

    /// See [`InterruptDispatch::dispatch_active`]. `false` if nothing is
    /// installed.
    pub fn dispatch_active(&self) -> bool {
        self.with(|dispatch| dispatch.dispatch_active())
            .unwrap_or(false)
    }
}

impl<C, const LINES: usize> Default for SharedDispatch<C, LINES> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_table::IrqHandler;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Init,
        Enable(u16),
        Disable(u16),
        Eoi(u16),
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        active: Option<Line>,
        fail_init: bool,
    }

    impl InterruptController for Recorder {
        fn init(&mut self) -> Result<(), &'static str> {
            self.events.push(Event::Init);
            if self.fail_init {
                Err("controller absent")
            } else {
                Ok(())
            }
        }

        fn enable(&mut self, line: Line) {
            self.events.push(Event::Enable(line.number()));
        }

        fn disable(&mut self, line: Line) {
            self.events.push(Event::Disable(line.number()));
        }

        fn active_line(&self) -> Option<Line> {
            self.active
        }

        fn end_of_interrupt(&mut self, line: Line) {
            self.events.push(Event::Eoi(line.number()));
        }
    }

    type Dispatch = InterruptDispatch<Recorder, 8>;

    fn dispatch() -> Dispatch {
        InterruptDispatch::initialize(Recorder::default()).unwrap()
    }

    static UART_HITS: AtomicUsize = AtomicUsize::new(0);
    static TIMER_HITS: AtomicUsize = AtomicUsize::new(0);
    static NOOP: fn() = || {};

    struct Counter(&'static AtomicUsize);

    impl IrqHandler for Counter {
        fn handle(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    static UART: Counter = Counter(&UART_HITS);
    static TIMER: Counter = Counter(&TIMER_HITS);

    #[test]
    fn initialize_reports_controller_failure() {
        let recorder = Recorder {
            fail_init: true,
            ..Recorder::default()
        };
        let result = InterruptDispatch::<_, 8>::initialize(recorder);
        assert!(matches!(result, Err(Error::Init("controller absent"))));
    }

    #[test]
    fn routes_to_bound_handler_with_its_context() {
        let entries = [
            InterruptVectorEntry::new(Line::new(1), "uart", &UART),
            InterruptVectorEntry::new(Line::new(4), "timer", &TIMER),
        ];
        let vectors = VectorTable::new(&entries);
        let mut dispatch = dispatch();
        dispatch.register(&vectors).unwrap();
        dispatch.enable(&vectors).unwrap();

        assert!(dispatch.dispatch(Line::new(4)));
        assert!(dispatch.dispatch(Line::new(4)));
        assert!(dispatch.dispatch(Line::new(1)));
        assert_eq!(TIMER_HITS.load(Ordering::SeqCst), 2);
        assert_eq!(UART_HITS.load(Ordering::SeqCst), 1);
        assert_eq!(
            dispatch.controller().events,
            [
                Event::Init,
                Event::Enable(1),
                Event::Enable(4),
                Event::Eoi(4),
                Event::Eoi(4),
                Event::Eoi(1),
            ]
        );
    }

    #[test]
    fn duplicate_line_last_writer_wins() {
        let entries = [
            InterruptVectorEntry::new(Line::new(2), "first", &NOOP),
            InterruptVectorEntry::new(Line::new(2), "second", &NOOP),
        ];
        let mut dispatch = dispatch();
        dispatch.register(&VectorTable::new(&entries)).unwrap();
        assert_eq!(dispatch.binding(Line::new(2)).unwrap().name(), "second");
    }

    #[test]
    fn enable_before_register_is_order_error() {
        let entries = [InterruptVectorEntry::new(Line::new(0), "noop", &NOOP)];
        let mut dispatch = dispatch();
        assert_eq!(
            dispatch.enable(&VectorTable::new(&entries)),
            Err(Error::Order(OrderError::EnableBeforeRegister))
        );
        assert_eq!(dispatch.phase(), Phase::Initialized);
    }

    #[test]
    fn enabling_unregistered_line_is_rejected_without_side_effects() {
        let registered = [InterruptVectorEntry::new(Line::new(0), "noop", &NOOP)];
        let requested = [
            InterruptVectorEntry::new(Line::new(0), "noop", &NOOP),
            InterruptVectorEntry::new(Line::new(5), "stray", &NOOP),
        ];
        let mut dispatch = dispatch();
        dispatch.register(&VectorTable::new(&registered)).unwrap();
        assert_eq!(
            dispatch.enable(&VectorTable::new(&requested)),
            Err(Error::Order(OrderError::LineNotRegistered(Line::new(5))))
        );
        assert!(!dispatch.is_enabled(Line::new(0)));
        assert_eq!(dispatch.controller().events, [Event::Init]);
    }

    #[test]
    fn enable_is_idempotent() {
        let entries = [InterruptVectorEntry::new(Line::new(3), "noop", &NOOP)];
        let vectors = VectorTable::new(&entries);
        let mut dispatch = dispatch();
        dispatch.register(&vectors).unwrap();
        dispatch.enable(&vectors).unwrap();
        dispatch.enable(&vectors).unwrap();
        assert_eq!(
            dispatch.controller().events,
            [Event::Init, Event::Enable(3)]
        );
        assert_eq!(dispatch.phase(), Phase::Enabled);
    }

    #[test]
    fn register_after_enable_is_rejected() {
        let entries = [InterruptVectorEntry::new(Line::new(3), "noop", &NOOP)];
        let vectors = VectorTable::new(&entries);
        let mut dispatch = dispatch();
        dispatch.register(&vectors).unwrap();
        dispatch.enable(&vectors).unwrap();
        assert_eq!(
            dispatch.register(&vectors),
            Err(Error::Order(OrderError::RegisterAfterEnable))
        );
    }

    #[test]
    fn out_of_range_line_binds_nothing() {
        let entries = [
            InterruptVectorEntry::new(Line::new(1), "ok", &NOOP),
            InterruptVectorEntry::new(Line::new(8), "too far", &NOOP),
        ];
        let mut dispatch = dispatch();
        assert_eq!(
            dispatch.register(&VectorTable::new(&entries)),
            Err(Error::LineOutOfRange(Line::new(8)))
        );
        assert!(dispatch.binding(Line::new(1)).is_none());
        assert_eq!(dispatch.disable(Line::new(9)), Err(Error::LineOutOfRange(Line::new(9))));
    }

    #[test]
    fn unbound_and_disabled_lines_are_spurious() {
        let entries = [InterruptVectorEntry::new(Line::new(6), "noop", &NOOP)];
        let vectors = VectorTable::new(&entries);
        let mut dispatch = dispatch();
        dispatch.register(&vectors).unwrap();

        // bound but not yet enabled
        assert!(!dispatch.dispatch(Line::new(6)));
        dispatch.enable(&vectors).unwrap();
        assert!(!dispatch.dispatch(Line::new(2)));
        assert!(!dispatch.dispatch(Line::new(200)));
        assert!(dispatch.dispatch(Line::new(6)));

        dispatch.disable(Line::new(6)).unwrap();
        assert!(!dispatch.dispatch(Line::new(6)));
        assert_eq!(dispatch.spurious(), 4);
        assert!(dispatch.binding(Line::new(6)).is_some());
        assert!(dispatch
            .controller()
            .events
            .ends_with(&[Event::Eoi(6), Event::Disable(6)]));
    }

    static SHARED_HITS: AtomicUsize = AtomicUsize::new(0);
    static SHARED: Counter = Counter(&SHARED_HITS);

    #[test]
    fn shared_dispatch_follows_active_line() {
        static SLOT: SharedDispatch<Recorder, 8> = SharedDispatch::new();
        let entries = [InterruptVectorEntry::new(Line::new(7), "shared", &SHARED)];
        let vectors = VectorTable::new(&entries);

        assert!(!SLOT.dispatch_active());

        let mut dispatch = dispatch();
        dispatch.register(&vectors).unwrap();
        dispatch.enable(&vectors).unwrap();
        assert!(SLOT.install(dispatch).is_none());

        assert!(!SLOT.dispatch_active());
        SLOT.with(|dispatch| dispatch.controller.active = Some(Line::new(7)));
        assert!(SLOT.dispatch_active());
        assert!(SLOT.dispatch(Line::new(7)));
        assert_eq!(SHARED_HITS.load(Ordering::SeqCst), 2);

        let dispatch = SLOT.take().unwrap();
        assert_eq!(dispatch.spurious(), 1);
        assert!(!SLOT.dispatch(Line::new(7)));
    }
}
