//! Interrupt vector table
//!
//! A fixed list binding interrupt lines to the driver instance that services
//! them. The table is built at compile time (usually as a `static` array in the
//! board support code), handed by reference to
//! [`InterruptDispatch::register`](crate::dispatch::InterruptDispatch::register)
//! and never changes afterwards.
//!
//! ```
//! use dds_console::vector_table::{InterruptVectorEntry, IrqHandler, Line, VectorTable};
//!
//! struct BusMonitor;
//!
//! impl IrqHandler for BusMonitor {
//!     fn handle(&self) {}
//! }
//!
//! static BUS_MONITOR: BusMonitor = BusMonitor;
//! static ENTRIES: [InterruptVectorEntry; 1] =
//!     [InterruptVectorEntry::new(Line::new(24), "codec i2c", &BUS_MONITOR)];
//! static VECTORS: VectorTable<'static> = VectorTable::new(&ENTRIES);
//!
//! assert_eq!(VECTORS.len(), 1);
//! assert_eq!(VECTORS.entries()[0].line(), Line::new(24));
//! ```

use core::{fmt, slice};

/// Number of an interrupt line at the platform interrupt controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Line(u16);

impl Line {
    /// Create a line from its controller number.
    pub const fn new(number: u16) -> Self {
        Self(number)
    }

    /// Return the controller number.
    pub const fn number(self) -> u16 {
        self.0
    }

    /// Return the number as a table index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Implemented by the driver instances that service an interrupt line.
///
/// The implementing value is the handler's context: dispatch calls `handle` on
/// exactly the instance stored in the vector table entry.
pub trait IrqHandler {
    /// Called when the corresponding interrupt is asserted.
    ///
    /// Runs to completion with the line's dispatch in progress. Failures are
    /// the driver's own business and are not reported back.
    fn handle(&self);
}

impl<F> IrqHandler for F
where
    F: Fn(),
{
    fn handle(&self) {
        self()
    }
}

/// One binding of the interrupt vector table.
#[derive(Clone, Copy)]
pub struct InterruptVectorEntry {
    /// The interrupt line.
    line: Line,

    /// Descriptive name.
    name: &'static str,

    /// The driver instance servicing the line.
    handler: &'static (dyn IrqHandler + Sync),
}

impl InterruptVectorEntry {
    /// Create an entry.
    pub const fn new(
        line: Line,
        name: &'static str,
        handler: &'static (dyn IrqHandler + Sync),
    ) -> Self {
        Self {
            line,
            name,
            handler,
        }
    }

    /// Return the line.
    pub const fn line(&self) -> Line {
        self.line
    }

    /// Return the name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Return the handler.
    pub const fn handler(&self) -> &'static (dyn IrqHandler + Sync) {
        self.handler
    }
}

impl fmt::Debug for InterruptVectorEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InterruptVectorEntry")
            .field("line", &self.line)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The ordered, immutable set of vector table entries.
#[derive(Clone, Copy, Debug)]
pub struct VectorTable<'a> {
    entries: &'a [InterruptVectorEntry],
}

impl<'a> VectorTable<'a> {
    /// Wrap a list of entries. Registration follows the order of the list.
    pub const fn new(entries: &'a [InterruptVectorEntry]) -> Self {
        Self { entries }
    }

    /// Return the entries in table order.
    pub const fn entries(&self) -> &'a [InterruptVectorEntry] {
        self.entries
    }

    /// Iterate over the entries in table order.
    pub fn iter(&self) -> slice::Iter<'a, InterruptVectorEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &VectorTable<'a> {
    type Item = &'a InterruptVectorEntry;
    type IntoIter = slice::Iter<'a, InterruptVectorEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static HITS: AtomicUsize = AtomicUsize::new(0);

    fn count_hit() {
        HITS.fetch_add(1, Ordering::Relaxed);
    }

    static COUNTER: fn() = count_hit;

    #[test]
    fn closures_are_handlers() {
        let entry = InterruptVectorEntry::new(Line::new(3), "counter", &COUNTER);
        entry.handler().handle();
        entry.handler().handle();
        assert_eq!(HITS.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn table_keeps_declaration_order() {
        let entries = [
            InterruptVectorEntry::new(Line::new(7), "first", &COUNTER),
            InterruptVectorEntry::new(Line::new(2), "second", &COUNTER),
        ];
        let table = VectorTable::new(&entries);
        let names: [&str; 2] = [table.entries()[0].name(), table.entries()[1].name()];
        assert_eq!(names, ["first", "second"]);
        assert_eq!(
            table.iter().map(|e| e.line().number()).sum::<u16>(),
            9
        );
        assert!(!table.is_empty());
    }

    #[test]
    fn line_index() {
        assert_eq!(Line::new(31).index(), 31);
        assert_eq!(Line::new(31).number(), 31);
    }
}
