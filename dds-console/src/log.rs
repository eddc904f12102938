//! Internal log macros.
//!
//! Forward to `defmt` when the `defmt` feature is enabled. Without it the
//! arguments are only borrowed so call sites compile to nothing.

macro_rules! log_forward {
    ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        ::defmt::$level!($fmt $(, $arg)*);
        #[cfg(not(feature = "defmt"))]
        let _ = ($(&$arg,)*);
    }};
}

/// Prints a debug message.
macro_rules! debug {
    ($($t:tt)*) => { log_forward!(debug, $($t)*) };
}

/// Prints an info message.
macro_rules! info {
    ($($t:tt)*) => { log_forward!(info, $($t)*) };
}

/// Prints a warning.
macro_rules! warn {
    ($($t:tt)*) => { log_forward!(warn, $($t)*) };
}

/// Prints an error.
macro_rules! error {
    ($($t:tt)*) => { log_forward!(error, $($t)*) };
}
