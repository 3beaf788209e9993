//! Terminal output: theme, progress formatting and the console reporter.

pub mod console;
pub mod progress;
pub mod theme;

pub use console::ConsoleReporter;
pub use theme::Theme;
