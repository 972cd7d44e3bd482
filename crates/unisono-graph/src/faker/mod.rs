//! Software stand-ins for native node types some engines lack.

pub mod iir;

pub use iir::IirBackend;
