/*
 * Low-level port I/O
 */

pub mod pio;

pub use pio::{Io, Pio, ReadOnly};
