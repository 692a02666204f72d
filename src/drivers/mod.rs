/*
 * Hardware drivers: serial (debug logging) and the PIC/PIT system timer.
 * Display and input were only ever needed by the userspace shell this
 * build doesn't have.
 */

pub mod serial;
pub mod system;
