/*
 * Input/Output Utilities
 *
 * Serial writer and the print!/println! macros built on it. The
 * framebuffer console lived here too, but it had no reader in a kernel
 * with no userspace shell to draw it for.
 */

pub mod writer;
#[macro_use]
pub mod macros;
