/*
 * x86_64 Architecture Support Module
 *
 * All x86_64-specific code: GDT/TSS setup, the IDT and exception handling,
 * and interrupt control utilities. Everything above this layer deals only
 * in the generic `InterruptContext`/`PlatformOps` abstractions.
 */

pub mod gdt;
pub mod idt;
pub mod interrupts;

