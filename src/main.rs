/*
 * Kernel entry point
 *
 * Boot sequence: debug infra, logging, GDT/IDT, the x86_64 platform ops
 * table, heap, then the concurrency core itself (scheduler, futex/
 * semaphore, signals) - followed by a handful of demonstration/test
 * threads before interrupts and preemption are turned on.
 */

#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]
#![feature(alloc_error_handler)]
#![allow(dead_code)]

extern crate alloc;

use core::panic::PanicInfo;

mod arch;
mod bootboot;
mod drivers;
mod io;
mod memory;
mod platform;
mod sched;
mod signal;
mod sync;
mod tests;
mod utils;

#[repr(C, align(16))]
pub struct AlignedBspStack([u8; 64 * 1024]);

#[unsafe(no_mangle)]
pub static mut BSP_STACK: AlignedBspStack = AlignedBspStack([0; 64 * 1024]);

/// Called directly by the BOOTBOOT loader on every core. Identifies the
/// bootstrap processor, switches onto our own stack, and jumps into Rust.
/// Every other core parks at `hlt` without ever entering Rust - real SMP
/// bring-up is out of scope for this build.
#[unsafe(naked)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _start() -> ! {
    core::arch::naked_asm!(
        "mov eax, 1",
        "cpuid",
        "shr ebx, 24",
        "lea rax, [rip + bootboot]",
        "movzx ecx, word ptr [rax + 0x0C]",
        "cmp ebx, ecx",
        "jne 2f",
        "lea rax, [rip + BSP_STACK]",
        "add rax, {stack_size}",
        "mov rsp, rax",
        "jmp kstart",
        "2:",
        "1:",
        "hlt",
        "jmp 1b",
        stack_size = const 64 * 1024,
    );
}

#[unsafe(no_mangle)]
pub extern "C" fn kstart() -> ! {
    utils::debug::init_debug_infrastructure();
    utils::debug::logger::init(true);
    log::info!("kernel starting");

    arch::x86_64::gdt::init();
    arch::x86_64::idt::init();

    platform::install(&platform::x86_64_impl::PLATFORM);

    memory::init();

    drivers::system::init();

    sched::init();
    sync::init();
    signal::init();

    tests::comprehensive::spawn_test_threads();

    x86_64::instructions::interrupts::enable();
    log::info!("interrupts enabled");

    sched::enable();
    log::info!("scheduler enabled");

    loop {
        x86_64::instructions::hlt();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();

    if let Some(location) = info.location() {
        log::error!("PANIC at {}:{}: {}", location.file(), location.line(), info.message());
    } else {
        log::error!("PANIC: {}", info.message());
    }

    loop {
        x86_64::instructions::hlt();
    }
}
