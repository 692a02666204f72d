/*
 * Interrupt Descriptor Table (IDT)
 *
 * Exception vectors 0-31 get handlers that log and halt (or panic, for the
 * ones with enough context to say something useful); IRQ0 (timer) and INT
 * 0x81 (voluntary yield) are wired to the scheduler's own naked-asm context
 * switch trampolines, since those own the full save/restore/iretq sequence
 * themselves rather than going through the `x86-interrupt` ABI.
 */

use lazy_static::lazy_static;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame};

use crate::utils::debug::irq_log::irq_log_simple;

unsafe fn pic_eoi(irq: u8) {
    use x86_64::instructions::port::Port;
    if irq >= 8 {
        unsafe { Port::<u8>::new(0xA0).write(0x20) };
    }
    unsafe { Port::<u8>::new(0x20).write(0x20) };
}

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();

        idt.divide_error.set_handler_fn(divide_error_handler);
        idt.debug.set_handler_fn(debug_handler);
        idt.non_maskable_interrupt.set_handler_fn(nmi_handler);
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        idt.overflow.set_handler_fn(overflow_handler);
        idt.bound_range_exceeded.set_handler_fn(bound_range_exceeded_handler);
        idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
        idt.device_not_available.set_handler_fn(device_not_available_handler);
        unsafe {
            idt.double_fault
                .set_handler_fn(double_fault_handler)
                .set_stack_index(crate::arch::x86_64::gdt::DOUBLE_FAULT_IST_INDEX);
        }
        idt.invalid_tss.set_handler_fn(invalid_tss_handler);
        idt.segment_not_present.set_handler_fn(segment_not_present_handler);
        idt.stack_segment_fault.set_handler_fn(stack_segment_fault_handler);
        idt.general_protection_fault.set_handler_fn(general_protection_fault_handler);
        idt.page_fault.set_handler_fn(page_fault_handler);
        idt.x87_floating_point.set_handler_fn(x87_floating_point_handler);
        idt.alignment_check.set_handler_fn(alignment_check_handler);
        idt.machine_check.set_handler_fn(machine_check_handler);
        idt.simd_floating_point.set_handler_fn(simd_floating_point_handler);
        idt.virtualization.set_handler_fn(virtualization_handler);
        idt.security_exception.set_handler_fn(security_exception_handler);

        // INT 0x81: voluntary yield, handled by the scheduler's own trampoline.
        unsafe {
            idt[0x81].set_handler_addr(core::mem::transmute::<*const (), x86_64::VirtAddr>(
                crate::sched::yield_interrupt_handler as *const (),
            ));
        }

        // IRQ 0 (timer, vector 32): preemption, also the scheduler's own trampoline.
        unsafe {
            idt[32].set_handler_addr(core::mem::transmute::<*const (), x86_64::VirtAddr>(
                crate::sched::preemptive_timer_interrupt_handler as *const (),
            ));
        }

        idt[36].set_handler_fn(serial_interrupt_handler); // IRQ 4 - Serial COM1
        idt[39].set_handler_fn(serial_interrupt_handler); // IRQ 7 - Serial COM2
        idt[0x68].set_handler_fn(generic_interrupt_handler);

        idt
    };
}

pub fn init() {
    IDT.load();
    log::info!("IDT loaded");
}

extern "x86-interrupt" fn divide_error_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("DIVIDE_ERROR");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn debug_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("DEBUG_EXCEPTION");
}

extern "x86-interrupt" fn nmi_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("NMI");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn breakpoint_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("BREAKPOINT");
}

extern "x86-interrupt" fn overflow_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("OVERFLOW");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn bound_range_exceeded_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("BOUND_RANGE_EXCEEDED");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn invalid_opcode_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("INVALID_OPCODE");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn device_not_available_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("DEVICE_NOT_AVAILABLE");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn double_fault_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    irq_log_simple("DOUBLE_FAULT");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn invalid_tss_handler(_stack_frame: InterruptStackFrame, _error_code: u64) {
    irq_log_simple("INVALID_TSS");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn segment_not_present_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) {
    irq_log_simple("SEGMENT_NOT_PRESENT");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn stack_segment_fault_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) {
    irq_log_simple("STACK_SEGMENT_FAULT");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn general_protection_fault_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) {
    irq_log_simple("GENERAL_PROTECTION_FAULT");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: x86_64::structures::idt::PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;

    irq_log_simple("PAGE_FAULT");
    let fault_addr = Cr2::read().ok();
    log::error!("page fault at {:?}, rip {:?}", fault_addr, stack_frame.instruction_pointer);
    log::error!("error code: {:?}", error_code);
    panic!("unrecoverable page fault");
}

extern "x86-interrupt" fn x87_floating_point_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("X87_FP_EXCEPTION");
    panic!("x87 floating point exception");
}

extern "x86-interrupt" fn alignment_check_handler(_stack_frame: InterruptStackFrame, _error_code: u64) {
    irq_log_simple("ALIGNMENT_CHECK");
    panic!("alignment check exception");
}

extern "x86-interrupt" fn machine_check_handler(_stack_frame: InterruptStackFrame) -> ! {
    irq_log_simple("MACHINE_CHECK");
    loop {
        x86_64::instructions::hlt();
    }
}

extern "x86-interrupt" fn simd_floating_point_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("SIMD_FP_EXCEPTION");
    panic!("SIMD floating point exception");
}

extern "x86-interrupt" fn virtualization_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("VIRTUALIZATION_EXCEPTION");
    panic!("virtualization exception");
}

extern "x86-interrupt" fn security_exception_handler(
    _stack_frame: InterruptStackFrame,
    _error_code: u64,
) {
    irq_log_simple("SECURITY_EXCEPTION");
    panic!("security exception");
}

extern "x86-interrupt" fn serial_interrupt_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("SERIAL_IRQ");
    unsafe {
        pic_eoi(4);
    }
}

extern "x86-interrupt" fn generic_interrupt_handler(_stack_frame: InterruptStackFrame) {
    irq_log_simple("GENERIC_IRQ");
    unsafe {
        pic_eoi(15);
    }
}
