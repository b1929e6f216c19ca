//! Interrupt Descriptor Table (IDT) and exception handlers for x86_64.
//!
//! Only CPU exceptions are wired up: the kernel polls its devices and never
//! unmasks hardware interrupts. A fault raised by guest code ends that
//! program instead of the kernel.

use crate::arch::x86_64::gdt;
use crate::arch::x86_64::trampoline::{self, FAULT_EXIT_CODE};
use crate::config::{LOAD_BASE, LOAD_SIZE};
use crate::println;
use lazy_static::lazy_static;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};

lazy_static! {
    /// The Interrupt Descriptor Table (IDT).
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        idt.breakpoint.set_handler_fn(breakpoint_handler);
        // SAFETY: the IST slot is set up by gdt::init before the IDT loads.
        unsafe {
            idt.double_fault.set_handler_fn(double_fault_handler)
                .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
        }
        idt.page_fault.set_handler_fn(page_fault_handler);
        idt.general_protection_fault.set_handler_fn(general_protection_fault_handler);
        idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
        idt.divide_error.set_handler_fn(divide_error_handler);
        idt
    };
}

/// Loads the IDT. Hardware interrupts stay disabled.
pub fn init_idt() {
    IDT.load();
}

/// Kills the running program if the fault came from its code.
fn end_guest_on_fault(name: &str, stack_frame: &InterruptStackFrame) {
    let ip = stack_frame.instruction_pointer.as_u64();
    let window = u64::from(LOAD_BASE)..u64::from(LOAD_BASE) + u64::from(LOAD_SIZE);
    if trampoline::guest_running() && window.contains(&ip) {
        log::warn!("{} in guest at {:#x}", name, ip);
        println!("\n[Program fault: {} at {:#x}]", name, ip);
        trampoline::leave_guest(FAULT_EXIT_CODE);
    }
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    println!("EXCEPTION: BREAKPOINT\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    panic!("EXCEPTION: DOUBLE FAULT\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;

    end_guest_on_fault("page fault", &stack_frame);
    println!("EXCEPTION: PAGE FAULT");
    println!("Accessed Address: {:?}", Cr2::read());
    println!("Error Code: {:?}", error_code);
    println!("{:#?}", stack_frame);
    crate::arch::x86_64::halt_loop();
}

extern "x86-interrupt" fn general_protection_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    end_guest_on_fault("general protection fault", &stack_frame);
    println!("EXCEPTION: GENERAL PROTECTION FAULT");
    println!("Error Code: {:#x}", error_code);
    println!("{:#?}", stack_frame);
    crate::arch::x86_64::halt_loop();
}

extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    end_guest_on_fault("invalid opcode", &stack_frame);
    println!("EXCEPTION: INVALID OPCODE\n{:#?}", stack_frame);
    crate::arch::x86_64::halt_loop();
}

extern "x86-interrupt" fn divide_error_handler(stack_frame: InterruptStackFrame) {
    end_guest_on_fault("divide error", &stack_frame);
    println!("EXCEPTION: DIVIDE ERROR\n{:#?}", stack_frame);
    crate::arch::x86_64::halt_loop();
}
