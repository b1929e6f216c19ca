//! Lodestar Kernel Entry Point
//!
//! This is the main entry point for the Lodestar kernel. Host builds get an
//! empty `main` so the workspace builds and tests on a development machine.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
extern crate alloc;

#[cfg(target_os = "none")]
mod kernel {
    use ::x86_64::VirtAddr;
    use alloc::boxed::Box;
    use alloc::format;
    use bootloader::BootInfo;
    use core::panic::PanicInfo;
    use lodestar_common::ExecError;
    use lodestar_kernel::arch::x86_64::{self, keyboard, serial::SerialWrapper, vga::Color};
    use lodestar_kernel::arch::x86_64::trampoline::X86Trampoline;
    use lodestar_kernel::boot::{self, Status};
    use lodestar_kernel::config::{
        KernelConfig, GUEST_STACK_BOTTOM, GUEST_STACK_TOP, INIT_PROGRAM, LOAD_BASE, LOAD_SIZE,
    };
    use lodestar_kernel::console::SystemConsole;
    use lodestar_kernel::memory::{self, PhysicalWindow};
    use lodestar_kernel::terminal::{commands::exec_error_message, decode_serial, Terminal};
    use lodestar_kernel::{println, serial_println, Kernel};
    use lodestar_hal::Serial;

    bootloader::entry_point!(kernel_main);

    /// Kernel entry point.
    ///
    /// Called by the bootloader after setting up the initial environment.
    fn kernel_main(boot_info: &'static BootInfo) -> ! {
        // ====================================================================
        // Phase 1: Core Initialization
        // ====================================================================
        lodestar_kernel::init();

        let phys_mem_offset = VirtAddr::new(boot_info.physical_memory_offset);
        // SAFETY: the bootloader maps all physical memory at this offset, and
        // this is the only mapper ever created.
        let mut mapper = unsafe { memory::init_mapper(phys_mem_offset) };
        // SAFETY: the bootloader's memory map marks only unused frames usable.
        let mut frame_allocator =
            unsafe { memory::BootInfoFrameAllocator::init(&boot_info.memory_map) };

        if let Err(e) = lodestar_kernel::allocator::init_heap(&mut mapper, &mut frame_allocator) {
            serial_println!("heap initialization failed: {:?}", e);
            x86_64::halt_loop();
        }

        x86_64::vga::clear_screen();
        boot::banner::print_banner();

        // ====================================================================
        // Phase 2: Boot Logging
        // ====================================================================
        boot::log(Status::Ok, "Serial port initialized");
        boot::log(Status::Ok, "GDT loaded");
        boot::log(Status::Ok, "IDT configured (exceptions only)");
        boot::log(Status::Ok, "Kernel heap ready");

        boot::log_start("Mapping guest memory");
        let stack_size = u64::from(GUEST_STACK_TOP - GUEST_STACK_BOTTOM);
        let mapped = memory::map_region(
            u64::from(GUEST_STACK_BOTTOM),
            stack_size,
            &mut mapper,
            &mut frame_allocator,
        )
        .and_then(|()| {
            memory::map_region(
                u64::from(LOAD_BASE),
                u64::from(LOAD_SIZE),
                &mut mapper,
                &mut frame_allocator,
            )
        });
        if let Err(e) = mapped {
            boot::log_end(Status::Fail);
            boot::log_detail(&format!("{:?}", e));
            x86_64::halt_loop();
        }
        boot::log_end(Status::Ok);
        boot::log_detail(&format!(
            "Load window {:#010x}, stack top {:#010x}",
            LOAD_BASE, GUEST_STACK_TOP
        ));

        #[cfg(feature = "selftest")]
        {
            lodestar_kernel::tests::run_all();
            lodestar_kernel::testutil::exit_qemu(lodestar_kernel::testutil::QemuExitCode::Success);
        }

        let fs = boot::mount_root();

        // SAFETY: guest addresses are kernel addresses in this single address
        // space, and the window and stack were mapped above.
        let guest_memory = unsafe { PhysicalWindow::new() };
        let kernel = Kernel::new(
            KernelConfig::DEFAULT,
            Box::new(guest_memory),
            fs,
            Box::new(SystemConsole),
            Box::new(X86Trampoline::new(u64::from(GUEST_STACK_TOP))),
        );
        boot::log(Status::Ok, "Syscall table published");
        boot::log_detail(&format!("Table at {:#010x}", kernel.table_address()));

        // ====================================================================
        // Boot Complete
        // ====================================================================
        println!();
        boot::log(Status::Ok, "Boot complete!");

        match kernel.exec(INIT_PROGRAM) {
            Ok(code) => boot::log(Status::Info, &format!("Shell exited with code {}", code)),
            Err(ExecError::NotFound) => boot::log(Status::Info, "No shell on disk"),
            Err(e) => boot::log(Status::Warn, &exec_error_message(e, INIT_PROGRAM)),
        }

        x86_64::vga::set_color(Color::Cyan, Color::Black);
        println!("\n Type 'help' for available commands.\n");
        x86_64::vga::set_color(Color::White, Color::Black);

        monitor(&kernel)
    }

    /// Polls keyboard and serial input and feeds the kernel monitor.
    fn monitor(kernel: &Kernel) -> ! {
        let mut terminal = Terminal::new();
        terminal.prompt();
        loop {
            let key = keyboard::poll_key().or_else(|| SerialWrapper.read_byte().and_then(decode_serial));
            match key {
                Some(key) => {
                    if let Some(command) = terminal.handle_key(key) {
                        command.execute(kernel, &terminal);
                        terminal.prompt();
                    }
                }
                None => core::hint::spin_loop(),
            }
        }
    }

    /// Panic handler.
    ///
    /// Called when the kernel encounters an unrecoverable error.
    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        #[cfg(feature = "selftest")]
        lodestar_kernel::testutil::test_panic_handler(info);

        serial_println!("KERNEL PANIC: {}", info);

        x86_64::vga::set_color(Color::LightRed, Color::Black);
        println!("\n\n!!! KERNEL PANIC !!!");
        x86_64::vga::set_color(Color::White, Color::Black);
        println!("{}", info);

        x86_64::halt_loop()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
