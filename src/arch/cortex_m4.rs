//! # Cortex-M4 Exit Glue
//!
//! Architecture-specific half of `_exit()`. The scheduler bookkeeping
//! leaves a new task at the ready head; the switch itself is deferred to
//! PendSV, which runs at the lowest priority once interrupts are unmasked.

use log::warn;

use crate::kernel;

/// Trigger a PendSV exception to perform a context switch.
///
/// Sets the PENDSVSET bit in the Interrupt Control and State Register (ICSR).
#[inline]
pub fn trigger_pendsv() {
    // ICSR address: 0xE000_ED04, PENDSVSET = bit 28
    const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
    unsafe {
        core::ptr::write_volatile(ICSR, 1 << 28);
    }
}

/// Set PendSV and SysTick to the lowest interrupt priority so a pended
/// switch never preempts an application ISR.
pub fn set_interrupt_priorities() {
    unsafe {
        // System Handler Priority Register 3 (SHPR3): 0xE000_ED20
        // Bits [23:16] = PendSV priority
        // Bits [31:24] = SysTick priority
        let shpr3: *mut u32 = 0xE000_ED20 as *mut u32;
        let val = core::ptr::read_volatile(shpr3);
        let val = val | (0xFF << 16) | (0xFF << 24);
        core::ptr::write_volatile(shpr3, val);
    }
}

/// Terminate the running task. **Does not return.**
///
/// Used as the return address of every task entry point. Interrupts are
/// masked inside `kernel::exit()`; once they are restored the pended
/// PendSV switches to the new ready head.
pub extern "C" fn exit_current() -> ! {
    let status = kernel::exit();
    if status != crate::error::OK {
        warn!("task exit finished with status {}", status);
    }

    trigger_pendsv();
    loop {
        cortex_m::asm::wfi();
    }
}
