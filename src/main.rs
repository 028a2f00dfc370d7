//! # rtsched Demo Firmware
//!
//! Brings up the kernel with a few tasks and retires them one by one
//! through the exit path, leaving the idle task at the ready head:
//!
//! | Task | Priority | Fate |
//! |------|----------|------|
//! | `sensor` | 5 | Exits first (highest priority, runs first) |
//! | `logger` | 3 | Exits second |
//! | `idle`   | 0 | Never exits |
//!
//! The context switch itself is only pended; this image exercises the
//! scheduler bookkeeping, not PendSV.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use panic_halt as _;

use rtsched::arch::cortex_m4;
use rtsched::error::OK;
use rtsched::kernel;
use rtsched::task::TaskConfig;

#[entry]
fn main() -> ! {
    cortex_m4::set_interrupt_priorities();

    let idle = kernel::init().expect("failed to start idle task");

    kernel::create_task(TaskConfig {
        name: "sensor",
        priority: 5,
    })
    .expect("failed to create sensor task");
    kernel::create_task(TaskConfig {
        name: "logger",
        priority: 3,
    })
    .expect("failed to create logger task");

    // Retire every task above idle
    while kernel::current_task() != Some(idle) {
        if kernel::exit() != OK {
            break;
        }
        cortex_m4::trigger_pendsv();
    }

    loop {
        cortex_m::asm::wfi();
    }
}
