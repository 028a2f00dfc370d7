//! # Architecture Glue
//!
//! The part of task exit that touches the CPU: entering the exit path and
//! pending the context switch afterwards. Only the Cortex-M4 port exists;
//! host builds compile the scheduler core without it.

#[cfg(target_arch = "arm")]
pub mod cortex_m4;
