/// Millisecond time source injected into the non-blocking handlers.
///
/// The stack never owns a timer: conversion and EEPROM write-cycle deadlines
/// are checked against `now_ms()` whenever a handler is polled. Blocking
/// convenience calls spin on the same clock and invoke [`Clock::yield_now`]
/// on every iteration, which is the place for a host to refresh its watchdog
/// or yield to a scheduler.
pub trait Clock {
    /// Monotonic milliseconds; wrapping is handled by the callers.
    fn now_ms(&mut self) -> u32;

    /// Called on every iteration of an internal busy-wait.
    fn yield_now(&mut self) {}
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now_ms(&mut self) -> u32 {
        (**self).now_ms()
    }

    fn yield_now(&mut self) {
        (**self).yield_now()
    }
}

/// Elapsed milliseconds between a recorded start and `now`, wrap-safe.
pub(crate) fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}
