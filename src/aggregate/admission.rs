use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use sysinfo::System;

/// Source of the currently available memory, in bytes.
pub trait MemoryProbe: Send + Sync {
    fn available_bytes(&self) -> u64;
}

/// Reads available memory from the operating system.
pub struct SystemMemory {
    system: Mutex<System>,
}

impl SystemMemory {
    pub fn new() -> Self { Self { system: Mutex::new(System::new()) } }
}

impl Default for SystemMemory {
    fn default() -> Self { Self::new() }
}

impl MemoryProbe for SystemMemory {
    fn available_bytes(&self) -> u64 {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_memory();
        system.available_memory()
    }
}

/// Reports a constant amount of memory and counts how often it was asked.
#[derive(Debug, Default)]
pub struct FixedMemory {
    bytes: u64,
    polls: AtomicUsize,
}

impl FixedMemory {
    pub fn new(bytes: u64) -> Self { Self { bytes, polls: AtomicUsize::new(0) } }

    /// Effectively unlimited memory.
    pub fn unlimited() -> Self { Self::new(u64::MAX) }

    #[inline] pub fn polls(&self) -> usize { self.polls.load(Ordering::Relaxed) }
}

impl MemoryProbe for FixedMemory {
    fn available_bytes(&self) -> u64 {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.bytes
    }
}

/// Gates block submission on available memory and an in-flight cap.
///
/// A request is always admitted when nothing is in flight, so a ceiling below
/// one block's footprint serializes the work instead of stalling it.
pub struct AdmissionController {
    probe: Arc<dyn MemoryProbe>,
    required_bytes: u64,
    max_in_flight: usize,
    poll_min: Duration,
    poll_max: Duration,
    in_flight: Mutex<usize>,
    released: Condvar,
    waits: AtomicUsize,
}

impl AdmissionController {
    pub fn new(probe: Arc<dyn MemoryProbe>, required_bytes: u64, max_in_flight: usize, poll_min: Duration, poll_max: Duration) -> Self {
        Self {
            probe,
            required_bytes,
            max_in_flight: max_in_flight.max(1),
            poll_min,
            poll_max: poll_max.max(poll_min),
            in_flight: Mutex::new(0),
            released: Condvar::new(),
            waits: AtomicUsize::new(0),
        }
    }

    #[inline] pub fn required_bytes(&self) -> u64 { self.required_bytes }

    /// Number of times a request had to wait before admission.
    #[inline] pub fn waits(&self) -> usize { self.waits.load(Ordering::Relaxed) }

    /// Block until a new unit of work may start. The returned permit releases its
    /// slot on drop.
    pub fn admit(&self) -> Permit<'_> {
        let mut backoff = self.poll_min;
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *in_flight == 0
                || (*in_flight < self.max_in_flight && self.probe.available_bytes() >= self.required_bytes)
            {
                *in_flight += 1;
                return Permit { controller: self }
            }
            self.waits.fetch_add(1, Ordering::Relaxed);
            log::trace!("admission waiting: {} in flight, backoff {:?}", *in_flight, backoff);
            in_flight = self.released.wait_timeout(in_flight, backoff)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
            backoff = (backoff * 2).min(self.poll_max);
        }
    }

    fn release(&self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *in_flight = in_flight.saturating_sub(1);
        self.released.notify_all();
    }
}

/// One admitted unit of work.
pub struct Permit<'a> {
    controller: &'a AdmissionController,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) { self.controller.release() }
}
