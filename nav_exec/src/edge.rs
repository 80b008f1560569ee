//! # Edge triggered inputs
//!
//! Counters and flags written from interrupt context (or a GPIO event thread on the host) and read
//! by the control loop. Handlers only touch atomics: no locks, no I/O, no actuation.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Signed tick count of the drive encoder.
#[derive(Debug, Default)]
pub struct EncoderCounter {
    ticks: AtomicI64,
}

/// Debounced start button.
#[derive(Debug)]
pub struct StartLatch {
    pressed: AtomicBool,

    /// Bits of the `f64` time of the last accepted press, NaN if none yet.
    last_press_bits: AtomicU64,

    debounce_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl EncoderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle an edge on channel A, `a_high` being the level of channel A after the edge.
    pub fn on_edge(&self, a_high: bool) {
        let step = if a_high { 1 } else { -1 };
        self.ticks.fetch_add(step, Ordering::Relaxed);
    }

    /// Take the ticks counted since the last drain.
    pub fn drain(&self) -> i64 {
        self.ticks.swap(0, Ordering::AcqRel)
    }
}

impl StartLatch {
    pub fn new(debounce_s: f64) -> Self {
        Self {
            pressed: AtomicBool::new(false),
            last_press_bits: AtomicU64::new(f64::NAN.to_bits()),
            debounce_s,
        }
    }

    /// Handle a press edge at time `now_s`. Presses within the debounce time of the last accepted
    /// press are ignored.
    pub fn on_press(&self, now_s: f64) {
        let last = f64::from_bits(self.last_press_bits.load(Ordering::Acquire));

        if last.is_nan() || now_s - last >= self.debounce_s {
            self.last_press_bits.store(now_s.to_bits(), Ordering::Release);
            self.pressed.store(true, Ordering::Release);
        }
    }

    /// Consume a pending press.
    pub fn take(&self) -> bool {
        self.pressed.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_encoder_drain() {
        let enc = EncoderCounter::new();
        for _ in 0..10 {
            enc.on_edge(true);
        }
        enc.on_edge(false);
        assert_eq!(enc.drain(), 9);
        assert_eq!(enc.drain(), 0);
    }

    #[test]
    fn test_encoder_concurrent_edges() {
        let enc = Arc::new(EncoderCounter::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let e = enc.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        e.on_edge(true);
                    }
                })
            })
            .collect();

        let mut total = 0;
        for h in handles {
            total += enc.drain();
            h.join().unwrap();
        }
        total += enc.drain();

        assert_eq!(total, 40_000);
    }

    #[test]
    fn test_start_debounce() {
        let latch = StartLatch::new(0.05);
        assert!(!latch.take());

        latch.on_press(1.0);
        latch.on_press(1.01);
        assert!(latch.take());
        assert!(!latch.take());

        // Bounce after the take is still rejected
        latch.on_press(1.03);
        assert!(!latch.take());

        latch.on_press(1.2);
        assert!(latch.take());
    }
}
