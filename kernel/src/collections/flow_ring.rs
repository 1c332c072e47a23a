// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Flow-controlled byte ring shared by one producer task and one interrupt
//! handler.
//!
//! The producer calls [`FlowRing::put`] from task context. While the ring is
//! full it suspends on the ring's "room available" flag; once there is room
//! it updates the write cursor and the free-slot counter inside
//! [`Rtos::atomic`]. The consumer calls [`FlowRing::drain_one`] from the
//! interrupt handler, which cannot be preempted by the producer and so takes
//! no lock at all.
//!
//! `read == write` holds both when the ring is empty and when it is full;
//! the free-slot counter tells the two apart (`N` free means empty, `0` free
//! means full).
//!
//! Memory ordering: the producer stores the byte and the write cursor before
//! its `AcqRel` decrement of `free`; the consumer acquires `free` before it
//! looks at the cursors or storage, and releases the slot with its increment
//! of `free`. On the single-core target the interrupt mask already orders the
//! two sides; the atomics make the same code correct when the consumer runs
//! on another thread, as it does under emulation.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::platform::rtos::{FlagId, Rtos, Timeout};
use crate::ErrorCode;

pub struct FlowRing<const N: usize> {
    ring: UnsafeCell<[u8; N]>,
    read: AtomicUsize,
    write: AtomicUsize,
    free: AtomicUsize,
    room: FlagId,
}

// Safety: a slot is written only by the producer while `free` counts it as
// free, and read only by the consumer while `free` counts it as used. The
// two sides never touch the same slot at the same time.
unsafe impl<const N: usize> Sync for FlowRing<N> {}

impl<const N: usize> FlowRing<N> {
    const NOT_EMPTY: () = assert!(N > 0, "a flow ring needs at least one slot");

    /// Create an empty ring that signals `room` each time a slot frees up.
    ///
    /// `room` should be an auto-reset flag that starts clear.
    ///
    /// A ring without slots is rejected at compile time:
    ///
    /// ```compile_fail
    /// use kernel::collections::flow_ring::FlowRing;
    /// use kernel::platform::rtos::FlagId;
    ///
    /// let ring: FlowRing<0> = FlowRing::new(FlagId::new(0));
    /// ```
    pub const fn new(room: FlagId) -> FlowRing<N> {
        #[allow(clippy::let_unit_value)]
        let () = Self::NOT_EMPTY;
        FlowRing {
            ring: UnsafeCell::new([0; N]),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
            free: AtomicUsize::new(N),
            room,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn free_slots(&self) -> usize {
        self.free.load(Ordering::Acquire)
    }

    /// Number of bytes waiting to be drained.
    pub fn len(&self) -> usize {
        N - self.free_slots()
    }

    pub fn is_empty(&self) -> bool {
        self.free_slots() == N
    }

    pub fn is_full(&self) -> bool {
        self.free_slots() == 0
    }

    pub fn room_flag(&self) -> FlagId {
        self.room
    }

    /// Enqueue `value`, suspending the calling task while the ring is full.
    ///
    /// Task context only. `timeout` bounds each wait for room: a wake that
    /// finds the ring still full (another producer got there first, or the
    /// flag was left over from an earlier drain) starts a new wait.
    pub fn put<R: Rtos + ?Sized>(
        &self,
        rtos: &R,
        value: u8,
        timeout: Timeout,
    ) -> Result<(), ErrorCode> {
        loop {
            if rtos.atomic(|| self.try_push(value)) {
                return Ok(());
            }
            rtos.wait_flag(self.room, timeout)?;
        }
    }

    /// Dequeue the oldest byte, or `None` when the ring is empty.
    ///
    /// Interrupt context only. Never blocks; signals the room flag for every
    /// byte it removes and leaves the cursors alone when there is nothing to
    /// remove.
    pub fn drain_one<R: Rtos + ?Sized>(&self, rtos: &R) -> Option<u8> {
        let free = self.free.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Relaxed);
        if self.write.load(Ordering::Relaxed) == read && free != 0 {
            return None;
        }

        // Safety: `read < N`, and `free < N` proves the slot holds a byte the
        // producer has finished writing.
        let value = unsafe { self.ring.get().cast::<u8>().add(read).read() };
        self.read.store(Self::advance(read), Ordering::Relaxed);
        self.free.fetch_add(1, Ordering::Release);

        rtos.set_flag_from_isr(self.room);
        Some(value)
    }

    /// Must run with interrupts masked.
    fn try_push(&self, value: u8) -> bool {
        if self.free.load(Ordering::Acquire) == 0 {
            return false;
        }

        let write = self.write.load(Ordering::Relaxed);
        // Safety: `write < N`, and `free > 0` proves the consumer is done
        // with the slot.
        unsafe { self.ring.get().cast::<u8>().add(write).write(value) };
        self.write.store(Self::advance(write), Ordering::Relaxed);
        self.free.fetch_sub(1, Ordering::AcqRel);
        true
    }

    fn advance(cursor: usize) -> usize {
        if cursor + 1 == N {
            0
        } else {
            cursor + 1
        }
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::vec::Vec;

    use super::FlowRing;
    use crate::emulation::EmulatedRtos;
    use crate::platform::rtos::{Rtos, Timeout};
    use crate::ErrorCode;

    fn ring<const N: usize>(rtos: &EmulatedRtos) -> FlowRing<N> {
        let room = rtos.create_flag(true, false).unwrap();
        FlowRing::new(room)
    }

    // Enqueue then dequeue one byte `count` times so the cursors no longer
    // sit at index zero.
    fn move_cursors<const N: usize>(rtos: &EmulatedRtos, buf: &FlowRing<N>, count: usize) {
        for _ in 0..count {
            buf.put(rtos, 0xee, Timeout::Forever).unwrap();
            assert_eq!(buf.drain_one(rtos), Some(0xee));
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn drains_in_submission_order() {
        let rtos = EmulatedRtos::new();
        let buf = ring::<8>(&rtos);

        for b in b"hello" {
            buf.put(&rtos, *b, Timeout::Forever).unwrap();
        }
        assert_eq!(buf.len(), 5);

        let drained: Vec<u8> = core::iter::from_fn(|| buf.drain_one(&rtos)).collect();
        assert_eq!(drained, b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn fill_then_drain_restores_empty() {
        const LEN: usize = 5;
        let rtos = EmulatedRtos::new();
        let buf = ring::<LEN>(&rtos);
        move_cursors(&rtos, &buf, 3);

        for i in 0..LEN {
            assert!(!buf.is_full());
            buf.put(&rtos, i as u8, Timeout::Forever).unwrap();
            assert_eq!(buf.free_slots(), LEN - i - 1);
        }
        assert!(buf.is_full());

        for i in 0..LEN {
            assert_eq!(buf.drain_one(&rtos), Some(i as u8));
            assert!(buf.free_slots() <= buf.capacity());
        }
        assert_eq!(buf.free_slots(), LEN);
        assert_eq!(buf.drain_one(&rtos), None);
    }

    #[test]
    fn full_ring_is_not_mistaken_for_empty() {
        let rtos = EmulatedRtos::new();
        let buf = ring::<3>(&rtos);
        for b in [7, 8, 9] {
            buf.put(&rtos, b, Timeout::Forever).unwrap();
        }

        // Both cursors are back at zero; only the counter says "full".
        assert!(buf.is_full());
        assert_eq!(buf.drain_one(&rtos), Some(7));
    }

    #[test]
    fn drain_on_empty_changes_nothing() {
        let rtos = EmulatedRtos::new();
        let buf = ring::<4>(&rtos);
        move_cursors(&rtos, &buf, 2);
        rtos.clear_flag(buf.room_flag());

        assert_eq!(buf.drain_one(&rtos), None);
        assert_eq!(buf.drain_one(&rtos), None);
        assert_eq!(buf.free_slots(), 4);
        assert!(!rtos.is_flag_set(buf.room_flag()));

        buf.put(&rtos, 0x5a, Timeout::Forever).unwrap();
        assert_eq!(buf.drain_one(&rtos), Some(0x5a));
    }

    #[test]
    fn drain_signals_room() {
        let rtos = EmulatedRtos::new();
        let buf = ring::<2>(&rtos);
        buf.put(&rtos, 1, Timeout::Forever).unwrap();
        assert!(!rtos.is_flag_set(buf.room_flag()));

        assert_eq!(buf.drain_one(&rtos), Some(1));
        assert!(rtos.is_flag_set(buf.room_flag()));
    }

    #[test]
    fn put_on_full_ring_times_out() {
        let rtos = EmulatedRtos::new();
        let buf = ring::<1>(&rtos);
        buf.put(&rtos, 1, Timeout::Forever).unwrap();

        assert_eq!(buf.put(&rtos, 2, Timeout::Ticks(5)), Err(ErrorCode::TIMEOUT));
        assert_eq!(buf.free_slots(), 0);
        assert_eq!(buf.drain_one(&rtos), Some(1));
        assert_eq!(buf.drain_one(&rtos), None);
    }

    #[test]
    fn stale_room_signal_does_not_overfill() {
        let rtos = EmulatedRtos::new();
        let buf = ring::<1>(&rtos);
        buf.put(&rtos, 1, Timeout::Forever).unwrap();

        // A leftover signal wakes the producer, which must find the ring
        // still full and go back to waiting.
        rtos.set_flag_from_isr(buf.room_flag());
        assert_eq!(buf.put(&rtos, 2, Timeout::Ticks(5)), Err(ErrorCode::TIMEOUT));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn aborted_wait_is_reported() {
        let rtos = EmulatedRtos::new();
        let buf = ring::<1>(&rtos);
        buf.put(&rtos, 1, Timeout::Forever).unwrap();

        thread::scope(|s| {
            let producer = s.spawn(|| buf.put(&rtos, 2, Timeout::Forever));
            rtos.wait_for_waiters(buf.room_flag(), 1);
            rtos.abort_waits(buf.room_flag());
            assert_eq!(producer.join().unwrap(), Err(ErrorCode::CANCEL));
        });
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn blocked_put_resumes_after_drain() {
        let rtos = EmulatedRtos::new();
        let buf = ring::<4>(&rtos);
        for b in [0x41, 0x42, 0x43, 0x44] {
            buf.put(&rtos, b, Timeout::Forever).unwrap();
        }
        assert_eq!(buf.free_slots(), 0);

        thread::scope(|s| {
            let producer = s.spawn(|| buf.put(&rtos, 0x45, Timeout::Forever));
            rtos.wait_for_waiters(buf.room_flag(), 1);
            assert!(!producer.is_finished());
            assert_eq!(buf.len(), 4);

            assert_eq!(rtos.interrupt(|| buf.drain_one(&rtos)), Some(0x41));
            assert_eq!(producer.join().unwrap(), Ok(()));
        });

        let rest: Vec<u8> = core::iter::from_fn(|| buf.drain_one(&rtos)).collect();
        assert_eq!(rest, [0x42_u8, 0x43, 0x44, 0x45]);
    }

    #[test]
    fn concurrent_drain_preserves_order_and_bounds() {
        const COUNT: usize = 2000;
        let rtos = EmulatedRtos::new();
        let buf = ring::<8>(&rtos);

        let received = thread::scope(|s| {
            s.spawn(|| {
                for i in 0..COUNT {
                    buf.put(&rtos, (i % 251) as u8, Timeout::Forever).unwrap();
                }
            });

            let mut received = Vec::with_capacity(COUNT);
            while received.len() < COUNT {
                if let Some(b) = rtos.interrupt(|| buf.drain_one(&rtos)) {
                    received.push(b);
                } else {
                    thread::yield_now();
                }
                assert!(buf.free_slots() <= buf.capacity());
            }
            received
        });

        let expected: Vec<u8> = (0..COUNT).map(|i| (i % 251) as u8).collect();
        assert_eq!(received, expected);
        assert!(buf.is_empty());
    }
}
