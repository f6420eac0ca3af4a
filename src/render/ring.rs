//! Single-producer/single-consumer report ring.
//!
//! A fixed array of slots addressed by monotonically increasing sequence
//! numbers. The scan thread owns the [`RingProducer`] and the render thread
//! owns the [`RingConsumer`]; neither handle is `Clone`, so the one-writer /
//! one-reader discipline is enforced by ownership rather than by locks.
//!
//! Ordering contract:
//! - the producer writes every field of a slot, stamps the slot with its
//!   sequence number, and only then advances `write_seq` with `Release`;
//! - the consumer loads `write_seq` with `Acquire` before touching any slot,
//!   so a published slot is always observed fully written.
//!
//! The producer never blocks. When it runs more than `capacity` entries ahead
//! of the consumer, unread slots are overwritten in place. The consumer skips
//! straight to the oldest resident entry and counts what it missed, so at most
//! `capacity` reports are ever buffered and consumed sequence numbers remain
//! strictly increasing. Each slot carries its own stamp, re-checked after the
//! fields are read, which turns a slot overwritten mid-read into a counted
//! loss instead of a torn report.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering, fence};

use crate::render::report::{BlockReport, BlockStatus, QueueEntry};

/// Stamp of a slot that has never been published. Non-zero, so the first
/// slot cannot be mistaken for sequence number 0 before it is written.
pub const UNWRITTEN: u64 = u64::MAX;

/// Stamp of a slot the producer is currently filling.
const IN_PROGRESS: u64 = u64::MAX - 1;

struct Slot {
    stamp: AtomicU64,
    lba: AtomicU64,
    access_time_us: AtomicU64,
    status: AtomicU8,
}

impl Slot {
    fn new() -> Self {
        Self {
            stamp: AtomicU64::new(UNWRITTEN),
            lba: AtomicU64::new(0),
            access_time_us: AtomicU64::new(0),
            status: AtomicU8::new(BlockStatus::Ok.as_u8()),
        }
    }

    fn begin_write(&self) {
        self.stamp.store(IN_PROGRESS, Ordering::Relaxed);
        fence(Ordering::Release);
    }

    fn write(&self, report: &BlockReport) {
        self.lba.store(report.lba, Ordering::Relaxed);
        self.access_time_us
            .store(report.access_time_us, Ordering::Relaxed);
        self.status.store(report.status.as_u8(), Ordering::Relaxed);
    }

    fn finish_write(&self, seqno: u64) {
        self.stamp.store(seqno, Ordering::Release);
    }

    /// Read the slot expecting `seqno`; `None` if it was overwritten.
    fn read(&self, seqno: u64) -> Option<QueueEntry> {
        if self.stamp.load(Ordering::Acquire) != seqno {
            return None;
        }
        let report = BlockReport {
            lba: self.lba.load(Ordering::Relaxed),
            status: BlockStatus::from_u8(self.status.load(Ordering::Relaxed)),
            access_time_us: self.access_time_us.load(Ordering::Relaxed),
        };
        fence(Ordering::Acquire);
        if self.stamp.load(Ordering::Relaxed) != seqno {
            return None;
        }
        Some(QueueEntry { seqno, report })
    }
}

struct Shared {
    slots: Box<[Slot]>,
    write_seq: AtomicU64,
    read_seq: AtomicU64,
    overwritten: AtomicU64,
}

impl Shared {
    fn capacity(&self) -> u64 {
        self.slots.len() as u64
    }

    fn slot(&self, seqno: u64) -> &Slot {
        // Index is < len, so the narrowing cast cannot truncate.
        #[allow(clippy::cast_possible_truncation)]
        let index = (seqno % self.capacity()) as usize;
        &self.slots[index]
    }
}

/// Create a ring with `capacity` slots and split it into its two ends.
///
/// A zero capacity is bumped to one slot.
#[must_use]
pub fn report_ring(capacity: usize) -> (RingProducer, RingConsumer) {
    let slots: Box<[Slot]> = (0..capacity.max(1)).map(|_| Slot::new()).collect();
    let shared = Arc::new(Shared {
        slots,
        write_seq: AtomicU64::new(0),
        read_seq: AtomicU64::new(0),
        overwritten: AtomicU64::new(0),
    });
    (
        RingProducer {
            shared: Arc::clone(&shared),
            next: 0,
        },
        RingConsumer { shared, next: 0 },
    )
}

/// Writing end, owned by the scan thread.
pub struct RingProducer {
    shared: Arc<Shared>,
    next: u64,
}

impl RingProducer {
    /// Borrow the slot at `write_seq mod N` for filling.
    ///
    /// Nothing becomes visible to the consumer until [`WriteSlot::publish`].
    pub fn reserve_for_write(&mut self) -> WriteSlot<'_> {
        let seqno = self.next;
        self.shared.slot(seqno).begin_write();
        WriteSlot {
            producer: self,
            seqno,
        }
    }

    /// Reserve, fill and publish in one step.
    pub fn push(&mut self, report: BlockReport) {
        let mut slot = self.reserve_for_write();
        slot.write(&report);
        slot.publish();
    }
}

/// A reserved, not yet published slot.
pub struct WriteSlot<'a> {
    producer: &'a mut RingProducer,
    seqno: u64,
}

impl WriteSlot<'_> {
    /// Copy a report into the slot.
    pub fn write(&mut self, report: &BlockReport) {
        self.producer.shared.slot(self.seqno).write(report);
    }

    /// Make the slot visible to the consumer and advance `write_seq`.
    pub fn publish(self) {
        let Self { producer, seqno } = self;
        producer.shared.slot(seqno).finish_write(seqno);
        producer.shared.write_seq.store(seqno + 1, Ordering::Release);
        producer.next = seqno + 1;
    }
}

/// Reading end, owned by the render thread.
pub struct RingConsumer {
    shared: Arc<Shared>,
    next: u64,
}

impl RingConsumer {
    /// `write_seq - read_seq`. May exceed the capacity after an overrun; the
    /// excess is skipped on the next [`RingConsumer::consume`].
    #[must_use]
    pub fn pending_count(&self) -> u64 {
        self.shared
            .write_seq
            .load(Ordering::Acquire)
            .saturating_sub(self.next)
    }

    /// Take the oldest resident report and advance `read_seq`.
    pub fn consume(&mut self) -> Option<QueueEntry> {
        loop {
            let write = self.shared.write_seq.load(Ordering::Acquire);
            if self.next >= write {
                return None;
            }

            let oldest = write.saturating_sub(self.shared.capacity());
            if self.next < oldest {
                self.shared
                    .overwritten
                    .fetch_add(oldest - self.next, Ordering::Relaxed);
                self.set_next(oldest);
            }

            let seqno = self.next;
            let entry = self.shared.slot(seqno).read(seqno);
            self.set_next(seqno + 1);
            match entry {
                Some(entry) => return Some(entry),
                None => {
                    self.shared.overwritten.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Consume everything published at the time of the call.
    ///
    /// Reports published while draining are left for the next call, which
    /// bounds the work done per render tick.
    pub fn drain(&mut self, mut visit: impl FnMut(QueueEntry)) -> u64 {
        let target = self.shared.write_seq.load(Ordering::Acquire);
        let mut consumed = 0;
        while self.next < target {
            match self.consume() {
                Some(entry) => {
                    visit(entry);
                    consumed += 1;
                }
                None => break,
            }
        }
        consumed
    }

    /// Entries lost to producer overrun so far.
    #[must_use]
    pub fn overwritten(&self) -> u64 {
        self.shared.overwritten.load(Ordering::Relaxed)
    }

    /// Sequence number of the next entry to consume.
    #[must_use]
    pub fn read_seq(&self) -> u64 {
        self.next
    }

    fn set_next(&mut self, next: u64) {
        self.next = next;
        self.shared.read_seq.store(next, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    fn report(lba: u64) -> BlockReport {
        BlockReport::ok(lba, lba * 10)
    }

    #[test]
    fn empty_ring_has_nothing_pending() {
        let (_producer, mut consumer) = report_ring(4);
        assert_eq!(consumer.pending_count(), 0);
        assert!(consumer.consume().is_none());
    }

    #[test]
    fn slots_start_with_nonzero_sentinel() {
        let (producer, _consumer) = report_ring(3);
        for slot in producer.shared.slots.iter() {
            assert_eq!(slot.stamp.load(Ordering::Relaxed), UNWRITTEN);
        }
    }

    #[test]
    fn reserved_slot_is_invisible_until_published() {
        let (mut producer, mut consumer) = report_ring(4);
        {
            let mut slot = producer.reserve_for_write();
            slot.write(&report(7));
            assert_eq!(consumer.pending_count(), 0);
            slot.publish();
        }
        assert_eq!(consumer.pending_count(), 1);
        let entry = consumer.consume().expect("published entry");
        assert_eq!(entry.seqno, 0);
        assert_eq!(entry.report, report(7));
    }

    #[test]
    fn fifo_across_wraparound() {
        let (mut producer, mut consumer) = report_ring(3);
        let mut seen = Vec::new();
        for round in 0..5u64 {
            producer.push(report(round * 2));
            producer.push(report(round * 2 + 1));
            consumer.drain(|entry| seen.push(entry.seqno));
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(consumer.overwritten(), 0);
        assert_eq!(consumer.read_seq(), 10);
    }

    #[test]
    fn full_ring_is_still_lossless() {
        let (mut producer, mut consumer) = report_ring(4);
        for lba in 0..4 {
            producer.push(report(lba));
        }
        assert_eq!(consumer.pending_count(), 4);
        let mut lbas = Vec::new();
        consumer.drain(|entry| lbas.push(entry.report.lba));
        assert_eq!(lbas, vec![0, 1, 2, 3]);
        assert_eq!(consumer.overwritten(), 0);
    }

    #[test]
    fn overrun_skips_to_oldest_resident_entry() {
        let (mut producer, mut consumer) = report_ring(4);
        for lba in 0..10 {
            producer.push(report(lba));
        }
        assert_eq!(consumer.pending_count(), 10);

        let mut seqnos = Vec::new();
        let consumed = consumer.drain(|entry| {
            assert_eq!(entry.report.lba, entry.seqno);
            seqnos.push(entry.seqno);
        });
        assert_eq!(consumed, 4);
        assert_eq!(seqnos, vec![6, 7, 8, 9]);
        assert_eq!(consumer.overwritten(), 6);
        assert_eq!(consumer.pending_count(), 0);
    }

    #[test]
    fn drain_stops_at_snapshot() {
        let (mut producer, mut consumer) = report_ring(8);
        producer.push(report(1));
        producer.push(report(2));
        let mut count = 0;
        consumer.drain(|_| count += 1);
        assert_eq!(count, 2);
        producer.push(report(3));
        assert_eq!(consumer.pending_count(), 1);
    }

    #[test]
    fn cross_thread_fifo_without_overrun() {
        const TOTAL: u64 = 200_000;
        let (mut producer, mut consumer) = report_ring(TOTAL as usize);

        let writer = thread::spawn(move || {
            for lba in 0..TOTAL {
                producer.push(report(lba));
            }
        });

        let mut expected = 0;
        while expected < TOTAL {
            consumer.drain(|entry| {
                assert_eq!(entry.seqno, expected, "gap or duplicate");
                assert_eq!(entry.report, report(expected), "torn slot");
                expected += 1;
            });
            thread::yield_now();
        }
        writer.join().expect("writer thread");
        assert_eq!(consumer.overwritten(), 0);
    }

    #[test]
    fn cross_thread_overrun_keeps_seqnos_increasing() {
        const TOTAL: u64 = 100_000;
        let (mut producer, mut consumer) = report_ring(64);

        let writer = thread::spawn(move || {
            for lba in 0..TOTAL {
                producer.push(report(lba));
            }
        });

        let mut last: Option<u64> = None;
        let mut consumed = 0u64;
        loop {
            let finished = writer.is_finished();
            consumer.drain(|entry| {
                if let Some(prev) = last {
                    assert!(entry.seqno > prev, "seqno went backwards");
                }
                assert_eq!(entry.report, report(entry.seqno), "torn slot");
                last = Some(entry.seqno);
                consumed += 1;
            });
            if finished && consumer.pending_count() == 0 {
                break;
            }
        }
        writer.join().expect("writer thread");
        assert_eq!(consumed + consumer.overwritten(), TOTAL);
        assert_eq!(last, Some(TOTAL - 1));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Interleaved bursts that never exceed the capacity come out in
        /// enqueue order with no gaps and no duplicates.
        #[test]
        fn bounded_bursts_are_fifo(
            capacity in 1usize..64,
            bursts in prop::collection::vec(0usize..64, 1..40),
        ) {
            let (mut producer, mut consumer) = report_ring(capacity);
            let mut next_lba = 0u64;
            let mut expected = 0u64;
            for burst in bursts {
                for _ in 0..burst.min(capacity) {
                    producer.push(report(next_lba));
                    next_lba += 1;
                }
                prop_assert!(consumer.pending_count() <= capacity as u64);
                consumer.drain(|entry| {
                    assert_eq!(entry.seqno, expected);
                    assert_eq!(entry.report.lba, expected);
                    expected += 1;
                });
            }
            prop_assert_eq!(expected, next_lba);
            prop_assert_eq!(consumer.overwritten(), 0);
        }

        /// Whatever the overrun, consumed + overwritten accounts for every
        /// published entry and only the newest `capacity` survive.
        #[test]
        fn overrun_accounting_is_exact(
            capacity in 1usize..32,
            total in 0u64..200,
        ) {
            let (mut producer, mut consumer) = report_ring(capacity);
            for lba in 0..total {
                producer.push(report(lba));
            }
            let mut seqnos = Vec::new();
            consumer.drain(|entry| seqnos.push(entry.seqno));
            let kept = total.min(capacity as u64);
            prop_assert_eq!(seqnos.len() as u64, kept);
            prop_assert_eq!(consumer.overwritten(), total - kept);
            let first = total - kept;
            prop_assert_eq!(seqnos, (first..total).collect::<Vec<_>>());
        }
    }
}
