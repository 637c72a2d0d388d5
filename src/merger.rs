use std::cmp::{max, Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::SortError;
use crate::key::LineKey;
use crate::spill_cursor::SpillCursor;

/// The current head of one spill cursor.
///
/// Ordered by key, then by the index of the spill it came from, so that the order of heads with
/// equal keys does not depend on the heap implementation. The line does not take part in the
/// comparison.
struct HeapEntry<K> {
    key: K,
    source: usize,
    line: String,
}

impl<K: Ord> PartialEq for HeapEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl<K: Ord> Eq for HeapEntry<K> {}

impl<K: Ord> PartialOrd for HeapEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord> Ord for HeapEntry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.source.cmp(&other.source))
    }
}

/// K-way merge of spill cursors.
///
/// Holds at most one head per live cursor. A head is replaced only by popping it and advancing
/// its cursor. A cursor that runs out deletes its spill file and is retired.
pub(crate) struct Merger<'a, F: LineKey> {
    cursors: Vec<SpillCursor<'a, F>>,
    heap: BinaryHeap<Reverse<HeapEntry<F::Key>>>,
    seeded: bool,
    resident: usize,
    peak_resident: usize,
    merged: u64,
}

impl<'a, F: LineKey> Merger<'a, F> {
    pub(crate) fn new(cursors: Vec<SpillCursor<'a, F>>) -> Merger<'a, F> {
        let heap = BinaryHeap::with_capacity(cursors.len());
        Merger {
            cursors,
            heap,
            seeded: false,
            resident: 0,
            peak_resident: 0,
            merged: 0,
        }
    }

    /// The next line in merged order, or None when every cursor is exhausted.
    pub(crate) fn next_line(&mut self) -> Result<Option<String>, SortError> {
        if !self.seeded {
            self.seeded = true;
            for source in 0..self.cursors.len() {
                self.advance(source)?;
            }
        }

        match self.heap.pop() {
            None => Ok(None),
            Some(Reverse(head)) => {
                self.advance(head.source)?;
                self.merged += 1;
                Ok(Some(head.line))
            }
        }
    }

    fn advance(&mut self, source: usize) -> Result<(), SortError> {
        let cursor = &mut self.cursors[source];
        let before = cursor.buffered();
        let next = cursor.next_record()?;
        self.resident = self.resident + cursor.buffered() - before;

        if let Some(record) = next {
            let (key, line) = record.into_parts();
            self.heap.push(Reverse(HeapEntry { key, source, line }));
        }
        self.peak_resident = max(self.peak_resident, self.resident + self.heap.len());
        Ok(())
    }

    /// Close every cursor that is still open, deleting its spill file. All cursors are closed
    /// even if some fail; the first failure is returned.
    pub(crate) fn close(&mut self) -> Result<(), SortError> {
        self.heap.clear();
        self.resident = 0;
        let mut result = Ok(());
        for cursor in self.cursors.iter_mut() {
            if let Err(e) = cursor.close() {
                log::warn!("Failed to close spill {}: {}", cursor.source(), e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Number of lines produced so far
    pub(crate) fn merged(&self) -> u64 {
        self.merged
    }

    /// Largest number of records held in memory at once, counting cursor buffers and heads
    pub(crate) fn peak_resident(&self) -> usize {
        self.peak_resident
    }
}

impl<'a, F: LineKey> Iterator for Merger<'a, F> {
    type Item = Result<String, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
