use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind};

use crate::block_reader::BlockReader;
use crate::error::{Phase, SortError};
use crate::key::LineKey;
use crate::line_record::LineRecord;
use crate::spill_file::SpillFile;

enum State {
    Pending(SpillFile),
    Open {
        reader: BlockReader<BufReader<File>>,
        spill: SpillFile,
    },
    Closed,
}

/// A forward only reader over one spill file.
///
/// The spill is opened on first use and read in blocks of `block_size_bytes`. Keys are derived
/// again from the stored lines with the key function. When the spill is exhausted the cursor
/// closes itself, which closes the file handle and deletes the spill file.
pub(crate) struct SpillCursor<'a, F: LineKey> {
    source: usize,
    state: State,
    buffer: VecDeque<LineRecord<F::Key>>,
    block_size_bytes: u64,
    key_fn: &'a F,
    endl: char,
    position: u64,
}

impl<'a, F: LineKey> SpillCursor<'a, F> {
    pub(crate) fn new(
        spill: SpillFile,
        source: usize,
        block_size_bytes: u64,
        key_fn: &'a F,
        endl: char,
    ) -> SpillCursor<'a, F> {
        SpillCursor {
            source,
            state: State::Pending(spill),
            buffer: VecDeque::new(),
            block_size_bytes,
            key_fn,
            endl,
            position: 0,
        }
    }

    /// Index of the spill this cursor reads, in the order spills were written
    pub(crate) fn source(&self) -> usize {
        self.source
    }

    /// Number of records currently held in memory
    pub(crate) fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Next record of the spill, or None when the spill is exhausted and has been deleted.
    pub(crate) fn next_record(&mut self) -> Result<Option<LineRecord<F::Key>>, SortError> {
        if self.buffer.is_empty() && !self.is_closed() {
            self.fill()?;
            if self.buffer.is_empty() {
                self.close()?;
            }
        }
        Ok(self.buffer.pop_front())
    }

    fn fill(&mut self) -> Result<(), SortError> {
        self.open()?;
        let lines = match &mut self.state {
            State::Open { reader, spill } => reader
                .next_block(self.block_size_bytes)
                .map_err(|e| SortError::storage(Phase::Merging, spill.path(), e))?,
            _ => return Ok(()),
        };

        for line in lines {
            self.position += 1;
            let position = self.position;
            let record = LineRecord::new(line, self.key_fn, self.endl)
                .map_err(|source| SortError::KeyExtraction {
                    phase: Phase::Merging,
                    line: position,
                    source,
                })?;
            self.buffer.push_back(record);
        }
        Ok(())
    }

    fn open(&mut self) -> Result<(), SortError> {
        if let State::Pending(_) = self.state {
            if let State::Pending(spill) = std::mem::replace(&mut self.state, State::Closed) {
                match File::open(spill.path()) {
                    Ok(file) => {
                        let reader = BlockReader::new(BufReader::new(file), self.endl);
                        self.state = State::Open { reader, spill };
                    }
                    Err(e) => {
                        let error = SortError::storage(Phase::Merging, spill.path(), e);
                        if let Err(delete_error) = spill.delete() {
                            log::warn!("Failed to remove spill file: {}", delete_error);
                        }
                        return Err(error);
                    }
                }
            }
        }
        Ok(())
    }

    /// Restart the cursor from the first record of the spill. Fails once the spill has been
    /// deleted. The single pass merge never restarts a cursor.
    #[allow(dead_code)]
    pub(crate) fn rewind(&mut self) -> Result<(), SortError> {
        match &mut self.state {
            State::Pending(_) => Ok(()),
            State::Open { reader, spill } => {
                reader
                    .rewind()
                    .map_err(|e| SortError::storage(Phase::Merging, spill.path(), e))?;
                self.buffer.clear();
                self.position = 0;
                Ok(())
            }
            State::Closed => Err(SortError::Storage {
                phase: Phase::Merging,
                path: Default::default(),
                source: io::Error::new(
                    ErrorKind::NotFound,
                    format!("spill {} already deleted", self.source),
                ),
            }),
        }
    }

    /// Release buffered records, close the file handle and delete the spill file. Closing a
    /// closed cursor does nothing.
    pub(crate) fn close(&mut self) -> Result<(), SortError> {
        self.buffer.clear();
        let spill = match std::mem::replace(&mut self.state, State::Closed) {
            State::Pending(spill) => spill,
            State::Open { reader, spill } => {
                drop(reader);
                spill
            }
            State::Closed => return Ok(()),
        };
        let path = spill.path().to_path_buf();
        log::debug!("Delete spill file {}, records: {}", path.display(), spill.records());
        spill
            .delete()
            .map_err(|e| SortError::storage(Phase::Merging, &path, e))
    }
}
