use crate::error::{Phase, SortError};
use crate::key::LineKey;
use crate::line_record::LineRecord;

/// An in-memory block of records ordered by key. Records with equal keys keep their input order.
#[derive(Debug)]
pub(crate) struct SortedBlock<K> {
    records: Vec<LineRecord<K>>,
    bytes: u64,
}

impl<K: Ord> SortedBlock<K> {
    /// Derive a key for every line and sort the block.
    ///
    /// `first_line` is the 1-based input line number of `lines[0]`, used to report key
    /// extraction failures. A failure on any line discards the whole block.
    pub(crate) fn sort<F>(
        lines: Vec<String>,
        key_fn: &F,
        endl: char,
        first_line: u64,
    ) -> Result<SortedBlock<K>, SortError>
    where
        F: LineKey<Key = K>,
    {
        let mut records = Vec::with_capacity(lines.len());
        let mut bytes = 0;
        for (i, line) in lines.into_iter().enumerate() {
            bytes += line.len() as u64;
            let record = LineRecord::new(line, key_fn, endl)
                .map_err(|source| SortError::KeyExtraction {
                    phase: Phase::Spilling,
                    line: first_line + i as u64,
                    source,
                })?;
            records.push(record);
        }
        // stable
        records.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(SortedBlock { records, bytes })
    }
}

impl<K> SortedBlock<K> {
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn records(&self) -> &[LineRecord<K>] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{Phase, SortError};
    use crate::sorted_block::SortedBlock;

    fn first_field(line: &str) -> Result<u32, anyhow::Error> {
        let field = line.split('\t').next().unwrap_or_default();
        Ok(field.parse::<u32>()?)
    }

    #[test]
    fn test_sort_is_stable() -> Result<(), anyhow::Error> {
        let lines: Vec<String> = vec!["2\ta\n", "1\tb\n", "2\tc\n", "1\td\n", "0\te\n", "2\tf\n"]
            .into_iter()
            .map(String::from)
            .collect();
        let block = SortedBlock::sort(lines, &first_field, '\n', 1)?;
        let sorted: Vec<&str> = block.records().iter().map(|r| r.line()).collect();
        assert_eq!(sorted, vec!["0\te\n", "1\tb\n", "1\td\n", "2\ta\n", "2\tc\n", "2\tf\n"]);
        assert_eq!(block.len(), 6);
        assert_eq!(block.bytes(), 24);
        Ok(())
    }

    #[test]
    fn test_key_error_reports_line() {
        let lines: Vec<String> = vec!["3\n", "2\n", "x\n", "1\n"]
            .into_iter()
            .map(String::from)
            .collect();
        let result = SortedBlock::sort(lines, &first_field, '\n', 101);
        match result {
            Err(SortError::KeyExtraction { phase, line, .. }) => {
                assert_eq!(phase, Phase::Spilling);
                assert_eq!(line, 103);
            }
            other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
        }
    }
}
