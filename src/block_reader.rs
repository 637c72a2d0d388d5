use std::cmp::max;
use std::io::{self, BufRead, ErrorKind, Seek};

/// Reads whole lines from a source in blocks of approximately `budget` bytes.
///
/// Every line returned ends with the terminator. A final line without one is terminated on
/// read, and [BlockReader::ends_with_endl] reports that the source did not end with a terminator.
pub(crate) struct BlockReader<R> {
    reader: R,
    endl: u8,
    lines: u64,
    bytes: u64,
    capacity: usize,
    ends_with_endl: bool,
}

impl<R: BufRead> BlockReader<R> {
    pub(crate) fn new(reader: R, endl: char) -> BlockReader<R> {
        BlockReader {
            reader,
            endl: endl as u8,
            lines: 0,
            bytes: 0,
            capacity: 1,
            ends_with_endl: true,
        }
    }

    /// Read lines until their cumulative size reaches `budget`. The budget is a soft bound: the
    /// line that crosses it is included and at least one line is read. An empty block is
    /// returned exactly when the source is exhausted.
    pub(crate) fn next_block(&mut self, budget: u64) -> io::Result<Vec<String>> {
        let mut block = Vec::with_capacity(self.capacity);
        let mut size = 0;
        while size < max(budget, 1) {
            match self.read_line()? {
                Some(line) => {
                    size += line.len() as u64;
                    block.push(line);
                }
                None => break,
            }
        }
        self.capacity = max(self.capacity, block.len());
        Ok(block)
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let bytes = self.reader.read_until(self.endl, &mut buf)?;
        if bytes == 0 {
            return Ok(None);
        }

        self.ends_with_endl = buf.last() == Some(&self.endl);
        if !self.ends_with_endl {
            buf.push(self.endl);
        }
        self.lines += 1;
        self.bytes += bytes as u64;
        String::from_utf8(buf)
            .map(Some)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
    }

    /// Number of lines read so far
    pub(crate) fn lines(&self) -> u64 {
        self.lines
    }

    /// Number of bytes read so far, not counting terminators added to a final line
    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Whether the last byte read was a terminator. True for an empty source.
    pub(crate) fn ends_with_endl(&self) -> bool {
        self.ends_with_endl
    }
}

impl<R: BufRead + Seek> BlockReader<R> {
    /// Restart reading from the beginning of the source, so a spill can be read more than once
    #[allow(dead_code)]
    pub(crate) fn rewind(&mut self) -> io::Result<()> {
        self.reader.rewind()?;
        self.lines = 0;
        self.bytes = 0;
        self.ends_with_endl = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind};

    use crate::block_reader::BlockReader;

    #[test]
    fn test_empty_source() -> Result<(), anyhow::Error> {
        let mut reader = BlockReader::new("".as_bytes(), '\n');
        assert!(reader.next_block(20_000)?.is_empty());
        assert!(reader.next_block(20_000)?.is_empty());
        assert!(reader.ends_with_endl());
        assert_eq!(reader.lines(), 0);
        Ok(())
    }

    #[test]
    fn test_budget_is_soft() -> Result<(), anyhow::Error> {
        let mut reader = BlockReader::new("1234\n1234\n1234\n1234\n".as_bytes(), '\n');
        // the second line crosses the budget of 6 bytes and is still included
        assert_eq!(reader.next_block(6)?, vec!["1234\n", "1234\n"]);
        assert_eq!(reader.next_block(6)?, vec!["1234\n", "1234\n"]);
        assert!(reader.next_block(6)?.is_empty());
        assert_eq!(reader.lines(), 4);
        assert_eq!(reader.bytes(), 20);
        Ok(())
    }

    #[test]
    fn test_zero_budget_reads_one_line() -> Result<(), anyhow::Error> {
        let mut reader = BlockReader::new("a\nb\n".as_bytes(), '\n');
        assert_eq!(reader.next_block(0)?, vec!["a\n"]);
        assert_eq!(reader.next_block(0)?, vec!["b\n"]);
        assert!(reader.next_block(0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_budget_greater_than_source() -> Result<(), anyhow::Error> {
        let mut reader = BlockReader::new("c\nb\na\n".as_bytes(), '\n');
        assert_eq!(reader.next_block(1_000_000)?, vec!["c\n", "b\n", "a\n"]);
        assert!(reader.next_block(1_000_000)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_unterminated_last_line() -> Result<(), anyhow::Error> {
        let mut reader = BlockReader::new("a\nb".as_bytes(), '\n');
        assert_eq!(reader.next_block(100)?, vec!["a\n", "b\n"]);
        assert!(!reader.ends_with_endl());
        assert_eq!(reader.bytes(), 3);
        Ok(())
    }

    #[test]
    fn test_custom_endl() -> Result<(), anyhow::Error> {
        let mut reader = BlockReader::new("b;a;".as_bytes(), ';');
        assert_eq!(reader.next_block(100)?, vec!["b;", "a;"]);
        assert!(reader.ends_with_endl());
        Ok(())
    }

    #[test]
    fn test_invalid_utf8() {
        let bytes: &[u8] = &[b'a', b'\n', 0xff, 0xfe, b'\n'];
        let mut reader = BlockReader::new(bytes, '\n');
        let error = reader.next_block(100).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_no_lines_lost() -> Result<(), anyhow::Error> {
        let content: String = (0..10_000).map(|i| format!("{i}\n")).collect();
        let mut reader = BlockReader::new(content.as_bytes(), '\n');
        let mut lines = 0;
        loop {
            let block = reader.next_block(1_000)?;
            if block.is_empty() {
                break;
            }
            lines += block.len();
        }
        assert_eq!(lines, 10_000);
        assert_eq!(reader.bytes(), content.len() as u64);
        Ok(())
    }

    #[test]
    fn test_rewind() -> Result<(), anyhow::Error> {
        let mut reader = BlockReader::new(Cursor::new("x\ny\n".as_bytes()), '\n');
        assert_eq!(reader.next_block(100)?, vec!["x\n", "y\n"]);
        reader.rewind()?;
        assert_eq!(reader.lines(), 0);
        assert_eq!(reader.next_block(1)?, vec!["x\n"]);
        Ok(())
    }
}
