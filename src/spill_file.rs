use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tempfile::{Builder, NamedTempFile, TempPath};

use crate::config::Config;
use crate::error::{Phase, SortError};
use crate::sorted_block::SortedBlock;

pub(crate) fn create_tmp_file(config: &Config) -> io::Result<NamedTempFile> {
    Builder::new()
        .prefix(config.tmp_prefix())
        .suffix(config.tmp_suffix())
        .tempfile_in(config.tmp())
}

/// A sorted block persisted to a temporary file.
///
/// The file handle is closed once the block is written; the file itself lives until
/// [SpillFile::delete] is called. Dropping a SpillFile also removes the file, but the sort
/// always deletes spills explicitly.
#[derive(Debug)]
pub(crate) struct SpillFile {
    path: TempPath,
    records: usize,
    bytes: u64,
}

impl SpillFile {
    pub(crate) fn write<K>(block: SortedBlock<K>, config: &Config) -> Result<SpillFile, SortError> {
        let mut tmp_file = create_tmp_file(config)
            .map_err(|e| SortError::storage(Phase::Spilling, config.tmp(), e))?;

        match Self::write_block(tmp_file.as_file_mut(), &block) {
            Ok(()) => {
                log::debug!(
                    "Spilled {} lines, {} bytes to {}",
                    block.len(),
                    block.bytes(),
                    tmp_file.path().display()
                );
                Ok(SpillFile {
                    path: tmp_file.into_temp_path(),
                    records: block.len(),
                    bytes: block.bytes(),
                })
            }
            Err(e) => {
                let path = tmp_file.path().to_path_buf();
                if let Err(close_error) = tmp_file.close() {
                    log::warn!("Failed to remove spill file {}: {}", path.display(), close_error);
                }
                Err(SortError::storage(Phase::Spilling, &path, e))
            }
        }
    }

    fn write_block<K>(file: &mut File, block: &SortedBlock<K>) -> io::Result<()> {
        let mut buf_writer = BufWriter::new(file);
        for line_record in block.records() {
            buf_writer.write_all(line_record.line().as_bytes())?;
        }
        buf_writer.flush()
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn records(&self) -> usize {
        self.records
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn delete(self) -> io::Result<()> {
        self.path.close()
    }
}
