use std::fs::{self, File, Permissions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

use crate::block_reader::BlockReader;
use crate::config::Config;
use crate::error::{Phase, SortError};
use crate::key::LineKey;
use crate::line_record::LineRecord;
use crate::merger::Merger;
use crate::nofile_limit::NoFileLimit;
use crate::sorted_block::SortedBlock;
use crate::spill_cursor::SpillCursor;
use crate::spill_file::SpillFile;

/// Default memory budget, per phase, of 200 MiB
pub const DEFAULT_BLOCK_SIZE_BYTES: u64 = 200 * 1024 * 1024;

/// Sort the lines of the file at `path` in place by the key `key_fn` derives from each line.
///
/// The file is replaced with its sorted content only when the whole sort succeeds. On failure
/// the file is left untouched and no intermediate files remain. See [SortInPlace] for details.
///
/// # Arguments
/// * `path` - a text file with one record per line
/// * `key_fn` - derives the sort key from a line, see [LineKey]
/// * `block_size_bytes` - memory budget for reading, sorting and merging, see
///   [DEFAULT_BLOCK_SIZE_BYTES]
/// * `temp_dir` - directory for spill files, defaults to std::env::temp_dir()
pub fn sort_in_place<F: LineKey>(
    path: &Path,
    key_fn: F,
    block_size_bytes: u64,
    temp_dir: Option<PathBuf>,
) -> Result<(), SortError> {
    let mut sort = SortInPlace::new(path.to_path_buf(), key_fn);
    sort.with_block_size_bytes(block_size_bytes);
    if let Some(tmp) = temp_dir {
        sort.with_tmp_dir(tmp);
    }
    sort.sort()?;
    Ok(())
}

/// Statistics of a completed sort
#[derive(Clone, Debug)]
pub struct SortSummary {
    records: u64,
    spills: usize,
    estimated_spills: u64,
    cursor_block_size_bytes: u64,
    peak_merge_resident: usize,
}

impl SortSummary {
    /// Number of lines sorted
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Number of spill files written
    pub fn spills(&self) -> usize {
        self.spills
    }

    /// Number of spill files expected from the input size, used to size the merge buffers
    pub fn estimated_spills(&self) -> u64 {
        self.estimated_spills
    }

    /// Read-ahead of each spill during the merge
    pub fn cursor_block_size_bytes(&self) -> u64 {
        self.cursor_block_size_bytes
    }

    /// Largest number of lines held in memory at once during the merge
    pub fn peak_merge_resident(&self) -> usize {
        self.peak_merge_resident
    }
}

/// Sort a text file in place with bounded memory
///
/// The sort runs in two passes. The first pass reads the file in blocks of about
/// `block_size_bytes`, sorts each block by key and writes it to a spill file. The second pass
/// merges all spill files into a staging file next to the input, reading each spill in blocks
/// of `block_size_bytes` divided by the expected number of spills. The staging file is then
/// renamed over the input.
///
/// Lines with equal keys that were read in the same block keep their relative order. The order
/// of lines with equal keys from different blocks follows the order of the blocks, not the
/// input order.
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use line_extsort::sort::SortInPlace;
///
/// // sort a TSV file by the integer in its first field
/// fn sort_by_id(path: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let key_fn = |line: &str| line.split('\t').next().unwrap_or_default().parse::<i64>();
///     let mut sort = SortInPlace::new(path, key_fn);
///     // read and sort 64 MB at a time
///     sort.with_block_size_mb(64);
///     // for large files it is recommended to provide a dedicated directory for spill files
///     sort.with_tmp_dir(tmp);
///     let summary = sort.sort()?;
///     log::info!("sorted {} lines using {} spills", summary.records(), summary.spills());
///     Ok(())
/// }
/// ```
pub struct SortInPlace<F> {
    path: PathBuf,
    key_fn: F,
    tmp: PathBuf,
    tmp_prefix: String,
    block_size_bytes: u64,
    endl: char,
}

impl<F: LineKey> SortInPlace<F> {
    /// Create a default SortInPlace definition.
    ///
    /// * spill files are created in std::env::temp_dir()
    /// * the memory budget is [DEFAULT_BLOCK_SIZE_BYTES]
    /// * spill file names start with "spill-"
    /// * lines end with '\n'
    pub fn new(path: PathBuf, key_fn: F) -> SortInPlace<F> {
        SortInPlace {
            path,
            key_fn,
            tmp: std::env::temp_dir(),
            tmp_prefix: "spill-".to_string(),
            block_size_bytes: DEFAULT_BLOCK_SIZE_BYTES,
            endl: '\n',
        }
    }

    /// Set directory for spill files. By default use std::env::temp_dir()
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = tmp;
    }

    /// Set the name prefix of spill files. The default is "spill-"
    pub fn with_tmp_prefix(&mut self, tmp_prefix: String) {
        self.tmp_prefix = tmp_prefix;
    }

    /// The input will be read in blocks of 'block_size_bytes' respecting line boundaries
    pub fn with_block_size_bytes(&mut self, block_size_bytes: u64) {
        self.block_size_bytes = block_size_bytes;
    }

    /// The input will be read in blocks of 'block_size_mb' MB respecting line boundaries
    pub fn with_block_size_mb(&mut self, block_size_mb: u64) {
        self.block_size_bytes = block_size_mb.saturating_mul(1_000_000);
    }

    /// Set line ending char - ASCII only, not supporting CRLF. A non ASCII char fails [sort] and
    /// [check] with an [io::ErrorKind::InvalidInput] storage error.
    ///
    /// [sort]: SortInPlace::sort
    /// [check]: SortInPlace::check
    pub fn with_endl(&mut self, endl: char) {
        self.endl = endl
    }

    fn validate_endl(&self, phase: Phase) -> Result<(), SortError> {
        if self.endl.is_ascii() {
            Ok(())
        } else {
            Err(SortError::storage(
                phase,
                &self.path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("line ending must be an ASCII char, found {:?}", self.endl),
                ),
            ))
        }
    }

    fn create_config(&self, input_len: u64) -> Config {
        Config::new(
            self.tmp.clone(),
            self.tmp_prefix.clone(),
            ".spill".to_string(),
            ".out".to_string(),
            self.endl,
            self.block_size_bytes,
            input_len,
        )
    }

    /// Sort the file in place
    pub fn sort(&self) -> Result<SortSummary, SortError> {
        log::info!("Start sorting {}", self.path.display());
        self.validate_endl(Phase::Spilling)?;
        let metadata = fs::metadata(&self.path)
            .map_err(|e| SortError::storage(Phase::Spilling, &self.path, e))?;
        let config = self.create_config(metadata.len());

        let spill_pass = self.spill(&config)?;
        let spills = spill_pass.spills.len();
        log::info!(
            "Start merging {} spills, estimated: {}, cursor block size: {} bytes",
            spills,
            config.estimated_spills(),
            config.cursor_block_size_bytes()
        );

        let limit = NoFileLimit::raise(spills);
        let (staging, peak_merge_resident) =
            self.merge(spill_pass.spills, spill_pass.ends_with_endl, &config)?;
        drop(limit);

        Self::replace(staging, &self.path, metadata.permissions())?;
        log::info!("Finish sorting {}, lines: {}", self.path.display(), spill_pass.records);
        Ok(SortSummary {
            records: spill_pass.records,
            spills,
            estimated_spills: config.estimated_spills(),
            cursor_block_size_bytes: config.cursor_block_size_bytes(),
            peak_merge_resident,
        })
    }

    /// Check whether the file is already sorted by key
    pub fn check(&self) -> Result<bool, SortError> {
        self.validate_endl(Phase::Checking)?;
        let file = File::open(&self.path)
            .map_err(|e| SortError::storage(Phase::Checking, &self.path, e))?;
        let mut reader = BlockReader::new(BufReader::new(file), self.endl);
        let mut previous: Option<F::Key> = None;
        loop {
            let first_line = reader.lines() + 1;
            let lines = reader
                .next_block(self.block_size_bytes)
                .map_err(|e| SortError::storage(Phase::Checking, &self.path, e))?;
            if lines.is_empty() {
                return Ok(true);
            }

            for (i, line) in lines.into_iter().enumerate() {
                let (key, _line) = LineRecord::new(line, &self.key_fn, self.endl)
                    .map_err(|source| SortError::KeyExtraction {
                        phase: Phase::Checking,
                        line: first_line + i as u64,
                        source,
                    })?
                    .into_parts();
                if let Some(previous_key) = &previous {
                    if previous_key > &key {
                        return Ok(false);
                    }
                }
                previous = Some(key);
            }
        }
    }

    fn spill(&self, config: &Config) -> Result<SpillPass, SortError> {
        log::info!(
            "Start spilling {}, block size: {} bytes",
            self.path.display(),
            config.block_size_bytes()
        );
        let file = File::open(&self.path)
            .map_err(|e| SortError::storage(Phase::Spilling, &self.path, e))?;
        let mut reader = BlockReader::new(BufReader::new(file), config.endl());
        let mut spills = Vec::new();
        loop {
            match self.spill_block(&mut reader, config) {
                Ok(Some(spill)) => spills.push(spill),
                Ok(None) => break,
                Err(e) => {
                    Self::delete_spills(spills);
                    return Err(e);
                }
            }
        }

        let records = spills.iter().map(|s| s.records() as u64).sum();
        let spilled_bytes: u64 = spills.iter().map(|s| s.bytes()).sum();
        log::info!(
            "Finish spilling {}, lines: {}, bytes read: {}, bytes spilled: {}, spills: {}",
            self.path.display(),
            reader.lines(),
            reader.bytes(),
            spilled_bytes,
            spills.len()
        );
        Ok(SpillPass {
            spills,
            records,
            ends_with_endl: reader.ends_with_endl(),
        })
    }

    fn spill_block(
        &self,
        reader: &mut BlockReader<BufReader<File>>,
        config: &Config,
    ) -> Result<Option<SpillFile>, SortError> {
        let first_line = reader.lines() + 1;
        let lines = reader
            .next_block(config.block_size_bytes())
            .map_err(|e| SortError::storage(Phase::Spilling, &self.path, e))?;
        if lines.is_empty() {
            return Ok(None);
        }
        let block = SortedBlock::sort(lines, &self.key_fn, config.endl(), first_line)?;
        SpillFile::write(block, config).map(Some)
    }

    fn delete_spills(spills: Vec<SpillFile>) {
        for spill in spills {
            let path = spill.path().to_path_buf();
            if let Err(e) = spill.delete() {
                log::warn!("Failed to remove spill file {}: {}", path.display(), e);
            }
        }
    }

    fn merge(
        &self,
        spills: Vec<SpillFile>,
        ends_with_endl: bool,
        config: &Config,
    ) -> Result<(NamedTempFile, usize), SortError> {
        let cursors = spills
            .into_iter()
            .enumerate()
            .map(|(source, spill)| {
                SpillCursor::new(
                    spill,
                    source,
                    config.cursor_block_size_bytes(),
                    &self.key_fn,
                    config.endl(),
                )
            })
            .collect();
        let mut merger = Merger::new(cursors);
        let staged = self.stage(&mut merger, ends_with_endl, config);
        let closed = merger.close();
        match (staged, closed) {
            (Ok(staging), Ok(())) => {
                log::info!(
                    "Finish merging, lines: {}, peak resident lines: {}",
                    merger.merged(),
                    merger.peak_resident()
                );
                Ok((staging, merger.peak_resident()))
            }
            (Ok(staging), Err(e)) => {
                Self::discard(staging);
                Err(e)
            }
            (Err(e), _) => Err(e),
        }
    }

    /// Drain the merger into a new staging file next to the input. On failure the staging file
    /// is removed.
    fn stage(
        &self,
        merger: &mut Merger<F>,
        ends_with_endl: bool,
        config: &Config,
    ) -> Result<NamedTempFile, SortError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().unwrap_or_default().to_string_lossy();
        let mut staging = Builder::new()
            .prefix(&format!("{}.", file_name))
            .suffix(config.staging_suffix())
            .tempfile_in(&dir)
            .map_err(|e| SortError::storage(Phase::Merging, &dir, e))?;
        log::info!("Merging into {}", staging.path().display());

        let result = Self::write_merged(merger, staging.as_file_mut(), ends_with_endl);
        match result {
            Ok(()) => Ok(staging),
            Err(e) => {
                let e = match e {
                    MergeFailure::Merge(e) => e,
                    MergeFailure::Write(e) => SortError::storage(Phase::Merging, staging.path(), e),
                };
                Self::discard(staging);
                Err(e)
            }
        }
    }

    fn write_merged(
        merger: &mut Merger<F>,
        file: &mut File,
        ends_with_endl: bool,
    ) -> Result<(), MergeFailure> {
        let mut written: u64 = 0;
        let mut buf_writer = BufWriter::new(&mut *file);
        for line in merger {
            let line = line.map_err(MergeFailure::Merge)?;
            buf_writer.write_all(line.as_bytes()).map_err(MergeFailure::Write)?;
            written += line.len() as u64;
        }
        buf_writer.flush().map_err(MergeFailure::Write)?;
        drop(buf_writer);

        // the input did not end with a terminator, neither does the output
        if !ends_with_endl && written > 0 {
            file.set_len(written - 1).map_err(MergeFailure::Write)?;
        }
        file.sync_all().map_err(MergeFailure::Write)
    }

    fn replace(
        staging: NamedTempFile,
        path: &Path,
        permissions: Permissions,
    ) -> Result<(), SortError> {
        if let Err(e) = fs::set_permissions(staging.path(), permissions) {
            let error = SortError::storage(Phase::Replacing, staging.path(), e);
            Self::discard(staging);
            return Err(error);
        }

        log::info!("Replace {} with {}", path.display(), staging.path().display());
        staging.persist(path).map_err(|e| {
            let from = e.file.path().to_path_buf();
            Self::discard(e.file);
            SortError::Replace {
                from,
                to: path.to_path_buf(),
                source: e.error,
            }
        })?;
        Ok(())
    }

    fn discard(staging: NamedTempFile) {
        let path = staging.path().to_path_buf();
        if let Err(e) = staging.close() {
            log::warn!("Failed to remove staging file {}: {}", path.display(), e);
        }
    }
}

struct SpillPass {
    spills: Vec<SpillFile>,
    records: u64,
    ends_with_endl: bool,
}

enum MergeFailure {
    Merge(SortError),
    Write(io::Error),
}
