use std::cmp::max;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub(crate) struct Config {
    tmp: PathBuf,
    tmp_prefix: String,
    tmp_suffix: String,
    staging_suffix: String,
    endl: char,
    block_size_bytes: u64,
    estimated_spills: u64,
    cursor_block_size_bytes: u64,
}

impl Config {
    /// `input_len` is the size of the file to be sorted. The number of spills is estimated from
    /// it before any spilling happens, and the block size of each merge cursor is the block size
    /// divided by that estimate, so all cursors together stay within one block size.
    pub(crate) fn new(
        tmp: PathBuf,
        tmp_prefix: String,
        tmp_suffix: String,
        staging_suffix: String,
        endl: char,
        block_size_bytes: u64,
        input_len: u64,
    ) -> Config {
        let block_size_bytes = max(block_size_bytes, 1);
        let estimated_spills = input_len as f64 / block_size_bytes as f64 + 1.0;
        let cursor_block_size_bytes = max((block_size_bytes as f64 / estimated_spills) as u64, 1);
        Config {
            tmp,
            tmp_prefix,
            tmp_suffix,
            staging_suffix,
            endl,
            block_size_bytes,
            estimated_spills: estimated_spills as u64,
            cursor_block_size_bytes,
        }
    }

    pub(crate) fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub(crate) fn tmp_prefix(&self) -> &String {
        &self.tmp_prefix
    }

    pub(crate) fn tmp_suffix(&self) -> &String {
        &self.tmp_suffix
    }

    pub(crate) fn staging_suffix(&self) -> &String {
        &self.staging_suffix
    }

    pub(crate) fn endl(&self) -> char {
        self.endl
    }

    pub(crate) fn block_size_bytes(&self) -> u64 {
        self.block_size_bytes
    }

    pub(crate) fn estimated_spills(&self) -> u64 {
        self.estimated_spills
    }

    pub(crate) fn cursor_block_size_bytes(&self) -> u64 {
        self.cursor_block_size_bytes
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use crate::config::Config;

    pub(crate) fn test_config(tmp: PathBuf, block_size_bytes: u64, input_len: u64) -> Config {
        Config::new(
            tmp,
            "spill-".to_string(),
            ".spill".to_string(),
            ".out".to_string(),
            '\n',
            block_size_bytes,
            input_len,
        )
    }

    #[test]
    fn test_empty_input() {
        let config = test_config(std::env::temp_dir(), 1000, 0);
        assert_eq!(config.estimated_spills(), 1);
        assert_eq!(config.cursor_block_size_bytes(), 1000);
    }

    #[test]
    fn test_cursor_block_size() {
        // 10_500 / 1_000 + 1 = 11.5 estimated spills
        let config = test_config(std::env::temp_dir(), 1000, 10_500);
        assert_eq!(config.estimated_spills(), 11);
        assert_eq!(config.cursor_block_size_bytes(), 86);
    }

    #[test]
    fn test_tiny_block_size() {
        let config = test_config(std::env::temp_dir(), 0, 1_000_000);
        assert_eq!(config.block_size_bytes(), 1);
        assert_eq!(config.cursor_block_size_bytes(), 1);
    }
}
