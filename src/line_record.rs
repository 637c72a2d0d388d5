use crate::key::LineKey;

/// A line and the key derived from it. The line keeps its terminator and is written back
/// verbatim.
#[derive(Debug)]
pub(crate) struct LineRecord<K> {
    key: K,
    line: String,
}

impl<K> LineRecord<K> {
    pub(crate) fn new<F>(
        line: String,
        key_fn: &F,
        endl: char,
    ) -> Result<LineRecord<K>, anyhow::Error>
    where
        F: LineKey<Key = K>,
    {
        let body = line.strip_suffix(endl).unwrap_or(&line);
        let key = key_fn.key(body)?;
        Ok(LineRecord { key, line })
    }

    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    pub(crate) fn line(&self) -> &str {
        &self.line
    }

    pub(crate) fn into_parts(self) -> (K, String) {
        (self.key, self.line)
    }
}
