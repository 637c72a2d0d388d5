/// Derives a comparable key from a line.
///
/// The key function is the only ordering signal the sort uses. It is called once per line while
/// spilling and once more per line while merging, because keys are not stored in spill files. It
/// must therefore be deterministic, total over all lines and free of side effects.
///
/// The line passed to the key function does not include the line terminator.
///
/// Any closure or function `Fn(&str) -> Result<K, E>` where `K: Ord` and `E` converts into
/// [anyhow::Error] is a [LineKey].
///
/// # Examples
/// ```
/// use line_extsort::key::LineKey;
///
/// // sort by the integer in the second TAB separated field
/// let key_fn = |line: &str| {
///     line.split('\t')
///         .nth(1)
///         .unwrap_or_default()
///         .parse::<i64>()
/// };
/// assert_eq!(key_fn.key("a\t12\tz").unwrap(), 12);
/// assert!(key_fn.key("a").is_err());
/// ```
pub trait LineKey {
    type Key: Ord;

    fn key(&self, line: &str) -> Result<Self::Key, anyhow::Error>;
}

impl<F, K, E> LineKey for F
where
    F: Fn(&str) -> Result<K, E>,
    K: Ord,
    E: Into<anyhow::Error>,
{
    type Key = K;

    fn key(&self, line: &str) -> Result<K, anyhow::Error> {
        self(line).map_err(Into::into)
    }
}
