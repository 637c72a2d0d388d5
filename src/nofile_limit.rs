use std::cmp::{max, min};

#[cfg(unix)]
use rlimit::{getrlimit, setrlimit, Resource};

/// Raises the soft NOFILE rlimit so that every spill can be open during the merge, and restores
/// the previous limit when dropped.
///
/// Failing to read or change the limit is not fatal: opening a spill will then fail with a
/// storage error if the limit is really too low.
pub(crate) struct NoFileLimit {
    restore: Option<(u64, u64)>,
}

impl NoFileLimit {
    pub(crate) fn raise(files: usize) -> NoFileLimit {
        let restore = Self::try_raise(files as u64 + 256);
        NoFileLimit { restore }
    }

    #[cfg(unix)]
    fn try_raise(wanted: u64) -> Option<(u64, u64)> {
        let (current_soft, current_hard) = match getrlimit(Resource::NOFILE) {
            Ok(limits) => limits,
            Err(e) => {
                log::warn!("Failed to get rlimit NOFILE: {}", e);
                return None;
            }
        };
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let new_soft = min(max(wanted, current_soft), current_hard);
        if new_soft == current_soft {
            return None;
        }

        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        match setrlimit(Resource::NOFILE, new_soft, current_hard) {
            Ok(()) => Some((current_soft, current_hard)),
            Err(e) => {
                log::warn!(
                    "Failed to set rlimit NOFILE, soft: {}, hard: {}: {}",
                    new_soft,
                    current_hard,
                    e
                );
                None
            }
        }
    }

    #[cfg(not(unix))]
    fn try_raise(_wanted: u64) -> Option<(u64, u64)> {
        None
    }

    #[cfg(unix)]
    fn restore(soft: u64, hard: u64) {
        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", soft, hard);
        if let Err(e) = setrlimit(Resource::NOFILE, soft, hard) {
            log::warn!("Failed to restore rlimit NOFILE, soft: {}, hard: {}: {}", soft, hard, e);
        }
    }

    #[cfg(not(unix))]
    fn restore(_soft: u64, _hard: u64) {}
}

impl Drop for NoFileLimit {
    fn drop(&mut self) {
        if let Some((soft, hard)) = self.restore.take() {
            Self::restore(soft, hard);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use rlimit::{getrlimit, Resource};

    use crate::nofile_limit::NoFileLimit;

    #[test]
    fn test_limit_never_lowered() -> Result<(), anyhow::Error> {
        let (soft, hard) = getrlimit(Resource::NOFILE)?;
        {
            let _limit = NoFileLimit::raise(0);
            let (raised_soft, raised_hard) = getrlimit(Resource::NOFILE)?;
            assert!(raised_soft >= soft);
            assert_eq!(raised_hard, hard);
        }
        assert_eq!(getrlimit(Resource::NOFILE)?, (soft, hard));
        Ok(())
    }
}
