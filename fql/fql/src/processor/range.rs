//! Skip and limit stages.

use super::{Processor, ProcessorFlags};

/// Discards the first N paths, then passes everything through.
pub struct SkipProcessor {
    flags: ProcessorFlags,
    skip: u64,
    count: u64,
    pending: Option<(String, String)>,
}

impl SkipProcessor {
    pub fn new(skip: u64) -> Self {
        SkipProcessor {
            flags: ProcessorFlags::default(),
            skip,
            count: 0,
            pending: None,
        }
    }
}

impl Processor for SkipProcessor {
    fn is_readable(&self) -> bool {
        self.flags.readable
    }

    fn is_closed(&self) -> bool {
        self.flags.closed
    }

    fn read(&mut self) -> Option<(String, String)> {
        self.flags.readable = false;
        self.pending.take()
    }

    fn write(&mut self, dir: &str, path: &str) {
        if self.count >= self.skip {
            self.flags.readable = true;
            self.pending = Some((dir.to_string(), path.to_string()));
        } else {
            self.count += 1;
            self.flags.readable = false;
        }
    }

    fn close(&mut self) {
        self.flags.closed = true;
    }
}

/// Passes up to N paths through, then closes itself, which closes the chain.
pub struct LimitProcessor {
    flags: ProcessorFlags,
    limit: u64,
    count: u64,
    pending: Option<(String, String)>,
}

impl LimitProcessor {
    pub fn new(limit: u64) -> Self {
        LimitProcessor {
            flags: ProcessorFlags::default(),
            limit,
            count: 0,
            pending: None,
        }
    }
}

impl Processor for LimitProcessor {
    fn is_readable(&self) -> bool {
        self.flags.readable
    }

    fn is_closed(&self) -> bool {
        self.flags.closed
    }

    fn read(&mut self) -> Option<(String, String)> {
        self.flags.readable = false;

        if self.count >= self.limit {
            self.flags.closed = true;
        }

        self.pending.take()
    }

    fn write(&mut self, dir: &str, path: &str) {
        if self.limit > 0 {
            self.flags.readable = true;
            self.count += 1;
            self.pending = Some((dir.to_string(), path.to_string()));
        } else {
            self.flags.readable = false;
            self.flags.closed = true;
        }
    }

    fn close(&mut self) {
        self.flags.closed = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn skip_counts_only_discarded_paths() {
        let mut skip = SkipProcessor::new(1);

        skip.write("/d", "a");
        assert!(!skip.is_readable());

        skip.write("/d", "b");
        assert!(skip.is_readable());
        assert_eq!(skip.read(), Some(("/d".to_string(), "b".to_string())));

        skip.write("/d", "c");
        assert_eq!(skip.read(), Some(("/d".to_string(), "c".to_string())));
    }

    #[test]
    fn limit_closes_after_the_last_read() {
        let mut limit = LimitProcessor::new(2);

        limit.write("/d", "a");
        assert_eq!(limit.read(), Some(("/d".to_string(), "a".to_string())));
        assert!(!limit.is_closed());

        limit.write("/d", "b");
        assert_eq!(limit.read(), Some(("/d".to_string(), "b".to_string())));
        assert!(limit.is_closed());
    }
}
