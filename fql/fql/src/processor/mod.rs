//! The output pipeline: a chain of stages that accepted paths flow through.

mod exec;
mod print;
mod range;
mod sort;

pub use exec::{ExecArgs, ExecProcessor};
pub use print::{FormatProcessor, PrintProcessor};
pub use range::{LimitProcessor, SkipProcessor};
pub use sort::{parse_sort_string, SortKey, SortProcessor, SORTABLE_FIELDS};

/// The two state bits of a stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorFlags {
    pub readable: bool,
    pub closed: bool,
}

/// One stage of the output pipeline.
///
/// `read` is only called while the readable bit is set and the closed bit is
/// clear, and clears the readable bit (stages that drain multiple buffered
/// paths keep it set until they run dry). A closed stage never sees another
/// `write`.
pub trait Processor {
    fn is_readable(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// Pop the next produced path, together with the starting-point it was
    /// found under. Searches over several starting-points share one chain,
    /// so the pair travels together.
    fn read(&mut self) -> Option<(String, String)>;

    /// Push one found path into the stage. `dir` is the starting-point the
    /// path was found under.
    fn write(&mut self, dir: &str, path: &str);

    /// Stage-specific finalisation; the stage is closed once drained.
    fn close(&mut self);

    /// Whether the stage hit a runtime error that should fail the run.
    fn failed(&self) -> bool {
        false
    }
}

/// An ordered list of stages. Paths are written to the head; whatever a
/// stage produces is forwarded to its tail.
pub struct ProcessorChain {
    stages: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    pub fn new(stages: Vec<Box<dyn Processor>>) -> Self {
        ProcessorChain { stages }
    }

    /// Process one found path. Returns true once the chain is closed and no
    /// further input will be accepted.
    pub fn write(&mut self, dir: &str, path: &str) -> bool {
        log::trace!("writing to processor chain: {path}");

        self.write_from(0, dir, path)
    }

    fn write_from(&mut self, idx: usize, dir: &str, path: &str) -> bool {
        let Some(stage) = self.stages.get_mut(idx) else {
            return false;
        };

        if stage.is_closed() {
            return true;
        }

        stage.write(dir, path);

        let mut completed = false;

        loop {
            let stage = &mut self.stages[idx];

            if !stage.is_readable() || stage.is_closed() {
                break;
            }

            let Some((produced_dir, produced)) = stage.read() else {
                break;
            };

            completed = self.write_from(idx + 1, &produced_dir, &produced);
        }

        completed || self.stages[idx].is_closed()
    }

    /// End-of-search: close and drain every stage in order until the whole
    /// chain is closed. Drained paths keep the starting-point they were
    /// written under. Closing an already-closed stage is a no-op.
    pub fn complete(&mut self) {
        for idx in 0..self.stages.len() {
            if self.stages[idx].is_closed() {
                continue;
            }

            self.stages[idx].close();

            loop {
                if !self.stages[idx].is_readable() || self.stages[idx].is_closed() {
                    break;
                }

                let Some((produced_dir, produced)) = self.stages[idx].read() else {
                    break;
                };

                self.write_from(idx + 1, &produced_dir, &produced);
            }

            if !self.stages[idx].is_closed() {
                log::warn!("stage {idx} did not close after drain");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stages.iter().any(|stage| stage.is_closed())
    }

    pub fn has_failed(&self) -> bool {
        self.stages.iter().any(|stage| stage.failed())
    }
}

/// Builds a chain by prepending stages, so the stage prepended last ends up
/// at the head. A failed prepend destroys the chain built so far.
#[derive(Default)]
pub struct ChainBuilder {
    failed: bool,
    stages: Vec<Box<dyn Processor>>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        ChainBuilder::default()
    }

    pub fn try_prepend(&mut self, processor: Option<Box<dyn Processor>>) -> bool {
        match processor {
            Some(processor) if !self.failed => {
                self.stages.insert(0, processor);
                true
            }
            _ => {
                self.fail();
                false
            }
        }
    }

    pub fn append(&mut self, processor: Box<dyn Processor>) {
        if !self.failed {
            self.stages.push(processor);
        }
    }

    pub fn fail(&mut self) {
        if !self.failed {
            self.stages.clear();
            self.failed = true;
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn into_chain(self) -> Option<ProcessorChain> {
        (!self.failed).then(|| ProcessorChain::new(self.stages))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// Pass-through stage recording every (starting-point, path) pair
    /// written to it.
    pub struct Recorder {
        flags: ProcessorFlags,
        pending: Option<(String, String)>,
        pub seen: Rc<RefCell<Vec<(String, String)>>>,
    }

    impl Recorder {
        pub fn new() -> (Self, Rc<RefCell<Vec<(String, String)>>>) {
            let seen = Rc::new(RefCell::new(Vec::new()));

            (
                Recorder {
                    flags: ProcessorFlags::default(),
                    pending: None,
                    seen: seen.clone(),
                },
                seen,
            )
        }
    }

    impl Processor for Recorder {
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
            self.seen
                .borrow_mut()
                .push((dir.to_string(), path.to_string()));
            self.flags.readable = true;
            self.pending = Some((dir.to_string(), path.to_string()));
        }

        fn close(&mut self) {
            self.flags.closed = true;
        }
    }
}
