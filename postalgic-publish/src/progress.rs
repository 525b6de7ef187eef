//! Observational progress reporting: `(step, total, description)` per unit of work.

/// Receives progress updates. No backpressure: implementations must return quickly.
pub trait ProgressReporter {
    fn report(&self, step: usize, total: usize, description: &str);
}

impl<F> ProgressReporter for F
where
    F: Fn(usize, usize, &str),
{
    fn report(&self, step: usize, total: usize, description: &str) {
        self(step, total, description)
    }
}

/// Discards every update.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _step: usize, _total: usize, _description: &str) {}
}

/// Numbers the steps of one publish and forwards them to a reporter.
pub struct StepCounter<'a> {
    reporter: &'a dyn ProgressReporter,
    step: usize,
    total: usize,
}

impl<'a> StepCounter<'a> {
    pub fn new(reporter: &'a dyn ProgressReporter, total: usize) -> Self {
        Self {
            reporter,
            step: 0,
            total,
        }
    }

    pub fn advance(&mut self, description: &str) {
        self.step += 1;
        if self.step > self.total {
            self.total = self.step;
        }
        self.reporter.report(self.step, self.total, description);
    }

    pub fn completed(&self) -> usize {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn closures_receive_numbered_steps() {
        let seen = RefCell::new(Vec::new());
        let reporter = |step: usize, total: usize, desc: &str| {
            seen.borrow_mut().push(format!("{step}/{total} {desc}"));
        };
        let mut counter = StepCounter::new(&reporter, 2);
        counter.advance("upload a");
        counter.advance("upload b");
        counter.advance("write control file");
        assert_eq!(
            *seen.borrow(),
            vec!["1/2 upload a", "2/2 upload b", "3/3 write control file"]
        );
        assert_eq!(counter.completed(), 3);
    }
}
