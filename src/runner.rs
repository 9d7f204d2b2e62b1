//! Bounded parallel fan-out for per-segment export work.
//!
//! Items are processed in batches sized to the machine's available
//! parallelism: each batch's workers run on their own OS threads (they
//! spend their time blocked on external subprocesses) and the batch is
//! joined before the next one starts. A worker error lets its batch
//! siblings finish, surfaces the error, and prevents any later batch from
//! starting.

use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use anyhow::Result;

use crate::ui::Spinner;

pub struct ParallelRunner<'a> {
    spinner: &'a Spinner,
    message: String,
    batch_size: usize,
}

impl<'a> ParallelRunner<'a> {
    /// `message` may contain `{progress}` and `{count}` placeholders.
    pub fn new(spinner: &'a Spinner, message: impl Into<String>) -> Self {
        let batch_size = thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4);

        Self {
            spinner,
            message: message.into(),
            batch_size,
        }
    }

    #[cfg(test)]
    fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run `worker(item, index)` over every item and return the elapsed
    /// wall-clock seconds. The progress counter is exact regardless of
    /// completion order; indices follow the input ordering.
    pub fn run<T, F>(&self, items: &[T], worker: F) -> Result<f64>
    where
        T: Sync,
        F: Fn(&T, usize) -> Result<()> + Sync,
    {
        let started = Instant::now();
        let count = items.len();
        let progress = Mutex::new(0usize);

        self.update_progress(0, count);

        for (batch_index, batch) in items.chunks(self.batch_size).enumerate() {
            let base = batch_index * self.batch_size;

            let batch_result: Result<()> = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .enumerate()
                    .map(|(offset, item)| {
                        let worker = &worker;
                        let progress = &progress;
                        scope.spawn(move || {
                            worker(item, base + offset)?;
                            let done = {
                                let mut progress = progress.lock().expect("progress mutex");
                                *progress += 1;
                                *progress
                            };
                            self.update_progress(done, count);
                            Ok(())
                        })
                    })
                    .collect();

                // Join every sibling before deciding the batch outcome, so
                // an error never leaves a thread of this batch running.
                let mut first_error = None;
                for handle in handles {
                    match handle.join() {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            first_error.get_or_insert(err);
                        }
                        Err(panic) => std::panic::resume_unwind(panic),
                    }
                }

                match first_error {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            });

            batch_result?;
        }

        self.spinner.stop();
        Ok(started.elapsed().as_secs_f64())
    }

    fn update_progress(&self, progress: usize, count: usize) {
        let message = self
            .message
            .replace("{progress}", &progress.to_string())
            .replace("{count}", &count.to_string());
        self.spinner.update(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spinner() -> Spinner {
        Spinner::new()
    }

    #[test]
    fn processes_every_item_exactly_once() {
        let spinner = spinner();
        let runner = ParallelRunner::new(&spinner, "working ({progress}/{count})");
        let items: Vec<u32> = (0..17).collect();
        let seen = AtomicUsize::new(0);

        let elapsed = runner
            .run(&items, |_, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 17);
        assert!(elapsed >= 0.0);
    }

    #[test]
    fn worker_receives_input_order_indices() {
        let spinner = spinner();
        let runner = ParallelRunner::new(&spinner, "indices").with_batch_size(3);
        let items = vec!["a", "b", "c", "d", "e"];
        let indices = Mutex::new(Vec::new());

        runner
            .run(&items, |item, index| {
                indices.lock().unwrap().push((index, *item));
                Ok(())
            })
            .unwrap();

        let mut seen = indices.into_inner().unwrap();
        seen.sort();
        assert_eq!(
            seen,
            vec![(0, "a"), (1, "b"), (2, "c"), (3, "d"), (4, "e")]
        );
    }

    #[test]
    fn error_aborts_before_later_batches_start() {
        let spinner = spinner();
        let runner = ParallelRunner::new(&spinner, "failing").with_batch_size(2);
        let items: Vec<u32> = (0..8).collect();
        let started = AtomicUsize::new(0);

        let err = runner
            .run(&items, |item, _| {
                started.fetch_add(1, Ordering::SeqCst);
                if *item == 0 {
                    bail!("boom on {item}");
                }
                Ok(())
            })
            .unwrap_err();

        assert!(err.to_string().contains("boom on 0"));
        // Only the first batch may have started.
        assert!(started.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn same_batch_siblings_run_to_completion() {
        let spinner = spinner();
        let runner = ParallelRunner::new(&spinner, "failing").with_batch_size(4);
        let items: Vec<u32> = (0..4).collect();
        let completed = AtomicUsize::new(0);

        let _ = runner.run(&items, |item, _| {
            if *item == 1 {
                bail!("boom");
            }
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(completed.load(Ordering::SeqCst), 3);
    }
}
