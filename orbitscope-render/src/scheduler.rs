use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info};

use orbitscope_core::{FractalFormula, OrbitEvaluator, RootDetection, RootRegistry};

use crate::block::{block_count, partition_rows};
use crate::buffer::RenderBuffer;
use crate::colorizer::Colorizer;
use crate::error::{Interrupted, RenderError};
use crate::iteration_buffer::IterationBuffer;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cancellation flag and progress counters shared with the workers of one
/// compute pass.
///
/// Workers check the flag before starting each block; a block already in
/// flight always runs to completion.
#[derive(Debug, Default)]
pub struct ComputeCancel {
    cancelled: AtomicBool,
    progress_done: AtomicUsize,
    progress_total: AtomicUsize,
}

impl ComputeCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the pass to stop before its next block.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Reset progress for a new pass with `total` blocks.
    pub fn reset_progress(&self, total: usize) {
        self.progress_total.store(total, Ordering::Relaxed);
        self.progress_done.store(0, Ordering::Relaxed);
    }

    /// Mark one more block finished and return the new count.
    pub fn inc_progress(&self) -> usize {
        self.progress_done.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Read the current progress as `(done, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.progress_done.load(Ordering::Relaxed),
            self.progress_total.load(Ordering::Relaxed),
        )
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Timing and bookkeeping for a finished pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputeStats {
    pub elapsed: Duration,
    pub blocks: usize,
    pub pixels: usize,
    /// Roots registered by automatic root detection, zero otherwise.
    pub roots_detected: usize,
}

/// Default worker count: the machine's available parallelism.
pub fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Runs orbit evaluation over an [`IterationBuffer`] on a fixed-size pool.
///
/// The pixel grid is split into row bands; the pool's work-stealing queue
/// hands each band to exactly one worker, which writes only that band's
/// slice of the buffer.
pub struct Scheduler {
    pool: rayon::ThreadPool,
    nr_of_threads: usize,
    nr_of_blocks: usize,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("nr_of_threads", &self.nr_of_threads)
            .field("nr_of_blocks", &self.nr_of_blocks)
            .finish()
    }
}

impl Scheduler {
    /// A scheduler with `nr_of_threads` workers (0 = hardware concurrency)
    /// splitting each pass into at least `nr_of_blocks` blocks.
    pub fn new(nr_of_threads: usize, nr_of_blocks: usize) -> crate::Result<Self> {
        let nr_of_threads = if nr_of_threads == 0 {
            default_thread_count()
        } else {
            nr_of_threads
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nr_of_threads)
            .thread_name(|i| format!("orbit-worker-{i}"))
            .build()?;
        debug!(nr_of_threads, nr_of_blocks, "Built worker pool");
        Ok(Self {
            pool,
            nr_of_threads,
            nr_of_blocks,
        })
    }

    pub fn nr_of_threads(&self) -> usize {
        self.nr_of_threads
    }

    pub fn nr_of_blocks(&self) -> usize {
        self.nr_of_blocks
    }

    /// Evaluate every pixel of `buffer` with `evaluator`.
    ///
    /// `on_progress(done, total)` is called from the worker that finished a
    /// block. Returns [`RenderError::Interrupted`] when `cancel` stopped the
    /// pass before every block ran; the buffer then holds the finished
    /// blocks and `None` elsewhere.
    pub fn compute<F, P>(
        &self,
        buffer: &mut IterationBuffer,
        evaluator: &OrbitEvaluator<F>,
        cancel: &ComputeCancel,
        on_progress: P,
    ) -> crate::Result<ComputeStats>
    where
        F: FractalFormula + ?Sized,
        P: Fn(usize, usize) + Sync,
    {
        let screen = evaluator.screen();
        if buffer.width() != screen.width || buffer.height() != screen.height {
            return Err(RenderError::DimensionMismatch {
                width: screen.width,
                height: screen.height,
                found_width: buffer.width(),
                found_height: buffer.height(),
            });
        }

        let start = Instant::now();
        let blocks = partition_rows(
            screen.height,
            block_count(self.nr_of_threads, self.nr_of_blocks, screen.height),
        );
        let total = blocks.len();
        let width = screen.width as usize;
        cancel.reset_progress(total);
        debug!(
            family = evaluator.formula().family_name(),
            width = screen.width,
            height = screen.height,
            blocks = total,
            threads = self.nr_of_threads,
            "Starting compute pass"
        );

        let bands = buffer.split_blocks_mut(&blocks);
        self.pool.install(|| {
            bands
                .into_par_iter()
                .with_max_len(1)
                .for_each(|(block, cells)| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    for (i, cell) in cells.iter_mut().enumerate() {
                        let x = (i % width) as u32;
                        let y = block.first_row + (i / width) as u32;
                        *cell = Some(evaluator.evaluate(x, y));
                    }
                    let done = cancel.inc_progress();
                    on_progress(done, total);
                });
        });

        // Scan order makes root indices independent of the partitioning.
        let roots_detected = match evaluator.formula().root_detection() {
            RootDetection::Automatic => {
                let mut registry = RootRegistry::for_params(evaluator.formula().params());
                registry.resolve(buffer.cells_mut().iter_mut().flatten());
                registry.len()
            }
            _ => 0,
        };

        let (blocks_done, _) = cancel.progress();
        let elapsed = start.elapsed();
        if blocks_done < total {
            info!(
                elapsed_ms = elapsed.as_millis(),
                blocks_done,
                blocks_total = total,
                "Compute pass interrupted"
            );
            return Err(Interrupted {
                blocks_done,
                blocks_total: total,
            }
            .into());
        }

        info!(
            elapsed_ms = elapsed.as_millis(),
            blocks = total,
            roots_detected,
            "Compute pass complete"
        );
        Ok(ComputeStats {
            elapsed,
            blocks: total,
            pixels: buffer.len(),
            roots_detected,
        })
    }

    /// Colorize `buffer` on this scheduler's pool.
    pub fn colorize(&self, buffer: &IterationBuffer, colorizer: &Colorizer) -> RenderBuffer {
        self.pool.install(|| colorizer.colorize(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use orbitscope_core::{
        Bounds, Complex, EvaluationOptions, FractalParameters, Mandelbrot, ScreenSize,
    };

    fn evaluator(w: u32, h: u32, max_iter: u32) -> OrbitEvaluator<Mandelbrot> {
        let m = Mandelbrot::new(FractalParameters::default().with_max_iterations(max_iter));
        let bounds = m.default_bounds();
        OrbitEvaluator::new(
            Arc::new(m),
            bounds,
            ScreenSize::new(w, h).unwrap(),
            EvaluationOptions::default(),
        )
    }

    #[test]
    fn compute_fills_every_cell() {
        let e = evaluator(64, 48, 128);
        let mut buf = IterationBuffer::new(e.screen());
        let scheduler = Scheduler::new(2, 8).unwrap();
        let stats = scheduler
            .compute(&mut buf, &e, &ComputeCancel::new(), |_, _| {})
            .unwrap();
        assert!(buf.is_complete());
        assert_eq!(stats.blocks, 8);
        assert_eq!(stats.pixels, 64 * 48);
        assert_eq!(stats.roots_detected, 0);
    }

    #[test]
    fn progress_reports_each_block_once() {
        let e = evaluator(32, 32, 64);
        let mut buf = IterationBuffer::new(e.screen());
        let scheduler = Scheduler::new(3, 10).unwrap();
        let calls = AtomicUsize::new(0);
        let max_done = AtomicUsize::new(0);
        scheduler
            .compute(&mut buf, &e, &ComputeCancel::new(), |done, total| {
                assert_eq!(total, 10);
                calls.fetch_add(1, Ordering::Relaxed);
                max_done.fetch_max(done, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 10);
        assert_eq!(max_done.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let e = evaluator(16, 16, 32);
        let mut buf = IterationBuffer::new(ScreenSize::new(8, 8).unwrap());
        let scheduler = Scheduler::new(1, 1).unwrap();
        let err = scheduler
            .compute(&mut buf, &e, &ComputeCancel::new(), |_, _| {})
            .unwrap_err();
        assert!(matches!(err, RenderError::DimensionMismatch { .. }));
    }

    #[test]
    fn pre_cancelled_pass_writes_nothing() {
        let e = evaluator(16, 16, 32);
        let mut buf = IterationBuffer::new(e.screen());
        let scheduler = Scheduler::new(2, 4).unwrap();
        let cancel = ComputeCancel::new();
        cancel.cancel();
        let err = scheduler.compute(&mut buf, &e, &cancel, |_, _| {}).unwrap_err();
        match err {
            RenderError::Interrupted(i) => {
                assert_eq!(i.blocks_done, 0);
                assert_eq!(i.blocks_total, 4);
            }
            other => panic!("expected interruption, got {other:?}"),
        }
        assert_eq!(buf.written(), 0);
    }

    #[test]
    fn cancellation_from_progress_stops_remaining_blocks() {
        let e = evaluator(16, 64, 32);
        let mut buf = IterationBuffer::new(e.screen());
        // One worker makes block order sequential.
        let scheduler = Scheduler::new(1, 64).unwrap();
        let cancel = ComputeCancel::new();
        let err = scheduler
            .compute(&mut buf, &e, &cancel, |done, _| {
                if done == 3 {
                    cancel.cancel();
                }
            })
            .unwrap_err();
        match err {
            RenderError::Interrupted(i) => assert_eq!(i.blocks_done, 3),
            other => panic!("expected interruption, got {other:?}"),
        }
        assert_eq!(buf.written(), 3 * 16);
    }

    #[test]
    fn zero_threads_uses_hardware_concurrency() {
        let s = Scheduler::new(0, 4).unwrap();
        assert_eq!(s.nr_of_threads(), default_thread_count());
    }

    #[test]
    fn single_row_image() {
        let m = Mandelbrot::default();
        let bounds = Bounds::new(Complex::new(-2.0, -0.1), Complex::new(1.0, 0.1)).unwrap();
        let e = OrbitEvaluator::new(
            Arc::new(m),
            bounds,
            ScreenSize::new(50, 1).unwrap(),
            EvaluationOptions::default(),
        );
        let mut buf = IterationBuffer::new(e.screen());
        let stats = Scheduler::new(4, 16)
            .unwrap()
            .compute(&mut buf, &e, &ComputeCancel::new(), |_, _| {})
            .unwrap();
        assert_eq!(stats.blocks, 1);
        assert!(buf.is_complete());
    }
}
