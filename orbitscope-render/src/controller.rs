use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use orbitscope_core::formula::{create, create_default, dual_of};
use orbitscope_core::{
    Bounds, Complex, EvaluationOptions, FormulaRef, FractalParameters,
    OrbitEvaluator, ScreenSize, ZoomStack,
};

use crate::buffer::RenderBuffer;
use crate::colorizer::{ColoringParameters, Colorizer};
use crate::error::RenderError;
use crate::iteration_buffer::IterationBuffer;
use crate::scheduler::{ComputeCancel, ComputeStats, Scheduler};

/// Blocks per pass when nothing else is configured.
pub const DEFAULT_NR_OF_BLOCKS: usize = 64;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Computing,
    /// The last pass was cancelled; the buffer holds a partial result.
    Interrupted,
}

/// Receives `(blocks_done, blocks_total)` on the thread that polls the
/// controller.
pub type ProgressSink = Box<dyn FnMut(usize, usize) + Send>;

enum WorkerMessage {
    Progress {
        generation: u64,
        done: usize,
        total: usize,
    },
    Finished {
        generation: u64,
        buffer: IterationBuffer,
        outcome: crate::Result<ComputeStats>,
    },
}

struct Pass {
    generation: u64,
    cancel: Arc<ComputeCancel>,
    rx: mpsc::Receiver<WorkerMessage>,
    handle: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the session (formula, bounds, screen, buffer, coloring) and runs
/// compute passes on a background thread, one at a time.
///
/// Every mutation that would invalidate the iteration buffer is rejected
/// with [`RenderError::Busy`] while a pass is in flight. Results travel
/// back over a channel drained by [`poll`](Self::poll) or
/// [`wait`](Self::wait) on the owning thread.
pub struct IteratorController {
    formula: FormulaRef,
    zoom: ZoomStack,
    screen: ScreenSize,
    options: EvaluationOptions,
    coloring: ColoringParameters,
    colorizer: Colorizer,
    scheduler: Arc<Scheduler>,
    buffer: IterationBuffer,
    image: Option<RenderBuffer>,
    state: ControllerState,
    generation: u64,
    pass: Option<Pass>,
    progress_sink: Option<ProgressSink>,
    last_stats: Option<ComputeStats>,
}

impl std::fmt::Debug for IteratorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IteratorController")
            .field("family", &self.formula.family_name())
            .field("bounds", &self.zoom.current())
            .field("screen", &self.screen)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish()
    }
}

impl IteratorController {
    /// A controller with hardware-concurrency workers and the default
    /// block count.
    pub fn new(formula: FormulaRef, screen: ScreenSize) -> crate::Result<Self> {
        Self::with_workers(formula, screen, 0, DEFAULT_NR_OF_BLOCKS)
    }

    pub fn with_workers(
        formula: FormulaRef,
        screen: ScreenSize,
        nr_of_threads: usize,
        nr_of_blocks: usize,
    ) -> crate::Result<Self> {
        let coloring = ColoringParameters::default();
        Ok(Self {
            zoom: ZoomStack::new(formula.default_bounds()),
            formula,
            screen,
            options: EvaluationOptions::default(),
            colorizer: Colorizer::new(&coloring),
            coloring,
            scheduler: Arc::new(Scheduler::new(nr_of_threads, nr_of_blocks)?),
            buffer: IterationBuffer::new(screen),
            image: None,
            state: ControllerState::Idle,
            generation: 0,
            pass: None,
            progress_sink: None,
            last_stats: None,
        })
    }

    // -- State ----------------------------------------------------------------

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == ControllerState::Computing
    }

    fn ensure_idle(&self) -> crate::Result<()> {
        if self.is_busy() {
            Err(RenderError::Busy)
        } else {
            Ok(())
        }
    }

    /// Generation of the most recently started pass.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_stats(&self) -> Option<ComputeStats> {
        self.last_stats
    }

    // -- Compute --------------------------------------------------------------

    /// Start a full recompute on a background thread and return at once.
    ///
    /// Returns the pass generation. Call [`poll`](Self::poll) or
    /// [`wait`](Self::wait) to collect progress and the result.
    pub fn recalc(&mut self) -> crate::Result<u64> {
        self.ensure_idle()?;
        self.generation += 1;
        let generation = self.generation;

        let evaluator: OrbitEvaluator = OrbitEvaluator::new(
            Arc::clone(&self.formula),
            self.zoom.current(),
            self.screen,
            self.options,
        );
        let scheduler = Arc::clone(&self.scheduler);
        let cancel = Arc::new(ComputeCancel::new());
        let worker_cancel = Arc::clone(&cancel);
        let (tx, rx) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("orbit-compute".into())
            .spawn(move || {
                let mut buffer = IterationBuffer::new(evaluator.screen());
                let progress_tx = tx.clone();
                let outcome =
                    scheduler.compute(&mut buffer, &evaluator, &worker_cancel, |done, total| {
                        let _ = progress_tx.send(WorkerMessage::Progress {
                            generation,
                            done,
                            total,
                        });
                    });
                let _ = tx.send(WorkerMessage::Finished {
                    generation,
                    buffer,
                    outcome,
                });
            })
            .map_err(RenderError::Spawn)?;

        debug!(
            generation,
            family = self.formula.family_name(),
            "Requesting compute pass"
        );
        self.pass = Some(Pass {
            generation,
            cancel,
            rx,
            handle,
        });
        self.state = ControllerState::Computing;
        Ok(generation)
    }

    /// Drain pending worker messages without blocking.
    ///
    /// Returns the outcome of the pass if it finished during this call.
    pub fn poll(&mut self) -> Option<crate::Result<ComputeStats>> {
        loop {
            let received = self.pass.as_ref()?.rx.try_recv();
            let msg = match received {
                Ok(msg) => msg,
                Err(mpsc::TryRecvError::Empty) => return None,
                Err(mpsc::TryRecvError::Disconnected) => return Some(self.worker_lost()),
            };
            if let Some(outcome) = self.handle_message(msg) {
                return Some(outcome);
            }
        }
    }

    /// Block until the in-flight pass ends. Returns `None` if no pass is
    /// running.
    pub fn wait(&mut self) -> Option<crate::Result<ComputeStats>> {
        loop {
            let received = self.pass.as_ref()?.rx.recv();
            let msg = match received {
                Ok(msg) => msg,
                Err(_) => return Some(self.worker_lost()),
            };
            if let Some(outcome) = self.handle_message(msg) {
                return Some(outcome);
            }
        }
    }

    fn handle_message(&mut self, msg: WorkerMessage) -> Option<crate::Result<ComputeStats>> {
        match msg {
            WorkerMessage::Progress {
                generation,
                done,
                total,
            } => {
                if generation == self.generation {
                    if let Some(sink) = self.progress_sink.as_mut() {
                        sink(done, total);
                    }
                }
                None
            }
            WorkerMessage::Finished {
                generation,
                buffer,
                outcome,
            } => {
                if generation != self.generation {
                    debug!(generation, current = self.generation, "Dropping stale result");
                    return None;
                }
                if let Some(pass) = self.pass.take() {
                    if pass.handle.join().is_err() {
                        warn!(generation = pass.generation, "Compute thread panicked");
                    }
                }
                Some(self.finish_pass(buffer, outcome))
            }
        }
    }

    fn finish_pass(
        &mut self,
        buffer: IterationBuffer,
        outcome: crate::Result<ComputeStats>,
    ) -> crate::Result<ComputeStats> {
        match outcome {
            Ok(stats) => {
                self.buffer = buffer;
                self.last_stats = Some(stats);
                self.state = ControllerState::Idle;
                self.render_image();
                Ok(stats)
            }
            Err(RenderError::Interrupted(i)) => {
                info!(
                    blocks_done = i.blocks_done,
                    blocks_total = i.blocks_total,
                    "Compute pass interrupted by user"
                );
                self.buffer = buffer;
                self.state = ControllerState::Interrupted;
                self.render_image();
                Err(RenderError::Interrupted(i))
            }
            Err(e) => {
                warn!("Compute pass failed: {e}");
                self.state = ControllerState::Idle;
                Err(e)
            }
        }
    }

    fn worker_lost(&mut self) -> crate::Result<ComputeStats> {
        self.pass = None;
        self.state = ControllerState::Idle;
        Err(RenderError::WorkerLost)
    }

    /// Ask the in-flight pass to stop after its current blocks.
    ///
    /// The state becomes [`ControllerState::Interrupted`] once the worker
    /// reports back through [`poll`](Self::poll) or [`wait`](Self::wait).
    pub fn interrupt(&self) {
        if let Some(pass) = &self.pass {
            debug!(generation = pass.generation, "Interrupt requested");
            pass.cancel.cancel();
        }
    }

    /// Recolor the current buffer without recomputing orbits.
    pub fn recolor(&mut self) -> crate::Result<&RenderBuffer> {
        self.ensure_idle()?;
        Ok(self.render_image())
    }

    fn render_image(&mut self) -> &RenderBuffer {
        let image = self.scheduler.colorize(&self.buffer, &self.colorizer);
        self.image.insert(image)
    }

    pub fn set_progress_sink(&mut self, sink: impl FnMut(usize, usize) + Send + 'static) {
        self.progress_sink = Some(Box::new(sink));
    }

    // -- Workers --------------------------------------------------------------

    pub fn nr_of_threads(&self) -> usize {
        self.scheduler.nr_of_threads()
    }

    pub fn nr_of_blocks(&self) -> usize {
        self.scheduler.nr_of_blocks()
    }

    pub fn set_nr_of_threads_to_use(&mut self, nr_of_threads: usize) -> crate::Result<()> {
        self.ensure_idle()?;
        let blocks = self.scheduler.nr_of_blocks();
        self.scheduler = Arc::new(Scheduler::new(nr_of_threads, blocks)?);
        Ok(())
    }

    pub fn set_nr_of_blocks_to_use(&mut self, nr_of_blocks: usize) -> crate::Result<()> {
        self.ensure_idle()?;
        let threads = self.scheduler.nr_of_threads();
        self.scheduler = Arc::new(Scheduler::new(threads, nr_of_blocks)?);
        Ok(())
    }

    // -- Session --------------------------------------------------------------

    /// Drop the current results; called whenever they no longer match the
    /// session.
    fn invalidate(&mut self) {
        self.buffer = IterationBuffer::new(self.screen);
        self.image = None;
        self.last_stats = None;
        if self.state == ControllerState::Interrupted {
            self.state = ControllerState::Idle;
        }
    }

    pub fn formula(&self) -> &FormulaRef {
        &self.formula
    }

    pub fn family_name(&self) -> &'static str {
        self.formula.family_name()
    }

    pub fn parameters(&self) -> &FractalParameters {
        self.formula.params()
    }

    /// Replace the family and its parameters, resetting the zoom history
    /// to the family's default bounds.
    pub fn set_formula(&mut self, formula: FormulaRef) -> crate::Result<()> {
        self.ensure_idle()?;
        self.zoom.reset(formula.default_bounds());
        self.formula = formula;
        self.invalidate();
        Ok(())
    }

    /// Switch to the family registered as `name` with its default parameters.
    pub fn set_family(&mut self, name: &str) -> crate::Result<()> {
        self.ensure_idle()?;
        let formula = create_default(name)?;
        self.set_formula(formula)
    }

    /// Replace the parameters of the current family, keeping the bounds.
    pub fn set_parameters(&mut self, params: FractalParameters) -> crate::Result<()> {
        self.ensure_idle()?;
        self.formula = create(self.formula.family_name(), params)?;
        self.invalidate();
        Ok(())
    }

    /// Switch to the dual family with `point` as its dual parameter.
    pub fn switch_to_dual(&mut self, point: Complex) -> crate::Result<()> {
        self.ensure_idle()?;
        let dual = dual_of(self.formula.as_ref(), point)?;
        info!(
            from = self.formula.family_name(),
            to = dual.family_name(),
            "Switching to dual fractal"
        );
        self.set_formula(dual)
    }

    pub fn coloring(&self) -> &ColoringParameters {
        &self.coloring
    }

    /// Replace the coloring. Allowed during a pass; the new colors apply to
    /// the current buffer right away when idle.
    pub fn set_coloring(&mut self, coloring: ColoringParameters) {
        self.colorizer = Colorizer::new(&coloring);
        self.coloring = coloring;
        if !self.is_busy() && self.buffer.written() > 0 {
            self.render_image();
        }
    }

    pub fn evaluation_options(&self) -> EvaluationOptions {
        self.options
    }

    pub fn set_evaluation_options(&mut self, options: EvaluationOptions) -> crate::Result<()> {
        self.ensure_idle()?;
        if options != self.options {
            self.options = options;
            self.invalidate();
        }
        Ok(())
    }

    pub fn bounds(&self) -> Bounds {
        self.zoom.current()
    }

    /// Replace the bounds and start a new zoom history from them.
    pub fn set_bounds(&mut self, bounds: Bounds) -> crate::Result<()> {
        self.ensure_idle()?;
        self.zoom.reset(bounds);
        self.invalidate();
        Ok(())
    }

    pub fn zoom_stack(&self) -> &ZoomStack {
        &self.zoom
    }

    /// Replace the whole zoom history; the top entry becomes the bounds.
    pub fn set_zoom_stack(&mut self, zoom: ZoomStack) -> crate::Result<()> {
        self.ensure_idle()?;
        self.zoom = zoom;
        self.invalidate();
        Ok(())
    }

    /// Push `bounds` onto the zoom history.
    pub fn zoom_to(&mut self, bounds: Bounds) -> crate::Result<()> {
        self.ensure_idle()?;
        self.zoom.push(bounds);
        self.invalidate();
        Ok(())
    }

    /// Zoom into the pixel rectangle between `from` and `to`.
    pub fn zoom_to_selection(&mut self, from: (u32, u32), to: (u32, u32)) -> crate::Result<()> {
        let bounds =
            self.zoom
                .current()
                .select(self.screen, from, to, self.options.invert_y)?;
        self.zoom_to(bounds)
    }

    /// Return to the previous bounds. `Ok(false)` at the root.
    pub fn zoom_out(&mut self) -> crate::Result<bool> {
        self.ensure_idle()?;
        if self.zoom.pop().is_none() {
            return Ok(false);
        }
        self.invalidate();
        Ok(true)
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    /// Change the resolution. The buffer is replaced, never resized.
    pub fn set_screen_size(&mut self, screen: ScreenSize) -> crate::Result<()> {
        self.ensure_idle()?;
        if screen != self.screen {
            self.screen = screen;
            self.invalidate();
        }
        Ok(())
    }

    // -- Results --------------------------------------------------------------

    pub fn buffer(&self) -> &IterationBuffer {
        &self.buffer
    }

    /// Install a previously computed buffer, e.g. from a snapshot.
    pub fn install_buffer(&mut self, buffer: IterationBuffer) -> crate::Result<()> {
        self.ensure_idle()?;
        if buffer.screen() != self.screen {
            return Err(RenderError::DimensionMismatch {
                width: self.screen.width,
                height: self.screen.height,
                found_width: buffer.width(),
                found_height: buffer.height(),
            });
        }
        self.buffer = buffer;
        self.state = ControllerState::Idle;
        self.render_image();
        Ok(())
    }

    /// The colorized image of the current buffer, once one exists.
    pub fn image(&self) -> Option<&RenderBuffer> {
        self.image.as_ref()
    }

    /// The orbit of the pixel at `(x, y)`, capped at `max_iterations`.
    pub fn orbit_at(&self, x: u32, y: u32) -> Vec<Complex> {
        let evaluator: OrbitEvaluator = OrbitEvaluator::new(
            Arc::clone(&self.formula),
            self.zoom.current(),
            self.screen,
            self.options,
        );
        evaluator.trace_orbit(x, y, self.formula.params().max_iterations as usize)
    }

    /// The point of the plane under pixel `(x, y)`.
    pub fn pixel_to_complex(&self, x: u32, y: u32) -> Complex {
        self.zoom
            .current()
            .pixel_to_complex(self.screen, x, y, self.options.invert_y)
    }
}

impl Drop for IteratorController {
    fn drop(&mut self) {
        if let Some(pass) = &self.pass {
            pass.cancel.cancel();
        }
    }
}
