use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use traj_core::error::{TrajError, TrajResult};
use traj_core::topology::Topology;
use traj_io::FrameSource;

use crate::action::{Action, Capabilities, Dataset};
use crate::config::{DriverConfig, PartialResultPolicy};
use crate::registry::ActionRegistry;

const DRIVER_NAME: &str = "driver";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Unconfigured,
    Validated,
    Running,
    Finished,
    Failed,
}

/// Cooperative cancellation flag, checked between frames.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActionResult {
    pub key: String,
    pub dataset: Dataset,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunOutput {
    pub frames_processed: usize,
    pub results: Vec<ActionResult>,
}

impl RunOutput {
    /// First result produced under `key`.
    pub fn get(&self, key: &str) -> Option<&Dataset> {
        self.results.iter().find(|r| r.key == key).map(|r| &r.dataset)
    }
}

/// Results finalized over the frames a failed run managed to process.
#[derive(Clone, Debug, PartialEq)]
pub struct PartialRun {
    pub frames_processed: usize,
    pub results: Vec<ActionResult>,
    pub reason: String,
}

/// Source properties the requirement checks depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SourceShape {
    frame_count: usize,
    atom_count: usize,
    has_box: bool,
    has_temperatures: bool,
}

impl SourceShape {
    fn of(source: &dyn FrameSource) -> Self {
        Self {
            frame_count: source.frame_count(),
            atom_count: source.atom_count(),
            has_box: source.has_box(),
            has_temperatures: source.has_temperatures(),
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    processed: usize,
    last_index: Option<usize>,
}

struct Slot {
    key: String,
    action: Box<dyn Action>,
    capabilities: Capabilities,
}

/// Runs a set of actions over one frame source.
///
/// Every requirement is checked before the first frame is read. A driver
/// runs once: after `Finished` or `Failed`, build a new one.
pub struct ActionDriver<'r> {
    registry: &'r ActionRegistry,
    topology: Option<Arc<Topology>>,
    config: DriverConfig,
    cancel: CancelToken,
    slots: Vec<Slot>,
    state: DriverState,
    validated: Option<SourceShape>,
    partial: Option<PartialRun>,
}

impl<'r> ActionDriver<'r> {
    pub fn new(registry: &'r ActionRegistry) -> Self {
        Self {
            registry,
            topology: None,
            config: DriverConfig::default(),
            cancel: CancelToken::new(),
            slots: Vec::new(),
            state: DriverState::Unconfigured,
            validated: None,
            partial: None,
        }
    }

    pub fn with_topology(mut self, topology: Arc<Topology>) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config.normalized();
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn action_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.iter().map(|slot| slot.key.as_str())
    }

    /// Adds a fresh instance of the registered action `key`.
    pub fn add_action(&mut self, key: &str) -> TrajResult<&mut Self> {
        let action = self.registry.get(key)?;
        self.add_instance(key, action)
    }

    /// Adds a caller-built action under `key`.
    pub fn add_instance(&mut self, key: &str, action: Box<dyn Action>) -> TrajResult<&mut Self> {
        if self.state != DriverState::Unconfigured {
            return Err(TrajError::validation(
                key,
                format!("cannot add actions to a driver in state {:?}", self.state),
            ));
        }
        let capabilities = action.capabilities();
        self.slots.push(Slot {
            key: key.to_string(),
            action,
            capabilities,
        });
        Ok(self)
    }

    /// Checks the config and every action's requirements against `source`.
    ///
    /// Reads no frames. A failed check leaves the driver `Failed`.
    pub fn validate(&mut self, source: &dyn FrameSource) -> TrajResult<()> {
        match self.state {
            DriverState::Unconfigured => {}
            DriverState::Validated => return Ok(()),
            state => {
                return Err(TrajError::validation(
                    DRIVER_NAME,
                    format!("cannot validate a driver in state {state:?}"),
                ))
            }
        }
        match self.check_source(source).and_then(|()| self.init_actions()) {
            Ok(()) => {
                self.state = DriverState::Validated;
                self.validated = Some(SourceShape::of(source));
                debug!(
                    actions = self.slots.len(),
                    n_frames = source.frame_count(),
                    n_atoms = source.atom_count(),
                    "driver validated"
                );
                Ok(())
            }
            Err(err) => {
                self.state = DriverState::Failed;
                warn!(error = %err, "driver validation failed");
                Err(err)
            }
        }
    }

    fn check_source(&self, source: &dyn FrameSource) -> TrajResult<()> {
        self.config.validate(source.frame_count())?;
        let n_atoms = source.atom_count();
        if let Some(top) = &self.topology {
            if top.n_atoms() != n_atoms {
                return Err(TrajError::Shape(format!(
                    "topology has {} atoms but the frame source has {n_atoms}",
                    top.n_atoms()
                )));
            }
        }
        for slot in &self.slots {
            let caps = slot.capabilities;
            if caps.needs_box && !source.has_box() {
                return Err(TrajError::validation(
                    &slot.key,
                    "requires a periodic box but the frame source has none",
                ));
            }
            if caps.needs_topology && self.topology.is_none() {
                return Err(TrajError::validation(
                    &slot.key,
                    "requires a topology but none was attached",
                ));
            }
            if caps.needs_temperature && !source.has_temperatures() {
                return Err(TrajError::validation(
                    &slot.key,
                    "requires per-frame temperatures but the frame source has none",
                ));
            }
            if let Some(expected) = caps.expected_atoms {
                if expected != n_atoms {
                    return Err(TrajError::validation(
                        &slot.key,
                        format!("expects {expected} atoms, frame source has {n_atoms}"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn init_actions(&mut self) -> TrajResult<()> {
        let topology = self.topology.as_deref();
        for slot in &mut self.slots {
            slot.action.init(topology).map_err(|err| match err {
                TrajError::Validation { .. } => err,
                other => TrajError::validation(&slot.key, other.to_string()),
            })?;
        }
        Ok(())
    }

    /// Validates if needed, then feeds every selected frame to every action in order.
    ///
    /// A source that differs from the one passed to `validate` is checked
    /// again before any frame is read.
    pub fn run(&mut self, source: &mut dyn FrameSource) -> TrajResult<RunOutput> {
        if self.state == DriverState::Unconfigured {
            self.validate(&*source)?;
        }
        if self.state != DriverState::Validated {
            return Err(TrajError::validation(
                DRIVER_NAME,
                format!("cannot run a driver in state {:?}", self.state),
            ));
        }
        let shape = SourceShape::of(&*source);
        if self.validated != Some(shape) {
            if let Err(err) = self.check_source(&*source) {
                self.state = DriverState::Failed;
                warn!(error = %err, "run source failed validation");
                return Err(err);
            }
            self.validated = Some(shape);
        }
        self.state = DriverState::Running;
        info!(actions = self.slots.len(), n_frames = shape.frame_count, "driver running");

        let mut progress = Progress::default();
        if let Err(err) = self.drive(source, &mut progress) {
            return Err(self.fail(progress.processed, err, Vec::new(), 0));
        }
        let mut results = Vec::with_capacity(self.slots.len());
        let mut failure = None;
        for (pos, slot) in self.slots.iter_mut().enumerate() {
            match slot.action.finalize() {
                Ok(dataset) => results.push(ActionResult {
                    key: slot.key.clone(),
                    dataset,
                }),
                Err(err) => {
                    let err = TrajError::ActionFailed {
                        action: slot.key.clone(),
                        frame: progress.last_index.unwrap_or(0),
                        reason: format!("finalize: {err}"),
                    };
                    failure = Some((pos, err));
                    break;
                }
            }
        }
        if let Some((pos, err)) = failure {
            return Err(self.fail(progress.processed, err, results, pos + 1));
        }
        self.state = DriverState::Finished;
        info!(frames = progress.processed, results = results.len(), "driver finished");
        Ok(RunOutput {
            frames_processed: progress.processed,
            results,
        })
    }

    fn drive(&mut self, source: &mut dyn FrameSource, progress: &mut Progress) -> TrajResult<()> {
        let log_every = self.config.log_every;
        for index in self.config.frame_indices(source.frame_count()) {
            if self.cancel.is_cancelled() {
                return Err(TrajError::Cancelled { frame: index });
            }
            let frame = source.frame_at(index)?;
            for slot in &mut self.slots {
                slot.action
                    .process(index, frame)
                    .map_err(|err| TrajError::ActionFailed {
                        action: slot.key.clone(),
                        frame: index,
                        reason: err.to_string(),
                    })?;
            }
            progress.processed += 1;
            progress.last_index = Some(index);
            if let Some(every) = log_every {
                if progress.processed % every == 0 {
                    info!(processed = progress.processed, frame = index, "driver progress");
                }
            }
        }
        Ok(())
    }

    /// Marks the run failed. Under `Keep`, `results` already finalized are
    /// kept and the slots from `unfinalized` on are finalized now.
    fn fail(
        &mut self,
        processed: usize,
        err: TrajError,
        mut results: Vec<ActionResult>,
        unfinalized: usize,
    ) -> TrajError {
        self.state = DriverState::Failed;
        warn!(frames = processed, error = %err, "driver run failed");
        if self.config.partial_results == PartialResultPolicy::Keep {
            for slot in self.slots.iter_mut().skip(unfinalized) {
                match slot.action.finalize() {
                    Ok(dataset) => results.push(ActionResult {
                        key: slot.key.clone(),
                        dataset,
                    }),
                    Err(finalize_err) => {
                        warn!(action = %slot.key, error = %finalize_err, "dropping partial result")
                    }
                }
            }
            self.partial = Some(PartialRun {
                frames_processed: processed,
                results,
                reason: err.to_string(),
            });
        }
        err
    }

    /// Partial results kept by a failed run under `PartialResultPolicy::Keep`.
    pub fn take_partial(&mut self) -> Option<PartialRun> {
        self.partial.take()
    }
}
