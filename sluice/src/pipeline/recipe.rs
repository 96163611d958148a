//! Recipe building and execution.
//!
//! A [`Recipe`] pulls one record at a time from a source and drives it
//! depth-first through its stage list: every output of a filter, and every
//! emitter at an attachment point, is handled before the next record is
//! pulled.

use super::chain::{Chain, Slot, StageInfo};
use super::config::RecipeConfig;
use super::failure_tolerance::{
    decide, EmitterFailurePolicy, ErrorCollector, ErrorRecord, FailureAction, FailureMode,
};
use super::report::{AbortInfo, AbortReason, RunReport};
use crate::cancellation::CancellationToken;
use crate::core::{RecipeState, Record, StageKind};
use crate::errors::{ContractErrorInfo, RecipeValidationError, SluiceError, StageError};
use crate::events::{EventSink, NoOpEventSink};
use crate::sources::{Source, SourceGuard};
use crate::stages::{Emitter, Filter};
use crate::utils::{elapsed_ms, generate_run_id, now_utc};
use serde_json::json;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{error, info, info_span, trace, warn};

/// Callback invoked with every error record as it happens.
pub type ErrorCallback = Box<dyn FnMut(&ErrorRecord) + Send>;

/// Builder for validated recipes.
pub struct RecipeBuilder {
    config: RecipeConfig,
    chain: Chain,
    error_chain: Option<Chain>,
    events: Option<Arc<dyn EventSink>>,
    on_error: Option<ErrorCallback>,
    token: Option<CancellationToken>,
}

impl RecipeBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(RecipeConfig::new().with_name(name))
    }

    /// Creates a builder from a configuration.
    #[must_use]
    pub fn from_config(config: RecipeConfig) -> Self {
        Self {
            config,
            chain: Chain::new(),
            error_chain: None,
            events: None,
            on_error: None,
            token: None,
        }
    }

    /// Appends a filter.
    #[must_use]
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.chain = self.chain.filter(filter);
        self
    }

    /// Attaches an emitter, joining the previous attachment point if the
    /// last stage is one.
    #[must_use]
    pub fn emitter(mut self, emitter: impl Emitter + 'static) -> Self {
        self.chain = self.chain.emitter(emitter);
        self
    }

    /// Appends a new attachment point holding the given emitters.
    #[must_use]
    pub fn fan_out(mut self, emitters: Vec<Box<dyn Emitter>>) -> Self {
        self.chain = self.chain.fan_out(emitters);
        self
    }

    /// Splices a chain's stages onto the end of the recipe.
    #[must_use]
    pub fn include(mut self, chain: Chain) -> Self {
        self.chain = self.chain.include(chain);
        self
    }

    /// Attaches an emitter to an existing attachment point.
    ///
    /// # Errors
    ///
    /// Returns an error if `point` is out of range or names a filter.
    pub fn attach(mut self, point: usize, emitter: impl Emitter + 'static) -> Result<Self, RecipeValidationError> {
        self.chain.attach(point, emitter)?;
        Ok(self)
    }

    /// Routes every error record, converted with
    /// [`ErrorRecord::to_record`], through a secondary chain.
    #[must_use]
    pub fn error_stream(mut self, chain: Chain) -> Self {
        self.error_chain = Some(chain);
        self
    }

    /// Sets a callback invoked with every error record as it happens.
    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&ErrorRecord) + Send + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Uses an externally created cancellation token.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.config.failure_mode = mode;
        self
    }

    /// Aborts on the first per-record failure.
    #[must_use]
    pub fn fail_fast(self) -> Self {
        self.failure_mode(FailureMode::FailFast)
    }

    /// Sets what a fatal emitter error does.
    #[must_use]
    pub fn emitter_policy(mut self, policy: EmitterFailurePolicy) -> Self {
        self.config.emitter_policy = policy;
        self
    }

    /// Sets the maximum number of error records kept per run.
    #[must_use]
    pub fn error_capacity(mut self, capacity: Option<usize>) -> Self {
        self.config.error_capacity = capacity;
        self
    }

    /// Validates and builds the recipe.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the recipe has no
    /// emitter, an attachment point is empty, or the error stream has no
    /// emitter.
    pub fn build(self) -> Result<Recipe, RecipeValidationError> {
        self.config.validate()?;
        self.chain.check_fan_out_points()?;
        if self.chain.emitter_count() == 0 {
            return Err(RecipeValidationError::new(format!(
                "Recipe '{}' has no emitter",
                self.config.name
            ))
            .with_error_info(
                ContractErrorInfo::new("RECIPE-NO-EMITTER", "A recipe needs at least one emitter")
                    .with_fix_hint("Attach an emitter with RecipeBuilder::emitter.")
                    .with_context_entry("recipe", self.config.name.clone()),
            ));
        }
        if let Some(error_chain) = &self.error_chain {
            error_chain.check_fan_out_points()?;
            if error_chain.emitter_count() == 0 {
                return Err(RecipeValidationError::new(format!(
                    "Error stream of recipe '{}' has no emitter",
                    self.config.name
                ))
                .with_error_info(
                    ContractErrorInfo::new("RECIPE-EMPTY-ERROR-STREAM", "An error stream needs at least one emitter")
                        .with_fix_hint("Attach an emitter to the error stream chain, or drop the error stream.")
                        .with_context_entry("recipe", self.config.name.clone()),
                ));
            }
        }

        Ok(Recipe {
            config: self.config,
            chain: self.chain,
            error_chain: self.error_chain,
            events: self.events.unwrap_or_else(|| Arc::new(NoOpEventSink)),
            on_error: self.on_error,
            token: self.token.unwrap_or_default(),
            state: RecipeState::NotStarted,
        })
    }
}

impl fmt::Debug for RecipeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipeBuilder")
            .field("config", &self.config)
            .field("chain", &self.chain)
            .field("error_chain", &self.error_chain)
            .finish_non_exhaustive()
    }
}

/// A validated pipeline: a stage list plus run options.
///
/// The stage list is fixed once built. `run` takes `&mut self`, so one
/// recipe never runs twice at the same time; running it again resets every
/// stage and starts fresh counters.
pub struct Recipe {
    config: RecipeConfig,
    chain: Chain,
    error_chain: Option<Chain>,
    events: Arc<dyn EventSink>,
    on_error: Option<ErrorCallback>,
    token: CancellationToken,
    state: RecipeState,
}

impl Recipe {
    /// Creates a builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> RecipeBuilder {
        RecipeBuilder::new(name)
    }

    /// Returns the recipe name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RecipeConfig {
        &self.config
    }

    /// Returns the state left by the last run.
    #[must_use]
    pub const fn state(&self) -> RecipeState {
        self.state
    }

    /// Returns a handle that cancels the current (or next) run.
    ///
    /// A cancellation is consumed by the run that honors it: that run
    /// aborts and the token is re-armed. A cancellation requested between
    /// runs aborts the next run before its first pull.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Describes the main stage list.
    #[must_use]
    pub fn stages(&self) -> Vec<StageInfo> {
        self.chain.describe()
    }

    /// Runs the recipe over a source until it is exhausted, a fatal error
    /// occurs, or the run is cancelled.
    ///
    /// Per-record failures never surface here: they are in the report. Use
    /// [`RunReport::into_result`] to treat an abort as an error.
    pub fn run<S: Source>(&mut self, source: S) -> RunReport {
        let run_id = generate_run_id();
        let started_at = now_utc();
        let span = info_span!("recipe.run", recipe = %self.config.name, run_id = %run_id);
        let _entered = span.enter();

        self.chain.reset();
        if let Some(error_chain) = self.error_chain.as_mut() {
            error_chain.reset();
        }
        self.state = RecipeState::Running;

        let Self {
            config,
            chain,
            error_chain,
            events,
            on_error,
            token,
            state,
        } = self;

        events.emit(
            "recipe.started",
            Some(json!({ "recipe": config.name, "run_id": run_id.to_string() })),
        );
        info!(stages = chain.len(), "Recipe started");

        let mut run = RunState {
            mode: config.failure_mode,
            policy: config.emitter_policy,
            events: &**events,
            on_error: on_error.as_deref_mut(),
            error_chain: error_chain.as_mut(),
            collector: ErrorCollector::new(config.error_capacity),
            abort: None,
            position: 0,
            pulled: 0,
            completed: 0,
            failed: 0,
            record_failed: false,
        };

        let source_name = source.name().to_string();
        match SourceGuard::open(source) {
            Ok(mut source) => run.pull_all(&mut source, chain, token),
            Err(err) => {
                error!(source = %source_name, error = %err, "Source failed to open");
                run.abort = Some(AbortInfo {
                    reason: AbortReason::SourceFailure,
                    stage_index: None,
                    stage_name: source_name,
                    error: err.to_string(),
                    position: 0,
                });
            }
        }

        let RunState {
            collector,
            abort,
            pulled,
            completed,
            failed,
            ..
        } = run;

        let mut finalize_errors = Vec::new();
        let final_state = if abort.is_some() {
            RecipeState::Aborted
        } else {
            chain.finalize(&mut finalize_errors);
            if let Some(error_chain) = error_chain.as_mut() {
                error_chain.finalize(&mut finalize_errors);
            }
            RecipeState::Completed
        };
        *state = final_state;

        let (errors, errors_discarded) = collector.into_parts();
        let finished_at = now_utc();
        let report = RunReport {
            run_id,
            recipe: config.name.clone(),
            state: final_state,
            records_pulled: pulled,
            records_completed: completed,
            records_failed: failed,
            errors,
            errors_discarded,
            abort,
            finalize_errors,
            started_at,
            finished_at,
            duration_ms: elapsed_ms(started_at, finished_at),
        };

        match &report.abort {
            Some(abort) => {
                error!(
                    reason = %abort.reason,
                    stage = %abort.stage_name,
                    position = abort.position,
                    error = %abort.error,
                    records_pulled = report.records_pulled,
                    "Recipe aborted"
                );
                events.emit("recipe.aborted", Some(report.summary()));
            }
            None => {
                info!(
                    records_pulled = report.records_pulled,
                    records_failed = report.records_failed,
                    duration_ms = report.duration_ms,
                    "Recipe completed"
                );
                events.emit("recipe.completed", Some(report.summary()));
            }
        }

        report
    }
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("chain", &self.chain)
            .field("error_chain", &self.error_chain)
            .finish_non_exhaustive()
    }
}

/// Builds a recipe with default options around `chain` and runs it once.
///
/// # Errors
///
/// Returns an error if the chain does not form a valid recipe. An aborted
/// run is reported in the returned [`RunReport`].
pub fn run_recipe<S: Source>(source: S, chain: Chain) -> Result<RunReport, SluiceError> {
    let mut recipe = RecipeBuilder::new("recipe").include(chain).build()?;
    Ok(recipe.run(source))
}

/// Per-run bookkeeping.
struct RunState<'a> {
    mode: FailureMode,
    policy: EmitterFailurePolicy,
    events: &'a dyn EventSink,
    on_error: Option<&'a mut (dyn FnMut(&ErrorRecord) + Send + 'static)>,
    error_chain: Option<&'a mut Chain>,
    collector: ErrorCollector,
    abort: Option<AbortInfo>,
    /// Position of the source record in flight.
    position: u64,
    pulled: u64,
    completed: u64,
    failed: u64,
    record_failed: bool,
}

impl RunState<'_> {
    fn pull_all<S: Source>(&mut self, source: &mut SourceGuard<S>, chain: &mut Chain, token: &CancellationToken) {
        loop {
            if token.is_cancelled() {
                let reason = token.reason().unwrap_or_else(|| "cancelled".to_string());
                warn!(position = self.pulled, reason = %reason, "Recipe cancelled");
                // Consumed by this run; the next run starts armed.
                token.reset();
                self.abort = Some(AbortInfo {
                    reason: AbortReason::Cancelled,
                    stage_index: None,
                    stage_name: source.name().to_string(),
                    error: reason,
                    position: self.pulled,
                });
                return;
            }

            let record = match source.next_record() {
                None => return,
                Some(Ok(record)) => record,
                Some(Err(err)) => {
                    error!(source = source.name(), position = self.pulled, error = %err, "Source read failed");
                    self.abort = Some(AbortInfo {
                        reason: AbortReason::SourceFailure,
                        stage_index: None,
                        stage_name: source.name().to_string(),
                        error: err.to_string(),
                        position: self.pulled,
                    });
                    return;
                }
            };

            self.position = self.pulled;
            self.pulled += 1;
            self.record_failed = false;
            trace!(position = self.position, "Record pulled");

            let flow = drive(&mut chain.slots, 0, record, self);
            if self.record_failed {
                self.failed += 1;
            } else {
                self.completed += 1;
            }
            if flow.is_break() {
                return;
            }
        }
    }

    fn fail(
        &mut self,
        record: Record,
        stage_index: usize,
        stage_name: &str,
        kind: StageKind,
        error: &StageError,
    ) -> FailureAction {
        let action = decide(self.mode, self.policy, kind, error);
        self.record_failed = true;

        warn!(
            stage = stage_name,
            stage_index,
            position = self.position,
            error_kind = %error.kind,
            error = %error.message,
            "Record failed"
        );
        self.events.emit(
            "record.failed",
            Some(json!({
                "stage": stage_name,
                "stage_index": stage_index,
                "stage_kind": kind,
                "position": self.position,
                "error": error.message,
                "error_kind": error.kind,
            })),
        );

        let mut entry = ErrorRecord::new(record, self.position, stage_index, stage_name, kind, error);
        match action {
            FailureAction::Detach => {
                entry = entry.detached();
                warn!(emitter = stage_name, stage_index, "Emitter detached for the rest of the run");
                self.events.emit(
                    "emitter.detached",
                    Some(json!({
                        "emitter": stage_name,
                        "stage_index": stage_index,
                        "position": self.position,
                    })),
                );
            }
            FailureAction::Abort => {
                self.abort = Some(AbortInfo {
                    reason: AbortReason::StageFailure,
                    stage_index: Some(stage_index),
                    stage_name: stage_name.to_string(),
                    error: error.message.clone(),
                    position: self.position,
                });
            }
            FailureAction::Record => {}
        }

        if let Some(callback) = self.on_error.as_deref_mut() {
            callback(&entry);
        }
        if let Some(error_chain) = self.error_chain.as_deref_mut() {
            drain_error_stream(&mut error_chain.slots, entry.to_record());
        }
        self.collector.record(entry);
        action
    }
}

/// Drives one record through `slots`, whose first element sits at `index`
/// in the stage list.
fn drive(slots: &mut [Slot], index: usize, record: Record, run: &mut RunState<'_>) -> ControlFlow<()> {
    let Some((slot, rest)) = slots.split_first_mut() else {
        return ControlFlow::Continue(());
    };

    match slot {
        Slot::Filter(filter) => {
            // One clone per filter per record, kept for the error record.
            let input = record.clone();
            match filter.process(record) {
                Ok(outcome) => {
                    for child in outcome {
                        if drive(rest, index + 1, child, run).is_break() {
                            return ControlFlow::Break(());
                        }
                    }
                    ControlFlow::Continue(())
                }
                Err(err) => match run.fail(input, index, filter.name(), StageKind::Filter, &err) {
                    FailureAction::Abort => ControlFlow::Break(()),
                    FailureAction::Record | FailureAction::Detach => ControlFlow::Continue(()),
                },
            }
        }
        Slot::Emitters(emitters) => {
            let mut failed = false;
            for attached in emitters.iter_mut().filter(|a| !a.detached) {
                if let Err(err) = attached.emitter.emit(&record) {
                    failed = true;
                    let name = attached.emitter.name().to_string();
                    match run.fail(record.clone(), index, &name, StageKind::Emitter, &err) {
                        FailureAction::Abort => return ControlFlow::Break(()),
                        FailureAction::Detach => attached.detached = true,
                        FailureAction::Record => {}
                    }
                }
            }
            if failed {
                ControlFlow::Continue(())
            } else {
                drive(rest, index + 1, record, run)
            }
        }
    }
}

/// Drives an error record through the error stream. Failures here are
/// logged and go no further.
fn drain_error_stream(slots: &mut [Slot], record: Record) {
    let Some((slot, rest)) = slots.split_first_mut() else {
        return;
    };

    match slot {
        Slot::Filter(filter) => match filter.process(record) {
            Ok(outcome) => {
                for child in outcome {
                    drain_error_stream(rest, child);
                }
            }
            Err(err) => warn!(stage = filter.name(), error = %err, "Error stream filter failed"),
        },
        Slot::Emitters(emitters) => {
            let mut failed = false;
            for attached in emitters.iter_mut().filter(|a| !a.detached) {
                if let Err(err) = attached.emitter.emit(&record) {
                    failed = true;
                    warn!(emitter = attached.emitter.name(), error = %err, "Error stream emitter failed");
                    if err.fatal {
                        attached.detached = true;
                    }
                }
            }
            if !failed {
                drain_error_stream(rest, record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::sources::IterSource;
    use crate::stages::emitters::CollectingEmitter;
    use crate::stages::{FnFilter, NoOpFilter};

    fn records(n: i64) -> Vec<Record> {
        (0..n).map(|i| Record::new().with("n", i)).collect()
    }

    #[test]
    fn test_build_requires_emitter() {
        let err = Recipe::builder("empty").filter(NoOpFilter::new("noop")).build().unwrap_err();
        assert_eq!(err.code(), Some("RECIPE-NO-EMITTER"));
    }

    #[test]
    fn test_build_rejects_empty_fan_out() {
        let err = Recipe::builder("r")
            .emitter(CollectingEmitter::default())
            .fan_out(Vec::new())
            .build()
            .unwrap_err();
        assert_eq!(err.code(), Some("RECIPE-EMPTY-FANOUT"));
    }

    #[test]
    fn test_build_rejects_error_stream_without_emitter() {
        let err = Recipe::builder("r")
            .emitter(CollectingEmitter::default())
            .error_stream(Chain::new().filter(NoOpFilter::new("noop")))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), Some("RECIPE-EMPTY-ERROR-STREAM"));
    }

    #[test]
    fn test_build_rejects_empty_name() {
        let err = Recipe::builder("").emitter(CollectingEmitter::default()).build().unwrap_err();
        assert_eq!(err.code(), Some("RECIPE-INVALID-CONFIG"));
    }

    #[test]
    fn test_run_completes_and_reports() {
        let sink = CollectingEmitter::default();
        let out = sink.handle();
        let events = Arc::new(CollectingEventSink::new());
        let mut recipe = Recipe::builder("numbers")
            .emitter(sink)
            .event_sink(events.clone())
            .build()
            .unwrap();
        assert_eq!(recipe.state(), RecipeState::NotStarted);

        let report = recipe.run(IterSource::new(records(3)));

        assert_eq!(recipe.state(), RecipeState::Completed);
        assert!(report.is_clean());
        assert_eq!(report.recipe, "numbers");
        assert_eq!(report.records_pulled, 3);
        assert_eq!(report.records_completed, 3);
        assert_eq!(out.len(), 3);
        assert_eq!(events.event_types(), vec!["recipe.started", "recipe.completed"]);
    }

    #[test]
    fn test_drop_counts_as_completed() {
        let sink = CollectingEmitter::default();
        let out = sink.handle();
        let mut recipe = Recipe::builder("r")
            .filter(FnFilter::retain("odd", |r| r.get("n").and_then(crate::core::Value::as_i64).is_some_and(|n| n % 2 == 1)))
            .emitter(sink)
            .build()
            .unwrap();

        let report = recipe.run(IterSource::new(records(4)));
        assert_eq!(report.records_completed, 4);
        assert_eq!(report.records_failed, 0);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_run_recipe_convenience() {
        let sink = CollectingEmitter::default();
        let out = sink.handle();
        let report = run_recipe(IterSource::new(records(2)), Chain::new().emitter(sink)).unwrap();
        assert!(report.is_completed());
        assert_eq!(out.len(), 2);

        let err = run_recipe(IterSource::new(records(2)), Chain::new()).unwrap_err();
        assert!(matches!(err, SluiceError::Validation(_)));
    }

    #[test]
    fn test_stages_describe_recipe() {
        let recipe = Recipe::builder("r")
            .filter(NoOpFilter::new("noop"))
            .emitter(CollectingEmitter::new("out"))
            .build()
            .unwrap();
        let stages = recipe.stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].kind, StageKind::Emitter);
        assert_eq!(recipe.name(), "r");
    }
}
