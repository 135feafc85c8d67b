//! Build loop of the development server.
//!
//! Runs the initial build, then one incremental cycle per batch of file
//! changes. A batch arriving while a cycle is running cancels it; the new
//! cycle covers the paths of both. Only successful cycles replace the served
//! output, so a broken edit never takes down the last good build.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use wisp_bundler::{BuildArtifacts, BuildError, Bundler, EmitOptions, HmrBatch, UpdateOutcome};
use wisp_graph::ModuleGraph;

use crate::dev::{CLIENT_SCRIPT, DevEvent, SharedState};
use crate::error::{CliError, Result};
use crate::ui;

pub struct DevBuilder {
    bundler: Arc<Bundler>,
    state: SharedState,
    emit: EmitOptions,
    /// Graph the next cycle starts from. Unlike the published snapshot it
    /// also reflects failed cycles, so broken modules are retried.
    working: Arc<ModuleGraph>,
}

/// What a finished cycle hands back to the loop.
struct CycleResult {
    cycle: u64,
    outcome: UpdateOutcome,
    artifacts: Option<wisp_bundler::Result<BuildArtifacts>>,
    batch: HmrBatch,
    elapsed_ms: u64,
}

struct InFlight {
    paths: Vec<PathBuf>,
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<Option<CycleResult>>,
}

impl DevBuilder {
    /// With `hot`, the HTML document loads the HMR client script.
    pub fn new(bundler: Arc<Bundler>, state: SharedState, hot: bool) -> Self {
        Self {
            bundler,
            state,
            emit: EmitOptions {
                hmr_client: hot.then(|| CLIENT_SCRIPT.to_string()),
                html_fallback: true,
            },
            working: Arc::new(ModuleGraph::new()),
        }
    }

    /// Build everything once. A failing build is recorded in the state, not
    /// returned: the server still starts and shows the overlay.
    pub async fn initial_build(&mut self) -> Result<()> {
        self.state.start_build();
        let started = Instant::now();
        let bundler = Arc::clone(&self.bundler);
        let emit = self.emit.clone();

        let (graph, warnings, result) = tokio::task::spawn_blocking(move || {
            let outcome = bundler.build();
            let result = if outcome.errors.is_empty() {
                bundler.emit(&outcome.graph, &emit).map_err(|e| vec![e.to_string()])
            } else {
                Err(messages(&outcome.errors))
            };
            (outcome.graph, outcome.warnings, result)
        })
        .await
        .map_err(join_error)?;

        for warning in &warnings {
            ui::warning(&warning.to_string());
        }
        let elapsed_ms = elapsed_ms(started);
        match result {
            Ok(artifacts) => {
                let files = artifacts.len();
                self.state.publish(graph, artifacts).map_err(|e| {
                    CliError::Server(format!("initial build was superseded: {e}"))
                })?;
                self.working = self.state.snapshot();
                self.state.complete_build(elapsed_ms);
                ui::success(&format!("Initial build completed in {elapsed_ms}ms ({files} files)"));
            }
            Err(errors) => {
                self.working = Arc::new(graph);
                report_failure(&errors);
                self.state.fail_build(errors);
            }
        }
        Ok(())
    }

    /// Process change batches until the channel closes.
    pub async fn run(mut self, mut changes: mpsc::Receiver<Vec<PathBuf>>) {
        let mut in_flight: Option<InFlight> = None;
        loop {
            // Newer changes are taken before a finished cycle is published.
            tokio::select! {
                biased;
                batch = changes.recv() => {
                    let Some(mut paths) = batch else {
                        break;
                    };
                    if let Some(previous) = in_flight.take() {
                        previous.cancel.store(true, Ordering::SeqCst);
                        tracing::debug!("superseding running cycle");
                        for path in previous.paths {
                            if !paths.contains(&path) {
                                paths.push(path);
                            }
                        }
                    }
                    if self.bundler.is_affected_by(&self.working, &paths) {
                        in_flight = Some(self.start(paths));
                    } else {
                        tracing::debug!(paths = paths.len(), "changes do not affect the build");
                    }
                }
                result = wait(&mut in_flight) => {
                    in_flight = None;
                    match result {
                        Ok(Some(result)) => self.finish(result),
                        Ok(None) => tracing::debug!("cycle cancelled"),
                        Err(e) => ui::error(&join_error(e).to_string()),
                    }
                }
            }
        }
    }

    fn start(&self, paths: Vec<PathBuf>) -> InFlight {
        let cycle = self.state.next_cycle();
        self.state.start_build();
        self.state.broadcast(&DevEvent::BuildStarted { cycle });
        for path in &paths {
            tracing::info!(path = %path.display(), "changed");
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let bundler = Arc::clone(&self.bundler);
        let base = Arc::clone(&self.working);
        let emit = self.emit.clone();
        let changed = paths.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let outcome = bundler.rebuild(&base, &changed, &flag)?;
            if flag.load(Ordering::SeqCst) {
                return None;
            }
            let artifacts = outcome
                .is_success()
                .then(|| bundler.emit(&outcome.rebuild.graph, &emit));
            let batch = bundler.hmr_batch(&outcome, cycle);
            Some(CycleResult {
                cycle,
                outcome,
                artifacts,
                batch,
                elapsed_ms: elapsed_ms(started),
            })
        });

        InFlight {
            paths,
            cancel,
            handle,
        }
    }

    fn finish(&mut self, result: CycleResult) {
        let CycleResult {
            cycle,
            outcome,
            artifacts,
            batch,
            elapsed_ms,
        } = result;
        let rebuild = outcome.rebuild;
        for warning in &rebuild.warnings {
            ui::warning(&warning.to_string());
        }

        let artifacts = match artifacts {
            Some(Ok(artifacts)) => artifacts,
            Some(Err(error)) => {
                self.working = Arc::new(rebuild.graph);
                self.fail(cycle, vec![error.to_string()]);
                return;
            }
            None => {
                self.working = Arc::new(rebuild.graph);
                self.fail(cycle, messages(&rebuild.errors));
                return;
            }
        };

        let output_changed = !same_output(&self.state.artifacts(), &artifacts);
        match self.state.publish(rebuild.graph, artifacts) {
            Ok(version) => {
                self.working = self.state.snapshot();
                self.state.complete_build(elapsed_ms);
                ui::success(&format!(
                    "Rebuilt {} module(s) in {elapsed_ms}ms",
                    batch.updates.len()
                ));
                tracing::debug!(cycle, version, "published");

                if !batch.is_empty() || batch.full_reload {
                    self.state.broadcast(&DevEvent::Update(batch));
                } else if output_changed {
                    self.state.broadcast(&DevEvent::FullReload {
                        reason: "output changed".to_string(),
                    });
                }
            }
            Err(e) => tracing::warn!(cycle, error = %e, "discarding outdated cycle"),
        }
    }

    fn fail(&self, cycle: u64, errors: Vec<String>) {
        report_failure(&errors);
        tracing::debug!(cycle, errors = errors.len(), "cycle failed");
        self.state.broadcast(&DevEvent::BuildFailed {
            errors: errors.clone(),
        });
        self.state.fail_build(errors);
    }
}

/// Resolves when the running cycle finishes; never when none runs.
async fn wait(
    in_flight: &mut Option<InFlight>,
) -> std::result::Result<Option<CycleResult>, JoinError> {
    match in_flight {
        Some(cycle) => (&mut cycle.handle).await,
        None => std::future::pending().await,
    }
}

fn messages(errors: &[BuildError]) -> Vec<String> {
    errors.iter().map(ToString::to_string).collect()
}

fn report_failure(errors: &[String]) {
    for error in errors {
        ui::error(error);
    }
    ui::error(&format!("Build failed with {} error(s)", errors.len()));
}

fn same_output(current: &BuildArtifacts, next: &BuildArtifacts) -> bool {
    current.len() == next.len()
        && next
            .files()
            .all(|(name, content)| current.get(name).is_some_and(|old| old == content))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn join_error(error: JoinError) -> CliError {
    CliError::Server(format!("build task failed: {error}"))
}
