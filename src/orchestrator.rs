use std::{io::Write, sync::Arc, time::Duration};

use futures::{Stream, TryStreamExt};
use parse_display::Display;
use thiserror::Error;
use tokio::sync::watch;

use crate::{
    provider::{retry, Provider, ProviderError, RetryPolicy},
    query::QueryError,
    snapshots::has_pending_snapshot,
    types::{Instance, InstanceState, Volume, SNAPSHOT_DESCRIPTION},
};

/// A lifecycle call we make against an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum Transition {
    Start,
    Stop,
}

/// A unit of work that did not go through. None of these abort the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("Could not {transition} {instance_id}: {source}")]
    StateTransition {
        instance_id: String,
        transition: Transition,
        source: ProviderError,
    },
    #[error("Could not confirm {instance_id} is {target}: {source}")]
    Wait {
        instance_id: String,
        target: InstanceState,
        source: ProviderError,
    },
    #[error("Timed out waiting for {instance_id} to be {target}")]
    WaitTimedOut { instance_id: String, target: InstanceState },
    #[error("Could not list volumes of {instance_id}: {source}")]
    VolumeQuery { instance_id: String, source: ProviderError },
    #[error("Could not check snapshots of {volume_id}: {source}")]
    SnapshotCheck { volume_id: String, source: ProviderError },
    #[error("Could not create snapshot of {volume_id}: {source}")]
    SnapshotCreate { volume_id: String, source: ProviderError },
}

/// What happened to one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stopped { instance_id: String },
    Started { instance_id: String },
    SnapshotCreated { volume_id: String, snapshot_id: String },
    /// The volume already had a snapshot in flight.
    Skipped { volume_id: String },
    Failed(UnitError),
}

/// The outcomes of one run, in the order they happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
    pub cancelled: bool,
}

impl Report {
    pub fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitError> {
        self.outcomes.iter().filter_map(|o| match o {
            Outcome::Failed(err) => Some(err),
            _ => None,
        })
    }

    /// True if every unit of work went through and the run was not cut
    /// short. Skips count as success.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failures().next().is_none()
    }
}

/// A fatal error that stops the whole run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Fires the matching `Cancellation` tokens.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// A cooperative cancellation flag. The orchestrator checks it between
/// instances, between volumes, and while waiting.
#[derive(Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    pub fn new() -> (CancelHandle, Cancellation) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Cancellation { rx })
    }

    /// A token that is never cancelled.
    pub fn never() -> Cancellation {
        let (_, cancel) = Cancellation::new();
        cancel
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle is gone.
    pub async fn cancelled(&mut self) {
        loop {
            let cancelled = *self.rx.borrow();
            if cancelled {
                return;
            }
            if self.rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

/// How long to wait for an instance to settle, and how often to look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        WaitOptions {
            timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Reached,
    TimedOut,
    Cancelled,
}

/// Polls the instance until it reports `target`, the timeout passes, or the
/// run is cancelled.
pub async fn wait_for_state(
    provider: &dyn Provider,
    retry_policy: &RetryPolicy,
    instance_id: &str,
    target: InstanceState,
    options: &WaitOptions,
    cancel: &Cancellation,
) -> Result<WaitOutcome, ProviderError> {
    let deadline = tokio::time::Instant::now() + options.timeout;
    let mut cancel = cancel.clone();

    loop {
        // Retries of a throttled describe count against the same deadline.
        let described = tokio::select! {
            _ = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
            described = tokio::time::timeout_at(
                deadline,
                retry(retry_policy, || provider.describe_instance(instance_id)),
            ) => described,
        };
        let instance = match described {
            Ok(instance) => instance?,
            Err(_) => return Ok(WaitOutcome::TimedOut),
        };
        if instance.state == target {
            return Ok(WaitOutcome::Reached);
        }
        log::debug!("{} is {}, waiting for {}", instance_id, instance.state, target);

        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Ok(WaitOutcome::TimedOut);
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
            _ = tokio::time::sleep(options.poll_interval.min(deadline - now)) => {}
        }
    }
}

/// Drives instances through their lifecycle calls and the
/// stop, snapshot, start cycle.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    retry: RetryPolicy,
    wait: WaitOptions,
    cancel: Cancellation,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, retry: RetryPolicy, wait: WaitOptions, cancel: Cancellation) -> Self {
        Orchestrator {
            provider,
            retry,
            wait,
            cancel,
        }
    }

    /// Issues `transition` against every instance without waiting for it to
    /// take effect.
    pub async fn transition_all<S>(
        &self,
        mut instances: S,
        transition: Transition,
        out: &mut (dyn Write + Send),
    ) -> Result<Report, RunError>
    where
        S: Stream<Item = Result<Instance, QueryError>> + Unpin + Send,
    {
        let mut report = Report::default();

        while let Some(instance) = instances.try_next().await? {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            self.transition(&instance.id, transition, &mut report, out).await?;
        }

        Ok(report)
    }

    /// Stops each instance, snapshots its volumes and starts it again.
    pub async fn snapshot_all<S>(&self, mut instances: S, out: &mut (dyn Write + Send)) -> Result<Report, RunError>
    where
        S: Stream<Item = Result<Instance, QueryError>> + Unpin + Send,
    {
        let mut report = Report::default();

        while let Some(instance) = instances.try_next().await? {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            self.snapshot_instance(&instance, &mut report, out).await?;
        }

        if report.cancelled {
            writeln!(out, "Cancelled, remaining instances were not touched.")?;
        } else {
            writeln!(out, "Job done!")?;
        }

        Ok(report)
    }

    async fn snapshot_instance(
        &self,
        instance: &Instance,
        report: &mut Report,
        out: &mut (dyn Write + Send),
    ) -> Result<(), RunError> {
        if !self.transition(&instance.id, Transition::Stop, report, out).await? {
            // We never touch volumes of an instance we could not stop, and we
            // leave its state alone.
            return Ok(());
        }

        if self.settle(&instance.id, InstanceState::Stopped, report, out).await? {
            self.snapshot_volumes(instance, report, out).await?;
        }

        if self.transition(&instance.id, Transition::Start, report, out).await? && !self.cancel.is_cancelled() {
            self.settle(&instance.id, InstanceState::Running, report, out).await?;
        }

        Ok(())
    }

    async fn snapshot_volumes(
        &self,
        instance: &Instance,
        report: &mut Report,
        out: &mut (dyn Write + Send),
    ) -> Result<(), RunError> {
        let volumes = match retry(&self.retry, || self.provider.list_volumes(&instance.id)).await {
            Ok(volumes) => volumes,
            Err(source) => {
                return fail(
                    report,
                    out,
                    UnitError::VolumeQuery {
                        instance_id: instance.id.to_string(),
                        source,
                    },
                );
            }
        };

        for volume in volumes {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            self.snapshot_volume(&volume, report, out).await?;
        }

        Ok(())
    }

    async fn snapshot_volume(
        &self,
        volume: &Volume,
        report: &mut Report,
        out: &mut (dyn Write + Send),
    ) -> Result<(), RunError> {
        match has_pending_snapshot(self.provider.as_ref(), &self.retry, volume).await {
            Ok(true) => {
                writeln!(out, "Skipping {}, snapshot already in progress", volume.id)?;
                report.push(Outcome::Skipped {
                    volume_id: volume.id.to_string(),
                });
                return Ok(());
            }
            Ok(false) => {}
            Err(source) => {
                return fail(
                    report,
                    out,
                    UnitError::SnapshotCheck {
                        volume_id: volume.id.to_string(),
                        source,
                    },
                );
            }
        }

        writeln!(out, "Creating snapshot of {}", volume.id)?;

        // One token for every attempt, so a retried create is not a second
        // snapshot.
        let client_token = uuid::Uuid::new_v4().to_string();
        let created = retry(&self.retry, || {
            self.provider
                .create_snapshot(&volume.id, SNAPSHOT_DESCRIPTION, &client_token)
        })
        .await;

        match created {
            Ok(snapshot) => {
                log::debug!("created snapshot {} of {}", snapshot.id, volume.id);
                report.push(Outcome::SnapshotCreated {
                    volume_id: volume.id.to_string(),
                    snapshot_id: snapshot.id,
                });
                Ok(())
            }
            Err(source) => fail(
                report,
                out,
                UnitError::SnapshotCreate {
                    volume_id: volume.id.to_string(),
                    source,
                },
            ),
        }
    }

    /// Issues a start or stop call. Returns whether the provider accepted it.
    async fn transition(
        &self,
        instance_id: &str,
        transition: Transition,
        report: &mut Report,
        out: &mut (dyn Write + Send),
    ) -> Result<bool, RunError> {
        let result = match transition {
            Transition::Start => {
                writeln!(out, "Starting {}", instance_id)?;
                retry(&self.retry, || self.provider.start_instance(instance_id)).await
            }
            Transition::Stop => {
                writeln!(out, "Stopping {}", instance_id)?;
                retry(&self.retry, || self.provider.stop_instance(instance_id)).await
            }
        };

        match result {
            Ok(()) => {
                report.push(match transition {
                    Transition::Start => Outcome::Started {
                        instance_id: instance_id.to_string(),
                    },
                    Transition::Stop => Outcome::Stopped {
                        instance_id: instance_id.to_string(),
                    },
                });
                Ok(true)
            }
            Err(source) => {
                fail(
                    report,
                    out,
                    UnitError::StateTransition {
                        instance_id: instance_id.to_string(),
                        transition,
                        source,
                    },
                )?;
                Ok(false)
            }
        }
    }

    /// Waits for the instance to reach `target`. Returns whether it did.
    async fn settle(
        &self,
        instance_id: &str,
        target: InstanceState,
        report: &mut Report,
        out: &mut (dyn Write + Send),
    ) -> Result<bool, RunError> {
        let outcome = wait_for_state(
            self.provider.as_ref(),
            &self.retry,
            instance_id,
            target,
            &self.wait,
            &self.cancel,
        )
        .await;

        match outcome {
            Ok(WaitOutcome::Reached) => Ok(true),
            Ok(WaitOutcome::Cancelled) => {
                report.cancelled = true;
                Ok(false)
            }
            Ok(WaitOutcome::TimedOut) => {
                fail(
                    report,
                    out,
                    UnitError::WaitTimedOut {
                        instance_id: instance_id.to_string(),
                        target,
                    },
                )?;
                Ok(false)
            }
            Err(source) => {
                fail(
                    report,
                    out,
                    UnitError::Wait {
                        instance_id: instance_id.to_string(),
                        target,
                        source,
                    },
                )?;
                Ok(false)
            }
        }
    }
}

fn fail(report: &mut Report, out: &mut (dyn Write + Send), err: UnitError) -> Result<(), RunError> {
    log::debug!("unit of work failed: {:?}", err);
    writeln!(out, "{}", err)?;
    report.push(Outcome::Failed(err));
    Ok(())
}
