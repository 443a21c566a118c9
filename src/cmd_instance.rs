use std::io::Write;

use anyhow::{anyhow, Result};
use clap::Parser;
use futures::TryStreamExt;

use crate::{
    orchestrator::{Report, Transition},
    query::find_instances,
    types::Instance,
};

/// List, start, stop, and snapshot instances.
///
/// Instances are picked by their `Project` tag with `--project`, or by id
/// with `--instance`. Without either, every instance is used.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdInstance {
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug, Clone)]
enum SubCommand {
    List(CmdInstanceList),
    Start(CmdInstanceStart),
    Stop(CmdInstanceStop),
    Snapshots(CmdInstanceSnapshots),
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdInstance {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        match &self.subcmd {
            SubCommand::List(cmd) => cmd.run(ctx).await,
            SubCommand::Start(cmd) => cmd.run(ctx).await,
            SubCommand::Stop(cmd) => cmd.run(ctx).await,
            SubCommand::Snapshots(cmd) => cmd.run(ctx).await,
        }
    }
}

/// Which instances a command applies to.
#[derive(Parser, Debug, Clone, Default)]
pub struct InstanceFilter {
    /// Only instances whose `Project` tag is exactly this value.
    #[clap(long, short)]
    pub project: Option<String>,

    /// Only the instance with this id.
    #[clap(long, short, conflicts_with = "project")]
    pub instance: Option<String>,
}

/// Turns a batch report into the command result. Every failure has already
/// been printed by the time this runs.
pub fn check_report(report: &Report) -> Result<()> {
    if report.cancelled {
        return Err(anyhow!("cancelled"));
    }

    match report.failures().count() {
        0 => Ok(()),
        1 => Err(anyhow!("1 operation failed")),
        n => Err(anyhow!("{} operations failed", n)),
    }
}

/// List instances.
///
/// Prints one line per instance: id, state, availability zone, instance type,
/// public DNS name and project.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdInstanceList {
    #[clap(flatten)]
    filter: InstanceFilter,

    /// Output JSON.
    #[clap(long)]
    pub json: bool,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdInstanceList {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        let mut instances = find_instances(
            ctx.provider()?,
            ctx.retry_policy()?,
            self.filter.project.as_deref(),
            self.filter.instance.as_deref(),
        )?;

        if self.json {
            let instances: Vec<Instance> = instances.try_collect().await?;
            ctx.io.write_json(&serde_json::json!(instances))?;
            return Ok(());
        }

        let cs = ctx.io.color_scheme();
        while let Some(instance) = instances.try_next().await? {
            writeln!(
                ctx.io.out,
                "{}, {}, {}, {}, {}, {}",
                instance.id,
                cs.instance_state(&instance.state),
                instance.availability_zone,
                instance.instance_type,
                instance.public_dns.as_deref().unwrap_or(""),
                instance.project()
            )?;
        }

        Ok(())
    }
}

/// Start instances.
///
/// The start call is issued for every matching instance without waiting for
/// it to come up. A failure for one instance does not stop the others.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdInstanceStart {
    #[clap(flatten)]
    filter: InstanceFilter,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdInstanceStart {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        run_transition(ctx, &self.filter, Transition::Start).await
    }
}

/// Stop instances.
///
/// The stop call is issued for every matching instance without waiting for
/// it to go down. A failure for one instance does not stop the others.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdInstanceStop {
    #[clap(flatten)]
    filter: InstanceFilter,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdInstanceStop {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        run_transition(ctx, &self.filter, Transition::Stop).await
    }
}

async fn run_transition(
    ctx: &mut crate::context::Context<'_>,
    filter: &InstanceFilter,
    transition: Transition,
) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    let instances = find_instances(
        ctx.provider()?,
        ctx.retry_policy()?,
        filter.project.as_deref(),
        filter.instance.as_deref(),
    )?;

    let report = orchestrator
        .transition_all(instances, transition, ctx.io.out.as_mut())
        .await?;

    check_report(&report)
}

/// Snapshot the volumes of instances.
///
/// Each instance is stopped, every attached volume without a snapshot in
/// progress gets a new snapshot, and the instance is started again.
/// Instances are handled one at a time.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdInstanceSnapshots {
    #[clap(flatten)]
    filter: InstanceFilter,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdInstanceSnapshots {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        let orchestrator = ctx.orchestrator()?;
        let instances = find_instances(
            ctx.provider()?,
            ctx.retry_policy()?,
            self.filter.project.as_deref(),
            self.filter.instance.as_deref(),
        )?;

        let report = orchestrator.snapshot_all(instances, ctx.io.out.as_mut()).await?;

        check_report(&report)
    }
}
