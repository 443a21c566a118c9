use std::io::Write;

use anyhow::{Context as _, Result};
use clap::Parser;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::{
    provider::retry,
    query::find_instances,
    snapshots::most_recent_view,
    types::Snapshot,
};

/// List volume snapshots.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdSnapshot {
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug, Clone)]
enum SubCommand {
    List(CmdSnapshotList),
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdSnapshot {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        match &self.subcmd {
            SubCommand::List(cmd) => cmd.run(ctx).await,
        }
    }
}

/// A snapshot together with the instance its volume belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// The snapshot itself.
    #[serde(flatten)]
    pub snapshot: Snapshot,
    /// The instance the snapshotted volume is attached to.
    pub instance_id: String,
}

/// List snapshots.
///
/// Snapshots are listed per volume, most recent first. Unless `--all` is
/// given, the listing of a volume stops at its newest completed snapshot.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdSnapshotList {
    /// Only snapshots of instances whose `Project` tag is exactly this value.
    #[clap(long, short)]
    pub project: Option<String>,

    /// List every snapshot, not just the most recent ones.
    #[clap(long)]
    pub all: bool,

    /// Output JSON.
    #[clap(long)]
    pub json: bool,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdSnapshotList {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        let provider = ctx.provider()?;
        let retry_policy = ctx.retry_policy()?;
        let mut instances = find_instances(provider.clone(), retry_policy.clone(), self.project.as_deref(), None)?;

        let cs = ctx.io.color_scheme();
        let now = chrono::Utc::now();
        let mut rows: Vec<SnapshotRow> = Vec::new();
        while let Some(instance) = instances.try_next().await? {
            let volumes = retry(&retry_policy, || provider.list_volumes(&instance.id))
                .await
                .with_context(|| format!("listing volumes of {} failed", instance.id))?;

            for volume in volumes {
                let snapshots = retry(&retry_policy, || provider.list_snapshots(&volume.id))
                    .await
                    .with_context(|| format!("listing snapshots of {} failed", volume.id))?;

                for snapshot in most_recent_view(snapshots, self.all) {
                    if self.json {
                        rows.push(SnapshotRow {
                            snapshot,
                            instance_id: instance.id.to_string(),
                        });
                        continue;
                    }

                    writeln!(
                        ctx.io.out,
                        "{}, {}, {}, {}, {}",
                        snapshot.id,
                        snapshot.volume_id,
                        instance.id,
                        cs.snapshot_state(&snapshot.state),
                        chrono_humanize::HumanTime::from(snapshot.start_time - now)
                    )?;
                }
            }
        }

        if self.json {
            ctx.io.write_json(&serde_json::json!(rows))?;
        }

        Ok(())
    }
}
