use std::io::Write;

use anyhow::{Context as _, Result};
use clap::Parser;
use futures::TryStreamExt;

use crate::{provider::retry, query::find_instances, types::Volume};

/// List the volumes attached to instances.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdVolume {
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug, Clone)]
enum SubCommand {
    List(CmdVolumeList),
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdVolume {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        match &self.subcmd {
            SubCommand::List(cmd) => cmd.run(ctx).await,
        }
    }
}

/// List volumes.
///
/// Prints one line per volume: id, instance, state, size and whether the
/// volume is encrypted.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdVolumeList {
    /// Only volumes of instances whose `Project` tag is exactly this value.
    #[clap(long, short)]
    pub project: Option<String>,

    /// Output JSON.
    #[clap(long)]
    pub json: bool,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdVolumeList {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        let provider = ctx.provider()?;
        let retry_policy = ctx.retry_policy()?;
        let mut instances = find_instances(provider.clone(), retry_policy.clone(), self.project.as_deref(), None)?;

        let cs = ctx.io.color_scheme();
        let mut all: Vec<Volume> = Vec::new();
        while let Some(instance) = instances.try_next().await? {
            let volumes = retry(&retry_policy, || provider.list_volumes(&instance.id))
                .await
                .with_context(|| format!("listing volumes of {} failed", instance.id))?;

            if self.json {
                all.extend(volumes);
                continue;
            }

            for volume in volumes {
                writeln!(
                    ctx.io.out,
                    "{}, {}, {}, {}GiB, {}",
                    volume.id,
                    volume.instance_id,
                    cs.volume_state(&volume.state),
                    volume.size_gib,
                    if volume.encrypted { "Encrypted" } else { "Not Encrypted" }
                )?;
            }
        }

        if self.json {
            ctx.io.write_json(&serde_json::json!(all))?;
        }

        Ok(())
    }
}
