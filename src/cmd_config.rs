use std::io::Write;

use anyhow::{anyhow, Result};
use clap::Parser;

/// Manage configuration for shotty.
///
/// General settings apply to every profile. The host, token, region and
/// default keys belong to a profile: the one named with `--profile`, or the
/// default profile.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdConfig {
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug, Clone)]
enum SubCommand {
    Get(CmdConfigGet),
    Set(CmdConfigSet),
    List(CmdConfigList),
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdConfig {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        match &self.subcmd {
            SubCommand::Get(cmd) => cmd.run(ctx).await,
            SubCommand::Set(cmd) => cmd.run(ctx).await,
            SubCommand::List(cmd) => cmd.run(ctx).await,
        }
    }
}

/// The profile per-profile keys are read from and written to. With no
/// profiles at all, the first one is called "default".
fn target_profile(ctx: &crate::context::Context<'_>) -> Result<String> {
    match ctx.profile() {
        Ok(profile) => Ok(profile),
        Err(err) => {
            if ctx.config.profiles()?.is_empty() {
                Ok(crate::config_from_env::ENV_PROFILE.to_string())
            } else {
                Err(err)
            }
        }
    }
}

fn profile_for_key(ctx: &crate::context::Context<'_>, key: &str) -> Result<String> {
    if crate::config::is_profile_key(key) {
        target_profile(ctx)
    } else {
        Ok("".to_string())
    }
}

fn unknown_key(key: &str, icon: &str) -> anyhow::Error {
    let prefix = if icon.is_empty() { "".to_string() } else { format!("{} ", icon) };
    anyhow!(
        "{}'{}' is not a known configuration key, known keys are:\n{}",
        prefix,
        key,
        crate::config::known_keys()
    )
}

/// Print the value of a given configuration key.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdConfigGet {
    #[clap(name = "key", required = true)]
    key: String,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdConfigGet {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        crate::config::validate_key(&self.key).map_err(|_| unknown_key(&self.key, ""))?;

        let profile = profile_for_key(ctx, &self.key)?;
        let value = ctx.config.get(&profile, &self.key)?;
        writeln!(ctx.io.out, "{}", value)?;

        Ok(())
    }
}

/// Update configuration with a value for the given key.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdConfigSet {
    #[clap(name = "key", required = true)]
    key: String,

    #[clap(name = "value", required = true)]
    value: String,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdConfigSet {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        let cs = ctx.io.color_scheme();

        if crate::config::validate_key(&self.key).is_err() {
            return Err(unknown_key(&self.key, &cs.failure_icon()));
        }
        crate::config::validate_value(&self.key, &self.value)?;

        let profile = profile_for_key(ctx, &self.key)?;
        ctx.config.check_writable(&profile, &self.key)?;
        ctx.config.set(&profile, &self.key, &self.value)?;
        ctx.config.write()?;

        log::debug!("set {} for profile {:?}", self.key, profile);

        Ok(())
    }
}

/// Print a list of configuration keys and values.
///
/// Per-profile keys are shown for the selected profile. The token is masked.
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdConfigList {}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdConfigList {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        let profile = ctx.profile().ok();

        for option in crate::config::config_options() {
            let value = if option.per_profile {
                match &profile {
                    Some(p) => match ctx.config.get(p, &option.key) {
                        Ok(v) => v,
                        Err(_) => continue,
                    },
                    None => continue,
                }
            } else {
                ctx.config.get("", &option.key)?
            };

            let value = if option.key == "token" && !value.is_empty() {
                "********".to_string()
            } else {
                value
            };

            writeln!(ctx.io.out, "{}={}", option.key, value)?;
        }

        Ok(())
    }
}
