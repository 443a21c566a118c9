use anyhow::Result;

/// A runnable command or subcommand.
#[async_trait::async_trait]
pub trait Command {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()>;
}
