use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};

/// Generate shell completion scripts.
///
/// Make sure to restart your shell before testing whether completions are
/// working. The exact config file locations might vary based on your system.
///
/// ### bash
///
/// First, ensure that you install `bash-completion` using your package manager.
///
/// After, add this to your `~/.bash_profile`:
///
///         eval "$(shotty completion -s bash)"
///
/// ### zsh
/// Generate a `_shotty` completion script and put it somewhere in your `$fpath`:
///
///         shotty completion -s zsh > /usr/local/share/zsh/site-functions/_shotty
///
/// Ensure that the following is present in your `~/.zshrc`:
///         autoload -U compinit
///         compinit -i
///
/// ### fish
///
/// Generate a `shotty.fish` completion script:
///
///         shotty completion -s fish > ~/.config/fish/completions/shotty.fish
///
/// ### PowerShell
///
/// Add this line to your profile script:
///
/// Invoke-Expression -Command $(shotty completion -s powershell | Out-String)
#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct CmdCompletion {
    /// Shell type: {bash|zsh|fish|powershell|elvish}
    #[clap(short, long, default_value = "bash")]
    pub shell: Shell,
}

#[async_trait::async_trait]
impl crate::cmd::Command for CmdCompletion {
    async fn run(&self, ctx: &mut crate::context::Context<'_>) -> Result<()> {
        let mut cmd = crate::Opts::command();
        let name = cmd.get_name().to_string();
        generate(self.shell, &mut cmd, name, &mut ctx.io.out);

        Ok(())
    }
}
