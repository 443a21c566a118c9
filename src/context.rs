use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context as _, Result};

use crate::{
    api_client::{ApiClient, ApiCredentials},
    config::Config,
    orchestrator::{Cancellation, Orchestrator, WaitOptions},
    provider::{Provider, RetryPolicy},
};

pub struct Context<'a> {
    pub config: &'a mut (dyn Config + 'a),
    pub io: crate::iostreams::IoStreams,
    pub debug: bool,
    /// The profile picked with `--profile`, if any.
    pub profile: Option<String>,
    pub cancel: Cancellation,

    provider_override: Option<Arc<dyn Provider>>,
}

impl<'a> Context<'a> {
    pub fn new(config: &'a mut (dyn Config + 'a)) -> Context<'a> {
        let mut io = crate::iostreams::IoStreams::system();

        if let Ok(color) = config.get("", "color") {
            if color == "disabled" {
                io.set_color_enabled(false);
            }
        }

        Context {
            config,
            io,
            debug: false,
            profile: None,
            cancel: Cancellation::never(),
            provider_override: None,
        }
    }

    /// Talk to `provider` instead of the API of the configured profile.
    #[cfg(test)]
    pub fn set_provider(&mut self, provider: Arc<dyn Provider>) {
        self.provider_override = Some(provider);
    }

    /// The profile in use: `--profile`, then the default profile.
    pub fn profile(&self) -> Result<String> {
        match &self.profile {
            Some(p) if !p.is_empty() => Ok(p.to_string()),
            _ => self.config.default_profile(),
        }
    }

    pub fn provider(&self) -> Result<Arc<dyn Provider>> {
        if let Some(provider) = &self.provider_override {
            return Ok(provider.clone());
        }

        let profile = self.profile()?;
        let host = match self.config.get(&profile, "host") {
            Ok(host) if !host.is_empty() => host,
            _ => {
                return Err(anyhow!(
                    "no host configured for profile {}, set one with `shotty --profile {} config set host <HOST>`",
                    profile,
                    profile
                ))
            }
        };
        let token = self.config.get(&profile, "token").unwrap_or_default();
        let region = self.config.get(&profile, "region").ok().filter(|r| !r.is_empty());

        log::debug!("using profile {} against {}", profile, host);

        Ok(Arc::new(ApiClient::new(ApiCredentials { host, token, region })?))
    }

    fn get_u64(&self, key: &str) -> Result<u64> {
        let value = self.config.get("", key)?;
        value
            .parse::<u64>()
            .with_context(|| format!("{} must be a whole number, got {:?}", key, value))
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let max_retries = self.get_u64("max_retries")?;

        Ok(RetryPolicy {
            max_retries: u32::try_from(max_retries).unwrap_or(u32::MAX),
            ..Default::default()
        })
    }

    pub fn wait_options(&self) -> Result<WaitOptions> {
        Ok(WaitOptions {
            timeout: Duration::from_secs(self.get_u64("wait_timeout")?),
            poll_interval: Duration::from_secs(self.get_u64("poll_interval")?.max(1)),
        })
    }

    pub fn orchestrator(&self) -> Result<Orchestrator> {
        Ok(Orchestrator::new(
            self.provider()?,
            self.retry_policy()?,
            self.wait_options()?,
            self.cancel.clone(),
        ))
    }
}
