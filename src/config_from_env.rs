use anyhow::{anyhow, Result};

const SHOTTY_HOST: &str = "SHOTTY_HOST";
const SHOTTY_TOKEN: &str = "SHOTTY_TOKEN";

/// The profile name used when credentials come only from the environment.
pub const ENV_PROFILE: &str = "default";

/// Layers `SHOTTY_HOST` and `SHOTTY_TOKEN` over another config. The
/// environment wins over whatever profile is in use.
pub struct EnvConfig<'a> {
    pub config: &'a mut (dyn crate::config::Config + 'a),
}

impl<'a> EnvConfig<'a> {
    pub fn inherit_env(config: &'a mut (dyn crate::config::Config + 'a)) -> Self {
        Self { config }
    }

    fn env_for_key(key: &str) -> Option<(String, &'static str)> {
        let var = match key {
            "host" => SHOTTY_HOST,
            "token" => SHOTTY_TOKEN,
            _ => return None,
        };

        let value = crate::config_file::get_env_var(var);
        if value.is_empty() {
            None
        } else {
            Some((value, var))
        }
    }
}

impl crate::config::Config for EnvConfig<'_> {
    fn get(&self, profile: &str, key: &str) -> Result<String> {
        let (val, _) = self.get_with_source(profile, key)?;
        Ok(val)
    }

    fn get_with_source(&self, profile: &str, key: &str) -> Result<(String, String)> {
        if let Some((value, var)) = Self::env_for_key(key) {
            return Ok((value, var.to_string()));
        }

        self.config.get_with_source(profile, key)
    }

    fn set(&mut self, profile: &str, key: &str, value: &str) -> Result<()> {
        self.config.set(profile, key, value)
    }

    fn profiles(&self) -> Result<Vec<String>> {
        let profiles = self.config.profiles()?;
        if profiles.is_empty() && Self::env_for_key("host").is_some() {
            return Ok(vec![ENV_PROFILE.to_string()]);
        }

        Ok(profiles)
    }

    fn default_profile(&self) -> Result<String> {
        let (profile, _) = self.default_profile_with_source()?;
        Ok(profile)
    }

    fn default_profile_with_source(&self) -> Result<(String, String)> {
        match self.config.default_profile_with_source() {
            Ok(v) => Ok(v),
            Err(e) => match Self::env_for_key("host") {
                Some((_, var)) => Ok((ENV_PROFILE.to_string(), var.to_string())),
                None => Err(e),
            },
        }
    }

    fn check_writable(&self, profile: &str, key: &str) -> Result<()> {
        if let Some((_, var)) = Self::env_for_key(key) {
            return Err(anyhow!("read-only value in {}", var));
        }

        self.config.check_writable(profile, key)
    }

    fn write(&self) -> Result<()> {
        self.config.write()
    }

    fn config_to_string(&self) -> Result<String> {
        self.config.config_to_string()
    }

    fn profiles_to_string(&self) -> Result<String> {
        self.config.profiles_to_string()
    }
}
