use anyhow::{anyhow, Result};

// This type implements a Config interface and represents the config files on disk.
#[derive(Debug, Clone)]
pub struct FileConfig {
    pub map: crate::config_map::ConfigMap,
}

#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub map: crate::config_map::ConfigMap,
    pub name: String,
}

impl FileConfig {
    fn get_profiles_table(&self) -> Result<toml_edit::Table> {
        match self.map.root.get("profiles") {
            Some(profiles) => match profiles.as_table() {
                Some(t) => Ok(t.clone()),
                None => Err(anyhow!("profiles is not a table")),
            },
            None => Ok(toml_edit::Table::new()),
        }
    }

    fn get_profile_entries(&self) -> Result<Vec<ProfileConfig>> {
        let profiles_table = self.get_profiles_table()?;

        Ok(profiles_table
            .iter()
            .map(|(name, v)| {
                let root = match v {
                    toml_edit::Item::Table(t) => t.clone(),
                    _ => toml_edit::Table::new(),
                };

                ProfileConfig {
                    map: crate::config_map::ConfigMap { root },
                    name: name.to_string(),
                }
            })
            .collect())
    }

    fn get_profile_config(&self, name: &str) -> Result<ProfileConfig> {
        self.get_profile_entries()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| anyhow!("profile {} not found", name))
    }

    fn default_value(key: &str) -> Result<String> {
        match crate::config::find_option(key) {
            Some(option) => Ok(option.default_value),
            None => Err(anyhow!("Key '{}' not found", key)),
        }
    }
}

impl crate::config::Config for FileConfig {
    fn get(&self, profile: &str, key: &str) -> Result<String> {
        let (val, _) = self.get_with_source(profile, key)?;
        Ok(val)
    }

    fn get_with_source(&self, profile: &str, key: &str) -> Result<(String, String)> {
        if !crate::config::is_profile_key(key) {
            let default_source = crate::config_file::config_file()?;
            return match self.map.get_string_value(key) {
                Ok(value) => Ok((value, default_source)),
                Err(e) if e.to_string().contains("not found") => Ok((Self::default_value(key)?, "default".to_string())),
                Err(e) => Err(e),
            };
        }

        if profile.is_empty() {
            return Err(anyhow!("{} is set per profile, but no profile was given", key));
        }

        let profiles_source = crate::config_file::profiles_file()?;
        let profile_config = self.get_profile_config(profile)?;
        let value = profile_config.map.get_string_value(key)?;

        Ok((value, profiles_source))
    }

    fn set(&mut self, profile: &str, key: &str, value: &str) -> Result<()> {
        if !crate::config::is_profile_key(key) {
            return self.map.set_string_value(key, value);
        }

        if profile.is_empty() {
            return Err(anyhow!("{} is set per profile, but no profile was given", key));
        }

        let mut profiles_table = self.get_profiles_table()?;

        // Only one profile can be the default.
        if key == "default" && value == "true" {
            for mut other in self.get_profile_entries()? {
                if other.name != profile && other.map.get_bool_value("default").unwrap_or(false) {
                    other.map.remove_entry("default");
                    profiles_table.insert(&other.name, toml_edit::Item::Table(other.map.root));
                }
            }
        }

        let mut profile_config = self.get_profile_config(profile).unwrap_or_else(|_| ProfileConfig {
            map: crate::config_map::ConfigMap::default(),
            name: profile.to_string(),
        });
        profile_config.map.set_string_value(key, value)?;

        profiles_table.insert(profile, toml_edit::Item::Table(profile_config.map.root));
        self.map.root.insert("profiles", toml_edit::Item::Table(profiles_table));

        Ok(())
    }

    fn profiles(&self) -> Result<Vec<String>> {
        Ok(self.get_profiles_table()?.iter().map(|(name, _)| name.to_string()).collect())
    }

    fn default_profile(&self) -> Result<String> {
        let (profile, _) = self.default_profile_with_source()?;
        Ok(profile)
    }

    fn default_profile_with_source(&self) -> Result<(String, String)> {
        let profiles = self.profiles()?;

        if profiles.is_empty() {
            return Err(anyhow!(
                "No profiles found, set one up with `shotty config set host <HOST>` and `shotty config set token <TOKEN>`"
            ));
        }

        let profiles_source = crate::config_file::profiles_file()?;

        if profiles.len() == 1 {
            return Ok((profiles[0].to_string(), profiles_source));
        }

        for profile_config in self.get_profile_entries()? {
            if profile_config.map.get_bool_value("default")? {
                return Ok((profile_config.name, profiles_source));
            }
        }

        Err(anyhow!(
            "No profile has been set as default, pick one with `shotty --profile <NAME> config set default true`"
        ))
    }

    fn check_writable(&self, _profile: &str, _key: &str) -> Result<()> {
        let dir = crate::config_file::config_dir()?;
        let path = std::path::Path::new(&dir);
        if path.exists() {
            let metadata = std::fs::metadata(path)?;
            if metadata.permissions().readonly() {
                return Err(anyhow!("config directory {} is read-only", dir));
            }
        }

        Ok(())
    }

    fn write(&self) -> Result<()> {
        let config_filename = crate::config_file::config_file()?;
        let content = self.config_to_string()?;
        crate::config_file::write_config_file(&config_filename, &content)?;

        let profiles_filename = crate::config_file::profiles_file()?;
        let content = self.profiles_to_string()?;
        crate::config_file::write_config_file(&profiles_filename, &content)
    }

    fn config_to_string(&self) -> Result<String> {
        // The profiles live in their own file.
        let mut map = self.map.clone();
        map.remove_entry("profiles");

        let doc: toml_edit::Document = map.root.into();

        Ok(doc.to_string().trim().to_string())
    }

    fn profiles_to_string(&self) -> Result<String> {
        let doc: toml_edit::Document = self.get_profiles_table()?.into();

        Ok(doc.to_string().trim().to_string())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::config::Config;

    fn config(s: &str) -> super::FileConfig {
        crate::config::new_config(s.parse::<toml_edit::Document>().unwrap())
    }

    #[test]
    fn test_general_keys_fall_back_to_defaults() {
        let c = config("wait_timeout = \"30\"\n");

        assert_eq!(c.get("", "wait_timeout").unwrap(), "30");
        assert_eq!(c.get("", "max_retries").unwrap(), "3");
        assert_eq!(c.get_with_source("", "color").unwrap().1, "default");
        assert!(c.get("", "pager").is_err());
    }

    #[test]
    fn test_profile_keys() {
        let mut c = config("");
        c.set("prod", "host", "api.example.com").unwrap();
        c.set("prod", "token", "secret").unwrap();

        assert_eq!(c.get("prod", "host").unwrap(), "api.example.com");
        assert_eq!(c.get("prod", "token").unwrap(), "secret");
        assert!(c.get("prod", "region").is_err());
        assert!(c.get("staging", "host").is_err());
        assert!(c.get("", "host").is_err());
        assert_eq!(c.profiles().unwrap(), vec!["prod".to_string()]);
    }

    #[test]
    fn test_default_profile() {
        let mut c = config("");
        assert!(c.default_profile().is_err());

        c.set("prod", "host", "api.example.com").unwrap();
        assert_eq!(c.default_profile().unwrap(), "prod");

        c.set("staging", "host", "staging.example.com").unwrap();
        assert_eq!(
            c.default_profile().unwrap_err().to_string(),
            "No profile has been set as default, pick one with `shotty --profile <NAME> config set default true`"
        );

        c.set("staging", "default", "true").unwrap();
        assert_eq!(c.default_profile().unwrap(), "staging");

        // Moving the default clears it from the old profile.
        c.set("prod", "default", "true").unwrap();
        assert_eq!(c.default_profile().unwrap(), "prod");
        assert_eq!(c.get("staging", "default").is_err(), true);
    }

    #[test]
    fn test_to_string_splits_profiles() {
        let mut c = config("color = \"disabled\"\n");
        c.set("prod", "host", "api.example.com").unwrap();

        assert_eq!(c.config_to_string().unwrap(), "color = \"disabled\"");
        assert_eq!(c.profiles_to_string().unwrap(), "[prod]\nhost = \"api.example.com\"");
    }
}
