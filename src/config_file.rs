use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};

const SHOTTY_CONFIG_DIR: &str = "SHOTTY_CONFIG_DIR";
const XDG_CONFIG_HOME: &str = "XDG_CONFIG_HOME";

// Config path precedence
// 1. SHOTTY_CONFIG_DIR
// 2. XDG_CONFIG_HOME
// 3. HOME
pub fn config_dir() -> Result<String> {
    let path: PathBuf;

    let shotty_config_dir = get_env_var(SHOTTY_CONFIG_DIR);
    let xdg_config_home = get_env_var(XDG_CONFIG_HOME);

    if !shotty_config_dir.is_empty() {
        path = Path::new(&shotty_config_dir).to_path_buf();
    } else if !xdg_config_home.is_empty() {
        path = Path::new(&xdg_config_home).join("shotty");
    } else {
        match dirs::home_dir() {
            Some(home) => {
                path = home.join(".config").join("shotty");
            }
            None => {
                return Err(anyhow!("could not find home directory"));
            }
        }
    }

    path_to_string(&path)
}

pub fn config_file() -> Result<String> {
    let config_dir = config_dir()?;
    path_to_string(&Path::new(&config_dir).join("config.toml"))
}

pub fn profiles_file() -> Result<String> {
    let config_dir = config_dir()?;
    path_to_string(&Path::new(&config_dir).join("profiles.toml"))
}

fn path_to_string(path: &Path) -> Result<String> {
    match path.to_str() {
        None => Err(anyhow!("path is not a valid UTF-8 sequence")),
        Some(s) => Ok(s.to_string()),
    }
}

pub fn parse_default_config() -> Result<crate::config_from_file::FileConfig> {
    let config_file_path = config_file()?;

    // A missing config file means the defaults.
    let path = Path::new(&config_file_path);
    let mut root = if !path.exists() {
        crate::config::new_blank_root()?
    } else {
        let contents = read_config_file(&config_file_path)?;
        contents
            .parse::<toml_edit::Document>()
            .with_context(|| format!("failed to parse {}", config_file_path))?
    };

    let profiles_file_path = profiles_file()?;
    let path = Path::new(&profiles_file_path);
    if path.exists() {
        let contents = read_config_file(&profiles_file_path)?;
        let doc = contents
            .parse::<toml_edit::Document>()
            .with_context(|| format!("failed to parse {}", profiles_file_path))?;
        let profiles = doc.as_table().clone();
        root.insert("profiles", toml_edit::Item::Table(profiles));
    }

    log::debug!("loaded config from {}", config_dir()?);

    Ok(crate::config::new_config(root))
}

fn read_config_file(filename: &str) -> Result<String> {
    fs::read_to_string(filename).with_context(|| format!("failed to read from {}", filename))
}

pub fn write_config_file(filename: &str, data: &str) -> Result<()> {
    let path = Path::new(filename);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let mut file = fs::File::create(filename).with_context(|| format!("failed to create {}", filename))?;
    file.write_all(data.as_bytes())
        .with_context(|| format!("failed to write to {}", filename))
}

pub fn get_env_var(key: &str) -> String {
    match env::var(key) {
        Ok(val) => val,
        Err(_) => "".to_string(),
    }
}
