use std::io::Write;

use anyhow::Result;

pub struct IoStreams {
    pub out: Box<dyn std::io::Write + Send + Sync>,
    pub err_out: Box<dyn std::io::Write + Send + Sync>,

    color_enabled: bool,
    is_256_enabled: bool,
}

impl IoStreams {
    pub fn color_enabled(&self) -> bool {
        self.color_enabled
    }

    pub fn set_color_enabled(&mut self, color_enabled: bool) {
        self.color_enabled = color_enabled;
    }

    pub fn color_scheme(&self) -> crate::colors::ColorScheme {
        crate::colors::ColorScheme::new(self.color_enabled, self.is_256_enabled)
    }

    pub fn write_json(&mut self, json: &serde_json::Value) -> Result<()> {
        if self.color_enabled() {
            writeln!(self.out, "{}", colored_json::to_colored_json_auto(json)?)?;
        } else {
            writeln!(self.out, "{}", serde_json::to_string_pretty(json)?)?;
        }

        Ok(())
    }

    pub fn system() -> Self {
        let stdout_is_tty = atty::is(atty::Stream::Stdout);

        #[cfg(windows)]
        let mut assume_true_color = false;
        #[cfg(unix)]
        let assume_true_color = false;
        if stdout_is_tty {
            // On Windows 10 ANSI support has to be switched on first.
            #[cfg(windows)]
            if ansi_term::enable_ansi_support().is_ok() {
                assume_true_color = true;
            }

            #[cfg(windows)]
            let _ = colored_json::enable_ansi_support();
        }

        IoStreams {
            out: Box::new(std::io::stdout()),
            err_out: Box::new(std::io::stderr()),
            color_enabled: crate::colors::env_color_forced() || (!crate::colors::env_color_disabled() && stdout_is_tty),
            is_256_enabled: assume_true_color || crate::colors::is_256_color_supported(),
        }
    }

    #[cfg(test)]
    pub fn test() -> (Self, String, String) {
        let mut io = IoStreams::system();

        let (stdout, stdout_path) = tempfile::NamedTempFile::new().unwrap().keep().unwrap();
        let (stderr, stderr_path) = tempfile::NamedTempFile::new().unwrap().keep().unwrap();

        io.out = Box::new(stdout);
        io.err_out = Box::new(stderr);
        io.set_color_enabled(false);

        (
            io,
            stdout_path.into_os_string().into_string().unwrap(),
            stderr_path.into_os_string().into_string().unwrap(),
        )
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_write_json_plain() {
        let (mut io, stdout_path, _) = IoStreams::test();

        io.write_json(&serde_json::json!({"id": "i-1"})).unwrap();

        let stdout = std::fs::read_to_string(stdout_path).unwrap();
        assert_eq!(stdout, "{\n  \"id\": \"i-1\"\n}\n");
        assert!(!io.color_enabled());
    }
}
