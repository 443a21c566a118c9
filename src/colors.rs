use crate::{
    config_file::get_env_var,
    types::{InstanceState, SnapshotState, VolumeState},
};

pub fn env_color_disabled() -> bool {
    !get_env_var("NO_COLOR").is_empty() || get_env_var("CLICOLOR") == "0"
}

pub fn env_color_forced() -> bool {
    !get_env_var("CLICOLOR_FORCE").is_empty() && get_env_var("CLICOLOR_FORCE") != "0"
}

pub fn is_true_color_supported() -> bool {
    let term = get_env_var("TERM");
    let color_term = get_env_var("COLORTERM");

    term.contains("24bit")
        || term.contains("truecolor")
        || color_term.contains("24bit")
        || color_term.contains("truecolor")
}

pub fn is_256_color_supported() -> bool {
    let term = get_env_var("TERM");
    let color_term = get_env_var("COLORTERM");

    is_true_color_supported() || term.contains("256") || color_term.contains("256")
}

pub struct ColorScheme {
    enabled: bool,
    is_256_enabled: bool,
}

impl ColorScheme {
    pub fn new(enabled: bool, is_256_enabled: bool) -> Self {
        ColorScheme { enabled, is_256_enabled }
    }

    fn paint(&self, colour: ansi_term::Colour, t: &str) -> String {
        if !self.enabled {
            return t.to_string();
        }

        colour.paint(t).to_string()
    }

    pub fn red(&self, t: &str) -> String {
        self.paint(ansi_term::Colour::Red, t)
    }

    pub fn yellow(&self, t: &str) -> String {
        self.paint(ansi_term::Colour::Yellow, t)
    }

    pub fn green(&self, t: &str) -> String {
        self.paint(ansi_term::Colour::Green, t)
    }

    pub fn gray(&self, t: &str) -> String {
        if self.is_256_enabled {
            self.paint(ansi_term::Colour::Fixed(242), t)
        } else {
            self.paint(ansi_term::Colour::White, t)
        }
    }

    pub fn instance_state(&self, state: &InstanceState) -> String {
        let s = state.to_string();
        match state {
            InstanceState::Running => self.green(&s),
            InstanceState::Stopped => self.gray(&s),
            InstanceState::Terminated | InstanceState::ShuttingDown => self.red(&s),
            InstanceState::Pending | InstanceState::Stopping => self.yellow(&s),
        }
    }

    pub fn volume_state(&self, state: &VolumeState) -> String {
        let s = state.to_string();
        match state {
            VolumeState::Available | VolumeState::InUse => self.green(&s),
            VolumeState::Error => self.red(&s),
            VolumeState::Creating | VolumeState::Deleting | VolumeState::Deleted => self.yellow(&s),
        }
    }

    pub fn snapshot_state(&self, state: &SnapshotState) -> String {
        let s = state.to_string();
        match state {
            SnapshotState::Completed => self.green(&s),
            SnapshotState::Pending => self.yellow(&s),
            SnapshotState::Error => self.red(&s),
        }
    }

    pub fn failure_icon(&self) -> String {
        self.red("✘")
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use test_context::{test_context, TestContext};

    use super::*;

    struct Context {
        orig_no_color: Result<String, std::env::VarError>,
        orig_clicolor: Result<String, std::env::VarError>,
        orig_clicolor_force: Result<String, std::env::VarError>,
    }

    fn restore(key: &str, orig: &Result<String, std::env::VarError>) {
        if let Ok(ref val) = orig {
            std::env::set_var(key, val);
        } else {
            std::env::remove_var(key);
        }
    }

    impl TestContext for Context {
        fn setup() -> Context {
            Context {
                orig_no_color: std::env::var("NO_COLOR"),
                orig_clicolor: std::env::var("CLICOLOR"),
                orig_clicolor_force: std::env::var("CLICOLOR_FORCE"),
            }
        }

        fn teardown(self) {
            restore("NO_COLOR", &self.orig_no_color);
            restore("CLICOLOR", &self.orig_clicolor);
            restore("CLICOLOR_FORCE", &self.orig_clicolor_force);
        }
    }

    pub struct TestItem {
        name: String,
        no_color: String,
        clicolor: String,
        clicolor_force: String,
        want_disabled: bool,
        want_forced: bool,
    }

    #[test_context(Context)]
    #[test]
    #[serial_test::serial]
    fn test_env_color(_ctx: &mut Context) {
        let tests = vec![
            TestItem {
                name: "pristine env".to_string(),
                no_color: "".to_string(),
                clicolor: "".to_string(),
                clicolor_force: "".to_string(),
                want_disabled: false,
                want_forced: false,
            },
            TestItem {
                name: "NO_COLOR enabled".to_string(),
                no_color: "1".to_string(),
                clicolor: "".to_string(),
                clicolor_force: "".to_string(),
                want_disabled: true,
                want_forced: false,
            },
            TestItem {
                name: "CLICOLOR disabled".to_string(),
                no_color: "".to_string(),
                clicolor: "0".to_string(),
                clicolor_force: "".to_string(),
                want_disabled: true,
                want_forced: false,
            },
            TestItem {
                name: "CLICOLOR_FORCE enabled".to_string(),
                no_color: "".to_string(),
                clicolor: "".to_string(),
                clicolor_force: "1".to_string(),
                want_disabled: false,
                want_forced: true,
            },
            TestItem {
                name: "CLICOLOR_FORCE disabled".to_string(),
                no_color: "".to_string(),
                clicolor: "".to_string(),
                clicolor_force: "0".to_string(),
                want_disabled: false,
                want_forced: false,
            },
        ];

        for t in tests {
            std::env::set_var("NO_COLOR", t.no_color);
            std::env::set_var("CLICOLOR", t.clicolor);
            std::env::set_var("CLICOLOR_FORCE", t.clicolor_force);

            assert_eq!(env_color_disabled(), t.want_disabled, "test {}", t.name);
            assert_eq!(env_color_forced(), t.want_forced, "test {}", t.name);
        }
    }

    #[test]
    fn test_states_plain_when_disabled() {
        let cs = ColorScheme::new(false, true);
        assert_eq!(cs.instance_state(&InstanceState::ShuttingDown), "shutting-down");
        assert_eq!(cs.volume_state(&VolumeState::InUse), "in-use");
        assert_eq!(cs.snapshot_state(&SnapshotState::Pending), "pending");

        let cs = ColorScheme::new(true, true);
        assert_eq!(
            cs.instance_state(&InstanceState::Running),
            ansi_term::Colour::Green.paint("running").to_string()
        );
    }
}
