/// Command-line configuration
///
/// Parsed once in `main` via `argh`. Carries the message handler's initial
/// verbosity, whether input lines are echoed back (matching the C build's
/// `_STOS_ECHO` compile flag), and an optional script to run ahead of the
/// interactive stdin prompt.
use argh::FromArgs;
use crate::internals::messages::DebugLevel;

pub const VERSION: &str = "0.1.0";

#[derive(FromArgs)]
/// a small, self-contained FORTH interpreter with a bytecode VM
pub struct Args {
    /// message verbosity: error, warning, info, or debug (default error)
    #[argh(option, default = "\"error\".to_string()")]
    pub debuglevel: String,

    /// echo each input line back to stdout before executing it
    #[argh(switch)]
    pub echo: bool,

    /// run a script file ahead of the interactive prompt
    #[argh(option)]
    pub script: Option<String>,
}

pub struct Config {
    pub debug_level: DebugLevel,
    pub echo: bool,
    pub script: Option<String>,
}

impl Config {
    pub fn new() -> Config {
        Config {
            debug_level: DebugLevel::Error,
            echo: false,
            script: None,
        }
    }

    /// Parses `std::env::args`, exiting the process on `--help` or a bad
    /// argument (argh's own behavior).
    pub fn from_args() -> Config {
        let args: Args = argh::from_env();
        let debug_level = match args.debuglevel.as_str() {
            "debug" => DebugLevel::Debug,
            "info" => DebugLevel::Info,
            "warning" => DebugLevel::Warning,
            _ => DebugLevel::Error,
        };
        Config {
            debug_level,
            echo: args.echo,
            script: args.script,
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_quiet_and_interactive() {
        let config = Config::new();
        assert_eq!(config.debug_level, DebugLevel::Error);
        assert!(!config.echo);
        assert!(config.script.is_none());
    }
}
