/// Structured diagnostics for the interpreter.
///
/// STOS funnels every unexpected condition through a single message handler
/// rather than printing ad hoc. The handler gates on a `DebugLevel` so a
/// deeply embedded build can be run silent, while an interactive session
/// sees warnings and errors as they occur.
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord)]
pub enum DebugLevel {
    Error,
    Warning,
    Info,
    Debug,
}

#[derive(Debug, Clone)]
pub struct Msg {
    level: DebugLevel,
    last_error: Option<String>,
}

impl Msg {
    pub fn new() -> Msg {
        Msg {
            level: DebugLevel::Error,
            last_error: None,
        }
    }

    pub fn set_level(&mut self, level: DebugLevel) {
        self.level = level;
    }

    pub fn get_level(&self) -> DebugLevel {
        self.level
    }

    /// The text of the most recent `error()` call, for the REPL's
    /// `ERR. <message>` recovery line.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn emit<T: Debug>(&self, tag: &str, caller: &str, text: &str, detail: Option<T>) {
        match detail {
            Some(d) => eprintln!("{}: {}: {} ({:?})", tag, caller, text, d),
            None => eprintln!("{}: {}: {}", tag, caller, text),
        }
    }

    pub fn error<T: Debug>(&mut self, caller: &str, text: &str, detail: Option<T>) {
        self.last_error = Some(text.to_string());
        if self.level >= DebugLevel::Error {
            self.emit("ERROR", caller, text, detail);
        }
    }

    pub fn warning<T: Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        if self.level >= DebugLevel::Warning {
            self.emit("WARNING", caller, text, detail);
        }
    }

    pub fn info<T: Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        if self.level >= DebugLevel::Info {
            self.emit("INFO", caller, text, detail);
        }
    }

    pub fn debug<T: Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        if self.level >= DebugLevel::Debug {
            self.emit("DEBUG", caller, text, detail);
        }
    }
}

impl Default for Msg {
    fn default() -> Msg {
        Msg::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_error() {
        let msg = Msg::new();
        assert_eq!(msg.get_level(), DebugLevel::Error);
    }

    #[test]
    fn set_level_roundtrips() {
        let mut msg = Msg::new();
        msg.set_level(DebugLevel::Debug);
        assert_eq!(msg.get_level(), DebugLevel::Debug);
    }

    #[test]
    fn ordering_gates_output() {
        // Warning > Error in our ordering, so a Warning-level handler should
        // still report at the Error tier.
        assert!(DebugLevel::Warning > DebugLevel::Error);
        assert!(DebugLevel::Debug > DebugLevel::Info);
    }
}
