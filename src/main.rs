//! STOS — a small, self-contained FORTH interpreter with a bytecode VM.

mod config;
mod internals;
mod kernel;
mod runtime;

use config::Config;
use internals::files::{FileHandle, FileMode};
use internals::messages::Msg;
use runtime::ForthRuntime;

fn main() {
    let config = Config::from_args();

    let mut rt = ForthRuntime::new();
    rt.msg.set_level(config.debug_level);
    rt.set_echo(config.echo);
    rt.cold_start();

    if let Some(path) = &config.script {
        let mut msg = Msg::new();
        msg.set_level(config.debug_level);
        match FileHandle::new_file(Some(&std::path::PathBuf::from(path)), msg, FileMode::RO) {
            Some(handle) => rt.reader.push(handle),
            None => {
                eprintln!("stos: unable to open script file {}", path);
                std::process::exit(1);
            }
        }
    }

    rt.f_quit();
}
