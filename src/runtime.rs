//////////////////////////////////////////////////////////////////
/// runtime.rs
///
/// Forth Runtime Engine
///
/// `ForthRuntime` wires the kernel (stacks, dictionary, bytecode store) to
/// everything that isn't pure interpreter state: the mode controller, the
/// tokenizer, the message handler, the stack of active input sources, and
/// the stepper/timer bookkeeping the debug and timing words reach into.
/// `cold_start` is the one place that knows the full catalog of primitive
/// words; every other module just implements them.
use crate::internals::files::{FileHandle, FileMode};
use crate::internals::lexer::{Lexer, Token};
use crate::internals::messages::Msg;
use crate::internals::mode::ModeController;
use crate::kernel::{Kernel, WORD_FLAG_IMMEDIATE};
use std::time::{Duration, Instant};

pub struct ForthRuntime {
    pub kernel: Kernel,
    pub mode: ModeController,
    pub lexer: Lexer,
    pub msg: Msg,

    /// Dictionary id of the word currently under construction, `None`
    /// outside of COMPILE-NAME/COMPILE-BODY.
    pub compiling_word: Option<usize>,

    /// Stack of active input sources; the bottom entry is stdin (or a
    /// script file when run non-interactively), `INCLUDE-FILE` pushes on
    /// top of it and the REPL loop pops exhausted sources off.
    pub reader: Vec<FileHandle>,

    pub show_stack: bool,

    /// Stepper state read and written by `debug.rs::trace_step`: 0 off, -1
    /// single-step, 1 trace. `stepper_depth` bounds how many return-stack
    /// levels are shown/stepped into.
    pub stepper_mode: i32,
    pub stepper_depth: usize,

    timer: Instant,
    abort_flag: bool,
    exit_flag: bool,
    echo: bool,
}

impl ForthRuntime {
    pub fn new() -> ForthRuntime {
        let stdin = FileHandle::new_file(None, Msg::new(), FileMode::RO)
            .expect("stdin handle construction cannot fail");
        ForthRuntime {
            kernel: Kernel::new(),
            mode: ModeController::new(),
            lexer: Lexer::new(),
            msg: Msg::new(),
            compiling_word: None,
            reader: vec![stdin],
            show_stack: false,
            stepper_mode: 0,
            stepper_depth: usize::MAX,
            timer: Instant::now(),
            abort_flag: false,
            exit_flag: false,
            echo: false,
        }
    }

    /// `echo` mirrors input lines to stdout; useful when driving the
    /// interpreter from a script instead of a terminal.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Registers every primitive word and resets the interpreter to its
    /// just-booted state. Called once at startup and again on REBOOT.
    pub fn cold_start(&mut self) {
        self.kernel.reboot();
        self.mode.reset();
        self.compiling_word = None;
        self.abort_flag = false;
        self.timer = Instant::now();
        self.compile_primitives();
    }

    /// REBOOT (Ctrl-D on the input stream, or the `0x04` lexer token):
    /// clears the dictionary and all stacks and starts over, but keeps the
    /// message handler's verbosity and any open file/reader state.
    pub fn reboot(&mut self) {
        self.msg.info("reboot", "REBOOTING", None::<bool>);
        self.cold_start();
    }

    /// Registers one of every builtin word. Control-flow and compiler words
    /// that must run at compile time even inside a definition are marked
    /// IMMEDIATE; everything else compiles as an ordinary call.
    fn compile_primitives(&mut self) {
        const IMM: u8 = WORD_FLAG_IMMEDIATE;
        const REG: u8 = 0;

        // arithmetic / comparisons / stack / logic / memory / return-stack / timing
        self.add_primitive("+", REG, Self::f_plus);
        self.add_primitive("-", REG, Self::f_minus);
        self.add_primitive("*", REG, Self::f_times);
        self.add_primitive("/", REG, Self::f_divide);
        self.add_primitive("mod", REG, Self::f_mod);
        self.add_primitive("=", REG, Self::f_equal);
        self.add_primitive("<", REG, Self::f_less);
        self.add_primitive(">", REG, Self::f_greater);
        self.add_primitive("<=", REG, Self::f_less_equal);
        self.add_primitive(">=", REG, Self::f_greater_equal);
        self.add_primitive("0=", REG, Self::f_0equal);
        self.add_primitive("0<", REG, Self::f_0less);
        self.add_primitive("true", REG, Self::f_true);
        self.add_primitive("false", REG, Self::f_false);
        self.add_primitive("dup", REG, Self::f_dup);
        self.add_primitive("drop", REG, Self::f_drop);
        self.add_primitive("swap", REG, Self::f_swap);
        self.add_primitive("over", REG, Self::f_over);
        self.add_primitive("rot", REG, Self::f_rot);
        self.add_primitive("pick", REG, Self::f_pick);
        self.add_primitive("roll", REG, Self::f_roll);
        self.add_primitive("and", REG, Self::f_and);
        self.add_primitive("or", REG, Self::f_or);
        self.add_primitive("@", REG, Self::f_get);
        self.add_primitive("!", REG, Self::f_store);
        self.add_primitive("c@", REG, Self::f_c_get);
        self.add_primitive("c!", REG, Self::f_c_store);
        self.add_primitive(">r", REG, Self::f_to_r);
        self.add_primitive("r>", REG, Self::f_r_from);
        self.add_primitive("r@", REG, Self::f_r_get);
        self.add_primitive("i", REG, Self::f_i);
        self.add_primitive("j", REG, Self::f_j);
        self.add_primitive("now", REG, Self::f_now);
        self.add_primitive("micros", REG, Self::f_micros);
        self.add_primitive("millis", REG, Self::f_millis);
        self.add_primitive("ms", REG, Self::f_ms);

        // console / file I/O
        self.add_primitive("key", REG, Self::f_key);
        self.add_primitive("emit", REG, Self::f_emit_p);
        self.add_primitive("flush", REG, Self::f_flush);
        self.add_primitive("cr", REG, Self::f_cr);
        self.add_primitive(".", REG, Self::f_dot);
        self.add_primitive(".s", REG, Self::f_dot_s);
        self.add_primitive("type", REG, Self::f_type);
        self.add_primitive("words", REG, Self::f_words);
        self.add_primitive("include-file", REG, Self::f_include_file);

        // debug / introspection
        self.add_primitive("show-stack", REG, Self::f_show_stack);
        self.add_primitive("hide-stack", REG, Self::f_hide_stack);
        self.add_primitive("depth", REG, Self::f_stack_depth);
        self.add_primitive("dbg", REG, Self::f_dbg);
        self.add_primitive("debuglevel", REG, Self::f_debuglevel);
        self.add_primitive("see", REG, Self::f_see);

        // compiler / control flow
        self.add_primitive(":", REG, Self::f_colon);
        self.add_primitive(";", IMM, Self::f_semicolon);
        self.add_primitive("immediate", REG, Self::f_immediate);
        self.add_primitive("if", IMM, Self::f_if);
        self.add_primitive("else", IMM, Self::f_else);
        self.add_primitive("then", IMM, Self::f_then);
        self.add_primitive("begin", IMM, Self::f_begin);
        self.add_primitive("until", IMM, Self::f_until);
        self.add_primitive("while", IMM, Self::f_while);
        self.add_primitive("repeat", IMM, Self::f_repeat);
        self.add_primitive("again", IMM, Self::f_again);
        self.add_primitive("do", IMM, Self::f_do);
        self.add_primitive("loop", IMM, Self::f_loop);
        self.add_primitive("+loop", IMM, Self::f_ploop);
        self.add_primitive("recurse", IMM, Self::f_recurse);
        self.add_primitive("exit", IMM, Self::f_exit);
        self.add_primitive("variable", REG, Self::f_variable);
        self.add_primitive("constant", REG, Self::f_constant);
        self.add_primitive("create", REG, Self::f_create);
        self.add_primitive("allot", REG, Self::f_allot);
        self.add_primitive("s\"", IMM, Self::f_squote);
        self.add_primitive(".\"", IMM, Self::f_dotquote);

        // outer interpreter
        self.add_primitive("abort", REG, Self::f_abort_word);
        self.add_primitive("bye", REG, Self::f_bye);
        self.add_primitive("clear", REG, Self::f_clear);
        self.add_primitive("quit", REG, Self::f_quit_word);
    }

    // ---- abort / error state ------------------------------------------------

    /// Raises the interpreter's abort condition. Stacks are left exactly as
    /// they were: partial effects are retained, not rolled back.
    pub fn f_abort(&mut self) {
        self.abort_flag = true;
    }

    pub fn get_abort_flag(&self) -> bool {
        self.abort_flag
    }

    pub fn set_abort_flag(&mut self, flag: bool) {
        self.abort_flag = flag;
    }

    /// `abort` ( -- ) Forth-visible word wrapping `f_abort`.
    fn f_abort_word(&mut self) {
        self.f_abort();
    }

    /// `clear` ( -- ) Empties the stacks without raising the abort flag.
    fn f_clear(&mut self) {
        self.kernel.clear_stacks();
    }

    /// `quit` ( -- ) Forth-visible re-entry into the outer interpreter loop.
    fn f_quit_word(&mut self) {
        self.f_quit();
    }

    // ---- timing --------------------------------------------------------------

    pub fn reset_timer(&mut self) {
        self.timer = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    // ---- exit ------------------------------------------------------------

    pub fn should_exit(&self) -> bool {
        self.exit_flag
    }

    /// `bye` ( -- ) Requests that the outer loop stop after the current line.
    pub fn f_bye(&mut self) {
        self.exit_flag = true;
    }

    // ---- outer interpreter -------------------------------------------------

    /// Prints the mode-dependent prompt: `STOS>> ` in INTERPRET, `....>> `
    /// while a definition is still open. Only shown on the interactive
    /// (bottommost) source, matching the original's single-prompt REPL.
    fn print_prompt(&mut self) {
        if self.reader.len() != 1 {
            return;
        }
        let prompt = match self.mode.get() {
            crate::internals::mode::Mode::Interpret => "STOS>> ",
            _ => "....>> ",
        };
        print!("{}", prompt);
        self.f_flush();
    }

    /// Prints `ERR. <message>` for the most recent failure, per the REPL's
    /// error-recovery contract.
    fn report_error(&mut self) {
        let text = self.msg.last_error().unwrap_or("UNKNOWN ERROR").to_string();
        println!("ERR. {}", text);
    }

    /// Drains the active input source stack one line at a time, tokenizing
    /// and executing each line through `exec_token`. Nested `INCLUDE-FILE`
    /// sources are popped at EOF; EOF on the bottommost (interactive) source
    /// triggers REBOOT. Only `bye` actually ends the session.
    pub fn f_quit(&mut self) {
        self.set_abort_flag(false);
        loop {
            if self.should_exit() {
                break;
            }
            self.print_prompt();
            let line = match self.reader.last_mut() {
                Some(r) => r.get_line(),
                None => None,
            };
            match line {
                Some(text) => {
                    if self.echo {
                        println!("{}", text);
                    }
                    if text.len() > crate::kernel::INPUT_ACCUMULATOR_LEN - 1 {
                        self.msg.error("quit", "LINE TOO LONG", Some(text.len()));
                        self.report_error();
                        self.mode.reset();
                        self.kernel.set_here(0);
                        self.f_flush();
                        continue;
                    }
                    self.lexer.set_line(&text);
                    self.set_abort_flag(false);
                    loop {
                        let tok = self.lexer.next_token();
                        if tok == Token::EndOfLine {
                            break;
                        }
                        if !self.exec_token(tok) {
                            self.report_error();
                            self.mode.reset();
                            self.kernel.set_here(0);
                            break;
                        }
                    }
                    if self.reader.len() == 1 {
                        if self.show_stack {
                            self.f_dot_s();
                        }
                        print!("ok ");
                    }
                    self.f_flush();
                }
                None => {
                    if self.reader.len() > 1 {
                        self.reader.pop();
                    } else {
                        // EOF on the interactive source is REBOOT, not exit;
                        // `bye` is the only way to actually end the session.
                        self.reboot();
                    }
                }
            }
        }
    }
}

impl Default for ForthRuntime {
    fn default() -> ForthRuntime {
        ForthRuntime::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(rt: &mut ForthRuntime, text: &str) {
        rt.lexer.set_line(text);
        loop {
            let tok = rt.lexer.next_token();
            if tok == Token::EndOfLine {
                break;
            }
            assert!(rt.exec_token(tok), "token execution failed in `{}`", text);
        }
    }

    #[test]
    fn cold_start_registers_core_words() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        assert!(rt.kernel.find_word("+").is_some());
        assert!(rt.kernel.find_word("if").is_some());
        assert!(rt.kernel.word(rt.kernel.find_word("if").unwrap()).is_immediate());
        assert!(!rt.kernel.word(rt.kernel.find_word("+").unwrap()).is_immediate());
    }

    #[test]
    fn reboot_clears_dictionary_then_recompiles_primitives() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        line(&mut rt, ": double dup + ;");
        assert!(rt.kernel.find_word("double").is_some());
        rt.reboot();
        assert!(rt.kernel.find_word("double").is_none());
        assert!(rt.kernel.find_word("+").is_some());
    }

    #[test]
    fn abort_sets_flag_without_touching_stacks() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.kernel.push(1);
        rt.kernel.push(2);
        rt.f_abort();
        assert!(rt.get_abort_flag());
        assert_eq!(rt.kernel.depth(), 2);
    }

    #[test]
    fn bye_sets_exit_flag() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        assert!(!rt.should_exit());
        rt.f_bye();
        assert!(rt.should_exit());
    }

    #[test]
    fn timer_reports_elapsed_time() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.reset_timer();
        assert!(rt.elapsed().as_secs() < 1);
    }
}
