/// Compiler and control-flow words
///
/// Implements the mode-driven compiler: `:` and `;` bracket a definition,
/// the control-flow immediate words (`IF`/`ELSE`/`THEN`, the `BEGIN` family,
/// `DO`/`LOOP`/`+LOOP`, `RECURSE`, `EXIT`) patch jump targets through the
/// compile stack, and `VARIABLE`/`CONSTANT`/`CREATE`/`ALLOT` install data
/// words. `S"` and `."` both consume raw source text past the tokenizer's
/// cursor since their bodies may contain spaces.
use crate::internals::inner::Opcode;
use crate::internals::lexer::Token;
use crate::internals::mode::Mode;
use crate::kernel::{WORD_FLAG_IMMEDIATE, WORD_FLAG_PRIMITIVE};
use crate::runtime::ForthRuntime;

impl ForthRuntime {
    /// Top-level token router, mirroring the REBOOT / INTERPRET /
    /// COMPILE-NAME / COMPILE-BODY dispatch of the original interpreter.
    pub fn exec_token(&mut self, token: Token) -> bool {
        if token == Token::Reboot {
            self.reboot();
            return true;
        }
        match self.mode.get() {
            Mode::Interpret => self.exec_interpret(token),
            Mode::CompileName => self.exec_compile_name(token),
            Mode::CompileBody => self.exec_compile_body(token),
        }
    }

    fn exec_interpret(&mut self, token: Token) -> bool {
        match token {
            Token::Number(n) => self.kernel.push(n),
            Token::Word(name) => match self.kernel.find_word(&name) {
                Some(id) => {
                    self.exec_word(id);
                    !self.get_abort_flag()
                }
                None => {
                    self.msg.error("interpret", "INVALID WORD", Some(name));
                    false
                }
            },
            Token::EndOfLine | Token::Reboot => true,
        }
    }

    fn exec_compile_name(&mut self, token: Token) -> bool {
        match token {
            Token::Word(name) => match self.kernel.create_word(&name, 0) {
                Some(id) => {
                    self.compiling_word = Some(id);
                    self.mode.set(Mode::CompileBody);
                    true
                }
                None => false,
            },
            _ => {
                self.msg.error(
                    "compile-name",
                    "UNEXPECTED TOKEN AFTER BEGINNING OF DEFINITION",
                    None::<bool>,
                );
                false
            }
        }
    }

    fn exec_compile_body(&mut self, token: Token) -> bool {
        if self.token_compile(token) {
            true
        } else {
            // Compile-time failure: abandon the half-built word entirely
            // (closing the dictionary-count leak the original leaves
            // behind) and fall back to INTERPRET.
            if let Some(id) = self.compiling_word.take() {
                self.kernel.abandon_word(id);
            }
            self.mode.reset();
            false
        }
    }

    /// Compiles one token into the word currently under construction.
    /// Returns false on any compile-time error (unknown word, malformed
    /// string literal, control-stack misuse).
    fn token_compile(&mut self, token: Token) -> bool {
        match token {
            Token::Word(name) => {
                let id = match self.kernel.find_word(&name) {
                    Some(id) => id,
                    None => {
                        self.msg.error("compile", "INVALID WORD", Some(name));
                        return false;
                    }
                };
                let word = self.kernel.word(id);
                if word.is_immediate() && word.is_primitive() {
                    self.exec_word(id);
                    !self.get_abort_flag()
                } else {
                    self.emit_call_id(id)
                }
            }
            Token::Number(n) => self.emit_push_cell(n),
            Token::EndOfLine | Token::Reboot => true,
        }
    }

    fn emit_call_id(&mut self, id: usize) -> bool {
        self.kernel.emit_byte(Opcode::CallId as u8) && self.kernel.emit_u16(id as u16)
    }

    fn emit_push_cell(&mut self, v: i64) -> bool {
        self.kernel.emit_byte(Opcode::PushCell as u8) && self.kernel.emit_cell(v)
    }

    // ---- primitive registration helper -----------------------------------

    /// Registers a builtin: creates its dictionary stub (`CALL-ID self,
    /// RET`) and records the Rust function pointer in the primitive table.
    pub fn add_primitive(&mut self, name: &str, flags: u8, func: fn(&mut ForthRuntime)) {
        let prim_id = match self.kernel.add_primitive(func) {
            Some(id) => id,
            None => return,
        };
        let id = match self.kernel.create_word(name, flags | WORD_FLAG_PRIMITIVE) {
            Some(id) => id,
            None => return,
        };
        debug_assert_eq!(id, prim_id, "primitive id must track dictionary id");
        self.emit_call_id(id);
        self.kernel.emit_byte(Opcode::Ret as u8);
        self.kernel.finish_word(id);
    }

    // ---- `:` / `;` ---------------------------------------------------------

    /// `: <name> ... ;` ( -- ) Begins a new definition.
    pub fn f_colon(&mut self) {
        self.mode.set(Mode::CompileName);
    }

    /// `;` ( -- ) Ends the current definition, requiring a balanced compile
    /// stack (REDESIGN FLAG: the original does not check this and will
    /// silently leave dangling jump patch sites).
    pub fn f_semicolon(&mut self) {
        if self.mode.get() != Mode::CompileBody {
            self.msg
                .error(";", "END OF DEFINITION OUTSIDE OF DEFINITION", None::<bool>);
            self.f_abort();
            return;
        }
        if self.kernel.compile_depth() != 0 {
            self.msg.error(
                ";",
                "UNBALANCED CONTROL STRUCTURE",
                Some(self.kernel.compile_depth()),
            );
            self.f_abort();
            return;
        }
        self.kernel.emit_byte(Opcode::Ret as u8);
        if let Some(id) = self.compiling_word.take() {
            self.kernel.finish_word(id);
        }
        self.mode.set(Mode::Interpret);
    }

    /// `immediate` ( -- ) Sets the immediate flag on the most recently
    /// defined word.
    pub fn f_immediate(&mut self) {
        let last = self.kernel.word_count();
        if last == 0 {
            return;
        }
        self.kernel.word_mut(last - 1).flags |= WORD_FLAG_IMMEDIATE;
    }

    // ---- IF / ELSE / THEN --------------------------------------------------

    /// `if` ( f -- ) Compiles a conditional forward branch.
    pub fn f_if(&mut self) {
        if !self.require_compiling("if", "`IF` OUTSIDE OF DEFINITION") {
            return;
        }
        self.kernel.emit_byte(Opcode::Jz as u8);
        self.kernel.cpush(self.kernel.here());
        self.kernel.emit_u16(0); // placeholder
    }

    /// `else` ( -- ) Closes the `if` branch and opens the alternate one.
    pub fn f_else(&mut self) {
        if !self.require_compiling("else", "`ELSE` OUTSIDE OF DEFINITION") {
            return;
        }
        let if_addr = match self.kernel.cpop() {
            Some(a) => a,
            None => return,
        };
        self.kernel.emit_byte(Opcode::Jmp as u8);
        self.kernel.cpush(self.kernel.here());
        self.kernel.emit_u16(0); // placeholder
        let here = self.kernel.here() as u16;
        self.kernel.patch_u16(if_addr, here);
    }

    /// `then` ( -- ) Resolves the pending branch to here.
    pub fn f_then(&mut self) {
        if !self.require_compiling("then", "`THEN` OUTSIDE OF DEFINITION") {
            return;
        }
        let addr = match self.kernel.cpop() {
            Some(a) => a,
            None => return,
        };
        let here = self.kernel.here() as u16;
        self.kernel.patch_u16(addr, here);
    }

    // ---- BEGIN family ----------------------------------------------------

    /// `begin` ( -- ) Marks a loop entry point.
    pub fn f_begin(&mut self) {
        if !self.require_compiling("begin", "`BEGIN` OUTSIDE OF DEFINITION") {
            return;
        }
        self.kernel.cpush(self.kernel.here());
    }

    /// `until` ( f -- ) Branches back to `begin` while the flag is false.
    pub fn f_until(&mut self) {
        if !self.require_compiling("until", "`UNTIL` OUTSIDE OF DEFINITION") {
            return;
        }
        let begin = match self.kernel.cpop() {
            Some(a) => a,
            None => return,
        };
        self.kernel.emit_byte(Opcode::Jz as u8);
        self.kernel.emit_u16(begin as u16);
    }

    /// `while` ( f -- ) Exits a `begin ... while ... repeat` loop when false.
    pub fn f_while(&mut self) {
        if !self.require_compiling("while", "`WHILE` OUTSIDE OF DEFINITION") {
            return;
        }
        self.kernel.cpush(self.kernel.here());
        self.kernel.emit_byte(Opcode::Jz as u8);
        self.kernel.emit_u16(0); // placeholder
    }

    /// `repeat` ( -- ) Closes a `begin ... while ... repeat` loop.
    pub fn f_repeat(&mut self) {
        if !self.require_compiling("repeat", "`REPEAT` OUTSIDE OF DEFINITION") {
            return;
        }
        let while_addr = match self.kernel.cpop() {
            Some(a) => a,
            None => return,
        };
        let begin_addr = match self.kernel.cpop() {
            Some(a) => a,
            None => return,
        };
        self.kernel.emit_byte(Opcode::Jmp as u8);
        self.kernel.emit_u16(begin_addr as u16);
        let here = self.kernel.here() as u16;
        self.kernel.patch_u16(while_addr, here);
    }

    /// `again` ( -- ) Closes an unconditional `begin ... again` loop.
    pub fn f_again(&mut self) {
        if !self.require_compiling("again", "`AGAIN` OUTSIDE OF DEFINITION") {
            return;
        }
        let begin = match self.kernel.cpop() {
            Some(a) => a,
            None => return,
        };
        self.kernel.emit_byte(Opcode::Jmp as u8);
        self.kernel.emit_u16(begin as u16);
    }

    // ---- DO / LOOP ---------------------------------------------------------

    /// `do` ( start limit -- ) Opens a counted loop.
    pub fn f_do(&mut self) {
        if !self.require_compiling("do", "`DO` OUTSIDE OF DEFINITION") {
            return;
        }
        self.kernel.emit_byte(Opcode::Do as u8);
        self.kernel.cpush(self.kernel.here());
    }

    /// `loop` ( -- ) Closes a `do ... loop`, incrementing the index by 1.
    pub fn f_loop(&mut self) {
        if !self.require_compiling("loop", "`LOOP` OUTSIDE OF DEFINITION") {
            return;
        }
        self.emit_push_cell(1);
        self.kernel.emit_byte(Opcode::Loop as u8);
        let addr = match self.kernel.cpop() {
            Some(a) => a,
            None => return,
        };
        self.kernel.emit_u16(addr as u16);
    }

    /// `+loop` ( n -- ) Closes a `do ... +loop`, incrementing by n.
    pub fn f_ploop(&mut self) {
        if !self.require_compiling("+loop", "`+LOOP` OUTSIDE OF DEFINITION") {
            return;
        }
        self.kernel.emit_byte(Opcode::Loop as u8);
        let addr = match self.kernel.cpop() {
            Some(a) => a,
            None => return,
        };
        self.kernel.emit_u16(addr as u16);
    }

    /// `recurse` ( -- ) Compiles a call to the word currently being defined.
    pub fn f_recurse(&mut self) {
        if !self.require_compiling("recurse", "`RECURSE` OUTSIDE OF DEFINITION") {
            return;
        }
        if let Some(id) = self.compiling_word {
            self.emit_call_id(id);
        }
    }

    /// `exit` ( -- ) Compiles an early return from the current definition.
    pub fn f_exit(&mut self) {
        if !self.require_compiling("exit", "`EXIT` OUTSIDE OF DEFINITION") {
            return;
        }
        self.kernel.emit_byte(Opcode::Ret as u8);
    }

    // ---- VARIABLE / CONSTANT / CREATE / ALLOT ------------------------------

    /// `variable <name>` ( -- ) Creates a one-cell variable initialized to 0.
    pub fn f_variable(&mut self) {
        if !self.require_interpreting("variable", "`VARIABLE` IN DEFINITION") {
            return;
        }
        let name = match self.next_word_token("variable", "EXPECTED WORD AFTER `VARIABLE`") {
            Some(n) => n,
            None => return,
        };
        let addr = match self.kernel.var_alloc_cell() {
            Some(a) => a,
            None => return,
        };
        self.install_data_word(&name, addr as i64);
    }

    /// `constant <name>` ( n -- ) Creates a word that pushes n.
    pub fn f_constant(&mut self) {
        if !self.require_interpreting("constant", "`CONSTANT` IN DEFINITION") {
            return;
        }
        let value = match self.kernel.pop() {
            Some(v) => v,
            None => return,
        };
        let name = match self.next_word_token("constant", "EXPECTED WORD AFTER `CONSTANT`") {
            Some(n) => n,
            None => return,
        };
        self.install_data_word(&name, value);
    }

    /// `create <name>` ( -- ) Creates a name bound to the next free
    /// variable-space cell, without reserving it (use with `ALLOT`).
    pub fn f_create(&mut self) {
        if !self.require_interpreting("create", "`CREATE` IN DEFINITION") {
            return;
        }
        let name = match self.next_word_token("create", "EXPECTED WORD AFTER `CREATE`") {
            Some(n) => n,
            None => return,
        };
        let addr = match self.kernel.var_allot(0) {
            Some(a) => a,
            None => return,
        };
        self.install_data_word(&name, addr as i64);
    }

    /// `allot` ( n -- ) Reserves n additional cells after the most recent
    /// `CREATE`.
    pub fn f_allot(&mut self) {
        if !self.require_interpreting("allot", "`ALLOT` IN DEFINITION") {
            return;
        }
        let n = match self.kernel.pop() {
            Some(v) => v,
            None => return,
        };
        if n < 0 {
            self.msg.error("allot", "NEGATIVE ALLOT", Some(n));
            self.f_abort();
            return;
        }
        self.kernel.var_allot(n as usize);
    }

    fn install_data_word(&mut self, name: &str, value: i64) {
        let id = match self.kernel.create_word(name, 0) {
            Some(id) => id,
            None => return,
        };
        self.emit_push_cell(value);
        self.kernel.emit_byte(Opcode::Ret as u8);
        self.kernel.finish_word(id);
    }

    // ---- strings -----------------------------------------------------------

    /// `s" ... "` ( -- a u ) In INTERPRET mode, pushes a freshly allocated
    /// string's address and length. In COMPILE-BODY mode, compiles a
    /// PUSH-STRING opcode carrying the literal text.
    pub fn f_squote(&mut self) {
        let body = match self.lexer.read_until_quote() {
            Some(b) => b,
            None => {
                self.msg.error("s\"", "UNTERMINATED STRING", None::<bool>);
                self.f_abort();
                return;
            }
        };
        match self.mode.get() {
            Mode::Interpret => match self.kernel.string_alloc(&body) {
                Some(addr) => {
                    self.kernel.push(addr as i64);
                    self.kernel.push(body.len() as i64);
                }
                None => self.f_abort(),
            },
            Mode::CompileBody => {
                self.kernel.emit_byte(Opcode::PushString as u8);
                self.kernel.emit_u16(body.len() as u16);
                self.kernel.emit_bytes(&body);
            }
            Mode::CompileName => {
                self.msg
                    .error("s\"", "`S\"` OUTSIDE OF DEFINITION", None::<bool>);
                self.f_abort();
            }
        }
    }

    /// `." ... "` ( -- ) Compiles literal text that prints itself when
    /// executed. Only valid while compiling a definition.
    pub fn f_dotquote(&mut self) {
        if !self.require_compiling("\".\"", "`.\"` OUTSIDE OF DEFINITION") {
            return;
        }
        let body = match self.lexer.read_until_quote() {
            Some(b) => b,
            None => {
                self.msg.error(".\"", "UNTERMINATED STRING", None::<bool>);
                self.f_abort();
                return;
            }
        };
        self.kernel.emit_byte(Opcode::PrintStr as u8);
        self.kernel.emit_u16(body.len() as u16);
        self.kernel.emit_bytes(&body);
    }

    // ---- shared guards -----------------------------------------------------

    fn require_compiling(&mut self, caller: &str, text: &str) -> bool {
        if self.mode.get() != Mode::CompileBody {
            self.msg.error(caller, text, None::<bool>);
            self.f_abort();
            false
        } else {
            true
        }
    }

    fn require_interpreting(&mut self, caller: &str, text: &str) -> bool {
        if self.mode.get() != Mode::Interpret {
            self.msg.error(caller, text, None::<bool>);
            self.f_abort();
            false
        } else {
            true
        }
    }

    fn next_word_token(&mut self, caller: &str, text: &str) -> Option<String> {
        match self.lexer.next_token() {
            Token::Word(name) => Some(name),
            _ => {
                self.msg.error(caller, text, None::<bool>);
                self.f_abort();
                None
            }
        }
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
    fn colon_definition_runs() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        line(&mut rt, ": double dup + ;");
        line(&mut rt, "21 double");
        assert_eq!(rt.kernel.pop(), Some(42));
    }

    #[test]
    fn if_else_then_selects_branch() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        line(&mut rt, ": sign dup 0 < if drop -1 else drop 1 then ;");
        line(&mut rt, "-5 sign");
        assert_eq!(rt.kernel.pop(), Some(-1));
        line(&mut rt, "5 sign");
        assert_eq!(rt.kernel.pop(), Some(1));
    }

    #[test]
    fn do_loop_accumulates() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        line(&mut rt, ": sum5 0 5 0 do i + loop ;");
        line(&mut rt, "sum5");
        assert_eq!(rt.kernel.pop(), Some(0 + 1 + 2 + 3 + 4));
    }

    #[test]
    fn unbalanced_control_structure_aborts_at_semicolon() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        rt.lexer.set_line(": broken if ;");
        loop {
            let tok = rt.lexer.next_token();
            if tok == Token::EndOfLine {
                break;
            }
            if !rt.exec_token(tok) {
                break;
            }
        }
        assert!(rt.get_abort_flag());
        assert_eq!(rt.kernel.find_word("broken"), None);
    }

    #[test]
    fn failed_definition_does_not_leave_stale_word() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        let before = rt.kernel.word_count();
        rt.lexer.set_line(": bad nosuchword ;");
        loop {
            let tok = rt.lexer.next_token();
            if tok == Token::EndOfLine {
                break;
            }
            if !rt.exec_token(tok) {
                break;
            }
        }
        assert_eq!(rt.kernel.word_count(), before);
    }

    #[test]
    fn variable_and_constant_roundtrip() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        line(&mut rt, "variable counter");
        line(&mut rt, "5 counter !");
        line(&mut rt, "counter @");
        assert_eq!(rt.kernel.pop(), Some(5));
        line(&mut rt, "7 constant seven");
        line(&mut rt, "seven");
        assert_eq!(rt.kernel.pop(), Some(7));
    }

    #[test]
    fn squote_in_interpret_mode_pushes_addr_and_len() {
        let mut rt = ForthRuntime::new();
        rt.cold_start();
        line(&mut rt, "s\" hi\"");
        assert_eq!(rt.kernel.pop(), Some(2));
        let addr = rt.kernel.pop().unwrap() as usize;
        assert_eq!(rt.kernel.string_bytes(addr, 2), b"hi");
    }
}
