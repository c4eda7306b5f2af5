/// Debugging and introspection words
///
/// `show-stack`/`hide-stack`/`depth` control the REPL's stack display;
/// `dbg`/`debuglevel` drive the shared message handler's verbosity; the
/// stepper (`trace_step`, invoked by the bytecode dispatch loop on every
/// opcode) implements single-step and trace modes keyed off `STEPPER`/
/// `STEPPER-DEPTH`-equivalent runtime fields; `see` decompiles a word's
/// bytecode body back into readable source.
use crate::internals::inner::Opcode;
use crate::internals::lexer::Token;
use crate::internals::messages::DebugLevel;
use crate::runtime::ForthRuntime;

impl ForthRuntime {
    /// `show-stack` ( -- ) Turns on stack printing after each line.
    pub fn f_show_stack(&mut self) {
        self.show_stack = true;
    }

    /// `hide-stack` ( -- ) Turns off stack printing after each line.
    pub fn f_hide_stack(&mut self) {
        self.show_stack = false;
    }

    /// `depth` ( -- n ) Pushes the number of items on the data stack.
    pub fn f_stack_depth(&mut self) {
        let depth = self.kernel.depth() as i64;
        if !self.kernel.push(depth) {
            self.f_abort();
        }
    }

    /// `dbg` ( n -- ) Sets the message handler's verbosity: 0 error, 1
    /// warning, 2 info, anything else debug.
    pub fn f_dbg(&mut self) {
        let level = match self.kernel.pop() {
            Some(v) => v,
            None => return,
        };
        let level = match level {
            0 => DebugLevel::Error,
            1 => DebugLevel::Warning,
            2 => DebugLevel::Info,
            _ => DebugLevel::Debug,
        };
        self.msg.set_level(level);
    }

    /// `debuglevel` ( -- ) Prints the current message verbosity.
    pub fn f_debuglevel(&mut self) {
        println!("DebugLevel is {:?}", self.msg.get_level());
    }

    /// Per-opcode hook for the stepper/tracer. `pc` is the address of the
    /// opcode byte just consumed (the dispatch loop passes `pc - 1`).
    /// STEPPER is off (0), single-stepping (-1), or tracing (1); STEPPER
    /// depth limits how many return-stack levels are shown.
    pub fn trace_step(&mut self, pc: usize, op: Opcode) {
        if self.stepper_mode == 0 {
            return;
        }
        let call_depth = self.kernel.return_depth();
        if call_depth > self.stepper_depth {
            return;
        }
        for _ in 0..call_depth {
            print!(" ");
        }
        self.f_dot_s();
        match op {
            Opcode::PushCell => {
                let v = self.kernel.read_cell(pc + 1);
                println!("{} ", v);
            }
            Opcode::PushString => {
                let len = self.kernel.read_u16(pc + 1) as usize;
                let bytes = self.kernel.read_str(pc + 3, len);
                println!("s\" {}\" ", String::from_utf8_lossy(bytes));
            }
            Opcode::PrintStr => {
                let len = self.kernel.read_u16(pc + 1) as usize;
                let bytes = self.kernel.read_str(pc + 3, len);
                println!(".\" {}\" ", String::from_utf8_lossy(bytes));
            }
            Opcode::CallId => {
                let id = self.kernel.read_u16(pc + 1) as usize;
                println!("-> {} ", self.kernel.word(id).name);
            }
            Opcode::Ret => println!("; "),
            Opcode::Jmp => println!("jmp:{} ", self.kernel.read_u16(pc + 1)),
            Opcode::Jz => println!("jz:{} ", self.kernel.read_u16(pc + 1)),
            Opcode::Jnz => println!("jnz:{} ", self.kernel.read_u16(pc + 1)),
            Opcode::Do => println!("do "),
            Opcode::Loop => println!("loop:{} ", self.kernel.read_u16(pc + 1)),
        }
        if self.stepper_mode == -1 {
            print!("Step> ");
            self.f_flush();
            loop {
                self.f_key();
                let c = self.kernel.pop().unwrap_or(10) as u8 as char;
                if c != '\n' {
                    self.handle_stepper_command(c);
                    break;
                }
            }
        }
    }

    fn handle_stepper_command(&mut self, c: char) {
        match c {
            't' => self.stepper_mode = 1,
            'i' => self.stepper_depth += 1,
            'o' => self.stepper_depth = self.stepper_depth.saturating_sub(1),
            'c' => self.stepper_mode = 0,
            'h' | '?' => println!(
                "Stepper: 's' show, 't' trace, 'c' continue, 'i' step-in, 'o' step-out."
            ),
            _ => {}
        }
    }

    /// `see <name>` ( -- ) Decompiles a word's bytecode body back into
    /// readable (if not re-parseable) source text.
    pub fn f_see(&mut self) {
        let name = match self.lexer.next_token() {
            Token::Word(n) => n,
            _ => {
                self.msg.error("see", "EXPECTED A WORD NAME", None::<bool>);
                return;
            }
        };
        let id = match self.kernel.find_word(&name) {
            Some(id) => id,
            None => {
                self.msg.warning("see", "WORD NOT FOUND", Some(name));
                return;
            }
        };
        let word = self.kernel.word(id);
        if word.is_primitive() {
            println!("primitive: {}", word.name);
            return;
        }
        print!(": {} ", word.name);
        let mut pc = word.code_off;
        let end = word.code_off + word.code_len;
        while pc < end {
            let op = match Opcode::from_byte(self.kernel.read_byte(pc)) {
                Some(op) => op,
                None => break,
            };
            pc += 1;
            match op {
                Opcode::PushCell => {
                    print!("{} ", self.kernel.read_cell(pc));
                    pc += 8;
                }
                Opcode::PushString => {
                    let len = self.kernel.read_u16(pc) as usize;
                    pc += 2;
                    print!("s\" {}\" ", String::from_utf8_lossy(self.kernel.read_str(pc, len)));
                    pc += len;
                }
                Opcode::PrintStr => {
                    let len = self.kernel.read_u16(pc) as usize;
                    pc += 2;
                    print!(".\" {}\" ", String::from_utf8_lossy(self.kernel.read_str(pc, len)));
                    pc += len;
                }
                Opcode::CallId => {
                    let tid = self.kernel.read_u16(pc) as usize;
                    pc += 2;
                    print!("{} ", self.kernel.word(tid).name);
                }
                Opcode::Ret => print!("; "),
                Opcode::Jmp => {
                    print!("jmp:{} ", self.kernel.read_u16(pc));
                    pc += 2;
                }
                Opcode::Jz => {
                    print!("jz:{} ", self.kernel.read_u16(pc));
                    pc += 2;
                }
                Opcode::Jnz => {
                    print!("jnz:{} ", self.kernel.read_u16(pc));
                    pc += 2;
                }
                Opcode::Do => print!("do "),
                Opcode::Loop => {
                    print!("loop:{} ", self.kernel.read_u16(pc));
                    pc += 2;
                }
            }
        }
        println!();
    }
}
