/// Inner interpreter
///
/// The bytecode dispatch loop. A word's body is a flat byte stream in the
/// kernel's bytecode store; `exec_word` walks it opcode by opcode, calling
/// back into Rust for primitives and recursing (via the return stack, not
/// the Rust call stack) into other user-defined words.
use crate::runtime::ForthRuntime;

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum Opcode {
    PushCell = 0,
    PushString = 1,
    PrintStr = 2,
    CallId = 3,
    Ret = 4,
    Jmp = 5,
    Jz = 6,
    Jnz = 7,
    Do = 8,
    Loop = 9,
}

impl Opcode {
    pub fn from_byte(b: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match b {
            0 => PushCell,
            1 => PushString,
            2 => PrintStr,
            3 => CallId,
            4 => Ret,
            5 => Jmp,
            6 => Jz,
            7 => Jnz,
            8 => Do,
            9 => Loop,
            _ => return None,
        })
    }
}

/// A single return-stack frame: the resume address in the caller. DO/LOOP
/// pushes two extra plain cells (limit, index) above a frame, exactly as
/// the C original interleaves loop bookkeeping with call frames on one
/// stack.
impl ForthRuntime {
    /// Executes the word with the given dictionary id to completion
    /// (primitive call, or full bytecode walk for a user-defined word).
    pub fn exec_word(&mut self, id: usize) {
        if self.kernel.word(id).is_primitive() {
            self.call_primitive(id);
            return;
        }
        let entry_pc = self.kernel.word(id).code_off;
        self.run_from(entry_pc);
    }

    /// Calls the builtin function registered for a primitive word's id.
    pub fn call_primitive(&mut self, id: usize) {
        // A primitive's body is CALL-ID <self>, RET; `run_from` re-enters
        // here for CALL-ID on a primitive id, so we dispatch directly
        // instead of re-walking that stub.
        let func = self.kernel.primitive(id);
        func(self);
    }

    /// Walks bytecode starting at `entry_pc` until a top-level RET (return
    /// stack empty) or an abort condition.
    fn run_from(&mut self, entry_pc: usize) {
        let mut pc = entry_pc;
        let base_depth = self.kernel.return_depth();
        loop {
            if self.get_abort_flag() {
                return;
            }
            let op = match Opcode::from_byte(self.kernel.read_byte(pc)) {
                Some(op) => op,
                None => {
                    self.msg.error(
                        "run_from",
                        "CORRUPT BYTECODE",
                        Some(self.kernel.read_byte(pc)),
                    );
                    self.f_abort();
                    return;
                }
            };
            pc += 1;
            self.trace_step(pc - 1, op);
            match op {
                Opcode::PushCell => {
                    let v = self.kernel.read_cell(pc);
                    pc += 8;
                    if !self.kernel.push(v) {
                        self.f_abort();
                        return;
                    }
                }
                Opcode::PushString => {
                    let len = self.kernel.read_u16(pc) as usize;
                    pc += 2;
                    let bytes = self.kernel.read_str(pc, len).to_vec();
                    pc += len;
                    match self.kernel.string_alloc(&bytes) {
                        Some(addr) => {
                            self.kernel.push(addr as i64);
                            self.kernel.push(len as i64);
                        }
                        None => {
                            self.f_abort();
                            return;
                        }
                    }
                }
                Opcode::PrintStr => {
                    let len = self.kernel.read_u16(pc) as usize;
                    pc += 2;
                    for i in 0..len {
                        self.u_putc(self.kernel.read_byte(pc + i));
                    }
                    pc += len;
                }
                Opcode::CallId => {
                    let tid = self.kernel.read_u16(pc) as usize;
                    pc += 2;
                    if self.kernel.word(tid).is_primitive() {
                        self.call_primitive(tid);
                    } else {
                        if !self.kernel.rpush(pc as i64) {
                            self.f_abort();
                            return;
                        }
                        pc = self.kernel.word(tid).code_off;
                    }
                }
                Opcode::Ret => {
                    if self.kernel.return_depth() <= base_depth {
                        return;
                    }
                    match self.kernel.rpop() {
                        Some(addr) => pc = addr as usize,
                        None => return,
                    }
                }
                Opcode::Jz => {
                    let target = self.kernel.read_u16(pc) as usize;
                    pc += 2;
                    match self.kernel.pop() {
                        Some(0) => pc = target,
                        Some(_) => {}
                        None => {
                            self.f_abort();
                            return;
                        }
                    }
                }
                Opcode::Jnz => {
                    let target = self.kernel.read_u16(pc) as usize;
                    pc += 2;
                    match self.kernel.pop() {
                        Some(0) => {}
                        Some(_) => pc = target,
                        None => {
                            self.f_abort();
                            return;
                        }
                    }
                }
                Opcode::Jmp => {
                    let target = self.kernel.read_u16(pc) as usize;
                    pc = target;
                }
                Opcode::Do => {
                    // stack is ( start limit -- ), so limit is on top
                    let (limit, start) = match (self.kernel.pop(), self.kernel.pop()) {
                        (Some(limit), Some(start)) => (limit, start),
                        _ => {
                            self.f_abort();
                            return;
                        }
                    };
                    self.kernel.rpush(limit);
                    self.kernel.rpush(start);
                }
                Opcode::Loop => {
                    let incr = match self.kernel.pop() {
                        Some(v) => v,
                        None => {
                            self.f_abort();
                            return;
                        }
                    };
                    let target = self.kernel.read_u16(pc) as usize;
                    pc += 2;
                    // top of return stack is the index, next is the limit
                    let index = match self.kernel.rpeek(0) {
                        Some(v) => v,
                        None => {
                            self.f_abort();
                            return;
                        }
                    } + incr;
                    let limit = match self.kernel.rpeek(1) {
                        Some(v) => v,
                        None => {
                            self.f_abort();
                            return;
                        }
                    };
                    if index < limit {
                        self.kernel.rset_top(index);
                        pc = target;
                    } else {
                        self.kernel.rdrop2();
                    }
                }
            }
        }
    }
}
