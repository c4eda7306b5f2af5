/// Input/output words
///
/// Character-at-a-time terminal I/O (`KEY`/`EMIT`), buffered printing
/// (`TYPE`, `.`, `.S`, `CR`), dictionary introspection (`WORDS`), and
/// `INCLUDE-FILE`, the one alternate line source the spec allows. `reader`
/// is the stack of active input sources: stdin at the bottom, `INCLUDE-FILE`
/// targets pushed on top and popped again at their own EOF.
use crate::internals::files::{FileHandle, FileMode};
use crate::internals::messages::Msg;
use crate::kernel::{FALSE, TRUE};
use crate::runtime::ForthRuntime;
use std::io::{self, Write};

impl ForthRuntime {
    /// Writes one raw byte to the console, matching the character-port
    /// contract the bytecode VM's `PRINT-STR` opcode relies on.
    pub fn u_putc(&mut self, byte: u8) {
        print!("{}", byte as char);
    }

    /// Reads one raw byte from the active input source, or `None` at EOF.
    fn u_getc(&mut self) -> Option<u8> {
        self.reader.last()?.read_char().map(|c| c as u8)
    }

    /// `key` ( -- c ) Reads one character, or 0 if none is available.
    pub fn f_key(&mut self) {
        let c = self.u_getc().unwrap_or(0);
        self.kernel.push(c as i64);
    }

    /// `emit` ( c -- ) Prints the low 7 bits of c as a character.
    pub fn f_emit_p(&mut self) {
        if let Some(c) = self.kernel.pop() {
            self.u_putc((c % 128) as u8);
        }
    }

    /// `flush` ( -- ) Forces any buffered stdout out now.
    pub fn f_flush(&mut self) {
        io::stdout().flush().ok();
    }

    /// `cr` ( -- ) Prints a newline.
    pub fn f_cr(&mut self) {
        println!();
    }

    /// `.` ( n -- ) Prints a number followed by a space.
    pub fn f_dot(&mut self) {
        match self.kernel.pop() {
            Some(n) => print!("{} ", n),
            None => {}
        }
    }

    /// `.s` ( -- ) Prints the contents of the data stack without consuming
    /// it, bottom to top.
    pub fn f_dot_s(&mut self) {
        print!("[ ");
        for v in self.kernel.stack_snapshot() {
            print!("{} ", v);
        }
        print!("] ");
    }

    /// `type` ( addr len -- ) Prints len bytes from the string pool at addr,
    /// then releases them (LIFO: valid only when addr/len is the most
    /// recent string-pool allocation).
    pub fn f_type(&mut self) {
        let len = match self.kernel.pop() {
            Some(v) => v as usize,
            None => return,
        };
        let addr = match self.kernel.pop() {
            Some(v) => v as usize,
            None => return,
        };
        let bytes = self.kernel.string_bytes(addr, len).to_vec();
        for b in bytes {
            self.u_putc(b);
        }
        self.kernel.string_release(len);
    }

    /// `words` ( -- ) Lists every name currently in the dictionary.
    pub fn f_words(&mut self) {
        let names: Vec<&str> = self.kernel.word_names().collect();
        println!("{}", names.join(" "));
    }

    fn u_open_file(&mut self, name: &str) -> Option<FileHandle> {
        let path = std::path::PathBuf::from(name);
        let mut msg = Msg::new();
        msg.set_level(self.msg.get_level());
        FileHandle::new_file(Some(&path), msg, FileMode::RO)
    }

    /// `include-file` ( addr len -- f ) Pushes a new input source reading
    /// from the named file; the REPL loop drains it and pops it at EOF,
    /// allowing nested file reads.
    pub fn f_include_file(&mut self) {
        let len = match self.kernel.pop() {
            Some(v) => v as usize,
            None => return,
        };
        let addr = match self.kernel.pop() {
            Some(v) => v as usize,
            None => return,
        };
        let bytes = self.kernel.string_bytes(addr, len).to_vec();
        let name = String::from_utf8_lossy(&bytes).into_owned();
        match self.u_open_file(&name) {
            Some(handle) => {
                self.reader.push(handle);
                self.kernel.push(TRUE);
            }
            None => {
                self.msg
                    .error("include-file", "UNABLE TO OPEN FILE", Some(name));
                self.kernel.push(FALSE);
            }
        }
    }
}
