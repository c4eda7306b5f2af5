//////////////////////////////////////////////////////////////
/// Forth Interpreter Kernel
///
/// This module contains the core data structures for the bytecode engine:
/// the dictionary of words, the bytecode store, the three stacks (data,
/// return, compile), the variable space, and the string pool. Everything
/// that used to live behind raw host pointers in the original C program is
/// addressed here through small integer offsets into buffers owned by this
/// struct, so there is never a pointer into process memory floating around
/// on the Forth stacks.
///
use crate::internals::messages::Msg;

// Capacity constants, carried over from the C implementation's #defines.
pub const DATA_STACK_SIZE: usize = 128;
pub const RETURN_STACK_SIZE: usize = 64;
pub const COMPILE_STACK_SIZE: usize = 32;
pub const BYTECODE_SIZE: usize = 1024;
pub const VARSPACE_SIZE: usize = 64;
pub const STRINGSPACE_SIZE: usize = 256;
pub const MAX_WORDS: usize = 256;
pub const MAX_PRIMITIVES: usize = 64;
pub const MAX_STRING_SIZE: usize = 12;
pub const INPUT_ACCUMULATOR_LEN: usize = 128;

pub const WORD_FLAG_PRIMITIVE: u8 = 1;
pub const WORD_FLAG_IMMEDIATE: u8 = 2;

pub const TRUE: i64 = -1;
pub const FALSE: i64 = 0;

/// One dictionary entry: a name, its flags, and where its bytecode body
/// lives. Primitive words keep a `CALL-ID <self>, RET` stub body (mirroring
/// the C original) so the VM dispatch loop never needs a separate code path
/// for "is this a primitive" versus "is this user code" once a call is
/// already in flight; the stub's CALL-ID re-enters `Kernel::call_primitive`.
#[derive(Debug, Clone)]
pub struct Word {
    pub name: String,
    pub flags: u8,
    pub code_off: usize,
    pub code_len: usize,
}

impl Word {
    pub fn is_primitive(&self) -> bool {
        self.flags & WORD_FLAG_PRIMITIVE != 0
    }
    pub fn is_immediate(&self) -> bool {
        self.flags & WORD_FLAG_IMMEDIATE != 0
    }
}

/// An unresolved jump target left on the compile stack by an open control
/// structure (`IF`, `BEGIN`, `DO`, ...). The compile stack is unwound by the
/// matching closing word (`THEN`, `UNTIL`, `LOOP`, ...); anything left on it
/// at `;` is a compile error (see REDESIGN FLAGS in SPEC_FULL.md).
pub type PatchSite = usize;

pub struct Kernel {
    pub msg: Msg,

    // Dictionary and primitive registry
    words: Vec<Word>,
    primitives: Vec<fn(&mut crate::runtime::ForthRuntime)>,

    // Bytecode store
    bytecode: [u8; BYTECODE_SIZE],
    here: usize,

    // Data stack
    data_stack: [i64; DATA_STACK_SIZE],
    data_sp: usize,

    // Return stack: call frames interleave with DO/LOOP (limit, index) pairs
    return_stack: [i64; RETURN_STACK_SIZE],
    return_sp: usize,

    // Compile-time patch stack
    compile_stack: [PatchSite; COMPILE_STACK_SIZE],
    compile_sp: usize,

    // Variable space: cell-addressed, read/written as little-endian i64
    varspace: [u8; VARSPACE_SIZE * 8],
    var_here: usize,

    // String pool: bump-allocated LIFO buffer for S" / TYPE
    strings: [u8; STRINGSPACE_SIZE],
    string_sp: usize,
}

impl Kernel {
    pub fn new() -> Kernel {
        Kernel {
            msg: Msg::new(),
            words: Vec::with_capacity(MAX_WORDS),
            primitives: Vec::with_capacity(MAX_PRIMITIVES),
            bytecode: [0; BYTECODE_SIZE],
            here: 0,
            data_stack: [0; DATA_STACK_SIZE],
            data_sp: 0,
            return_stack: [0; RETURN_STACK_SIZE],
            return_sp: 0,
            compile_stack: [0; COMPILE_STACK_SIZE],
            compile_sp: 0,
            varspace: [0; VARSPACE_SIZE * 8],
            var_here: 0,
            strings: [0; STRINGSPACE_SIZE],
            string_sp: 0,
        }
    }

    /// Cold-start reset: empties every stack and the dictionary, but keeps
    /// the message handler's configured level (REBOOT is not a crash).
    pub fn reboot(&mut self) {
        self.words.clear();
        self.primitives.clear();
        self.here = 0;
        self.data_sp = 0;
        self.return_sp = 0;
        self.compile_sp = 0;
        self.var_here = 0;
        self.string_sp = 0;
    }

    pub fn clear_stacks(&mut self) {
        self.data_sp = 0;
        self.return_sp = 0;
        self.compile_sp = 0;
    }

    // ---- data stack -----------------------------------------------------

    pub fn push(&mut self, val: i64) -> bool {
        if self.data_sp >= DATA_STACK_SIZE {
            self.msg.error("push", "DATA STACK OVERFLOW", None::<bool>);
            return false;
        }
        self.data_stack[self.data_sp] = val;
        self.data_sp += 1;
        true
    }

    pub fn pop(&mut self) -> Option<i64> {
        if self.data_sp == 0 {
            self.msg.error("pop", "DATA STACK UNDERFLOW", None::<bool>);
            return None;
        }
        self.data_sp -= 1;
        Some(self.data_stack[self.data_sp])
    }

    pub fn top(&self) -> Option<i64> {
        if self.data_sp == 0 {
            None
        } else {
            Some(self.data_stack[self.data_sp - 1])
        }
    }

    pub fn peek(&self, n: usize) -> Option<i64> {
        if n >= self.data_sp {
            None
        } else {
            Some(self.data_stack[self.data_sp - 1 - n])
        }
    }

    pub fn depth(&self) -> usize {
        self.data_sp
    }

    pub fn stack_snapshot(&self) -> &[i64] {
        &self.data_stack[..self.data_sp]
    }

    // ---- return stack -----------------------------------------------------

    pub fn rpush(&mut self, val: i64) -> bool {
        if self.return_sp >= RETURN_STACK_SIZE {
            self.msg
                .error("rpush", "RETURN STACK OVERFLOW", None::<bool>);
            return false;
        }
        self.return_stack[self.return_sp] = val;
        self.return_sp += 1;
        true
    }

    pub fn rpop(&mut self) -> Option<i64> {
        if self.return_sp == 0 {
            self.msg
                .error("rpop", "RETURN STACK UNDERFLOW", None::<bool>);
            return None;
        }
        self.return_sp -= 1;
        Some(self.return_stack[self.return_sp])
    }

    pub fn rtop(&self) -> Option<i64> {
        if self.return_sp == 0 {
            None
        } else {
            Some(self.return_stack[self.return_sp - 1])
        }
    }

    pub fn rpeek(&self, n: usize) -> Option<i64> {
        if n >= self.return_sp {
            None
        } else {
            Some(self.return_stack[self.return_sp - 1 - n])
        }
    }

    pub fn rset_top(&mut self, val: i64) {
        if self.return_sp > 0 {
            self.return_stack[self.return_sp - 1] = val;
        }
    }

    pub fn rdrop2(&mut self) {
        self.return_sp = self.return_sp.saturating_sub(2);
    }

    pub fn return_depth(&self) -> usize {
        self.return_sp
    }

    // ---- compile stack ----------------------------------------------------

    pub fn cpush(&mut self, site: PatchSite) -> bool {
        if self.compile_sp >= COMPILE_STACK_SIZE {
            self.msg
                .error("cpush", "COMPILE STACK OVERFLOW", None::<bool>);
            return false;
        }
        self.compile_stack[self.compile_sp] = site;
        self.compile_sp += 1;
        true
    }

    pub fn cpop(&mut self) -> Option<PatchSite> {
        if self.compile_sp == 0 {
            self.msg
                .error("cpop", "COMPILE STACK UNDERFLOW", None::<bool>);
            return None;
        }
        self.compile_sp -= 1;
        Some(self.compile_stack[self.compile_sp])
    }

    pub fn compile_depth(&self) -> usize {
        self.compile_sp
    }

    // ---- bytecode store -----------------------------------------------------

    pub fn here(&self) -> usize {
        self.here
    }

    pub fn set_here(&mut self, addr: usize) {
        self.here = addr;
    }

    pub fn emit_byte(&mut self, b: u8) -> bool {
        if self.here >= BYTECODE_SIZE {
            self.msg
                .error("emit_byte", "BYTECODE STORE AT CAPACITY", None::<bool>);
            return false;
        }
        self.bytecode[self.here] = b;
        self.here += 1;
        true
    }

    /// Emits a 2-byte little-endian word id / jump target.
    pub fn emit_u16(&mut self, v: u16) -> bool {
        self.emit_byte((v & 0xff) as u8) && self.emit_byte((v >> 8) as u8)
    }

    /// Emits an 8-byte little-endian cell (for PUSH-CELL operands).
    pub fn emit_cell(&mut self, v: i64) -> bool {
        for b in v.to_le_bytes() {
            if !self.emit_byte(b) {
                return false;
            }
        }
        true
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) -> bool {
        for &b in bytes {
            if !self.emit_byte(b) {
                return false;
            }
        }
        true
    }

    pub fn read_byte(&self, addr: usize) -> u8 {
        self.bytecode[addr]
    }

    pub fn read_u16(&self, addr: usize) -> u16 {
        u16::from_le_bytes([self.bytecode[addr], self.bytecode[addr + 1]])
    }

    pub fn read_cell(&self, addr: usize) -> i64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytecode[addr..addr + 8]);
        i64::from_le_bytes(buf)
    }

    pub fn read_str(&self, addr: usize, len: usize) -> &[u8] {
        &self.bytecode[addr..addr + len]
    }

    /// Patches a previously emitted placeholder jump-target slot.
    pub fn patch_u16(&mut self, addr: usize, target: u16) {
        let bytes = target.to_le_bytes();
        self.bytecode[addr] = bytes[0];
        self.bytecode[addr + 1] = bytes[1];
    }

    // ---- dictionary -----------------------------------------------------

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn word(&self, id: usize) -> &Word {
        &self.words[id]
    }

    pub fn word_mut(&mut self, id: usize) -> &mut Word {
        &mut self.words[id]
    }

    /// Starts a new dictionary entry at the current HERE, returning its id.
    /// The bytecode body is filled in by subsequent emit_* calls and
    /// finished with `finish_word`.
    pub fn create_word(&mut self, name: &str, flags: u8) -> Option<usize> {
        if self.words.len() >= MAX_WORDS {
            self.msg
                .error("create_word", "DICTIONARY AT CAPACITY", None::<bool>);
            return None;
        }
        let id = self.words.len();
        self.words.push(Word {
            name: name.to_string(),
            flags,
            code_off: self.here,
            code_len: 0,
        });
        Some(id)
    }

    pub fn finish_word(&mut self, id: usize) {
        let off = self.words[id].code_off;
        self.words[id].code_len = self.here - off;
    }

    /// Un-does a failed `create_word`: rewinds HERE back to where the entry
    /// started and drops the entry entirely, closing the "stale empty word"
    /// wart the original C leaves behind on a mid-definition compile error.
    pub fn abandon_word(&mut self, id: usize) {
        if id < self.words.len() {
            self.here = self.words[id].code_off;
            self.words.truncate(id);
        }
    }

    /// Case-insensitive dictionary lookup, linear in insertion order,
    /// returning the first match.
    pub fn find_word(&self, name: &str) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, w)| w.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id)
    }

    pub fn word_names(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(|w| w.name.as_str())
    }

    // ---- primitive registry -----------------------------------------------------

    pub fn add_primitive(&mut self, func: fn(&mut crate::runtime::ForthRuntime)) -> Option<usize> {
        if self.primitives.len() >= MAX_PRIMITIVES {
            self.msg
                .error("add_primitive", "PRIMITIVES AT CAPACITY", None::<bool>);
            return None;
        }
        self.primitives.push(func);
        Some(self.primitives.len() - 1)
    }

    pub fn primitive(&self, id: usize) -> fn(&mut crate::runtime::ForthRuntime) {
        self.primitives[id]
    }

    // ---- variable space -----------------------------------------------------

    /// Reserves one cell of variable space, returning its cell address.
    pub fn var_alloc_cell(&mut self) -> Option<usize> {
        if self.var_here >= VARSPACE_SIZE {
            self.msg
                .error("var_alloc_cell", "VARIABLE SPACE AT CAPACITY", None::<bool>);
            return None;
        }
        let addr = self.var_here;
        self.var_here += 1;
        self.var_set(addr, 0);
        Some(addr)
    }

    /// ALLOT: reserves `n` additional cells, returning the address of the
    /// first one (CREATE's data field).
    pub fn var_allot(&mut self, n: usize) -> Option<usize> {
        if self.var_here + n > VARSPACE_SIZE {
            self.msg
                .error("var_allot", "VARIABLE SPACE AT CAPACITY", None::<bool>);
            return None;
        }
        let addr = self.var_here;
        self.var_here += n;
        Some(addr)
    }

    pub fn var_get(&self, addr: usize) -> i64 {
        let byte = addr * 8;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.varspace[byte..byte + 8]);
        i64::from_le_bytes(buf)
    }

    pub fn var_set(&mut self, addr: usize, val: i64) {
        let byte = addr * 8;
        self.varspace[byte..byte + 8].copy_from_slice(&val.to_le_bytes());
    }

    pub fn var_in_range(&self, addr: usize) -> bool {
        addr < VARSPACE_SIZE
    }

    // ---- string pool -----------------------------------------------------

    /// Bump-allocates `bytes` at the top of the string pool, returning its
    /// address. Mirrors the C original's `stos_string`/`stos_strp` bump
    /// allocator.
    pub fn string_alloc(&mut self, bytes: &[u8]) -> Option<usize> {
        if self.string_sp + bytes.len() >= STRINGSPACE_SIZE {
            self.msg
                .error("string_alloc", "STRING TOO LONG", None::<bool>);
            return None;
        }
        let addr = self.string_sp;
        self.strings[addr..addr + bytes.len()].copy_from_slice(bytes);
        self.string_sp += bytes.len();
        Some(addr)
    }

    /// TYPE releases the top `len` bytes of the string pool (LIFO
    /// discipline: only valid when the string being released really is the
    /// most recent allocation, as the spec's testable properties assume).
    pub fn string_release(&mut self, len: usize) {
        self.string_sp = self.string_sp.saturating_sub(len);
    }

    pub fn string_bytes(&self, addr: usize, len: usize) -> &[u8] {
        &self.strings[addr..addr + len]
    }

    /// Writes a single byte into the string pool (`C!`). Only meaningful
    /// within bytes already reserved by `string_alloc`.
    pub fn string_write_byte(&mut self, addr: usize, byte: u8) {
        self.strings[addr] = byte;
    }
}

impl Default for Kernel {
    fn default() -> Kernel {
        Kernel::new()
    }
}

//////////////////////////////////////////////
/// TESTS
///
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_roundtrip() {
        let mut k = Kernel::new();
        assert!(k.push(42));
        assert_eq!(k.pop(), Some(42));
    }

    #[test]
    fn pop_on_empty_stack_reports_underflow_not_panic() {
        let mut k = Kernel::new();
        assert_eq!(k.pop(), None);
    }

    #[test]
    fn push_past_capacity_reports_overflow() {
        let mut k = Kernel::new();
        for i in 0..DATA_STACK_SIZE {
            assert!(k.push(i as i64));
        }
        assert!(!k.push(999));
    }

    #[test]
    fn create_and_find_word_case_insensitive() {
        let mut k = Kernel::new();
        let id = k.create_word("DUP", 0).unwrap();
        k.finish_word(id);
        assert_eq!(k.find_word("dup"), Some(id));
    }

    #[test]
    fn lookup_returns_first_defined_on_redefinition() {
        let mut k = Kernel::new();
        let first = k.create_word("foo", 0).unwrap();
        k.finish_word(first);
        let second = k.create_word("foo", 0).unwrap();
        k.finish_word(second);
        assert_eq!(k.find_word("foo"), Some(first));
    }

    #[test]
    fn abandon_word_truncates_dictionary_and_rewinds_here() {
        let mut k = Kernel::new();
        let before_here = k.here();
        let id = k.create_word("bad", 0).unwrap();
        k.emit_byte(0xff);
        k.abandon_word(id);
        assert_eq!(k.word_count(), id);
        assert_eq!(k.here(), before_here);
    }

    #[test]
    fn cell_roundtrips_through_bytecode() {
        let mut k = Kernel::new();
        let addr = k.here();
        k.emit_cell(-7);
        assert_eq!(k.read_cell(addr), -7);
    }

    #[test]
    fn var_space_roundtrips() {
        let mut k = Kernel::new();
        let addr = k.var_alloc_cell().unwrap();
        k.var_set(addr, 123);
        assert_eq!(k.var_get(addr), 123);
    }

    #[test]
    fn string_pool_is_lifo() {
        let mut k = Kernel::new();
        let a1 = k.string_alloc(b"hello").unwrap();
        k.string_release(5);
        let a2 = k.string_alloc(b"world").unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn compile_stack_balances() {
        let mut k = Kernel::new();
        assert!(k.cpush(10));
        assert_eq!(k.cpop(), Some(10));
        assert_eq!(k.compile_depth(), 0);
    }
}
