/// General-purpose primitive words
///
/// Arithmetic, comparisons, stack shuffling, bitwise logic, memory access,
/// return-stack words, and the timing primitives. Every word here follows
/// the same convention: on a stack-depth or range violation it reports
/// through `msg` and calls `f_abort`, never panics.
use crate::runtime::ForthRuntime;
use std::thread;
use std::time::Duration;

const TRUE: i64 = crate::kernel::TRUE;
const FALSE: i64 = crate::kernel::FALSE;

impl ForthRuntime {
    fn pop1(&mut self) -> Option<i64> {
        match self.kernel.pop() {
            Some(v) => Some(v),
            None => {
                self.f_abort();
                None
            }
        }
    }

    fn pop2(&mut self) -> Option<(i64, i64)> {
        let b = self.pop1()?;
        let a = self.pop1()?;
        Some((a, b))
    }

    fn push(&mut self, v: i64) {
        if !self.kernel.push(v) {
            self.f_abort();
        }
    }

    fn flag(cond: bool) -> i64 {
        if cond {
            TRUE
        } else {
            FALSE
        }
    }

    // ---- arithmetic --------------------------------------------------------

    /// `+` ( n1 n2 -- n1+n2 )
    pub fn f_plus(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(a.wrapping_add(b));
        }
    }

    /// `-` ( n1 n2 -- n1-n2 )
    pub fn f_minus(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(a.wrapping_sub(b));
        }
    }

    /// `*` ( n1 n2 -- n1*n2 )
    pub fn f_times(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(a.wrapping_mul(b));
        }
    }

    /// `/` ( n1 n2 -- n1/n2 )
    pub fn f_divide(&mut self) {
        if let Some((a, b)) = self.pop2() {
            if b == 0 {
                self.msg.error("/", "DIVIDE BY ZERO", Some(a));
                self.f_abort();
            } else {
                self.push(a / b);
            }
        }
    }

    /// `mod` ( n1 n2 -- n1-mod-n2 )
    pub fn f_mod(&mut self) {
        if let Some((a, b)) = self.pop2() {
            if b == 0 {
                self.msg.error("mod", "DIVIDE BY ZERO", Some(a));
                self.f_abort();
            } else {
                self.push(a % b);
            }
        }
    }

    // ---- comparisons --------------------------------------------------------

    /// `=` ( n1 n2 -- f )
    pub fn f_equal(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(Self::flag(a == b));
        }
    }

    /// `<` ( n1 n2 -- f )
    pub fn f_less(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(Self::flag(a < b));
        }
    }

    /// `>` ( n1 n2 -- f )
    pub fn f_greater(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(Self::flag(a > b));
        }
    }

    /// `<=` ( n1 n2 -- f )
    pub fn f_less_equal(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(Self::flag(a <= b));
        }
    }

    /// `>=` ( n1 n2 -- f )
    pub fn f_greater_equal(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(Self::flag(a >= b));
        }
    }

    /// `0=` ( n -- f )
    pub fn f_0equal(&mut self) {
        if let Some(a) = self.pop1() {
            self.push(Self::flag(a == 0));
        }
    }

    /// `0<` ( n -- f )
    pub fn f_0less(&mut self) {
        if let Some(a) = self.pop1() {
            self.push(Self::flag(a < 0));
        }
    }

    /// `true` ( -- -1 )
    pub fn f_true(&mut self) {
        self.push(TRUE);
    }

    /// `false` ( -- 0 )
    pub fn f_false(&mut self) {
        self.push(FALSE);
    }

    // ---- stack shuffling ----------------------------------------------------

    /// `dup` ( n -- n n )
    pub fn f_dup(&mut self) {
        if let Some(v) = self.kernel.top() {
            self.push(v);
        } else {
            self.f_abort();
        }
    }

    /// `drop` ( n -- )
    pub fn f_drop(&mut self) {
        self.pop1();
    }

    /// `swap` ( n1 n2 -- n2 n1 )
    pub fn f_swap(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(b);
            self.push(a);
        }
    }

    /// `over` ( n1 n2 -- n1 n2 n1 )
    pub fn f_over(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(a);
            self.push(b);
            self.push(a);
        }
    }

    /// `rot` ( n1 n2 n3 -- n2 n3 n1 )
    pub fn f_rot(&mut self) {
        let c = match self.pop1() {
            Some(v) => v,
            None => return,
        };
        let b = match self.pop1() {
            Some(v) => v,
            None => return,
        };
        let a = match self.pop1() {
            Some(v) => v,
            None => return,
        };
        self.push(b);
        self.push(c);
        self.push(a);
    }

    /// `pick` ( ... n -- ... val ) Copies the nth item down from the top
    /// (0-based, after n itself is popped) to the top.
    pub fn f_pick(&mut self) {
        let n = match self.pop1() {
            Some(v) => v as usize,
            None => return,
        };
        match self.kernel.peek(n) {
            Some(v) => self.push(v),
            None => {
                self.msg.error("pick", "STACK UNDERFLOW", Some(n));
                self.f_abort();
            }
        }
    }

    /// `roll` ( ... n -- ... ) Removes the nth item down from the top and
    /// pushes it back at the top, shifting everything between down by one.
    pub fn f_roll(&mut self) {
        let n = match self.pop1() {
            Some(v) => v as usize,
            None => return,
        };
        if n == 0 {
            return;
        }
        match self.kernel.peek(n - 1) {
            Some(v) => v,
            None => {
                self.msg.error("roll", "STACK UNDERFLOW", Some(n));
                self.f_abort();
                return;
            }
        };
        let mut items = Vec::with_capacity(n);
        for _ in 0..=n {
            match self.kernel.pop() {
                Some(v) => items.push(v),
                None => {
                    self.f_abort();
                    return;
                }
            }
        }
        let rolled = items.pop().unwrap();
        while let Some(v) = items.pop() {
            self.push(v);
        }
        self.push(rolled);
    }

    // ---- bitwise logic ------------------------------------------------------

    /// `and` ( n1 n2 -- n1-and-n2 )
    pub fn f_and(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(a & b);
        }
    }

    /// `or` ( n1 n2 -- n1-or-n2 )
    pub fn f_or(&mut self) {
        if let Some((a, b)) = self.pop2() {
            self.push(a | b);
        }
    }

    // ---- memory access ------------------------------------------------------

    /// `@` ( addr -- n ) Fetches from variable space. REDESIGN: addr is a
    /// tagged cell offset into the managed variable space, never a raw host
    /// pointer.
    pub fn f_get(&mut self) {
        let addr = match self.pop1() {
            Some(v) => v as usize,
            None => return,
        };
        if self.kernel.var_in_range(addr) {
            let v = self.kernel.var_get(addr);
            self.push(v);
        } else {
            self.msg.error("@", "ADDRESS OUT OF RANGE", Some(addr));
            self.f_abort();
        }
    }

    /// `!` ( n addr -- ) Stores to variable space.
    pub fn f_store(&mut self) {
        let addr = match self.pop1() {
            Some(v) => v as usize,
            None => return,
        };
        let value = match self.pop1() {
            Some(v) => v,
            None => return,
        };
        if self.kernel.var_in_range(addr) {
            self.kernel.var_set(addr, value);
        } else {
            self.msg.error("!", "ADDRESS OUT OF RANGE", Some(addr));
            self.f_abort();
        }
    }

    /// `c@` ( addr -- c ) Reads a byte from the string pool.
    pub fn f_c_get(&mut self) {
        let addr = match self.pop1() {
            Some(v) => v as usize,
            None => return,
        };
        let byte = self.kernel.string_bytes(addr, 1)[0];
        self.push(byte as i64);
    }

    /// `c!` ( c addr -- ) Writes a byte into the string pool. Used only on
    /// bytes already allocated by `S"`/`CREATE`; out-of-range writes abort.
    pub fn f_c_store(&mut self) {
        let addr = match self.pop1() {
            Some(v) => v as usize,
            None => return,
        };
        let value = match self.pop1() {
            Some(v) => v,
            None => return,
        };
        if addr >= crate::kernel::STRINGSPACE_SIZE {
            self.msg.error("c!", "ADDRESS OUT OF RANGE", Some(addr));
            self.f_abort();
            return;
        }
        self.kernel.string_write_byte(addr, value as u8);
    }

    // ---- return-stack words -------------------------------------------------

    /// `>r` ( n -- ) Moves a value from the data stack to the return stack.
    pub fn f_to_r(&mut self) {
        if let Some(v) = self.pop1() {
            if !self.kernel.rpush(v) {
                self.f_abort();
            }
        }
    }

    /// `r>` ( -- n ) Moves a value from the return stack to the data stack.
    pub fn f_r_from(&mut self) {
        match self.kernel.rpop() {
            Some(v) => self.push(v),
            None => self.f_abort(),
        }
    }

    /// `r@` ( -- n ) Copies the top of the return stack to the data stack.
    pub fn f_r_get(&mut self) {
        match self.kernel.rtop() {
            Some(v) => self.push(v),
            None => self.f_abort(),
        }
    }

    /// `i` ( -- n ) Pushes the innermost DO loop's index.
    pub fn f_i(&mut self) {
        match self.kernel.rpeek(0) {
            Some(v) => self.push(v),
            None => {
                self.msg.error("i", "NOT IN A DO LOOP", None::<bool>);
                self.f_abort();
            }
        }
    }

    /// `j` ( -- n ) Pushes the next-outer DO loop's index.
    pub fn f_j(&mut self) {
        match self.kernel.rpeek(2) {
            Some(v) => self.push(v),
            None => {
                self.msg.error("j", "NOT IN A NESTED DO LOOP", None::<bool>);
                self.f_abort();
            }
        }
    }

    // ---- timing -------------------------------------------------------------

    /// `now` ( -- ) Resets the interpreter's elapsed-time clock.
    pub fn f_now(&mut self) {
        self.reset_timer();
    }

    /// `micros` ( -- n ) Microseconds since the last `NOW`.
    pub fn f_micros(&mut self) {
        let v = self.elapsed().as_micros() as i64;
        self.push(v);
    }

    /// `millis` ( -- n ) Milliseconds since the last `NOW`.
    pub fn f_millis(&mut self) {
        let v = self.elapsed().as_millis() as i64;
        self.push(v);
    }

    /// `ms` ( n -- ) Sleeps for n milliseconds.
    pub fn f_ms(&mut self) {
        if let Some(v) = self.pop1() {
            if v > 0 {
                thread::sleep(Duration::from_millis(v as u64));
            }
        }
    }
}
