//! Storage of a running program: value stack, call stack and heap.
use rustc_hash::FxHashMap as HashMap;

use super::OperationError;

/// The machine state owned by a single run.
///
/// Every operation checks its preconditions before touching any state, so a failed
/// operation leaves the context as it was.
#[derive(Debug, Clone, Default)]
pub struct Context {
    stack: Vec<i64>,
    call_stack: Vec<usize>,
    heap: HashMap<i64, i64>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value stack, bottom first.
    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    pub fn into_stack(self) -> Vec<i64> {
        self.stack
    }

    /// Fails unless the value stack holds at least `required` values.
    pub fn require(&self, required: usize) -> Result<(), OperationError> {
        if self.stack.len() < required {
            return Err(OperationError::ValueStackTooSmall { required, stack_len: self.stack.len() });
        }
        Ok(())
    }

    pub fn push_num(&mut self, value: i64) {
        self.stack.push(value);
    }

    pub fn push_char(&mut self, c: char) {
        self.push_num(c as i64);
    }

    pub fn pop_num(&mut self) -> Result<i64, OperationError> {
        self.stack.pop().ok_or(OperationError::ValueStackEmpty)
    }

    /// Pops a value as a character. The value is truncated to 32 bits, values which
    /// are not Unicode scalar values become U+FFFD. This is not 8-bit truncation:
    /// 328 pops as `ň`, not `H`.
    pub fn pop_char(&mut self) -> Result<char, OperationError> {
        let value = self.pop_num()?;
        Ok(char::from_u32(value as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    pub fn discard_top(&mut self) -> Result<(), OperationError> {
        self.pop_num().map(|_| ())
    }

    /// Removes up to `n` values below the top one, or all of them if `n` is negative.
    /// Does nothing on an empty stack.
    pub fn discard_n(&mut self, n: i64) {
        let Some(top) = self.stack.pop() else {
            return;
        };
        let remove = if n < 0 {
            self.stack.len()
        } else {
            usize::try_from(n).unwrap_or(usize::MAX).min(self.stack.len())
        };
        self.stack.truncate(self.stack.len() - remove);
        self.stack.push(top);
    }

    /// Pushes a copy of the value `n` positions below the top (`0` is the top itself).
    pub fn dup_n(&mut self, n: usize) -> Result<(), OperationError> {
        self.require(n.saturating_add(1))?;
        let value = self.stack[self.stack.len() - 1 - n];
        self.stack.push(value);
        Ok(())
    }

    pub fn dup_top(&mut self) -> Result<(), OperationError> {
        self.dup_n(0)
    }

    pub fn swap_top(&mut self) -> Result<(), OperationError> {
        self.require(2)?;
        let len = self.stack.len();
        self.stack.swap(len - 1, len - 2);
        Ok(())
    }

    pub fn call(&mut self, return_address: usize) {
        self.call_stack.push(return_address);
    }

    pub fn ret(&mut self) -> Result<usize, OperationError> {
        self.call_stack.pop().ok_or(OperationError::CallStackEmpty)
    }

    pub fn heap_store(&mut self, address: i64, value: i64) {
        self.heap.insert(address, value);
    }

    pub fn heap_load(&self, address: i64) -> Result<i64, OperationError> {
        self.heap.get(&address).copied().ok_or(OperationError::UndefinedHeapAccess { address })
    }
}
