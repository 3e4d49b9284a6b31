//! Correlation identifier pool
//!
//! Sessions that have not logged in yet are told apart by a one-byte
//! correlation id carried in the login request header and echoed in the
//! response. Zero is never handed out; it signals an exhausted pool.

use sofia_protocol::CorrelationId;

/// Number of distinct correlation ids (1..=255)
pub const ID_CAPACITY: usize = u8::MAX as usize;

/// Lowest-free-first allocator over the correlation id space
#[derive(Debug, Clone)]
pub struct IdAllocator {
    /// `in_use[i]` tracks id `i + 1`
    in_use: Vec<bool>,
    /// Number of ids currently handed out
    allocated: usize,
}

impl IdAllocator {
    /// Create an allocator over the full id space
    pub fn new() -> Self {
        Self::with_capacity(ID_CAPACITY)
    }

    /// Create an allocator over ids `1..=capacity`
    ///
    /// Capacities above [`ID_CAPACITY`] are clamped.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            in_use: vec![false; capacity.min(ID_CAPACITY)],
            allocated: 0,
        }
    }

    /// Hand out the lowest free id, or [`CorrelationId::NONE`] when every id is taken
    pub fn acquire(&mut self) -> CorrelationId {
        match self.in_use.iter().position(|used| !used) {
            Some(index) => {
                self.in_use[index] = true;
                self.allocated += 1;
                CorrelationId::new((index + 1) as u8)
            }
            None => CorrelationId::NONE,
        }
    }

    /// Return an id to the pool
    ///
    /// Releasing the sentinel, an id outside the pool, or an id that is
    /// already free does nothing.
    pub fn release(&mut self, id: CorrelationId) {
        if id.is_none() {
            return;
        }
        if let Some(slot) = self.in_use.get_mut(id.as_u8() as usize - 1) {
            if *slot {
                *slot = false;
                self.allocated -= 1;
            }
        }
    }

    /// Whether `id` is currently handed out
    pub fn is_in_use(&self, id: CorrelationId) -> bool {
        !id.is_none()
            && self
                .in_use
                .get(id.as_u8() as usize - 1)
                .copied()
                .unwrap_or(false)
    }

    /// Number of ids currently handed out
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Size of the pool
    pub fn capacity(&self) -> usize {
        self.in_use.len()
    }

    /// Whether no id is left
    pub fn is_exhausted(&self) -> bool {
        self.allocated == self.in_use.len()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
