//! Identifier Allocators
//!
//! Monotonic counters for MME-UE-S1AP-ID and M-TMSI with wraparound.

use crate::error::{MmeError, MmeResult};

/// Invalid UE S1AP ID
pub const INVALID_UE_S1AP_ID: u32 = 0xffffffff;
/// Largest assignable MME-UE-S1AP-ID
pub const MAX_MME_UE_S1AP_ID: u32 = INVALID_UE_S1AP_ID - 1;
/// Invalid M-TMSI
pub const INVALID_M_TMSI: u32 = 0xffffffff;
/// Largest assignable M-TMSI
pub const MAX_M_TMSI: u32 = INVALID_M_TMSI - 1;

/// M-TMSI seed of a freshly constructed store
pub const DEFAULT_M_TMSI_SEED: u32 = 0xa000;
/// M-TMSI seed used by the running service unless configured otherwise
pub const RUNTIME_M_TMSI_SEED: u32 = 0xf000;

/// Counter over `min..=max` that wraps back to `min`
#[derive(Debug, Clone)]
pub struct IdAllocator {
    name: &'static str,
    next: u32,
    min: u32,
    max: u32,
}

impl IdAllocator {
    /// Create an allocator; a seed outside the range starts at `min`
    pub fn new(name: &'static str, seed: u32, min: u32, max: u32) -> Self {
        let next = if (min..=max).contains(&seed) { seed } else { min };
        Self { name, next, min, max }
    }

    /// MME-UE-S1AP-ID allocator, seeded at 1
    pub fn mme_ue_s1ap_id() -> Self {
        Self::new("MME-UE-S1AP-ID", 1, 1, MAX_MME_UE_S1AP_ID)
    }

    /// M-TMSI allocator
    pub fn m_tmsi(seed: u32) -> Self {
        Self::new("M-TMSI", seed, 1, MAX_M_TMSI)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Value the next call to [`IdAllocator::next`] returns
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Return the current value and advance
    pub fn next(&mut self) -> u32 {
        let id = self.next;
        if id >= self.max {
            log::warn!("{} space wrapped around at {:#x}", self.name, id);
            self.next = self.min;
        } else {
            self.next = id + 1;
        }
        id
    }

    /// Draw the next value not held by a live context
    ///
    /// At most `live + 1` values are drawn; one of them must be free unless
    /// the range itself is smaller than the live set.
    pub fn next_unused<F>(&mut self, live: usize, in_use: F) -> MmeResult<u32>
    where
        F: Fn(u32) -> bool,
    {
        let span = (self.max - self.min) as usize + 1;
        for _ in 0..=live.min(span) {
            let id = self.next();
            if !in_use(id) {
                return Ok(id);
            }
            log::debug!("{} {:#x} still in use, skipping", self.name, id);
        }
        Err(MmeError::IdsExhausted(self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mme_ue_s1ap_id_sequence() {
        let mut ids = IdAllocator::mme_ue_s1ap_id();
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
        assert_eq!(ids.peek(), 3);
    }

    #[test]
    fn test_wraparound_skips_invalid() {
        let mut ids = IdAllocator::new("test", MAX_MME_UE_S1AP_ID, 1, MAX_MME_UE_S1AP_ID);
        assert_eq!(ids.next(), MAX_MME_UE_S1AP_ID);
        assert_eq!(ids.next(), 1);
    }

    #[test]
    fn test_seed_out_of_range() {
        let ids = IdAllocator::m_tmsi(INVALID_M_TMSI);
        assert_eq!(ids.peek(), 1);
        let ids = IdAllocator::m_tmsi(RUNTIME_M_TMSI_SEED);
        assert_eq!(ids.peek(), 0xf000);
    }

    #[test]
    fn test_next_unused_skips_live() {
        let mut ids = IdAllocator::new("test", 1, 1, 10);
        let live = [1u32, 2, 3];
        assert_eq!(ids.next_unused(live.len(), |id| live.contains(&id)).unwrap(), 4);
    }

    #[test]
    fn test_next_unused_exhausted() {
        let mut ids = IdAllocator::new("test", 1, 1, 4);
        let err = ids.next_unused(4, |_| true).unwrap_err();
        assert!(matches!(err, MmeError::IdsExhausted("test")));
    }
}
