//! Bookkeeping of which pins of a driver are handed out.
use crate::{GpioError, GpioResult};
use bitvec::vec::BitVec;
use std::sync::atomic::AtomicU8;

pub(crate) struct PinClaims {
    used: BitVec<AtomicU8>,
}

impl PinClaims {
    pub(crate) fn new(count: usize) -> Self {
        PinClaims {
            used: BitVec::repeat(false, count),
        }
    }

    pub(crate) fn is_claimed(&self, index: usize) -> bool {
        self.used.get(index).is_some_and(|bit| *bit)
    }

    /// Claims every index, or none of them.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if an index is out of range or listed twice.
    /// - `GpioError::AlreadyInUse` if an index is already claimed.
    pub(crate) fn claim(&self, indices: &[usize]) -> GpioResult<()> {
        for (position, &index) in indices.iter().enumerate() {
            if index >= self.used.len() || indices[..position].contains(&index) {
                return Err(GpioError::InvalidArgument);
            }
        }

        if indices.iter().any(|&index| self.is_claimed(index)) {
            return Err(GpioError::AlreadyInUse);
        }

        for &index in indices {
            self.used.set_aliased(index, true);
        }
        Ok(())
    }

    pub(crate) fn release(&self, indices: &[usize]) {
        for &index in indices {
            if index < self.used.len() {
                self.used.set_aliased(index, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_index_claims_nothing() {
        let claims = PinClaims::new(8);
        assert_eq!(claims.claim(&[4, 4, 5, 6]), Err(GpioError::InvalidArgument));
        assert!((0..8).all(|index| !claims.is_claimed(index)));
    }

    #[test]
    fn conflict_claims_nothing() {
        let claims = PinClaims::new(8);
        claims.claim(&[6]).unwrap();
        assert_eq!(claims.claim(&[4, 5, 6]), Err(GpioError::AlreadyInUse));
        assert!(!claims.is_claimed(4));
        assert!(!claims.is_claimed(5));
    }

    #[test]
    fn out_of_range_claims_nothing() {
        let claims = PinClaims::new(8);
        assert_eq!(claims.claim(&[1, 8]), Err(GpioError::InvalidArgument));
        assert!(!claims.is_claimed(1));
    }

    #[test]
    fn released_pins_can_be_claimed_again() {
        let claims = PinClaims::new(8);
        claims.claim(&[1, 2]).unwrap();
        claims.release(&[1, 2]);
        claims.claim(&[2, 1]).unwrap();
        assert!(claims.is_claimed(1) && claims.is_claimed(2));
    }
}
