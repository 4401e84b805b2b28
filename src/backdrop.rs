//! Session-scoped reader backdrop.
//!
//! The reader darkens the surrounding chrome while it is open. The host
//! environment owns the actual style state; the engine only guarantees
//! balanced apply/restore so a torn-down session never leaks its override
//! into the next screen.

use log::debug;

pub trait StyleTarget {
    fn apply_reader_backdrop(&mut self);
    fn restore_backdrop(&mut self);
}

/// RAII scope for the backdrop override. Restores on drop, including the
/// early-exit paths of a failed initialization.
pub struct BackdropGuard<'a> {
    target: &'a mut dyn StyleTarget,
}

impl<'a> BackdropGuard<'a> {
    pub fn acquire(target: &'a mut dyn StyleTarget) -> Self {
        debug!("applying reader backdrop");
        target.apply_reader_backdrop();
        Self { target }
    }
}

impl Drop for BackdropGuard<'_> {
    fn drop(&mut self) {
        debug!("restoring backdrop");
        self.target.restore_backdrop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeTarget {
        applied: u32,
        restored: u32,
    }

    impl StyleTarget for FakeTarget {
        fn apply_reader_backdrop(&mut self) {
            self.applied += 1;
        }
        fn restore_backdrop(&mut self) {
            self.restored += 1;
        }
    }

    #[test]
    fn restore_is_balanced_with_apply() {
        let mut target = FakeTarget::default();
        {
            let _guard = BackdropGuard::acquire(&mut target);
        }
        {
            let _guard = BackdropGuard::acquire(&mut target);
        }
        assert_eq!(target.applied, 2);
        assert_eq!(target.restored, 2);
    }
}
