//! Liveness tokens for views that outlive their own load requests
//!
//! A view owns a [`Liveness`] and hands a [`LivenessToken`] to every request
//! it issues. Closing the view revokes the liveness; a result that arrives
//! afterwards finds its token dead and is discarded instead of touching the
//! torn-down view.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Owner side of a liveness flag
///
/// # Example
///
/// ```
/// use docshell_scheduler::Liveness;
///
/// let liveness = Liveness::new();
/// let token = liveness.token();
/// assert!(token.is_live());
///
/// liveness.revoke();
/// assert!(!token.is_live());
/// ```
#[derive(Debug)]
pub struct Liveness {
    live: Arc<AtomicBool>,
}

impl Liveness {
    /// Create a new liveness flag in the live state
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Hand out a token observing this liveness
    pub fn token(&self) -> LivenessToken {
        LivenessToken {
            live: self.live.clone(),
        }
    }

    /// Mark the owner as torn down
    ///
    /// Idempotent. Every token handed out so far observes the revocation.
    pub fn revoke(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Whether the owner is still live
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Liveness {
    fn drop(&mut self) {
        self.revoke();
    }
}

/// Observer side of a liveness flag
#[derive(Debug, Clone)]
pub struct LivenessToken {
    live: Arc<AtomicBool>,
}

impl LivenessToken {
    /// Whether the issuing owner is still live
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_liveness_is_live() {
        let liveness = Liveness::new();
        assert!(liveness.is_live());
        assert!(liveness.token().is_live());
    }

    #[test]
    fn test_revoke_reaches_all_tokens() {
        let liveness = Liveness::new();
        let first = liveness.token();
        let second = first.clone();

        liveness.revoke();

        assert!(!first.is_live());
        assert!(!second.is_live());
        assert!(!liveness.is_live());
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let liveness = Liveness::new();
        liveness.revoke();
        liveness.revoke();
        assert!(!liveness.is_live());
    }

    #[test]
    fn test_drop_revokes() {
        let liveness = Liveness::new();
        let token = liveness.token();
        drop(liveness);
        assert!(!token.is_live());
    }
}
