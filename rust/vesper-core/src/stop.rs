//! Cooperative cancellation: a reference-counted stop flag.
//!
//! A [`StopSource`] can request a stop; a [`StopToken`] can only observe one.
//! Both sides share a heap-allocated flag. Requesting a stop is a single
//! compare-and-swap, so `request_stop` returns `true` exactly once across
//! every source sharing the flag.
//!
//! `stop_possible` distinguishes "nobody can ever request a stop anymore"
//! from "a request may still arrive": it is `true` while at least one source
//! is alive, and stays `true` forever once a stop was requested.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Shared flag
// ---------------------------------------------------------------------------

/// The flag shared between sources and tokens.
///
/// `sources` counts live [`StopSource`] handles so tokens can answer
/// `stop_possible` after every source is gone.
struct StopFlag {
    requested: AtomicBool,
    sources: AtomicUsize,
}

impl StopFlag {
    fn stop_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    fn stop_possible(&self) -> bool {
        self.stop_requested() || self.sources.load(Ordering::Acquire) > 0
    }
}

// ---------------------------------------------------------------------------
// StopSource
// ---------------------------------------------------------------------------

/// The requesting side of a stop flag.
///
/// Cloning a source yields another handle to the same flag; the flag answers
/// `stop_possible() == false` only after every source is dropped without a
/// request.
pub struct StopSource {
    flag: Arc<StopFlag>,
}

impl StopSource {
    /// Create a fresh, unrequested stop flag with this as its only source.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(StopFlag {
                requested: AtomicBool::new(false),
                sources: AtomicUsize::new(1),
            }),
        }
    }

    /// Request a stop.
    ///
    /// Returns `true` for exactly one caller across all sources sharing this
    /// flag; later calls return `false`.
    pub fn request_stop(&self) -> bool {
        self.flag
            .requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether a stop has been requested on this flag.
    pub fn stop_requested(&self) -> bool {
        self.flag.stop_requested()
    }

    /// Whether a stop request is still possible (trivially true while this
    /// source is alive).
    pub fn stop_possible(&self) -> bool {
        self.flag.stop_possible()
    }

    /// Obtain an observing token for this flag.
    pub fn token(&self) -> StopToken {
        StopToken {
            flag: Arc::clone(&self.flag),
        }
    }
}

impl Default for StopSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StopSource {
    fn clone(&self) -> Self {
        self.flag.sources.fetch_add(1, Ordering::AcqRel);
        Self {
            flag: Arc::clone(&self.flag),
        }
    }
}

impl Drop for StopSource {
    fn drop(&mut self) {
        self.flag.sources.fetch_sub(1, Ordering::AcqRel);
    }
}

impl PartialEq for StopSource {
    /// Sources compare equal when they share the same flag.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.flag, &other.flag)
    }
}

impl Eq for StopSource {}

impl fmt::Debug for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSource")
            .field("stop_requested", &self.stop_requested())
            .field("stop_possible", &self.stop_possible())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StopToken
// ---------------------------------------------------------------------------

/// The observing side of a stop flag.
///
/// Tokens are freely clonable and never extend the lifetime of the request
/// capability: once every source is gone, `stop_possible` turns false unless
/// a stop was already requested.
#[derive(Clone)]
pub struct StopToken {
    flag: Arc<StopFlag>,
}

impl StopToken {
    /// Whether a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.flag.stop_requested()
    }

    /// Whether a stop request is still possible.
    pub fn stop_possible(&self) -> bool {
        self.flag.stop_possible()
    }
}

impl PartialEq for StopToken {
    /// Tokens compare equal when they share the same flag.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.flag, &other.flag)
    }
}

impl Eq for StopToken {}

impl fmt::Debug for StopToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopToken")
            .field("stop_requested", &self.stop_requested())
            .field("stop_possible", &self.stop_possible())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    // -- request semantics -------------------------------------------------

    #[test]
    fn request_stop_succeeds_once() {
        let source = StopSource::new();
        assert!(source.request_stop());
        assert!(!source.request_stop());
        assert!(source.stop_requested());
    }

    #[test]
    fn request_stop_succeeds_once_across_clones() {
        let a = StopSource::new();
        let b = a.clone();
        assert!(a.request_stop());
        assert!(!b.request_stop());
        assert!(b.stop_requested());
    }

    #[test]
    fn concurrent_requests_have_a_single_winner() {
        let source = StopSource::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = source.clone();
            handles.push(thread::spawn(move || s.request_stop()));
        }
        let winners: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        // The parent source did not request, so exactly one thread won.
        assert_eq!(winners, 1);
    }

    // -- token observation -------------------------------------------------

    #[test]
    fn token_observes_request() {
        let source = StopSource::new();
        let token = source.token();
        assert!(!token.stop_requested());
        source.request_stop();
        assert!(token.stop_requested());
    }

    #[test]
    fn stop_possible_false_after_last_source_drops() {
        let source = StopSource::new();
        let token = source.token();
        assert!(token.stop_possible());
        drop(source);
        assert!(!token.stop_possible());
        assert!(!token.stop_requested());
    }

    #[test]
    fn stop_possible_true_forever_once_requested() {
        let source = StopSource::new();
        let token = source.token();
        source.request_stop();
        drop(source);
        assert!(token.stop_possible());
        assert!(token.stop_requested());
    }

    #[test]
    fn cloned_source_keeps_stop_possible() {
        let a = StopSource::new();
        let b = a.clone();
        let token = a.token();
        drop(a);
        assert!(token.stop_possible());
        drop(b);
        assert!(!token.stop_possible());
    }

    // -- identity ----------------------------------------------------------

    #[test]
    fn equality_is_flag_identity() {
        let a = StopSource::new();
        let b = a.clone();
        let c = StopSource::new();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.token(), b.token());
        assert_ne!(a.token(), c.token());
    }

    #[test]
    fn debug_formats_report_state() {
        let source = StopSource::new();
        let dbg = format!("{:?}", source.token());
        assert!(dbg.contains("StopToken"));
        assert!(dbg.contains("stop_requested: false"));
    }
}
