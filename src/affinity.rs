// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Thread affinity tags.

Uploaders talk to graphics contexts, which usually must be driven from the thread that
created them.  Rather than lock, we remember the creating thread and abort on any use from
another one.
*/

use std::thread::ThreadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ThreadAffinity {
    thread: ThreadId,
}

impl ThreadAffinity {
    /// Tags the current thread.
    #[inline]
    pub fn current() -> Self {
        ThreadAffinity {
            thread: std::thread::current().id(),
        }
    }

    #[inline]
    pub fn verify(&self) {
        let current = std::thread::current().id();
        assert!(
            current == self.thread,
            "Uploader created on {:?} accessed from {:?}",
            self.thread,
            current
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_thread_passes() {
        ThreadAffinity::current().verify();
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn other_thread_aborts() {
        let affinity = ThreadAffinity::current();
        let result = std::thread::spawn(move || affinity.verify()).join();
        assert!(result.is_err());
    }
}
