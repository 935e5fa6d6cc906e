use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// A write-once slot that other threads can block on.
#[derive(Debug)]
pub struct Completion<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T: Clone> Completion<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store `value` unless the slot is already filled. Returns whether it was stored.
    pub fn complete(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.ready.notify_all();
        true
    }

    pub fn is_complete(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn try_get(&self) -> Option<T> {
        self.slot.lock().clone()
    }

    pub fn wait(&self) -> T {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            self.ready.wait(&mut slot);
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            self.ready.wait_while_for(&mut slot, |s| s.is_none(), timeout);
        }
        slot.clone()
    }
}

impl<T: Clone> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_value_wins() {
        let c = Completion::new();
        assert!(c.complete(1));
        assert!(!c.complete(2));
        assert_eq!(c.wait(), 1);
        assert_eq!(c.try_get(), Some(1));
    }

    #[test]
    fn test_wait_across_threads() {
        let c = Arc::new(Completion::new());
        let producer = {
            let c = c.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                c.complete("done".to_string());
            })
        };

        assert_eq!(c.wait(), "done");
        producer.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let c: Completion<u8> = Completion::new();
        assert_eq!(c.wait_timeout(Duration::from_millis(5)), None);
        assert!(!c.is_complete());
    }
}
