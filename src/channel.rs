//! Bounded, lock-free single-producer single-consumer channels.
//!
//! Used to pass messages between the audio thread and the control thread. Both ends never block
//! and never allocate after creation. When the channel is full, the message that should be sent
//! gets dropped and counted, so the audio thread never has to wait for a slow consumer.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crossbeam_queue::ArrayQueue;

// -------------------------------------------------------------------------------------------------

struct Shared<T> {
    queue: ArrayQueue<T>,
    dropped: AtomicUsize,
}

// -------------------------------------------------------------------------------------------------

/// Create a new channel with the given fixed capacity.
///
/// The returned sender and receiver can't be cloned: each side is owned by exactly one thread.
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    assert!(capacity > 0, "Channel capacity must be > 0");
    let shared = Arc::new(Shared {
        queue: ArrayQueue::new(capacity),
        dropped: AtomicUsize::new(0),
    });
    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver { shared },
    )
}

// -------------------------------------------------------------------------------------------------

/// Producing side of a [`channel`].
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// Try sending a message. Returns false and counts the message as dropped when the channel
    /// is full.
    #[inline]
    pub fn send(&mut self, message: T) -> bool {
        match self.shared.queue.push(message) {
            Ok(()) => true,
            Err(_) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// Number of messages that got dropped because the channel was full.
    pub fn dropped_count(&self) -> usize {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

// -------------------------------------------------------------------------------------------------

/// Consuming side of a [`channel`].
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// Pop the oldest pending message, if any.
    #[inline]
    pub fn recv(&mut self) -> Option<T> {
        self.shared.queue.pop()
    }

    /// Pop at most `max` pending messages in FIFO order.
    pub fn drain(&mut self, max: usize) -> Drain<'_, T> {
        Drain {
            receiver: self,
            remaining: max,
        }
    }

    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// Number of messages the sender dropped because the channel was full.
    pub fn dropped_count(&self) -> usize {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Bounded draining iterator, created by [`Receiver::drain`].
pub struct Drain<'a, T> {
    receiver: &'a mut Receiver<T>,
    remaining: usize,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.remaining == 0 {
            return None;
        }
        let message = self.receiver.recv()?;
        self.remaining -= 1;
        Some(message)
    }
}

// -------------------------------------------------------------------------------------------------
