//! Fixed capacity single-producer/single-consumer queue.
//!
//! The queue is split into a [`Producer`] and a [`Consumer`] handle which may
//! live in different execution contexts (an interrupt and the main loop, for
//! example). Neither side ever blocks and no lock is taken.
//!
//! Backed by [`heapless::spsc::Queue`], which keeps one slot free: a
//! `RingQueue<T, N>` holds `N - 1` items.

use heapless::spsc;

pub struct RingQueue<T, const N: usize> {
    queue: spsc::Queue<T, N>,
}

impl<T, const N: usize> RingQueue<T, N> {
    pub const fn new() -> Self {
        Self {
            queue: spsc::Queue::new(),
        }
    }

    /// Items the queue can hold at once.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let (producer, consumer) = self.queue.split();
        (Producer { producer }, Consumer { consumer })
    }
}

impl<T, const N: usize> Default for RingQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write half of a [`RingQueue`].
pub struct Producer<'a, T, const N: usize> {
    producer: spsc::Producer<'a, T, N>,
}

impl<T, const N: usize> Producer<'_, T, N> {
    /// Appends `item`, handing it back if the queue is full.
    pub fn try_push(&mut self, item: T) -> Result<(), T> {
        self.producer.enqueue(item)
    }

    pub fn len(&self) -> usize {
        self.producer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producer.len() == 0
    }

    pub fn is_full(&self) -> bool {
        !self.producer.ready()
    }

    pub fn capacity(&self) -> usize {
        N - 1
    }
}

/// Read half of a [`RingQueue`].
pub struct Consumer<'a, T, const N: usize> {
    consumer: spsc::Consumer<'a, T, N>,
}

impl<T, const N: usize> Consumer<'_, T, N> {
    pub fn try_pop(&mut self) -> Option<T> {
        self.consumer.dequeue()
    }

    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.consumer.ready()
    }

    pub fn is_full(&self) -> bool {
        self.consumer.len() == N - 1
    }

    pub fn capacity(&self) -> usize {
        N - 1
    }
}
