#![allow(clippy::len_without_is_empty)]

/// A fixed-capacity ringbuffer that keeps the most recent items
#[derive(Debug, Default, Clone)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    ix: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// **Panics** if `capacity` is zero
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be positive");
        Self {
            buffer: Vec::<T>::with_capacity(capacity),
            ix: 0,
            capacity,
        }
    }

    /// Returns the number of items held, at most the capacity
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Insert an element into the buffer, overwriting the oldest element, and return the write index
    pub fn push(&mut self, item: T) -> usize {
        let ix = self.ix;
        if ix >= self.len() {
            self.buffer.push(item);
        } else {
            self.buffer[ix] = item;
        }
        self.ix = (ix + 1) % self.capacity;
        ix
    }

    /// Get a slice view of the internal buffer, in storage order
    pub fn view(&self) -> &[T] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ringbuffer_functional() {
        let mut buf = RingBuffer::new(3);
        assert_eq!(buf.len(), 0, "initialized empty");

        for x in [120.0, 340.0] {
            buf.push(x);
        }
        assert_eq!(buf.view(), [120.0, 340.0], "partially filled");

        buf.push(400.0);
        let ix = buf.push(95.0);
        assert_eq!(ix, 0, "write index wraps");
        assert_eq!(buf.len(), 3, "length capped at capacity");
        assert_eq!(buf.view(), [95.0, 340.0, 400.0], "oldest overwritten");
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn zero_capacity_panics() {
        RingBuffer::<f64>::new(0);
    }
}
