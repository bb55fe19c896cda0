// Lock-free buffer pool between the audio callback and the capture worker
//
// Object pool over two SPSC (single producer, single consumer) ring buffers,
// keeping the audio callback free of heap allocation:
// - DATA queue: callback pushes filled sample buffers, worker consumes
// - POOL queue: worker returns drained buffers, callback recycles
//
// If the pool runs dry (worker stalled), the callback drops the block; the
// snapshot consumer only ever wants the latest spectrum anyway.

use rtrb::{Consumer, Producer, RingBuffer};

/// Number of buffers circulating between the two threads
pub const POOL_BUFFER_COUNT: usize = 32;

/// Capacity of each buffer in interleaved f32 samples
pub const POOL_BUFFER_CAPACITY: usize = 4096;

/// Interleaved sample buffer - pre-allocated, reused for the process lifetime
pub type SampleBuffer = Vec<f32>;

/// Callback-side ends of the two queues.
pub struct CallbackChannels {
    /// Push filled buffers toward the worker
    pub data_producer: Producer<SampleBuffer>,
    /// Recycle drained buffers from the worker
    pub pool_consumer: Consumer<SampleBuffer>,
}

/// Worker-side ends of the two queues.
pub struct WorkerChannels {
    /// Receive filled buffers from the callback
    pub data_consumer: Consumer<SampleBuffer>,
    /// Return drained buffers to the callback
    pub pool_producer: Producer<SampleBuffer>,
}

/// Lock-free buffer pool factory.
pub struct BufferPool;

impl BufferPool {
    /// Pre-allocate `buffer_count` buffers of `capacity` samples and seed the
    /// pool queue with them. This is the only place the pool allocates.
    ///
    /// # Panics
    /// Panics if `buffer_count` or `capacity` is 0.
    pub fn new(buffer_count: usize, capacity: usize) -> (CallbackChannels, WorkerChannels) {
        assert!(buffer_count > 0, "buffer_count must be greater than 0");
        assert!(capacity > 0, "capacity must be greater than 0");

        let (mut pool_producer, pool_consumer) = RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = RingBuffer::new(buffer_count);

        for _ in 0..buffer_count {
            pool_producer
                .push(Vec::with_capacity(capacity))
                .expect("seed buffer exceeds pool queue capacity");
        }

        (
            CallbackChannels {
                data_producer,
                pool_consumer,
            },
            WorkerChannels {
                data_consumer,
                pool_producer,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_starts_full_and_data_empty() {
        let (mut callback, mut worker) = BufferPool::new(8, 1024);

        let mut available = 0;
        while callback.pool_consumer.pop().is_ok() {
            available += 1;
        }
        assert_eq!(available, 8);
        assert!(worker.data_consumer.pop().is_err());
    }

    #[test]
    fn test_buffer_circulation() {
        let (mut callback, mut worker) = BufferPool::new(2, 64);

        // Callback side: fill and hand over.
        let mut buffer = callback.pool_consumer.pop().unwrap();
        buffer.clear();
        buffer.extend_from_slice(&[0.25, -0.5]);
        callback.data_producer.push(buffer).unwrap();

        // Worker side: drain and recycle.
        let buffer = worker.data_consumer.pop().unwrap();
        assert_eq!(buffer.as_slice(), &[0.25, -0.5]);
        worker.pool_producer.push(buffer).unwrap();

        assert!(callback.pool_consumer.pop().is_ok());
    }

    #[test]
    fn test_channels_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CallbackChannels>();
        assert_send::<WorkerChannels>();
    }

    #[test]
    #[should_panic(expected = "buffer_count must be greater than 0")]
    fn test_zero_buffer_count_panics() {
        BufferPool::new(0, 64);
    }
}
