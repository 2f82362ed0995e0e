// BufferPool - recycled sample blocks moving between capture and analysis
//
// Two lock-free SPSC ring buffers form an object pool, so the capture side
// never allocates once the session is running:
// - data queue: capture side pushes filled blocks, session worker pops them
// - pool queue: session worker returns drained blocks, capture side reuses them

use rtrb::{Consumer, Producer};

pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Pre-allocated block of f32 samples
pub type PooledBuffer = Vec<f32>;

/// Producer/consumer ends of the two pool queues
pub struct BufferPoolChannels {
    /// Capture side: hands filled blocks to the worker
    pub data_producer: Producer<PooledBuffer>,
    /// Worker side: receives filled blocks
    pub data_consumer: Consumer<PooledBuffer>,
    /// Worker side: returns drained blocks
    pub pool_producer: Producer<PooledBuffer>,
    /// Capture side: takes empty blocks to fill
    pub pool_consumer: Consumer<PooledBuffer>,
}

/// Capture-side half of a split pool
pub struct CaptureChannels {
    pub data_producer: Producer<PooledBuffer>,
    pub pool_consumer: Consumer<PooledBuffer>,
}

/// Worker-side half of a split pool
pub struct WorkerChannels {
    pub data_consumer: Consumer<PooledBuffer>,
    pub pool_producer: Producer<PooledBuffer>,
}

impl BufferPoolChannels {
    /// Split into the halves owned by the capture side and the worker thread
    pub fn split_for_threads(self) -> (CaptureChannels, WorkerChannels) {
        (
            CaptureChannels {
                data_producer: self.data_producer,
                pool_consumer: self.pool_consumer,
            },
            WorkerChannels {
                data_consumer: self.data_consumer,
                pool_producer: self.pool_producer,
            },
        )
    }
}

/// Lock-free pool of `buffer_count` blocks of `buffer_size` samples
pub struct BufferPool;

impl BufferPool {
    /// Allocate every block up front and park them in the pool queue
    ///
    /// # Panics
    /// Panics if `buffer_count` or `buffer_size` is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, buffer_size: usize) -> BufferPoolChannels {
        assert!(buffer_count > 0, "buffer_count must be greater than 0");
        assert!(buffer_size > 0, "buffer_size must be greater than 0");

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(buffer_count);

        for _ in 0..buffer_count {
            // Capacity equals buffer_count, so these pushes cannot fail
            let _ = pool_producer.push(Vec::with_capacity(buffer_size));
        }

        BufferPoolChannels {
            data_producer,
            data_consumer,
            pool_producer,
            pool_consumer,
        }
    }
}

impl CaptureChannels {
    /// Copy `samples` into pooled blocks and queue them for the worker
    ///
    /// Returns the number of samples queued; fewer than `samples.len()` when
    /// the pool runs dry or the data queue is full.
    pub fn push_samples(&mut self, samples: &[f32], block_size: usize) -> usize {
        let mut queued = 0;
        for chunk in samples.chunks(block_size.max(1)) {
            let mut block = match self.pool_consumer.pop() {
                Ok(block) => block,
                Err(_) => break,
            };
            block.clear();
            block.extend_from_slice(chunk);
            if self.data_producer.push(block).is_err() {
                break;
            }
            queued += chunk.len();
        }
        queued
    }
}
