//! Pipeline construction options.
//!
//! These are plumbed explicitly from the CLI into the leaves and writers
//! that need them; nothing in the engine reads global state.

/// Options fixed at pipeline construction time.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Spin up background decode/format threads as soon as the pipeline is
    /// built. When false, buffered leaves decode on the calling thread,
    /// which is preferable when the pipeline will immediately be seeked.
    pub eager: bool,
    /// Number of intervals per block exchanged over bounded queues.
    pub block_size: usize,
    /// Maximum number of blocks a background producer may run ahead of its
    /// consumer.
    pub max_head_start: usize,
}

impl PipelineOptions {
    pub const DEFAULT_BLOCK_SIZE: usize = 10_000;
    pub const DEFAULT_MAX_HEAD_START: usize = 3;
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            eager: true,
            block_size: Self::DEFAULT_BLOCK_SIZE,
            max_head_start: Self::DEFAULT_MAX_HEAD_START,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = PipelineOptions::default();
        assert!(opts.eager);
        assert_eq!(opts.block_size, 10_000);
        assert_eq!(opts.max_head_start, 3);
    }
}
