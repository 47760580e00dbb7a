mod chunk;
mod pool;
mod sample;

pub use chunk::Chunk;
pub use pool::{ArenaConfig, Pool, SampleAllocator};
pub use sample::Sample;

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("chunk capacity must be greater than 0")]
    ZeroChunkCapacity,

    #[error("arena needs at least {needed} chunks, got {got}")]
    TooFewChunks { needed: usize, got: usize },
}
