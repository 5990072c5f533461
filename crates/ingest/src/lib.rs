pub mod chunk;
pub mod chunker;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig};
