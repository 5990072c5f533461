pub mod index;
pub mod linker;
pub mod similarity;

pub use index::EntityIndex;
pub use linker::{BatchOutcome, EntityLinker, LinkError, LinkOutcome, LinkRequest, LinkerConfig};
pub use similarity::similarity;
