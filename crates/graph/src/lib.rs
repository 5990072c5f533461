pub mod error;
pub mod memory;
pub mod neo4j;
pub mod store;
pub mod types;

pub use error::GraphError;
pub use memory::InMemoryGraph;
pub use neo4j::{GraphConfig, Neo4jGraph};
pub use store::GraphStore;
pub use types::{
    ChunkNode, CorefChain, CorefMention, Document, Entity, Mention, MentionKind, RelationEdge,
};
