pub mod coref;
pub mod relations;
pub mod token;

pub use coref::{CorefConfig, CorefLink, CorefResolver};
pub use relations::{RelationExtractor, RelationMention};
