//! Graph-guided multi-hop reasoning over a `GraphStore`.
//!
//! Given a goal, walks the graph hop by hop starting from the
//! best-matching node, retrieving supporting passages at each focus via a
//! caller-supplied `Retriever` and periodically re-grounding its working
//! context against the goal. Falls back to a single direct retrieval when
//! no seed node matches closely enough.

mod reasoner;

pub use reasoner::{
    graph_guided_answer, ReasoningAnswer, ReasoningHop, SourceRef, MAX_HOPS, MIN_CONFIDENCE, REGROUNDING_INTERVAL,
};
