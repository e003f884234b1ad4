//! # gflow-graph
//!
//! A versioned, write-ahead-logged property graph store plus the builder
//! that turns raw text chunks into procedure/step/source-doc/entity/concept/
//! rule nodes and the edges between them.

pub mod builder;
pub mod store;

pub use builder::{
    build_knowledge_graph_from_chunks, build_procedure_from_chunks, Chunk, KnowledgeGraphResult,
    PendingEdge, PendingNode, ProcedureGraph,
};
pub use store::{EdgeKind, GraphStore, Node, NodeKind, Stats, MAX_DEPTH, MAX_NEIGHBORS};
