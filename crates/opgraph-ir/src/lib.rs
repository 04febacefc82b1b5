// Lazy expression graph for opgraph
// Calls to declared operations are recorded as typed nodes rather than run,
// and the resulting graph can be analyzed for tag lineage before evaluation.

pub mod builder;
pub mod call;
pub mod config;
pub mod context;
pub mod evaluator;
pub mod node;
pub mod stitch;

mod traversal;

pub use builder::make_output_node;
pub use call::{Arg, CallOutput, Called, OpCall};
pub use config::{DispatchConfig, EngineConfig, ExecutionMode, RefineConfig};
pub use context::Context;
pub use evaluator::Evaluator;
pub use node::{ConstValue, Node, NodeId, NodeKind};
pub use stitch::{analyze, StitchGraph};
pub use traversal::{expr_vars, walk};
