// Structural types and runtime values for opgraph
// Types describe the shape of data flowing through an expression graph

pub mod boxed;
pub mod hint;
pub mod ty;
pub mod value;

pub use boxed::{box_value, unbox, BoxedValue, BoxingMode, MaybeBoxed, PathEdge, RefPath};
pub use hint::{parse_hint, HintExpr, TypeHints};
pub use ty::{AssignMode, Invalid, Type, TypeCategory, TypeOutcome};
pub use value::{type_of, Value};
