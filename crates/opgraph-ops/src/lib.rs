// Operation registry, declaration facility and dispatcher
// Operations are declared once, registered by fully-qualified name, and
// selected per call site by the types of their arguments

pub mod declare;
pub mod dispatch;
pub mod mapped;
pub mod op_def;
pub mod registry;

pub use declare::OpDeclaration;
pub use dispatch::{
    dispatch, find_op, DispatchMiss, DispatchPolicy, DispatchStatus, Dispatched, MissKind, GETITEM,
    PICK,
};
pub use mapped::{derive_mapped, mapped_name};
pub use op_def::{
    common_name, ArgTypes, OpArgs, OpDef, OutputType, OutputTypeFn, ParamSignature, Resolver,
    ResolverFn, ResolverSignature, SetterFn,
};
pub use registry::{type_categories, OpRegistry, MAPPED};
