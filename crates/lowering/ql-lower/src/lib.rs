//! Lowering planner
//!
//! Turns the checked program, its closure contexts and its dynamic-value
//! decisions into a [`LoweringPlan`]: concrete field offsets, vtable slots,
//! static globals, context shapes, per-variable storage and the fixed memory
//! regions. [`emit`] then hands the plan to an external [`IrBuilder`].

pub mod builder;
pub mod emit;
pub mod error;
pub mod layout;
pub mod plan;

pub use builder::{GlobalInit, IrBuilder, IrType, RecordingBuilder};
pub use emit::emit;
pub use error::{IrBuilderError, LowerPlanError};
pub use layout::{align_up, LayoutPolicy, MemoryPlan, StringPool, FIELD_SLOT_SIZE};
pub use plan::{
    ir_type, plan_program, ClassPlan, ContextPlan, ExportPlan, FieldPlan, FunctionPlan, GlobalKind,
    GlobalPlan, ImportPlan, InitPlan, LoweringPlan, PlanOptions, SlotPlan, VarStorage,
};
