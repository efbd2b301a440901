mod builtin;
mod model;
mod persistence;

pub use builtin::{
    default_klee_defaults, default_klee_document, default_klee_space, KLEE_SEARCH_HEURISTICS,
};
pub use model::{ParamSpec, ParameterModel, UsageCounts};
pub use persistence::{load_space, save_space, SpaceDocument};
