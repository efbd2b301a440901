pub mod backend;
pub mod cli;
pub mod error;
pub mod models;
pub mod space;
pub mod tuner;

pub use error::{Result, TunerError};
pub use models::{Observation, ParamSetting, ParamValue, Parameters};
