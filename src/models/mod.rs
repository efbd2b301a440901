mod observation;
mod param;

pub use observation::Observation;
pub use param::{Draw, ParamSetting, ParamValue, Parameters};
