mod podmonitor;
mod probe;
mod prometheus;
mod servicemonitor;
mod status;
mod types;

pub use podmonitor::*;
pub use probe::*;
pub use prometheus::*;
pub use servicemonitor::*;
pub use status::*;
pub use types::*;
