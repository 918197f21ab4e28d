mod prometheusagent;
mod scrapeconfig;

pub use prometheusagent::*;
pub use scrapeconfig::*;
