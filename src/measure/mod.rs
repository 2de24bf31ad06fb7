pub mod capture;
pub mod monitors;
pub mod pipeline;
pub mod preview;
pub mod probe;
pub mod report;
pub mod session;
pub mod traits;
pub mod types;
pub mod units;
