mod association;
mod driver;

pub use association::NcpState;
pub use driver::DriverState;
