pub mod buffer;
pub mod device;
pub mod fdpool;
pub mod largeblock;
pub mod probe;
pub mod producer;
pub mod request;
pub mod worker;

pub use probe::Device;
