//! Gateway implementations

mod memory;

pub use memory::MemoryGateway;
