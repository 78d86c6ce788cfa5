//! Ports - interfaces the application layer consumes
//!
//! The domain defines what it needs from the backing store and from
//! channel providers; infrastructure supplies the implementations.

mod dispatch;
mod gateway;

pub use dispatch::ProviderDispatch;
pub use gateway::{Collection, Filter, GatewayResult, Order, StoreGateway};
