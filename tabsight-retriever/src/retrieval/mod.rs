pub mod gateway;

pub use gateway::{GatewayConfig, GatewayError, RetrievalGateway};
