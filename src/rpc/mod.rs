//! JSON-RPC 2.0 layer: envelope types, error mapping, parameter validation,
//! the closed method set, and the dispatcher that ties them together.

pub mod error;
pub mod methods;
pub mod params;
pub mod router;
pub mod types;

pub use error::RpcError;
pub use methods::Method;
pub use router::RpcRouter;
pub use types::{RpcRequest, RpcResponse};
