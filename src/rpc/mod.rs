//! Unit RPC.
//!
//! # Data Flow
//! ```text
//! RpcClient::call(method, args)
//!     → dispatcher.rs (POST /<method>, JSON argument array)
//!     → stub.rs (Fetch: in-process or HTTP)
//!     → unit.rs (method table lookup, argument decode, invoke)
//!     → Response → Outcome / TypedResponse
//! ```

pub mod dispatcher;
pub mod stub;
pub mod unit;

pub use dispatcher::RpcClient;
pub use stub::{Fetch, HttpStub};
pub use unit::{MethodCall, Unit, UnitBuilder};
