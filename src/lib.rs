//! Request routing and unit RPC dispatch.
//!
//! A unit is anything with a single request entry point: a `Router` bound to
//! its state, or a `Unit` method table. Callers reach units through the
//! `Fetch` capability, either in process or over HTTP, and read results by
//! status class.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod rpc;
pub mod sessions;

pub use config::schema::HostConfig;
pub use http::response::{Outcome, TypedResponse};
pub use http::{HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use routing::{RouteContext, Router, RouterService, Validator, Verb};
pub use rpc::{Fetch, HttpStub, RpcClient, Unit};
pub use sessions::{Frame, SessionPool};
