// commax-api: Async Rust client for the COMMAX IoT cloud API
//
// Three endpoints, no session state: the caller supplies the bearer
// token on every call. Token lifecycle lives in `commax-core`.

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{CommaxClient, DEFAULT_API_URL, DEFAULT_AUTH_URL};
pub use error::Error;
pub use models::{
    AuthorizeRequest, AuthorizeResponse, CommandRequest, CommandResponse, DeviceObject, RawDevice,
    RawSubDevice, SUCCESS_CODE, SubDeviceCommand,
};
pub use transport::TransportConfig;
