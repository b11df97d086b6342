//! Bridges callback-driven HTTP transports into cancellable, single-emission streams.

#![forbid(unsafe_code)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bridge;
pub mod deserialize;
mod endpoint_url;
mod error;
pub mod executor;
pub mod http;
pub mod outcome;
pub mod prelude;
pub mod projection;
pub mod request;
pub mod response;
pub mod session;

pub use bridge::{Bridge, BridgeFault, BridgeStream, Observer, Subscription};
pub use endpoint_url::{EndpointUrl, EndpointUrlError, IntoEndpointUrl};
pub use error::{BoxedError, Error};
pub use outcome::{Outcome, RequestError};
pub use response::RawResponse;
pub use session::{Call, Session, SessionConfig, SessionError};

/// Documentation
pub mod _documentation {
    #[doc = include_str!("../README.md")]
    mod readme {}
    #[doc = include_str!("../CHANGELOG.md")]
    pub mod changelog {}
}

pub use bytes::Bytes;
