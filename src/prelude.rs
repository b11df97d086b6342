//! Imports for syntax extensions.

pub use crate::IntoEndpointUrl as _;
pub use crate::bridge::Observer as _;
pub use crate::deserialize::ResponseDeserializer as _;
pub use crate::executor::RequestExecutor as _;
pub use crate::projection::Projection as _;
pub use futures::StreamExt as _;
