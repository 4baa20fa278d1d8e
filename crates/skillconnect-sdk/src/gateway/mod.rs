//! Remote gateway abstraction layer.
//!
//! Every query and mutation the client makes goes through [`RemoteGateway`]:
//! - [`HttpGateway`] talks to the REST service
//! - [`MockGateway`] keeps server state in memory for tests

pub mod credentials;
pub mod http;
pub mod mock;
pub mod traits;

pub use credentials::{CredentialSource, KeyValueCredential, StaticCredential, TOKEN_KEY};
pub use http::HttpGateway;
pub use mock::MockGateway;
pub use traits::RemoteGateway;
