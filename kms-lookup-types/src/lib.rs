//! KMS Lookup Types
//!
//! Data contracts shared between the key discovery client and the
//! policy administration server that hosts it:
//! - access decision results produced by the policy engine
//! - the diagnostic response-data map returned to admin callers
//! - the `RemoteException` JSON error body

pub mod access_result;
pub mod error;
pub mod remote_exception;
pub mod response_data;

pub use access_result::AccessResult;
pub use error::*;
pub use remote_exception::{RemoteException, RemoteExceptionBody};
pub use response_data::ResponseData;
