// caseprep-net/src/lib.rs
pub mod http;
pub mod validation;

pub use http::{build_http_client, download_with_retry};
pub use validation::{validate_url, verify_checksum};
