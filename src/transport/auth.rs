//! Request signing hook.

use std::collections::HashMap;

/// Produces authentication headers for a config-server request.
///
/// When no signer is configured requests are sent unsigned.
pub trait RequestSigner: Send + Sync {
    /// Headers to attach to a GET of `url` on behalf of `app_id`.
    ///
    /// A `Host` entry, if returned, overrides the request's host header.
    fn headers(&self, url: &str, app_id: &str, secret: &str) -> HashMap<String, String>;
}
