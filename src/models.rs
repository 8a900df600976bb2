use serde::{Deserialize, Serialize};

/// One entry of the `GET /files` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    pub name: String,
    pub url: String,
}
