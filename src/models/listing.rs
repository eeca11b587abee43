//! Upstream model-listing payload (`GET /v1/models`).

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ModelListing {
    #[serde(default)]
    pub data: Vec<ListedModel>,
}

#[derive(Debug, Deserialize)]
pub struct ListedModel {
    pub id: String,
}

impl ModelListing {
    /// Parse a listing body; anything unparseable counts as "no models".
    pub fn from_slice(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// The model the backend is serving, if it has loaded one.
    pub fn current(&self) -> Option<&str> {
        self.data.first().map(|m| m.id.as_str())
    }

    pub fn ids(&self) -> Vec<String> {
        self.data.iter().map(|m| m.id.clone()).collect()
    }
}
