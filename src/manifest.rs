//! Manifest payloads submitted to the cluster

use std::borrow::Cow;

use serde::Deserialize;

/// Multi-document YAML describing one or more cluster resources
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestPayload(Vec<u8>);

impl ManifestPayload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse every non-empty document in the payload
    pub fn documents(&self) -> Result<Vec<serde_yaml::Value>, serde_yaml::Error> {
        let mut docs = Vec::new();
        for doc in serde_yaml::Deserializer::from_slice(&self.0) {
            let value = serde_yaml::Value::deserialize(doc)?;
            if !value.is_null() {
                docs.push(value);
            }
        }
        Ok(docs)
    }
}

impl From<String> for ManifestPayload {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<&str> for ManifestPayload {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for ManifestPayload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A workload manifest together with the name of the pod it creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadFixture {
    pub name: String,
    pub manifest: ManifestPayload,
}

impl WorkloadFixture {
    pub fn new(name: impl Into<String>, manifest: impl Into<ManifestPayload>) -> Self {
        Self {
            name: name.into(),
            manifest: manifest.into(),
        }
    }
}
