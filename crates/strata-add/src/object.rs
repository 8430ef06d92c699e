use serde::{Deserialize, Serialize};
use strata_types::Key;

/// A record on the add output stream.
///
/// Each record is either a completion (an item was fully added) or a
/// progress update for a file still being read, never both. Serialized
/// untagged, so JSON consumers see `{"name", "hash"}` or `{"name", "bytes"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddedObject {
    Completed { name: String, hash: Key },
    Progress { name: String, bytes: u64 },
}

impl AddedObject {
    pub fn name(&self) -> &str {
        match self {
            Self::Completed { name, .. } | Self::Progress { name, .. } => name,
        }
    }

    pub fn hash(&self) -> Option<Key> {
        match self {
            Self::Completed { hash, .. } => Some(*hash),
            Self::Progress { .. } => None,
        }
    }

    pub fn bytes(&self) -> Option<u64> {
        match self {
            Self::Progress { bytes, .. } => Some(*bytes),
            Self::Completed { .. } => None,
        }
    }

    pub fn is_progress(&self) -> bool {
        matches!(self, Self::Progress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_has_hash_only() {
        let key = Key::digest(b"x");
        let obj = AddedObject::Completed {
            name: "a.txt".into(),
            hash: key,
        };
        assert_eq!(obj.hash(), Some(key));
        assert_eq!(obj.bytes(), None);
        assert!(!obj.is_progress());
        assert_eq!(obj.name(), "a.txt");
    }

    #[test]
    fn json_shapes() {
        let key = Key::digest(b"x");
        let done = AddedObject::Completed {
            name: "a".into(),
            hash: key,
        };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["hash"], key.to_hex());
        assert!(json.get("bytes").is_none());

        let progress: AddedObject = serde_json::from_str(r#"{"name":"a","bytes":12}"#).unwrap();
        assert_eq!(progress.bytes(), Some(12));
        assert_eq!(progress.hash(), None);
    }
}
