use crate::error::{StoreError, StoreResult};
use ring::digest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
            ObjectType::Tag => "tag",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blob" => Some(ObjectType::Blob),
            "tree" => Some(ObjectType::Tree),
            "commit" => Some(ObjectType::Commit),
            "tag" => Some(ObjectType::Tag),
            _ => None,
        }
    }
}

/// A loose object: its type and payload, addressed by the hash of both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub kind: ObjectType,
    pub data: Vec<u8>,
}

impl Object {
    pub fn new(kind: ObjectType, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    pub fn blob(data: impl Into<Vec<u8>>) -> Self {
        Self::new(ObjectType::Blob, data.into())
    }

    pub fn id(&self) -> String {
        hash_content(&self.encode())
    }

    /// `"<type> <len>\0<payload>"`, the form that is hashed and stored.
    pub fn encode(&self) -> Vec<u8> {
        let header = format!("{} {}\0", self.kind.as_str(), self.data.len());
        let mut full_content = header.into_bytes();
        full_content.extend_from_slice(&self.data);
        full_content
    }

    pub fn decode(id: &str, raw: &[u8]) -> StoreResult<Self> {
        let corrupted = |reason: &str| StoreError::Corrupted {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let null_pos = raw
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| corrupted("no null terminator found"))?;
        let header = String::from_utf8_lossy(&raw[..null_pos]);
        let (kind, size) = header
            .split_once(' ')
            .ok_or_else(|| corrupted("invalid object header format"))?;
        let kind = ObjectType::parse(kind).ok_or_else(|| corrupted("unknown object type"))?;
        let expected_size: usize = size
            .parse()
            .map_err(|_| corrupted("invalid size in object header"))?;

        let data = raw[null_pos + 1..].to_vec();
        if data.len() != expected_size {
            return Err(corrupted("object size mismatch"));
        }
        if hash_content(raw) != id {
            return Err(corrupted("integrity verification failed"));
        }

        Ok(Self { kind, data })
    }
}

pub fn hash_content(content: &[u8]) -> String {
    let digest_result = digest::digest(&digest::SHA256, content);
    hex::encode(digest_result.as_ref())
}

pub fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

/// Whether `s` could be an abbreviated or full object id.
pub fn looks_like_id(s: &str) -> bool {
    s.len() >= 4 && s.len() <= 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_keeps_kind_and_payload() {
        let obj = Object::blob(b"hello\n".to_vec());
        let id = obj.id();
        let decoded = Object::decode(&id, &obj.encode()).unwrap();
        assert_eq!(decoded, obj);
    }

    #[test]
    fn decode_rejects_tampered_payload() {
        let obj = Object::blob(b"hello\n".to_vec());
        let id = obj.id();
        let mut raw = obj.encode();
        let last = raw.len() - 1;
        raw[last] = b'!';
        assert!(matches!(
            Object::decode(&id, &raw),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn identical_content_has_identical_id() {
        assert_eq!(Object::blob("a").id(), Object::blob("a").id());
        assert_ne!(
            Object::blob("a").id(),
            Object::new(ObjectType::Tree, b"a".to_vec()).id()
        );
    }

    #[test]
    fn id_shape() {
        let id = Object::blob("x").id();
        assert_eq!(id.len(), 64);
        assert!(looks_like_id(&id));
        assert_eq!(short_id(&id).len(), 7);
        assert!(!looks_like_id("main"));
    }
}
