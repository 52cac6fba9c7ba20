use crate::core::object::{Object, ObjectType};
use crate::error::StoreResult;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub tree: String,
    pub parents: Vec<String>,
    pub author: Author,
    pub committer: Author,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
}

impl Commit {
    pub fn new(tree: String, parents: Vec<String>, author: Author, message: String) -> Self {
        let timestamp = author.timestamp;
        Self {
            tree,
            parents,
            committer: author.clone(),
            author,
            message,
            timestamp,
        }
    }

    pub fn from_object(obj: &Object) -> StoreResult<Self> {
        Ok(serde_json::from_slice(&obj.data)?)
    }

    pub fn to_object(&self) -> StoreResult<Object> {
        Ok(Object::new(ObjectType::Commit, serde_json::to_vec(self)?))
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    pub fn second_parent(&self) -> Option<&str> {
        self.parents.get(1).map(String::as_str)
    }

    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::at(name, email, Utc::now())
    }

    /// Timestamps are kept at whole-second resolution, like git's.
    pub fn at(name: impl Into<String>, email: impl Into<String>, when: DateTime<Utc>) -> Self {
        let timestamp = Utc
            .timestamp_opt(when.timestamp(), 0)
            .single()
            .unwrap_or(when);
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
        }
    }

    pub fn format_signature(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_truncate_to_seconds() {
        let when = Utc.timestamp_opt(1_700_000_000, 987_654_321).unwrap();
        let author = Author::at("A", "a@example.com", when);
        assert_eq!(author.timestamp.timestamp_subsec_nanos(), 0);
        assert_eq!(author.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn object_round_trip_preserves_parents() {
        let author = Author::new("A", "a@example.com");
        let commit = Commit::new(
            "t".repeat(64),
            vec!["p1".into(), "p2".into()],
            author,
            "Merge\n\nbody".into(),
        );
        let back = Commit::from_object(&commit.to_object().unwrap()).unwrap();
        assert_eq!(back, commit);
        assert!(back.is_merge());
        assert_eq!(back.second_parent(), Some("p2"));
        assert_eq!(back.short_message(), "Merge");
    }
}
