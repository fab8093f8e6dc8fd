use kube::Resource;
use std::fmt;

/// The stable identity of an object, used to deduplicate views that may
/// overlap.
///
/// Objects read from the API server always carry a UID. Objects without one
/// (i.e. not yet persisted) are identified by their namespace and name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identity {
    Uid(String),
    Name {
        namespace: Option<String>,
        name: String,
    },
}

/// Routes requirement lookups to the index responsible for a kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

// === impl Identity ===

impl Identity {
    pub fn of<K: Resource>(obj: &K) -> Self {
        let meta = obj.meta();
        match meta.uid.as_ref() {
            Some(uid) if !uid.is_empty() => Self::Uid(uid.clone()),
            _ => Self::Name {
                namespace: meta.namespace.clone(),
                name: meta.name.clone().unwrap_or_default(),
            },
        }
    }

    /// The object's UID, if it was persisted.
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::Uid(uid) => Some(uid),
            Self::Name { .. } => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uid(uid) => uid.fmt(f),
            Self::Name {
                namespace: Some(ns),
                name,
            } => write!(f, "{ns}/{name}"),
            Self::Name {
                namespace: None,
                name,
            } => name.fmt(f),
        }
    }
}

// === impl GroupKind ===

impl GroupKind {
    pub fn new(group: impl ToString, kind: impl ToString) -> Self {
        Self {
            group: group.to_string(),
            kind: kind.to_string(),
        }
    }

    /// Returns the group and kind of a statically typed resource.
    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self::new(K::group(&()), K::kind(&()))
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            self.kind.fmt(f)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}
