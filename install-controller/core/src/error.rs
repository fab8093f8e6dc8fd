pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the index, the apply client and their transports.
///
/// Components never decide what a failure means for an install; they return
/// one of these and the reconciler classifies it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No delegate or object exists for the requested scope.
    #[error("{0} not found")]
    NotFound(String),

    /// A create was rejected because the object already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The caller-supplied deadline expired before the call completed.
    #[error("deadline exceeded")]
    Timeout,

    /// The control plane could not be reached or asked us to retry.
    #[error("{0}")]
    Transient(String),

    /// The request can never succeed as issued.
    #[error("{0}")]
    Terminal(String),

    #[error("failed to update resource: {0}")]
    Update(Box<Error>),
}

// === impl Error ===

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn terminal(msg: impl std::fmt::Display) -> Self {
        Self::Terminal(msg.to_string())
    }

    pub fn transient(msg: impl std::fmt::Display) -> Self {
        Self::Transient(msg.to_string())
    }

    /// Wraps a failed replacement write, preserving its cause.
    pub fn update(cause: Self) -> Self {
        Self::Update(Box::new(cause))
    }

    /// Returns true if the failure may clear on its own and the pass should
    /// simply be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transient(_) => true,
            Self::Update(cause) => cause.is_transient(),
            _ => false,
        }
    }

    /// Returns true if retrying the same request can never succeed.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Terminal(_) => true,
            Self::Update(cause) => cause.is_terminal(),
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_wraps_cause() {
        let err = Error::update(Error::transient("connection reset"));
        assert_eq!(err.to_string(), "failed to update resource: connection reset");
        assert!(err.is_transient());
        assert!(!err.is_terminal());

        let err = Error::update(Error::terminal("spec.replicas: invalid"));
        assert!(err.is_terminal());
    }

    #[test]
    fn classification() {
        for (err, transient, terminal) in [
            (Error::Timeout, true, false),
            (Error::not_found("namespace ns-0"), false, false),
            (Error::AlreadyExists("deployments/op".into()), false, false),
            (Error::terminal("unsupported strategy"), false, true),
        ] {
            assert_eq!(err.is_transient(), transient, "{err}");
            assert_eq!(err.is_terminal(), terminal, "{err}");
        }
    }
}
