//! Topic names.
//!
//! Topics are addressed as `persistent://tenant/namespace/topic` (or
//! `non-persistent://...`). Short forms are expanded: `tenant/namespace/topic`
//! is persistent, and a bare `topic` lives in `public/default`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_TENANT: &str = "public";
const DEFAULT_NAMESPACE: &str = "default";

/// Error returned when a topic name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicNameError {
    /// The name was empty
    #[error("topic name must not be empty")]
    Empty,
    /// The scheme before `://` is not a known topic domain
    #[error("unknown topic domain `{0}`")]
    UnknownDomain(String),
    /// The path did not have the `tenant/namespace/topic` shape
    #[error("invalid topic name `{0}`, expected tenant/namespace/topic")]
    InvalidPath(String),
    /// A namespace did not have the `tenant/namespace` shape
    #[error("invalid namespace `{0}`, expected tenant/namespace")]
    InvalidNamespace(String),
}

/// Storage class of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicDomain {
    /// Messages are durably stored
    Persistent,
    /// Messages are only held in memory
    NonPersistent,
}

impl TopicDomain {
    /// The URL scheme for this domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicDomain::Persistent => "persistent",
            TopicDomain::NonPersistent => "non-persistent",
        }
    }
}

/// A fully-qualified topic name.
///
/// # Example
/// ```
/// use publish_throttle::TopicName;
///
/// let topic: TopicName = "persistent://prop/ns-abc/orders".parse().unwrap();
/// assert_eq!(topic.namespace(), "prop/ns-abc");
///
/// let short = TopicName::parse("orders").unwrap();
/// assert_eq!(short.to_string(), "persistent://public/default/orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicName {
    domain: TopicDomain,
    tenant: String,
    namespace: String,
    local_name: String,
}

impl TopicName {
    /// Parse and normalize a topic name.
    ///
    /// # Errors
    /// Returns `TopicNameError` if the name is empty, uses an unknown domain,
    /// or has the wrong number of path segments.
    pub fn parse(name: &str) -> Result<Self, TopicNameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TopicNameError::Empty);
        }

        let (domain, path) = match name.split_once("://") {
            Some(("persistent", rest)) => (TopicDomain::Persistent, rest),
            Some(("non-persistent", rest)) => (TopicDomain::NonPersistent, rest),
            Some((other, _)) => return Err(TopicNameError::UnknownDomain(other.to_string())),
            None => (TopicDomain::Persistent, name),
        };

        let parts: Vec<&str> = path.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(TopicNameError::InvalidPath(name.to_string()));
        }

        match (parts.as_slice(), path.len() == name.len()) {
            // Bare local name, only without an explicit domain
            ([local], true) => Ok(Self {
                domain,
                tenant: DEFAULT_TENANT.to_string(),
                namespace: DEFAULT_NAMESPACE.to_string(),
                local_name: (*local).to_string(),
            }),
            ([tenant, namespace, local], _) => Ok(Self {
                domain,
                tenant: (*tenant).to_string(),
                namespace: (*namespace).to_string(),
                local_name: (*local).to_string(),
            }),
            _ => Err(TopicNameError::InvalidPath(name.to_string())),
        }
    }

    /// Storage class of the topic.
    pub fn domain(&self) -> TopicDomain {
        self.domain
    }

    /// Owning tenant.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Namespace path, `tenant/namespace`.
    pub fn namespace(&self) -> String {
        format!("{}/{}", self.tenant, self.namespace)
    }

    /// Topic name within its namespace.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}/{}",
            self.domain.as_str(),
            self.tenant,
            self.namespace,
            self.local_name
        )
    }
}

impl FromStr for TopicName {
    type Err = TopicNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A `tenant/namespace` path, the unit namespace-level policies apply to.
///
/// # Example
/// ```
/// use publish_throttle::NamespaceName;
///
/// let ns = NamespaceName::parse(" prop/ns-abc ").unwrap();
/// assert_eq!(ns.to_string(), "prop/ns-abc");
/// assert!(NamespaceName::parse("prop/ns-abc/").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceName {
    tenant: String,
    namespace: String,
}

impl NamespaceName {
    /// Parse a `tenant/namespace` path, ignoring surrounding whitespace.
    ///
    /// # Errors
    /// Returns `TopicNameError::Empty` for an empty name and
    /// `TopicNameError::InvalidNamespace` unless there are exactly two
    /// non-empty segments.
    pub fn parse(name: &str) -> Result<Self, TopicNameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TopicNameError::Empty);
        }

        match name.split_once('/') {
            Some((tenant, namespace))
                if !tenant.is_empty() && !namespace.is_empty() && !namespace.contains('/') =>
            {
                Ok(Self {
                    tenant: tenant.to_string(),
                    namespace: namespace.to_string(),
                })
            }
            _ => Err(TopicNameError::InvalidNamespace(name.to_string())),
        }
    }

    /// Owning tenant.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }
}

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.namespace)
    }
}

impl FromStr for NamespaceName {
    type Err = TopicNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
