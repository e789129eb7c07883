use std::fmt;

/// Repository name taken from a push payload. Doubles as the lookup key into
/// the bind table and as the container name.
///
/// Never blank. The name is kept exactly as received; surrounding whitespace
/// is not stripped, so it must match a bind entry verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryName(String);

impl RepositoryName {
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return None;
        }
        Some(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical engine form of the container name (`/site-a`).
    pub fn canonical(&self) -> String {
        format!("/{}", self.0)
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RepositoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One launch request, built per accepted webhook and dropped once
/// orchestration finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    pub name: RepositoryName,
    pub image: String,
    pub bind: String,
}

impl ContainerRequest {
    pub fn new(name: RepositoryName, image: impl Into<String>, bind: impl Into<String>) -> Self {
        Self {
            name,
            image: image.into(),
            bind: bind.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_name_rejects_empty() {
        assert!(RepositoryName::new("").is_none());
        assert!(RepositoryName::new("   ").is_none());
    }

    #[test]
    fn test_repository_name_keeps_padding() {
        let name = RepositoryName::new("  site-a ").unwrap();
        assert_eq!(name.as_str(), "  site-a ");
        assert_ne!(name, RepositoryName::new("site-a").unwrap());
    }

    #[test]
    fn test_repository_name_canonical_form() {
        let name = RepositoryName::new("site-a").unwrap();
        assert_eq!(name.canonical(), "/site-a");
    }
}
