use crate::config::BindEntry;

/// Maps repository names to host bind specs.
///
/// Lookup is an exact, case-sensitive match against the configured list; the
/// first matching entry wins. A miss means the repository is not managed here.
#[derive(Debug, Clone, Default)]
pub struct BindResolver {
    binds: Vec<BindEntry>,
}

impl BindResolver {
    pub fn new(binds: Vec<BindEntry>) -> Self {
        Self { binds }
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        if name.is_empty() {
            return None;
        }
        self.binds
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.bind.as_str())
    }

    pub fn len(&self) -> usize {
        self.binds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binds.is_empty()
    }
}
