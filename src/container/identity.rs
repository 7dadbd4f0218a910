use std::fmt;

/// Number of id characters shown in logs and file names
pub const SHORT_ID_LEN: usize = 12;

/// Immutable identity of a container, created from its start event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerIdentity {
    id: String,
    image: String,
}

impl ContainerIdentity {
    pub fn new(id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: image.into(),
        }
    }

    /// Full container id as reported by the runtime
    pub fn id(&self) -> &str {
        &self.id
    }

    /// First 12 characters of the id, or the whole id when it is shorter
    pub fn short_id(&self) -> &str {
        self.id.get(..SHORT_ID_LEN).unwrap_or(&self.id)
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

impl fmt::Display for ContainerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id={} image={}", self.short_id(), self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_truncates_to_twelve() {
        let identity = ContainerIdentity::new("4f1a2b3c4d5e6f7a8b9c0d1e2f3a", "app:1.0");
        assert_eq!(identity.short_id(), "4f1a2b3c4d5e");
        assert_eq!(identity.id(), "4f1a2b3c4d5e6f7a8b9c0d1e2f3a");
    }

    #[test]
    fn test_short_id_of_short_id() {
        let identity = ContainerIdentity::new("abc", "app:1.0");
        assert_eq!(identity.short_id(), "abc");
    }

    #[test]
    fn test_display() {
        let identity = ContainerIdentity::new("0123456789abcdef", "nginx:latest");
        assert_eq!(identity.to_string(), "id=0123456789ab image=nginx:latest");
    }
}
