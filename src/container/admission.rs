use crate::container::EnvironmentMap;

/// Decides whether a container's logs are forwarded
///
/// A container is admitted when every required key maps to a non-empty
/// value. With no required keys every container is admitted.
#[derive(Debug, Clone, Default)]
pub struct AdmissionFilter {
    required: Vec<String>,
}

impl AdmissionFilter {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    /// Filter that admits every container
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn admits(&self, env: &EnvironmentMap) -> bool {
        self.required.iter().all(|key| env.non_empty(key).is_some())
    }

    /// Required keys that are unset or empty in `env`
    pub fn missing<'a>(&'a self, env: &EnvironmentMap) -> Vec<&'a str> {
        self.required
            .iter()
            .filter(|key| env.non_empty(key).is_none())
            .map(String::as_str)
            .collect()
    }
}
