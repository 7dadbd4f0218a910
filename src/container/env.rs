use std::collections::HashMap;

/// Container environment parsed from `KEY=VALUE` entries
///
/// Entries are split at the first `=`, so values may themselves contain `=`.
/// When a key occurs more than once the last occurrence wins. An entry
/// without any `=` records the key with no value, which lookups treat as
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentMap {
    vars: HashMap<String, Option<String>>,
}

impl EnvironmentMap {
    /// Parse an ordered list of `KEY=VALUE` strings. Never fails.
    pub fn parse<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vars = HashMap::new();

        for entry in entries {
            let entry = entry.as_ref();
            match entry.split_once('=') {
                Some((key, value)) => {
                    vars.insert(key.to_string(), Some(value.to_string()));
                }
                None => {
                    vars.insert(entry.to_string(), None);
                }
            }
        }

        Self { vars }
    }

    /// Value of `key`, if it was defined with an `=`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).and_then(|v| v.as_deref())
    }

    /// Value of `key` when it is defined and non-empty
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
