use serde_yaml::{self, Mapping, Value};

/// Wrapper around serde_yaml::Value for path based manipulation
///
/// Paths are dot separated mapping keys, e.g. `dns.enhanced-mode`.
#[derive(Debug, Clone, PartialEq)]
pub struct YamlNode {
    pub value: Value,
}

impl YamlNode {
    /// Create a new empty mapping node
    pub fn new() -> Self {
        YamlNode {
            value: Value::Mapping(Mapping::new()),
        }
    }

    /// Create a YamlNode from a YAML string
    pub fn from_str(content: &str) -> Result<Self, serde_yaml::Error> {
        let value = serde_yaml::from_str(content)?;
        Ok(YamlNode { value })
    }

    /// Convert the YAML node to a string
    pub fn to_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.value)
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Get a value from a path
    pub fn get_value(&self, path: &str) -> Option<&Value> {
        let mut current = &self.value;
        for part in path.split('.').filter(|p| !p.is_empty()) {
            current = current.as_mapping()?.get(part)?;
        }
        Some(current)
    }

    /// Set a value at a path, creating intermediate mappings
    ///
    /// Returns `false` when a non-mapping value sits on the path.
    pub fn set_value(&mut self, path: &str, value: Value) -> bool {
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
        let Some((last, parents)) = parts.split_last() else {
            return false;
        };

        if self.value.is_null() {
            self.value = Value::Mapping(Mapping::new());
        }
        let mut current = &mut self.value;
        for part in parents {
            let Some(map) = current.as_mapping_mut() else {
                return false;
            };
            let key = Value::from(*part);
            if !map.contains_key(&key) || map.get(&key).map_or(false, Value::is_null) {
                map.insert(key.clone(), Value::Mapping(Mapping::new()));
            }
            current = match map.get_mut(&key) {
                Some(next) => next,
                None => return false,
            };
        }

        match current.as_mapping_mut() {
            Some(map) => {
                map.insert(Value::from(*last), value);
                true
            }
            None => false,
        }
    }

    /// Remove the value at a path, returning it if present
    pub fn remove_value(&mut self, path: &str) -> Option<Value> {
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
        let (last, parents) = parts.split_last()?;

        let mut current = &mut self.value;
        for part in parents {
            current = current.as_mapping_mut()?.get_mut(*part)?;
        }
        current.as_mapping_mut()?.remove(*last)
    }

    /// Append an item to the sequence at a path, creating the sequence if absent
    pub fn push_value(&mut self, path: &str, item: Value) -> bool {
        let mut seq = match self.get_value(path) {
            Some(Value::Sequence(seq)) => seq.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return false,
        };
        seq.push(item);
        self.set_value(path, Value::Sequence(seq))
    }
}

impl Default for YamlNode {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Value> for YamlNode {
    fn from(value: Value) -> Self {
        YamlNode { value }
    }
}
