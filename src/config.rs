//! Configuration consumed at reconfigure (spec §4.7, §6).
//!
//! Mirrors the `#[serde(default)]`-struct-plus-snake_case-reconciliation shape
//! used for RLS's own configuration: keys arrive as loose JSON/TOML, get
//! normalized to snake_case, and unknown/duplicate keys are reported rather
//! than silently ignored.

use std::collections::HashMap;

use serde::Deserialize;

/// One configured builder (spec §6).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub name: String,
    pub worker_names: Vec<String>,
    pub locks: Vec<String>,
    pub env: HashMap<String, String>,
    pub properties: HashMap<String, String>,
    pub merge_requests: bool,
    pub category: Option<String>,
    pub description: Option<String>,
    pub builddir: Option<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            name: String::new(),
            worker_names: vec![],
            locks: vec![],
            env: HashMap::new(),
            properties: HashMap::new(),
            merge_requests: true,
            category: None,
            description: None,
            builddir: None,
        }
    }
}

/// Cross-builder settings (spec §6: `global {caches['Builds'], mergeRequests}`).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub builds_cache_size: u64,
    pub merge_requests: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig { builds_cache_size: 15, merge_requests: true }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct MasterConfig {
    pub global: GlobalConfig,
    pub builders: Vec<BuilderConfig>,
}

impl MasterConfig {
    /// Locates the config entry for `name`. A missing entry at reconfigure
    /// time is a programming error, not a runtime condition (spec §7,
    /// "Reconfigure with no matching config entry": abort reconfigure).
    pub fn find_builder<'a>(&'a self, name: &str) -> Option<&'a BuilderConfig> {
        self.builders.iter().find(|b| b.name == name)
    }

    /// Deserializes from a loose JSON object, converting keys to snake_case
    /// and reporting duplicate and unknown keys rather than silently
    /// dropping them.
    pub fn try_deserialize(
        val: &serde_json::Value,
        dups: &mut HashMap<String, Vec<String>>,
        unknowns: &mut Vec<String>,
    ) -> Result<MasterConfig, serde_json::Error> {
        #[derive(Clone)]
        struct JsonValue(serde_json::Value);

        impl<'de> serde::de::IntoDeserializer<'de, serde_json::Error> for JsonValue {
            type Deserializer = serde_json::Value;
            fn into_deserializer(self) -> Self::Deserializer {
                self.0
            }
        }

        let map = match val {
            serde_json::Value::Object(map) => map,
            other => {
                return serde_json::from_value(other.clone());
            }
        };

        let seq = serde::de::value::MapDeserializer::new(map.iter().filter_map(|(k, v)| {
            use heck::SnakeCase;
            let snake_case = k.to_snake_case();
            let occurrences = dups.entry(snake_case.clone()).or_default();
            occurrences.push(k.to_string());
            if occurrences.len() == 1 {
                Some((snake_case, JsonValue(v.to_owned())))
            } else {
                None
            }
        }));

        let result = serde_ignored::deserialize(seq, |path| unknowns.push(path.to_string()));
        dups.retain(|_, v| v.len() > 1);
        result
    }
}
