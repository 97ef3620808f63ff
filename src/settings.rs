//! User settings persisted in the local store
//!
//! Settings are stored under the `settings` key as a camelCase JSON object.
//! Reading is lenient: every field is merged over the defaults on its own, so
//! a half-written or outdated record still yields usable settings.

use crate::config::Config;
use crate::error::Result;
use crate::providers::ImageDetail;
use crate::storage::LocalStore;
use serde::{Deserialize, Serialize};

/// Local store key holding the settings record
pub const SETTINGS_KEY: &str = "settings";

/// Connection, model and generation options chosen by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Endpoint base URL
    pub base_url: String,
    /// Model identifier
    pub model_id: String,
    /// API key sent as a bearer token
    pub api_key: String,
    /// System prompt; empty means none
    pub system_prompt: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Completion token cap; `None` means no limit
    pub max_tokens: Option<u32>,
    /// Detail level sent with image attachments
    pub image_detail: ImageDetail,
}

impl Settings {
    /// Defaults derived from the server configuration
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::config::Config;
    /// use parley::settings::Settings;
    ///
    /// let defaults = Settings::defaults(&Config::default());
    /// assert_eq!(defaults.api_key, "lm-studio");
    /// assert_eq!(defaults.temperature, 0.7);
    /// assert_eq!(defaults.max_tokens, None);
    /// assert_eq!(defaults.image_detail, parley::providers::ImageDetail::High);
    /// ```
    pub fn defaults(config: &Config) -> Self {
        Self {
            base_url: config.upstream.base_url.clone(),
            model_id: config.upstream.model.clone(),
            api_key: config.upstream.api_key.clone(),
            system_prompt: String::new(),
            temperature: config.chat.default_temperature,
            max_tokens: None,
            image_detail: ImageDetail::High,
        }
    }

    /// Merge a stored record over these defaults, field by field
    ///
    /// String fields win when they are non-blank strings (the system prompt
    /// also accepts an empty string). Temperature, max tokens and image detail
    /// win when they coerce to a valid value.
    pub fn merge_stored(&self, stored: &serde_json::Value) -> Self {
        let text = |field: &str, fallback: &String| -> String {
            stored
                .get(field)
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| fallback.clone())
        };

        Self {
            base_url: text("baseUrl", &self.base_url),
            model_id: text("modelId", &self.model_id),
            api_key: text("apiKey", &self.api_key),
            system_prompt: stored
                .get("systemPrompt")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| self.system_prompt.clone()),
            temperature: stored
                .get("temperature")
                .map(|v| coerce_temperature(v, self.temperature))
                .unwrap_or(self.temperature),
            max_tokens: match stored.get("maxTokens") {
                Some(value) => coerce_max_tokens(value),
                None => self.max_tokens,
            },
            image_detail: stored
                .get("imageDetail")
                .and_then(|v| v.as_str())
                .and_then(ImageDetail::parse)
                .unwrap_or(self.image_detail),
        }
    }
}

/// Partial settings update
///
/// `None` leaves a field unchanged. For `max_tokens`, `Some(None)` clears the
/// limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub base_url: Option<String>,
    pub model_id: Option<String>,
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<Option<u32>>,
    pub image_detail: Option<ImageDetail>,
}

impl SettingsPatch {
    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn apply(self, settings: &mut Settings) {
        if let Some(base_url) = self.base_url {
            settings.base_url = base_url;
        }
        if let Some(model_id) = self.model_id {
            settings.model_id = model_id;
        }
        if let Some(api_key) = self.api_key {
            settings.api_key = api_key;
        }
        if let Some(system_prompt) = self.system_prompt {
            settings.system_prompt = system_prompt;
        }
        if let Some(temperature) = self.temperature.filter(|t| t.is_finite()) {
            settings.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            settings.max_tokens = max_tokens.filter(|n| *n > 0);
        }
        if let Some(image_detail) = self.image_detail {
            settings.image_detail = image_detail;
        }
    }
}

/// Parse a temperature value
///
/// Numbers and numeric strings are accepted; anything else (missing, empty,
/// non-numeric, non-finite) gives `None`. Zero is a valid temperature.
pub fn parse_temperature(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|t| t.is_finite())
}

/// Coerce a temperature value, falling back to `default`
///
/// # Examples
///
/// ```
/// use parley::settings::coerce_temperature;
/// use serde_json::json;
///
/// assert_eq!(coerce_temperature(&json!("0.2"), 0.7), 0.2);
/// assert_eq!(coerce_temperature(&json!(0), 0.7), 0.0);
/// assert_eq!(coerce_temperature(&json!(""), 0.7), 0.7);
/// assert_eq!(coerce_temperature(&json!("warm"), 0.7), 0.7);
/// ```
pub fn coerce_temperature(value: &serde_json::Value, default: f64) -> f64 {
    parse_temperature(value).unwrap_or(default)
}

/// Coerce a max tokens value
///
/// Positive integers (numbers, floats truncated, or integer strings) are
/// kept; empty, null, non-positive or invalid values mean no limit.
///
/// # Examples
///
/// ```
/// use parley::settings::coerce_max_tokens;
/// use serde_json::json;
///
/// assert_eq!(coerce_max_tokens(&json!(256)), Some(256));
/// assert_eq!(coerce_max_tokens(&json!("512")), Some(512));
/// assert_eq!(coerce_max_tokens(&json!("")), None);
/// assert_eq!(coerce_max_tokens(&json!(0)), None);
/// assert_eq!(coerce_max_tokens(&json!(-5)), None);
/// ```
pub fn coerce_max_tokens(value: &serde_json::Value) -> Option<u32> {
    let parsed = match value {
        serde_json::Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        serde_json::Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

/// Settings persistence over a local store
pub struct SettingsStore<'a> {
    store: &'a dyn LocalStore,
    defaults: Settings,
}

impl<'a> SettingsStore<'a> {
    /// Create a settings store with the given defaults
    pub fn new(store: &'a dyn LocalStore, defaults: Settings) -> Self {
        Self { store, defaults }
    }

    /// Defaults used for missing or invalid fields
    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    /// Load the stored settings merged over the defaults
    ///
    /// A missing record, or one that is not a JSON object, yields the
    /// defaults.
    pub fn load(&self) -> Result<Settings> {
        match self.store.get_json(SETTINGS_KEY)? {
            None => Ok(self.defaults.clone()),
            Some(stored) if stored.is_object() => Ok(self.defaults.merge_stored(&stored)),
            Some(_) => {
                tracing::warn!("Stored settings are not an object, using defaults");
                Ok(self.defaults.clone())
            }
        }
    }

    /// Apply a patch over the current settings and persist the full record
    ///
    /// Returns the settings as they will be read back.
    pub fn save(&self, patch: SettingsPatch) -> Result<Settings> {
        let mut settings = self.load()?;
        patch.apply(&mut settings);

        let record = serde_json::to_value(&settings)?;
        let normalized = self.defaults.merge_stored(&record);
        self.store
            .set_json(SETTINGS_KEY, &serde_json::to_value(&normalized)?)?;
        tracing::debug!("Saved settings for model {}", normalized.model_id);
        Ok(normalized)
    }

    /// Forget the stored settings and return the defaults
    pub fn reset(&self) -> Result<Settings> {
        self.store.remove(SETTINGS_KEY)?;
        tracing::info!("Settings restored to defaults");
        Ok(self.defaults.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn defaults() -> Settings {
        Settings::defaults(&Config::default())
    }

    #[test]
    fn test_load_without_stored_record() {
        let store = MemoryStore::new();
        let settings = SettingsStore::new(&store, defaults()).load().unwrap();
        assert_eq!(settings, defaults());
    }

    #[test]
    fn test_load_merges_per_field() {
        let store = MemoryStore::new();
        store
            .set_json(
                SETTINGS_KEY,
                &json!({
                    "modelId": "magistral-small-2509",
                    "baseUrl": "   ",
                    "apiKey": 42,
                    "temperature": "0.25",
                    "maxTokens": "128",
                    "unknown": true
                }),
            )
            .unwrap();

        let settings = SettingsStore::new(&store, defaults()).load().unwrap();
        assert_eq!(settings.model_id, "magistral-small-2509");
        assert_eq!(settings.base_url, defaults().base_url);
        assert_eq!(settings.api_key, "lm-studio");
        assert_eq!(settings.temperature, 0.25);
        assert_eq!(settings.max_tokens, Some(128));
    }

    #[test]
    fn test_load_with_malformed_json() {
        let store = MemoryStore::new();
        store.set(SETTINGS_KEY, "{\"modelId\":".to_string()).unwrap();
        let settings = SettingsStore::new(&store, defaults()).load().unwrap();
        assert_eq!(settings, defaults());

        store.set(SETTINGS_KEY, "[1, 2]".to_string()).unwrap();
        let settings = SettingsStore::new(&store, defaults()).load().unwrap();
        assert_eq!(settings, defaults());
    }

    #[test]
    fn test_image_detail_is_saved_and_merged() {
        let store = MemoryStore::new();
        let settings_store = SettingsStore::new(&store, defaults());

        let saved = settings_store
            .save(SettingsPatch {
                image_detail: Some(ImageDetail::Low),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(saved.image_detail, ImageDetail::Low);
        let raw = store.get_json(SETTINGS_KEY).unwrap().unwrap();
        assert_eq!(raw["imageDetail"], "low");

        store
            .set_json(SETTINGS_KEY, &json!({"imageDetail": " AUTO "}))
            .unwrap();
        assert_eq!(
            settings_store.load().unwrap().image_detail,
            ImageDetail::Auto
        );

        store
            .set_json(SETTINGS_KEY, &json!({"imageDetail": "ultra"}))
            .unwrap();
        assert_eq!(
            settings_store.load().unwrap().image_detail,
            ImageDetail::High
        );
    }

    #[test]
    fn test_non_positive_max_tokens_means_no_limit() {
        let store = MemoryStore::new();
        store
            .set_json(SETTINGS_KEY, &json!({"maxTokens": -10}))
            .unwrap();
        let settings = SettingsStore::new(&store, defaults()).load().unwrap();
        assert_eq!(settings.max_tokens, None);
    }

    #[test]
    fn test_save_persists_full_record() {
        let store = MemoryStore::new();
        let settings_store = SettingsStore::new(&store, defaults());

        let saved = settings_store
            .save(SettingsPatch {
                system_prompt: Some("Be terse.".to_string()),
                max_tokens: Some(Some(64)),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(saved.system_prompt, "Be terse.");
        assert_eq!(saved.max_tokens, Some(64));

        let raw = store.get_json(SETTINGS_KEY).unwrap().unwrap();
        assert_eq!(raw["systemPrompt"], "Be terse.");
        assert_eq!(raw["modelId"], defaults().model_id);
        assert_eq!(settings_store.load().unwrap(), saved);
    }

    #[test]
    fn test_save_keeps_zero_temperature() {
        let store = MemoryStore::new();
        let settings_store = SettingsStore::new(&store, defaults());
        settings_store
            .save(SettingsPatch {
                temperature: Some(0.0),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(settings_store.load().unwrap().temperature, 0.0);
    }

    #[test]
    fn test_save_can_clear_max_tokens() {
        let store = MemoryStore::new();
        let settings_store = SettingsStore::new(&store, defaults());
        settings_store
            .save(SettingsPatch {
                max_tokens: Some(Some(10)),
                ..SettingsPatch::default()
            })
            .unwrap();
        let cleared = settings_store
            .save(SettingsPatch {
                max_tokens: Some(None),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(cleared.max_tokens, None);
    }

    #[test]
    fn test_blank_patch_value_falls_back_to_default() {
        let store = MemoryStore::new();
        let settings_store = SettingsStore::new(&store, defaults());
        let saved = settings_store
            .save(SettingsPatch {
                model_id: Some(String::new()),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(saved.model_id, defaults().model_id);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let store = MemoryStore::new();
        let settings_store = SettingsStore::new(&store, defaults());
        settings_store
            .save(SettingsPatch {
                api_key: Some("sk-test".to_string()),
                ..SettingsPatch::default()
            })
            .unwrap();

        assert_eq!(settings_store.reset().unwrap(), defaults());
        assert_eq!(store.get(SETTINGS_KEY).unwrap(), None);
        assert_eq!(settings_store.load().unwrap(), defaults());
    }

    #[test]
    fn test_coerce_max_tokens_rejects_oversized() {
        assert_eq!(coerce_max_tokens(&json!(u64::MAX)), None);
        assert_eq!(coerce_max_tokens(&json!(12.9)), Some(12));
        assert_eq!(coerce_max_tokens(&json!(null)), None);
        assert_eq!(coerce_max_tokens(&json!("1.5")), None);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(SettingsPatch::default().is_empty());
        assert!(!SettingsPatch {
            temperature: Some(1.0),
            ..SettingsPatch::default()
        }
        .is_empty());
    }
}
