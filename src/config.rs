use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};

use crate::auth::AuthConfig;
use crate::db::DatabaseConfig;
use crate::enrollment::{FullnameFormat, ServiceSettings};
use crate::types::Capability;

/// On-disk service configuration (`colab.json`).
///
/// Every key is optional; missing keys keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Short-name of the profile field holding the tax id.
    pub profile_field: String,
    /// Capability required to read a course's enrollments.
    pub required_capability: Capability,
    /// Template for `full_name`, e.g. "lastname, firstname".
    pub fullname_format: FullnameFormat,
    /// Capabilities granted to unauthenticated callers.
    pub anonymous_capabilities: Vec<Capability>,
    /// Database connection overrides.
    pub database: Option<DatabaseSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let settings = ServiceSettings::default();
        Self {
            profile_field: settings.profile_field,
            required_capability: settings.required_capability,
            fullname_format: settings.fullname_format,
            anonymous_capabilities: vec![Capability::new("course:view")],
            database: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let mut cfg: ServiceConfig = serde_json::from_str(&raw)?;
        if let Some(db) = cfg.database.as_mut() {
            expand_database(db);
        }
        Ok(cfg)
    }

    /// Load from an explicit path, or from the first config found on the
    /// search path. No config file at all yields the defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match resolve_config_path() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Service tunables.
    pub fn settings(&self) -> ServiceSettings {
        ServiceSettings {
            profile_field: self.profile_field.clone(),
            required_capability: self.required_capability.clone(),
            fullname_format: self.fullname_format.clone(),
        }
    }

    /// Database config: environment defaults overlaid with the file's
    /// `database` section.
    pub fn database_config(&self) -> DatabaseConfig {
        let mut config = DatabaseConfig::default();
        if let Some(section) = &self.database {
            if let Some(url) = &section.url {
                config.url = url.clone();
            }
            if let Some(namespace) = &section.namespace {
                config.namespace = namespace.clone();
            }
            if let Some(database) = &section.database {
                config.database = database.clone();
            }
            if section.username.is_some() {
                config.username = section.username.clone();
            }
            if section.password.is_some() {
                config.password = section.password.clone();
            }
        }
        config
    }

    /// Apply the file's anonymous capabilities to an auth config.
    pub fn apply_to_auth(&self, auth: AuthConfig) -> AuthConfig {
        auth.with_anonymous_capabilities(self.anonymous_capabilities.clone())
    }

    /// Auth settings for a network transport. Configuring a key source turns
    /// anonymous access off unless `allow_anonymous` asks for it explicitly.
    pub fn network_auth(
        &self,
        api_key: Option<String>,
        db_api_keys_enabled: bool,
        allow_anonymous: Option<bool>,
    ) -> AuthConfig {
        self.apply_to_auth(AuthConfig {
            api_key,
            db_api_keys_enabled,
            ..Default::default()
        })
        .with_anonymous_access(allow_anonymous)
    }
}

/// Search order: `COLAB_CONFIG`, `$XDG_CONFIG_HOME/colab/colab.json`,
/// `./colab.json`.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("COLAB_CONFIG") {
        return Some(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg).join("colab").join("colab.json");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let candidate = PathBuf::from("colab.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn expand_database(section: &mut DatabaseSection) {
    for value in [
        &mut section.url,
        &mut section.namespace,
        &mut section.database,
        &mut section.username,
        &mut section.password,
    ]
    .into_iter()
    .flatten()
    {
        *value = expand_env_vars(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let cfg = ServiceConfig::default();
        let settings = cfg.settings();
        assert_eq!(settings.profile_field, "CPF");
        assert_eq!(settings.required_capability.as_str(), "course:view");
        assert_eq!(settings.fullname_format.template(), "firstname lastname");
        assert_eq!(cfg.anonymous_capabilities, vec![Capability::new("course:view")]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(r#"{ "fullnameFormat": "lastname, firstname" }"#);
        let cfg = ServiceConfig::from_file(file.path()).unwrap();

        assert_eq!(cfg.fullname_format.format("Ana", "Lima"), "Lima, Ana");
        assert_eq!(cfg.profile_field, "CPF");
        assert!(cfg.database.is_none());
    }

    #[test]
    fn test_explicit_path_is_loaded() {
        let file = write_config(
            r#"{
                "profileField": "taxid",
                "requiredCapability": "moodle/course:viewparticipants",
                "anonymousCapabilities": []
            }"#,
        );
        let cfg = ServiceConfig::load(Some(file.path())).unwrap();

        assert_eq!(cfg.settings().profile_field, "taxid");
        assert_eq!(
            cfg.required_capability.as_str(),
            "moodle/course:viewparticipants"
        );
        assert!(cfg.anonymous_capabilities.is_empty());

        let auth = cfg.apply_to_auth(AuthConfig::default());
        assert!(auth.anonymous_capabilities.is_empty());
    }

    #[test]
    fn test_network_auth_resolves_anonymous_access() {
        let cfg = ServiceConfig::default();

        assert!(cfg.network_auth(None, false, None).allow_anonymous);
        assert!(!cfg.network_auth(Some("k".to_string()), false, None).allow_anonymous);
        assert!(!cfg.network_auth(None, true, None).allow_anonymous);
        assert!(cfg.network_auth(None, true, Some(true)).allow_anonymous);
        assert!(!cfg.network_auth(None, false, Some(false)).allow_anonymous);

        let auth = cfg.network_auth(Some("k".to_string()), true, None);
        assert_eq!(auth.api_key.as_deref(), Some("k"));
        assert!(auth.db_api_keys_enabled);
    }

    #[test]
    fn test_database_section_expands_env() {
        // SAFETY: test-only variable with a name no other test reads
        unsafe { env::set_var("COLAB_TEST_DB_NAMESPACE", "campus") };
        let file = write_config(
            r#"{
                "database": {
                    "url": "memory",
                    "namespace": "${COLAB_TEST_DB_NAMESPACE}",
                    "password": "${COLAB_TEST_UNSET_VARIABLE}"
                }
            }"#,
        );
        let cfg = ServiceConfig::from_file(file.path()).unwrap();
        let db = cfg.database_config();

        assert_eq!(db.url, "memory");
        assert_eq!(db.namespace, "campus");
        assert_eq!(db.password.as_deref(), Some("${COLAB_TEST_UNSET_VARIABLE}"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let file = write_config("{ not json");
        assert!(ServiceConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_expand_env_vars_passthrough() {
        assert_eq!(expand_env_vars("plain $HOME"), "plain $HOME");
    }
}
