use std::path::{Path, PathBuf};

use crate::controller::validation::is_dns_label;
use crate::error::SettingsError;
use crate::settings::schema::ControllerSettings;

/// Names the settings file when no path is given on the command line.
pub const SETTINGS_PATH_ENV: &str = "SERVICEBROKER_SETTINGS";

pub const NAMESPACE_ENV: &str = "SERVICEBROKER_NAMESPACE";
pub const POD_NAMESPACE_ENV: &str = "POD_NAMESPACE";
pub const CONFIG_DIR_ENV: &str = "SERVICEBROKER_CONFIG_DIR";
pub const SYNC_TIMEOUT_ENV: &str = "SERVICEBROKER_SYNC_TIMEOUT_SECS";
pub const LOG_LEVEL_ENV: &str = "SERVICEBROKER_LOG_LEVEL";

/// Loads settings from a YAML file, then applies environment overrides.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<ControllerSettings, SettingsError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| SettingsError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut settings = parse_settings(&content)?;
    apply_env_overrides(&mut settings)?;
    validate_settings(&settings)?;

    Ok(settings)
}

/// Parses and validates settings without consulting the environment.
pub fn load_settings_from_str(content: &str) -> Result<ControllerSettings, SettingsError> {
    let settings = parse_settings(content)?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Loads settings from `path`, or from the file named by
/// `SERVICEBROKER_SETTINGS`, or starts from the defaults.
pub fn resolve_settings(path: Option<PathBuf>) -> Result<ControllerSettings, SettingsError> {
    let path = path.or_else(|| env_value(SETTINGS_PATH_ENV).map(PathBuf::from));

    match path {
        Some(path) => load_settings(path),
        None => {
            let mut settings = ControllerSettings::default();
            apply_env_overrides(&mut settings)?;
            validate_settings(&settings)?;
            Ok(settings)
        }
    }
}

fn parse_settings(content: &str) -> Result<ControllerSettings, SettingsError> {
    // An empty file means "all defaults".
    if content.trim().is_empty() {
        return Ok(ControllerSettings::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Overrides settings from `SERVICEBROKER_*` variables.
pub fn apply_env_overrides(settings: &mut ControllerSettings) -> Result<(), SettingsError> {
    if let Some(namespace) = env_value(NAMESPACE_ENV).or_else(|| env_value(POD_NAMESPACE_ENV)) {
        settings.namespace = namespace;
    }

    if let Some(dir) = env_value(CONFIG_DIR_ENV) {
        settings.config_directory = PathBuf::from(dir);
    }

    if let Some(value) = env_value(SYNC_TIMEOUT_ENV) {
        settings.sync_timeout_secs =
            value
                .parse()
                .map_err(|e: std::num::ParseIntError| SettingsError::InvalidEnv {
                    name: SYNC_TIMEOUT_ENV.to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
    }

    if let Some(level) = env_value(LOG_LEVEL_ENV) {
        settings.log.level = level;
    }

    Ok(())
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn validate_settings(settings: &ControllerSettings) -> Result<(), SettingsError> {
    if !is_dns_label(&settings.namespace) {
        return Err(SettingsError::Validation {
            message: format!("Invalid namespace '{}'", settings.namespace),
        });
    }

    if settings.sync_timeout_secs == 0 {
        return Err(SettingsError::Validation {
            message: "syncTimeoutSecs must be greater than 0".to_string(),
        });
    }

    if settings.event_queue_capacity == 0 {
        return Err(SettingsError::Validation {
            message: "eventQueueCapacity must be greater than 0".to_string(),
        });
    }

    if settings.log.level.trim().is_empty() {
        return Err(SettingsError::Validation {
            message: "log.level must not be empty".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;
    use tempfile::TempDir;

    const ALL_ENV: [&str; 6] = [
        SETTINGS_PATH_ENV,
        NAMESPACE_ENV,
        POD_NAMESPACE_ENV,
        CONFIG_DIR_ENV,
        SYNC_TIMEOUT_ENV,
        LOG_LEVEL_ENV,
    ];

    fn clear_env() {
        for name in ALL_ENV {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_load_full_settings() {
        let yaml = r#"
namespace: brokers
configDirectory: /etc/servicebroker/resources
tokenFile: /var/run/secrets/kubernetes.io/serviceaccount/token
syncTimeoutSecs: 30
eventQueueCapacity: 16
log:
  level: debug
  json: true
"#;

        let settings = load_settings_from_str(yaml).unwrap();
        assert_eq!(settings.namespace, "brokers");
        assert_eq!(
            settings.config_directory,
            PathBuf::from("/etc/servicebroker/resources")
        );
        assert_eq!(settings.sync_timeout(), Duration::from_secs(30));
        assert_eq!(settings.event_queue_capacity, 16);
        assert_eq!(settings.log.level, "debug");
        assert!(settings.log.json);
        assert_eq!(
            settings.token_env_var.as_deref(),
            Some("SERVICEBROKER_TOKEN")
        );
    }

    #[test]
    fn test_defaults() {
        let settings = load_settings_from_str("").unwrap();
        assert_eq!(settings, ControllerSettings::default());
        assert_eq!(settings.namespace, "default");
        assert_eq!(settings.sync_timeout_secs, 60);
        assert_eq!(settings.event_queue_capacity, 256);
        assert_eq!(settings.log.level, "info");
        assert!(!settings.log.json);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            load_settings_from_str("namespace: Not_Valid"),
            Err(SettingsError::Validation { .. })
        ));
        assert!(matches!(
            load_settings_from_str("syncTimeoutSecs: 0"),
            Err(SettingsError::Validation { .. })
        ));
        assert!(matches!(
            load_settings_from_str("eventQueueCapacity: 0"),
            Err(SettingsError::Validation { .. })
        ));
        assert!(matches!(
            load_settings_from_str("syncTimeoutSecs: soon"),
            Err(SettingsError::ParseYaml(_))
        ));
    }

    #[test]
    fn test_token_not_in_debug_output() {
        let settings = load_settings_from_str("token: hunter2").unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var(POD_NAMESPACE_ENV, "from-pod");
        std::env::set_var(SYNC_TIMEOUT_ENV, "5");
        std::env::set_var(LOG_LEVEL_ENV, "servicebroker=trace");

        let mut settings = ControllerSettings::default();
        apply_env_overrides(&mut settings).unwrap();
        assert_eq!(settings.namespace, "from-pod");
        assert_eq!(settings.sync_timeout_secs, 5);
        assert_eq!(settings.log.level, "servicebroker=trace");

        std::env::set_var(NAMESPACE_ENV, "explicit");
        apply_env_overrides(&mut settings).unwrap();
        assert_eq!(settings.namespace, "explicit");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_override() {
        clear_env();
        std::env::set_var(SYNC_TIMEOUT_ENV, "forever");

        let mut settings = ControllerSettings::default();
        let err = apply_env_overrides(&mut settings).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidEnv { ref name, .. } if name == SYNC_TIMEOUT_ENV));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_resolve_settings_from_env_path() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "namespace: brokers\n").unwrap();

        std::env::set_var(SETTINGS_PATH_ENV, &path);
        std::env::set_var(CONFIG_DIR_ENV, dir.path());

        let settings = resolve_settings(None).unwrap();
        assert_eq!(settings.namespace, "brokers");
        assert_eq!(settings.config_directory, dir.path());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_resolve_settings_without_file() {
        clear_env();
        let settings = resolve_settings(None).unwrap();
        assert_eq!(settings.namespace, "default");
    }

    #[test]
    fn test_missing_file() {
        let err = load_settings("/nonexistent/servicebroker/settings.yaml").unwrap_err();
        assert!(matches!(err, SettingsError::ReadFile { .. }));
    }
}
