use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use switchboard_core::{
    DEFAULT_HR_POLICY_BASE_ADDRESS, DEFAULT_TIMESHEET_BASE_ADDRESS, ServiceRegistry,
    is_valid_email,
};

pub const SETTINGS_DIRECTORY_NAME: &str = "switchboard";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default)]
    pub base_address: String,
}

impl ServiceSettings {
    fn new(base_address: &str) -> Self {
        Self {
            base_address: base_address.to_string(),
        }
    }

    fn normalized(mut self, default_base_address: &str) -> Self {
        let trimmed = self.base_address.trim();
        self.base_address = if trimmed.is_empty() {
            default_base_address.to_string()
        } else {
            trimmed.to_string()
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicesSettings {
    #[serde(default = "default_timesheet")]
    pub timesheet: ServiceSettings,
    #[serde(default = "default_hr_policy", rename = "hr-policy")]
    pub hr_policy: ServiceSettings,
}

impl Default for ServicesSettings {
    fn default() -> Self {
        Self {
            timesheet: default_timesheet(),
            hr_policy: default_hr_policy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub services: ServicesSettings,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Identity used when a selection does not name one.
    #[serde(default)]
    pub email: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            services: ServicesSettings::default(),
            request_timeout_secs: default_request_timeout_secs(),
            email: None,
        }
    }
}

impl AppSettings {
    pub fn normalized(mut self) -> Self {
        self.services.timesheet = self
            .services
            .timesheet
            .normalized(DEFAULT_TIMESHEET_BASE_ADDRESS);
        self.services.hr_policy = self
            .services
            .hr_policy
            .normalized(DEFAULT_HR_POLICY_BASE_ADDRESS);
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }

        // A stored identity that fails the shape check would only be rejected later.
        self.email = self
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| is_valid_email(email));

        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn to_registry(&self) -> ServiceRegistry {
        ServiceRegistry::builtin_with(
            &self.services.timesheet.base_address,
            &self.services.hr_policy.base_address,
        )
    }
}

pub struct SettingsStore {
    settings: AppSettings,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".switchboard"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings,
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Writes the current settings to the config path, replacing any existing
    /// file only once the new content is fully on disk.
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = self.config_path.as_path();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).context(CreateConfigDirSnafu {
                stage: "save-settings",
                dir,
            })?;
        }

        let json = serde_json::to_vec_pretty(&self.settings).context(EncodeSettingsSnafu {
            stage: "save-settings",
        })?;
        let staging = path.with_extension("json.partial");
        std::fs::write(&staging, json).context(WriteStagingSnafu {
            stage: "save-settings",
            staging: &staging,
        })?;
        std::fs::rename(&staging, path).context(ReplaceSettingsSnafu {
            stage: "save-settings",
            staging: &staging,
            path,
        })?;

        tracing::info!(path = %path.display(), "settings saved");
        Ok(())
    }

    fn load_from_disk(path: &Path) -> AppSettings {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no settings file; using built-in defaults");
            return AppSettings::default();
        }

        Figment::from(Serialized::defaults(AppSettings::default()))
            .merge(Json::file(path))
            .extract::<AppSettings>()
            .map(AppSettings::normalized)
            .unwrap_or_else(|error| {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "settings file unreadable; using built-in defaults"
                );
                AppSettings::default()
            })
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("cannot create config directory {} on `{stage}`: {source}", dir.display()))]
    CreateConfigDir {
        stage: &'static str,
        dir: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot encode settings as JSON on `{stage}`: {source}"))]
    EncodeSettings {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("cannot write {} on `{stage}`: {source}", staging.display()))]
    WriteStaging {
        stage: &'static str,
        staging: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "cannot move {} over {} on `{stage}`: {source}",
        staging.display(),
        path.display()
    ))]
    ReplaceSettings {
        stage: &'static str,
        staging: PathBuf,
        path: PathBuf,
        source: std::io::Error,
    },
}

fn default_timesheet() -> ServiceSettings {
    ServiceSettings::new(DEFAULT_TIMESHEET_BASE_ADDRESS)
}

fn default_hr_policy() -> ServiceSettings {
    ServiceSettings::new(DEFAULT_HR_POLICY_BASE_ADDRESS)
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
