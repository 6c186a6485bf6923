use std::{collections::HashMap, fs, time::Duration};

use edit_service::EditJobConfig;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub service_base_url: String,
    pub service_api_key: String,
    pub poll_initial_delay_ms: u64,
    pub poll_max_delay_ms: u64,
    pub poll_deadline_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            service_base_url: "https://api.bfl.ai".into(),
            service_api_key: String::new(),
            poll_initial_delay_ms: 1_000,
            poll_max_delay_ms: 5_000,
            poll_deadline_secs: 120,
        }
    }
}

impl Settings {
    pub fn job_config(&self) -> EditJobConfig {
        EditJobConfig {
            initial_delay: Duration::from_millis(self.poll_initial_delay_ms),
            max_delay: Duration::from_millis(self.poll_max_delay_ms),
            deadline: Duration::from_secs(self.poll_deadline_secs),
            ..EditJobConfig::default()
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("imgpilot.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("BIND_ADDR") {
        settings.bind_addr = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }

    if let Ok(v) = std::env::var("EDIT_SERVICE_URL") {
        settings.service_base_url = v;
    }
    if let Ok(v) = std::env::var("APP__SERVICE_BASE_URL") {
        settings.service_base_url = v;
    }

    if let Ok(v) = std::env::var("BFL_API_KEY") {
        settings.service_api_key = v;
    }
    if let Ok(v) = std::env::var("APP__SERVICE_API_KEY") {
        settings.service_api_key = v;
    }

    if let Ok(v) = std::env::var("APP__POLL_DEADLINE_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_deadline_secs = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__POLL_INITIAL_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_initial_delay_ms = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__POLL_MAX_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_max_delay_ms = parsed;
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.bind_addr = v.clone();
    }
    if let Some(v) = file_cfg.get("service_base_url") {
        settings.service_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("service_api_key") {
        settings.service_api_key = v.clone();
    }
    if let Some(v) = file_cfg.get("poll_deadline_secs") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_deadline_secs = parsed;
        }
    }
    if let Some(v) = file_cfg.get("poll_initial_delay_ms") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_initial_delay_ms = parsed;
        }
    }
    if let Some(v) = file_cfg.get("poll_max_delay_ms") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_max_delay_ms = parsed;
        }
    }
}
