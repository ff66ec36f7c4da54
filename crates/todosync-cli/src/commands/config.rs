use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::config_profiles::{is_http_url, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

/// Values given to `config init`; `None` keeps what the profile already has.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub server: Option<String>,
    pub insecure: bool,
    pub account: Option<String>,
    pub access_token: Option<String>,
    pub token_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub sync_interval_secs: Option<u64>,
    pub offline_mode: Option<bool>,
}

impl ProfileUpdate {
    pub fn apply(self, profile: &mut CliProfile) {
        if let Some(server) = normalize_text_option(self.server) {
            profile.server = Some(server);
            profile.use_https = Some(!self.insecure);
        }
        if let Some(value) = normalize_text_option(self.account) {
            profile.account = Some(value);
        }
        if let Some(value) = normalize_text_option(self.access_token) {
            profile.access_token = Some(value);
        }
        if let Some(value) = normalize_text_option(self.token_endpoint) {
            profile.token_endpoint = Some(value.trim_end_matches('/').to_string());
        }
        if let Some(value) = normalize_text_option(self.api_key) {
            profile.api_key = Some(value);
        }
        if let Some(value) = self.sync_interval_secs {
            profile.sync_interval_secs = Some(value);
        }
        if let Some(value) = self.offline_mode {
            profile.offline_mode = Some(value);
        }
    }
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            server,
            insecure,
            account,
            access_token,
            token_endpoint,
            api_key,
            sync_interval,
            offline,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileUpdate {
                server,
                insecure,
                account,
                access_token,
                token_endpoint,
                api_key,
                sync_interval_secs: sync_interval,
                offline_mode: offline,
            },
            no_activate,
        ),
        ConfigCommands::Show { json } => run_config_show(global_profile, json),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let profile = config.profile_mut_or_default(&profile_name);
    update.apply(profile);
    validate_profile(profile)?;
    let missing_fields = missing_profile_fields(profile);

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    if missing_fields.is_empty() {
        println!("Profile '{profile_name}' is ready. Run `todosync sync`.");
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

pub fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(endpoint) = profile.token_endpoint() {
        if !is_http_url(&endpoint) {
            return Err(CliError::Config(
                "token_endpoint must include http:// or https://".to_string(),
            ));
        }
        if profile.api_key().is_none() {
            return Err(CliError::Config(
                "token_endpoint requires an api_key".to_string(),
            ));
        }
    }
    Ok(())
}

pub fn missing_profile_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if normalize_text_option(profile.server.clone()).is_none() {
        missing.push("server");
    }
    if profile.access_token.is_none() && profile.token_endpoint().is_none() {
        missing.push("access_token or token_endpoint");
    }
    missing
}

/// Profile as shown by `config show`, secrets replaced by a marker.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ProfileView {
    pub name: String,
    pub active: bool,
    pub server_url: Option<String>,
    pub account: Option<String>,
    pub access_token: Option<&'static str>,
    pub token_endpoint: Option<String>,
    pub api_key: Option<&'static str>,
    pub sync_interval_secs: u64,
    pub offline_mode: bool,
}

const REDACTED: &str = "[REDACTED]";

pub fn profile_view(name: &str, active: bool, profile: &CliProfile) -> ProfileView {
    let settings = profile.sync_settings();
    ProfileView {
        name: name.to_string(),
        active,
        server_url: profile.server_url(),
        account: profile.account(),
        access_token: profile.access_token().map(|_| REDACTED),
        token_endpoint: profile.token_endpoint(),
        api_key: profile.api_key().map(|_| REDACTED),
        sync_interval_secs: settings.periodic_interval_secs,
        offline_mode: settings.offline_mode,
    }
}

pub fn run_config_show(profile_name: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let name = config.resolve_profile_name(profile_name);
    let profile = config.profile(&name).cloned().unwrap_or_default();
    let active = config.active_profile.as_deref() == Some(name.as_str());
    let view = profile_view(&name, active, &profile);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let or_unset = |value: Option<&str>| value.unwrap_or("-").to_string();
    println!("Profile:        {}{}", view.name, if view.active { " (active)" } else { "" });
    println!("Server:         {}", or_unset(view.server_url.as_deref()));
    println!("Account:        {}", or_unset(view.account.as_deref()));
    println!("Access token:   {}", or_unset(view.access_token));
    println!("Token endpoint: {}", or_unset(view.token_endpoint.as_deref()));
    println!("API key:        {}", or_unset(view.api_key));
    println!("Sync interval:  {}s", view.sync_interval_secs);
    println!("Offline mode:   {}", view.offline_mode);
    Ok(())
}
