//! Turns a CLI profile into the remote client and credentials for a sync run.

use todosync_core::auth::{
    AccountRef, AuthResult, Credential, CredentialResolver, NoCredentials, StaticCredentials,
    TokenExchangeResolver,
};
use todosync_core::config::SyncSettings;
use todosync_core::remote::HttpEntryClient;

use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

/// Credential source chosen by the profile.
#[derive(Debug)]
pub enum ProfileCredentials {
    Anonymous(NoCredentials),
    Static(StaticCredentials),
    Exchange(TokenExchangeResolver),
}

impl CredentialResolver for ProfileCredentials {
    async fn resolve(&self, account: &AccountRef) -> AuthResult<Credential> {
        match self {
            Self::Anonymous(resolver) => resolver.resolve(account).await,
            Self::Static(resolver) => resolver.resolve(account).await,
            Self::Exchange(resolver) => resolver.resolve(account).await,
        }
    }
}

/// Everything needed to reach the server for one profile.
#[derive(Debug)]
pub struct SyncTarget {
    pub profile_name: String,
    pub base_url: String,
    /// `None` when the profile has no credentials; cycles then skip auth.
    pub account: Option<AccountRef>,
    pub credentials: ProfileCredentials,
    pub settings: SyncSettings,
}

impl SyncTarget {
    pub fn client(&self) -> Result<HttpEntryClient, CliError> {
        Ok(HttpEntryClient::with_timeout(
            self.base_url.clone(),
            self.settings.request_timeout(),
        )?)
    }
}

pub fn load_sync_target(explicit_profile: Option<&str>) -> Result<SyncTarget, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(explicit_profile);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();
    sync_target_for_profile(profile_name, &profile)
}

pub fn sync_target_for_profile(
    profile_name: String,
    profile: &CliProfile,
) -> Result<SyncTarget, CliError> {
    let base_url = profile.server_url().ok_or(CliError::SyncNotConfigured)?;
    let account_name = profile.account().unwrap_or_else(|| profile_name.clone());

    let credentials = match (profile.token_endpoint(), profile.api_key(), profile.access_token()) {
        (Some(endpoint), Some(api_key), _) => {
            ProfileCredentials::Exchange(TokenExchangeResolver::new(endpoint, api_key)?)
        }
        (Some(_), None, _) => {
            return Err(CliError::Config(format!(
                "Profile '{profile_name}' has a token_endpoint but no api_key"
            )));
        }
        (None, _, Some(token)) => {
            ProfileCredentials::Static(StaticCredentials::new().with_token(&account_name, token))
        }
        (None, _, None) => ProfileCredentials::Anonymous(NoCredentials),
    };
    let account = match credentials {
        ProfileCredentials::Anonymous(_) => None,
        _ => Some(AccountRef::new(account_name)),
    };

    tracing::debug!("Using profile '{profile_name}' against {base_url}");
    Ok(SyncTarget {
        profile_name,
        base_url,
        account,
        credentials,
        settings: profile.sync_settings(),
    })
}
