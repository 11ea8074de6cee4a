//! Agent telephony profiles and provider credentials
//!
//! Read-only from the orchestration core's perspective; owned by account
//! and user management. Credential fields are individually optional in the
//! store, so each operation checks the subset it needs and reports
//! `ConfigurationIncomplete` for the first missing one.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Where the agent wants to receive incoming calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallReceivingDevice {
    /// Dial the agent's personal phone number
    Phone,
    /// Connect to the agent's software client session
    Client,
}

impl CallReceivingDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallReceivingDevice::Phone => "Phone",
            CallReceivingDevice::Client => "Client",
        }
    }
}

impl fmt::Display for CallReceivingDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallReceivingDevice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Phone" => Ok(CallReceivingDevice::Phone),
            "Client" => Ok(CallReceivingDevice::Client),
            other => Err(format!("unknown call receiving device: {}", other)),
        }
    }
}

/// Provider account credentials owned by the agent's organization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Outbound application id the client SDK dials through
    pub outgoing_app_sid: Option<String>,
    /// Whether calls placed under this account are recorded
    pub record_calls: bool,
}

impl ProviderCredentials {
    /// Credentials needed to talk to the provider REST API and to verify
    /// webhook signatures.
    pub fn require_rest(&self) -> Result<(&str, &str), AppError> {
        let sid = self
            .account_sid
            .as_deref()
            .ok_or(AppError::ConfigurationIncomplete("account_sid"))?;
        let token = self
            .auth_token
            .as_deref()
            .ok_or(AppError::ConfigurationIncomplete("auth_token"))?;
        Ok((sid, token))
    }

    /// The webhook signing key
    pub fn require_auth_token(&self) -> Result<&str, AppError> {
        self.auth_token
            .as_deref()
            .ok_or(AppError::ConfigurationIncomplete("auth_token"))
    }

    /// Credentials needed to mint a voice access token
    pub fn require_token_credentials(&self) -> Result<TokenCredentials<'_>, AppError> {
        Ok(TokenCredentials {
            account_sid: self
                .account_sid
                .as_deref()
                .ok_or(AppError::ConfigurationIncomplete("account_sid"))?,
            api_key: self
                .api_key
                .as_deref()
                .ok_or(AppError::ConfigurationIncomplete("api_key"))?,
            api_secret: self
                .api_secret
                .as_deref()
                .ok_or(AppError::ConfigurationIncomplete("api_secret"))?,
            outgoing_app_sid: self
                .outgoing_app_sid
                .as_deref()
                .ok_or(AppError::ConfigurationIncomplete("outgoing_app_sid"))?,
        })
    }
}

/// Borrowed view of the credential subset used for access tokens
#[derive(Debug, Clone, Copy)]
pub struct TokenCredentials<'a> {
    pub account_sid: &'a str,
    pub api_key: &'a str,
    pub api_secret: &'a str,
    pub outgoing_app_sid: &'a str,
}

/// Per-user telephony configuration joined with the owning user row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub user_id: Uuid,
    pub organization_id: i64,
    /// Agent's personal phone number, the Phone-device dial target
    pub phone: Option<String>,
    /// Provider number assigned to this agent for incoming calls
    pub agent_number: Option<String>,
    pub call_receiving_device: CallReceivingDevice,
    pub credentials: ProviderCredentials,
}

impl AgentProfile {
    /// Incoming calls should ring a phone, but no phone number is set:
    /// the call has no routing target and ends as missed.
    pub fn lacks_phone_target(&self) -> bool {
        self.call_receiving_device == CallReceivingDevice::Phone && self.phone.is_none()
    }
}

/// CRM contact lookup row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub organization_id: i64,
    pub company_id: Option<i64>,
    pub mobile_phone: Option<String>,
}

/// CRM lead lookup row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub organization_id: i64,
    pub company_id: Option<i64>,
}
