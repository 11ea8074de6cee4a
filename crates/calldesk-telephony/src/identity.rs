//! Identity resolution for webhook payloads
//!
//! A raw caller/callee identifier reaching a webhook is either a
//! software-client tag (`client:<user id>`) or a bare phone number. The
//! tagged union is produced once here at the boundary and passed through
//! typed; nothing downstream inspects string prefixes.

use calldesk_core::{
    models::AgentProfile, traits::AgentDirectory, AppError, AppResult,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Prefix the provider uses for software-client identities
const CLIENT_PREFIX: &str = "client:";

/// A caller/callee identity, resolved once from the raw identifier shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// A software client session, identified by the owning user
    Client(Uuid),
    /// A telephone number in canonical digit form
    PhoneNumber(String),
}

impl Identity {
    /// Parse a raw identifier from a webhook field.
    ///
    /// Empty identifiers are rejected; a `client:` tag must carry a valid
    /// user id; anything else is normalized as a phone number.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::Validation("empty identifier".to_string()));
        }

        if let Some(suffix) = raw.strip_prefix(CLIENT_PREFIX) {
            let user_id = Uuid::parse_str(suffix).map_err(|_| {
                AppError::InvalidInput(format!("malformed client identifier: {}", raw))
            })?;
            return Ok(Identity::Client(user_id));
        }

        Ok(Identity::PhoneNumber(normalize_number(raw)))
    }

    /// Whether this identity places calls from a software client.
    /// Client-initiated identifiers mark the call as outgoing.
    pub fn is_client(&self) -> bool {
        matches!(self, Identity::Client(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Client(id) => write!(f, "{}{}", CLIENT_PREFIX, id),
            Identity::PhoneNumber(n) => f.write_str(n),
        }
    }
}

/// Canonical digit form: keep a leading `+`, drop separators.
fn normalize_number(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            out.push(c);
        }
    }
    out
}

/// An identity together with the owning agent's profile and credentials
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub identity: Identity,
    pub agent: AgentProfile,
}

/// Read-only identity resolver over the agent directory
///
/// The same resolver handles all three identifier shapes a call produces:
/// outgoing-by-client, incoming-to-number, and status-update-by-either-leg.
/// `resolve_event` scans event fields so a status update lands on the same
/// identity that created the original call record.
pub struct IdentityResolver {
    agents: Arc<dyn AgentDirectory>,
}

impl IdentityResolver {
    /// Create a new resolver
    pub fn new(agents: Arc<dyn AgentDirectory>) -> Self {
        Self { agents }
    }

    /// Resolve a single identity to its owning agent profile
    #[instrument(skip(self))]
    pub async fn resolve(&self, identity: &Identity) -> AppResult<ResolvedIdentity> {
        let agent = match identity {
            Identity::Client(user_id) => self.agents.find_by_user_id(*user_id).await?,
            Identity::PhoneNumber(number) => self.agents.find_by_number(number).await?,
        };

        let agent =
            agent.ok_or_else(|| AppError::IdentityNotFound(identity.to_string()))?;

        debug!(identity = %identity, user_id = %agent.user_id, "Resolved identity");

        Ok(ResolvedIdentity {
            identity: identity.clone(),
            agent,
        })
    }

    /// Resolve the acting identity of a status-update event.
    ///
    /// Either leg of the call may carry the identity we own: a client tag
    /// anywhere wins (it is the leg that created the record for outgoing
    /// calls); otherwise each number is matched against assigned and
    /// personal agent numbers in field order. A call answered on the
    /// agent's personal phone produces child-leg callbacks whose only
    /// known number is that phone.
    #[instrument(skip(self, fields))]
    pub async fn resolve_event(&self, fields: &[Option<&str>]) -> AppResult<ResolvedIdentity> {
        let candidates: Vec<Identity> = fields
            .iter()
            .flatten()
            .filter_map(|raw| Identity::parse(raw).ok())
            .collect();

        if candidates.is_empty() {
            return Err(AppError::Validation(
                "status event carries no resolvable identifier".to_string(),
            ));
        }

        for identity in candidates.iter().filter(|i| i.is_client()) {
            if let Ok(resolved) = self.resolve(identity).await {
                return Ok(resolved);
            }
        }

        for identity in candidates.iter().filter(|i| !i.is_client()) {
            if let Identity::PhoneNumber(number) = identity {
                if let Some(agent) = self.agents.find_by_number(number).await? {
                    return Ok(ResolvedIdentity {
                        identity: identity.clone(),
                        agent,
                    });
                }
            }
        }

        Err(AppError::IdentityNotFound(
            candidates
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ))
    }
}
