use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WaybillError;

// =============================================================================
// Identity
// =============================================================================

/// Coarse identity class of the current user.
///
/// Decides which top-level branch of the knowledge catalog is visible. A
/// widget instance classifies its role once and keeps it for its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Anonymous visitor of the public pages.
    #[default]
    Visitor,
    /// Signed-in customer with a box and shipments.
    Client,
    /// Warehouse or support staff.
    Employee,
    /// Platform administrator.
    Admin,
}

impl Role {
    /// All roles in catalog order.
    pub const ALL: [Role; 4] = [Role::Visitor, Role::Client, Role::Employee, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Visitor => "visitor",
            Role::Client => "client",
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = WaybillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WaybillError::Knowledge(format!("unknown role '{}'", s)))
    }
}

// =============================================================================
// Newtype Wrappers - Location
// =============================================================================

/// Identifier of the functional area the user is currently viewing.
///
/// Free-form (`"box-view"`, `"finance-view"`, ...). Unknown identifiers are
/// legal; lookups degrade to [`Context::DEFAULT`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(String);

impl Context {
    /// Identifier every role is guaranteed to have an entry for.
    pub const DEFAULT: &'static str = "default";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl Default for Context {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Context {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Context {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Context {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// Knowledge
// =============================================================================

/// A pre-authored quick reply.
///
/// `trigger` is the clickable label and a free-text match candidate; `answer`
/// is delivered verbatim when the option is clicked or matched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickOption {
    pub trigger: String,
    pub answer: String,
}

impl QuickOption {
    pub fn new(trigger: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            answer: answer.into(),
        }
    }
}

/// Canonical response for one (role, context) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub message: String,
    #[serde(default)]
    pub options: Vec<QuickOption>,
}

/// A resolved assistant reply: message text plus zero or more quick replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    pub options: Vec<QuickOption>,
}

impl Response {
    /// A reply with no quick-reply options.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            options: Vec::new(),
        }
    }
}

impl From<&KnowledgeEntry> for Response {
    fn from(entry: &KnowledgeEntry) -> Self {
        Self {
            message: entry.message.clone(),
            options: entry.options.clone(),
        }
    }
}

// =============================================================================
// Transcript
// =============================================================================

/// Identifier of a transcript turn, unique within one widget instance.
///
/// Issued from a monotonically increasing counter, so a later turn always
/// has a larger id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// What a transcript turn carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnKind {
    /// Something the user typed or clicked.
    User { text: String },
    /// A revealed assistant reply.
    Assistant {
        message: String,
        options: Vec<QuickOption>,
    },
    /// Transient "typing" placeholder, removed before the reply is revealed.
    Typing,
}

/// One entry of the conversation transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    #[serde(flatten)]
    pub kind: TurnKind,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(id: TurnId, kind: TurnKind) -> Self {
        Self {
            id,
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn is_typing(&self) -> bool {
        matches!(self.kind, TurnKind::Typing)
    }

    /// Quick replies attached to an assistant turn; empty for any other turn.
    pub fn options(&self) -> &[QuickOption] {
        match &self.kind {
            TurnKind::Assistant { options, .. } => options,
            _ => &[],
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
