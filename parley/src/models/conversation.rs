use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of speakers in a conversation. Matching is exhaustive: an
/// unrecognized role on the wire is a parse error, never silently ignored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("Unknown conversation role: {s}")),
        }
    }
}

/// One message in a conversation's ordered history. The sequence of turns is
/// the timeline: it must read back identically from cache and durable storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub system_instruction: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: String, user_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            title: None,
            system_instruction: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Listing row: everything a conversation index needs without the turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub turn_count: u32,
    pub updated_at: DateTime<Utc>,
}

/// One page of conversation summaries plus the total match count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationPage {
    pub items: Vec<ConversationSummary>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}
