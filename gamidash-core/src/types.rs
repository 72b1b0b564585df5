//! Core domain types for gamidash
//!
//! These mirror the records of the learning platform that the dashboard reads.
//! The store owns the data; the types here are either write models used to
//! load records (`New*`) or read models returned by store queries.
//!
//! ## Storage codes
//!
//! | Concept | Stored values |
//! |---------|---------------|
//! | Role | `siswa`, `guru`, `ortu`, `admin` |
//! | Challenge type | `individual`, `group` |
//! | Participant status | `completed`, `in_progress` |
//! | Habit log status | `completed`, `joined`, `submitted` |
//! | Mood | `happy`, `neutral`, `sad`, `angry`, `tired`, or empty |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Users
// ============================================

/// Role of a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Admin,
}

impl Role {
    /// Code stored in the `users.role` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "siswa",
            Role::Teacher => "guru",
            Role::Parent => "ortu",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "siswa" | "student" => Ok(Role::Student),
            "guru" | "teacher" => Ok(Role::Teacher),
            "ortu" | "parent" => Ok(Role::Parent),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// A user to insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub xp: i64,
    pub level: i64,
    pub avatar_url: String,
    /// Parent account this user is linked to, if any
    pub parent_id: Option<i64>,
}

impl NewUser {
    /// A user with the given name and role and no progress yet.
    pub fn new(name: &str, role: Role) -> Self {
        Self {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            role,
            xp: 0,
            level: 1,
            avatar_url: String::new(),
            parent_id: None,
        }
    }

    /// Set XP and level.
    pub fn with_xp(mut self, xp: i64, level: i64) -> Self {
        self.xp = xp;
        self.level = level;
        self
    }
}

/// A student row as shown on the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub id: i64,
    pub name: String,
    pub xp: i64,
    pub level: i64,
    pub avatar_url: String,
}

/// Minimal identity of a user attached to an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorRef {
    pub id: i64,
    pub name: String,
}

// ============================================
// Challenges
// ============================================

/// Whether a challenge is done alone or as a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    Individual,
    Group,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Individual => "individual",
            ChallengeType::Group => "group",
        }
    }
}

impl std::str::FromStr for ChallengeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(ChallengeType::Individual),
            "group" => Ok(ChallengeType::Group),
            _ => Err(format!("unknown challenge type: {}", s)),
        }
    }
}

/// Status of a user's participation in a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Completed,
    InProgress,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Completed => "completed",
            ParticipantStatus::InProgress => "in_progress",
        }
    }
}

/// A challenge to insert.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub title: String,
    pub description: String,
    pub challenge_type: ChallengeType,
    pub end_date: DateTime<Utc>,
    pub xp: i64,
}

/// A challenge participation to insert.
///
/// `submitted_at` is present only once the participation is completed.
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub challenge_id: i64,
    pub user_id: i64,
    pub status: ParticipantStatus,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Challenge fields needed to describe a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeRef {
    pub id: i64,
    pub title: String,
    pub xp: i64,
}

/// A completed participation with its user and challenge eagerly joined.
///
/// Either relation is `None` when the referenced row is missing.
#[derive(Debug, Clone)]
pub struct ChallengeCompletionRow {
    pub id: i64,
    pub submitted_at: Option<DateTime<Utc>>,
    pub user: Option<ActorRef>,
    pub challenge: Option<ChallengeRef>,
}

/// An active challenge with its participation counts.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeProgressRow {
    pub id: i64,
    pub title: String,
    pub challenge_type: ChallengeType,
    pub end_date: DateTime<Utc>,
    pub total_participants: i64,
    pub completed_participants: i64,
}

// ============================================
// Habits
// ============================================

/// Status of a habit log entry.
///
/// "Not done" is not a status of its own: it is every status other than
/// `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitStatus {
    Completed,
    Joined,
    Submitted,
}

impl HabitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HabitStatus::Completed => "completed",
            HabitStatus::Joined => "joined",
            HabitStatus::Submitted => "submitted",
        }
    }
}

/// A habit to insert.
#[derive(Debug, Clone)]
pub struct NewHabit {
    pub title: String,
    pub description: String,
    pub owner_id: i64,
    pub xp: i64,
}

/// A habit log to insert.
#[derive(Debug, Clone)]
pub struct NewHabitLog {
    pub habit_id: i64,
    pub user_id: i64,
    /// Calendar day the log is for
    pub date: DateTime<Utc>,
    pub status: HabitStatus,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Habit fields needed to describe a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HabitRef {
    pub id: i64,
    pub title: String,
    pub xp: i64,
}

/// A completed habit log with its user and habit eagerly joined.
#[derive(Debug, Clone)]
pub struct HabitCompletionRow {
    pub id: i64,
    pub submitted_at: Option<DateTime<Utc>>,
    pub user: Option<ActorRef>,
    pub habit: Option<HabitRef>,
}

// ============================================
// Reflections
// ============================================

/// Mood vocabulary for reflections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
    Angry,
    Tired,
}

impl Mood {
    pub const ALL: [Mood; 5] = [Mood::Happy, Mood::Neutral, Mood::Sad, Mood::Angry, Mood::Tired];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Neutral => "neutral",
            Mood::Sad => "sad",
            Mood::Angry => "angry",
            Mood::Tired => "tired",
        }
    }

    /// Parse a stored mood. Empty or unknown values mean "no mood".
    pub fn from_storage(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "happy" => Some(Mood::Happy),
            "neutral" => Some(Mood::Neutral),
            "sad" => Some(Mood::Sad),
            "angry" => Some(Mood::Angry),
            "tired" => Some(Mood::Tired),
            _ => None,
        }
    }
}

/// A reflection to insert.
#[derive(Debug, Clone)]
pub struct NewReflection {
    pub user_id: i64,
    pub date: DateTime<Utc>,
    pub mood: Option<Mood>,
    pub content: String,
}
