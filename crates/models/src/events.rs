use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LifecycleError, LifecycleResult, ScoringError, ScoringResult};
use crate::ids::{CampaignId, EventId, GroupId, MovieId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub campaign_id: CampaignId,
    pub title: String,
    pub event_type: EventType,
    pub points_config: PointsConfig,
    pub status: EventStatus,
    #[serde(default)]
    pub lock_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub movie_id: Option<MovieId>,
    #[serde(default)]
    pub result: Option<EventResult>,
}

/// Kind of question an event asks. Stored as a plain string so records written
/// by newer producers still load; anything unknown becomes `Unsupported` and is
/// rejected at scoring time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    ChoiceSelection,
    NumericPrediction,
    DraftSelection,
    Unsupported(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::ChoiceSelection => "choice_selection",
            EventType::NumericPrediction => "numeric_prediction",
            EventType::DraftSelection => "draft_selection",
            EventType::Unsupported(other) => other,
        }
    }
}

impl From<String> for EventType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "choice_selection" => EventType::ChoiceSelection,
            "numeric_prediction" => EventType::NumericPrediction,
            "draft_selection" => EventType::DraftSelection,
            _ => EventType::Unsupported(raw),
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointsConfig {
    pub base_points: i64,
    #[serde(default)]
    pub difficulty_level: DifficultyLevel,
    #[serde(default)]
    pub perfect_bonus: Option<i64>,
    #[serde(default)]
    pub negative_marking: Option<i64>,
    #[serde(default)]
    pub accuracy_based: bool,
}

impl PointsConfig {
    pub fn new(base_points: i64) -> Self {
        Self {
            base_points,
            difficulty_level: DifficultyLevel::default(),
            perfect_bonus: None,
            negative_marking: None,
            accuracy_based: false,
        }
    }

    pub fn with_perfect_bonus(mut self, bonus: i64) -> Self {
        self.perfect_bonus = Some(bonus);
        self
    }

    pub fn with_negative_marking(mut self, penalty: i64) -> Self {
        self.negative_marking = Some(penalty);
        self
    }

    pub fn with_accuracy_based(mut self, accuracy_based: bool) -> Self {
        self.accuracy_based = accuracy_based;
        self
    }

    pub fn with_difficulty(mut self, level: DifficultyLevel) -> Self {
        self.difficulty_level = level;
        self
    }

    pub fn validate(&self) -> ScoringResult<()> {
        if self.base_points < 1 {
            return Err(ScoringError::InvalidPointsConfig {
                reason: format!("base_points must be at least 1, got {}", self.base_points),
            });
        }
        if let Some(bonus) = self.perfect_bonus.filter(|b| *b < 0) {
            return Err(ScoringError::InvalidPointsConfig {
                reason: format!("perfect_bonus must not be negative, got {}", bonus),
            });
        }
        if let Some(penalty) = self.negative_marking.filter(|p| *p < 0) {
            return Err(ScoringError::InvalidPointsConfig {
                reason: format!("negative_marking must not be negative, got {}", penalty),
            });
        }
        if self.base_points.checked_add(self.bonus()).is_none() {
            return Err(ScoringError::InvalidPointsConfig {
                reason: format!(
                    "base_points {} plus perfect_bonus {} overflows",
                    self.base_points,
                    self.bonus()
                ),
            });
        }
        Ok(())
    }

    pub fn bonus(&self) -> i64 {
        self.perfect_bonus.unwrap_or(0)
    }

    /// The configured penalty, only when it is actually active (> 0).
    pub fn penalty(&self) -> Option<i64> {
        self.negative_marking.filter(|p| *p > 0)
    }
}

/// Event-level lifecycle. Declaration order is the forward order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Upcoming,
    Live,
    Locked,
    Completed,
}

/// Admin-entered outcome. Text for choice questions, a number for numeric ones,
/// though numeric outcomes typed into a form as text are accepted too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Outcome {
    Number(f64),
    Text(String),
}

impl Outcome {
    pub fn as_text(&self) -> String {
        match self {
            Outcome::Number(n) => n.to_string(),
            Outcome::Text(s) => s.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Outcome::Number(n) => Some(*n).filter(|n| n.is_finite()),
            Outcome::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Outcome::Number(_) => false,
            Outcome::Text(s) => s.trim().is_empty(),
        }
    }
}

impl From<&str> for Outcome {
    fn from(text: &str) -> Self {
        Outcome::Text(text.to_string())
    }
}

impl From<f64> for Outcome {
    fn from(n: f64) -> Self {
        Outcome::Number(n)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventResult {
    pub outcome: Outcome,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl EventResult {
    pub fn pending(outcome: Outcome) -> Self {
        Self {
            outcome,
            verified: false,
            verified_at: None,
            approved: false,
            approved_at: None,
            notes: None,
        }
    }

    pub fn is_usable_for_distribution(&self) -> bool {
        self.verified && self.approved
    }
}

impl Event {
    pub fn new(
        id: impl Into<EventId>,
        campaign_id: impl Into<CampaignId>,
        title: impl Into<String>,
        event_type: EventType,
        points_config: PointsConfig,
    ) -> Self {
        Self {
            id: id.into(),
            campaign_id: campaign_id.into(),
            title: title.into(),
            event_type,
            points_config,
            status: EventStatus::Upcoming,
            lock_time: None,
            group_id: None,
            movie_id: None,
            result: None,
        }
    }

    pub fn with_lock_time(mut self, lock_time: DateTime<Utc>) -> Self {
        self.lock_time = Some(lock_time);
        self
    }

    pub fn with_group(mut self, group_id: impl Into<GroupId>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_movie(mut self, movie_id: impl Into<MovieId>) -> Self {
        self.movie_id = Some(movie_id.into());
        self
    }

    fn advance(&mut self, from: EventStatus, to: EventStatus) -> LifecycleResult<()> {
        if self.status != from {
            return Err(LifecycleError::InvalidTransition {
                event_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn go_live(&mut self) -> LifecycleResult<()> {
        self.advance(EventStatus::Upcoming, EventStatus::Live)
    }

    pub fn lock(&mut self) -> LifecycleResult<()> {
        self.advance(EventStatus::Live, EventStatus::Locked)
    }

    /// Attach the outcome. The result starts unverified and unapproved.
    pub fn complete(&mut self, outcome: Outcome, notes: Option<String>) -> LifecycleResult<()> {
        self.advance(EventStatus::Locked, EventStatus::Completed)?;
        let mut result = EventResult::pending(outcome);
        result.notes = notes;
        self.result = Some(result);
        Ok(())
    }

    pub fn verify(&mut self, now: DateTime<Utc>) -> LifecycleResult<()> {
        self.ensure_completed()?;
        let event_id = self.id.clone();
        let result = self
            .result
            .as_mut()
            .filter(|r| !r.outcome.is_empty())
            .ok_or(LifecycleError::MissingOutcome { event_id })?;
        result.verified = true;
        result.verified_at = Some(now);
        Ok(())
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> LifecycleResult<()> {
        self.ensure_completed()?;
        let event_id = self.id.clone();
        let result = self
            .result
            .as_mut()
            .filter(|r| r.verified)
            .ok_or(LifecycleError::NotVerified { event_id })?;
        result.approved = true;
        result.approved_at = Some(now);
        Ok(())
    }

    /// Admin override, the only path that may move the status backwards.
    /// Regressing out of `Completed` drops verification and approval so the
    /// result has to go through the workflow again.
    pub fn admin_override(&mut self, status: EventStatus) {
        if status < EventStatus::Completed {
            if let Some(result) = self.result.as_mut() {
                result.verified = false;
                result.verified_at = None;
                result.approved = false;
                result.approved_at = None;
            }
        }
        self.status = status;
    }

    fn ensure_completed(&self) -> LifecycleResult<()> {
        if self.status != EventStatus::Completed {
            return Err(LifecycleError::InvalidTransition {
                event_id: self.id.clone(),
                from: self.status,
                to: EventStatus::Completed,
            });
        }
        Ok(())
    }

    /// Gate for prediction create/replace.
    pub fn ensure_accepting_predictions(&self, now: DateTime<Utc>) -> LifecycleResult<()> {
        match self.status {
            EventStatus::Upcoming => Err(LifecycleError::EventNotLive {
                event_id: self.id.clone(),
            }),
            EventStatus::Locked | EventStatus::Completed => Err(LifecycleError::EventLocked {
                event_id: self.id.clone(),
            }),
            EventStatus::Live => match self.lock_time {
                Some(lock_time) if now >= lock_time => Err(LifecycleError::EventLocked {
                    event_id: self.id.clone(),
                }),
                _ => Ok(()),
            },
        }
    }

    /// A result exists and has been verified; enough for live estimates.
    pub fn verified_result(&self) -> Option<&EventResult> {
        if self.status != EventStatus::Completed {
            return None;
        }
        self.result.as_ref().filter(|r| r.verified)
    }

    /// Completed, verified and approved: the only state settlement accepts.
    pub fn is_settleable(&self) -> bool {
        self.status == EventStatus::Completed
            && self
                .result
                .as_ref()
                .is_some_and(EventResult::is_usable_for_distribution)
    }
}
