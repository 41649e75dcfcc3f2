//! Support ticket Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::order::CustomerSummary;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Closed,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Open => write!(f, "Open"), Self::InProgress => write!(f, "In Progress"), Self::Closed => write!(f, "Closed") }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    pub subject: String,
    pub details: String,
    pub status: TicketStatus,
    #[serde(rename = "users", default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSummary>,
}

impl SupportTicket {
    pub fn open(user_id: impl Into<String>, subject: impl Into<String>, details: impl Into<String>) -> Result<Self, TicketError> {
        let (subject, details) = (subject.into(), details.into());
        if subject.trim().is_empty() { return Err(TicketError::MissingSubject); }
        if details.trim().is_empty() { return Err(TicketError::MissingDetails); }
        Ok(Self {
            id: String::new(), user_id: user_id.into(), created_at: Utc::now(), resolved_at: None,
            subject, details, status: TicketStatus::Open, customer: None,
        })
    }

    /// Closing stamps `resolved_at`; any other status clears it.
    pub fn set_status(&mut self, status: TicketStatus, now: DateTime<Utc>) {
        self.status = status;
        self.resolved_at = (status == TicketStatus::Closed).then_some(now);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum TicketError { MissingSubject, MissingDetails }
impl std::error::Error for TicketError {}
impl fmt::Display for TicketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::MissingSubject => write!(f, "Subject is required"), Self::MissingDetails => write!(f, "Please describe the issue") }
    }
}
