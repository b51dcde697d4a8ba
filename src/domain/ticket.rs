use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tag::RoutingTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "positive" | "pos" => Some(Sentiment::Positive),
            "negative" | "neg" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

/// Output of the classification pipeline, held only until the ticket is saved.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub summary: String,
    pub tag: RoutingTag,
    pub confidence: Option<f64>,
    pub sentiment: Option<Sentiment>,
}

/// A ticket ready to be written; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub original_text: String,
    pub summary: String,
    pub tag: RoutingTag,
    pub confidence: Option<f64>,
    pub sentiment: Option<Sentiment>,
}

impl NewTicket {
    pub fn from_classification(original_text: String, result: ClassificationResult) -> Self {
        Self {
            original_text,
            summary: result.summary,
            tag: result.tag,
            confidence: result.confidence,
            sentiment: result.sentiment,
        }
    }

    pub fn priority_rank(&self) -> u32 {
        self.tag.priority_rank()
    }

    pub fn into_ticket(self, id: String, created_at: DateTime<Utc>) -> Ticket {
        Ticket {
            id,
            priority_rank: self.tag.priority_rank(),
            original_text: self.original_text,
            summary: self.summary,
            tag: self.tag,
            confidence: self.confidence,
            sentiment: self.sentiment,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub original_text: String,
    pub summary: String,
    pub tag: RoutingTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    pub created_at: DateTime<Utc>,
    pub priority_rank: u32,
}

impl Ticket {
    pub fn is_urgent(&self) -> bool {
        self.tag == RoutingTag::Urgent
    }

    /// Dashboard order: most urgent rank first, newest first within a rank.
    pub fn dashboard_order(a: &Ticket, b: &Ticket) -> Ordering {
        a.priority_rank
            .cmp(&b.priority_rank)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }
}

pub fn sort_for_dashboard(tickets: &mut [Ticket]) {
    tickets.sort_by(Ticket::dashboard_order);
}
