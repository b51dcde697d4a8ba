use serde::{Deserialize, Serialize};

/// Routing tags in fixed priority order: earlier variants are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoutingTag {
    Urgent,
    Billing,
    #[serde(rename = "Technical Support")]
    TechnicalSupport,
    #[serde(rename = "Bug Report")]
    BugReport,
    #[serde(rename = "Feature Request")]
    FeatureRequest,
    Praise,
    #[serde(rename = "General Feedback")]
    GeneralFeedback,
}

impl RoutingTag {
    pub const ALL: [RoutingTag; 7] = [
        RoutingTag::Urgent,
        RoutingTag::Billing,
        RoutingTag::TechnicalSupport,
        RoutingTag::BugReport,
        RoutingTag::FeatureRequest,
        RoutingTag::Praise,
        RoutingTag::GeneralFeedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingTag::Urgent => "Urgent",
            RoutingTag::Billing => "Billing",
            RoutingTag::TechnicalSupport => "Technical Support",
            RoutingTag::BugReport => "Bug Report",
            RoutingTag::FeatureRequest => "Feature Request",
            RoutingTag::Praise => "Praise",
            RoutingTag::GeneralFeedback => "General Feedback",
        }
    }

    /// Accepts the wire label as well as compact spellings such as
    /// `bug_report` or `BugReport`.
    pub fn from_str(value: &str) -> Option<Self> {
        let normalized = value
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "urgent" => Some(RoutingTag::Urgent),
            "billing" => Some(RoutingTag::Billing),
            "technicalsupport" => Some(RoutingTag::TechnicalSupport),
            "bugreport" => Some(RoutingTag::BugReport),
            "featurerequest" => Some(RoutingTag::FeatureRequest),
            "praise" => Some(RoutingTag::Praise),
            "generalfeedback" => Some(RoutingTag::GeneralFeedback),
            _ => None,
        }
    }

    /// Dashboard sort key; 0 sorts first.
    pub fn priority_rank(&self) -> u32 {
        *self as u32
    }
}

/// Candidate labels offered to the zero-shot classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet(Vec<RoutingTag>);

impl LabelSet {
    /// Builds a label set, dropping duplicates and keeping priority order.
    /// Returns `None` when no labels remain.
    pub fn new(tags: impl IntoIterator<Item = RoutingTag>) -> Option<Self> {
        let mut tags = tags.into_iter().collect::<Vec<_>>();
        tags.sort();
        tags.dedup();
        if tags.is_empty() { None } else { Some(Self(tags)) }
    }

    pub fn parse_list(value: &str) -> Result<Self, String> {
        let mut tags = Vec::new();
        for label in value.split(',').map(str::trim).filter(|l| !l.is_empty()) {
            let tag = RoutingTag::from_str(label)
                .ok_or_else(|| format!("unknown routing label '{label}'"))?;
            tags.push(tag);
        }
        Self::new(tags).ok_or_else(|| "label set must not be empty".to_string())
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.0.iter().map(RoutingTag::as_str).collect()
    }

    pub fn contains(&self, tag: RoutingTag) -> bool {
        self.0.contains(&tag)
    }

    /// Least urgent member, used when the provider names no known label.
    pub fn fallback(&self) -> RoutingTag {
        // Non-empty by construction.
        self.0[self.0.len() - 1]
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self(RoutingTag::ALL.to_vec())
    }
}
