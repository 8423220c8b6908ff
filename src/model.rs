use serde::Deserialize;

/// Approval states the workflow drives a task through. The tracker is
/// the only state shared across runs, so the status field doubles as a
/// cooperative lock and progress marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Granted,
    Posting,
    Posted,
    PostingFailed,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Granted => "granted",
            ApprovalStatus::Posting => "posting",
            ApprovalStatus::Posted => "posted",
            ApprovalStatus::PostingFailed => "posting_failed",
        }
    }
}

/// One schedulable unit of content, owned entirely by the tracker.
/// Each run works from a fresh snapshot; nothing is persisted locally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkItem {
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

/// A named custom field as the tracker returns it. Which of the value
/// slots is populated depends on the field type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomField {
    pub gid: String,
    #[serde(default)]
    pub display_value: Option<String>,
    #[serde(default)]
    pub text_value: Option<String>,
    #[serde(default)]
    pub date_value: Option<DateValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DateValue {
    #[serde(default)]
    pub date: Option<String>,
}

impl CustomField {
    /// First non-empty of display value, text value, date value.
    pub fn value(&self) -> Option<&str> {
        non_empty(self.display_value.as_deref())
            .or_else(|| non_empty(self.text_value.as_deref()))
            .or_else(|| non_empty(self.date_value.as_ref().and_then(|d| d.date.as_deref())))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

impl WorkItem {
    pub fn field(&self, field_gid: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|f| f.gid == field_gid)
    }

    pub fn field_value(&self, field_gid: &str) -> Option<&str> {
        self.field(field_gid).and_then(CustomField::value)
    }
}

/// Opaque confirmation data from a successful publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfirmation {
    pub platform: String,
    pub post_id: Option<String>,
}

/// Terminal outcome of one item within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Published and recorded on the tracker.
    Posted,
    /// Publish failed; failure recorded on the tracker.
    Failed,
    /// Could not lock the item, or could not record its outcome.
    Abandoned,
}

/// Process-level counts for one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub due: usize,
    pub posted: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// Status code + message handed back to the invoking trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub status: u16,
    pub message: String,
}
