use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RecordStatus;

/// Emitted after an administrator's status change has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChanged {
    pub record_id: Uuid,
    pub title: String,
    pub from: RecordStatus,
    pub to: RecordStatus,
    pub reason: Option<String>,
    /// Owner to notify. `None` for anonymous records.
    pub recipient: Option<Recipient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl StatusChanged {
    pub fn subject(&self) -> &'static str {
        "Update on Your Record Status"
    }

    pub fn body(&self, recipient_name: &str) -> String {
        let mut body = format!(
            "Hello {},\n\nYour record titled \"{}\" has been updated.\nStatus: {} -> {}\n",
            recipient_name, self.title, self.from, self.to
        );
        if let Some(reason) = self.reason.as_deref().filter(|r| !r.trim().is_empty()) {
            body.push_str(&format!("Reason: {}\n", reason.trim()));
        }
        body.push_str("\nThank you for using Jiseti.\n\n- Jiseti Admin Team");
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_mentions_transition_and_reason() {
        let event = StatusChanged {
            record_id: Uuid::new_v4(),
            title: "Bridge funds".into(),
            from: RecordStatus::Draft,
            to: RecordStatus::UnderInvestigation,
            reason: Some("Starting investigation".into()),
            recipient: None,
        };
        let body = event.body("Jane");
        assert!(body.starts_with("Hello Jane"));
        assert!(body.contains("\"Bridge funds\""));
        assert!(body.contains("draft -> under-investigation"));
        assert!(body.contains("Reason: Starting investigation"));
    }

    #[test]
    fn blank_reason_is_omitted() {
        let event = StatusChanged {
            record_id: Uuid::new_v4(),
            title: "t".into(),
            from: RecordStatus::UnderInvestigation,
            to: RecordStatus::Resolved,
            reason: Some("   ".into()),
            recipient: None,
        };
        assert!(!event.body("x").contains("Reason"));
    }
}
