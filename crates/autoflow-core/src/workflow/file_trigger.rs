//! File-event trigger matching.
//!
//! A rule matches when its `type` equals the event kind and every condition
//! it carries passes: extension membership, inclusive size ceiling and MIME
//! type membership. Absent conditions always pass. Rules are tried in list
//! order and the first match wins.

use autoflow_types::execution::TriggerKind;
use autoflow_types::file::FileRecord;
use autoflow_types::workflow::{TriggerRule, Workflow};

/// First rule of `workflow` matching the event, or `None`. Workflows that
/// are not active and enabled never match.
pub fn matching_rule<'a>(
    workflow: &'a Workflow,
    file: &FileRecord,
    event: TriggerKind,
) -> Option<&'a TriggerRule> {
    if !workflow.is_runnable() {
        return None;
    }
    workflow
        .triggers
        .iter()
        .find(|rule| rule.event == event.as_str() && rule_matches(rule, file))
}

/// Whether `file` passes every condition present on `rule`.
pub fn rule_matches(rule: &TriggerRule, file: &FileRecord) -> bool {
    if let Some(extensions) = &rule.file_extensions {
        let ext = file.extension();
        if !extensions.iter().any(|allowed| normalize_extension(allowed) == ext) {
            return false;
        }
    }

    if let Some(max) = rule.max_file_size {
        if file.file_size > max {
            return false;
        }
    }

    if let Some(mime_types) = &rule.mime_types {
        match &file.mime_type {
            Some(mime) if mime_types.iter().any(|m| m == mime) => {}
            _ => return false,
        }
    }

    true
}

/// Lowercase with a leading dot: `"PDF"` and `".pdf"` both become `".pdf"`.
fn normalize_extension(ext: &str) -> String {
    let lower = ext.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_file, workflow_with_steps};
    use autoflow_types::workflow::WorkflowStatus;

    fn rule(event: &str) -> TriggerRule {
        TriggerRule {
            event: event.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rule_without_conditions_matches() {
        let file = sample_file("anything.bin");
        assert!(rule_matches(&rule("file_upload"), &file));
    }

    #[test]
    fn test_extension_condition() {
        let file = sample_file("Report.PDF");
        let mut r = rule("file_upload");
        r.file_extensions = Some(vec!["pdf".to_string()]);
        assert!(rule_matches(&r, &file));
        r.file_extensions = Some(vec![".csv".to_string()]);
        assert!(!rule_matches(&r, &file));
    }

    #[test]
    fn test_size_ceiling_is_inclusive() {
        let mut file = sample_file("a.txt");
        file.file_size = 100;
        let mut r = rule("file_upload");
        r.max_file_size = Some(100);
        assert!(rule_matches(&r, &file));
        file.file_size = 101;
        assert!(!rule_matches(&r, &file));
    }

    #[test]
    fn test_mime_condition_requires_known_type() {
        let mut file = sample_file("a.txt");
        let mut r = rule("file_upload");
        r.mime_types = Some(vec!["text/plain".to_string()]);
        assert!(!rule_matches(&r, &file));
        file.mime_type = Some("text/plain".to_string());
        assert!(rule_matches(&r, &file));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let file = sample_file("a.txt");
        let mut wf = workflow_with_steps(vec![]);
        let mut strict = rule("file_upload");
        strict.file_extensions = Some(vec![".pdf".to_string()]);
        let mut loose = rule("file_upload");
        loose.max_file_size = Some(1_000_000);
        let other_event = rule("file_processed");
        wf.triggers = vec![other_event, strict, loose.clone()];

        assert_eq!(
            matching_rule(&wf, &file, TriggerKind::FileUpload),
            Some(&loose)
        );
        assert_eq!(
            matching_rule(&wf, &file, TriggerKind::FileProcessed).map(|r| r.event.as_str()),
            Some("file_processed")
        );
        assert!(matching_rule(&wf, &file, TriggerKind::Manual).is_none());
    }

    #[test]
    fn test_inactive_workflow_never_matches() {
        let file = sample_file("a.txt");
        let mut wf = workflow_with_steps(vec![]);
        wf.triggers = vec![rule("file_upload")];
        wf.status = WorkflowStatus::Paused;
        assert!(matching_rule(&wf, &file, TriggerKind::FileUpload).is_none());
        wf.status = WorkflowStatus::Active;
        wf.is_enabled = false;
        assert!(matching_rule(&wf, &file, TriggerKind::FileUpload).is_none());
    }
}
