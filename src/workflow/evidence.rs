//! Evidence accumulation and next-action derivation (spec.md §4.4).

use super::step::{EvidenceItem, Severity};

#[derive(Debug, Default)]
pub struct EvidenceLedger {
    items: Vec<EvidenceItem>,
}

impl EvidenceLedger {
    pub fn append(&mut self, items: impl IntoIterator<Item = EvidenceItem>) {
        self.items.extend(items);
    }

    pub fn all(&self) -> &[EvidenceItem] {
        &self.items
    }

    pub fn by_severity(&self, severity: Severity) -> Vec<&EvidenceItem> {
        self.items.iter().filter(|e| e.severity == severity).collect()
    }
}

/// Derive a non-empty list of recommended next actions from the
/// severity distribution of a step's own evidence (spec.md §4.4 step 3).
pub fn next_actions(evidence: &[EvidenceItem]) -> Vec<String> {
    let critical = evidence.iter().filter(|e| e.severity == Severity::Critical).count();
    let major = evidence.iter().filter(|e| e.severity == Severity::Major).count();
    let minor = evidence.iter().filter(|e| e.severity == Severity::Minor).count();

    let mut actions = Vec::new();
    if critical > 0 {
        actions.push(format!("Resolve {critical} critical issue(s) before proceeding"));
    }
    if major > 0 {
        actions.push(format!("Address {major} major issue(s)"));
    }
    if minor > 0 {
        actions.push(format!("Consider {minor} minor improvement(s)"));
    }
    if actions.is_empty() {
        actions.push("Proceed to next step".to_string());
    }
    actions
}
