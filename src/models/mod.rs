pub mod decision;
pub mod issue;
pub mod pipeline;
pub mod stage;

pub use decision::{DecisionItem, DecisionStatus, DecisionTable, NewDecisionItem, Priority};
pub use issue::{IssueCode, MappedIssue, ReopenDecision, ValidationIssue};
pub use pipeline::{PipelineState, ReopenRecord, ReopenSource};
pub use stage::{StageName, StageRecord, StageStatus};
