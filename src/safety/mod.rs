pub mod approval;
pub mod gate;

pub use approval::{ApprovalBroker, ApprovalDecision, ApprovalRequest, AutoDenyBroker};
pub use gate::{AllowAllGate, RiskCategory, RiskLevel, RuleSafetyGate, SafetyGate, SafetyResult};
