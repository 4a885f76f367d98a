#[path = "support/stubs.rs"]
mod stubs;

#[path = "planner/end_to_end.rs"]
mod end_to_end;
#[path = "planner/retry_and_blocking.rs"]
mod retry_and_blocking;
#[path = "planner/safety_flow.rs"]
mod safety_flow;
#[path = "planner/validation.rs"]
mod validation;
