// armdeploy - deploy Azure Resource Manager templates
//
// One run: authenticate with a service principal, ensure the resource group,
// build the request from a local or linked template, validate, deploy and
// optionally tear the group down again.

pub mod commands;
mod init;
pub mod orchestrator;
pub mod parameters;
pub mod report;

pub use init::init_tracing;
pub use orchestrator::{Orchestrator, RunReport, Stage};
