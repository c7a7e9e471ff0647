//! Azure Resource Manager client for template deployments
//!
//! Token exchange, resource group and deployment calls over a pluggable
//! HTTP client.

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod protocol;

pub use auth::{authenticate, AccessToken};
pub use client::{ResourceManagerClient, ValidationOutcome, API_VERSION};
pub use error::{DeployError, ErrorCode, Result};
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use protocol::{
    ContentLink, Deployment, DeploymentExtended, ErrorDetail, Parameters, ParametersSource,
    TemplateSource,
};
