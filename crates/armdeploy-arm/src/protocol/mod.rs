//! Resource manager REST wire types
//!
//! Based on: https://learn.microsoft.com/rest/api/resources/deployments

pub mod requests;
pub mod responses;

pub use requests::{
    ContentLink, Deployment, DeploymentMode, DeploymentProperties, Parameters, ParametersSource,
    ResourceGroupRequest, TemplateSource,
};
pub use responses::{
    CloudError, DeploymentExtended, DeploymentPropertiesExtended, ErrorDetail, ProvisioningState,
    ResourceGroup, TokenErrorResponse, TokenResponse, ValidateResult,
};
