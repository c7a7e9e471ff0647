//! Console rendering for validation errors and the success hint

use armdeploy_arm::ErrorDetail;

/// Three-line validation error block; empty or absent fields print as `-`.
pub fn format_validation_error(detail: &ErrorDetail) -> String {
    format!(
        "Error! Code: {}\nMessage: {}\nTarget: {}",
        or_dash(detail.code.as_deref()),
        or_dash(detail.message.as_deref()),
        or_dash(detail.target.as_deref()),
    )
}

fn or_dash(field: Option<&str>) -> &str {
    match field {
        Some(value) if !value.is_empty() => value,
        _ => "-",
    }
}

/// e.g. `You can connect via ssh azureSample@sample-dns-prefix.westus.cloudapp.azure.com`
pub fn connection_hint(
    user: &str,
    dns_prefix: &str,
    location: &str,
    cloudapp_suffix: &str,
) -> String {
    format!(
        "You can connect via ssh {}@{}.{}.{}",
        user, dns_prefix, location, cloudapp_suffix
    )
}
