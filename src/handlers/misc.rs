//! Account config, service catalog, and datacenter operations

use crate::cloudapi::{CloudApi, CloudError, FetchOptions};
use crate::codec::{self, NameValuePair};

/// Account configuration as name-value pairs.
pub async fn config(client: &CloudApi) -> Result<Vec<NameValuePair>, CloudError> {
    let config = client.fetch("/config", &FetchOptions::get()).await?;
    Ok(codec::to_name_values(config.as_object()))
}

/// Datacenter service endpoints as name-value pairs.
pub async fn services(client: &CloudApi) -> Result<Vec<NameValuePair>, CloudError> {
    let services = client.fetch("/services", &FetchOptions::get()).await?;
    Ok(codec::to_name_values(services.as_object()))
}

/// Known datacenters as (name, url) pairs, in listing order.
pub async fn datacenters(client: &CloudApi) -> Result<Vec<(String, String)>, CloudError> {
    let datacenters = client.fetch("/datacenters", &FetchOptions::get()).await?;

    let Some(map) = datacenters.as_object() else {
        return Ok(Vec::new());
    };

    Ok(map
        .iter()
        .map(|(name, url)| {
            let url = url.as_str().unwrap_or_default().to_string();
            (name.clone(), url)
        })
        .collect())
}

/// One datacenter by name, resolved from the listing.
pub async fn datacenter(
    client: &CloudApi,
    name: &str,
) -> Result<Option<(String, String)>, CloudError> {
    let datacenters = datacenters(client).await?;

    Ok(datacenters.into_iter().find(|(dc, _)| dc == name))
}

/// Coarse region for a datacenter, derived from its name prefix.
pub fn datacenter_place(name: &str) -> &'static str {
    match name.split('-').next().unwrap_or_default() {
        "us" => "Americas",
        "eu" => "Europe",
        "ap" => "Asia",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_is_derived_from_the_name_prefix() {
        assert_eq!(datacenter_place("us-east-1"), "Americas");
        assert_eq!(datacenter_place("eu-ams-1"), "Europe");
        assert_eq!(datacenter_place("ap-southeast-1"), "Asia");
        assert_eq!(datacenter_place("mars-north-1"), "Unknown");
        assert_eq!(datacenter_place(""), "Unknown");
    }
}
