// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Validates image prefixes and the non-empty, duplicate-free service list.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashSet;

use super::ServiceConfig;
use crate::types::ImageRef;

pub fn deserialize_image_prefix<'de, D>(deserializer: D) -> Result<ImageRef, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let image = ImageRef::parse(&s).map_err(serde::de::Error::custom)?;
    if !image.is_bare() {
        return Err(serde::de::Error::custom(format!(
            "service image must be a repository without tag or digest: {}",
            s
        )));
    }
    Ok(image)
}

pub fn deserialize_services<'de, D>(deserializer: D) -> Result<NonEmpty<ServiceConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let services: Vec<ServiceConfig> = Vec::deserialize(deserializer)?;

    let mut names = HashSet::new();
    let mut env_keys = HashSet::new();
    for service in &services {
        if !names.insert(service.name.clone()) {
            return Err(serde::de::Error::custom(format!(
                "duplicate service: {}",
                service.name
            )));
        }
        if !env_keys.insert(service.env_key()) {
            return Err(serde::de::Error::custom(format!(
                "duplicate env key: {}",
                service.env_key()
            )));
        }
    }

    NonEmpty::from_vec(services)
        .ok_or_else(|| serde::de::Error::custom("at least one service is required"))
}
