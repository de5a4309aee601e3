// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 LabPool Contributors
//
// This file is part of LabPool.
//
// LabPool is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// LabPool is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with LabPool. If not, see <https://www.gnu.org/licenses/>.

//! Resource type factory.
//!
//! ## Purpose
//! The factory is the injection point for type-specific behavior: it
//! constructs zero-valued resources, validates populated ones, and declares
//! which property keys the query engine may address per type. The closed
//! `RegistryFactory` maps type tag to a `TypeSpec`; the rest of the system
//! only sees the `ResourceFactory` trait.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ModelError, ModelResult};
use crate::resource::Resource;

/// Property keys addressable on every resource regardless of type.
pub const BUILTIN_PROPERTY_KEYS: &[&str] = &["id", "name", "type"];

/// Type-specific validation predicate.
pub type Validator = Box<dyn Fn(&Resource) -> Result<(), String> + Send + Sync>;

/// Injected strategy for constructing, validating, and reflecting on
/// resources by type tag.
pub trait ResourceFactory: Send + Sync {
    /// Construct a zero-valued resource of the given type.
    ///
    /// ## Returns
    /// - `Ok(Resource)`: fresh resource with a generated id and default status
    /// - `Err(ModelError::UnknownType)`: tag is not registered
    fn new_resource(&self, type_tag: &str) -> ModelResult<Resource>;

    /// Validate a populated resource against its type's business rules.
    ///
    /// ## Returns
    /// - `Err(ModelError::UnknownType)`: tag is not registered
    /// - `Err(ModelError::Invalid)`: shape or per-type rule violated
    fn validate(&self, resource: &Resource) -> ModelResult<()>;

    /// Property keys addressable by the property filter for this type,
    /// including the built-ins `id`, `name`, `type`.
    fn property_keys(&self, type_tag: &str) -> ModelResult<BTreeSet<String>>;

    /// All registered type tags.
    fn type_tags(&self) -> Vec<String>;
}

/// One registered type: its addressable property keys and validator.
pub struct TypeSpec {
    keys: BTreeSet<String>,
    validator: Validator,
}

impl TypeSpec {
    /// Build a spec from a key list and validation predicate.
    pub fn new(keys: &[&str], validator: Validator) -> Self {
        let mut all: BTreeSet<String> = BUILTIN_PROPERTY_KEYS
            .iter()
            .map(|k| k.to_string())
            .collect();
        all.extend(keys.iter().map(|k| k.to_string()));
        TypeSpec {
            keys: all,
            validator,
        }
    }
}

/// Closed registry of resource types.
pub struct RegistryFactory {
    types: BTreeMap<String, TypeSpec>,
}

impl RegistryFactory {
    /// Empty registry; register types with [`RegistryFactory::register`].
    pub fn new() -> Self {
        RegistryFactory {
            types: BTreeMap::new(),
        }
    }

    /// Register a type tag. Replaces any previous spec for the same tag.
    pub fn register(mut self, tag: impl Into<String>, spec: TypeSpec) -> Self {
        self.types.insert(tag.into(), spec);
        self
    }

    /// The standard laboratory inventory types.
    ///
    /// Validation rules mirror the physical domain: a datacenter has an
    /// address, a rack sits in a row, a VLAN pool spans a sane tag range.
    pub fn lab_default() -> Self {
        RegistryFactory::new()
            .register(
                "datacenter",
                TypeSpec::new(
                    &["address"],
                    Box::new(|r| require_property(r, "address")),
                ),
            )
            .register("lab", TypeSpec::new(&["building"], Box::new(|_| Ok(()))))
            .register(
                "rack",
                TypeSpec::new(&["row"], Box::new(|r| require_property(r, "row"))),
            )
            .register(
                "switch",
                TypeSpec::new(
                    &["model", "ports"],
                    Box::new(|r| optional_positive_int(r, "ports")),
                ),
            )
            .register(
                "vlan_pool",
                TypeSpec::new(&["vlan_start", "vlan_end"], Box::new(validate_vlan_range)),
            )
            .register(
                "ip_pool",
                TypeSpec::new(&["cidr"], Box::new(|r| require_property(r, "cidr"))),
            )
            .register(
                "host",
                TypeSpec::new(
                    &["cpu", "memory_gb"],
                    Box::new(|r| {
                        optional_positive_int(r, "cpu")?;
                        optional_positive_int(r, "memory_gb")
                    }),
                ),
            )
    }
}

impl Default for RegistryFactory {
    fn default() -> Self {
        Self::lab_default()
    }
}

impl ResourceFactory for RegistryFactory {
    fn new_resource(&self, type_tag: &str) -> ModelResult<Resource> {
        if !self.types.contains_key(type_tag) {
            return Err(ModelError::UnknownType(type_tag.to_string()));
        }
        Ok(Resource::new(type_tag, ""))
    }

    fn validate(&self, resource: &Resource) -> ModelResult<()> {
        let spec = self
            .types
            .get(resource.type_tag())
            .ok_or_else(|| ModelError::UnknownType(resource.type_tag().to_string()))?;
        resource.check_shape()?;
        (spec.validator)(resource).map_err(ModelError::Invalid)
    }

    fn property_keys(&self, type_tag: &str) -> ModelResult<BTreeSet<String>> {
        self.types
            .get(type_tag)
            .map(|spec| spec.keys.clone())
            .ok_or_else(|| ModelError::UnknownType(type_tag.to_string()))
    }

    fn type_tags(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }
}

fn require_property(resource: &Resource, key: &str) -> Result<(), String> {
    match resource.property(key) {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(format!(
            "{} requires non-empty property {key:?}",
            resource.type_tag()
        )),
    }
}

fn optional_positive_int(resource: &Resource, key: &str) -> Result<(), String> {
    match resource.property(key) {
        None => Ok(()),
        Some(v) => match v.parse::<u64>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err(format!("property {key:?} must be a positive integer, got {v:?}")),
        },
    }
}

fn validate_vlan_range(resource: &Resource) -> Result<(), String> {
    let parse = |key: &str| -> Result<u16, String> {
        resource
            .property(key)
            .ok_or_else(|| format!("vlan_pool requires property {key:?}"))?
            .parse::<u16>()
            .map_err(|_| format!("property {key:?} must be a VLAN tag (0-4095)"))
    };
    let start = parse("vlan_start")?;
    let end = parse("vlan_end")?;
    if start > end {
        return Err(format!("vlan range inverted: {start} > {end}"));
    }
    if end > 4095 {
        return Err(format!("vlan tag out of range: {end}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_rejected() {
        let factory = RegistryFactory::lab_default();
        assert!(matches!(
            factory.new_resource("flux_capacitor"),
            Err(ModelError::UnknownType(_))
        ));
        let bogus = Resource::new("flux_capacitor", "fc-1");
        assert!(matches!(
            factory.validate(&bogus),
            Err(ModelError::UnknownType(_))
        ));
    }

    #[test]
    fn datacenter_requires_address() {
        let factory = RegistryFactory::lab_default();
        let dc = Resource::new("datacenter", "dc-east");
        assert!(matches!(factory.validate(&dc), Err(ModelError::Invalid(_))));

        let dc = dc.with_property("address", "1 Lab Way");
        factory.validate(&dc).unwrap();
    }

    #[test]
    fn rack_requires_row() {
        let factory = RegistryFactory::lab_default();
        let rack = Resource::new("rack", "r-1");
        assert!(factory.validate(&rack).is_err());
        factory
            .validate(&rack.with_property("row", "3"))
            .unwrap();
    }

    #[test]
    fn vlan_pool_range_checked() {
        let factory = RegistryFactory::lab_default();
        let ok = Resource::new("vlan_pool", "v-1")
            .with_property("vlan_start", "100")
            .with_property("vlan_end", "200");
        factory.validate(&ok).unwrap();

        let inverted = Resource::new("vlan_pool", "v-2")
            .with_property("vlan_start", "300")
            .with_property("vlan_end", "200");
        assert!(factory.validate(&inverted).is_err());

        let missing = Resource::new("vlan_pool", "v-3");
        assert!(factory.validate(&missing).is_err());
    }

    #[test]
    fn empty_name_fails_shape_check() {
        let factory = RegistryFactory::lab_default();
        let anon = Resource::new("lab", "");
        assert!(matches!(factory.validate(&anon), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn property_keys_include_builtins() {
        let factory = RegistryFactory::lab_default();
        let keys = factory.property_keys("switch").unwrap();
        for k in ["id", "name", "type", "model", "ports"] {
            assert!(keys.contains(k), "missing key {k}");
        }
        assert!(factory.property_keys("nonesuch").is_err());
    }
}
