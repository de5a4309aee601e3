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

//! Composable filters over resource sequences.
//!
//! Three pure primitives: type, label, and property filters. They compose
//! left-to-right; composition is associative but not commutative because of
//! the absent-key rule — `NotIn` and `NotEqual` match when the addressed
//! label or property is absent, `Equal` and `In` never do.

use serde::{Deserialize, Serialize};

use labpool_model::{Resource, ResourceFactory};

use crate::error::{InventoryError, InventoryResult};

/// Comparison operator of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOp {
    /// Scalar equality; exactly one value
    Equal,
    /// Scalar inequality; exactly one value; matches absent keys
    NotEqual,
    /// Set membership
    In,
    /// Set non-membership; matches absent keys
    NotIn,
}

/// One label or property query: operator, key, value set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Comparison operator
    pub op: QueryOp,
    /// Label or property key
    pub key: String,
    /// Value set; length 1 for `Equal`/`NotEqual`
    pub values: Vec<String>,
}

impl Query {
    /// `key == value`
    pub fn equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Query {
            op: QueryOp::Equal,
            key: key.into(),
            values: vec![value.into()],
        }
    }

    /// `key != value` (also matches when the key is absent)
    pub fn not_equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Query {
            op: QueryOp::NotEqual,
            key: key.into(),
            values: vec![value.into()],
        }
    }

    /// `key ∈ values`
    pub fn any_of(key: impl Into<String>, values: Vec<String>) -> Self {
        Query {
            op: QueryOp::In,
            key: key.into(),
            values,
        }
    }

    /// `key ∉ values` (also matches when the key is absent)
    pub fn none_of(key: impl Into<String>, values: Vec<String>) -> Self {
        Query {
            op: QueryOp::NotIn,
            key: key.into(),
            values,
        }
    }

    fn check_arity(&self) -> InventoryResult<()> {
        match self.op {
            QueryOp::Equal | QueryOp::NotEqual if self.values.len() != 1 => {
                Err(InventoryError::Invalid(format!(
                    "{:?} query on {:?} takes exactly one value, got {}",
                    self.op,
                    self.key,
                    self.values.len()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Evaluate the operator against an optional actual value.
    fn matches_value(&self, actual: Option<&str>) -> bool {
        match self.op {
            QueryOp::Equal => actual == Some(self.values[0].as_str()),
            QueryOp::NotEqual => actual != Some(self.values[0].as_str()),
            QueryOp::In => {
                actual.is_some_and(|v| self.values.iter().any(|c| c == v))
            }
            QueryOp::NotIn => match actual {
                // absent label/property counts as "not in"
                None => true,
                Some(v) => !self.values.iter().any(|c| c == v),
            },
        }
    }
}

/// Keep resources whose type tag is in `types`.
pub fn filter_type(types: &[&str], seq: Vec<Resource>) -> Vec<Resource> {
    seq.into_iter()
        .filter(|r| types.contains(&r.type_tag()))
        .collect()
}

/// Keep resources whose label matches the query.
pub fn filter_label(query: &Query, seq: Vec<Resource>) -> InventoryResult<Vec<Resource>> {
    query.check_arity()?;
    Ok(seq
        .into_iter()
        .filter(|r| query.matches_value(r.label(&query.key)))
        .collect())
}

/// Keep resources whose reflective property view matches the query.
///
/// Addressable keys per resource are the built-ins (`id`, `name`, `type`)
/// plus the keys the factory declares for the resource's type; any other key
/// yields [`InventoryError::UnknownKey`].
pub fn filter_property(
    query: &Query,
    factory: &dyn ResourceFactory,
    seq: Vec<Resource>,
) -> InventoryResult<Vec<Resource>> {
    query.check_arity()?;
    let mut out = Vec::with_capacity(seq.len());
    for resource in seq {
        let keys = factory.property_keys(resource.type_tag())?;
        if !keys.contains(&query.key) {
            return Err(InventoryError::UnknownKey(query.key.clone()));
        }
        if query.matches_value(resource.property(&query.key).as_deref()) {
            out.push(resource);
        }
    }
    Ok(out)
}
