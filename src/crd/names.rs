//! # Names
//!
//! Stage and product identifiers. Both serialize as their plain string form so they can
//! key the status maps.

use crate::constants::API_GROUP;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name that does not match any known stage or product
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

/// Name of an installation stage, or of the overall position of an installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum StageName {
    PreflightChecks,
    Bootstrap,
    Installation,
    UninstallProducts,
    UninstallCloudResources,
    UninstallBootstrap,
    /// Every install stage has completed
    Complete,
    /// Uninstall stages are being walked
    Deletion,
}

impl StageName {
    pub const fn as_str(self) -> &'static str {
        match self {
            StageName::PreflightChecks => "Preflight Checks",
            StageName::Bootstrap => "bootstrap",
            StageName::Installation => "installation",
            StageName::UninstallProducts => "uninstall - products",
            StageName::UninstallCloudResources => "uninstall - cloud-resources",
            StageName::UninstallBootstrap => "uninstall - bootstrap",
            StageName::Complete => "complete",
            StageName::Deletion => "deletion",
        }
    }
}

impl FromStr for StageName {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Preflight Checks" => StageName::PreflightChecks,
            "bootstrap" => StageName::Bootstrap,
            "installation" => StageName::Installation,
            "uninstall - products" => StageName::UninstallProducts,
            "uninstall - cloud-resources" => StageName::UninstallCloudResources,
            "uninstall - bootstrap" => StageName::UninstallBootstrap,
            "complete" => StageName::Complete,
            "deletion" => StageName::Deletion,
            other => {
                return Err(UnknownName {
                    kind: "stage",
                    value: other.to_string(),
                })
            }
        })
    }
}

/// Name of a product in the suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ProductName {
    CloudResources,
    Rhsso,
    RhssoUser,
    ThreeScale,
    Marin3r,
    Grafana,
    Mcg,
}

impl ProductName {
    pub const ALL: [ProductName; 7] = [
        ProductName::CloudResources,
        ProductName::Rhsso,
        ProductName::RhssoUser,
        ProductName::ThreeScale,
        ProductName::Marin3r,
        ProductName::Grafana,
        ProductName::Mcg,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ProductName::CloudResources => "cloud-resources",
            ProductName::Rhsso => "rhsso",
            ProductName::RhssoUser => "rhssouser",
            ProductName::ThreeScale => "3scale",
            ProductName::Marin3r => "marin3r",
            ProductName::Grafana => "grafana",
            ProductName::Mcg => "mcg",
        }
    }

    /// Finalizer key this product holds on the installation while installed
    pub fn finalizer(self) -> String {
        format!("{}.{API_GROUP}/finalizer", self.as_str())
    }
}

impl FromStr for ProductName {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductName::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "product",
                value: s.to_string(),
            })
    }
}

macro_rules! string_backed {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownName;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl JsonSchema for $name {
            fn schema_name() -> Cow<'static, str> {
                Cow::Borrowed(stringify!($name))
            }

            fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
                schemars::json_schema!({ "type": "string" })
            }
        }
    };
}

string_backed!(StageName);
string_backed!(ProductName);
