//! # Product Declarations
//!
//! What each product installs: its namespaces, the operator package it subscribes to
//! and the versions this operator ships.

use crate::constants::INTEGREATLY_CHANNEL;
use crate::crd::{ProductName, ProductStatus};

/// Operator package a product is installed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorPackage {
    pub package: &'static str,
    pub channel: &'static str,
}

/// How a product's externally reachable host is derived from the routing subdomain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPattern {
    /// No user-facing endpoint
    None,
    /// `https://<route>-<namespace>.<subdomain>`
    NamespacedRoute(&'static str),
    /// `https://<name>.<subdomain>`
    Subdomain(&'static str),
}

impl HostPattern {
    pub fn host(self, namespace: &str, routing_subdomain: &str) -> Option<String> {
        match self {
            HostPattern::None => None,
            HostPattern::NamespacedRoute(route) => {
                Some(format!("https://{route}-{namespace}.{routing_subdomain}"))
            }
            HostPattern::Subdomain(name) => Some(format!("https://{name}.{routing_subdomain}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductDeclaration {
    pub product: ProductName,
    /// Default namespace, appended to the installation's namespace prefix
    pub namespace_suffix: &'static str,
    /// `None` for products deployed directly rather than through an operator
    pub operator: Option<OperatorPackage>,
    pub version: &'static str,
    pub operator_version: &'static str,
    pub host: HostPattern,
}

const fn package(package: &'static str) -> Option<OperatorPackage> {
    Some(OperatorPackage {
        package,
        channel: INTEGREATLY_CHANNEL,
    })
}

pub static DECLARATIONS: [ProductDeclaration; 7] = [
    ProductDeclaration {
        product: ProductName::CloudResources,
        namespace_suffix: "cloud-resources",
        operator: package("rhmi-cloud-resources"),
        version: "1.1.3",
        operator_version: "1.1.3",
        host: HostPattern::None,
    },
    ProductDeclaration {
        product: ProductName::Rhsso,
        namespace_suffix: "rhsso",
        operator: package("rhmi-rhsso"),
        version: "7.6",
        operator_version: "7.6.7-1",
        host: HostPattern::NamespacedRoute("keycloak-edge"),
    },
    ProductDeclaration {
        product: ProductName::RhssoUser,
        namespace_suffix: "user-sso",
        operator: package("rhmi-rhsso"),
        version: "7.6",
        operator_version: "7.6.7-1",
        host: HostPattern::NamespacedRoute("keycloak-edge"),
    },
    ProductDeclaration {
        product: ProductName::ThreeScale,
        namespace_suffix: "3scale",
        operator: package("rhmi-3scale"),
        version: "2.13.0",
        operator_version: "0.11.8-mas",
        host: HostPattern::Subdomain("3scale-admin"),
    },
    ProductDeclaration {
        product: ProductName::Marin3r,
        namespace_suffix: "marin3r",
        operator: package("rhmi-marin3r"),
        version: "0.13.1",
        operator_version: "0.13.1",
        host: HostPattern::None,
    },
    ProductDeclaration {
        product: ProductName::Grafana,
        namespace_suffix: "customer-monitoring",
        operator: None,
        version: "9.0.9",
        operator_version: "",
        host: HostPattern::NamespacedRoute("grafana-route"),
    },
    ProductDeclaration {
        product: ProductName::Mcg,
        namespace_suffix: "mcg",
        operator: package("mcg-operator"),
        version: "4.11",
        operator_version: "4.11",
        host: HostPattern::None,
    },
];

/// Declaration of `product`
pub fn declaration(product: ProductName) -> &'static ProductDeclaration {
    // every ProductName has an entry, checked by the tests below
    DECLARATIONS
        .iter()
        .find(|d| d.product == product)
        .unwrap_or(&DECLARATIONS[0])
}

impl ProductDeclaration {
    /// Whether `status` records the versions declared here
    pub fn verify_version(&self, status: Option<&ProductStatus>) -> bool {
        status.is_some_and(|s| {
            s.version == self.version && s.operator_version == self.operator_version
        })
    }
}
