//! # Installation Types
//!
//! The stage tables of each installation flavor.
//!
//! Every product is placed once in [`PLACEMENTS`]: which install stage installs it, which
//! uninstall stage removes it, which flavors carry it and whether it is restricted to a
//! platform. The per-flavor [`InstallationType`] is derived from that table, so the
//! flavors cannot drift apart.

use crate::config::Platform;
use crate::crd::{ProductName, ProductStatus, StageName};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("unknown installation type: {0}")]
    UnknownInstallationType(String),
}

impl StageError {
    /// Get reason string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            StageError::UnknownInstallationType(_) => "unknown_installation_type",
        }
    }
}

/// Installation flavor, the `type` of an RHMI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    ManagedApi,
    MultitenantManagedApi,
}

impl Flavor {
    pub const ALL: [Flavor; 2] = [Flavor::ManagedApi, Flavor::MultitenantManagedApi];

    pub const fn as_str(self) -> &'static str {
        match self {
            Flavor::ManagedApi => "managed-api",
            Flavor::MultitenantManagedApi => "multitenant-managed-api",
        }
    }

    /// Suite version this operator build installs for the flavor
    pub const fn suite_version(self) -> &'static str {
        match self {
            Flavor::ManagedApi | Flavor::MultitenantManagedApi => env!("CARGO_PKG_VERSION"),
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flavor {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flavor::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| StageError::UnknownInstallationType(s.to_string()))
    }
}

/// Where one product sits in the stage tables
#[derive(Debug, Clone, Copy)]
struct Placement {
    product: ProductName,
    install: StageName,
    uninstall: StageName,
    flavors: &'static [Flavor],
    /// Only installed on this platform
    platform: Option<Platform>,
}

const ALL_FLAVORS: &[Flavor] = &Flavor::ALL;
const SINGLE_TENANT: &[Flavor] = &[Flavor::ManagedApi];

/// Install stages in order; bootstrap carries no products
const INSTALL_ORDER: [StageName; 2] = [StageName::Bootstrap, StageName::Installation];

/// Uninstall stages in order. Cloud resources go after the products that use them.
const UNINSTALL_ORDER: [StageName; 3] = [
    StageName::UninstallProducts,
    StageName::UninstallCloudResources,
    StageName::UninstallBootstrap,
];

static PLACEMENTS: [Placement; 7] = [
    Placement {
        product: ProductName::CloudResources,
        install: StageName::Installation,
        uninstall: StageName::UninstallCloudResources,
        flavors: ALL_FLAVORS,
        platform: None,
    },
    Placement {
        product: ProductName::Rhsso,
        install: StageName::Installation,
        uninstall: StageName::UninstallProducts,
        flavors: ALL_FLAVORS,
        platform: None,
    },
    Placement {
        product: ProductName::ThreeScale,
        install: StageName::Installation,
        uninstall: StageName::UninstallProducts,
        flavors: ALL_FLAVORS,
        platform: None,
    },
    Placement {
        product: ProductName::RhssoUser,
        install: StageName::Installation,
        uninstall: StageName::UninstallProducts,
        flavors: SINGLE_TENANT,
        platform: None,
    },
    Placement {
        product: ProductName::Marin3r,
        install: StageName::Installation,
        uninstall: StageName::UninstallProducts,
        flavors: ALL_FLAVORS,
        platform: None,
    },
    Placement {
        product: ProductName::Grafana,
        install: StageName::Installation,
        uninstall: StageName::UninstallProducts,
        flavors: ALL_FLAVORS,
        platform: None,
    },
    Placement {
        product: ProductName::Mcg,
        install: StageName::Installation,
        uninstall: StageName::UninstallCloudResources,
        flavors: SINGLE_TENANT,
        platform: Some(Platform::Gcp),
    },
];

/// A named group of products reconciled together
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: StageName,
    /// Product name to the placeholder status used before the product first runs
    pub products: BTreeMap<ProductName, ProductStatus>,
}

impl Stage {
    fn empty(name: StageName) -> Self {
        Self {
            name,
            products: BTreeMap::new(),
        }
    }

    pub fn product_names(&self) -> impl Iterator<Item = ProductName> + '_ {
        self.products.keys().copied()
    }
}

/// Ordered install and uninstall stages of one flavor on one platform
#[derive(Debug, Clone, PartialEq)]
pub struct InstallationType {
    pub flavor: Flavor,
    pub install_stages: Vec<Stage>,
    pub uninstall_stages: Vec<Stage>,
}

impl InstallationType {
    /// Every product installed by this type, in stage order
    pub fn products(&self) -> Vec<ProductName> {
        self.install_stages
            .iter()
            .flat_map(Stage::product_names)
            .collect()
    }

    pub fn has_product(&self, product: ProductName) -> bool {
        self.install_stages
            .iter()
            .any(|stage| stage.products.contains_key(&product))
    }
}

/// Stage tables of `flavor` on `platform`
///
/// Fails for flavors this operator does not know.
pub fn type_for_flavor(flavor: &str, platform: Platform) -> Result<InstallationType, StageError> {
    let flavor: Flavor = flavor.parse()?;
    let mut install_stages: Vec<Stage> = INSTALL_ORDER.into_iter().map(Stage::empty).collect();
    let mut uninstall_stages: Vec<Stage> = UNINSTALL_ORDER.into_iter().map(Stage::empty).collect();

    let placements = PLACEMENTS.iter().filter(|p| {
        p.flavors.contains(&flavor) && p.platform.is_none_or(|required| required == platform)
    });
    for placement in placements {
        for (stages, name) in [
            (&mut install_stages, placement.install),
            (&mut uninstall_stages, placement.uninstall),
        ] {
            if let Some(stage) = stages.iter_mut().find(|s| s.name == name) {
                stage
                    .products
                    .insert(placement.product, ProductStatus::new(placement.product));
            }
        }
    }

    Ok(InstallationType {
        flavor,
        install_stages,
        uninstall_stages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProductName::*;

    fn names(stage: &Stage) -> Vec<ProductName> {
        stage.product_names().collect()
    }

    #[test]
    fn test_managed_api_stages() {
        let ty = type_for_flavor("managed-api", Platform::Aws).unwrap();
        let install: Vec<StageName> = ty.install_stages.iter().map(|s| s.name).collect();
        assert_eq!(install, vec![StageName::Bootstrap, StageName::Installation]);
        assert!(ty.install_stages[0].products.is_empty());
        assert_eq!(
            names(&ty.install_stages[1]),
            vec![CloudResources, Rhsso, RhssoUser, ThreeScale, Marin3r, Grafana]
        );

        let uninstall: Vec<StageName> = ty.uninstall_stages.iter().map(|s| s.name).collect();
        assert_eq!(uninstall, UNINSTALL_ORDER.to_vec());
        assert_eq!(
            names(&ty.uninstall_stages[0]),
            vec![Rhsso, RhssoUser, ThreeScale, Marin3r, Grafana]
        );
        assert_eq!(names(&ty.uninstall_stages[1]), vec![CloudResources]);
        assert!(ty.uninstall_stages[2].products.is_empty());
    }

    #[test]
    fn test_multitenant_has_no_user_sso() {
        let ty = type_for_flavor("multitenant-managed-api", Platform::Aws).unwrap();
        assert!(!ty.has_product(RhssoUser));
        assert_eq!(
            names(&ty.install_stages[1]),
            vec![CloudResources, Rhsso, ThreeScale, Marin3r, Grafana]
        );
    }

    #[test]
    fn test_gcp_adds_mcg() {
        let ty = type_for_flavor("managed-api", Platform::Gcp).unwrap();
        assert!(ty.has_product(Mcg));
        assert_eq!(names(&ty.uninstall_stages[1]), vec![CloudResources, Mcg]);
        assert!(!type_for_flavor("managed-api", Platform::Other)
            .unwrap()
            .has_product(Mcg));

        let multitenant = type_for_flavor("multitenant-managed-api", Platform::Gcp).unwrap();
        assert!(!multitenant.has_product(Mcg));
        assert!(multitenant
            .uninstall_stages
            .iter()
            .all(|stage| !stage.products.contains_key(&Mcg)));
    }

    #[test]
    fn test_every_installed_product_is_uninstalled() {
        for flavor in Flavor::ALL {
            for platform in [Platform::Aws, Platform::Gcp, Platform::Other] {
                let ty = type_for_flavor(flavor.as_str(), platform).unwrap();
                for product in ty.products() {
                    assert!(
                        ty.uninstall_stages
                            .iter()
                            .any(|s| s.products.contains_key(&product)),
                        "{product} missing from uninstall stages of {flavor}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_unknown_flavor() {
        let err = type_for_flavor("workshop", Platform::Aws).unwrap_err();
        assert_eq!(err.to_string(), "unknown installation type: workshop");
    }
}
