//! Print the CustomResourceDefinitions served by the operator as a YAML stream
//!
//! Usage: `cargo run --bin crdgen > config/crd/rhmi.yaml`

use kube::CustomResourceExt;
use rhmi_operator::crd::{Rhmi, RhmiConfig};

fn main() -> anyhow::Result<()> {
    let documents = [
        serde_yaml::to_string(&Rhmi::crd())?,
        serde_yaml::to_string(&RhmiConfig::crd())?,
    ];
    print!("{}", documents.join("---\n"));
    Ok(())
}
