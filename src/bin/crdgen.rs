// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from Rust types defined in src/crd.rs.
//! This ensures the YAML files in deploy/crds/ are always in sync with the Rust code.
//!
//! Usage:
//!   cargo run --bin crdgen
//!
//! Generated files will be written to deploy/crds/ with proper headers.

use kiln::crd::{
    Build, Builder, ClusterBuildpack, ClusterBuilder, ClusterLifecycle, ClusterStack,
    ClusterStore, Extension, Image, SourceResolver,
};
use kube::CustomResourceExt;
use serde_json::Value;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");

    // Ensure output directory exists
    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    // Generate each CRD
    generate_crd::<Image>("images.crd.yaml", output_dir)?;
    generate_crd::<Build>("builds.crd.yaml", output_dir)?;
    generate_crd::<SourceResolver>("sourceresolvers.crd.yaml", output_dir)?;
    generate_crd::<Builder>("builders.crd.yaml", output_dir)?;
    generate_crd::<ClusterBuilder>("clusterbuilders.crd.yaml", output_dir)?;
    generate_crd::<ClusterStore>("clusterstores.crd.yaml", output_dir)?;
    generate_crd::<ClusterStack>("clusterstacks.crd.yaml", output_dir)?;
    generate_crd::<ClusterLifecycle>("clusterlifecycles.crd.yaml", output_dir)?;
    generate_crd::<ClusterBuildpack>("clusterbuildpacks.crd.yaml", output_dir)?;
    generate_crd::<Extension>("extensions.crd.yaml", output_dir)?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}

/// Render one CRD to YAML with the standard header.
fn generate_crd<K: CustomResourceExt>(
    filename: &str,
    output_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let crd = K::crd();

    // Round-trip through JSON so serialization order is stable
    let value: Value = serde_json::to_value(&crd)?;
    let yaml = serde_yaml::to_string(&value)?;

    let path = output_dir.join(filename);
    fs::write(&path, format!("{COPYRIGHT_HEADER}{yaml}"))?;
    println!("  generated {}", path.display());

    Ok(())
}
