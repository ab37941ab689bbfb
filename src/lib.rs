// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Kiln - Container Image Build Operator for Kubernetes
//!
//! Kiln is a Kubernetes operator written in Rust that continuously builds
//! container images from source, declaratively, through Custom Resource
//! Definitions (CRDs).
//!
//! ## Overview
//!
//! This library provides the core functionality for the Kiln operator,
//! including:
//!
//! - Custom Resource Definitions for images, builds, and builder composition
//! - The build scheduling decision engine: rebuild only when the source
//!   revision, builder composition, or build configuration actually changes
//! - Cross-resource dependency tracking with lease expiry
//! - Credential keychain resolution with a process-lifetime cache
//! - The source resolution state machine with active polling of movable
//!   references
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`context`] - Shared context and reflector stores for controllers
//! - [`tracker`] - Cross-resource dependency tracking
//! - [`registry`] - Registry keychains and metadata reads
//! - [`source`] - Source descriptor resolution capabilities
//!
//! ## Example
//!
//! ```rust,no_run
//! use kiln::crd::{ImageSpec, BuilderReference, SourceConfig, GitSource};
//!
//! let spec = ImageSpec {
//!     tag: "registry.example.com/apps/petclinic".to_string(),
//!     additional_tags: None,
//!     builder: BuilderReference {
//!         kind: "ClusterBuilder".to_string(),
//!         name: "base".to_string(),
//!     },
//!     service_account_name: None,
//!     source: SourceConfig {
//!         git: Some(GitSource {
//!             url: "https://github.com/example/petclinic".to_string(),
//!             revision: "main".to_string(),
//!         }),
//!         blob: None,
//!         registry: None,
//!         sub_path: None,
//!     },
//!     build: None,
//!     cache_size: None,
//!     failed_build_history_limit: None,
//!     success_build_history_limit: None,
//! };
//! ```
//!
//! ## Features
//!
//! - **Level-Triggered** - reconciles from observed state, safe to run redundantly
//! - **Idempotent** - at most one status write per reconcile pass
//! - **Tracked Dependencies** - a new buildpack in a shared store rebuilds
//!   every image that uses it, with no spec change anywhere
//! - **Bounded History** - incremental, one-per-pass build garbage collection

pub mod build_errors;
pub mod constants;
pub mod context;
pub mod crd;
pub mod labels;
pub mod metrics;
pub mod registry;
pub mod source;
pub mod status_reasons;
pub mod tracker;

pub mod reconcilers;
