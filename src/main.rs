// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use kiln::{
    constants::{
        ERROR_REQUEUE_DURATION_SECS, KIND_BUILDER, KIND_CLUSTER_BUILDER, KIND_CLUSTER_STACK,
        KIND_CLUSTER_STORE, KIND_IMAGE, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH,
        METRICS_SERVER_PORT, NOT_READY_REQUEUE_DURATION, READY_REQUEUE_DURATION, RESYNC_PERIOD,
        SOURCE_POLL_INTERVAL, TOKIO_WORKER_THREADS, TRACK_LEASE_FACTOR,
    },
    context::{Context, Stores},
    crd::{
        is_ready, Build, Builder, ClusterBuildpack, ClusterBuilder, ClusterLifecycle,
        ClusterStack, ClusterStore, Extension, Image, SourceResolver,
    },
    metrics::{gather_metrics, record_reconciliation},
    reconcilers::{
        build::{BuildExecutionObserver, ExternalStatusObserver},
        reconcile_build, reconcile_builder, reconcile_clusterbuildpack, reconcile_clusterbuilder,
        reconcile_clusterlifecycle, reconcile_clusterstack, reconcile_clusterstore,
        reconcile_extension, reconcile_image, reconcile_sourceresolver,
        retry::{classify, ErrorClass},
        sourceresolver::PollDecision,
    },
    registry::{
        parse_mounted_annotated_secrets, HttpMetadataRetriever, KeychainCache,
        SecretClusterKeychain, ServiceAccountKeychainFactory, StaticKeychain,
    },
    source::{
        DigestRegistryResolver, LsRemoteGitResolver, PassthroughBlobResolver, SourceResolvers,
    },
    tracker::{DependentKey, SubjectRef, SystemClock, Tracker},
};
use kube::{
    runtime::{
        controller::Action,
        reflector,
        reflector::{ObjectRef, Store},
        watcher, Controller, WatchStreamExt,
    },
    Api, Client, Resource, ResourceExt,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

/// Command-line options for the controller process.
#[derive(Debug, Parser)]
#[command(name = "kiln", about = "Container image build operator for Kubernetes")]
struct Options {
    /// Port for the Prometheus metrics endpoint
    #[arg(long, default_value_t = METRICS_SERVER_PORT)]
    metrics_port: u16,

    /// Directory holding platform-mounted credential secrets
    #[arg(long)]
    secrets_dir: Option<PathBuf>,

    /// Mounted secret mapping in the form name=registry (repeatable)
    #[arg(long = "mounted-secret")]
    mounted_secrets: Vec<String>,
}

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("kiln-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Respects RUST_LOG for the filter and RUST_LOG_FORMAT for json/text output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    let options = Options::parse();

    info!("Starting Kiln build controller");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    // Platform-mounted credentials, shared by every resolved keychain
    let mounted = match &options.secrets_dir {
        Some(dir) if !options.mounted_secrets.is_empty() => {
            let parsed = parse_mounted_annotated_secrets(dir, &options.mounted_secrets)?;
            info!(registries = parsed.len(), "Loaded mounted registry credentials");
            Arc::new(StaticKeychain::new(parsed))
        }
        _ => Arc::new(StaticKeychain::default()),
    };

    // The two deliberately shared mutable structures: constructed once,
    // passed by reference everywhere
    let tracker = Arc::new(Tracker::new(
        RESYNC_PERIOD * TRACK_LEASE_FACTOR,
        Arc::new(SystemClock),
    ));
    let keychains = Arc::new(KeychainCache::new(Arc::new(
        ServiceAccountKeychainFactory::new(
            client.clone(),
            mounted,
            Arc::new(SecretClusterKeychain::new(client.clone())),
        ),
    )));

    let metadata = Arc::new(HttpMetadataRetriever::new());
    let sources = Arc::new(SourceResolvers {
        git: Arc::new(LsRemoteGitResolver),
        blob: Arc::new(PassthroughBlobResolver),
        registry: Arc::new(DigestRegistryResolver::new(metadata.clone())),
    });

    let stores = Stores {
        builders: spawn_reflector(Api::<Builder>::all(client.clone())),
        cluster_builders: spawn_reflector(Api::<ClusterBuilder>::all(client.clone())),
        cluster_stores: spawn_reflector(Api::<ClusterStore>::all(client.clone())),
        cluster_stacks: spawn_reflector(Api::<ClusterStack>::all(client.clone())),
        cluster_lifecycles: spawn_reflector(Api::<ClusterLifecycle>::all(client.clone())),
    };

    let ctx = Arc::new(Context {
        client: client.clone(),
        stores,
        tracker,
        keychains,
        metadata,
        sources,
    });

    let observer: Arc<dyn BuildExecutionObserver> = Arc::new(ExternalStatusObserver);

    tokio::spawn(run_metrics_server(options.metrics_port));

    info!("Starting all controllers");

    // Controllers should never exit - if one does, log it and exit the process
    tokio::select! {
        result = run_image_controller(client.clone(), Arc::clone(&ctx)) => {
            error!("CRITICAL: Image controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Image controller exited unexpectedly without error")
        }
        result = run_build_controller(client.clone(), Arc::clone(&ctx), observer) => {
            error!("CRITICAL: Build controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Build controller exited unexpectedly without error")
        }
        result = run_sourceresolver_controller(client.clone(), Arc::clone(&ctx)) => {
            error!("CRITICAL: SourceResolver controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("SourceResolver controller exited unexpectedly without error")
        }
        result = run_builder_controller(client.clone(), Arc::clone(&ctx)) => {
            error!("CRITICAL: Builder controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Builder controller exited unexpectedly without error")
        }
        result = run_clusterbuilder_controller(client.clone(), Arc::clone(&ctx)) => {
            error!("CRITICAL: ClusterBuilder controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ClusterBuilder controller exited unexpectedly without error")
        }
        result = run_clusterstore_controller(client.clone(), Arc::clone(&ctx)) => {
            error!("CRITICAL: ClusterStore controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ClusterStore controller exited unexpectedly without error")
        }
        result = run_clusterstack_controller(client.clone(), Arc::clone(&ctx)) => {
            error!("CRITICAL: ClusterStack controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ClusterStack controller exited unexpectedly without error")
        }
        result = run_clusterlifecycle_controller(client.clone(), Arc::clone(&ctx)) => {
            error!("CRITICAL: ClusterLifecycle controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ClusterLifecycle controller exited unexpectedly without error")
        }
        result = run_clusterbuildpack_controller(client.clone(), Arc::clone(&ctx)) => {
            error!("CRITICAL: ClusterBuildpack controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ClusterBuildpack controller exited unexpectedly without error")
        }
        result = run_extension_controller(client, Arc::clone(&ctx)) => {
            error!("CRITICAL: Extension controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Extension controller exited unexpectedly without error")
        }
    }
}

/// Spawn a reflector task for a cluster-wide watch and return its read handle.
fn spawn_reflector<K>(api: Api<K>) -> Store<K>
where
    K: Resource + Clone + std::fmt::Debug + Send + Sync + 'static,
    K: serde::de::DeserializeOwned,
    K::DynamicType: Default + Clone + Eq + std::hash::Hash,
{
    let (reader, writer) = reflector::store();

    tokio::spawn(async move {
        reflector(writer, watcher(api, watcher::Config::default()))
            .applied_objects()
            .for_each(|_| futures::future::ready(()))
            .await;
    });

    reader
}

/// Serve the Prometheus metrics endpoint.
async fn run_metrics_server(port: u16) {
    let app = axum::Router::new().route(METRICS_SERVER_PATH, axum::routing::get(metrics_handler));

    let address = format!("{METRICS_SERVER_BIND_ADDRESS}:{port}");
    info!(address = %address, "Starting metrics server");

    match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Metrics server exited: {e}");
            }
        }
        Err(e) => error!("Failed to bind metrics server on {address}: {e}"),
    }
}

async fn metrics_handler() -> (axum::http::StatusCode, String) {
    match gather_metrics() {
        Ok(body) => (axum::http::StatusCode::OK, body),
        Err(e) => {
            error!("Failed to gather metrics: {e}");
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

/// Map classified reconcile errors to requeue behavior.
///
/// Transient and not-ready errors requeue with a delay, write conflicts
/// requeue immediately (the cached view was stale), and permanent errors wait
/// for a spec change.
fn error_policy<K, C>(_obj: Arc<K>, err: &ReconcileError, _ctx: Arc<C>) -> Action {
    match classify(&err.0) {
        ErrorClass::Conflict => {
            debug!("Write conflict, requeueing immediately");
            Action::requeue(Duration::from_millis(500))
        }
        ErrorClass::Transient | ErrorClass::NotReady => {
            Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
        }
        ErrorClass::Permanent => {
            error!("Permanent reconcile failure, waiting for spec change: {}", err.0);
            Action::await_change()
        }
    }
}

/// Convert tracker keys into `Image` work-queue references.
fn image_refs(keys: Vec<DependentKey>) -> Vec<ObjectRef<Image>> {
    keys.into_iter()
        .filter(|key| key.kind == KIND_IMAGE)
        .filter_map(|key| {
            key.namespace
                .map(|namespace| ObjectRef::new(&key.name).within(&namespace))
        })
        .collect()
}

/// Convert tracker keys into `Builder` work-queue references.
fn builder_refs(keys: Vec<DependentKey>) -> Vec<ObjectRef<Builder>> {
    keys.into_iter()
        .filter(|key| key.kind == KIND_BUILDER)
        .filter_map(|key| {
            key.namespace
                .map(|namespace| ObjectRef::new(&key.name).within(&namespace))
        })
        .collect()
}

/// Convert tracker keys into `ClusterBuilder` work-queue references.
fn clusterbuilder_refs(keys: Vec<DependentKey>) -> Vec<ObjectRef<ClusterBuilder>> {
    keys.into_iter()
        .filter(|key| key.kind == KIND_CLUSTER_BUILDER)
        .map(|key| ObjectRef::new(&key.name))
        .collect()
}

/// Run the `Image` controller.
///
/// Owns Builds and SourceResolvers (their changes re-enqueue the parent
/// image); watches builders through the dependency tracker.
async fn run_image_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting Image controller");

    let api = Api::<Image>::all(client.clone());
    let builds = Api::<Build>::all(client.clone());
    let resolvers = Api::<SourceResolver>::all(client.clone());
    let builders = Api::<Builder>::all(client.clone());
    let cluster_builders = Api::<ClusterBuilder>::all(client);

    let builder_tracker = Arc::clone(&ctx.tracker);
    let clusterbuilder_tracker = Arc::clone(&ctx.tracker);

    Controller::new(api, watcher::Config::default())
        .owns(builds, watcher::Config::default())
        .owns(resolvers, watcher::Config::default())
        .watches(builders, watcher::Config::default(), move |builder| {
            let subject = SubjectRef::namespaced(
                KIND_BUILDER,
                &builder.namespace().unwrap_or_default(),
                &builder.name_any(),
            );
            image_refs(builder_tracker.on_changed(&subject))
        })
        .watches(
            cluster_builders,
            watcher::Config::default(),
            move |builder| {
                let subject = SubjectRef::cluster_scoped(KIND_CLUSTER_BUILDER, &builder.name_any());
                image_refs(clusterbuilder_tracker.on_changed(&subject))
            },
        )
        .run(reconcile_image_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Image`
async fn reconcile_image_wrapper(
    image: Arc<Image>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_image(Arc::clone(&ctx), (*image).clone()).await {
        Ok(()) => {
            record_reconciliation("Image", "success", start.elapsed());

            let image_ready = image
                .status
                .as_ref()
                .is_some_and(|status| is_ready(&status.conditions));

            if image_ready {
                Ok(Action::requeue(READY_REQUEUE_DURATION))
            } else {
                Ok(Action::requeue(NOT_READY_REQUEUE_DURATION))
            }
        }
        Err(e) => {
            record_reconciliation("Image", "error", start.elapsed());
            error!("Failed to reconcile Image {}: {}", image.name_any(), e);
            Err(e.into())
        }
    }
}

/// Context handed to the `Build` controller: the shared context plus the
/// execution observer collaborator.
struct BuildControllerContext {
    ctx: Arc<Context>,
    observer: Arc<dyn BuildExecutionObserver>,
}

/// Run the `Build` controller.
async fn run_build_controller(
    client: Client,
    ctx: Arc<Context>,
    observer: Arc<dyn BuildExecutionObserver>,
) -> Result<()> {
    info!("Starting Build controller");

    let api = Api::<Build>::all(client);

    Controller::new(api, watcher::Config::default())
        .run(
            reconcile_build_wrapper,
            error_policy,
            Arc::new(BuildControllerContext { ctx, observer }),
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Build`
async fn reconcile_build_wrapper(
    build: Arc<Build>,
    ctx: Arc<BuildControllerContext>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_build(
        Arc::clone(&ctx.ctx),
        Arc::clone(&ctx.observer),
        (*build).clone(),
    )
    .await
    {
        Ok(()) => {
            record_reconciliation("Build", "success", start.elapsed());
            if build.is_running() {
                // Poll the execution until it reaches a terminal condition
                Ok(Action::requeue(NOT_READY_REQUEUE_DURATION))
            } else {
                Ok(Action::await_change())
            }
        }
        Err(e) => {
            record_reconciliation("Build", "error", start.elapsed());
            error!("Failed to reconcile Build {}: {}", build.name_any(), e);
            Err(e.into())
        }
    }
}

/// Run the `SourceResolver` controller.
async fn run_sourceresolver_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting SourceResolver controller");

    let api = Api::<SourceResolver>::all(client);

    Controller::new(api, watcher::Config::default())
        .run(reconcile_sourceresolver_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `SourceResolver`
///
/// A `Poll` decision schedules the resolver's own re-enqueue after the
/// polling interval; pinned sources settle until watch or resync.
async fn reconcile_sourceresolver_wrapper(
    resolver: Arc<SourceResolver>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_sourceresolver(Arc::clone(&ctx), (*resolver).clone()).await {
        Ok(PollDecision::Poll) => {
            record_reconciliation("SourceResolver", "success", start.elapsed());
            Ok(Action::requeue(SOURCE_POLL_INTERVAL))
        }
        Ok(PollDecision::Settle) => {
            record_reconciliation("SourceResolver", "success", start.elapsed());
            Ok(Action::requeue(RESYNC_PERIOD))
        }
        Err(e) => {
            record_reconciliation("SourceResolver", "error", start.elapsed());
            error!(
                "Failed to reconcile SourceResolver {}: {}",
                resolver.name_any(),
                e
            );
            Err(e.into())
        }
    }
}

/// Run the `Builder` controller.
///
/// Watches stacks and stores through the dependency tracker so composition
/// changes re-enqueue dependent builders.
async fn run_builder_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting Builder controller");

    let api = Api::<Builder>::all(client.clone());
    let stacks = Api::<ClusterStack>::all(client.clone());
    let stores = Api::<ClusterStore>::all(client);

    let stack_tracker = Arc::clone(&ctx.tracker);
    let store_tracker = Arc::clone(&ctx.tracker);

    Controller::new(api, watcher::Config::default())
        .watches(stacks, watcher::Config::default(), move |stack| {
            let subject = SubjectRef::cluster_scoped(KIND_CLUSTER_STACK, &stack.name_any());
            builder_refs(stack_tracker.on_changed(&subject))
        })
        .watches(stores, watcher::Config::default(), move |store| {
            let subject = SubjectRef::cluster_scoped(KIND_CLUSTER_STORE, &store.name_any());
            builder_refs(store_tracker.on_changed(&subject))
        })
        .run(reconcile_builder_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Builder`
async fn reconcile_builder_wrapper(
    builder: Arc<Builder>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_builder(Arc::clone(&ctx), (*builder).clone()).await {
        Ok(()) => {
            record_reconciliation("Builder", "success", start.elapsed());
            Ok(Action::requeue(RESYNC_PERIOD))
        }
        Err(e) => {
            record_reconciliation("Builder", "error", start.elapsed());
            error!("Failed to reconcile Builder {}: {}", builder.name_any(), e);
            Err(e.into())
        }
    }
}

/// Run the `ClusterBuilder` controller.
async fn run_clusterbuilder_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting ClusterBuilder controller");

    let api = Api::<ClusterBuilder>::all(client.clone());
    let stacks = Api::<ClusterStack>::all(client.clone());
    let stores = Api::<ClusterStore>::all(client);

    let stack_tracker = Arc::clone(&ctx.tracker);
    let store_tracker = Arc::clone(&ctx.tracker);

    Controller::new(api, watcher::Config::default())
        .watches(stacks, watcher::Config::default(), move |stack| {
            let subject = SubjectRef::cluster_scoped(KIND_CLUSTER_STACK, &stack.name_any());
            clusterbuilder_refs(stack_tracker.on_changed(&subject))
        })
        .watches(stores, watcher::Config::default(), move |store| {
            let subject = SubjectRef::cluster_scoped(KIND_CLUSTER_STORE, &store.name_any());
            clusterbuilder_refs(store_tracker.on_changed(&subject))
        })
        .run(reconcile_clusterbuilder_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `ClusterBuilder`
async fn reconcile_clusterbuilder_wrapper(
    builder: Arc<ClusterBuilder>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_clusterbuilder(Arc::clone(&ctx), (*builder).clone()).await {
        Ok(()) => {
            record_reconciliation("ClusterBuilder", "success", start.elapsed());
            Ok(Action::requeue(RESYNC_PERIOD))
        }
        Err(e) => {
            record_reconciliation("ClusterBuilder", "error", start.elapsed());
            error!(
                "Failed to reconcile ClusterBuilder {}: {}",
                builder.name_any(),
                e
            );
            Err(e.into())
        }
    }
}

/// Run the `ClusterStore` controller.
async fn run_clusterstore_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting ClusterStore controller");

    let api = Api::<ClusterStore>::all(client);

    Controller::new(api, watcher::Config::default())
        .run(reconcile_clusterstore_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `ClusterStore`
async fn reconcile_clusterstore_wrapper(
    store: Arc<ClusterStore>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_clusterstore(Arc::clone(&ctx), (*store).clone()).await {
        Ok(()) => {
            record_reconciliation("ClusterStore", "success", start.elapsed());
            Ok(Action::requeue(RESYNC_PERIOD))
        }
        Err(e) => {
            record_reconciliation("ClusterStore", "error", start.elapsed());
            error!("Failed to reconcile ClusterStore {}: {}", store.name_any(), e);
            Err(e.into())
        }
    }
}

/// Run the `ClusterStack` controller.
async fn run_clusterstack_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting ClusterStack controller");

    let api = Api::<ClusterStack>::all(client);

    Controller::new(api, watcher::Config::default())
        .run(reconcile_clusterstack_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `ClusterStack`
async fn reconcile_clusterstack_wrapper(
    stack: Arc<ClusterStack>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_clusterstack(Arc::clone(&ctx), (*stack).clone()).await {
        Ok(()) => {
            record_reconciliation("ClusterStack", "success", start.elapsed());
            Ok(Action::requeue(RESYNC_PERIOD))
        }
        Err(e) => {
            record_reconciliation("ClusterStack", "error", start.elapsed());
            error!("Failed to reconcile ClusterStack {}: {}", stack.name_any(), e);
            Err(e.into())
        }
    }
}

/// Run the `ClusterLifecycle` controller.
async fn run_clusterlifecycle_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting ClusterLifecycle controller");

    let api = Api::<ClusterLifecycle>::all(client);

    Controller::new(api, watcher::Config::default())
        .run(reconcile_clusterlifecycle_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `ClusterLifecycle`
async fn reconcile_clusterlifecycle_wrapper(
    lifecycle: Arc<ClusterLifecycle>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_clusterlifecycle(Arc::clone(&ctx), (*lifecycle).clone()).await {
        Ok(()) => {
            record_reconciliation("ClusterLifecycle", "success", start.elapsed());
            Ok(Action::requeue(RESYNC_PERIOD))
        }
        Err(e) => {
            record_reconciliation("ClusterLifecycle", "error", start.elapsed());
            error!(
                "Failed to reconcile ClusterLifecycle {}: {}",
                lifecycle.name_any(),
                e
            );
            Err(e.into())
        }
    }
}

/// Run the `ClusterBuildpack` controller.
async fn run_clusterbuildpack_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting ClusterBuildpack controller");

    let api = Api::<ClusterBuildpack>::all(client);

    Controller::new(api, watcher::Config::default())
        .run(reconcile_clusterbuildpack_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `ClusterBuildpack`
async fn reconcile_clusterbuildpack_wrapper(
    buildpack: Arc<ClusterBuildpack>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_clusterbuildpack(Arc::clone(&ctx), (*buildpack).clone()).await {
        Ok(()) => {
            record_reconciliation("ClusterBuildpack", "success", start.elapsed());
            Ok(Action::requeue(RESYNC_PERIOD))
        }
        Err(e) => {
            record_reconciliation("ClusterBuildpack", "error", start.elapsed());
            error!(
                "Failed to reconcile ClusterBuildpack {}: {}",
                buildpack.name_any(),
                e
            );
            Err(e.into())
        }
    }
}

/// Run the `Extension` controller.
async fn run_extension_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting Extension controller");

    let api = Api::<Extension>::all(client);

    Controller::new(api, watcher::Config::default())
        .run(reconcile_extension_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Extension`
async fn reconcile_extension_wrapper(
    extension: Arc<Extension>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();

    match reconcile_extension(Arc::clone(&ctx), (*extension).clone()).await {
        Ok(()) => {
            record_reconciliation("Extension", "success", start.elapsed());
            Ok(Action::requeue(RESYNC_PERIOD))
        }
        Err(e) => {
            record_reconciliation("Extension", "error", start.elapsed());
            error!("Failed to reconcile Extension {}: {}", extension.name_any(), e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
