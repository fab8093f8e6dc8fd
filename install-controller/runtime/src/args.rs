use crate::{
    apply::{ApplyClient, KubeTransport},
    index::Requirements,
    k8s, lease, status, watch,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "olm-install-controller",
    about = "Installs operators described by ClusterServiceVersions"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "olm=info,warn",
        env = "OLM_INSTALL_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Namespaces in which ClusterServiceVersions and their workloads are
    /// watched.
    ///
    /// When empty, all namespaces are watched.
    #[clap(long, value_delimiter = ',', env = "OLM_WATCH_NAMESPACES")]
    watch_namespaces: Vec<String>,

    /// The namespace of the controller's own deployment, which holds the
    /// write lease.
    #[clap(long, default_value = "olm", env = "OLM_CONTROLLER_NAMESPACE")]
    controller_namespace: String,

    #[clap(long, default_value = "olm-install-controller")]
    controller_deployment_name: String,

    #[clap(long, default_value = "10")]
    reconcile_period_secs: u64,

    /// Bounds every read and write issued by a reconciliation pass.
    #[clap(long, default_value = "5000")]
    request_timeout_ms: u64,

    /// Writes statuses without first claiming the write lease.
    ///
    /// Only safe when a single replica runs.
    #[clap(long)]
    lease_disabled: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            watch_namespaces,
            controller_namespace,
            controller_deployment_name,
            reconcile_period_secs,
            request_timeout_ms,
            lease_disabled,
        } = self;

        let namespaces = watch_namespaces
            .into_iter()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .collect::<Vec<_>>();

        let mut prom = <Registry>::default();
        let controller_metrics =
            status::ControllerMetrics::register(prom.sub_registry_with_prefix("install_controller"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        if namespaces.is_empty() {
            info!("Watching all namespaces");
        } else {
            info!(namespaces = ?namespaces, "Watching namespaces");
        }

        // Spawn resource watches. Every kind that a ClusterServiceVersion may
        // require is registered so that requirements can be resolved.
        let csvs = watch::namespaced::<k8s::ClusterServiceVersion, _>(&mut runtime, &namespaces);
        let deployments = watch::namespaced::<k8s::Deployment, _>(&mut runtime, &namespaces);
        let services = watch::namespaced::<k8s::Service, _>(&mut runtime, &namespaces);
        let crds = watch::cluster::<k8s::CustomResourceDefinition, _>(&mut runtime);

        let requirements = Requirements::shared();
        requirements.register_kind(crds);
        requirements.register_kind(services);
        requirements.register_kind(deployments.clone());
        requirements.register_kind(csvs.clone());

        let client = runtime.client();
        let reconciler = status::Reconciler::new(
            requirements,
            deployments,
            ApplyClient::new(KubeTransport::new(client.clone())),
        );
        let mut controller = status::Controller::new(
            csvs,
            reconciler,
            ApplyClient::new(KubeTransport::new(client).status()),
            Duration::from_secs(reconcile_period_secs),
            Duration::from_millis(request_timeout_ms),
            controller_metrics,
        );

        if lease_disabled {
            tracing::warn!("Write lease disabled; statuses are written unconditionally");
        } else {
            let hostname = std::env::var("HOSTNAME")
                .context("failed to fetch `HOSTNAME` environment variable")?;
            let claims = lease::init(
                &runtime,
                &controller_namespace,
                &controller_deployment_name,
                &hostname,
            )
            .await?;
            controller = controller.with_claims(claims, hostname);
        }

        // Spawn the install reconciliation loop.
        tokio::spawn(controller.run().instrument(info_span!("install_controller")));

        // Block the main thread on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
