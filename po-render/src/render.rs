use po_config::assets::InMemorySecretSource;
use po_config::monitor::Workload;
use po_config::prelude::*;
use po_config::promcfg::{
    ConfigGenerator,
    ConfigInputs,
    GeneratorConfig,
    gzip,
    load_workload_assets,
};
use po_config::selector::{
    ResourceSelector,
    list_from,
};
use po_core::errors::*;
use tracing::*;

use crate::bundle::Bundle;

err_impl! {RenderError,
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),
}

pub async fn cmd(bundle: &Bundle, plain: bool) -> anyhow::Result<Vec<u8>> {
    let rendered = match (&bundle.prometheus, &bundle.prometheus_agent) {
        (Some(prom), None) => render_workload(prom, bundle).await?,
        (None, Some(agent)) => render_workload(agent, bundle).await?,
        _ => bail!(RenderError::invalid_bundle("exactly one of prometheus or prometheusAgent must be set")),
    };

    match plain {
        true => Ok(rendered.into_bytes()),
        false => gzip(rendered.as_bytes()),
    }
}

async fn render_workload<W: Workload>(workload: &W, bundle: &Bundle) -> anyhow::Result<String> {
    let mut store = AssetStore::new(InMemorySecretSource::new(bundle.secrets.clone(), bundle.config_maps.clone()));
    load_workload_assets(workload, &mut store).await?;

    let inputs = {
        let mut selector = ResourceSelector::new(workload, &mut store, &bundle.namespaces)?;
        let sms = selector.select_service_monitors(list_from(&bundle.service_monitors)).await?;
        let pms = selector.select_pod_monitors(list_from(&bundle.pod_monitors)).await?;
        let probes = selector.select_probes(list_from(&bundle.probes)).await?;
        let scs = selector.select_scrape_configs(list_from(&bundle.scrape_configs)).await?;

        let rejected = sms.rejected() + pms.rejected() + probes.rejected() + scs.rejected();
        if rejected > 0 {
            warn!("{rejected} resource(s) were rejected and will not be scraped");
        }

        ConfigInputs {
            service_monitors: sms.valid_resources(),
            pod_monitors: pms.valid_resources(),
            probes: probes.valid_resources(),
            scrape_configs: scs.valid_resources(),
            rule_config_map_names: bundle.rule_config_map_names.clone(),
        }
    };

    let assets = store.into_assets();
    let generator = ConfigGenerator::new(workload, GeneratorConfig::default())?;
    info!("rendering configuration of {} for Prometheus {}", workload.namespaced_name(), generator.version());
    match workload.server() {
        Some(_) => generator.render_server_config(&inputs, &assets),
        None => generator.render_agent_config(&inputs, &assets),
    }
}
