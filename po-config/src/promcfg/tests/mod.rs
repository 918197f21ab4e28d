mod server_test;

use std::collections::BTreeMap;

use assertables::*;
use po_testutils::*;
use rstest::*;

use super::*;
use crate::assets::InMemorySecretSource;

fn keyed<T: kube::Resource>(objs: Vec<T>) -> BTreeMap<String, T> {
    objs.into_iter().map(|o| (o.namespaced_name(), o)).collect()
}

fn render<W: Workload>(workload: &W, inputs: &ConfigInputs, assets: &Assets) -> Mapping {
    let generator = ConfigGenerator::new(workload, GeneratorConfig::default()).unwrap();
    let out = match workload.server() {
        Some(_) => generator.render_server_config(inputs, assets).unwrap(),
        None => generator.render_agent_config(inputs, assets).unwrap(),
    };
    serde_yaml::from_str(&out).unwrap()
}

fn jobs(cfg: &Mapping) -> Vec<Mapping> {
    cfg["scrape_configs"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|j| j.as_mapping().unwrap().clone())
        .collect()
}

fn relabelings(job: &Mapping, key: &str) -> Vec<Value> {
    job[key].as_sequence().unwrap().clone()
}

fn with_version(mut prom: Prometheus, version: &str) -> Prometheus {
    prom.spec.common.version = Some(version.into());
    prom
}

async fn load_assets(prom: &Prometheus, secrets: Vec<corev1::Secret>) -> Assets {
    let mut store = AssetStore::new(InMemorySecretSource::new(secrets, vec![]));
    load_workload_assets(prom, &mut store).await.unwrap();
    store.into_assets()
}
