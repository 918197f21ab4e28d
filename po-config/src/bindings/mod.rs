use std::fmt::Debug;

use json_patch::{
    PatchOperation,
    ReplaceOperation,
    TestOperation,
};
use json_patch_ext::prelude::*;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use kube::api::{
    Api,
    Patch,
    PatchParams,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::*;

use crate::monitor::*;
use crate::prelude::*;
use crate::selector::TypedResourcesSelection;

/// Keeps the `status.bindings` of configuration resources in sync with the workload that
/// selected them.  Every write is a JSON patch guarded by `test` operations so that a binding
/// which moved or was rewritten by another writer makes the patch fail instead of clobbering it.
pub struct ConfigResourceSyncer {
    group: String,
    resource: String,
    namespace: String,
    name: String,
    client: kube::Client,
}

impl ConfigResourceSyncer {
    pub fn new<W: Workload>(workload: &W, client: kube::Client) -> ConfigResourceSyncer {
        ConfigResourceSyncer {
            group: MONITORING_GROUP.into(),
            resource: W::plural(&()).into_owned(),
            namespace: workload.namespace().unwrap_or_default(),
            name: workload.name_any(),
            client,
        }
    }

    fn binding(&self, conditions: Vec<ConfigResourceCondition>) -> WorkloadBinding {
        WorkloadBinding {
            group: self.group.clone(),
            resource: self.resource.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            conditions,
        }
    }

    fn is_workload(&self, b: &WorkloadBinding) -> bool {
        b.group == self.group && b.resource == self.resource && b.name == self.name && b.namespace == self.namespace
    }

    pub fn binding_index(&self, bindings: &[WorkloadBinding]) -> Option<usize> {
        bindings.iter().position(|b| self.is_workload(b))
    }

    // The four identity fields of the binding at index i must still be what we expect
    fn test_binding_ops(&self, i: usize) -> Vec<PatchOperation> {
        [
            ("name", &self.name),
            ("namespace", &self.namespace),
            ("resource", &self.resource),
            ("group", &self.group),
        ]
        .into_iter()
        .map(|(field, value)| {
            PatchOperation::Test(TestOperation { path: format_ptr!("/status/bindings/{i}/{field}"), value: json!(value) })
        })
        .collect()
    }

    /// Builds the patch which records `conditions` for this workload; `None` means the binding
    /// is already up to date.
    pub fn update_binding_patch(
        &self,
        bindings: &[WorkloadBinding],
        conditions: Vec<ConfigResourceCondition>,
    ) -> Option<json_patch::Patch> {
        let Some(i) = self.binding_index(bindings) else {
            return Some(json_patch::Patch(vec![add_operation(
                format_ptr!("/status/bindings/-"),
                json!(self.binding(conditions)),
            )]));
        };

        let current = &bindings[i].conditions;
        if equal_conditions(current, &conditions) {
            return None;
        }

        let conditions = keep_transition_times(current, conditions);
        let mut ops = self.test_binding_ops(i);
        ops.push(PatchOperation::Replace(ReplaceOperation {
            path: format_ptr!("/status/bindings/{i}/conditions"),
            value: json!(conditions),
        }));
        Some(json_patch::Patch(ops))
    }

    /// Builds the patch which drops this workload's binding; `None` means there is nothing to
    /// remove.
    pub fn remove_binding_patch(&self, bindings: &[WorkloadBinding]) -> Option<json_patch::Patch> {
        let i = self.binding_index(bindings)?;
        let mut ops = self.test_binding_ops(i);
        ops.push(remove_operation(format_ptr!("/status/bindings/{i}")));
        Some(json_patch::Patch(ops))
    }

    #[instrument(skip_all, fields(resource = T::KIND_KEY, name = %obj.namespaced_name()))]
    pub async fn update_binding<T>(&self, obj: &T, conditions: Vec<ConfigResourceCondition>) -> EmptyResult
    where
        T: ConfigResource + Resource<Scope = NamespaceResourceScope> + DeserializeOwned + Debug,
    {
        let bindings = obj.bindings();
        let patch = if bindings.is_empty() {
            json_patch::Patch(vec![add_operation(
                format_ptr!("/status"),
                json!({"bindings": [self.binding(conditions)]}),
            )])
        } else {
            match self.update_binding_patch(bindings, conditions) {
                Some(p) => p,
                None => {
                    debug!("binding on {} {} is up to date", T::KIND_KEY, obj.namespaced_name());
                    return Ok(());
                },
            }
        };

        self.patch_status(obj, patch).await
    }

    pub async fn remove_binding<T>(&self, obj: &T) -> EmptyResult
    where
        T: ConfigResource + Resource<Scope = NamespaceResourceScope> + DeserializeOwned + Debug,
    {
        match self.remove_binding_patch(obj.bindings()) {
            Some(patch) => self.patch_status(obj, patch).await,
            None => Ok(()),
        }
    }

    /// Writes the Accepted condition of every selected resource.
    pub async fn update_bindings<T>(&self, selection: &TypedResourcesSelection<T>) -> EmptyResult
    where
        T: ConfigResource + Resource<Scope = NamespaceResourceScope> + DeserializeOwned + Debug,
    {
        for res in selection.values() {
            self.update_binding(&res.resource, res.conditions()).await?;
        }
        Ok(())
    }

    /// Removes this workload's binding from every object which is no longer part of the
    /// selection.
    pub async fn cleanup_bindings<T>(&self, objects: &[T], selection: &TypedResourcesSelection<T>) -> EmptyResult
    where
        T: ConfigResource + Resource<Scope = NamespaceResourceScope> + DeserializeOwned + Debug,
    {
        for obj in objects {
            if selection.contains_key(&obj.namespaced_name()) {
                continue;
            }
            self.remove_binding(obj).await?;
        }
        Ok(())
    }

    async fn patch_status<T>(&self, obj: &T, patch: json_patch::Patch) -> EmptyResult
    where
        T: ConfigResource + Resource<Scope = NamespaceResourceScope> + DeserializeOwned + Debug,
    {
        let ns = obj.namespace().unwrap_or_default();
        info!("patching status bindings of {} {ns}/{}", T::KIND_KEY, obj.name_any());

        let api: Api<T> = Api::namespaced(self.client.clone(), &ns);
        let params = PatchParams {
            field_manager: Some(PROMETHEUS_OPERATOR_FIELD_MANAGER.into()),
            ..Default::default()
        };
        api.patch_status(&obj.name_any(), &params, &Patch::Json::<()>(patch)).await?;
        Ok(())
    }
}

fn equal_conditions(current: &[ConfigResourceCondition], desired: &[ConfigResourceCondition]) -> bool {
    current.len() == desired.len()
        && current.iter().zip(desired).all(|(c, d)| {
            c.type_ == d.type_
                && c.status == d.status
                && c.reason == d.reason
                && c.message == d.message
                && c.observed_generation == d.observed_generation
        })
}

// A condition whose status did not flip keeps the time it last transitioned
fn keep_transition_times(
    current: &[ConfigResourceCondition],
    desired: Vec<ConfigResourceCondition>,
) -> Vec<ConfigResourceCondition> {
    desired
        .into_iter()
        .map(|mut d| {
            if let Some(c) = current.iter().find(|c| c.type_ == d.type_ && c.status == d.status) {
                d.last_transition_time = c.last_transition_time.clone();
            }
            d
        })
        .collect()
}

#[cfg(test)]
mod tests;
