//! Service and endpoints lifecycle plus backend resolution.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Service, ServicePort, ServiceSpec,
};
use kube::api::PostParams;
use kube::core::ObjectMeta;
use kube::Api;
use kubench_common::WaitConfig;
use rand::RngCore;
use tracing::info;

use crate::context::{Clock, Context};
use crate::exec::PodExec;
use crate::labels::managed_labels_extend;
use crate::ops::delete_and_wait;
use crate::poller::ResourceRef;
use crate::Error;

/// Service exposure type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceKind {
    /// Reachable only inside the cluster.
    ClusterIp,
    /// Additionally exposed on a port of every node.
    NodePort,
}

impl ServiceKind {
    fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::ClusterIp => "ClusterIP",
            ServiceKind::NodePort => "NodePort",
        }
    }
}

/// Create a service forwarding `port` to pods matching `selector`.
///
/// With no selector the service gets no backends until
/// [`create_endpoints`] points it somewhere.
pub async fn create_service(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    port: i32,
    protocol: Option<String>,
    kind: ServiceKind,
    selector: Option<BTreeMap<String, String>>,
) -> Result<(), Error> {
    let service = Service {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            labels: managed_labels_extend(selector.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(kind.as_str().to_owned()),
            selector,
            ports: Some(vec![ServicePort {
                port,
                protocol,
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    };
    let services: Api<Service> = Api::namespaced(cx.k_client.clone(), namespace);
    services.create(&PostParams::default(), &service).await?;
    info!(name, namespace, kind = kind.as_str(), port, "service created");
    Ok(())
}

/// Read the service back, e.g. to discover an allocated node port.
pub async fn get_service(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
) -> Result<Service, Error> {
    let services: Api<Service> = Api::namespaced(cx.k_client.clone(), namespace);
    Ok(services.get(name).await?)
}

/// Allocated node port of the service's first port, when one exists.
pub fn node_port(service: &Service) -> Option<i32> {
    service
        .spec
        .as_ref()?
        .ports
        .as_ref()?
        .first()?
        .node_port
}

/// Resolve the service's backing `ip:port` pairs from its endpoints object.
pub async fn get_endpoints(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
) -> Result<Vec<String>, Error> {
    let endpoints: Api<Endpoints> = Api::namespaced(cx.k_client.clone(), namespace);
    let object = endpoints.get(name).await?;
    let mut backends = Vec::new();
    for subset in object.subsets.unwrap_or_default() {
        let addresses = subset.addresses.unwrap_or_default();
        let ports = subset.ports.unwrap_or_default();
        for address in &addresses {
            for port in &ports {
                backends.push(format!("{}:{}", address.ip, port.port));
            }
        }
    }
    Ok(backends)
}

/// Point a selector-less service at a fixed address.
pub async fn create_endpoints(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    ip: &str,
    port: i32,
) -> Result<(), Error> {
    let object = Endpoints {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            labels: managed_labels_extend(None),
            ..ObjectMeta::default()
        },
        subsets: Some(vec![EndpointSubset {
            addresses: Some(vec![EndpointAddress {
                ip: ip.to_owned(),
                ..EndpointAddress::default()
            }]),
            ports: Some(vec![EndpointPort {
                port,
                ..EndpointPort::default()
            }]),
            ..EndpointSubset::default()
        }]),
    };
    let endpoints: Api<Endpoints> = Api::namespaced(cx.k_client.clone(), namespace);
    endpoints.create(&PostParams::default(), &object).await?;
    info!(name, namespace, ip, port, "endpoints created");
    Ok(())
}

/// Delete the service. No wait; services terminate synchronously enough.
pub async fn delete_service(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
) -> Result<(), Error> {
    let services: Api<Service> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("Service", name, namespace);
    delete_and_wait(&services, &resource, cfg, false).await
}

/// Delete the endpoints object.
pub async fn delete_endpoints(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
) -> Result<(), Error> {
    let endpoints: Api<Endpoints> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("Endpoints", name, namespace);
    delete_and_wait(&endpoints, &resource, cfg, false).await
}
