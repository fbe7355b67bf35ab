use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Event, Pod, ResourceQuota};
use kube::api::{Api, ListParams};

use super::{ClusterGateway, GatewayResult};

/// One entry of `list_managed_pods` (§4.1): enough to render a dashboard
/// row without a second round trip per pod.
#[derive(Debug, Clone)]
pub struct ManagedPodView {
    pub namespace: String,
    pub name: String,
    pub phase: String,
    pub ready: bool,
    pub restart_count: i32,
    pub containers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QuotaStatusView {
    pub hard: BTreeMap<String, String>,
    pub used: BTreeMap<String, String>,
}

impl QuotaStatusView {
    /// Fraction of `hard` consumed per resource name, where both sides parse
    /// as plain integers/quantities the Gateway can compare textually.
    pub fn utilization(&self) -> BTreeMap<String, f64> {
        self.hard
            .iter()
            .filter_map(|(k, hard)| {
                let used = self.used.get(k)?;
                let hard_qty = parse_quantity(hard)?;
                if hard_qty == 0.0 {
                    return None;
                }
                let used_qty = parse_quantity(used)?;
                Some((k.clone(), used_qty / hard_qty))
            })
            .collect()
    }
}

fn parse_quantity(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_end_matches(['m', 'M', 'G', 'K', 'i']);
    trimmed.parse::<f64>().ok()
}

impl ClusterGateway {
    fn pod_to_view(pod: Pod) -> ManagedPodView {
        let namespace = pod.metadata.namespace.unwrap_or_default();
        let name = pod.metadata.name.unwrap_or_default();
        let status = pod.status.unwrap_or_default();
        let phase = status.phase.unwrap_or_else(|| "Unknown".to_string());
        let container_statuses = status.container_statuses.unwrap_or_default();
        let ready = !container_statuses.is_empty() && container_statuses.iter().all(|c| c.ready);
        let restart_count = container_statuses.iter().map(|c| c.restart_count).sum();
        let containers = pod
            .spec
            .map(|s| s.containers.into_iter().map(|c| c.name).collect())
            .unwrap_or_default();
        ManagedPodView {
            namespace,
            name,
            phase,
            ready,
            restart_count,
            containers,
        }
    }

    /// Ordered (by namespace then name, for a stable dashboard listing)
    /// view over every pod carrying `kubdev.managed=true` (§4.1).
    pub async fn list_managed_pod_views(
        &self,
        namespace: Option<&str>,
    ) -> GatewayResult<Vec<ManagedPodView>> {
        self.list_managed_pods(namespace)
            .await
            .map(|pods| {
                let mut views: Vec<ManagedPodView> =
                    pods.into_iter().map(Self::pod_to_view).collect();
                views.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
                views
            })
    }

    /// A lazy, infinite stream of managed-pod snapshots, polled every
    /// `interval` (§4.1: `StreamManagedPods`). Consumers (dashboards) are
    /// expected to take a bounded prefix; the stream itself never
    /// terminates on its own.
    pub fn stream_managed_pods(
        &self,
        interval: Duration,
    ) -> impl futures::Stream<Item = GatewayResult<Vec<ManagedPodView>>> + Send + 'static {
        let gateway = self.clone();
        let period = tokio::time::interval(interval);
        futures::stream::unfold(period, move |mut period| {
            let gateway = gateway.clone();
            async move {
                period.tick().await;
                let snapshot = gateway.list_managed_pod_views(None).await;
                Some((snapshot, period))
            }
        })
    }

    /// Cluster events, newest-first by last-seen timestamp (§4.1). `None`
    /// namespace lists across all namespaces the client can see.
    pub async fn list_events(&self, namespace: Option<&str>, limit: usize) -> GatewayResult<Vec<Event>> {
        let list_params = ListParams::default();
        let result = match namespace {
            Some(ns) => {
                let api: Api<Event> = Api::namespaced(self.client(), ns);
                self.with_read_timeout(api.list(&list_params)).await
            }
            None => {
                let api: Api<Event> = Api::all(self.client());
                self.with_read_timeout(api.list(&list_params)).await
            }
        };
        result.map(|list| {
            let mut events = list.items;
            events.sort_by(|a, b| {
                let a_ts = a.last_timestamp.as_ref().map(|t| t.0);
                let b_ts = b.last_timestamp.as_ref().map(|t| t.0);
                b_ts.cmp(&a_ts)
            });
            events.truncate(limit);
            events
        })
    }

    pub async fn get_resource_quota_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> GatewayResult<QuotaStatusView> {
        let api: Api<ResourceQuota> = Api::namespaced(self.client(), namespace);
        self.with_read_timeout(api.get(name)).await.map(|quota| {
            let status = quota.status.unwrap_or_default();
            let hard = status
                .hard
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.0))
                .collect();
            let used = status
                .used
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.0))
                .collect();
            QuotaStatusView { hard, used }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_divides_used_by_hard() {
        let view = QuotaStatusView {
            hard: BTreeMap::from([("cpu".to_string(), "4".to_string())]),
            used: BTreeMap::from([("cpu".to_string(), "1".to_string())]),
        };
        let util = view.utilization();
        assert_eq!(util.get("cpu"), Some(&0.25));
    }

    #[test]
    fn utilization_skips_resources_missing_from_used() {
        let view = QuotaStatusView {
            hard: BTreeMap::from([
                ("cpu".to_string(), "4".to_string()),
                ("memory".to_string(), "8Gi".to_string()),
            ]),
            used: BTreeMap::from([("cpu".to_string(), "2".to_string())]),
        };
        let util = view.utilization();
        assert_eq!(util.len(), 1);
        assert_eq!(util.get("cpu"), Some(&0.5));
        assert!(!util.contains_key("memory"));
    }

    #[test]
    fn utilization_skips_zero_hard_to_avoid_division_by_zero() {
        let view = QuotaStatusView {
            hard: BTreeMap::from([("pods".to_string(), "0".to_string())]),
            used: BTreeMap::from([("pods".to_string(), "0".to_string())]),
        };
        assert!(view.utilization().is_empty());
    }

    #[test]
    fn utilization_strips_known_unit_suffixes() {
        let view = QuotaStatusView {
            hard: BTreeMap::from([("memory".to_string(), "10Gi".to_string())]),
            used: BTreeMap::from([("memory".to_string(), "5Gi".to_string())]),
        };
        let util = view.utilization();
        assert_eq!(util.get("memory"), Some(&0.5));
    }

    #[test]
    fn utilization_skips_unparseable_quantities() {
        let view = QuotaStatusView {
            hard: BTreeMap::from([("cpu".to_string(), "not-a-number".to_string())]),
            used: BTreeMap::from([("cpu".to_string(), "1".to_string())]),
        };
        assert!(view.utilization().is_empty());
    }
}
