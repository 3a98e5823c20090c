use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tcrecon_runtime::{
    Budgets, CloudError, IdCodec, Page, Poller, RemoteCall, ResourceAddress, ResourceTag, Result,
    RetryBudget, RetryExecutor, TagApi, TagDiff, TagSet, TagSynchronizer, diff,
};

pub const REGION: &str = "ap-guangzhou";

/// Route runtime logs to the test output, filtered by `RUST_LOG`
#[allow(dead_code)]
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tcrecon_runtime=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Describes a freshly created gateway answers PENDING this many times
pub const PENDING_DESCRIBES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpnGateway {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpnConnection {
    pub gateway_id: String,
    pub customer_gateway_id: String,
}

#[derive(Debug, Default)]
struct State {
    gateways: BTreeMap<String, (VpnGateway, u32)>,
    connections: Vec<VpnConnection>,
    // (resource prefix, resource id) -> tags
    tags: BTreeMap<(String, String), TagSet>,
    next_id: u32,
    throttle: u32,
    fail_tag_writes: Option<String>,
    calls: BTreeMap<&'static str, u32>,
}

/// In-memory stand-in for the provider API
#[derive(Debug, Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<State>>,
}

#[allow(dead_code)]
impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls of any kind with `RequestLimitExceeded`
    pub fn throttle_next(&self, n: u32) {
        self.state.lock().unwrap().throttle = n;
    }

    /// Fail every tag write with `code`
    pub fn fail_tag_writes(&self, code: &str) {
        self.state.lock().unwrap().fail_tag_writes = Some(code.to_string());
    }

    pub fn calls(&self, action: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(action)
            .copied()
            .unwrap_or(0)
    }

    pub fn seed_tags(&self, prefix: &str, id: &str, tags: TagSet) {
        self.state
            .lock()
            .unwrap()
            .tags
            .insert((prefix.to_string(), id.to_string()), tags);
    }

    pub fn tags_of(&self, prefix: &str, id: &str) -> TagSet {
        self.state
            .lock()
            .unwrap()
            .tags
            .get(&(prefix.to_string(), id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn enter(&self, action: &'static str) -> Result<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(action).or_default() += 1;
        if state.throttle > 0 {
            state.throttle -= 1;
            return Err(CloudError::api("RequestLimitExceeded", "too many requests")
                .with_request_id(format!("req-{}", state.calls[action])));
        }
        Ok(state)
    }

    pub async fn create_vpn_gateway(&self, name: &str) -> Result<String> {
        let mut state = self.enter("CreateVpnGateway")?;
        if state.gateways.values().any(|(gw, _)| gw.name == name) {
            return Err(CloudError::api(
                "InvalidParameterValue.Duplicate",
                format!("gateway name {} already exists", name),
            ));
        }
        state.next_id += 1;
        let id = format!("vpngw-{:08x}", state.next_id);
        let gateway = VpnGateway {
            id: id.clone(),
            name: name.to_string(),
            status: "PENDING".to_string(),
        };
        state.gateways.insert(id.clone(), (gateway, PENDING_DESCRIBES));
        Ok(id)
    }

    /// Describe one gateway. Each describe moves a pending gateway one step
    /// closer to AVAILABLE (or a deleting one closer to gone).
    pub async fn describe_vpn_gateway(&self, id: &str) -> Result<Option<VpnGateway>> {
        let mut guard = self.enter("DescribeVpnGateways")?;
        let state = &mut *guard;
        let Some((gateway, remaining)) = state.gateways.get_mut(id) else {
            return Ok(None);
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(Some(gateway.clone()));
        }
        if gateway.status == "DELETING" {
            state.gateways.remove(id);
            state.tags.remove(&("vpngw".to_string(), id.to_string()));
            return Ok(None);
        }
        if gateway.status == "PENDING" {
            gateway.status = "AVAILABLE".to_string();
        }
        Ok(Some(gateway.clone()))
    }

    pub async fn delete_vpn_gateway(&self, id: &str) -> Result<()> {
        let mut state = self.enter("DeleteVpnGateway")?;
        let Some((gateway, remaining)) = state.gateways.get_mut(id) else {
            return Err(CloudError::api(
                "ResourceNotFound",
                format!("gateway {} does not exist", id),
            ));
        };
        gateway.status = "DELETING".to_string();
        *remaining = 1;
        Ok(())
    }

    pub async fn create_vpn_connection(&self, gateway_id: &str, customer_gateway_id: &str) -> Result<()> {
        let mut state = self.enter("CreateVpnConnection")?;
        if !state.gateways.contains_key(gateway_id) {
            return Err(CloudError::api(
                "ResourceNotFound.VpnGateway",
                format!("gateway {} does not exist", gateway_id),
            ));
        }
        state.connections.push(VpnConnection {
            gateway_id: gateway_id.to_string(),
            customer_gateway_id: customer_gateway_id.to_string(),
        });
        Ok(())
    }

    pub async fn describe_vpn_connection(
        &self,
        gateway_id: &str,
        customer_gateway_id: &str,
    ) -> Result<Option<VpnConnection>> {
        let state = self.enter("DescribeVpnConnections")?;
        Ok(state
            .connections
            .iter()
            .find(|c| c.gateway_id == gateway_id && c.customer_gateway_id == customer_gateway_id)
            .cloned())
    }
}

#[async_trait]
impl TagApi for FakeCloud {
    /// Returns tags of every resource sharing the address's prefix, like the
    /// real listing does when the resource id filter is loose
    async fn describe_resource_tags(
        &self,
        address: &ResourceAddress,
        offset: u64,
        limit: u64,
    ) -> Result<Page<ResourceTag>> {
        let state = self.enter("DescribeResourceTagsByResourceIds")?;
        let records: Vec<ResourceTag> = state
            .tags
            .iter()
            .filter(|((prefix, _), _)| *prefix == address.resource_prefix)
            .flat_map(|((_, id), tags)| {
                tags.iter().map(move |(key, value)| ResourceTag {
                    resource_id: id.clone(),
                    tag_key: key.clone(),
                    tag_value: value.clone(),
                })
            })
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(Page::new(records, offset, limit))
    }

    async fn modify_resource_tags(
        &self,
        address: &ResourceAddress,
        replace: &TagSet,
        delete: &[String],
    ) -> Result<()> {
        let mut state = self.enter("ModifyResourceTags")?;
        if let Some(code) = &state.fail_tag_writes {
            return Err(CloudError::api(code.clone(), "tag service rejected the request"));
        }
        let key = (address.resource_prefix.clone(), address.resource_id.clone());
        let current = state.tags.get(&key).cloned().unwrap_or_default();
        let pending = TagDiff {
            replace: replace.clone(),
            delete: delete.iter().cloned().collect(),
        };
        state.tags.insert(key, pending.apply_to(&current));
        Ok(())
    }
}

/// Budgets small enough to keep paused-clock tests readable
pub fn test_budgets() -> Budgets {
    let read = RetryBudget::new(Duration::from_secs(30), Duration::from_secs(1))
        .with_backoff(Duration::from_secs(4), 2.0);
    Budgets {
        read,
        write: read.scaled(2),
        poll_interval: Duration::from_secs(1),
    }
}

/// A VPN gateway adapter written against the runtime the way a real resource
/// adapter would be
pub struct VpnGatewayAdapter {
    pub cloud: FakeCloud,
    pub executor: RetryExecutor,
    pub poller: Poller,
    pub tags: TagSynchronizer<FakeCloud>,
}

#[allow(dead_code)]
impl VpnGatewayAdapter {
    pub fn new(cloud: FakeCloud) -> Self {
        let executor = RetryExecutor::new(test_budgets());
        Self {
            tags: TagSynchronizer::new(cloud.clone(), executor.clone()).with_page_limit(2),
            poller: Poller::new(),
            executor,
            cloud,
        }
    }

    pub fn address(id: &str) -> ResourceAddress {
        ResourceAddress::new("vpc", "vpngw", REGION, id)
    }

    pub async fn create(&self, name: &str, tags: &TagSet) -> Result<String> {
        let cloud = &self.cloud;
        let id = self
            .executor
            .execute(RemoteCall::write("CreateVpnGateway", move || {
                cloud.create_vpn_gateway(name)
            }))
            .await?;

        let id_ref = id.as_str();
        let budget = self.executor.budgets().poll(self.executor.budgets().write.timeout);
        self.poller
            .wait_for_state(
                "CreateVpnGateway",
                &["PENDING"],
                &["AVAILABLE"],
                &budget,
                move || async move {
                    cloud.describe_vpn_gateway(id_ref).await.map(|found| {
                        found.map(|gw| {
                            let status = gw.status.clone();
                            (gw, status)
                        })
                    })
                },
            )
            .await?;

        if !tags.is_empty() {
            self.tags.sync(&Self::address(&id), tags).await?;
        }
        Ok(id)
    }

    pub async fn read(&self, id: &str) -> Result<Option<(VpnGateway, TagSet)>> {
        let cloud = &self.cloud;
        let gateway = self
            .executor
            .execute(RemoteCall::read("DescribeVpnGateways", move || {
                cloud.describe_vpn_gateway(id)
            }))
            .await?;
        let Some(gateway) = gateway else {
            return Ok(None);
        };
        let tags = self.tags.read(&Self::address(id)).await?;
        Ok(Some((gateway, tags)))
    }

    /// Update path: diff old configuration against new, no read-back
    pub async fn update_tags(&self, id: &str, old: &TagSet, new: &TagSet) -> Result<TagDiff> {
        let changes = diff(new, old);
        self.tags.apply(&Self::address(id), &changes).await?;
        Ok(changes)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let cloud = &self.cloud;
        self.executor
            .execute(RemoteCall::write("DeleteVpnGateway", move || {
                cloud.delete_vpn_gateway(id)
            }))
            .await?;

        let budget = self.executor.budgets().poll(self.executor.budgets().read.timeout);
        self.poller
            .wait_for_deletion("DeleteVpnGateway", &budget, move || {
                cloud.describe_vpn_gateway(id)
            })
            .await
    }

    /// Attach a customer gateway; the connection is tracked under a composite id
    pub async fn connect(&self, gateway_id: &str, customer_gateway_id: &str) -> Result<String> {
        let cloud = &self.cloud;
        self.executor
            .execute(RemoteCall::write("CreateVpnConnection", move || {
                cloud.create_vpn_connection(gateway_id, customer_gateway_id)
            }))
            .await?;
        IdCodec::field().encode(&[gateway_id, customer_gateway_id])
    }

    pub async fn read_connection(&self, id: &str) -> Result<Option<VpnConnection>> {
        let [gateway_id, customer_gateway_id] = IdCodec::field().decode_array::<2>(id)?;
        let cloud = &self.cloud;
        let (gateway_id, customer_gateway_id) = (gateway_id.as_str(), customer_gateway_id.as_str());
        self.executor
            .execute(RemoteCall::read("DescribeVpnConnections", move || {
                cloud.describe_vpn_connection(gateway_id, customer_gateway_id)
            }))
            .await
    }
}
