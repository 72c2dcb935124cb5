//! GraphQL object types
//!
//! Entities are remote-owned: each struct deserializes straight from the
//! control-plane JSON and exposes the GraphQL shape on top. Child fields
//! that need further REST calls delegate to the top-level handlers so path
//! construction lives in one place.

use super::{decode, decode_list, GqlResult};
use crate::cloudapi::CloudApi;
use crate::codec::{self, NameValuePair};
use crate::fanout;
use crate::fwrule;
use crate::handlers;
use async_graphql::{ComplexObject, Context, Enum, InputObject, ID};
use async_graphql::{OutputType, Result, SimpleObject};
use serde::Deserialize;
use serde_json::{Map, Value};

/// A map entry materialized for list representation. The id is derived
/// from the pair content, so equal entries keep a stable identity across
/// calls.
#[derive(Debug, Clone, SimpleObject)]
pub struct NameValue {
    pub id: ID,
    pub name: String,
    pub value: String,
}

impl From<NameValuePair> for NameValue {
    fn from(pair: NameValuePair) -> Self {
        Self {
            id: ID(pair.id),
            name: pair.name,
            value: render_value(&pair.value),
        }
    }
}

/// Map entry supplied by the caller (tags, metadata). A missing value
/// means "any value" for predicate-style uses.
#[derive(Debug, Clone, InputObject)]
pub struct NameValueInput {
    pub name: String,
    pub value: Option<String>,
}

/// Fold input pairs into the (name, value) shape the codec folds.
pub fn input_pairs(inputs: Option<Vec<NameValueInput>>) -> Vec<(String, Value)> {
    inputs
        .unwrap_or_default()
        .into_iter()
        .map(|pair| {
            let value = pair.value.map(Value::String).unwrap_or(Value::Null);
            (pair.name, value)
        })
        .collect()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn uppercase(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|v| v.to_uppercase())
}

/// One page of a listing. `total` reflects the resource count independent
/// of `results.len()`.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(concrete(name = "MachinePage", params(Machine)))]
pub struct Page<T: OutputType> {
    pub offset: u64,
    pub limit: u64,
    pub total: u64,
    pub results: Vec<T>,
}

// =========================================================================
// Identity
// =========================================================================

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct Account {
    pub id: Option<ID>,
    pub login: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "companyName")]
    pub company_name: Option<String>,
    #[serde(default, rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub triton_cns_enabled: Option<bool>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
pub struct Key {
    pub name: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex, rename_fields = "snake_case")]
pub struct User {
    pub id: Option<ID>,
    pub login: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "companyName")]
    pub company_name: Option<String>,
    #[serde(default, rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

#[ComplexObject(rename_fields = "snake_case")]
impl User {
    /// Keys registered under this sub-user.
    async fn keys(&self, ctx: &Context<'_>, name: Option<String>) -> Result<Option<Vec<Key>>> {
        let client = ctx.data::<CloudApi>()?;
        let user = self.login.as_deref();

        let keys = handlers::account::keys(client, user, name.as_deref())
            .await
            .gql()?;

        Ok(Some(decode_list(keys)?))
    }
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct Role {
    pub id: Option<ID>,
    pub name: Option<String>,
    #[serde(default)]
    pub policies: Option<Vec<String>>,
    #[serde(default)]
    pub members: Option<Vec<String>>,
    #[serde(default)]
    pub default_members: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
pub struct Policy {
    pub id: Option<ID>,
    pub name: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Datacenter entry from the listing, with a coarse region derived from
/// the name.
#[derive(Debug, Clone, SimpleObject)]
pub struct DataCenter {
    pub name: String,
    pub place: String,
    pub url: String,
}

impl DataCenter {
    pub fn from_entry(name: String, url: String) -> Self {
        let place = handlers::misc::datacenter_place(&name).to_string();
        Self { name, place, url }
    }
}

// =========================================================================
// Compute
// =========================================================================

#[derive(Debug, Clone, Deserialize, SimpleObject)]
pub struct Package {
    pub id: Option<ID>,
    pub name: Option<String>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub disk: Option<u64>,
    #[serde(default)]
    pub swap: Option<u64>,
    #[serde(default)]
    pub vcpus: Option<u64>,
    #[serde(default)]
    pub lwps: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex, rename_fields = "snake_case")]
pub struct Image {
    pub id: ID,
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    #[graphql(skip)]
    pub os: Option<String>,
    #[serde(default)]
    #[graphql(skip)]
    pub state: Option<String>,
    #[serde(default, rename = "type")]
    #[graphql(skip)]
    pub type_: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub files: Option<Vec<ImageFile>>,
    #[serde(default)]
    pub error: Option<ImageError>,
    #[serde(default)]
    #[graphql(skip)]
    pub tags: Option<Map<String, Value>>,
}

#[ComplexObject(rename_fields = "snake_case")]
impl Image {
    async fn os(&self) -> Option<String> {
        uppercase(&self.os)
    }

    async fn state(&self) -> Option<String> {
        uppercase(&self.state)
    }

    /// Image type, normalized to an enum-style value (`zone-dataset`
    /// becomes `ZONE_DATASET`).
    #[graphql(name = "type")]
    async fn type_(&self) -> Option<String> {
        self.type_
            .as_ref()
            .map(|t| t.replace('-', "_").to_uppercase())
    }

    async fn tags(&self) -> Vec<NameValue> {
        codec::to_name_values(self.tags.as_ref())
            .into_iter()
            .map(NameValue::from)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct ImageFile {
    #[serde(default)]
    #[graphql(skip)]
    pub compression: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[ComplexObject]
impl ImageFile {
    async fn compression(&self) -> Option<String> {
        uppercase(&self.compression)
    }
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct ImageError {
    #[serde(default)]
    #[graphql(skip)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[ComplexObject]
impl ImageError {
    async fn code(&self) -> Option<String> {
        uppercase(&self.code)
    }
}

/// Export target returned by an image export.
#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ImageExport {
    #[serde(default)]
    pub manta_url: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub manifest_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex, rename_fields = "snake_case")]
pub struct Machine {
    pub id: ID,
    pub name: Option<String>,
    #[serde(default)]
    #[graphql(skip)]
    pub brand: Option<String>,
    #[serde(default)]
    #[graphql(skip)]
    pub state: Option<String>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub disk: Option<u64>,
    #[serde(default)]
    pub ips: Option<Vec<String>>,
    #[serde(default, rename = "primaryIp")]
    pub primary_ip: Option<String>,
    #[serde(default)]
    pub firewall_enabled: Option<bool>,
    #[serde(default)]
    pub compute_node: Option<String>,
    #[serde(default)]
    pub dns_names: Option<Vec<String>>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    #[graphql(skip)]
    pub image: Option<String>,
    #[serde(default)]
    #[graphql(skip)]
    pub package: Option<String>,
    #[serde(default)]
    #[graphql(skip)]
    pub networks: Option<Vec<String>>,
    #[serde(default)]
    #[graphql(skip)]
    pub tags: Option<Map<String, Value>>,
    #[serde(default)]
    #[graphql(skip)]
    pub metadata: Option<Map<String, Value>>,
}

#[ComplexObject(rename_fields = "snake_case")]
impl Machine {
    async fn brand(&self) -> Option<String> {
        uppercase(&self.brand)
    }

    async fn state(&self) -> Option<String> {
        uppercase(&self.state)
    }

    /// The machine's image. lx-brand machines may reference an image the
    /// catalog no longer resolves; those lookups fall back to null.
    async fn image(&self, ctx: &Context<'_>) -> Result<Option<Image>> {
        let client = ctx.data::<CloudApi>()?;
        let Some(id) = &self.image else {
            return Ok(None);
        };

        let lx_fallback = self.brand.as_deref() == Some("lx");
        match handlers::images::image(client, id, lx_fallback).await.gql()? {
            Some(raw) => Ok(Some(decode(raw)?)),
            None => Ok(None),
        }
    }

    /// The machine's package, best-effort: a retired package resolves to
    /// an empty object.
    async fn package(&self, ctx: &Context<'_>) -> Result<Option<Package>> {
        let client = ctx.data::<CloudApi>()?;
        let Some(name) = &self.package else {
            return Ok(None);
        };

        let raw = handlers::packages::package(client, name, true).await.gql()?;
        Ok(Some(decode(raw)?))
    }

    /// Networks the machine is attached to, resolved per id in listing
    /// order.
    async fn networks(&self, ctx: &Context<'_>) -> Result<Option<Vec<Network>>> {
        let client = ctx.data::<CloudApi>()?;
        let ids = self.networks.clone().unwrap_or_default();

        let networks = fanout::try_map_ordered(ids, client.concurrency(), |id| {
            let client = client.clone();
            async move { handlers::networks::network(&client, &id, None).await }
        })
        .await
        .gql()?;

        Ok(Some(decode_list(networks)?))
    }

    async fn tags(
        &self,
        ctx: &Context<'_>,
        name: Option<String>,
    ) -> Result<Option<Vec<NameValue>>> {
        let client = ctx.data::<CloudApi>()?;

        let tags = handlers::machines::tags(client, self.id.as_str(), name.as_deref())
            .await
            .gql()?;

        Ok(Some(tags.into_iter().map(NameValue::from).collect()))
    }

    /// Metadata entries. The full-machine representation already carries
    /// the map; the extra fetch only happens for filtered lookups or list
    /// items.
    async fn metadata(
        &self,
        ctx: &Context<'_>,
        name: Option<String>,
    ) -> Result<Option<Vec<NameValue>>> {
        if name.is_none() {
            if let Some(map) = &self.metadata {
                return Ok(Some(
                    codec::to_name_values(Some(map))
                        .into_iter()
                        .map(NameValue::from)
                        .collect(),
                ));
            }
        }

        let client = ctx.data::<CloudApi>()?;
        let metadata = handlers::machines::metadata(client, self.id.as_str(), name.as_deref())
            .await
            .gql()?;

        Ok(Some(metadata.into_iter().map(NameValue::from).collect()))
    }

    async fn snapshots(
        &self,
        ctx: &Context<'_>,
        name: Option<String>,
    ) -> Result<Option<Vec<Snapshot>>> {
        let client = ctx.data::<CloudApi>()?;

        let snapshots = handlers::machines::snapshots(client, self.id.as_str(), name.as_deref())
            .await
            .gql()?;

        Ok(Some(decode_list(snapshots)?))
    }

    async fn firewall_rules(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
    ) -> Result<Option<Vec<FirewallRule>>> {
        let client = ctx.data::<CloudApi>()?;

        let rules = handlers::firewall::firewall_rules(
            client,
            Some(self.id.as_str()),
            id.as_ref().map(|id| id.as_str()),
        )
        .await
        .gql()?;

        Ok(Some(decode_list(rules)?))
    }

    async fn actions(&self, ctx: &Context<'_>) -> Result<Option<Vec<Action>>> {
        let client = ctx.data::<CloudApi>()?;

        let actions = handlers::machines::actions(client, self.id.as_str())
            .await
            .gql()?;

        Ok(Some(decode_list(actions)?))
    }
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Snapshot {
    pub name: String,
    #[serde(default)]
    #[graphql(skip)]
    pub state: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

#[ComplexObject]
impl Snapshot {
    /// Snapshots have no control-plane id; derive one from the name.
    async fn id(&self) -> ID {
        ID(codec::hash_id(&self.name))
    }

    async fn state(&self) -> Option<String> {
        uppercase(&self.state)
    }
}

/// One entry of a machine's audit trail.
#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Action {
    #[serde(default)]
    #[graphql(skip)]
    pub action: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub success: Option<String>,
    #[serde(default)]
    pub caller: Option<Caller>,
    #[serde(default)]
    #[graphql(skip)]
    pub parameters: Option<Map<String, Value>>,
}

#[ComplexObject]
impl Action {
    async fn name(&self) -> Option<String> {
        self.action.clone()
    }

    async fn parameters(&self) -> Vec<NameValue> {
        codec::to_name_values(self.parameters.as_ref())
            .into_iter()
            .map(NameValue::from)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex, rename_fields = "snake_case")]
pub struct Caller {
    #[serde(default, rename = "type")]
    #[graphql(skip)]
    pub type_: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default, rename = "keyId")]
    pub key_id: Option<String>,
}

#[ComplexObject(rename_fields = "snake_case")]
impl Caller {
    #[graphql(name = "type")]
    async fn type_(&self) -> Option<String> {
        uppercase(&self.type_)
    }
}

// =========================================================================
// Networking
// =========================================================================

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex, rename_fields = "snake_case")]
pub struct Network {
    pub id: ID,
    pub name: Option<String>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub fabric: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub provision_start_ip: Option<String>,
    #[serde(default)]
    pub provision_end_ip: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub resolvers: Option<Vec<String>>,
    #[serde(default)]
    pub internet_nat: Option<bool>,
    #[serde(default)]
    pub vlan_id: Option<i64>,
}

#[ComplexObject(rename_fields = "snake_case")]
impl Network {
    /// Machines attached to this network. Only fabric networks expose
    /// membership.
    async fn machines(&self, ctx: &Context<'_>) -> Result<Option<Vec<Machine>>> {
        if self.fabric != Some(true) {
            return Ok(Some(Vec::new()));
        }

        let client = ctx.data::<CloudApi>()?;
        let machines = handlers::networks::network_machines(client, self.id.as_str())
            .await
            .gql()?;

        Ok(Some(decode_list(machines)?))
    }
}

/// Fabric VLAN.
#[derive(Debug, Clone, Deserialize, SimpleObject)]
pub struct Vlan {
    #[serde(rename = "vlan_id")]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex, rename_fields = "snake_case")]
pub struct Nic {
    pub mac: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub primary: Option<bool>,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    #[graphql(skip)]
    pub network: Option<String>,
}

#[ComplexObject(rename_fields = "snake_case")]
impl Nic {
    async fn network(&self, ctx: &Context<'_>) -> Result<Option<Network>> {
        let client = ctx.data::<CloudApi>()?;
        let Some(id) = &self.network else {
            return Ok(None);
        };

        let network = handlers::networks::network(client, id, None).await.gql()?;
        Ok(Some(decode(network)?))
    }
}

// =========================================================================
// Firewall
// =========================================================================

#[derive(Debug, Clone, Deserialize, SimpleObject)]
#[graphql(complex, rename_fields = "snake_case")]
pub struct FirewallRule {
    pub id: ID,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub global: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[graphql(skip)]
    pub rule: Option<String>,
}

#[ComplexObject(rename_fields = "snake_case")]
impl FirewallRule {
    /// The raw rule text.
    async fn rule_str(&self) -> Option<String> {
        self.rule.clone()
    }

    /// Structured form of the rule, recomputed from the raw text on each
    /// read.
    async fn rule_obj(&self) -> Result<Option<ParsedFirewallRule>> {
        let Some(rule) = &self.rule else {
            return Ok(None);
        };

        let parsed = fwrule::parse(rule)
            .map_err(|err| async_graphql::Error::new(format!("invalid firewall rule: {err}")))?;

        Ok(Some(<ParsedFirewallRule as From<fwrule::ParsedRule>>::from(
            parsed,
        )))
    }

    /// Machines the control plane reports as affected by this rule.
    async fn machines(&self, ctx: &Context<'_>) -> Result<Option<Vec<Machine>>> {
        let client = ctx.data::<CloudApi>()?;

        let machines = handlers::firewall::machines(client, self.id.as_str())
            .await
            .gql()?;

        Ok(Some(decode_list(machines)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum RuleAction {
    Allow,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum RuleProtocol {
    Tcp,
    Udp,
    Icmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum RuleTargetKind {
    Wildcard,
    Vm,
    Ip,
    Subnet,
    Tag,
}

/// A source or destination term of a parsed rule.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct RuleTarget {
    pub kind: RuleTargetKind,
    /// vm uuid, ip address, subnet cidr, tag name, or the wildcard form.
    pub value: Option<String>,
    /// Tag value for valued tag terms.
    pub tag_value: Option<String>,
}

impl From<&fwrule::Target> for RuleTarget {
    fn from(target: &fwrule::Target) -> Self {
        match target {
            fwrule::Target::Wildcard(fwrule::Wildcard::Any) => Self {
                kind: RuleTargetKind::Wildcard,
                value: Some("any".to_string()),
                tag_value: None,
            },
            fwrule::Target::Wildcard(fwrule::Wildcard::AllVms) => Self {
                kind: RuleTargetKind::Wildcard,
                value: Some("all vms".to_string()),
                tag_value: None,
            },
            fwrule::Target::Vm(id) => Self {
                kind: RuleTargetKind::Vm,
                value: Some(id.clone()),
                tag_value: None,
            },
            fwrule::Target::Ip(ip) => Self {
                kind: RuleTargetKind::Ip,
                value: Some(ip.clone()),
                tag_value: None,
            },
            fwrule::Target::Subnet(cidr) => Self {
                kind: RuleTargetKind::Subnet,
                value: Some(cidr.clone()),
                tag_value: None,
            },
            fwrule::Target::Tag { name, value } => Self {
                kind: RuleTargetKind::Tag,
                value: Some(name.clone()),
                tag_value: value.clone(),
            },
        }
    }
}

/// Tag predicate extracted from a rule.
#[derive(Debug, Clone, SimpleObject)]
pub struct TagMatch {
    pub name: String,
    pub value: Option<String>,
}

/// Structured form of a firewall rule. Derived, never stored.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(rename_fields = "snake_case")]
pub struct ParsedFirewallRule {
    pub from: Vec<RuleTarget>,
    pub to: Vec<RuleTarget>,
    pub action: RuleAction,
    pub protocol: RuleProtocol,
    /// Matched ports; empty when the rule covers all ports.
    pub ports: Vec<u16>,
    pub all_ports: bool,
    pub is_wildcard: bool,
    pub tags: Vec<TagMatch>,
}

impl From<fwrule::ParsedRule> for ParsedFirewallRule {
    fn from(rule: fwrule::ParsedRule) -> Self {
        let is_wildcard = rule.is_wildcard();
        let tags = rule
            .tags()
            .into_iter()
            .map(|predicate| TagMatch {
                name: predicate.name,
                value: predicate.value,
            })
            .collect();

        let (ports, all_ports) = match &rule.ports {
            fwrule::Ports::All => (Vec::new(), true),
            fwrule::Ports::List(ports) => (ports.clone(), false),
        };

        Self {
            from: rule.from.iter().map(RuleTarget::from).collect(),
            to: rule.to.iter().map(RuleTarget::from).collect(),
            action: match rule.action {
                fwrule::Action::Allow => RuleAction::Allow,
                fwrule::Action::Block => RuleAction::Block,
            },
            protocol: match rule.protocol {
                fwrule::Protocol::Tcp => RuleProtocol::Tcp,
                fwrule::Protocol::Udp => RuleProtocol::Udp,
                fwrule::Protocol::Icmp => RuleProtocol::Icmp,
            },
            ports,
            all_ports,
            is_wildcard,
            tags,
        }
    }
}
