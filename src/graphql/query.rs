//! Query root
//!
//! Fields backed by collection endpoints accept an optional identifying
//! argument: when present the resolver performs a single-item fetch and
//! wraps it (or returns it directly for singular fields); when absent it
//! calls the listing endpoint.
//!
//! Every field that touches the control plane is nullable: a failed
//! resolver reports its error per-field and resolves to null instead of
//! nulling out sibling fields.

use super::types::*;
use super::{decode, decode_list, GqlResult};
use crate::cloudapi::CloudApi;
use crate::handlers;
use crate::handlers::machines::{as_list, ListMachines};
use async_graphql::{Context, Object, Result, ID};

pub struct Query;

#[Object(rename_fields = "snake_case")]
impl Query {
    /// The account the client is scoped to.
    async fn account(&self, ctx: &Context<'_>) -> Result<Option<Account>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::account::account(client).await.gql()?,
        )?))
    }

    async fn keys(&self, ctx: &Context<'_>, name: Option<String>) -> Result<Option<Vec<Key>>> {
        let client = ctx.data::<CloudApi>()?;
        let keys = handlers::account::keys(client, None, name.as_deref())
            .await
            .gql()?;

        Ok(Some(decode_list(keys)?))
    }

    async fn key(&self, ctx: &Context<'_>, name: String) -> Result<Option<Key>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::account::key(client, None, &name).await.gql()?,
        )?))
    }

    async fn users(&self, ctx: &Context<'_>, id: Option<ID>) -> Result<Option<Vec<User>>> {
        let client = ctx.data::<CloudApi>()?;
        let users = handlers::account::users(client, id.as_ref().map(|id| id.as_str()))
            .await
            .gql()?;

        Ok(Some(decode_list(users)?))
    }

    async fn user(&self, ctx: &Context<'_>, id: ID) -> Result<Option<User>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::account::user(client, id.as_str()).await.gql()?,
        )?))
    }

    async fn roles(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        name: Option<String>,
    ) -> Result<Option<Vec<Role>>> {
        let client = ctx.data::<CloudApi>()?;
        let roles =
            handlers::account::roles(client, id.as_ref().map(|id| id.as_str()), name.as_deref())
                .await
                .gql()?;

        Ok(Some(decode_list(roles)?))
    }

    async fn role(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        name: Option<String>,
    ) -> Result<Option<Role>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::account::role(client, id.as_ref().map(|id| id.as_str()), name.as_deref())
                .await
                .gql()?,
        )?))
    }

    async fn policies(&self, ctx: &Context<'_>, id: Option<ID>) -> Result<Option<Vec<Policy>>> {
        let client = ctx.data::<CloudApi>()?;
        let policies = handlers::account::policies(client, id.as_ref().map(|id| id.as_str()))
            .await
            .gql()?;

        Ok(Some(decode_list(policies)?))
    }

    async fn policy(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Policy>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::account::policy(client, id.as_str()).await.gql()?,
        )?))
    }

    /// Account configuration as name-value pairs.
    async fn config(&self, ctx: &Context<'_>) -> Result<Option<Vec<NameValue>>> {
        let client = ctx.data::<CloudApi>()?;
        let config = handlers::misc::config(client).await.gql()?;

        Ok(Some(config.into_iter().map(NameValue::from).collect()))
    }

    async fn datacenters(&self, ctx: &Context<'_>) -> Result<Option<Vec<DataCenter>>> {
        let client = ctx.data::<CloudApi>()?;
        let datacenters = handlers::misc::datacenters(client).await.gql()?;

        Ok(Some(
            datacenters
                .into_iter()
                .map(|(name, url)| DataCenter::from_entry(name, url))
                .collect(),
        ))
    }

    async fn datacenter(&self, ctx: &Context<'_>, name: String) -> Result<Option<DataCenter>> {
        let client = ctx.data::<CloudApi>()?;
        let datacenter = handlers::misc::datacenter(client, &name).await.gql()?;

        Ok(datacenter.map(|(name, url)| DataCenter::from_entry(name, url)))
    }

    /// Datacenter service endpoints as name-value pairs.
    async fn services(&self, ctx: &Context<'_>) -> Result<Option<Vec<NameValue>>> {
        let client = ctx.data::<CloudApi>()?;
        let services = handlers::misc::services(client).await.gql()?;

        Ok(Some(services.into_iter().map(NameValue::from).collect()))
    }

    async fn images(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        name: Option<String>,
        os: Option<String>,
        state: Option<String>,
        #[graphql(name = "type")] type_: Option<String>,
    ) -> Result<Option<Vec<Image>>> {
        let client = ctx.data::<CloudApi>()?;

        if let Some(id) = id {
            let image = handlers::images::image(client, id.as_str(), false)
                .await
                .gql()?;
            return match image {
                Some(image) => Ok(Some(vec![decode(image)?])),
                None => Ok(Some(Vec::new())),
            };
        }

        let images = handlers::images::images(
            client,
            handlers::images::ListImages {
                name,
                os,
                state,
                type_,
            },
        )
        .await
        .gql()?;

        Ok(Some(decode_list(images)?))
    }

    async fn image(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Image>> {
        let client = ctx.data::<CloudApi>()?;
        let image = handlers::images::image(client, id.as_str(), false)
            .await
            .gql()?;

        match image {
            Some(image) => Ok(Some(decode(image)?)),
            None => Ok(None),
        }
    }

    async fn packages(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        name: Option<String>,
        version: Option<String>,
        memory: Option<u64>,
    ) -> Result<Option<Vec<Package>>> {
        let client = ctx.data::<CloudApi>()?;

        if let Some(reference) = id.as_ref().map(|id| id.to_string()).or(name.clone()) {
            let package = handlers::packages::package(client, &reference, true)
                .await
                .gql()?;
            return Ok(Some(vec![decode(package)?]));
        }

        let packages = handlers::packages::packages(
            client,
            handlers::packages::ListPackages {
                name,
                version,
                memory,
            },
        )
        .await
        .gql()?;

        Ok(Some(decode_list(packages)?))
    }

    async fn package(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        name: Option<String>,
    ) -> Result<Option<Package>> {
        let client = ctx.data::<CloudApi>()?;
        let reference = id
            .as_ref()
            .map(|id| id.to_string())
            .or(name)
            .unwrap_or_default();

        Ok(Some(decode(
            handlers::packages::package(client, &reference, true)
                .await
                .gql()?,
        )?))
    }

    /// Machines as a page. The total comes from an existence probe; a
    /// per-machine re-fetch happens only when the selection asks for
    /// fields the cheap listing lacks.
    #[allow(clippy::too_many_arguments)]
    async fn machines(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        brand: Option<String>,
        state: Option<String>,
        name: Option<String>,
        tags: Option<Vec<NameValueInput>>,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Option<Page<Machine>>> {
        let client = ctx.data::<CloudApi>()?;

        if let Some(id) = id {
            let machine = handlers::machines::machine(client, id.as_str()).await.gql()?;
            return Ok(Some(Page {
                offset: 0,
                limit: 0,
                total: 1,
                results: vec![decode(machine)?],
            }));
        }

        // over-fetch avoidance: only re-fetch per machine when dns_names
        // was actually selected
        let fetch_dns = ctx
            .look_ahead()
            .field("results")
            .field("dns_names")
            .exists();

        let page = handlers::machines::machines(
            client,
            ListMachines {
                brand,
                state,
                name,
                tags: input_pairs(tags),
                offset,
                limit,
                fetch_dns,
            },
        )
        .await
        .gql()?;

        Ok(Some(Page {
            offset: page.offset,
            limit: page.limit,
            total: page.total,
            results: decode_list(as_list(page.results))?,
        }))
    }

    async fn machine(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::machines::machine(client, id.as_str()).await.gql()?,
        )?))
    }

    async fn snapshots(
        &self,
        ctx: &Context<'_>,
        machine: ID,
        name: Option<String>,
    ) -> Result<Option<Vec<Snapshot>>> {
        let client = ctx.data::<CloudApi>()?;
        let snapshots = handlers::machines::snapshots(client, machine.as_str(), name.as_deref())
            .await
            .gql()?;

        Ok(Some(decode_list(snapshots)?))
    }

    async fn snapshot(
        &self,
        ctx: &Context<'_>,
        machine: ID,
        name: String,
    ) -> Result<Option<Snapshot>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::machines::snapshot(client, machine.as_str(), &name)
                .await
                .gql()?,
        )?))
    }

    async fn metadata(
        &self,
        ctx: &Context<'_>,
        machine: ID,
        name: Option<String>,
    ) -> Result<Option<Vec<NameValue>>> {
        let client = ctx.data::<CloudApi>()?;
        let metadata = handlers::machines::metadata(client, machine.as_str(), name.as_deref())
            .await
            .gql()?;

        Ok(Some(metadata.into_iter().map(NameValue::from).collect()))
    }

    async fn metadata_value(
        &self,
        ctx: &Context<'_>,
        machine: ID,
        name: String,
    ) -> Result<Option<NameValue>> {
        let client = ctx.data::<CloudApi>()?;
        let pair = handlers::machines::metadata_value(client, machine.as_str(), &name)
            .await
            .gql()?;

        Ok(Some(NameValue::from(pair)))
    }

    async fn tags(
        &self,
        ctx: &Context<'_>,
        machine: ID,
        name: Option<String>,
    ) -> Result<Option<Vec<NameValue>>> {
        let client = ctx.data::<CloudApi>()?;
        let tags = handlers::machines::tags(client, machine.as_str(), name.as_deref())
            .await
            .gql()?;

        Ok(Some(tags.into_iter().map(NameValue::from).collect()))
    }

    async fn tag(&self, ctx: &Context<'_>, machine: ID, name: String) -> Result<Option<NameValue>> {
        let client = ctx.data::<CloudApi>()?;
        let pair = handlers::machines::tag(client, machine.as_str(), &name)
            .await
            .gql()?;

        Ok(Some(NameValue::from(pair)))
    }

    /// A machine's audit trail.
    async fn actions(&self, ctx: &Context<'_>, machine: ID) -> Result<Option<Vec<Action>>> {
        let client = ctx.data::<CloudApi>()?;
        let actions = handlers::machines::actions(client, machine.as_str())
            .await
            .gql()?;

        Ok(Some(decode_list(actions)?))
    }

    async fn firewall_rules(
        &self,
        ctx: &Context<'_>,
        machine: Option<ID>,
        id: Option<ID>,
    ) -> Result<Option<Vec<FirewallRule>>> {
        let client = ctx.data::<CloudApi>()?;
        let rules = handlers::firewall::firewall_rules(
            client,
            machine.as_ref().map(|machine| machine.as_str()),
            id.as_ref().map(|id| id.as_str()),
        )
        .await
        .gql()?;

        Ok(Some(decode_list(rules)?))
    }

    async fn firewall_rule(&self, ctx: &Context<'_>, id: ID) -> Result<Option<FirewallRule>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::firewall::firewall_rule(client, id.as_str())
                .await
                .gql()?,
        )?))
    }

    /// Rules that would apply to a machine created with the given tags,
    /// evaluated locally against the rule grammar.
    async fn firewall_rules_create_machine(
        &self,
        ctx: &Context<'_>,
        tags: Option<Vec<NameValueInput>>,
    ) -> Result<Option<Vec<FirewallRule>>> {
        let client = ctx.data::<CloudApi>()?;
        let tag_map = handlers::machines::tag_map(input_pairs(tags));

        let rules = handlers::firewall::rules_for_create_machine(client, &tag_map)
            .await
            .gql()?;

        Ok(Some(decode_list(rules)?))
    }

    async fn vlans(&self, ctx: &Context<'_>, id: Option<i64>) -> Result<Option<Vec<Vlan>>> {
        let client = ctx.data::<CloudApi>()?;
        let vlans = handlers::networks::vlans(client, id).await.gql()?;

        Ok(Some(decode_list(vlans)?))
    }

    async fn vlan(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Vlan>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::networks::vlan(client, id).await.gql()?,
        )?))
    }

    async fn networks(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        vlan: Option<i64>,
    ) -> Result<Option<Vec<Network>>> {
        let client = ctx.data::<CloudApi>()?;
        let networks = handlers::networks::networks(client, id.as_ref().map(|id| id.as_str()), vlan)
            .await
            .gql()?;

        Ok(Some(decode_list(networks)?))
    }

    async fn network(
        &self,
        ctx: &Context<'_>,
        id: ID,
        vlan: Option<i64>,
    ) -> Result<Option<Network>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::networks::network(client, id.as_str(), vlan)
                .await
                .gql()?,
        )?))
    }

    async fn nics(
        &self,
        ctx: &Context<'_>,
        machine: ID,
        mac: Option<String>,
    ) -> Result<Option<Vec<Nic>>> {
        let client = ctx.data::<CloudApi>()?;
        let nics = handlers::machines::nics(client, machine.as_str(), mac.as_deref())
            .await
            .gql()?;

        Ok(Some(decode_list(nics)?))
    }

    async fn nic(&self, ctx: &Context<'_>, machine: ID, mac: String) -> Result<Option<Nic>> {
        let client = ctx.data::<CloudApi>()?;
        Ok(Some(decode(
            handlers::machines::nic(client, machine.as_str(), &mac)
                .await
                .gql()?,
        )?))
    }
}
