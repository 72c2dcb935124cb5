//! Mutation root
//!
//! State-changing fields are two-phase: the handlers issue the mutating
//! call and re-fetch the affected entity, so the caller observes the
//! control plane's post-mutation state (possibly transitional, e.g.
//! "stopping"). Delete-type fields invert this and return the pre-deletion
//! snapshot.

use super::types::*;
use super::{decode_some, GqlResult};
use crate::cloudapi::CloudApi;
use crate::codec;
use crate::handlers;
use async_graphql::{Context, Enum, InputObject, Object, Result, ID};
use serde_json::{json, Value};

/// Placement preference for a new machine relative to existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum AffinityRuleType {
    MustEqual,
    ShouldEqual,
    MustNotEqual,
    ShouldNotEqual,
}

impl AffinityRuleType {
    fn operator(self) -> &'static str {
        match self {
            Self::MustEqual => "==",
            Self::ShouldEqual => "==~",
            Self::MustNotEqual => "!=",
            Self::ShouldNotEqual => "!=~",
        }
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct AffinityInput {
    pub key: String,
    pub value: String,
    #[graphql(name = "type")]
    pub type_: AffinityRuleType,
}

pub struct Mutation;

#[Object]
impl Mutation {
    async fn update_account(
        &self,
        ctx: &Context<'_>,
        email: Option<String>,
        company_name: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        phone: Option<String>,
        triton_cns_enabled: Option<bool>,
    ) -> Result<Option<Account>> {
        let client = ctx.data::<CloudApi>()?;
        let payload = json!({
            "email": email,
            "companyName": company_name,
            "firstName": first_name,
            "lastName": last_name,
            "phone": phone,
            "triton_cns_enabled": triton_cns_enabled,
        });

        decode_some(handlers::account::update_account(client, payload).await.gql()?)
    }

    async fn create_key(
        &self,
        ctx: &Context<'_>,
        user: Option<ID>,
        name: String,
        key: String,
    ) -> Result<Option<Key>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::account::create_key(
                client,
                user.as_ref().map(|user| user.as_str()),
                &name,
                &key,
            )
            .await
            .gql()?,
        )
    }

    async fn delete_key(
        &self,
        ctx: &Context<'_>,
        user: Option<ID>,
        name: Option<String>,
        fingerprint: Option<String>,
    ) -> Result<Option<Key>> {
        let client = ctx.data::<CloudApi>()?;
        let reference = name.or(fingerprint).unwrap_or_default();

        decode_some(
            handlers::account::delete_key(
                client,
                user.as_ref().map(|user| user.as_str()),
                &reference,
            )
            .await
            .gql()?,
        )
    }

    // =====================================================================
    // Machine lifecycle
    // =====================================================================

    async fn stop_machine(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(handlers::machines::stop_machine(client, id.as_str()).await.gql()?)
    }

    async fn start_machine(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(handlers::machines::start_machine(client, id.as_str()).await.gql()?)
    }

    async fn reboot_machine(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(handlers::machines::reboot_machine(client, id.as_str()).await.gql()?)
    }

    async fn resize_machine(
        &self,
        ctx: &Context<'_>,
        id: ID,
        package: String,
    ) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::resize_machine(client, id.as_str(), &package)
                .await
                .gql()?,
        )
    }

    async fn enable_machine_firewall(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::enable_machine_firewall(client, id.as_str())
                .await
                .gql()?,
        )
    }

    async fn disable_machine_firewall(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::disable_machine_firewall(client, id.as_str())
                .await
                .gql()?,
        )
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_machine(
        &self,
        ctx: &Context<'_>,
        name: Option<String>,
        package: ID,
        image: ID,
        networks: Option<Vec<ID>>,
        affinity: Option<Vec<AffinityInput>>,
        metadata: Option<Vec<NameValueInput>>,
        tags: Option<Vec<NameValueInput>>,
        firewall_enabled: Option<bool>,
    ) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;

        let mut payload = codec::from_name_values(input_pairs(tags), "tag.");
        payload.extend(codec::from_name_values(input_pairs(metadata), "metadata."));

        payload.insert("name".to_string(), json!(name));
        payload.insert("package".to_string(), json!(package.as_str()));
        payload.insert("image".to_string(), json!(image.as_str()));
        payload.insert(
            "networks".to_string(),
            json!(networks
                .unwrap_or_default()
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()),
        );
        payload.insert(
            "affinity".to_string(),
            json!(affinity
                .unwrap_or_default()
                .into_iter()
                .map(|rule| format!("{}{}{}", rule.key, rule.type_.operator(), rule.value))
                .collect::<Vec<_>>()),
        );
        payload.insert("firewall_enabled".to_string(), json!(firewall_enabled));

        decode_some(
            handlers::machines::create_machine(client, Value::Object(payload))
                .await
                .gql()?,
        )
    }

    async fn delete_machine(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(handlers::machines::delete_machine(client, id.as_str()).await.gql()?)
    }

    // =====================================================================
    // Snapshots
    // =====================================================================

    async fn create_machine_snapshot(
        &self,
        ctx: &Context<'_>,
        id: ID,
        name: String,
    ) -> Result<Option<Snapshot>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::create_machine_snapshot(client, id.as_str(), &name)
                .await
                .gql()?,
        )
    }

    async fn start_machine_from_snapshot(
        &self,
        ctx: &Context<'_>,
        id: ID,
        snapshot: String,
    ) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::start_machine_from_snapshot(client, id.as_str(), &snapshot)
                .await
                .gql()?,
        )
    }

    async fn delete_machine_snapshot(
        &self,
        ctx: &Context<'_>,
        id: ID,
        snapshot: String,
    ) -> Result<Option<Snapshot>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::delete_machine_snapshot(client, id.as_str(), &snapshot)
                .await
                .gql()?,
        )
    }

    // =====================================================================
    // Metadata and tags
    // =====================================================================

    async fn update_machine_metadata(
        &self,
        ctx: &Context<'_>,
        id: ID,
        metadata: Vec<NameValueInput>,
    ) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::update_machine_metadata(
                client,
                id.as_str(),
                input_pairs(Some(metadata)),
            )
            .await
            .gql()?,
        )
    }

    async fn delete_machine_metadata(
        &self,
        ctx: &Context<'_>,
        id: ID,
        name: String,
    ) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::delete_machine_metadata(client, id.as_str(), &name)
                .await
                .gql()?,
        )
    }

    async fn add_machine_tags(
        &self,
        ctx: &Context<'_>,
        id: ID,
        tags: Vec<NameValueInput>,
    ) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::add_machine_tags(client, id.as_str(), input_pairs(Some(tags)))
                .await
                .gql()?,
        )
    }

    async fn replace_machine_tags(
        &self,
        ctx: &Context<'_>,
        id: ID,
        tags: Vec<NameValueInput>,
    ) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::replace_machine_tags(client, id.as_str(), input_pairs(Some(tags)))
                .await
                .gql()?,
        )
    }

    async fn delete_machine_tag(&self, ctx: &Context<'_>, id: ID, name: String) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::delete_machine_tag(client, id.as_str(), &name)
                .await
                .gql()?,
        )
    }

    async fn delete_machine_tags(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Machine>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::delete_machine_tags(client, id.as_str())
                .await
                .gql()?,
        )
    }

    // =====================================================================
    // Images
    // =====================================================================

    #[allow(clippy::too_many_arguments)]
    async fn create_image_from_machine(
        &self,
        ctx: &Context<'_>,
        machine: ID,
        name: String,
        version: String,
        description: Option<String>,
        homepage: Option<String>,
        acl: Option<Vec<String>>,
        tags: Option<Vec<NameValueInput>>,
    ) -> Result<Option<Image>> {
        let client = ctx.data::<CloudApi>()?;
        let payload = json!({
            "machine": machine.as_str(),
            "name": name,
            "version": version,
            "description": description,
            "homepage": homepage,
            "acl": acl,
            "tags": Value::Object(codec::from_name_values(input_pairs(tags), "")),
        });

        decode_some(
            handlers::images::create_image_from_machine(client, payload)
                .await
                .gql()?,
        )
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_image(
        &self,
        ctx: &Context<'_>,
        id: ID,
        name: Option<String>,
        version: Option<String>,
        description: Option<String>,
        homepage: Option<String>,
        acl: Option<Vec<String>>,
        tags: Option<Vec<NameValueInput>>,
    ) -> Result<Option<Image>> {
        let client = ctx.data::<CloudApi>()?;
        let payload = json!({
            "name": name,
            "version": version,
            "description": description,
            "homepage": homepage,
            "acl": acl,
            "tags": Value::Object(codec::from_name_values(input_pairs(tags), "")),
        });

        decode_some(handlers::images::update_image(client, id.as_str(), payload).await.gql()?)
    }

    async fn delete_image(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Image>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(handlers::images::delete_image(client, id.as_str()).await.gql()?)
    }

    async fn export_image(
        &self,
        ctx: &Context<'_>,
        id: ID,
        manta_path: String,
    ) -> Result<Option<ImageExport>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::images::export_image(client, id.as_str(), &manta_path)
                .await
                .gql()?,
        )
    }

    // =====================================================================
    // Firewall rules
    // =====================================================================

    async fn create_firewall_rule(
        &self,
        ctx: &Context<'_>,
        rule: String,
        enabled: Option<bool>,
        description: Option<String>,
    ) -> Result<Option<FirewallRule>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::firewall::create_firewall_rule(
                client,
                enabled,
                &rule,
                description.as_deref(),
            )
            .await
            .gql()?,
        )
    }

    async fn update_firewall_rule(
        &self,
        ctx: &Context<'_>,
        id: ID,
        rule: Option<String>,
        enabled: Option<bool>,
        description: Option<String>,
    ) -> Result<Option<FirewallRule>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::firewall::update_firewall_rule(
                client,
                id.as_str(),
                enabled,
                rule.as_deref(),
                description.as_deref(),
            )
            .await
            .gql()?,
        )
    }

    async fn enable_firewall_rule(&self, ctx: &Context<'_>, id: ID) -> Result<Option<FirewallRule>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::firewall::enable_firewall_rule(client, id.as_str())
                .await
                .gql()?,
        )
    }

    async fn disable_firewall_rule(&self, ctx: &Context<'_>, id: ID) -> Result<Option<FirewallRule>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::firewall::disable_firewall_rule(client, id.as_str())
                .await
                .gql()?,
        )
    }

    async fn delete_firewall_rule(&self, ctx: &Context<'_>, id: ID) -> Result<Option<FirewallRule>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::firewall::delete_firewall_rule(client, id.as_str())
                .await
                .gql()?,
        )
    }

    // =====================================================================
    // Fabric VLANs and networks
    // =====================================================================

    async fn create_vlan(
        &self,
        ctx: &Context<'_>,
        id: i64,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Option<Vlan>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::networks::create_vlan(client, id, name.as_deref(), description.as_deref())
                .await
                .gql()?,
        )
    }

    async fn update_vlan(
        &self,
        ctx: &Context<'_>,
        id: i64,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Option<Vlan>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::networks::update_vlan(client, id, name.as_deref(), description.as_deref())
                .await
                .gql()?,
        )
    }

    async fn delete_vlan(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Vlan>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(handlers::networks::delete_vlan(client, id).await.gql()?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_network(
        &self,
        ctx: &Context<'_>,
        vlan: i64,
        name: String,
        subnet: String,
        provision_start_ip: String,
        provision_end_ip: String,
        gateway: Option<String>,
        resolvers: Option<Vec<String>>,
        description: Option<String>,
        internet_nat: Option<bool>,
    ) -> Result<Option<Network>> {
        let client = ctx.data::<CloudApi>()?;
        let payload = json!({
            "name": name,
            "subnet": subnet,
            "provision_start_ip": provision_start_ip,
            "provision_end_ip": provision_end_ip,
            "gateway": gateway,
            "resolvers": resolvers,
            "description": description,
            "internet_nat": internet_nat,
        });

        decode_some(handlers::networks::create_network(client, vlan, payload).await.gql()?)
    }

    async fn delete_network(&self, ctx: &Context<'_>, vlan: i64, id: ID) -> Result<Option<Network>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::networks::delete_network(client, vlan, id.as_str())
                .await
                .gql()?,
        )
    }

    // =====================================================================
    // Nics
    // =====================================================================

    async fn add_nic(&self, ctx: &Context<'_>, machine: ID, network: ID) -> Result<Option<Nic>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::add_nic(client, machine.as_str(), network.as_str())
                .await
                .gql()?,
        )
    }

    async fn remove_nic(&self, ctx: &Context<'_>, machine: ID, mac: String) -> Result<Option<Nic>> {
        let client = ctx.data::<CloudApi>()?;
        decode_some(
            handlers::machines::remove_nic(client, machine.as_str(), &mac)
                .await
                .gql()?,
        )
    }
}
