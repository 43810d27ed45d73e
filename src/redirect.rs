//! Dashboard redirect targets per chain.

/// Known dashboard hosts by chain id.
const DASHBOARD_HOSTS: &[(u64, &str)] = &[
    (1, "client.aragon.org"),
    (4, "rinkeby.client.aragon.org"),
    (100, "aragon.1hive.org"),
];

/// Maps a chain id to the dashboard that can display an organization.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectResolver;

impl RedirectResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn host(&self, chain_id: u64) -> Option<&'static str> {
        DASHBOARD_HOSTS
            .iter()
            .find(|(id, _)| *id == chain_id)
            .map(|(_, host)| *host)
    }

    /// Chain ids with a known dashboard.
    pub fn supported_chains(&self) -> impl Iterator<Item = u64> {
        DASHBOARD_HOSTS.iter().map(|(id, _)| *id)
    }

    /// Dashboard URL for an application inside an organization, if the
    /// chain has a known dashboard.
    pub fn try_resolve(
        &self,
        chain_id: Option<u64>,
        organization_address: &str,
        application_address: &str,
    ) -> Option<String> {
        let host = self.host(chain_id?)?;
        Some(format!(
            "https://{}/#/{}/{}",
            host, organization_address, application_address
        ))
    }

    /// Like [`try_resolve`](Self::try_resolve), with an empty string for
    /// unknown chains.
    pub fn resolve(
        &self,
        chain_id: Option<u64>,
        organization_address: &str,
        application_address: &str,
    ) -> String {
        self.try_resolve(chain_id, organization_address, application_address)
            .unwrap_or_default()
    }
}
