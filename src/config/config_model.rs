#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    /// `None` runs against the in-memory record store.
    pub database: Option<Database>,
    pub asaas: Asaas,
    pub reconcile: Reconcile,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// seconds
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Asaas {
    /// Fallback credential for requests that carry no `x-asaas-access-token`.
    pub access_token: Option<String>,
    pub api_version: String,
    pub sandbox: bool,
    /// Shared secret the gateway sends in `asaas-access-token` on callbacks.
    pub webhook_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Reconcile {
    pub page_size: u32,
    pub max_pages: Option<u32>,
}
