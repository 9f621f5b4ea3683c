use crate::config::StoreSettings;
use crate::discovery::{self, Discovery};
use crate::keys::KeySet;
use crate::proto::{
    provider_server::Provider as ProviderService, DiscoveryConfig, DiscoveryState, Exists,
    KeysState, ProviderConfig, ProviderSchema,
};
use crate::reconciler::{Reconciler, Reconciliation};
use crate::schema::provider_schema;
use crate::store::{EtcdStore, Store};
use crate::ProviderError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{info, info_span, warn};

/// The etcd provider served to the host.
///
/// `Configure` installs the store every key RPC works against. Discovery RPCs
/// need no configuration.
pub struct EtcdProvider {
    store: RwLock<Option<Arc<dyn Store>>>,
    discovery: Discovery,
}

impl EtcdProvider {
    pub fn new() -> crate::Result<Self> {
        Ok(Self {
            store: RwLock::new(None),
            discovery: Discovery::new()?,
        })
    }

    /// A provider already bound to `store`; `Configure` may still replace it.
    pub fn with_store(store: Arc<dyn Store>) -> crate::Result<Self> {
        Ok(Self {
            store: RwLock::new(Some(store)),
            discovery: Discovery::new()?,
        })
    }

    async fn store(&self) -> crate::Result<Arc<dyn Store>> {
        self.store
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotConfigured)
    }

    /// Apply pass for `etcd_keys`.
    pub async fn apply(&self, state: KeysState) -> crate::Result<KeysState> {
        let keys = KeySet::from_proto(state.keys)?;
        let store = self.store().await?;
        let span = info_span!("etcd_keys.apply", keys = keys.len());
        let result = Reconciler::new(store.as_ref(), span).apply(&keys).await?;
        Ok(into_state(result))
    }

    /// Refresh pass for `etcd_keys`; the identity is carried over unchanged.
    pub async fn refresh(&self, state: KeysState) -> crate::Result<KeysState> {
        let keys = KeySet::from_proto(state.keys)?;
        let store = self.store().await?;
        let span = info_span!("etcd_keys.read", keys = keys.len());
        let result = Reconciler::new(store.as_ref(), span).refresh(&keys).await?;
        Ok(KeysState {
            id: state.id,
            ..into_state(result)
        })
    }

    /// Destroy pass for `etcd_keys`; returns the state with its identity cleared.
    pub async fn destroy(&self, state: KeysState) -> crate::Result<KeysState> {
        let keys = KeySet::from_proto(state.keys)?;
        let store = self.store().await?;
        let span = info_span!("etcd_keys.destroy", keys = keys.len());
        Reconciler::new(store.as_ref(), span).destroy(&keys).await?;
        Ok(KeysState {
            id: String::new(),
            keys: keys.to_proto(),
            vars: HashMap::new(),
        })
    }
}

fn into_state(result: Reconciliation) -> KeysState {
    KeysState {
        id: result.id,
        keys: result.keys.to_proto(),
        vars: result.vars,
    }
}

#[tonic::async_trait]
impl ProviderService for EtcdProvider {
    async fn get_schema(
        &self,
        _request: Request<()>,
    ) -> Result<Response<ProviderSchema>, Status> {
        Ok(Response::new(provider_schema()))
    }

    async fn configure(&self, request: Request<ProviderConfig>) -> Result<Response<()>, Status> {
        let settings = StoreSettings::try_from(request.into_inner())?;
        let store = EtcdStore::new(&settings).map_err(|e| {
            ProviderError::Configuration(format!("Failed to create etcd client: {}", e))
        })?;

        let mut slot = self.store.write().await;
        if slot.is_some() {
            warn!("Replacing previously configured etcd store");
        }
        *slot = Some(Arc::new(store));

        info!("Configured etcd provider for {}", settings.endpoint);
        Ok(Response::new(()))
    }

    async fn stop(&self, _request: Request<()>) -> Result<Response<()>, Status> {
        info!("Stop requested; no operations are held open");
        Ok(Response::new(()))
    }

    async fn apply_keys(
        &self,
        request: Request<KeysState>,
    ) -> Result<Response<KeysState>, Status> {
        Ok(Response::new(self.apply(request.into_inner()).await?))
    }

    async fn read_keys(
        &self,
        request: Request<KeysState>,
    ) -> Result<Response<KeysState>, Status> {
        Ok(Response::new(self.refresh(request.into_inner()).await?))
    }

    async fn destroy_keys(
        &self,
        request: Request<KeysState>,
    ) -> Result<Response<KeysState>, Status> {
        Ok(Response::new(self.destroy(request.into_inner()).await?))
    }

    async fn create_discovery(
        &self,
        request: Request<DiscoveryConfig>,
    ) -> Result<Response<DiscoveryState>, Status> {
        let state = self.discovery.create(request.into_inner()).await?;
        Ok(Response::new(state))
    }

    async fn read_discovery(
        &self,
        request: Request<DiscoveryState>,
    ) -> Result<Response<DiscoveryState>, Status> {
        Ok(Response::new(discovery::read(request.into_inner())))
    }

    async fn discovery_exists(
        &self,
        request: Request<DiscoveryState>,
    ) -> Result<Response<Exists>, Status> {
        Ok(Response::new(Exists {
            exists: discovery::exists(request.get_ref()),
        }))
    }

    async fn delete_discovery(
        &self,
        request: Request<DiscoveryState>,
    ) -> Result<Response<DiscoveryState>, Status> {
        Ok(Response::new(discovery::delete(request.into_inner())))
    }
}
