use std::net::SocketAddr;
use std::sync::Arc;

use ringstore_cluster::{
    create_topology_delegate, heal_queue, Coordinator, HealQueue, HealingEngine, Router,
    StaticRing, TopologyEvent, TopologyEvents,
};
use ringstore_store::{FileStoreFactory, InMemoryStoreFactory, Store, VnodeStoreFactory};
use ringstore_transport::{RpcServer, StoreTransport, TransportConfig};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// A RingStore node before it starts serving.
pub struct RingStoreNode {
    config: NodeConfig,
}

impl RingStoreNode {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Bind both listeners and bring every component up.
    ///
    /// An `rpc_addr` with port 0 binds an ephemeral port and advertises the
    /// bound address on the ring.
    pub async fn start(self) -> ServerResult<RunningNode> {
        let config = self.config;
        config.validate()?;

        let rpc_listener = TcpListener::bind(&config.rpc_addr).await?;
        let rpc_addr = rpc_listener.local_addr()?;
        let host = advertised_host(&config.rpc_addr, rpc_addr);

        let ring = Arc::new(StaticRing::new(
            config.members_with(&host).as_slice(),
            config.vnodes_per_host,
        ));
        let local_vnodes = ring.vnodes_of(&host);

        let factory: Box<dyn VnodeStoreFactory> = match &config.data_dir {
            Some(dir) => Box::new(FileStoreFactory::new(dir)),
            None => Box::new(InMemoryStoreFactory),
        };
        let transport = Arc::new(StoreTransport::new(TransportConfig {
            rpc_timeout: config.rpc_timeout(),
        }));
        let router = Router::new(factory.as_ref(), &local_vnodes, transport)?.with_local_host(&host);
        let router: Arc<dyn Store> = Arc::new(router);

        let (queue, requests) = heal_queue(config.heal_queue_capacity);
        let mut coordinator = Coordinator::new(ring.clone(), router.clone());
        if config.heal_on_inconsistent {
            coordinator = coordinator.with_heal_queue(queue.clone());
        }
        let coordinator = Arc::new(coordinator);

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        let engine = HealingEngine::new(coordinator.clone(), requests);
        tasks.push(tokio::spawn({
            let stop = stopped(stop_rx.clone());
            async move {
                engine.run(stop).await;
            }
        }));

        let (delegate, events) = create_topology_delegate(router.clone());
        tasks.push(tokio::spawn(delegate.run()));

        let rpc = RpcServer::new(router);
        tasks.push(tokio::spawn({
            let stop = stopped(stop_rx.clone());
            async move {
                if let Err(e) = rpc.serve(rpc_listener, stop).await {
                    warn!(error = %e, "rpc server failed");
                }
            }
        }));

        let http_listener = TcpListener::bind(config.http_addr).await?;
        let http_addr = http_listener.local_addr()?;
        let state = AppState::new(coordinator.clone(), config, local_vnodes.len());
        let app = build_router(state);
        tasks.push(tokio::spawn({
            let stop = stopped(stop_rx);
            async move {
                if let Err(e) = axum::serve(http_listener, app)
                    .with_graceful_shutdown(stop)
                    .await
                {
                    warn!(error = %e, "http server failed");
                }
            }
        }));

        info!(
            %host,
            %http_addr,
            ring_size = ring.len(),
            local_vnodes = local_vnodes.len(),
            "ringstore node started"
        );

        Ok(RunningNode {
            host,
            rpc_addr,
            http_addr,
            coordinator,
            events,
            heal_queue: queue,
            stop: stop_tx,
            tasks,
        })
    }
}

/// A node whose servers and background loops are running.
pub struct RunningNode {
    host: String,
    rpc_addr: SocketAddr,
    http_addr: SocketAddr,
    coordinator: Arc<Coordinator>,
    events: TopologyEvents,
    heal_queue: HealQueue,
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningNode {
    /// Identity of this node on the ring.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Handle the ring uses to report membership changes.
    pub fn topology_events(&self) -> TopologyEvents {
        self.events.clone()
    }

    pub fn heal_queue(&self) -> HealQueue {
        self.heal_queue.clone()
    }

    /// Stop serving, end the background loops and tear down the transport.
    pub async fn shutdown(self) -> ServerResult<()> {
        let _ = self.stop.send(true);
        self.events.send(TopologyEvent::Shutdown);
        for task in self.tasks {
            task.await
                .map_err(|e| ServerError::Internal(format!("node task panicked: {e}")))?;
        }
        self.coordinator.shutdown().await?;
        info!(host = %self.host, "ringstore node stopped");
        Ok(())
    }
}

fn advertised_host(configured: &str, bound: SocketAddr) -> String {
    match configured.parse::<SocketAddr>() {
        Ok(addr) if addr.port() == 0 => bound.to_string(),
        _ => configured.to_string(),
    }
}

/// Resolves once the stop flag is raised or its sender is gone.
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
