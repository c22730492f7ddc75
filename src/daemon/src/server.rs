use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;

use crate::app::get_app;
use crate::supervisor::Supervisor;

pub struct DaemonServer {
    supervisor: Arc<Supervisor>,
    listener: TcpListener,
}

impl DaemonServer {
    pub async fn bind(supervisor: Supervisor, addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            supervisor: Arc::new(supervisor),
            listener,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        info!(addr = %self.listener.local_addr()?, "serving");
        axum::serve(self.listener, get_app(self.supervisor)).await?;
        Ok(())
    }
}
