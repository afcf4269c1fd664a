//! Chat server on a turmoil host.
//!
//! Runs the production `serve_connection` loop over turmoil's simulated TCP,
//! with a `SimEnv`-backed network so the whole run replays from one seed.

use std::sync::Arc;

use chatline_core::ChatLimits;
use chatline_server::{
    ChatConnection, ChatState, ServerError, SharedState, UserDirectory, serve_connection,
};
use tokio::sync::Mutex;
use turmoil::net::{TcpListener, TcpStream};

use crate::SimEnv;

/// Port the simulated server listens on.
pub const SIM_SERVER_PORT: u16 = 7070;

/// Shared server state on a seeded environment with an in-memory directory.
pub fn create_shared_state(
    seed: u64,
    limits: ChatLimits,
) -> Result<SharedState<SimEnv>, ServerError> {
    let state = ChatState::bootstrap(SimEnv::with_seed(seed), limits, UserDirectory::in_memory())?;
    Ok(Arc::new(Mutex::new(state)))
}

/// Accept connections forever, serving each on its own task.
///
/// Meant as the body of `sim.host(..)`.
pub async fn run_sim_server(state: SharedState<SimEnv>) -> turmoil::Result {
    let listener = TcpListener::bind(("0.0.0.0", SIM_SERVER_PORT)).await?;

    loop {
        let (stream, addr) = listener.accept().await?;
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, addr.ip(), state).await {
                tracing::debug!(%addr, error = %e, "simulated connection failed");
            }
        });
    }
}

/// Connect to the simulated server on `host`.
pub async fn connect(host: &str) -> Result<ChatConnection<TcpStream>, ServerError> {
    let stream = TcpStream::connect((host, SIM_SERVER_PORT)).await?;
    Ok(ChatConnection::new(stream))
}
