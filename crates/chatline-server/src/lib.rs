//! Chatline production server.
//!
//! This crate exposes the chat contract network to remote clients using:
//! - Tokio for async runtime and TCP
//! - Length-prefixed CBOR frames (see `chatline_proto::codec`)
//! - A JSON user directory binding usernames to key aliases
//!
//! ## Architecture
//!
//! ```text
//! chatline-server
//!   ├─ SystemEnv       (production Environment impl)
//!   ├─ transport       (framed read/write over AsyncRead + AsyncWrite)
//!   ├─ ChatState       (Network + UserDirectory, request handling)
//!   └─ Server          (TCP accept loop)
//! ```
//!
//! Every connection shares one `ChatState` behind a `tokio::sync::Mutex`,
//! so requests are applied one at a time in arrival order.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
mod error;
mod system_env;
pub mod transport;

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use bytes::BytesMut;
use chatline_core::{ChatLimits, Environment, Network, proto::KeyAlias};
use chatline_proto::{ContractRef, MAX_FRAME_SIZE, Request, Response};
pub use directory::{DirectoryError, UserDirectory, UserRecord};
pub use error::ServerError;
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
    sync::Mutex,
};
pub use transport::ChatConnection;

/// Protocol version the server runs.
pub const SERVER_PROTOCOL_VERSION: u32 = 10;

/// Events returned per `Request::Events`.
pub const EVENTS_PAGE_SIZE: usize = 256;

/// Chat state shared by every connection.
pub type SharedState<E> = Arc<Mutex<ChatState<E>>>;

/// Settings for a TCP-backed chat server.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "127.0.0.1:7070")
    pub bind_address: String,
    /// User directory file. `None` keeps users in memory.
    pub users_db: Option<PathBuf>,
    /// Limits applied to every published contract
    pub limits: ChatLimits,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7070".to_string(),
            users_db: Some(PathBuf::from("users.json")),
            limits: ChatLimits::default(),
        }
    }
}

impl ServerRuntimeConfig {
    /// Reject limits that would make every room unusable, or let a room
    /// outgrow the largest frame the server can send.
    pub fn validate(&self) -> Result<(), ServerError> {
        let ChatLimits { max_message_chars, max_messages_per_room, max_members_per_room } =
            self.limits;
        if max_members_per_room == 0 {
            return Err(ServerError::Config("max members per room must be at least 1".into()));
        }
        if max_messages_per_room == 0 || max_message_chars == 0 {
            return Err(ServerError::Config("message limits must be at least 1".into()));
        }
        let worst = self.limits.worst_case_history_bytes();
        if worst > MAX_FRAME_SIZE {
            return Err(ServerError::Config(format!(
                "a full room may need {worst} bytes, frames hold at most {MAX_FRAME_SIZE}"
            )));
        }
        Ok(())
    }
}

/// The contract network together with the users allowed to call it.
#[derive(Debug)]
pub struct ChatState<E: Environment> {
    network: Network<E>,
    directory: UserDirectory,
}

impl<E: Environment> ChatState<E> {
    /// Build the server's network: upgrade to protocol 10, publish both chat
    /// versions and register every alias already in `directory`.
    pub fn bootstrap(
        env: E,
        limits: ChatLimits,
        directory: UserDirectory,
    ) -> Result<Self, ServerError> {
        let mut network = Network::with_limits(env, limits);
        network.upgrade_protocol(SERVER_PROTOCOL_VERSION)?;
        network.publish(&[ContractRef::chat_9(), ContractRef::chat_10()])?;

        for alias in directory.key_aliases() {
            network.adopt_key_alias(alias.clone());
        }

        Ok(Self { network, directory })
    }

    /// The contract network.
    pub fn network(&self) -> &Network<E> {
        &self.network
    }

    /// The user directory.
    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    /// Answer one request from `peer`.
    ///
    /// Failures become `Response::Error`; they never end the connection.
    pub fn handle(&mut self, peer: IpAddr, request: Request) -> Response {
        match self.try_handle(peer, request) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(%peer, error = %e, "request failed");
                Response::Error { message: e.to_string() }
            },
        }
    }

    fn try_handle(&mut self, peer: IpAddr, request: Request) -> Result<Response, ServerError> {
        match request {
            Request::CreateUser { username } => {
                let key_alias = self.directory.create_user(&username, peer, &mut self.network)?;
                Ok(Response::UserCreated { key_alias })
            },
            Request::ListUsers => Ok(Response::Users(self.directory.list_users())),
            Request::Chat { username, contract, call } => {
                let alias = self.authorize(&username, peer)?;
                let reply = self.network.call(&alias, &contract, call)?;
                Ok(Response::Chat(reply))
            },
            Request::Events { username, since } => {
                let alias = self.authorize(&username, peer)?;
                let start = usize::try_from(since).unwrap_or(usize::MAX);
                let events = self.network.events_since(&alias, start, EVENTS_PAGE_SIZE).to_vec();
                let next = since.saturating_add(u64::try_from(events.len()).unwrap_or(u64::MAX));
                Ok(Response::Events { events, next })
            },
        }
    }

    fn authorize(&self, username: &str, peer: IpAddr) -> Result<KeyAlias, ServerError> {
        if !self.directory.is_authorized(username, peer) {
            return Err(ServerError::Unauthorized { username: username.to_owned() });
        }
        Ok(self.directory.key_alias_for(username)?.clone())
    }
}

/// Serve requests on one connection until the peer hangs up.
///
/// Generic over the stream so tokio TCP, turmoil TCP and in-memory pipes
/// all run the same loop.
pub async fn serve_connection<S, E>(
    mut stream: S,
    peer: IpAddr,
    state: SharedState<E>,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: Environment,
{
    tracing::debug!(%peer, "connection opened");

    let mut buf = BytesMut::with_capacity(8 * 1024);
    while let Some(request) = transport::read_frame::<_, Request>(&mut stream, &mut buf).await? {
        let response = {
            let mut state = state.lock().await;
            state.handle(peer, request)
        };
        transport::write_response(&mut stream, &response).await?;
    }

    tracing::debug!(%peer, "connection closed");
    Ok(())
}

/// Production chat server.
///
/// Wraps `ChatState` with a tokio TCP listener and the system environment.
pub struct Server {
    listener: TcpListener,
    state: SharedState<SystemEnv>,
}

impl Server {
    /// Open the user directory and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The limits are invalid
    /// - The user directory cannot be opened
    /// - Binding to the address fails
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let directory = match &config.users_db {
            Some(path) => UserDirectory::open(path)?,
            None => UserDirectory::in_memory(),
        };
        let state = ChatState::bootstrap(SystemEnv::new(), config.limits, directory)?;
        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self { listener, state: Arc::new(Mutex::new(state)) })
    }

    /// Shared state handle.
    pub fn state(&self) -> SharedState<SystemEnv> {
        Arc::clone(&self.state)
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server, accepting connections until the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.local_addr()?, "chat server listening");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, addr.ip(), state).await {
                            tracing::warn!(%addr, error = %e, "connection failed");
                        }
                    });
                },
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                },
            }
        }
    }
}
