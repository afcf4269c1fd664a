//! Client/server runs under turmoil.
//!
//! The production connection loop serves simulated TCP. Each client host has
//! its own address, so address-bound user authorization is exercised for
//! real. Time is virtual and every run replays from the builder seed.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use chatline_core::{ChatLimits, proto::ContractRef};
use chatline_harness::{connect, create_shared_state, run_sim_server};
use chatline_proto::{CallReply, ChatCall, KeyAlias, RoomChannel, Request, Response};
use chatline_server::ChatConnection;
use turmoil::net::TcpStream;

type Conn = ChatConnection<TcpStream>;

async fn create_user(conn: &mut Conn, username: &str) -> turmoil::Result<KeyAlias> {
    match conn.request(&Request::CreateUser { username: username.to_string() }).await? {
        Response::UserCreated { key_alias } => Ok(key_alias),
        other => Err(format!("create_user {username}: {other:?}").into()),
    }
}

async fn chat(conn: &mut Conn, username: &str, call: ChatCall) -> turmoil::Result<Response> {
    let request =
        Request::Chat { username: username.to_string(), contract: ContractRef::chat_10(), call };
    Ok(conn.request(&request).await?)
}

async fn reply(conn: &mut Conn, username: &str, call: ChatCall) -> turmoil::Result<CallReply> {
    match chat(conn, username, call).await? {
        Response::Chat(reply) => Ok(reply),
        other => Err(format!("{username}: {other:?}").into()),
    }
}

/// Poll until every name in `usernames` is registered.
async fn wait_for_users(conn: &mut Conn, usernames: &[&str]) -> turmoil::Result {
    loop {
        if let Response::Users(users) = conn.request(&Request::ListUsers).await? {
            if usernames.iter().all(|name| users.iter().any(|u| u == name)) {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll `get_rooms` until `username` belongs to a room.
async fn wait_for_room(conn: &mut Conn, username: &str) -> turmoil::Result<RoomChannel> {
    loop {
        if let CallReply::Rooms(rooms) = reply(conn, username, ChatCall::GetRooms).await? {
            if let Some(room) = rooms.into_iter().next() {
                return Ok(room.channel);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[test]
fn single_client_session() {
    let mut sim = turmoil::Builder::new()
        .simulation_duration(Duration::from_secs(30))
        .rng_seed(1)
        .build();

    let state = create_shared_state(1, ChatLimits::default()).unwrap();
    let server_state = Arc::clone(&state);
    sim.host("server", move || run_sim_server(Arc::clone(&server_state)));

    sim.client("client", async {
        let mut conn = connect("server").await?;
        create_user(&mut conn, "alice").await?;
        let bob = create_user(&mut conn, "bob").await?;

        let created =
            reply(&mut conn, "alice", ChatCall::CreateRoom { room_name: "lobby".to_string() })
                .await?;
        let channel = created.event().map(|e| e.data.room.channel.clone()).ok_or("no event")?;

        let call = ChatCall::InviteToRoom { room_channel: channel.clone(), new_member: bob };
        reply(&mut conn, "alice", call).await?;
        let call =
            ChatCall::SendMessage { room_channel: channel.clone(), message: "hi".to_string() };
        reply(&mut conn, "alice", call).await?;
        let call =
            ChatCall::SendMessage { room_channel: channel.clone(), message: "hey".to_string() };
        reply(&mut conn, "bob", call).await?;

        match reply(&mut conn, "bob", ChatCall::GetMessages { room_channel: channel }).await? {
            CallReply::Messages(messages) => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].body, "hi");
                assert_eq!(messages[1].body, "hey");
            },
            other => panic!("unexpected reply: {other:?}"),
        }

        match conn.request(&Request::Events { username: "bob".to_string(), since: 0 }).await? {
            Response::Events { events, next } => {
                assert_eq!(next, 3);
                let types: Vec<String> = events.iter().map(|e| e.event_type()).collect();
                assert_eq!(types, [
                    "chat/10-1.0.0/InviteToRoomEvent",
                    "chat/10-1.0.0/SendMessageEvent",
                    "chat/10-1.0.0/SendMessageEvent",
                ]);
            },
            other => panic!("unexpected response: {other:?}"),
        }

        Ok(())
    });

    sim.run().unwrap();

    let state = state.try_lock().unwrap();
    assert_eq!(state.directory().list_users(), ["alice", "bob"]);
    let contract = state.network().contract(&ContractRef::chat_10()).unwrap();
    assert_eq!(contract.room_count(), 1);
}

#[test]
fn other_host_cannot_act_as_user() {
    let mut sim = turmoil::Builder::new()
        .simulation_duration(Duration::from_secs(30))
        .rng_seed(2)
        .build();

    let state = create_shared_state(2, ChatLimits::default()).unwrap();
    let server_state = Arc::clone(&state);
    sim.host("server", move || run_sim_server(Arc::clone(&server_state)));

    sim.client("alice", async {
        let mut conn = connect("server").await?;
        create_user(&mut conn, "alice").await?;
        reply(&mut conn, "alice", ChatCall::CreateRoom { room_name: "private".to_string() })
            .await?;
        Ok(())
    });

    sim.client("mallory", async {
        let mut conn = connect("server").await?;
        wait_for_users(&mut conn, &["alice"]).await?;

        match chat(&mut conn, "alice", ChatCall::GetRooms).await? {
            Response::Error { message } => assert!(message.contains("not authorized"), "{message}"),
            other => panic!("expected rejection, got {other:?}"),
        }

        // Taking the name again fails too
        match conn.request(&Request::CreateUser { username: "alice".to_string() }).await? {
            Response::Error { .. } => {},
            other => panic!("expected rejection, got {other:?}"),
        }

        create_user(&mut conn, "mallory").await?;
        match reply(&mut conn, "mallory", ChatCall::GetRooms).await? {
            CallReply::Rooms(rooms) => assert!(rooms.is_empty()),
            other => panic!("unexpected reply: {other:?}"),
        }
        Ok(())
    });

    sim.run().unwrap();
}

/// Aliases users hand each other outside the server.
type AliasBook = Arc<Mutex<BTreeMap<&'static str, KeyAlias>>>;

/// Poll `book` until it holds an alias for every name in `usernames`.
async fn wait_for_aliases(book: &AliasBook, usernames: &[&str]) -> Vec<KeyAlias> {
    loop {
        let found: Vec<KeyAlias> = {
            let book = book.lock().unwrap();
            usernames.iter().filter_map(|name| book.get(*name).cloned()).collect()
        };
        if found.len() == usernames.len() {
            return found;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[test]
fn concurrent_members_under_latency() {
    const SENDS: usize = 5;
    let members = ["alice", "bob", "carol"];

    let mut sim = turmoil::Builder::new()
        .simulation_duration(Duration::from_secs(120))
        .min_message_latency(Duration::from_millis(1))
        .max_message_latency(Duration::from_millis(50))
        .rng_seed(3)
        .build();

    let state = create_shared_state(3, ChatLimits::default()).unwrap();
    let server_state = Arc::clone(&state);
    sim.host("server", move || run_sim_server(Arc::clone(&server_state)));

    let book = AliasBook::default();

    let alice_book = Arc::clone(&book);
    sim.client("alice", async move {
        let mut conn = connect("server").await?;
        create_user(&mut conn, "alice").await?;
        let invitees = wait_for_aliases(&alice_book, &["bob", "carol"]).await;

        let created =
            reply(&mut conn, "alice", ChatCall::CreateRoom { room_name: "busy".to_string() })
                .await?;
        let channel = created.event().map(|e| e.data.room.channel.clone()).ok_or("no event")?;

        for alias in invitees {
            let call = ChatCall::InviteToRoom { room_channel: channel.clone(), new_member: alias };
            reply(&mut conn, "alice", call).await?;
        }

        for i in 0..SENDS {
            let call = ChatCall::SendMessage {
                room_channel: channel.clone(),
                message: format!("alice {i}"),
            };
            reply(&mut conn, "alice", call).await?;
        }
        Ok(())
    });

    for name in ["bob", "carol"] {
        let book = Arc::clone(&book);
        sim.client(name, async move {
            let mut conn = connect("server").await?;
            let alias = create_user(&mut conn, name).await?;
            book.lock().unwrap().insert(name, alias);
            let channel = wait_for_room(&mut conn, name).await?;

            for i in 0..SENDS {
                let call = ChatCall::SendMessage {
                    room_channel: channel.clone(),
                    message: format!("{name} {i}"),
                };
                reply(&mut conn, name, call).await?;
            }
            Ok(())
        });
    }

    sim.run().unwrap();

    let state = state.try_lock().unwrap();
    let contract = state.network().contract(&ContractRef::chat_10()).unwrap();
    let room = contract.rooms().next().unwrap();
    assert_eq!(room.members.len(), members.len());

    let messages = contract.messages(&room.channel).unwrap();
    assert_eq!(messages.len(), SENDS * members.len());
    for (i, message) in messages.iter().enumerate() {
        assert_eq!(message.index, i as u64);
    }
    assert!(messages.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));

    // Each sender's own messages keep their order
    for name in members {
        let alias = state.directory().key_alias_for(name).unwrap();
        let bodies: Vec<&str> =
            messages.iter().filter(|m| &m.sender == alias).map(|m| m.body.as_str()).collect();
        let expected: Vec<String> = (0..SENDS).map(|i| format!("{name} {i}")).collect();
        assert_eq!(bodies, expected);

        let seen = state
            .network()
            .events(alias)
            .iter()
            .filter(|e| e.data.message.is_some())
            .count();
        assert!(seen >= SENDS, "{name} saw {seen} messages");
    }
}
