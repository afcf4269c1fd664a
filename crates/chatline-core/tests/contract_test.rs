//! Chat contract tests
//!
//! Exercise `ChatContract` directly, without the network, and check the
//! permission matrix, lifecycle transitions and limits.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use chatline_core::{
    ChatContract, ChatError, ChatLimits, Emission, Environment, Removal,
    proto::{ContractRef, EventKind, KeyAlias, RoomChannel, SELF_REMOVAL_REASON},
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

// Test environment with a seeded RNG and a clock that ticks once per read
#[derive(Clone)]
struct TestEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    clock: Arc<AtomicU64>,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(7))),
            clock: Arc::new(AtomicU64::new(1_000)),
        }
    }
}

impl Environment for TestEnv {
    fn now_millis(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().expect("rng poisoned").fill_bytes(buffer);
    }
}

fn alias(n: u64) -> KeyAlias {
    KeyAlias::from_number(n)
}

fn contract() -> ChatContract {
    ChatContract::new(ContractRef::chat_10(), ChatLimits::default())
}

/// Helper: create a room owned by `creator` and return its channel.
fn create(contract: &mut ChatContract, env: &TestEnv, creator: &KeyAlias) -> RoomChannel {
    contract.create_room(creator, "room", env).expect("create_room failed").event.data.room.channel
}

/// Helper: create a room with `creator` as owner and `members` invited.
fn room_with_members(
    contract: &mut ChatContract,
    env: &TestEnv,
    creator: &KeyAlias,
    members: &[KeyAlias],
) -> RoomChannel {
    let channel = create(contract, env, creator);
    for member in members {
        contract.invite_to_room(creator, &channel, member).expect("invite failed");
    }
    channel
}

#[test]
fn create_room_makes_creator_sole_owner() {
    let env = TestEnv::new();
    let mut contract = contract();
    let alice = alias(1);

    let Emission { event, recipients } = contract.create_room(&alice, "room", &env).unwrap();

    assert_eq!(event.kind, EventKind::CreateRoom);
    assert_eq!(event.data.room.name, "room");
    assert_eq!(event.data.room.creator, alice);
    assert_eq!(event.data.room.owners, vec![alice.clone()]);
    assert_eq!(event.data.room.members, vec![alice.clone()]);
    assert_eq!(recipients, vec![alice]);
    assert_eq!(contract.room_count(), 1);
}

#[test]
fn create_room_accepts_empty_name() {
    let env = TestEnv::new();
    let mut contract = contract();

    let emission = contract.create_room(&alias(1), "", &env).unwrap();
    assert_eq!(emission.event.data.room.name, "");
}

#[test]
fn create_room_rejects_null_byte() {
    let env = TestEnv::new();
    let mut contract = contract();

    assert_eq!(contract.create_room(&alias(1), "\0", &env), Err(ChatError::InvalidRoomName));
    assert_eq!(contract.create_room(&alias(1), "ro\0om", &env), Err(ChatError::InvalidRoomName));
    assert_eq!(contract.room_count(), 0);
}

#[test]
fn create_room_assigns_distinct_channels() {
    let env = TestEnv::new();
    let mut contract = contract();
    let alice = alias(1);

    let a = create(&mut contract, &env, &alice);
    let b = create(&mut contract, &env, &alice);
    assert_ne!(a, b);
}

#[test]
fn delete_then_restore_round_trip() {
    let env = TestEnv::new();
    let mut contract = contract();
    let alice = alias(1);
    let channel = create(&mut contract, &env, &alice);
    contract.send_message(&alice, &channel, "kept".to_string(), &env).unwrap();

    let deleted = contract.delete_room(&alice, &channel).unwrap();
    assert!(deleted.event.data.room.deleted);

    let restored = contract.restore_room(&alice, &channel).unwrap();
    assert!(!restored.event.data.room.deleted);

    let messages = contract.get_messages(&alice, &channel).unwrap();
    assert_eq!(messages.len(), 1, "restore keeps messages");
}

#[test]
fn delete_deleted_room_fails() {
    let env = TestEnv::new();
    let mut contract = contract();
    let alice = alias(1);
    let channel = create(&mut contract, &env, &alice);

    contract.delete_room(&alice, &channel).unwrap();
    assert_eq!(contract.delete_room(&alice, &channel), Err(ChatError::RoomDeleted(channel)));
}

#[test]
fn restore_live_room_fails() {
    let env = TestEnv::new();
    let mut contract = contract();
    let alice = alias(1);
    let channel = create(&mut contract, &env, &alice);

    assert_eq!(contract.restore_room(&alice, &channel), Err(ChatError::RoomNotDeleted(channel)));
}

#[test]
fn only_owners_delete_and_restore() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (alice, bob, carol) = (alias(1), alias(2), alias(3));
    let channel = room_with_members(&mut contract, &env, &alice, &[bob.clone()]);

    assert_eq!(contract.delete_room(&bob, &channel), Err(ChatError::NotOwner(bob.clone())));
    assert_eq!(contract.delete_room(&carol, &channel), Err(ChatError::NotMember(carol)));

    contract.delete_room(&alice, &channel).unwrap();
    assert_eq!(contract.restore_room(&bob, &channel), Err(ChatError::NotOwner(bob)));
}

#[test]
fn unknown_room_is_reported() {
    let env = TestEnv::new();
    let mut contract = contract();
    let missing = RoomChannel::from_u128(42);

    assert_eq!(
        contract.send_message(&alias(1), &missing, String::new(), &env),
        Err(ChatError::RoomNotFound(missing.clone()))
    );
    assert_eq!(contract.get_messages(&alias(1), &missing), Err(ChatError::RoomNotFound(missing)));
}

#[test]
fn invite_rules() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (alice, bob, carol) = (alias(1), alias(2), alias(3));
    let channel = create(&mut contract, &env, &alice);

    let emission = contract.invite_to_room(&alice, &channel, &bob).unwrap();
    assert_eq!(emission.event.data.member, Some(bob.clone()));
    assert!(emission.recipients.contains(&bob), "invitee receives the invite event");

    assert_eq!(
        contract.invite_to_room(&alice, &channel, &bob),
        Err(ChatError::AlreadyMember(bob.clone()))
    );
    assert_eq!(
        contract.invite_to_room(&alice, &channel, &alice),
        Err(ChatError::AlreadyMember(alice.clone()))
    );
    assert_eq!(
        contract.invite_to_room(&bob, &channel, &carol),
        Err(ChatError::NotOwner(bob.clone()))
    );
}

#[test]
fn invite_stops_at_member_limit() {
    let env = TestEnv::new();
    let mut contract = contract();
    let owner = alias(0);
    let channel = create(&mut contract, &env, &owner);

    for n in 1..10 {
        contract.invite_to_room(&owner, &channel, &alias(n)).unwrap();
    }
    assert_eq!(contract.room(&channel).unwrap().members.len(), 10);

    assert_eq!(
        contract.invite_to_room(&owner, &channel, &alias(10)),
        Err(ChatError::RoomFull { limit: 10 })
    );
}

#[test]
fn remove_self_is_rejected_not_failed() {
    let env = TestEnv::new();
    let mut contract = contract();
    let alice = alias(1);
    let channel = create(&mut contract, &env, &alice);

    let removal = contract.remove_from_room(&alice, &channel, &alice).unwrap();
    assert_eq!(removal, Removal::Rejected { reason: SELF_REMOVAL_REASON.to_string() });
    assert!(contract.room(&channel).unwrap().is_member(&alice));
}

#[test]
fn remove_member_notifies_removee() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (alice, bob) = (alias(1), alias(2));
    let channel = room_with_members(&mut contract, &env, &alice, &[bob.clone()]);

    let Removal::Removed(emission) = contract.remove_from_room(&alice, &channel, &bob).unwrap()
    else {
        panic!("expected removal");
    };

    assert_eq!(emission.event.kind, EventKind::RemoveFromRoom);
    assert!(!emission.event.data.room.is_member(&bob));
    assert!(emission.recipients.contains(&bob));
    assert!(emission.recipients.contains(&alice));
}

#[test]
fn remove_owner_drops_ownership() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (u1, u2) = (alias(1), alias(2));
    let channel = room_with_members(&mut contract, &env, &u1, &[u2.clone()]);
    contract.promote_to_owner(&u1, &channel, &u2).unwrap();

    contract.remove_from_room(&u2, &channel, &u1).unwrap();

    let room = contract.room(&channel).unwrap();
    assert_eq!(room.owners, vec![u2.clone()]);
    assert_eq!(room.members, vec![u2]);
}

#[test]
fn remove_rejects_non_members_and_non_owners() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (u1, u2, u3) = (alias(1), alias(2), alias(3));
    let channel = room_with_members(&mut contract, &env, &u1, &[u2.clone()]);

    assert_eq!(
        contract.remove_from_room(&u1, &channel, &u3),
        Err(ChatError::TargetNotMember(u3.clone()))
    );
    assert_eq!(contract.remove_from_room(&u2, &channel, &u1), Err(ChatError::NotOwner(u2)));
    // Non-member removing themselves is still a self-removal
    assert!(matches!(
        contract.remove_from_room(&u3, &channel, &u3),
        Ok(Removal::Rejected { .. })
    ));
}

#[test]
fn promote_rules() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (u1, u2, u3) = (alias(1), alias(2), alias(3));
    let channel = room_with_members(&mut contract, &env, &u1, &[u2.clone()]);

    assert_eq!(
        contract.promote_to_owner(&u1, &channel, &u3),
        Err(ChatError::TargetNotMember(u3.clone()))
    );
    assert_eq!(contract.promote_to_owner(&u2, &channel, &u2), Err(ChatError::NotOwner(u2.clone())));

    contract.promote_to_owner(&u1, &channel, &u2).unwrap();
    assert_eq!(
        contract.promote_to_owner(&u1, &channel, &u2),
        Err(ChatError::AlreadyOwner(u2.clone()))
    );

    contract.delete_room(&u1, &channel).unwrap();
    assert_eq!(contract.promote_to_owner(&u1, &channel, &u2), Err(ChatError::RoomDeleted(channel)));
}

#[test]
fn demote_rules() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (u1, u2, u3) = (alias(1), alias(2), alias(3));
    let channel = room_with_members(&mut contract, &env, &u1, &[u2.clone(), u3.clone()]);

    assert_eq!(contract.demote_owner(&u1, &channel, &u1), Err(ChatError::LastOwner));
    assert_eq!(
        contract.demote_owner(&u1, &channel, &u2),
        Err(ChatError::TargetNotOwner(u2.clone()))
    );
    assert_eq!(contract.demote_owner(&u2, &channel, &u2), Err(ChatError::NotOwner(u2.clone())));

    contract.promote_to_owner(&u1, &channel, &u2).unwrap();
    let emission = contract.demote_owner(&u2, &channel, &u1).unwrap();
    assert_eq!(emission.event.data.member, Some(u1.clone()));
    assert_eq!(emission.event.data.room.owners, vec![u2]);
}

#[test]
fn send_message_rules() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (alice, mallory) = (alias(1), alias(9));
    let channel = create(&mut contract, &env, &alice);

    assert_eq!(
        contract.send_message(&mallory, &channel, "hi".to_string(), &env),
        Err(ChatError::NotMember(mallory))
    );

    let empty = contract.send_message(&alice, &channel, String::new(), &env).unwrap();
    assert_eq!(empty.event.data.message.map(|m| m.body), Some(String::new()));

    // 4000 two-byte characters fit; the limit counts characters, not bytes
    let wide = "é".repeat(4000);
    contract.send_message(&alice, &channel, wide, &env).unwrap();

    assert_eq!(
        contract.send_message(&alice, &channel, "x".repeat(4001), &env),
        Err(ChatError::MessageTooLong { len: 4001, max: 4000 })
    );

    contract.delete_room(&alice, &channel).unwrap();
    assert_eq!(
        contract.send_message(&alice, &channel, String::new(), &env),
        Err(ChatError::RoomDeleted(channel))
    );
}

#[test]
fn send_message_stops_at_message_limit() {
    let env = TestEnv::new();
    let limits = ChatLimits { max_messages_per_room: 3, ..ChatLimits::default() };
    let mut contract = ChatContract::new(ContractRef::chat_10(), limits);
    let alice = alias(1);
    let channel = create(&mut contract, &env, &alice);

    for i in 0..3 {
        contract.send_message(&alice, &channel, format!("{i}"), &env).unwrap();
    }
    assert_eq!(
        contract.send_message(&alice, &channel, "over".to_string(), &env),
        Err(ChatError::MessageLimitReached { limit: 3 })
    );
}

#[test]
fn get_messages_in_send_order() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (alice, bob) = (alias(1), alias(2));
    let channel = room_with_members(&mut contract, &env, &alice, &[bob.clone()]);

    contract.send_message(&alice, &channel, "one".to_string(), &env).unwrap();
    contract.send_message(&bob, &channel, "two".to_string(), &env).unwrap();
    contract.send_message(&alice, &channel, "three".to_string(), &env).unwrap();

    let messages = contract.get_messages(&bob, &channel).unwrap();
    let bodies: Vec<_> = messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["one", "two", "three"]);
    assert_eq!(messages[1].sender, bob);

    for (i, pair) in messages.windows(2).enumerate() {
        assert_eq!(pair[0].index, i as u64);
        assert!(pair[0].timestamp <= pair[1].timestamp, "timestamps must not decrease");
    }

    assert_eq!(contract.get_messages(&alias(3), &channel), Err(ChatError::NotMember(alias(3))));
}

#[test]
fn get_rooms_lists_memberships_including_deleted() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (alice, bob) = (alias(1), alias(2));

    assert!(contract.get_rooms(&alice).is_empty());

    let first = create(&mut contract, &env, &alice);
    let second = room_with_members(&mut contract, &env, &alice, &[bob.clone()]);
    contract.delete_room(&alice, &first).unwrap();

    let rooms = contract.get_rooms(&alice);
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].channel, first);
    assert!(rooms[0].deleted);
    assert_eq!(rooms[1].channel, second);

    let bobs: Vec<_> = contract.get_rooms(&bob).into_iter().map(|r| r.channel).collect();
    assert_eq!(bobs, vec![second]);
}

#[test]
fn event_sequence_for_room_lifecycle() {
    let env = TestEnv::new();
    let mut contract = contract();
    let (alice, bob) = (alias(1), alias(2));

    let mut emissions = Vec::new();
    let created = contract.create_room(&alice, "room", &env).unwrap();
    let channel = created.event.data.room.channel.clone();
    emissions.push(created);
    emissions.push(contract.invite_to_room(&alice, &channel, &bob).unwrap());
    emissions.push(contract.promote_to_owner(&alice, &channel, &bob).unwrap());
    emissions.push(contract.send_message(&bob, &channel, "hi".to_string(), &env).unwrap());
    emissions.push(contract.demote_owner(&alice, &channel, &bob).unwrap());
    if let Removal::Removed(emission) = contract.remove_from_room(&alice, &channel, &bob).unwrap() {
        emissions.push(emission);
    }
    emissions.push(contract.delete_room(&alice, &channel).unwrap());
    emissions.push(contract.restore_room(&alice, &channel).unwrap());

    let types: Vec<_> = emissions.iter().map(|e| e.event.event_type()).collect();
    insta::assert_snapshot!(types.join("\n"), @r"
    chat/10-1.0.0/CreateRoomEvent
    chat/10-1.0.0/InviteToRoomEvent
    chat/10-1.0.0/PromoteToOwnerEvent
    chat/10-1.0.0/SendMessageEvent
    chat/10-1.0.0/DemoteOwnerEvent
    chat/10-1.0.0/RemoveFromRoomEvent
    chat/10-1.0.0/DeleteRoomEvent
    chat/10-1.0.0/RestoreRoomEvent
    ");
}
