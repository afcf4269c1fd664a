//! Stress tests at the default limits.
//!
//! A full room: ten members sending the maximum number of maximum-length
//! messages, with every step checked against the model.

use chatline_core::{
    ChatError, DEFAULT_MAX_MEMBERS_PER_ROOM, DEFAULT_MAX_MESSAGE_CHARS,
    DEFAULT_MAX_MESSAGES_PER_ROOM,
};
use chatline_harness::{
    ChatValidator, MODEL_ROOM_CAPACITY, MODEL_USER_CAPACITY, UserId, ValidatorError,
};

#[test]
fn full_room_at_every_limit() {
    let num_users = DEFAULT_MAX_MEMBERS_PER_ROOM;
    let mut v = ChatValidator::new(num_users, 0x5_7E55).unwrap();

    let room = v.create_room(0, "stress").unwrap();
    for user in 1..num_users {
        v.invite_to_room(0, room, user as UserId).unwrap();
    }

    let body = "m".repeat(DEFAULT_MAX_MESSAGE_CHARS);
    for i in 0..DEFAULT_MAX_MESSAGES_PER_ROOM {
        let sender = (i % num_users) as UserId;
        v.send_message(sender, room, &body).unwrap();
    }

    let err = v.send_message(0, room, "one too many").unwrap_err();
    match err {
        ValidatorError::Call(e) => assert_eq!(
            e.chat_error(),
            Some(&ChatError::MessageLimitReached { limit: DEFAULT_MAX_MESSAGES_PER_ROOM })
        ),
        other => panic!("unexpected failure: {other}"),
    }

    let messages = v.get_messages(num_users as UserId - 1, room).unwrap();
    assert_eq!(messages.len(), DEFAULT_MAX_MESSAGES_PER_ROOM);
    assert!(messages.iter().all(|m| m.body.chars().count() == DEFAULT_MAX_MESSAGE_CHARS));
    assert_eq!(&messages[11].sender, v.key_alias(1).unwrap());

    // Every member saw every message
    for user in 0..num_users {
        let sends = v
            .events(user as UserId)
            .unwrap()
            .iter()
            .filter(|e| e.data.message.is_some())
            .count();
        assert_eq!(sends, DEFAULT_MAX_MESSAGES_PER_ROOM);
    }

    v.teardown().unwrap();
}

#[test]
fn many_rooms_one_owner() {
    let mut v = ChatValidator::new(3, 0xA11).unwrap();

    for i in 0..200 {
        let room = v.create_room(0, &format!("room-{i}")).unwrap();
        v.invite_to_room(0, room, 1 + (i % 2) as UserId).unwrap();
    }

    assert_eq!(v.get_rooms(0).unwrap().len(), 200);
    assert_eq!(v.get_rooms(1).unwrap().len(), 100);
    assert_eq!(v.get_rooms(2).unwrap().len(), 100);
    v.teardown().unwrap();
}

#[test]
fn room_ids_stop_at_model_capacity() {
    let mut v = ChatValidator::new(1, 0x257).unwrap();

    let first = v.create_room(0, "first").unwrap();
    for i in 1..MODEL_ROOM_CAPACITY {
        let room = v.create_room(0, &format!("room-{i}")).unwrap();
        assert_eq!(usize::from(room), i);
    }

    let err = v.create_room(0, "overflow").unwrap_err();
    assert!(matches!(err, ValidatorError::OutOfIds { kind: "room", .. }));

    // The refused room never reached the network, so id 0 still names "first"
    let contract = v.network().contract(v.contract()).unwrap();
    assert_eq!(contract.room_count(), MODEL_ROOM_CAPACITY);
    let deleted = v.delete_room(0, first).unwrap();
    assert_eq!(deleted.data.room.name, "first");
    v.teardown().unwrap();
}

#[test]
fn user_ids_stop_at_model_capacity() {
    let err = ChatValidator::new(MODEL_USER_CAPACITY + 1, 0).unwrap_err();
    assert!(matches!(err, ValidatorError::OutOfIds { kind: "user", .. }));

    let mut v = ChatValidator::new(MODEL_USER_CAPACITY - 1, 0).unwrap();
    assert_eq!(v.add_user().unwrap(), UserId::MAX);
    assert!(matches!(v.add_user(), Err(ValidatorError::OutOfIds { kind: "user", .. })));
    assert_eq!(v.num_users(), MODEL_USER_CAPACITY);
}
