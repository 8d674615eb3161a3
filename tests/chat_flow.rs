//! Integration tests for the basic chat flows: nicknames, room listing,
//! join, message, and leave.

mod common;

use common::TestServer;
use serde_json::json;

#[tokio::test]
async fn happy_path_single_chatter() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = server.connect().await.expect("connect");

    // Set a nickname.
    alice.send("", 101, "Alice").await.expect("send");
    assert_eq!(
        alice.recv_raw().await.expect("recv"),
        json!({
            "roomName": "",
            "rspType": 101,
            "content": "Nickname set to \"Alice\".",
            "list": []
        })
    );

    // No rooms exist yet.
    alice.send("", 103, "").await.expect("send");
    assert_eq!(
        alice.recv_raw().await.expect("recv"),
        json!({ "roomName": "", "rspType": 103, "content": "", "list": [] })
    );

    // Join creates the room lazily and echoes the member list.
    alice.send("lobby", 104, "").await.expect("send");
    assert_eq!(
        alice.recv_raw().await.expect("recv"),
        json!({
            "roomName": "lobby",
            "rspType": 104,
            "content": "Alice has joined the room.",
            "list": ["Alice"]
        })
    );

    // The room now shows up in listings.
    alice.send("", 103, "").await.expect("send");
    assert_eq!(
        alice.recv_raw().await.expect("recv"),
        json!({ "roomName": "", "rspType": 103, "content": "", "list": ["lobby"] })
    );

    // Messages fan out (here: only to the sender).
    alice.send("lobby", 108, "hi").await.expect("send");
    assert_eq!(
        alice.recv_raw().await.expect("recv"),
        json!({ "roomName": "lobby", "rspType": 108, "content": "Alice: hi", "list": [] })
    );

    // Leaving confirms to the leaver.
    alice.send("lobby", 109, "").await.expect("send");
    assert_eq!(
        alice.recv_raw().await.expect("recv"),
        json!({
            "roomName": "lobby",
            "rspType": 109,
            "content": "You have left room \"lobby\".",
            "list": []
        })
    );

    server.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn get_nickname_round_trip() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");

    // Unset nickname reads back empty.
    client.send("", 102, "").await.expect("send");
    let rsp = client.recv().await.expect("recv");
    assert_eq!(u16::from(rsp.rsp_type), 102);
    assert_eq!(rsp.content, "");

    client.send("", 101, "Zoe").await.expect("send");
    client.recv().await.expect("recv");
    client.send("", 102, "").await.expect("send");
    assert_eq!(client.recv().await.expect("recv").content, "Zoe");

    // Blank nicknames are refused.
    client.send("", 101, "").await.expect("send");
    let rsp = client.recv_raw().await.expect("recv");
    assert_eq!(rsp["rspType"], 1003);
    assert_eq!(rsp["content"], "Nickname cannot be blank.");

    server.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn double_join_is_rejected() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = server.connect().await.expect("connect");

    alice.send("", 101, "Alice").await.expect("send");
    alice.recv().await.expect("recv");
    alice.send("lobby", 104, "").await.expect("send");
    alice.recv().await.expect("recv");

    alice.send("lobby", 104, "").await.expect("send");
    let rsp = alice.recv_raw().await.expect("recv");
    assert_eq!(rsp["roomName"], "lobby");
    assert_eq!(rsp["rspType"], 1004);
    assert_eq!(rsp["list"], json!([]));

    server.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn nickname_collision_within_a_room() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = server.connect().await.expect("connect");
    let mut bob = server.connect().await.expect("connect");

    alice.send("", 101, "Alice").await.expect("send");
    alice.recv().await.expect("recv");
    alice.send("lobby", 104, "").await.expect("send");
    alice.recv().await.expect("recv");

    // The nickname itself is allowed globally...
    bob.send("", 101, "Alice").await.expect("send");
    let rsp = bob.recv().await.expect("recv");
    assert_eq!(rsp.content, "Nickname set to \"Alice\".");

    // ...but not inside a room that already has it.
    bob.send("lobby", 104, "").await.expect("send");
    let rsp = bob.recv_raw().await.expect("recv");
    assert_eq!(rsp["rspType"], 1005);

    // Alice's membership is unchanged and message flow still works.
    alice.send("lobby", 108, "still here").await.expect("send");
    let rsp = alice.recv().await.expect("recv");
    assert_eq!(rsp.content, "Alice: still here");

    server.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn join_and_message_fan_out_between_chatters() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = server.connect().await.expect("connect");
    let mut bob = server.connect().await.expect("connect");

    alice.send("", 101, "Alice").await.expect("send");
    alice.recv().await.expect("recv");
    bob.send("", 101, "Bob").await.expect("send");
    bob.recv().await.expect("recv");

    alice.send("lobby", 104, "").await.expect("send");
    alice.recv().await.expect("recv");

    bob.send("lobby", 104, "").await.expect("send");
    let rsp = bob.recv().await.expect("recv");
    assert_eq!(rsp.content, "Bob has joined the room.");
    assert_eq!(rsp.list, vec!["Alice", "Bob"]);

    // Alice sees Bob's join with the updated list.
    let rsp = alice.recv().await.expect("recv");
    assert_eq!(rsp.content, "Bob has joined the room.");
    assert_eq!(rsp.list, vec!["Alice", "Bob"]);

    alice.send("lobby", 108, "hello bob").await.expect("send");
    assert_eq!(alice.recv().await.expect("recv").content, "Alice: hello bob");
    assert_eq!(bob.recv().await.expect("recv").content, "Alice: hello bob");

    // Bob leaving notifies Alice with the shrunken list.
    bob.send("lobby", 109, "").await.expect("send");
    let rsp = bob.recv().await.expect("recv");
    assert_eq!(rsp.content, "You have left room \"lobby\".");
    let rsp = alice.recv().await.expect("recv");
    assert_eq!(rsp.content, "Bob has left the room.");
    assert_eq!(rsp.list, vec!["Alice"]);

    server.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn room_requests_demand_a_room_name() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");

    client.send("", 108, "shout").await.expect("send");
    let rsp = client.recv_raw().await.expect("recv");
    assert_eq!(rsp["rspType"], 1001);
    assert_eq!(rsp["content"], "Room name is mandatory to access a room.");

    server.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn unknown_request_codes_are_answered_not_dropped() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");

    client.send("lobby", 999, "").await.expect("send");
    let rsp = client.recv_raw().await.expect("recv");
    assert_eq!(rsp["rspType"], 1008);
    assert_eq!(rsp["roomName"], "lobby");

    server.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn every_response_carries_the_full_envelope() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = server.connect().await.expect("connect");

    client.send("", 101, "Eve").await.expect("send");
    client.send("", 103, "").await.expect("send");
    client.send("den", 104, "").await.expect("send");
    client.send("den", 108, "hi").await.expect("send");
    client.send("den", 109, "").await.expect("send");

    for _ in 0..5 {
        let rsp = client.recv_raw().await.expect("recv");
        let obj = rsp.as_object().expect("object");
        for key in ["roomName", "rspType", "content", "list"] {
            assert!(obj.contains_key(key), "missing {key} in {rsp}");
        }
        assert!(rsp["list"].is_array(), "list is not an array in {rsp}");
    }

    server.shutdown().await.expect("shutdown");
}
