//! Integration tests for the room lifecycle: lobby entry, direct joins,
//! ownership transfer, teardown and failure semantics.

mod common;

use common::{harness, setup_guild, voice_move};
use lobbyd::ids::{GuildId, UserId};
use lobbyd::remote::RemoteError;

const GUILD: GuildId = GuildId(7);
const ALICE: UserId = UserId(100);
const BOB: UserId = UserId(200);
const CAROL: UserId = UserId(50);

#[tokio::test]
async fn full_room_lifecycle() {
    let h = harness().await;
    let config = setup_guild(&h, GUILD).await;

    // A enters the lobby: a room appears, owned by A, under the active
    // category, with A moved inside.
    voice_move(&h, GUILD, ALICE, "alice", None, Some(config.lobby_channel_id)).await;

    let rooms = h.db.rooms().list(GUILD).await.unwrap();
    assert_eq!(rooms.len(), 1);
    let room = rooms[0];
    assert_eq!(room.owner_id, ALICE);
    assert_eq!(h.fake.voice_channel_of(GUILD, ALICE), Some(room.channel_id));

    let remote = h.fake.channel(room.channel_id).expect("room exists remotely");
    assert_eq!(remote.kind, "voice");
    assert_eq!(remote.name, "alice's room");
    assert_eq!(remote.parent, Some(config.active_category_id));

    // B joins the room directly (invited, not via the lobby): no new room.
    let channels_before = h.fake.channel_count();
    voice_move(&h, GUILD, BOB, "bob", None, Some(room.channel_id)).await;
    assert_eq!(h.fake.channel_count(), channels_before);
    assert_eq!(h.db.rooms().list(GUILD).await.unwrap().len(), 1);

    // A leaves while B remains: ownership transfers to B.
    voice_move(&h, GUILD, ALICE, "alice", Some(room.channel_id), None).await;
    let room_after = h.db.rooms().find(GUILD, room.channel_id).await.unwrap().unwrap();
    assert_eq!(room_after.owner_id, BOB);

    // B leaves, emptying the room: deleted remotely and unregistered.
    voice_move(&h, GUILD, BOB, "bob", Some(room.channel_id), None).await;
    assert!(h.db.rooms().list(GUILD).await.unwrap().is_empty());
    assert!(h.fake.channel(room.channel_id).is_none());
}

#[tokio::test]
async fn owner_transfer_picks_lowest_user_id() {
    let h = harness().await;
    let config = setup_guild(&h, GUILD).await;

    voice_move(&h, GUILD, ALICE, "alice", None, Some(config.lobby_channel_id)).await;
    let room = h.db.rooms().list(GUILD).await.unwrap()[0];

    // Two more members join directly; CAROL has the lowest id of the three.
    voice_move(&h, GUILD, BOB, "bob", None, Some(room.channel_id)).await;
    voice_move(&h, GUILD, CAROL, "carol", None, Some(room.channel_id)).await;

    voice_move(&h, GUILD, ALICE, "alice", Some(room.channel_id), None).await;

    let room_after = h.db.rooms().find(GUILD, room.channel_id).await.unwrap().unwrap();
    assert_eq!(room_after.owner_id, CAROL);
    assert_ne!(room_after.owner_id, ALICE);
}

#[tokio::test]
async fn non_owner_departure_changes_nothing() {
    let h = harness().await;
    let config = setup_guild(&h, GUILD).await;

    voice_move(&h, GUILD, ALICE, "alice", None, Some(config.lobby_channel_id)).await;
    let room = h.db.rooms().list(GUILD).await.unwrap()[0];
    voice_move(&h, GUILD, BOB, "bob", None, Some(room.channel_id)).await;

    voice_move(&h, GUILD, BOB, "bob", Some(room.channel_id), None).await;

    let room_after = h.db.rooms().find(GUILD, room.channel_id).await.unwrap().unwrap();
    assert_eq!(room_after.owner_id, ALICE);
    assert!(h.fake.channel(room.channel_id).is_some());
}

#[tokio::test]
async fn entering_a_non_lobby_channel_creates_nothing() {
    let h = harness().await;
    let config = setup_guild(&h, GUILD).await;

    // The rules channel is not the lobby entry point.
    voice_move(&h, GUILD, ALICE, "alice", None, Some(config.rules_channel_id)).await;
    assert!(h.db.rooms().list(GUILD).await.unwrap().is_empty());
}

#[tokio::test]
async fn unconfigured_guild_ignores_events() {
    let h = harness().await;

    voice_move(&h, GUILD, ALICE, "alice", None, Some(lobbyd::ids::ChannelId(999))).await;
    assert!(h.db.rooms().list(GUILD).await.unwrap().is_empty());
    assert_eq!(h.fake.channel_count(), 0);
}

#[tokio::test]
async fn creation_failure_persists_nothing() {
    let h = harness().await;
    let config = setup_guild(&h, GUILD).await;

    h.fake.fail_next(
        "create_voice_channel",
        RemoteError::Forbidden("guilds/7/channels".into()),
    );
    voice_move(&h, GUILD, ALICE, "alice", None, Some(config.lobby_channel_id)).await;

    assert!(h.db.rooms().list(GUILD).await.unwrap().is_empty());
}

#[tokio::test]
async fn move_in_failure_still_persists_the_room() {
    let h = harness().await;
    let config = setup_guild(&h, GUILD).await;

    h.fake.fail_next("move_member", RemoteError::RateLimited);
    voice_move(&h, GUILD, ALICE, "alice", None, Some(config.lobby_channel_id)).await;

    // The room exists remotely and is registered, ready for the reconciler
    // to collect if it stays empty.
    let rooms = h.db.rooms().list(GUILD).await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert!(h.fake.channel(rooms[0].channel_id).is_some());
}

#[tokio::test]
async fn remote_delete_failure_keeps_the_record() {
    let h = harness().await;
    let config = setup_guild(&h, GUILD).await;

    voice_move(&h, GUILD, ALICE, "alice", None, Some(config.lobby_channel_id)).await;
    let room = h.db.rooms().list(GUILD).await.unwrap()[0];

    h.fake.fail_next("delete_channel", RemoteError::RateLimited);
    voice_move(&h, GUILD, ALICE, "alice", Some(room.channel_id), None).await;

    // Delete failed: remote room still there, record kept for retry.
    assert!(h.fake.channel(room.channel_id).is_some());
    assert_eq!(h.db.rooms().list(GUILD).await.unwrap().len(), 1);

    // The next departure-shaped event retries the teardown.
    voice_move(&h, GUILD, ALICE, "alice", Some(room.channel_id), None).await;
    assert!(h.db.rooms().list(GUILD).await.unwrap().is_empty());
    assert!(h.fake.channel(room.channel_id).is_none());
}

#[tokio::test]
async fn lobby_reentry_from_own_room_recycles_the_old_room() {
    let h = harness().await;
    let config = setup_guild(&h, GUILD).await;

    voice_move(&h, GUILD, ALICE, "alice", None, Some(config.lobby_channel_id)).await;
    let first = h.db.rooms().list(GUILD).await.unwrap()[0];

    // A hops from their room straight back into the lobby: the emptied room
    // is torn down and a fresh one is spawned in the same event.
    voice_move(
        &h,
        GUILD,
        ALICE,
        "alice",
        Some(first.channel_id),
        Some(config.lobby_channel_id),
    )
    .await;

    let rooms = h.db.rooms().list(GUILD).await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_ne!(rooms[0].channel_id, first.channel_id);
    assert!(h.fake.channel(first.channel_id).is_none());
    assert_eq!(h.fake.voice_channel_of(GUILD, ALICE), Some(rooms[0].channel_id));
}

#[tokio::test]
async fn mute_style_events_are_ignored() {
    let h = harness().await;
    let config = setup_guild(&h, GUILD).await;

    voice_move(&h, GUILD, ALICE, "alice", None, Some(config.lobby_channel_id)).await;
    let room = h.db.rooms().list(GUILD).await.unwrap()[0];
    let calls_before = h.fake.call_count();

    // Same channel on both sides, as mute/deafen updates arrive.
    voice_move(
        &h,
        GUILD,
        ALICE,
        "alice",
        Some(room.channel_id),
        Some(room.channel_id),
    )
    .await;

    assert_eq!(h.fake.call_count(), calls_before);
    assert_eq!(h.db.rooms().list(GUILD).await.unwrap().len(), 1);
}
