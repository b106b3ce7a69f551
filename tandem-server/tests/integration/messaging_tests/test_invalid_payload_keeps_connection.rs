use tandem_core::{ErrorKind, RoomId, SignalMessage};

use crate::integration::{create_service, init_tracing, test_config};
use crate::utils::{TestClient, negotiate};

#[tokio::test]
async fn test_malformed_frame_keeps_connection() {
    init_tracing();

    let service = create_service(test_config());
    let mut a = TestClient::connect(&service).await.expect("Client a");

    a.send_raw("{not json").await;
    a.expect_error(ErrorKind::InvalidPayload)
        .await
        .expect("Malformed frame should be reported");

    a.send_raw(r#"{"type":"teleport"}"#).await;
    a.expect_error(ErrorKind::InvalidPayload)
        .await
        .expect("Unknown type should be reported");

    // server-only messages are rejected too
    a.send(SignalMessage::Ping { seq: 1 }).await;
    a.expect_error(ErrorKind::InvalidPayload)
        .await
        .expect("Ping from a client should be rejected");

    assert!(service.registry().contains(a.id()));
    assert!(!a.channel.is_closed());

    a.join(&RoomId::from("still-works"))
        .await
        .expect("Client should still be usable");
}

#[tokio::test]
async fn test_relay_outside_room_is_rejected() {
    init_tracing();

    let service = create_service(test_config());
    let mut a = TestClient::connect(&service).await.expect("Client a");

    a.ice(None, "candidate:1").await;
    a.expect_error(ErrorKind::NotFound)
        .await
        .expect("Relay outside a room should fail");
}

#[tokio::test]
async fn test_oversized_payload_is_dropped() {
    init_tracing();

    let mut config = test_config();
    config.max_payload_bytes = 1024;
    let service = create_service(config);
    let room = RoomId::from("big");

    let mut a = TestClient::connect(&service).await.expect("Client a");
    let mut b = TestClient::connect(&service).await.expect("Client b");
    a.join(&room).await.expect("a join");
    b.join(&room).await.expect("b join");
    negotiate(&mut a, &mut b).await.expect("Negotiation");

    a.ice(None, &"x".repeat(2048)).await;
    a.expect_error(ErrorKind::InvalidPayload)
        .await
        .expect("Oversized payload should be rejected");

    a.ice(None, "").await;
    a.expect_error(ErrorKind::InvalidPayload)
        .await
        .expect("Empty payload should be rejected");

    let relayed = b.drain().await;
    assert!(
        !relayed
            .iter()
            .any(|m| matches!(m, SignalMessage::IceCandidate { .. })),
        "nothing should be relayed, got {:?}",
        relayed
    );
}

#[tokio::test]
async fn test_answer_without_offer_is_invalid_state() {
    init_tracing();

    let service = create_service(test_config());
    let room = RoomId::from("early-answer");

    let mut a = TestClient::connect(&service).await.expect("Client a");
    let mut b = TestClient::connect(&service).await.expect("Client b");
    a.join(&room).await.expect("a join");
    b.join(&room).await.expect("b join");

    b.answer(None, "v=0 answer", 0).await;
    b.expect_error(ErrorKind::InvalidState)
        .await
        .expect("Answer before any offer should fail");

    assert!(!b.channel.is_closed());
}
