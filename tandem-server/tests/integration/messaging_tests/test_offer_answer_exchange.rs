use tandem_core::{RoomId, SignalMessage};
use tandem_server::NegotiationState;

use crate::integration::{create_service, init_tracing, test_config};
use crate::utils::TestClient;

#[tokio::test]
async fn test_offer_answer_exchange() {
    init_tracing();

    let service = create_service(test_config());
    let room = RoomId::from("call-1");

    let mut a = TestClient::connect(&service).await.expect("Client a");
    let mut b = TestClient::connect(&service).await.expect("Client b");
    let (a_id, b_id) = (a.id().clone(), b.id().clone());

    let members = a.join(&room).await.expect("a join");
    assert_eq!(members, vec![a_id.clone()]);

    let members = b.join(&room).await.expect("b join");
    assert_eq!(members, vec![a_id.clone(), b_id.clone()]);

    let joined = a
        .expect(|m| matches!(m, SignalMessage::PeerJoined { .. }))
        .await
        .expect("a should see b join");
    assert_eq!(joined, SignalMessage::PeerJoined { from: b_id.clone() });

    // the smaller id makes the offer
    let start = a
        .expect(|m| matches!(m, SignalMessage::StartOffer { .. }))
        .await
        .expect("a should be asked to offer");
    assert_eq!(
        start,
        SignalMessage::StartOffer {
            peer: b_id.clone(),
            seq: 0
        }
    );

    a.offer(None, "v=0 offer-a", 0).await;
    let offer = b
        .expect(|m| matches!(m, SignalMessage::Offer { .. }))
        .await
        .expect("b should get the offer");
    assert_eq!(
        offer,
        SignalMessage::Offer {
            from: Some(a_id.clone()),
            to: Some(b_id.clone()),
            payload: "v=0 offer-a".to_string(),
            seq: Some(0),
        }
    );

    b.answer(None, "v=0 answer-b", 0).await;
    let answer = a
        .expect(|m| matches!(m, SignalMessage::Answer { .. }))
        .await
        .expect("a should get the answer");
    assert_eq!(
        answer,
        SignalMessage::Answer {
            from: Some(b_id.clone()),
            to: Some(a_id.clone()),
            payload: "v=0 answer-b".to_string(),
            seq: Some(0),
        }
    );

    let snapshot = service.rooms().snapshot(&room).await.expect("Room alive");
    assert_eq!(snapshot.sessions.len(), 1);
    assert_eq!(snapshot.sessions[0].state, NegotiationState::Connected);

    b.ice(None, "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host").await;
    let ice = a
        .expect(|m| matches!(m, SignalMessage::IceCandidate { .. }))
        .await
        .expect("a should get b's candidate");
    assert_eq!(
        ice,
        SignalMessage::IceCandidate {
            from: Some(b_id.clone()),
            to: Some(a_id.clone()),
            payload: "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host".to_string(),
        }
    );
}

#[tokio::test]
async fn test_sender_cannot_spoof_from() {
    init_tracing();

    let service = create_service(test_config());
    let room = RoomId::from("spoof");

    let mut a = TestClient::connect(&service).await.expect("Client a");
    let mut b = TestClient::connect(&service).await.expect("Client b");
    a.join(&room).await.expect("a join");
    b.join(&room).await.expect("b join");

    a.send(SignalMessage::IceCandidate {
        from: Some(tandem_core::ClientId::from("someone-else")),
        to: None,
        payload: "candidate:spoofed".to_string(),
    })
    .await;

    let SignalMessage::IceCandidate { from, .. } = b
        .expect(|m| matches!(m, SignalMessage::IceCandidate { .. }))
        .await
        .expect("b should get the candidate")
    else {
        unreachable!();
    };
    assert_eq!(from.as_ref(), Some(a.id()));
}

#[tokio::test]
async fn test_renegotiation_from_answerer() {
    init_tracing();

    let service = create_service(test_config());
    let room = RoomId::from("renegotiate");

    let mut a = TestClient::connect(&service).await.expect("Client a");
    let mut b = TestClient::connect(&service).await.expect("Client b");
    a.join(&room).await.expect("a join");
    b.join(&room).await.expect("b join");

    crate::utils::negotiate(&mut a, &mut b)
        .await
        .expect("Initial negotiation");

    // b adds a track and offers again over the live connection
    b.offer(None, "v=0 offer-b-2", 0).await;
    a.expect(|m| matches!(m, SignalMessage::Offer { .. }))
        .await
        .expect("a should get the renegotiation offer");

    let snapshot = service.rooms().snapshot(&room).await.expect("Room alive");
    assert_eq!(snapshot.sessions[0].state, NegotiationState::Renegotiating);

    a.answer(None, "v=0 answer-a-2", 0).await;
    b.expect(|m| matches!(m, SignalMessage::Answer { .. }))
        .await
        .expect("b should get the answer");

    let snapshot = service.rooms().snapshot(&room).await.expect("Room alive");
    assert_eq!(snapshot.sessions[0].state, NegotiationState::Connected);
}
