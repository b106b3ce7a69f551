use tandem_core::{RoomId, SignalMessage};

use crate::integration::{create_service, init_tracing, test_config};
use crate::utils::{TestClient, negotiate};

#[tokio::test]
async fn test_messages_arrive_in_order() {
    init_tracing();

    let service = create_service(test_config());
    let room = RoomId::from("ordered");

    let mut a = TestClient::connect(&service).await.expect("Client a");
    let mut b = TestClient::connect(&service).await.expect("Client b");
    a.join(&room).await.expect("a join");
    b.join(&room).await.expect("b join");
    negotiate(&mut a, &mut b).await.expect("Negotiation");

    for i in 0..20 {
        a.ice(None, &format!("candidate:{i}")).await;
    }

    let mut received = Vec::new();
    while received.len() < 20 {
        if let SignalMessage::IceCandidate { payload, .. } = b
            .expect(|m| matches!(m, SignalMessage::IceCandidate { .. }))
            .await
            .expect("b should get every candidate")
        {
            received.push(payload);
        }
    }

    let expected: Vec<String> = (0..20).map(|i| format!("candidate:{i}")).collect();
    assert_eq!(received, expected);
}
