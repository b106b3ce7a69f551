use tandem_core::{ClientId, RoomId};
use tandem_server::SignalError;

use crate::integration::{create_room_manager, init_tracing};

const CAPACITY: usize = 3;
const STEPS: usize = 200;

#[tokio::test]
async fn test_membership_invariants_hold_across_joins_and_leaves() {
    init_tracing();

    let (manager, _signaling, _signal_rx) = create_room_manager(CAPACITY);
    let room = RoomId::from("churn");
    let clients: Vec<ClientId> = (1..=6).map(ClientId::from_sequence).collect();

    let mut members: Vec<ClientId> = Vec::new();
    let mut rng: u64 = 0x2545_f491_4f6c_dd1d;

    for step in 0..STEPS {
        rng = rng
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let client = &clients[(rng >> 33) as usize % clients.len()];

        if members.contains(client) {
            assert!(manager.leave(client, &room).await, "step {step}");
            members.retain(|m| m != client);
        } else {
            let result = manager.join(client, &room).await;
            if members.len() < CAPACITY {
                result.unwrap_or_else(|e| panic!("step {step}: join failed: {e}"));
                members.push(client.clone());
            } else {
                assert!(
                    matches!(result, Err(SignalError::RoomFull(_))),
                    "step {step}: {:?}",
                    result
                );
            }
        }

        match manager.snapshot(&room).await {
            Some(snapshot) => {
                assert!(snapshot.members.len() <= CAPACITY, "step {step}");
                assert_eq!(snapshot.members, members, "step {step}");

                // one session per member pair, none once a member is alone
                let n = members.len();
                assert_eq!(
                    snapshot.sessions.len(),
                    n * n.saturating_sub(1) / 2,
                    "step {step}"
                );
                for session in &snapshot.sessions {
                    assert!(members.contains(&session.offerer), "step {step}");
                    assert!(members.contains(&session.answerer), "step {step}");
                    assert!(session.offerer < session.answerer, "step {step}");
                }
            }
            None => assert!(
                members.is_empty(),
                "step {step}: room vanished with members {:?}",
                members
            ),
        }
    }
}
