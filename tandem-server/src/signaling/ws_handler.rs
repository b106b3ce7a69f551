use crate::SignalingService;
use crate::error::SignalError;
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{Message, WebSocket};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tandem_core::SignalMessage;
use tracing::{debug, error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    let max_frame = service.config().max_payload_bytes.saturating_mul(2);

    ws.max_message_size(max_frame)
        .on_upgrade(move |socket| handle_socket(socket, service))
}

async fn handle_socket(socket: WebSocket, service: SignalingService) {
    let (mut sender, mut receiver) = socket.split();

    let mut channel = match service.connect() {
        Ok(channel) => channel,
        Err(e) => {
            warn!("Rejecting WebSocket connection: {}", e);
            if let Some(frame) = encode(&e.to_message()) {
                let _ = sender.send(frame).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let client_id = channel.id().clone();
    let cancel = channel.cancellation();
    info!("New WebSocket connection: {}", client_id);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = channel.receive().await {
            let Some(frame) = encode(&msg) else {
                continue;
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }

        // eviction reasons are told to the client before the socket closes
        if let Some(kind) = channel.close_reason() {
            let notice = SignalMessage::error(kind, kind.as_str());
            if let Some(frame) = encode(&notice) {
                let _ = sender.send(frame).await;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
        channel.cancellation().cancel();
    });

    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break,
            frame = receiver.next() => frame,
        };

        // handled outside the select so a join is never abandoned halfway
        match frame {
            Some(Ok(Message::Text(text))) => {
                service.handle_frame(&client_id, text.as_str()).await;
            }
            Some(Ok(Message::Binary(_))) => {
                service.registry().touch(&client_id);
                let err = SignalError::InvalidPayload("binary frames are not supported".into());
                let _ = service.send(&client_id, err.to_message());
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                service.registry().touch(&client_id);
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                debug!("WebSocket error from {}: {}", client_id, e);
                break;
            }
        }
    }

    service.disconnect(&client_id).await;
    cancel.cancel();

    if let Err(e) = send_task.await {
        error!("Send task for {} failed: {}", client_id, e);
    }
    info!("WebSocket disconnected: {}", client_id);
}

fn encode(message: &SignalMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to encode {}: {}", message.type_name(), e);
            None
        }
    }
}
