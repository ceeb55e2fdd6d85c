//! Persistent push listener: backoff, attempt reset, terminal errors, and
//! cancellation.

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use agent_stream::models::hitl::HitlKind;
use agent_stream::session::reconnect::ConnectionState;
use agent_stream::stream::events::DomainEvent;
use agent_stream::AppError;

use super::test_helpers::{drain, scripted_client, sse, Connect, ScriptedConnector, ScriptedTransport};

async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("listener finished in time")
}

/// Every attempt fails: the first try plus `max_attempts` retries, then a
/// terminal `ReconnectFailed`.
#[tokio::test]
async fn exhausted_retries_surface_reconnect_failed() {
    let transport = ScriptedTransport::new(Vec::new());
    let (client, _events) = scripted_client(&transport);
    let connector = ScriptedConnector::new(Vec::new());
    let state = client.connection_state();

    let result = within(client.listen(&connector, &CancellationToken::new())).await;

    assert_eq!(result, Err(AppError::ReconnectFailed { attempts: 3 }));
    assert_eq!(connector.attempts(), 4);
    assert_eq!(*state.borrow(), ConnectionState::ReconnectFailed { attempts: 3 });
}

/// A successful connection resets the counter, so earlier failures do not
/// count against the retries after a later drop.
#[tokio::test]
async fn successful_connection_resets_attempts() {
    let transport = ScriptedTransport::new(Vec::new());
    let (client, mut events) = scripted_client(&transport);
    let refused = || Connect::Fail(AppError::Transport("refused".into()));
    let connector = ScriptedConnector::new(vec![
        refused(),
        refused(),
        Connect::Drop(vec![sse(&[("thinking", json!({"message": "pushed"}))])]),
    ]);

    let result = within(client.listen(&connector, &CancellationToken::new())).await;

    // 2 failures and 1 success, then 3 failed retries after the drop.
    assert_eq!(result, Err(AppError::ReconnectFailed { attempts: 3 }));
    assert_eq!(connector.attempts(), 6);
    assert_eq!(
        drain(&mut events),
        vec![DomainEvent::Thinking {
            message: "pushed".into()
        }]
    );
}

#[tokio::test]
async fn protocol_rejection_is_not_retried() {
    let transport = ScriptedTransport::new(Vec::new());
    let (client, _events) = scripted_client(&transport);
    let rejected = AppError::Protocol {
        status: 403,
        detail: "forbidden".into(),
    };
    let connector = ScriptedConnector::new(vec![Connect::Fail(rejected.clone())]);

    let result = within(client.listen(&connector, &CancellationToken::new())).await;

    assert_eq!(result, Err(rejected));
    assert_eq!(connector.attempts(), 1);
    assert_eq!(*client.connection_state().borrow(), ConnectionState::Disconnected);
}

/// Pushed events feed the same state as message streams; cancelling the
/// caller's token stops the listener cleanly.
#[tokio::test]
async fn pushed_hitl_request_and_cancel() {
    let transport = ScriptedTransport::new(Vec::new());
    let (client, _events) = scripted_client(&transport);
    let connector = ScriptedConnector::new(vec![Connect::Hold(vec![sse(&[(
        "hitl_request",
        json!({"request_type": "plan", "plan": "1. load\n2. plot"}),
    )])])]);
    let cancel = CancellationToken::new();
    let mut state = client.connection_state();

    let listener = client.listen(&connector, &cancel);
    let observe = async {
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .expect("state channel open");
        while client.pending_hitl().await.is_none() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        cancel.cancel();
    };
    let (result, ()) = within(async { tokio::join!(listener, observe) }).await;

    assert_eq!(result, Ok(()));
    assert_eq!(connector.attempts(), 1);
    assert_eq!(
        client.pending_hitl().await.map(|r| r.kind),
        Some(HitlKind::Plan)
    );
    assert_eq!(*client.connection_state().borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn disconnect_stops_listener() {
    let transport = ScriptedTransport::new(Vec::new());
    let (client, _events) = scripted_client(&transport);
    let connector = ScriptedConnector::new(vec![Connect::Hold(Vec::new())]);
    let mut state = client.connection_state();
    let never = CancellationToken::new();

    let listener = client.listen(&connector, &never);
    let stop = async {
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .expect("state channel open");
        client.disconnect().await;
    };
    let (result, ()) = within(async { tokio::join!(listener, stop) }).await;

    assert_eq!(result, Ok(()));
    assert!(matches!(
        client.listen(&connector, &CancellationToken::new()).await,
        Err(AppError::Cancelled)
    ));
}
