use std::time::Duration;

use bytes::Bytes;
use tokio::time::{sleep, timeout};

use crate::conversation::{MessageKind, Role};
use crate::transport::scripted::{
    ScriptedChunk, ScriptedReply, ScriptedTransport,
};
use crate::{
    ChatSession, ChatSessionBuilder, ChatView, ConnectionState,
    NetworkMonitor, NetworkStatus, PartialReplyPolicy, SessionConfig,
    SubmitError, TransportError,
};

fn build_session(
    transport: &ScriptedTransport,
    config: SessionConfig,
) -> ChatSession {
    ChatSessionBuilder::with_transport(transport.clone())
        .with_config(config)
        .build()
}

async fn wait_until(
    session: &ChatSession,
    pred: impl Fn(&ChatView) -> bool,
) -> ChatView {
    let mut rx = session.subscribe();
    timeout(Duration::from_secs(600), rx.wait_for(|view| pred(view)))
        .await
        .expect("view never reached the expected state")
        .unwrap()
        .clone()
}

fn answer_done(expected: &'static str) -> impl Fn(&ChatView) -> bool {
    move |view| {
        view.connection == ConnectionState::Idle
            && !view.is_typing()
            && view.transcript.assistant_tail() == Some(expected)
    }
}

fn summary(view: &ChatView) -> Vec<(Role, String)> {
    view.transcript
        .messages()
        .iter()
        .map(|msg| (msg.role, msg.text.clone()))
        .collect()
}

fn data(millis: u64, text: &'static str) -> ScriptedChunk {
    ScriptedChunk::Data(
        Duration::from_millis(millis),
        Bytes::from_static(text.as_bytes()),
    )
}

#[tokio::test(start_paused = true)]
async fn test_simple_question() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::text(["4"]));
    let session = build_session(&transport, SessionConfig::default());

    session.submit("What is 2+2?").unwrap();
    let view = wait_until(&session, answer_done("4")).await;

    assert_eq!(
        summary(&view),
        [
            (Role::User, "What is 2+2?".to_owned()),
            (Role::Assistant, "4".to_owned())
        ]
    );
    assert_eq!(view.retry_count, 0);
    assert_eq!(transport.questions(), ["What is 2+2?"]);
}

#[tokio::test(start_paused = true)]
async fn test_chunks_render_in_order() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::text(["ab", "cd", "ef"]));
    let session = build_session(&transport, SessionConfig::default());

    session.submit("letters").unwrap();
    let view = wait_until(&session, answer_done("abcdef")).await;
    assert_eq!(view.transcript.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_split_utf8_sequence() {
    let transport = ScriptedTransport::default();
    let bytes = "世界".as_bytes();
    transport.push(ScriptedReply::Stream(vec![
        ScriptedChunk::Data(
            Duration::from_millis(5),
            Bytes::copy_from_slice(&bytes[..2]),
        ),
        ScriptedChunk::Data(
            Duration::from_millis(5),
            Bytes::copy_from_slice(&bytes[2..]),
        ),
    ]));
    let session = build_session(&transport, SessionConfig::default());

    session.submit("hello").unwrap();
    wait_until(&session, answer_done("世界")).await;
}

#[tokio::test(start_paused = true)]
async fn test_no_response_exhausts_retries() {
    let transport = ScriptedTransport::default();
    for _ in 0..4 {
        transport.push(ScriptedReply::Hang);
    }
    let session = build_session(&transport, SessionConfig::default());
    session.submit("Anyone there?").unwrap();

    let view = wait_until(&session, |view| {
        view.connection == ConnectionState::Retrying
    })
    .await;
    assert_eq!(view.retry_count, 1);
    assert_eq!(view.status_text().as_deref(), Some("Retrying (1/3)..."));
    // The answer placeholder stays last while retrying.
    assert_eq!(view.transcript.last().unwrap().role, Role::Assistant);

    let view = wait_until(&session, |view| {
        view.connection == ConnectionState::Error
    })
    .await;
    assert_eq!(view.retry_count, 3);
    assert_eq!(transport.request_count(), 4);
    assert_eq!(
        summary(&view),
        [
            (Role::User, "Anyone there?".to_owned()),
            (Role::System, "Connection failed, retrying 1".to_owned()),
            (Role::System, "Connection failed, retrying 2".to_owned()),
            (Role::System, "Connection failed, retrying 3".to_owned()),
            (
                Role::System,
                "Request timeout. Check your network.".to_owned()
            ),
        ]
    );
    assert_eq!(
        view.transcript.last().unwrap().kind,
        Some(MessageKind::Error)
    );
    assert!(view.accepts_input());
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delays() {
    let transport = ScriptedTransport::default();
    for _ in 0..3 {
        transport.push(ScriptedReply::http_error(503));
    }
    transport.push(ScriptedReply::text(["up"]));
    let session = build_session(&transport, SessionConfig::default());

    let start = tokio::time::Instant::now();
    session.submit("ping").unwrap();
    let view = wait_until(&session, answer_done("up")).await;
    // 1s + 2s + 4s of backoff before the fourth attempt.
    assert!(start.elapsed() >= Duration::from_secs(7));
    assert!(start.elapsed() < Duration::from_secs(8));
    assert_eq!(view.retry_count, 0);
    assert_eq!(transport.request_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_http_error_message() {
    let transport = ScriptedTransport::default();
    for _ in 0..2 {
        transport.push(ScriptedReply::http_error(500));
    }
    let config = SessionConfig::builder().with_max_retries(1).build();
    let session = build_session(&transport, config);

    session.submit("boom").unwrap();
    let view = wait_until(&session, |view| {
        view.connection == ConnectionState::Error
    })
    .await;
    assert_eq!(
        view.transcript.last().unwrap().text,
        "Server error: HTTP 500 Internal Server Error"
    );
}

#[tokio::test(start_paused = true)]
async fn test_stream_timeout_then_success() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::Stream(vec![ScriptedChunk::Stall]));
    transport.push(ScriptedReply::text(["ok"]));
    let session = build_session(&transport, SessionConfig::default());

    let start = tokio::time::Instant::now();
    session.submit("slow").unwrap();
    let view = wait_until(&session, answer_done("ok")).await;
    assert!(start.elapsed() >= Duration::from_secs(11));
    assert_eq!(
        summary(&view)[1],
        (Role::System, "Connection failed, retrying 1".to_owned())
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_body_is_retried() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::Stream(vec![]));
    transport.push(ScriptedReply::text(["second"]));
    let session = build_session(&transport, SessionConfig::default());

    session.submit("hello").unwrap();
    wait_until(&session, answer_done("second")).await;
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_stream() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::Stream(vec![
        data(5, "Hello"),
        ScriptedChunk::Stall,
    ]));
    let session = build_session(&transport, SessionConfig::default());

    session.submit("Greet me").unwrap();
    wait_until(&session, |view| {
        view.transcript.assistant_tail().is_some_and(|t| t.len() >= 2)
    })
    .await;
    session.cancel();

    let view = wait_until(&session, |view| {
        view.transcript
            .last()
            .is_some_and(|msg| msg.text == "Request cancelled")
    })
    .await;
    assert_eq!(view.connection, ConnectionState::Idle);
    assert!(!view.is_typing());
    let partial = view.transcript.messages()[1].text.clone();
    assert!("Hello".starts_with(&partial));

    // Nothing is revealed after cancelling, and no retry happens.
    sleep(Duration::from_secs(30)).await;
    let view = session.view();
    assert_eq!(view.transcript.messages()[1].text, partial);
    assert_eq!(view.transcript.len(), 3);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_response() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::Hang);
    let session = build_session(&transport, SessionConfig::default());

    session.submit("Hi").unwrap();
    wait_until(&session, |view| {
        view.connection == ConnectionState::Connecting
    })
    .await;
    session.cancel();

    let view = wait_until(&session, |view| {
        view.connection == ConnectionState::Idle
            && view.transcript.len() == 2
    })
    .await;
    assert_eq!(
        summary(&view),
        [
            (Role::User, "Hi".to_owned()),
            (Role::System, "Request cancelled".to_owned())
        ]
    );
    assert_eq!(
        view.transcript.last().unwrap().kind,
        Some(MessageKind::Info)
    );
}

#[tokio::test(start_paused = true)]
async fn test_resubmit_after_cancel_ignores_old_attempt() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::Stream(vec![data(50, "stale")]));
    transport.push(ScriptedReply::text(["fresh"]));
    let session = build_session(&transport, SessionConfig::default());

    session.submit("one").unwrap();
    wait_until(&session, |view| view.connection.is_active()).await;
    session.cancel();
    session.submit("two").unwrap();

    wait_until(&session, answer_done("fresh")).await;
    sleep(Duration::from_secs(1)).await;
    let view = session.view();
    assert!(
        view.transcript
            .messages()
            .iter()
            .all(|msg| !msg.text.contains("stale"))
    );
    assert_eq!(transport.questions(), ["one", "two"]);
}

#[tokio::test(start_paused = true)]
async fn test_submit_while_busy_is_ignored() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::text(["first"]));
    transport.push(ScriptedReply::text(["second"]));
    let session = build_session(&transport, SessionConfig::default());

    session.submit("one").unwrap();
    session.submit("two").unwrap();
    let view = wait_until(&session, answer_done("first")).await;
    assert_eq!(view.transcript.len(), 2);
    assert_eq!(transport.questions(), ["one"]);
}

#[tokio::test(start_paused = true)]
async fn test_next_question_finishes_previous_answer() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::text(["a long answer"]));
    transport.push(ScriptedReply::text(["b"]));
    let session = build_session(&transport, SessionConfig::default());

    session.submit("one").unwrap();
    // The stream is done long before the answer is fully revealed.
    let view = wait_until(&session, |view| {
        view.connection == ConnectionState::Idle && view.is_typing()
    })
    .await;
    assert_ne!(view.transcript.assistant_tail(), Some("a long answer"));

    session.submit("two").unwrap();
    let view = wait_until(&session, answer_done("b")).await;
    assert_eq!(view.transcript.messages()[1].text, "a long answer");
}

#[tokio::test(start_paused = true)]
async fn test_restart_partial_answer() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::Stream(vec![
        data(5, "Par"),
        ScriptedChunk::Error(
            Duration::from_millis(5),
            TransportError::Body("connection reset".into()),
        ),
    ]));
    transport.push(ScriptedReply::text(["Full answer"]));
    let session = build_session(&transport, SessionConfig::default());

    session.submit("Tell me").unwrap();
    let view = wait_until(&session, answer_done("Full answer")).await;
    assert_eq!(
        summary(&view),
        [
            (Role::User, "Tell me".to_owned()),
            (Role::System, "Connection failed, retrying 1".to_owned()),
            (Role::Assistant, "Full answer".to_owned())
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_keep_partial_answer() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::Stream(vec![
        data(5, "Par"),
        ScriptedChunk::Error(
            Duration::from_millis(5),
            TransportError::Body("connection reset".into()),
        ),
    ]));
    let config = SessionConfig::builder()
        .with_partial_reply(PartialReplyPolicy::Keep)
        .build();
    let session = build_session(&transport, config);

    session.submit("Tell me").unwrap();
    let view = wait_until(&session, |view| {
        view.connection == ConnectionState::Error
    })
    .await;
    assert_eq!(
        summary(&view),
        [
            (Role::User, "Tell me".to_owned()),
            (Role::Assistant, "Par".to_owned()),
            (
                Role::System,
                "Connection failed. Try again later".to_owned()
            )
        ]
    );
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_offline_blocks_retry() {
    let transport = ScriptedTransport::default();
    transport.push(ScriptedReply::Fail(TransportError::Unreachable(
        "connection refused".into(),
    )));
    transport.push(ScriptedReply::text(["back"]));
    let (switch, monitor) = NetworkMonitor::manual(NetworkStatus::Online);
    let session = ChatSessionBuilder::with_transport(transport.clone())
        .with_network_monitor(monitor)
        .build();

    session.submit("Are you there?").unwrap();
    wait_until(&session, |view| {
        view.connection == ConnectionState::Retrying
    })
    .await;
    switch.set(NetworkStatus::Offline);

    let view = wait_until(&session, |view| {
        view.transcript.messages().iter().any(|msg| {
            msg.text.starts_with("Network offline detected during retry")
        })
    })
    .await;
    assert_eq!(view.network, NetworkStatus::Offline);
    assert!(!view.accepts_input());

    sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.request_count(), 1);
    assert_eq!(session.view().connection, ConnectionState::Retrying);

    switch.set(NetworkStatus::Online);
    let view = wait_until(&session, answer_done("back")).await;
    assert_eq!(transport.request_count(), 2);
    assert!(
        view.transcript
            .messages()
            .iter()
            .any(|msg| msg.text == "Network restored. Continuing...")
    );
}

#[tokio::test(start_paused = true)]
async fn test_submit_while_offline() {
    let transport = ScriptedTransport::default();
    let (_switch, monitor) = NetworkMonitor::manual(NetworkStatus::Offline);
    let session = ChatSessionBuilder::with_transport(transport.clone())
        .with_network_monitor(monitor)
        .build();

    session.submit("Hello?").unwrap();
    let view = wait_until(&session, |view| !view.transcript.is_empty()).await;
    assert_eq!(
        summary(&view),
        [(Role::System, "Network offline.".to_owned())]
    );
    assert_eq!(view.connection, ConnectionState::Idle);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_blank_question() {
    let transport = ScriptedTransport::default();
    let session = build_session(&transport, SessionConfig::default());

    assert_eq!(session.submit("   "), Err(SubmitError::MissingInput));
    assert_eq!(session.submit(""), Err(SubmitError::MissingInput));
    sleep(Duration::from_secs(1)).await;

    let view = session.view();
    assert!(view.transcript.is_empty());
    assert_eq!(view.connection, ConnectionState::Idle);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_closed_session() {
    let transport = ScriptedTransport::default();
    let session = build_session(&transport, SessionConfig::default());

    session.close();
    while !session.is_closed() {
        tokio::task::yield_now().await;
    }
    assert_eq!(session.submit("Hi"), Err(SubmitError::SessionClosed));
}

#[tokio::test]
async fn test_closed_session_releases_network_probe() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tokio::spawn(async move {
        while listener.accept().await.is_ok() {}
    });

    let (monitor, probe) =
        NetworkMonitor::probe(addr, Duration::from_millis(10));
    let transport = ScriptedTransport::default();
    let session = ChatSessionBuilder::with_transport(transport)
        .with_network_monitor(monitor)
        .build();

    // Let the probe run a few rounds against a stable network.
    sleep(Duration::from_millis(50)).await;
    assert!(!probe.is_finished());

    session.close();
    drop(session);
    timeout(Duration::from_secs(2), probe)
        .await
        .expect("network probe kept running after the session closed")
        .unwrap();
    server.abort();
}
