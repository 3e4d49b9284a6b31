//! Device integration tests
//!
//! A simulated device sits on the far end of an in-memory duplex stream
//! and answers frames the way firmware does.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::DuplexStream;
use tokio::net::TcpListener;
use tokio::time::{timeout, Instant};
use tokio_util::codec::Framed;

use sofia_client::{Device, Session, SessionState};
use sofia_core::config::DeviceConfig;
use sofia_core::{ConnectionError, SessionError};
use sofia_protocol::{CorrelationId, Frame, FrameCodec, MessageId, ReturnCode, SessionId};

/// Upper bound on waiting for the client to write something
///
/// Long enough that paused-clock tests reach their keepalive deadlines first.
const FRAME_WAIT: Duration = Duration::from_secs(600);

/// Far end of the connection, speaking as the device
struct SimulatedDevice {
    framed: Framed<DuplexStream, FrameCodec>,
}

impl SimulatedDevice {
    async fn next_frame(&mut self) -> Frame {
        timeout(FRAME_WAIT, self.framed.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Client closed the connection")
            .expect("Failed to decode frame")
    }

    async fn send(&mut self, frame: Frame) {
        self.framed.send(frame).await.expect("Failed to send frame");
    }

    /// Answer the next login request with success
    async fn accept_login(&mut self, session_id: u8, alive_interval: u32) -> Frame {
        let request = self.next_frame().await;
        assert_eq!(request.message_id, MessageId::LOGIN_REQ2);
        self.send(login_response(
            request.correlation_id,
            session_id,
            100,
            alive_interval,
        ))
        .await;
        request
    }
}

async fn attached(config: DeviceConfig) -> (Device, SimulatedDevice) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let device = Device::new(config);
    device.attach(client).await.expect("Failed to attach stream");
    (
        device,
        SimulatedDevice {
            framed: Framed::new(server, FrameCodec::new()),
        },
    )
}

fn login_response(correlation_id: CorrelationId, session_id: u8, ret: u32, alive: u32) -> Frame {
    let body = format!(
        r#"{{"AliveInterval":{},"ChannelNum":4,"DeviceType ":"DVR","ExtraChannel":0,"Ret":{},"SessionID":"0xABCDEF"}}"#,
        alive, ret
    );
    Frame::new(MessageId::LOGIN_RSP, body)
        .with_session(SessionId::new(session_id))
        .with_correlation(correlation_id)
}

fn reply(request: &Frame, body: &str) -> Frame {
    Frame::new(request.message_id.response(), body.to_string()).with_session(request.session_id)
}

fn json(frame: &Frame) -> Value {
    frame.json().expect("Payload is not JSON")
}

async fn logged_in(device: &Device, sim: &mut SimulatedDevice, session_id: u8) -> Session {
    let session = device
        .new_session("admin", "secret")
        .expect("Failed to create session");
    let (result, _) = tokio::join!(session.login(), sim.accept_login(session_id, 0));
    result.expect("Login failed");
    session
}

#[tokio::test]
async fn test_login_promotes_session() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;

    let session = device.new_session("admin", "secret").unwrap();
    assert_eq!(session.state(), SessionState::Pending);
    assert_eq!(session.correlation_id(), CorrelationId::new(1));
    assert_eq!(device.pending_sessions(), 1);

    let (result, request) = tokio::join!(session.login(), sim.accept_login(0x2A, 30));
    let response = result.unwrap();

    assert_eq!(request.correlation_id, CorrelationId::new(1));
    assert_eq!(request.session_id, SessionId::UNASSIGNED);
    assert_eq!(request.sequence, 0);
    let body = json(&request);
    assert_eq!(body["UserName"], "admin");
    assert_eq!(body["PassWord"], "secret");
    assert_eq!(body["LoginType"], "DVRIP-Web");
    assert_eq!(body["EncryptType"], "MD5");

    assert_eq!(response.ret, ReturnCode::OK);
    assert_eq!(response.device_type, "DVR");
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.session_id(), SessionId::new(0x2A));
    assert_eq!(session.session_text(), "0xABCDEF");
    assert_eq!(session.keepalive_interval(), Duration::from_secs(30));
    assert!(session.is_keepalive_running());
    assert_eq!(device.pending_sessions(), 0);
    assert_eq!(device.active_sessions(), 1);

    // Promotion released the correlation id
    let next = device.new_session("", "").unwrap();
    assert_eq!(next.correlation_id(), CorrelationId::new(1));
    assert_eq!(next.username(), "admin");
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_follows_advised_interval() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let session = device.new_session("admin", "secret").unwrap();
    let (result, _) = tokio::join!(session.login(), sim.accept_login(0x2A, 30));
    result.unwrap();
    let start = Instant::now();

    let first = sim.next_frame().await;
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(30), "fired after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(31), "fired after {:?}", elapsed);
    assert_eq!(first.message_id, MessageId::KEEPALIVE_REQ);
    assert_eq!(first.session_id, SessionId::new(0x2A));
    assert_eq!(first.sequence, 0);
    let body = json(&first);
    assert_eq!(body["Name"], "KeepAlive");
    assert_eq!(body["SessionID"], "0xABCDEF");
    sim.send(reply(
        &first,
        r#"{"Name":"KeepAlive","Ret":100,"SessionID":"0xABCDEF"}"#,
    ))
    .await;

    let second = sim.next_frame().await;
    assert!(start.elapsed() >= Duration::from_secs(60));
    assert_eq!(second.message_id, MessageId::KEEPALIVE_REQ);
    assert_eq!(second.sequence, 1);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_interval_change_resets_timer() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let session = device.new_session("admin", "secret").unwrap();
    let (result, _) = tokio::join!(session.login(), sim.accept_login(7, 30));
    result.unwrap();

    session.set_keepalive_interval(5).unwrap();
    let start = Instant::now();

    let frame = sim.next_frame().await;
    let elapsed = start.elapsed();
    assert_eq!(frame.message_id, MessageId::KEEPALIVE_REQ);
    assert!(elapsed >= Duration::from_secs(5), "fired after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "fired after {:?}", elapsed);
    assert_eq!(session.keepalive_interval(), Duration::from_secs(5));
    assert!(session.is_keepalive_running());

    session.set_keepalive_interval(0).unwrap();
    assert!(!session.is_keepalive_running());
}

#[tokio::test]
async fn test_login_rejected() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let session = device.new_session("admin", "wrong").unwrap();

    let responder = async {
        let request = sim.next_frame().await;
        sim.send(login_response(request.correlation_id, 0, 106, 20))
            .await;
    };
    let (result, _) = tokio::join!(session.login(), responder);

    match result {
        Err(SessionError::LoginRejected(ret)) => assert_eq!(ret, ReturnCode::BAD_CREDENTIALS),
        other => panic!("Expected LoginRejected, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.session_text(), "");
    assert!(!session.is_keepalive_running());
    assert_eq!(device.pending_sessions(), 0);
    assert_eq!(device.active_sessions(), 0);
}

#[tokio::test]
async fn test_malformed_login_response() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let session = device.new_session("admin", "secret").unwrap();

    let responder = async {
        let request = sim.next_frame().await;
        sim.send(
            Frame::new(MessageId::LOGIN_RSP, "not json")
                .with_correlation(request.correlation_id)
                .with_session(SessionId::new(3)),
        )
        .await;
    };
    let (result, _) = tokio::join!(session.login(), responder);

    assert!(matches!(result, Err(SessionError::MalformedPayload(_))));
    assert_eq!(session.keepalive_interval(), Duration::ZERO);
    assert!(!session.is_keepalive_running());

    // Routing already promoted the session; login leaves that in place
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.session_id(), SessionId::new(3));
    assert_eq!(session.session_text(), "");
    assert_eq!(device.pending_sessions(), 0);
    assert_eq!(device.active_sessions(), 1);
    assert!(matches!(
        session.login().await,
        Err(SessionError::AlreadyLoggedIn)
    ));
}

#[tokio::test]
async fn test_command_requires_login() {
    let (device, _sim) = attached(DeviceConfig::default()).await;
    let session = device.new_session("admin", "secret").unwrap();

    let result = session.command("SystemInfo", MessageId::SYSINFO_REQ).await;
    assert!(matches!(result, Err(SessionError::NotActive)));
    assert!(matches!(
        session.set_keepalive_interval(10),
        Err(SessionError::NotActive)
    ));
}

#[tokio::test]
async fn test_commands_resolve_in_order() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let session = logged_in(&device, &mut sim, 0x2A).await;

    let reply_a = r#"{"Name":"SystemInfo","Ret":100,"SessionID":"0xABCDEF","Tag":"A"}"#;
    let reply_b = r#"{"Name":"SystemInfo","Ret":100,"SessionID":"0xABCDEF","Tag":"B"}"#;

    // Both replies are queued as soon as the first request arrives
    let responder = async {
        let request = sim.next_frame().await;
        assert_eq!(request.session_id, SessionId::new(0x2A));
        assert_eq!(request.sequence, 0);
        assert_eq!(json(&request)["SessionID"], "0xABCDEF");
        sim.send(reply(&request, reply_a)).await;
        sim.send(reply(&request, reply_b)).await;
    };
    let (a, _) = tokio::join!(
        session.command("SystemInfo", MessageId::SYSINFO_REQ),
        responder
    );
    assert_eq!(&a.unwrap()[..], reply_a.as_bytes());

    let (b, _) = tokio::join!(
        session.command("SystemInfo", MessageId::SYSINFO_REQ),
        sim.next_frame()
    );
    assert_eq!(&b.unwrap()[..], reply_b.as_bytes());
    assert_eq!(session.sequence(), 2);
}

#[tokio::test]
async fn test_out_of_order_replies_are_not_reordered() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let session = logged_in(&device, &mut sim, 0x2A).await;

    let reply_a = r#"{"Name":"A","Ret":100,"SessionID":"0xABCDEF"}"#;
    let reply_b = r#"{"Name":"B","Ret":100,"SessionID":"0xABCDEF"}"#;

    let responder = async {
        let request = sim.next_frame().await;
        sim.send(reply(&request, reply_b)).await;
        sim.send(reply(&request, reply_a)).await;
    };
    let (a, _) = tokio::join!(session.command("A", MessageId::CONFIG_GET), responder);
    let (b, _) = tokio::join!(
        session.command("B", MessageId::CONFIG_GET),
        sim.next_frame()
    );

    // Replies are taken in arrival order, not matched to requests
    assert_eq!(&a.unwrap()[..], reply_b.as_bytes());
    assert_eq!(&b.unwrap()[..], reply_a.as_bytes());
}

#[tokio::test]
async fn test_unknown_frames_are_dropped() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let session = logged_in(&device, &mut sim, 5).await;

    let responder = async {
        let request = sim.next_frame().await;
        sim.send(
            Frame::new(MessageId::SYSINFO_RSP, r#"{"Ret":100}"#).with_session(SessionId::new(99)),
        )
        .await;
        sim.send(login_response(CorrelationId::new(77), 8, 100, 20))
            .await;
        sim.send(reply(
            &request,
            r#"{"Name":"General.General","Ret":100,"SessionID":"0xABCDEF","General.General":{"MachineName":"LocalHost"}}"#,
        ))
        .await;
    };
    let (result, _) = tokio::join!(session.config("General.General"), responder);

    let body = result.unwrap();
    assert_eq!(body.name, "General.General");
    assert_eq!(
        body.section().unwrap()["MachineName"],
        Value::from("LocalHost")
    );
    assert_eq!(session.sequence(), 1);
    assert_eq!(device.active_sessions(), 1);
    assert!(device.is_connected());
}

#[tokio::test]
async fn test_sessions_are_routed_independently() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let first = device.new_session("admin", "one").unwrap();
    let second = device.new_session("guest", "two").unwrap();

    // Answer the logins in reverse order of arrival
    let responder = async {
        let a = sim.next_frame().await;
        let b = sim.next_frame().await;
        for request in [b, a] {
            let session_id = request.correlation_id.as_u8() * 10;
            sim.send(login_response(request.correlation_id, session_id, 100, 0))
                .await;
        }
    };
    let (r1, r2, _) = tokio::join!(first.login(), second.login(), responder);
    r1.unwrap();
    r2.unwrap();
    assert_eq!(first.session_id(), SessionId::new(10));
    assert_eq!(second.session_id(), SessionId::new(20));

    let responder = async {
        let a = sim.next_frame().await;
        let b = sim.next_frame().await;
        for request in [b, a] {
            let body = format!(
                r#"{{"Name":"OEMInfo","Ret":100,"SessionID":"0xABCDEF","OEMInfo":{{"Session":{}}}}}"#,
                request.session_id.as_u8()
            );
            sim.send(reply(&request, &body)).await;
        }
    };
    let (o1, o2, _) = tokio::join!(first.oem_info(), second.oem_info(), responder);

    assert_eq!(o1.unwrap().section().unwrap()["Session"], 10);
    assert_eq!(o2.unwrap().section().unwrap()["Session"], 20);
}

#[tokio::test]
async fn test_typed_commands() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let session = logged_in(&device, &mut sim, 1).await;

    let responder = async {
        let request = sim.next_frame().await;
        assert_eq!(request.message_id, MessageId::SYSINFO_REQ);
        assert_eq!(json(&request)["Name"], "SystemInfo");
        sim.send(reply(
            &request,
            r#"{"Name":"SystemInfo","Ret":100,"SessionID":"0xABCDEF","SystemInfo":{"DeviceModel":"NBD80X16S","SerialNo":"abc123","VideoInChannel":16}}"#,
        ))
        .await;
    };
    let (info, _) = tokio::join!(session.system_info(), responder);
    let info = info.unwrap();
    assert_eq!(info.device_model, "NBD80X16S");
    assert_eq!(info.serial_no, "abc123");
    assert_eq!(info.video_in_channel, 16);

    let responder = async {
        let request = sim.next_frame().await;
        assert_eq!(request.message_id, MessageId::ABILITY_GET);
        sim.send(reply(
            &request,
            r#"{"Name":"SystemFunction","Ret":107,"SessionID":"0xABCDEF"}"#,
        ))
        .await;
    };
    let (abilities, _) = tokio::join!(session.abilities(), responder);
    match abilities {
        Err(SessionError::CommandFailed { name, ret }) => {
            assert_eq!(name, "SystemFunction");
            assert_eq!(ret, ReturnCode::NO_PERMISSION);
        }
        other => panic!("Expected CommandFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_loss_unblocks_sessions() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let session = logged_in(&device, &mut sim, 4).await;

    let hang_up = async move {
        sim.next_frame().await;
        drop(sim);
    };
    let (result, _) = tokio::join!(
        session.command("SystemInfo", MessageId::SYSINFO_REQ),
        hang_up
    );

    assert!(matches!(result, Err(SessionError::Closed)));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!device.is_connected());
    assert_eq!(device.active_sessions(), 0);

    let frame = Frame::new(MessageId::KEEPALIVE_REQ, "{}");
    assert!(matches!(
        device.send(frame).await,
        Err(ConnectionError::Closed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reply_timeout() {
    let config = DeviceConfig {
        response_timeout: Some(Duration::from_secs(2)),
        ..DeviceConfig::default()
    };
    let (device, mut sim) = attached(config).await;
    let session = logged_in(&device, &mut sim, 9).await;

    let (result, _) = tokio::join!(
        session.command("SystemInfo", MessageId::SYSINFO_REQ),
        sim.next_frame()
    );

    match result {
        Err(SessionError::Timeout(limit)) => assert_eq!(limit, Duration::from_secs(2)),
        other => panic!("Expected Timeout, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(device.active_sessions(), 0);
    assert!(device.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_late_reply_never_answers_next_command() {
    let config = DeviceConfig {
        response_timeout: Some(Duration::from_secs(2)),
        ..DeviceConfig::default()
    };
    let (device, mut sim) = attached(config).await;
    let session = logged_in(&device, &mut sim, 9).await;

    let (result, late) = tokio::join!(
        session.command("SystemInfo", MessageId::SYSINFO_REQ),
        sim.next_frame()
    );
    assert!(matches!(result, Err(SessionError::Timeout(_))));

    // The reply shows up after the caller gave up
    sim.send(reply(
        &late,
        r#"{"Name":"SystemInfo","Ret":100,"SessionID":"0xABCDEF"}"#,
    ))
    .await;
    tokio::task::yield_now().await;

    let next = session.command("OEMInfo", MessageId::SYSINFO_REQ).await;
    assert!(matches!(next, Err(SessionError::NotActive)));

    // A fresh session on the same connection is unaffected
    let fresh = logged_in(&device, &mut sim, 10).await;
    let (oem, _) = tokio::join!(fresh.oem_info(), async {
        let request = sim.next_frame().await;
        assert_eq!(json(&request)["Name"], "OEMInfo");
        sim.send(reply(
            &request,
            r#"{"Name":"OEMInfo","Ret":100,"SessionID":"0xABCDEF"}"#,
        ))
        .await;
    });
    assert_eq!(oem.unwrap().name, "OEMInfo");
}

#[tokio::test]
async fn test_logout_closes_session() {
    let (device, mut sim) = attached(DeviceConfig::default()).await;
    let session = logged_in(&device, &mut sim, 6).await;

    let responder = async {
        let request = sim.next_frame().await;
        assert_eq!(request.message_id, MessageId::LOGOUT_REQ);
        sim.send(
            Frame::new(MessageId::LOGOUT_RSP, r#"{"Name":"","Ret":100,"SessionID":"0xABCDEF"}"#)
                .with_session(request.session_id),
        )
        .await;
    };
    let (result, _) = tokio::join!(session.logout(), responder);

    result.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(device.active_sessions(), 0);
    assert!(matches!(session.login().await, Err(SessionError::Closed)));
}

#[tokio::test]
async fn test_session_capacity() {
    let device = Device::new(DeviceConfig::default());

    let mut sessions: Vec<Session> = (0..255)
        .map(|_| device.new_session("admin", "").unwrap())
        .collect();
    assert_eq!(device.pending_sessions(), 255);
    assert!(matches!(
        device.new_session("admin", ""),
        Err(SessionError::CapacityExhausted(255))
    ));

    let dropped = sessions.remove(41);
    assert_eq!(dropped.correlation_id(), CorrelationId::new(42));
    drop(dropped);

    let reused = device.new_session("admin", "").unwrap();
    assert_eq!(reused.correlation_id(), CorrelationId::new(42));
}

#[tokio::test]
async fn test_connect_gives_up_after_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = DeviceConfig::for_host("127.0.0.1");
    config.port = port;
    config.connect_attempts = 3;
    config.connect_timeout = Duration::from_secs(1);
    config.backoff.initial = Duration::from_millis(10);
    config.backoff.max = Duration::from_millis(10);
    config.backoff.jitter = 0.0;

    let device = Device::new(config);
    match device.connect().await {
        Err(ConnectionError::ConnectFailed { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("Expected ConnectFailed, got {:?}", other),
    }
    assert!(!device.is_connected());
    assert!(matches!(
        device.send(Frame::new(MessageId::KEEPALIVE_REQ, "{}")).await,
        Err(ConnectionError::NotConnected)
    ));
}

#[tokio::test]
async fn test_connect_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        Framed::new(stream, FrameCodec::new())
    });

    let mut config = DeviceConfig::for_host("127.0.0.1");
    config.port = port;
    let device = Device::new(config);

    device.connect().await.unwrap();
    assert!(device.is_connected());
    assert!(matches!(
        device.connect().await,
        Err(ConnectionError::AlreadyConnected(_))
    ));

    let mut remote = accept.await.unwrap();
    device
        .send(Frame::new(MessageId::KEEPALIVE_REQ, "{}"))
        .await
        .unwrap();
    let frame = remote.next().await.unwrap().unwrap();
    assert_eq!(frame.message_id, MessageId::KEEPALIVE_REQ);

    device.disconnect().await;
    assert!(!device.is_connected());
}
