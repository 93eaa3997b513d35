//! End-to-end behaviour of shared servers with real WebSocket peers.

#![allow(clippy::panic)]

mod common;

use std::cell::RefCell;
use std::net::{IpAddr, Ipv4Addr};
use std::rc::{Rc, Weak};
use std::thread;
use std::time::Duration;

use common::{Client, Recorder, free_port, local_registry, poll_until};
use shared_ws::config::HostConfig;
use shared_ws::domain::{ConnectionId, EventSink};
use shared_ws::error::SharedWsError;
use shared_ws::listener::{Atom, Listener};
use shared_ws::server::Registry;

fn attach(
    registry: &shared_ws::server::Registry,
    port: shared_ws::domain::Port,
    sink: &Rc<Recorder>,
) -> Listener {
    let Ok(listener) = Listener::attach(registry, port, Rc::clone(sink) as Rc<dyn EventSink>)
    else {
        panic!("attach failed");
    };
    listener
}

#[test]
fn many_owners_share_one_server() {
    let registry = local_registry();
    let port = free_port();
    let sink = Rc::new(Recorder::default());

    let mut listeners: Vec<Listener> = (0..5).map(|_| attach(&registry, port, &sink)).collect();
    assert_eq!(registry.len(), 1);
    let Some(server) = registry.get(port) else {
        panic!("server missing");
    };
    assert_eq!(server.borrow().listener_count(), 5);
    drop(server);

    while let Some(mut listener) = listeners.pop() {
        assert!(registry.contains(port));
        listener.detach();
    }
    assert!(!registry.contains(port));
    assert!(registry.is_empty());
}

#[test]
fn server_survives_until_last_detach() {
    let registry = local_registry();
    let port = free_port();
    let sink = Rc::new(Recorder::default());
    let mut a = attach(&registry, port, &sink);
    let mut b = attach(&registry, port, &sink);

    let Some(server) = registry.get(port) else {
        panic!("server missing");
    };

    a.detach();
    assert!(registry.contains(port));
    assert!(!server.borrow().is_closed());

    b.detach();
    assert!(!registry.contains(port));
    assert!(server.borrow().is_closed());
}

#[test]
fn port_in_use_is_a_bind_failure() {
    let registry = local_registry();
    let Ok(squatter) = std::net::TcpListener::bind("127.0.0.1:0") else {
        panic!("bind ephemeral port");
    };
    let Ok(addr) = squatter.local_addr() else {
        panic!("ephemeral port addr");
    };
    let Ok(port) = shared_ws::domain::Port::new(addr.port()) else {
        panic!("valid port");
    };

    let result = Listener::attach(&registry, port, Rc::new(Recorder::default()));
    let Err(err) = result else {
        panic!("attach should fail while the port is taken");
    };
    assert!(matches!(err, SharedWsError::BindFailure { .. }));
    assert!(!registry.contains(port));
}

#[test]
fn reattach_after_teardown_rebinds() {
    let registry = local_registry();
    let port = free_port();
    let sink = Rc::new(Recorder::default());

    let mut first = attach(&registry, port, &sink);
    first.detach();
    let second = attach(&registry, port, &sink);
    assert!(second.is_attached());
    assert_eq!(registry.len(), 1);
}

#[test]
fn inbound_message_reaches_every_listener_once() {
    let registry = local_registry();
    let port = free_port();
    let a_sink = Rc::new(Recorder::default());
    let b_sink = Rc::new(Recorder::default());
    let a = attach(&registry, port, &a_sink);
    let b = attach(&registry, port, &b_sink);

    let client = Client::connect(port, &["hello"]);

    let delivered = poll_until(&a, || {
        a_sink.messages.borrow().len() == 1 && b_sink.messages.borrow().len() == 1
    });
    assert!(delivered, "message never arrived");

    for _ in 0..20 {
        b.poll();
    }
    assert_eq!(*a_sink.messages.borrow(), vec!["hello"]);
    assert_eq!(*b_sink.messages.borrow(), vec!["hello"]);
    assert_eq!(a_sink.opened.get(), 1);

    drop(a);
    drop(b);
    let _ = client.thread.join();
}

#[test]
fn broadcast_reaches_connected_peers() {
    let registry = local_registry();
    let port = free_port();
    let sink = Rc::new(Recorder::default());
    let listener = attach(&registry, port, &sink);

    let first = Client::connect(port, &[]);
    let second = Client::connect(port, &[]);
    assert!(poll_until(&listener, || sink.opened.get() == 2));
    assert_eq!(listener.connection_count(), 2);

    let report = listener.send("ping");
    assert_eq!(report.delivered, 2);
    assert!(report.is_complete());
    assert!(first.expect(&listener, "ping"));
    assert!(second.expect(&listener, "ping"));

    let values = [Atom::from(1), Atom::from(2.5), Atom::from("x")];
    listener.send_list(&values);
    assert!(first.expect(&listener, "1 2.5 x"));

    let Ok(_) = listener.send_json(&serde_json::json!({ "k": [1, 2] })) else {
        panic!("json send failed");
    };
    assert!(second.expect(&listener, r#"{"k":[1,2]}"#));
}

#[test]
fn peer_close_leaves_the_connection_set() {
    let registry = local_registry();
    let port = free_port();
    let sink = Rc::new(Recorder::default());
    let listener = attach(&registry, port, &sink);

    let stays = Client::connect(port, &[]);
    assert!(poll_until(&listener, || sink.opened.get() == 1));

    let leaves = Client::connect_and_leave(port, &["bye"]);
    assert!(poll_until(&listener, || sink.closed.get() == 1));
    assert_eq!(*sink.messages.borrow(), vec!["bye"]);
    assert_eq!(listener.connection_count(), 1);
    // The closing handshake is answered rather than dropped
    assert!(leaves.expect(&listener, "close:0"));
    let _ = leaves.thread.join();

    // The remaining peer still gets broadcasts
    let report = listener.send("still here");
    assert_eq!(report.delivered, 1);
    assert!(stays.expect(&listener, "still here"));

    drop(listener);
    assert!(stays.expect_without_polling("close:1000"));
    let _ = stays.thread.join();
}

#[test]
fn last_detach_closes_peers_with_normal_status() {
    let registry = local_registry();
    let port = free_port();
    let a_sink = Rc::new(Recorder::default());
    let b_sink = Rc::new(Recorder::default());
    let mut a = attach(&registry, port, &a_sink);
    let mut b = attach(&registry, port, &b_sink);

    let client = Client::connect(port, &[]);
    assert!(poll_until(&a, || a_sink.opened.get() == 1));
    assert_eq!(b_sink.opened.get(), 1);

    a.detach();
    assert_eq!(b.connection_count(), 1);

    b.detach();
    assert!(registry.is_empty());
    assert!(client.expect_without_polling("close:1000"));
    let _ = client.thread.join();
}

/// Replies to every message from inside the callback.
#[derive(Default)]
struct EchoSink {
    target: RefCell<Weak<Listener>>,
}

impl EventSink for EchoSink {
    fn on_message(&self, text: &str) {
        if let Some(listener) = self.target.borrow().upgrade() {
            listener.send(&format!("echo {text}"));
        }
    }

    fn on_error(&self, _description: &str) {}

    fn on_open(&self, _connection: ConnectionId) {}
}

#[test]
fn sink_may_reply_from_inside_dispatch() {
    let registry = local_registry();
    let port = free_port();
    let sink = Rc::new(EchoSink::default());
    let Ok(listener) = Listener::attach(&registry, port, Rc::clone(&sink) as Rc<dyn EventSink>)
    else {
        panic!("attach failed");
    };
    let listener = Rc::new(listener);
    *sink.target.borrow_mut() = Rc::downgrade(&listener);

    let client = Client::connect(port, &["marco"]);
    assert!(client.expect(&listener, "echo marco"));

    drop(listener);
    let _ = client.thread.join();
}

#[test]
fn flooding_peer_is_held_to_the_event_capacity() {
    let registry = Registry::new(HostConfig {
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        event_capacity: 8,
        ..HostConfig::default()
    });
    let port = free_port();
    let sink = Rc::new(Recorder::default());
    let listener = attach(&registry, port, &sink);

    let frames: Vec<String> = (0..5_000).map(|n| format!("f{n}")).collect();
    let frame_refs: Vec<&str> = frames.iter().map(String::as_str).collect();
    let client = Client::connect(port, &frame_refs);

    let Some(server) = registry.get(port) else {
        panic!("server missing");
    };
    let mut most_pending = 0;
    for _ in 0..300 {
        listener.poll_with_budget(1);
        most_pending = most_pending.max(server.borrow().pending_events());
        thread::sleep(Duration::from_millis(1));
    }
    drop(server);

    assert!(most_pending <= 8, "queued {most_pending} events");
    let received = sink.messages.borrow().clone();
    assert!(!received.is_empty());
    assert!(received.len() < frames.len());
    assert!(
        received.iter().zip(&frames).all(|(got, sent)| got == sent),
        "frames arrived out of order"
    );
    assert!(sink.errors.borrow().is_empty());

    drop(listener);
    let _ = client.thread.join();
}

#[test]
fn unpolled_peer_still_gets_a_close_frame_on_teardown() {
    let registry = local_registry();
    let port = free_port();
    let sink = Rc::new(Recorder::default());
    let listener = attach(&registry, port, &sink);

    let client = Client::connect(port, &[]);
    let Some(server) = registry.get(port) else {
        panic!("server missing");
    };
    // Drive the transport without taking any events off the queue
    let mut queued = false;
    for _ in 0..2_500 {
        listener.poll_with_budget(0);
        if server.borrow().pending_events() > 0 {
            queued = true;
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    drop(server);
    assert!(queued);
    assert_eq!(sink.opened.get(), 0);

    drop(listener);
    assert!(registry.is_empty());
    assert!(client.expect_without_polling("close:1000"));
    let _ = client.thread.join();
}
