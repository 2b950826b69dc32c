//! Poll loop behavior against an in-memory mailbox.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use assert_fs::prelude::*;
use predicates::prelude::*;

use paperwatch::checkpoint::store::CheckpointStore;
use paperwatch::checkpoint::Uid;
use paperwatch::config::OutputConfig;
use paperwatch::error::{Result, WatchError};
use paperwatch::mailbox::{Connector, MailSession, MailboxStatus};
use paperwatch::pipeline::MessagePipeline;
use paperwatch::poll::{CancelToken, PollSettings, PollState, Watcher};

// ─── Fake server ────────────────────────────────────────────────────

#[derive(Default)]
struct Server {
    uid_validity: Option<u32>,
    unseen: BTreeMap<Uid, Vec<u8>>,
    broken: HashSet<Uid>,
    fail_select: bool,
    refuse_connect: bool,
    cancel_after_search: Option<CancelToken>,
    connects: usize,
    logouts: usize,
    fetched: Vec<Uid>,
}

#[derive(Clone, Default)]
struct FakeConnector(Rc<RefCell<Server>>);

struct FakeSession(Rc<RefCell<Server>>);

impl Connector for FakeConnector {
    type Session = FakeSession;

    fn connect(&self) -> Result<FakeSession> {
        let mut server = self.0.borrow_mut();
        if server.refuse_connect {
            return Err(WatchError::Tls("connection refused".into()));
        }
        server.connects += 1;
        Ok(FakeSession(Rc::clone(&self.0)))
    }
}

impl MailSession for FakeSession {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        Ok(vec!["INBOX".into(), "Archive".into()])
    }

    fn select(&mut self, _mailbox: &str) -> Result<MailboxStatus> {
        let server = self.0.borrow();
        if server.fail_select {
            return Err(WatchError::NotConnected);
        }
        Ok(MailboxStatus {
            uid_validity: server.uid_validity,
            exists: server.unseen.len() as u32,
        })
    }

    fn search_unseen(&mut self) -> Result<HashSet<Uid>> {
        let server = self.0.borrow();
        if let Some(token) = &server.cancel_after_search {
            token.cancel();
        }
        Ok(server.unseen.keys().copied().collect())
    }

    fn fetch(&mut self, uid: Uid) -> Result<Vec<u8>> {
        let mut server = self.0.borrow_mut();
        server.fetched.push(uid);
        if server.broken.contains(&uid) {
            return Err(WatchError::MissingBody(uid));
        }
        server
            .unseen
            .get(&uid)
            .cloned()
            .ok_or(WatchError::MissingBody(uid))
    }

    fn logout(&mut self) -> Result<()> {
        self.0.borrow_mut().logouts += 1;
        Ok(())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn alert(uid: Uid) -> Vec<u8> {
    format!(
        "Subject: alert {uid}\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         \r\n\
         <a href=\"https://arxiv.org/abs/2401.{uid:05}\">paper</a>\r\n"
    )
    .into_bytes()
}

fn server_with(uids: &[Uid]) -> FakeConnector {
    let connector = FakeConnector::default();
    {
        let mut server = connector.0.borrow_mut();
        server.uid_validity = Some(1);
        for &uid in uids {
            server.unseen.insert(uid, alert(uid));
        }
    }
    connector
}

fn watcher(connector: &FakeConnector, dir: &Path) -> Watcher<FakeConnector> {
    let output = OutputConfig {
        dir: dir.to_path_buf(),
        ..Default::default()
    };
    Watcher::new(
        connector.clone(),
        CheckpointStore::new(output.checkpoint_path()),
        MessagePipeline::from_config(&output),
        PollSettings {
            mailbox: "INBOX".into(),
            interval: Duration::ZERO,
            backoff: Duration::ZERO,
        },
    )
}

// ─── Checkpointing ──────────────────────────────────────────────────

#[test]
fn test_processed_messages_are_not_refetched() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = server_with(&[4, 9]);
    let mut w = watcher(&server, temp.path());

    let first = w.run_once().unwrap();
    assert_eq!(first.unseen, 2);
    assert_eq!(first.processed, vec![4, 9]);

    let second = w.run_once().unwrap();
    assert_eq!(second.unseen, 2);
    assert_eq!(second.new, 0);
    assert_eq!(server.0.borrow().fetched, vec![4, 9]);
}

#[test]
fn test_checkpoint_survives_restart() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = server_with(&[1, 2]);
    watcher(&server, temp.path()).run_once().unwrap();
    temp.child("last_check.bin").assert(predicate::path::exists());

    let mut restarted = watcher(&server, temp.path());
    assert!(restarted.checkpoint().contains(1));
    assert!(restarted.checkpoint().contains(2));
    assert_eq!(restarted.run_once().unwrap().new, 0);
}

#[test]
fn test_failed_fetch_is_isolated_and_retried() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = server_with(&[1, 2, 3]);
    server.0.borrow_mut().broken.insert(2);
    let mut w = watcher(&server, temp.path());

    let report = w.run_once().unwrap();
    assert_eq!(report.processed, vec![1, 3]);
    assert_eq!(report.failed, vec![2]);
    assert!(!w.checkpoint().contains(2));

    let reloaded = CheckpointStore::new(temp.child("last_check.bin").path()).load();
    assert_eq!(reloaded.uids().collect::<Vec<_>>(), vec![1, 3]);

    temp.child("arxiv_links.txt").assert(predicate::str::diff(
        "https://arxiv.org/abs/2401.00001\nhttps://arxiv.org/abs/2401.00003\n",
    ));

    server.0.borrow_mut().broken.clear();
    let retry = w.run_once().unwrap();
    assert_eq!(retry.processed, vec![2]);
}

#[test]
fn test_uid_validity_change_resets_checkpoint() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = server_with(&[5]);
    let mut w = watcher(&server, temp.path());
    w.run_once().unwrap();
    assert_eq!(w.checkpoint().uid_validity(), Some(1));

    server.0.borrow_mut().uid_validity = Some(2);
    let report = w.run_once().unwrap();
    assert_eq!(report.processed, vec![5]);
    assert_eq!(w.checkpoint().uid_validity(), Some(2));
    assert_eq!(server.0.borrow().fetched, vec![5, 5]);
}

#[test]
fn test_unwritable_checkpoint_does_not_stop_polling() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = server_with(&[1, 2]);
    let output = OutputConfig {
        dir: temp.path().to_path_buf(),
        ..Default::default()
    };
    let checkpoint_path = temp.path().join("missing").join("last_check.bin");
    let mut w = Watcher::new(
        server.clone(),
        CheckpointStore::new(&checkpoint_path),
        MessagePipeline::from_config(&output),
        PollSettings {
            mailbox: "INBOX".into(),
            interval: Duration::ZERO,
            backoff: Duration::ZERO,
        },
    );

    let report = w.run_once().unwrap();
    assert_eq!(report.processed, vec![1, 2]);
    assert!(w.checkpoint().contains(1));
    assert!(w.checkpoint().contains(2));
    assert!(!checkpoint_path.exists());

    assert_eq!(w.run_once().unwrap().new, 0);
    assert_eq!(server.0.borrow().fetched, vec![1, 2]);
}

// ─── State machine ──────────────────────────────────────────────────

#[test]
fn test_cycle_error_backs_off_and_logs_out() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = server_with(&[1]);
    let mut w = watcher(&server, temp.path());
    let cancel = CancelToken::new();

    assert_eq!(w.state(), PollState::Disconnected);
    assert_eq!(w.step(&cancel), PollState::ConnectedIdle);
    assert_eq!(w.step(&cancel), PollState::Polling);
    assert_eq!(w.step(&cancel), PollState::Polling);
    assert!(w.checkpoint().contains(1));

    server.0.borrow_mut().fail_select = true;
    assert_eq!(w.step(&cancel), PollState::ErrorBackoff);
    assert!(!w.is_connected());
    assert_eq!(server.0.borrow().logouts, 1);

    assert_eq!(w.step(&cancel), PollState::Disconnected);
    server.0.borrow_mut().fail_select = false;
    assert_eq!(w.step(&cancel), PollState::ConnectedIdle);
    assert_eq!(server.0.borrow().connects, 2);
}

#[test]
fn test_connect_failure_backs_off() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = server_with(&[]);
    server.0.borrow_mut().refuse_connect = true;
    let mut w = watcher(&server, temp.path());
    let cancel = CancelToken::new();

    assert_eq!(w.step(&cancel), PollState::ErrorBackoff);
    assert_eq!(w.step(&cancel), PollState::Disconnected);
    assert!(matches!(w.run_once(), Err(WatchError::Tls(_))));
}

#[test]
fn test_run_stops_on_cancel_and_logs_out() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = server_with(&[1, 2]);
    let cancel = CancelToken::new();
    server.0.borrow_mut().cancel_after_search = Some(cancel.clone());

    let mut w = watcher(&server, temp.path());
    w.run(&cancel);

    let state = server.0.borrow();
    assert_eq!(state.connects, 1);
    assert_eq!(state.logouts, 1);
    assert!(state.fetched.is_empty());
    assert!(!w.is_connected());
}

#[test]
fn test_run_with_cancelled_token_never_connects() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = server_with(&[1]);
    let cancel = CancelToken::new();
    cancel.cancel();

    watcher(&server, temp.path()).run(&cancel);
    assert_eq!(server.0.borrow().connects, 0);
}
