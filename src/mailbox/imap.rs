//! IMAP over implicit TLS.

use std::collections::HashSet;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use ::imap::{Client, Session};
use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, info, warn};

use super::{Connector, MailSession, MailboxStatus};
use crate::checkpoint::Uid;
use crate::config::{AccountConfig, PollConfig};
use crate::error::{Result, WatchError};

/// Connects and logs in to an IMAP server with the configured account.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    account: AccountConfig,
    timeout: Option<Duration>,
    client_name: String,
    client_version: String,
}

impl ImapConnector {
    pub fn new(account: &AccountConfig, poll: &PollConfig) -> Self {
        Self {
            account: account.clone(),
            timeout: poll.timeout(),
            client_name: poll.client_name.clone(),
            client_version: poll.client_version.clone(),
        }
    }

    fn open_stream(&self) -> Result<TcpStream> {
        let host = self.account.server.as_str();
        let port = self.account.port;

        let stream = match self.timeout {
            Some(timeout) => {
                let mut last_err = None;
                let mut connected = None;
                for addr in (host, port).to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(stream) => {
                            connected = Some(stream);
                            break;
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                match (connected, last_err) {
                    (Some(stream), _) => stream,
                    (None, Some(e)) => return Err(e.into()),
                    (None, None) => {
                        return Err(WatchError::Config(format!(
                            "'{host}' did not resolve to any address"
                        )))
                    }
                }
            }
            None => TcpStream::connect((host, port))?,
        };

        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        Ok(stream)
    }

    /// RFC 2971 client identification. Some providers refuse `SELECT`
    /// from clients that have not sent it.
    fn identify(&self, session: &mut Session<TlsStream<TcpStream>>) {
        let command = format!(
            "ID (\"name\" \"{}\" \"version\" \"{}\")",
            quote_safe(&self.client_name),
            quote_safe(&self.client_version)
        );
        if let Err(e) = session.run_command_and_check_ok(&command) {
            warn!(error = %e, "Server rejected IMAP ID command");
        }
    }
}

impl Connector for ImapConnector {
    type Session = ImapSession;

    fn connect(&self) -> Result<ImapSession> {
        let host = self.account.server.as_str();
        debug!(host, port = self.account.port, "Connecting");

        let tcp = self.open_stream()?;
        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| WatchError::Tls(e.to_string()))?;
        let stream = tls
            .connect(host, tcp)
            .map_err(|e| WatchError::Tls(e.to_string()))?;

        let mut client = Client::new(stream);
        client.read_greeting()?;
        let mut session = client
            .login(&self.account.username, &self.account.password)
            .map_err(|(e, _)| e)?;

        self.identify(&mut session);
        info!(host, user = %self.account.username, "Logged in");
        Ok(ImapSession { inner: session })
    }
}

/// A logged-in IMAP session.
pub struct ImapSession {
    inner: Session<TlsStream<TcpStream>>,
}

impl MailSession for ImapSession {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        let names = self.inner.list(Some(""), Some("*"))?;
        Ok(names.iter().map(|n| n.name().to_string()).collect())
    }

    fn select(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        let mb = self.inner.select(mailbox)?;
        Ok(MailboxStatus {
            uid_validity: mb.uid_validity,
            exists: mb.exists,
        })
    }

    fn search_unseen(&mut self) -> Result<HashSet<Uid>> {
        Ok(self.inner.uid_search("UNSEEN")?)
    }

    fn fetch(&mut self, uid: Uid) -> Result<Vec<u8>> {
        let fetches = self.inner.uid_fetch(uid.to_string(), "RFC822")?;
        fetches
            .iter()
            .find_map(|f| f.body())
            .map(<[u8]>::to_vec)
            .ok_or(WatchError::MissingBody(uid))
    }

    fn logout(&mut self) -> Result<()> {
        self.inner.logout()?;
        Ok(())
    }
}

/// Strip characters that would break out of an IMAP quoted string.
fn quote_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '"' | '\\' | '\r' | '\n'))
        .collect()
}
