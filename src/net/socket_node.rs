//! Receiving end of a [`SocketAppender`](crate::appenders::SocketAppender)
//!
//! A `SocketNode` reads framed events from one connection and replays each
//! through the local repository, as if it had been logged on the logger of
//! the same name here. Local levels, threshold and sinks decide what happens
//! to it.

use super::codec::EventReader;
use crate::core::diagnostics;
use crate::core::logger::ROOT_LOGGER_NAME;
use crate::core::Repository;
use std::io::{BufRead, BufReader};
use std::net::TcpStream;

pub struct SocketNode<R: BufRead> {
    reader: EventReader<R>,
    repository: Repository,
    peer: String,
}

impl SocketNode<BufReader<TcpStream>> {
    pub fn new(stream: TcpStream, repository: Repository) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown peer".to_string());
        Self::from_reader(BufReader::new(stream), repository, peer)
    }
}

impl<R: BufRead> SocketNode<R> {
    pub fn from_reader(reader: R, repository: Repository, peer: impl Into<String>) -> Self {
        Self {
            reader: EventReader::new(reader),
            repository,
            peer: peer.into(),
        }
    }

    /// Replay events until the stream ends. Returns how many were passed to
    /// local sinks.
    pub fn run(self) -> usize {
        let Self {
            reader,
            repository,
            peer,
        } = self;

        let mut replayed = 0;
        for item in reader {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    diagnostics::warn(format_args!("Discarding event from {}: {}", peer, e));
                    continue;
                }
            };

            let logger = if event.logger_name == ROOT_LOGGER_NAME {
                repository.root_logger()
            } else {
                repository.get_logger(&event.logger_name)
            };
            if logger.is_enabled_for(event.level) {
                logger.call_sinks(&event);
                replayed += 1;
            }
        }
        diagnostics::debug(format_args!(
            "Connection from {} closed after {} events",
            peer, replayed
        ));
        replayed
    }
}
