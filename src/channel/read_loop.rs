use super::constants::ANSI_ESCAPE_BYTE;
use super::patterns::strip_ansi;
use super::Channel;
use crate::errors::CrawlError;
use crate::transport::base::Transport;
use crate::util::queue::ByteQueue;
use core::str;
use core::time::Duration;
use log::trace;
use std::sync::mpsc::{
    Receiver,
    Sender,
    TryRecvError,
};
use std::sync::{
    Arc,
    Mutex,
};
use std::thread;

impl Channel {
    /// The background read loop: constantly pulls whatever the transport has ready and queues it
    /// for the session side. Runs in its own thread until the done signal arrives or the
    /// transport dies.
    pub(super) fn read_loop(
        transport: &Arc<Mutex<dyn Transport + Send>>,
        queue: &Arc<ByteQueue>,
        read_delay: Duration,
        read_error_sender: &Sender<CrawlError>,
        read_done_receiver: &Receiver<bool>,
    ) {
        loop {
            match read_done_receiver.try_recv() {
                Ok(_) => {
                    trace!("channel read loop received done signal");

                    return;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    return;
                }
            }

            let read_result = if let Ok(mut unlocked_transport) = transport.lock() {
                unlocked_transport.read()
            } else {
                let _ = read_error_sender.send(CrawlError::Connection(String::from(
                    "failed acquiring transport lock in channel read loop",
                )));

                return;
            };

            let mut b = match read_result {
                Ok(b) => b,
                Err(err) => {
                    // the session side decides what to do with this; we're done either way
                    let _ = read_error_sender.send(err);

                    return;
                }
            };

            if !b.is_empty() {
                if b.contains(&ANSI_ESCAPE_BYTE) {
                    b = strip_ansi(&b);
                }

                trace!(
                    "channel read\n{}",
                    str::from_utf8(&b).unwrap_or("failed decoding bytes, cannot log")
                );

                queue.push(b);
            }

            thread::sleep(read_delay);
        }
    }
}
