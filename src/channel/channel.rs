use super::Args;
use crate::errors::CrawlError;
use crate::transport::base::{
    InChannelAuthType,
    Transport,
};
use crate::util::queue::ByteQueue;
use log::debug;
use std::sync::mpsc::{
    channel,
    Receiver,
    Sender,
    TryRecvError,
};
use std::sync::{
    Arc,
    Mutex,
};
use std::thread;

/// The netcrawl `Channel` object -- wraps a transport and handles the read loop, prompt hunting,
/// and in-channel authentication. Drivers above this (the `Session`) deal in whole commands;
/// the channel deals in bytes.
pub struct Channel {
    /// The arguments that the channel was created with.
    pub args: Args,
    pub(super) transport: Arc<Mutex<dyn Transport + Send>>,
    pub(super) queue: Arc<ByteQueue>,
    read_error_receiver: Option<Receiver<CrawlError>>,
    read_done_sender: Option<Sender<bool>>,
}

impl Channel {
    /// Returns a new instance of `Channel` wrapping the given transport.
    #[must_use]
    pub fn new(
        args: Args,
        t: impl Transport + Send + 'static,
    ) -> Self {
        Self {
            args,
            transport: Arc::new(Mutex::new(t)),
            queue: Arc::new(ByteQueue::new()),
            read_error_receiver: None,
            read_done_sender: None,
        }
    }

    /// Open the channel and underlying transport, start the read loop, and run in-channel
    /// authentication appropriate for the transport flavor.
    ///
    /// # Errors
    ///
    /// `Connection` when the transport cannot open, `Auth` when the device rejects the
    /// credential, `Timeout` when authentication does not produce a prompt in time.
    pub fn open(&mut self) -> Result<(), CrawlError> {
        let Ok(mut unlocked_transport) = self.transport.lock() else {
            return Err(CrawlError::Connection(String::from(
                "failed acquiring transport lock during open, this should not happen",
            )));
        };

        let auth_data = unlocked_transport.auth_data();

        unlocked_transport.open()?;
        drop(unlocked_transport);

        let read_loop_transport = Arc::clone(&self.transport);
        let read_loop_queue = Arc::clone(&self.queue);
        let read_delay = self.args.read_delay;

        let (read_error_sender, read_error_receiver) = channel::<CrawlError>();
        self.read_error_receiver = Some(read_error_receiver);

        let (read_done_sender, read_done_receiver) = channel::<bool>();
        self.read_done_sender = Some(read_done_sender);

        debug!("starting channel read loop");

        thread::spawn(move || {
            Self::read_loop(
                &read_loop_transport,
                &read_loop_queue,
                read_delay,
                &read_error_sender,
                &read_done_receiver,
            );
        });

        let leftover = match auth_data.auth_type {
            InChannelAuthType::Telnet => {
                debug!("transport requests in channel telnet auth, starting...");

                self.authenticate_telnet(
                    auth_data.user.as_bytes(),
                    auth_data.password.as_bytes(),
                )?
            }
            InChannelAuthType::Ssh => {
                debug!("transport requests in channel ssh auth, starting...");

                self.authenticate_ssh(auth_data.password.as_bytes())?
            }
        };

        // anything read past the prompt during auth belongs to the session proper
        if !leftover.is_empty() {
            self.queue.push_front(leftover);
        }

        Ok(())
    }

    /// Close the channel and underlying transport. Safe on every exit path, including after a
    /// failed open.
    ///
    /// # Errors
    ///
    /// Returns a `CrawlError` if the transport teardown fails.
    pub fn close(&mut self) -> Result<(), CrawlError> {
        debug!("channel closing...");

        if let Some(sender) = self.read_done_sender.take() {
            // the read loop may already be gone; that's fine
            let _ = sender.send(true);
        }

        match self.transport.lock() {
            Ok(mut unlocked_transport) => unlocked_transport.close(),
            Err(err) => Err(CrawlError::Connection(format!(
                "failed acquiring lock on transport: {err}"
            ))),
        }
    }

    /// Reads from the queue being filled by the read loop. Non-blocking: returns an empty vec
    /// when nothing has arrived.
    ///
    /// # Errors
    ///
    /// Propagates any error the read loop hit against the transport.
    pub fn read(&mut self) -> Result<Vec<u8>, CrawlError> {
        if let Some(receiver) = self.read_error_receiver.as_ref() {
            match receiver.try_recv() {
                Ok(err) => return Err(err),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    return Err(CrawlError::Connection(String::from(
                        "channel read loop is gone, transport presumed dead",
                    )))
                }
            }
        }

        if self.queue.depth() == 0 {
            return Ok(vec![]);
        }

        Ok(self.queue.pop())
    }
}
