//! Background page fetching.
//!
//! Requests go to a small worker pool over a flume MPMC queue so that a slow
//! response never blocks the UI thread. Every request carries a ticket; issuing
//! a new one cancels the previous, and the reader drops completions whose
//! ticket was cancelled. Responses can arrive out of order, the ticket is what
//! decides whether they still matter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use flume::{Receiver, Sender};
use log::{debug, warn};

use crate::api::{PageRequest, PageSource, PageWindow};
use crate::error::FetchError;
use crate::navigation::{WindowRange, window_for_page};

pub const DEFAULT_WORKERS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// Handle to one in-flight page load.
#[derive(Clone, Debug)]
pub struct FetchTicket {
    pub id: RequestId,
    pub page: usize,
    pub window: WindowRange,
    cancelled: Arc<AtomicBool>,
}

impl FetchTicket {
    pub fn new(id: RequestId, page: usize) -> Self {
        Self {
            id,
            page,
            window: window_for_page(page),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct FetchCompletion {
    pub ticket: FetchTicket,
    pub result: Result<PageWindow, FetchError>,
}

enum FetchJob {
    Load { ticket: FetchTicket, request: PageRequest },
    Shutdown,
}

/// Issues tickets. Split out of [`PageFetcher`] so the cancel-previous rule
/// can be driven without threads.
#[derive(Debug, Default)]
pub struct TicketIssuer {
    next_id: u64,
    current: Option<FetchTicket>,
}

impl TicketIssuer {
    pub fn issue(&mut self, page: usize) -> FetchTicket {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        self.next_id += 1;
        let ticket = FetchTicket::new(RequestId(self.next_id), page);
        self.current = Some(ticket.clone());
        ticket
    }

    pub fn current(&self) -> Option<&FetchTicket> {
        self.current.as_ref()
    }

    pub fn cancel_all(&mut self) {
        if let Some(ticket) = self.current.take() {
            ticket.cancel();
        }
    }
}

pub struct PageFetcher {
    job_tx: Sender<FetchJob>,
    completion_rx: Receiver<FetchCompletion>,
    tickets: TicketIssuer,
    num_workers: usize,
}

impl PageFetcher {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self::with_workers(source, DEFAULT_WORKERS)
    }

    pub fn with_workers(source: Arc<dyn PageSource>, num_workers: usize) -> Self {
        let (job_tx, job_rx) = flume::unbounded();
        let (completion_tx, completion_rx) = flume::unbounded();

        for worker in 0..num_workers.max(1) {
            let rx = job_rx.clone();
            let tx = completion_tx.clone();
            let source = source.clone();
            thread::spawn(move || fetch_worker(worker, source, rx, tx));
        }

        Self {
            job_tx,
            completion_rx,
            tickets: TicketIssuer::default(),
            num_workers: num_workers.max(1),
        }
    }

    /// Starts loading the window around `page`, cancelling any earlier load.
    pub fn request(&mut self, path: &str, page: usize) -> FetchTicket {
        let ticket = self.tickets.issue(page);
        let request = PageRequest {
            path: path.to_string(),
            from: ticket.window.from,
            to: ticket.window.to,
        };
        debug!("Request {:?} for page {page}", ticket.id);
        if self
            .job_tx
            .send(FetchJob::Load {
                ticket: ticket.clone(),
                request,
            })
            .is_err()
        {
            warn!("Fetch workers are gone, request {:?} dropped", ticket.id);
        }
        ticket
    }

    pub fn cancel(&mut self) {
        self.tickets.cancel_all();
    }

    pub fn poll(&self) -> Vec<FetchCompletion> {
        self.completion_rx.try_iter().collect()
    }

    pub fn completions(&self) -> &Receiver<FetchCompletion> {
        &self.completion_rx
    }

    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.job_tx.send(FetchJob::Shutdown);
        }
    }
}

impl Drop for PageFetcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn fetch_worker(
    worker: usize,
    source: Arc<dyn PageSource>,
    jobs: Receiver<FetchJob>,
    completions: Sender<FetchCompletion>,
) {
    while let Ok(job) = jobs.recv() {
        match job {
            FetchJob::Shutdown => break,
            FetchJob::Load { ticket, request } => {
                if ticket.is_cancelled() {
                    debug!("Worker {worker} skipping cancelled {:?}", ticket.id);
                    continue;
                }
                let result = source.fetch_page_window(&request);
                if completions.send(FetchCompletion { ticket, result }).is_err() {
                    break;
                }
            }
        }
    }
    debug!("Fetch worker {worker} stopped");
}
