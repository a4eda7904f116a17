//! Parallel, time-bounded recognition of low-density pages.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tracing::{debug, info, warn};

use super::{RecognitionBackend, RecognitionOutcome, SkipReason};
use crate::cancel::CancelFlag;
use crate::error::OcrError;

/// How often a waiting caller checks the cancel flag.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Worker count used when the platform cannot report its parallelism.
const FALLBACK_WORKERS: usize = 4;

/// A page image waiting for recognition.
pub struct RecognitionJob {
    /// Page number the result belongs to.
    pub page: u32,
    /// Raster image of the page.
    pub image: DynamicImage,
}

/// Time limit for a single page, started when a worker picks the page up.
#[derive(Debug, Clone)]
pub struct PageDeadline {
    started: Instant,
    timeout: Duration,
    cancel: CancelFlag,
}

impl PageDeadline {
    pub fn new(timeout: Duration, cancel: CancelFlag) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            cancel,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }

    /// `Err` once the page has run out of time or the run was cancelled.
    pub fn check(&self) -> Result<(), OcrError> {
        if self.cancel.is_cancelled() {
            return Err(OcrError::Cancelled);
        }
        if self.remaining().is_zero() {
            return Err(OcrError::Timeout(self.timeout.as_secs()));
        }
        Ok(())
    }
}

/// Number of recognition workers to run.
///
/// `configured == 0` means one per available core. The result never exceeds
/// the number of pages or the backend's own limit.
pub fn worker_count(configured: usize, backend_limit: Option<usize>, pages: usize) -> usize {
    let wanted = if configured == 0 {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(FALLBACK_WORKERS)
    } else {
        configured
    };
    wanted
        .min(backend_limit.unwrap_or(usize::MAX))
        .min(pages)
        .max(1)
}

enum Event {
    Started { page: u32, at: Instant },
    Finished { page: u32, result: Result<String, OcrError> },
    Exited,
}

type JobQueue = Arc<Mutex<VecDeque<RecognitionJob>>>;

struct Pool {
    backend: Arc<dyn RecognitionBackend>,
    queue: JobQueue,
    events: Sender<(usize, Event)>,
    timeout: Duration,
    cancel: CancelFlag,
    next_id: usize,
}

impl Pool {
    fn spawn(&mut self) -> std::io::Result<usize> {
        let id = self.next_id;
        let backend = Arc::clone(&self.backend);
        let queue = Arc::clone(&self.queue);
        let events = self.events.clone();
        let timeout = self.timeout;
        let cancel = self.cancel.clone();

        thread::Builder::new()
            .name(format!("ocr-worker-{}", id))
            .spawn(move || run_worker(id, backend, queue, events, timeout, cancel))?;
        self.next_id += 1;
        Ok(id)
    }

    fn has_queued(&self) -> bool {
        self.queue.lock().map(|q| !q.is_empty()).unwrap_or(false)
    }

    fn drain_queue(&self) -> Vec<u32> {
        match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).map(|job| job.page).collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn run_worker(
    id: usize,
    backend: Arc<dyn RecognitionBackend>,
    queue: JobQueue,
    events: Sender<(usize, Event)>,
    timeout: Duration,
    cancel: CancelFlag,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let job = match queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(_) => None,
        };
        let Some(job) = job else { break };

        let deadline = PageDeadline::new(timeout, cancel.clone());
        let started = Event::Started {
            page: job.page,
            at: deadline.started,
        };
        if events.send((id, started)).is_err() {
            return;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            backend.recognize(&job.image, &deadline)
        }))
        .unwrap_or_else(|_| Err(OcrError::Recognition("recognition worker panicked".to_string())));

        let finished = Event::Finished {
            page: job.page,
            result,
        };
        // The receiver is gone once the caller stops waiting.
        if events.send((id, finished)).is_err() {
            return;
        }
    }
    let _ = events.send((id, Event::Exited));
}

/// Recognize every job on a bounded pool of worker threads.
///
/// Each page gets `timeout` from the moment a worker starts on it. A page that
/// runs over is reported as [`SkipReason::TimedOut`]; its worker is written off
/// and a replacement is started for the remaining queue.
pub fn recognize_pages(
    backend: Arc<dyn RecognitionBackend>,
    jobs: Vec<RecognitionJob>,
    timeout: Duration,
    workers: usize,
    cancel: &CancelFlag,
) -> BTreeMap<u32, RecognitionOutcome> {
    let mut outcomes = BTreeMap::new();
    if jobs.is_empty() {
        return outcomes;
    }

    if cancel.is_cancelled() {
        for job in jobs {
            outcomes.insert(job.page, RecognitionOutcome::Skipped(SkipReason::Cancelled));
        }
        return outcomes;
    }

    let wanted = worker_count(workers, backend.max_concurrency(), jobs.len());
    info!(
        "Running {} recognition on {} low-text pages with {} workers",
        backend.name(),
        jobs.len(),
        wanted
    );

    let mut remaining: BTreeSet<u32> = jobs.iter().map(|job| job.page).collect();
    let (tx, rx) = mpsc::channel::<(usize, Event)>();
    let mut pool = Pool {
        backend,
        queue: Arc::new(Mutex::new(jobs.into_iter().collect())),
        events: tx,
        timeout,
        cancel: cancel.clone(),
        next_id: 0,
    };

    // Pages in flight: page -> (worker, start).
    let mut running: BTreeMap<u32, (usize, Instant)> = BTreeMap::new();
    // Workers whose page timed out; they may still come back.
    let mut stuck: BTreeSet<usize> = BTreeSet::new();
    let mut active = 0usize;

    while !remaining.is_empty() {
        if cancel.is_cancelled() {
            debug!("Recognition cancelled with {} pages pending", remaining.len());
            pool.drain_queue();
            for page in std::mem::take(&mut remaining) {
                outcomes.insert(page, RecognitionOutcome::Skipped(SkipReason::Cancelled));
            }
            break;
        }

        let now = Instant::now();
        let expired: Vec<u32> = running
            .iter()
            .filter(|(_, (_, start))| now.duration_since(*start) >= timeout)
            .map(|(page, _)| *page)
            .collect();
        for page in expired {
            if let Some((worker, _)) = running.remove(&page) {
                warn!("Recognition timed out for page {}", page);
                remaining.remove(&page);
                outcomes.insert(page, RecognitionOutcome::Skipped(SkipReason::TimedOut));
                stuck.insert(worker);
                active = active.saturating_sub(1);
            }
        }

        while active < wanted && pool.has_queued() {
            match pool.spawn() {
                Ok(id) => {
                    debug!("Started recognition worker {}", id);
                    active += 1;
                }
                Err(e) => {
                    warn!("Could not start recognition worker: {}", e);
                    if active == 0 {
                        for page in pool.drain_queue() {
                            remaining.remove(&page);
                            outcomes.insert(
                                page,
                                RecognitionOutcome::Skipped(SkipReason::Failed(e.to_string())),
                            );
                        }
                    }
                    break;
                }
            }
        }

        if remaining.is_empty() {
            break;
        }

        let wait = running
            .values()
            .map(|(_, start)| timeout.saturating_sub(start.elapsed()))
            .min()
            .map_or(CANCEL_POLL, |left| left.min(CANCEL_POLL));

        match rx.recv_timeout(wait) {
            Ok((worker, Event::Started { page, at })) => {
                running.insert(page, (worker, at));
            }
            Ok((worker, Event::Finished { page, result })) => {
                if stuck.remove(&worker) {
                    active += 1;
                }
                running.remove(&page);
                if remaining.remove(&page) {
                    outcomes.insert(page, outcome_from_result(page, result));
                } else {
                    debug!("Discarding late recognition result for page {}", page);
                }
            }
            Ok((worker, Event::Exited)) => {
                if !stuck.remove(&worker) {
                    active = active.saturating_sub(1);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            // The pool keeps a sender, so the channel never disconnects here.
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    outcomes
}

fn outcome_from_result(page: u32, result: Result<String, OcrError>) -> RecognitionOutcome {
    match result {
        Ok(text) => {
            debug!("Page {}: recognized {} chars", page, text.trim().chars().count());
            RecognitionOutcome::Recognized(text)
        }
        Err(OcrError::Unavailable(reason)) => {
            warn!("Recognition unavailable for page {}: {}", page, reason);
            RecognitionOutcome::Skipped(SkipReason::BackendUnavailable)
        }
        Err(OcrError::Timeout(_)) => {
            warn!("Recognition timed out for page {}", page);
            RecognitionOutcome::Skipped(SkipReason::TimedOut)
        }
        Err(OcrError::Cancelled) => RecognitionOutcome::Skipped(SkipReason::Cancelled),
        Err(e) => {
            warn!("OCR page {} failed: {}", page, e);
            RecognitionOutcome::Skipped(SkipReason::Failed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrStatus;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ready(name: &str) -> OcrStatus {
        OcrStatus {
            backend: name.to_string(),
            importable: true,
            executable_found: true,
            version: Some("1.0".to_string()),
            error: None,
        }
    }

    /// Backend that answers with a fixed text after a delay.
    ///
    /// Images one pixel wide take `slow_delay` instead of `delay`.
    struct FakeBackend {
        text: String,
        delay: Duration,
        slow_delay: Duration,
    }

    impl FakeBackend {
        fn new(text: &str, delay: Duration) -> Self {
            Self {
                text: text.to_string(),
                delay,
                slow_delay: delay,
            }
        }
    }

    impl RecognitionBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        fn status(&self) -> OcrStatus {
            ready("fake")
        }

        fn recognize(&self, image: &DynamicImage, _deadline: &PageDeadline) -> Result<String, OcrError> {
            let delay = if image.width() == 1 { self.slow_delay } else { self.delay };
            thread::sleep(delay);
            Ok(format!("{} {}", self.text, image.width()))
        }
    }

    /// Backend that can only recognize one page at a time and records how
    /// many calls overlapped.
    struct SingleSlotBackend {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RecognitionBackend for SingleSlotBackend {
        fn name(&self) -> &str {
            "single-slot"
        }

        fn status(&self) -> OcrStatus {
            ready("single-slot")
        }

        fn max_concurrency(&self) -> Option<usize> {
            Some(1)
        }

        fn recognize(&self, _image: &DynamicImage, _deadline: &PageDeadline) -> Result<String, OcrError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("text".to_string())
        }
    }

    fn job(page: u32, width: u32) -> RecognitionJob {
        RecognitionJob {
            page,
            image: DynamicImage::new_rgb8(width, 2),
        }
    }

    #[test]
    fn test_results_land_in_page_slots() {
        let backend = Arc::new(FakeBackend::new("page", Duration::ZERO));
        let outcomes = recognize_pages(
            backend,
            vec![job(3, 30), job(1, 10)],
            Duration::from_secs(5),
            0,
            &CancelFlag::new(),
        );
        assert_eq!(
            outcomes.get(&1),
            Some(&RecognitionOutcome::Recognized("page 10".to_string()))
        );
        assert_eq!(
            outcomes.get(&3),
            Some(&RecognitionOutcome::Recognized("page 30".to_string()))
        );
    }

    #[test]
    fn test_timeout_marks_page_skipped() {
        let backend = Arc::new(FakeBackend::new("late", Duration::from_secs(2)));
        let outcomes = recognize_pages(
            backend,
            vec![job(1, 1)],
            Duration::from_millis(50),
            1,
            &CancelFlag::new(),
        );
        assert_eq!(
            outcomes.get(&1),
            Some(&RecognitionOutcome::Skipped(SkipReason::TimedOut))
        );
    }

    #[test]
    fn test_timeout_applies_per_page_not_per_document() {
        let backend = Arc::new(SingleSlotBackend {
            delay: Duration::from_millis(150),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let jobs = (1..=4).map(|page| job(page, 8)).collect();

        // Four pages in sequence take 600ms, well over the 400ms page timeout.
        let outcomes = recognize_pages(
            Arc::clone(&backend) as Arc<dyn RecognitionBackend>,
            jobs,
            Duration::from_millis(400),
            4,
            &CancelFlag::new(),
        );

        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.values().all(RecognitionOutcome::ran));
    }

    #[test]
    fn test_stuck_page_does_not_block_the_queue() {
        let backend = Arc::new(FakeBackend {
            text: "ok".to_string(),
            delay: Duration::ZERO,
            slow_delay: Duration::from_secs(2),
        });
        let start = Instant::now();
        let outcomes = recognize_pages(
            backend,
            vec![job(1, 1), job(2, 20), job(3, 30)],
            Duration::from_millis(100),
            1,
            &CancelFlag::new(),
        );

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(
            outcomes.get(&1),
            Some(&RecognitionOutcome::Skipped(SkipReason::TimedOut))
        );
        assert_eq!(
            outcomes.get(&2),
            Some(&RecognitionOutcome::Recognized("ok 20".to_string()))
        );
        assert_eq!(
            outcomes.get(&3),
            Some(&RecognitionOutcome::Recognized("ok 30".to_string()))
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let backend = Arc::new(FakeBackend::new("never", Duration::ZERO));
        let outcomes = recognize_pages(backend, vec![job(2, 1)], Duration::from_secs(1), 0, &cancel);
        assert_eq!(
            outcomes.get(&2),
            Some(&RecognitionOutcome::Skipped(SkipReason::Cancelled))
        );
    }

    #[test]
    fn test_unavailable_backend_is_not_a_failure() {
        let backend = Arc::new(crate::ocr::UnavailableBackend::disabled());
        let outcomes =
            recognize_pages(backend, vec![job(1, 1)], Duration::from_secs(1), 0, &CancelFlag::new());
        assert_eq!(
            outcomes.get(&1),
            Some(&RecognitionOutcome::Skipped(SkipReason::BackendUnavailable))
        );
    }

    #[test]
    fn test_worker_count_bounds() {
        assert_eq!(worker_count(8, None, 3), 3);
        assert_eq!(worker_count(8, Some(1), 6), 1);
        assert_eq!(worker_count(2, None, 6), 2);
        assert!(worker_count(0, None, 64) >= 1);
        assert_eq!(worker_count(0, None, 0), 1);
    }

    #[test]
    fn test_deadline_check() {
        let cancel = CancelFlag::new();
        let deadline = PageDeadline::new(Duration::from_secs(30), cancel.clone());
        assert!(deadline.check().is_ok());
        cancel.cancel();
        assert!(matches!(deadline.check(), Err(OcrError::Cancelled)));

        let expired = PageDeadline::new(Duration::ZERO, CancelFlag::new());
        assert!(matches!(expired.check(), Err(OcrError::Timeout(0))));
    }
}
