//! Cross-worker evaluation.
//!
//! When a domain is partitioned between workers, no single worker can evaluate
//! every point of a batch. [`evaluate_global`] lets each worker evaluate the
//! full batch, keeps the points it could resolve, and merges the resolved
//! subsets on a coordinator worker:
//!
//! 1. every worker evaluates every point; an out-of-domain point is simply not
//!    resolved locally, any other error is a genuine failure
//! 2. every worker sends its resolved `(index, value)` pairs, or a failure notice,
//!    to the coordinator
//! 3. the coordinator fills a full-length result in original point order; a point
//!    resolved by several workers takes the value of the lowest rank
//! 4. a point resolved by no worker is a [`EvaluationError::NoResultFound`]
//!
//! Only the coordinator returns results; every other worker returns `Ok(None)`.
//! The call is collective: all workers must make it, in the same order relative
//! to their other collective calls, or the exchange blocks forever.
//!
//! The transport is abstracted by [`Communicator`]. [`SelfCommunicator`] serves a
//! single worker and [`ThreadCommunicator`] connects in-process workers through
//! `crossbeam` channels.

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::backends::points::EvalData;
use crate::errors::{CommError, EvaluationError};
use crate::expr::Function;
use crate::io::IoBuffer;
use crate::query::{Query, Results};

/// Points one worker resolved out of a batch of `total`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSubset {
    pub rank: usize,
    pub total: usize,
    pub indices: Vec<usize>,
    pub values: Vec<IoBuffer>,
}

/// Payload exchanged between workers in a collective call.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Resolved(ResolvedSubset),
    Failed { rank: usize, message: String },
    Extrema { min: Option<f64>, max: Option<f64> },
}

impl Message {
    pub fn describe(&self) -> &'static str {
        match self {
            Message::Resolved(_) => "resolved subset",
            Message::Failed { .. } => "failure notice",
            Message::Extrema { .. } => "extrema",
        }
    }
}

/// Collective transport between the workers of a computation.
///
/// Every method is collective: all workers of the group must call it with the same
/// `root`, and in the same order relative to other collective calls.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Sends `message` to `root`.
    ///
    /// Returns `Some` on the root with one message per worker, in rank order, and
    /// `None` on every other worker.
    fn gather(&self, root: usize, message: Message) -> Result<Option<Vec<Message>>, CommError>;

    /// Distributes the root's message to every worker. Only the root's `message` is used.
    fn broadcast(&self, root: usize, message: Option<Message>) -> Result<Message, CommError>;
}

fn check_root(root: usize, size: usize) -> Result<(), CommError> {
    if root < size {
        Ok(())
    } else {
        Err(CommError::InvalidRank { rank: root, size })
    }
}

/// The communicator of a computation with a single worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfCommunicator;

impl Communicator for SelfCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn gather(&self, root: usize, message: Message) -> Result<Option<Vec<Message>>, CommError> {
        check_root(root, 1)?;
        Ok(Some(vec![message]))
    }

    fn broadcast(&self, root: usize, message: Option<Message>) -> Result<Message, CommError> {
        check_root(root, 1)?;
        message.ok_or_else(|| CommError::Protocol("root supplied no message to broadcast".into()))
    }
}

struct Envelope {
    from: usize,
    seq: u64,
    message: Message,
}

#[derive(Default)]
struct Pending {
    seq: u64,
    /// Envelopes that arrived ahead of the collective call they belong to
    stash: Vec<Envelope>,
}

/// One member of a group of in-process workers.
///
/// Each collective call is numbered; messages are matched by sender and call
/// number, so a fast peer already in a later call cannot be confused with the
/// current one.
///
/// # Example
/// ```
/// use fngraph::prelude::*;
///
/// let comms = ThreadCommunicator::group(3);
/// let ranks: Vec<usize> = std::thread::scope(|s| {
///     let handles: Vec<_> = comms
///         .into_iter()
///         .map(|comm| s.spawn(move || comm.rank()))
///         .collect();
///     handles.into_iter().map(|h| h.join().unwrap()).collect()
/// });
/// assert_eq!(ranks, vec![0, 1, 2]);
/// ```
pub struct ThreadCommunicator {
    rank: usize,
    peers: Vec<Option<Sender<Envelope>>>,
    receiver: Receiver<Envelope>,
    pending: Mutex<Pending>,
}

impl ThreadCommunicator {
    /// Creates `size` connected communicators, ranks `0..size` in order.
    pub fn group(size: usize) -> Vec<ThreadCommunicator> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| ThreadCommunicator {
                rank,
                peers: senders
                    .iter()
                    .enumerate()
                    .map(|(peer, sender)| (peer != rank).then(|| sender.clone()))
                    .collect(),
                receiver,
                pending: Mutex::new(Pending::default()),
            })
            .collect()
    }

    fn send(&self, to: usize, seq: u64, message: Message) -> Result<(), CommError> {
        let sender = self
            .peers
            .get(to)
            .and_then(Option::as_ref)
            .ok_or(CommError::InvalidRank {
                rank: to,
                size: self.peers.len(),
            })?;
        sender
            .send(Envelope {
                from: self.rank,
                seq,
                message,
            })
            .map_err(|_| CommError::Disconnected(to))
    }

    /// Receives the message `from` sent for collective call `seq`.
    fn receive(&self, pending: &mut Pending, from: usize, seq: u64) -> Result<Message, CommError> {
        if let Some(pos) = pending
            .stash
            .iter()
            .position(|e| e.from == from && e.seq == seq)
        {
            return Ok(pending.stash.swap_remove(pos).message);
        }
        loop {
            let envelope = self
                .receiver
                .recv()
                .map_err(|_| CommError::Disconnected(from))?;
            if envelope.from == from && envelope.seq == seq {
                return Ok(envelope.message);
            }
            pending.stash.push(envelope);
        }
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn gather(&self, root: usize, message: Message) -> Result<Option<Vec<Message>>, CommError> {
        check_root(root, self.size())?;
        let mut pending = self.pending.lock();
        pending.seq += 1;
        let seq = pending.seq;

        if self.rank != root {
            self.send(root, seq, message)?;
            return Ok(None);
        }
        let mut messages = (0..self.size())
            .filter(|&from| from != root)
            .map(|from| self.receive(&mut pending, from, seq))
            .collect::<Result<Vec<_>, _>>()?;
        messages.insert(root, message);
        Ok(Some(messages))
    }

    fn broadcast(&self, root: usize, message: Option<Message>) -> Result<Message, CommError> {
        check_root(root, self.size())?;
        let mut pending = self.pending.lock();
        pending.seq += 1;
        let seq = pending.seq;

        if self.rank != root {
            return self.receive(&mut pending, root, seq);
        }
        let message = message
            .ok_or_else(|| CommError::Protocol("root supplied no message to broadcast".into()))?;
        for peer in (0..self.size()).filter(|&peer| peer != root) {
            self.send(peer, seq, message.clone())?;
        }
        Ok(message)
    }
}

/// Options for [`evaluate_global`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlobalOptions {
    /// Rank of the coordinator that merges and returns the results
    pub root: usize,
}

/// Evaluates `function` over a batch of points spread across workers.
///
/// # Arguments
/// * `function` - The Function to evaluate
/// * `data` - The full batch of points, identical on every worker
/// * `comm` - Transport connecting the workers
/// * `options` - Coordinator selection
///
/// # Returns
/// * `Ok(Some(Results))` - On the coordinator: results for every point, in batch order
/// * `Ok(None)` - On every other worker
/// * `Err(EvaluationError::NoResultFound)` - On the coordinator: some points were resolved nowhere
/// * `Err(EvaluationError::PeerFailure)` - On the coordinator: another worker failed
/// * `Err(EvaluationError)` - On a worker whose own evaluation failed for a reason other
///   than an out-of-domain point
pub fn evaluate_global<'a>(
    function: &Function,
    data: impl Into<EvalData<'a>>,
    comm: &dyn Communicator,
    options: GlobalOptions,
) -> Result<Option<Results>, EvaluationError> {
    check_root(options.root, comm.size())?;
    let rank = comm.rank();

    let local = Query::new(function)
        .outcomes(data)
        .and_then(|outcomes| resolve(rank, outcomes));
    let (message, failure) = match local {
        Ok(subset) => {
            debug!(
                "worker {rank} resolved {} of {} point(s)",
                subset.indices.len(),
                subset.total
            );
            (Message::Resolved(subset), None)
        }
        Err(err) => (
            Message::Failed {
                rank,
                message: err.to_string(),
            },
            Some(err),
        ),
    };

    let gathered = comm.gather(options.root, message)?;
    if let Some(err) = failure {
        return Err(err);
    }
    match gathered {
        Some(messages) => merge(messages).map(Some),
        None => Ok(None),
    }
}

fn resolve(
    rank: usize,
    outcomes: Vec<Result<IoBuffer, EvaluationError>>,
) -> Result<ResolvedSubset, EvaluationError> {
    let total = outcomes.len();
    let mut indices = Vec::new();
    let mut values = Vec::new();
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(value) => {
                indices.push(index);
                values.push(value);
            }
            Err(err) if err.is_out_of_domain() => {}
            Err(err) => return Err(err),
        }
    }
    Ok(ResolvedSubset {
        rank,
        total,
        indices,
        values,
    })
}

fn merge(messages: Vec<Message>) -> Result<Results, EvaluationError> {
    let mut subsets = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            Message::Resolved(subset) => subsets.push(subset),
            Message::Failed { rank, message } => {
                return Err(EvaluationError::PeerFailure { rank, message })
            }
            other => {
                return Err(CommError::Protocol(format!(
                    "expected resolved points, received {}",
                    other.describe()
                ))
                .into())
            }
        }
    }

    let total = subsets.first().map_or(0, |s| s.total);
    if let Some(bad) = subsets.iter().find(|s| s.total != total) {
        return Err(CommError::Protocol(format!(
            "worker {} evaluated {} point(s), expected {total}",
            bad.rank, bad.total
        ))
        .into());
    }

    let mut slots: Vec<Option<IoBuffer>> = vec![None; total];
    let mut duplicates = 0usize;
    for subset in subsets {
        for (index, value) in subset.indices.into_iter().zip(subset.values) {
            match slots.get_mut(index) {
                Some(slot) if slot.is_none() => *slot = Some(value),
                Some(_) => duplicates += 1,
                None => {
                    return Err(CommError::Protocol(format!(
                        "worker {} resolved point {index} of a {total} point batch",
                        subset.rank
                    ))
                    .into())
                }
            }
        }
    }
    if duplicates > 0 {
        warn!("{duplicates} point(s) were resolved by more than one worker; lowest rank kept");
    }

    let missing: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.is_none().then_some(i))
        .collect();
    if !missing.is_empty() {
        return Err(EvaluationError::NoResultFound { indices: missing });
    }
    debug!("merged {total} point(s) from all workers");
    Results::from_buffers(slots.into_iter().flatten().collect())
}

impl Function {
    /// Collective evaluation with the default coordinator (rank 0); see [`evaluate_global`].
    pub fn evaluate_global<'a>(
        &self,
        data: impl Into<EvalData<'a>>,
        comm: &dyn Communicator,
    ) -> Result<Option<Results>, EvaluationError> {
        evaluate_global(self, data, comm, GlobalOptions::default())
    }
}
