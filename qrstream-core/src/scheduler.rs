//! Sender-side transmission scheduling
//!
//! A round shows every content frame once, then walks the loss-rate ladder,
//! emitting all correction frames of each rung before moving to the next.
//! Rounds repeat until the caller stops asking.

use crate::constants::LOSS_RATE_LADDER;
use crate::error::FrameError;
use crate::fec::{correction_frames_count, RedundancyEncoder, XorParity};
use crate::framer::FrameSet;
use bytes::Bytes;
use hashbrown::HashMap;

#[cfg(feature = "logging")]
use tracing::debug;

/// Position of the scheduler within a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Showing content frame `next`
    SendingContent {
        /// Next content frame index
        next: usize,
    },

    /// Showing correction frame `index` of ladder rung `rung`
    SendingCorrections {
        /// Position in the loss-rate ladder
        rung: usize,
        /// Correction index within the rung
        index: usize,
    },
}

/// What a scheduled payload is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A content frame
    Content {
        /// Frame index
        index: usize,
    },

    /// A correction frame
    Correction {
        /// Assumed loss rate in percent
        loss_rate_percent: u8,
        /// Correction index
        index: usize,
    },
}

/// One payload handed to the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledFrame {
    /// Round the payload belongs to, starting at 1
    pub round: u64,

    /// Kind of frame
    pub kind: FrameKind,

    /// The encoded payload
    pub payload: Bytes,
}

/// Produces the endless sequence of payloads for one file
#[derive(Debug)]
pub struct TransmissionScheduler {
    frames: FrameSet,
    state: SchedulerState,
    round: u64,
    corrections: HashMap<(u8, usize), Bytes>,
    capacity_limit: Option<usize>,
}

impl TransmissionScheduler {
    /// Schedule the given frames, starting with content frame 0 of round 1
    pub fn new(frames: FrameSet) -> Self {
        Self {
            frames,
            state: SchedulerState::SendingContent { next: 0 },
            round: 1,
            corrections: HashMap::new(),
            capacity_limit: None,
        }
    }

    /// Refuse to emit payloads longer than `limit` bytes
    pub fn with_capacity_limit(mut self, limit: usize) -> Result<Self, FrameError> {
        let longest = self.frames.max_frame_len();
        if longest > limit {
            return Err(FrameError::PayloadTooLarge(longest, limit));
        }
        self.capacity_limit = Some(limit);
        Ok(self)
    }

    /// Frames being sent
    pub fn frames(&self) -> &FrameSet {
        &self.frames
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Round of the next payload
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Whether correction frames are sent at all
    ///
    /// With a single content frame there is nothing to XOR it against.
    pub fn sends_corrections(&self) -> bool {
        self.frames.len() >= 2
    }

    /// Number of payloads in one round
    pub fn round_len(&self) -> usize {
        let n = self.frames.len();
        if !self.sends_corrections() {
            return n;
        }
        n + LOSS_RATE_LADDER
            .iter()
            .map(|&p| correction_frames_count(n, p))
            .sum::<usize>()
    }

    /// Produce the next payload and advance
    pub fn next_frame(&mut self) -> Result<ScheduledFrame, FrameError> {
        let round = self.round;
        let n = self.frames.len();

        let (kind, payload) = match self.state {
            SchedulerState::SendingContent { next } => {
                let payload = self.frames.get(next).cloned().ok_or_else(|| {
                    FrameError::InvalidStructure(format!("no content frame {}", next))
                })?;

                self.state = if next + 1 < n {
                    SchedulerState::SendingContent { next: next + 1 }
                } else if self.sends_corrections() {
                    SchedulerState::SendingCorrections { rung: 0, index: 0 }
                } else {
                    self.next_round();
                    SchedulerState::SendingContent { next: 0 }
                };

                (FrameKind::Content { index: next }, payload)
            }
            SchedulerState::SendingCorrections { rung, index } => {
                let loss_rate_percent = LOSS_RATE_LADDER[rung];
                let payload = self.correction(loss_rate_percent, index)?;

                self.state = if index + 1 < correction_frames_count(n, loss_rate_percent) {
                    SchedulerState::SendingCorrections {
                        rung,
                        index: index + 1,
                    }
                } else if rung + 1 < LOSS_RATE_LADDER.len() {
                    SchedulerState::SendingCorrections {
                        rung: rung + 1,
                        index: 0,
                    }
                } else {
                    self.next_round();
                    SchedulerState::SendingContent { next: 0 }
                };

                (
                    FrameKind::Correction {
                        loss_rate_percent,
                        index,
                    },
                    payload,
                )
            }
        };

        Ok(ScheduledFrame {
            round,
            kind,
            payload,
        })
    }

    fn next_round(&mut self) {
        self.round += 1;

        #[cfg(feature = "logging")]
        debug!("Starting round {} of {} frames", self.round, self.frames.len());
    }

    fn correction(&mut self, loss_rate_percent: u8, index: usize) -> Result<Bytes, FrameError> {
        if let Some(payload) = self.corrections.get(&(loss_rate_percent, index)) {
            return Ok(payload.clone());
        }

        let payload = XorParity
            .encode_correction(&self.frames, self.frames.len(), loss_rate_percent, index)?
            .encode()?;

        if let Some(limit) = self.capacity_limit {
            if payload.len() > limit {
                return Err(FrameError::PayloadTooLarge(payload.len(), limit));
            }
        }

        self.corrections
            .insert((loss_rate_percent, index), payload.clone());
        Ok(payload)
    }
}

impl Iterator for TransmissionScheduler {
    type Item = Result<ScheduledFrame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_frame())
    }
}

/// Sink that displays one payload at a time
pub trait FrameRenderer {
    /// Replace the displayed code with `frame`
    fn render(&mut self, frame: &ScheduledFrame) -> Result<(), FrameError>;
}

/// Drive `scheduler` into `renderer`, one payload per `interval`
///
/// Stops after `max_rounds` complete rounds, or never when it is `None`.
/// Returns the number of payloads rendered. A zero interval renders as fast
/// as the renderer accepts.
#[cfg(feature = "runtime")]
pub async fn transmit<R: FrameRenderer>(
    scheduler: &mut TransmissionScheduler,
    renderer: &mut R,
    interval: std::time::Duration,
    max_rounds: Option<u64>,
) -> Result<u64, FrameError> {
    use tokio::time::MissedTickBehavior;

    let mut ticker = if interval.is_zero() {
        None
    } else {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(ticker)
    };

    let mut shown = 0u64;
    loop {
        if max_rounds.is_some_and(|max| scheduler.round() > max) {
            break;
        }

        match ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => tokio::task::yield_now().await,
        }

        let frame = scheduler.next_frame()?;
        renderer.render(&frame)?;
        shown += 1;
    }

    Ok(shown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fec::CorrectionFrame;
    use crate::framer::ContentBuilder;

    fn frames(payload_len: usize, capacity: usize) -> FrameSet {
        ContentBuilder::new("in.txt")
            .payload(vec![b'x'; payload_len])
            .data_capacity(capacity)
            .build()
            .unwrap()
    }

    #[test]
    fn test_round_structure() {
        let set = frames(20, 16);
        assert_eq!(set.len(), 3);

        let mut scheduler = TransmissionScheduler::new(set);
        assert_eq!(scheduler.round_len(), 17);

        let round: Vec<_> = (0..17).map(|_| scheduler.next_frame().unwrap()).collect();
        for (i, frame) in round.iter().take(3).enumerate() {
            assert_eq!(frame.kind, FrameKind::Content { index: i });
            assert_eq!(frame.round, 1);
        }
        assert_eq!(
            round[3].kind,
            FrameKind::Correction {
                loss_rate_percent: 1,
                index: 0
            }
        );
        assert_eq!(
            round[16].kind,
            FrameKind::Correction {
                loss_rate_percent: 89,
                index: 2
            }
        );
        assert!(round.iter().all(|f| f.round == 1));

        let next = scheduler.next_frame().unwrap();
        assert_eq!(next.round, 2);
        assert_eq!(next.kind, FrameKind::Content { index: 0 });
    }

    #[test]
    fn test_single_frame_skips_corrections() {
        let mut scheduler = TransmissionScheduler::new(frames(1, 200));
        assert_eq!(scheduler.round_len(), 1);

        for round in 1..=3 {
            let frame = scheduler.next_frame().unwrap();
            assert_eq!(frame.round, round);
            assert_eq!(frame.kind, FrameKind::Content { index: 0 });
        }
    }

    #[test]
    fn test_corrections_are_stable() {
        let mut scheduler = TransmissionScheduler::new(frames(40, 9));
        let len = scheduler.round_len();

        let first: Vec<_> = (0..len).map(|_| scheduler.next_frame().unwrap()).collect();
        let second: Vec<_> = (0..len).map(|_| scheduler.next_frame().unwrap()).collect();

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.payload, b.payload);
        }

        for frame in &first {
            if let FrameKind::Correction {
                loss_rate_percent,
                index,
            } = frame.kind
            {
                let decoded = CorrectionFrame::decode(&frame.payload).unwrap();
                assert_eq!(decoded.loss_rate_percent, loss_rate_percent);
                assert_eq!(decoded.index, index);
            }
        }
    }

    #[test]
    fn test_capacity_limit() {
        let set = frames(100, 20);
        let longest = set.max_frame_len();

        assert!(matches!(
            TransmissionScheduler::new(set.clone()).with_capacity_limit(longest - 1),
            Err(FrameError::PayloadTooLarge(_, _))
        ));

        // Base64 of a whole frame is longer than the frame itself
        let mut scheduler = TransmissionScheduler::new(set)
            .with_capacity_limit(longest)
            .unwrap();
        let result: Result<Vec<_>, _> = (0..scheduler.round_len())
            .map(|_| scheduler.next_frame())
            .collect();
        assert!(matches!(result, Err(FrameError::PayloadTooLarge(_, _))));
    }

    #[cfg(feature = "runtime")]
    #[tokio::test]
    async fn test_transmit_rounds() {
        struct Collect(Vec<ScheduledFrame>);

        impl FrameRenderer for Collect {
            fn render(&mut self, frame: &ScheduledFrame) -> Result<(), FrameError> {
                self.0.push(frame.clone());
                Ok(())
            }
        }

        let mut scheduler = TransmissionScheduler::new(frames(20, 16));
        let mut renderer = Collect(Vec::new());

        let shown = transmit(
            &mut scheduler,
            &mut renderer,
            std::time::Duration::ZERO,
            Some(2),
        )
        .await
        .unwrap();

        assert_eq!(shown, 34);
        assert_eq!(renderer.0.len(), 34);
        assert_eq!(renderer.0.last().unwrap().round, 2);
    }
}
