//! Hand-update sources: LeapMotion hardware or keyboard simulation.
//!
//! A source runs on its own thread and reports [`SourceMessage`]s over an
//! `mpsc` channel.  The update loop drains the channel once per tick and
//! applies messages in arrival order, so the pose cache is only ever touched
//! from that loop.  The channel preserves per-sender order, which keeps
//! Added / Updated / Removed for one hand in the order the provider produced
//! them.
//!
//! [`spawn_hand_source`] returns a [`SourceHandle`]; stopping it (or dropping
//! it) raises the [`StopToken`] the source polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use glam::Vec3;
use grab_throw::TrackingError;
use hand_pose::{HandId, HandPoseSample, HandUpdate};
use tracing::{debug, warn};

// ════════════════════════════════════════════════════════════════════════════
// SourceMessage
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum SourceMessage {
    /// The provider session is up.
    Started,
    Update(HandUpdate),
    /// Terminal; nothing follows.
    Failed(TrackingError),
}

// ════════════════════════════════════════════════════════════════════════════
// StopToken / SourceLink
// ════════════════════════════════════════════════════════════════════════════

/// Cancellation flag shared between a [`SourceHandle`] and its thread.
#[derive(Clone, Debug, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn stop(&self) { self.0.store(true, Ordering::SeqCst); }
    pub fn is_stopped(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

/// What a running source uses to talk back.
pub struct SourceLink {
    tx:    Sender<SourceMessage>,
    stop:  StopToken,
    epoch: Instant,
}

impl SourceLink {
    pub fn started(&self) -> bool {
        self.tx.send(SourceMessage::Started).is_ok()
    }

    /// Returns `false` once nobody is listening or a stop was requested;
    /// the source should return.
    pub fn send(&self, update: HandUpdate) -> bool {
        !self.stop.is_stopped() && self.tx.send(SourceMessage::Update(update)).is_ok()
    }

    pub fn is_stopped(&self) -> bool { self.stop.is_stopped() }

    /// Time since the session epoch.
    pub fn now(&self) -> Duration { self.epoch.elapsed() }
}

// ════════════════════════════════════════════════════════════════════════════
// HandSource trait: unified interface for hw and sim
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver hand updates.
///
/// `run` brings up the provider, calls [`SourceLink::started`], then streams
/// updates until stopped.  Returning `Err` is terminal for the session.
pub trait HandSource: Send + 'static {
    fn run(self: Box<Self>, link: SourceLink) -> Result<(), TrackingError>;
}

// ════════════════════════════════════════════════════════════════════════════
// SourceHandle
// ════════════════════════════════════════════════════════════════════════════

/// Start/stop handle for a source thread, owned by the experience.
pub struct SourceHandle {
    rx:   Receiver<SourceMessage>,
    stop: StopToken,
    join: Option<JoinHandle<()>>,
}

impl SourceHandle {
    /// Everything received so far, in arrival order (non-blocking).
    pub fn drain(&self) -> Vec<SourceMessage> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(m) => out.push(m),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// Ask the source to stop and wait for its thread.
    pub fn stop(&mut self) {
        self.stop.stop();
        self.join();
    }

    /// Wait for the source thread to finish on its own.
    pub fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            if handle.join().is_err() {
                warn!("hand source thread panicked");
            }
        }
    }

    pub fn token(&self) -> StopToken { self.stop.clone() }
}

impl Drop for SourceHandle {
    fn drop(&mut self) { self.stop(); }
}

/// Spawn a hand source on its own thread.  Timestamps are relative to
/// `epoch`.
pub fn spawn_hand_source<S: HandSource>(source: S, epoch: Instant) -> SourceHandle {
    let (tx, rx) = mpsc::channel();
    let stop = StopToken::default();
    let link = SourceLink { tx: tx.clone(), stop: stop.clone(), epoch };
    let token = stop.clone();

    let join = thread::spawn(move || {
        if let Err(e) = Box::new(source).run(link) {
            // A stop request can surface as an error from the provider.
            if !token.is_stopped() {
                let _ = tx.send(SourceMessage::Failed(e));
            }
        }
    });

    SourceHandle { rx, stop, join: Some(join) }
}

// ════════════════════════════════════════════════════════════════════════════
// FrameDiff: per-frame hand lists → Added / Updated / Removed
// ════════════════════════════════════════════════════════════════════════════

/// Turns "these hands are visible now" into update events by remembering
/// which hands were visible last frame.
#[derive(Debug, Default)]
pub struct FrameDiff {
    present: Vec<HandId>,
}

impl FrameDiff {
    pub fn new() -> Self { Self::default() }

    pub fn frame(&mut self, hands: &[(HandId, Vec3)], timestamp: Duration) -> Vec<HandUpdate> {
        let mut out = Vec::with_capacity(hands.len() + self.present.len());

        for &(id, pos) in hands {
            let sample = HandPoseSample::at(id, pos, timestamp);
            if self.present.contains(&id) {
                out.push(HandUpdate::updated(sample));
            } else {
                out.push(HandUpdate::added(sample));
            }
        }

        for &gone in self.present.iter().filter(|id| !hands.iter().any(|(h, _)| h == *id)) {
            out.push(HandUpdate::removed(HandPoseSample::at(gone, Vec3::ZERO, timestamp)));
        }

        self.present = hands.iter().map(|(h, _)| *h).collect();
        out
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PollFailures: when a polled provider has stopped working
// ════════════════════════════════════════════════════════════════════════════

/// Consecutive poll errors tolerated before the stream is declared dead.
pub const POLL_FAILURE_LIMIT: u32 = 20;

/// Counts consecutive poll errors.  Timeouts are not errors; a successful
/// poll resets the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollFailures {
    consecutive: u32,
    limit:       u32,
}

impl Default for PollFailures {
    fn default() -> Self { Self::new(POLL_FAILURE_LIMIT) }
}

impl PollFailures {
    pub fn new(limit: u32) -> Self {
        PollFailures { consecutive: 0, limit: limit.max(1) }
    }

    pub fn succeeded(&mut self) { self.consecutive = 0; }

    /// Record one error.  `Err` once `limit` errors arrived in a row.
    pub fn failed(&mut self, description: String) -> Result<(), TrackingError> {
        self.consecutive += 1;
        if self.consecutive >= self.limit {
            return Err(TrackingError::Stream(description));
        }
        debug!(consecutive = self.consecutive, error = %description, "poll failed");
        Ok(())
    }

    pub fn consecutive(&self) -> u32 { self.consecutive }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapHandSource: real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Hand source backed by a LeapMotion controller.
///
/// Hands are identified by handedness.  Palm positions arrive in
/// millimetres relative to the device and are converted to metres, lifted by
/// `device_height`.
#[cfg(feature = "leap")]
pub struct LeapHandSource {
    pub device_height: f32,
}

#[cfg(feature = "leap")]
impl HandSource for LeapHandSource {
    fn run(self: Box<Self>, link: SourceLink) -> Result<(), TrackingError> {
        use leaprs::*;

        let mut connection = Connection::create(ConnectionConfig::default())
            .map_err(|e| TrackingError::SessionInitialization(format!("{:?}", e)))?;
        connection.open()
            .map_err(|e| TrackingError::SessionInitialization(format!("{:?}", e)))?;
        link.started();

        let mut diff = FrameDiff::new();
        let mut failures = PollFailures::default();
        while !link.is_stopped() {
            let msg = match connection.poll(100) {
                Ok(m) => {
                    failures.succeeded();
                    m
                }
                Err(Error::Timeout) => continue,
                Err(e) => {
                    failures.failed(format!("{:?}", e))?;
                    continue;
                }
            };

            if let Event::Tracking(frame) = msg.event() {
                let hands: Vec<(HandId, Vec3)> = frame.hands()
                    .map(|h| {
                        let id = if h.hand_type() == HandType::Left { HandId::LEFT } else { HandId::RIGHT };
                        let p = h.palm().position();
                        (id, Vec3::new(p.x, p.y, p.z) / 1000.0 + Vec3::Y * self.device_height)
                    })
                    .collect();

                for update in diff.frame(&hands, link.now()) {
                    if !link.send(update) {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimHandSource: keyboard simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw input from the simulation window.
#[derive(Clone, Debug, PartialEq)]
pub enum SimInput {
    /// Move a hand by a delta (metres).
    Nudge(HandId, Vec3),
    /// Show / hide a hand.
    Toggle(HandId),
    /// Make the provider fail mid-stream.
    Fail(String),
}

/// Hand source driven by [`SimInput`] events from the visualizer.
///
/// Starts with the right hand visible in front of the viewer and the left
/// hand hidden.
pub struct SimHandSource {
    pub rx: Receiver<SimInput>,
    /// Refuse to start, as a provider with no permission would.
    pub fail_session: bool,
}

const SIM_RIGHT_START: Vec3 = Vec3::new(0.25, 1.1, -0.4);
const SIM_LEFT_START:  Vec3 = Vec3::new(-0.25, 1.1, -0.4);

impl HandSource for SimHandSource {
    fn run(self: Box<Self>, link: SourceLink) -> Result<(), TrackingError> {
        if self.fail_session {
            return Err(TrackingError::SessionInitialization(
                "simulated provider refused to start".to_string(),
            ));
        }
        link.started();

        let mut right = Some(SIM_RIGHT_START);
        let mut left: Option<Vec3> = None;
        let mut diff = FrameDiff::new();

        let emit = |diff: &mut FrameDiff, left: Option<Vec3>, right: Option<Vec3>| -> bool {
            let mut hands = Vec::with_capacity(2);
            if let Some(p) = right { hands.push((HandId::RIGHT, p)); }
            if let Some(p) = left  { hands.push((HandId::LEFT, p)); }
            diff.frame(&hands, link.now()).into_iter().all(|u| link.send(u))
        };

        if !emit(&mut diff, left, right) {
            return Ok(());
        }

        loop {
            if link.is_stopped() {
                return Ok(());
            }
            let input = match self.rx.recv_timeout(Duration::from_millis(50)) {
                Ok(i) => i,
                Err(RecvTimeoutError::Timeout)      => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            };
            match input {
                SimInput::Nudge(id, delta) => {
                    let slot = if id == HandId::LEFT { &mut left } else { &mut right };
                    if let Some(p) = slot.as_mut() {
                        *p += delta;
                    }
                }
                SimInput::Toggle(id) => {
                    let (slot, start) = if id == HandId::LEFT {
                        (&mut left, SIM_LEFT_START)
                    } else {
                        (&mut right, SIM_RIGHT_START)
                    };
                    *slot = if slot.is_some() { None } else { Some(start) };
                    debug!(hand = %id, visible = slot.is_some(), "sim hand toggled");
                }
                SimInput::Fail(reason) => return Err(TrackingError::Stream(reason)),
            }
            if !emit(&mut diff, left, right) {
                return Ok(());
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use hand_pose::HandUpdateKind;

    fn kinds(updates: &[HandUpdate]) -> Vec<(HandUpdateKind, HandId)> {
        updates.iter().map(|u| (u.kind, u.hand_id())).collect()
    }

    #[test]
    fn frame_diff_added_updated_removed() {
        let mut d = FrameDiff::new();
        let t = Duration::ZERO;
        let a = d.frame(&[(HandId::RIGHT, Vec3::ZERO)], t);
        assert_eq!(kinds(&a), vec![(HandUpdateKind::Added, HandId::RIGHT)]);

        let b = d.frame(&[(HandId::RIGHT, Vec3::X), (HandId::LEFT, Vec3::Y)], t);
        assert_eq!(
            kinds(&b),
            vec![(HandUpdateKind::Updated, HandId::RIGHT), (HandUpdateKind::Added, HandId::LEFT)]
        );

        let c = d.frame(&[(HandId::LEFT, Vec3::Y)], t);
        assert_eq!(
            kinds(&c),
            vec![(HandUpdateKind::Updated, HandId::LEFT), (HandUpdateKind::Removed, HandId::RIGHT)]
        );

        assert_eq!(kinds(&d.frame(&[], t)), vec![(HandUpdateKind::Removed, HandId::LEFT)]);
        assert!(d.frame(&[], t).is_empty());
    }

    /// Scripted source for exercising the thread plumbing.
    struct Script(Vec<HandUpdate>, Option<TrackingError>);

    impl HandSource for Script {
        fn run(self: Box<Self>, link: SourceLink) -> Result<(), TrackingError> {
            link.started();
            for u in self.0 {
                if !link.send(u) { return Ok(()); }
            }
            match self.1 {
                Some(e) => Err(e),
                None    => Ok(()),
            }
        }
    }

    fn updates(n: u64) -> Vec<HandUpdate> {
        (0..n)
            .map(|i| HandUpdate::updated(HandPoseSample::at(HandId(i % 3), Vec3::X * i as f32, Duration::from_millis(i))))
            .collect()
    }

    #[test]
    fn poll_failures_end_the_stream_after_a_run() {
        let mut f = PollFailures::new(3);
        assert_eq!(f.failed("NotConnected".into()), Ok(()));
        assert_eq!(f.failed("NotConnected".into()), Ok(()));
        f.succeeded();
        assert_eq!(f.consecutive(), 0);

        assert_eq!(f.failed("a".into()), Ok(()));
        assert_eq!(f.failed("b".into()), Ok(()));
        assert_eq!(f.failed("UnexpectedClosed".into()), Err(TrackingError::Stream("UnexpectedClosed".into())));
        assert_eq!(PollFailures::default().limit, POLL_FAILURE_LIMIT);
    }

    /// A provider that keeps failing to poll surfaces as a stream failure.
    struct Flaky(u32);

    impl HandSource for Flaky {
        fn run(self: Box<Self>, link: SourceLink) -> Result<(), TrackingError> {
            link.started();
            let mut failures = PollFailures::new(self.0);
            loop {
                failures.failed("device unplugged".into())?;
            }
        }
    }

    #[test]
    fn repeated_poll_errors_report_failed() {
        let mut h = spawn_hand_source(Flaky(5), Instant::now());
        h.join();
        assert_eq!(
            h.drain(),
            vec![SourceMessage::Started, SourceMessage::Failed(TrackingError::Stream("device unplugged".into()))]
        );
    }

    #[test]
    fn messages_arrive_in_order() {
        let script = updates(100);
        let mut h = spawn_hand_source(Script(script.clone(), None), Instant::now());
        h.join();
        let msgs = h.drain();
        assert_eq!(msgs[0], SourceMessage::Started);
        let got: Vec<HandUpdate> = msgs[1..].iter()
            .map(|m| match m {
                SourceMessage::Update(u) => *u,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(got, script);
    }

    #[test]
    fn stream_failure_is_reported_last() {
        let err = TrackingError::Stream("unplugged".into());
        let mut h = spawn_hand_source(Script(updates(3), Some(err.clone())), Instant::now());
        h.join();
        let msgs = h.drain();
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs.last(), Some(&SourceMessage::Failed(err)));
    }

    #[test]
    fn sim_session_failure() {
        let (_tx, rx) = mpsc::channel();
        let mut h = spawn_hand_source(SimHandSource { rx, fail_session: true }, Instant::now());
        h.join();
        let msgs = h.drain();
        assert!(matches!(
            msgs.as_slice(),
            [SourceMessage::Failed(TrackingError::SessionInitialization(_))]
        ));
    }

    #[test]
    fn sim_toggle_and_stop() {
        let (tx, rx) = mpsc::channel();
        let mut h = spawn_hand_source(SimHandSource { rx, fail_session: false }, Instant::now());
        tx.send(SimInput::Toggle(HandId::LEFT)).unwrap();
        tx.send(SimInput::Nudge(HandId::RIGHT, Vec3::X * 0.1)).unwrap();
        drop(tx);
        h.join();
        let msgs = h.drain();
        let got: Vec<_> = msgs.iter()
            .filter_map(|m| match m {
                SourceMessage::Update(u) => Some((u.kind, u.hand_id())),
                _ => None,
            })
            .collect();
        assert_eq!(got, vec![
            (HandUpdateKind::Added,   HandId::RIGHT),
            (HandUpdateKind::Updated, HandId::RIGHT),
            (HandUpdateKind::Added,   HandId::LEFT),
            (HandUpdateKind::Updated, HandId::RIGHT),
            (HandUpdateKind::Updated, HandId::LEFT),
        ]);
    }

    #[test]
    fn sim_stream_failure() {
        let (tx, rx) = mpsc::channel();
        let mut h = spawn_hand_source(SimHandSource { rx, fail_session: false }, Instant::now());
        tx.send(SimInput::Fail("lost tracking".into())).unwrap();
        h.join();
        let msgs = h.drain();
        assert_eq!(
            msgs.last(),
            Some(&SourceMessage::Failed(TrackingError::Stream("lost tracking".into())))
        );
    }

    #[test]
    fn stop_ends_an_idle_source() {
        let (_tx, rx) = mpsc::channel::<SimInput>();
        let mut h = spawn_hand_source(SimHandSource { rx, fail_session: false }, Instant::now());

        // Wait for Started + the initial right hand.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while seen.len() < 2 && Instant::now() < deadline {
            seen.extend(h.drain());
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(seen.len(), 2);

        let token = h.token();
        h.stop();
        assert!(token.is_stopped());
        assert!(h.drain().is_empty());
    }
}
