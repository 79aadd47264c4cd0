use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::compiler::Command;
use crate::lock;

pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProgramStatus {
    Stopped,
    Running,
    Finished,
    Abort,
}

impl ProgramStatus {
    /// Finished and Abort are final; a program never leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgramStatus::Finished | ProgramStatus::Abort)
    }
}

impl fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProgramStatus::Stopped => "stopped",
            ProgramStatus::Running => "running",
            ProgramStatus::Finished => "finished",
            ProgramStatus::Abort => "abort",
        };
        f.write_str(name)
    }
}

/// A zero-argument step a program can play back.
pub trait Action: Send + Sync {
    fn invoke(&self);
}

impl Action for Command {
    fn invoke(&self) {
        Command::invoke(self);
    }
}

impl<F> Action for F
where
    F: Fn() + Send + Sync,
{
    fn invoke(&self) {
        self()
    }
}

/// Called with `(program, new_status, old_status)` after every status change.
pub type StatusObserver = Arc<dyn Fn(&Program, ProgramStatus, ProgramStatus) + Send + Sync>;

struct ProgramInner {
    source: String,
    actions: Vec<Box<dyn Action>>,
    step_delay: Duration,
    status: watch::Sender<ProgramStatus>,
    observers: Mutex<Vec<StatusObserver>>,
}

/// One playback of a compiled program. Single use: once it is finished or
/// aborted a fresh program has to be compiled to run again.
///
/// Cloning yields another handle to the same playback.
#[derive(Clone)]
pub struct Program {
    inner: Arc<ProgramInner>,
}

impl Program {
    pub fn new<A>(source: impl Into<String>, actions: Vec<A>, step_delay: Duration) -> Self
    where
        A: Action + 'static,
    {
        let actions = actions
            .into_iter()
            .map(|action| Box::new(action) as Box<dyn Action>)
            .collect();
        let (status, _) = watch::channel(ProgramStatus::Stopped);

        Self {
            inner: Arc::new(ProgramInner {
                source: source.into(),
                actions,
                step_delay,
                status,
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn len(&self) -> usize {
        self.inner.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.actions.is_empty()
    }

    pub fn step_delay(&self) -> Duration {
        self.inner.step_delay
    }

    pub fn status(&self) -> ProgramStatus {
        *self.inner.status.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.status() == ProgramStatus::Running
    }

    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&Program, ProgramStatus, ProgramStatus) + Send + Sync + 'static,
    {
        lock(&self.inner.observers).push(Arc::new(observer));
    }

    /// Receiver that sees every status the program moves through.
    pub fn status_changes(&self) -> watch::Receiver<ProgramStatus> {
        self.inner.status.subscribe()
    }

    /// Starts playback on the current tokio runtime.
    ///
    /// Does nothing and returns `None` if the program has no actions, has
    /// already been started, or is called outside a runtime. The handle
    /// resolves to the final status.
    pub fn run(&self) -> Option<JoinHandle<ProgramStatus>> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                log::warn!("Cannot run a program outside a tokio runtime: {}", err);
                return None;
            }
        };
        if !self.claim() {
            return None;
        }
        Some(self.start_claimed(&runtime))
    }

    /// Moves a runnable program to Running without notifying observers, so a
    /// caller can reserve it while holding a lock. Follow with [`Program::start_claimed`].
    pub(crate) fn claim(&self) -> bool {
        if self.is_empty() {
            log::debug!("Not running an empty program");
            return false;
        }
        match self.swap_status(|status| status == ProgramStatus::Stopped, ProgramStatus::Running) {
            Some(_) => true,
            None => {
                log::debug!("Program already {}, ignoring run", self.status());
                false
            }
        }
    }

    /// Announces the claimed run and spawns playback on `runtime`.
    pub(crate) fn start_claimed(&self, runtime: &Handle) -> JoinHandle<ProgramStatus> {
        // a stop may already have landed since the claim
        if self.is_running() {
            self.notify(ProgramStatus::Running, ProgramStatus::Stopped);
        }
        let program = self.clone();
        runtime.spawn(async move { program.play().await })
    }

    /// Aborts playback. Steps still in flight notice at their next check.
    /// Stopping a finished or aborted program has no effect.
    pub fn stop(&self) {
        self.transition(|status| !status.is_terminal(), ProgramStatus::Abort);
    }

    /// Resolves once the program is finished or aborted.
    pub async fn wait(&self) -> ProgramStatus {
        let mut changes = self.status_changes();
        // the watch borrow has to end before `changes` is dropped
        let status = match changes.wait_for(ProgramStatus::is_terminal).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        status
    }

    async fn play(&self) -> ProgramStatus {
        for (index, action) in self.inner.actions.iter().enumerate() {
            if !self.is_running() {
                log::debug!("Skipping step {} of {}", index + 1, self.len());
                return self.status();
            }
            action.invoke();

            tokio::time::sleep(self.inner.step_delay).await;
            if !self.is_running() {
                log::debug!("Program stopped after step {} of {}", index + 1, self.len());
                return self.status();
            }
        }

        self.transition(|status| status == ProgramStatus::Running, ProgramStatus::Finished);
        self.status()
    }

    fn transition(&self, allowed: impl Fn(ProgramStatus) -> bool, new_status: ProgramStatus) -> bool {
        match self.swap_status(allowed, new_status) {
            Some(old_status) => {
                self.notify(new_status, old_status);
                true
            }
            None => false,
        }
    }

    /// Replaces the status if `allowed` admits the current one, returning the old status.
    fn swap_status(
        &self,
        allowed: impl Fn(ProgramStatus) -> bool,
        new_status: ProgramStatus,
    ) -> Option<ProgramStatus> {
        let mut old_status = None;
        self.inner.status.send_if_modified(|status| {
            if !allowed(*status) {
                return false;
            }
            old_status = Some(*status);
            *status = new_status;
            true
        });
        old_status
    }

    fn notify(&self, new_status: ProgramStatus, old_status: ProgramStatus) {
        log::info!("Program {} -> {}", old_status, new_status);
        let observers = lock(&self.inner.observers).clone();
        for observer in observers {
            observer(self, new_status, old_status);
        }
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("source", &self.inner.source)
            .field("actions", &self.inner.actions.len())
            .field("step_delay", &self.inner.step_delay)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    const DELAY: Duration = Duration::from_millis(100);

    fn counting_actions(counter: &Arc<AtomicUsize>, n: usize) -> Vec<impl Action + 'static> {
        (0..n)
            .map(|_| {
                let counter = counter.clone();
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect()
    }

    fn recorded_transitions(program: &Program) -> Arc<Mutex<Vec<(ProgramStatus, ProgramStatus)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        program.subscribe(move |_, new_status, old_status| {
            sink.lock().unwrap().push((new_status, old_status));
        });
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn empty_program_never_starts() {
        let counter = Arc::new(AtomicUsize::new(0));
        let program = Program::new("walk", counting_actions(&counter, 0), DELAY);

        assert!(program.run().is_none());
        assert_eq!(program.status(), ProgramStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn uninterrupted_run_finishes_after_every_action() {
        let counter = Arc::new(AtomicUsize::new(0));
        let program = Program::new("left(3)", counting_actions(&counter, 3), DELAY);
        let seen = recorded_transitions(&program);

        let handle = program.run().unwrap();
        assert_eq!(program.status(), ProgramStatus::Running);
        assert_eq!(handle.await.unwrap(), ProgramStatus::Finished);

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(program.status(), ProgramStatus::Finished);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (ProgramStatus::Running, ProgramStatus::Stopped),
                (ProgramStatus::Finished, ProgramStatus::Running),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_while_running_is_ignored() {
        let counter = Arc::new(AtomicUsize::new(0));
        let program = Program::new("up(2)", counting_actions(&counter, 2), DELAY);

        let handle = program.run().unwrap();
        assert!(program.run().is_none());
        handle.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_delay_prevents_further_steps() {
        let counter = Arc::new(AtomicUsize::new(0));
        let program = Program::new("right(5)", counting_actions(&counter, 5), DELAY);
        let seen = recorded_transitions(&program);

        let handle = program.run().unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        program.stop();
        assert_eq!(program.status(), ProgramStatus::Abort);

        assert_eq!(handle.await.unwrap(), ProgramStatus::Abort);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(
            seen.lock().unwrap().last(),
            Some(&(ProgramStatus::Abort, ProgramStatus::Running))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn action_can_stop_its_own_program() {
        let counter = Arc::new(AtomicUsize::new(0));
        let slot: Arc<OnceLock<Program>> = Arc::new(OnceLock::new());
        let actions: Vec<_> = (0..4)
            .map(|i| {
                let counter = counter.clone();
                let slot = slot.clone();
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if i == 1 {
                        slot.get().unwrap().stop();
                    }
                }
            })
            .collect();
        let program = Program::new("down(4)", actions, DELAY);
        slot.set(program.clone()).unwrap();

        let status = program.run().unwrap().await.unwrap();

        assert_eq!(status, ProgramStatus::Abort);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_programs_cannot_be_restarted_or_stopped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let program = Program::new("up(1)", counting_actions(&counter, 1), DELAY);
        program.run().unwrap().await.unwrap();

        program.stop();
        assert_eq!(program.status(), ProgramStatus::Finished);
        assert!(program.run().is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_before_run_aborts_for_good() {
        let counter = Arc::new(AtomicUsize::new(0));
        let program = Program::new("up(1)", counting_actions(&counter, 1), DELAY);

        program.stop();
        program.stop();
        assert_eq!(program.status(), ProgramStatus::Abort);
        assert!(program.run().is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_resolves_with_terminal_status() {
        let counter = Arc::new(AtomicUsize::new(0));
        let program = Program::new("left(2)", counting_actions(&counter, 2), DELAY);
        program.run().unwrap();

        assert_eq!(program.wait().await, ProgramStatus::Finished);
        assert_eq!(program.wait().await, ProgramStatus::Finished);
    }

    #[test]
    fn run_outside_a_runtime_leaves_the_program_stopped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let program = Program::new("up(2)", counting_actions(&counter, 2), DELAY);
        let seen = recorded_transitions(&program);

        assert!(program.run().is_none());
        assert_eq!(program.status(), ProgramStatus::Stopped);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_between_claim_and_start_is_honoured() {
        let counter = Arc::new(AtomicUsize::new(0));
        let program = Program::new("down(2)", counting_actions(&counter, 2), DELAY);
        let seen = recorded_transitions(&program);

        assert!(program.claim());
        assert!(seen.lock().unwrap().is_empty());
        program.stop();

        let status = program.start_claimed(&Handle::current()).await.unwrap();
        assert_eq!(status, ProgramStatus::Abort);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(*seen.lock().unwrap(), vec![(ProgramStatus::Abort, ProgramStatus::Running)]);
    }
}
