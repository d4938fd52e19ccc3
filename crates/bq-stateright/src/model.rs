//! Bounded blocking queue state machine.
//!
//! Each mutex-protected critical section of the queue is one atomic
//! transition. Threads are producers (each with a fixed list of items) or
//! consumers (each with a number of takes). Condition variables are
//! explicit wait sets; `notify_one` moves a nondeterministically chosen
//! waiter back to `Ready`, where it re-checks its predicate on its next
//! step, as a waiter does after re-acquiring the mutex.
//!
//! # Invariants
//!
//! 1. `BoundedCapacity`: the buffer never holds more than `capacity` items
//! 2. `FifoOrder`: items leave in the order they entered
//! 3. `NoLostItems`: every enqueued item is either dequeued or buffered,
//!    and a finished run has dequeued everything
//! 4. `NoLostWakeup`: while any thread is unfinished, some thread can run
//!
//! `SignalPolicy::SingleCondition` shares one wait set between producers
//! and consumers; a producer's `notify_one` can then wake another producer
//! and strand every consumer, violating `NoLostWakeup`.

use std::collections::VecDeque;

use stateright::{Model, Property};

/// Thread index into `QueueState::threads`.
pub type ThreadId = usize;

/// Item value. Unique across a model.
pub type Item = u8;

/// How blocked threads are signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalPolicy {
    /// Separate not-empty and not-full conditions.
    TwoConditions,
    /// One condition shared by producers and consumers, still `notify_one`.
    SingleCondition,
}

/// Wait set a blocked thread sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Condition {
    NotEmpty,
    NotFull,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Producer,
    Consumer,
}

/// Where a thread is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pc {
    /// Runnable; next step enters the critical section.
    Ready,
    Waiting(Condition),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadState {
    pub role: Role,
    pub pc: Pc,
    /// Items put or takes completed so far.
    pub progress: usize,
}

/// Model state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueState {
    pub buffer: VecDeque<Item>,
    /// Items in the order they were enqueued.
    pub enqueued: Vec<Item>,
    /// Items in the order they were dequeued.
    pub dequeued: Vec<Item>,
    pub threads: Vec<ThreadState>,
}

impl QueueState {
    pub fn waiters(&self, condition: Condition) -> impl Iterator<Item = ThreadId> + '_ {
        self.threads
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.pc == Pc::Waiting(condition))
            .map(|(id, _)| id)
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|t| t.pc == Pc::Done)
    }

    /// Every unfinished thread is parked and nobody is left to signal.
    pub fn is_stuck(&self) -> bool {
        !self.is_finished() && !self.threads.iter().any(|t| t.pc == Pc::Ready)
    }
}

/// A transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueueAction {
    /// Producer stores its next item, then signals `wake` (if any waiter).
    Put { thread: ThreadId, wake: Option<ThreadId> },
    /// Consumer removes the head item, then signals `wake`.
    Take { thread: ThreadId, wake: Option<ThreadId> },
    /// Predicate false: release the mutex and park.
    Block { thread: ThreadId },
    /// A waiter returns from `wait` without being signalled.
    SpuriousWake { thread: ThreadId },
}

/// Model configuration.
#[derive(Debug, Clone)]
pub struct QueueModel {
    pub capacity: usize,
    /// Items each producer puts, in order.
    pub producers: Vec<Vec<Item>>,
    /// Takes each consumer performs.
    pub consumer_quotas: Vec<usize>,
    pub policy: SignalPolicy,
    pub spurious_wakeups: bool,
}

impl QueueModel {
    /// `producers` producers with `items_per_producer` items each, and as
    /// many consumers splitting the takes evenly.
    pub fn new(capacity: usize, producers: usize, consumers: usize, items_per_producer: usize) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        debug_assert!(consumers > 0, "need at least one consumer");
        debug_assert!(
            producers * items_per_producer <= Item::MAX as usize,
            "item values must be unique"
        );

        let producer_items: Vec<Vec<Item>> = (0..producers)
            .map(|p| (0..items_per_producer).map(|i| (p * items_per_producer + i + 1) as Item).collect())
            .collect();

        let total = producers * items_per_producer;
        let consumer_quotas = (0..consumers)
            .map(|c| total / consumers + usize::from(c < total % consumers))
            .collect();

        Self {
            capacity,
            producers: producer_items,
            consumer_quotas,
            policy: SignalPolicy::TwoConditions,
            spurious_wakeups: false,
        }
    }

    /// Explicit per-thread workloads.
    pub fn with_workload(capacity: usize, producers: Vec<Vec<Item>>, consumer_quotas: Vec<usize>) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        debug_assert_eq!(
            producers.iter().map(Vec::len).sum::<usize>(),
            consumer_quotas.iter().sum::<usize>(),
            "takes must match puts or the run cannot finish"
        );
        debug_assert!(
            {
                let mut all: Vec<Item> = producers.iter().flatten().copied().collect();
                all.sort_unstable();
                all.windows(2).all(|w| w[0] != w[1])
            },
            "item values must be unique"
        );
        Self {
            capacity,
            producers,
            consumer_quotas,
            policy: SignalPolicy::TwoConditions,
            spurious_wakeups: false,
        }
    }

    pub fn with_policy(mut self, policy: SignalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_spurious_wakeups(mut self, enabled: bool) -> Self {
        self.spurious_wakeups = enabled;
        self
    }

    pub fn total_items(&self) -> usize {
        self.producers.iter().map(Vec::len).sum()
    }

    fn producer_count(&self) -> usize {
        self.producers.len()
    }

    /// Workload size of `thread`: items to put or takes to perform.
    fn quota(&self, thread: ThreadId) -> usize {
        if thread < self.producer_count() {
            self.producers[thread].len()
        } else {
            self.consumer_quotas[thread - self.producer_count()]
        }
    }

    fn wait_condition(&self, role: Role) -> Condition {
        match (self.policy, role) {
            (SignalPolicy::SingleCondition, _) => Condition::Shared,
            (SignalPolicy::TwoConditions, Role::Producer) => Condition::NotFull,
            (SignalPolicy::TwoConditions, Role::Consumer) => Condition::NotEmpty,
        }
    }

    /// Condition a successful operation by `role` signals.
    fn signal_condition(&self, role: Role) -> Condition {
        match (self.policy, role) {
            (SignalPolicy::SingleCondition, _) => Condition::Shared,
            (SignalPolicy::TwoConditions, Role::Producer) => Condition::NotEmpty,
            (SignalPolicy::TwoConditions, Role::Consumer) => Condition::NotFull,
        }
    }

    /// One action per possible `notify_one` target, or a single no-op
    /// signal when nobody waits.
    fn push_signalled(
        &self,
        state: &QueueState,
        condition: Condition,
        make: impl Fn(Option<ThreadId>) -> QueueAction,
        actions: &mut Vec<QueueAction>,
    ) {
        let before = actions.len();
        actions.extend(state.waiters(condition).map(|w| make(Some(w))));
        if actions.len() == before {
            actions.push(make(None));
        }
    }

    fn finish_step(&self, thread: &mut ThreadState, quota: usize) {
        thread.progress += 1;
        thread.pc = if thread.progress == quota { Pc::Done } else { Pc::Ready };
    }
}

impl Model for QueueModel {
    type State = QueueState;
    type Action = QueueAction;

    fn init_states(&self) -> Vec<Self::State> {
        let threads = self
            .producers
            .iter()
            .map(|items| (Role::Producer, items.len()))
            .chain(self.consumer_quotas.iter().map(|&q| (Role::Consumer, q)))
            .map(|(role, quota)| ThreadState {
                role,
                pc: if quota == 0 { Pc::Done } else { Pc::Ready },
                progress: 0,
            })
            .collect();

        vec![QueueState {
            buffer: VecDeque::new(),
            enqueued: Vec::new(),
            dequeued: Vec::new(),
            threads,
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (thread, t) in state.threads.iter().enumerate() {
            match (t.pc, t.role) {
                (Pc::Ready, Role::Producer) => {
                    if state.buffer.len() < self.capacity {
                        let condition = self.signal_condition(Role::Producer);
                        self.push_signalled(state, condition, |wake| QueueAction::Put { thread, wake }, actions);
                    } else {
                        actions.push(QueueAction::Block { thread });
                    }
                }
                (Pc::Ready, Role::Consumer) => {
                    if !state.buffer.is_empty() {
                        let condition = self.signal_condition(Role::Consumer);
                        self.push_signalled(state, condition, |wake| QueueAction::Take { thread, wake }, actions);
                    } else {
                        actions.push(QueueAction::Block { thread });
                    }
                }
                (Pc::Waiting(_), _) if self.spurious_wakeups => {
                    actions.push(QueueAction::SpuriousWake { thread });
                }
                _ => {}
            }
        }
    }

    fn next_state(&self, last_state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut state = last_state.clone();

        match action {
            QueueAction::Put { thread, wake } => {
                let t = &state.threads[thread];
                if t.pc != Pc::Ready || t.role != Role::Producer || state.buffer.len() >= self.capacity {
                    return None;
                }
                let item = self.producers[thread][t.progress];
                state.buffer.push_back(item);
                state.enqueued.push(item);
                let quota = self.quota(thread);
                self.finish_step(&mut state.threads[thread], quota);
                if let Some(w) = wake {
                    state.threads[w].pc = Pc::Ready;
                }
            }
            QueueAction::Take { thread, wake } => {
                let t = &state.threads[thread];
                if t.pc != Pc::Ready || t.role != Role::Consumer {
                    return None;
                }
                let item = state.buffer.pop_front()?;
                state.dequeued.push(item);
                let quota = self.quota(thread);
                self.finish_step(&mut state.threads[thread], quota);
                if let Some(w) = wake {
                    state.threads[w].pc = Pc::Ready;
                }
            }
            QueueAction::Block { thread } => {
                let t = &mut state.threads[thread];
                if t.pc != Pc::Ready {
                    return None;
                }
                t.pc = Pc::Waiting(self.wait_condition(t.role));
            }
            QueueAction::SpuriousWake { thread } => {
                let t = &mut state.threads[thread];
                if !matches!(t.pc, Pc::Waiting(_)) {
                    return None;
                }
                t.pc = Pc::Ready;
            }
        }

        Some(state)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("BoundedCapacity", |model: &QueueModel, state: &QueueState| {
                state.buffer.len() <= model.capacity
            }),
            Property::always("FifoOrder", |_, state: &QueueState| {
                state.enqueued.starts_with(&state.dequeued)
            }),
            Property::always("NoLostItems", |model: &QueueModel, state: &QueueState| {
                let accounted = state.dequeued.iter().chain(state.buffer.iter());
                let conserved = accounted.eq(state.enqueued.iter());
                let drained = !state.is_finished() || state.dequeued.len() == model.total_items();
                conserved && drained
            }),
            Property::always("NoLostWakeup", |_, state: &QueueState| !state.is_stuck()),
            Property::sometimes("QueueBecomesFull", |model: &QueueModel, state: &QueueState| {
                state.buffer.len() == model.capacity
            }),
            Property::sometimes("ProducerBlocks", |_, state: &QueueState| {
                state
                    .threads
                    .iter()
                    .any(|t| t.role == Role::Producer && matches!(t.pc, Pc::Waiting(_)))
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(model: &QueueModel, state: &QueueState, action: QueueAction) -> QueueState {
        model
            .next_state(state, action.clone())
            .unwrap_or_else(|| panic!("{:?} not enabled", action))
    }

    #[test]
    fn test_initial_state() {
        let model = QueueModel::new(2, 2, 1, 2);
        let states = model.init_states();
        assert_eq!(states.len(), 1);

        let state = &states[0];
        assert!(state.buffer.is_empty());
        assert_eq!(state.threads.len(), 3);
        assert!(state.threads.iter().all(|t| t.pc == Pc::Ready));
        assert_eq!(model.total_items(), 4);
        assert_eq!(model.consumer_quotas, vec![4]);
    }

    #[test]
    fn test_quotas_split_evenly() {
        let model = QueueModel::new(1, 1, 2, 3);
        assert_eq!(model.consumer_quotas, vec![2, 1]);
    }

    #[test]
    fn test_largest_workload_keeps_items_distinct() {
        let model = QueueModel::new(1, 3, 1, 85);
        let mut all: Vec<Item> = model.producers.concat();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 255);
        assert_eq!(all.first(), Some(&1));
        assert_eq!(all.last(), Some(&Item::MAX));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "item values must be unique")]
    fn test_too_many_items_rejected() {
        QueueModel::new(1, 2, 1, 128);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "item values must be unique")]
    fn test_duplicate_workload_items_rejected() {
        QueueModel::with_workload(1, vec![vec![1, 2], vec![2]], vec![3]);
    }

    #[test]
    fn test_consumer_blocks_on_empty() {
        let model = QueueModel::new(1, 1, 1, 1);
        let state = &model.init_states()[0];

        let mut actions = Vec::new();
        model.actions(state, &mut actions);
        assert!(actions.contains(&QueueAction::Block { thread: 1 }));
        assert!(actions.contains(&QueueAction::Put { thread: 0, wake: None }));

        let state = apply(&model, state, QueueAction::Block { thread: 1 });
        assert_eq!(state.threads[1].pc, Pc::Waiting(Condition::NotEmpty));

        // The put now offers the parked consumer as its signal target.
        let mut actions = Vec::new();
        model.actions(&state, &mut actions);
        assert_eq!(actions, vec![QueueAction::Put { thread: 0, wake: Some(1) }]);

        let state = apply(&model, &state, QueueAction::Put { thread: 0, wake: Some(1) });
        assert_eq!(state.threads[0].pc, Pc::Done);
        assert_eq!(state.threads[1].pc, Pc::Ready);

        let state = apply(&model, &state, QueueAction::Take { thread: 1, wake: None });
        assert!(state.is_finished());
        assert_eq!(state.dequeued, vec![1]);
    }

    #[test]
    fn test_put_on_full_not_enabled() {
        let model = QueueModel::new(1, 1, 1, 2);
        let state = &model.init_states()[0];
        let state = apply(&model, state, QueueAction::Put { thread: 0, wake: None });
        assert!(model
            .next_state(&state, QueueAction::Put { thread: 0, wake: None })
            .is_none());
    }

    #[test]
    fn test_single_condition_strands_consumers() {
        // Capacity 1; P0 puts 1 and 2, P1 puts 3; C2 takes twice, C3 once.
        let model = QueueModel::with_workload(1, vec![vec![1, 2], vec![3]], vec![2, 1])
            .with_policy(SignalPolicy::SingleCondition);
        let mut state = model.init_states()[0].clone();

        for action in [
            QueueAction::Block { thread: 2 },
            QueueAction::Block { thread: 3 },
            QueueAction::Put { thread: 0, wake: Some(2) },
            QueueAction::Block { thread: 0 },
            QueueAction::Block { thread: 1 },
            // The consumer's signal lands on the other consumer.
            QueueAction::Take { thread: 2, wake: Some(3) },
            QueueAction::Block { thread: 2 },
            QueueAction::Block { thread: 3 },
        ] {
            state = apply(&model, &state, action);
        }

        assert!(state.is_stuck());
        assert_eq!(state.waiters(Condition::Shared).count(), 4);
    }

    #[test]
    fn test_spurious_wake_only_when_enabled() {
        let model = QueueModel::new(1, 1, 1, 1);
        let state = apply(&model, &model.init_states()[0], QueueAction::Block { thread: 1 });

        let mut actions = Vec::new();
        model.actions(&state, &mut actions);
        assert!(!actions.contains(&QueueAction::SpuriousWake { thread: 1 }));

        let model = model.with_spurious_wakeups(true);
        let mut actions = Vec::new();
        model.actions(&state, &mut actions);
        assert!(actions.contains(&QueueAction::SpuriousWake { thread: 1 }));
    }
}
