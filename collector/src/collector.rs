use crate::{
    aggregate::{
        datapoint,
        AggregatedResult,
    },
    authorization::TokenRequestLookup,
    classify::{
        classify,
        PollError,
    },
    getter::{
        Getter,
        QueryGetter,
    },
    prometheus::QueryApi,
    query::QueryDescriptor,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc::{
        unbounded_channel,
        UnboundedReceiver,
        UnboundedSender,
    },
    task::{
        JoinError,
        JoinHandle,
    },
    time::{
        interval_at,
        Instant,
        MissedTickBehavior,
    },
};
use tokio_util::sync::{
    CancellationToken,
    DropGuard,
};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("a getter named {0:?} is already registered")]
    DuplicateName(String),
}

/// Polls a set of getters on a fixed interval and aggregates their datapoints per name.
pub struct Collector {
    client: Arc<dyn QueryApi>,
    interval: Duration,
    getters: Vec<Box<dyn Getter>>,
    results: HashMap<String, AggregatedResult>,
    token_lookup: Option<Arc<dyn TokenRequestLookup>>,
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("interval", &self.interval)
            .field("getters", &self.getter_names().collect::<Vec<_>>())
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

impl Collector {
    pub fn new(client: Arc<dyn QueryApi>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            getters: Vec::new(),
            results: HashMap::new(),
            token_lookup: None,
        }
    }

    /// Used to point at a token request page when the backend answers with 403.
    pub fn with_token_lookup(mut self, token_lookup: Arc<dyn TokenRequestLookup>) -> Self {
        self.token_lookup = Some(token_lookup);
        self
    }

    /// Registers getters in order. Either all of them are added or, if a name is
    /// already taken, none.
    pub fn add_getters(&mut self, getters: impl IntoIterator<Item = Box<dyn Getter>>) -> Result<(), RegistrationError> {
        let getters = getters.into_iter().collect::<Vec<_>>();
        let mut names = self.getter_names().map(str::to_string).collect::<HashSet<_>>();
        for getter in &getters {
            if !names.insert(getter.name().to_string()) {
                return Err(RegistrationError::DuplicateName(getter.name().to_string()));
            }
        }
        self.getters.extend(getters);
        Ok(())
    }

    /// Binds the descriptors to this collector's backend client and registers them.
    pub fn add_queries(&mut self, queries: impl IntoIterator<Item = QueryDescriptor>) -> Result<(), RegistrationError> {
        let getters = queries
            .into_iter()
            .map(|descriptor| Box::new(QueryGetter::new(self.client.clone(), descriptor)) as Box<dyn Getter>)
            .collect::<Vec<_>>();
        self.add_getters(getters)
    }

    pub fn getters(&self) -> impl Iterator<Item = &dyn Getter> + '_ {
        self.getters.iter().map(|getter| getter.as_ref())
    }

    pub fn getter_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.getters.iter().map(|getter| getter.name())
    }

    pub fn result(&self, name: &str) -> Option<&AggregatedResult> {
        self.results.get(name)
    }

    /// Starts polling in a background task. The first poll cycle runs one interval from now.
    ///
    /// Without any registered getter, or with a zero interval, nothing is started and
    /// the returned handle is idle.
    pub fn start_collecting(self) -> CollectingHandle {
        if self.getters.is_empty() {
            info!("Metrics collector has no getters defined, skipping metrics gathering...");
            return CollectingHandle {
                state: HandleState::Idle(self),
            };
        }
        if self.interval.is_zero() {
            error!("Metrics collector interval must be greater than zero, skipping metrics gathering...");
            return CollectingHandle {
                state: HandleState::Idle(self),
            };
        }

        info!(
            getters = self.getters.len(),
            interval = ?self.interval,
            "starting metrics collection"
        );

        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        let names = self.getter_names().map(str::to_string).collect();
        let (registrations, receiver) = unbounded_channel();
        let task = tokio::task::spawn(self.run(token, receiver));

        CollectingHandle {
            state: HandleState::Running {
                guard,
                names,
                registrations,
                task,
            },
        }
    }

    async fn run(mut self, token: CancellationToken, mut registrations: UnboundedReceiver<Box<dyn Getter>>) -> Self {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            while let Ok(getter) = registrations.try_recv() {
                debug!(getter = getter.name(), "registered getter while collecting");
                self.getters.push(getter);
            }

            self.poll_cycle(&token).await;
        }

        debug!("metrics collection stopped");
        self
    }

    /// Polls every getter once, in registration order. A failing getter does not
    /// keep the others from being polled.
    pub async fn poll_cycle(&mut self, token: &CancellationToken) {
        let token_lookup = self.token_lookup.as_deref();
        for getter in &self.getters {
            if token.is_cancelled() {
                debug!("stop requested, abandoning poll cycle");
                break;
            }

            match poll_getter(getter.as_ref(), token_lookup).await {
                Ok(datapoint) => {
                    trace!(getter = getter.name(), datapoint, "polled");
                    self.results.entry(getter.name().to_string()).or_default().fold(datapoint);
                }
                Err(err) => {
                    error!(getter = getter.name(), "metrics error: {err}");
                }
            }
        }
    }
}

/// Executes one getter and reduces its answer to a single datapoint.
pub async fn poll_getter(
    getter: &dyn Getter,
    token_lookup: Option<&dyn TokenRequestLookup>,
) -> Result<f64, PollError> {
    let response = match getter.execute().await {
        Ok(response) => response,
        Err(err) => return Err(classify(err, token_lookup).await),
    };

    if !response.warnings.is_empty() {
        return Err(PollError::Warnings(response.warnings));
    }

    datapoint(&response.vector).ok_or_else(|| PollError::EmptyVector(getter.name().to_string()))
}

enum HandleState {
    Idle(Collector),
    Running {
        guard: DropGuard,
        names: HashSet<String>,
        registrations: UnboundedSender<Box<dyn Getter>>,
        task: JoinHandle<Collector>,
    },
}

/// Controls a collector started with [`Collector::start_collecting`].
///
/// Dropping the handle stops the background task. Call [`CollectingHandle::stop`]
/// to get the collector and its results back.
pub struct CollectingHandle {
    state: HandleState,
}

impl CollectingHandle {
    pub fn is_running(&self) -> bool {
        matches!(self.state, HandleState::Running { .. })
    }

    /// Adds a getter to a running collection; it is first polled in the next cycle.
    /// An idle handle registers it on the collector without starting a loop.
    pub fn add_getter(&mut self, getter: Box<dyn Getter>) -> Result<(), RegistrationError> {
        match &mut self.state {
            HandleState::Idle(collector) => collector.add_getters([getter]),
            HandleState::Running {
                names, registrations, ..
            } => {
                if !names.insert(getter.name().to_string()) {
                    return Err(RegistrationError::DuplicateName(getter.name().to_string()));
                }
                if registrations.send(getter).is_err() {
                    warn!("metrics collection already finished, getter is dropped");
                }
                Ok(())
            }
        }
    }

    /// Signals the background task and waits until it has finished. A poll cycle in
    /// progress is abandoned after the getter currently executing returns.
    pub async fn stop(self) -> Result<Collector, JoinError> {
        match self.state {
            HandleState::Idle(collector) => Ok(collector),
            HandleState::Running { guard, task, .. } => {
                drop(guard);
                task.await
            }
        }
    }
}
