// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{InstanceError, InstanceFactory};
use fdt_fhevm::FhevmInstance;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lifecycle of the encryption instance for the connected chain
#[derive(Clone)]
pub enum InstanceState {
    Idle,
    Loading,
    Ready(Arc<dyn FhevmInstance>),
    Error(InstanceError),
}

impl InstanceState {
    pub fn instance(&self) -> Option<&Arc<dyn FhevmInstance>> {
        match self {
            InstanceState::Ready(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, InstanceState::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, InstanceState::Loading)
    }

    /// The ready instance, or why there is none
    pub fn into_result(self) -> Result<Arc<dyn FhevmInstance>, InstanceError> {
        match self {
            InstanceState::Ready(instance) => Ok(instance),
            InstanceState::Error(e) => Err(e),
            InstanceState::Idle | InstanceState::Loading => Err(InstanceError::NotResolved),
        }
    }
}

impl fmt::Debug for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Idle => write!(f, "Idle"),
            InstanceState::Loading => write!(f, "Loading"),
            InstanceState::Ready(instance) => write!(
                f,
                "Ready(chain={}, key={})",
                instance.chain_id(),
                instance.public_key_id()
            ),
            InstanceState::Error(e) => write!(f, "Error({e})"),
        }
    }
}

/// What a resolution is for. A different chain or provider identity is a different target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolveTarget {
    pub chain_id: u64,
    pub provider: String,
}

type InstanceFuture = Shared<BoxFuture<'static, Result<Arc<dyn FhevmInstance>, InstanceError>>>;

struct InFlight {
    generation: u64,
    target: ResolveTarget,
    future: InstanceFuture,
}

enum Started {
    Pending(u64, InstanceFuture),
    Done(InstanceState),
}

#[derive(Default)]
struct Inner {
    generation: u64,
    target: Option<ResolveTarget>,
    in_flight: Option<InFlight>,
}

/// Resolves the encryption instance for the connected chain.
///
/// Every call to [`resolve`](Self::resolve) for a new target starts a new generation. Callers
/// for the target already being resolved join the in-flight future instead of fetching again.
/// When a resolution completes only the current generation is committed; older callers get
/// [`InstanceError::Superseded`] and the published state is left alone.
pub struct InstanceResolver {
    factory: Arc<dyn InstanceFactory>,
    state: watch::Sender<InstanceState>,
    inner: Mutex<Inner>,
}

impl InstanceResolver {
    pub fn new(factory: Arc<dyn InstanceFactory>) -> Self {
        let (state, _) = watch::channel(InstanceState::Idle);
        Self {
            factory,
            state,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> InstanceState {
        self.state.borrow().clone()
    }

    /// Observe every committed transition
    pub fn subscribe(&self) -> watch::Receiver<InstanceState> {
        self.state.subscribe()
    }

    /// Back to `Idle`; an in-flight resolution is abandoned and never committed
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.target = None;
        inner.in_flight = None;
        self.state.send_replace(InstanceState::Idle);
        debug!("Instance resolver reset");
    }

    pub async fn resolve(
        &self,
        chain_id: u64,
        provider: &str,
        known_mock_chains: &[u64],
    ) -> InstanceState {
        let target = ResolveTarget {
            chain_id,
            provider: provider.to_string(),
        };

        let (generation, future) = {
            let mut inner = self.lock();

            let joined = if inner.target.as_ref() == Some(&target) {
                let current = self.state();
                if current.is_ready() {
                    return current;
                }
                inner
                    .in_flight
                    .as_ref()
                    .filter(|f| f.target == target)
                    .map(|f| (f.generation, f.future.clone()))
            } else {
                None
            };

            match joined {
                Some(joined) => {
                    debug!("Joining in-flight resolution for chain {}", chain_id);
                    joined
                }
                None => match self.start(&mut inner, target, known_mock_chains) {
                    Started::Pending(generation, future) => (generation, future),
                    Started::Done(state) => return state,
                },
            }
        };

        let result = future.await;
        self.commit(generation, result)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Begin a new generation for `target`. Mock chains complete here.
    fn start(
        &self,
        inner: &mut Inner,
        target: ResolveTarget,
        known_mock_chains: &[u64],
    ) -> Started {
        inner.generation += 1;
        inner.target = Some(target.clone());
        inner.in_flight = None;
        let generation = inner.generation;
        let chain_id = target.chain_id;

        if known_mock_chains.contains(&chain_id) {
            let state = match self.factory.create_mock(chain_id) {
                Ok(instance) => {
                    info!("Mock instance ready for chain {}", chain_id);
                    InstanceState::Ready(instance)
                }
                Err(e) => {
                    warn!("Could not create mock instance for chain {}: {}", chain_id, e);
                    InstanceState::Error(e)
                }
            };
            self.state.send_replace(state.clone());
            return Started::Done(state);
        }

        info!("Resolving instance for chain {} via {}", chain_id, target.provider);
        self.state.send_replace(InstanceState::Loading);
        let factory = self.factory.clone();
        let future = async move {
            let params = factory.fetch_public_params(chain_id).await?;
            factory.create_network(chain_id, params)
        }
        .boxed()
        .shared();
        inner.in_flight = Some(InFlight {
            generation,
            target,
            future: future.clone(),
        });
        Started::Pending(generation, future)
    }

    fn commit(
        &self,
        generation: u64,
        result: Result<Arc<dyn FhevmInstance>, InstanceError>,
    ) -> InstanceState {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("Discarding superseded resolution (generation {})", generation);
            return InstanceState::Error(InstanceError::Superseded);
        }
        // joiners of the same generation see the state the first of them committed
        let owns_commit = inner
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == generation);
        if !owns_commit {
            return self.state();
        }
        inner.in_flight = None;

        let state = match result {
            Ok(instance) => {
                info!(
                    "Instance ready for chain {} with key {}",
                    instance.chain_id(),
                    instance.public_key_id()
                );
                InstanceState::Ready(instance)
            }
            Err(e) => {
                warn!("Instance resolution failed: {}", e);
                InstanceState::Error(e)
            }
        };
        self.state.send_replace(state.clone());
        state
    }
}
