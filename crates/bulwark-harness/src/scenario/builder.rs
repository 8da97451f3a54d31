//! Scenario builder API.

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use bulwark_core::ForwardingMode;
use bulwark_proto::{MasterConfig, NodeId};
use bulwark_server::{Node, NodeConfig, ROUTER_PORT};
use tokio::{io::AsyncWriteExt, time::Instant};
use tracing::warn;
use turmoil::net::TcpStream;

use crate::{
    directory::{SimDirectory, seeded_identity},
    scenario::{
        OracleFn, World,
        world::{DeliveryLog, Registry},
    },
    sim_transport::SimTransport,
};

/// Delay before the operator pushes configuration, so every host has bound
/// its listener.
const CONFIG_DELAY: Duration = Duration::from_millis(100);

/// Simulated time allowed past the settle period before turmoil gives up.
const GRACE: Duration = Duration::from_secs(30);

/// Destination of a scheduled flood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A router in the scenario, by name
    Node(String),
    /// A literal address, typically a host attached to some router
    Address(NodeId),
}

impl Target {
    fn resolve(&self) -> NodeId {
        match self {
            Self::Node(name) => turmoil::lookup(name.as_str()).to_string(),
            Self::Address(address) => address.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct NodeSpec {
    name: String,
    forwarding: ForwardingMode,
}

#[derive(Debug, Clone)]
struct FloodSpec {
    from: String,
    to: Target,
    at: Duration,
    count: usize,
}

/// Scenario builder.
///
/// Must be finished with [`Scenario::oracle`] before it can run.
pub struct Scenario {
    name: String,
    seed: u64,
    advertise_interval: Duration,
    idle_timeout: Duration,
    settle: Duration,
    nodes: Vec<NodeSpec>,
    hosts: Vec<(String, NodeId)>,
    links: Vec<(String, String)>,
    floods: Vec<FloodSpec>,
    checkpoints: Vec<(Duration, OracleFn)>,
}

impl Scenario {
    /// Empty scenario: seed 0, one second advertisements, ten second settle.
    /// Links idle out after the router default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed: 0,
            advertise_interval: Duration::from_secs(1),
            idle_timeout: NodeConfig::default().idle_timeout,
            settle: Duration::from_secs(10),
            nodes: Vec::new(),
            hosts: Vec::new(),
            links: Vec::new(),
            floods: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Seed for key material and turmoil's RNG.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Interval between each router's advertisement rounds.
    pub fn advertise_interval(mut self, interval: Duration) -> Self {
        self.advertise_interval = interval;
        self
    }

    /// How long a link may go without inbound frames before it is closed.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Time after configuration before the oracle runs.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Add a forwarding router.
    pub fn node(self, name: impl Into<String>) -> Self {
        self.node_with_mode(name, ForwardingMode::Forward)
    }

    /// Add a router that drops every transit flood.
    pub fn dropping_node(self, name: impl Into<String>) -> Self {
        self.node_with_mode(name, ForwardingMode::Drop)
    }

    /// Add a router with an explicit forwarding mode.
    pub fn node_with_mode(mut self, name: impl Into<String>, forwarding: ForwardingMode) -> Self {
        self.nodes.push(NodeSpec { name: name.into(), forwarding });
        self
    }

    /// Attach endpoint `address` to router `node`.
    pub fn host(mut self, node: impl Into<String>, address: impl Into<NodeId>) -> Self {
        self.hosts.push((node.into(), address.into()));
        self
    }

    /// Connect two routers as neighbors.
    pub fn link(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.links.push((a.into(), b.into()));
        self
    }

    /// Have `from` originate one flood to `to` at simulated time `at`.
    pub fn flood(self, from: impl Into<String>, to: Target, at: Duration) -> Self {
        self.floods(from, to, at, 1)
    }

    /// Have `from` originate `count` floods to `to` at simulated time `at`.
    pub fn floods(mut self, from: impl Into<String>, to: Target, at: Duration, count: usize) -> Self {
        self.floods.push(FloodSpec { from: from.into(), to, at, count });
        self
    }

    /// Run `check` against the world at simulated time `at`, before the
    /// oracle. Checks run in time order; the first failure ends the run.
    pub fn checkpoint(mut self, at: Duration, check: OracleFn) -> Self {
        self.checkpoints.push((at, check));
        self
    }

    /// Set the oracle and return a runnable scenario.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }

    /// Every name a link, host, or flood refers to must be a router.
    fn validate(&self) -> Result<(), String> {
        let referenced = self
            .links
            .iter()
            .flat_map(|(a, b)| [a, b])
            .chain(self.hosts.iter().map(|(node, _)| node))
            .chain(self.floods.iter().map(|flood| &flood.from))
            .chain(self.floods.iter().filter_map(|flood| match &flood.to {
                Target::Node(name) => Some(name),
                Target::Address(_) => None,
            }));

        for name in referenced {
            if !self.nodes.iter().any(|spec| &spec.name == name) {
                return Err(format!("scenario '{}': unknown node {name}", self.name));
            }
        }
        Ok(())
    }

    fn hosts_of(&self, name: &str) -> Vec<NodeId> {
        self.hosts
            .iter()
            .filter(|(node, _)| node == name)
            .map(|(_, address)| address.clone())
            .collect()
    }

    fn neighbors_of(&self, name: &str) -> Vec<String> {
        self.links
            .iter()
            .filter_map(|(a, b)| {
                if a == name {
                    Some(b.clone())
                } else if b == name {
                    Some(a.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

/// A scenario with an oracle, ready to execute.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Boot every router, configure the topology, let it settle, then run
    /// the oracle.
    pub fn run(self) -> Result<(), String> {
        let Self { mut scenario, oracle } = self;
        scenario.validate()?;

        let mut checkpoints = std::mem::take(&mut scenario.checkpoints);
        checkpoints.sort_by_key(|(at, _)| *at);
        let last_checkpoint = checkpoints.last().map(|(at, _)| *at).unwrap_or_default();

        let mut sim = turmoil::Builder::new()
            .simulation_duration(last_checkpoint.max(CONFIG_DELAY + scenario.settle) + GRACE)
            .rng_seed(scenario.seed)
            .build();

        let directory = SimDirectory::new();
        let registry: Registry = Arc::new(Mutex::new(BTreeMap::new()));

        for (index, spec) in (0u64..).zip(&scenario.nodes) {
            let spec = spec.clone();
            let key_seed = scenario.seed.wrapping_mul(1_000).wrapping_add(index);
            let advertise_interval = scenario.advertise_interval;
            let idle_timeout = scenario.idle_timeout;
            let floods: Vec<FloodSpec> =
                scenario.floods.iter().filter(|f| f.from == spec.name).cloned().collect();
            let directory = directory.clone();
            let registry = Arc::clone(&registry);

            sim.host(spec.name.clone(), move || {
                let spec = spec.clone();
                let floods = floods.clone();
                let directory = directory.clone();
                let registry = Arc::clone(&registry);

                async move {
                    let node_id = turmoil::lookup(spec.name.as_str()).to_string();
                    let identity = seeded_identity(node_id.clone(), key_seed);
                    directory.register(node_id.clone(), identity.record());

                    let config = NodeConfig {
                        advertise_interval,
                        idle_timeout,
                        forwarding: spec.forwarding,
                        ..NodeConfig::new(node_id)
                    };
                    let transport = SimTransport::bind(ROUTER_PORT).await?;
                    let node = Node::new(config, identity, Arc::new(directory), transport);

                    let log = DeliveryLog::default();
                    log.follow(node.subscribe());
                    registry
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(spec.name.clone(), (Arc::clone(&node), log));

                    let tasks = node.start();

                    for flood in floods {
                        let node = Arc::clone(&node);
                        tokio::spawn(async move {
                            tokio::time::sleep(flood.at).await;
                            let destination = flood.to.resolve();
                            if let Err(e) = node.flood(&destination, flood.count).await {
                                warn!(%destination, "scheduled flood failed: {e}");
                            }
                        });
                    }

                    for task in tasks {
                        task.await?;
                    }
                    Ok(())
                }
            });
        }

        let name = scenario.name.clone();
        sim.client("operator", async move {
            let booted = Instant::now();
            tokio::time::sleep(CONFIG_DELAY).await;

            // Held open until the oracle runs so routers never see the
            // operator hang up mid-frame.
            let mut sessions = Vec::new();
            for spec in &scenario.nodes {
                let neighbors = scenario
                    .neighbors_of(&spec.name)
                    .iter()
                    .map(|n| turmoil::lookup(n.as_str()).to_string())
                    .collect();
                let config = MasterConfig { hosts: scenario.hosts_of(&spec.name), neighbors };

                let target = turmoil::lookup(spec.name.as_str());
                let operator = turmoil::lookup("operator").to_string();
                let packet = config.into_packet(operator, target.to_string())?;

                let mut stream = TcpStream::connect(SocketAddr::new(target, ROUTER_PORT)).await?;
                stream.write_all(&packet.encode()?).await?;
                stream.flush().await?;
                sessions.push(stream);
            }

            let settled = Instant::now() + scenario.settle;

            for (at, check) in checkpoints {
                tokio::time::sleep_until(booted + at).await;
                check(&World::from_registry(&registry))?;
            }

            tokio::time::sleep_until(settled).await;

            let world = World::from_registry(&registry);
            oracle(&world)?;

            drop(sessions);
            Ok(())
        });

        sim.run().map_err(|e| format!("scenario '{name}': {e}"))
    }
}
