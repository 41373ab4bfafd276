// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Swarm Coordinator
//!
//! Top-level state machine of the coordination tier. Each swarm runs as an
//! independent tokio task that exclusively owns its [`SwarmState`]; the
//! [`SwarmCoordinator`] handle talks to it purely by message passing.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Drive goal → plan → routine → evaluation cycles
//!
//! # Serialization
//!
//! Every control call and every inbound event becomes a [`Command`] on one
//! unbounded channel. The actor drains that channel one command at a time, so
//! blackboard appends, allocations and phase transitions for a swarm never
//! interleave. Different swarms run fully in parallel.
//!
//! # Phases
//!
//! ```text
//! Forming ─start─▶ Planning ⇄ Executing ─▶ Dissolving | Failed
//! ```
//!
//! Every transition publishes `swarm.phase_changed` before the phase-entry
//! effects run: `Executing` starts monitoring, `Dissolving` releases resources,
//! archives and publishes `swarm.completed`, `Failed` releases resources and
//! publishes `swarm.failed` with the final state.

use crate::domain::events::{AgentMessage, ResourceRequest, RoutineProgress, SwarmEvent};
use crate::domain::ports::{
    Adaptation, CollaboratorError, CoordinationProtocol, ExecutionPlan, ReasoningEngine,
    ResourceManager, SwarmStateStore, TeamFormation,
};
use crate::domain::swarm::{
    BlackboardItem, BlackboardItemType, SwarmConfig, SwarmId, SwarmPhase, SwarmState, Team,
};
use chrono::Utc;
use meridian_core::application::routine_runner::{RoutineError, RoutineRequest, RoutineRunner};
use meridian_core::domain::events::{event_types, Event, EventSource, Tier};
use meridian_core::infrastructure::event_bus::EventBus;
use metrics::counter;
use serde_json::{json, Value};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "swarm_coordinator";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SwarmError {
    #[error("Cannot {operation} a swarm in phase {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: SwarmPhase,
    },

    #[error("Invalid phase transition {from} -> {to}")]
    InvalidTransition { from: SwarmPhase, to: SwarmPhase },

    #[error("Swarm {0} has been shut down")]
    ShutDown(SwarmId),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Routine request failed: {0}")]
    Routine(#[from] RoutineError),
}

/// Everything a coordinator delegates to.
#[derive(Clone)]
pub struct SwarmCollaborators {
    pub store: Arc<dyn SwarmStateStore>,
    pub reasoning: Arc<dyn ReasoningEngine>,
    pub teams: Arc<dyn TeamFormation>,
    pub resources: Arc<dyn ResourceManager>,
    pub coordination: Arc<dyn CoordinationProtocol>,
    pub routines: Arc<dyn RoutineRunner>,
    pub event_bus: EventBus,
}

enum Command {
    Start {
        goal: String,
        user_id: String,
        reply: oneshot::Sender<Result<(), SwarmError>>,
    },
    Event(SwarmEvent),
    Pause {
        reply: oneshot::Sender<Result<SwarmPhase, SwarmError>>,
    },
    Resume {
        reply: oneshot::Sender<Result<SwarmPhase, SwarmError>>,
    },
    Stop {
        reason: String,
        reply: oneshot::Sender<Result<SwarmPhase, SwarmError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SwarmState>,
    },
    /// Barrier: answered once every earlier command has been processed.
    Settle {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable handle to a running swarm.
#[derive(Clone)]
pub struct SwarmCoordinator {
    id: SwarmId,
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl SwarmCoordinator {
    /// Spawn a new swarm in `Forming`.
    pub fn spawn(config: SwarmConfig, collaborators: SwarmCollaborators) -> Self {
        Self::spawn_with_id(SwarmId::new(), config, collaborators)
    }

    pub fn spawn_with_id(id: SwarmId, config: SwarmConfig, collaborators: SwarmCollaborators) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let actor = SwarmActor {
            state: SwarmState::new(id, config),
            collaborators,
            cancel: cancel.clone(),
        };
        tokio::spawn(actor.run(receiver));
        debug!(swarm_id = %id, "SwarmCoordinator::spawn");

        Self { id, commands, cancel }
    }

    pub fn id(&self) -> SwarmId {
        self.id
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SwarmError> {
        if self.is_shut_down() {
            return Err(SwarmError::ShutDown(self.id));
        }
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| SwarmError::ShutDown(self.id))?;
        response.await.map_err(|_| SwarmError::ShutDown(self.id))
    }

    /// Form teams, plan and request the first routine. Only valid in `Forming`.
    pub async fn start(&self, goal: impl Into<String>, user_id: impl Into<String>) -> Result<(), SwarmError> {
        let goal = goal.into();
        let user_id = user_id.into();
        self.request(|reply| Command::Start { goal, user_id, reply }).await?
    }

    /// Queue an event. Never waits for processing; a no-op after shutdown.
    pub fn handle_event(&self, event: SwarmEvent) {
        if self.is_shut_down() {
            debug!(swarm_id = %self.id, event = event.kind(), "Swarm shut down; event ignored");
            return;
        }
        if self.commands.send(Command::Event(event)).is_err() {
            debug!(swarm_id = %self.id, "Swarm actor gone; event ignored");
        }
    }

    /// `Executing → Planning`; a no-op in any other phase. Returns the resulting phase.
    pub async fn pause(&self) -> Result<SwarmPhase, SwarmError> {
        self.request(|reply| Command::Pause { reply }).await?
    }

    /// `Planning → Executing`; a no-op in any other phase. Returns the resulting phase.
    pub async fn resume(&self) -> Result<SwarmPhase, SwarmError> {
        self.request(|reply| Command::Resume { reply }).await?
    }

    /// Force the swarm into `Dissolving` from any non-terminal phase.
    pub async fn stop(&self, reason: impl Into<String>) -> Result<SwarmPhase, SwarmError> {
        let reason = reason.into();
        self.request(|reply| Command::Stop { reason, reply }).await?
    }

    /// Copy of the state after every earlier command has been processed.
    pub async fn snapshot(&self) -> Result<SwarmState, SwarmError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Wait until every previously queued command has been processed.
    pub async fn settle(&self) -> Result<(), SwarmError> {
        self.request(|reply| Command::Settle { reply }).await
    }

    /// Dispose of the swarm: pending commands are dropped, the state is saved
    /// one last time and later calls become no-ops.
    pub async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).is_ok() {
            let _ = done.await;
        }
    }
}

// ============================================================================
// Actor
// ============================================================================

struct SwarmActor {
    state: SwarmState,
    collaborators: SwarmCollaborators,
    cancel: CancellationToken,
}

impl SwarmActor {
    fn id(&self) -> SwarmId {
        self.state.id
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            if self.dispatch(command).await.is_break() {
                break;
            }
        }
        debug!(swarm_id = %self.id(), "Swarm actor stopped");
    }

    async fn dispatch(&mut self, command: Command) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return match command {
                Command::Shutdown { reply } => {
                    self.finalize().await;
                    let _ = reply.send(());
                    ControlFlow::Break(())
                }
                _ => {
                    debug!(swarm_id = %self.id(), "Dropping command queued before shutdown");
                    ControlFlow::Continue(())
                }
            };
        }

        match command {
            Command::Start { goal, user_id, reply } => {
                let result = self.start(goal, user_id).await;
                let _ = reply.send(result);
            }
            Command::Event(event) => self.process(event).await,
            Command::Pause { reply } => {
                let result = self.pause().await;
                let _ = reply.send(result);
            }
            Command::Resume { reply } => {
                let result = self.resume().await;
                let _ = reply.send(result);
            }
            Command::Stop { reason, reply } => {
                let result = self.stop(reason).await;
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.clone());
            }
            Command::Settle { reply } => {
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                self.finalize().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // ------------------------------------------------------------------------
    // Control operations
    // ------------------------------------------------------------------------

    async fn start(&mut self, goal: String, user_id: String) -> Result<(), SwarmError> {
        if self.state.phase != SwarmPhase::Forming {
            return Err(SwarmError::InvalidPhase {
                operation: "start",
                phase: self.state.phase,
            });
        }

        self.state.goal = goal;
        self.state.user_id = user_id;
        self.state.touch();
        info!(swarm_id = %self.id(), goal = %self.state.goal, "Starting swarm");

        if let Err(e) = self.bootstrap().await {
            error!(swarm_id = %self.id(), error = %e, "Swarm failed to start");
            if let Err(transition_error) = self.transition(SwarmPhase::Failed).await {
                warn!(swarm_id = %self.id(), error = %transition_error, "Could not mark swarm as failed");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn bootstrap(&mut self) -> Result<(), SwarmError> {
        let teams = self
            .collaborators
            .teams
            .form_teams_for_goal(&self.state.goal, &self.state.config)
            .await?;
        self.enlist(teams).await?;
        self.save_state().await;

        self.publish(
            event_types::SWARM_STARTED,
            json!({
                "swarm_id": self.id(),
                "goal": self.state.goal,
                "user_id": self.state.user_id,
                "teams": self.state.teams.len(),
                "agents": self.state.agents.len(),
            }),
        );

        self.transition(SwarmPhase::Planning).await?;

        let plan = self
            .collaborators
            .reasoning
            .create_execution_plan(&self.state.goal, &self.state)
            .await?;
        self.dispatch_plan(plan, "initial").await
    }

    async fn enlist(&mut self, teams: Vec<Team>) -> Result<(), SwarmError> {
        let max_agents = self.state.config.max_agents;
        for mut team in teams {
            let agents = self.collaborators.teams.create_agents_for_team(&team).await?;
            for mut agent in agents {
                if self.state.agents.len() >= max_agents {
                    warn!(swarm_id = %self.id(), team = %team.name, max_agents, "Agent limit reached");
                    break;
                }
                agent.team_id = Some(team.id);
                team.members.push(agent.id);
                self.state.agents.push(agent);
            }
            self.state.teams.push(team);
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<SwarmPhase, SwarmError> {
        if self.state.phase == SwarmPhase::Executing {
            self.state.paused = true;
            self.transition(SwarmPhase::Planning).await?;
        } else {
            debug!(swarm_id = %self.id(), phase = %self.state.phase, "Pause ignored");
        }
        Ok(self.state.phase)
    }

    async fn resume(&mut self) -> Result<SwarmPhase, SwarmError> {
        if self.state.phase == SwarmPhase::Planning {
            self.state.paused = false;
            self.transition(SwarmPhase::Executing).await?;
        } else {
            debug!(swarm_id = %self.id(), phase = %self.state.phase, "Resume ignored");
        }
        Ok(self.state.phase)
    }

    async fn stop(&mut self, reason: String) -> Result<SwarmPhase, SwarmError> {
        if self.state.phase.is_terminal() {
            return Ok(self.state.phase);
        }
        info!(swarm_id = %self.id(), reason = %reason, "Stopping swarm");
        self.append(BlackboardItem::new(
            BlackboardItemType::Control,
            json!({ "action": "stop", "reason": reason }),
            COMPONENT,
        ))
        .await;
        self.transition(SwarmPhase::Dissolving).await?;
        Ok(self.state.phase)
    }

    async fn finalize(&mut self) {
        self.save_state().await;
        info!(swarm_id = %self.id(), phase = %self.state.phase, "Swarm shut down");
    }

    // ------------------------------------------------------------------------
    // Event handling
    // ------------------------------------------------------------------------

    async fn process(&mut self, event: SwarmEvent) {
        let kind = event.kind();
        if self.state.phase.is_terminal() {
            debug!(swarm_id = %self.id(), phase = %self.state.phase, event = kind, "Event ignored in terminal phase");
            return;
        }

        let result = match event {
            SwarmEvent::RoutineProgress(progress) => self.on_progress(progress).await,
            SwarmEvent::RoutineCompleted { routine_id, results } => {
                self.on_completed(routine_id, results).await
            }
            SwarmEvent::RoutineFailed { routine_id, error } => self.on_failed(routine_id, error).await,
            SwarmEvent::AgentMessage(message) => self.on_agent_message(message).await,
            SwarmEvent::ResourceRequest(request) => self.on_resource_request(request).await,
        };

        match result {
            Ok(()) => counter!("meridian_swarm_events_processed_total", "event" => kind).increment(1),
            Err(e) => {
                error!(swarm_id = %self.id(), event = kind, error = %e, "Failed to process swarm event");
                counter!("meridian_swarm_event_failures_total", "event" => kind).increment(1);
            }
        }
    }

    async fn on_progress(&mut self, progress: RoutineProgress) -> Result<(), SwarmError> {
        self.state
            .metrics
            .record_progress(progress.routine_id, progress.tasks_completed, progress.tasks_total);
        self.state.touch();

        if self.state.phase == SwarmPhase::Planning && !self.state.paused {
            self.transition(SwarmPhase::Executing).await?;
        }

        let report = json!({
            "routine_id": progress.routine_id,
            "node_id": progress.node_id,
            "tasks_completed": progress.tasks_completed,
            "tasks_total": progress.tasks_total,
        });
        let reasoning = Arc::clone(&self.collaborators.reasoning);
        if reasoning.evaluate_progress(&self.state, &report).await? {
            let adaptations = reasoning.recommend_adaptations(&self.state, &report).await?;
            for adaptation in adaptations {
                self.adapt(adaptation).await?;
            }
        }

        self.save_state().await;
        Ok(())
    }

    async fn adapt(&mut self, adaptation: Adaptation) -> Result<(), SwarmError> {
        info!(swarm_id = %self.id(), adaptation = ?adaptation, "Adapting strategy");
        match adaptation {
            Adaptation::ReorganizeTeams => {
                let teams = self.collaborators.teams.reorganize_teams(&self.state).await?;
                for team in &teams {
                    for agent in self.state.agents.iter_mut().filter(|a| team.members.contains(&a.id)) {
                        agent.team_id = Some(team.id);
                    }
                }
                self.state.teams = teams;
            }
            Adaptation::ReallocateResources => {
                let allocations = self
                    .collaborators
                    .resources
                    .reallocate_resources(&self.state)
                    .await?;
                self.state.resources.replace_allocations(allocations);
            }
            Adaptation::ChangeApproach { plan } => {
                self.dispatch_plan(plan, "adaptation").await?;
            }
        }
        self.state.touch();
        Ok(())
    }

    async fn on_completed(&mut self, routine_id: Option<Uuid>, results: Value) -> Result<(), SwarmError> {
        self.state.metrics.finish_routine(routine_id);
        if self.is_superseded(routine_id) {
            info!(swarm_id = %self.id(), routine_id = ?routine_id, "Ignoring result of a superseded routine");
            self.state.touch();
            return Ok(());
        }

        let reasoning = Arc::clone(&self.collaborators.reasoning);
        let evaluation = reasoning.evaluate_results(&self.state, &results).await?;

        self.append(BlackboardItem::new(
            BlackboardItemType::Result,
            json!({
                "routine_id": routine_id,
                "results": results,
                "goal_achieved": evaluation.goal_achieved,
                "summary": evaluation.summary,
            }),
            COMPONENT,
        ))
        .await;
        if routine_id.is_some() && self.state.active_routine == routine_id {
            self.state.active_routine = None;
        }

        if evaluation.goal_achieved {
            return self.transition(SwarmPhase::Dissolving).await;
        }

        let plan = reasoning.plan_next_steps(&self.state, &evaluation).await?;
        if self.state.phase == SwarmPhase::Executing {
            self.transition(SwarmPhase::Planning).await?;
        }
        self.dispatch_plan(plan, "next_steps").await
    }

    async fn on_failed(&mut self, routine_id: Option<Uuid>, error: String) -> Result<(), SwarmError> {
        self.state.metrics.finish_routine(routine_id);
        if self.is_superseded(routine_id) {
            info!(swarm_id = %self.id(), routine_id = ?routine_id, error = %error, "Ignoring failure of a superseded routine");
            self.state.touch();
            return Ok(());
        }
        self.state.metrics.record_error();
        self.state.touch();

        let reasoning = Arc::clone(&self.collaborators.reasoning);
        let report = json!({ "routine_id": routine_id, "error": error });
        let analysis = reasoning.analyze_failure(&self.state, &report).await?;

        let attempts = self.state.recovery_attempts;
        if analysis.recoverable && attempts < self.state.config.max_recovery_attempts {
            self.state.recovery_attempts += 1;
            warn!(
                swarm_id = %self.id(),
                attempt = attempts + 1,
                error = %error,
                "Routine failed; attempting recovery"
            );
            let plan = reasoning.create_recovery_plan(&self.state, &analysis).await?;
            if self.state.phase == SwarmPhase::Executing {
                self.transition(SwarmPhase::Planning).await?;
            }
            return self.dispatch_plan(plan, "recovery").await;
        }

        if analysis.recoverable {
            warn!(swarm_id = %self.id(), attempts, "Recovery attempts exhausted");
        }
        error!(swarm_id = %self.id(), error = %error, "Routine failure is unrecoverable");
        self.transition(SwarmPhase::Failed).await
    }

    /// A routine replaced by a later dispatch. Unidentified reports always count.
    fn is_superseded(&self, routine_id: Option<Uuid>) -> bool {
        match (routine_id, self.state.active_routine) {
            (Some(reported), Some(active)) => reported != active,
            _ => false,
        }
    }

    async fn on_agent_message(&mut self, message: AgentMessage) -> Result<(), SwarmError> {
        if !self.state.has_agent(message.from) {
            warn!(swarm_id = %self.id(), from = %message.from, "Message from agent outside the roster");
        }
        let coordination = &self.collaborators.coordination;
        match message.to {
            Some(_) => coordination.route_message(self.id(), &message).await?,
            None => coordination.broadcast_to_swarm(self.id(), &message.payload).await?,
        }
        Ok(())
    }

    async fn on_resource_request(&mut self, request: ResourceRequest) -> Result<(), SwarmError> {
        let allocation = self
            .collaborators
            .resources
            .allocate_resources(self.id(), &self.state.resources, &request)
            .await?;

        info!(
            swarm_id = %self.id(),
            agent_id = %allocation.agent_id,
            resource = %allocation.resource,
            amount = allocation.amount,
            "Resources allocated"
        );
        let event = self
            .envelope(
                event_types::RESOURCE_ALLOCATED,
                json!({
                    "swarm_id": self.id(),
                    "allocation_id": allocation.id,
                    "agent_id": allocation.agent_id,
                    "resource": allocation.resource,
                    "amount": allocation.amount,
                }),
            )
            .with_target(allocation.agent_id.to_string());

        self.state.resources.record(allocation);
        self.state.touch();
        self.save_state().await;
        self.collaborators.event_bus.publish(event);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Phase machine
    // ------------------------------------------------------------------------

    async fn transition(&mut self, next: SwarmPhase) -> Result<(), SwarmError> {
        let previous = self.state.phase;
        if previous == next {
            return Ok(());
        }
        if !previous.can_transition_to(next) {
            return Err(SwarmError::InvalidTransition { from: previous, to: next });
        }

        self.state.phase = next;
        self.state.touch();
        info!(swarm_id = %self.id(), from = %previous, to = %next, "Swarm phase changed");
        counter!("meridian_swarm_phase_transitions_total", "to" => next.as_str()).increment(1);
        self.publish(
            event_types::SWARM_PHASE_CHANGED,
            json!({ "swarm_id": self.id(), "from": previous, "to": next }),
        );

        self.enter(next).await;
        Ok(())
    }

    async fn enter(&mut self, phase: SwarmPhase) {
        match phase {
            SwarmPhase::Executing => {
                if self.state.monitoring_started_at.is_none() {
                    self.state.monitoring_started_at = Some(Utc::now());
                    info!(swarm_id = %self.id(), "Monitoring started");
                }
                self.save_state().await;
            }
            SwarmPhase::Forming | SwarmPhase::Planning => self.save_state().await,
            SwarmPhase::Dissolving => {
                self.release_resources().await;
                self.save_state().await;
                if let Err(e) = self.collaborators.store.archive_swarm(self.id()).await {
                    error!(swarm_id = %self.id(), error = %e, "Failed to archive swarm");
                }
                let results: Vec<&Value> = self
                    .state
                    .blackboard
                    .of_type(BlackboardItemType::Result)
                    .map(|item| &item.content)
                    .collect();
                self.publish(
                    event_types::SWARM_COMPLETED,
                    json!({
                        "swarm_id": self.id(),
                        "goal": self.state.goal,
                        "results": results,
                        "metrics": self.state.metrics,
                    }),
                );
            }
            SwarmPhase::Failed => {
                self.release_resources().await;
                self.save_state().await;
                self.publish(
                    event_types::SWARM_FAILED,
                    json!({ "swarm_id": self.id(), "state": self.state }),
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Record a plan and hand it to the routine runner.
    async fn dispatch_plan(&mut self, plan: ExecutionPlan, purpose: &'static str) -> Result<(), SwarmError> {
        if self.state.phase.is_terminal() {
            debug!(swarm_id = %self.id(), purpose, "Swarm is terminal; plan not dispatched");
            return Ok(());
        }

        self.append(BlackboardItem::new(
            BlackboardItemType::Plan,
            json!({ "purpose": purpose, "plan": plan }),
            COMPONENT,
        ))
        .await;

        let request = RoutineRequest {
            swarm_id: self.id().to_string(),
            plan: plan.clone(),
            user_id: self.state.user_id.clone(),
            correlation_id: Uuid::new_v4(),
        };
        let correlation_id = request.correlation_id;
        let handle = self.collaborators.routines.request_execution(request).await?;
        debug!(swarm_id = %self.id(), routine_id = %handle.routine_id, purpose, "Routine requested");

        self.state.active_routine = Some(handle.routine_id);
        self.state.touch();
        self.save_state().await;

        let event = self
            .envelope(
                event_types::ROUTINE_CREATE,
                json!({
                    "swarm_id": self.id(),
                    "routine_id": handle.routine_id,
                    "process": handle.process,
                    "purpose": purpose,
                    "plan": plan,
                }),
            )
            .with_correlation(correlation_id);
        self.collaborators.event_bus.publish(event);
        Ok(())
    }

    async fn append(&mut self, item: BlackboardItem) {
        let item = self.state.blackboard.append(item).clone();
        self.state.touch();
        if let Err(e) = self.collaborators.store.save_blackboard_item(self.id(), &item).await {
            error!(swarm_id = %self.id(), item_id = %item.id, error = %e, "Failed to persist blackboard item");
        }
    }

    async fn save_state(&self) {
        if let Err(e) = self.collaborators.store.save_swarm_state(&self.state).await {
            error!(swarm_id = %self.id(), error = %e, "Failed to persist swarm state");
        }
    }

    async fn release_resources(&mut self) {
        if let Err(e) = self
            .collaborators
            .resources
            .release_all_resources(self.id(), &self.state.resources)
            .await
        {
            error!(swarm_id = %self.id(), error = %e, "Failed to release resources");
        }
        let released = self.state.resources.release_all();
        debug!(swarm_id = %self.id(), count = released.len(), "Resources released");
    }

    fn envelope(&self, event_type: &str, data: Value) -> Event {
        Event::new(
            event_type,
            EventSource::new(Tier::Coordination, COMPONENT, self.id().to_string()),
            data,
        )
        .with_target(self.id().to_string())
    }

    fn publish(&self, event_type: &str, data: Value) {
        self.collaborators.event_bus.publish(self.envelope(event_type, data));
    }
}
