//! Operations model
//!
//! Receives resource commands from the farmer on `in`. Start orders are
//! queued in a [`CompletionQueue`] and forwarded to the resource's own port
//! in the same instant; `stop` orders are only forwarded. When a job
//! completes, an acknowledgement leaves on `out`.

use super::AtomicModel;
use crate::core::SimTime;
use crate::error::{ModelingError, SimulationError, StateError};
use crate::models::{ports, ExternalEvent, ResourceCommand, ResourceOrder};
use crate::operations::CompletionQueue;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct OperationsModel {
    queue: CompletionQueue,
    /// Orders to forward at the current instant, as (resource, order)
    forward: Vec<(String, ResourceOrder)>,
    /// Accepted resources; `None` accepts any
    resources: Option<BTreeSet<String>>,
    last: SimTime,
}

impl OperationsModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept commands for these resources
    pub fn with_resources<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resources: Some(resources.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn queue(&self) -> &CompletionQueue {
        &self.queue
    }

    fn accept(&mut self, now: SimTime, event: &ExternalEvent) -> Result<(), SimulationError> {
        let command = ResourceCommand::from_event(event)?;

        if let Some(resources) = &self.resources {
            if !resources.contains(&command.resource) {
                return Err(StateError::UnknownResource(command.resource).into());
            }
        }

        if command.order.is_start() {
            self.queue
                .submit(now, &command.activity, &command.resource, command.duration)?;
        } else {
            debug!(activity = %command.activity, resource = %command.resource, %now, "stop forwarded");
        }

        self.forward.push((
            command.resource,
            ResourceOrder {
                order: command.order,
                activity: command.activity,
                duration: command.duration,
            },
        ));
        Ok(())
    }
}

impl AtomicModel for OperationsModel {
    fn init(&mut self, now: SimTime) -> Result<SimTime, SimulationError> {
        self.last = now;
        Ok(self.time_advance())
    }

    fn time_advance(&self) -> SimTime {
        if !self.forward.is_empty() {
            return SimTime::ZERO;
        }
        self.queue.time_advance(self.last)
    }

    fn output(&self, now: SimTime) -> Vec<ExternalEvent> {
        let mut events: Vec<ExternalEvent> = self
            .forward
            .iter()
            .map(|(resource, order)| order.to_event(resource))
            .collect();

        events.extend(
            self.queue
                .due(now)
                .into_iter()
                .map(|job| job.ack().to_event(ports::OUT)),
        );
        events
    }

    fn internal_transition(&mut self, now: SimTime) -> Result<(), SimulationError> {
        self.forward.clear();
        self.queue.advance_to(now)?;
        self.last = now;
        Ok(())
    }

    fn external_transition(
        &mut self,
        now: SimTime,
        events: &[ExternalEvent],
    ) -> Result<(), SimulationError> {
        for event in events {
            if !event.on_port(ports::IN) {
                return Err(ModelingError::UnexpectedPort {
                    model: "operations".to_string(),
                    port: event.port.clone(),
                }
                .into());
            }
            self.accept(now, event)?;
        }
        self.last = now;
        Ok(())
    }

    fn observation(&self, port: &str) -> Option<String> {
        match port {
            "queue" => Some(self.queue.len().to_string()),
            _ => None,
        }
    }
}
