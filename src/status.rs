//! Instrument status aggregation.
//!
//! [`StatusProcess`] visits every instrument role in a fixed order and
//! rebuilds the shared [`StatusSnapshot`]. Each role is acquired, queried,
//! and released independently: a role whose resource is missing or whose
//! transport fails keeps its default fields while the run continues with the
//! next role. A run therefore always completes and always yields a snapshot,
//! possibly a partial one.

use crate::error::AppResult;
use crate::instrument::CALDONE_COMPLETE;
use crate::registry::{InstrumentRegistry, Role};
use crate::state::{ProcessState, StatusSnapshot};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Total number of roles one status run visits.
pub const STATUS_STEPS: usize = Role::ALL.len();

/// Progress notification emitted before each role and once on completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Display message; empty for the final completion event.
    pub message: String,
    /// Zero-based step index; equals `total` on completion.
    pub step: usize,
    /// Total number of steps.
    pub total: usize,
}

/// Sequential status poller over all configured instrument roles.
pub struct StatusProcess {
    registry: Arc<InstrumentRegistry>,
    state: ProcessState,
    progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl StatusProcess {
    /// Create a poller over `registry`, publishing into `state`.
    pub fn new(registry: Arc<InstrumentRegistry>, state: ProcessState) -> Self {
        Self {
            registry,
            state,
            progress: None,
        }
    }

    /// Emit progress events to `sender` on every run.
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Run one full status poll and return the resulting snapshot.
    ///
    /// Per-role resource failures are logged and isolated; they never abort
    /// the run.
    pub async fn run(&self) -> StatusSnapshot {
        for (step, role) in Role::ALL.into_iter().enumerate() {
            self.notify(format!("Reading {role} status..."), step);
            self.reset_role(role);
            if let Err(err) = self.query_role(role).await {
                warn!(role = %role, error = %err, "status query failed, fields left at defaults");
            }
        }
        self.notify(String::new(), STATUS_STEPS);
        self.state.status()
    }

    fn notify(&self, message: String, step: usize) {
        if let Some(sender) = &self.progress {
            let _ = sender.send(ProgressEvent {
                message,
                step,
                total: STATUS_STEPS,
            });
        }
    }

    /// Reset one role's snapshot fields to their defaults.
    fn reset_role(&self, role: Role) {
        self.state.update_status(|status| match role {
            Role::Matrix => {
                status.matrix_model.clear();
                status.matrix_channels.clear();
            }
            Role::HvSrc => status.hvsrc_model.clear(),
            Role::VSrc => status.vsrc_model.clear(),
            Role::Lcr => status.lcr_model.clear(),
            Role::Elm => status.elm_model.clear(),
            Role::Table => {
                status.table_model.clear();
                status.table_state.clear();
            }
            Role::EnvironBox => {
                status.env_model.clear();
                status.env_pc_data = None;
            }
        });
    }

    /// Acquire one role, query it, and publish its fields.
    ///
    /// All queries complete before any field is written, so a mid-query
    /// failure leaves the role entirely at defaults.
    async fn query_role(&self, role: Role) -> AppResult<()> {
        match role {
            Role::Matrix => {
                let mut matrix = self.registry.acquire_matrix().await?;
                let model = matrix.identify().await?;
                let channels = matrix.closed_channels().await?.join(", ");
                self.state.update_status(|status| {
                    status.matrix_model = model;
                    status.matrix_channels = channels;
                });
            }
            Role::HvSrc => {
                let mut hvsrc = self.registry.acquire_hvsrc().await?;
                let model = hvsrc.identify().await?;
                self.state.update_status(|status| status.hvsrc_model = model);
            }
            Role::VSrc => {
                let mut vsrc = self.registry.acquire_vsrc().await?;
                let model = vsrc.identify().await?;
                self.state.update_status(|status| status.vsrc_model = model);
            }
            Role::Lcr => {
                let mut lcr = self.registry.acquire_lcr().await?;
                let model = lcr.identify().await?;
                self.state.update_status(|status| status.lcr_model = model);
            }
            Role::Elm => {
                let mut elm = self.registry.acquire_elm().await?;
                let model = elm.identify().await?;
                self.state.update_status(|status| status.elm_model = model);
            }
            Role::Table => {
                let mut table = self.registry.acquire_table().await?;
                table.enter_host_mode().await?;
                let model = table.identify().await?;
                let (x, y, z) = table.caldone().await?;
                let table_state = if [x, y, z].iter().all(|&axis| axis == CALDONE_COMPLETE) {
                    "CALIBRATED"
                } else {
                    "NOT CALIBRATED"
                };
                self.state.update_status(|status| {
                    status.table_model = model;
                    status.table_state = table_state.to_string();
                });
            }
            Role::EnvironBox => {
                let mut environ = self.registry.acquire_environ().await?;
                let model = environ.identify().await?;
                let pc_data = environ.pc_data().await?;
                self.state.update_status(|status| {
                    status.env_model = model;
                    status.env_pc_data = Some(pc_data);
                });
            }
        }
        Ok(())
    }
}
