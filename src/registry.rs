//! Role-keyed instrument registry with scoped exclusive acquisition.
//!
//! Each configured role owns one communication resource for its lifetime.
//! Acquiring a role locks it for the caller and returns an owned guard;
//! dropping the guard releases the role on every exit path, so a worker that
//! fails mid-run can never leak its lock. Acquiring an unconfigured role is
//! a resource error, which the status aggregator treats like any other
//! per-role failure.
//!
//! The registry does not create drivers. Callers install boxed capability
//! objects (real SCPI/TSP drivers or the mocks from
//! [`crate::instrument::mock`]) selected by configuration.

use crate::error::{AppResult, ProbeError};
use crate::instrument::{
    Electrometer, EnvironmentBox, LcrMeter, MotionTable, SourceMeter, SwitchingMatrix,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Instrument roles, in status-polling order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Switching matrix.
    Matrix,
    /// High-voltage source-measure unit.
    HvSrc,
    /// Low-voltage source-measure unit.
    VSrc,
    /// Impedance meter.
    Lcr,
    /// Electrometer.
    Elm,
    /// Motorized probe table.
    Table,
    /// Environment box controller.
    EnvironBox,
}

impl Role {
    /// All roles, in the fixed order status polling visits them.
    pub const ALL: [Role; 7] = [
        Role::Matrix,
        Role::HvSrc,
        Role::VSrc,
        Role::Lcr,
        Role::Elm,
        Role::Table,
        Role::EnvironBox,
    ];

    /// Configuration key and display name of the role.
    pub fn name(self) -> &'static str {
        match self {
            Role::Matrix => "matrix",
            Role::HvSrc => "hvsrc",
            Role::VSrc => "vsrc",
            Role::Lcr => "lcr",
            Role::Elm => "elm",
            Role::Table => "table",
            Role::EnvironBox => "environ",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exclusive, scoped handle to a role's instrument.
///
/// The role stays locked until the guard is dropped.
pub type RoleGuard<T> = OwnedMutexGuard<Box<T>>;

type Slot<T> = Option<Arc<Mutex<Box<T>>>>;

/// Holds the communication resource of each configured role.
#[derive(Default)]
pub struct InstrumentRegistry {
    matrix: Slot<dyn SwitchingMatrix>,
    hvsrc: Slot<dyn SourceMeter>,
    vsrc: Slot<dyn SourceMeter>,
    lcr: Slot<dyn LcrMeter>,
    elm: Slot<dyn Electrometer>,
    table: Slot<dyn MotionTable>,
    environ: Slot<dyn EnvironmentBox>,
}

impl InstrumentRegistry {
    /// Create an empty registry with no roles configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the switching matrix driver.
    pub fn set_matrix(&mut self, instrument: Box<dyn SwitchingMatrix>) {
        self.matrix = Some(Arc::new(Mutex::new(instrument)));
    }

    /// Install the high-voltage source-measure driver.
    pub fn set_hvsrc(&mut self, instrument: Box<dyn SourceMeter>) {
        self.hvsrc = Some(Arc::new(Mutex::new(instrument)));
    }

    /// Install the low-voltage source-measure driver.
    pub fn set_vsrc(&mut self, instrument: Box<dyn SourceMeter>) {
        self.vsrc = Some(Arc::new(Mutex::new(instrument)));
    }

    /// Install the impedance meter driver.
    pub fn set_lcr(&mut self, instrument: Box<dyn LcrMeter>) {
        self.lcr = Some(Arc::new(Mutex::new(instrument)));
    }

    /// Install the electrometer driver.
    pub fn set_elm(&mut self, instrument: Box<dyn Electrometer>) {
        self.elm = Some(Arc::new(Mutex::new(instrument)));
    }

    /// Install the probe table driver.
    pub fn set_table(&mut self, instrument: Box<dyn MotionTable>) {
        self.table = Some(Arc::new(Mutex::new(instrument)));
    }

    /// Install the environment box driver.
    pub fn set_environ(&mut self, instrument: Box<dyn EnvironmentBox>) {
        self.environ = Some(Arc::new(Mutex::new(instrument)));
    }

    /// Acquire exclusive access to the switching matrix.
    pub async fn acquire_matrix(&self) -> AppResult<RoleGuard<dyn SwitchingMatrix>> {
        Self::acquire(&self.matrix, Role::Matrix).await
    }

    /// Acquire exclusive access to the high-voltage source-measure unit.
    pub async fn acquire_hvsrc(&self) -> AppResult<RoleGuard<dyn SourceMeter>> {
        Self::acquire(&self.hvsrc, Role::HvSrc).await
    }

    /// Acquire exclusive access to the low-voltage source-measure unit.
    pub async fn acquire_vsrc(&self) -> AppResult<RoleGuard<dyn SourceMeter>> {
        Self::acquire(&self.vsrc, Role::VSrc).await
    }

    /// Acquire exclusive access to the impedance meter.
    pub async fn acquire_lcr(&self) -> AppResult<RoleGuard<dyn LcrMeter>> {
        Self::acquire(&self.lcr, Role::Lcr).await
    }

    /// Acquire exclusive access to the electrometer.
    pub async fn acquire_elm(&self) -> AppResult<RoleGuard<dyn Electrometer>> {
        Self::acquire(&self.elm, Role::Elm).await
    }

    /// Acquire exclusive access to the probe table.
    pub async fn acquire_table(&self) -> AppResult<RoleGuard<dyn MotionTable>> {
        Self::acquire(&self.table, Role::Table).await
    }

    /// Acquire exclusive access to the environment box.
    pub async fn acquire_environ(&self) -> AppResult<RoleGuard<dyn EnvironmentBox>> {
        Self::acquire(&self.environ, Role::EnvironBox).await
    }

    async fn acquire<T: ?Sized>(slot: &Slot<T>, role: Role) -> AppResult<RoleGuard<T>> {
        match slot {
            Some(cell) => Ok(Arc::clone(cell).lock_owned().await),
            None => Err(ProbeError::Resource(format!(
                "no resource configured for role '{role}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::mock::MockSwitchingMatrix;

    #[tokio::test]
    async fn test_unconfigured_role_is_resource_error() {
        let registry = InstrumentRegistry::new();
        let err = registry.acquire_lcr().await.unwrap_err();
        assert!(err.is_resource());
        assert!(err.to_string().contains("lcr"));
    }

    #[tokio::test]
    async fn test_acquisition_is_exclusive_and_scoped() {
        let mut registry = InstrumentRegistry::new();
        registry.set_matrix(Box::new(MockSwitchingMatrix::new("707B")));

        let guard = registry.acquire_matrix().await.unwrap();
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), {
                registry.acquire_matrix()
            })
            .await
            .is_err(),
            "second acquisition should block while the guard is held"
        );
        drop(guard);
        // Released on scope exit; the role is acquirable again.
        registry.acquire_matrix().await.unwrap();
    }

    #[test]
    fn test_role_order() {
        let names: Vec<&str> = Role::ALL.iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec!["matrix", "hvsrc", "vsrc", "lcr", "elm", "table", "environ"]
        );
    }
}
