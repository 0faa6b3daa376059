//! Reconciliation task model.
//!
//! A task holds the desired state of one cloud resource. Reconciling it is a
//! fixed sequence:
//!
//! 1. [`Task::find`] reads the actual state (`None` when it does not exist).
//! 2. [`Task::build_changes`] diffs actual against desired.
//! 3. [`Task::check_changes`] validates the desired configuration.
//! 4. [`Render::render`] applies the changeset to a target: the live cloud API
//!    or a generated Terraform document.
//!
//! [`run_delta`] drives that sequence and honours the task's [`Lifecycle`].

pub mod terraform;

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CloudupError, Result};

/// How the driver treats a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Lifecycle {
    /// Create or update the resource to match.
    #[default]
    Sync,
    /// Skip the task entirely.
    Ignore,
    /// Like `Sync`, but authorization failures only produce a warning.
    WarnIfInsufficientAccess,
    /// The resource must already exist and match; never mutated.
    ExistsAndValidates,
    /// Warn if the resource is missing or differs; never mutated.
    ExistsAndWarnIfChanges,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "Sync"),
            Self::Ignore => write!(f, "Ignore"),
            Self::WarnIfInsufficientAccess => write!(f, "WarnIfInsufficientAccess"),
            Self::ExistsAndValidates => write!(f, "ExistsAndValidates"),
            Self::ExistsAndWarnIfChanges => write!(f, "ExistsAndWarnIfChanges"),
        }
    }
}

/// A declarative task for one cloud resource.
///
/// `Default` doubles as the empty changeset: a changeset equal to
/// `Self::default()` means there is nothing to apply.
#[async_trait]
pub trait Task: Clone + Debug + Default + PartialEq + Send + Sync + Sized {
    /// Cloud handle used to read actual state.
    type Cloud: Send + Sync;

    /// Kind name used in logs and errors.
    const KIND: &'static str;

    /// Identifier of this instance.
    fn name(&self) -> &str;

    /// Lifecycle of this instance.
    fn lifecycle(&self) -> Lifecycle;

    /// Read the live resource. `Ok(None)` means it does not exist.
    async fn find(&self, cloud: &Self::Cloud) -> Result<Option<Self>>;

    /// Field-wise diff: fields of `expected` that differ from `actual`.
    fn build_changes(actual: &Self, expected: &Self) -> Self;

    /// Validate the desired configuration before rendering.
    ///
    /// # Errors
    /// Returns an error when the desired configuration is unusable.
    fn check_changes(actual: Option<&Self>, expected: &Self, changes: &Self) -> Result<()>;
}

/// Something tasks can be rendered to.
pub trait RenderTarget: Send + Sync {
    /// Target name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the driver should read actual state before rendering.
    fn check_existing(&self) -> bool {
        true
    }
}

/// Applies a changeset for task type `T` to a target.
#[async_trait]
pub trait Render<T: Task>: RenderTarget {
    /// Apply `changes`. `actual == None` means the resource must be created.
    async fn render(&self, actual: Option<&T>, expected: &T, changes: &mut T) -> Result<()>;
}

/// Reconcile one task against `target`.
///
/// `cloud` is only consulted when the target checks existing state.
///
/// # Errors
/// Returns errors from find, validation or rendering, and lifecycle
/// violations for `ExistsAndValidates` tasks.
pub async fn run_delta<T, R>(expected: &T, cloud: Option<&T::Cloud>, target: &R) -> Result<()>
where
    T: Task,
    R: Render<T>,
{
    let name = expected.name().to_string();
    let lifecycle = expected.lifecycle();

    if lifecycle == Lifecycle::Ignore {
        debug!(kind = T::KIND, name = %name, "Skipping task with lifecycle Ignore");
        return Ok(());
    }

    let actual = if target.check_existing() {
        let cloud = cloud.ok_or_else(|| {
            CloudupError::Config(format!(
                "target {} needs a cloud to find {} {name}",
                target.name(),
                T::KIND
            ))
        })?;
        expected.find(cloud).await?
    } else {
        None
    };

    let mut changes = match &actual {
        Some(actual) => T::build_changes(actual, expected),
        None => expected.clone(),
    };
    let has_changes = actual.is_none() || changes != T::default();

    match lifecycle {
        Lifecycle::ExistsAndValidates => {
            if actual.is_none() && target.check_existing() {
                return Err(CloudupError::NotFound(format!(
                    "{} {name} was not found (lifecycle {lifecycle})",
                    T::KIND
                )));
            }
            if actual.is_some() && has_changes {
                return Err(CloudupError::Config(format!(
                    "{} {name} did not match expected state: {changes:?}",
                    T::KIND
                )));
            }
            return Ok(());
        }
        Lifecycle::ExistsAndWarnIfChanges => {
            if actual.is_none() && target.check_existing() {
                warn!(kind = T::KIND, name = %name, "Resource was not found");
            } else if actual.is_some() && has_changes {
                warn!(
                    kind = T::KIND,
                    name = %name,
                    changes = ?changes,
                    "Resource did not match expected state"
                );
            }
            return Ok(());
        }
        Lifecycle::Sync | Lifecycle::WarnIfInsufficientAccess | Lifecycle::Ignore => {}
    }

    if !has_changes {
        debug!(kind = T::KIND, name = %name, "No changes");
        return Ok(());
    }

    T::check_changes(actual.as_ref(), expected, &changes)?;

    info!(
        kind = T::KIND,
        name = %name,
        target = target.name(),
        create = actual.is_none(),
        "Applying changes"
    );

    match target.render(actual.as_ref(), expected, &mut changes).await {
        Err(err)
            if lifecycle == Lifecycle::WarnIfInsufficientAccess
                && matches!(err.root(), CloudupError::Auth(_)) =>
        {
            warn!(kind = T::KIND, name = %name, error = %err, "Insufficient access, skipping");
            Ok(())
        }
        other => other,
    }
}
