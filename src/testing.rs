//! Harness for exercising a [`ProviderService`] the way the orchestrator does.
//!
//! [`ProviderTester`] runs plan-then-apply sequences and turns error
//! diagnostics into `Err` so tests can use `?`. The free functions assert on
//! plans and diagnostics with readable panic messages.
//!
//! # Example
//!
//! ```ignore
//! use flipt_provider::testing::ProviderTester;
//! use flipt_provider::FliptProvider;
//! use serde_json::json;
//!
//! let tester = ProviderTester::new(FliptProvider::new());
//! tester.configure(json!({"endpoint": server.uri()})).await?;
//!
//! let namespace = tester
//!     .apply("flipt_namespace", None, json!({"key": "production", "name": "Production"}))
//!     .await?;
//! tester.destroy("flipt_namespace", namespace).await?;
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::PlanResult;

/// Drives a provider through planned lifecycles.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's full schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Configure the provider. Error diagnostics become [`TestError::Diagnostics`].
    ///
    /// Warnings are dropped. A failed configure leaves the provider unusable,
    /// so later calls fail with a configuration error.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let err = tester
    ///     .configure(json!({"endpoint": "http://flipt", "token": "t", "jwt": "j"}))
    ///     .await
    ///     .unwrap_err();
    /// assert!(matches!(err, TestError::Diagnostics(_)));
    /// ```
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.configure(config).await?)
    }

    /// Validate a resource document against its schema.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        errors_only(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    /// Plan a create.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan moving `prior` to `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), config.clone(), config)
            .await
    }

    /// Plan a destroy.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), Value::Null, Value::Null)
            .await
    }

    /// Create without planning.
    pub async fn create(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, state).await
    }

    /// Refresh a resource. `Ok(None)` means it is gone.
    pub async fn read(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, state).await
    }

    /// Refresh a resource that must still exist.
    ///
    /// A vanished resource is [`ProviderError::NotFound`] instead of `Ok(None)`.
    pub async fn read_existing(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.read(resource_type, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("{} disappeared after apply", resource_type))
        })
    }

    /// Update without planning.
    pub async fn update(
        &self,
        resource_type: &str,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior, planned).await
    }

    /// Delete without planning.
    pub async fn delete(&self, resource_type: &str, state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, state).await
    }

    /// Import by id and return the single imported state.
    ///
    /// Ids take the resource's import form, e.g. `staging/production/new-feature/1`
    /// for the rule at rank 1 of a flag in the `staging` environment.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let rule = tester.import("flipt_rule", "production/new-feature/1").await?;
    /// assert_eq!(rule["rank"], 1);
    /// ```
    pub async fn import(&self, resource_type: &str, id: &str) -> Result<Value, ProviderError> {
        let mut imported = self.provider.import_resource(resource_type, id).await?;
        match imported.len() {
            1 => Ok(imported.remove(0).state),
            n => Err(ProviderError::Validation(format!(
                "import of '{}' returned {} resources",
                id, n
            ))),
        }
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Plan and apply `config`, then refresh.
    ///
    /// - No prior state: plan a create and create.
    /// - Plan without changes: nothing is written.
    /// - Plan requiring replacement: delete `prior`, then create.
    /// - Otherwise: update in place.
    ///
    /// The returned state is what a read reports after the write, so it can
    /// be fed straight back in as the next `prior`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = json!({"namespace_key": "production", "key": "new-feature", "name": "New"});
    /// let flag = tester.apply("flipt_flag", None, config).await?;
    /// let mut renamed = flag.clone();
    /// renamed["name"] = json!("Renamed");
    /// let flag = tester.apply("flipt_flag", Some(flag), renamed).await?;
    /// ```
    pub async fn apply(
        &self,
        resource_type: &str,
        prior: Option<Value>,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let applied = match prior {
            None => {
                let plan = self.plan_create(resource_type, config).await?;
                self.create(resource_type, plan.planned_state).await?
            },
            Some(prior) => {
                let plan = self
                    .plan_update(resource_type, prior.clone(), config)
                    .await?;
                if !plan.has_changes() {
                    plan.planned_state
                } else if plan.requires_replace {
                    self.delete(resource_type, prior).await?;
                    self.create(resource_type, plan.planned_state).await?
                } else {
                    self.update(resource_type, prior, plan.planned_state)
                        .await?
                }
            },
        };
        self.read_existing(resource_type, applied).await
    }

    /// Plan a destroy, delete, and check the resource reads as gone.
    ///
    /// A resource that still reads back after the delete is
    /// [`ProviderError::FailedPrecondition`]. For embedded children this
    /// catches a splice that removed the wrong element.
    pub async fn destroy(&self, resource_type: &str, state: Value) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, state.clone()).await?;
        self.delete(resource_type, state.clone()).await?;
        match self.read(resource_type, state).await? {
            None => Ok(()),
            Some(_) => Err(ProviderError::FailedPrecondition(format!(
                "{} still exists after delete",
                resource_type
            ))),
        }
    }

    /// Create from `initial`, apply `updated`, destroy. Returns the updated state.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let state = tester
    ///     .lifecycle_crud(
    ///         "flipt_namespace",
    ///         json!({"key": "production", "name": "Production"}),
    ///         json!({"key": "production", "name": "Prod"}),
    ///     )
    ///     .await?;
    /// assert_eq!(state["name"], "Prod");
    /// ```
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial: Value,
        updated: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.apply(resource_type, None, initial).await?;
        let state = self.apply(resource_type, Some(created), updated).await?;
        self.destroy(resource_type, state.clone()).await?;
        Ok(state)
    }
}

/// A failed tester call.
#[derive(Debug)]
pub enum TestError {
    /// Error diagnostics were returned.
    Diagnostics(Vec<Diagnostic>),
    /// The call itself failed.
    Provider(ProviderError),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Diagnostics(diagnostics) => {
                write!(f, "{} error diagnostic(s)", diagnostics.len())?;
                for d in diagnostics {
                    write!(f, "; {}", d.summary)?;
                    if let Some(attribute) = &d.attribute {
                        write!(f, " [{}]", attribute)?;
                    }
                    if let Some(detail) = &d.detail {
                        write!(f, ": {}", detail)?;
                    }
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn errors_only(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<Diagnostic> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// The plan creates without replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(plan.has_changes(), "plan for a create has no changes");
    assert!(!plan.requires_replace, "plan for a create requires replacement");
}

/// The plan changes nothing.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "expected no changes, plan changes {:?}",
        changed_paths(plan)
    );
}

/// The plan requires replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "expected replacement, plan updates {:?} in place",
        changed_paths(plan)
    );
}

/// The plan has changes and applies them in place.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected an update, plan has no changes");
    assert!(
        !plan.requires_replace,
        "expected an in-place update, plan replaces because of {:?}",
        changed_paths(plan)
    );
}

/// The plan changes `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let paths = changed_paths(plan);
    assert!(paths.contains(&path), "'{}' not among changed {:?}", path, paths);
}

/// The plan leaves `path` alone.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !changed_paths(plan).contains(&path),
        "'{}' unexpectedly changed",
        path
    );
}

/// At least one diagnostic is an error.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "expected an error diagnostic, got {:?}",
        diagnostics
    );
}

/// No diagnostic is an error.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<&str> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
}

/// Some error diagnostic's summary contains `needle`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], needle: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(needle)),
        "no error mentions '{}' in {:?}",
        needle,
        diagnostics
    );
}
