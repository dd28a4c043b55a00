//! Network boundary contract.
//!
//! Request/response shapes for the HTTP layer and an [`ApiService`] facade
//! that maps them onto the registry. A routing layer only has to
//! deserialize the body, call the matching method, and serialize either the
//! response or `ApiError::body()` with `ApiError::status_code()`.

use crate::engine::Action;
use crate::error::CoreError;
use crate::grid::{CompletionReason, DirtGrid, GridWorldParams, Position};
use crate::perception::Perception;
use crate::registry::{CreateParams, EnvironmentRegistry, EnvironmentSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use vacuum_env::{EnvironmentId, SystemContext, VacuumContext};

fn default_size() -> i64 {
    8
}

fn default_dirt_rate() -> f64 {
    0.3
}

/// `POST /api/environment`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    #[serde(default = "default_size")]
    pub width: i64,
    #[serde(default = "default_size")]
    pub height: i64,
    /// Defaults to the grid centre
    #[serde(default)]
    pub initial_position: Option<[i64; 2]>,
    #[serde(default = "default_dirt_rate")]
    pub dirt_rate: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub max_actions: Option<i64>,
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub record: bool,
}

impl Default for CreateRequest {
    fn default() -> Self {
        Self {
            width: default_size(),
            height: default_size(),
            initial_position: None,
            dirt_rate: default_dirt_rate(),
            seed: None,
            max_actions: None,
            restricted: false,
            record: false,
        }
    }
}

fn to_u16(value: i64, what: &str) -> Result<u16, CoreError> {
    u16::try_from(value).map_err(|_| CoreError::invalid(format!("{what} {value} out of range")))
}

impl CreateRequest {
    /// Converts wire integers into validated creation parameters.
    pub fn into_params(self, default_budget: u32) -> Result<CreateParams, CoreError> {
        let width = to_u16(self.width, "width")?;
        let height = to_u16(self.height, "height")?;
        let [x, y] = self
            .initial_position
            .unwrap_or([self.width / 2, self.height / 2]);
        let position = Position::new(to_u16(x, "initial x")?, to_u16(y, "initial y")?);
        let max_actions = match self.max_actions {
            Some(n) => u32::try_from(n)
                .map_err(|_| CoreError::invalid(format!("action budget {n} out of range")))?,
            None => default_budget,
        };

        let mut world = GridWorldParams::new(width, height, self.dirt_rate)
            .with_position(position)
            .with_max_actions(max_actions)
            .restricted(self.restricted);
        world.seed = self.seed;
        world.validate()?;

        Ok(CreateParams {
            world,
            record: self.record,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: EnvironmentId,
    pub width: u16,
    pub height: u16,
    pub initial_position: Position,
    pub dirt_rate: f64,
    /// Seed actually used, so the layout can be recreated
    pub seed: u64,
}

/// `GET /api/environment/<id>/state`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateResponse {
    pub id: EnvironmentId,
    pub agent_position: Position,
    pub is_dirty: bool,
    pub performance: u32,
    pub actions_taken: u32,
    pub actions_remaining: u32,
    pub finished: bool,
    pub completion_reason: Option<CompletionReason>,
    pub dirt_grid: DirtGrid,
}

/// `POST /api/environment/<id>/action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousState {
    pub position: Position,
    pub is_dirty: bool,
    pub performance: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewState {
    pub position: Position,
    pub is_dirty: bool,
    pub performance: u32,
    pub actions_taken: u32,
    pub actions_remaining: u32,
    pub finished: bool,
    pub completion_reason: Option<CompletionReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub action: Action,
    pub previous: PreviousState,
    pub new: NewState,
    pub reward: u32,
}

/// `GET /api/environment/<id>/sense`
pub type SenseResponse = Perception;

/// `GET /api/environments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub environments: Vec<EnvironmentSummary>,
}

/// `DELETE /api/environment/<id>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: EnvironmentId,
    pub deleted: bool,
}

/// `POST /api/cleanup`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupRequest {
    /// Seconds; the registry's configured age when absent
    #[serde(default)]
    pub max_age: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub deleted_count: usize,
}

/// `GET /api/health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_environments: usize,
    pub timestamp: f64,
}

/// Error surfaced at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub CoreError);

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self.0 {
            CoreError::InvalidParameter(_) => 400,
            CoreError::Restricted(_) => 403,
            CoreError::NotFound(_) => 404,
            CoreError::EnvironmentFinished(_) => 409,
        }
    }

    /// `{"error": "..."}` body.
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.0.to_string() })
    }
}

/// Maps boundary requests onto an [`EnvironmentRegistry`].
pub struct ApiService<C: VacuumContext = SystemContext> {
    registry: Arc<EnvironmentRegistry<C>>,
}

impl<C: VacuumContext> Clone for ApiService<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

fn parse_id(raw: &str) -> Result<EnvironmentId, ApiError> {
    raw.parse()
        .map_err(|e: vacuum_env::EnvError| ApiError(CoreError::invalid(e.to_string())))
}

impl<C: VacuumContext> ApiService<C> {
    pub fn new(registry: Arc<EnvironmentRegistry<C>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<EnvironmentRegistry<C>> {
        &self.registry
    }

    pub fn create(&self, request: CreateRequest) -> Result<CreateResponse, ApiError> {
        let mut params = request.into_params(self.registry.config().default_budget())?;
        let seed = *params
            .world
            .seed
            .get_or_insert_with(|| self.registry.context().next_seed());
        let world = params.world.clone();
        let id = self.registry.create(params)?;

        Ok(CreateResponse {
            id,
            width: world.width,
            height: world.height,
            initial_position: world.initial_position,
            dirt_rate: world.dirt_rate,
            seed,
        })
    }

    pub fn state(&self, id: &str) -> Result<StateResponse, ApiError> {
        let id = parse_id(id)?;
        let view = self.registry.state(&id)?;
        Ok(StateResponse {
            id,
            agent_position: view.agent_position,
            is_dirty: view.is_dirty,
            performance: view.performance,
            actions_taken: view.actions_taken,
            actions_remaining: view.actions_remaining,
            finished: view.finished,
            completion_reason: view.completion_reason,
            dirt_grid: view.dirt_grid,
        })
    }

    pub fn action(&self, id: &str, request: &ActionRequest) -> Result<ActionResponse, ApiError> {
        // Parse before lookup so a bad action never touches the environment
        let action: Action = request.action.parse()?;
        let id = parse_id(id)?;
        let outcome = self.registry.step(&id, action)?;

        Ok(ActionResponse {
            success: true,
            action,
            previous: PreviousState {
                position: outcome.before.agent_position,
                is_dirty: outcome.before.is_dirty,
                performance: outcome.before.performance,
            },
            new: NewState {
                position: outcome.after.agent_position,
                is_dirty: outcome.after.is_dirty,
                performance: outcome.after.performance,
                actions_taken: outcome.after.actions_taken,
                actions_remaining: outcome.after.actions_remaining,
                finished: outcome.after.finished,
                completion_reason: outcome.after.completion_reason,
            },
            reward: outcome.reward,
        })
    }

    pub fn sense(&self, id: &str) -> Result<SenseResponse, ApiError> {
        let id = parse_id(id)?;
        Ok(self.registry.sense(&id)?)
    }

    pub fn list(&self) -> ListResponse {
        ListResponse {
            environments: self.registry.list(),
        }
    }

    pub fn delete(&self, id: &str) -> Result<DeleteResponse, ApiError> {
        let id = parse_id(id)?;
        self.registry.delete(&id)?;
        Ok(DeleteResponse { id, deleted: true })
    }

    pub fn cleanup(&self, request: &CleanupRequest) -> Result<CleanupResponse, ApiError> {
        let max_age = match request.max_age {
            // Rejects negative, NaN and values beyond what a Duration holds
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map_err(|e| CoreError::invalid(format!("max_age {secs} is not a valid age: {e}")))?,
            None => self.registry.config().max_age,
        };
        Ok(CleanupResponse {
            deleted_count: self.registry.cleanup(max_age),
        })
    }

    pub fn health(&self) -> HealthResponse {
        let health = self.registry.health();
        HealthResponse {
            status: "healthy".to_string(),
            active_environments: health.active_environments,
            timestamp: health.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MAX_ACTIONS;
    use crate::registry::RegistryConfig;

    fn service() -> ApiService {
        ApiService::new(Arc::new(EnvironmentRegistry::with_defaults()))
    }

    #[test]
    fn test_create_defaults_from_empty_body() {
        let request: CreateRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, CreateRequest::default());

        let created = service().create(request).unwrap();
        assert_eq!((created.width, created.height), (8, 8));
        assert_eq!(created.initial_position, Position::new(4, 4));
        assert_eq!(created.dirt_rate, 0.3);
    }

    #[test]
    fn test_create_echoes_seed_and_reproduces_layout() {
        let api = service();
        let first = api
            .create(CreateRequest {
                seed: Some(77),
                ..Default::default()
            })
            .unwrap();
        let second = api
            .create(CreateRequest {
                seed: Some(first.seed),
                ..Default::default()
            })
            .unwrap();

        let a = api.state(&first.id.to_string()).unwrap();
        let b = api.state(&second.id.to_string()).unwrap();
        assert_eq!(first.seed, 77);
        assert_eq!(a.dirt_grid, b.dirt_grid);
    }

    #[test]
    fn test_invalid_create_is_400() {
        let api = service();
        for request in [
            CreateRequest { width: 0, ..Default::default() },
            CreateRequest { height: 300, ..Default::default() },
            CreateRequest { width: -3, ..Default::default() },
            CreateRequest { dirt_rate: 1.5, ..Default::default() },
            CreateRequest { initial_position: Some([8, 0]), ..Default::default() },
            CreateRequest { max_actions: Some(1001), ..Default::default() },
        ] {
            let err = api.create(request).unwrap_err();
            assert_eq!(err.status_code(), 400, "{err}");
        }
        assert!(api.list().environments.is_empty());
    }

    #[test]
    fn test_action_response_shape() {
        let api = service();
        let id = api.create(CreateRequest::default()).unwrap().id.to_string();

        let resp = api
            .action(&id, &ActionRequest { action: "UP".into() })
            .unwrap();
        assert!(resp.success);
        assert_eq!(resp.action, Action::Up);
        assert_eq!(resp.new.actions_taken, 1);
        assert_eq!(resp.new.actions_remaining, 999);
        assert_eq!(resp.previous.position, Position::new(4, 4));
        assert_eq!(resp.new.position, Position::new(4, 3));

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["previous"]["position"], serde_json::json!([4, 4]));
        assert_eq!(json["action"], "up");
    }

    #[test]
    fn test_error_statuses() {
        let api = service();
        let missing = EnvironmentId::new().to_string();
        assert_eq!(api.sense(&missing).unwrap_err().status_code(), 404);
        assert_eq!(api.delete(&missing).unwrap_err().status_code(), 404);
        assert_eq!(api.sense("garbage").unwrap_err().status_code(), 400);

        let id = api
            .create(CreateRequest { restricted: true, ..Default::default() })
            .unwrap()
            .id
            .to_string();
        assert_eq!(api.state(&id).unwrap_err().status_code(), 403);
        let bad = api.action(&id, &ActionRequest { action: "fly".into() }).unwrap_err();
        assert_eq!(bad.status_code(), 400);
        assert_eq!(bad.body()["error"], "Invalid parameter: unknown action: \"fly\"");

        let done = api
            .create(CreateRequest { dirt_rate: 0.0, ..Default::default() })
            .unwrap()
            .id
            .to_string();
        let finished = api.action(&done, &ActionRequest { action: "idle".into() }).unwrap_err();
        assert_eq!(finished.status_code(), 409);
    }

    #[test]
    fn test_delete_list_cleanup_health() {
        let api = service();
        let a = api.create(CreateRequest::default()).unwrap().id;
        api.create(CreateRequest::default()).unwrap();

        assert_eq!(api.health().active_environments, 2);
        assert_eq!(api.delete(&a.to_string()).unwrap(), DeleteResponse { id: a, deleted: true });
        assert_eq!(api.list().environments.len(), 1);

        let kept = api.cleanup(&CleanupRequest::default()).unwrap();
        assert_eq!(kept.deleted_count, 0);
        std::thread::sleep(Duration::from_millis(5));
        let swept = api.cleanup(&CleanupRequest { max_age: Some(0.0) }).unwrap();
        assert_eq!(swept.deleted_count, 1);
        assert!(api.cleanup(&CleanupRequest { max_age: Some(-1.0) }).is_err());
        assert_eq!(api.health().status, "healthy");
    }

    #[test]
    fn test_registry_default_budget_applies_to_creates() {
        let config = RegistryConfig::default().with_max_actions(50);
        let api = ApiService::new(Arc::new(EnvironmentRegistry::new(SystemContext::shared(), config)));
        let id = api.create(CreateRequest::default()).unwrap().id.to_string();
        assert_eq!(api.sense(&id).unwrap().actions_remaining, 50);

        // An out-of-range field set directly still yields a usable default
        let config = RegistryConfig { max_actions: 5000, ..RegistryConfig::default() };
        let api = ApiService::new(Arc::new(EnvironmentRegistry::new(SystemContext::shared(), config)));
        let id = api.create(CreateRequest::default()).unwrap().id.to_string();
        assert_eq!(api.sense(&id).unwrap().actions_remaining, MAX_ACTIONS);
    }

    #[test]
    fn test_cleanup_rejects_unrepresentable_ages() {
        let api = service();
        api.create(CreateRequest::default()).unwrap();

        for secs in [1e30, f64::MAX, f64::INFINITY, f64::NAN, -0.5] {
            let err = api.cleanup(&CleanupRequest { max_age: Some(secs) }).unwrap_err();
            assert_eq!(err.status_code(), 400, "max_age {secs}");
        }
        assert_eq!(api.list().environments.len(), 1);
    }
}
