//! Volume plugin protocol handlers.
//!
//! Every endpoint is a POST with a JSON body. Failures are reported as
//! `{"Err": "..."}`, which the container runtime shows to the user.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use mkfsvol::{VolumeDriver, VolumeError, VolumeInfo};
use mkfsvol_shared::constants::{plugin as const_plugin, volume as const_volume};
use mkfsvol_shared::protocol::{
    ActivateResponse, CapabilitiesResponse, Capability, CreateRequest, EmptyResponse,
    ErrorResponse, GetResponse, ListResponse, MountRequest, MountpointResponse, NameRequest,
    Volume,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

type Driver = State<Arc<VolumeDriver>>;

/// Routes for the plugin activation handshake and the volume driver calls.
pub fn router(driver: Arc<VolumeDriver>) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.Get", post(get))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Remove", post(remove))
        .with_state(driver)
}

/// JSON body sent with the plugin content type.
struct PluginJson<T>(StatusCode, T);

impl<T: Serialize> IntoResponse for PluginJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.1) {
            Ok(body) => (
                self.0,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(const_plugin::CONTENT_TYPE),
                )],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode plugin response");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn ok<T: Serialize>(body: T) -> PluginJson<T> {
    PluginJson(StatusCode::OK, body)
}

enum PluginError {
    BadRequest(String),
    Volume(VolumeError),
}

impl From<VolumeError> for PluginError {
    fn from(e: VolumeError) -> Self {
        Self::Volume(e)
    }
}

impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                PluginJson(StatusCode::BAD_REQUEST, ErrorResponse::new(message)).into_response()
            }
            Self::Volume(e) => {
                PluginJson(StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(e))
                    .into_response()
            }
        }
    }
}

type PluginResult<T> = Result<PluginJson<T>, PluginError>;

/// Decode a request body; the runtime sends an empty body for calls without
/// parameters.
fn decode<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, PluginError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "Malformed plugin request");
        PluginError::BadRequest(format!("invalid request body: {}", e))
    })
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn to_wire(info: VolumeInfo) -> Volume {
    Volume {
        name: info.name,
        mountpoint: display(&info.mountpoint),
    }
}

async fn activate() -> PluginJson<ActivateResponse> {
    tracing::debug!(plugin = const_plugin::NAME, "activate");
    ok(ActivateResponse::default())
}

async fn capabilities(State(driver): Driver) -> PluginJson<CapabilitiesResponse> {
    ok(CapabilitiesResponse {
        capabilities: Capability {
            scope: driver.capabilities().scope.to_string(),
        },
    })
}

async fn create(State(driver): Driver, body: Bytes) -> PluginResult<EmptyResponse> {
    let req: CreateRequest = decode(&body)?;
    let filesystem = req
        .options
        .as_ref()
        .and_then(|opts| opts.get(const_volume::FS_OPTION))
        .map(String::as_str);

    driver.create(&req.name, filesystem).await?;
    Ok(ok(EmptyResponse {}))
}

async fn get(State(driver): Driver, body: Bytes) -> PluginResult<GetResponse> {
    let req: NameRequest = decode(&body)?;
    let info = driver.get(&req.name).await?;
    Ok(ok(GetResponse {
        volume: to_wire(info),
    }))
}

async fn list(State(driver): Driver) -> PluginJson<ListResponse> {
    let volumes = driver.list().await.into_iter().map(to_wire).collect();
    ok(ListResponse { volumes })
}

async fn path(State(driver): Driver, body: Bytes) -> PluginResult<MountpointResponse> {
    let req: NameRequest = decode(&body)?;
    let mountpoint = driver.path(&req.name).await?;
    Ok(ok(MountpointResponse {
        mountpoint: display(&mountpoint),
    }))
}

async fn mount(State(driver): Driver, body: Bytes) -> PluginResult<MountpointResponse> {
    let req: MountRequest = decode(&body)?;
    let mountpoint = driver.mount(&req.name, &req.id).await?;
    Ok(ok(MountpointResponse {
        mountpoint: display(&mountpoint),
    }))
}

async fn unmount(State(driver): Driver, body: Bytes) -> PluginResult<EmptyResponse> {
    let req: MountRequest = decode(&body)?;
    driver.unmount(&req.name, &req.id).await?;
    Ok(ok(EmptyResponse {}))
}

async fn remove(State(driver): Driver, body: Bytes) -> PluginResult<EmptyResponse> {
    let req: NameRequest = decode(&body)?;
    driver.remove(&req.name).await?;
    Ok(ok(EmptyResponse {}))
}
