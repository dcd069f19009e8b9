//! `ControlService` over the controller's JSON REST API.

use async_trait::async_trait;
use extrashot_core::control_service::{ControlService, ServiceResult};
use extrashot_core::credentials::{AuthStatus, CredentialChange};
use extrashot_core::error::ServiceError;
use extrashot_core::ptz::{Exposure, MotionIntent, WhiteBalance};
use extrashot_core::session_state::{
    DeviceList, OutputConfig, OutputStatus, ViewerOptions, ViewerStatus,
};
use extrashot_core::source::{ExtraIpList, SourceList};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

const GENERIC_FAILURE: &str = "API request failed";

pub struct HttpControlService {
    client: Client,
    api_base: Url,
}

#[derive(Serialize)]
struct ViewerRequest<'a> {
    source: &'a str,
    #[serde(flatten)]
    options: &'a ViewerOptions,
}

impl HttpControlService {
    pub fn new(client: Client, api_base: Url) -> Self {
        Self { client, api_base }
    }

    fn endpoint(&self, path: &str) -> ServiceResult<Url> {
        self.api_base
            .join(path)
            .map_err(|err| ServiceError::Transport(format!("invalid endpoint {path}: {err}")))
    }

    fn extra_ip_endpoint(&self, ip: &str) -> ServiceResult<Url> {
        let mut url = self.endpoint("sources/extra-ips")?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Transport("api base cannot carry a path".to_string()))?
            .push(ip);
        Ok(url)
    }

    async fn call(&self, request: RequestBuilder) -> ServiceResult<Value> {
        let response = request
            .send()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        tracing::trace!("response {}: {}", status, body);
        interpret(status, &body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<T> {
        let url = self.endpoint(path)?;
        tracing::debug!("GET {}", url);
        decode(self.call(self.client.get(url)).await?)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> ServiceResult<Value> {
        tracing::debug!("{} {}", method, url);
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.call(request).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ServiceResult<Value> {
        let url = self.endpoint(path)?;
        self.send(Method::POST, url, Some(body)).await
    }

    async fn post_empty(&self, path: &str) -> ServiceResult<Value> {
        let url = self.endpoint(path)?;
        self.send::<Value>(Method::POST, url, None).await
    }
}

/// Non-2xx answers carry `{"error": ..}`; some 2xx answers report
/// `{"status": "failed" | "error"}` instead.
fn interpret(status: u16, body: &str) -> ServiceResult<Value> {
    let parsed = if body.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(body)
    };
    if !(200..300).contains(&status) {
        let message = parsed
            .ok()
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| GENERIC_FAILURE.to_string());
        return Err(ServiceError::Remote { status, message });
    }
    let value = parsed.map_err(|err| ServiceError::Decode(err.to_string()))?;
    match value.get("status").and_then(Value::as_str) {
        Some(outcome @ ("failed" | "error")) => Err(ServiceError::Remote {
            status,
            message: error_message(&value).unwrap_or_else(|| outcome.to_string()),
        }),
        _ => Ok(value),
    }
}

fn error_message(value: &Value) -> Option<String> {
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn decode<T: DeserializeOwned>(value: Value) -> ServiceResult<T> {
    serde_json::from_value(value).map_err(|err| ServiceError::Decode(err.to_string()))
}

fn white_balance_body(mode: WhiteBalance) -> Value {
    let mut body = json!({ "mode": mode.mode() });
    if let Some((red, blue)) = mode.gains() {
        body["red"] = json!(red);
        body["blue"] = json!(blue);
    }
    body
}

fn exposure_body(exposure: Exposure) -> Value {
    match exposure {
        Exposure::Auto => json!({ "auto": true }),
        Exposure::Manual { level } => json!({ "level": level }),
    }
}

#[async_trait]
impl ControlService for HttpControlService {
    async fn auth_status(&self) -> ServiceResult<AuthStatus> {
        self.get("auth/status").await
    }

    async fn login(&self, username: &str, password: &str) -> ServiceResult<()> {
        self.post("auth/login", &json!({ "username": username, "password": password }))
            .await?;
        Ok(())
    }

    async fn logout(&self) -> ServiceResult<()> {
        self.post_empty("auth/logout").await?;
        Ok(())
    }

    async fn change_credentials(&self, change: &CredentialChange) -> ServiceResult<()> {
        let url = self.endpoint("auth/credentials")?;
        self.send(Method::PUT, url, Some(change)).await?;
        Ok(())
    }

    async fn health(&self) -> ServiceResult<Value> {
        self.get("health").await
    }

    async fn list_sources(&self) -> ServiceResult<SourceList> {
        self.get("sources/").await
    }

    async fn refresh_sources(&self, timeout_secs: u64) -> ServiceResult<SourceList> {
        decode(
            self.post("sources/refresh", &json!({ "timeout": timeout_secs }))
                .await?,
        )
    }

    async fn extra_ips(&self) -> ServiceResult<ExtraIpList> {
        self.get("sources/extra-ips").await
    }

    async fn set_extra_ips(&self, ips: Vec<String>) -> ServiceResult<ExtraIpList> {
        let url = self.endpoint("sources/extra-ips")?;
        decode(
            self.send(Method::PUT, url, Some(&json!({ "ips": ips })))
                .await?,
        )
    }

    async fn add_extra_ip(&self, ip: &str) -> ServiceResult<ExtraIpList> {
        decode(self.post("sources/extra-ips", &json!({ "ip": ip })).await?)
    }

    async fn remove_extra_ip(&self, ip: &str) -> ServiceResult<ExtraIpList> {
        let url = self.extra_ip_endpoint(ip)?;
        decode(self.send::<Value>(Method::DELETE, url, None).await?)
    }

    async fn viewer_start(&self, source: &str, options: &ViewerOptions) -> ServiceResult<()> {
        self.post("viewer/start", &ViewerRequest { source, options })
            .await?;
        Ok(())
    }

    async fn viewer_switch(&self, source: &str, options: &ViewerOptions) -> ServiceResult<()> {
        self.post("viewer/switch", &ViewerRequest { source, options })
            .await?;
        Ok(())
    }

    async fn viewer_stop(&self) -> ServiceResult<()> {
        self.post_empty("viewer/stop").await?;
        Ok(())
    }

    async fn viewer_status(&self) -> ServiceResult<ViewerStatus> {
        self.get("viewer/status").await
    }

    async fn ptz_move(&self, intent: MotionIntent) -> ServiceResult<()> {
        let body = json!({ "pan_speed": intent.pan_speed, "tilt_speed": intent.tilt_speed });
        self.post("ptz/move", &body).await?;
        Ok(())
    }

    async fn ptz_stop(&self) -> ServiceResult<()> {
        self.post_empty("ptz/stop").await?;
        Ok(())
    }

    async fn ptz_zoom(&self, speed: f32) -> ServiceResult<()> {
        self.post("ptz/zoom", &json!({ "speed": speed })).await?;
        Ok(())
    }

    async fn ptz_recall_preset(&self, preset: u8, speed: f32) -> ServiceResult<()> {
        self.post("ptz/preset/recall", &json!({ "preset": preset, "speed": speed }))
            .await?;
        Ok(())
    }

    async fn ptz_store_preset(&self, preset: u8) -> ServiceResult<()> {
        self.post("ptz/preset/store", &json!({ "preset": preset }))
            .await?;
        Ok(())
    }

    async fn ptz_auto_focus(&self) -> ServiceResult<()> {
        self.post("ptz/focus", &json!({ "auto": true })).await?;
        Ok(())
    }

    async fn ptz_white_balance(&self, mode: WhiteBalance) -> ServiceResult<()> {
        self.post("ptz/whitebalance", &white_balance_body(mode))
            .await?;
        Ok(())
    }

    async fn ptz_exposure(&self, exposure: Exposure) -> ServiceResult<()> {
        self.post("ptz/exposure", &exposure_body(exposure)).await?;
        Ok(())
    }

    async fn output_start(&self, config: &OutputConfig) -> ServiceResult<()> {
        self.post("output/start", config).await?;
        Ok(())
    }

    async fn output_stop(&self) -> ServiceResult<()> {
        self.post_empty("output/stop").await?;
        Ok(())
    }

    async fn output_status(&self) -> ServiceResult<OutputStatus> {
        self.get("output/status").await
    }

    async fn output_devices(&self) -> ServiceResult<DeviceList> {
        self.get("output/devices").await
    }
}

#[cfg(test)]
mod tests {
    mod success {
        use super::super::*;

        fn service() -> HttpControlService {
            let base = Url::parse("http://ndi-box:5000/api/").unwrap();
            HttpControlService::new(Client::new(), base)
        }

        #[test]
        fn ok_body_is_returned() {
            let value = interpret(200, r#"{"sources": [{"name": "CAM-A"}], "count": 1}"#).unwrap();
            let list: SourceList = decode(value).unwrap();

            assert_eq!(list.sources[0].name, "CAM-A");
            assert_eq!(list.sources[0].address, None);
        }

        #[test]
        fn empty_ok_body_is_null() {
            assert_eq!(interpret(204, ""), Ok(Value::Null));
        }

        #[test]
        fn viewer_request_flattens_options() {
            let options = ViewerOptions::default();
            let body = serde_json::to_value(ViewerRequest {
                source: "CAM-A",
                options: &options,
            })
            .unwrap();

            assert_eq!(
                body,
                json!({
                    "source": "CAM-A",
                    "audio": false,
                    "fullscreen": true,
                    "resolution": "1920x1080"
                })
            );
        }

        #[test]
        fn manual_white_balance_carries_gains() {
            assert_eq!(white_balance_body(WhiteBalance::Indoor), json!({ "mode": "indoor" }));
            assert_eq!(
                white_balance_body(WhiteBalance::Manual { red: 0.5, blue: 0.25 }),
                json!({ "mode": "manual", "red": 0.5, "blue": 0.25 })
            );
        }

        #[test]
        fn exposure_bodies() {
            assert_eq!(exposure_body(Exposure::Auto), json!({ "auto": true }));
            assert_eq!(
                exposure_body(Exposure::Manual { level: 0.5 }),
                json!({ "level": 0.5 })
            );
        }

        #[test]
        fn extra_ip_is_a_path_segment() {
            let url = service().extra_ip_endpoint("192.168.1.20").unwrap();
            assert_eq!(url.as_str(), "http://ndi-box:5000/api/sources/extra-ips/192.168.1.20");
        }

        #[test]
        fn endpoints_stay_under_api_prefix() {
            let url = service().endpoint("ptz/preset/recall").unwrap();
            assert_eq!(url.as_str(), "http://ndi-box:5000/api/ptz/preset/recall");
        }
    }

    mod failure {
        use super::super::*;

        #[test]
        fn error_status_uses_error_field() {
            assert_eq!(
                interpret(401, r#"{"error": "Invalid credentials"}"#),
                Err(ServiceError::Remote {
                    status: 401,
                    message: "Invalid credentials".to_string(),
                })
            );
        }

        #[test]
        fn error_status_without_json_is_generic() {
            assert_eq!(
                interpret(502, "<html>Bad Gateway</html>"),
                Err(ServiceError::Remote {
                    status: 502,
                    message: GENERIC_FAILURE.to_string(),
                })
            );
        }

        #[test]
        fn failed_status_in_ok_body_is_a_remote_failure() {
            assert_eq!(
                interpret(200, r#"{"status": "failed"}"#),
                Err(ServiceError::Remote {
                    status: 200,
                    message: "failed".to_string(),
                })
            );
            assert_eq!(
                interpret(200, r#"{"status": "error", "error": "Process 'viewer' not found"}"#),
                Err(ServiceError::Remote {
                    status: 200,
                    message: "Process 'viewer' not found".to_string(),
                })
            );
        }

        #[test]
        fn malformed_ok_body_is_a_decode_error() {
            assert!(matches!(interpret(200, "{not json"), Err(ServiceError::Decode(_))));
        }

        #[test]
        fn wrong_shape_is_a_decode_error() {
            let result: ServiceResult<ViewerStatus> = decode(json!({ "running": "yes" }));
            assert!(matches!(result, Err(ServiceError::Decode(_))));
        }
    }
}
