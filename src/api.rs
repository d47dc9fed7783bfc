use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::Serialize;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, info, warn};

use crate::alarm::model::{SchedulerState, format_fire_at};
use crate::controller::AlarmController;
use crate::status::Status;

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// Local-network HTTP view of the alarm: status, cancel and stop.
pub struct ApiServer {
    port: u16,
    stop: Arc<AtomicBool>,
    http_join: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn start(config: ApiServerConfig, controller: Arc<AlarmController>) -> Result<Self> {
        let bind = format!("{}:{}", config.bind_addr, config.port);
        let server = Server::http(&bind)
            .map_err(|err| anyhow!("failed to start API server on {bind}: {err}"))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(config.port);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let http_join =
            thread::spawn(move || run_server_loop(server, controller, stop_for_thread));
        info!(bind = %config.bind_addr, port, "status API listening");

        Ok(Self {
            port,
            stop,
            http_join: Some(http_join),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.http_join.take() {
            let _ = join.join();
        }
    }
}

fn run_server_loop(server: Server, controller: Arc<AlarmController>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => handle_request(request, &controller),
            Ok(None) => continue,
            Err(err) => {
                warn!("status API receive failed: {err}");
                continue;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Route {
    Health,
    Status,
    CancelAlarm,
    StopPlayback,
    MethodNotAllowed,
    NotFound,
}

fn route(method: &Method, path: &str) -> Route {
    let (expected, matched) = match path {
        "/healthz" => (Method::Get, Route::Health),
        "/" | "/v1/status" => (Method::Get, Route::Status),
        "/v1/alarm/cancel" => (Method::Post, Route::CancelAlarm),
        "/v1/playback/stop" => (Method::Post, Route::StopPlayback),
        _ => return Route::NotFound,
    };
    if *method == expected {
        matched
    } else {
        Route::MethodNotAllowed
    }
}

#[derive(Debug, Serialize)]
struct SchedulerSnapshot {
    state: &'static str,
    fire_at: Option<String>,
    track_id: Option<String>,
}

impl SchedulerSnapshot {
    fn from_state(state: &SchedulerState) -> Self {
        let spec = state.spec();
        Self {
            state: state.label(),
            fire_at: spec.map(|spec| format_fire_at(&spec.fire_at)),
            track_id: spec.and_then(|spec| spec.track_id().map(str::to_string)),
        }
    }
}

#[derive(Debug, Serialize)]
struct SelectionSnapshot {
    label: String,
    track_id: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: Option<Status>,
    scheduler: SchedulerSnapshot,
    selection: Option<SelectionSnapshot>,
}

fn status_response(controller: &AlarmController) -> StatusResponse {
    StatusResponse {
        status: controller.status(),
        scheduler: SchedulerSnapshot::from_state(&controller.scheduler_state()),
        selection: controller.selection().map(|track| SelectionSnapshot {
            label: track.display_label,
            track_id: track.track_id,
        }),
    }
}

fn handle_request(request: tiny_http::Request, controller: &AlarmController) {
    let Some(remote_addr) = request.remote_addr() else {
        let _ = send_text(request, StatusCode(400), "missing remote address");
        return;
    };
    if !is_local_network_ip(remote_addr.ip()) {
        let _ = send_text(request, StatusCode(403), "forbidden: local network only");
        return;
    }

    let url = request.url().to_string();
    let (path, _query) = split_path_query(&url);
    let matched = route(request.method(), path);
    debug!(method = %request.method(), path, ?matched, "status API request");

    let sent = match matched {
        Route::Health => send_text(request, StatusCode(200), "ok"),
        Route::Status => send_json(request, StatusCode(200), &status_response(controller)),
        Route::CancelAlarm => {
            #[derive(Serialize)]
            struct CancelResponse {
                cancelled: bool,
                status: Option<Status>,
            }

            let cancelled = controller.cancel_alarm();
            let payload = CancelResponse {
                cancelled,
                status: controller.status(),
            };
            send_json(request, StatusCode(200), &payload)
        }
        Route::StopPlayback => {
            #[derive(Serialize)]
            struct StopResponse {
                stopped: bool,
                status: Option<Status>,
            }

            let stopped = controller.stop().is_ok();
            let payload = StopResponse {
                stopped,
                status: controller.status(),
            };
            let code = if stopped { 200 } else { 502 };
            send_json(request, StatusCode(code), &payload)
        }
        Route::MethodNotAllowed => send_text(request, StatusCode(405), "method not allowed"),
        Route::NotFound => send_text(request, StatusCode(404), "not found"),
    };
    if let Err(err) = sent {
        warn!("status API response failed: {err}");
    }
}

fn send_json<T: Serialize>(
    request: tiny_http::Request,
    status: StatusCode,
    body: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    let content_type = Header::from_str("Content-Type: application/json; charset=utf-8")
        .map_err(|_| anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_data(payload)
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn send_text(request: tiny_http::Request, status: StatusCode, body: &str) -> Result<()> {
    let content_type = Header::from_str("Content-Type: text/plain; charset=utf-8")
        .map_err(|_| anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_string(body.to_string())
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn split_path_query(url: &str) -> (&str, &str) {
    match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    }
}

fn is_local_network_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || is_ipv4_mapped_local(v6)
        }
    }
}

fn is_ipv4_mapped_local(v6: Ipv6Addr) -> bool {
    match v6.to_ipv4_mapped() {
        Some(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use chrono::Local;
    use serde_json::Value;

    use super::*;
    use crate::clock::ManualClock;
    use crate::controller::ControllerSettings;
    use crate::gateway::PlaybackGateway;
    use crate::gateway::tests::FakeGateway;

    fn controller(gateway: &Arc<FakeGateway>) -> Arc<AlarmController> {
        let gateway: Arc<dyn PlaybackGateway> = gateway.clone();
        Arc::new(AlarmController::new(
            gateway,
            Arc::new(ManualClock::new(Local::now())),
            ControllerSettings {
                tick: Duration::from_millis(5),
                playlist_limit: 50,
            },
        ))
    }

    fn start(controller: &Arc<AlarmController>) -> ApiServer {
        ApiServer::start(
            ApiServerConfig {
                bind_addr: "127.0.0.1".to_string(),
                port: 0,
            },
            Arc::clone(controller),
        )
        .expect("api server")
    }

    #[test]
    fn local_network_ip_filter_accepts_private_and_loopback() {
        assert!(is_local_network_ip(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_local_network_ip(IpAddr::V4(Ipv4Addr::new(
            192, 168, 1, 44
        ))));
        assert!(is_local_network_ip(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(!is_local_network_ip(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
    }

    #[test]
    fn routes_by_method_and_path() {
        assert_eq!(route(&Method::Get, "/v1/status"), Route::Status);
        assert_eq!(route(&Method::Get, "/"), Route::Status);
        assert_eq!(route(&Method::Post, "/v1/alarm/cancel"), Route::CancelAlarm);
        assert_eq!(route(&Method::Get, "/v1/alarm/cancel"), Route::MethodNotAllowed);
        assert_eq!(route(&Method::Post, "/v1/playback/stop"), Route::StopPlayback);
        assert_eq!(route(&Method::Get, "/nope"), Route::NotFound);
        assert_eq!(split_path_query("/v1/status?x=1"), ("/v1/status", "x=1"));
    }

    #[test]
    fn status_endpoint_reports_waiting_alarm() {
        let gateway = Arc::new(FakeGateway::morning_mix());
        let controller = controller(&gateway);
        let fire_at = controller.set_alarm("23:59:59").expect("armed");
        let server = start(&controller);

        let body: Value = reqwest::blocking::get(format!(
            "http://127.0.0.1:{}/v1/status",
            server.port()
        ))
        .expect("request")
        .json()
        .expect("json");

        assert_eq!(body["scheduler"]["state"], "waiting");
        assert_eq!(body["scheduler"]["fire_at"], format_fire_at(&fire_at));
        assert_eq!(body["scheduler"]["track_id"], Value::Null);
        assert_eq!(body["status"]["severity"], "success");
        assert_eq!(body["selection"], Value::Null);
    }

    #[test]
    fn cancel_and_stop_endpoints_drive_the_controller() {
        let gateway = Arc::new(FakeGateway::morning_mix());
        let controller = controller(&gateway);
        controller.set_alarm("23:59:59").expect("armed");
        let server = start(&controller);
        let client = reqwest::blocking::Client::new();
        let base = format!("http://127.0.0.1:{}", server.port());

        let body: Value = client
            .post(format!("{base}/v1/alarm/cancel"))
            .send()
            .expect("cancel")
            .json()
            .expect("json");
        assert_eq!(body["cancelled"], true);
        assert_eq!(controller.scheduler_state(), SchedulerState::Idle);

        let response = client
            .post(format!("{base}/v1/playback/stop"))
            .send()
            .expect("stop");
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(gateway.calls(), vec!["pause_playback"]);

        let response = client.get(format!("{base}/v1/playback/stop")).send().expect("get");
        assert_eq!(response.status().as_u16(), 405);
        let response = client.get(format!("{base}/healthz")).send().expect("health");
        assert_eq!(response.text().expect("text"), "ok");
    }
}
