use parkgate_admission::{AdmissionController, AdmissionPolicy, Facility, Lot, MemoryStore};
use parkgate_server::{AdmissionServer, ServerConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn status_and_body(result: Result<ureq::Response, ureq::Error>) -> (u16, Value) {
    let resp = match result {
        Ok(resp) => resp,
        Err(ureq::Error::Status(_, resp)) => resp,
        Err(err) => panic!("transport error: {err}"),
    };
    let status = resp.status();
    assert_eq!(resp.content_type(), "application/json");
    (status, resp.into_json().expect("json body"))
}

#[test]
fn serves_admission_over_http() {
    let facility = Facility::new()
        .with_lot(Lot::Inferior, 1)
        .with_lot(Lot::Superior, 0)
        .with_vehicle("1234BCD", 1);
    let controller = Arc::new(AdmissionController::new(
        Box::new(MemoryStore::new(facility)),
        AdmissionPolicy::default(),
    ));
    let config = ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        workers: 2,
        max_body_bytes: 256,
        poll_interval_ms: 20,
    };
    let server = AdmissionServer::bind(config, controller).expect("bind");
    let addr = server.local_addr().expect("ip address");
    let base = format!("http://{addr}");
    let stop = Arc::new(AtomicBool::new(false));

    let handle = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || server.run(&stop))
    };

    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(5))
        .build();

    let (status, body) = status_and_body(
        agent
            .post(&format!("{base}/api/entrada"))
            .send_json(json!({ "matricula": "1234BCD" })),
    );
    assert_eq!(status, 200);
    assert_eq!(body["success"], "entrada registrada");

    let (status, body) = status_and_body(
        agent
            .post(&format!("{base}/api/entrada"))
            .send_json(json!({ "matricula": "9999ZZZ" })),
    );
    assert_eq!(status, 403);
    assert_eq!(body["error"], "matricula no registrada");

    let (status, body) = status_and_body(agent.post(&format!("{base}/parking_log")).call());
    assert_eq!(status, 200);
    assert_eq!(body["cambio"], true);

    let (status, body) = status_and_body(agent.get(&format!("{base}/api/plazas")).call());
    assert_eq!(status, 200);
    assert_eq!(body["libres"], 0);

    let oversized = "x".repeat(1024);
    let (status, _) = status_and_body(
        agent
            .post(&format!("{base}/api/salida"))
            .send_json(json!({ "matricula": oversized })),
    );
    assert_eq!(status, 413);

    stop.store(true, Ordering::Relaxed);
    handle
        .join()
        .expect("server thread")
        .expect("server shut down cleanly");
}
