use image::{ImageFormat, Rgb, RgbImage};
use parkgate::camera::{CameraError, FrameSource, HttpCamera};
use std::io::Cursor;
use std::thread;
use std::time::Duration;
use tiny_http::{Response, Server};

fn png_bytes() -> Vec<u8> {
    let frame = RgbImage::from_pixel(8, 6, Rgb([10, 200, 30]));
    let mut out = Cursor::new(Vec::new());
    frame.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}

/// Answers `/frame` with a PNG, `/garbage` with junk and everything else with 404.
fn spawn_camera(requests: usize) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("bind");
    let addr = server.server_addr().to_ip().expect("ip address");
    let png = png_bytes();
    let handle = thread::spawn(move || {
        for _ in 0..requests {
            let Ok(request) = server.recv() else { return };
            let response = match request.url() {
                "/frame" => Response::from_data(png.clone()),
                "/garbage" => Response::from_data(b"not an image".to_vec()),
                _ => Response::from_data(Vec::new()).with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });
    (format!("http://{addr}"), handle)
}

#[test]
fn decodes_snapshot_and_skips_bad_cycles() {
    let (base, server) = spawn_camera(3);
    let timeout = Duration::from_secs(5);

    let frame = HttpCamera::new(format!("{base}/frame"), timeout)
        .next_frame()
        .expect("transport ok")
        .expect("decoded frame");
    assert_eq!(frame.dimensions(), (8, 6));
    assert_eq!(frame.get_pixel(3, 3), &Rgb([10, 200, 30]));

    let junk = HttpCamera::new(format!("{base}/garbage"), timeout)
        .next_frame()
        .expect("transport ok");
    assert!(junk.is_none());

    let missing = HttpCamera::new(format!("{base}/nothing"), timeout)
        .next_frame()
        .expect("transport ok");
    assert!(missing.is_none());

    server.join().expect("camera thread");
}

#[test]
fn unreachable_camera_is_an_error() {
    let mut camera = HttpCamera::new("http://127.0.0.1:1/capture", Duration::from_millis(500));
    assert!(matches!(
        camera.next_frame(),
        Err(CameraError::Transport { .. })
    ));
}
